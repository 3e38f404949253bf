use std::fmt;

/// Errors that can occur during asset storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The requested asset was not found.
    NotFound(String),
    /// An I/O error occurred.
    Io(std::io::Error),
    /// The bytes are not a supported image encoding.
    UnsupportedFormat(String),
    /// The provided asset name is not a valid stored name.
    InvalidName(String),
    /// The asset exceeds the configured size limit.
    SizeLimitExceeded { actual: u64, limit: u64 },
}

impl StorageError {
    /// Whether the failure is caused by the submitted bytes rather than the store itself.
    ///
    /// Content rejections are recoverable for inline images (the node is blanked);
    /// anything else aborts the publish attempt.
    pub fn is_content_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_) | Self::SizeLimitExceeded { .. }
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "asset not found: {name}"),
            Self::Io(err) => write!(f, "storage IO error: {err}"),
            Self::UnsupportedFormat(msg) => write!(f, "unsupported image: {msg}"),
            Self::InvalidName(msg) => write!(f, "invalid asset name: {msg}"),
            Self::SizeLimitExceeded { actual, limit } => {
                write!(f, "asset exceeds size limit ({actual} > {limit} bytes)")
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
