use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::StorageError;
use super::format::ImageFormat;

/// Longest accepted stored name (matches the `asset_ref.name` column width).
const MAX_NAME_LEN: usize = 100;

/// A validated, store-generated asset name such as `0b6f…e1.png`.
///
/// Names are flat: no directory components, no traversal, no hidden files.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetName(String);

impl AssetName {
    /// Generate a fresh, collision-resistant name for an image of the given format.
    pub fn generate(format: ImageFormat) -> Self {
        Self(format!("{}.{}", uuid::Uuid::new_v4(), format.extension()))
    }

    /// Parse a name previously returned by the store.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        if s.is_empty() {
            return Err(StorageError::InvalidName("name cannot be empty".into()));
        }
        if s.len() > MAX_NAME_LEN {
            return Err(StorageError::InvalidName(format!(
                "name longer than {MAX_NAME_LEN} bytes"
            )));
        }
        if s.starts_with('.') || s.contains("..") {
            return Err(StorageError::InvalidName(format!(
                "'{s}' is hidden or contains '..'"
            )));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(StorageError::InvalidName(format!(
                "'{s}' contains characters outside [A-Za-z0-9._-]"
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIME type guessed from the name's extension.
    pub fn content_type(&self) -> Option<String> {
        mime_guess::from_path(&self.0)
            .first()
            .map(|m| m.to_string())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetName({})", self.0)
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for AssetName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AssetName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
