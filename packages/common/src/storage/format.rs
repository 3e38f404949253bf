use std::fmt;

use image::GenericImageView;

use super::error::StorageError;

/// Image encodings accepted by the asset store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    /// File extension used for stored names (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
        }
    }

    fn from_codec(codec: image::ImageFormat) -> Option<Self> {
        match codec {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    fn codec(&self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Gif => image::ImageFormat::Gif,
        }
    }

    /// Resolve a format from a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Format and pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    /// Decode the whole byte stream and return its format and dimensions.
    ///
    /// The signature picks the decoder; anything that does not decode cleanly
    /// with it is rejected, including corrupt pixel data behind a valid header.
    pub fn decode(data: &[u8]) -> Result<Self, StorageError> {
        if data.is_empty() {
            return Err(unsupported("empty image data".into()));
        }
        let codec = image::guess_format(data)
            .map_err(|_| unsupported("unrecognized image signature".into()))?;
        let format = ImageFormat::from_codec(codec)
            .ok_or_else(|| unsupported(format!("{codec:?} images are not accepted")))?;

        let decoded = image::load_from_memory_with_format(data, format.codec())
            .map_err(|e| unsupported(format!("corrupt {format} data: {e}")))?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(unsupported(format!("{format} has zero dimensions")));
        }
        Ok(Self {
            format,
            width,
            height,
        })
    }
}

fn unsupported(msg: String) -> StorageError {
    StorageError::UnsupportedFormat(msg)
}
