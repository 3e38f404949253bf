use std::path::Path;

use common::storage::{ImageFormat, ImageInfo};

use super::article::{ArticleInput, BannerUpload};
use crate::config::{ArticleConfig, BannerConfig};
use crate::error::PublishError;

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validates publish requests before any side effect happens.
#[derive(Debug, Clone, Default)]
pub struct ArticleValidator {
    article: ArticleConfig,
    banner: BannerConfig,
}

impl ArticleValidator {
    pub fn new(article: ArticleConfig, banner: BannerConfig) -> Self {
        Self { article, banner }
    }

    /// Normalize and validate the text fields of `input` in place.
    pub fn validate_input(&self, input: &mut ArticleInput) -> Result<(), PublishError> {
        input.title = normalize_spaces(&input.title);
        input.summary = normalize_spaces(&input.summary);

        check_length("Title", &input.title, self.article.title_max_chars)?;
        check_length("Summary", &input.summary, self.article.summary_max_chars)?;

        if input.content.trim().is_empty() {
            return Err(PublishError::Validation("Content is required".into()));
        }
        validate_id("Organization", input.organization_id)?;

        if let Some(banner) = &input.banner {
            self.validate_banner(banner)?;
        }
        Ok(())
    }

    /// Banner must be a JPEG/PNG of the configured exact size.
    pub fn validate_banner(&self, banner: &BannerUpload) -> Result<(), PublishError> {
        let ext = Path::new(&banner.filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !matches!(
            ImageFormat::from_extension(ext),
            Some(ImageFormat::Jpeg | ImageFormat::Png)
        ) {
            return Err(PublishError::Validation(
                "Banner must be a .jpg, .jpeg or .png file".into(),
            ));
        }

        let limit = self.banner.max_size_kb * 1024;
        if banner.bytes.len() as u64 > limit {
            return Err(PublishError::Validation(format!(
                "Banner exceeds {} KB",
                self.banner.max_size_kb
            )));
        }

        let info = ImageInfo::decode(&banner.bytes)
            .map_err(|e| PublishError::Validation(format!("Banner is not a valid image: {e}")))?;
        if (info.width, info.height) != (self.banner.width, self.banner.height) {
            return Err(PublishError::Validation(format!(
                "Banner must be {}x{} pixels, got {}x{}",
                self.banner.width, self.banner.height, info.width, info.height
            )));
        }
        Ok(())
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), PublishError> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(PublishError::Validation(format!(
            "{field} must be 1-{max} characters"
        )));
    }
    Ok(())
}

/// Identifiers are positive database keys.
pub fn validate_id(what: &str, id: i32) -> Result<(), PublishError> {
    if id <= 0 {
        return Err(PublishError::Validation(format!("{what} id must be positive")));
    }
    Ok(())
}
