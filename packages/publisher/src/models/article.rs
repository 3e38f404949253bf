use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::article;

/// A published article as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: i32,
    pub organization_id: i32,
    pub title: String,
    pub summary: String,
    /// Final content: every inline image replaced by its stored asset name.
    pub content: String,
    pub banner: Option<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<article::Model> for Article {
    fn from(m: article::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            title: m.title,
            summary: m.summary,
            content: m.content,
            banner: m.banner,
            published_at: m.published_at,
            updated_at: m.updated_at,
        }
    }
}

/// Listing entry; omits the content body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub id: i32,
    pub organization_id: i32,
    pub title: String,
    pub summary: String,
    pub banner: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl From<Article> for ArticleSummary {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            organization_id: a.organization_id,
            title: a.title,
            summary: a.summary,
            banner: a.banner,
            published_at: a.published_at,
        }
    }
}

/// Row values for an article that has not been inserted yet.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub organization_id: i32,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub banner: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// A banner image uploaded alongside the article.
#[derive(Debug, Clone)]
pub struct BannerUpload {
    /// Client-supplied filename; its extension must name a JPEG or PNG.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Create/update request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleInput {
    pub title: String,
    pub summary: String,
    /// Rich-text content, possibly containing `data:image/...;base64,` images.
    pub content: String,
    pub organization_id: i32,
    #[serde(skip)]
    pub banner: Option<BannerUpload>,
}
