use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Links an article to one stored inline image.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "asset_ref")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub article_id: i32,
    #[sea_orm(belongs_to, from = "article_id", to = "id")]
    pub article: HasOne<super::article::Entity>,

    /// Stored asset name. A name belongs to at most one live reference.
    #[sea_orm(unique)]
    pub name: String,

    /// MIME content type guessed from the name.
    pub content_type: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
