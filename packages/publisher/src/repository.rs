//! Transactional access to articles and their asset references.

use async_trait::async_trait;
use chrono::Utc;
use common::storage::AssetName;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::LockType,
};
use uuid::Uuid;

use crate::entity::{article, asset_ref, organization};
use crate::models::{Article, NewArticle};

/// Source of article transactions plus read-only queries.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ArticleTx>, DbErr>;

    async fn find_article(&self, id: i32) -> Result<Option<Article>, DbErr>;

    /// Articles ordered by `published_at` descending.
    async fn list_articles(&self, organization_id: Option<i32>) -> Result<Vec<Article>, DbErr>;
}

/// One open relational transaction.
///
/// Dropping a transaction without calling [`commit`](Self::commit) rolls it back.
#[async_trait]
pub trait ArticleTx: Send + Sync {
    async fn organization_exists(&self, id: i32) -> Result<bool, DbErr>;

    /// Load and row-lock an article, optionally restricted to one owner.
    async fn lock_article(&self, id: i32, scope: Option<i32>) -> Result<Option<Article>, DbErr>;

    async fn insert_article(&self, new: NewArticle) -> Result<Article, DbErr>;

    async fn update_article(&self, article: &Article) -> Result<Article, DbErr>;

    async fn delete_article(&self, id: i32) -> Result<(), DbErr>;

    /// Names of every asset currently referenced by the article.
    async fn asset_names(&self, article_id: i32) -> Result<Vec<String>, DbErr>;

    async fn insert_asset_ref(&self, article_id: i32, name: &AssetName) -> Result<(), DbErr>;

    async fn delete_asset_refs(&self, article_id: i32, names: &[String]) -> Result<(), DbErr>;

    async fn commit(self: Box<Self>) -> Result<(), DbErr>;

    async fn rollback(self: Box<Self>) -> Result<(), DbErr>;
}

#[derive(Debug, Clone)]
pub struct SeaOrmArticleRepository {
    db: DatabaseConnection,
}

impl SeaOrmArticleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArticleRepository for SeaOrmArticleRepository {
    async fn begin(&self) -> Result<Box<dyn ArticleTx>, DbErr> {
        let txn = self.db.begin().await?;
        Ok(Box::new(SeaOrmArticleTx { txn }))
    }

    async fn find_article(&self, id: i32) -> Result<Option<Article>, DbErr> {
        let model = article::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Article::from))
    }

    async fn list_articles(&self, organization_id: Option<i32>) -> Result<Vec<Article>, DbErr> {
        let mut query = article::Entity::find();
        if let Some(org) = organization_id {
            query = query.filter(article::Column::OrganizationId.eq(org));
        }
        let models = query
            .order_by_desc(article::Column::PublishedAt)
            .order_by_desc(article::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Article::from).collect())
    }
}

struct SeaOrmArticleTx {
    txn: DatabaseTransaction,
}

#[async_trait]
impl ArticleTx for SeaOrmArticleTx {
    async fn organization_exists(&self, id: i32) -> Result<bool, DbErr> {
        Ok(organization::Entity::find_by_id(id)
            .one(&self.txn)
            .await?
            .is_some())
    }

    async fn lock_article(&self, id: i32, scope: Option<i32>) -> Result<Option<Article>, DbErr> {
        let mut query = article::Entity::find_by_id(id);
        if let Some(org) = scope {
            query = query.filter(article::Column::OrganizationId.eq(org));
        }
        let model = query.lock(LockType::Update).one(&self.txn).await?;
        Ok(model.map(Article::from))
    }

    async fn insert_article(&self, new: NewArticle) -> Result<Article, DbErr> {
        let model = article::ActiveModel {
            organization_id: Set(new.organization_id),
            title: Set(new.title),
            summary: Set(new.summary),
            content: Set(new.content),
            banner: Set(new.banner),
            published_at: Set(new.published_at),
            updated_at: Set(new.published_at),
            ..Default::default()
        }
        .insert(&self.txn)
        .await?;
        Ok(model.into())
    }

    async fn update_article(&self, a: &Article) -> Result<Article, DbErr> {
        let model = article::ActiveModel {
            id: Set(a.id),
            organization_id: Set(a.organization_id),
            title: Set(a.title.clone()),
            summary: Set(a.summary.clone()),
            content: Set(a.content.clone()),
            banner: Set(a.banner.clone()),
            published_at: Set(a.published_at),
            updated_at: Set(Utc::now()),
        }
        .update(&self.txn)
        .await?;
        Ok(model.into())
    }

    async fn delete_article(&self, id: i32) -> Result<(), DbErr> {
        asset_ref::Entity::delete_many()
            .filter(asset_ref::Column::ArticleId.eq(id))
            .exec(&self.txn)
            .await?;
        let res = article::Entity::delete_by_id(id).exec(&self.txn).await?;
        if res.rows_affected == 0 {
            return Err(DbErr::RecordNotFound(format!("article {id}")));
        }
        Ok(())
    }

    async fn asset_names(&self, article_id: i32) -> Result<Vec<String>, DbErr> {
        asset_ref::Entity::find()
            .select_only()
            .column(asset_ref::Column::Name)
            .filter(asset_ref::Column::ArticleId.eq(article_id))
            .order_by_asc(asset_ref::Column::Name)
            .into_tuple()
            .all(&self.txn)
            .await
    }

    async fn insert_asset_ref(&self, article_id: i32, name: &AssetName) -> Result<(), DbErr> {
        asset_ref::ActiveModel {
            id: Set(Uuid::now_v7()),
            article_id: Set(article_id),
            name: Set(name.to_string()),
            content_type: Set(name.content_type()),
            created_at: Set(Utc::now()),
        }
        .insert(&self.txn)
        .await?;
        Ok(())
    }

    async fn delete_asset_refs(&self, article_id: i32, names: &[String]) -> Result<(), DbErr> {
        if names.is_empty() {
            return Ok(());
        }
        asset_ref::Entity::delete_many()
            .filter(asset_ref::Column::ArticleId.eq(article_id))
            .filter(asset_ref::Column::Name.is_in(names.iter().cloned()))
            .exec(&self.txn)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}
