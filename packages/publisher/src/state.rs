use std::sync::Arc;

use anyhow::Context;
use common::storage::{AssetStore, filesystem::FilesystemAssetStore};
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::config::AppConfig;
use crate::database::init_db;
use crate::deletion::{DeletionRetrier, DeletionRetrierHandle};
use crate::models::ArticleValidator;
use crate::repository::SeaOrmArticleRepository;
use crate::workflow::PublishWorkflow;

/// Everything a host needs to serve publish requests.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub assets: Arc<dyn AssetStore>,
    pub workflow: Arc<PublishWorkflow>,
}

impl AppState {
    /// Connect the database, open the asset directory and start the deletion retrier.
    ///
    /// The returned handle owns the retrier; hosts should `join` it on shutdown.
    pub async fn init(config: &AppConfig) -> anyhow::Result<(Self, DeletionRetrierHandle)> {
        let db = init_db(&config.database.url)
            .await
            .context("Failed to initialize database")?;

        let store = FilesystemAssetStore::new(
            config.storage.asset_dir.clone(),
            config.storage.max_asset_size,
        )
        .await
        .with_context(|| {
            format!(
                "Failed to open asset directory {}",
                config.storage.asset_dir.display()
            )
        })?;
        let assets: Arc<dyn AssetStore> = Arc::new(store);

        let (deletions, retrier) =
            DeletionRetrier::spawn(Arc::clone(&assets), config.deletion.backoff());

        let workflow = PublishWorkflow::new(
            Arc::new(SeaOrmArticleRepository::new(db.clone())),
            Arc::clone(&assets),
            deletions,
            ArticleValidator::new(config.article.clone(), config.banner.clone()),
        );

        info!(asset_dir = %config.storage.asset_dir.display(), "Publisher initialized");
        Ok((
            Self {
                db,
                assets,
                workflow: Arc::new(workflow),
            },
            retrier,
        ))
    }
}
