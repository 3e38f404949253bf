//! The publish workflow: validate, resolve owner, store assets, persist, commit.
//!
//! A publish attempt walks [`PublishState`] from `Received` to `Committed`.
//! Any failure before commit rolls the transaction back and queues every blob
//! written during the attempt for compensating deletion. Blobs that became
//! unreferenced are only handed to the deletion queue after a successful
//! commit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use common::storage::{AssetName, AssetStore};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::deletion::{DeletionQueue, DeletionReason};
use crate::error::{PublishError, Result, RollbackReason};
use crate::models::validation::validate_id;
use crate::models::{
    Article, ArticleInput, ArticleSummary, ArticleValidator, BannerUpload, NewArticle,
};
use crate::reconcile;
use crate::repository::{ArticleRepository, ArticleTx};
use crate::scanner::DocumentScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Received,
    Validated,
    OwnerResolved,
    AssetsResolved,
    MetadataPersisted,
    Committed,
    RolledBack(RollbackReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal publish transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: PublishState,
    pub to: PublishState,
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishState::Committed | PublishState::RolledBack(_))
    }

    /// Move to `next` if the transition is legal.
    ///
    /// States advance one step at a time; any non-terminal state may roll back.
    pub fn advance(
        self,
        next: PublishState,
    ) -> std::result::Result<PublishState, IllegalTransition> {
        use PublishState::*;

        let legal = match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, RolledBack(_)) => true,
            (Received, Validated)
            | (Validated, OwnerResolved)
            | (OwnerResolved, AssetsResolved)
            | (AssetsResolved, MetadataPersisted)
            | (MetadataPersisted, Committed) => true,
            _ => false,
        };

        if legal {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// One publish attempt: its state plus the blobs it has written.
///
/// Dropping an attempt that never committed queues its blobs for
/// compensating deletion, so cancellation is covered as well as errors.
/// An attempt dropped while its commit is in flight cannot know the outcome;
/// its blobs are logged as possibly leaked and left in place.
struct Attempt {
    op: &'static str,
    state: PublishState,
    written: Vec<AssetName>,
    queue: DeletionQueue,
    committing: bool,
    committed: bool,
}

impl Attempt {
    fn new(op: &'static str, queue: DeletionQueue) -> Self {
        Self {
            op,
            state: PublishState::Received,
            written: Vec::new(),
            queue,
            committing: false,
            committed: false,
        }
    }

    fn step(&mut self, next: PublishState) {
        match self.state.advance(next) {
            Ok(state) => {
                debug!(op = self.op, ?state, "Publish state advanced");
                self.state = state;
            }
            Err(e) => error!(op = self.op, error = %e, "Publish state machine violated"),
        }
    }

    fn record(&mut self, name: &AssetName) {
        self.written.push(name.clone());
    }

    /// Commit the transaction, tracking that the outcome is unknown until it returns.
    async fn commit(&mut self, txn: Box<dyn ArticleTx>) -> Result<()> {
        self.committing = true;
        let committed = txn.commit().await;
        self.committing = false;
        committed.map_err(PublishError::from)
    }

    fn finish<T>(mut self, result: &Result<T>) {
        match result {
            Ok(_) => {
                self.step(PublishState::Committed);
                self.committed = true;
            }
            Err(e) => {
                let reason = e.reason();
                warn!(op = self.op, ?reason, error = %e, "Publish attempt rolled back");
                self.step(PublishState::RolledBack(reason));
            }
        }
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        if self.committed || self.written.is_empty() {
            return;
        }
        if self.committing {
            let names: Vec<&str> = self.written.iter().map(AssetName::as_str).collect();
            warn!(
                op = self.op,
                assets = ?names,
                "Attempt dropped during commit, assets may be leaked"
            );
            return;
        }
        warn!(
            op = self.op,
            count = self.written.len(),
            "Queueing compensating deletion for uncommitted assets"
        );
        self.queue
            .schedule_all(self.written.drain(..), DeletionReason::Compensating);
    }
}

/// Work that must only happen once the transaction is durable.
#[derive(Default)]
struct AfterCommit {
    deletions: Vec<(AssetName, DeletionReason)>,
}

impl AfterCommit {
    fn delete(&mut self, name: &str, reason: DeletionReason) {
        match AssetName::parse(name) {
            Ok(name) => self.deletions.push((name, reason)),
            Err(e) => warn!(asset = name, error = %e, "Skipping deletion of invalid asset name"),
        }
    }
}

pub struct PublishWorkflow {
    repo: Arc<dyn ArticleRepository>,
    assets: Arc<dyn AssetStore>,
    deletions: DeletionQueue,
    validator: ArticleValidator,
    scanner: DocumentScanner,
}

impl PublishWorkflow {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        assets: Arc<dyn AssetStore>,
        deletions: DeletionQueue,
        validator: ArticleValidator,
    ) -> Self {
        Self {
            repo,
            assets,
            deletions,
            validator,
            scanner: DocumentScanner::new(),
        }
    }

    /// Publish a new article, storing every inline image as an asset.
    #[instrument(skip(self, input), fields(organization_id = input.organization_id))]
    pub async fn create(&self, input: ArticleInput) -> Result<Article> {
        let mut attempt = Attempt::new("create", self.deletions.clone());
        let result = self.run_create(&mut attempt, input).await;
        attempt.finish(&result);

        if let Ok(article) = &result {
            info!(article_id = article.id, "Article published");
        }
        result
    }

    /// Replace an article's content, reconciling its assets.
    #[instrument(skip(self, input), fields(organization_id = input.organization_id))]
    pub async fn update(
        &self,
        article_id: i32,
        input: ArticleInput,
        scope: Option<i32>,
    ) -> Result<Article> {
        let mut attempt = Attempt::new("update", self.deletions.clone());
        let result = self.run_update(&mut attempt, article_id, input, scope).await;
        attempt.finish(&result);

        match result {
            Ok((article, after)) => {
                info!(
                    article_id,
                    deleted = after.deletions.len(),
                    "Article updated"
                );
                self.dispatch(after);
                Ok(article)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete an article and schedule removal of all its assets.
    #[instrument(skip(self))]
    pub async fn delete(&self, article_id: i32, scope: Option<i32>) -> Result<()> {
        validate_id("Article", article_id)?;

        let txn = self.repo.begin().await?;
        let outcome = async {
            let article = txn
                .lock_article(article_id, scope)
                .await?
                .ok_or_else(|| PublishError::NotFound("Article".into()))?;

            let mut after = AfterCommit::default();
            for name in txn.asset_names(article_id).await? {
                after.delete(&name, DeletionReason::ArticleRemoved);
            }
            if let Some(banner) = &article.banner {
                after.delete(banner, DeletionReason::ArticleRemoved);
            }

            txn.delete_article(article_id).await?;
            Ok::<_, PublishError>(after)
        }
        .await;

        let after = match outcome {
            Ok(after) => after,
            Err(e) => {
                rollback(txn).await;
                return Err(e);
            }
        };
        txn.commit().await?;

        info!(article_id, assets = after.deletions.len(), "Article deleted");
        self.dispatch(after);
        Ok(())
    }

    pub async fn get(&self, article_id: i32) -> Result<Article> {
        validate_id("Article", article_id)?;
        self.repo
            .find_article(article_id)
            .await?
            .ok_or_else(|| PublishError::NotFound("Article".into()))
    }

    /// Article summaries, newest first.
    pub async fn list(&self, organization_id: Option<i32>) -> Result<Vec<ArticleSummary>> {
        let articles = self.repo.list_articles(organization_id).await?;
        Ok(articles.into_iter().map(ArticleSummary::from).collect())
    }

    async fn run_create(&self, attempt: &mut Attempt, mut input: ArticleInput) -> Result<Article> {
        self.validator.validate_input(&mut input)?;
        attempt.step(PublishState::Validated);

        let txn = self.repo.begin().await?;
        let outcome = self.create_in(&*txn, attempt, input).await;
        let article = match outcome {
            Ok(article) => article,
            Err(e) => {
                rollback(txn).await;
                return Err(e);
            }
        };
        attempt.commit(txn).await?;
        Ok(article)
    }

    async fn create_in(
        &self,
        txn: &dyn ArticleTx,
        attempt: &mut Attempt,
        input: ArticleInput,
    ) -> Result<Article> {
        if !txn.organization_exists(input.organization_id).await? {
            return Err(PublishError::NotFound("Organization".into()));
        }
        attempt.step(PublishState::OwnerResolved);

        let banner = match &input.banner {
            Some(upload) => Some(self.store_banner(attempt, upload).await?),
            None => None,
        };
        let (content, created) = self.resolve_assets(attempt, &input.content).await?;
        attempt.step(PublishState::AssetsResolved);

        let article = txn
            .insert_article(NewArticle {
                organization_id: input.organization_id,
                title: input.title,
                summary: input.summary,
                content,
                banner: banner.map(AssetName::into_string),
                published_at: Utc::now(),
            })
            .await?;

        let diff = reconcile::diff(Vec::<String>::new(), created.iter());
        for name in created.iter().filter(|n| diff.to_create.contains(n.as_str())) {
            txn.insert_asset_ref(article.id, name).await?;
        }
        attempt.step(PublishState::MetadataPersisted);

        debug!(article_id = article.id, assets = diff.to_create.len(), "Article rows written");
        Ok(article)
    }

    async fn run_update(
        &self,
        attempt: &mut Attempt,
        article_id: i32,
        mut input: ArticleInput,
        scope: Option<i32>,
    ) -> Result<(Article, AfterCommit)> {
        validate_id("Article", article_id)?;
        self.validator.validate_input(&mut input)?;
        if scope.is_some_and(|owner| owner != input.organization_id) {
            return Err(PublishError::Validation(
                "Organization does not match owner scope".into(),
            ));
        }
        attempt.step(PublishState::Validated);

        let txn = self.repo.begin().await?;
        let outcome = self
            .update_in(&*txn, attempt, article_id, input, scope)
            .await;
        let (article, after) = match outcome {
            Ok(done) => done,
            Err(e) => {
                rollback(txn).await;
                return Err(e);
            }
        };
        attempt.commit(txn).await?;
        Ok((article, after))
    }

    async fn update_in(
        &self,
        txn: &dyn ArticleTx,
        attempt: &mut Attempt,
        article_id: i32,
        input: ArticleInput,
        scope: Option<i32>,
    ) -> Result<(Article, AfterCommit)> {
        let mut article = txn
            .lock_article(article_id, scope)
            .await?
            .ok_or_else(|| PublishError::NotFound("Article".into()))?;
        if !txn.organization_exists(input.organization_id).await? {
            return Err(PublishError::NotFound("Organization".into()));
        }
        attempt.step(PublishState::OwnerResolved);

        let mut after = AfterCommit::default();
        if let Some(upload) = &input.banner {
            let name = self.store_banner(attempt, upload).await?;
            if let Some(old) = article.banner.replace(name.into_string()) {
                after.delete(&old, DeletionReason::BannerReplaced);
            }
        }
        let (content, created) = self.resolve_assets(attempt, &input.content).await?;
        attempt.step(PublishState::AssetsResolved);

        let persisted = txn.asset_names(article_id).await?;
        let known: HashSet<&str> = persisted
            .iter()
            .map(String::as_str)
            .chain(created.iter().map(AssetName::as_str))
            .collect();
        // External URLs stay in the content but are never registered.
        let referenced: Vec<String> = self
            .scanner
            .referenced_sources(&content)
            .into_iter()
            .filter(|src| known.contains(src.as_str()))
            .collect();

        let diff = reconcile::diff(&persisted, &referenced);
        debug!(
            to_create = diff.to_create.len(),
            to_delete = diff.to_delete.len(),
            unchanged = diff.unchanged.len(),
            "Assets reconciled"
        );

        let removed: Vec<String> = diff.to_delete.iter().cloned().collect();
        txn.delete_asset_refs(article_id, &removed).await?;
        for name in created.iter().filter(|n| diff.to_create.contains(n.as_str())) {
            txn.insert_asset_ref(article_id, name).await?;
        }

        article.organization_id = input.organization_id;
        article.title = input.title;
        article.summary = input.summary;
        article.content = content;
        let article = txn.update_article(&article).await?;
        attempt.step(PublishState::MetadataPersisted);

        for name in &removed {
            after.delete(name, DeletionReason::Orphaned);
        }
        Ok((article, after))
    }

    async fn store_banner(
        &self,
        attempt: &mut Attempt,
        upload: &BannerUpload,
    ) -> Result<AssetName> {
        let name = self
            .assets
            .store(&upload.bytes, Some(&upload.filename))
            .await
            .inspect_err(|e| error!(error = %e, "Failed to store banner"))?;
        attempt.record(&name);
        Ok(name)
    }

    /// Store every inline image concurrently and rewrite the content to
    /// reference the stored names.
    ///
    /// Images the store rejects as content are blanked. Any other failure
    /// fails the attempt, but only after every task has been joined so that
    /// all written blobs are recorded for compensation.
    async fn resolve_assets(
        &self,
        attempt: &mut Attempt,
        content: &str,
    ) -> Result<(String, Vec<AssetName>)> {
        let images = self.scanner.extract_embedded_images(content);
        if images.is_empty() {
            return Ok((content.to_string(), Vec::new()));
        }
        debug!(count = images.len(), "Storing inline images");

        let mut tasks = JoinSet::new();
        for image in images {
            let store = Arc::clone(&self.assets);
            tasks.spawn(async move {
                let result = store.store(&image.bytes, None).await;
                (image.handle, result)
            });
        }

        let mut mapping = HashMap::new();
        let mut created = Vec::new();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((handle, Ok(name))) => {
                    attempt.record(&name);
                    mapping.insert(handle, name.to_string());
                    created.push(name);
                }
                Ok((handle, Err(e))) if e.is_content_rejection() => {
                    warn!(
                        node = handle.index(),
                        error = %e,
                        "Inline image rejected, source blanked"
                    );
                    mapping.insert(handle, String::new());
                }
                Ok((handle, Err(e))) => {
                    error!(node = handle.index(), error = %e, "Failed to store inline image");
                    if failure.is_none() {
                        failure = Some(PublishError::Storage(e));
                    }
                }
                Err(e) => {
                    error!(error = %e, "Inline image task failed");
                    if failure.is_none() {
                        failure = Some(PublishError::Internal(e.to_string()));
                    }
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        created.sort();
        Ok((self.scanner.rewrite_references(content, &mapping), created))
    }

    fn dispatch(&self, after: AfterCommit) {
        for (name, reason) in after.deletions {
            self.deletions.schedule(name, reason);
        }
    }
}

async fn rollback(txn: Box<dyn ArticleTx>) {
    if let Err(e) = txn.rollback().await {
        warn!(error = %e, "Transaction rollback failed");
    }
}
