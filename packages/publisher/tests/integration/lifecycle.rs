use std::sync::Arc;

use common::retry::BackoffPolicy;
use publisher::deletion::{DeletionQueue, DeletionReason, DeletionRetrier, DeletionRetrierHandle};
use publisher::models::ArticleValidator;
use publisher::workflow::PublishWorkflow;

use crate::common::{
    FakeRepository, MemoryAssetStore, asset, img_sources, inline_img, input, png,
};

struct Running {
    workflow: PublishWorkflow,
    repo: Arc<FakeRepository>,
    store: Arc<MemoryAssetStore>,
    queue: DeletionQueue,
    retrier: DeletionRetrierHandle,
}

fn start() -> Running {
    let repo = FakeRepository::new();
    let store = MemoryAssetStore::new();
    let (queue, retrier) = DeletionRetrier::spawn(store.clone(), BackoffPolicy::default());
    let workflow = PublishWorkflow::new(
        repo.clone(),
        store.clone(),
        queue.clone(),
        ArticleValidator::default(),
    );
    Running {
        workflow,
        repo,
        store,
        queue,
        retrier,
    }
}

#[tokio::test]
async fn retrier_removes_orphans_and_deleted_articles() {
    let Running {
        workflow,
        repo,
        store,
        queue,
        retrier,
    } = start();

    let created = workflow
        .create(input(format!(
            "{}{}",
            inline_img(&png(1, 1, b"a")),
            inline_img(&png(1, 1, b"b"))
        )))
        .await
        .unwrap();
    let [a, b]: [String; 2] = img_sources(&created.content).try_into().unwrap();

    workflow
        .update(created.id, input(format!(r#"<img src="{b}">"#)), None)
        .await
        .unwrap();
    workflow.delete(created.id, None).await.unwrap();
    // Already gone; counts as deleted.
    queue.schedule(asset(&a), DeletionReason::Orphaned);

    drop(queue);
    drop(workflow);
    assert!(retrier.exhausted().await.is_empty());
    retrier.join().await;

    assert!(store.names().is_empty());
    assert_eq!(repo.article_count().await, 0);
}

#[tokio::test]
async fn retrier_removes_blobs_of_failed_publish() {
    let Running {
        workflow,
        repo,
        store,
        queue,
        retrier,
    } = start();
    repo.fail_commits(true);

    let err = workflow
        .create(input(inline_img(&png(1, 1, b"lost"))))
        .await
        .unwrap_err();
    assert_eq!(err.reason(), publisher::RollbackReason::InternalError);

    drop(queue);
    drop(workflow);
    retrier.join().await;

    assert_eq!(store.store_calls(), 1);
    assert!(store.names().is_empty());
}
