use std::collections::BTreeSet;

use futures::future::join_all;

use crate::common::{MemoryAssetStore, TestPublisher, img_sources, inline_img, input, png};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn each_node_gets_its_own_bytes_under_random_latency() {
    let app = TestPublisher::with_store(MemoryAssetStore::with_latency(15));
    let images: Vec<Vec<u8>> = (0..16)
        .map(|i| png(8, 8, format!("image-{i}").as_bytes()))
        .collect();
    let content: String = images
        .iter()
        .enumerate()
        .map(|(i, bytes)| format!("<p>{i}</p>{}", inline_img(bytes)))
        .collect();

    let article = app.workflow.create(input(content)).await.unwrap();

    let sources = img_sources(&article.content);
    assert_eq!(sources.len(), images.len());
    for (i, (src, original)) in sources.iter().zip(&images).enumerate() {
        assert!(article.content.contains(&format!("<p>{i}</p><img src=\"{src}\">")));
        assert_eq!(app.store.bytes(src).as_ref(), Some(original), "node {i}");
    }
    let unique: BTreeSet<&String> = sources.iter().collect();
    assert_eq!(unique.len(), images.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishes_never_share_names() {
    let app = TestPublisher::with_store(MemoryAssetStore::with_latency(5));
    let identical = png(4, 4, b"same");

    let results = join_all((0..6).map(|_| {
        let workflow = app.workflow.clone();
        let content = format!("{}{}", inline_img(&identical), inline_img(&identical));
        async move { workflow.create(input(content)).await }
    }))
    .await;

    let mut all = BTreeSet::new();
    for article in results {
        let article = article.unwrap();
        let names = app.repo.asset_names(article.id).await;
        assert_eq!(names.len(), 2);
        for name in names {
            assert!(all.insert(name), "name reused across articles");
        }
    }
    assert_eq!(all.len(), 12);
    assert_eq!(all, app.store.names());
}
