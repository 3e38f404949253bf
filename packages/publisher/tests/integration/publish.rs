use base64::{Engine, engine::general_purpose::STANDARD};

use crate::common::{OTHER_ORG, TestPublisher, banner, img_sources, inline_img, input, png};
use publisher::{PublishError, RollbackReason};

mod create {
    use super::*;

    #[tokio::test]
    async fn stores_each_inline_image_once() {
        let mut app = TestPublisher::new();
        let images: Vec<Vec<u8>> = (0..3)
            .map(|i| png(4, 4, format!("img{i}").as_bytes()))
            .collect();
        let content = format!(
            "<h1>Flu</h1>{}<p>between</p>{}{}",
            inline_img(&images[0]),
            inline_img(&images[1]),
            inline_img(&images[2])
        );

        let article = app.workflow.create(input(content)).await.unwrap();

        assert!(!article.content.contains("data:"));
        let sources = img_sources(&article.content);
        assert_eq!(sources.len(), 3);
        for (src, original) in sources.iter().zip(&images) {
            assert_eq!(app.store.bytes(src).as_deref(), Some(original.as_slice()));
        }

        let refs = app.repo.asset_names(article.id).await;
        assert_eq!(refs.len(), 3);
        assert_eq!(refs, app.store.names());
        assert!(app.take_deletions().is_empty());
    }

    #[tokio::test]
    async fn content_outside_images_is_untouched() {
        let app = TestPublisher::new();
        let content = format!(
            "<h1 class=\"x\">Title &amp; more</h1>\n<!-- note -->\n{}\n<p>tail</p>",
            inline_img(&png(1, 1, b""))
        );

        let article = app.workflow.create(input(content)).await.unwrap();
        let name = img_sources(&article.content).remove(0);

        assert_eq!(
            article.content,
            format!(
                "<h1 class=\"x\">Title &amp; more</h1>\n<!-- note -->\n<img src=\"{name}\">\n<p>tail</p>"
            )
        );
    }

    #[tokio::test]
    async fn article_without_images_stores_nothing() {
        let app = TestPublisher::new();

        let article = app
            .workflow
            .create(input("<p>No pictures here.</p>"))
            .await
            .unwrap();

        assert_eq!(article.content, "<p>No pictures here.</p>");
        assert_eq!(app.store.store_calls(), 0);
        assert!(app.repo.asset_names(article.id).await.is_empty());
    }

    #[tokio::test]
    async fn external_sources_are_kept_but_not_registered() {
        let app = TestPublisher::new();
        let content = r#"<img src="https://cdn.example.org/chart.png">"#;

        let article = app.workflow.create(input(content)).await.unwrap();

        assert_eq!(article.content, content);
        assert!(app.repo.asset_names(article.id).await.is_empty());
    }

    #[tokio::test]
    async fn undecodable_image_is_blanked() {
        let app = TestPublisher::new();
        let good = png(2, 2, b"ok");
        let content = format!(
            "{}<img src=\"data:image/png;base64,@@@@\">{}",
            inline_img(&good),
            inline_img(b"not an image at all")
        );

        let article = app.workflow.create(input(content)).await.unwrap();
        let sources = img_sources(&article.content);

        assert_eq!(sources.len(), 3);
        assert_eq!(app.store.bytes(&sources[0]), Some(good));
        assert_eq!(sources[1], "");
        assert_eq!(sources[2], "");
        assert_eq!(app.repo.asset_names(article.id).await.len(), 1);
    }

    #[tokio::test]
    async fn src_mentioned_in_another_attribute_is_not_the_source() {
        let mut app = TestPublisher::new();
        let image = png(2, 2, b"real");
        let content = format!(
            "<img title=\"tip: set src=photo.png\" alt='src=\"x\"' src=\"data:image/png;base64,{}\">",
            STANDARD.encode(&image)
        );

        let article = app.workflow.create(input(content)).await.unwrap();

        assert!(!article.content.contains("data:"));
        let names = app.store.names();
        assert_eq!(names.len(), 1);
        let name = names.first().unwrap();
        assert_eq!(
            article.content,
            format!("<img title=\"tip: set src=photo.png\" alt='src=\"x\"' src=\"{name}\">")
        );
        assert_eq!(app.store.bytes(name), Some(image));
        assert_eq!(app.repo.asset_names(article.id).await, names);
        assert!(app.take_deletions().is_empty());
    }

    #[tokio::test]
    async fn image_with_valid_header_but_corrupt_body_is_blanked() {
        let app = TestPublisher::new();
        let mut corrupt = png(4, 4, b"ok");
        // Keep the signature and IHDR chunk, replace everything after.
        corrupt.truncate(33);
        corrupt.extend_from_slice(b"garbage where the pixel data should be");

        let article = app
            .workflow
            .create(input(format!("<p>x</p>{}", inline_img(&corrupt))))
            .await
            .unwrap();

        assert_eq!(article.content, "<p>x</p><img src=\"\">");
        assert_eq!(app.store.store_calls(), 1);
        assert!(app.store.names().is_empty());
        assert!(app.repo.asset_names(article.id).await.is_empty());
    }

    #[tokio::test]
    async fn banner_is_stored_and_named() {
        let app = TestPublisher::new();
        let mut req = input("<p>body</p>");
        req.banner = Some(banner(b"cover"));

        let article = app.workflow.create(req).await.unwrap();

        let name = article.banner.expect("banner name");
        assert!(name.ends_with(".png"));
        assert!(app.store.bytes(&name).is_some());
    }
}

mod rejected {
    use super::*;

    #[tokio::test]
    async fn invalid_input_stores_nothing() {
        let app = TestPublisher::new();
        let mut req = input(inline_img(&png(1, 1, b"")));
        req.title = "   ".into();

        let err = app.workflow.create(req).await.unwrap_err();

        assert!(matches!(err, PublishError::Validation(_)));
        assert_eq!(err.reason(), RollbackReason::BadRequest);
        assert_eq!(app.store.store_calls(), 0);
        assert_eq!(app.repo.article_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_organization_is_not_found() {
        let app = TestPublisher::new();
        let mut req = input(inline_img(&png(1, 1, b"")));
        req.organization_id = 999;

        let err = app.workflow.create(req).await.unwrap_err();

        assert_eq!(err.reason(), RollbackReason::NotFound);
        assert_eq!(app.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn banner_with_wrong_dimensions_is_rejected() {
        let app = TestPublisher::new();
        let mut req = input("<p>body</p>");
        req.organization_id = OTHER_ORG;
        req.banner = Some(publisher::models::BannerUpload {
            filename: "cover.png".into(),
            bytes: png(800, 600, b""),
        });

        let err = app.workflow.create(req).await.unwrap_err();

        assert!(matches!(err, PublishError::Validation(_)));
        assert!(app.store.names().is_empty());
    }
}
