use std::collections::BTreeSet;

use crate::common::{ORG, OTHER_ORG, TestPublisher, banner, img_sources, inline_img, input, png};
use publisher::deletion::DeletionReason;
use publisher::{PublishError, RollbackReason};

fn img(name: &str) -> String {
    format!(r#"<img src="{name}">"#)
}

mod reconcile {
    use super::*;

    #[tokio::test]
    async fn unchanged_content_deletes_nothing() {
        let mut app = TestPublisher::new();
        let created = app
            .workflow
            .create(input(inline_img(&png(1, 1, b"a"))))
            .await
            .unwrap();
        let before = app.repo.asset_names(created.id).await;

        let updated = app
            .workflow
            .update(created.id, input(created.content.clone()), None)
            .await
            .unwrap();

        assert_eq!(updated.content, created.content);
        assert_eq!(app.repo.asset_names(created.id).await, before);
        assert_eq!(app.store.store_calls(), 1);
        assert!(app.take_deletions().is_empty());
    }

    #[tokio::test]
    async fn dropped_image_is_deleted_after_commit() {
        let mut app = TestPublisher::new();
        let created = app
            .workflow
            .create(input(format!(
                "{}{}",
                inline_img(&png(1, 1, b"a")),
                inline_img(&png(1, 1, b"c"))
            )))
            .await
            .unwrap();
        let [a, c]: [String; 2] = img_sources(&created.content).try_into().unwrap();

        // Drop A, add B, keep C.
        let b_bytes = png(1, 1, b"b");
        let updated = app
            .workflow
            .update(
                created.id,
                input(format!("{}{}", inline_img(&b_bytes), img(&c))),
                None,
            )
            .await
            .unwrap();

        let b = img_sources(&updated.content).remove(0);
        assert_eq!(app.store.bytes(&b), Some(b_bytes));
        assert_eq!(
            app.repo.asset_names(created.id).await,
            BTreeSet::from([b.clone(), c.clone()])
        );

        let deletions = app.take_deletions();
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0].name.as_str(), a);
        assert_eq!(deletions[0].reason, DeletionReason::Orphaned);
    }

    #[tokio::test]
    async fn foreign_names_are_not_adopted() {
        let mut app = TestPublisher::new();
        let first = app
            .workflow
            .create(input(inline_img(&png(1, 1, b"first"))))
            .await
            .unwrap();
        let second = app
            .workflow
            .create(input("<p>second</p>"))
            .await
            .unwrap();
        let stolen = img_sources(&first.content).remove(0);

        app.workflow
            .update(second.id, input(img(&stolen)), None)
            .await
            .unwrap();

        assert!(app.repo.asset_names(second.id).await.is_empty());
        assert_eq!(
            app.repo.asset_names(first.id).await,
            BTreeSet::from([stolen])
        );
        assert!(app.take_deletions().is_empty());
    }

    #[tokio::test]
    async fn replaced_banner_is_deleted_after_commit() {
        let mut app = TestPublisher::new();
        let mut req = input("<p>body</p>");
        req.banner = Some(banner(b"old"));
        let created = app.workflow.create(req).await.unwrap();
        let old = created.banner.clone().unwrap();

        let mut req = input("<p>body</p>");
        req.banner = Some(banner(b"new"));
        let updated = app.workflow.update(created.id, req, None).await.unwrap();

        let new = updated.banner.unwrap();
        assert_ne!(new, old);
        let deletions = app.take_deletions();
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0].name.as_str(), old);
        assert_eq!(deletions[0].reason, DeletionReason::BannerReplaced);
    }

    #[tokio::test]
    async fn update_without_banner_keeps_existing_one() {
        let app = TestPublisher::new();
        let mut req = input("<p>body</p>");
        req.banner = Some(banner(b"keep"));
        let created = app.workflow.create(req).await.unwrap();

        let updated = app
            .workflow
            .update(created.id, input("<p>edited</p>"), None)
            .await
            .unwrap();

        assert_eq!(updated.banner, created.banner);
        assert_eq!(updated.content, "<p>edited</p>");
    }
}

mod scope {
    use super::*;

    #[tokio::test]
    async fn update_outside_scope_is_not_found() {
        let app = TestPublisher::new();
        let created = app.workflow.create(input("<p>x</p>")).await.unwrap();

        let mut req = input("<p>y</p>");
        req.organization_id = OTHER_ORG;
        let err = app
            .workflow
            .update(created.id, req, Some(OTHER_ORG))
            .await
            .unwrap_err();

        assert_eq!(err.reason(), RollbackReason::NotFound);
        assert_eq!(app.workflow.get(created.id).await.unwrap().content, "<p>x</p>");
    }

    #[tokio::test]
    async fn missing_article_stores_nothing() {
        let mut app = TestPublisher::new();

        let err = app
            .workflow
            .update(42, input(inline_img(&png(1, 1, b""))), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::NotFound(_)));
        assert_eq!(app.store.store_calls(), 0);
        assert!(app.take_deletions().is_empty());
    }

    #[tokio::test]
    async fn delete_outside_scope_is_not_found() {
        let app = TestPublisher::new();
        let created = app.workflow.create(input("<p>x</p>")).await.unwrap();

        let err = app
            .workflow
            .delete(created.id, Some(OTHER_ORG))
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::NotFound(_)));
        assert_eq!(app.repo.article_count().await, 1);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn schedules_every_asset_and_banner() {
        let mut app = TestPublisher::new();
        let mut req = input(format!(
            "{}{}",
            inline_img(&png(1, 1, b"a")),
            inline_img(&png(1, 1, b"b"))
        ));
        req.banner = Some(banner(b"cover"));
        let created = app.workflow.create(req).await.unwrap();

        app.workflow.delete(created.id, Some(ORG)).await.unwrap();

        let deletions = app.take_deletions();
        assert_eq!(deletions.len(), 3);
        assert!(
            deletions
                .iter()
                .all(|d| d.reason == DeletionReason::ArticleRemoved)
        );
        let names: BTreeSet<String> = deletions.iter().map(|d| d.name.to_string()).collect();
        assert_eq!(names, app.store.names());

        assert_eq!(app.repo.article_count().await, 0);
        assert!(matches!(
            app.workflow.get(created.id).await,
            Err(PublishError::NotFound(_))
        ));
    }
}

mod read {
    use super::*;

    #[tokio::test]
    async fn list_is_newest_first_and_filterable() {
        let app = TestPublisher::new();
        let first = app.workflow.create(input("<p>1</p>")).await.unwrap();
        let mut req = input("<p>2</p>");
        req.organization_id = OTHER_ORG;
        let second = app.workflow.create(req).await.unwrap();
        let third = app.workflow.create(input("<p>3</p>")).await.unwrap();

        let all: Vec<i32> = app
            .workflow
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(all, vec![third.id, second.id, first.id]);

        let mine: Vec<i32> = app
            .workflow
            .list(Some(ORG))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(mine, vec![third.id, first.id]);
    }

    #[tokio::test]
    async fn get_returns_normalized_fields() {
        let app = TestPublisher::new();
        let mut req = input("<p>x</p>");
        req.title = "  Seasonal \n flu ".into();
        let created = app.workflow.create(req).await.unwrap();

        let fetched = app.workflow.get(created.id).await.unwrap();
        assert_eq!(fetched.title, "Seasonal flu");
        assert_eq!(fetched, created);
    }
}
