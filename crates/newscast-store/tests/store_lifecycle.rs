//! End-to-end persistence of one production run against a file database.

use newscast_models::{ArticleDraft, ProductionStatus};
use newscast_store::Store;
use std::path::PathBuf;

#[tokio::test]
async fn test_claimed_articles_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("newscast.db");

    let production_id = {
        let store = Store::open(&db_path).unwrap();
        store.init_schema().await.unwrap();

        let drafts: Vec<_> = (0..4)
            .map(|i| ArticleDraft::new("wire", format!("Story {}", i), format!("https://n.example/{}", i)))
            .collect();
        store.articles().insert_drafts(&drafts).await.unwrap();

        let claimed = store.articles().claim_for_production(3).await.unwrap();
        let ids: Vec<_> = claimed.iter().map(|a| a.id).collect();
        let mut production = store.productions().create("Daily", &ids).await.unwrap();
        store.articles().attach_to_production(&ids, production.id).await.unwrap();

        production.start_processing().unwrap();
        production.complete(PathBuf::from("videos/production_1.mp4"), 42.5).unwrap();
        store.productions().save(&production).await.unwrap();
        production.id
    };

    let store = Store::open(&db_path).unwrap();
    store.init_schema().await.unwrap();

    assert_eq!(store.articles().count_unselected().await.unwrap(), 1);
    let production = store.productions().require(production_id).await.unwrap();
    assert_eq!(production.status, ProductionStatus::Completed);
    assert_eq!(production.article_ids.len(), 3);

    let articles = store.articles().get_many(&production.article_ids).await.unwrap();
    assert!(articles.iter().all(|a| a.used_in_production == Some(production_id)));
}
