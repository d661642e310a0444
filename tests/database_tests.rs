//! Store contract tests. They always run against the in-memory store and
//! also against Postgres when `TEST_DATABASE_URL` is set.

use chrono::Utc;
use impressio::{
    database::{Database, Stores},
    errors::AppError,
    models::{AssetPair, ImageStatus, StoredAsset},
};
use std::{env, sync::Arc, time::Duration};
use uuid::Uuid;

async fn stores_under_test() -> Vec<(&'static str, Stores)> {
    let mut stores = vec![("memory", Stores::in_memory())];

    if let Ok(url) = env::var("TEST_DATABASE_URL") {
        let db = Database::new(&url, Duration::from_secs(5))
            .await
            .expect("Failed to connect to test database");
        db.migrate().await.expect("Failed to run migrations");

        let db = Arc::new(db);
        stores.push(("postgres", Stores { users: db.clone(), images: db }));
    }

    stores
}

fn unique_email() -> String {
    format!("user_{}@example.com", Uuid::new_v4().simple())
}

fn assets(tag: &str) -> AssetPair {
    AssetPair {
        original: StoredAsset {
            url: format!("https://cdn.example/{}-o", tag),
            storage_id: format!("{}-o", tag),
            size: 2048,
        },
        compressed: StoredAsset {
            url: format!("https://cdn.example/{}-c", tag),
            storage_id: format!("{}-c", tag),
            size: 512,
        },
    }
}

#[tokio::test]
async fn test_create_and_find_user() {
    for (name, stores) in stores_under_test().await {
        let email = unique_email();
        let created = stores.users.create_user(&email, "hashed_password").await.unwrap();
        assert_eq!(created.email, email, "{}", name);

        let found = stores.users.find_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.id, created.id, "{}", name);
        assert_eq!(found.password_hash, "hashed_password", "{}", name);

        assert!(stores.users.find_by_email(&unique_email()).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    for (name, stores) in stores_under_test().await {
        let email = unique_email();
        stores.users.create_user(&email, "h1").await.unwrap();

        let err = stores.users.create_user(&email, "h2").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{}: {:?}", name, err);
    }
}

#[tokio::test]
async fn test_image_lifecycle() {
    for (name, stores) in stores_under_test().await {
        let user = stores.users.create_user(&unique_email(), "h").await.unwrap();

        let pending = stores.images.reserve(user.id).await.unwrap();
        assert_eq!(pending.status, ImageStatus::Pending, "{}", name);
        assert!(stores.images.list_by_owner(user.id).await.unwrap().is_empty());

        let pair = assets(&pending.id.to_string());
        let committed = stores.images.commit(pending.id, &pair).await.unwrap();
        assert_eq!(committed.status, ImageStatus::Committed, "{}", name);
        assert_eq!(committed.assets.as_ref(), Some(&pair), "{}", name);

        let listed = stores.images.list_by_owner(user.id).await.unwrap();
        assert_eq!(listed.len(), 1, "{}", name);

        assert!(stores.images.tombstone(pending.id).await.unwrap());
        let tombstoned = stores.images.find_image(pending.id).await.unwrap().unwrap();
        assert_eq!(tombstoned.status, ImageStatus::Tombstoned, "{}", name);
        assert!(stores.images.list_by_owner(user.id).await.unwrap().is_empty());

        assert!(stores.images.purge(pending.id).await.unwrap());
        assert!(stores.images.find_image(pending.id).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_commit_requires_pending() {
    for (name, stores) in stores_under_test().await {
        let user = stores.users.create_user(&unique_email(), "h").await.unwrap();

        let err = stores.images.commit(Uuid::new_v4(), &assets("x")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound), "{}", name);

        let record = stores.images.reserve(user.id).await.unwrap();
        stores.images.commit(record.id, &assets("a")).await.unwrap();
        let err = stores.images.commit(record.id, &assets("b")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound), "{}", name);
    }
}

#[tokio::test]
async fn test_history_order_and_isolation() {
    for (name, stores) in stores_under_test().await {
        let alice = stores.users.create_user(&unique_email(), "h").await.unwrap();
        let bob = stores.users.create_user(&unique_email(), "h").await.unwrap();

        let mut ids = Vec::new();
        for i in 0..3 {
            let record = stores.images.reserve(alice.id).await.unwrap();
            stores.images.commit(record.id, &assets(&format!("{}-{}", record.id, i))).await.unwrap();
            ids.push(record.id);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        ids.reverse();

        let listed: Vec<Uuid> = stores
            .images
            .list_by_owner(alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(listed, ids, "{}", name);
        assert!(stores.images.list_by_owner(bob.id).await.unwrap().is_empty(), "{}", name);
    }
}

#[tokio::test]
async fn test_stale_records() {
    for (name, stores) in stores_under_test().await {
        let user = stores.users.create_user(&unique_email(), "h").await.unwrap();

        let pending = stores.images.reserve(user.id).await.unwrap();
        let done = stores.images.reserve(user.id).await.unwrap();
        stores.images.commit(done.id, &assets(&done.id.to_string())).await.unwrap();

        let stale = stores
            .images
            .stale(Utc::now() + chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert!(stale.iter().any(|r| r.id == pending.id), "{}", name);
        assert!(stale.iter().all(|r| r.id != done.id), "{}", name);

        stores.images.purge(pending.id).await.unwrap();
    }
}

#[tokio::test]
async fn test_ping() {
    for (_, stores) in stores_under_test().await {
        stores.images.ping().await.unwrap();
    }
}
