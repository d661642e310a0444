use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{future::Future, sync::Arc, time::Duration};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::models::{AssetPair, ImageRecord, User};
use crate::utils::timeout::{with_deadline, with_timeout};

pub mod memory;
pub mod queries;

pub use memory::MemoryDatabase;

/// Prefix of a `DATABASE_URL` that selects the in-process store.
pub const MEMORY_URL_SCHEME: &str = "memory://";

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Reserves a `Pending` record with no assets for `user_id`.
    async fn reserve(&self, user_id: Uuid) -> Result<ImageRecord>;

    /// Moves a `Pending` record to `Committed` and attaches both assets.
    /// Fails with `NotFound` if the record is missing or no longer pending.
    async fn commit(&self, id: Uuid, assets: &AssetPair) -> Result<ImageRecord>;

    async fn find_image(&self, id: Uuid) -> Result<Option<ImageRecord>>;

    /// Committed records of one owner, newest first.
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<ImageRecord>>;

    /// Returns `false` when the record is not currently committed.
    async fn tombstone(&self, id: Uuid) -> Result<bool>;

    async fn purge(&self, id: Uuid) -> Result<bool>;

    /// Pending and tombstoned records last touched before `cutoff`.
    async fn stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ImageRecord>>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    timeout: Duration,
}

impl Database {
    pub async fn new(database_url: &str, timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;

        Ok(Self { pool, timeout })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.into()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs one query under the database timeout policy.
    async fn timed<T, F, Fut>(&self, operation: &str, mut make: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        with_timeout(operation, self.timeout, || {
            let query = make();
            async move { query.await.map_err(AppError::from) }
        })
        .await
    }

    /// Runs one query under the database timeout without retrying, for
    /// inserts whose first attempt may have committed.
    async fn timed_once<T, Fut>(&self, operation: &str, query: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        with_deadline(operation, self.timeout, async move { query.await.map_err(AppError::from) }).await
    }
}

/// Both halves of the persistence layer, possibly backed by one store.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub images: Arc<dyn ImageStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let db = Arc::new(MemoryDatabase::new());
        Self {
            users: db.clone(),
            images: db,
        }
    }
}

/// Opens the store named by `DATABASE_URL`, running migrations for Postgres.
pub async fn connect(config: &Config) -> Result<Stores> {
    if config.database_url.starts_with(MEMORY_URL_SCHEME) {
        tracing::warn!("using the in-memory store; data is lost on restart");
        return Ok(Stores::in_memory());
    }

    let db = Database::new(&config.database_url, config.timeouts.database).await?;
    db.migrate().await?;
    tracing::info!("database migrations applied");

    let db = Arc::new(db);
    Ok(Stores {
        users: db.clone(),
        images: db,
    })
}
