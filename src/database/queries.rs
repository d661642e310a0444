use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::{Database, ImageStore, UserStore};
use crate::errors::{AppError, Result};
use crate::models::{AssetPair, ImageRecord, ImageRow, ImageStatus, User};

const IMAGE_COLUMNS: &str = "id, user_id, status, \
    original_url, original_storage_id, original_size, \
    compressed_url, compressed_storage_id, compressed_size, \
    created_at, updated_at";

fn into_records(rows: Vec<ImageRow>) -> Result<Vec<ImageRecord>> {
    rows.into_iter().map(ImageRecord::try_from).collect()
}

#[async_trait]
impl UserStore for Database {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let id = Uuid::new_v4();

        self.timed_once(
            "users.create",
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (id, email, password_hash)
                VALUES ($1, $2, $3)
                RETURNING id, email, password_hash, created_at
                "#,
            )
            .bind(id)
            .bind(email)
            .bind(password_hash)
            .fetch_one(self.pool()),
        )
        .await
        .map_err(|e| match e {
            AppError::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                AppError::Conflict("User already exists".to_string())
            }
            other => other,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.timed("users.find_by_email", || {
            sqlx::query_as::<_, User>(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
            )
            .bind(email)
            .fetch_optional(self.pool())
        })
        .await
    }
}

#[async_trait]
impl ImageStore for Database {
    async fn reserve(&self, user_id: Uuid) -> Result<ImageRecord> {
        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO images (id, user_id, status) VALUES ($1, $2, $3) RETURNING {}",
            IMAGE_COLUMNS
        );

        let row = self
            .timed_once(
                "images.reserve",
                sqlx::query_as::<_, ImageRow>(&sql)
                    .bind(id)
                    .bind(user_id)
                    .bind(ImageStatus::Pending)
                    .fetch_one(self.pool()),
            )
            .await?;

        row.try_into()
    }

    async fn commit(&self, id: Uuid, assets: &AssetPair) -> Result<ImageRecord> {
        let sql = format!(
            r#"
            UPDATE images
            SET status = $2,
                original_url = $3, original_storage_id = $4, original_size = $5,
                compressed_url = $6, compressed_storage_id = $7, compressed_size = $8,
                updated_at = NOW()
            WHERE id = $1 AND status = $9
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        );

        // not retried: a second attempt after a commit that landed finds no Pending row
        let row = self
            .timed_once(
                "images.commit",
                sqlx::query_as::<_, ImageRow>(&sql)
                    .bind(id)
                    .bind(ImageStatus::Committed)
                    .bind(&assets.original.url)
                    .bind(&assets.original.storage_id)
                    .bind(assets.original.size)
                    .bind(&assets.compressed.url)
                    .bind(&assets.compressed.storage_id)
                    .bind(assets.compressed.size)
                    .bind(ImageStatus::Pending)
                    .fetch_optional(self.pool()),
            )
            .await?
            .ok_or(AppError::NotFound)?;

        row.try_into()
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        let sql = format!("SELECT {} FROM images WHERE id = $1", IMAGE_COLUMNS);

        self.timed("images.find", || {
            sqlx::query_as::<_, ImageRow>(&sql)
                .bind(id)
                .fetch_optional(self.pool())
        })
        .await?
        .map(ImageRecord::try_from)
        .transpose()
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<ImageRecord>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM images
            WHERE user_id = $1 AND status = $2
            ORDER BY created_at DESC, id DESC
            "#,
            IMAGE_COLUMNS
        );

        let rows = self
            .timed("images.list_by_owner", || {
                sqlx::query_as::<_, ImageRow>(&sql)
                    .bind(user_id)
                    .bind(ImageStatus::Committed)
                    .fetch_all(self.pool())
            })
            .await?;

        into_records(rows)
    }

    async fn tombstone(&self, id: Uuid) -> Result<bool> {
        let result = self
            .timed_once(
                "images.tombstone",
                sqlx::query("UPDATE images SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3")
                    .bind(id)
                    .bind(ImageStatus::Tombstoned)
                    .bind(ImageStatus::Committed)
                    .execute(self.pool()),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn purge(&self, id: Uuid) -> Result<bool> {
        let result = self
            .timed("images.purge", || {
                sqlx::query("DELETE FROM images WHERE id = $1")
                    .bind(id)
                    .execute(self.pool())
            })
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ImageRecord>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM images
            WHERE status IN ('pending', 'tombstoned') AND updated_at < $1
            ORDER BY updated_at
            "#,
            IMAGE_COLUMNS
        );

        let rows = self
            .timed("images.stale", || {
                sqlx::query_as::<_, ImageRow>(&sql)
                    .bind(cutoff)
                    .fetch_all(self.pool())
            })
            .await?;

        into_records(rows)
    }

    async fn ping(&self) -> Result<()> {
        self.timed("db.ping", || sqlx::query("SELECT 1").execute(self.pool()))
            .await?;
        Ok(())
    }
}
