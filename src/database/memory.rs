use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::{ImageStore, UserStore};
use crate::errors::{AppError, Result};
use crate::models::{AssetPair, ImageRecord, ImageStatus, User};

/// In-process store used for development and tests.
#[derive(Default)]
pub struct MemoryDatabase {
    users: RwLock<HashMap<String, User>>,
    images: RwLock<HashMap<Uuid, ImageRecord>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryDatabase {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let mut users = self.users.write().await;
        if users.contains_key(email) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        users.insert(email.to_string(), user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }
}

#[async_trait]
impl ImageStore for MemoryDatabase {
    async fn reserve(&self, user_id: Uuid) -> Result<ImageRecord> {
        let record = ImageRecord::pending(user_id, Utc::now());
        self.images.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn commit(&self, id: Uuid, assets: &AssetPair) -> Result<ImageRecord> {
        let mut images = self.images.write().await;
        let record = images
            .get_mut(&id)
            .filter(|r| r.status == ImageStatus::Pending)
            .ok_or(AppError::NotFound)?;

        record.status = ImageStatus::Committed;
        record.assets = Some(assets.clone());
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        Ok(self.images.read().await.get(&id).cloned())
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<ImageRecord>> {
        let mut records: Vec<ImageRecord> = self
            .images
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id && r.status == ImageStatus::Committed)
            .cloned()
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn tombstone(&self, id: Uuid) -> Result<bool> {
        let mut images = self.images.write().await;
        match images.get_mut(&id) {
            Some(record) if record.status == ImageStatus::Committed => {
                record.status = ImageStatus::Tombstoned;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge(&self, id: Uuid) -> Result<bool> {
        Ok(self.images.write().await.remove(&id).is_some())
    }

    async fn stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ImageRecord>> {
        let mut records: Vec<ImageRecord> = self
            .images
            .read()
            .await
            .values()
            .filter(|r| r.status != ImageStatus::Committed && r.updated_at < cutoff)
            .cloned()
            .collect();

        records.sort_by_key(|r| r.updated_at);
        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
