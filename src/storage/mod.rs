use async_trait::async_trait;
use bytes::Bytes;
use std::{sync::Arc, time::Duration};

use crate::{
    config::{StorageConfig, StorageType},
    errors::{AppError, Result},
    utils::timeout::{with_deadline, with_timeout},
};

pub mod cloudinary;
pub mod local;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Publicly resolvable URL of the object.
    pub url: String,
    /// Opaque id used to delete the object later.
    pub storage_id: String,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn store(&self, data: Bytes, content_type: &str) -> Result<StoredObject>;

    /// Deleting an id that is already gone succeeds.
    async fn remove(&self, storage_id: &str) -> Result<()>;

    async fn exists(&self, storage_id: &str) -> Result<bool>;

    fn backend_name(&self) -> &'static str;
}

pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.storage_type {
        StorageType::Local => {
            let storage = local::LocalStorage::new(&config.local_path, &config.public_base_url)?;
            Ok(Arc::new(storage))
        }
        StorageType::Cloudinary => {
            let cloudinary_config = config.cloudinary.clone().ok_or_else(|| {
                AppError::Storage("Cloudinary storage selected but not configured".to_string())
            })?;
            let storage = cloudinary::CloudinaryStorage::new(cloudinary_config)?;
            Ok(Arc::new(storage))
        }
    }
}

/// Stores `data` under the storage timeout. Never retried: an abandoned
/// store can still land and nothing would reference the object.
pub async fn store_with_timeout(
    storage: &dyn Storage,
    data: Bytes,
    content_type: &str,
    limit: Duration,
) -> Result<StoredObject> {
    with_deadline("storage.store", limit, storage.store(data, content_type)).await
}

/// Removes every id, attempting all of them even if some fail.
/// Returns the first error encountered.
pub async fn remove_all(storage: &dyn Storage, storage_ids: &[&str], limit: Duration) -> Result<()> {
    let mut first_error = None;

    for storage_id in storage_ids {
        if let Err(e) = with_timeout("storage.remove", limit, || storage.remove(storage_id)).await {
            tracing::warn!(storage_id, error = %e, "failed to remove stored object");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
