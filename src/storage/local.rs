use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{
    errors::{AppError, Result},
    storage::{Storage, StoredObject},
    utils::file::{generate_storage_key, is_safe_storage_key},
};

/// Route under which the API serves locally stored objects.
pub const FILES_ROUTE: &str = "/files";

pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(base_path: P, public_base_url: &str) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .map_err(|e| AppError::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_full_path(&self, storage_id: &str) -> Result<PathBuf> {
        if !is_safe_storage_key(storage_id) {
            return Err(AppError::Storage(format!("Invalid storage id: {}", storage_id)));
        }
        Ok(self.base_path.join(storage_id))
    }

    fn public_url(&self, storage_id: &str) -> String {
        format!("{}{}/{}", self.public_base_url, FILES_ROUTE, storage_id)
    }

    pub async fn retrieve_bytes(&self, storage_id: &str) -> Result<Vec<u8>> {
        let full_path = self.get_full_path(storage_id)?;

        fs::read(&full_path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read file: {}", e)))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store(&self, data: Bytes, content_type: &str) -> Result<StoredObject> {
        let storage_id = generate_storage_key(content_type);
        let full_path = self.get_full_path(&storage_id)?;

        fs::write(&full_path, &data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {}", e)))?;

        tracing::debug!(storage_id, bytes = data.len(), "stored object on local disk");

        Ok(StoredObject {
            url: self.public_url(&storage_id),
            storage_id,
        })
    }

    async fn remove(&self, storage_id: &str) -> Result<()> {
        let full_path = self.get_full_path(storage_id)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {}", e))),
        }
    }

    async fn exists(&self, storage_id: &str) -> Result<bool> {
        let full_path = self.get_full_path(storage_id)?;

        fs::try_exists(&full_path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat file: {}", e)))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
