use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::{AppError, Result};

/// Lifecycle of an image record.
///
/// A record is reserved as `Pending` before any remote upload happens,
/// becomes `Committed` once both assets are stored, and is `Tombstoned`
/// when its owner deletes it but remote cleanup has not been confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "image_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Committed,
    Tombstoned,
}

/// One object held by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub url: String,
    pub storage_id: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPair {
    pub original: StoredAsset,
    pub compressed: StoredAsset,
}

impl AssetPair {
    pub fn storage_ids(&self) -> [&str; 2] {
        [&self.original.storage_id, &self.compressed.storage_id]
    }
}

#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: ImageStatus,
    pub assets: Option<AssetPair>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn pending(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: ImageStatus::Pending,
            assets: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Authorization guard for mutations: only the owner may touch a record.
    pub fn ensure_owned_by(&self, user_id: Uuid) -> Result<()> {
        if self.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }
}

/// Flat row as stored in the `images` table.
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: ImageStatus,
    pub original_url: Option<String>,
    pub original_storage_id: Option<String>,
    pub original_size: Option<i64>,
    pub compressed_url: Option<String>,
    pub compressed_storage_id: Option<String>,
    pub compressed_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = AppError;

    fn try_from(row: ImageRow) -> Result<Self> {
        let assets = match (
            row.original_url,
            row.original_storage_id,
            row.original_size,
            row.compressed_url,
            row.compressed_storage_id,
            row.compressed_size,
        ) {
            (Some(ou), Some(oid), Some(osz), Some(cu), Some(cid), Some(csz)) => Some(AssetPair {
                original: StoredAsset { url: ou, storage_id: oid, size: osz },
                compressed: StoredAsset { url: cu, storage_id: cid, size: csz },
            }),
            (None, None, None, None, None, None) => None,
            _ => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "image {} has a partially populated asset pair",
                    row.id
                )))
            }
        };

        Ok(ImageRecord {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            assets,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// History entry returned to clients. Only committed records are listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecordResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_url: String,
    pub compressed_url: String,
    pub original_storage_id: String,
    pub compressed_storage_id: String,
    pub original_size: i64,
    pub compressed_size: i64,
    pub created_at: DateTime<Utc>,
}

impl ImageRecordResponse {
    pub fn from_record(record: &ImageRecord) -> Option<Self> {
        let assets = record.assets.as_ref()?;
        if record.status != ImageStatus::Committed {
            return None;
        }

        Some(Self {
            id: record.id,
            user_id: record.user_id,
            original_url: assets.original.url.clone(),
            compressed_url: assets.compressed.url.clone(),
            original_storage_id: assets.original.storage_id.clone(),
            compressed_storage_id: assets.compressed.storage_id.clone(),
            original_size: assets.original.size,
            compressed_size: assets.compressed.size,
            created_at: record.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_id: Uuid,
    pub original: String,
    pub compressed: String,
    pub original_size: i64,
    pub compressed_size: i64,
}
