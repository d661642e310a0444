use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use bytes::Bytes;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{AssetPair, ImageRecordResponse, ImageStatus, StoredAsset, TransformParams, UploadResponse},
    services::ImageProcessor,
    storage::{remove_all, store_with_timeout, StoredObject},
    utils::file::detect_content_type,
};

/// Multipart field carrying the image bytes.
pub const IMAGE_FIELD: &str = "image";

struct UploadForm {
    image: Bytes,
    fields: HashMap<String, String>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge
    } else {
        AppError::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

async fn read_upload_form(multipart: &mut Multipart, max_file_size: usize) -> Result<UploadForm> {
    let mut image = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == IMAGE_FIELD {
            let data = field.bytes().await.map_err(multipart_error)?;
            if data.len() > max_file_size {
                return Err(AppError::FileTooLarge);
            }
            image = Some(data);
        } else if !name.is_empty() {
            let value = field.text().await.map_err(multipart_error)?;
            fields.insert(name, value);
        }
    }

    let image = image
        .filter(|data| !data.is_empty())
        .ok_or_else(|| AppError::Validation("No image provided".to_string()))?;

    Ok(UploadForm { image, fields })
}

fn asset(object: StoredObject, size: i64) -> StoredAsset {
    StoredAsset {
        url: object.url,
        storage_id: object.storage_id,
        size,
    }
}

/// Transforms the upload and stores both versions.
///
/// If only one of the two uploads succeeds, that object is removed again
/// before the error is returned.
async fn transform_and_store(state: &AppState, original: Bytes, params: TransformParams) -> Result<AssetPair> {
    let compressed =
        ImageProcessor::transform_with_timeout(original.clone(), params, state.config.timeouts.transform).await?;

    let original_size = original.len() as i64;
    let compressed_size = compressed.size();
    let original_type = detect_content_type(&original);
    let limit = state.config.timeouts.storage;

    let (stored_original, stored_compressed) = tokio::join!(
        store_with_timeout(state.storage.as_ref(), original, original_type, limit),
        store_with_timeout(state.storage.as_ref(), compressed.data, compressed.format.content_type(), limit),
    );

    match (stored_original, stored_compressed) {
        (Ok(o), Ok(c)) => Ok(AssetPair {
            original: asset(o, original_size),
            compressed: asset(c, compressed_size),
        }),
        (Ok(stored), Err(e)) | (Err(e), Ok(stored)) => {
            let _ = remove_all(state.storage.as_ref(), &[stored.storage_id.as_str()], limit).await;
            Err(e)
        }
        (Err(e), Err(_)) => Err(e),
    }
}

pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let form = read_upload_form(&mut multipart, state.config.max_file_size).await?;
    let params = TransformParams::from_fields(&form.fields, state.config.max_image_dimension)?;

    let record = state.images.reserve(user.id).await?;

    let committed = match transform_and_store(&state, form.image, params).await {
        Ok(assets) => match state.images.commit(record.id, &assets).await {
            Ok(committed) => committed,
            Err(e) => {
                let _ = remove_all(state.storage.as_ref(), &assets.storage_ids(), state.config.timeouts.storage).await;
                discard_pending(&state, record.id).await;
                return Err(e);
            }
        },
        Err(e) => {
            discard_pending(&state, record.id).await;
            return Err(e);
        }
    };

    let assets = committed
        .assets
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("committed image {} has no assets", committed.id)))?;

    state.metrics.record_upload(assets.original.size, assets.compressed.size);
    tracing::info!(
        image_id = %committed.id,
        user_id = %user.id,
        original_size = assets.original.size,
        compressed_size = assets.compressed.size,
        "image uploaded"
    );

    Ok(Json(UploadResponse {
        image_id: committed.id,
        original: assets.original.url,
        compressed: assets.compressed.url,
        original_size: assets.original.size,
        compressed_size: assets.compressed.size,
    }))
}

async fn discard_pending(state: &AppState, id: Uuid) {
    if let Err(e) = state.images.purge(id).await {
        tracing::warn!(image_id = %id, error = %e, "could not discard pending image; reconciler will reap it");
    }
}

pub async fn get_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ImageRecordResponse>>> {
    let records = state.images.list_by_owner(user.id).await?;

    Ok(Json(
        records.iter().filter_map(ImageRecordResponse::from_record).collect(),
    ))
}

pub async fn delete_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound)?;

    let record = state
        .images
        .find_image(id)
        .await?
        .filter(|record| record.status == ImageStatus::Committed)
        .ok_or(AppError::NotFound)?;

    record.ensure_owned_by(user.id)?;

    // a concurrent delete may have won the race
    if !state.images.tombstone(id).await? {
        return Err(AppError::NotFound);
    }
    state.metrics.record_delete();

    if let Some(assets) = &record.assets {
        match remove_all(state.storage.as_ref(), &assets.storage_ids(), state.config.timeouts.storage).await {
            Ok(()) => {
                if let Err(e) = state.images.purge(id).await {
                    tracing::warn!(image_id = %id, error = %e, "assets removed but row purge failed");
                }
            }
            Err(e) => {
                tracing::warn!(image_id = %id, error = %e, "asset removal failed; left tombstoned");
            }
        }
    }

    tracing::info!(image_id = %id, user_id = %user.id, "image deleted");

    Ok(Json(json!({ "message": "Image deleted successfully" })))
}
