use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};

use crate::{
    config::CloudinaryConfig,
    errors::{AppError, Result},
    storage::{Storage, StoredObject},
    utils::{crypto::sign_params, file::get_file_extension},
};

#[derive(Debug, Deserialize)]
struct UploadResult {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResult {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Object store backed by the Cloudinary upload API.
pub struct CloudinaryStorage {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryStorage {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Storage(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            path
        )
    }

    fn signed_params(&self, mut params: BTreeMap<&'static str, String>) -> BTreeMap<&'static str, String> {
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        let signature = sign_params(
            &params,
            &self.config.api_secret,
            self.config.signature_algorithm,
        );
        params.insert("signature", signature);
        params.insert("api_key", self.config.api_key.clone());
        params
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => format!("{}: {}", status, body.error.message),
            Err(_) => status.to_string(),
        }
    }
}

#[async_trait]
impl Storage for CloudinaryStorage {
    async fn store(&self, data: Bytes, content_type: &str) -> Result<StoredObject> {
        let file_part = multipart::Part::bytes(data.to_vec())
            .file_name(format!("upload.{}", get_file_extension(content_type)))
            .mime_str(content_type)
            .map_err(|e| AppError::Storage(format!("Invalid content type: {}", e)))?;

        let mut form = multipart::Form::new().part("file", file_part);
        for (key, value) in self.signed_params(BTreeMap::new()) {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.endpoint("image/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Cloudinary upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "Cloudinary upload rejected: {}",
                Self::error_message(response).await
            )));
        }

        let result: UploadResult = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Unexpected Cloudinary response: {}", e)))?;

        tracing::debug!(public_id = %result.public_id, bytes = data.len(), "uploaded object to Cloudinary");

        Ok(StoredObject {
            url: result.secure_url,
            storage_id: result.public_id,
        })
    }

    async fn remove(&self, storage_id: &str) -> Result<()> {
        let mut params = BTreeMap::new();
        params.insert("public_id", storage_id.to_string());

        let response = self
            .client
            .post(self.endpoint("image/destroy"))
            .form(&self.signed_params(params))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Cloudinary destroy failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "Cloudinary destroy rejected: {}",
                Self::error_message(response).await
            )));
        }

        let result: DestroyResult = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Unexpected Cloudinary response: {}", e)))?;

        match result.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(AppError::Storage(format!(
                "Cloudinary destroy of {} returned '{}'",
                storage_id, other
            ))),
        }
    }

    async fn exists(&self, storage_id: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint(&format!("resources/image/upload/{}", storage_id)))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Cloudinary lookup failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(AppError::Storage(format!(
                "Cloudinary lookup rejected: {}",
                Self::error_message(response).await
            ))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignatureAlgorithm;
    use serde_json::json;
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn storage_for(server: &MockServer) -> CloudinaryStorage {
        CloudinaryStorage::new(CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key123".to_string(),
            api_secret: "secret".to_string(),
            signature_algorithm: SignatureAlgorithm::Sha1,
            api_base: server.uri(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_returns_url_and_public_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .and(body_string_contains("key123"))
            .and(body_string_contains("signature"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "abc123",
                "secure_url": "https://res.cloudinary.com/demo/image/upload/abc123.jpg",
                "bytes": 4
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stored = storage_for(&server)
            .store(Bytes::from_static(b"data"), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(stored.storage_id, "abc123");
        assert!(stored.url.ends_with("abc123.jpg"));
    }

    #[tokio::test]
    async fn test_upload_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Invalid Signature" }
            })))
            .mount(&server)
            .await;

        let err = storage_for(&server)
            .store(Bytes::from_static(b"data"), "image/png")
            .await
            .unwrap_err();

        match err {
            AppError::Storage(msg) => assert!(msg.contains("Invalid Signature")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_destroy_not_found_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .and(body_string_contains("public_id=gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "not found" })))
            .mount(&server)
            .await;

        storage_for(&server).remove("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_exists_maps_404_to_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/demo/resources/image/upload/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/demo/resources/image/upload/present"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "public_id": "present" })))
            .mount(&server)
            .await;

        let storage = storage_for(&server);
        assert!(!storage.exists("missing").await.unwrap());
        assert!(storage.exists("present").await.unwrap());
    }
}
