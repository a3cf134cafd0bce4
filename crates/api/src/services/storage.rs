//! Screenshot object storage backends.
//!
//! - [`LocalObjectStore`] writes under `{root}/{bucket}/` and is served by the
//!   app itself under `/files`.
//! - [`HttpObjectStore`] talks to a Supabase-compatible storage REST API.

use async_trait::async_trait;
use domain::store::{ObjectStore, StorageError};
use serde_json::json;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;

/// Object names are flat: no separators, no traversal.
fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(format!("invalid object name {:?}", name));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    pub async fn new(
        root: impl Into<PathBuf>,
        bucket: &str,
        public_base_url: &str,
    ) -> std::io::Result<Self> {
        let dir = root.into().join(bucket);
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            base_url: format!("{}/{}", public_base_url.trim_end_matches('/'), bucket),
        })
    }

    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        name: &str,
        _content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let upload_error = |reason: String| StorageError::Upload {
            name: name.to_string(),
            reason,
        };
        check_name(name).map_err(upload_error)?;

        let path = self.dir.join(name);
        let size = bytes.len();
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| upload_error(format!("create {}: {}", path.display(), e)))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| upload_error(format!("write {}: {}", path.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| upload_error(format!("sync {}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), size_bytes = size, "Screenshot stored");
        Ok(self.public_url(name))
    }

    async fn delete(&self, names: &[String]) -> Result<(), StorageError> {
        for name in names {
            check_name(name).map_err(StorageError::Delete)?;
            match fs::remove_file(self.dir.join(name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Delete(format!("{}: {}", name, e))),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    service_key: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str, service_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key: service_key.to_string(),
        }
    }

    pub fn public_url(&self, name: &str) -> String {
        format!("{}/object/public/{}/{}", self.endpoint, self.bucket, name)
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/object/{}/{}", self.endpoint, self.bucket, name)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let upload_error = |reason: String| StorageError::Upload {
            name: name.to_string(),
            reason,
        };
        check_name(name).map_err(upload_error)?;

        let response = self
            .client
            .post(self.object_url(name))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_error(format!("{}: {}", status, body)));
        }
        Ok(self.public_url(name))
    }

    async fn delete(&self, names: &[String]) -> Result<(), StorageError> {
        if names.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .delete(format!("{}/object/{}", self.endpoint, self.bucket))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&json!({ "prefixes": names }))
            .send()
            .await
            .map_err(|e| StorageError::Delete(e.to_string()))?;

        let status = response.status();
        // Removing absent objects succeeds with an empty list.
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Delete(format!("{}: {}", status, body)))
    }
}

/// Builds the configured backend.
pub async fn build_object_store(
    config: &StorageConfig,
) -> std::io::Result<std::sync::Arc<dyn ObjectStore>> {
    Ok(match config.provider.as_str() {
        "http" => std::sync::Arc::new(HttpObjectStore::new(
            &config.endpoint,
            &config.bucket,
            &config.service_key,
        )),
        _ => std::sync::Arc::new(
            LocalObjectStore::new(&config.local_root, &config.bucket, &config.public_base_url)
                .await?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::store::object_name_from_url;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("clan-recruit-test-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_local_upload_then_delete() {
        let root = temp_root();
        let store = LocalObjectStore::new(&root, "shots", "http://localhost:8080/files/")
            .await
            .unwrap();

        let url = store
            .upload("123_profile_screenshot_1.png", Some("image/png"), vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/files/shots/123_profile_screenshot_1.png");
        assert!(root.join("shots/123_profile_screenshot_1.png").exists());

        let name = object_name_from_url(&url).unwrap();
        store.delete(&[name.clone()]).await.unwrap();
        assert!(!root.join("shots").join(&name).exists());

        // Deleting again is tolerated.
        store.delete(&[name]).await.unwrap();
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_local_rejects_traversal() {
        let root = temp_root();
        let store = LocalObjectStore::new(&root, "shots", "http://x").await.unwrap();

        let result = store.upload("../escape.png", None, vec![1]).await;
        assert!(matches!(result, Err(StorageError::Upload { .. })));
        assert!(store.delete(&["a/b.png".to_string()]).await.is_err());
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_http_public_url_round_trips_name() {
        let store = HttpObjectStore::new(
            "https://xyz.supabase.co/storage/v1/",
            "application-screenshots",
            "key",
        );
        let url = store.public_url("9_fb_like_screenshot_5.jpg");
        assert_eq!(
            url,
            "https://xyz.supabase.co/storage/v1/object/public/application-screenshots/9_fb_like_screenshot_5.jpg"
        );
        assert_eq!(
            object_name_from_url(&url).as_deref(),
            Some("9_fb_like_screenshot_5.jpg")
        );
    }

    #[tokio::test]
    async fn test_http_delete_of_nothing_skips_request() {
        let store = HttpObjectStore::new("http://127.0.0.1:9", "bucket", "key");
        assert!(store.delete(&[]).await.is_ok());
    }
}
