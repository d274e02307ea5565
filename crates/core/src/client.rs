//! Blob storage client over the Blob service REST API

use crate::config::{validate_settings, StorageConfig, UploadSettings};
use crate::credential::{Credential, CredentialCache};
use crate::error::{Error, Result};
use crate::naming::{blob_name_from_path, blob_url, BlobHandle};
use crate::sas::{generate_account_sas, AccountSasConfig, SAS_VERSION};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::header::{CONTENT_TYPE, IF_NONE_MATCH};
use reqwest::{redirect, Client, Response, StatusCode};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Content types accepted as "is an image"
pub const IMAGE_CONTENT_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "application/octet-stream",
];

const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// Outcome category of a single upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadStatus {
    /// Uploaded and verified as an image
    Created,
    /// Blob name already taken, existing bytes left alone
    Conflict,
    /// Target container does not exist
    NotFound,
    /// Credential rejected
    Unauthorized,
    /// Uploaded, but never verified as an image after all re-uploads
    Unverified,
    /// Anything else
    Failed,
}

impl UploadStatus {
    /// HTTP-style status code
    pub fn code(&self) -> u16 {
        match self {
            UploadStatus::Created => 201,
            UploadStatus::Conflict => 409,
            UploadStatus::NotFound => 404,
            UploadStatus::Unauthorized => 401,
            UploadStatus::Unverified => 422,
            UploadStatus::Failed => 500,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UploadStatus::Created => "created",
            UploadStatus::Conflict => "conflict",
            UploadStatus::NotFound => "container not found",
            UploadStatus::Unauthorized => "unauthorized",
            UploadStatus::Unverified => "unverified",
            UploadStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.as_str())
    }
}

/// Status and, when one applies, the public URL of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub status: UploadStatus,
    pub url: Option<String>,
}

impl UploadResult {
    pub fn new(status: UploadStatus, url: Option<String>) -> Self {
        Self { status, url }
    }

    pub fn status_code(&self) -> u16 {
        self.status.code()
    }
}

/// Uploading seam used by the batch runner
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload one file; only configuration problems are returned as errors
    async fn upload_image(
        &self,
        container: &str,
        path: &Path,
        blob_name: Option<&str>,
    ) -> Result<UploadResult>;

    /// Whether `url` answers a HEAD request with an image content type
    async fn is_image_url(&self, url: &str) -> bool;
}

/// Whether a `Content-Type` value is in the image allow-list
pub fn is_image_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    IMAGE_CONTENT_TYPES.contains(&essence.as_str())
}

/// Client for one storage account
pub struct BlobStorageClient {
    http: Client,
    /// Verification client; a redirect is an answer, not something to follow
    head: Client,
    config: StorageConfig,
    settings: UploadSettings,
    credential: CredentialCache,
}

impl BlobStorageClient {
    /// Create a new client. No request is made and no credential is generated yet.
    pub fn new(config: StorageConfig, settings: UploadSettings) -> Result<Self> {
        validate_settings(&settings)?;

        let timeout = std::time::Duration::from_secs(settings.timeout_secs);
        let http = Client::builder().timeout(timeout).build()?;
        let head = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            head,
            config,
            settings,
            credential: CredentialCache::new(),
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    fn generate_credential(&self) -> Result<Credential> {
        let now = Utc::now();
        let sas = AccountSasConfig::new(now + Duration::minutes(self.settings.sas_lifetime_minutes));
        let token = generate_account_sas(&self.config.account_name, &self.config.account_key, &sas)?;

        if let Err(e) = self.config.service_root() {
            error!("Storage account url not found in environment variables");
            return Err(e);
        }

        Ok(Credential::new(
            token,
            now + Duration::minutes(self.settings.refresh_interval_minutes),
        ))
    }

    /// Active credential, regenerated first if it has expired
    pub async fn credential(&self) -> Result<Arc<Credential>> {
        self.credential
            .get_or_refresh(|| self.generate_credential())
            .await
    }

    /// Public URL a local file would be uploaded to
    pub fn get_url_from_path(&self, path: &Path, container: &str) -> Result<String> {
        blob_url(
            self.config.service_root()?,
            container,
            &blob_name_from_path(path),
        )
    }

    pub fn blob_handle(&self, container: &str, blob_name: &str) -> Result<BlobHandle> {
        BlobHandle::new(self.config.service_root()?, container, blob_name)
    }

    /// PUT the file as a block blob. Without `overwrite`, an existing blob is
    /// reported as [`Error::BlobExists`] and left untouched.
    pub async fn put_blob(&self, handle: &BlobHandle, path: &Path, overwrite: bool) -> Result<()> {
        let body = tokio::fs::read(path).await?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        let credential = self.credential().await?;
        let url = handle.signed_url(&credential.token)?;

        let mut request = self
            .http
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", SAS_VERSION)
            .header("x-ms-blob-content-type", &content_type)
            .header(CONTENT_TYPE, &content_type)
            .body(body);

        if !overwrite {
            request = request.header(IF_NONE_MATCH, "*");
        }

        let response = request.send().await?;
        check_put_response(&response, handle)
    }

    /// HEAD `url` and check its content type. Never fails: network errors mean "not an image".
    /// Redirects are not followed.
    pub async fn is_image_url(&self, url: &str) -> bool {
        match self.head.head(url).send().await {
            Ok(response) => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                is_image_content_type(content_type)
            }
            Err(e) => {
                debug!(url, error = %e, "HEAD request failed");
                false
            }
        }
    }

    /// Re-upload (overwriting) up to `max_retry` times, stopping once the blob
    /// verifies as an image. No delay between attempts.
    pub async fn reupload(&self, handle: &BlobHandle, path: &Path, max_retry: u32) -> bool {
        for attempt in 1..=max_retry {
            if let Err(e) = self.put_blob(handle, path, true).await {
                warn!(attempt, blob = %handle.name, error = %e, "Re-upload failed");
                continue;
            }

            if self.is_image_url(&handle.url).await {
                info!(attempt, url = %handle.url, "Image verified after re-upload");
                return true;
            }

            warn!(attempt, url = %handle.url, "Uploaded blob is not served as an image");
        }

        false
    }

    /// Upload a local file and verify it is served as an image.
    ///
    /// The blob name defaults to the last two segments of `path` joined by `_`.
    /// Per-file failures come back as an [`UploadResult`]; only configuration
    /// errors (missing account url, unusable key) are returned as `Err`.
    pub async fn upload_image(
        &self,
        container: &str,
        path: &Path,
        blob_name: Option<&str>,
    ) -> Result<UploadResult> {
        let blob_name = blob_name
            .map(str::to_string)
            .unwrap_or_else(|| blob_name_from_path(path));
        let handle = self.blob_handle(container, &blob_name)?;

        match self.put_blob(&handle, path, false).await {
            Ok(()) => {
                if self.is_image_url(&handle.url).await
                    || self.reupload(&handle, path, self.settings.max_retry).await
                {
                    info!("Image uploaded successfully. Blob URL: {}", handle.url);
                    Ok(UploadResult::new(UploadStatus::Created, Some(handle.url)))
                } else {
                    error!(
                        "Blob '{}' could not be verified as an image after {} re-uploads",
                        blob_name, self.settings.max_retry
                    );
                    Ok(UploadResult::new(UploadStatus::Unverified, None))
                }
            }
            Err(Error::BlobExists { .. }) => {
                error!(
                    "A blob with the name '{}' already exists in the container '{}'.",
                    blob_name, container
                );
                Ok(UploadResult::new(UploadStatus::Conflict, Some(handle.url)))
            }
            Err(Error::ContainerNotFound(_)) => {
                error!(
                    "The container '{}' does not exist. Please create the container before uploading.",
                    container
                );
                Ok(UploadResult::new(UploadStatus::NotFound, None))
            }
            Err(Error::Authentication(reason)) => {
                error!("Authentication failed: {}", reason);
                self.credential.invalidate().await;
                Ok(UploadResult::new(UploadStatus::Unauthorized, None))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("An error occurred while uploading the image: {}", e);
                Ok(UploadResult::new(UploadStatus::Failed, None))
            }
        }
    }
}

#[async_trait]
impl ImageUploader for BlobStorageClient {
    async fn upload_image(
        &self,
        container: &str,
        path: &Path,
        blob_name: Option<&str>,
    ) -> Result<UploadResult> {
        BlobStorageClient::upload_image(self, container, path, blob_name).await
    }

    async fn is_image_url(&self, url: &str) -> bool {
        BlobStorageClient::is_image_url(self, url).await
    }
}

fn check_put_response(response: &Response, handle: &BlobHandle) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let code = response
        .headers()
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Err(map_error_status(status, code.as_deref(), handle))
}

fn map_error_status(status: StatusCode, code: Option<&str>, handle: &BlobHandle) -> Error {
    match (status.as_u16(), code) {
        (409, None | Some("BlobAlreadyExists")) | (412, _) => Error::BlobExists {
            container: handle.container.clone(),
            blob: handle.name.clone(),
        },
        (404, _) => Error::ContainerNotFound(handle.container.clone()),
        (401 | 403, code) => {
            Error::Authentication(code.unwrap_or("AuthenticationFailed").to_string())
        }
        (status_code, code) => Error::Storage {
            status: status_code,
            message: code
                .or_else(|| status.canonical_reason())
                .unwrap_or("unknown error")
                .to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> BlobHandle {
        BlobHandle::new("http://localhost", "gallery", "a_cat.jpg").unwrap()
    }

    fn client(url: Option<&str>) -> BlobStorageClient {
        BlobStorageClient::new(
            StorageConfig::new("acct", "YmxvYmNkbi10ZXN0LWtleQ==", url.map(str::to_string)),
            UploadSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(UploadStatus::Created.code(), 201);
        assert_eq!(UploadStatus::Conflict.code(), 409);
        assert_eq!(UploadStatus::NotFound.code(), 404);
        assert_eq!(UploadStatus::Unauthorized.code(), 401);
        assert_eq!(UploadStatus::Unverified.code(), 422);
        assert_eq!(UploadStatus::Failed.code(), 500);
        assert_eq!(UploadStatus::Conflict.to_string(), "409 conflict");
    }

    #[test]
    fn test_image_content_types() {
        assert!(is_image_content_type("image/png"));
        assert!(is_image_content_type("image/jpeg"));
        assert!(is_image_content_type("IMAGE/JPG"));
        assert!(is_image_content_type("application/octet-stream"));
        assert!(is_image_content_type("image/jpeg; charset=binary"));
        assert!(!is_image_content_type("text/plain"));
        assert!(!is_image_content_type("image/gif"));
        assert!(!is_image_content_type(""));
    }

    #[test]
    fn test_map_error_status() {
        assert!(matches!(
            map_error_status(StatusCode::CONFLICT, Some("BlobAlreadyExists"), &handle()),
            Error::BlobExists { .. }
        ));
        assert!(matches!(
            map_error_status(StatusCode::CONFLICT, Some("ContainerBeingDeleted"), &handle()),
            Error::Storage { status: 409, .. }
        ));
        assert!(matches!(
            map_error_status(StatusCode::NOT_FOUND, Some("ContainerNotFound"), &handle()),
            Error::ContainerNotFound(ref c) if c == "gallery"
        ));
        assert!(matches!(
            map_error_status(StatusCode::FORBIDDEN, Some("AuthenticationFailed"), &handle()),
            Error::Authentication(_)
        ));
        assert!(matches!(
            map_error_status(StatusCode::INTERNAL_SERVER_ERROR, None, &handle()),
            Error::Storage { status: 500, .. }
        ));
    }

    #[test]
    fn test_get_url_from_path_is_deterministic() {
        let client = client(Some("https://acct.blob.core.windows.net"));
        let path = Path::new("/photos/a/cat.jpg");

        let first = client.get_url_from_path(path, "gallery").unwrap();
        let second = client.get_url_from_path(path, "gallery").unwrap();

        assert_eq!(first, "https://acct.blob.core.windows.net/gallery/a_cat.jpg");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_url_fails_on_first_credential() {
        let client = client(None);
        assert!(matches!(
            client.credential().await,
            Err(Error::MissingEnv("ACCOUNT_URL"))
        ));
    }

    #[tokio::test]
    async fn test_credential_reused_until_expiry() {
        let client = client(Some("https://acct.blob.core.windows.net"));
        let first = client.credential().await.unwrap();
        let second = client.credential().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.token.contains("sp=rw"));
    }

    #[tokio::test]
    async fn test_is_image_url_unreachable_host() {
        let client = client(Some("http://127.0.0.1:9"));
        assert!(!client.is_image_url("http://127.0.0.1:9/gallery/a_cat.jpg").await);
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::MissingEnv("ACCOUNT_URL").is_fatal());
        assert!(!Error::Timeout.is_fatal());
        assert!(!Error::ContainerNotFound("c".to_string()).is_fatal());
    }
}
