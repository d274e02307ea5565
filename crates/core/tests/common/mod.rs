//! In-process stand-in for the Blob service REST API

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::put,
    Router,
};
use blobcdn_core::{BlobStorageClient, StorageConfig, UploadSettings};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const ACCOUNT_KEY: &str = "YmxvYmNkbi10ZXN0LWtleQ==";

#[derive(Default)]
struct Inner {
    containers: HashSet<String>,
    blobs: HashMap<(String, String), (Vec<u8>, String)>,
    puts: usize,
    reject_auth: bool,
    served_content_type: Option<String>,
    redirects: HashMap<(String, String), String>,
}

#[derive(Clone, Default)]
pub struct FakeBlobService {
    inner: Arc<Mutex<Inner>>,
}

impl FakeBlobService {
    pub fn with_container(self, name: &str) -> Self {
        self.inner.lock().unwrap().containers.insert(name.to_string());
        self
    }

    pub fn seed_blob(&self, container: &str, blob: &str, bytes: &[u8], content_type: &str) {
        self.inner.lock().unwrap().blobs.insert(
            (container.to_string(), blob.to_string()),
            (bytes.to_vec(), content_type.to_string()),
        );
    }

    pub fn blob_bytes(&self, container: &str, blob: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .blobs
            .get(&(container.to_string(), blob.to_string()))
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn puts(&self) -> usize {
        self.inner.lock().unwrap().puts
    }

    /// Answer every PUT with 403 AuthenticationFailed
    pub fn reject_auth(&self, reject: bool) {
        self.inner.lock().unwrap().reject_auth = reject;
    }

    /// Serve this content type on HEAD regardless of what was uploaded
    pub fn serve_content_type(&self, content_type: &str) {
        self.inner.lock().unwrap().served_content_type = Some(content_type.to_string());
    }

    /// Answer HEAD on this blob with `302 Found` pointing at `location`
    pub fn redirect(&self, container: &str, blob: &str, location: &str) {
        self.inner.lock().unwrap().redirects.insert(
            (container.to_string(), blob.to_string()),
            location.to_string(),
        );
    }

    /// Bind to an ephemeral port and return the service root URL
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/:container/:blob", put(put_blob).head(head_blob))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }
}

fn error_response(status: StatusCode, code: &'static str) -> Response {
    (status, [("x-ms-error-code", code)]).into_response()
}

async fn put_blob(
    State(service): State<FakeBlobService>,
    Path((container, blob)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut inner = service.inner.lock().unwrap();

    if inner.reject_auth || !query.contains_key("sig") || !query.contains_key("se") {
        return error_response(StatusCode::FORBIDDEN, "AuthenticationFailed");
    }
    if headers.get("x-ms-blob-type").and_then(|v| v.to_str().ok()) != Some("BlockBlob") {
        return error_response(StatusCode::BAD_REQUEST, "MissingRequiredHeader");
    }
    if !inner.containers.contains(&container) {
        return error_response(StatusCode::NOT_FOUND, "ContainerNotFound");
    }

    let key = (container, blob);
    let no_overwrite = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        == Some("*");
    if no_overwrite && inner.blobs.contains_key(&key) {
        return error_response(StatusCode::CONFLICT, "BlobAlreadyExists");
    }

    let content_type = headers
        .get("x-ms-blob-content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    inner.blobs.insert(key, (body.to_vec(), content_type));
    inner.puts += 1;

    StatusCode::CREATED.into_response()
}

async fn head_blob(
    State(service): State<FakeBlobService>,
    Path((container, blob)): Path<(String, String)>,
) -> Response {
    let inner = service.inner.lock().unwrap();
    let key = (container, blob);
    if let Some(location) = inner.redirects.get(&key) {
        return (StatusCode::FOUND, [(header::LOCATION, location.clone())]).into_response();
    }
    match inner.blobs.get(&key) {
        Some((_, content_type)) => {
            let served = inner
                .served_content_type
                .clone()
                .unwrap_or_else(|| content_type.clone());
            (StatusCode::OK, [(header::CONTENT_TYPE, served)]).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Client pointed at a fake service root
pub fn client_for(root: &str) -> BlobStorageClient {
    let settings = UploadSettings {
        timeout_secs: 5,
        ..UploadSettings::default()
    };
    BlobStorageClient::new(
        StorageConfig::new("devaccount", ACCOUNT_KEY, Some(root.to_string())),
        settings,
    )
    .unwrap()
}
