//! Blob naming and public URL derivation

use crate::error::{Error, Result};
use std::path::{Component, Path};
use url::Url;

/// Derive a blob name from a local path.
///
/// The last two path segments are joined with `_`, so `shelf-12/front.jpg`
/// becomes `shelf-12_front.jpg`. Same-named files in different folders get
/// distinct blob names.
pub fn blob_name_from_path(path: &Path) -> String {
    let segments: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let start = segments.len().saturating_sub(2);
    segments[start..].join("_")
}

/// Public URL of a blob: `{service_root}/{container}/{blob_name}`.
///
/// Container and blob name are percent-encoded as single path segments, so
/// `#`, `?`, `%` and `/` in a file name stay part of the blob name.
pub fn blob_url(service_root: &str, container: &str, blob_name: &str) -> Result<String> {
    let mut url = Url::parse(service_root)?;
    url.path_segments_mut()
        .map_err(|_| Error::InvalidConfig(format!("account url cannot hold a path: {}", service_root)))?
        .pop_if_empty()
        .push(container)
        .push(blob_name);
    Ok(url.into())
}

/// Address of a single blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    pub container: String,
    pub name: String,
    /// Public URL, without any credential
    pub url: String,
}

impl BlobHandle {
    pub fn new(service_root: &str, container: &str, name: &str) -> Result<Self> {
        Ok(Self {
            container: container.to_string(),
            name: name.to_string(),
            url: blob_url(service_root, container, name)?,
        })
    }

    /// Request URL carrying `query` (a SAS token) after the encoded path
    pub fn signed_url(&self, query: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url)?;
        url.set_query(Some(query));
        Ok(url)
    }
}
