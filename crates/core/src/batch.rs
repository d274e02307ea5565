//! Batch upload of manifest entries
//!
//! Every entry is resolved to a local file, uploaded through an
//! [`ImageUploader`], and the returned URLs are re-checked before they are
//! reported. Uploads run one at a time or through a fixed-size pool; either
//! way the report is in manifest order.

use crate::client::{ImageUploader, UploadResult, UploadStatus};
use crate::error::{Error, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Default target container
pub const DEFAULT_CONTAINER: &str = "gallery-references";

/// Default worker pool size
pub const DEFAULT_JOBS: usize = 2;

/// Default output manifest name
pub const DEFAULT_OUTPUT: &str = "url_list.txt";

/// What to do when a manifest entry does not resolve to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingFilePolicy {
    /// Stop the whole batch
    #[default]
    Abort,
    /// Record the entry as missing and carry on
    Skip,
}

/// Options for a batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub container: String,
    /// Base directory for entries that do not exist as given
    pub root: Option<PathBuf>,
    pub parallel: bool,
    /// Worker pool size when `parallel` is set
    pub jobs: usize,
    pub missing: MissingFilePolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            root: None,
            parallel: true,
            jobs: DEFAULT_JOBS,
            missing: MissingFilePolicy::default(),
        }
    }
}

impl BatchOptions {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        self.root = root;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_missing(mut self, missing: MissingFilePolicy) -> Self {
        self.missing = missing;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.container.trim().is_empty() {
            return Err(Error::InvalidInput("Container name cannot be empty".to_string()));
        }
        if self.parallel && self.jobs == 0 {
            return Err(Error::InvalidInput("n_jobs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// One manifest entry ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Position in the manifest
    pub index: usize,
    pub local_path: PathBuf,
    pub container_name: String,
}

/// Result for one manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Uploaded(UploadResult),
    /// Entry skipped because no file was found (only with [`MissingFilePolicy::Skip`])
    Missing(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub index: usize,
    pub entry: String,
    pub outcome: ItemOutcome,
}

impl ItemReport {
    /// URL returned by the upload, if any
    pub fn url(&self) -> Option<&str> {
        match &self.outcome {
            ItemOutcome::Uploaded(result) => result.url.as_deref(),
            ItemOutcome::Missing(_) => None,
        }
    }

    pub fn status(&self) -> Option<UploadStatus> {
        match &self.outcome {
            ItemOutcome::Uploaded(result) => Some(result.status),
            ItemOutcome::Missing(_) => None,
        }
    }
}

/// Outcome of a whole batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Per-entry results in manifest order
    pub items: Vec<ItemReport>,
    /// URLs that passed the image check, in manifest order
    pub verified_urls: Vec<String>,
}

impl BatchReport {
    pub fn count(&self, status: UploadStatus) -> usize {
        self.items
            .iter()
            .filter(|item| item.status() == Some(status))
            .count()
    }

    pub fn missing(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Missing(_)))
    }
}

/// Resolve a manifest entry to an existing file.
///
/// The entry is tried as given first, then joined onto `root`.
pub fn resolve_path(entry: &str, root: Option<&Path>) -> Result<PathBuf> {
    let direct = PathBuf::from(entry);
    if direct.is_file() {
        return Ok(direct);
    }

    match root {
        Some(root) => {
            let joined = root.join(entry);
            if joined.is_file() {
                Ok(joined)
            } else {
                Err(Error::FileNotFound(joined))
            }
        }
        None => Err(Error::FileNotFound(direct)),
    }
}

async fn process_entry<U>(
    uploader: &U,
    index: usize,
    entry: &str,
    options: &BatchOptions,
) -> Result<ItemReport>
where
    U: ImageUploader + ?Sized,
{
    let local_path = match resolve_path(entry, options.root.as_deref()) {
        Ok(path) => path,
        Err(Error::FileNotFound(path)) if options.missing == MissingFilePolicy::Skip => {
            warn!(entry, "Skipping missing file {}", path.display());
            return Ok(ItemReport {
                index,
                entry: entry.to_string(),
                outcome: ItemOutcome::Missing(path),
            });
        }
        Err(e) => {
            error!(entry, "Invalid file path: {}", e);
            return Err(e);
        }
    };

    let task = UploadTask {
        index,
        local_path,
        container_name: options.container.clone(),
    };
    debug!(index, path = %task.local_path.display(), container = %task.container_name, "Uploading");

    let result = uploader
        .upload_image(&task.container_name, &task.local_path, None)
        .await?;

    Ok(ItemReport {
        index,
        entry: entry.to_string(),
        outcome: ItemOutcome::Uploaded(result),
    })
}

/// Upload every entry and collect verified URLs.
///
/// A missing file aborts the batch under [`MissingFilePolicy::Abort`], as does
/// any fatal configuration error. `on_item` is called as each entry finishes.
pub async fn run_batch<U, F>(
    uploader: &U,
    entries: &[String],
    options: &BatchOptions,
    on_item: F,
) -> Result<BatchReport>
where
    U: ImageUploader + ?Sized,
    F: Fn(&ItemReport),
{
    options.validate()?;

    let mut items = Vec::with_capacity(entries.len());

    if options.parallel {
        let mut pending = stream::iter(entries.iter().enumerate())
            .map(|(index, entry)| process_entry(uploader, index, entry, options))
            .buffer_unordered(options.jobs);

        while let Some(item) = pending.next().await {
            let item = item?;
            on_item(&item);
            items.push(item);
        }
        items.sort_by_key(|item: &ItemReport| item.index);
    } else {
        for (index, entry) in entries.iter().enumerate() {
            let item = process_entry(uploader, index, entry, options).await?;
            on_item(&item);
            items.push(item);
        }
    }

    let mut verified_urls = Vec::new();
    for item in &items {
        if let Some(url) = item.url() {
            if uploader.is_image_url(url).await {
                verified_urls.push(url.to_string());
            } else {
                warn!(url, "Dropping URL that is not served as an image");
            }
        }
    }

    Ok(BatchReport {
        items,
        verified_urls,
    })
}
