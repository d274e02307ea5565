//! blobcdn-core - Core library for the blobcdn uploader
//!
//! This library uploads local images to a blob storage container and hands back
//! their public URLs: account SAS generation, blob uploads with image
//! verification, and manifest-driven batch runs.

pub mod batch;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod manifest;
pub mod naming;
pub mod sas;

// Re-export commonly used types
pub use batch::{
    resolve_path, run_batch, BatchOptions, BatchReport, ItemOutcome, ItemReport,
    MissingFilePolicy, UploadTask, DEFAULT_CONTAINER, DEFAULT_JOBS, DEFAULT_OUTPUT,
};
pub use client::{
    is_image_content_type, BlobStorageClient, ImageUploader, UploadResult, UploadStatus,
    IMAGE_CONTENT_TYPES,
};
pub use config::{get_config_path, load_config, parse_config, validate_settings};
pub use config::{ConfigFile, StorageConfig, StorageSection, UploadSettings};
pub use credential::{Credential, CredentialCache};
pub use error::{Error, Result};
pub use manifest::{read_manifest, write_url_list, ManifestKind};
pub use naming::{blob_name_from_path, blob_url, BlobHandle};
pub use sas::{generate_account_sas, AccountSasConfig, AccountSasPermissions, ResourceTypes};
