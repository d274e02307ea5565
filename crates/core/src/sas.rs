//! Account shared access signature (SAS) generation
//!
//! Produces the query-string credential accepted by the Blob service. The
//! signature is an HMAC-SHA256 over the account string-to-sign, keyed with the
//! base64-decoded account key.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Storage service version used for signing and requests
pub const SAS_VERSION: &str = "2021-08-06";

/// Signed services: blob only
const SIGNED_SERVICES: &str = "b";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Permissions granted by an account SAS
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountSasPermissions {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
    pub add: bool,
    pub create: bool,
}

impl AccountSasPermissions {
    /// Read and write, enough to upload and check blobs
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Self::default()
        }
    }

    /// Permission string in canonical order
    pub fn as_str(&self) -> String {
        [
            (self.read, 'r'),
            (self.write, 'w'),
            (self.delete, 'd'),
            (self.list, 'l'),
            (self.add, 'a'),
            (self.create, 'c'),
        ]
        .iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, c)| *c)
        .collect()
    }
}

/// Resource types reachable with an account SAS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTypes {
    pub service: bool,
    pub container: bool,
    pub object: bool,
}

impl ResourceTypes {
    pub fn all() -> Self {
        Self {
            service: true,
            container: true,
            object: true,
        }
    }

    pub fn as_str(&self) -> String {
        [(self.service, 's'), (self.container, 'c'), (self.object, 'o')]
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, c)| *c)
            .collect()
    }
}

/// Configuration for generating an account SAS
#[derive(Debug, Clone)]
pub struct AccountSasConfig {
    pub permissions: AccountSasPermissions,
    pub resource_types: ResourceTypes,
    /// Signature expiry
    pub expiry: DateTime<Utc>,
    /// Optional start time
    pub start: Option<DateTime<Utc>>,
}

impl AccountSasConfig {
    /// Read/write access to services, containers and objects until `expiry`
    pub fn new(expiry: DateTime<Utc>) -> Self {
        Self {
            permissions: AccountSasPermissions::read_write(),
            resource_types: ResourceTypes::all(),
            expiry,
            start: None,
        }
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }
}

fn string_to_sign(account_name: &str, config: &AccountSasConfig) -> String {
    let start = config
        .start
        .map(|s| s.format(TIME_FORMAT).to_string())
        .unwrap_or_default();

    // account, permissions, services, resource types, start, expiry, ip,
    // protocol, version, encryption scope
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n\n\n{}\n\n",
        account_name,
        config.permissions.as_str(),
        SIGNED_SERVICES,
        config.resource_types.as_str(),
        start,
        config.expiry.format(TIME_FORMAT),
        SAS_VERSION,
    )
}

/// Generate an account SAS query string (without the leading `?`)
pub fn generate_account_sas(
    account_name: &str,
    account_key: &str,
    config: &AccountSasConfig,
) -> Result<String> {
    let key = STANDARD
        .decode(account_key.trim())
        .map_err(|e| Error::Signature(format!("account key is not valid base64: {}", e)))?;

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| Error::Signature(e.to_string()))?;
    mac.update(string_to_sign(account_name, config).as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("sv", SAS_VERSION)
        .append_pair("ss", SIGNED_SERVICES)
        .append_pair("srt", &config.resource_types.as_str())
        .append_pair("sp", &config.permissions.as_str());
    if let Some(start) = config.start {
        query.append_pair("st", &start.format(TIME_FORMAT).to_string());
    }
    query
        .append_pair("se", &config.expiry.format(TIME_FORMAT).to_string())
        .append_pair("sig", &signature);

    Ok(query.finish())
}
