//! Time-limited access credential shared by concurrent uploads

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A generated access token and the instant after which it must be replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: String, expiry: DateTime<Utc>) -> Self {
        Self { token, expiry }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Lazily refreshed credential slot.
///
/// Readers clone an `Arc` under the read lock. Regeneration happens under the
/// write lock and re-checks expiry first, so concurrent callers that all saw
/// an expired credential produce only one new one.
#[derive(Debug, Default)]
pub struct CredentialCache {
    slot: RwLock<Option<Arc<Credential>>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current credential, generating a new one with `generate` if absent or expired
    pub async fn get_or_refresh<F>(&self, generate: F) -> Result<Arc<Credential>>
    where
        F: FnOnce() -> Result<Credential>,
    {
        {
            let slot = self.slot.read().await;
            if let Some(current) = slot.as_ref().filter(|c| !c.is_expired()) {
                return Ok(Arc::clone(current));
            }
        }

        let mut slot = self.slot.write().await;
        if let Some(current) = slot.as_ref().filter(|c| !c.is_expired()) {
            return Ok(Arc::clone(current));
        }

        let fresh = Arc::new(generate()?);
        tracing::debug!(expiry = %fresh.expiry, "Generated new access credential");
        *slot = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Drop the current credential so the next use regenerates it
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    pub async fn current(&self) -> Option<Arc<Credential>> {
        self.slot.read().await.clone()
    }
}
