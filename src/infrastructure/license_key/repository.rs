//! In-memory license key repository implementation
//!
//! The reference deployment's volatile store, kept behind the repository
//! trait so it doubles as the test fake. Atomicity of `redeem`/`activate`
//! comes from holding the write lock across the whole read-check-mutate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::license_key::{Decision, LicenseKey, LicenseKeyRepository, RejectReason};
use crate::domain::{DomainError, Fingerprint};

/// In-memory implementation of [`LicenseKeyRepository`].
#[derive(Debug)]
pub struct InMemoryLicenseKeyRepository {
    keys: Arc<RwLock<HashMap<String, LicenseKey>>>,
}

impl InMemoryLicenseKeyRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a repository pre-populated with the given records.
    pub fn with_keys(keys: Vec<LicenseKey>) -> Self {
        let map: HashMap<String, LicenseKey> = keys
            .into_iter()
            .map(|k| (k.key_value().to_string(), k))
            .collect();

        Self {
            keys: Arc::new(RwLock::new(map)),
        }
    }
}

impl Default for InMemoryLicenseKeyRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LicenseKeyRepository for InMemoryLicenseKeyRepository {
    async fn fetch(&self, key_value: &str) -> Result<Option<LicenseKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.get(key_value).cloned())
    }

    async fn insert(&self, key: LicenseKey) -> Result<LicenseKey, DomainError> {
        let mut keys = self.keys.write().await;
        let key_value = key.key_value().to_string();

        if keys.contains_key(&key_value) {
            return Err(DomainError::conflict(format!(
                "license key '{}' already exists",
                key_value
            )));
        }

        keys.insert(key_value, key.clone());
        Ok(key)
    }

    async fn list(&self) -> Result<Vec<LicenseKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.len())
    }

    async fn redeem(
        &self,
        key_value: &str,
        fingerprint: &Fingerprint,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, DomainError> {
        // Write lock held for the whole read-check-mutate: concurrent
        // attempts on the same key serialize here.
        let mut keys = self.keys.write().await;

        let Some(key) = keys.get_mut(key_value) else {
            return Ok(Decision::Rejected(RejectReason::InvalidKey));
        };

        match key.redeem(fingerprint, owner_id, now) {
            Ok(()) => Ok(Decision::Accepted(key.clone())),
            Err(reason) => Ok(Decision::Rejected(reason)),
        }
    }

    async fn activate(
        &self,
        key_value: &str,
        fingerprint: &Fingerprint,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, DomainError> {
        let mut keys = self.keys.write().await;

        let Some(key) = keys.get_mut(key_value) else {
            return Ok(Decision::Rejected(RejectReason::InvalidKey));
        };

        match key.claim_activation(fingerprint, owner_id, now) {
            Ok(()) => Ok(Decision::Accepted(key.clone())),
            Err(reason) => Ok(Decision::Rejected(reason)),
        }
    }
}
