//! License service
//!
//! The validation and activation engines. Both are straight-line sequential
//! code: parameter checks and fingerprint derivation happen here, the
//! atomic read-check-mutate happens in the repository.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::license_key::{
    Decision, LicenseKey, LicenseKeyRepository, RejectReason, normalize_key_value,
};
use crate::domain::{DomainError, Fingerprint};

/// High-level operations over license keys.
#[derive(Debug)]
pub struct LicenseService<R>
where
    R: LicenseKeyRepository,
{
    repository: Arc<R>,
}

impl<R: LicenseKeyRepository> LicenseService<R> {
    /// Create a new license service.
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Validate a key for one session.
    ///
    /// On acceptance the first use permanently binds the key to the derived
    /// fingerprint and the use counter advances; see
    /// [`LicenseKey::redeem`](crate::domain::LicenseKey::redeem) for the
    /// rule ordering.
    pub async fn validate(
        &self,
        key: &str,
        owner_id: &str,
        executor: Option<&str>,
        place: Option<&str>,
    ) -> Result<Decision, DomainError> {
        if key.is_empty() || owner_id.is_empty() {
            return Ok(Decision::Rejected(RejectReason::MissingParameter));
        }

        let key_value = normalize_key_value(key);
        let fingerprint = Fingerprint::derive(owner_id, executor, place);

        debug!(key = %key_value, hwid = %fingerprint, "validating license key");

        let decision = self
            .repository
            .redeem(&key_value, &fingerprint, owner_id, Utc::now())
            .await?;

        match &decision {
            Decision::Accepted(record) => {
                info!(
                    key = %key_value,
                    uses = record.uses(),
                    max_uses = record.max_uses(),
                    "license key validated"
                );
            }
            Decision::Rejected(reason) => {
                debug!(key = %key_value, %reason, "validation rejected");
            }
        }

        Ok(decision)
    }

    /// Activate a key: the one-time device-binding ceremony.
    ///
    /// Shares the parameter, ban and device checks with
    /// [`validate`](Self::validate) but does not gate on expiry or the
    /// usage cap and never advances the use counter.
    pub async fn activate(
        &self,
        key: &str,
        owner_id: &str,
        executor: Option<&str>,
        place: Option<&str>,
    ) -> Result<Decision, DomainError> {
        if key.is_empty() || owner_id.is_empty() {
            return Ok(Decision::Rejected(RejectReason::MissingParameter));
        }

        let key_value = normalize_key_value(key);
        let fingerprint = Fingerprint::derive(owner_id, executor, place);

        debug!(key = %key_value, hwid = %fingerprint, "activating license key");

        let decision = self
            .repository
            .activate(&key_value, &fingerprint, owner_id, Utc::now())
            .await?;

        match &decision {
            Decision::Accepted(record) => {
                info!(key = %key_value, tier = %record.key_type(), "license key activated");
            }
            Decision::Rejected(reason) => {
                debug!(key = %key_value, %reason, "activation rejected");
            }
        }

        Ok(decision)
    }

    /// Store a newly issued key. Seeding and admin tooling path.
    pub async fn issue(&self, key: LicenseKey) -> Result<LicenseKey, DomainError> {
        let issued = self.repository.insert(key).await?;
        info!(key = %issued.key_value(), tier = %issued.key_type(), "license key issued");
        Ok(issued)
    }

    /// Look up a key by its raw (unnormalized) value.
    pub async fn get(&self, key: &str) -> Result<Option<LicenseKey>, DomainError> {
        self.repository.fetch(&normalize_key_value(key)).await
    }

    /// Number of issued keys.
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await
    }
}
