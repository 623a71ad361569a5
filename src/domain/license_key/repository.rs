//! License key repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use crate::domain::DomainError;
use crate::domain::fingerprint::Fingerprint;

use super::decision::Decision;
use super::entity::LicenseKey;

/// Durable storage for license key records.
///
/// `redeem` and `activate` are the only mutating entry points the engines
/// use. Each one must execute the fetch, the rule evaluation and the
/// conditional mutation as a single atomic unit per key value (write lock,
/// row lock, or equivalent): two clients racing for the first-use binding of
/// the same key must see exactly one winner, and `uses` must never cross
/// `max_uses` under any interleaving.
///
/// Operations fail with [`DomainError::Storage`] when the backend is
/// unreachable or times out; that failure is never folded into a business
/// rejection.
#[async_trait]
pub trait LicenseKeyRepository: Send + Sync + Debug {
    /// Look up a record by its normalized key value.
    async fn fetch(&self, key_value: &str) -> Result<Option<LicenseKey>, DomainError>;

    /// Store a newly issued record. Fails with a conflict if the key value
    /// already exists.
    async fn insert(&self, key: LicenseKey) -> Result<LicenseKey, DomainError>;

    /// All records. Seeding and diagnostics only.
    async fn list(&self) -> Result<Vec<LicenseKey>, DomainError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, DomainError>;

    /// Run one validation attempt ([`LicenseKey::redeem`]) atomically
    /// against the stored record. A missing record rejects with
    /// `InvalidKey`; an accepted attempt persists the mutated record before
    /// returning it.
    async fn redeem(
        &self,
        key_value: &str,
        fingerprint: &Fingerprint,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, DomainError>;

    /// Run one activation attempt ([`LicenseKey::claim_activation`])
    /// atomically against the stored record, with the same contract as
    /// [`redeem`](Self::redeem).
    async fn activate(
        &self,
        key_value: &str,
        fingerprint: &Fingerprint,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, DomainError>;
}
