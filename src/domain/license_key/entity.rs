//! License key entity and lifecycle state machine
//!
//! The entity owns every lifecycle rule (ban, device binding, expiry, usage
//! cap). Store implementations call [`LicenseKey::redeem`] and
//! [`LicenseKey::claim_activation`] inside their own atomic section, so the
//! rules exist exactly once and a store only contributes atomicity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::fingerprint::Fingerprint;

use super::decision::RejectReason;

/// Normalize a raw key string for storage and lookup: strip surrounding
/// whitespace and uppercase. Key values are case-insensitive by convention.
pub fn normalize_key_value(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Tier label attached to a key at issuance.
///
/// Informational only: validation rules never branch on it, clients use it
/// to unlock tier-specific features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyTier {
    #[default]
    Standard,
    Premium,
}

impl KeyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Premium => "PREMIUM",
        }
    }

    /// Parse the stored label. Returns `None` for labels this engine does
    /// not know.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "STANDARD" => Some(Self::Standard),
            "PREMIUM" => Some(Self::Premium),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One issued license key and its lifecycle state.
#[derive(Debug, Clone)]
pub struct LicenseKey {
    /// Unique identifier, stored normalized (uppercase, trimmed).
    pub(crate) key_value: String,
    /// Device fingerprint bound on first successful use. Set exactly once.
    pub(crate) fingerprint: Option<Fingerprint>,
    /// Owner who first used/activated the key. Set together with the fingerprint.
    pub(crate) owner_id: Option<String>,
    pub(crate) generated_at: DateTime<Utc>,
    /// Stamped by the activation flow only.
    pub(crate) activated_at: Option<DateTime<Utc>>,
    pub(crate) expires_at: DateTime<Utc>,
    /// Latched true on first successful bind; never reset.
    pub(crate) is_used: bool,
    /// Set by administrative tooling; this engine only reads it.
    pub(crate) is_banned: bool,
    pub(crate) key_type: KeyTier,
    /// Count of successful validations. Monotonic, never exceeds `max_uses`.
    pub(crate) uses: u32,
    pub(crate) max_uses: u32,
}

impl LicenseKey {
    /// Create a fresh, unused key. The value is normalized on the way in.
    pub fn new(key_value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            key_value: normalize_key_value(&key_value.into()),
            fingerprint: None,
            owner_id: None,
            generated_at: Utc::now(),
            activated_at: None,
            expires_at,
            is_used: false,
            is_banned: false,
            key_type: KeyTier::default(),
            uses: 0,
            max_uses: 1,
        }
    }

    pub fn with_tier(mut self, tier: KeyTier) -> Self {
        self.key_type = tier;
        self
    }

    pub fn with_max_uses(mut self, max_uses: u32) -> Self {
        self.max_uses = max_uses;
        self
    }

    /// Mark the key banned. Issuance/seed tooling only; the engine itself
    /// never flips this flag in either direction.
    pub fn with_banned(mut self, banned: bool) -> Self {
        self.is_banned = banned;
        self
    }

    // Getters

    pub fn key_value(&self) -> &str {
        &self.key_value
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.is_used
    }

    pub fn is_banned(&self) -> bool {
        self.is_banned
    }

    pub fn key_type(&self) -> KeyTier {
        self.key_type
    }

    pub fn uses(&self) -> u32 {
        self.uses
    }

    pub fn max_uses(&self) -> u32 {
        self.max_uses
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    // Lifecycle transitions

    /// One validation attempt against this record.
    ///
    /// Checks, in order: ban, device binding, expiry, usage cap. On
    /// acceptance the first use binds `fingerprint`/`owner_id` and latches
    /// `is_used`, and `uses` is incremented; a rejection leaves the record
    /// untouched. Callers must run this inside the store's atomic section.
    pub fn redeem(
        &mut self,
        fingerprint: &Fingerprint,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        self.check_binding(fingerprint)?;

        if self.is_expired_at(now) {
            return Err(RejectReason::Expired);
        }
        if self.uses >= self.max_uses {
            return Err(RejectReason::UsageLimitReached);
        }

        if !self.is_used {
            self.bind(fingerprint, owner_id, None);
        }
        self.uses += 1;

        Ok(())
    }

    /// One activation attempt against this record.
    ///
    /// Activation is the one-time binding ceremony, not a per-use gate: it
    /// shares the ban and device checks with [`redeem`](Self::redeem) but
    /// deliberately skips expiry and the usage cap and never touches `uses`
    /// (compatibility with the reference behavior; an expired key can still
    /// be activated). First use stamps `activated_at` in addition to the
    /// binding. Re-activating from the bound device succeeds without any
    /// further mutation.
    pub fn claim_activation(
        &mut self,
        fingerprint: &Fingerprint,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        self.check_binding(fingerprint)?;

        if !self.is_used {
            self.bind(fingerprint, owner_id, Some(now));
        }

        Ok(())
    }

    fn check_binding(&self, fingerprint: &Fingerprint) -> Result<(), RejectReason> {
        // Banned keys answer exactly like unknown ones.
        if self.is_banned {
            return Err(RejectReason::InvalidKey);
        }
        if self.is_used && self.fingerprint.as_ref() != Some(fingerprint) {
            return Err(RejectReason::DeviceMismatch);
        }
        Ok(())
    }

    fn bind(
        &mut self,
        fingerprint: &Fingerprint,
        owner_id: &str,
        activated_at: Option<DateTime<Utc>>,
    ) {
        self.fingerprint = Some(fingerprint.clone());
        self.owner_id = Some(owner_id.to_string());
        self.is_used = true;
        if activated_at.is_some() {
            self.activated_at = activated_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh_key(max_uses: u32) -> LicenseKey {
        LicenseKey::new("TEST1-2345-6789-ABCD", Utc::now() + Duration::days(30))
            .with_max_uses(max_uses)
    }

    fn fp(owner: &str) -> Fingerprint {
        Fingerprint::derive(owner, Some("exec"), Some("place1"))
    }

    #[test]
    fn test_normalize_key_value() {
        assert_eq!(normalize_key_value("  test1-2345 "), "TEST1-2345");
        assert_eq!(normalize_key_value("ALREADY-UPPER"), "ALREADY-UPPER");
    }

    #[test]
    fn test_new_key_is_normalized_and_unused() {
        let key = LicenseKey::new(" demo-key-1234-5678 ", Utc::now() + Duration::days(90));
        assert_eq!(key.key_value(), "DEMO-KEY-1234-5678");
        assert!(!key.is_used());
        assert!(key.fingerprint().is_none());
        assert_eq!(key.uses(), 0);
    }

    #[test]
    fn test_tier_round_trip() {
        assert_eq!(KeyTier::parse("STANDARD"), Some(KeyTier::Standard));
        assert_eq!(KeyTier::parse("PREMIUM"), Some(KeyTier::Premium));
        assert_eq!(KeyTier::parse("GOLD"), None);
        assert_eq!(KeyTier::Premium.to_string(), "PREMIUM");
    }

    #[test]
    fn test_first_redeem_binds_and_counts() {
        let mut key = fresh_key(5);
        let now = Utc::now();

        key.redeem(&fp("u1"), "u1", now).unwrap();

        assert!(key.is_used());
        assert_eq!(key.fingerprint(), Some(&fp("u1")));
        assert_eq!(key.owner_id(), Some("u1"));
        assert_eq!(key.uses(), 1);
        // Validation never stamps the activation timestamp.
        assert!(key.activated_at().is_none());
    }

    #[test]
    fn test_repeat_redeem_same_device() {
        let mut key = fresh_key(5);
        let now = Utc::now();

        key.redeem(&fp("u1"), "u1", now).unwrap();
        key.redeem(&fp("u1"), "u1", now).unwrap();

        assert_eq!(key.uses(), 2);
        assert_eq!(key.fingerprint(), Some(&fp("u1")));
    }

    #[test]
    fn test_redeem_other_device_rejected() {
        let mut key = fresh_key(5);
        let now = Utc::now();

        key.redeem(&fp("u1"), "u1", now).unwrap();
        let err = key.redeem(&fp("u2"), "u2", now).unwrap_err();

        assert_eq!(err, RejectReason::DeviceMismatch);
        // The losing attempt must not disturb the binding.
        assert_eq!(key.fingerprint(), Some(&fp("u1")));
        assert_eq!(key.owner_id(), Some("u1"));
        assert_eq!(key.uses(), 1);
    }

    #[test]
    fn test_redeem_expired() {
        let mut key = LicenseKey::new("OLD-KEY", Utc::now() - Duration::hours(1)).with_max_uses(5);
        let err = key.redeem(&fp("u1"), "u1", Utc::now()).unwrap_err();
        assert_eq!(err, RejectReason::Expired);
        assert!(!key.is_used());
    }

    #[test]
    fn test_redeem_at_exact_expiry_instant() {
        let now = Utc::now();
        let mut key = LicenseKey::new("EDGE-KEY", now).with_max_uses(5);
        // now >= expires_at rejects, boundary included.
        assert_eq!(
            key.redeem(&fp("u1"), "u1", now).unwrap_err(),
            RejectReason::Expired
        );
    }

    #[test]
    fn test_redeem_usage_cap() {
        let mut key = fresh_key(2);
        let now = Utc::now();

        key.redeem(&fp("u1"), "u1", now).unwrap();
        key.redeem(&fp("u1"), "u1", now).unwrap();
        let err = key.redeem(&fp("u1"), "u1", now).unwrap_err();

        assert_eq!(err, RejectReason::UsageLimitReached);
        assert_eq!(key.uses(), 2);
    }

    #[test]
    fn test_banned_key_indistinguishable_from_unknown() {
        let mut key = fresh_key(5).with_banned(true);
        let err = key.redeem(&fp("u1"), "u1", Utc::now()).unwrap_err();
        assert_eq!(err, RejectReason::InvalidKey);
        assert_eq!(err.to_string(), "Invalid key");
    }

    #[test]
    fn test_ban_checked_before_device_mismatch() {
        let mut key = fresh_key(5);
        let now = Utc::now();
        key.redeem(&fp("u1"), "u1", now).unwrap();

        key.is_banned = true;
        let err = key.redeem(&fp("u2"), "u2", now).unwrap_err();
        assert_eq!(err, RejectReason::InvalidKey);
    }

    #[test]
    fn test_activation_binds_and_stamps() {
        let mut key = fresh_key(5);
        let now = Utc::now();

        key.claim_activation(&fp("u1"), "u1", now).unwrap();

        assert!(key.is_used());
        assert_eq!(key.fingerprint(), Some(&fp("u1")));
        assert_eq!(key.activated_at(), Some(now));
        // Activation is not a use.
        assert_eq!(key.uses(), 0);
    }

    #[test]
    fn test_reactivation_same_device_keeps_original_stamp() {
        let mut key = fresh_key(5);
        let first = Utc::now();

        key.claim_activation(&fp("u1"), "u1", first).unwrap();
        key.claim_activation(&fp("u1"), "u1", first + Duration::hours(1))
            .unwrap();

        assert_eq!(key.activated_at(), Some(first));
    }

    #[test]
    fn test_activation_other_device_rejected() {
        let mut key = fresh_key(5);
        let now = Utc::now();

        key.claim_activation(&fp("u1"), "u1", now).unwrap();
        let err = key.claim_activation(&fp("u2"), "u2", now).unwrap_err();

        assert_eq!(err, RejectReason::DeviceMismatch);
    }

    #[test]
    fn test_activates_expired_key() {
        // Reference behavior, preserved deliberately: activation is a
        // binding ceremony and does not gate on expiry.
        let mut key = LicenseKey::new("OLD-KEY", Utc::now() - Duration::days(1));
        key.claim_activation(&fp("u1"), "u1", Utc::now()).unwrap();
        assert!(key.is_used());
    }

    #[test]
    fn test_validation_after_activation_shares_binding() {
        let mut key = fresh_key(5);
        let now = Utc::now();

        key.claim_activation(&fp("u1"), "u1", now).unwrap();
        key.redeem(&fp("u1"), "u1", now).unwrap();
        assert_eq!(key.uses(), 1);

        let err = key.redeem(&fp("u2"), "u2", now).unwrap_err();
        assert_eq!(err, RejectReason::DeviceMismatch);
    }
}
