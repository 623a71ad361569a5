//! Device fingerprint derivation
//!
//! Maps client identity attributes to a stable device token. The token is
//! what a key gets bound to on first use, so the derivation must stay
//! byte-for-byte compatible with previously issued bindings.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fallback for client attributes the caller did not send.
const MISSING_ATTRIBUTE: &str = "unknown";

/// Number of hex characters kept from the full SHA-256 digest.
///
/// 16 hex chars = 64 bits. Truncation trades collision margin for short,
/// human-copyable tokens and must not be changed: stored bindings were
/// derived with this length.
const FINGERPRINT_LENGTH: usize = 16;

/// A derived device fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint for a client.
    ///
    /// Concatenates `owner_id`, `executor` and `place` with `-`, hashes the
    /// UTF-8 bytes with SHA-256 and keeps the first 16 lowercase hex
    /// characters. Absent or empty `executor`/`place` fall back to
    /// `"unknown"`; `owner_id` has no fallback and is checked by the caller.
    ///
    /// Pure function: identical inputs always yield identical output.
    pub fn derive(owner_id: &str, executor: Option<&str>, place: Option<&str>) -> Self {
        let executor = non_empty(executor).unwrap_or(MISSING_ATTRIBUTE);
        let place = non_empty(place).unwrap_or(MISSING_ATTRIBUTE);

        let material = format!("{owner_id}-{executor}-{place}");
        let digest = Sha256::digest(material.as_bytes());

        let mut token = hex::encode(digest);
        token.truncate(FINGERPRINT_LENGTH);

        Self(token)
    }

    /// Wrap an already-derived token, e.g. when rehydrating a stored binding.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // sha256("u1-exec-place1") = 693a5607725a4191...
        let fp = Fingerprint::derive("u1", Some("exec"), Some("place1"));
        assert_eq!(fp.as_str(), "693a5607725a4191");
    }

    #[test]
    fn test_missing_attributes_default_to_unknown() {
        // sha256("u1-unknown-unknown") = b2685dfa5a084be8...
        let fp = Fingerprint::derive("u1", None, None);
        assert_eq!(fp.as_str(), "b2685dfa5a084be8");

        // Empty strings behave like absent attributes.
        assert_eq!(Fingerprint::derive("u1", Some(""), Some("")), fp);
    }

    #[test]
    fn test_deterministic() {
        let a = Fingerprint::derive("owner", Some("executor"), Some("place"));
        let b = Fingerprint::derive("owner", Some("executor"), Some("place"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_owners_yield_distinct_fingerprints() {
        let a = Fingerprint::derive("u1", Some("exec"), Some("place1"));
        let b = Fingerprint::derive("u2", Some("exec"), Some("place1"));
        assert_ne!(a, b);
        assert_eq!(b.as_str(), "e51c00d7279a5ed8");
    }

    #[test]
    fn test_shape() {
        let fp = Fingerprint::derive("some-owner", Some("synapse"), Some("12345"));
        assert_eq!(fp.as_str().len(), 16);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
