//! Domain layer - core business rules and entities

pub mod error;
pub mod fingerprint;
pub mod license_key;

pub use error::DomainError;
pub use fingerprint::Fingerprint;
pub use license_key::{
    Decision, KeyTier, LicenseKey, LicenseKeyRepository, RejectReason, normalize_key_value,
};
