//! License key domain
//!
//! Key records, their lifecycle state machine, the accept/reject decision
//! taxonomy and the storage contract the engines run against.

mod decision;
mod entity;
mod repository;

pub use decision::{Decision, RejectReason};
pub use entity::{KeyTier, LicenseKey, normalize_key_value};
pub use repository::LicenseKeyRepository;
