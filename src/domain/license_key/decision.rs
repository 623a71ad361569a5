//! Accept/reject outcomes of validation and activation attempts

use thiserror::Error;

use super::entity::LicenseKey;

/// Business-rule rejection of a validation or activation attempt.
///
/// Every variant is terminal for the request (retrying does not help) and
/// its message is presented to the client verbatim. Infrastructure failures
/// are *not* part of this taxonomy; they surface as
/// [`DomainError`](crate::domain::DomainError) so a client never confuses
/// "your key is bad" with "the service is down".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Missing key or userId")]
    MissingParameter,

    /// Unknown keys and banned keys share one message on purpose, so a
    /// caller cannot probe whether a key exists but is banned.
    #[error("Invalid key")]
    InvalidKey,

    #[error("Key already used on different device")]
    DeviceMismatch,

    #[error("Key expired")]
    Expired,

    #[error("Key usage limit reached")]
    UsageLimitReached,
}

/// Outcome of one atomic validation or activation attempt.
#[derive(Debug, Clone)]
pub enum Decision {
    /// All rules passed. Holds the record as persisted after the mutation,
    /// so callers can report the bound fingerprint and updated counters.
    Accepted(LicenseKey),
    /// A business rule rejected the attempt; the record was not changed.
    Rejected(RejectReason),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The rejection reason, if the attempt was rejected.
    pub fn rejection(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

impl From<RejectReason> for Decision {
    fn from(reason: RejectReason) -> Self {
        Self::Rejected(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_client_facing() {
        assert_eq!(
            RejectReason::MissingParameter.to_string(),
            "Missing key or userId"
        );
        assert_eq!(RejectReason::InvalidKey.to_string(), "Invalid key");
        assert_eq!(
            RejectReason::DeviceMismatch.to_string(),
            "Key already used on different device"
        );
        assert_eq!(RejectReason::Expired.to_string(), "Key expired");
        assert_eq!(
            RejectReason::UsageLimitReached.to_string(),
            "Key usage limit reached"
        );
    }

    #[test]
    fn test_rejection_accessor() {
        let decision = Decision::from(RejectReason::Expired);
        assert!(!decision.is_accepted());
        assert_eq!(decision.rejection(), Some(RejectReason::Expired));
    }
}
