//! Key validation and activation endpoints
//!
//! Wire contract kept compatible with the original deployment: request
//! fields are `key` / `userId` / `executor` / `placeId`, business
//! rejections come back as `200` with `success: false` and the rejection
//! message verbatim. Only infrastructure failures change the status code.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::domain::{Decision, LicenseKey};

use super::state::AppState;
use super::types::{ApiError, Json};

/// Body of `POST /api/validate` and `POST /api/activate`.
///
/// All fields are optional at the HTTP level: a missing `key`/`userId` is a
/// business rejection (`Missing key or userId`), not a malformed request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyCheckRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub executor: Option<String>,
    #[serde(default, rename = "placeId")]
    pub place_id: Option<String>,
}

/// Body of a validation response.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hwid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
}

impl ValidateResponse {
    fn accepted(record: &LicenseKey) -> Self {
        Self {
            success: true,
            message: Some("Key valid".to_string()),
            error: None,
            hwid: record.fingerprint().map(|fp| fp.as_str().to_string()),
            key_type: Some(record.key_type().to_string()),
            expires: Some(record.expires_at().to_rfc3339()),
            uses: Some(record.uses()),
            max_uses: Some(record.max_uses()),
        }
    }

    fn rejected(error: String) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error),
            hwid: None,
            key_type: None,
            expires: None,
            uses: None,
            max_uses: None,
        }
    }
}

impl From<Decision> for ValidateResponse {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted(record) => Self::accepted(&record),
            Decision::Rejected(reason) => Self::rejected(reason.to_string()),
        }
    }
}

/// Body of an activation response.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hwid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
}

impl From<Decision> for ActivateResponse {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted(record) => Self {
                success: true,
                message: Some("Key activated".to_string()),
                error: None,
                hwid: record.fingerprint().map(|fp| fp.as_str().to_string()),
                key_type: Some(record.key_type().to_string()),
            },
            Decision::Rejected(reason) => Self {
                success: false,
                message: None,
                error: Some(reason.to_string()),
                hwid: None,
                key_type: None,
            },
        }
    }
}

/// Service banner served at `/`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
    pub version: String,
}

/// GET /
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Keygate license key API".to_string(),
        status: "Online".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/validate
pub async fn validate_key(
    State(state): State<AppState>,
    Json(request): Json<KeyCheckRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let decision = state
        .license_service
        .validate(
            request.key.as_deref().unwrap_or(""),
            request.user_id.as_deref().unwrap_or(""),
            request.executor.as_deref(),
            request.place_id.as_deref(),
        )
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ValidateResponse::from(decision)))
}

/// POST /api/activate
pub async fn activate_key(
    State(state): State<AppState>,
    Json(request): Json<KeyCheckRequest>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let decision = state
        .license_service
        .activate(
            request.key.as_deref().unwrap_or(""),
            request.user_id.as_deref().unwrap_or(""),
            request.executor.as_deref(),
            request.place_id.as_deref(),
        )
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ActivateResponse::from(decision)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fingerprint, KeyTier, RejectReason};
    use chrono::{Duration, Utc};

    #[test]
    fn test_request_accepts_original_field_names() {
        let request: KeyCheckRequest = serde_json::from_str(
            r#"{"key":"TEST1","userId":"u1","executor":"synapse","placeId":"123"}"#,
        )
        .unwrap();

        assert_eq!(request.key.as_deref(), Some("TEST1"));
        assert_eq!(request.user_id.as_deref(), Some("u1"));
        assert_eq!(request.executor.as_deref(), Some("synapse"));
        assert_eq!(request.place_id.as_deref(), Some("123"));
    }

    #[test]
    fn test_request_tolerates_missing_fields() {
        let request: KeyCheckRequest = serde_json::from_str("{}").unwrap();
        assert!(request.key.is_none());
        assert!(request.user_id.is_none());
    }

    #[test]
    fn test_accepted_validation_payload() {
        let mut key = LicenseKey::new("TEST1-2345-6789-ABCD", Utc::now() + Duration::days(30))
            .with_max_uses(5)
            .with_tier(KeyTier::Premium);
        let fp = Fingerprint::derive("u1", Some("exec"), Some("place1"));
        key.redeem(&fp, "u1", Utc::now()).unwrap();

        let response = ValidateResponse::from(Decision::Accepted(key));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Key valid");
        assert_eq!(json["hwid"], "693a5607725a4191");
        assert_eq!(json["key_type"], "PREMIUM");
        assert_eq!(json["uses"], 1);
        assert_eq!(json["max_uses"], 5);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_rejected_validation_payload() {
        let response = ValidateResponse::from(Decision::Rejected(RejectReason::DeviceMismatch));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Key already used on different device");
        assert!(json.get("hwid").is_none());
        assert!(json.get("uses").is_none());
    }

    #[test]
    fn test_activation_payload_has_no_counters() {
        let mut key = LicenseKey::new("TEST1-2345-6789-ABCD", Utc::now() + Duration::days(30));
        let fp = Fingerprint::derive("u1", None, None);
        key.claim_activation(&fp, "u1", Utc::now()).unwrap();

        let response = ActivateResponse::from(Decision::Accepted(key));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["hwid"], "b2685dfa5a084be8");
        assert_eq!(json["key_type"], "STANDARD");
        assert!(json.get("uses").is_none());
        assert!(json.get("expires").is_none());
    }
}
