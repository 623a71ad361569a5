//! Keygate
//!
//! License key validation and activation service:
//! - Keys are bound to a device fingerprint on first successful use
//! - Expiry, ban and usage-cap rules gate every validation
//! - First-use binding and use counting are atomic per key, so racing
//!   clients can never corrupt a binding or overrun the cap
//! - Swappable storage: volatile in-memory for demonstration, PostgreSQL
//!   for production

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use api::AppState;
use api::state::LicenseServiceTrait;
use domain::{KeyTier, LicenseKey, LicenseKeyRepository};
use infrastructure::license_key::{
    InMemoryLicenseKeyRepository, LicenseService, PostgresConfig, PostgresLicenseKeyRepository,
    run_migrations,
};

/// Create the application state with the configured storage backend.
///
/// The whole bootstrap lives here, explicitly and in order: pick a backend,
/// migrate the schema (postgres only), seed the demo keys. Request handling
/// never runs any of this.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let license_service: Arc<dyn LicenseServiceTrait> = match config.storage.backend.as_str() {
        "postgres" => {
            let url = config
                .storage
                .database_url
                .clone()
                .or_else(|| std::env::var("DATABASE_URL").ok())
                .ok_or_else(|| {
                    anyhow::anyhow!("DATABASE_URL is required for the postgres storage backend")
                })?;

            info!("Using PostgreSQL key store");
            let pool = PostgresConfig::new(url).connect().await?;
            run_migrations(&pool).await?;

            let repository = Arc::new(PostgresLicenseKeyRepository::new(pool));
            seed_demo_keys(repository.as_ref()).await?;
            Arc::new(LicenseService::new(repository))
        }
        _ => {
            info!("Using in-memory key store (volatile, demonstration only)");
            let repository = Arc::new(InMemoryLicenseKeyRepository::new());
            seed_demo_keys(repository.as_ref()).await?;
            Arc::new(LicenseService::new(repository))
        }
    };

    Ok(AppState::new(license_service))
}

/// Seed the demo keys the reference deployment ships with.
///
/// Idempotent: records that already exist are left exactly as they are, so
/// restarting the process never resets a binding or a use counter.
pub async fn seed_demo_keys(repository: &dyn LicenseKeyRepository) -> anyhow::Result<()> {
    for key in demo_keys() {
        if repository.fetch(key.key_value()).await?.is_none() {
            info!(key = %key.key_value(), "Seeding demo key");
            repository.insert(key).await?;
        }
    }

    Ok(())
}

fn demo_keys() -> Vec<LicenseKey> {
    vec![
        LicenseKey::new("TEST1-2345-6789-ABCD", Utc::now() + Duration::days(30))
            .with_max_uses(5),
        LicenseKey::new("DEMO-KEY-1234-5678", Utc::now() + Duration::days(90))
            .with_tier(KeyTier::Premium)
            .with_max_uses(100),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_demo_keys_is_idempotent() {
        let repository = InMemoryLicenseKeyRepository::new();

        seed_demo_keys(&repository).await.unwrap();
        assert_eq!(repository.count().await.unwrap(), 2);

        // Bind one seeded key, then seed again: the binding must survive.
        let fingerprint = domain::Fingerprint::derive("u1", None, None);
        repository
            .redeem("TEST1-2345-6789-ABCD", &fingerprint, "u1", Utc::now())
            .await
            .unwrap();

        seed_demo_keys(&repository).await.unwrap();
        assert_eq!(repository.count().await.unwrap(), 2);

        let key = repository
            .fetch("TEST1-2345-6789-ABCD")
            .await
            .unwrap()
            .unwrap();
        assert!(key.is_used());
        assert_eq!(key.uses(), 1);
    }

    #[tokio::test]
    async fn test_create_app_state_defaults_to_in_memory() {
        let state = create_app_state(&AppConfig::default()).await.unwrap();
        assert_eq!(state.license_service.count().await.unwrap(), 2);
    }
}
