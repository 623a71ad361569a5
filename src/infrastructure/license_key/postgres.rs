//! PostgreSQL license key repository
//!
//! Durable backend. Per-key atomicity for `redeem`/`activate` comes from
//! `SELECT ... FOR UPDATE` inside one transaction: the row lock serializes
//! every competing attempt on the same key value. Pool acquisition is
//! bounded so a saturated or unreachable database surfaces as a storage
//! error instead of a hung request.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::info;

use crate::domain::license_key::{
    Decision, KeyTier, LicenseKey, LicenseKeyRepository, RejectReason,
};
use crate::domain::{DomainError, Fingerprint};

/// PostgreSQL connection configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Upper bound on waiting for a pooled connection, in seconds.
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/keygate".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 30,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Open a connection pool with this configuration.
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect(&self.url)
            .await?;

        Ok(pool)
    }
}

/// Create the license key schema if it is not present yet. Idempotent;
/// invoked once by the process entry point, never from request paths.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS license_keys (
            key_value    TEXT PRIMARY KEY,
            fingerprint  TEXT,
            owner_id     TEXT,
            generated_at TIMESTAMPTZ NOT NULL,
            activated_at TIMESTAMPTZ,
            expires_at   TIMESTAMPTZ NOT NULL,
            is_used      BOOLEAN NOT NULL DEFAULT FALSE,
            is_banned    BOOLEAN NOT NULL DEFAULT FALSE,
            key_type     TEXT NOT NULL DEFAULT 'STANDARD',
            uses         INTEGER NOT NULL DEFAULT 0,
            max_uses     INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("License key schema is up to date");
    Ok(())
}

/// PostgreSQL implementation of [`LicenseKeyRepository`].
#[derive(Debug, Clone)]
pub struct PostgresLicenseKeyRepository {
    pool: PgPool,
}

impl PostgresLicenseKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "key_value, fingerprint, owner_id, generated_at, activated_at, \
                              expires_at, is_used, is_banned, key_type, uses, max_uses";

fn key_from_row(row: &PgRow) -> Result<LicenseKey, DomainError> {
    let tier_label: String = row.try_get("key_type")?;
    let key_type = KeyTier::parse(&tier_label).ok_or_else(|| {
        DomainError::storage(format!("unknown key tier label '{tier_label}'"))
    })?;

    Ok(LicenseKey {
        key_value: row.try_get("key_value")?,
        fingerprint: row
            .try_get::<Option<String>, _>("fingerprint")?
            .map(Fingerprint::new),
        owner_id: row.try_get("owner_id")?,
        generated_at: row.try_get("generated_at")?,
        activated_at: row.try_get("activated_at")?,
        expires_at: row.try_get("expires_at")?,
        is_used: row.try_get("is_used")?,
        is_banned: row.try_get("is_banned")?,
        key_type,
        uses: row.try_get::<i32, _>("uses")? as u32,
        max_uses: row.try_get::<i32, _>("max_uses")? as u32,
    })
}

/// Persist the columns the lifecycle transitions touch.
async fn store_transition(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    key: &LicenseKey,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        UPDATE license_keys
        SET fingerprint = $2, owner_id = $3, activated_at = $4, is_used = $5, uses = $6
        WHERE key_value = $1
        "#,
    )
    .bind(key.key_value())
    .bind(key.fingerprint().map(Fingerprint::as_str))
    .bind(key.owner_id())
    .bind(key.activated_at())
    .bind(key.is_used())
    .bind(key.uses() as i32)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl LicenseKeyRepository for PostgresLicenseKeyRepository {
    async fn fetch(&self, key_value: &str) -> Result<Option<LicenseKey>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM license_keys WHERE key_value = $1"
        ))
        .bind(key_value)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(key_from_row).transpose()
    }

    async fn insert(&self, key: LicenseKey) -> Result<LicenseKey, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO license_keys
                (key_value, fingerprint, owner_id, generated_at, activated_at,
                 expires_at, is_used, is_banned, key_type, uses, max_uses)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(key.key_value())
        .bind(key.fingerprint().map(Fingerprint::as_str))
        .bind(key.owner_id())
        .bind(key.generated_at())
        .bind(key.activated_at())
        .bind(key.expires_at())
        .bind(key.is_used())
        .bind(key.is_banned())
        .bind(key.key_type().as_str())
        .bind(key.uses() as i32)
        .bind(key.max_uses() as i32)
        .execute(&self.pool)
        .await?;

        Ok(key)
    }

    async fn list(&self) -> Result<Vec<LicenseKey>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM license_keys ORDER BY generated_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(key_from_row).collect()
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM license_keys")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get::<i64, _>("total")? as usize)
    }

    async fn redeem(
        &self,
        key_value: &str,
        fingerprint: &Fingerprint,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, DomainError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM license_keys WHERE key_value = $1 FOR UPDATE"
        ))
        .bind(key_value)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(Decision::Rejected(RejectReason::InvalidKey));
        };
        let mut key = key_from_row(&row)?;

        match key.redeem(fingerprint, owner_id, now) {
            Ok(()) => {
                store_transition(&mut tx, &key).await?;
                tx.commit().await?;
                Ok(Decision::Accepted(key))
            }
            // Dropping the transaction rolls back; nothing was written.
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
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM license_keys WHERE key_value = $1 FOR UPDATE"
        ))
        .bind(key_value)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(Decision::Rejected(RejectReason::InvalidKey));
        };
        let mut key = key_from_row(&row)?;

        match key.claim_activation(fingerprint, owner_id, now) {
            Ok(()) => {
                store_transition(&mut tx, &key).await?;
                tx.commit().await?;
                Ok(Decision::Accepted(key))
            }
            Err(reason) => Ok(Decision::Rejected(reason)),
        }
    }
}
