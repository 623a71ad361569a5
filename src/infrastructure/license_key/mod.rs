//! License key infrastructure implementations
//!
//! Store backends (in-memory and PostgreSQL) and the validation/activation
//! service that runs on top of them.

mod postgres;
mod repository;
mod service;

pub use postgres::{PostgresConfig, PostgresLicenseKeyRepository, run_migrations};
pub use repository::InMemoryLicenseKeyRepository;
pub use service::LicenseService;
