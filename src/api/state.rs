//! Application state for shared services

use std::sync::Arc;

use crate::domain::license_key::LicenseKeyRepository;
use crate::domain::{Decision, DomainError};
use crate::infrastructure::license_key::LicenseService;

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub license_service: Arc<dyn LicenseServiceTrait>,
}

impl AppState {
    pub fn new(license_service: Arc<dyn LicenseServiceTrait>) -> Self {
        Self { license_service }
    }
}

/// Trait for license service operations
#[async_trait::async_trait]
pub trait LicenseServiceTrait: Send + Sync {
    async fn validate(
        &self,
        key: &str,
        owner_id: &str,
        executor: Option<&str>,
        place: Option<&str>,
    ) -> Result<Decision, DomainError>;

    async fn activate(
        &self,
        key: &str,
        owner_id: &str,
        executor: Option<&str>,
        place: Option<&str>,
    ) -> Result<Decision, DomainError>;

    async fn count(&self) -> Result<usize, DomainError>;
}

#[async_trait::async_trait]
impl<R: LicenseKeyRepository + 'static> LicenseServiceTrait for LicenseService<R> {
    async fn validate(
        &self,
        key: &str,
        owner_id: &str,
        executor: Option<&str>,
        place: Option<&str>,
    ) -> Result<Decision, DomainError> {
        LicenseService::validate(self, key, owner_id, executor, place).await
    }

    async fn activate(
        &self,
        key: &str,
        owner_id: &str,
        executor: Option<&str>,
        place: Option<&str>,
    ) -> Result<Decision, DomainError> {
        LicenseService::activate(self, key, owner_id, executor, place).await
    }

    async fn count(&self) -> Result<usize, DomainError> {
        LicenseService::count(self).await
    }
}
