//! Infrastructure layer - storage backends and service implementations

pub mod license_key;
pub mod logging;
