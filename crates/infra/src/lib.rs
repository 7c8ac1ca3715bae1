//! Infrastructure layer: configuration, persistence and the application
//! services the HTTP layer calls into.

pub mod config;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError, LogFormat, StockReservation};
pub use services::{ErrorClass, ServiceError, ServiceResult, Services};
pub use store::{Repositories, StoreError};
