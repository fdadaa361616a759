//! Infrastructure layer: remote datastore, analysis backend client, config.

pub mod config;
pub mod job_status;
pub mod rest;
pub mod store;

pub use config::{AppConfig, BackendConfig, ConfigError, LogFormat};
pub use job_status::HttpJobStatusBackend;
pub use rest::RestExpenseStore;
pub use store::{ExpenseStore, ExpenseStoreError, InMemoryExpenseStore};
