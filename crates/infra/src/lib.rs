//! Infrastructure layer: configuration, Postgres pool, credential store.

pub mod config;
pub mod db;
pub mod registration;
pub mod store;

pub use config::{AppConfig, ConfigError, DatabaseConfig, StoreBackend};
pub use registration::{AdminAccount, DEFAULT_CATEGORY_COLOR, default_categories, generate_company_code};
pub use store::{CredentialStore, InMemoryCredentialStore, PostgresCredentialStore, StoreError};
