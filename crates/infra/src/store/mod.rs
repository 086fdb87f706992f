//! Credential store boundary.
//!
//! Companies, users, capability grants and asset categories live behind one
//! async trait so the request pipeline can run against Postgres in
//! production and an in-memory map in tests.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;
pub use r#trait::{
    CategoryPatch, CategoryRecord, CompanyPatch, CompanyRecord, CredentialStore, NewCategory,
    NewCompany, NewUser, Registered, RegistrationPlan, StoreError, UserPatch, UserRecord,
    conflict,
};
