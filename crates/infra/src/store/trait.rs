use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use assettag_auth::{Capability, Identity, Role, SubscriptionPlan, TrialState};
use assettag_core::{CategoryId, CompanyId, UserId};

/// Client-safe conflict messages, shared by every store implementation.
pub mod conflict {
    pub const COMPANY_CODE: &str = "Company code already exists";
    pub const COMPANY_EMAIL: &str = "Company email already registered";
    pub const USERNAME: &str = "Username already exists";
    pub const USER_EMAIL: &str = "Email already exists";
    pub const CATEGORY_NAME: &str = "Category name already exists";
    pub const OTHER: &str = "Resource already exists";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    pub id: CompanyId,
    pub company_code: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
    pub subscription_plan: SubscriptionPlan,
    pub is_active: bool,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyRecord {
    pub fn trial_state(&self) -> TrialState {
        TrialState {
            is_active: self.is_active,
            plan: self.subscription_plan,
            trial_ends_at: self.trial_ends_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub company_id: CompanyId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            company_id: self.company_id,
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompany {
    pub company_code: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub capabilities: Vec<Capability>,
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("role", &self.role)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
}

/// Everything a company registration writes, applied as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPlan {
    pub company: NewCompany,
    pub plan: SubscriptionPlan,
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// Stamped on every row the registration writes.
    pub registered_at: DateTime<Utc>,
    pub admin: NewUser,
    pub categories: Vec<NewCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub company: CompanyRecord,
    pub admin: UserRecord,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
}

impl CompanyPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.industry.is_none()
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
    /// Replaces the full grant set when present.
    pub capabilities: Option<Vec<Capability>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
            && self.password_hash.is_none()
            && self.capabilities.is_none()
    }
}

impl core::fmt::Debug for UserPatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserPatch")
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("password_changed", &self.password_hash.is_some())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

impl CategoryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.color.is_none()
            && self.is_active.is_none()
    }
}

/// Credential store operation error.
///
/// `Backend` carries diagnostic text for logs only; it must not be shown to
/// clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness rule was violated. The message is client-safe.
    #[error("{0}")]
    Conflict(String),

    #[error("record not found")]
    NotFound,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Tenant-scoped access to companies, users, capability grants and
/// asset categories.
///
/// Every user and category operation takes the caller's `CompanyId` and
/// matches on it; a row from another company is indistinguishable from a
/// missing one. Writes take their timestamp from the caller's clock.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn company_by_code(&self, code: &str) -> Result<Option<CompanyRecord>, StoreError>;

    async fn company(&self, id: CompanyId) -> Result<Option<CompanyRecord>, StoreError>;

    async fn company_code_exists(&self, code: &str) -> Result<bool, StoreError>;

    async fn company_email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Create company, admin user, grants and categories atomically.
    ///
    /// Uniqueness violations surface as `Conflict` even when a pre-check
    /// passed moments earlier.
    async fn register_company(&self, plan: RegistrationPlan) -> Result<Registered, StoreError>;

    async fn update_company(
        &self,
        id: CompanyId,
        patch: CompanyPatch,
        at: DateTime<Utc>,
    ) -> Result<CompanyRecord, StoreError>;

    /// The user only if it exists, belongs to `company_id`, and is active.
    async fn active_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// The user whether active or not, if it belongs to `company_id`.
    async fn user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<UserRecord>, StoreError>;

    async fn active_user_by_username(
        &self,
        company_id: CompanyId,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError>;

    async fn record_login(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn capabilities(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Vec<Capability>, StoreError>;

    /// Active users of the company, oldest first.
    async fn list_users(&self, company_id: CompanyId) -> Result<Vec<UserRecord>, StoreError>;

    async fn create_user(
        &self,
        company_id: CompanyId,
        user: NewUser,
        at: DateTime<Utc>,
    ) -> Result<UserRecord, StoreError>;

    /// Applies to active and deactivated users alike, so `is_active` can
    /// restore a soft-deleted account.
    async fn update_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        patch: UserPatch,
        at: DateTime<Utc>,
    ) -> Result<UserRecord, StoreError>;

    async fn deactivate_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Active categories of the company, by name.
    async fn list_categories(&self, company_id: CompanyId)
    -> Result<Vec<CategoryRecord>, StoreError>;

    async fn create_category(
        &self,
        company_id: CompanyId,
        category: NewCategory,
        at: DateTime<Utc>,
    ) -> Result<CategoryRecord, StoreError>;

    async fn update_category(
        &self,
        company_id: CompanyId,
        id: CategoryId,
        patch: CategoryPatch,
        at: DateTime<Utc>,
    ) -> Result<CategoryRecord, StoreError>;

    async fn deactivate_category(
        &self,
        company_id: CompanyId,
        id: CategoryId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
