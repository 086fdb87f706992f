//! `assettag-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it signs and
//! verifies identity tokens, hashes passwords, and decides trial/subscription
//! access from already-loaded company state.

pub mod authorize;
pub mod capability;
pub mod claims;
pub mod password;
pub mod principal;
pub mod roles;
pub mod subscription;
pub mod token;

pub use authorize::{AuthzError, may_assign_role, require_any_role};
pub use capability::Capability;
pub use claims::{Claims, TOKEN_TTL_HOURS, TokenValidationError, validate_claims};
pub use password::{PasswordError, hash_password, verify_against_dummy, verify_password};
pub use principal::Identity;
pub use roles::Role;
pub use subscription::{
    AccessDenial, PlanOffer, SubscriptionPlan, TRIAL_PERIOD_DAYS, TrialState, TrialStatus,
    plan_catalogue,
};
pub use token::{Hs256TokenCodec, IssuedToken, MIN_SECRET_LEN, TokenCodec, TokenError};
