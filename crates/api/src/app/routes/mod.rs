use axum::{
    Router,
    routing::{get, post},
};

use assettag_auth::Role;

use crate::app::errors::ApiError;
use crate::context::AuthenticatedUser;

pub mod auth;
pub mod categories;
pub mod company;
pub mod system;
pub mod trial;
pub mod users;

/// Routes reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/api/login", post(auth::login))
        .route("/api/register/company", post(auth::register_company))
        .route("/create-account", post(auth::register_company))
}

/// Authenticated routes that stay reachable after the trial ends, so the
/// tenant can see its status and upgrade.
pub fn account_router() -> Router {
    Router::new()
        .route("/api/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        .nest("/api/trial", trial::router())
        .nest("/api/company", company::router())
}

/// Authenticated routes that also require a live subscription.
pub fn gated_router() -> Router {
    Router::new()
        .nest("/api/users", users::router())
        .nest("/api/categories", categories::router())
}

/// Role check for handlers restricted to `allowed` roles.
pub(crate) fn require_role(caller: &AuthenticatedUser, allowed: &[&str]) -> Result<(), ApiError> {
    assettag_auth::require_any_role(&caller.identity(), allowed).map_err(|e| {
        tracing::info!(user_id = %caller.user_id(), role = %caller.role().as_str(), "role check failed");
        ApiError::forbidden(format!("Insufficient permissions: {e}"))
    })
}

pub(crate) const ADMIN_ONLY: &[&str] = &[Role::ADMIN];
pub(crate) const USER_ADMINS: &[&str] = &[Role::ADMIN, Role::MANAGER];
