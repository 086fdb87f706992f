use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use assettag_auth::{Identity, Role};
use assettag_core::{CompanyId, UserId};
use assettag_infra::store::UserRecord;

use crate::app::errors::ApiError;

/// The caller of an authenticated request.
///
/// Inserted by the session resolver after the token verified and the
/// `(user, company)` pair resolved to an active user. Handlers take it as an
/// extractor; on routes without the resolver it rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    user: UserRecord,
}

impl AuthenticatedUser {
    pub fn new(user: UserRecord) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn company_id(&self) -> CompanyId {
        self.user.company_id
    }

    pub fn role(&self) -> &Role {
        &self.user.role
    }

    pub fn identity(&self) -> Identity {
        self.user.identity()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(ApiError::Unauthenticated("Authentication required"))
    }
}
