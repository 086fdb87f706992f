use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use assettag_core::{CompanyId, UserId};

use crate::{Identity, Role};

/// Lifetime of an identity token. There is no refresh; expiry requires re-login.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// JWT claims model (transport-agnostic).
///
/// Timestamps are seconds since the Unix epoch, as registered JWT claims are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user the token was minted for.
    pub sub: UserId,

    /// Tenant the user belongs to.
    pub company_id: CompanyId,

    pub username: String,

    pub role: Role,

    /// Issued-at.
    pub iat: i64,

    /// Not-before.
    pub nbf: i64,

    /// Expiration.
    pub exp: i64,
}

impl Claims {
    /// Build the claim set for `identity`, valid from `now` for [`TOKEN_TTL_HOURS`].
    pub fn for_identity(identity: &Identity, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        let exp = (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp();
        Self {
            sub: identity.user_id,
            company_id: identity.company_id,
            username: identity.username.clone(),
            role: identity.role.clone(),
            iat,
            nbf: iat,
            exp,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub,
            company_id: self.company_id,
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("invalid token time window (exp <= nbf)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of a claim set.
///
/// Signature verification happens in the codec; this only looks at `nbf`/`exp`
/// so the clock can be injected by callers and tests.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.nbf {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.nbf {
        return Err(TokenValidationError::NotYetValid);
    }
    if now > claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
