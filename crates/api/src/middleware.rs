use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use assettag_auth::AccessDenial;

use crate::app::errors::ApiError;
use crate::app::services::AppState;
use crate::context::AuthenticatedUser;

/// Session resolver: bearer token -> verified claims -> active user.
///
/// The store is consulted on every request, so deactivating a user revokes
/// tokens already handed out.
pub async fn session_resolver(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.tokens.verify(token, state.now()).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        ApiError::Unauthenticated("Invalid token")
    })?;

    let user = state
        .store
        .active_user(claims.company_id, claims.sub)
        .await?
        .ok_or(ApiError::Unauthenticated("User not found or inactive"))?;

    req.extensions_mut().insert(AuthenticatedUser::new(user));
    Ok(next.run(req).await)
}

/// Tenant trial gate. Must run after [`session_resolver`].
pub async fn trial_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let company_id = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(AuthenticatedUser::company_id)
        .ok_or(ApiError::Unauthenticated("Authentication required"))?;

    let company = state
        .store
        .company(company_id)
        .await?
        .ok_or(ApiError::AccountSuspended)?;

    company
        .trial_state()
        .check_access(state.now())
        .map_err(|denial| {
            tracing::info!(company_id = %company_id, ?denial, "request blocked by trial gate");
            match denial {
                AccessDenial::Suspended => ApiError::AccountSuspended,
                AccessDenial::TrialExpired { plan } => ApiError::TrialExpired { plan },
            }
        })?;

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(ApiError::Unauthenticated("Authorization header required"))?;

    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("Bearer token required"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated("Bearer token required"))?
        .trim();

    if token.is_empty() {
        return Err(ApiError::Unauthenticated("Bearer token required"));
    }

    Ok(token)
}
