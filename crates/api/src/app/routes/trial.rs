use axum::{Router, extract::Extension, response::Response, routing::get};

use assettag_auth::plan_catalogue;

use crate::app::errors::{self, ApiError};
use crate::app::services::AppState;
use crate::context::AuthenticatedUser;

pub fn router() -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/plans", get(plans))
}

pub async fn status(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
) -> Result<Response, ApiError> {
    let company = state
        .store
        .company(caller.company_id())
        .await?
        .ok_or(ApiError::NotFound("Company not found"))?;

    Ok(errors::ok(company.trial_state().status(state.now())))
}

pub async fn plans() -> Response {
    errors::ok(plan_catalogue())
}
