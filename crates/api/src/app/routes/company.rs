use axum::{
    Router,
    extract::Extension,
    response::Response,
    routing::get,
};

use crate::app::dto::{JsonBody, UpdateCompanyRequest};
use crate::app::errors::{self, ApiError};
use crate::app::routes::{ADMIN_ONLY, require_role};
use crate::app::services::AppState;
use crate::context::AuthenticatedUser;

pub fn router() -> Router {
    Router::new().route("/", get(get_company).put(update_company))
}

pub async fn get_company(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
) -> Result<Response, ApiError> {
    let company = state
        .store
        .company(caller.company_id())
        .await?
        .ok_or(ApiError::NotFound("Company not found"))?;
    Ok(errors::ok(company))
}

pub async fn update_company(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
    JsonBody(body): JsonBody<UpdateCompanyRequest>,
) -> Result<Response, ApiError> {
    require_role(&caller, ADMIN_ONLY)?;

    let patch = body.into_patch()?;
    if patch.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let company = state
        .store
        .update_company(caller.company_id(), patch, state.now())
        .await?;
    tracing::info!(company_id = %company.id, user_id = %caller.user_id(), "company profile updated");

    Ok(errors::ok_with_message("Company updated successfully", company))
}
