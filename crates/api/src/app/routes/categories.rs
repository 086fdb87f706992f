use axum::{
    Router,
    extract::{Extension, Path},
    response::Response,
    routing::{get, put},
};

use assettag_core::CategoryId;
use assettag_infra::store::NewCategory;
use assettag_infra::{DEFAULT_CATEGORY_COLOR, StoreError};

use crate::app::dto::{self, CreateCategoryRequest, JsonBody, UpdateCategoryRequest};
use crate::app::errors::{self, ApiError};
use crate::app::services::AppState;
use crate::context::AuthenticatedUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

pub async fn list_categories(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
) -> Result<Response, ApiError> {
    let categories = state.store.list_categories(caller.company_id()).await?;
    Ok(errors::ok(categories))
}

pub async fn create_category(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
    JsonBody(body): JsonBody<CreateCategoryRequest>,
) -> Result<Response, ApiError> {
    let name = dto::required("name", &body.name)?;
    let color = match dto::optional(body.color) {
        Some(color) => dto::color(&color)?,
        None => DEFAULT_CATEGORY_COLOR.to_string(),
    };

    let category = state
        .store
        .create_category(
            caller.company_id(),
            NewCategory {
                name,
                description: dto::optional(body.description),
                color,
            },
            state.now(),
        )
        .await?;

    tracing::info!(company_id = %caller.company_id(), category_id = %category.id, "category created");
    Ok(errors::created("Category created successfully", category))
}

pub async fn update_category(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateCategoryRequest>,
) -> Result<Response, ApiError> {
    let id: CategoryId = id.parse()?;
    let patch = body.into_patch()?;
    if patch.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let category = state
        .store
        .update_category(caller.company_id(), id, patch, state.now())
        .await
        .map_err(category_not_found)?;

    Ok(errors::ok_with_message("Category updated successfully", category))
}

/// Soft delete.
pub async fn delete_category(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: CategoryId = id.parse()?;
    state
        .store
        .deactivate_category(caller.company_id(), id, state.now())
        .await
        .map_err(category_not_found)?;

    tracing::info!(company_id = %caller.company_id(), category_id = %id, "category deactivated");
    Ok(errors::ok_message("Category deleted successfully"))
}

fn category_not_found(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::NotFound("Category not found"),
        other => other.into(),
    }
}
