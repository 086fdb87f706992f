use axum::{
    Router,
    extract::{Extension, Path},
    response::Response,
    routing::get,
};

use assettag_auth::{hash_password, may_assign_role};
use assettag_core::UserId;
use assettag_infra::StoreError;
use assettag_infra::store::{NewUser, UserPatch, UserRecord};

use crate::app::dto::{self, CreateUserRequest, JsonBody, UpdateUserRequest, UserView};
use crate::app::errors::{self, ApiError};
use crate::app::routes::auth::blocking;
use crate::app::routes::{USER_ADMINS, require_role};
use crate::app::services::AppState;
use crate::context::AuthenticatedUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

pub async fn list_users(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
) -> Result<Response, ApiError> {
    let users = state.store.list_users(caller.company_id()).await?;
    let mut views = Vec::with_capacity(users.len());
    for user in users {
        views.push(with_capabilities(&state, user).await?);
    }
    Ok(errors::ok(views))
}

pub async fn get_user(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: UserId = id.parse()?;
    let user = state
        .store
        .active_user(caller.company_id(), id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(errors::ok(with_capabilities(&state, user).await?))
}

pub async fn create_user(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> Result<Response, ApiError> {
    require_role(&caller, USER_ADMINS)?;

    let username = dto::required("username", &body.username)?;
    let email = dto::email("email", &body.email)?;
    dto::password(&body.password)?;
    let role = match dto::optional(body.role) {
        Some(role) => dto::role(&role)?,
        None => Default::default(),
    };
    if !may_assign_role(&caller.identity(), &role) {
        return Err(ApiError::forbidden("Only admins can create admin users"));
    }
    let capabilities = dto::capabilities(&body.capabilities)?;

    let password = body.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let user = state
        .store
        .create_user(
            caller.company_id(),
            NewUser {
                username,
                email,
                password_hash,
                first_name: dto::optional(body.first_name),
                last_name: dto::optional(body.last_name),
                role,
                capabilities,
            },
            state.now(),
        )
        .await?;

    tracing::info!(
        company_id = %caller.company_id(),
        user_id = %user.id,
        created_by = %caller.user_id(),
        "user created"
    );

    let view = with_capabilities(&state, user).await?;
    Ok(errors::created("User created successfully", view))
}

pub async fn update_user(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> Result<Response, ApiError> {
    require_role(&caller, USER_ADMINS)?;
    let id: UserId = id.parse()?;
    guard_admin_target(&state, &caller, id).await?;

    if id == caller.user_id() && body.is_active == Some(false) {
        return Err(ApiError::validation("Cannot deactivate your own account"));
    }

    let role = match dto::optional(body.role) {
        Some(role) => {
            let role = dto::role(&role)?;
            if !may_assign_role(&caller.identity(), &role) {
                return Err(ApiError::forbidden("Only admins can grant the admin role"));
            }
            Some(role)
        }
        None => None,
    };
    let email = match dto::optional(body.email) {
        Some(email) => Some(dto::email("email", &email)?),
        None => None,
    };
    let capabilities = match body.capabilities {
        Some(names) => Some(dto::capabilities(&names)?),
        None => None,
    };
    let password_hash = match body.password.filter(|p| !p.is_empty()) {
        Some(password) => {
            dto::password(&password)?;
            Some(blocking(move || hash_password(&password)).await??)
        }
        None => None,
    };

    let patch = UserPatch {
        email,
        first_name: dto::optional(body.first_name),
        last_name: dto::optional(body.last_name),
        role,
        is_active: body.is_active,
        password_hash,
        capabilities,
    };
    if patch.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let user = state
        .store
        .update_user(caller.company_id(), id, patch, state.now())
        .await
        .map_err(user_not_found)?;
    tracing::info!(
        company_id = %caller.company_id(),
        user_id = %user.id,
        updated_by = %caller.user_id(),
        "user updated"
    );

    let view = with_capabilities(&state, user).await?;
    Ok(errors::ok_with_message("User updated successfully", view))
}

/// Soft delete: the row stays, the account stops resolving.
pub async fn delete_user(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_role(&caller, USER_ADMINS)?;
    let id: UserId = id.parse()?;

    if id == caller.user_id() {
        return Err(ApiError::validation("Cannot delete your own account"));
    }
    guard_admin_target(&state, &caller, id).await?;

    state
        .store
        .deactivate_user(caller.company_id(), id, state.now())
        .await
        .map_err(user_not_found)?;

    tracing::info!(
        company_id = %caller.company_id(),
        user_id = %id,
        deleted_by = %caller.user_id(),
        "user deactivated"
    );
    Ok(errors::ok_message("User deleted successfully"))
}

/// Only admins may modify an admin row, deactivated ones included.
async fn guard_admin_target(
    state: &AppState,
    caller: &AuthenticatedUser,
    target: UserId,
) -> Result<(), ApiError> {
    if caller.role().is_admin() {
        return Ok(());
    }
    let target = state.store.user(caller.company_id(), target).await?;
    if target.is_some_and(|t| t.role.is_admin()) {
        return Err(ApiError::forbidden("Only admins can modify admin users"));
    }
    Ok(())
}

async fn with_capabilities(state: &AppState, user: UserRecord) -> Result<UserView, ApiError> {
    let capabilities = state.store.capabilities(user.company_id, user.id).await?;
    Ok(UserView { user, capabilities })
}

fn user_not_found(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::NotFound("User not found"),
        other => other.into(),
    }
}
