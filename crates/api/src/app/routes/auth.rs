use axum::{extract::Extension, response::Response};

use assettag_auth::{hash_password, verify_against_dummy, verify_password};
use assettag_infra::store::{NewCompany, RegistrationPlan, conflict};
use assettag_infra::{AdminAccount, generate_company_code};

use crate::app::dto::{
    self, JsonBody, LoginRequest, LoginResponse, MeResponse, RegisterCompanyRequest,
    RegisterResponse,
};
use crate::app::errors::{self, ApiError};
use crate::app::services::AppState;
use crate::context::AuthenticatedUser;

/// Unknown company, unknown user and wrong password all end here.
pub async fn login(
    Extension(state): Extension<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, ApiError> {
    let username = dto::required("username", &req.username)?;
    if req.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }
    let company_code = dto::required("companyCode", req.company_code.as_deref().unwrap_or_default())?;
    let now = state.now();

    let company = match state.store.company_by_code(&company_code).await? {
        Some(company) if company.is_active => company,
        _ => {
            burn_verification(req.password).await?;
            tracing::info!(company_code = %company_code, "login rejected: unknown or inactive company");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if company.trial_state().is_expired(now) {
        tracing::info!(company_id = %company.id, "login rejected: trial expired");
        return Err(ApiError::TrialExpired {
            plan: company.subscription_plan,
        });
    }

    let user = state.store.active_user_by_username(company.id, &username).await?;
    let mut user = match user {
        Some(user) => {
            let digest = user.password_hash.clone();
            let password = req.password;
            let matches = blocking(move || verify_password(&password, &digest)).await?;
            if !matches {
                tracing::info!(company_id = %company.id, user_id = %user.id, "login rejected: wrong password");
                return Err(ApiError::InvalidCredentials);
            }
            user
        }
        None => {
            burn_verification(req.password).await?;
            tracing::info!(company_id = %company.id, "login rejected: unknown user");
            return Err(ApiError::InvalidCredentials);
        }
    };

    match state.store.record_login(company.id, user.id, now).await {
        Ok(()) => user.last_login = Some(now),
        Err(e) => tracing::warn!(error = %e, user_id = %user.id, "failed to record last login"),
    }

    let issued = state.tokens.issue(&user.identity(), now)?;
    let expires_at = issued.claims.expires_at().ok_or(ApiError::Internal)?;
    let roles = state.store.capabilities(company.id, user.id).await?;

    tracing::info!(company_id = %company.id, user_id = %user.id, "login succeeded");

    Ok(errors::ok_with_message(
        "Login successful",
        LoginResponse {
            token: issued.token,
            user,
            company,
            expires_at,
            roles,
        },
    ))
}

/// Create a trial company with its admin user, grants and default categories.
pub async fn register_company(
    Extension(state): Extension<AppState>,
    JsonBody(req): JsonBody<RegisterCompanyRequest>,
) -> Result<Response, ApiError> {
    let company_name = dto::required("companyName", &req.company_name)?;
    let company_email = dto::email("email", &req.email)?;
    let admin = req
        .admin_user
        .ok_or_else(|| ApiError::validation("adminUser is required"))?;
    let admin_username = dto::required("adminUser.username", &admin.username)?;
    let admin_email = dto::email("adminUser.email", &admin.email)?;
    dto::password(&admin.password)?;

    let now = state.now();
    let company_code = dto::optional(req.company_code)
        .unwrap_or_else(|| generate_company_code(&company_name, now));

    if state.store.company_code_exists(&company_code).await? {
        return Err(ApiError::Conflict(conflict::COMPANY_CODE.to_string()));
    }
    if state.store.company_email_exists(&company_email).await? {
        return Err(ApiError::Conflict(conflict::COMPANY_EMAIL.to_string()));
    }

    let password = admin.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let plan = RegistrationPlan::trial(
        NewCompany {
            company_code,
            name: company_name,
            email: company_email,
            phone: dto::optional(req.phone),
            address: dto::optional(req.address),
            industry: dto::optional(req.industry),
        },
        AdminAccount {
            username: admin_username,
            email: admin_email,
            password_hash,
            first_name: dto::optional(admin.first_name),
            last_name: dto::optional(admin.last_name),
        },
        now,
    );

    let registered = state.store.register_company(plan).await?;
    let issued = state.tokens.issue(&registered.admin.identity(), now)?;
    let expires_at = issued.claims.expires_at().ok_or(ApiError::Internal)?;

    tracing::info!(
        company_id = %registered.company.id,
        company_code = %registered.company.company_code,
        "company registered"
    );

    Ok(errors::created(
        "Company registered successfully",
        RegisterResponse {
            company_id: registered.company.id,
            user_id: registered.admin.id,
            company_code: registered.company.company_code.clone(),
            token: issued.token,
            expires_at,
            company: registered.company,
            user: registered.admin,
        },
    ))
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout(caller: AuthenticatedUser) -> Response {
    tracing::info!(user_id = %caller.user_id(), "logout");
    errors::ok_message("Logged out successfully")
}

pub async fn me(
    Extension(state): Extension<AppState>,
    caller: AuthenticatedUser,
) -> Result<Response, ApiError> {
    let capabilities = state
        .store
        .capabilities(caller.company_id(), caller.user_id())
        .await?;
    Ok(errors::ok(MeResponse {
        user: caller.user().clone(),
        capabilities,
    }))
}

async fn burn_verification(password: String) -> Result<(), ApiError> {
    blocking(move || verify_against_dummy(&password)).await
}

/// Run bcrypt work off the async workers.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "blocking task failed");
        ApiError::Internal
    })
}
