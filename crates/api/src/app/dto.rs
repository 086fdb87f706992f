use axum::Json;
use axum::extract::{FromRequest, Request};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use assettag_auth::{Capability, Role};
use assettag_infra::store::{CategoryPatch, CompanyPatch, CompanyRecord, UserRecord};

use crate::app::errors::ApiError;

const MIN_PASSWORD_LEN: usize = 6;

/// `Json<T>` whose rejection uses the standard error envelope (400).
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(format!("Invalid request body: {}", e.body_text())))?;
        Ok(Self(value))
    }
}

// -------------------------
// Field validation
// -------------------------

/// Trimmed, non-empty value of a required field.
pub fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// `None` for absent or blank input.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn email(field: &str, value: &str) -> Result<String, ApiError> {
    let value = required(field, value)?;
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::validation(format!("{field} must be a valid email address")));
    }
    Ok(value)
}

pub fn password(value: &str) -> Result<&str, ApiError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(value)
}

pub fn role(value: &str) -> Result<Role, ApiError> {
    match value.trim() {
        Role::ADMIN => Ok(Role::admin()),
        Role::MANAGER => Ok(Role::manager()),
        Role::USER => Ok(Role::user()),
        other => Err(ApiError::validation(format!(
            "unknown role '{other}'; expected admin, manager or user"
        ))),
    }
}

pub fn capabilities(names: &[String]) -> Result<Vec<Capability>, ApiError> {
    let mut parsed = names
        .iter()
        .map(|n| n.trim().parse::<Capability>().map_err(ApiError::Validation))
        .collect::<Result<Vec<_>, _>>()?;
    parsed.sort();
    parsed.dedup();
    Ok(parsed)
}

/// `#rrggbb`.
pub fn color(value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ApiError::validation("color must look like #rrggbb"));
    }
    Ok(value.to_string())
}

// -------------------------
// Auth
// -------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "company_code")]
    pub company_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: UserRecord,
    pub company: CompanyRecord,
    pub expires_at: DateTime<Utc>,
    pub roles: Vec<Capability>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, alias = "last_name")]
    pub last_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCompanyRequest {
    #[serde(default, alias = "company_name")]
    pub company_name: String,
    #[serde(default, alias = "company_code")]
    pub company_code: Option<String>,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
    #[serde(alias = "admin_user")]
    pub admin_user: Option<AdminUserRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub company_id: assettag_core::CompanyId,
    pub user_id: assettag_core::UserId,
    pub company_code: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub company: CompanyRecord,
    pub user: UserRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: UserRecord,
    pub capabilities: Vec<Capability>,
}

// -------------------------
// Company
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCompanyRequest {
    #[serde(alias = "company_name")]
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
}

impl UpdateCompanyRequest {
    pub fn into_patch(self) -> Result<CompanyPatch, ApiError> {
        let name = match optional(self.name) {
            Some(n) => Some(required("name", &n)?),
            None => None,
        };
        let email = match optional(self.email) {
            Some(e) => Some(email("email", &e)?),
            None => None,
        };
        Ok(CompanyPatch {
            name,
            email,
            phone: optional(self.phone),
            address: optional(self.address),
            industry: optional(self.industry),
        })
    }
}

// -------------------------
// Users
// -------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(alias = "last_name")]
    pub last_name: Option<String>,
    pub role: Option<String>,
    /// Capability names; `roles` is accepted for older clients.
    #[serde(default, alias = "roles")]
    pub capabilities: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    #[serde(alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(alias = "last_name")]
    pub last_name: Option<String>,
    pub role: Option<String>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
    pub password: Option<String>,
    #[serde(alias = "roles")]
    pub capabilities: Option<Vec<String>>,
}

/// A user together with its capability grants.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub user: UserRecord,
    pub capabilities: Vec<Capability>,
}

// -------------------------
// Categories
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

impl UpdateCategoryRequest {
    pub fn into_patch(self) -> Result<CategoryPatch, ApiError> {
        let name = match self.name {
            Some(n) => Some(required("name", &n)?),
            None => None,
        };
        let color = match optional(self.color) {
            Some(c) => Some(color(&c)?),
            None => None,
        };
        Ok(CategoryPatch {
            name,
            description: optional(self.description),
            color,
            is_active: self.is_active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_is_checked() {
        assert!(email("email", "ops@acme.test").is_ok());
        assert!(email("email", " ops@acme.test ").is_ok());
        assert!(email("email", "ops@acme").is_err());
        assert!(email("email", "@acme.test").is_err());
        assert!(email("email", "o ps@acme.test").is_err());
        assert!(email("email", "").is_err());
    }

    #[test]
    fn capabilities_are_parsed_and_deduplicated() {
        let caps = capabilities(&[
            "viewReports".to_string(),
            "userManagement".to_string(),
            "viewReports".to_string(),
        ])
        .unwrap();
        assert_eq!(caps, vec![Capability::UserManagement, Capability::ViewReports]);
        assert!(capabilities(&["rootAccess".to_string()]).is_err());
    }

    #[test]
    fn empty_category_update_is_an_empty_patch() {
        let patch = UpdateCategoryRequest {
            name: None,
            description: None,
            color: None,
            is_active: None,
        }
        .into_patch()
        .unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn blank_category_name_is_rejected() {
        let err = UpdateCategoryRequest {
            name: Some("  ".to_string()),
            description: None,
            color: None,
            is_active: None,
        }
        .into_patch()
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn colors_must_be_hex() {
        assert_eq!(color("#00ff7F").unwrap(), "#00ff7F");
        assert!(color("blue").is_err());
        assert!(color("#12345").is_err());
    }
}
