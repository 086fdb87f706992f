//! Consistent response envelopes.
//!
//! Every body is `{success, message?, data?, error?}`. Failures carry a
//! machine-readable `error` code and a human `message`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use assettag_auth::{PasswordError, SubscriptionPlan, TokenError};
use assettag_core::DomainError;
use assettag_infra::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is suspended. Please contact support.")]
    AccountSuspended,

    #[error("Trial period has expired. Please upgrade your subscription to continue.")]
    TrialExpired { plan: SubscriptionPlan },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Details go to the log, never to the client.
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::AccountSuspended | ApiError::TrialExpired { .. } | ApiError::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::AccountSuspended => "account_suspended",
            ApiError::TrialExpired { .. } => "trial_expired",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::Internal => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.code(),
            "message": self.to_string(),
        });
        if let ApiError::TrialExpired { plan } = &self {
            body["data"] = json!({
                "trialExpired": true,
                "requiresPayment": true,
                "subscriptionPlan": plan,
            });
        }
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::NotFound => ApiError::NotFound("Resource not found"),
            StoreError::Backend(detail) => {
                tracing::error!(error = %detail, "credential store failure");
                ApiError::Internal
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidId(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "password hashing failed");
        ApiError::Internal
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encode(_) | TokenError::WeakSecret => {
                tracing::error!(error = %err, "token issuance failed");
                ApiError::Internal
            }
            TokenError::Malformed | TokenError::Window(_) => ApiError::Unauthenticated("Invalid token"),
        }
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, None, Some(data))
}

pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    respond(StatusCode::CREATED, Some(message), Some(data))
}

pub fn ok_with_message<T: Serialize>(message: &str, data: T) -> Response {
    respond(StatusCode::OK, Some(message), Some(data))
}

pub fn ok_message(message: &str) -> Response {
    respond::<()>(StatusCode::OK, Some(message), None)
}

fn respond<T: Serialize>(status: StatusCode, message: Option<&str>, data: Option<T>) -> Response {
    (
        status,
        Json(ApiResponse {
            success: true,
            message: message.map(str::to_string),
            data,
        }),
    )
        .into_response()
}
