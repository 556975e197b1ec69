use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Mission and assignment errors
/// - E3xxx: Report errors
/// - E4xxx: User errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,

    // Auth (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    TokenExpired,
    TokenInvalid,
    PasswordTooWeak,
    AccountInactive,

    // Missions (E2xxx)
    MissionNotFound,
    MissionNotAvailable,
    AlreadyAssigned,
    InvalidTransition,
    NotAssigned,
    MissionLocked,

    // Reports (E3xxx)
    ReportNotFound,
    ReportAlreadyReviewed,
    ReportNotSubmitted,
    ReportNotOwned,

    // Users (E4xxx)
    UserNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0006",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::TokenExpired => "E1003",
            Self::TokenInvalid => "E1004",
            Self::PasswordTooWeak => "E1005",
            Self::AccountInactive => "E1006",

            // Missions
            Self::MissionNotFound => "E2001",
            Self::MissionNotAvailable => "E2002",
            Self::AlreadyAssigned => "E2003",
            Self::InvalidTransition => "E2004",
            Self::NotAssigned => "E2005",
            Self::MissionLocked => "E2006",

            // Reports
            Self::ReportNotFound => "E3001",
            Self::ReportAlreadyReviewed => "E3002",
            Self::ReportNotSubmitted => "E3003",
            Self::ReportNotOwned => "E3004",

            // Users
            Self::UserNotFound => "E4001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak
            | Self::MissionNotAvailable | Self::InvalidTransition
            | Self::MissionLocked | Self::ReportAlreadyReviewed
            | Self::ReportNotSubmitted => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::MissionNotFound | Self::ReportNotFound
            | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::AccountInactive | Self::NotAssigned
            | Self::ReportNotOwned => StatusCode::FORBIDDEN,
            Self::EmailAlreadyExists | Self::AlreadyAssigned => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    /// Field-keyed validation failures, surfaced as the `errors` map.
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Logged in full; the client only sees a generic message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(message.into()))
    }

    /// Single-field validation failure.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), message.into());
        Self::Validation(errors)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Internal(_) | AppError::Database(_) | AppError::Pool(_) => {
                ErrorCode::InternalError
            }
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let errors = errs
            .field_errors()
            .into_iter()
            .map(|(field, list)| {
                let message = list
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{field} is invalid"));
                (camel_case(field), message)
            })
            .collect();
        Self::Validation(errors)
    }
}

/// Request bodies are camelCase; validator reports Rust field names.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message } => {
                (code.status_code(), ApiErrorResponse::new(code.code(), message))
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Pool(err) => {
                tracing::error!(error = %err, "database pool unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "database unavailable"),
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", "validation failed").with_errors(errors.clone()),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
