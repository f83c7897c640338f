//! HTTP-facing error type.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::directory::DirectoryError;
use crate::profile::ProfileError;

/// Errors returned to API clients.
///
/// Variants carrying a `String` keep internal detail for logs; it is never
/// written to the response body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Full authentication is required to access this resource.")]
    AuthenticationRequired,

    #[error("Invalid bearer token.")]
    InvalidToken,

    #[error("User profile setup is incomplete.")]
    ProfileSetupRequired,

    #[error("Email mismatch between token and request.")]
    EmailMismatch,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Failed to create profile: {0}")]
    ProfileCreationFailed(String),

    #[error("User not found, profile setup likely incomplete: {0}")]
    UserRecordMissing(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::ProfileSetupRequired => StatusCode::FORBIDDEN,
            AppError::EmailMismatch | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::ProfileCreationFailed(_)
            | AppError::UserRecordMissing(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            AppError::AuthenticationRequired | AppError::InvalidToken => json!({
                "error": "UNAUTHORIZED",
                "message": self.to_string(),
            }),
            AppError::ProfileSetupRequired => json!({
                "error": "PROFILE_SETUP_REQUIRED",
                "message": self.to_string(),
            }),
            AppError::EmailMismatch | AppError::BadRequest(_) | AppError::Conflict(_) => {
                json!({ "error": self.to_string() })
            }
            AppError::ProfileCreationFailed(_) => json!({ "error": "Failed to create profile." }),
            AppError::UserRecordMissing(_) => {
                json!({ "error": "User not found, profile setup likely incomplete." })
            }
            AppError::NotFound => json!({ "error": "NOT_FOUND", "message": "Resource not found." }),
            AppError::Internal(_) => json!({ "error": "Internal server error." }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();

        let challenge = match self {
            AppError::AuthenticationRequired => Some("Bearer"),
            AppError::InvalidToken => Some(r#"Bearer error="invalid_token""#),
            _ => None,
        };
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static(challenge));
        }

        response
    }
}

impl From<ProfileError> for AppError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::EmailMismatch => AppError::EmailMismatch,
            ProfileError::BlankUsername | ProfileError::EmailRequired => {
                AppError::BadRequest(e.to_string())
            }
            ProfileError::Directory(ref inner) if inner.is_conflict() => {
                AppError::Conflict(inner.to_string())
            }
            ProfileError::DefaultRoleMissing(_) | ProfileError::Directory(_) => {
                AppError::ProfileCreationFailed(e.to_string())
            }
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        if e.is_conflict() {
            AppError::Conflict(e.to_string())
        } else {
            AppError::Internal(e.to_string())
        }
    }
}
