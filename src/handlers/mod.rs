pub mod auth;
pub mod franchise;
pub mod metrics;
pub mod order;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to fulfill order at factory")]
    Factory { report_url: Option<String> },
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::InvalidCredentials | AuthError::InvalidToken) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Auth(AuthError::Unauthorized) => StatusCode::FORBIDDEN,
            Self::Auth(AuthError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(AuthError::Store(e)) | Self::Store(e) => store_status(e),
            Self::Factory { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::DuplicateEmail(_) => StatusCode::CONFLICT,
        StoreError::UnknownEmail(_) | StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Password(_) | StoreError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({
            "error":  self.to_string(),
            "status": status.as_u16(),
        });
        if let Self::Factory {
            report_url: Some(url),
        } = &self
        {
            body["reportUrl"] = url.clone().into();
        }

        (status, Json(body)).into_response()
    }
}

// ─── Bearer token extractor ──────────────────────────────────────

/// Raw token from `Authorization: Bearer <token>`.
/// A missing or malformed header is rejected as an invalid token.
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| BearerToken(t.to_owned()))
            .ok_or(AppError::Auth(AuthError::InvalidToken))
    }
}
