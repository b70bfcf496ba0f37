use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::extract::ExtractError;
use crate::import::ImportError;
use crate::push::PushError;
use crate::reconcile::ReconcileError;
use crate::shares::ShareError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "admin role required")
    }

    pub fn inactive() -> Self {
        Self::new(StatusCode::FORBIDDEN, "account is awaiting activation")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => AppError::not_found(),
            StoreError::Conflict(message) => AppError::new(StatusCode::CONFLICT, message),
            other => AppError::internal(other),
        }
    }
}

impl From<ShareError> for AppError {
    fn from(value: ShareError) -> Self {
        match value {
            ShareError::InvalidExpiry(_) => AppError::bad_request(value.to_string()),
            ShareError::Store(err) => AppError::from(err),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(value: ReconcileError) -> Self {
        match value {
            ReconcileError::JobNotFound(_) => AppError::not_found(),
            ReconcileError::Assignment(err) => {
                AppError::internal(format!("failed to assign job: {err}"))
            }
            ReconcileError::Store(err) => AppError::from(err),
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(value: ExtractError) -> Self {
        match value {
            ExtractError::EmptyInput => AppError::bad_request(value.to_string()),
            ExtractError::NotConfigured => AppError::internal(value),
            other => AppError::bad_gateway(other.to_string()),
        }
    }
}

impl From<PushError> for AppError {
    fn from(value: PushError) -> Self {
        match value {
            PushError::InvalidSubscription(_) => AppError::bad_request(value.to_string()),
            PushError::Store(err) => AppError::from(err),
            other => AppError::internal(other),
        }
    }
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        match value {
            ImportError::UnknownDraft(_) => AppError::not_found(),
            ImportError::Busy(_) => AppError::new(StatusCode::CONFLICT, value.to_string()),
            ImportError::InvalidDate(_) => AppError::bad_request(value.to_string()),
            ImportError::Store(err) => AppError::from(err),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}
