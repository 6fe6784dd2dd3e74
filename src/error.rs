use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::PlanError;
use crate::domain::Decimal;
use crate::engine::PurchaseError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidOperation(String),
    #[error("Insufficient ECE balance")]
    InsufficientFunds { required: Decimal, current: Decimal },
}

impl AppError {
    pub fn missing(field: &str) -> Self {
        AppError::Validation(format!("Missing required field: {}", field))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<PurchaseError> for AppError {
    fn from(err: PurchaseError) -> Self {
        match err {
            PurchaseError::BuyerNotFound | PurchaseError::CardNotFound => {
                AppError::NotFound(err.to_string())
            }
            PurchaseError::CardNotAvailable => AppError::InvalidState(err.to_string()),
            PurchaseError::SelfPurchase => AppError::InvalidOperation(err.to_string()),
            PurchaseError::InsufficientFunds { required, current } => {
                AppError::InsufficientFunds { required, current }
            }
            PurchaseError::OwnerMissing(_) | PurchaseError::Corrupt(_) | PurchaseError::Db(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            e @ PlanError::AlreadyPlanned => AppError::InvalidState(e.to_string()),
            PlanError::Db(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "Internal server error" }),
                )
            }
            AppError::Validation(msg)
            | AppError::InvalidState(msg)
            | AppError::InvalidOperation(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": msg }),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": msg }),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                json!({ "success": false, "error": msg }),
            ),
            AppError::InsufficientFunds { required, current } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "error": "Insufficient ECE balance",
                    "required": required.to_f64(),
                    "current": current.to_f64(),
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
