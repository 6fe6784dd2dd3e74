pub mod cards;
pub mod health;
pub mod milestones;
pub mod orders;
pub mod transactions;

use crate::db::Repository;
use crate::domain::{AppOrder, User, WalletAddress};
use crate::error::AppError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Query};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/cards/buy", post(cards::buy_card))
        .route("/v1/cards/:id", get(cards::get_card))
        .route(
            "/v1/orders/milestones",
            get(milestones::list_milestones)
                .post(milestones::create_milestone)
                .put(milestones::update_milestone),
        )
        .route("/v1/orders/milestones/plan", post(milestones::create_plan))
        .route("/v1/orders/progress", get(orders::get_progress))
        .route("/v1/transactions", get(transactions::get_transactions))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Unwrap a JSON body, reporting malformed input as a validation error.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e.body_text())))
}

/// Unwrap query parameters, reporting malformed input as a validation error.
pub(crate) fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    params
        .map(|Query(q)| q)
        .map_err(|e| AppError::Validation(format!("Invalid query parameters: {}", e.body_text())))
}

/// A required, non-blank string field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::missing(field))
}

/// Resolve the requesting user from a wallet address.
pub(crate) async fn resolve_user(
    state: &AppState,
    wallet: &WalletAddress,
) -> Result<User, AppError> {
    state
        .repo
        .find_user_by_wallet(wallet)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Load an order owned by the user holding `wallet`.
///
/// An order owned by someone else is reported as not found.
pub(crate) async fn resolve_owned_order(
    state: &AppState,
    order_id: &str,
    wallet: &WalletAddress,
) -> Result<(User, AppOrder), AppError> {
    let user = resolve_user(state, wallet).await?;
    let order = state
        .repo
        .get_order(order_id)
        .await?
        .filter(|o| o.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok((user, order))
}
