use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{query_params, required, resolve_owned_order, AppState};
use crate::domain::WalletAddress;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub order_id: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub success: bool,
    pub order_id: String,
    pub progress_percentage: u8,
    pub completed_milestones: u64,
    pub total_milestones: u64,
    pub all_milestones_completed: bool,
}

/// Stored progress of an order alongside its live milestone counts.
pub async fn get_progress(
    State(state): State<AppState>,
    params: Result<Query<ProgressQuery>, QueryRejection>,
) -> Result<Json<ProgressResponse>, AppError> {
    let params = query_params(params)?;
    let order_id = required(params.order_id, "orderId")?;
    let wallet = WalletAddress::new(required(params.wallet_address, "walletAddress")?);

    let (_user, order) = resolve_owned_order(&state, &order_id, &wallet).await?;
    let (completed, total) = state.repo.milestone_counts(&order.id).await?;

    Ok(Json(ProgressResponse {
        success: true,
        order_id: order.id,
        progress_percentage: order.progress_percentage,
        completed_milestones: completed,
        total_milestones: total,
        all_milestones_completed: total > 0 && completed == total,
    }))
}
