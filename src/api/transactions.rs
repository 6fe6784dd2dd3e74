use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{query_params, required, resolve_user, AppState};
use crate::domain::{LedgerEntry, WalletAddress};
use crate::error::AppError;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub wallet_address: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub success: bool,
    pub transactions: Vec<LedgerEntry>,
}

pub async fn get_transactions(
    State(state): State<AppState>,
    params: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let params = query_params(params)?;
    let wallet = WalletAddress::new(required(params.wallet_address, "walletAddress")?);
    let limit = match params.limit {
        None => DEFAULT_LIMIT,
        Some(n) if (1..=MAX_LIMIT).contains(&n) => n,
        Some(_) => {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )))
        }
    };

    let user = resolve_user(&state, &wallet).await?;
    let transactions = state.repo.list_transactions(&user.id, limit).await?;

    Ok(Json(TransactionsResponse {
        success: true,
        transactions,
    }))
}
