use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{json_body, required, AppState};
use crate::domain::{Card, CardOwner, Decimal, LedgerEntry, PricePoint, WalletAddress};
use crate::engine::PurchaseError;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyCardRequest {
    pub card_id: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyCardResponse {
    pub success: bool,
    pub card: CardDto,
    pub purchase_price: Decimal,
    pub transaction: LedgerEntry,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub success: bool,
    pub card: CardDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDto {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub owner: CardOwner,
    pub current_price: Decimal,
    pub fixed_buy_price: Option<Decimal>,
    pub minimum_bid_amount: Option<Decimal>,
    pub battle_stake_amount: Option<Decimal>,
    pub available_for_buying: bool,
    pub available_for_bidding: bool,
    pub available_for_battling: bool,
    pub historical_prices: Vec<PricePoint>,
}

impl CardDto {
    fn new(card: Card, owner: CardOwner) -> Self {
        CardDto {
            id: card.id,
            name: card.name,
            owner_id: card.owner_id,
            owner,
            current_price: card.current_price,
            fixed_buy_price: card.fixed_buy_price,
            minimum_bid_amount: card.minimum_bid_amount,
            battle_stake_amount: card.battle_stake_amount,
            available_for_buying: card.available_for_buying,
            available_for_bidding: card.available_for_bidding,
            available_for_battling: card.available_for_battling,
            historical_prices: card.historical_prices.points().to_vec(),
        }
    }
}

pub async fn buy_card(
    State(state): State<AppState>,
    payload: Result<Json<BuyCardRequest>, JsonRejection>,
) -> Result<Json<BuyCardResponse>, AppError> {
    let body = json_body(payload)?;
    let card_id = required(body.card_id, "cardId")?;
    let wallet = WalletAddress::new(required(body.wallet_address, "walletAddress")?);

    let receipt = state
        .repo
        .purchase_card(&card_id, &wallet)
        .await
        .map_err(|e| {
            if !matches!(
                e,
                PurchaseError::OwnerMissing(_) | PurchaseError::Corrupt(_) | PurchaseError::Db(_)
            ) {
                tracing::debug!(card_id = %card_id, buyer = %wallet, reason = %e, "Purchase rejected");
            }
            AppError::from(e)
        })?;

    tracing::info!(
        card_id = %receipt.card.id,
        buyer = %receipt.owner.id,
        seller = %receipt.seller_id,
        price = %receipt.price,
        "Card purchased"
    );

    Ok(Json(BuyCardResponse {
        success: true,
        purchase_price: receipt.price,
        transaction: receipt.transaction,
        card: CardDto::new(receipt.card, receipt.owner),
    }))
}

pub async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CardResponse>, AppError> {
    let (card, owner) = state
        .repo
        .get_card_with_owner(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".into()))?;

    Ok(Json(CardResponse {
        success: true,
        card: CardDto::new(card, owner),
    }))
}
