//! Card, owner and price-history types.

use serde::{Deserialize, Serialize};

use super::{Decimal, TimeMs, WalletAddress};

/// Maximum number of entries kept in a card's price history.
pub const PRICE_HISTORY_LIMIT: usize = 50;

/// A platform user holding an ECE balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub wallet_address: WalletAddress,
    pub ece_balance: Decimal,
}

/// Public fields of a card owner exposed alongside a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardOwner {
    pub id: String,
    pub wallet_address: String,
}

/// A single point in a card's price history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Decimal,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl PricePoint {
    pub fn sale(price: Decimal, at: TimeMs) -> Self {
        PricePoint {
            price,
            timestamp: at.as_ms(),
            kind: "sale".to_string(),
        }
    }
}

/// Append-only price history bounded to the most recent entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHistory(Vec<PricePoint>);

impl PriceHistory {
    pub fn new(points: Vec<PricePoint>) -> Self {
        let mut history = PriceHistory(points);
        history.truncate_to_limit();
        history
    }

    /// Append a point, evicting the oldest entries beyond the limit.
    pub fn record(&mut self, point: PricePoint) {
        self.0.push(point);
        self.truncate_to_limit();
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn truncate_to_limit(&mut self) {
        if self.0.len() > PRICE_HISTORY_LIMIT {
            let excess = self.0.len() - PRICE_HISTORY_LIMIT;
            self.0.drain(..excess);
        }
    }
}

/// A tradable card and its market settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub current_price: Decimal,
    pub fixed_buy_price: Option<Decimal>,
    pub minimum_bid_amount: Option<Decimal>,
    pub battle_stake_amount: Option<Decimal>,
    pub available_for_buying: bool,
    pub available_for_bidding: bool,
    pub available_for_battling: bool,
    pub historical_prices: PriceHistory,
}

impl Card {
    /// Price a buyer pays: the fixed buy price when set, else the current price.
    pub fn purchase_price(&self) -> Decimal {
        self.fixed_buy_price.unwrap_or(self.current_price)
    }

    /// Apply the post-sale state: new owner, reset flags, cleared seller
    /// preferences, sale recorded in the price history.
    pub fn transfer_to(&mut self, new_owner_id: &str, price: Decimal, at: TimeMs) {
        self.owner_id = new_owner_id.to_string();
        self.available_for_buying = false;
        self.available_for_bidding = true;
        self.available_for_battling = true;
        self.minimum_bid_amount = None;
        self.fixed_buy_price = None;
        self.battle_stake_amount = None;
        self.current_price = price;
        self.historical_prices.record(PricePoint::sale(price, at));
    }
}
