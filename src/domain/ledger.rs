//! Transaction ledger entries.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Decimal, TimeMs};

/// Unit of account for all balances.
pub const ECE_CURRENCY: &str = "ECE";

/// Kind of economic event recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    CardPurchase,
    CardSale,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::CardPurchase => "CARD_PURCHASE",
            TransactionType::CardSale => "CARD_SALE",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CARD_PURCHASE" => Ok(TransactionType::CardPurchase),
            "CARD_SALE" => Ok(TransactionType::CardSale),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// One ledger row; a single purchase produces one per party.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub description: String,
    pub metadata: serde_json::Value,
    /// Epoch milliseconds.
    pub created_at: TimeMs,
}

impl LedgerEntry {
    /// Build the buyer and seller rows for a completed card sale.
    pub fn card_sale_pair(
        card_id: &str,
        card_name: &str,
        buyer_id: &str,
        seller_id: &str,
        price: Decimal,
        at: TimeMs,
    ) -> (LedgerEntry, LedgerEntry) {
        let purchase = LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: buyer_id.to_string(),
            kind: TransactionType::CardPurchase,
            amount: price,
            currency: ECE_CURRENCY.to_string(),
            status: "COMPLETED".to_string(),
            description: format!("Purchased card {}", card_name),
            metadata: serde_json::json!({
                "cardId": card_id,
                "sellerId": seller_id,
                "transactionType": "card_purchase",
            }),
            created_at: at,
        };
        let sale = LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: seller_id.to_string(),
            kind: TransactionType::CardSale,
            amount: price,
            currency: ECE_CURRENCY.to_string(),
            status: "COMPLETED".to_string(),
            description: format!("Sold card {}", card_name),
            metadata: serde_json::json!({
                "cardId": card_id,
                "buyerId": buyer_id,
                "transactionType": "card_sale",
            }),
            created_at: at,
        };
        (purchase, sale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_sale_pair_links_counterparts() {
        let (purchase, sale) = LedgerEntry::card_sale_pair(
            "card-1",
            "Acme",
            "buyer",
            "seller",
            Decimal::from_i64(300),
            TimeMs::new(1),
        );

        assert_eq!(purchase.kind, TransactionType::CardPurchase);
        assert_eq!(purchase.user_id, "buyer");
        assert_eq!(purchase.metadata["sellerId"], "seller");
        assert_eq!(purchase.metadata["cardId"], "card-1");

        assert_eq!(sale.kind, TransactionType::CardSale);
        assert_eq!(sale.user_id, "seller");
        assert_eq!(sale.metadata["buyerId"], "buyer");
        assert_eq!(sale.amount, purchase.amount);
        assert_ne!(sale.id, purchase.id);
    }

    #[test]
    fn test_transaction_type_string_forms_agree() {
        for kind in [TransactionType::CardPurchase, TransactionType::CardSale] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
            assert_eq!(TransactionType::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(TransactionType::from_str("DEPOSIT").is_err());
    }
}
