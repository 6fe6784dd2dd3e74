//! Card operations and the purchase transaction.

use super::{
    decode_error, fetch_user, fetch_user_by_wallet, insert_ledger_entry, parse_decimal,
    parse_optional_decimal, set_balance, Repository,
};
use crate::domain::{
    Card, CardOwner, Decimal, LedgerEntry, PriceHistory, PricePoint, TimeMs, WalletAddress,
};
use crate::engine::{quote_purchase, PurchaseError};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

/// Result of a completed purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub card: Card,
    pub owner: CardOwner,
    pub seller_id: String,
    pub price: Decimal,
    pub transaction: LedgerEntry,
}

impl Repository {
    /// Insert a card.
    ///
    /// # Errors
    /// Returns an error if the insert fails (duplicate id, unknown owner).
    pub async fn insert_card(&self, card: &Card) -> Result<(), sqlx::Error> {
        let now = TimeMs::now().as_ms();
        let history = encode_history(&card.historical_prices)
            .map_err(|e| decode_error("historical_prices", e))?;

        sqlx::query(
            r#"
            INSERT INTO cards (
                id, name, owner_id, current_price, fixed_buy_price, minimum_bid_amount,
                battle_stake_amount, available_for_buying, available_for_bidding,
                available_for_battling, historical_prices, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&card.id)
        .bind(&card.name)
        .bind(&card.owner_id)
        .bind(card.current_price.to_canonical_string())
        .bind(card.fixed_buy_price.map(|d| d.to_canonical_string()))
        .bind(card.minimum_bid_amount.map(|d| d.to_canonical_string()))
        .bind(card.battle_stake_amount.map(|d| d.to_canonical_string()))
        .bind(card.available_for_buying)
        .bind(card.available_for_bidding)
        .bind(card.available_for_battling)
        .bind(history)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a card by id.
    pub async fn get_card(&self, id: &str) -> Result<Option<Card>, sqlx::Error> {
        fetch_card(&self.pool, id).await
    }

    /// Get a card together with its owner's public fields.
    pub async fn get_card_with_owner(
        &self,
        id: &str,
    ) -> Result<Option<(Card, CardOwner)>, sqlx::Error> {
        let Some(card) = fetch_card(&self.pool, id).await? else {
            return Ok(None);
        };
        let owner = fetch_user(&self.pool, &card.owner_id)
            .await?
            .map(|u| CardOwner {
                id: u.id,
                wallet_address: u.wallet_address.to_string(),
            })
            .ok_or_else(|| decode_error("owner_id", format!("card {} has no owner row", id)))?;
        Ok(Some((card, owner)))
    }

    /// Put a card up for sale by its current owner.
    ///
    /// Returns false if the card does not exist or `owner_id` does not own it.
    pub async fn list_card_for_sale(
        &self,
        card_id: &str,
        owner_id: &str,
        fixed_buy_price: Option<Decimal>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE cards SET available_for_buying = 1, fixed_buy_price = ?, updated_at = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(fixed_buy_price.map(|d| d.to_canonical_string()))
        .bind(TimeMs::now().as_ms())
        .bind(card_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Buy a card for the user holding `wallet`.
    ///
    /// Preconditions are checked against committed state first so that
    /// rejected purchases never take the write lock. The transaction then
    /// claims the card row with a conditional write, re-reads both accounts
    /// and re-checks every precondition before moving funds. A concurrent
    /// buyer that loses the race sees the card as no longer available.
    ///
    /// # Errors
    /// Returns a `PurchaseError` naming the failed precondition; nothing is
    /// written in that case.
    pub async fn purchase_card(
        &self,
        card_id: &str,
        wallet: &WalletAddress,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let buyer = fetch_user_by_wallet(&self.pool, wallet)
            .await?
            .ok_or(PurchaseError::BuyerNotFound)?;
        let card = fetch_card(&self.pool, card_id)
            .await?
            .ok_or(PurchaseError::CardNotFound)?;
        let owner = fetch_user(&self.pool, &card.owner_id)
            .await?
            .ok_or_else(|| PurchaseError::OwnerMissing(card.id.clone()))?;
        quote_purchase(&buyer, &card, &owner)?;

        let mut tx = self.pool.begin().await?;
        let now = TimeMs::now();

        // First statement is a write so the transaction holds the write lock
        // before anything is read.
        let claimed = sqlx::query(
            "UPDATE cards SET updated_at = ? WHERE id = ? AND available_for_buying = 1",
        )
        .bind(now.as_ms())
        .bind(&card.id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(PurchaseError::CardNotAvailable);
        }

        let mut card = fetch_card(&mut *tx, card_id)
            .await?
            .ok_or(PurchaseError::CardNotFound)?;
        let buyer = fetch_user(&mut *tx, &buyer.id)
            .await?
            .ok_or(PurchaseError::BuyerNotFound)?;
        let seller = fetch_user(&mut *tx, &card.owner_id)
            .await?
            .ok_or_else(|| PurchaseError::OwnerMissing(card.id.clone()))?;

        let quote = match quote_purchase(&buyer, &card, &seller) {
            Ok(q) => q,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        set_balance(&mut *tx, &buyer.id, quote.buyer_balance_after).await?;
        set_balance(&mut *tx, &seller.id, seller.ece_balance + quote.price).await?;

        card.transfer_to(&buyer.id, quote.price, now);
        write_card_state(&mut *tx, &card, now).await?;

        let (purchase, sale) = LedgerEntry::card_sale_pair(
            &card.id,
            &card.name,
            &buyer.id,
            &seller.id,
            quote.price,
            now,
        );
        insert_ledger_entry(&mut *tx, &purchase).await?;
        insert_ledger_entry(&mut *tx, &sale).await?;

        tx.commit().await?;

        Ok(PurchaseReceipt {
            card,
            owner: CardOwner {
                id: buyer.id,
                wallet_address: buyer.wallet_address.to_string(),
            },
            seller_id: seller.id,
            price: quote.price,
            transaction: purchase,
        })
    }
}

async fn write_card_state<'e, E>(exec: E, card: &Card, now: TimeMs) -> Result<(), PurchaseError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let history = encode_history(&card.historical_prices)
        .map_err(|e| PurchaseError::Corrupt(e.to_string()))?;

    sqlx::query(
        r#"
        UPDATE cards SET
            owner_id = ?,
            current_price = ?,
            fixed_buy_price = ?,
            minimum_bid_amount = ?,
            battle_stake_amount = ?,
            available_for_buying = ?,
            available_for_bidding = ?,
            available_for_battling = ?,
            historical_prices = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&card.owner_id)
    .bind(card.current_price.to_canonical_string())
    .bind(card.fixed_buy_price.map(|d| d.to_canonical_string()))
    .bind(card.minimum_bid_amount.map(|d| d.to_canonical_string()))
    .bind(card.battle_stake_amount.map(|d| d.to_canonical_string()))
    .bind(card.available_for_buying)
    .bind(card.available_for_bidding)
    .bind(card.available_for_battling)
    .bind(history)
    .bind(now.as_ms())
    .bind(&card.id)
    .execute(exec)
    .await?;

    Ok(())
}

/// Stored shape of a price point. Prices stay canonical strings in the column.
#[derive(Serialize, Deserialize)]
struct StoredPricePoint {
    price: String,
    timestamp: i64,
    #[serde(rename = "type")]
    kind: String,
}

fn encode_history(history: &PriceHistory) -> Result<String, serde_json::Error> {
    let stored: Vec<StoredPricePoint> = history
        .points()
        .iter()
        .map(|p| StoredPricePoint {
            price: p.price.to_canonical_string(),
            timestamp: p.timestamp,
            kind: p.kind.clone(),
        })
        .collect();
    serde_json::to_string(&stored)
}

fn decode_history(raw: &str) -> Result<Vec<PricePoint>, sqlx::Error> {
    let stored: Vec<StoredPricePoint> =
        serde_json::from_str(raw).map_err(|e| decode_error("historical_prices", e))?;
    stored
        .into_iter()
        .map(|p| {
            Ok(PricePoint {
                price: parse_decimal(&p.price, "historical_prices")?,
                timestamp: p.timestamp,
                kind: p.kind,
            })
        })
        .collect()
}

async fn fetch_card<'e, E>(exec: E, id: &str) -> Result<Option<Card>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, name, owner_id, current_price, fixed_buy_price, minimum_bid_amount,
               battle_stake_amount, available_for_buying, available_for_bidding,
               available_for_battling, historical_prices
        FROM cards
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    row.as_ref().map(card_from_row).transpose()
}

fn card_from_row(row: &SqliteRow) -> Result<Card, sqlx::Error> {
    let current_price: String = row.try_get("current_price")?;
    let history: String = row.try_get("historical_prices")?;
    let points = decode_history(&history)?;

    Ok(Card {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        owner_id: row.try_get("owner_id")?,
        current_price: parse_decimal(&current_price, "current_price")?,
        fixed_buy_price: parse_optional_decimal(row.try_get("fixed_buy_price")?, "fixed_buy_price")?,
        minimum_bid_amount: parse_optional_decimal(
            row.try_get("minimum_bid_amount")?,
            "minimum_bid_amount",
        )?,
        battle_stake_amount: parse_optional_decimal(
            row.try_get("battle_stake_amount")?,
            "battle_stake_amount",
        )?,
        available_for_buying: row.try_get("available_for_buying")?,
        available_for_bidding: row.try_get("available_for_bidding")?,
        available_for_battling: row.try_get("available_for_battling")?,
        historical_prices: PriceHistory::new(points),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{TransactionType, User};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup() -> (Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Arc::new(Repository::new(pool)), temp_dir)
    }

    async fn seed_user(repo: &Repository, id: &str, wallet: &str, balance: i64) {
        repo.insert_user(&User {
            id: id.to_string(),
            wallet_address: WalletAddress::new(wallet),
            ece_balance: Decimal::from_i64(balance),
        })
        .await
        .unwrap();
    }

    async fn seed_card(repo: &Repository, owner: &str, current: i64, fixed: Option<i64>) {
        repo.insert_card(&Card {
            id: "card-1".to_string(),
            name: "Acme Corp".to_string(),
            owner_id: owner.to_string(),
            current_price: Decimal::from_i64(current),
            fixed_buy_price: fixed.map(Decimal::from_i64),
            minimum_bid_amount: Some(Decimal::from_i64(50)),
            battle_stake_amount: Some(Decimal::from_i64(25)),
            available_for_buying: true,
            available_for_bidding: false,
            available_for_battling: false,
            historical_prices: PriceHistory::default(),
        })
        .await
        .unwrap();
    }

    async fn balance(repo: &Repository, id: &str) -> Decimal {
        repo.get_user(id).await.unwrap().unwrap().ece_balance
    }

    async fn transaction_count(repo: &Repository) -> i64 {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_purchase_moves_funds_and_ownership() {
        let (repo, _temp) = setup().await;
        seed_user(&repo, "buyer", "0xBuyer", 500).await;
        seed_user(&repo, "seller", "0xseller", 40).await;
        seed_card(&repo, "seller", 1000, Some(300)).await;

        let receipt = repo
            .purchase_card("card-1", &WalletAddress::new("0xbuyer"))
            .await
            .unwrap();

        assert_eq!(receipt.price, Decimal::from_i64(300));
        assert_eq!(receipt.owner.id, "buyer");
        assert_eq!(receipt.seller_id, "seller");
        assert_eq!(receipt.transaction.kind, TransactionType::CardPurchase);
        assert_eq!(balance(&repo, "buyer").await, Decimal::from_i64(200));
        assert_eq!(balance(&repo, "seller").await, Decimal::from_i64(340));

        let card = repo.get_card("card-1").await.unwrap().unwrap();
        assert_eq!(card, receipt.card);
        assert_eq!(card.owner_id, "buyer");
        assert_eq!(card.current_price, Decimal::from_i64(300));
        assert!(!card.available_for_buying);
        assert!(card.available_for_bidding);
        assert!(card.available_for_battling);
        assert_eq!(card.fixed_buy_price, None);
        assert_eq!(card.minimum_bid_amount, None);
        assert_eq!(card.battle_stake_amount, None);
        assert_eq!(card.historical_prices.len(), 1);
        assert_eq!(card.historical_prices.points()[0].kind, "sale");

        let sales = repo.list_transactions("seller", 10).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].kind, TransactionType::CardSale);
        assert_eq!(sales[0].metadata["buyerId"], "buyer");
    }

    #[tokio::test]
    async fn test_history_keeps_exact_sale_price() {
        let (repo, _temp) = setup().await;
        seed_user(&repo, "buyer", "0xbuyer", 0).await;
        seed_user(&repo, "seller", "0xseller", 0).await;
        seed_card(&repo, "seller", 1, None).await;

        let price: Decimal = "12345678901.123456789".parse().unwrap();
        sqlx::query("UPDATE users SET ece_balance = ? WHERE id = 'buyer'")
            .bind("20000000000")
            .execute(&repo.pool)
            .await
            .unwrap();
        assert!(repo
            .list_card_for_sale("card-1", "seller", Some(price))
            .await
            .unwrap());

        repo.purchase_card("card-1", &WalletAddress::new("0xbuyer"))
            .await
            .unwrap();

        let card = repo.get_card("card-1").await.unwrap().unwrap();
        assert_eq!(card.current_price, price);
        let last = card.historical_prices.points().last().unwrap();
        assert_eq!(last.price, card.current_price);

        let (raw,): (String,) =
            sqlx::query_as("SELECT historical_prices FROM cards WHERE id = 'card-1'")
                .fetch_one(&repo.pool)
                .await
                .unwrap();
        let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored[0]["price"], "12345678901.123456789");
        assert_eq!(stored[0]["type"], "sale");
    }

    #[tokio::test]
    async fn test_rejected_purchase_writes_nothing() {
        let (repo, _temp) = setup().await;
        seed_user(&repo, "buyer", "0xbuyer", 100).await;
        seed_user(&repo, "seller", "0xseller", 0).await;
        seed_card(&repo, "seller", 300, None).await;

        let err = repo
            .purchase_card("card-1", &WalletAddress::new("0xbuyer"))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::InsufficientFunds { .. }));

        assert_eq!(balance(&repo, "buyer").await, Decimal::from_i64(100));
        assert_eq!(balance(&repo, "seller").await, Decimal::zero());
        assert_eq!(transaction_count(&repo).await, 0);
        let card = repo.get_card("card-1").await.unwrap().unwrap();
        assert_eq!(card.owner_id, "seller");
        assert!(card.available_for_buying);
    }

    #[tokio::test]
    async fn test_missing_buyer_and_card() {
        let (repo, _temp) = setup().await;
        seed_user(&repo, "seller", "0xseller", 0).await;
        seed_card(&repo, "seller", 300, None).await;

        let err = repo
            .purchase_card("card-1", &WalletAddress::new("0xnobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::BuyerNotFound));

        let err = repo
            .purchase_card("no-such-card", &WalletAddress::new("0xseller"))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::CardNotFound));
    }

    #[tokio::test]
    async fn test_concurrent_buyers_only_one_wins() {
        let (repo, _temp) = setup().await;
        seed_user(&repo, "seller", "0xseller", 0).await;
        for i in 0..4 {
            seed_user(&repo, &format!("buyer-{}", i), &format!("0xbuyer{}", i), 1000).await;
        }
        seed_card(&repo, "seller", 300, None).await;

        let attempts = (0..4).map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.purchase_card("card-1", &WalletAddress::new(format!("0xbuyer{}", i)))
                    .await
            })
        });
        let results: Vec<_> = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for r in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(r, Err(PurchaseError::CardNotAvailable)));
        }

        assert_eq!(balance(&repo, "seller").await, Decimal::from_i64(300));
        assert_eq!(transaction_count(&repo).await, 2);
    }
}
