//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `cards.rs` - Card lookups and the purchase transaction
//! - `orders.rs` - Orders, milestones and progress recompute

mod cards;
mod orders;

pub use cards::PurchaseReceipt;
pub use orders::{MilestoneUpdateOutcome, PlanError};

use crate::domain::{Decimal, LedgerEntry, TimeMs, TransactionType, User, WalletAddress};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Executor, Row, Sqlite};
use std::str::FromStr;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Round-trip a trivial query to confirm the database is reachable.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // User operations
    // =========================================================================

    /// Insert a user.
    ///
    /// # Errors
    /// Fails if the id or the wallet address (case-insensitively) already exists.
    pub async fn insert_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, wallet_address, ece_balance, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(user.wallet_address.as_str())
        .bind(user.ece_balance.to_canonical_string())
        .bind(TimeMs::now().as_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a user by wallet address, ignoring case.
    pub async fn find_user_by_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<User>, sqlx::Error> {
        fetch_user_by_wallet(&self.pool, wallet).await
    }

    /// Look up a user by id.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        fetch_user(&self.pool, id).await
    }

    // =========================================================================
    // Ledger operations
    // =========================================================================

    /// Ledger rows for a user, newest first.
    pub async fn list_transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, type, amount, currency, status, description, metadata, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(ledger_entry_from_row).collect()
    }
}

pub(crate) async fn fetch_user<'e, E>(exec: E, id: &str) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT id, wallet_address, ece_balance FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub(crate) async fn fetch_user_by_wallet<'e, E>(
    exec: E,
    wallet: &WalletAddress,
) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, wallet_address, ece_balance FROM users WHERE lower(wallet_address) = lower(?)",
    )
    .bind(wallet.as_str())
    .fetch_optional(exec)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub(crate) async fn set_balance<'e, E>(
    exec: E,
    user_id: &str,
    balance: Decimal,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE users SET ece_balance = ? WHERE id = ?")
        .bind(balance.to_canonical_string())
        .bind(user_id)
        .execute(exec)
        .await?;
    Ok(())
}

pub(crate) async fn insert_ledger_entry<'e, E>(
    exec: E,
    entry: &LedgerEntry,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, user_id, type, amount, currency, status, description, metadata, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.user_id)
    .bind(entry.kind.as_str())
    .bind(entry.amount.to_canonical_string())
    .bind(&entry.currency)
    .bind(&entry.status)
    .bind(&entry.description)
    .bind(entry.metadata.to_string())
    .bind(entry.created_at.as_ms())
    .execute(exec)
    .await?;
    Ok(())
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    let balance: String = row.try_get("ece_balance")?;
    Ok(User {
        id: row.try_get("id")?,
        wallet_address: WalletAddress::new(row.try_get::<String, _>("wallet_address")?),
        ece_balance: parse_decimal(&balance, "ece_balance")?,
    })
}

fn ledger_entry_from_row(row: &SqliteRow) -> Result<LedgerEntry, sqlx::Error> {
    let kind: String = row.try_get("type")?;
    let amount: String = row.try_get("amount")?;
    let metadata: String = row.try_get("metadata")?;

    Ok(LedgerEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: TransactionType::from_str(&kind).map_err(|e| decode_error("type", e))?,
        amount: parse_decimal(&amount, "amount")?,
        currency: row.try_get("currency")?,
        status: row.try_get("status")?,
        description: row.try_get("description")?,
        metadata: serde_json::from_str(&metadata).map_err(|e| decode_error("metadata", e))?,
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

pub(crate) fn parse_decimal(value: &str, column: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(value).map_err(|e| decode_error(column, e))
}

pub(crate) fn parse_optional_decimal(
    value: Option<String>,
    column: &str,
) -> Result<Option<Decimal>, sqlx::Error> {
    value.map(|v| parse_decimal(&v, column)).transpose()
}

pub(crate) fn decode_error(column: &str, err: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(format!("column {}: {}", column, err).into())
}
