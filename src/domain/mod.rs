//! Domain types for the ECE card marketplace.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, WalletAddress
//! - Users, cards and bounded price history
//! - Transaction ledger entries
//! - Orders and milestones

pub mod card;
pub mod decimal;
pub mod ledger;
pub mod milestone;
pub mod primitives;

pub use card::{Card, CardOwner, PriceHistory, PricePoint, User, PRICE_HISTORY_LIMIT};
pub use decimal::Decimal;
pub use ledger::{LedgerEntry, TransactionType, ECE_CURRENCY};
pub use milestone::{
    AppOrder, MilestoneStatus, MilestoneStatusUpdate, MilestoneType, NewMilestone, OrderMilestone,
};
pub use primitives::{TimeMs, WalletAddress};
