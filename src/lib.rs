pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    AppOrder, Card, Decimal, LedgerEntry, MilestoneStatus, MilestoneType, OrderMilestone, TimeMs,
    TransactionType, User, WalletAddress,
};
pub use error::AppError;
