//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for database operations

pub mod migrations;
pub mod repo;

pub use migrations::{init_db, init_db_with};
pub use repo::{MilestoneUpdateOutcome, PlanError, PurchaseReceipt, Repository};
