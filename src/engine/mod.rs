//! Pure computation for purchases and order progress.

pub mod plan;
pub mod progress;
pub mod purchase;

pub use plan::{default_plan, planned_date};
pub use progress::{enters_completed, progress_from_statuses, progress_percentage};
pub use purchase::{quote_purchase, PurchaseError, PurchaseQuote};
