//! Orders and their delivery milestones.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::TimeMs;

/// Closed set of milestone statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "PENDING",
            MilestoneStatus::InProgress => "IN_PROGRESS",
            MilestoneStatus::Completed => "COMPLETED",
            MilestoneStatus::Blocked => "BLOCKED",
            MilestoneStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MilestoneStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(MilestoneStatus::Pending),
            "IN_PROGRESS" => Ok(MilestoneStatus::InProgress),
            "COMPLETED" => Ok(MilestoneStatus::Completed),
            "BLOCKED" => Ok(MilestoneStatus::Blocked),
            "CANCELLED" => Ok(MilestoneStatus::Cancelled),
            other => Err(format!("unknown milestone status: {}", other)),
        }
    }
}

/// Kind of checkpoint a milestone represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneType {
    RequirementGathering,
    DesignReview,
    DevelopmentStart,
    DevelopmentComplete,
    TestingStart,
    QualityCheck,
    ClientReview,
    FinalDelivery,
    Custom,
}

impl MilestoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneType::RequirementGathering => "REQUIREMENT_GATHERING",
            MilestoneType::DesignReview => "DESIGN_REVIEW",
            MilestoneType::DevelopmentStart => "DEVELOPMENT_START",
            MilestoneType::DevelopmentComplete => "DEVELOPMENT_COMPLETE",
            MilestoneType::TestingStart => "TESTING_START",
            MilestoneType::QualityCheck => "QUALITY_CHECK",
            MilestoneType::ClientReview => "CLIENT_REVIEW",
            MilestoneType::FinalDelivery => "FINAL_DELIVERY",
            MilestoneType::Custom => "CUSTOM",
        }
    }
}

impl FromStr for MilestoneType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUIREMENT_GATHERING" => Ok(MilestoneType::RequirementGathering),
            "DESIGN_REVIEW" => Ok(MilestoneType::DesignReview),
            "DEVELOPMENT_START" => Ok(MilestoneType::DevelopmentStart),
            "DEVELOPMENT_COMPLETE" => Ok(MilestoneType::DevelopmentComplete),
            "TESTING_START" => Ok(MilestoneType::TestingStart),
            "QUALITY_CHECK" => Ok(MilestoneType::QualityCheck),
            "CLIENT_REVIEW" => Ok(MilestoneType::ClientReview),
            "FINAL_DELIVERY" => Ok(MilestoneType::FinalDelivery),
            "CUSTOM" => Ok(MilestoneType::Custom),
            other => Err(format!("unknown milestone type: {}", other)),
        }
    }
}

/// A customer order whose progress is derived from its milestones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOrder {
    pub id: String,
    pub user_id: String,
    pub project_type: String,
    pub progress_percentage: u8,
    pub created_at: TimeMs,
}

/// A delivery checkpoint within an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderMilestone {
    pub id: String,
    pub order_id: String,
    pub milestone_type: MilestoneType,
    pub title: String,
    pub description: Option<String>,
    pub status: MilestoneStatus,
    pub planned_date: Option<TimeMs>,
    pub actual_date: Option<TimeMs>,
    /// Minutes.
    pub estimated_duration: Option<i64>,
    pub completed_by: Option<String>,
    pub completion_notes: Option<String>,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

/// Fields for inserting a new milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMilestone {
    pub milestone_type: MilestoneType,
    pub title: String,
    pub description: Option<String>,
    pub status: MilestoneStatus,
    pub planned_date: Option<TimeMs>,
    pub estimated_duration: Option<i64>,
}

/// A requested status change on an existing milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneStatusUpdate {
    pub status: MilestoneStatus,
    pub actual_date: Option<TimeMs>,
    pub completed_by: Option<String>,
    pub completion_notes: Option<String>,
}
