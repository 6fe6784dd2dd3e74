use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{json_body, query_params, required, resolve_owned_order, resolve_user, AppState};
use crate::domain::{
    MilestoneStatus, MilestoneStatusUpdate, MilestoneType, NewMilestone, OrderMilestone, TimeMs,
    WalletAddress,
};
use crate::engine::default_plan;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestonesQuery {
    pub order_id: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMilestoneRequest {
    pub order_id: Option<String>,
    pub milestone_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub planned_date: Option<String>,
    pub estimated_duration: Option<i64>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMilestoneRequest {
    pub milestone_id: Option<String>,
    pub status: Option<String>,
    pub actual_date: Option<String>,
    pub completed_by: Option<String>,
    pub completion_notes: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    pub order_id: Option<String>,
    pub wallet_address: Option<String>,
    pub project_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestonesResponse {
    pub success: bool,
    pub milestones: Vec<MilestoneDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneResponse {
    pub success: bool,
    pub milestone: MilestoneDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneDto {
    pub id: String,
    pub order_id: String,
    pub milestone_type: MilestoneType,
    pub title: String,
    pub description: Option<String>,
    pub status: MilestoneStatus,
    pub planned_date: Option<String>,
    pub actual_date: Option<String>,
    pub estimated_duration: Option<i64>,
    pub completed_by: Option<String>,
    pub completion_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<OrderMilestone> for MilestoneDto {
    fn from(m: OrderMilestone) -> Self {
        MilestoneDto {
            id: m.id,
            order_id: m.order_id,
            milestone_type: m.milestone_type,
            title: m.title,
            description: m.description,
            status: m.status,
            planned_date: m.planned_date.map(|t| t.to_rfc3339()),
            actual_date: m.actual_date.map(|t| t.to_rfc3339()),
            estimated_duration: m.estimated_duration,
            completed_by: m.completed_by,
            completion_notes: m.completion_notes,
            created_at: m.created_at.to_rfc3339(),
            updated_at: m.updated_at.to_rfc3339(),
        }
    }
}

fn parse_date(value: Option<String>, field: &str) -> Result<Option<TimeMs>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => TimeMs::parse_rfc3339(s).map(Some).ok_or_else(|| {
            AppError::Validation(format!("{} must be an RFC 3339 timestamp", field))
        }),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn list_milestones(
    State(state): State<AppState>,
    params: Result<Query<MilestonesQuery>, QueryRejection>,
) -> Result<Json<MilestonesResponse>, AppError> {
    let params = query_params(params)?;
    let order_id = required(params.order_id, "orderId")?;
    let wallet = WalletAddress::new(required(params.wallet_address, "walletAddress")?);

    let (_user, order) = resolve_owned_order(&state, &order_id, &wallet).await?;
    let milestones = state.repo.list_milestones(&order.id).await?;

    Ok(Json(MilestonesResponse {
        success: true,
        milestones: milestones.into_iter().map(MilestoneDto::from).collect(),
    }))
}

pub async fn create_milestone(
    State(state): State<AppState>,
    payload: Result<Json<CreateMilestoneRequest>, JsonRejection>,
) -> Result<Json<MilestoneResponse>, AppError> {
    let body = json_body(payload)?;
    let order_id = required(body.order_id, "orderId")?;
    let milestone_type = required(body.milestone_type, "milestoneType")?;
    let title = required(body.title, "title")?;
    let wallet = WalletAddress::new(required(body.wallet_address, "walletAddress")?);

    let milestone_type = MilestoneType::from_str(&milestone_type)
        .map_err(|_| AppError::Validation(format!("Invalid milestoneType: {}", milestone_type)))?;
    let planned_date = parse_date(body.planned_date, "plannedDate")?;
    if matches!(body.estimated_duration, Some(d) if d < 0) {
        return Err(AppError::Validation(
            "estimatedDuration must not be negative".into(),
        ));
    }

    let (_user, order) = resolve_owned_order(&state, &order_id, &wallet).await?;

    let new = NewMilestone {
        milestone_type,
        title,
        description: non_blank(body.description),
        status: MilestoneStatus::Pending,
        planned_date,
        estimated_duration: body.estimated_duration,
    };
    let milestone = state.repo.insert_milestone(&order.id, &new).await?;

    tracing::info!(order_id = %order.id, milestone_id = %milestone.id, "Milestone created");

    Ok(Json(MilestoneResponse {
        success: true,
        milestone: milestone.into(),
    }))
}

/// Change a milestone's status.
///
/// Entering COMPLETED recomputes the order's progress; the new percentage
/// is not echoed here.
pub async fn update_milestone(
    State(state): State<AppState>,
    payload: Result<Json<UpdateMilestoneRequest>, JsonRejection>,
) -> Result<Json<MilestoneResponse>, AppError> {
    let body = json_body(payload)?;
    let milestone_id = required(body.milestone_id, "milestoneId")?;
    let status = required(body.status, "status")?;
    let wallet = WalletAddress::new(required(body.wallet_address, "walletAddress")?);

    let status = MilestoneStatus::from_str(&status)
        .map_err(|_| AppError::Validation(format!("Invalid status: {}", status)))?;
    let actual_date = parse_date(body.actual_date, "actualDate")?;

    let user = resolve_user(&state, &wallet).await?;
    let (_milestone, owner_id) = state
        .repo
        .get_milestone_with_owner(&milestone_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Milestone not found".into()))?;
    if owner_id != user.id {
        tracing::warn!(milestone_id = %milestone_id, requester = %user.id, "Milestone update by non-owner");
        return Err(AppError::Forbidden(
            "Not authorized to update this milestone".into(),
        ));
    }

    let update = MilestoneStatusUpdate {
        status,
        actual_date,
        completed_by: non_blank(body.completed_by),
        completion_notes: non_blank(body.completion_notes),
    };
    let outcome = state
        .repo
        .update_milestone_status(&milestone_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound("Milestone not found".into()))?;

    tracing::debug!(
        milestone_id = %milestone_id,
        from = %outcome.previous_status,
        to = %outcome.milestone.status,
        "Milestone status updated"
    );

    Ok(Json(MilestoneResponse {
        success: true,
        milestone: outcome.milestone.into(),
    }))
}

/// Create the standard milestone plan for an order without milestones.
pub async fn create_plan(
    State(state): State<AppState>,
    payload: Result<Json<CreatePlanRequest>, JsonRejection>,
) -> Result<Json<MilestonesResponse>, AppError> {
    let body = json_body(payload)?;
    let order_id = required(body.order_id, "orderId")?;
    let wallet = WalletAddress::new(required(body.wallet_address, "walletAddress")?);

    let (_user, order) = resolve_owned_order(&state, &order_id, &wallet).await?;
    let project_type = non_blank(body.project_type).unwrap_or_else(|| order.project_type.clone());

    let plan = default_plan(&project_type, order.created_at);
    let milestones = state.repo.insert_milestone_plan(&order.id, &plan).await?;

    tracing::info!(order_id = %order.id, count = milestones.len(), "Milestone plan created");

    Ok(Json(MilestonesResponse {
        success: true,
        milestones: milestones.into_iter().map(MilestoneDto::from).collect(),
    }))
}
