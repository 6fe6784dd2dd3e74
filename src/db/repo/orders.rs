//! Order and milestone operations.

use super::{decode_error, Repository};
use crate::domain::{
    AppOrder, MilestoneStatus, MilestoneStatusUpdate, MilestoneType, NewMilestone,
    OrderMilestone, TimeMs,
};
use crate::engine::{enters_completed, progress_from_statuses};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use std::str::FromStr;
use thiserror::Error;

const MILESTONE_COLUMNS: &str = r#"
    id, order_id, milestone_type, title, description, status, planned_date,
    actual_date, estimated_duration, completed_by, completion_notes, created_at, updated_at
"#;

/// Result of a milestone status update.
#[derive(Debug, Clone)]
pub struct MilestoneUpdateOutcome {
    pub milestone: OrderMilestone,
    pub previous_status: MilestoneStatus,
    /// Set when the update moved the milestone into COMPLETED.
    pub recomputed_progress: Option<u8>,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Order already has milestones")]
    AlreadyPlanned,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl Repository {
    /// Insert an order.
    pub async fn insert_order(&self, order: &AppOrder) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO app_orders (id, user_id, project_type, progress_percentage, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.project_type)
        .bind(order.progress_percentage as i64)
        .bind(order.created_at.as_ms())
        .bind(order.created_at.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an order by id.
    pub async fn get_order(&self, id: &str) -> Result<Option<AppOrder>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, project_type, progress_percentage, created_at
            FROM app_orders
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    /// Milestones of an order in creation order.
    pub async fn list_milestones(&self, order_id: &str) -> Result<Vec<OrderMilestone>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM order_milestones WHERE order_id = ? ORDER BY created_at ASC, rowid ASC",
            MILESTONE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(milestone_from_row).collect()
    }

    /// Get a milestone and the id of the user owning its order.
    pub async fn get_milestone_with_owner(
        &self,
        milestone_id: &str,
    ) -> Result<Option<(OrderMilestone, String)>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT m.*, o.user_id AS owner_id
            FROM order_milestones m
            JOIN app_orders o ON o.id = m.order_id
            WHERE m.id = ?
            "#,
        )
        .bind(milestone_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let milestone = milestone_from_row(&row)?;
                let owner_id: String = row.try_get("owner_id")?;
                Ok(Some((milestone, owner_id)))
            }
            None => Ok(None),
        }
    }

    /// Insert a single milestone. Order progress is left untouched.
    pub async fn insert_milestone(
        &self,
        order_id: &str,
        new: &NewMilestone,
    ) -> Result<OrderMilestone, sqlx::Error> {
        insert_milestone_row(&self.pool, order_id, new, TimeMs::now()).await
    }

    /// Create a whole milestone plan for an order that has none yet.
    ///
    /// # Errors
    /// `PlanError::AlreadyPlanned` if the order already has milestones.
    pub async fn insert_milestone_plan(
        &self,
        order_id: &str,
        plan: &[NewMilestone],
    ) -> Result<Vec<OrderMilestone>, PlanError> {
        let mut tx = self.pool.begin().await?;
        let now = TimeMs::now();

        touch_order(&mut *tx, order_id, now).await?;

        let (existing,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM order_milestones WHERE order_id = ?")
                .bind(order_id)
                .fetch_one(&mut *tx)
                .await?;
        if existing > 0 {
            tx.rollback().await?;
            return Err(PlanError::AlreadyPlanned);
        }

        let mut created = Vec::with_capacity(plan.len());
        for new in plan {
            created.push(insert_milestone_row(&mut *tx, order_id, new, now).await?);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Apply a status change to a milestone.
    ///
    /// When the change moves the milestone into COMPLETED the order's
    /// progress is recomputed from all of its milestones inside the same
    /// transaction, after the status write. Any failure rolls back both.
    ///
    /// Returns `None` if the milestone does not exist.
    pub async fn update_milestone_status(
        &self,
        milestone_id: &str,
        update: &MilestoneStatusUpdate,
    ) -> Result<Option<MilestoneUpdateOutcome>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let now = TimeMs::now();

        // Take the write lock before reading the previous status.
        let touched = sqlx::query("UPDATE order_milestones SET updated_at = ? WHERE id = ?")
            .bind(now.as_ms())
            .bind(milestone_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let (previous, order_id): (String, String) =
            sqlx::query_as("SELECT status, order_id FROM order_milestones WHERE id = ?")
                .bind(milestone_id)
                .fetch_one(&mut *tx)
                .await?;
        let previous_status =
            MilestoneStatus::from_str(&previous).map_err(|e| decode_error("status", e))?;

        sqlx::query(
            r#"
            UPDATE order_milestones SET
                status = ?,
                actual_date = COALESCE(?, actual_date),
                completed_by = COALESCE(?, completed_by),
                completion_notes = COALESCE(?, completion_notes),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.actual_date.map(|t| t.as_ms()))
        .bind(update.completed_by.as_deref())
        .bind(update.completion_notes.as_deref())
        .bind(now.as_ms())
        .bind(milestone_id)
        .execute(&mut *tx)
        .await?;

        let recomputed_progress = if enters_completed(previous_status, update.status) {
            let progress = recompute_order_progress(&mut tx, &order_id, now).await?;
            tracing::info!(
                milestone_id,
                order_id = %order_id,
                progress,
                "Milestone completed, order progress recomputed"
            );
            Some(progress)
        } else {
            None
        };

        let sql = format!(
            "SELECT {} FROM order_milestones WHERE id = ?",
            MILESTONE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(milestone_id)
            .fetch_one(&mut *tx)
            .await?;
        let milestone = milestone_from_row(&row)?;

        tx.commit().await?;

        Ok(Some(MilestoneUpdateOutcome {
            milestone,
            previous_status,
            recomputed_progress,
        }))
    }

    /// Completed and total milestone counts for an order.
    pub async fn milestone_counts(&self, order_id: &str) -> Result<(u64, u64), sqlx::Error> {
        let (completed, total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(CASE WHEN status = 'COMPLETED' THEN 1 ELSE 0 END), 0), COUNT(*)
            FROM order_milestones
            WHERE order_id = ?
            "#,
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((completed as u64, total as u64))
    }
}

async fn recompute_order_progress(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    order_id: &str,
    now: TimeMs,
) -> Result<u8, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT status FROM order_milestones WHERE order_id = ?")
            .bind(order_id)
            .fetch_all(&mut **tx)
            .await?;

    let statuses = rows
        .iter()
        .map(|(s,)| MilestoneStatus::from_str(s).map_err(|e| decode_error("status", e)))
        .collect::<Result<Vec<_>, _>>()?;
    let progress = progress_from_statuses(&statuses);

    sqlx::query("UPDATE app_orders SET progress_percentage = ?, updated_at = ? WHERE id = ?")
        .bind(progress as i64)
        .bind(now.as_ms())
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

    Ok(progress)
}

async fn touch_order<'e, E>(exec: E, order_id: &str, now: TimeMs) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE app_orders SET updated_at = ? WHERE id = ?")
        .bind(now.as_ms())
        .bind(order_id)
        .execute(exec)
        .await?;
    Ok(())
}

async fn insert_milestone_row<'e, E>(
    exec: E,
    order_id: &str,
    new: &NewMilestone,
    now: TimeMs,
) -> Result<OrderMilestone, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let milestone = OrderMilestone {
        id: uuid::Uuid::new_v4().to_string(),
        order_id: order_id.to_string(),
        milestone_type: new.milestone_type,
        title: new.title.clone(),
        description: new.description.clone(),
        status: new.status,
        planned_date: new.planned_date,
        actual_date: None,
        estimated_duration: new.estimated_duration,
        completed_by: None,
        completion_notes: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO order_milestones (
            id, order_id, milestone_type, title, description, status, planned_date,
            actual_date, estimated_duration, completed_by, completion_notes, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, NULL, NULL, ?, ?)
        "#,
    )
    .bind(&milestone.id)
    .bind(&milestone.order_id)
    .bind(milestone.milestone_type.as_str())
    .bind(&milestone.title)
    .bind(milestone.description.as_deref())
    .bind(milestone.status.as_str())
    .bind(milestone.planned_date.map(|t| t.as_ms()))
    .bind(milestone.estimated_duration)
    .bind(now.as_ms())
    .bind(now.as_ms())
    .execute(exec)
    .await?;

    Ok(milestone)
}

fn order_from_row(row: &SqliteRow) -> Result<AppOrder, sqlx::Error> {
    let progress: i64 = row.try_get("progress_percentage")?;
    Ok(AppOrder {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        project_type: row.try_get("project_type")?,
        progress_percentage: progress.clamp(0, 100) as u8,
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

fn milestone_from_row(row: &SqliteRow) -> Result<OrderMilestone, sqlx::Error> {
    let milestone_type: String = row.try_get("milestone_type")?;
    let status: String = row.try_get("status")?;

    Ok(OrderMilestone {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        milestone_type: MilestoneType::from_str(&milestone_type)
            .map_err(|e| decode_error("milestone_type", e))?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: MilestoneStatus::from_str(&status).map_err(|e| decode_error("status", e))?,
        planned_date: row.try_get::<Option<i64>, _>("planned_date")?.map(TimeMs::new),
        actual_date: row.try_get::<Option<i64>, _>("actual_date")?.map(TimeMs::new),
        estimated_duration: row.try_get("estimated_duration")?,
        completed_by: row.try_get("completed_by")?,
        completion_notes: row.try_get("completion_notes")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        updated_at: TimeMs::new(row.try_get("updated_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{User, WalletAddress};
    use crate::engine::default_plan;
    use tempfile::TempDir;

    async fn setup() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Repository::new(pool);

        repo.insert_user(&User {
            id: "u1".to_string(),
            wallet_address: WalletAddress::new("0xowner"),
            ece_balance: crate::domain::Decimal::zero(),
        })
        .await
        .unwrap();
        repo.insert_order(&AppOrder {
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            project_type: "WEB_APP".to_string(),
            progress_percentage: 0,
            created_at: TimeMs::new(0),
        })
        .await
        .unwrap();

        (repo, temp_dir)
    }

    fn pending(title: &str) -> NewMilestone {
        NewMilestone {
            milestone_type: MilestoneType::Custom,
            title: title.to_string(),
            description: None,
            status: MilestoneStatus::Pending,
            planned_date: None,
            estimated_duration: None,
        }
    }

    fn set_status(status: MilestoneStatus) -> MilestoneStatusUpdate {
        MilestoneStatusUpdate {
            status,
            actual_date: None,
            completed_by: None,
            completion_notes: None,
        }
    }

    async fn progress(repo: &Repository) -> u8 {
        repo.get_order("o1").await.unwrap().unwrap().progress_percentage
    }

    #[tokio::test]
    async fn test_completion_recomputes_progress() {
        let (repo, _temp) = setup().await;
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(repo.insert_milestone("o1", &pending(&format!("m{}", i))).await.unwrap().id);
        }
        assert_eq!(progress(&repo).await, 0);

        let outcome = repo
            .update_milestone_status(&ids[0], &set_status(MilestoneStatus::Completed))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.previous_status, MilestoneStatus::Pending);
        assert_eq!(outcome.recomputed_progress, Some(25));
        assert_eq!(progress(&repo).await, 25);

        repo.update_milestone_status(&ids[1], &set_status(MilestoneStatus::Completed))
            .await
            .unwrap();
        assert_eq!(progress(&repo).await, 50);
    }

    #[tokio::test]
    async fn test_failed_recompute_rolls_back_status_change() {
        let (repo, _temp) = setup().await;
        let first = repo.insert_milestone("o1", &pending("a")).await.unwrap();
        let second = repo.insert_milestone("o1", &pending("b")).await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER reject_progress_write
            BEFORE UPDATE OF progress_percentage ON app_orders
            BEGIN
                SELECT RAISE(ABORT, 'progress write rejected');
            END
            "#,
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let update = MilestoneStatusUpdate {
            status: MilestoneStatus::Completed,
            actual_date: Some(TimeMs::new(1_000)),
            completed_by: Some("u1".to_string()),
            completion_notes: Some("done".to_string()),
        };
        let err = repo
            .update_milestone_status(&first.id, &update)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("progress write rejected"));

        let milestones = repo.list_milestones("o1").await.unwrap();
        assert_eq!(milestones[0].status, MilestoneStatus::Pending);
        assert_eq!(milestones[0].actual_date, None);
        assert_eq!(milestones[0].completed_by, None);
        assert_eq!(milestones[0].completion_notes, None);
        assert_eq!(progress(&repo).await, 0);

        // Transitions that skip the recompute are unaffected.
        repo.update_milestone_status(&second.id, &set_status(MilestoneStatus::InProgress))
            .await
            .unwrap()
            .unwrap();
        let milestones = repo.list_milestones("o1").await.unwrap();
        assert_eq!(milestones[1].status, MilestoneStatus::InProgress);
    }

    #[tokio::test]
    async fn test_recompleting_does_not_change_progress() {
        let (repo, _temp) = setup().await;
        let first = repo.insert_milestone("o1", &pending("a")).await.unwrap();
        repo.insert_milestone("o1", &pending("b")).await.unwrap();

        repo.update_milestone_status(&first.id, &set_status(MilestoneStatus::Completed))
            .await
            .unwrap();
        let again = repo
            .update_milestone_status(&first.id, &set_status(MilestoneStatus::Completed))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(again.previous_status, MilestoneStatus::Completed);
        assert_eq!(again.recomputed_progress, None);
        assert_eq!(progress(&repo).await, 50);
    }

    #[tokio::test]
    async fn test_other_transitions_leave_progress_alone() {
        let (repo, _temp) = setup().await;
        let first = repo.insert_milestone("o1", &pending("a")).await.unwrap();
        repo.update_milestone_status(&first.id, &set_status(MilestoneStatus::Completed))
            .await
            .unwrap();
        assert_eq!(progress(&repo).await, 100);

        // Moving out of COMPLETED does not trigger a recompute.
        let outcome = repo
            .update_milestone_status(&first.id, &set_status(MilestoneStatus::Blocked))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.recomputed_progress, None);
        assert_eq!(outcome.milestone.status, MilestoneStatus::Blocked);
        assert_eq!(progress(&repo).await, 100);
    }

    #[tokio::test]
    async fn test_update_keeps_unsupplied_fields() {
        let (repo, _temp) = setup().await;
        let m = repo.insert_milestone("o1", &pending("a")).await.unwrap();

        let update = MilestoneStatusUpdate {
            status: MilestoneStatus::InProgress,
            actual_date: Some(TimeMs::new(5_000)),
            completed_by: Some("alice".to_string()),
            completion_notes: None,
        };
        repo.update_milestone_status(&m.id, &update).await.unwrap();
        let outcome = repo
            .update_milestone_status(&m.id, &set_status(MilestoneStatus::Completed))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.milestone.actual_date, Some(TimeMs::new(5_000)));
        assert_eq!(outcome.milestone.completed_by.as_deref(), Some("alice"));
        assert_eq!(outcome.milestone.completion_notes, None);
    }

    #[tokio::test]
    async fn test_update_unknown_milestone_returns_none() {
        let (repo, _temp) = setup().await;
        let outcome = repo
            .update_milestone_status("missing", &set_status(MilestoneStatus::Completed))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_list_milestones_in_creation_order() {
        let (repo, _temp) = setup().await;
        for title in ["first", "second", "third"] {
            repo.insert_milestone("o1", &pending(title)).await.unwrap();
        }
        let titles: Vec<String> = repo
            .list_milestones("o1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_milestone_with_owner() {
        let (repo, _temp) = setup().await;
        let m = repo.insert_milestone("o1", &pending("a")).await.unwrap();
        let (loaded, owner) = repo.get_milestone_with_owner(&m.id).await.unwrap().unwrap();
        assert_eq!(loaded, m);
        assert_eq!(owner, "u1");
        assert!(repo.get_milestone_with_owner("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plan_only_once() {
        let (repo, _temp) = setup().await;
        let plan = default_plan("WEB_APP", TimeMs::new(0));

        let created = repo.insert_milestone_plan("o1", &plan).await.unwrap();
        assert_eq!(created.len(), 6);
        assert_eq!(repo.milestone_counts("o1").await.unwrap(), (0, 6));

        let again = repo.insert_milestone_plan("o1", &plan).await;
        assert!(matches!(again, Err(PlanError::AlreadyPlanned)));
        assert_eq!(repo.list_milestones("o1").await.unwrap().len(), 6);
    }
}
