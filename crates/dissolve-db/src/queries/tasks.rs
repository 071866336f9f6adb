//! Database query functions for the `scheduled_tasks` and
//! `schedule_compilations` tables.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::{NewScheduledTask, ScheduledTask, TaskCategory, TaskStatus};

/// Result of [`insert_task_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchInsert {
    /// The batch was committed; carries the number of rows written.
    Inserted(u64),
    /// Another batch already holds the `(company, category)` claim. Nothing
    /// was written.
    AlreadyClaimed,
}

/// Insert a complete task batch for one company and category.
///
/// The claim row in `schedule_compilations` and every task row are written
/// in a single transaction. When the claim already exists the transaction
/// is rolled back and [`BatchInsert::AlreadyClaimed`] is returned, so at
/// most one batch per `(company, category)` ever commits.
pub async fn insert_task_batch(
    pool: &PgPool,
    company_id: Uuid,
    category: TaskCategory,
    tasks: &[NewScheduledTask],
) -> Result<BatchInsert> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let claimed = sqlx::query(
        "INSERT INTO schedule_compilations (company_id, category) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(company_id)
    .bind(category)
    .execute(&mut *tx)
    .await
    .context("failed to claim schedule compilation")?;

    if claimed.rows_affected() == 0 {
        // Rolled back on drop.
        debug!(%company_id, %category, "compilation already claimed");
        return Ok(BatchInsert::AlreadyClaimed);
    }

    let mut written = 0u64;
    for task in tasks {
        if task.company_id != company_id || task.category != category {
            bail!(
                "task {}.{} does not belong to batch {company_id}/{category}",
                task.step_position,
                task.task_position
            );
        }
        sqlx::query(
            "INSERT INTO scheduled_tasks (company_id, step_position, task_position, \
             description, category, responsible_party_type, status, progress, \
             is_assigned, start_date, due_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(task.company_id)
        .bind(task.step_position)
        .bind(task.task_position)
        .bind(&task.description)
        .bind(task.category)
        .bind(task.responsible_party_type)
        .bind(task.status)
        .bind(task.progress)
        .bind(task.is_assigned)
        .bind(task.start_date)
        .bind(task.due_date)
        .execute(&mut *tx)
        .await
        .with_context(|| {
            format!(
                "failed to insert task {}.{} for company {company_id}",
                task.step_position, task.task_position
            )
        })?;
        written += 1;
    }

    tx.commit().await.context("failed to commit task batch")?;

    Ok(BatchInsert::Inserted(written))
}

/// Check whether any task of `category` exists for the company.
pub async fn has_tasks_for_category(
    pool: &PgPool,
    company_id: Uuid,
    category: TaskCategory,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM scheduled_tasks WHERE company_id = $1 AND category = $2)",
    )
    .bind(company_id)
    .bind(category)
    .fetch_one(pool)
    .await
    .context("failed to check for existing tasks")?;

    Ok(exists)
}

/// List a company's tasks of one category, ordered by step then task
/// position.
pub async fn list_tasks_for_company(
    pool: &PgPool,
    company_id: Uuid,
    category: TaskCategory,
) -> Result<Vec<ScheduledTask>> {
    let tasks = sqlx::query_as::<_, ScheduledTask>(
        "SELECT * FROM scheduled_tasks \
         WHERE company_id = $1 AND category = $2 \
         ORDER BY step_position ASC, task_position ASC",
    )
    .bind(company_id)
    .bind(category)
    .fetch_all(pool)
    .await
    .context("failed to list tasks for company")?;

    Ok(tasks)
}

/// Fetch a single task by ID.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Option<ScheduledTask>> {
    let task = sqlx::query_as::<_, ScheduledTask>("SELECT * FROM scheduled_tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// Mark a task as assigned. Returns the updated row.
pub async fn assign_task(pool: &PgPool, id: Uuid) -> Result<ScheduledTask> {
    let task = sqlx::query_as::<_, ScheduledTask>(
        "UPDATE scheduled_tasks SET is_assigned = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to assign task")?;

    match task {
        Some(t) => Ok(t),
        None => bail!("task {id} not found"),
    }
}

/// Set a task's progress (0..=100) and the status it implies.
pub async fn update_task_progress(pool: &PgPool, id: Uuid, progress: i32) -> Result<ScheduledTask> {
    if !(0..=100).contains(&progress) {
        bail!("progress must be between 0 and 100, got {progress}");
    }

    let task = sqlx::query_as::<_, ScheduledTask>(
        "UPDATE scheduled_tasks SET progress = $1, status = $2 WHERE id = $3 RETURNING *",
    )
    .bind(progress)
    .bind(TaskStatus::for_progress(progress))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to update task progress")?;

    match task {
        Some(t) => Ok(t),
        None => bail!("task {id} not found"),
    }
}
