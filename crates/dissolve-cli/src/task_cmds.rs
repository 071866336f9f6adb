//! CLI handlers for `dissolve task` subcommands.
//!
//! Implements:
//! - `dissolve task list <company-id>`          -- list a company's tasks
//! - `dissolve task assign <task-id>`           -- mark a task assigned
//! - `dissolve task progress <task-id> <pct>`   -- record progress (0-100)

use anyhow::Result;
use sqlx::PgPool;

use dissolve_db::models::{ScheduledTask, TaskCategory};
use dissolve_db::queries::tasks;

use crate::{TaskCommands, parse_id};

/// Dispatch a `TaskCommands` variant to the appropriate handler.
pub async fn run_task_command(command: TaskCommands, pool: &PgPool) -> Result<()> {
    match command {
        TaskCommands::List { company_id } => cmd_list(pool, &company_id).await,
        TaskCommands::Assign { task_id } => {
            let id = parse_id("task", &task_id)?;
            let task = tasks::assign_task(pool, id).await?;
            println!(
                "Task {} ({}.{}) assigned.",
                task.id, task.step_position, task.task_position
            );
            Ok(())
        }
        TaskCommands::Progress { task_id, progress } => {
            let id = parse_id("task", &task_id)?;
            let task = tasks::update_task_progress(pool, id, progress).await?;
            println!(
                "Task {} ({}.{}) is {}% done, status {}.",
                task.id, task.step_position, task.task_position, task.progress, task.status
            );
            Ok(())
        }
    }
}

async fn cmd_list(pool: &PgPool, raw_company_id: &str) -> Result<()> {
    let company_id = parse_id("company", raw_company_id)?;
    let all = tasks::list_tasks_for_company(pool, company_id, TaskCategory::Dissolution).await?;

    if all.is_empty() {
        println!("No tasks for company {company_id}.");
        return Ok(());
    }

    print!("{}", render_tasks(&all));
    Ok(())
}

pub fn render_tasks(all: &[ScheduledTask]) -> String {
    let desc_w = all
        .iter()
        .map(|t| t.description.len())
        .max()
        .unwrap_or(11)
        .max(11);

    let mut out = format!(
        "{:<36}  {:>5}  {:<desc_w$}  {:<11}  {:<11}  {:>4}  {:<8}  {:<10}  {:<10}\n",
        "ID", "POS", "DESCRIPTION", "PARTY", "STATUS", "PCT", "ASSIGNED", "START", "DUE",
    );
    for t in all {
        out.push_str(&format!(
            "{:<36}  {:>5}  {:<desc_w$}  {:<11}  {:<11}  {:>3}%  {:<8}  {:<10}  {:<10}\n",
            t.id,
            format!("{}.{}", t.step_position, t.task_position),
            t.description,
            t.responsible_party_type.to_string(),
            t.status.to_string(),
            t.progress,
            if t.is_assigned { "yes" } else { "no" },
            t.start_date.to_string(),
            t.due_date.to_string(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::*;
    use dissolve_db::models::{ResponsiblePartyType, TaskStatus};

    #[test]
    fn render_tasks_shows_position_and_status() {
        let task = ScheduledTask {
            id: Uuid::nil(),
            company_id: Uuid::nil(),
            step_position: 12,
            task_position: 2,
            description: "Record assignments".to_string(),
            category: TaskCategory::Dissolution,
            responsible_party_type: ResponsiblePartyType::Client,
            status: TaskStatus::InProgress,
            progress: 40,
            is_assigned: true,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 22).unwrap(),
            created_at: Utc::now(),
        };
        let out = render_tasks(&[task]);
        let row = out.lines().nth(1).unwrap();

        assert!(row.contains("12.2"));
        assert!(row.contains("in_progress"));
        assert!(row.contains(" 40%"));
        assert!(row.contains("2024-03-22"));
    }
}
