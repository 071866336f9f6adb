//! CLI handlers for `dissolve compile` and `dissolve roadmap`.

use anyhow::Result;
use sqlx::PgPool;

use dissolve_core::roadmap::roadmap_summary;
use dissolve_core::{
    CompileError, CompileOutcome, PgStore, PlanStep, RoadmapAggregator, ScheduleCompilerService,
    StepTemplateCatalog,
};

use crate::parse_id;

/// Compile the dissolution plan for a company.
pub async fn run_compile(
    pool: &PgPool,
    catalog: &StepTemplateCatalog,
    raw_company_id: &str,
) -> Result<()> {
    let company_id = parse_id("company", raw_company_id)?;
    let store = PgStore::new(pool.clone());
    let service = ScheduleCompilerService::new(catalog, &store, &store, &store);

    match service.compile(company_id).await {
        Ok(CompileOutcome::Compiled { tasks, plan_end }) => {
            println!("Plan compiled for company {company_id}.");
            println!("  Tasks:    {tasks}");
            println!("  Plan end: {plan_end}");
            println!();
            println!("Next: run `dissolve roadmap {company_id}` to view it.");
            Ok(())
        }
        Ok(CompileOutcome::AlreadyCompiled) => {
            println!("Company {company_id} already has a plan; nothing to do.");
            Ok(())
        }
        Err(err @ CompileError::MissingDependency(_)) => Err(anyhow::Error::new(err)
            .context("catalog does not fit this company's facts; run `dissolve catalog check`")),
        Err(err) => Err(err.into()),
    }
}

/// Print a company's roadmap as a table or JSON.
pub async fn run_roadmap(
    pool: &PgPool,
    catalog: &StepTemplateCatalog,
    raw_company_id: &str,
    json: bool,
) -> Result<()> {
    let company_id = parse_id("company", raw_company_id)?;
    let store = PgStore::new(pool.clone());
    let steps = RoadmapAggregator::new(catalog, &store)
        .roadmap(company_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    if steps.is_empty() {
        println!("No plan for company {company_id}. Run `dissolve compile {company_id}` first.");
        return Ok(());
    }

    print!("{}", render_roadmap(&steps));
    Ok(())
}

pub fn render_roadmap(steps: &[PlanStep]) -> String {
    let name_w = steps.iter().map(|s| s.name.len()).max().unwrap_or(4).max(4);

    let mut out = format!(
        "{:>4}  {:<name_w$}  {:<10}  {:<10}  {:>4}  {:>4}  {:>5}\n",
        "STEP", "NAME", "START", "END", "DAYS", "PCT", "TASKS",
    );
    for step in steps {
        out.push_str(&format!(
            "{:>4}  {:<name_w$}  {:<10}  {:<10}  {:>4}  {:>3}%  {:>5}\n",
            step.step_pos,
            step.name,
            step.start_date.to_string(),
            step.end_date.to_string(),
            step.duration_in_days,
            step.progress,
            step.tasks.len(),
        ));
    }

    if let Some(summary) = roadmap_summary(steps) {
        out.push_str(&format!(
            "\n{} steps, {} tasks, {}% complete, {} to {}\n",
            summary.steps, summary.tasks, summary.progress, summary.start_date, summary.end_date,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn step(pos: i32, name: &str, progress: i32) -> PlanStep {
        PlanStep {
            name: name.to_string(),
            step_pos: pos,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            duration_in_days: 7,
            progress,
            tasks: Vec::new(),
        }
    }

    #[test]
    fn render_roadmap_has_header_rows_and_summary() {
        let out = render_roadmap(&[step(1, "Kickoff", 50), step(2, "Evaluate", 0)]);
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].starts_with("STEP"));
        assert!(lines[1].contains("Kickoff"));
        assert!(lines[1].contains("2024-01-01"));
        assert!(lines[1].contains(" 50%"));
        assert_eq!(
            lines.last().copied(),
            Some("2 steps, 0 tasks, 25% complete, 2024-01-01 to 2024-01-08")
        );
    }
}
