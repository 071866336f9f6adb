//! CLI handlers for `dissolve catalog` subcommands. No database needed.
//!
//! Implements:
//! - `dissolve catalog show`          -- print the active catalog
//! - `dissolve catalog check [file]`  -- validate and lint a catalog

use std::path::Path;

use anyhow::{Result, bail};

use dissolve_core::StepTemplateCatalog;
use dissolve_core::catalog::DueRule;

use crate::CatalogCommands;
use crate::config::DissolveConfig;

pub fn run_catalog_command(command: CatalogCommands, config: &DissolveConfig) -> Result<()> {
    match command {
        CatalogCommands::Show => {
            let catalog = config.load_catalog()?;
            print!("{}", render_catalog(&catalog));
            Ok(())
        }
        CatalogCommands::Check { file } => {
            let catalog = match file.as_deref() {
                Some(path) => StepTemplateCatalog::from_path(path)?,
                None => config.load_catalog()?,
            };
            cmd_check(&catalog, file.as_deref())
        }
    }
}

/// Table of steps with their rules, one line per step.
pub fn render_catalog(catalog: &StepTemplateCatalog) -> String {
    let name_w = catalog
        .all()
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut out = format!(
        "{:>4}  {:<18}  {:<name_w$}  {:>5}  {:<22}  {:<26}  PARTIES\n",
        "STEP", "PHASE", "NAME", "DAYS", "DEPENDS", "CONDITION",
    );
    for step in catalog.all() {
        let days = match step.due {
            DueRule::Duration => step.duration_days.to_string(),
            DueRule::EndOfMonth => format!("{}/eom", step.duration_days),
            DueRule::PlanEnd => "end".to_string(),
        };
        let condition = step
            .condition
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let parties: Vec<String> = step.parties.iter().map(|p| p.to_string()).collect();

        out.push_str(&format!(
            "{:>4}  {:<18}  {:<name_w$}  {:>5}  {:<22}  {:<26}  {}\n",
            step.id,
            step.phase.to_string(),
            step.name,
            days,
            step.depends.describe(),
            condition,
            parties.join(","),
        ));
    }
    out
}

fn cmd_check(catalog: &StepTemplateCatalog, file: Option<&Path>) -> Result<()> {
    let label = file
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "active catalog".to_string());
    let violations = catalog.conditional_edge_violations();

    if violations.is_empty() {
        let tasks: usize = catalog.all().iter().map(|s| s.tasks.len()).sum();
        println!(
            "{label}: OK ({} steps, {tasks} task templates, terminal step {})",
            catalog.len(),
            catalog.terminal().id
        );
        return Ok(());
    }

    println!("{label}: dependencies that can point at a skipped step:");
    for v in &violations {
        println!(
            "  step {} -> step {} (skipped unless {})",
            v.step, v.dependency, v.condition
        );
    }
    bail!(
        "{} unresolvable dependency edge(s) in {label}",
        violations.len()
    )
}
