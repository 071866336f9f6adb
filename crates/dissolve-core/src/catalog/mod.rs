//! The step template catalog: an ordered, validated, immutable playbook.
//!
//! Catalogs are authored as TOML (`[[steps]]` tables). The built-in
//! dissolution playbook is embedded at compile time; an alternative file can
//! be loaded with [`StepTemplateCatalog::from_path`]. Loading validates:
//! - At least one step, ids positive and strictly ascending.
//! - Every dependency points at an earlier step (file order is the
//!   topological order).
//! - Only the first step anchors to the project start, and it must.
//! - The terminal step is unconditional and has a concrete due date.
//! - Every step has parties and tasks, with unique 1-based positions.
//! - Durations are bounded per step and over the whole plan, so resolved
//!   dates stay within the calendar.

pub mod types;

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use types::{
    Condition, DependencyRule, DueRule, Party, Phase, StepId, StepTemplate, TaskTemplate,
};

/// TOML source of the built-in dissolution playbook.
pub const BUILTIN_CATALOG_TOML: &str = include_str!("dissolution.toml");

/// Longest duration a single step may declare.
pub const MAX_STEP_DURATION_DAYS: u32 = 3650;

/// Upper bound on how far past the project start any resolved date can land.
pub const MAX_PLAN_DAYS: u64 = 36_525;

/// Worst-case days a step can add on top of its start: an end-of-month due
/// date may run to the end of the month after `start + duration`.
const END_OF_MONTH_SLACK_DAYS: u64 = 31;

/// Errors that can occur while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("catalog must contain at least one step")]
    NoSteps,

    #[error("step ids must be strictly ascending: {previous} is followed by {step}")]
    OutOfOrder { previous: StepId, step: StepId },

    #[error("step {step} depends on step {dependency}, which is not an earlier step")]
    ForwardDependency { step: StepId, dependency: StepId },

    #[error("step {step}: only the first step may anchor to the project start")]
    MisplacedAnchor { step: StepId },

    #[error("first step {step} must anchor to the project start")]
    FirstStepNotAnchored { step: StepId },

    #[error("step {step}: after_max needs at least one step")]
    EmptyJoin { step: StepId },

    #[error("terminal step {step} must be unconditional and cannot end at the plan end")]
    InvalidTerminal { step: StepId },

    #[error("step {step} has no responsible parties")]
    NoParties { step: StepId },

    #[error("step {step} has no tasks")]
    NoTasks { step: StepId },

    #[error("step {step} has an invalid or duplicate task position {position}")]
    InvalidTaskPosition { step: StepId, position: i32 },

    #[error("step id {step} must be positive")]
    InvalidStepId { step: StepId },

    #[error("step {step} lasts {days} days; the limit is {max}", max = MAX_STEP_DURATION_DAYS)]
    DurationOutOfRange { step: StepId, days: u32 },

    #[error("catalog can span up to {days} days; the limit is {max}", max = MAX_PLAN_DAYS)]
    PlanTooLong { days: u64 },
}

/// An edge that can point at a step skipped for some companies, making the
/// dependent unresolvable for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeViolation {
    pub step: StepId,
    pub dependency: StepId,
    pub condition: Condition,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogToml {
    steps: Vec<StepTemplate>,
}

/// Ordered, validated set of step templates. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTemplateCatalog {
    steps: Vec<StepTemplate>,
}

impl StepTemplateCatalog {
    /// The built-in dissolution playbook.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG_TOML)
    }

    /// Parse and validate a catalog from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let parsed: CatalogToml = toml::from_str(content)?;
        Self::from_steps(parsed.steps)
    }

    /// Read, parse and validate a catalog file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid catalog {}", path.display()))
    }

    /// Validate an in-memory step list.
    pub fn from_steps(steps: Vec<StepTemplate>) -> Result<Self, CatalogError> {
        validate(&steps)?;
        Ok(Self { steps })
    }

    /// All steps in resolution order.
    pub fn all(&self) -> &[StepTemplate] {
        &self.steps
    }

    pub fn get(&self, id: StepId) -> Option<&StepTemplate> {
        self.steps
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|idx| &self.steps[idx])
    }

    /// The last step; its due date is the plan end.
    pub fn terminal(&self) -> &StepTemplate {
        // Validation rejects empty catalogs.
        &self.steps[self.steps.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Edges that would fail with a missing dependency for some company.
    ///
    /// An edge to a conditional step is safe when the dependent carries the
    /// same condition (both are skipped together). Inside `after_max` it is
    /// also safe when at least one other joined step is safe on its own.
    pub fn conditional_edge_violations(&self) -> Vec<EdgeViolation> {
        let mut violations = Vec::new();

        for step in &self.steps {
            let is_safe = |dep: &StepTemplate| {
                dep.condition.is_none() || dep.condition == step.condition
            };

            match &step.depends {
                DependencyRule::AfterMax { steps } => {
                    let deps: Vec<&StepTemplate> =
                        steps.iter().filter_map(|id| self.get(*id)).collect();
                    if deps.iter().any(|d| is_safe(*d)) {
                        continue;
                    }
                    for dep in deps {
                        if let Some(condition) = dep.condition {
                            violations.push(EdgeViolation {
                                step: step.id,
                                dependency: dep.id,
                                condition,
                            });
                        }
                    }
                }
                rule => {
                    for id in rule.references() {
                        let Some(dep) = self.get(id) else { continue };
                        if let (false, Some(condition)) = (is_safe(dep), dep.condition) {
                            violations.push(EdgeViolation {
                                step: step.id,
                                dependency: dep.id,
                                condition,
                            });
                        }
                    }
                }
            }
        }

        violations.dedup();
        violations
    }
}

fn validate(steps: &[StepTemplate]) -> Result<(), CatalogError> {
    let Some(first) = steps.first() else {
        return Err(CatalogError::NoSteps);
    };
    if first.depends != DependencyRule::AnchorToProjectStart {
        return Err(CatalogError::FirstStepNotAnchored { step: first.id });
    }

    let mut earlier: HashSet<StepId> = HashSet::new();
    let mut previous: Option<StepId> = None;
    let mut horizon: u64 = 0;

    for step in steps {
        if step.id <= 0 {
            return Err(CatalogError::InvalidStepId { step: step.id });
        }
        if let Some(prev) = previous {
            if step.id <= prev {
                return Err(CatalogError::OutOfOrder {
                    previous: prev,
                    step: step.id,
                });
            }
        }

        match &step.depends {
            DependencyRule::AnchorToProjectStart if previous.is_some() => {
                return Err(CatalogError::MisplacedAnchor { step: step.id });
            }
            DependencyRule::AfterMax { steps } if steps.is_empty() => {
                return Err(CatalogError::EmptyJoin { step: step.id });
            }
            _ => {}
        }

        for dependency in step.depends.references() {
            if !earlier.contains(&dependency) {
                return Err(CatalogError::ForwardDependency {
                    step: step.id,
                    dependency,
                });
            }
        }

        if step.duration_days > MAX_STEP_DURATION_DAYS {
            return Err(CatalogError::DurationOutOfRange {
                step: step.id,
                days: step.duration_days,
            });
        }
        horizon += u64::from(step.duration_days) + END_OF_MONTH_SLACK_DAYS;

        if step.parties.is_empty() {
            return Err(CatalogError::NoParties { step: step.id });
        }
        if step.tasks.is_empty() {
            return Err(CatalogError::NoTasks { step: step.id });
        }
        let mut positions = HashSet::new();
        for task in &step.tasks {
            if task.position <= 0 || !positions.insert(task.position) {
                return Err(CatalogError::InvalidTaskPosition {
                    step: step.id,
                    position: task.position,
                });
            }
        }

        earlier.insert(step.id);
        previous = Some(step.id);
    }

    if horizon > MAX_PLAN_DAYS {
        return Err(CatalogError::PlanTooLong { days: horizon });
    }

    let terminal = &steps[steps.len() - 1];
    if terminal.condition.is_some() || terminal.due == DueRule::PlanEnd {
        return Err(CatalogError::InvalidTerminal { step: terminal.id });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toml_step(id: i32, depends: &str, extra: &str) -> String {
        format!(
            r#"
[[steps]]
id = {id}
phase = "planning"
name = "Step {id}"
parties = ["client"]
duration_days = 1
depends = {depends}
{extra}
tasks = [{{ position = 1, name = "Task" }}]
"#
        )
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = StepTemplateCatalog::builtin().expect("builtin catalog should load");
        assert_eq!(catalog.len(), 26);
        assert_eq!(catalog.terminal().id, 26);
        assert_eq!(catalog.get(12).unwrap().name, "Transfer intellectual property");
        assert!(catalog.get(99).is_none());
    }

    #[test]
    fn builtin_catalog_has_no_unsafe_conditional_edges() {
        let catalog = StepTemplateCatalog::builtin().unwrap();
        let violations = catalog.conditional_edge_violations();
        assert!(violations.is_empty(), "violations: {violations:?}");
    }

    #[test]
    fn builtin_asset_sale_steps_share_condition() {
        let catalog = StepTemplateCatalog::builtin().unwrap();
        for id in [9, 10, 11] {
            let step = catalog.get(id).unwrap();
            assert!(
                !step.is_included(&Default::default()),
                "step {id} should be skipped without a sale"
            );
        }
    }

    #[test]
    fn empty_catalog_rejected() {
        let err = StepTemplateCatalog::from_toml_str("steps = []").unwrap_err();
        assert!(matches!(err, CatalogError::NoSteps));
    }

    #[test]
    fn oversized_duration_rejected() {
        let content = toml_step(1, r#"{ kind = "anchor_to_project_start" }"#, "")
            .replace("duration_days = 1", "duration_days = 4000000000");
        let err = StepTemplateCatalog::from_toml_str(&content).unwrap_err();
        assert!(
            matches!(
                err,
                CatalogError::DurationOutOfRange {
                    step: 1,
                    days: 4_000_000_000
                }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn plan_horizon_is_bounded() {
        let mut content = toml_step(1, r#"{ kind = "anchor_to_project_start" }"#, "");
        for id in 2..=20 {
            let depends = format!(r#"{{ kind = "after_step", step = {} }}"#, id - 1);
            content.push_str(&toml_step(id, &depends, ""));
        }
        let content = content.replace("duration_days = 1", "duration_days = 3650");

        let err = StepTemplateCatalog::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, CatalogError::PlanTooLong { .. }), "got {err:?}");
        assert!(err.to_string().ends_with("the limit is 36525"));
    }

    #[test]
    fn forward_dependency_rejected() {
        let content = [
            toml_step(1, r#"{ kind = "anchor_to_project_start" }"#, ""),
            toml_step(2, r#"{ kind = "after_step", step = 3 }"#, ""),
            toml_step(3, r#"{ kind = "after_step", step = 1 }"#, ""),
        ]
        .concat();
        let err = StepTemplateCatalog::from_toml_str(&content).unwrap_err();
        assert!(
            matches!(err, CatalogError::ForwardDependency { step: 2, dependency: 3 }),
            "got {err:?}"
        );
    }

    #[test]
    fn out_of_order_ids_rejected() {
        let content = [
            toml_step(2, r#"{ kind = "anchor_to_project_start" }"#, ""),
            toml_step(1, r#"{ kind = "after_step", step = 2 }"#, ""),
        ]
        .concat();
        let err = StepTemplateCatalog::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, CatalogError::OutOfOrder { previous: 2, step: 1 }));
    }

    #[test]
    fn first_step_must_anchor() {
        let content = toml_step(1, r#"{ kind = "after_max", steps = [] }"#, "");
        let err = StepTemplateCatalog::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, CatalogError::FirstStepNotAnchored { step: 1 }));
    }

    #[test]
    fn second_anchor_rejected() {
        let content = [
            toml_step(1, r#"{ kind = "anchor_to_project_start" }"#, ""),
            toml_step(2, r#"{ kind = "anchor_to_project_start" }"#, ""),
        ]
        .concat();
        let err = StepTemplateCatalog::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, CatalogError::MisplacedAnchor { step: 2 }));
    }

    #[test]
    fn conditional_terminal_rejected() {
        let content = [
            toml_step(1, r#"{ kind = "anchor_to_project_start" }"#, ""),
            toml_step(
                2,
                r#"{ kind = "after_step", step = 1 }"#,
                r#"condition = "has_employees""#,
            ),
        ]
        .concat();
        let err = StepTemplateCatalog::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidTerminal { step: 2 }));
    }

    #[test]
    fn unknown_field_rejected() {
        let content = toml_step(
            1,
            r#"{ kind = "anchor_to_project_start" }"#,
            "colour = \"blue\"",
        );
        let err = StepTemplateCatalog::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, CatalogError::Toml(_)));
    }

    #[test]
    fn lint_flags_edge_to_differently_conditioned_step() {
        let content = [
            toml_step(1, r#"{ kind = "anchor_to_project_start" }"#, ""),
            toml_step(
                2,
                r#"{ kind = "after_step", step = 1 }"#,
                r#"condition = "has_employees""#,
            ),
            toml_step(3, r#"{ kind = "after_step", step = 2 }"#, ""),
            toml_step(4, r#"{ kind = "after_max", steps = [1, 2] }"#, ""),
            toml_step(5, r#"{ kind = "after_step", step = 4 }"#, ""),
        ]
        .concat();
        let catalog = StepTemplateCatalog::from_toml_str(&content).unwrap();
        let violations = catalog.conditional_edge_violations();
        assert_eq!(
            violations,
            vec![EdgeViolation {
                step: 3,
                dependency: 2,
                condition: Condition::HasEmployees,
            }]
        );
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, BUILTIN_CATALOG_TOML).unwrap();
        let catalog = StepTemplateCatalog::from_path(&path).unwrap();
        assert_eq!(catalog, StepTemplateCatalog::builtin().unwrap());

        let missing = StepTemplateCatalog::from_path(&dir.path().join("nope.toml"));
        assert!(missing.is_err());
    }
}
