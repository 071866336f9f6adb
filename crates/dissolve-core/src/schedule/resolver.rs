//! Date resolution over the step catalog.
//!
//! Steps are walked once in catalog order. Each included step gets a
//! [`DateEntry`] computed from its [`DependencyRule`] against entries that
//! are already resolved; excluded steps are recorded as skipped. After the
//! walk, the terminal step's due date becomes the plan end, and every step
//! with [`DueRule::PlanEnd`] has its due date overwritten with it.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{DependencyRule, DueRule, StepId, StepTemplate, StepTemplateCatalog};
use crate::facts::CompanyFacts;

/// Days between "now" and the first step's start.
pub const PROJECT_START_OFFSET_DAYS: u64 = 2;

/// An end-of-month due date closer than this to the start falls back to the
/// end of the start's own month.
pub const END_OF_MONTH_MIN_DAYS: i64 = 7;

/// The resolved window of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateEntry {
    pub step_id: StepId,
    pub start: NaiveDate,
    pub due: NaiveDate,
}

impl DateEntry {
    pub fn duration_days(&self) -> i64 {
        (self.due - self.start).num_days()
    }
}

/// A step's dependency rule references a step that was skipped for this
/// company or has not been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {step} depends on step {dependency}, which was skipped or is unresolved")]
pub struct MissingDependency {
    pub step: StepId,
    pub dependency: StepId,
}

/// Output of one resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSchedule {
    pub project_start: NaiveDate,
    pub plan_end: NaiveDate,
    entries: Vec<DateEntry>,
    skipped: Vec<StepId>,
}

impl ResolvedSchedule {
    /// Entries of included steps, ascending by step id.
    pub fn entries(&self) -> &[DateEntry] {
        &self.entries
    }

    /// Ids of steps excluded by their condition.
    pub fn skipped(&self) -> &[StepId] {
        &self.skipped
    }

    pub fn get(&self, step_id: StepId) -> Option<&DateEntry> {
        self.entries
            .binary_search_by_key(&step_id, |e| e.step_id)
            .ok()
            .map(|idx| &self.entries[idx])
    }
}

/// Project start for a compilation run at `now`: the UTC calendar date two
/// days out, at midnight.
pub fn project_start_for(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive() + Days::new(PROJECT_START_OFFSET_DAYS)
}

/// Last day of the month containing `date`.
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Due date for [`DueRule::EndOfMonth`]: the end of the month containing
/// `start + duration`, falling back to the end of `start`'s month when that
/// lands less than [`END_OF_MONTH_MIN_DAYS`] after `start`.
pub fn end_of_month_due(start: NaiveDate, duration_days: u32) -> NaiveDate {
    let due = end_of_month(start + Days::new(u64::from(duration_days)));
    if (due - start).num_days() < END_OF_MONTH_MIN_DAYS {
        end_of_month(start)
    } else {
        due
    }
}

/// `None` marks a step skipped by its condition.
type DateMap = BTreeMap<StepId, Option<DateEntry>>;

fn lookup(
    dates: &DateMap,
    step: StepId,
    dependency: StepId,
) -> Result<DateEntry, MissingDependency> {
    match dates.get(&dependency) {
        Some(Some(entry)) => Ok(*entry),
        _ => Err(MissingDependency { step, dependency }),
    }
}

/// Resolves the catalog into dated step windows for one company.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleResolver<'a> {
    catalog: &'a StepTemplateCatalog,
}

impl<'a> ScheduleResolver<'a> {
    pub fn new(catalog: &'a StepTemplateCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve every step in catalog order.
    ///
    /// Fails with [`MissingDependency`] when an included step's rule needs a
    /// skipped or unknown step. `after_max` only fails if none of its steps
    /// resolved (or one is unknown).
    pub fn resolve(
        &self,
        facts: &CompanyFacts,
        project_start: NaiveDate,
    ) -> Result<ResolvedSchedule, MissingDependency> {
        let mut dates = DateMap::new();

        for step in self.catalog.all() {
            if !step.is_included(facts) {
                debug!(step = step.id, "step skipped by condition");
                dates.insert(step.id, None);
                continue;
            }

            let entry = resolve_step(step, &dates, project_start)?;
            dates.insert(step.id, Some(entry));
        }

        let terminal = self.catalog.terminal();
        let plan_end = lookup(&dates, terminal.id, terminal.id)?.due;

        // Second pass: open-ended steps run until the plan ends.
        for step in self.catalog.all() {
            if step.due != DueRule::PlanEnd {
                continue;
            }
            if let Some(Some(entry)) = dates.get_mut(&step.id) {
                entry.due = clamp_due(step.id, entry.start, plan_end);
            }
        }

        let mut entries = Vec::with_capacity(dates.len());
        let mut skipped = Vec::new();
        for (id, slot) in dates {
            match slot {
                Some(entry) => entries.push(entry),
                None => skipped.push(id),
            }
        }

        Ok(ResolvedSchedule {
            project_start,
            plan_end,
            entries,
            skipped,
        })
    }
}

fn resolve_step(
    step: &StepTemplate,
    dates: &DateMap,
    project_start: NaiveDate,
) -> Result<DateEntry, MissingDependency> {
    let one_day = Days::new(1);

    let (start, window_due) = match &step.depends {
        DependencyRule::AnchorToProjectStart => (project_start, None),
        DependencyRule::AfterStep { step: dep } => {
            (lookup(dates, step.id, *dep)?.due + one_day, None)
        }
        DependencyRule::AfterMax { steps } => {
            let mut latest: Option<NaiveDate> = None;
            for dep in steps {
                match dates.get(dep) {
                    Some(Some(entry)) => {
                        latest = Some(latest.map_or(entry.due, |l| l.max(entry.due)));
                    }
                    Some(None) => {}
                    None => {
                        return Err(MissingDependency {
                            step: step.id,
                            dependency: *dep,
                        });
                    }
                }
            }
            let latest = latest.ok_or(MissingDependency {
                step: step.id,
                dependency: steps.first().copied().unwrap_or(step.id),
            })?;
            (latest + one_day, None)
        }
        DependencyRule::ConcurrentWith {
            start_from,
            due_from,
        } => (
            lookup(dates, step.id, *start_from)?.start,
            Some(lookup(dates, step.id, *due_from)?.due),
        ),
        DependencyRule::SpanningRange {
            start_anchor,
            end_anchor,
        } => (
            lookup(dates, step.id, *start_anchor)?.start,
            Some(lookup(dates, step.id, *end_anchor)?.due - one_day),
        ),
    };

    let due = match step.due {
        DueRule::EndOfMonth => end_of_month_due(start, step.duration_days),
        // plan_end steps carry their nominal window until the second pass.
        DueRule::Duration | DueRule::PlanEnd => {
            window_due.unwrap_or(start + Days::new(u64::from(step.duration_days)))
        }
    };

    Ok(DateEntry {
        step_id: step.id,
        start,
        due: clamp_due(step.id, start, due),
    })
}

fn clamp_due(step: StepId, start: NaiveDate, due: NaiveDate) -> NaiveDate {
    if due < start {
        warn!(step, %start, %due, "due date precedes start; clamping to start");
        start
    } else {
        due
    }
}
