//! Read-side roll-up of a compiled plan into per-step rows.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use dissolve_db::models::{ScheduledTask, TaskCategory};

use crate::catalog::{StepId, StepTemplateCatalog};
use crate::store::TaskReader;

/// One step of a company's roadmap, computed from its stored tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub name: String,
    pub step_pos: StepId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_in_days: i64,
    /// Floor of the mean task progress.
    pub progress: i32,
    pub tasks: Vec<ScheduledTask>,
}

/// Whole-plan figures derived from a roadmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoadmapSummary {
    pub steps: usize,
    pub tasks: usize,
    /// Floor of the mean step progress.
    pub progress: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Builds roadmaps from stored tasks, naming steps from the catalog.
#[derive(Debug, Clone, Copy)]
pub struct RoadmapAggregator<'a, R> {
    catalog: &'a StepTemplateCatalog,
    reader: &'a R,
}

impl<'a, R: TaskReader> RoadmapAggregator<'a, R> {
    pub fn new(catalog: &'a StepTemplateCatalog, reader: &'a R) -> Self {
        Self { catalog, reader }
    }

    /// The company's roadmap, ascending by step. Empty when nothing has
    /// been compiled.
    pub async fn roadmap(&self, company_id: Uuid) -> Result<Vec<PlanStep>> {
        let tasks = self
            .reader
            .find_by_company_and_category(company_id, TaskCategory::Dissolution)
            .await?;
        Ok(aggregate(self.catalog, tasks))
    }

    pub async fn summary(&self, company_id: Uuid) -> Result<Option<RoadmapSummary>> {
        Ok(roadmap_summary(&self.roadmap(company_id).await?))
    }
}

/// Group tasks by step position. Within a step, tasks are taken in task
/// position order: the first task's start and the last task's due bound the
/// step.
pub fn aggregate(catalog: &StepTemplateCatalog, mut tasks: Vec<ScheduledTask>) -> Vec<PlanStep> {
    tasks.sort_by_key(|t| (t.step_position, t.task_position));

    let mut groups: BTreeMap<StepId, Vec<ScheduledTask>> = BTreeMap::new();
    for task in tasks {
        groups.entry(task.step_position).or_default().push(task);
    }

    groups
        .into_iter()
        .filter_map(|(step_pos, tasks)| {
            let start_date = tasks.first()?.start_date;
            let end_date = tasks.last()?.due_date;
            let total: i64 = tasks.iter().map(|t| i64::from(t.progress)).sum();
            let progress = i32::try_from(total / tasks.len() as i64).unwrap_or(i32::MAX);
            let name = catalog
                .get(step_pos)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| format!("Step {step_pos}"));

            Some(PlanStep {
                name,
                step_pos,
                start_date,
                end_date,
                duration_in_days: (end_date - start_date).num_days(),
                progress,
                tasks,
            })
        })
        .collect()
}

/// `None` for an empty roadmap.
pub fn roadmap_summary(steps: &[PlanStep]) -> Option<RoadmapSummary> {
    let start_date = steps.iter().map(|s| s.start_date).min()?;
    let end_date = steps.iter().map(|s| s.end_date).max()?;
    let total: i64 = steps.iter().map(|s| i64::from(s.progress)).sum();

    Some(RoadmapSummary {
        steps: steps.len(),
        tasks: steps.iter().map(|s| s.tasks.len()).sum(),
        progress: i32::try_from(total / steps.len() as i64).unwrap_or(i32::MAX),
        start_date,
        end_date,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use dissolve_db::models::{ResponsiblePartyType, TaskStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(step: i32, pos: i32, progress: i32, start: NaiveDate, due: NaiveDate) -> ScheduledTask {
        ScheduledTask {
            id: Uuid::new_v4(),
            company_id: Uuid::nil(),
            step_position: step,
            task_position: pos,
            description: format!("task {step}.{pos}"),
            category: TaskCategory::Dissolution,
            responsible_party_type: ResponsiblePartyType::Client,
            status: TaskStatus::for_progress(progress),
            progress,
            is_assigned: false,
            start_date: start,
            due_date: due,
            created_at: Utc::now(),
        }
    }

    struct FixedReader(Vec<ScheduledTask>);

    #[async_trait]
    impl TaskReader for FixedReader {
        async fn find_by_company_and_category(
            &self,
            _company_id: Uuid,
            _category: TaskCategory,
        ) -> Result<Vec<ScheduledTask>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn progress_is_floor_of_mean() {
        let catalog = StepTemplateCatalog::builtin().unwrap();
        let (s, d) = (date(2024, 1, 1), date(2024, 1, 8));
        let steps = aggregate(
            &catalog,
            vec![task(1, 1, 0, s, d), task(1, 2, 50, s, d), task(1, 3, 100, s, d)],
        );
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].progress, 50);

        let steps = aggregate(&catalog, vec![task(2, 1, 33, s, d), task(2, 2, 34, s, d)]);
        assert_eq!(steps[0].progress, 33);
    }

    #[test]
    fn window_comes_from_first_and_last_task() {
        let catalog = StepTemplateCatalog::builtin().unwrap();
        // Out of order on purpose.
        let steps = aggregate(
            &catalog,
            vec![
                task(4, 2, 0, date(2024, 2, 1), date(2024, 2, 20)),
                task(4, 1, 0, date(2024, 1, 10), date(2024, 1, 15)),
            ],
        );
        let step = &steps[0];
        assert_eq!(step.start_date, date(2024, 1, 10));
        assert_eq!(step.end_date, date(2024, 2, 20));
        assert_eq!(step.duration_in_days, 41);
        assert_eq!(step.tasks[0].task_position, 1);
    }

    #[test]
    fn steps_are_ascending_and_named() {
        let catalog = StepTemplateCatalog::builtin().unwrap();
        let (s, d) = (date(2024, 1, 1), date(2024, 1, 2));
        let steps = aggregate(
            &catalog,
            vec![task(5, 1, 0, s, d), task(1, 1, 0, s, d), task(99, 1, 0, s, d)],
        );
        let positions: Vec<StepId> = steps.iter().map(|s| s.step_pos).collect();
        assert_eq!(positions, vec![1, 5, 99]);
        assert_eq!(steps[0].name, "Engage wind-down facilitator");
        assert_eq!(steps[2].name, "Step 99");
    }

    #[test]
    fn summary_rolls_up_steps() {
        let catalog = StepTemplateCatalog::builtin().unwrap();
        let steps = aggregate(
            &catalog,
            vec![
                task(1, 1, 100, date(2024, 1, 1), date(2024, 1, 8)),
                task(2, 1, 25, date(2024, 1, 9), date(2024, 2, 6)),
                task(2, 2, 0, date(2024, 1, 9), date(2024, 2, 6)),
            ],
        );
        let summary = roadmap_summary(&steps).unwrap();
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.tasks, 3);
        // Steps at 100 and 12.
        assert_eq!(summary.progress, 56);
        assert_eq!(summary.start_date, date(2024, 1, 1));
        assert_eq!(summary.end_date, date(2024, 2, 6));

        assert!(roadmap_summary(&[]).is_none());
    }

    #[tokio::test]
    async fn empty_roadmap_is_not_an_error() {
        let catalog = StepTemplateCatalog::builtin().unwrap();
        let reader = FixedReader(Vec::new());
        let aggregator = RoadmapAggregator::new(&catalog, &reader);

        assert!(aggregator.roadmap(Uuid::new_v4()).await.unwrap().is_empty());
        assert!(aggregator.summary(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn roadmap_reads_through_task_reader() {
        let catalog = StepTemplateCatalog::builtin().unwrap();
        let reader = FixedReader(vec![task(3, 1, 40, date(2024, 1, 9), date(2024, 1, 23))]);
        let steps = RoadmapAggregator::new(&catalog, &reader)
            .roadmap(Uuid::nil())
            .await
            .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "Prepare financial position statement");
        assert_eq!(steps[0].duration_in_days, 14);
    }
}
