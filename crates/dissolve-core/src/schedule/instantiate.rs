//! Expansion of resolved steps into task rows.

use uuid::Uuid;

use dissolve_db::models::{NewScheduledTask, TaskCategory, TaskStatus};

use crate::catalog::StepTemplateCatalog;

use super::resolver::ResolvedSchedule;

/// Turns a [`ResolvedSchedule`] into the task batch for one company.
#[derive(Debug, Clone, Copy)]
pub struct TaskInstantiator<'a> {
    catalog: &'a StepTemplateCatalog,
}

impl<'a> TaskInstantiator<'a> {
    pub fn new(catalog: &'a StepTemplateCatalog) -> Self {
        Self { catalog }
    }

    /// One task per task template of every resolved step, in
    /// `(step_position, task_position)` order. Every task of a step shares
    /// the step's window.
    pub fn instantiate(
        &self,
        company_id: Uuid,
        schedule: &ResolvedSchedule,
    ) -> Vec<NewScheduledTask> {
        let mut tasks = Vec::new();

        for entry in schedule.entries() {
            // Entries only exist for catalog steps.
            let Some(step) = self.catalog.get(entry.step_id) else {
                continue;
            };
            let party = step.responsible_party_type();

            tasks.extend(step.tasks.iter().map(|template| NewScheduledTask {
                company_id,
                step_position: step.id,
                task_position: template.position,
                description: template.name.clone(),
                category: TaskCategory::Dissolution,
                responsible_party_type: party,
                status: TaskStatus::Pending,
                progress: 0,
                is_assigned: false,
                start_date: entry.start,
                due_date: entry.due,
            }));
        }

        tasks
    }
}
