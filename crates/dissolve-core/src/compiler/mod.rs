//! Schedule compilation service.
//!
//! `compile` turns one company's facts into its persisted dissolution task
//! set: check for an existing plan, load facts, resolve dates, instantiate
//! tasks, then write the whole batch atomically. A company is compiled at
//! most once; repeat calls are no-ops.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use dissolve_db::models::TaskCategory;

use crate::catalog::StepTemplateCatalog;
use crate::schedule::{
    MissingDependency, ScheduleResolver, TaskInstantiator, project_start_for,
};
use crate::store::{CompanyFactsProvider, TaskReader, TaskWriter, WriteOutcome};

/// Errors that abort a compilation. Nothing is persisted in any case.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("company {0} not found")]
    NotFound(Uuid),

    #[error("failed to load facts for company {company_id}: {source:#}")]
    Facts {
        company_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    MissingDependency(#[from] MissingDependency),

    /// Reading or writing tasks failed.
    #[error("persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

/// What a successful `compile` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    /// A new plan was written.
    Compiled { tasks: u64, plan_end: NaiveDate },
    /// The company already had a plan; nothing changed.
    AlreadyCompiled,
}

/// Compiles dissolution plans against a fixed catalog.
pub struct ScheduleCompilerService<'a, F, R, W> {
    catalog: &'a StepTemplateCatalog,
    facts: &'a F,
    reader: &'a R,
    writer: &'a W,
}

impl<'a, F, R, W> ScheduleCompilerService<'a, F, R, W>
where
    F: CompanyFactsProvider,
    R: TaskReader,
    W: TaskWriter,
{
    pub fn new(
        catalog: &'a StepTemplateCatalog,
        facts: &'a F,
        reader: &'a R,
        writer: &'a W,
    ) -> Self {
        Self {
            catalog,
            facts,
            reader,
            writer,
        }
    }

    /// Compile with the project starting two days from now.
    pub async fn compile(&self, company_id: Uuid) -> Result<CompileOutcome, CompileError> {
        self.compile_at(company_id, Utc::now()).await
    }

    /// Compile as if the current time were `now`.
    pub async fn compile_at(
        &self,
        company_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CompileOutcome, CompileError> {
        let category = TaskCategory::Dissolution;

        let facts = self
            .facts
            .company_facts(company_id)
            .await
            .map_err(|source| CompileError::Facts { company_id, source })?
            .ok_or(CompileError::NotFound(company_id))?;

        if self.reader.has_tasks(company_id, category).await? {
            debug!(%company_id, "plan already compiled; skipping");
            return Ok(CompileOutcome::AlreadyCompiled);
        }

        let project_start = project_start_for(now);
        let schedule = ScheduleResolver::new(self.catalog).resolve(&facts, project_start)?;
        let tasks = TaskInstantiator::new(self.catalog).instantiate(company_id, &schedule);

        debug!(
            %company_id,
            steps = schedule.entries().len(),
            skipped = schedule.skipped().len(),
            tasks = tasks.len(),
            "schedule resolved"
        );

        match self.writer.write_batch(company_id, category, &tasks).await? {
            WriteOutcome::Written(n) => {
                info!(
                    %company_id,
                    tasks = n,
                    %project_start,
                    plan_end = %schedule.plan_end,
                    "compiled dissolution plan"
                );
                Ok(CompileOutcome::Compiled {
                    tasks: n,
                    plan_end: schedule.plan_end,
                })
            }
            WriteOutcome::AlreadyCompiled => {
                info!(%company_id, "plan compiled concurrently; nothing written");
                Ok(CompileOutcome::AlreadyCompiled)
            }
        }
    }
}
