use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use dissolve_db::models::{NewScheduledTask, ScheduledTask, TaskCategory};
use dissolve_db::queries::{companies, tasks};

use super::{CompanyFactsProvider, TaskReader, TaskWriter, WriteOutcome};
use crate::facts::CompanyFacts;

/// PostgreSQL-backed store. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CompanyFactsProvider for PgStore {
    async fn company_facts(&self, company_id: Uuid) -> Result<Option<CompanyFacts>> {
        let company = companies::get_company(&self.pool, company_id).await?;
        Ok(company.as_ref().map(CompanyFacts::from))
    }
}

#[async_trait]
impl TaskReader for PgStore {
    async fn find_by_company_and_category(
        &self,
        company_id: Uuid,
        category: TaskCategory,
    ) -> Result<Vec<ScheduledTask>> {
        tasks::list_tasks_for_company(&self.pool, company_id, category).await
    }

    async fn has_tasks(&self, company_id: Uuid, category: TaskCategory) -> Result<bool> {
        tasks::has_tasks_for_category(&self.pool, company_id, category).await
    }
}

#[async_trait]
impl TaskWriter for PgStore {
    async fn write_batch(
        &self,
        company_id: Uuid,
        category: TaskCategory,
        batch: &[NewScheduledTask],
    ) -> Result<WriteOutcome> {
        let outcome = tasks::insert_task_batch(&self.pool, company_id, category, batch).await?;
        Ok(match outcome {
            tasks::BatchInsert::Inserted(n) => WriteOutcome::Written(n),
            tasks::BatchInsert::AlreadyClaimed => WriteOutcome::AlreadyCompiled,
        })
    }
}
