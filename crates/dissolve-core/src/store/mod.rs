//! Storage seams of the compiler.
//!
//! The compiler and the roadmap only talk to storage through these traits.
//! [`PgStore`] implements all of them on top of `dissolve_db`.

mod postgres;

pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use dissolve_db::models::{NewScheduledTask, ScheduledTask, TaskCategory};

use crate::facts::CompanyFacts;

/// Looks up the facts of a company. `None` means the company does not exist.
#[async_trait]
pub trait CompanyFactsProvider: Send + Sync {
    async fn company_facts(&self, company_id: Uuid) -> Result<Option<CompanyFacts>>;
}

/// Read access to persisted tasks.
#[async_trait]
pub trait TaskReader: Send + Sync {
    /// Tasks ordered by `(step_position, task_position)`.
    async fn find_by_company_and_category(
        &self,
        company_id: Uuid,
        category: TaskCategory,
    ) -> Result<Vec<ScheduledTask>>;

    async fn has_tasks(&self, company_id: Uuid, category: TaskCategory) -> Result<bool> {
        Ok(!self
            .find_by_company_and_category(company_id, category)
            .await?
            .is_empty())
    }
}

/// Result of a batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All rows were committed.
    Written(u64),
    /// A batch for this company and category already exists; nothing was
    /// written.
    AlreadyCompiled,
}

/// Atomic batch writer. A call either persists every task or none.
#[async_trait]
pub trait TaskWriter: Send + Sync {
    /// Persist one company's batch. At most one batch per
    /// `(company_id, category)` may ever succeed.
    async fn write_batch(
        &self,
        company_id: Uuid,
        category: TaskCategory,
        tasks: &[NewScheduledTask],
    ) -> Result<WriteOutcome>;
}

const _: () = {
    fn _assert_object_safe(
        _: &dyn CompanyFactsProvider,
        _: &dyn TaskReader,
        _: &dyn TaskWriter,
    ) {
    }
};
