//! Dissolution workflow schedule compiler.
//!
//! Turns the step playbook in [`catalog`] into a dated task list for one
//! company ([`schedule`]), persists it through the collaborators in
//! [`compiler`], and folds stored tasks back into a per-step roadmap
//! ([`roadmap`]).

pub mod catalog;
pub mod compiler;
pub mod facts;
pub mod roadmap;
pub mod schedule;
pub mod store;

pub use catalog::{CatalogError, StepTemplate, StepTemplateCatalog};
pub use compiler::{CompileError, CompileOutcome, ScheduleCompilerService};
pub use facts::CompanyFacts;
pub use roadmap::{PlanStep, RoadmapAggregator, RoadmapSummary};
pub use schedule::{DateEntry, ResolvedSchedule, ScheduleResolver, TaskInstantiator};
pub use store::{CompanyFactsProvider, PgStore, TaskReader, TaskWriter, WriteOutcome};
