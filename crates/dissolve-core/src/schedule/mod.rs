//! Pure scheduling: resolve step dates, then expand steps into tasks.
//!
//! Nothing in here touches storage; both halves run synchronously over a
//! borrowed [`crate::catalog::StepTemplateCatalog`].

pub mod instantiate;
pub mod resolver;

pub use instantiate::TaskInstantiator;
pub use resolver::{
    DateEntry, MissingDependency, ResolvedSchedule, ScheduleResolver, end_of_month,
    end_of_month_due, project_start_for,
};
