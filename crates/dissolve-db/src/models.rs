use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// The status implied by a progress percentage.
    pub fn for_progress(progress: i32) -> Self {
        match progress {
            p if p >= 100 => Self::Completed,
            p if p > 0 => Self::InProgress,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------

/// Category tag of a scheduled task. Only the dissolution playbook writes
/// to this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Dissolution,
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dissolution => f.write_str("dissolution"),
        }
    }
}

// ---------------------------------------------------------------------------

/// Who is expected to carry out a task: the external facilitator or the
/// client company itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponsiblePartyType {
    Facilitator,
    Client,
}

impl fmt::Display for ResponsiblePartyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Facilitator => "facilitator",
            Self::Client => "client",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A client company and the facts recorded during intake.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub has_intellectual_property: bool,
    pub intends_asset_sale: bool,
    pub has_received_offers: bool,
    pub has_financial_obligations: bool,
    pub has_employees: bool,
    pub created_at: DateTime<Utc>,
}

/// A dated task belonging to a company's compiled plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ScheduledTask {
    pub id: Uuid,
    pub company_id: Uuid,
    pub step_position: i32,
    pub task_position: i32,
    pub description: String,
    pub category: TaskCategory,
    pub responsible_party_type: ResponsiblePartyType,
    pub status: TaskStatus,
    pub progress: i32,
    pub is_assigned: bool,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A task that has been instantiated but not yet written. Storage assigns
/// `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScheduledTask {
    pub company_id: Uuid,
    pub step_position: i32,
    pub task_position: i32,
    pub description: String,
    pub category: TaskCategory,
    pub responsible_party_type: ResponsiblePartyType,
    pub status: TaskStatus,
    pub progress: i32,
    pub is_assigned: bool,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
