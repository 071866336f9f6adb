//! Step template types as authored in the catalog TOML.

use std::fmt;

use serde::{Deserialize, Serialize};

use dissolve_db::models::ResponsiblePartyType;

use crate::facts::CompanyFacts;

/// Identifier of a step; also its `step_position` once instantiated.
pub type StepId = i32;

/// Phase grouping of the playbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Approval,
    Notices,
    AssetDisposition,
    Creditors,
    TaxAndAccounting,
    Closure,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::Approval => "approval",
            Self::Notices => "notices",
            Self::AssetDisposition => "asset_disposition",
            Self::Creditors => "creditors",
            Self::TaxAndAccounting => "tax_and_accounting",
            Self::Closure => "closure",
        };
        f.write_str(s)
    }
}

/// A role that can be responsible for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// The single external facilitator (the service provider).
    Facilitator,
    Client,
    Board,
    Shareholders,
    LegalCounsel,
    Accountant,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Facilitator => "facilitator",
            Self::Client => "client",
            Self::Board => "board",
            Self::Shareholders => "shareholders",
            Self::LegalCounsel => "legal_counsel",
            Self::Accountant => "accountant",
        };
        f.write_str(s)
    }
}

/// Company-fact test that decides whether a conditional step is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    HasIntellectualProperty,
    IntendsAssetSale,
    /// Intends to sell assets but has no offers in hand yet.
    SeeksBuyers,
    HasFinancialObligations,
    HasEmployees,
}

impl Condition {
    pub fn evaluate(self, facts: &CompanyFacts) -> bool {
        match self {
            Self::HasIntellectualProperty => facts.has_intellectual_property,
            Self::IntendsAssetSale => facts.intends_asset_sale,
            Self::SeeksBuyers => facts.intends_asset_sale && !facts.has_received_offers,
            Self::HasFinancialObligations => facts.has_financial_obligations,
            Self::HasEmployees => facts.has_employees,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HasIntellectualProperty => "has_intellectual_property",
            Self::IntendsAssetSale => "intends_asset_sale",
            Self::SeeksBuyers => "seeks_buyers",
            Self::HasFinancialObligations => "has_financial_obligations",
            Self::HasEmployees => "has_employees",
        };
        f.write_str(s)
    }
}

/// How a step's start (and for some variants, due) date derives from
/// already-resolved steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyRule {
    /// `start = project start`. First step only.
    AnchorToProjectStart,
    /// `start = due(step) + 1 day`.
    AfterStep { step: StepId },
    /// `start = max(due(steps)) + 1 day`. Skipped steps are ignored as long
    /// as one of them resolved.
    AfterMax { steps: Vec<StepId> },
    /// Rides on other steps' windows: `start = start(start_from)`,
    /// `due = due(due_from)`.
    ConcurrentWith { start_from: StepId, due_from: StepId },
    /// `start = start(start_anchor)`, `due = due(end_anchor) - 1 day`.
    SpanningRange {
        start_anchor: StepId,
        end_anchor: StepId,
    },
}

impl DependencyRule {
    /// Every step id this rule reads.
    pub fn references(&self) -> Vec<StepId> {
        match self {
            Self::AnchorToProjectStart => Vec::new(),
            Self::AfterStep { step } => vec![*step],
            Self::AfterMax { steps } => steps.clone(),
            Self::ConcurrentWith {
                start_from,
                due_from,
            } => vec![*start_from, *due_from],
            Self::SpanningRange {
                start_anchor,
                end_anchor,
            } => vec![*start_anchor, *end_anchor],
        }
    }

    /// Short label for listings.
    pub fn describe(&self) -> String {
        match self {
            Self::AnchorToProjectStart => "project start".to_string(),
            Self::AfterStep { step } => format!("after {step}"),
            Self::AfterMax { steps } => {
                let ids: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
                format!("after max({})", ids.join(", "))
            }
            Self::ConcurrentWith {
                start_from,
                due_from,
            } if start_from == due_from => format!("with {start_from}"),
            Self::ConcurrentWith {
                start_from,
                due_from,
            } => format!("with {start_from}..{due_from}"),
            Self::SpanningRange {
                start_anchor,
                end_anchor,
            } => format!("span {start_anchor}..{end_anchor}"),
        }
    }
}

/// How the due date is finalized once the start is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueRule {
    /// `due = start + duration_days` (or the window given by the rule).
    #[default]
    Duration,
    /// `due = end of the month containing start + duration_days`.
    EndOfMonth,
    /// Overwritten with the plan end date after the main pass.
    PlanEnd,
}

/// One task line of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskTemplate {
    pub position: i32,
    pub name: String,
}

/// One step of the playbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepTemplate {
    pub id: StepId,
    pub phase: Phase,
    pub name: String,
    pub parties: Vec<Party>,
    #[serde(default)]
    pub duration_days: u32,
    pub depends: DependencyRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub due: DueRule,
    pub tasks: Vec<TaskTemplate>,
}

impl StepTemplate {
    /// Whether the step applies to a company. Unconditional steps always do.
    pub fn is_included(&self, facts: &CompanyFacts) -> bool {
        self.condition.is_none_or(|c| c.evaluate(facts))
    }

    /// `Facilitator` iff the facilitator is the step's sole party.
    pub fn responsible_party_type(&self) -> ResponsiblePartyType {
        match self.parties.as_slice() {
            [Party::Facilitator] => ResponsiblePartyType::Facilitator,
            _ => ResponsiblePartyType::Client,
        }
    }
}
