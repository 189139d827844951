use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::store::schema::opportunities;

/// Transitions NEW→{REJECTED,QUALIFIED,EXECUTING}, QUALIFIED→{EXECUTING,EXPIRED},
/// EXECUTING→{COMPLETED,REJECTED} (spec.md §3). Advance-only; the opportunity
/// engine never writes a status "backward". NEW→EXECUTING is direct because
/// the scoring operation (spec.md §4.2) never produces an intermediate
/// QUALIFIED write of its own; QUALIFIED is reachable only for callers that
/// choose to gate on it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum OpportunityStatus {
    #[strum(serialize = "NEW")]
    New,
    #[strum(serialize = "QUALIFIED")]
    Qualified,
    #[strum(serialize = "REJECTED")]
    Rejected,
    #[strum(serialize = "EXECUTING")]
    Executing,
    #[strum(serialize = "COMPLETED")]
    Completed,
    #[strum(serialize = "EXPIRED")]
    Expired,
}

impl OpportunityStatus {
    pub fn can_advance_to(self, next: OpportunityStatus) -> bool {
        use OpportunityStatus::*;
        matches!(
            (self, next),
            (New, Rejected)
                | (New, Qualified)
                | (New, Executing)
                | (Qualified, Executing)
                | (Qualified, Expired)
                | (Executing, Completed)
                | (Executing, Rejected)
        )
    }
}

/// One scoring rule's outcome, persisted in `reasons` for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReason {
    pub rule: String,
    pub passed: bool,
    pub weight: i32,
    pub is_hard_stop: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = opportunities)]
pub struct Opportunity {
    pub id: Uuid,
    pub source: String,
    pub token_mint: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub deployer: String,
    pub bonding_curve_addr: Option<String>,
    pub initial_liquidity_sol: Option<f64>,
    pub score: i32,
    pub reasons: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn status(&self) -> OpportunityStatus {
        self.status
            .parse()
            .expect("store invariant: opportunity.status is always valid")
    }

    pub fn reasons(&self) -> Vec<ScoreReason> {
        serde_json::from_value(self.reasons.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = opportunities)]
pub struct NewOpportunity {
    pub source: String,
    pub token_mint: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub deployer: String,
    pub bonding_curve_addr: Option<String>,
    pub initial_liquidity_sol: Option<f64>,
}
