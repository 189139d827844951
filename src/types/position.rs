use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::store::schema::positions;
use crate::types::ids::Chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum LifecycleState {
    #[strum(serialize = "PRE_GRADUATION")]
    PreGraduation,
    #[strum(serialize = "POST_GRADUATION")]
    PostGraduation,
    #[strum(serialize = "CLOSED")]
    Closed,
}

/// Monotonic DAG MONITORING → TRIGGERED → EXECUTING → {COMPLETED, FAILED}
/// (spec.md §3, §8 invariant 2). `can_advance_to` is the single source of
/// truth for "is this transition legal" used by both the in-memory test
/// double and as a sanity assertion alongside the store's CAS functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum TriggerState {
    #[strum(serialize = "MONITORING")]
    Monitoring,
    #[strum(serialize = "TRIGGERED")]
    Triggered,
    #[strum(serialize = "EXECUTING")]
    Executing,
    #[strum(serialize = "COMPLETED")]
    Completed,
    #[strum(serialize = "FAILED")]
    Failed,
}

impl TriggerState {
    pub fn can_advance_to(self, next: TriggerState) -> bool {
        use TriggerState::*;
        matches!(
            (self, next),
            (Monitoring, Triggered) | (Triggered, Executing) | (Executing, Completed) | (Executing, Failed)
        )
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = positions)]
pub struct Position {
    pub id: Uuid,
    pub user_id: Uuid,
    pub strategy_id: Uuid,
    pub chain: String,
    pub token_mint: String,
    pub bonding_curve: Option<String>,
    pub entry_tx: String,
    pub entry_price: f64,
    pub entry_cost_sol: f64,
    pub size_tokens: f64,
    pub token_decimals: i32,
    pub lifecycle_state: String,
    pub trigger_state: String,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub peak_price: Option<f64>,
    pub trailing_stop_price: Option<f64>,
    pub partial_exit_taken: bool,
    pub exit_levels_hit: serde_json::Value,
    pub moon_bag_amount: Option<f64>,
    pub realized_pnl_sol: Option<f64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn chain(&self) -> Chain {
        Chain::parse(&self.chain).expect("store invariant: position.chain is always valid")
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle_state
            .parse()
            .expect("store invariant: position.lifecycle_state is always valid")
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.trigger_state
            .parse()
            .expect("store invariant: position.trigger_state is always valid")
    }

    pub fn exit_levels_hit(&self) -> Vec<usize> {
        serde_json::from_value(self.exit_levels_hit.clone()).unwrap_or_default()
    }

    pub fn graduated(&self) -> bool {
        matches!(self.lifecycle_state(), LifecycleState::PostGraduation)
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.lifecycle_state(), LifecycleState::Closed)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = positions)]
pub struct NewPosition {
    pub user_id: Uuid,
    pub strategy_id: Uuid,
    pub chain: String,
    pub token_mint: String,
    pub bonding_curve: Option<String>,
    pub entry_tx: String,
    pub entry_price: f64,
    pub entry_cost_sol: f64,
    pub size_tokens: f64,
    pub token_decimals: i32,
    pub lifecycle_state: String,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
}
