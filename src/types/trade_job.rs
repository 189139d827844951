use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::store::schema::trade_jobs;
use crate::types::ids::Chain;
use crate::types::trigger::TriggerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum TradeAction {
    #[strum(serialize = "BUY")]
    Buy,
    #[strum(serialize = "SELL")]
    Sell,
}

/// CLAIMED is the only status a non-claimant is forbidden to advance past
/// (spec.md §3 ownership rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum TradeJobStatus {
    #[strum(serialize = "PENDING")]
    Pending,
    #[strum(serialize = "CLAIMED")]
    Claimed,
    #[strum(serialize = "EXECUTING")]
    Executing,
    #[strum(serialize = "COMPLETED")]
    Completed,
    #[strum(serialize = "FAILED")]
    Failed,
}

/// The job's action-specific intent. BUY jobs carry everything the router
/// factory and execution engine need to quote and size the trade; SELL jobs
/// additionally carry the trigger that produced them and, for a position
/// already identified, which position to close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeJobPayload {
    pub mint: String,
    pub amount_sol: Option<f64>,
    pub slippage_bps: u32,
    pub priority_fee_lamports: u64,
    /// The opportunity's bonding-curve address, if it had one at fan-out
    /// time. `None` for a BUY against an already-graduated token and for
    /// every SELL job (the position row is the source of truth there).
    pub bonding_curve: Option<String>,
    pub position_id: Option<Uuid>,
    pub trigger: Option<TriggerKind>,
    pub trigger_price: Option<f64>,
    pub sell_percent: Option<f64>,
    /// DCA rung index this sell settles, so the sell pipeline can record it
    /// in `exit_levels_hit` via `reopen_for_moon_bag`. `None` for BUY jobs
    /// and for SELL jobs against a non-laddered strategy.
    pub exit_level: Option<usize>,
}

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = trade_jobs)]
pub struct TradeJob {
    pub id: Uuid,
    pub idempotency_key: String,
    pub strategy_id: Uuid,
    pub user_id: Uuid,
    pub opportunity_id: Option<Uuid>,
    pub chain: String,
    pub action: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub status: String,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TradeJob {
    pub fn chain(&self) -> Chain {
        Chain::parse(&self.chain).expect("store invariant: trade_job.chain is always valid")
    }

    pub fn action(&self) -> TradeAction {
        self.action
            .parse()
            .expect("store invariant: trade_job.action is always valid")
    }

    pub fn status(&self) -> TradeJobStatus {
        self.status
            .parse()
            .expect("store invariant: trade_job.status is always valid")
    }

    pub fn payload(&self) -> TradeJobPayload {
        serde_json::from_value(self.payload.clone())
            .expect("store invariant: trade_job.payload matches TradeJobPayload")
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = trade_jobs)]
pub struct NewTradeJob {
    pub idempotency_key: String,
    pub strategy_id: Uuid,
    pub user_id: Uuid,
    pub opportunity_id: Option<Uuid>,
    pub chain: String,
    pub action: String,
    pub payload: serde_json::Value,
    pub priority: i32,
}

impl NewTradeJob {
    pub fn buy(
        idempotency_key: String,
        strategy_id: Uuid,
        user_id: Uuid,
        opportunity_id: Uuid,
        chain: Chain,
        payload: TradeJobPayload,
    ) -> Self {
        Self {
            idempotency_key,
            strategy_id,
            user_id,
            opportunity_id: Some(opportunity_id),
            chain: chain.to_string(),
            action: TradeAction::Buy.to_string(),
            payload: serde_json::to_value(payload).expect("TradeJobPayload always serializes"),
            priority: 100,
        }
    }

    pub fn sell(
        idempotency_key: String,
        strategy_id: Uuid,
        user_id: Uuid,
        chain: Chain,
        trigger: TriggerKind,
        payload: TradeJobPayload,
    ) -> Self {
        Self {
            idempotency_key,
            strategy_id,
            user_id,
            opportunity_id: None,
            chain: chain.to_string(),
            action: TradeAction::Sell.to_string(),
            payload: serde_json::to_value(payload).expect("TradeJobPayload always serializes"),
            priority: trigger.priority() as i32,
        }
    }
}
