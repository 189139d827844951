use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::schema::strategies;
use crate::types::ids::Chain;

/// How aggressively this strategy fetches off-chain metadata before scoring
/// an opportunity (spec.md §4.2 step 3). Ordered from least to most
/// thorough; `Ord` here backs the "most thorough among enabled strategies
/// wins" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SnipeMode {
    Speed,
    Balanced,
    Quality,
}

impl SnipeMode {
    pub fn metadata_fetch_timeout_ms(self) -> u64 {
        match self {
            SnipeMode::Speed => 0,
            SnipeMode::Balanced => 200,
            SnipeMode::Quality => 2000,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "quality" => SnipeMode::Quality,
            "speed" => SnipeMode::Speed,
            _ => SnipeMode::Balanced,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SnipeMode::Speed => "speed",
            SnipeMode::Balanced => "balanced",
            SnipeMode::Quality => "quality",
        }
    }
}

/// One rung of a DCA take-profit ladder: fire at `price_multiple` of entry,
/// sell `sell_percent` of the remaining size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaRung {
    pub price_multiple: f64,
    pub sell_percent: f64,
    pub used: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = strategies)]
pub struct Strategy {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chain: String,
    pub enabled: bool,
    pub auto_execute: bool,
    pub min_score: i32,
    pub allowed_sources: serde_json::Value,
    pub token_denylist: serde_json::Value,
    pub deployer_denylist: serde_json::Value,
    pub min_liquidity_sol: f64,
    pub max_per_trade_sol: f64,
    pub slippage_bps: i32,
    pub priority_fee_lamports: i64,
    pub tp_bps: i32,
    pub sl_bps: i32,
    pub max_hold_s: i64,
    pub trailing_activation_bps: i32,
    pub trailing_distance_bps: i32,
    pub moon_bag_bps: i32,
    pub snipe_mode: String,
    pub dca_rungs: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Strategy {
    pub fn chain(&self) -> Chain {
        Chain::parse(&self.chain).expect("store invariant: strategy.chain is always valid")
    }

    pub fn snipe_mode(&self) -> SnipeMode {
        SnipeMode::parse(&self.snipe_mode)
    }

    pub fn allowed_sources(&self) -> Vec<String> {
        serde_json::from_value(self.allowed_sources.clone()).unwrap_or_default()
    }

    pub fn token_denylist(&self) -> Vec<String> {
        serde_json::from_value(self.token_denylist.clone()).unwrap_or_default()
    }

    pub fn deployer_denylist(&self) -> Vec<String> {
        serde_json::from_value(self.deployer_denylist.clone()).unwrap_or_default()
    }

    pub fn dca_rungs(&self) -> Option<Vec<DcaRung>> {
        self.dca_rungs
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn has_moon_bag(&self) -> bool {
        self.moon_bag_bps > 0
    }

    pub fn tp_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.tp_bps as f64 / 10_000.0)
    }

    pub fn sl_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.sl_bps as f64 / 10_000.0)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = strategies)]
pub struct NewStrategy {
    pub user_id: Uuid,
    pub chain: String,
    pub enabled: bool,
    pub auto_execute: bool,
    pub min_score: i32,
    pub allowed_sources: serde_json::Value,
    pub token_denylist: serde_json::Value,
    pub deployer_denylist: serde_json::Value,
    pub min_liquidity_sol: f64,
    pub max_per_trade_sol: f64,
    pub slippage_bps: i32,
    pub priority_fee_lamports: i64,
    pub tp_bps: i32,
    pub sl_bps: i32,
    pub max_hold_s: i64,
    pub trailing_activation_bps: i32,
    pub trailing_distance_bps: i32,
    pub moon_bag_bps: i32,
    pub snipe_mode: String,
    pub dca_rungs: Option<serde_json::Value>,
}
