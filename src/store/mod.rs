pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RaptorError;
use crate::types::*;

pub type StoreResult<T> = Result<T, RaptorError>;

/// The store facade. Every mutation that crosses an invariant (claim,
/// trigger, graduate, upsert) is one call here, never a read-modify-write
/// sequence the caller assembles itself (spec.md §5 "Shared resource
/// policy"). Implemented by a Postgres-backed client (`postgres::PgStore`)
/// and an in-memory test double (`memory::MemoryStore`) behind the same
/// trait, mirroring the teacher/pack's swappable-backend-by-mode pattern.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load_or_create_user(&self, telegram_id: i64, chat_id: i64) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn get_wallet(&self, user_id: Uuid, chain: Chain) -> StoreResult<Option<Wallet>>;
    async fn insert_wallet(&self, wallet: NewWallet) -> StoreResult<Wallet>;

    async fn enabled_strategies(&self, chain: Chain) -> StoreResult<Vec<Strategy>>;
    async fn get_strategy(&self, id: Uuid) -> StoreResult<Option<Strategy>>;

    /// Upsert keyed by (source, mint); returns the row whether it was just
    /// inserted or already existed (spec.md §4.2 step 1).
    async fn upsert_opportunity(&self, new: NewOpportunity) -> StoreResult<Opportunity>;
    async fn get_opportunity(&self, id: Uuid) -> StoreResult<Option<Opportunity>>;
    async fn set_opportunity_score(
        &self,
        id: Uuid,
        score: i32,
        reasons: Vec<ScoreReason>,
    ) -> StoreResult<()>;
    /// No-op (not an error) if `next` is not a legal advance from the
    /// current status — callers check `OpportunityStatus::can_advance_to`
    /// first and this is the enforcement backstop.
    async fn advance_opportunity_status(
        &self,
        id: Uuid,
        next: OpportunityStatus,
    ) -> StoreResult<bool>;

    /// Returns `Ok(None)` (not an error) when the idempotency key already
    /// existed — spec.md §7 treats DEDUPE as success for the producer.
    async fn insert_trade_job(&self, new: NewTradeJob) -> StoreResult<Option<TradeJob>>;
    async fn claim_next_job(&self, worker_id: &str, limit: i64) -> StoreResult<Vec<TradeJob>>;
    async fn mark_job_status(
        &self,
        id: Uuid,
        status: TradeJobStatus,
        attempts: i32,
        last_error: Option<String>,
    ) -> StoreResult<()>;

    async fn insert_position(&self, new: NewPosition) -> StoreResult<Position>;
    async fn get_position(&self, id: Uuid) -> StoreResult<Option<Position>>;
    async fn open_positions(&self, chain: Chain) -> StoreResult<Vec<Position>>;
    async fn trigger_exit_atomically(
        &self,
        position_id: Uuid,
        trigger: TriggerKind,
        price: f64,
    ) -> StoreResult<bool>;
    async fn mark_position_executing(&self, position_id: Uuid) -> StoreResult<bool>;
    async fn mark_trigger_completed(
        &self,
        position_id: Uuid,
        realized_pnl_sol: f64,
        remaining_size_tokens: f64,
    ) -> StoreResult<()>;
    async fn mark_trigger_failed(&self, position_id: Uuid, reason: &str) -> StoreResult<()>;
    async fn graduate_position_atomically(
        &self,
        position_id: Uuid,
        pool: Option<&str>,
    ) -> StoreResult<bool>;
    async fn update_trailing(
        &self,
        position_id: Uuid,
        peak_price: f64,
        trailing_stop_price: f64,
    ) -> StoreResult<()>;
    /// Moon-bag residual: size shrinks, trigger_state returns to
    /// MONITORING for the part left open (spec.md §4.4 "Moon bag").
    async fn reopen_for_moon_bag(
        &self,
        position_id: Uuid,
        remaining_size_tokens: f64,
        exit_level: usize,
    ) -> StoreResult<()>;

    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification>;
    async fn claim_notifications(&self, worker_id: &str, limit: i64) -> StoreResult<Vec<Notification>>;
    async fn mark_notification_delivered(&self, id: Uuid) -> StoreResult<()>;
    async fn mark_notification_failed(&self, id: Uuid, err: &str) -> StoreResult<()>;

    async fn upsert_launch_candidate(&self, new: NewLaunchCandidate) -> StoreResult<LaunchCandidate>;
    async fn pending_launch_candidates(&self, now: DateTime<Utc>) -> StoreResult<Vec<LaunchCandidate>>;
    async fn mark_launch_candidate_status(
        &self,
        id: Uuid,
        status: LaunchCandidateStatus,
        reason: Option<&str>,
    ) -> StoreResult<()>;
}
