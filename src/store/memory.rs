use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RaptorError;
use crate::store::{Store, StoreResult};
use crate::types::*;

/// Swappable backend for tests and paper-trading runs, same role as the
/// pack's in-memory paper-broker stores: every `Store` method keeps the
/// exact CAS/advance-only semantics the Postgres functions enforce, just
/// guarded by a mutex instead of `for update skip locked`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    users_by_telegram_id: HashMap<i64, Uuid>,
    wallets: HashMap<Uuid, Wallet>,
    strategies: HashMap<Uuid, Strategy>,
    opportunities: HashMap<Uuid, Opportunity>,
    opportunities_by_source_mint: HashMap<(String, String), Uuid>,
    trade_jobs: HashMap<Uuid, TradeJob>,
    trade_jobs_by_idempotency_key: HashMap<String, Uuid>,
    positions: HashMap<Uuid, Position>,
    notifications: HashMap<Uuid, Notification>,
    launch_candidates: HashMap<Uuid, LaunchCandidate>,
    launch_candidates_by_source_mint: HashMap<(String, String), Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategy CRUD lives in the (out-of-scope) chat layer; tests seed one
    /// directly instead of routing through a store method that doesn't
    /// otherwise exist.
    #[cfg(test)]
    pub(crate) fn seed_strategy(&self, strategy: Strategy) {
        let mut inner = self.inner.lock().unwrap();
        inner.strategies.insert(strategy.id, strategy);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_or_create_user(&self, telegram_id: i64, chat_id: i64) -> StoreResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(id) = inner.users_by_telegram_id.get(&telegram_id) {
            return Ok(inner.users[id].clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            telegram_id,
            chat_id,
            created_at: Utc::now(),
            is_active: true,
        };
        inner.users_by_telegram_id.insert(telegram_id, user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&id).cloned())
    }

    async fn get_wallet(&self, user_id: Uuid, chain: Chain) -> StoreResult<Option<Wallet>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .wallets
            .values()
            .find(|w| w.user_id == user_id && w.chain() == chain)
            .cloned())
    }

    async fn insert_wallet(&self, wallet: NewWallet) -> StoreResult<Wallet> {
        let mut inner = self.inner.lock().unwrap();
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: wallet.user_id,
            chain: wallet.chain,
            public_key: wallet.public_key,
            encrypted_secret: wallet.encrypted_secret,
            nonce: wallet.nonce,
            backup_at: None,
            created_at: Utc::now(),
        };
        inner.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn enabled_strategies(&self, chain: Chain) -> StoreResult<Vec<Strategy>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .strategies
            .values()
            .filter(|s| s.chain() == chain && s.enabled)
            .cloned()
            .collect())
    }

    async fn get_strategy(&self, id: Uuid) -> StoreResult<Option<Strategy>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.strategies.get(&id).cloned())
    }

    async fn upsert_opportunity(&self, new: NewOpportunity) -> StoreResult<Opportunity> {
        let mut inner = self.inner.lock().unwrap();
        let key = (new.source.clone(), new.token_mint.clone());
        if let Some(id) = inner.opportunities_by_source_mint.get(&key) {
            return Ok(inner.opportunities[id].clone());
        }
        let now = Utc::now();
        let opp = Opportunity {
            id: Uuid::new_v4(),
            source: new.source,
            token_mint: new.token_mint,
            name: new.name,
            symbol: new.symbol,
            deployer: new.deployer,
            bonding_curve_addr: new.bonding_curve_addr,
            initial_liquidity_sol: new.initial_liquidity_sol,
            score: 0,
            reasons: serde_json::json!([]),
            status: OpportunityStatus::New.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.opportunities_by_source_mint.insert(key, opp.id);
        inner.opportunities.insert(opp.id, opp.clone());
        Ok(opp)
    }

    async fn get_opportunity(&self, id: Uuid) -> StoreResult<Option<Opportunity>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.opportunities.get(&id).cloned())
    }

    async fn set_opportunity_score(
        &self,
        id: Uuid,
        score: i32,
        reasons: Vec<ScoreReason>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let opp = inner
            .opportunities
            .get_mut(&id)
            .ok_or_else(|| RaptorError::Other("unknown opportunity".into()))?;
        opp.score = score;
        opp.reasons = serde_json::to_value(reasons).unwrap();
        opp.updated_at = Utc::now();
        Ok(())
    }

    async fn advance_opportunity_status(
        &self,
        id: Uuid,
        next: OpportunityStatus,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let opp = inner
            .opportunities
            .get_mut(&id)
            .ok_or_else(|| RaptorError::Other("unknown opportunity".into()))?;
        if !opp.status().can_advance_to(next) {
            return Ok(false);
        }
        opp.status = next.to_string();
        opp.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_trade_job(&self, new: NewTradeJob) -> StoreResult<Option<TradeJob>> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .trade_jobs_by_idempotency_key
            .contains_key(&new.idempotency_key)
        {
            return Ok(None);
        }
        let job = TradeJob {
            id: Uuid::new_v4(),
            idempotency_key: new.idempotency_key.clone(),
            strategy_id: new.strategy_id,
            user_id: new.user_id,
            opportunity_id: new.opportunity_id,
            chain: new.chain,
            action: new.action,
            payload: new.payload,
            priority: new.priority,
            status: TradeJobStatus::Pending.to_string(),
            claimed_by: None,
            claimed_at: None,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        };
        inner
            .trade_jobs_by_idempotency_key
            .insert(new.idempotency_key, job.id);
        inner.trade_jobs.insert(job.id, job.clone());
        Ok(Some(job))
    }

    async fn claim_next_job(&self, worker_id: &str, limit: i64) -> StoreResult<Vec<TradeJob>> {
        let mut inner = self.inner.lock().unwrap();
        let mut candidates: Vec<Uuid> = inner
            .trade_jobs
            .values()
            .filter(|j| j.status() == TradeJobStatus::Pending)
            .map(|j| j.id)
            .collect();
        candidates.sort_by_key(|id| {
            let j = &inner.trade_jobs[id];
            (j.priority, j.created_at)
        });
        candidates.truncate(limit.max(0) as usize);
        let now = Utc::now();
        let mut claimed = Vec::with_capacity(candidates.len());
        for id in candidates {
            let job = inner.trade_jobs.get_mut(&id).unwrap();
            job.status = TradeJobStatus::Claimed.to_string();
            job.claimed_by = Some(worker_id.to_string());
            job.claimed_at = Some(now);
            claimed.push(job.clone());
        }
        Ok(claimed)
    }

    async fn mark_job_status(
        &self,
        id: Uuid,
        status: TradeJobStatus,
        attempts: i32,
        last_error: Option<String>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .trade_jobs
            .get_mut(&id)
            .ok_or_else(|| RaptorError::Other("unknown trade job".into()))?;
        job.status = status.to_string();
        job.attempts = attempts;
        job.last_error = last_error;
        Ok(())
    }

    async fn insert_position(&self, new: NewPosition) -> StoreResult<Position> {
        let mut inner = self.inner.lock().unwrap();
        let position = Position {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            strategy_id: new.strategy_id,
            chain: new.chain,
            token_mint: new.token_mint,
            bonding_curve: new.bonding_curve,
            entry_tx: new.entry_tx,
            entry_price: new.entry_price,
            entry_cost_sol: new.entry_cost_sol,
            size_tokens: new.size_tokens,
            token_decimals: new.token_decimals,
            lifecycle_state: new.lifecycle_state,
            trigger_state: TriggerState::Monitoring.to_string(),
            tp_price: new.tp_price,
            sl_price: new.sl_price,
            peak_price: None,
            trailing_stop_price: None,
            partial_exit_taken: false,
            exit_levels_hit: serde_json::json!([]),
            moon_bag_amount: None,
            realized_pnl_sol: None,
            opened_at: Utc::now(),
            closed_at: None,
        };
        inner.positions.insert(position.id, position.clone());
        Ok(position)
    }

    async fn get_position(&self, id: Uuid) -> StoreResult<Option<Position>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.positions.get(&id).cloned())
    }

    async fn open_positions(&self, chain: Chain) -> StoreResult<Vec<Position>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .positions
            .values()
            .filter(|p| p.chain() == chain && p.trigger_state() == TriggerState::Monitoring)
            .cloned()
            .collect())
    }

    async fn trigger_exit_atomically(
        &self,
        position_id: Uuid,
        trigger: TriggerKind,
        price: f64,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| RaptorError::Other("unknown position".into()))?;
        if !position
            .trigger_state()
            .can_advance_to(TriggerState::Triggered)
        {
            return Ok(false);
        }
        position.trigger_state = TriggerState::Triggered.to_string();
        position.peak_price = Some(position.peak_price.unwrap_or(price).max(price));
        let _ = trigger;
        Ok(true)
    }

    async fn mark_position_executing(&self, position_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| RaptorError::Other("unknown position".into()))?;
        if !position
            .trigger_state()
            .can_advance_to(TriggerState::Executing)
        {
            return Ok(false);
        }
        position.trigger_state = TriggerState::Executing.to_string();
        Ok(true)
    }

    async fn mark_trigger_completed(
        &self,
        position_id: Uuid,
        realized_pnl_sol: f64,
        remaining_size_tokens: f64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| RaptorError::Other("unknown position".into()))?;
        position.trigger_state = TriggerState::Completed.to_string();
        position.size_tokens = remaining_size_tokens;
        position.realized_pnl_sol = Some(realized_pnl_sol);
        if remaining_size_tokens <= 0.0 {
            position.lifecycle_state = LifecycleState::Closed.to_string();
            position.closed_at = Some(Utc::now());
        } else {
            position.lifecycle_state = LifecycleState::PostGraduation.to_string();
        }
        Ok(())
    }

    async fn mark_trigger_failed(&self, position_id: Uuid, _reason: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| RaptorError::Other("unknown position".into()))?;
        position.trigger_state = TriggerState::Failed.to_string();
        Ok(())
    }

    async fn graduate_position_atomically(
        &self,
        position_id: Uuid,
        pool: Option<&str>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| RaptorError::Other("unknown position".into()))?;
        if position.lifecycle_state() != LifecycleState::PreGraduation {
            return Ok(false);
        }
        position.lifecycle_state = LifecycleState::PostGraduation.to_string();
        position.bonding_curve = pool.map(str::to_string).or(position.bonding_curve.clone());
        Ok(true)
    }

    async fn update_trailing(
        &self,
        position_id: Uuid,
        peak_price: f64,
        trailing_stop_price: f64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| RaptorError::Other("unknown position".into()))?;
        position.peak_price = Some(peak_price);
        position.trailing_stop_price = Some(trailing_stop_price);
        Ok(())
    }

    async fn reopen_for_moon_bag(
        &self,
        position_id: Uuid,
        remaining_size_tokens: f64,
        exit_level: usize,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| RaptorError::Other("unknown position".into()))?;
        let mut levels = position.exit_levels_hit();
        levels.push(exit_level);
        position.exit_levels_hit = serde_json::to_value(levels).unwrap();
        position.size_tokens = remaining_size_tokens;
        position.trigger_state = TriggerState::Monitoring.to_string();
        position.partial_exit_taken = true;
        Ok(())
    }

    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        let mut inner = self.inner.lock().unwrap();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            notif_type: new.notif_type,
            payload: new.payload,
            claimed_by: None,
            claimed_at: None,
            delivered_at: None,
            attempts: 0,
            failed: false,
            created_at: Utc::now(),
        };
        inner.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn claim_notifications(&self, worker_id: &str, limit: i64) -> StoreResult<Vec<Notification>> {
        let mut inner = self.inner.lock().unwrap();
        let mut candidates: Vec<Uuid> = inner
            .notifications
            .values()
            .filter(|n| n.delivered_at.is_none() && !n.failed && n.claimed_by.is_none())
            .map(|n| n.id)
            .collect();
        candidates.sort_by_key(|id| inner.notifications[id].created_at);
        candidates.truncate(limit.max(0) as usize);
        let now = Utc::now();
        let mut claimed = Vec::with_capacity(candidates.len());
        for id in candidates {
            let notification = inner.notifications.get_mut(&id).unwrap();
            notification.claimed_by = Some(worker_id.to_string());
            notification.claimed_at = Some(now);
            claimed.push(notification.clone());
        }
        Ok(claimed)
    }

    async fn mark_notification_delivered(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let notification = inner
            .notifications
            .get_mut(&id)
            .ok_or_else(|| RaptorError::Other("unknown notification".into()))?;
        notification.delivered_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_notification_failed(&self, id: Uuid, _err: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let notification = inner
            .notifications
            .get_mut(&id)
            .ok_or_else(|| RaptorError::Other("unknown notification".into()))?;
        notification.attempts += 1;
        notification.claimed_by = None;
        notification.claimed_at = None;
        if notification.attempts >= crate::config::constants::NOTIFICATION_MAX_ATTEMPTS {
            notification.failed = true;
        }
        Ok(())
    }

    async fn upsert_launch_candidate(&self, new: NewLaunchCandidate) -> StoreResult<LaunchCandidate> {
        let mut inner = self.inner.lock().unwrap();
        let key = (new.source.clone(), new.mint.clone());
        if let Some(id) = inner.launch_candidates_by_source_mint.get(&key) {
            return Ok(inner.launch_candidates[id].clone());
        }
        let candidate = LaunchCandidate {
            id: Uuid::new_v4(),
            mint: new.mint,
            source: new.source,
            status: LaunchCandidateStatus::New.to_string(),
            reason: new.reason,
            expires_at: new.expires_at,
            created_at: Utc::now(),
        };
        inner.launch_candidates_by_source_mint.insert(key, candidate.id);
        inner.launch_candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn pending_launch_candidates(&self, now: DateTime<Utc>) -> StoreResult<Vec<LaunchCandidate>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .launch_candidates
            .values()
            .filter(|c| c.status() == LaunchCandidateStatus::New && !c.is_stale(now))
            .cloned()
            .collect())
    }

    async fn mark_launch_candidate_status(
        &self,
        id: Uuid,
        status: LaunchCandidateStatus,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let candidate = inner
            .launch_candidates
            .get_mut(&id)
            .ok_or_else(|| RaptorError::Other("unknown launch candidate".into()))?;
        candidate.status = status.to_string();
        candidate.reason = reason.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> crate::types::trade_job::TradeJobPayload {
        crate::types::trade_job::TradeJobPayload {
            mint: "mint1".into(),
            amount_sol: Some(0.5),
            slippage_bps: 500,
            priority_fee_lamports: 10_000,
            bonding_curve: None,
            position_id: None,
            trigger: None,
            trigger_price: None,
            sell_percent: None,
            exit_level: None,
        }
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_dedupe_not_error() {
        let store = MemoryStore::new();
        let user = store.load_or_create_user(1, 1).await.unwrap();
        let strategy_id = Uuid::new_v4();
        let opp = store
            .upsert_opportunity(NewOpportunity {
                source: "pumpfun".into(),
                token_mint: "mint1".into(),
                name: None,
                symbol: None,
                deployer: "deployer1".into(),
                bonding_curve_addr: None,
                initial_liquidity_sol: Some(1.0),
            })
            .await
            .unwrap();
        let new = NewTradeJob::buy(
            "key-1".into(),
            strategy_id,
            user.id,
            opp.id,
            Chain::Solana,
            payload(),
        );
        let first = store.insert_trade_job(new.clone()).await.unwrap();
        let second = store.insert_trade_job(new).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn trigger_state_cannot_skip_triggered() {
        let store = MemoryStore::new();
        let user = store.load_or_create_user(2, 2).await.unwrap();
        let position = store
            .insert_position(NewPosition {
                user_id: user.id,
                strategy_id: Uuid::new_v4(),
                chain: Chain::Solana.to_string(),
                token_mint: "mint1".into(),
                bonding_curve: None,
                entry_tx: "tx1".into(),
                entry_price: 1.0,
                entry_cost_sol: 1.0,
                size_tokens: 100.0,
                token_decimals: 6,
                lifecycle_state: LifecycleState::PreGraduation.to_string(),
                tp_price: Some(1.5),
                sl_price: Some(0.7),
            })
            .await
            .unwrap();
        let advanced = store.mark_position_executing(position.id).await.unwrap();
        assert!(!advanced);
    }

    async fn open_position(store: &MemoryStore) -> Position {
        let user = store.load_or_create_user(3, 3).await.unwrap();
        store
            .insert_position(NewPosition {
                user_id: user.id,
                strategy_id: Uuid::new_v4(),
                chain: Chain::Solana.to_string(),
                token_mint: "mint1".into(),
                bonding_curve: Some("curve1".into()),
                entry_tx: "tx1".into(),
                entry_price: 1.0,
                entry_cost_sol: 1.0,
                size_tokens: 100.0,
                token_decimals: 6,
                lifecycle_state: LifecycleState::PreGraduation.to_string(),
                tp_price: Some(1.5),
                sl_price: Some(0.7),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn emergency_sell_second_tap_is_idempotent() {
        let store = MemoryStore::new();
        let position = open_position(&store).await;

        let first = store
            .trigger_exit_atomically(position.id, TriggerKind::Emergency, 1.1)
            .await
            .unwrap();
        let second = store
            .trigger_exit_atomically(position.id, TriggerKind::Emergency, 1.1)
            .await
            .unwrap();

        assert!(first, "first emergency tap claims the trigger");
        assert!(!second, "second tap while already TRIGGERED must be a no-op");
    }

    #[tokio::test]
    async fn graduation_transitions_exactly_once() {
        let store = MemoryStore::new();
        let position = open_position(&store).await;

        let first = store
            .graduate_position_atomically(position.id, Some("pool1"))
            .await
            .unwrap();
        let second = store
            .graduate_position_atomically(position.id, Some("pool1"))
            .await
            .unwrap();

        assert!(first);
        assert!(!second, "already POST_GRADUATION, second call is a no-op");
        let reloaded = store.get_position(position.id).await.unwrap().unwrap();
        assert_eq!(reloaded.lifecycle_state(), LifecycleState::PostGraduation);
    }
}
