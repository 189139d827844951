use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, Semaphore};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::AppContext;
use crate::types::ids::{idempotency_key, Chain};
use crate::types::notification::{NewNotification, NotificationPayload, NotificationType};
use crate::types::trade_job::{NewTradeJob, TradeJobPayload};
use crate::types::trigger::TriggerKind;

/// One exit the TP/SL engine wants executed. Built straight off the
/// position/strategy that produced it so the queue never needs to go back
/// to the store before writing the `TradeJob`.
#[derive(Debug, Clone)]
pub struct ExitRequest {
    pub position_id: Uuid,
    pub strategy_id: Uuid,
    pub user_id: Uuid,
    pub chain: Chain,
    pub mint: String,
    pub trigger: TriggerKind,
    pub trigger_price: f64,
    pub sell_percent: f64,
    pub exit_level: usize,
    pub slippage_bps: u32,
    pub priority_fee_lamports: u64,
}

impl ExitRequest {
    /// `H(position_id, trigger, sell_percent)` — spec.md §4.4 "Exit queue".
    fn dedup_key(&self) -> String {
        idempotency_key(&[
            &self.position_id.to_string(),
            &self.trigger.to_string(),
            &format!("{:.4}", self.sell_percent),
        ])
    }
}

struct QueuedExit {
    priority: u8,
    enqueued_at: DateTime<Utc>,
    key: String,
    request: ExitRequest,
}

impl PartialEq for QueuedExit {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.enqueued_at == other.enqueued_at
    }
}
impl Eq for QueuedExit {}
impl PartialOrd for QueuedExit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedExit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, self.enqueued_at).cmp(&(other.priority, other.enqueued_at))
    }
}

struct Inner {
    heap: BinaryHeap<Reverse<QueuedExit>>,
    seen: HashSet<String>,
}

/// In-process priority queue between the TP/SL engine (producer) and the
/// executor (consumer) — spec.md §4.4. Ordered by `(trigger_priority,
/// enqueued_at)`, deduplicated by exit idempotency key, and bounded not by
/// dropping but by `max_concurrent_exits`: once that many exits are being
/// written to the store concurrently, further drains wait for a permit
/// instead of discarding anything.
pub struct ExitQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    permits: Arc<Semaphore>,
    max_concurrent_exits: usize,
}

impl ExitQueue {
    pub fn new(max_concurrent_exits: usize) -> Self {
        let max_concurrent_exits = max_concurrent_exits.max(1);
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                seen: HashSet::new(),
            }),
            notify: Notify::new(),
            permits: Arc::new(Semaphore::new(max_concurrent_exits)),
            max_concurrent_exits,
        }
    }

    /// Waits until the heap is empty and every in-flight exit has released
    /// its permit — used on shutdown so a SIGTERM doesn't drop an exit that
    /// already claimed a position's trigger atomically (spec.md §9
    /// "drain on shutdown").
    pub async fn drain(&self) {
        loop {
            let empty = {
                let inner = self.inner.lock().await;
                inner.heap.is_empty() && inner.seen.is_empty()
            };
            if empty && self.permits.available_permits() == self.max_concurrent_exits {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }

    /// Returns `false` if this exact (position, trigger, sell_percent)
    /// combination is already queued or in flight — the caller should treat
    /// that as "already handled", not as an error.
    pub async fn enqueue(&self, request: ExitRequest) -> bool {
        let key = request.dedup_key();
        let mut inner = self.inner.lock().await;
        if !inner.seen.insert(key.clone()) {
            debug!(position_id = %request.position_id, "exit already queued or in flight, skipping duplicate");
            return false;
        }
        inner.heap.push(Reverse(QueuedExit {
            priority: request.trigger.priority(),
            enqueued_at: Utc::now(),
            key,
            request,
        }));
        drop(inner);
        self.notify.notify_one();
        true
    }

    /// Drains the queue forever, writing each exit to the store as a
    /// `TradeJob(SELL)` plus its own permit so at most `max_concurrent_exits`
    /// writes are in flight at once.
    pub async fn run(self: Arc<Self>, ctx: Arc<AppContext>) {
        loop {
            let permit = self.permits.clone().acquire_owned().await.expect("semaphore never closed");
            let item = loop {
                let mut inner = self.inner.lock().await;
                if let Some(Reverse(item)) = inner.heap.pop() {
                    break item;
                }
                drop(inner);
                self.notify.notified().await;
            };

            let queue = self.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                process_exit(&ctx, &item.request).await;
                queue.inner.lock().await.seen.remove(&item.key);
            });
        }
    }
}

async fn process_exit(ctx: &AppContext, request: &ExitRequest) {
    let payload = TradeJobPayload {
        mint: request.mint.clone(),
        amount_sol: None,
        slippage_bps: request.slippage_bps,
        priority_fee_lamports: request.priority_fee_lamports,
        bonding_curve: None,
        position_id: Some(request.position_id),
        trigger: Some(request.trigger),
        trigger_price: Some(request.trigger_price),
        sell_percent: Some(request.sell_percent),
        exit_level: Some(request.exit_level),
    };

    let key = idempotency_key(&[
        &request.position_id.to_string(),
        &request.trigger.to_string(),
        &format!("{:.4}", request.sell_percent),
    ]);

    let new_job = NewTradeJob::sell(
        key,
        request.strategy_id,
        request.user_id,
        request.chain,
        request.trigger,
        payload,
    );

    match ctx.store.insert_trade_job(new_job).await {
        Ok(Some(_)) => {
            if let Err(e) = ctx
                .store
                .insert_notification(NewNotification::new(
                    request.user_id,
                    notification_type_for(request.trigger),
                    NotificationPayload {
                        mint: Some(request.mint.clone()),
                        trigger: Some(request.trigger.to_string()),
                        position_id: Some(request.position_id),
                        ..Default::default()
                    },
                ))
                .await
            {
                error!(position_id = %request.position_id, error = %e, "failed to enqueue trigger-fired notification");
            }
        }
        Ok(None) => debug!(position_id = %request.position_id, "sell job already exists, skipping"),
        Err(e) => warn!(position_id = %request.position_id, error = %e, "failed to insert sell job"),
    }
}

/// The pending-trigger notification uses the same type the final settled
/// notification will use; the outbox delivers both, so the user sees a
/// trigger fire before seeing its outcome.
fn notification_type_for(trigger: TriggerKind) -> NotificationType {
    match trigger {
        TriggerKind::Tp => NotificationType::TpHit,
        TriggerKind::Sl => NotificationType::SlHit,
        TriggerKind::Trail => NotificationType::TrailingStopHit,
        TriggerKind::Maxhold | TriggerKind::Emergency => NotificationType::PositionClosed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(position_id: Uuid, trigger: TriggerKind, sell_percent: f64) -> ExitRequest {
        ExitRequest {
            position_id,
            strategy_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            chain: Chain::Solana,
            mint: "mint".into(),
            trigger,
            trigger_price: 1.0,
            sell_percent,
            exit_level: 0,
            slippage_bps: 100,
            priority_fee_lamports: 0,
        }
    }

    #[tokio::test]
    async fn duplicate_exit_is_rejected_while_first_is_in_flight() {
        let queue = ExitQueue::new(4);
        let position_id = Uuid::new_v4();
        assert!(queue.enqueue(request(position_id, TriggerKind::Tp, 100.0)).await);
        assert!(!queue.enqueue(request(position_id, TriggerKind::Tp, 100.0)).await);
    }

    #[tokio::test]
    async fn distinct_sell_percent_is_not_deduplicated() {
        let queue = ExitQueue::new(4);
        let position_id = Uuid::new_v4();
        assert!(queue.enqueue(request(position_id, TriggerKind::Tp, 50.0)).await);
        assert!(queue.enqueue(request(position_id, TriggerKind::Tp, 100.0)).await);
    }
}
