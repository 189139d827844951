use std::sync::Arc;

use chrono::{DateTime, Utc};
use statig::awaitable::{prelude::*, StateMachine as StatigStateMachine};
use tracing::{error, info, warn};

use crate::config::AppContext;
use crate::types::position::Position;
use crate::types::strategy::Strategy;

use super::exit_queue::{ExitQueue, ExitRequest};
use super::triggers::evaluate;

pub type StateMachine = StatigStateMachine<PositionWatcher>;

/// Carries a fresh snapshot of the position/strategy alongside the price so
/// the `monitoring` handler can pick up store-side changes (e.g. a manual
/// strategy edit) without the caller reaching into the watcher from
/// outside the state machine.
#[derive(Debug, Clone)]
pub struct PriceTick {
    pub position: Position,
    pub strategy: Strategy,
    pub price: f64,
    pub now: DateTime<Utc>,
}

/// One in-memory watcher per open position, the TP/SL analogue of the
/// teacher's one-state-machine-per-pool agent. Monotonic per spec.md §4.4:
/// once a watcher leaves `monitoring` this process never re-evaluates it
/// again: `trigger_exit_atomically` is still the durable source of truth,
/// this is just the in-memory mirror that stops polling.
#[derive(Clone)]
pub struct PositionWatcher {
    ctx: Arc<AppContext>,
    exit_queue: Arc<ExitQueue>,
    pub position: Position,
    pub strategy: Strategy,
}

impl PositionWatcher {
    pub fn new(ctx: Arc<AppContext>, exit_queue: Arc<ExitQueue>, position: Position, strategy: Strategy) -> StateMachine {
        Self {
            ctx,
            exit_queue,
            position,
            strategy,
        }
        .state_machine()
    }

    async fn claim_and_enqueue(&mut self, trigger: crate::types::trigger::TriggerKind, price: f64, sell_percent: f64, exit_level: usize) {
        match self.ctx.store.trigger_exit_atomically(self.position.id, trigger, price).await {
            Ok(true) => {
                let request = ExitRequest {
                    position_id: self.position.id,
                    strategy_id: self.strategy.id,
                    user_id: self.position.user_id,
                    chain: self.position.chain(),
                    mint: self.position.token_mint.clone(),
                    trigger,
                    trigger_price: price,
                    sell_percent,
                    exit_level,
                    slippage_bps: self.strategy.slippage_bps as u32,
                    priority_fee_lamports: self.strategy.priority_fee_lamports as u64,
                };
                self.exit_queue.enqueue(request).await;
            }
            Ok(false) => {
                warn!(position_id = %self.position.id, "lost the atomic exit claim, another evaluator already triggered this position");
            }
            Err(e) => {
                error!(position_id = %self.position.id, error = %e, "trigger_exit_atomically failed");
            }
        }
    }
}

#[state_machine(
    initial = "State::monitoring()",
    state(derive(Debug, Clone, PartialEq, Eq)),
    on_transition = "Self::on_transition"
)]
impl PositionWatcher {
    #[state]
    async fn monitoring(&mut self, tick: &PriceTick) -> Response<State> {
        self.position = tick.position.clone();
        self.strategy = tick.strategy.clone();

        let evaluation = evaluate(&self.position, &self.strategy, tick.price, tick.now);

        if let (Some(peak), Some(stop)) = (evaluation.new_peak_price, evaluation.new_trailing_stop_price) {
            if self.position.peak_price != Some(peak) || self.position.trailing_stop_price != Some(stop) {
                if let Err(e) = self.ctx.store.update_trailing(self.position.id, peak, stop).await {
                    error!(position_id = %self.position.id, error = %e, "update_trailing failed");
                }
                self.position.peak_price = Some(peak);
                self.position.trailing_stop_price = Some(stop);
            }
        }

        match evaluation.fired {
            Some((trigger, sell_percent, exit_level)) => {
                self.claim_and_enqueue(trigger, tick.price, sell_percent, exit_level).await;
                Transition(State::triggered())
            }
            None => Handled,
        }
    }

    #[state]
    async fn triggered(&self, _tick: &PriceTick) -> Response<State> {
        Handled
    }

    fn on_transition(&mut self, source: &State, target: &State) {
        info!(position_id = %self.position.id, "tp/sl watcher transitioned from {source:?} to {target:?}");
    }
}
