use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::AppContext;
use crate::error::RaptorError;
use crate::execution::router::{select_router, SwapIntent};
use crate::types::ids::Chain;
use crate::types::position::{LifecycleState, Position, TriggerState};
use crate::types::trade_job::TradeAction;

use super::exit_queue::ExitQueue;
use super::state_machine::{PositionWatcher, PriceTick, StateMachine};

/// Polls every open, still-monitoring position at `tpsl.poll_interval_ms`
/// and drives one in-memory watcher per position (spec.md §4.4). Grounded
/// on the teacher's heartbeat-driven agent dispatch loop in
/// `strategy_state_machine.rs`, narrowed from a blockchain-event stream to
/// a plain interval tick since the price source here is polled, not pushed.
pub async fn run(ctx: Arc<AppContext>, exit_queue: Arc<ExitQueue>) {
    let poll_interval = Duration::from_millis(ctx.settings.tpsl.poll_interval_ms);
    let mut watchers: HashMap<Uuid, StateMachine> = HashMap::new();
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        ticker.tick().await;
        if let Err(e) = poll_once(&ctx, &exit_queue, &mut watchers).await {
            error!(error = %e, "tp/sl poll failed");
        }
    }
}

async fn poll_once(
    ctx: &Arc<AppContext>,
    exit_queue: &Arc<ExitQueue>,
    watchers: &mut HashMap<Uuid, StateMachine>,
) -> anyhow::Result<()> {
    let positions = ctx.store.open_positions(Chain::Solana).await?;
    let open_ids: HashSet<Uuid> = positions.iter().map(|p| p.id).collect();
    watchers.retain(|id, _| open_ids.contains(id));

    for position in positions {
        if position.trigger_state() != TriggerState::Monitoring {
            watchers.remove(&position.id);
            continue;
        }

        let strategy = match ctx.store.get_strategy(position.strategy_id).await? {
            Some(s) => s,
            None => continue,
        };
        let price = match fetch_current_price(ctx, &position).await {
            Some(p) => p,
            None => continue,
        };

        let watcher = watchers
            .entry(position.id)
            .or_insert_with(|| PositionWatcher::new(ctx.clone(), exit_queue.clone(), position.clone(), strategy.clone()));
        watcher
            .handle(&PriceTick {
                position,
                strategy,
                price,
                now: Utc::now(),
            })
            .await;
    }

    Ok(())
}

/// Primary source: the AMM aggregator's quote for a nominal 1-token sell
/// gives the current SOL/token price; pre-graduation positions read the
/// bonding curve's on-chain state instead (spec.md §4.4 "Inputs"). Either
/// way this only ever quotes — it never awaits a sell, honoring the
/// non-blocking contract.
async fn fetch_current_price(ctx: &AppContext, position: &Position) -> Option<f64> {
    let mint: solana_sdk::pubkey::Pubkey = position.token_mint.parse().ok()?;
    let bonding_curve = position.bonding_curve.as_ref().and_then(|s| s.parse().ok());

    let intent = SwapIntent {
        mint,
        side: TradeAction::Sell,
        amount_sol: None,
        amount_tokens: Some(1.0),
        slippage_bps: 0,
        user_pubkey: solana_sdk::pubkey::Pubkey::default(),
        lifecycle_state: Some(position.lifecycle_state()),
        bonding_curve,
    };

    let router = select_router(ctx, &intent);
    match router.quote(&intent).await {
        Ok(quote) => Some(crate::utils::decimals::lamports_to_sol(quote.lamports_out)),
        Err(RaptorError::TokenGraduated) => graduate_and_requote(ctx, position, intent).await,
        Err(e) => {
            debug!(position_id = %position.id, error = %e, "price fetch failed, skipping this tick");
            None
        }
    }
}

/// spec.md §7: `TOKEN_GRADUATED → re-route via factory to aggregator`.
/// Flips the position's `lifecycle_state` via the same CAS the executor
/// uses, then re-quotes through the aggregator in the same tick rather
/// than waiting for the next poll to notice.
async fn graduate_and_requote(ctx: &AppContext, position: &Position, mut intent: SwapIntent) -> Option<f64> {
    match ctx.store.graduate_position_atomically(position.id, None).await {
        Ok(true) => {
            debug!(position_id = %position.id, "bonding curve reports graduation, re-routing to aggregator");
            intent.lifecycle_state = Some(LifecycleState::PostGraduation);
            intent.bonding_curve = None;
            let aggregator = select_router(ctx, &intent);
            match aggregator.quote(&intent).await {
                Ok(quote) => Some(crate::utils::decimals::lamports_to_sol(quote.lamports_out)),
                Err(e) => {
                    debug!(position_id = %position.id, error = %e, "post-graduation price fetch failed, skipping this tick");
                    None
                }
            }
        }
        Ok(false) => None,
        Err(e) => {
            error!(position_id = %position.id, error = %e, "failed to record graduation");
            None
        }
    }
}
