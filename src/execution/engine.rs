use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppContext;
use crate::config::constants::TRIGGER_CLAIM_RETRY_BACKOFF_MS;
use crate::error::RaptorError;
use crate::execution::router::{select_router, SwapIntent};
use crate::types::notification::{NewNotification, NotificationPayload, NotificationType};
use crate::types::position::{LifecycleState, NewPosition};
use crate::types::trade_job::{TradeAction, TradeJob, TradeJobStatus};
use crate::types::trigger::TriggerKind;
use crate::utils::decimals::lamports_to_sol;
use crate::wallet::keys::SigningKeypair;

const RENT_FEE_BUFFER_LAMPORTS: u64 = 5_000_000;
const PRICE_IMPACT_WARN_BPS: u32 = 500;
const PRICE_IMPACT_CEILING_BPS: u32 = 1_500;

/// One worker's lifecycle: derive a stable id once, then loop claiming and
/// executing at most one job per tick (spec.md §4.3 "Worker lifecycle").
pub async fn run_worker(ctx: Arc<AppContext>, worker_id: String) {
    info!(worker_id, "execution worker started");
    loop {
        match ctx.store.claim_next_job(&worker_id, 1).await {
            Ok(jobs) if jobs.is_empty() => {
                tokio::time::sleep(Duration::from_millis(TRIGGER_CLAIM_RETRY_BACKOFF_MS)).await;
            }
            Ok(jobs) => {
                for job in jobs {
                    execute_job(&ctx, &worker_id, job).await;
                }
            }
            Err(e) => {
                warn!(worker_id, error = %e, "claim_next_job failed");
                tokio::time::sleep(Duration::from_millis(TRIGGER_CLAIM_RETRY_BACKOFF_MS)).await;
            }
        }
    }
}

async fn execute_job(ctx: &AppContext, worker_id: &str, job: TradeJob) {
    let result = match job.action() {
        TradeAction::Buy => execute_buy(ctx, &job).await,
        TradeAction::Sell => execute_sell(ctx, &job).await,
    };

    match result {
        Ok(()) => {
            if let Err(e) = ctx
                .store
                .mark_job_status(job.id, TradeJobStatus::Completed, job.attempts + 1, None)
                .await
            {
                error!(job_id = %job.id, error = %e, "failed to mark job completed");
            }
        }
        Err(e) => {
            let attempts = job.attempts + 1;
            let status = status_after_failure(attempts, ctx.settings.executor.max_retries);
            match status {
                TradeJobStatus::Pending => {
                    warn!(worker_id, job_id = %job.id, attempts, error = %e, "trade job failed, will retry")
                }
                _ => warn!(worker_id, job_id = %job.id, attempts, error = %e, "trade job exhausted retries"),
            }
            if let Err(store_err) = ctx
                .store
                .mark_job_status(job.id, status, attempts, Some(e.to_string()))
                .await
            {
                error!(job_id = %job.id, error = %store_err, "failed to mark job status after failure");
            }
        }
    }
}

/// PENDING while attempts remain, FAILED once attempts reach the limit.
fn status_after_failure(attempts: i32, max_retries: i32) -> TradeJobStatus {
    if attempts < max_retries {
        TradeJobStatus::Pending
    } else {
        TradeJobStatus::Failed
    }
}

/// BUY pipeline (spec.md §4.3): load strategy+wallet, decrypt in a narrow
/// critical section, pick a router, validate balance, quote within the
/// slippage/impact ceiling, submit, and record the resulting position.
async fn execute_buy(ctx: &AppContext, job: &TradeJob) -> Result<(), RaptorError> {
    let payload = job.payload();

    if job.attempts > 0 {
        warn!(job_id = %job.id, "retrying buy job that already has attempts recorded");
    }

    let strategy = ctx
        .store
        .get_strategy(job.strategy_id)
        .await?
        .ok_or_else(|| RaptorError::Other("strategy not found".into()))?;
    let wallet = ctx
        .store
        .get_wallet(job.user_id, job.chain())
        .await?
        .ok_or_else(|| RaptorError::Other("wallet not found".into()))?;

    let secret = ctx
        .wallet_cipher
        .unseal(job.user_id, &wallet.encrypted_secret, &wallet.nonce)?;
    let keypair = SigningKeypair::from_secret_bytes(secret)?;

    let mint: solana_sdk::pubkey::Pubkey = payload
        .mint
        .parse()
        .map_err(|_| RaptorError::ParseFailed("trade job mint not a valid pubkey".into()))?;
    let amount_sol = payload
        .amount_sol
        .ok_or_else(|| RaptorError::Other("buy job missing amount_sol".into()))?;
    let bonding_curve: Option<solana_sdk::pubkey::Pubkey> = payload
        .bonding_curve
        .as_ref()
        .and_then(|s| s.parse().ok());

    let balance_lamports = ctx
        .rpc_pool
        .get_balance(&keypair.pubkey())
        .await
        .map_err(|e| RaptorError::RpcTimeout(e.to_string()))?;
    let needed_lamports = crate::utils::decimals::sol_to_lamports(amount_sol) + RENT_FEE_BUFFER_LAMPORTS;
    if balance_lamports < needed_lamports {
        enqueue_hunt_skipped(ctx, job.user_id, "insufficient balance", needed_lamports, balance_lamports).await;
        return Err(RaptorError::InsufficientFunds {
            needed_lamports,
            have_lamports: balance_lamports,
        });
    }

    let intent = SwapIntent {
        mint,
        side: TradeAction::Buy,
        amount_sol: Some(amount_sol),
        amount_tokens: None,
        slippage_bps: payload.slippage_bps,
        user_pubkey: keypair.pubkey(),
        lifecycle_state: None,
        bonding_curve,
    };
    let router = select_router(ctx, &intent);

    let quote = router.quote(&intent).await?;
    if quote.price_impact_bps > PRICE_IMPACT_CEILING_BPS {
        return Err(RaptorError::SlippageExceeded {
            quoted_bps: quote.price_impact_bps,
            limit_bps: PRICE_IMPACT_CEILING_BPS,
        });
    }
    if quote.price_impact_bps >= PRICE_IMPACT_WARN_BPS {
        warn!(job_id = %job.id, impact_bps = quote.price_impact_bps, "high price impact on buy");
    }

    let signed_tx = router.prepare(&intent, &quote, keypair.inner()).await?;
    let signature = router.submit(signed_tx).await?;

    let entry_price = if quote.tokens_out > 0.0 {
        quote.lamports_in as f64 / quote.tokens_out
    } else {
        0.0
    };
    let lifecycle_state = if intent.bonding_curve.is_some() {
        LifecycleState::PreGraduation
    } else {
        LifecycleState::PostGraduation
    };

    let new_position = NewPosition {
        user_id: job.user_id,
        strategy_id: job.strategy_id,
        chain: job.chain().to_string(),
        token_mint: payload.mint.clone(),
        bonding_curve: intent.bonding_curve.map(|p| p.to_string()),
        entry_tx: signature.to_string(),
        entry_price,
        entry_cost_sol: amount_sol,
        size_tokens: quote.tokens_out,
        token_decimals: 6,
        lifecycle_state: lifecycle_state.to_string(),
        tp_price: Some(strategy.tp_price(entry_price)),
        sl_price: Some(strategy.sl_price(entry_price)),
    };
    ctx.store.insert_position(new_position).await?;

    ctx.store
        .insert_notification(NewNotification::new(
            job.user_id,
            NotificationType::BuyConfirmed,
            NotificationPayload {
                mint: Some(payload.mint.clone()),
                amount_sol: Some(amount_sol),
                token_amount: Some(quote.tokens_out),
                tx_hash: Some(signature.to_string()),
                ..Default::default()
            },
        ))
        .await?;

    Ok(())
}

/// SELL pipeline (spec.md §4.3): mark the position executing, size the
/// exit honoring any moon bag, submit, and settle realized PnL.
async fn execute_sell(ctx: &AppContext, job: &TradeJob) -> Result<(), RaptorError> {
    let payload = job.payload();
    let position_id = payload
        .position_id
        .ok_or_else(|| RaptorError::Other("sell job missing position_id".into()))?;
    let trigger = payload
        .trigger
        .ok_or_else(|| RaptorError::Other("sell job missing trigger".into()))?;

    let won_race = ctx.store.mark_position_executing(position_id).await?;
    if !won_race {
        return Err(RaptorError::Dedupe(format!(
            "position {position_id} not in TRIGGERED state, refusing duplicate sell"
        )));
    }

    let position = ctx
        .store
        .get_position(position_id)
        .await?
        .ok_or_else(|| RaptorError::Other("position not found".into()))?;
    let strategy = ctx
        .store
        .get_strategy(position.strategy_id)
        .await?
        .ok_or_else(|| RaptorError::Other("strategy not found".into()))?;
    let wallet = ctx
        .store
        .get_wallet(position.user_id, position.chain())
        .await?
        .ok_or_else(|| RaptorError::Other("wallet not found".into()))?;

    let secret = ctx
        .wallet_cipher
        .unseal(position.user_id, &wallet.encrypted_secret, &wallet.nonce)?;
    let keypair = SigningKeypair::from_secret_bytes(secret)?;

    // For TP with a moon bag the first exit keeps `100 - moon_bag%`; all
    // other triggers respect the job's requested percent (100% default).
    let requested_percent = payload.sell_percent.unwrap_or(100.0);
    let sell_percent = if trigger == TriggerKind::Tp && strategy.has_moon_bag() {
        requested_percent.min(100.0 - (strategy.moon_bag_bps as f64 / 100.0))
    } else {
        requested_percent
    };
    let tokens_to_sell = position.size_tokens * (sell_percent / 100.0);

    let mint: solana_sdk::pubkey::Pubkey = position
        .token_mint
        .parse()
        .map_err(|_| RaptorError::ParseFailed("position mint not a valid pubkey".into()))?;
    let bonding_curve = position
        .bonding_curve
        .as_ref()
        .and_then(|s| s.parse().ok());

    let intent = SwapIntent {
        mint,
        side: TradeAction::Sell,
        amount_sol: None,
        amount_tokens: Some(tokens_to_sell),
        slippage_bps: strategy.slippage_bps as u32,
        user_pubkey: keypair.pubkey(),
        lifecycle_state: Some(position.lifecycle_state()),
        bonding_curve,
    };
    let router = select_router(ctx, &intent);

    let outcome = async {
        let quote = router.quote(&intent).await?;
        let signed_tx = router.prepare(&intent, &quote, keypair.inner()).await?;
        let signature = router.submit(signed_tx).await?;
        Ok::<_, RaptorError>((quote, signature))
    }
    .await;

    let (quote, signature) = match outcome {
        Ok(v) => v,
        Err(e) => {
            ctx.store.mark_trigger_failed(position_id, &e.to_string()).await?;
            return Err(e);
        }
    };

    let sol_received = lamports_to_sol(quote.lamports_out);
    let cost_basis_sol = position.entry_cost_sol * (sell_percent / 100.0);
    let realized_pnl_sol = sol_received - cost_basis_sol;
    let remaining_tokens = position.size_tokens - tokens_to_sell;

    ctx.store
        .mark_trigger_completed(position_id, realized_pnl_sol, remaining_tokens)
        .await?;

    if remaining_tokens > 0.0 && trigger == TriggerKind::Tp && strategy.has_moon_bag() {
        ctx.store
            .reopen_for_moon_bag(position_id, remaining_tokens, payload.exit_level.unwrap_or(0))
            .await?;
    }

    let pnl_percent = if cost_basis_sol > 0.0 {
        (realized_pnl_sol / cost_basis_sol) * 100.0
    } else {
        0.0
    };

    let notif_type = match trigger {
        TriggerKind::Tp => NotificationType::TpHit,
        TriggerKind::Sl => NotificationType::SlHit,
        TriggerKind::Trail => NotificationType::TrailingStopHit,
        TriggerKind::Maxhold | TriggerKind::Emergency => NotificationType::PositionClosed,
    };

    ctx.store
        .insert_notification(NewNotification::new(
            position.user_id,
            notif_type,
            NotificationPayload {
                mint: Some(position.token_mint.clone()),
                pnl_percent: Some(pnl_percent),
                sol_received: Some(sol_received),
                tx_hash: Some(signature.to_string()),
                trigger: Some(trigger.to_string()),
                position_id: Some(position_id),
                ..Default::default()
            },
        ))
        .await?;

    Ok(())
}

async fn enqueue_hunt_skipped(
    ctx: &AppContext,
    user_id: Uuid,
    reason: &str,
    needed_lamports: u64,
    have_lamports: u64,
) {
    let payload = NotificationPayload {
        needed_sol: Some(lamports_to_sol(needed_lamports)),
        have_sol: Some(lamports_to_sol(have_lamports)),
        reason: Some(reason.to_string()),
        ..Default::default()
    };
    if let Err(e) = ctx
        .store
        .insert_notification(NewNotification::new(user_id, NotificationType::HuntSkipped, payload))
        .await
    {
        error!(error = %e, "failed to enqueue hunt-skipped notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_while_attempts_remain_under_the_limit() {
        assert_eq!(status_after_failure(1, 3), TradeJobStatus::Pending);
        assert_eq!(status_after_failure(2, 3), TradeJobStatus::Pending);
    }

    #[test]
    fn fails_terminally_once_attempts_reach_the_limit() {
        assert_eq!(status_after_failure(3, 3), TradeJobStatus::Failed);
        assert_eq!(status_after_failure(4, 3), TradeJobStatus::Failed);
    }
}
