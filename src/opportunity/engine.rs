use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::cache::TokenMetadata;
use crate::config::AppContext;
use crate::monitors::events::LaunchEvent;
use crate::opportunity::scoring::{score, ScoringInput};
use crate::types::ids::idempotency_key;
use crate::types::opportunity::{NewOpportunity, OpportunityStatus};
use crate::types::strategy::{SnipeMode, Strategy};
use crate::types::trade_job::{NewTradeJob, TradeJobPayload};

/// Turns one normalized launch event into zero or more BUY `TradeJob`s,
/// following the eight-step sequence: upsert, load strategies, pick a
/// metadata budget, score, and fan out per matching strategy (spec.md
/// §4.2). Called directly by the launchpad monitor's event loop and, for
/// externally supplied candidates, by the candidate consumer (§4.7) with
/// the same event shape.
pub async fn process_launch_event(ctx: &AppContext, event: LaunchEvent) -> anyhow::Result<()> {
    let chain = crate::types::ids::Chain::Solana;

    // Step 1: upsert keyed by (source, mint); idempotent against duplicate
    // creates for the same token.
    let opportunity = ctx
        .store
        .upsert_opportunity(NewOpportunity {
            source: event.source.clone(),
            token_mint: event.mint.to_string(),
            name: Some(event.name.clone()).filter(|s| !s.is_empty()),
            symbol: Some(event.symbol.clone()).filter(|s| !s.is_empty()),
            deployer: event.creator.to_string(),
            bonding_curve_addr: event.bonding_curve.map(|p| p.to_string()),
            initial_liquidity_sol: None,
        })
        .await?;

    // Step 2: no enabled strategies for this chain means nothing to do.
    let strategies = ctx.store.enabled_strategies(chain).await?;
    if strategies.is_empty() {
        debug!(mint = %event.mint, "no enabled strategies, skipping opportunity");
        return Ok(());
    }

    // Step 3: most thorough snipe mode among enabled strategies wins —
    // the fetch budget is chosen once per opportunity, not per user.
    let snipe_mode = strategies
        .iter()
        .map(|s| s.snipe_mode())
        .max()
        .unwrap_or(SnipeMode::Speed);

    // Step 4: conditional metadata fetch, never blocks on failure/timeout.
    let metadata = fetch_metadata(ctx, &event, snipe_mode).await;

    // Step 5: ordered deterministic scoring.
    let scoring_input = ScoringInput {
        event: &event,
        metadata: metadata.as_ref(),
        initial_liquidity_sol: opportunity.initial_liquidity_sol,
    };
    let (total_score, hard_stopped, reasons) = score(&scoring_input);
    let final_score = if hard_stopped { 0 } else { total_score };

    // Step 6: write back score and reasons; REJECTED if below every
    // enabled strategy's min_score.
    ctx.store
        .set_opportunity_score(opportunity.id, final_score, reasons)
        .await?;

    let below_every_strategy = hard_stopped
        || strategies.iter().all(|s| final_score < s.min_score);
    if below_every_strategy {
        ctx.store
            .advance_opportunity_status(opportunity.id, OpportunityStatus::Rejected)
            .await?;
        return Ok(());
    }

    // Step 7: one TradeJob per matching, enabled strategy.
    ctx.store
        .advance_opportunity_status(opportunity.id, OpportunityStatus::Executing)
        .await?;

    let mut jobs_created = 0u32;
    for strategy in &strategies {
        if !strategy_matches(strategy, &event, final_score, opportunity.initial_liquidity_sol, ctx).await {
            continue;
        }

        let key = idempotency_key(&[
            &chain.to_string(),
            &strategy.id.to_string(),
            &event.mint.to_string(),
            &opportunity.id.to_string(),
            &strategy.max_per_trade_sol.to_string(),
            &strategy.slippage_bps.to_string(),
        ]);

        let payload = TradeJobPayload {
            mint: event.mint.to_string(),
            amount_sol: Some(strategy.max_per_trade_sol),
            slippage_bps: strategy.slippage_bps as u32,
            priority_fee_lamports: strategy.priority_fee_lamports as u64,
            bonding_curve: event.bonding_curve.map(|p| p.to_string()),
            position_id: None,
            trigger: None,
            trigger_price: None,
            sell_percent: None,
            exit_level: None,
        };

        let new_job = NewTradeJob::buy(
            key,
            strategy.id,
            strategy.user_id,
            opportunity.id,
            chain,
            payload,
        );

        match ctx.store.insert_trade_job(new_job).await {
            Ok(Some(_)) => jobs_created += 1,
            Ok(None) => debug!(
                strategy_id = %strategy.id,
                mint = %event.mint,
                "trade job already exists for this opportunity, skipping"
            ),
            Err(e) => warn!(strategy_id = %strategy.id, error = %e, "failed to insert trade job"),
        }
    }

    // Step 8: final status.
    let final_status = if jobs_created > 0 {
        OpportunityStatus::Completed
    } else {
        OpportunityStatus::Rejected
    };
    ctx.store
        .advance_opportunity_status(opportunity.id, final_status)
        .await?;

    info!(
        mint = %event.mint,
        score = final_score,
        jobs_created,
        "opportunity processed"
    );
    Ok(())
}

async fn strategy_matches(
    strategy: &Strategy,
    event: &LaunchEvent,
    score: i32,
    initial_liquidity_sol: Option<f64>,
    ctx: &AppContext,
) -> bool {
    if !strategy.enabled || score < strategy.min_score {
        return false;
    }
    if !strategy.allowed_sources().iter().any(|s| s == &event.source) {
        return false;
    }
    if initial_liquidity_sol.unwrap_or(0.0) < strategy.min_liquidity_sol {
        return false;
    }
    if ctx
        .cache
        .is_denied(&event.mint.to_string(), &event.creator.to_string())
        .await
    {
        return false;
    }
    if strategy
        .token_denylist()
        .iter()
        .any(|m| m == &event.mint.to_string())
        || strategy
            .deployer_denylist()
            .iter()
            .any(|d| d == &event.creator.to_string())
    {
        return false;
    }
    true
}

async fn fetch_metadata(
    ctx: &AppContext,
    event: &LaunchEvent,
    snipe_mode: SnipeMode,
) -> Option<TokenMetadata> {
    let timeout_ms = snipe_mode.metadata_fetch_timeout_ms();
    if timeout_ms == 0 || event.uri.is_empty() {
        return None;
    }

    if let Some(cached) = ctx.cache.get_token_metadata(&event.mint.to_string()).await {
        return Some(cached);
    }

    let fetch = async {
        let client = reqwest::Client::new();
        let resp = client.get(&event.uri).send().await.ok()?;
        let body: serde_json::Value = resp.json().await.ok()?;
        Some(TokenMetadata {
            name: body.get("name").and_then(|v| v.as_str()).map(str::to_string),
            symbol: body.get("symbol").and_then(|v| v.as_str()).map(str::to_string),
            decimals: 6,
        })
    };

    match tokio::time::timeout(Duration::from_millis(timeout_ms), fetch).await {
        Ok(Some(metadata)) => {
            ctx.cache
                .put_token_metadata(event.mint.to_string(), metadata.clone())
                .await;
            Some(metadata)
        }
        Ok(None) => {
            debug!(mint = %event.mint, "metadata fetch failed, proceeding without it");
            None
        }
        Err(_) => {
            debug!(mint = %event.mint, timeout_ms, "metadata fetch timed out, proceeding without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use solana_sdk::pubkey::Pubkey;
    use uuid::Uuid;

    use super::*;
    use crate::config::AppContext;
    use crate::store::memory::MemoryStore;
    use crate::store::Store;
    use crate::types::ids::Chain;
    use crate::types::strategy::Strategy;
    use chrono::Utc;

    fn strategy(min_score: i32) -> Strategy {
        Strategy {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            chain: Chain::Solana.to_string(),
            enabled: true,
            auto_execute: true,
            min_score,
            allowed_sources: serde_json::json!(["pump.fun"]),
            token_denylist: serde_json::json!([]),
            deployer_denylist: serde_json::json!([]),
            min_liquidity_sol: 0.0,
            max_per_trade_sol: 0.1,
            slippage_bps: 500,
            priority_fee_lamports: 10_000,
            tp_bps: 5_000,
            sl_bps: 2_000,
            max_hold_s: 3_600,
            trailing_activation_bps: 1_000,
            trailing_distance_bps: 500,
            moon_bag_bps: 0,
            // Speed mode means `fetch_metadata` never makes a real HTTP call.
            snipe_mode: "speed".into(),
            dca_rungs: None,
            created_at: Utc::now(),
        }
    }

    fn event() -> LaunchEvent {
        LaunchEvent {
            source: "pump.fun".into(),
            signature: "sig1".into(),
            mint: Pubkey::new_unique(),
            bonding_curve: Some(Pubkey::new_unique()),
            creator: Pubkey::new_unique(),
            name: "PinkBull".into(),
            symbol: "PBULL".into(),
            uri: "ipfs://example".into(),
        }
    }

    fn ctx_with_strategy(strat: Strategy) -> Arc<AppContext> {
        let store = Arc::new(MemoryStore::new());
        store.seed_strategy(strat);
        Arc::new(AppContext::test_fixture(store))
    }

    // `upsert_opportunity` is idempotent on (source, mint), so re-calling it
    // with the same key is a read-back rather than a second insert.
    async fn reread_opportunity(ctx: &AppContext, ev: &LaunchEvent) -> crate::types::opportunity::Opportunity {
        ctx.store
            .upsert_opportunity(NewOpportunity {
                source: ev.source.clone(),
                token_mint: ev.mint.to_string(),
                name: None,
                symbol: None,
                deployer: ev.creator.to_string(),
                bonding_curve_addr: None,
                initial_liquidity_sol: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_launch_scores_above_threshold_and_creates_one_buy_job() {
        let ctx = ctx_with_strategy(strategy(30));
        let ev = event();

        process_launch_event(&ctx, ev.clone()).await.unwrap();

        let opp = reread_opportunity(&ctx, &ev).await;
        assert!(opp.score >= 30, "score {} should clear min_score 30", opp.score);
        assert_eq!(opp.status(), OpportunityStatus::Completed);

        let jobs = ctx.store.claim_next_job("test-worker", 10).await.unwrap();
        assert_eq!(jobs.len(), 1, "exactly one BUY job for the matching strategy");
    }

    #[tokio::test]
    async fn duplicate_create_collapses_to_one_opportunity_and_one_job() {
        let ctx = ctx_with_strategy(strategy(10));
        let ev = event();

        process_launch_event(&ctx, ev.clone()).await.unwrap();
        process_launch_event(&ctx, ev.clone()).await.unwrap();

        let jobs = ctx.store.claim_next_job("test-worker", 10).await.unwrap();
        assert_eq!(jobs.len(), 1, "exactly one BUY job across both deliveries");
    }

    #[tokio::test]
    async fn score_below_every_strategy_min_score_rejects_opportunity() {
        let ctx = ctx_with_strategy(strategy(1_000));
        let ev = event();

        process_launch_event(&ctx, ev.clone()).await.unwrap();

        let opp = reread_opportunity(&ctx, &ev).await;
        assert_eq!(opp.status(), OpportunityStatus::Rejected);
    }
}
