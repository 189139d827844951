pub mod amm_aggregator;
pub mod bonding_curve;
pub mod paper;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::Transaction;

use crate::config::AppContext;
use crate::error::RaptorError;
use crate::types::position::LifecycleState;
use crate::types::trade_job::TradeAction;

use amm_aggregator::AmmAggregatorRouter;
use bonding_curve::BondingCurveRouter;
use paper::PaperRouter;

/// What the execution engine wants swapped; common to both the
/// bonding-curve and AMM-aggregator paths (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct SwapIntent {
    pub mint: Pubkey,
    pub side: TradeAction,
    pub amount_sol: Option<f64>,
    pub amount_tokens: Option<f64>,
    pub slippage_bps: u32,
    pub user_pubkey: Pubkey,
    pub lifecycle_state: Option<LifecycleState>,
    pub bonding_curve: Option<Pubkey>,
}

#[derive(Debug, Clone, Copy)]
pub struct SwapQuote {
    pub lamports_in: u64,
    pub lamports_out: u64,
    pub tokens_out: f64,
    pub tokens_in: f64,
    pub price_impact_bps: u32,
}

pub struct SignedTx(pub Transaction);

/// Capability set every router implements: `canHandle`/`quote`/`prepare`/
/// `submit` (spec.md §4.3 step 2, §4.6). Kept as a trait so each router's
/// own tests can exercise it directly; the execution engine dispatches
/// through the `Router` tagged enum below rather than `dyn SwapRouter`,
/// following spec.md §9's "dynamic dispatch → trait objects/sum types"
/// note in favor of the sum-type form.
#[async_trait]
pub trait SwapRouter: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_handle(&self, intent: &SwapIntent) -> bool;
    async fn quote(&self, intent: &SwapIntent) -> Result<SwapQuote, RaptorError>;
    async fn prepare(
        &self,
        intent: &SwapIntent,
        quote: &SwapQuote,
        keypair: &Keypair,
    ) -> Result<SignedTx, RaptorError>;
    async fn submit(&self, tx: SignedTx) -> Result<Signature, RaptorError>;
}

/// Tagged variant over the router implementations, so the execution engine
/// never needs a `Box<dyn SwapRouter>`.
pub enum Router {
    BondingCurve(BondingCurveRouter),
    AmmAggregator(AmmAggregatorRouter),
    Paper(PaperRouter),
}

impl Router {
    pub fn name(&self) -> &'static str {
        match self {
            Router::BondingCurve(r) => r.name(),
            Router::AmmAggregator(r) => r.name(),
            Router::Paper(r) => r.name(),
        }
    }

    pub async fn quote(&self, intent: &SwapIntent) -> Result<SwapQuote, RaptorError> {
        match self {
            Router::BondingCurve(r) => r.quote(intent).await,
            Router::AmmAggregator(r) => r.quote(intent).await,
            Router::Paper(r) => r.quote(intent).await,
        }
    }

    pub async fn prepare(
        &self,
        intent: &SwapIntent,
        quote: &SwapQuote,
        keypair: &Keypair,
    ) -> Result<SignedTx, RaptorError> {
        match self {
            Router::BondingCurve(r) => r.prepare(intent, quote, keypair).await,
            Router::AmmAggregator(r) => r.prepare(intent, quote, keypair).await,
            Router::Paper(r) => r.prepare(intent, quote, keypair).await,
        }
    }

    pub async fn submit(&self, tx: SignedTx) -> Result<Signature, RaptorError> {
        match self {
            Router::BondingCurve(r) => r.submit(tx).await,
            Router::AmmAggregator(r) => r.submit(tx).await,
            Router::Paper(r) => r.submit(tx).await,
        }
    }
}

/// `PRE_GRADUATION` or a known bonding-curve address routes through the
/// curve; `POST_GRADUATION` or no curve routes through the aggregator
/// (spec.md §4.6). Paper mode overrides both for dry-run strategies.
pub fn select_router(ctx: &AppContext, intent: &SwapIntent) -> Router {
    if matches!(
        ctx.settings.engine.mode,
        crate::config::settings::Mode::PaperTrading | crate::config::settings::Mode::BackTesting
    ) {
        return Router::Paper(PaperRouter::new(ctx.cache.clone()));
    }

    let pre_graduation = matches!(intent.lifecycle_state, Some(LifecycleState::PreGraduation))
        || (intent.lifecycle_state.is_none() && intent.bonding_curve.is_some());

    if pre_graduation {
        Router::BondingCurve(BondingCurveRouter::new(ctx.rpc_pool.clone()))
    } else {
        Router::AmmAggregator(AmmAggregatorRouter::new(
            ctx.rpc_pool.clone(),
            ctx.settings.aggregator.quote_uri.clone(),
            ctx.settings.aggregator.quote_timeout_ms,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use solana_sdk::signature::{Keypair, Signer};

    use super::*;
    use crate::config::settings::Mode;
    use crate::config::AppContext;
    use crate::store::memory::MemoryStore;
    use crate::types::trade_job::TradeAction;

    fn intent(lifecycle_state: Option<LifecycleState>, bonding_curve: Option<Pubkey>) -> SwapIntent {
        SwapIntent {
            mint: Pubkey::new_unique(),
            side: TradeAction::Buy,
            amount_sol: Some(0.1),
            amount_tokens: None,
            slippage_bps: 100,
            user_pubkey: Keypair::new().pubkey(),
            lifecycle_state,
            bonding_curve,
        }
    }

    /// `AppContext::test_fixture` defaults to PaperTrading so most tests
    /// never need live settings; these tests care about the non-paper
    /// branch, so they override the mode back to Live.
    fn ctx_in_live_mode() -> AppContext {
        let mut ctx = AppContext::test_fixture(Arc::new(MemoryStore::new()));
        let mut settings = (*ctx.settings).clone();
        settings.engine.mode = Mode::Live;
        ctx.settings = Arc::new(settings);
        ctx
    }

    #[test]
    fn pre_graduation_position_routes_through_bonding_curve() {
        let ctx = ctx_in_live_mode();
        let intent = intent(Some(LifecycleState::PreGraduation), Some(Pubkey::new_unique()));
        assert_eq!(select_router(&ctx, &intent).name(), "bonding_curve");
    }

    #[test]
    fn graduated_position_routes_through_aggregator() {
        // spec.md §8 scenario 3: once `graduate_position_atomically` has run,
        // the very next router selection for that position must come back
        // as the aggregator, never the bonding curve.
        let ctx = ctx_in_live_mode();
        let intent = intent(Some(LifecycleState::PostGraduation), None);
        assert_eq!(select_router(&ctx, &intent).name(), "amm_aggregator");
    }

    #[test]
    fn paper_mode_overrides_lifecycle_state_routing() {
        let ctx = AppContext::test_fixture(Arc::new(MemoryStore::new()));
        let intent = intent(Some(LifecycleState::PreGraduation), Some(Pubkey::new_unique()));
        assert_eq!(select_router(&ctx, &intent).name(), "paper");
    }
}
