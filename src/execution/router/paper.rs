use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;

use crate::config::cache::SpeedCache;
use crate::error::RaptorError;
use crate::execution::router::{SignedTx, SwapIntent, SwapQuote, SwapRouter};
use crate::types::trade_job::TradeAction;
use crate::utils::decimals::sol_to_lamports;

/// Dry-run router for `PaperTrading`/`BackTesting` mode: mocks a fill at
/// the cached native SOL price (or 1:1 if none cached yet) and never
/// touches the network, same shape as the teacher's `PaperExecutor`
/// (mock signature, short sleep, no RPC call).
pub struct PaperRouter {
    cache: SpeedCache,
}

impl PaperRouter {
    pub fn new(cache: SpeedCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SwapRouter for PaperRouter {
    fn name(&self) -> &'static str {
        "paper"
    }

    fn can_handle(&self, _intent: &SwapIntent) -> bool {
        true
    }

    async fn quote(&self, intent: &SwapIntent) -> Result<SwapQuote, RaptorError> {
        let sol_price_usd = self.cache.native_sol_price_usd().await.unwrap_or(1.0);

        match intent.side {
            TradeAction::Buy => {
                let amount_sol = intent
                    .amount_sol
                    .ok_or_else(|| RaptorError::Other("buy intent missing amount_sol".into()))?;
                let lamports_in = sol_to_lamports(amount_sol);
                Ok(SwapQuote {
                    lamports_in,
                    lamports_out: 0,
                    tokens_out: amount_sol * sol_price_usd * 1_000_000.0,
                    tokens_in: 0.0,
                    price_impact_bps: 0,
                })
            }
            TradeAction::Sell => {
                let tokens_in = intent
                    .amount_tokens
                    .ok_or_else(|| RaptorError::Other("sell intent missing amount_tokens".into()))?;
                Ok(SwapQuote {
                    lamports_in: 0,
                    lamports_out: sol_to_lamports(tokens_in / (sol_price_usd * 1_000_000.0)),
                    tokens_out: 0.0,
                    tokens_in,
                    price_impact_bps: 0,
                })
            }
        }
    }

    async fn prepare(
        &self,
        _intent: &SwapIntent,
        _quote: &SwapQuote,
        keypair: &Keypair,
    ) -> Result<SignedTx, RaptorError> {
        let instruction = solana_sdk::system_instruction::transfer(&keypair.pubkey(), &keypair.pubkey(), 0);
        let mut tx = Transaction::new_with_payer(&[instruction], Some(&keypair.pubkey()));
        tx.sign(&[keypair], solana_sdk::hash::Hash::default());
        Ok(SignedTx(tx))
    }

    async fn submit(&self, _tx: SignedTx) -> Result<Signature, RaptorError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut bytes = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut bytes);
        Ok(Signature::from(bytes))
    }
}
