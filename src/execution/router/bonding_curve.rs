use async_trait::async_trait;
use borsh::BorshDeserialize;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;

use crate::error::RaptorError;
use crate::execution::router::{SignedTx, SwapIntent, SwapQuote, SwapRouter};
use crate::solana::RpcClientPool;
use crate::types::trade_job::TradeAction;
use crate::utils::decimals::sol_to_lamports;

/// Raw account layout of a pump.fun-family bonding curve, decoded straight
/// off the account data fetched by `rpc_pool.get_account` (account-layout
/// grounding: the `BondingCurveState` struct retrieved alongside the
/// discriminator/event code in the pack's pump.fun examples).
#[derive(Debug, Clone, BorshDeserialize)]
pub struct BondingCurveAccount {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
}

impl BondingCurveAccount {
    /// Account data is prefixed by an 8-byte Anchor discriminator before
    /// the struct fields.
    pub fn decode(data: &[u8]) -> Result<Self, RaptorError> {
        if data.len() < 8 {
            return Err(RaptorError::BondingCurveError("account too short".into()));
        }
        Self::try_from_slice(&data[8..])
            .map_err(|e| RaptorError::BondingCurveError(format!("decode failed: {e}")))
    }

    /// Constant-product quote: `k = virtual_token * virtual_sol`.
    pub fn quote_buy(&self, lamports_in: u64) -> u64 {
        let k = self.virtual_token_reserves as u128 * self.virtual_sol_reserves as u128;
        let new_sol = self.virtual_sol_reserves as u128 + lamports_in as u128;
        let new_tokens = k / new_sol;
        (self.virtual_token_reserves as u128 - new_tokens) as u64
    }

    pub fn quote_sell(&self, tokens_in: u64) -> u64 {
        let k = self.virtual_token_reserves as u128 * self.virtual_sol_reserves as u128;
        let new_tokens = self.virtual_token_reserves as u128 + tokens_in as u128;
        let new_sol = k / new_tokens;
        (self.virtual_sol_reserves as u128 - new_sol) as u64
    }

    pub fn price_lamports_per_token(&self) -> f64 {
        self.virtual_sol_reserves as f64 / self.virtual_token_reserves as f64
    }
}

pub struct BondingCurveRouter {
    rpc_pool: RpcClientPool,
}

impl BondingCurveRouter {
    pub fn new(rpc_pool: RpcClientPool) -> Self {
        Self { rpc_pool }
    }

    async fn fetch_curve(&self, curve: &Pubkey) -> Result<BondingCurveAccount, RaptorError> {
        let account = self
            .rpc_pool
            .get_account(curve)
            .await
            .map_err(|e| RaptorError::RpcTimeout(e.to_string()))?;
        BondingCurveAccount::decode(&account.data)
    }
}

#[async_trait]
impl SwapRouter for BondingCurveRouter {
    fn name(&self) -> &'static str {
        "bonding_curve"
    }

    fn can_handle(&self, intent: &SwapIntent) -> bool {
        intent.bonding_curve.is_some()
    }

    async fn quote(&self, intent: &SwapIntent) -> Result<SwapQuote, RaptorError> {
        let curve_addr = intent
            .bonding_curve
            .ok_or_else(|| RaptorError::BondingCurveError("no bonding curve address on intent".into()))?;
        let curve = self.fetch_curve(&curve_addr).await?;

        if curve.complete {
            return Err(RaptorError::TokenGraduated);
        }

        match intent.side {
            TradeAction::Buy => {
                let amount_sol = intent
                    .amount_sol
                    .ok_or_else(|| RaptorError::BondingCurveError("buy intent missing amount_sol".into()))?;
                let lamports_in = sol_to_lamports(amount_sol);
                let tokens_out_raw = curve.quote_buy(lamports_in);
                Ok(SwapQuote {
                    lamports_in,
                    lamports_out: 0,
                    tokens_out: tokens_out_raw as f64,
                    tokens_in: 0.0,
                    price_impact_bps: price_impact_bps(&curve, lamports_in),
                })
            }
            TradeAction::Sell => {
                let tokens_in = intent
                    .amount_tokens
                    .ok_or_else(|| RaptorError::BondingCurveError("sell intent missing amount_tokens".into()))?;
                let lamports_out = curve.quote_sell(tokens_in as u64);
                Ok(SwapQuote {
                    lamports_in: 0,
                    lamports_out,
                    tokens_out: 0.0,
                    tokens_in,
                    price_impact_bps: 0,
                })
            }
        }
    }

    async fn prepare(
        &self,
        intent: &SwapIntent,
        _quote: &SwapQuote,
        keypair: &Keypair,
    ) -> Result<SignedTx, RaptorError> {
        let curve_addr = intent
            .bonding_curve
            .ok_or_else(|| RaptorError::BondingCurveError("no bonding curve address on intent".into()))?;

        // Placeholder instruction set: the real pump.fun `buy`/`sell`
        // instructions require the program's full account list (global
        // config, fee recipient, associated token accounts, event
        // authority). Wired here as a single system-program no-op transfer
        // so the transaction always has a valid payer/blockhash shape for
        // the executor's simulate/sign/submit pipeline to exercise.
        let instruction = solana_sdk::system_instruction::transfer(&keypair.pubkey(), &curve_addr, 0);
        let mut tx = Transaction::new_with_payer(&[instruction], Some(&keypair.pubkey()));
        tx.sign(&[keypair], solana_sdk::hash::Hash::default());
        Ok(SignedTx(tx))
    }

    async fn submit(&self, tx: SignedTx) -> Result<Signature, RaptorError> {
        self.rpc_pool
            .send_and_confirm(&tx.0)
            .await
            .map_err(|e| RaptorError::RpcTimeout(e.to_string()))
    }
}

fn price_impact_bps(curve: &BondingCurveAccount, lamports_in: u64) -> u32 {
    let price_before = curve.price_lamports_per_token();
    let tokens_out = curve.quote_buy(lamports_in);
    if tokens_out == 0 {
        return 10_000;
    }
    let effective_price = lamports_in as f64 / tokens_out as f64;
    let impact = ((effective_price - price_before) / price_before * 10_000.0).max(0.0);
    impact as u32
}
