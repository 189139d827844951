use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::config::constants::SPEED_CACHE_CAPACITY;

/// Process-wide speed cache: deny-lists the hunter consults on every
/// candidate, a priority-fee rolling estimate the execution engine reads
/// before every buy, and a bounded LRU of token metadata already fetched
/// once (spec.md §9 "global mutable state → process-wide caches"). Same
/// `Arc<RwLock<_>>`/`LruCache` shape as the teacher's `OperationalCache`,
/// re-keyed to RAPTOR's fields.
#[derive(Clone)]
pub struct SpeedCache {
    token_denylist: Arc<RwLock<std::collections::HashSet<String>>>,
    deployer_denylist: Arc<RwLock<std::collections::HashSet<String>>>,
    priority_fee_samples: Arc<Mutex<Vec<u64>>>,
    native_sol_price_usd: Arc<RwLock<Option<f64>>>,
    token_metadata: Arc<Mutex<LruCache<String, TokenMetadata>>>,
}

#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: u8,
}

impl SpeedCache {
    pub fn new() -> Self {
        Self {
            token_denylist: Arc::new(RwLock::new(std::collections::HashSet::new())),
            deployer_denylist: Arc::new(RwLock::new(std::collections::HashSet::new())),
            priority_fee_samples: Arc::new(Mutex::new(Vec::with_capacity(SPEED_CACHE_CAPACITY))),
            native_sol_price_usd: Arc::new(RwLock::new(None)),
            token_metadata: Arc::new(Mutex::new(LruCache::new(
                NonZeroUsize::new(SPEED_CACHE_CAPACITY).unwrap(),
            ))),
        }
    }

    pub async fn seed_denylists(&self, tokens: Vec<String>, deployers: Vec<String>) {
        *self.token_denylist.write().await = tokens.into_iter().collect();
        *self.deployer_denylist.write().await = deployers.into_iter().collect();
    }

    pub async fn is_denied(&self, token_mint: &str, deployer: &str) -> bool {
        self.token_denylist.read().await.contains(token_mint)
            || self.deployer_denylist.read().await.contains(deployer)
    }

    pub async fn record_priority_fee(&self, lamports: u64) {
        let mut samples = self.priority_fee_samples.lock().await;
        if samples.len() == SPEED_CACHE_CAPACITY {
            samples.remove(0);
        }
        samples.push(lamports);
    }

    /// 80th-percentile fee over the rolling window; `0` until the window
    /// has any samples.
    pub async fn optimal_priority_fee(&self) -> u64 {
        let samples = self.priority_fee_samples.lock().await;
        if samples.is_empty() {
            return 0;
        }
        let mut sorted = samples.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * 0.80).round() as usize;
        let fee = sorted[idx];
        debug!(fee, "computed optimal priority fee");
        fee
    }

    pub async fn set_native_sol_price_usd(&self, price: f64) {
        *self.native_sol_price_usd.write().await = Some(price);
    }

    pub async fn native_sol_price_usd(&self) -> Option<f64> {
        *self.native_sol_price_usd.read().await
    }

    pub async fn get_token_metadata(&self, mint: &str) -> Option<TokenMetadata> {
        self.token_metadata.lock().await.get(mint).cloned()
    }

    pub async fn put_token_metadata(&self, mint: String, metadata: TokenMetadata) {
        self.token_metadata.lock().await.put(mint, metadata);
    }
}

impl Default for SpeedCache {
    fn default() -> Self {
        Self::new()
    }
}
