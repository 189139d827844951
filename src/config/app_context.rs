use std::sync::Arc;

use teloxide::net::client_from_env;
use teloxide::Bot;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::cache::SpeedCache;
use crate::config::constants::RPC_COMMITMENT_LEVEL;
use crate::config::settings::{Mode, Settings};
use crate::solana::RpcClientPool;
use crate::store::postgres::PgStore;
use crate::store::Store;
use crate::wallet::WalletCipher;

/// Everything every task needs a handle to: settings, RPC pool, store,
/// speed cache, wallet cipher, optional bot client. Grounded on
/// `config/app_context.rs`'s `AppContext`, trimmed to RAPTOR's store
/// (no Redis — see DESIGN.md) and built around a `dyn Store` instead of
/// a concrete `DbPool` so paper-trading runs can swap in `MemoryStore`.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub rpc_pool: RpcClientPool,
    pub store: Arc<dyn Store>,
    pub cache: SpeedCache,
    pub wallet_cipher: Arc<WalletCipher>,
    pub tg_bot: Option<Bot>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("rpc_pool", &self.rpc_pool)
            .field("mode", &self.settings.engine.mode)
            .finish()
    }
}

impl AppContext {
    pub async fn new(config_filename: &str) -> anyhow::Result<Self> {
        let settings = Settings::new(config_filename)?;

        init_tracing(&settings.logger.level);

        if settings.engine.mode == Mode::Live {
            refuse_non_mainnet_endpoints(&settings)?;
        }

        let rpc_pool = RpcClientPool::new(&settings.rpcs, RPC_COMMITMENT_LEVEL);
        let db_pool = crate::store::postgres::connect(&settings.storage.database_uri);
        let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool));
        let wallet_cipher = Arc::new(WalletCipher::from_base64(&settings.wallet_encryption.master_key_b64)?);
        let tg_bot = settings
            .tgbot
            .clone()
            .map(|cfg| Bot::with_client(cfg.telegram_token, client_from_env()));

        Ok(Self {
            settings: Arc::new(settings),
            rpc_pool,
            store,
            cache: SpeedCache::new(),
            wallet_cipher,
            tg_bot,
        })
    }

    /// Wires a store of the caller's choosing (typically `MemoryStore`) to
    /// fixture settings and an empty RPC pool, for tests that only exercise
    /// store/cache logic.
    #[cfg(test)]
    pub(crate) fn test_fixture(store: Arc<dyn crate::store::Store>) -> Self {
        Self {
            settings: Arc::new(Settings::test_fixture()),
            rpc_pool: RpcClientPool::new(&std::collections::HashMap::new(), RPC_COMMITMENT_LEVEL),
            store,
            cache: SpeedCache::new(),
            wallet_cipher: Arc::new(WalletCipher::new([0u8; 32])),
            tg_bot: None,
        }
    }
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::new(level)
        .add_directive("h2::codec=info".parse().unwrap())
        .add_directive("hyper::client=info".parse().unwrap())
        .add_directive("reqwest=info".parse().unwrap())
        .add_directive("teloxide=info".parse().unwrap())
        .add_directive("tower=info".parse().unwrap());
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();
}

/// Live mode refuses to start against a devnet/testnet RPC — spec.md §6
/// "Configuration" calls this out explicitly, unlike the teacher which has
/// no such guard.
fn refuse_non_mainnet_endpoints(settings: &Settings) -> anyhow::Result<()> {
    for (name, rpc) in &settings.rpcs {
        if rpc.uri.contains("devnet") || rpc.uri.contains("testnet") {
            anyhow::bail!("refusing to start in Live mode against non-mainnet RPC '{name}': {}", rpc.uri);
        }
    }
    Ok(())
}
