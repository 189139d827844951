use config::{Config, ConfigError, File};
use serde_derive::Deserialize;

pub type ProviderName = String;

/// Live refuses to start against a devnet/testnet RPC (spec.md §9 Design
/// Notes, "no silent dry-run"); PaperTrading and BackTesting both exist to
/// let the same pipeline run against canned or live candidates without
/// ever broadcasting a signed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[allow(unused)]
pub enum Mode {
    BackTesting,
    PaperTrading,
    Live,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct Rpc {
    pub(crate) uri: String,
    pub(crate) throttling: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct WebSocket {
    pub(crate) uri: String,
    pub(crate) ping_interval_s: Option<u64>,
}

/// One launchpad program the monitor subscribes to (spec.md §4.1,
/// §6 "WS protocol boundary").
#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct LaunchpadConfig {
    pub(crate) program_id: String,
    pub(crate) source: String,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct MonitorConfig {
    pub(crate) heartbeat_frequency_ms: u64,
    pub(crate) reconnect_backoff_ms: u64,
    pub(crate) reconnect_backoff_max_ms: u64,
    pub(crate) candidate_ttl_s: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct AggregatorConfig {
    pub(crate) quote_uri: String,
    pub(crate) quote_timeout_ms: u64,
}

#[derive(Clone, Deserialize)]
#[allow(unused)]
pub struct ExecutorConfig {
    pub(crate) private_keys: Vec<String>,
    pub(crate) solana_execution_rpc_uris_https: Vec<ProviderName>,
    pub(crate) worker_count: usize,
    pub(crate) claim_batch_size: i64,
    pub(crate) max_retries: i32,
    pub(crate) simulate_execution: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct TpSlConfig {
    pub(crate) poll_interval_ms: u64,
    pub(crate) exit_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct NotifierConfig {
    pub(crate) poll_interval_ms: u64,
    pub(crate) batch: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct LoggerConfig {
    pub(crate) level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct StorageConfig {
    pub database_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct EngineConfig {
    pub mode: Mode,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct WalletEncryptionConfig {
    /// Base64-encoded master key; HKDF-expanded into a per-user subkey
    /// before it ever touches a ciphertext (spec.md §5, §9 Secrets).
    pub(crate) master_key_b64: String,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct TgBotConfig {
    pub telegram_token: String,
    pub admin_chat_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct Settings {
    pub rpcs: std::collections::HashMap<ProviderName, Rpc>,
    pub websockets: std::collections::HashMap<ProviderName, WebSocket>,
    pub launchpads: Vec<LaunchpadConfig>,
    pub monitor: MonitorConfig,
    pub aggregator: AggregatorConfig,
    pub executor: ExecutorConfig,
    pub tpsl: TpSlConfig,
    pub notifier: NotifierConfig,
    pub logger: LoggerConfig,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub wallet_encryption: WalletEncryptionConfig,
    pub tgbot: Option<TgBotConfig>,
}

impl std::fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field(
                "solana_execution_rpc_uris_https",
                &self.solana_execution_rpc_uris_https,
            )
            .field("worker_count", &self.worker_count)
            .field("claim_batch_size", &self.claim_batch_size)
            .field("max_retries", &self.max_retries)
            .field("simulate_execution", &self.simulate_execution)
            .field("private_keys", &"<hidden>")
            .finish()
    }
}

impl Settings {
    pub fn new(config_filename: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_filename))
            .add_source(config::Environment::with_prefix("RAPTOR").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Minimal values for tests that need a whole `AppContext` but exercise
    /// only store/cache logic, not the fields below.
    #[cfg(test)]
    pub(crate) fn test_fixture() -> Self {
        Settings {
            rpcs: std::collections::HashMap::new(),
            websockets: std::collections::HashMap::new(),
            launchpads: Vec::new(),
            monitor: MonitorConfig {
                heartbeat_frequency_ms: 30_000,
                reconnect_backoff_ms: 3_000,
                reconnect_backoff_max_ms: 60_000,
                candidate_ttl_s: 600,
            },
            aggregator: AggregatorConfig {
                quote_uri: "https://example.invalid/quote".into(),
                quote_timeout_ms: 500,
            },
            executor: ExecutorConfig {
                private_keys: Vec::new(),
                solana_execution_rpc_uris_https: Vec::new(),
                worker_count: 1,
                claim_batch_size: 1,
                max_retries: 3,
                simulate_execution: true,
            },
            tpsl: TpSlConfig {
                poll_interval_ms: 1_000,
                exit_queue_capacity: 4,
            },
            notifier: NotifierConfig {
                poll_interval_ms: 1_000,
                batch: 16,
            },
            logger: LoggerConfig { level: "info".into() },
            storage: StorageConfig {
                database_uri: "postgres://unused".into(),
            },
            engine: EngineConfig { mode: Mode::PaperTrading },
            wallet_encryption: WalletEncryptionConfig {
                master_key_b64: String::new(),
            },
            tgbot: None,
        }
    }
}
