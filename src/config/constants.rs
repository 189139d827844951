use solana_sdk::commitment_config::CommitmentLevel;

// TP/SL engine
pub const TRIGGER_CLAIM_RETRY_BACKOFF_MS: u64 = 50;

// Notification outbox
pub const NOTIFICATION_MAX_ATTEMPTS: i32 = 5;

// Speed cache
pub const SPEED_CACHE_CAPACITY: usize = 2048;

pub const RPC_COMMITMENT_LEVEL: CommitmentLevel = CommitmentLevel::Processed;
pub const WS_FEED_COMMITMENT_LEVEL: CommitmentLevel = CommitmentLevel::Confirmed;
