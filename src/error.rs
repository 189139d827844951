use thiserror::Error;

/// Crate-wide error classification. Every fallible boundary (RPC, router,
/// store, monitor, startup) maps its failure into one of these kinds so the
/// retry policy and the notifier can dispatch on type, never on text.
#[derive(Error, Debug)]
pub enum RaptorError {
    #[error("rpc timeout: {0}")]
    RpcTimeout(String),

    #[error("rpc rate limited: {0}")]
    RpcRateLimited(String),

    #[error("blockhash expired")]
    BlockhashExpired,

    #[error("insufficient funds: needed {needed_lamports} lamports, have {have_lamports}")]
    InsufficientFunds {
        needed_lamports: u64,
        have_lamports: u64,
    },

    #[error("slippage exceeded: quoted {quoted_bps} bps, limit {limit_bps} bps")]
    SlippageExceeded { quoted_bps: u32, limit_bps: u32 },

    #[error("bonding curve error: {0}")]
    BondingCurveError(String),

    #[error("token graduated")]
    TokenGraduated,

    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("deduplicated: {0}")]
    Dedupe(String),

    #[error("db transient error: {0}")]
    DbTransient(String),

    #[error("fatal configuration error: {0}")]
    ConfigFatal(String),

    #[error("{0}")]
    Other(String),
}

impl RaptorError {
    /// Whether the retry policy should attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RaptorError::RpcTimeout(_)
                | RaptorError::RpcRateLimited(_)
                | RaptorError::BlockhashExpired
                | RaptorError::DbTransient(_)
        )
    }

    /// Whether a store write should be treated as a success by the caller
    /// (DEDUPE is success-shaped for the producer per spec's error table).
    pub fn is_success_for_producer(&self) -> bool {
        matches!(self, RaptorError::Dedupe(_))
    }
}

impl From<diesel::result::Error> for RaptorError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => RaptorError::Dedupe(info.message().to_string()),
            other => RaptorError::DbTransient(other.to_string()),
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for RaptorError {
    fn from(e: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        RaptorError::DbTransient(e.to_string())
    }
}
