use sha2::{Digest, Sha256};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// The chains RAPTOR can hold a wallet on. Solana-only in the live product;
/// the variant exists because the store schema and wallet ownership rules
/// are chain-generic. Stored as text, the same way the teacher stores its
/// status columns (`solana_actions.status`, `bot_events.event_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Chain {
    Solana,
}

impl Chain {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Self::from_str(s).map_err(|_| anyhow::anyhow!("unknown chain: {s}"))
    }
}

/// Hashes arbitrary stringifiable fields into a stable hex idempotency key.
/// Used both for `TradeJob::idempotency_key` (§4.2 step 7) and the exit
/// queue's dedup key (§4.4) — same construction, different field sets.
pub fn idempotency_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\0");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_deterministic_and_order_sensitive() {
        let a = idempotency_key(&["solana", "strat-1", "mint-1"]);
        let b = idempotency_key(&["solana", "strat-1", "mint-1"]);
        let c = idempotency_key(&["strat-1", "solana", "mint-1"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
