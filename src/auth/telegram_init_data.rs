use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::RaptorError;

type HmacSha256 = Hmac<Sha256>;

const MAX_INIT_DATA_AGE_S: i64 = 24 * 60 * 60;

/// Verifies a Telegram Mini App `initData` query string against the bot
/// token, per Telegram's documented check: HMAC-SHA256 of the sorted
/// `key=value` pairs (excluding `hash`), keyed by `HMAC-SHA256("WebAppData",
/// bot_token)`. This is the one HTTP-facing boundary spec.md keeps in scope
/// (§6 "HTTP auth boundary") even though the web API surface itself is a
/// Non-goal — grounded in shape (not substance) on
/// `suriel-hilario-tradingbotssd`'s `require_auth` middleware, narrowed to
/// the pure verification function and its `hmac`/`sha2` crates.
pub fn verify_init_data(init_data: &str, bot_token: &str) -> Result<(), RaptorError> {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    let mut provided_hash: Option<&str> = None;

    let mut auth_date: Option<i64> = None;
    for kv in init_data.split('&') {
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("");
        if key == "hash" {
            provided_hash = Some(value);
        } else {
            if key == "auth_date" {
                auth_date = value.parse().ok();
            }
            pairs.push((key, value));
        }
    }

    let provided_hash =
        provided_hash.ok_or_else(|| RaptorError::Other("initData missing hash".into()))?;
    let auth_date =
        auth_date.ok_or_else(|| RaptorError::Other("initData missing auth_date".into()))?;
    if Utc::now().timestamp() - auth_date > MAX_INIT_DATA_AGE_S {
        return Err(RaptorError::Other("initData is stale".into()));
    }

    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let data_check_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut secret_mac = HmacSha256::new_from_slice(b"WebAppData")
        .map_err(|_| RaptorError::Other("hmac key init failed".into()))?;
    secret_mac.update(bot_token.as_bytes());
    let secret_key = secret_mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&secret_key)
        .map_err(|_| RaptorError::Other("hmac key init failed".into()))?;
    mac.update(data_check_string.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed.eq_ignore_ascii_case(provided_hash) {
        Ok(())
    } else {
        Err(RaptorError::Other("initData hash mismatch".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::Mac;

    fn sign(pairs: &[(&str, &str)], bot_token: &str) -> String {
        let mut sorted = pairs.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let data_check_string = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut secret_mac = HmacSha256::new_from_slice(b"WebAppData").unwrap();
        secret_mac.update(bot_token.as_bytes());
        let secret_key = secret_mac.finalize().into_bytes();
        let mut mac = HmacSha256::new_from_slice(&secret_key).unwrap();
        mac.update(data_check_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_is_accepted() {
        let token = "123:ABC";
        let auth_date = Utc::now().timestamp().to_string();
        let pairs = [("user", "{\"id\":1}"), ("auth_date", auth_date.as_str())];
        let hash = sign(&pairs, token);
        let init_data = format!(
            "user={}&auth_date={}&hash={}",
            pairs[0].1, pairs[1].1, hash
        );
        assert!(verify_init_data(&init_data, token).is_ok());
    }

    #[test]
    fn tampered_field_is_rejected() {
        let token = "123:ABC";
        let auth_date = Utc::now().timestamp().to_string();
        let pairs = [("user", "{\"id\":1}"), ("auth_date", auth_date.as_str())];
        let hash = sign(&pairs, token);
        let init_data = format!("user={{\"id\":2}}&auth_date={}&hash={}", pairs[1].1, hash);
        assert!(verify_init_data(&init_data, token).is_err());
    }

    #[test]
    fn stale_auth_date_is_rejected_even_with_a_correct_signature() {
        let token = "123:ABC";
        let stale_auth_date = (Utc::now().timestamp() - 2 * MAX_INIT_DATA_AGE_S).to_string();
        let pairs = [("user", "{\"id\":1}"), ("auth_date", stale_auth_date.as_str())];
        let hash = sign(&pairs, token);
        let init_data = format!(
            "user={}&auth_date={}&hash={}",
            pairs[0].1, pairs[1].1, hash
        );
        assert!(verify_init_data(&init_data, token).is_err());
    }
}
