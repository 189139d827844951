use std::fmt::{self, Debug, Formatter};

use solana_sdk::bs58;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use zeroize::Zeroize;

use crate::error::RaptorError;

/// A keypair that exists only for the duration of signing: built from the
/// decrypted secret, used once, then dropped. `Debug` never prints key
/// material — same redaction discipline as the teacher's `KeypairClonable`,
/// minus the `Clone`/`ToSql` impls RAPTOR has no use for since this type
/// never crosses the store boundary.
pub struct SigningKeypair(Keypair);

impl Debug for SigningKeypair {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKeypair({})", self.0.pubkey())
    }
}

impl SigningKeypair {
    pub fn pubkey(&self) -> Pubkey {
        self.0.pubkey()
    }

    pub fn inner(&self) -> &Keypair {
        &self.0
    }

    /// Accepts a 32-byte seed or a 64-byte secret+public keypair, base58
    /// or raw — the same two encodings the teacher's
    /// `keypair_from_base58_string` tolerates.
    pub fn from_secret_bytes(mut secret_key_bytes: Vec<u8>) -> Result<Self, RaptorError> {
        let keypair = match secret_key_bytes.len() {
            64 => Keypair::from_bytes(&secret_key_bytes)
                .map_err(|e| RaptorError::Other(format!("invalid keypair bytes: {e}")))?,
            32 => {
                let secret = ed25519_dalek::SecretKey::from_bytes(&secret_key_bytes)
                    .map_err(|e| RaptorError::Other(format!("invalid seed bytes: {e}")))?;
                let public = ed25519_dalek::PublicKey::from(&secret);
                Keypair::from_bytes(&[secret.to_bytes(), public.to_bytes()].concat())
                    .map_err(|e| RaptorError::Other(format!("invalid keypair bytes: {e}")))?
            }
            other => {
                return Err(RaptorError::Other(format!(
                    "secret key must be 32 or 64 bytes, got {other}"
                )))
            }
        };
        secret_key_bytes.zeroize();
        Ok(Self(keypair))
    }

    pub fn from_base58(privkey: &str) -> Result<Self, RaptorError> {
        let bytes = bs58::decode(privkey)
            .into_vec()
            .map_err(|e| RaptorError::Other(format!("invalid base58 secret key: {e}")))?;
        Self::from_secret_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_base58_round_trips_a_64_byte_keypair() {
        let original = Keypair::new();
        let encoded = bs58::encode(original.to_bytes()).into_string();
        let restored = SigningKeypair::from_base58(&encoded).unwrap();
        assert_eq!(restored.pubkey(), original.pubkey());
    }

    #[test]
    fn from_secret_bytes_accepts_a_32_byte_seed() {
        let original = Keypair::new();
        let seed = original.to_bytes()[..32].to_vec();
        let restored = SigningKeypair::from_secret_bytes(seed).unwrap();
        assert_eq!(restored.pubkey(), original.pubkey());
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(SigningKeypair::from_secret_bytes(vec![0u8; 10]).is_err());
    }

    #[test]
    fn debug_output_never_prints_secret_bytes() {
        let keypair = SigningKeypair::from_secret_bytes(Keypair::new().to_bytes().to_vec()).unwrap();
        let rendered = format!("{keypair:?}");
        assert!(rendered.contains(&keypair.pubkey().to_string()));
        assert!(!rendered.contains("secret"));
    }
}
