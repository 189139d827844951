use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::RaptorError;

const NONCE_LEN: usize = 12;

/// AEAD seal/unseal over a per-user HKDF subkey (spec.md §5, §9 Secrets):
/// the master key never touches ciphertext directly, and a leaked subkey
/// exposes only one user's wallet. Grounded on the teacher's
/// `KeypairClonable` (secret material never reaches `Debug`/logs) with the
/// actual cipher brought in from the pack's `aes-gcm-siv` patch entry,
/// which the teacher declares but never wires up.
pub struct WalletCipher {
    master_key: [u8; 32],
}

impl WalletCipher {
    pub fn new(master_key: [u8; 32]) -> Self {
        Self { master_key }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, RaptorError> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| RaptorError::ConfigFatal(format!("invalid wallet_encryption.master_key_b64: {e}")))?;
        let master_key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RaptorError::ConfigFatal("wallet master key must be 32 bytes".into()))?;
        Ok(Self::new(master_key))
    }

    fn subkey_for_user(&self, user_id: uuid::Uuid) -> [u8; 32] {
        let hk = Hkdf::<Sha256>::new(None, &self.master_key);
        let mut subkey = [0u8; 32];
        hk.expand(user_id.as_bytes(), &mut subkey)
            .expect("32 bytes is a valid HKDF output length");
        subkey
    }

    /// Returns `(ciphertext, nonce)`. The plaintext buffer is zeroized
    /// before returning regardless of outcome.
    pub fn seal(&self, user_id: uuid::Uuid, mut plaintext: Vec<u8>) -> Result<(Vec<u8>, Vec<u8>), RaptorError> {
        let subkey = self.subkey_for_user(user_id);
        let cipher = Aes256GcmSiv::new_from_slice(&subkey).expect("32-byte key");
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let result = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| RaptorError::Other("wallet seal failed".into()));
        plaintext.zeroize();
        Ok((result?, nonce_bytes.to_vec()))
    }

    /// Returns the decrypted secret key bytes. Callers must zeroize the
    /// result once signing is done (spec.md §5 "narrow critical section").
    pub fn unseal(
        &self,
        user_id: uuid::Uuid,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<Vec<u8>, RaptorError> {
        if nonce.len() != NONCE_LEN {
            return Err(RaptorError::Other("malformed wallet nonce".into()));
        }
        let subkey = self.subkey_for_user(user_id);
        let cipher = Aes256GcmSiv::new_from_slice(&subkey).expect("32-byte key");
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| RaptorError::Other("wallet unseal failed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_unseal_round_trips() {
        let cipher = WalletCipher::new([7u8; 32]);
        let user_id = uuid::Uuid::new_v4();
        let secret = b"super-secret-key-bytes".to_vec();
        let (ciphertext, nonce) = cipher.seal(user_id, secret.clone()).unwrap();
        let recovered = cipher.unseal(user_id, &ciphertext, &nonce).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn wrong_user_cannot_unseal() {
        let cipher = WalletCipher::new([7u8; 32]);
        let (ciphertext, nonce) = cipher.seal(uuid::Uuid::new_v4(), b"secret".to_vec()).unwrap();
        assert!(cipher.unseal(uuid::Uuid::new_v4(), &ciphertext, &nonce).is_err());
    }
}
