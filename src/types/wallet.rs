use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::store::schema::wallets;
use crate::types::ids::Chain;

/// The secret blob is AEAD-sealed; nothing in this type can reconstruct the
/// plaintext key without the per-user subkey from `crate::wallet::crypto`.
/// `Debug` is derived manually below to keep the ciphertext out of logs even
/// though it is already not a plaintext secret.
#[derive(Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = wallets)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chain: String,
    pub public_key: String,
    pub encrypted_secret: Vec<u8>,
    pub nonce: Vec<u8>,
    pub backup_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("chain", &self.chain)
            .field("public_key", &self.public_key)
            .field("encrypted_secret", &"<redacted>")
            .field("nonce", &"<redacted>")
            .field("backup_at", &self.backup_at)
            .finish()
    }
}

impl Wallet {
    pub fn chain(&self) -> Chain {
        Chain::parse(&self.chain).expect("store invariant: wallet.chain is always valid")
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = wallets)]
pub struct NewWallet {
    pub user_id: Uuid,
    pub chain: String,
    pub public_key: String,
    pub encrypted_secret: Vec<u8>,
    pub nonce: Vec<u8>,
}
