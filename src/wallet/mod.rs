pub mod crypto;
pub mod keys;

pub use crypto::WalletCipher;
pub use keys::SigningKeypair;
