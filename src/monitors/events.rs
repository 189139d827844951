use borsh::BorshDeserialize;
use solana_sdk::pubkey::Pubkey;

/// Decoded shape of a pump.fun-family `create`/`create_v2` instruction
/// once the discriminator and account layout have been matched (spec.md
/// §6 "On-chain instruction decoding"). Field order follows the
/// documented pump.fun layout; other launchpads use the same discriminator
/// scheme with their own account positions, configured per
/// `config::settings::LaunchpadConfig`.
#[derive(Debug, Clone, BorshDeserialize)]
pub struct CreateInstructionPayload {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// A launch event normalized across launchpads, the only shape the
/// opportunity engine ever sees (spec.md §4.1 step 7, §4.2 step 1).
#[derive(Debug, Clone)]
pub struct LaunchEvent {
    pub source: String,
    pub signature: String,
    pub mint: Pubkey,
    pub bonding_curve: Option<Pubkey>,
    pub creator: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
}
