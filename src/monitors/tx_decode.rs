use solana_sdk::pubkey::Pubkey;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiMessage,
};
use std::str::FromStr;
use tracing::warn;

use crate::monitors::discriminator::global_discriminator;
use crate::monitors::events::LaunchEvent;

/// One instruction's program id, account pubkeys (already resolved through
/// the address list), and raw data — whether it came from the top level
/// or from an inner-instruction CPI trace, the decoder treats both the
/// same way (spec.md §6 step 6 "also scan inner instructions").
#[derive(Clone)]
pub struct FlatInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

/// `staticAccountKeys ∥ loadedAddresses.writable ∥ loadedAddresses.readonly`
/// — spec.md §6 "Address list construction for versioned transactions".
pub fn build_address_list(
    static_keys: &[Pubkey],
    writable: &[Pubkey],
    readonly: &[Pubkey],
) -> Vec<Pubkey> {
    let mut all = Vec::with_capacity(static_keys.len() + writable.len() + readonly.len());
    all.extend_from_slice(static_keys);
    all.extend_from_slice(writable);
    all.extend_from_slice(readonly);
    all
}

/// Which "create" discriminator(s) to accept and where mint/bonding-curve/
/// creator live in the instruction's account list — configured per
/// launchpad since each IDL lays accounts out differently (spec.md §6
/// step 5: "e.g., 0, 2, 7 for pump.fun's layout").
pub struct CreateLayout {
    pub source: String,
    pub program_id: Pubkey,
    pub discriminators: Vec<[u8; 8]>,
    pub mint_index: usize,
    pub bonding_curve_index: Option<usize>,
    pub creator_index: usize,
}

impl CreateLayout {
    pub fn pumpfun(program_id: Pubkey) -> Self {
        Self {
            source: "pumpfun".to_string(),
            program_id,
            discriminators: vec![
                global_discriminator("create"),
                global_discriminator("create_v2"),
            ],
            mint_index: 0,
            bonding_curve_index: Some(2),
            creator_index: 7,
        }
    }
}

/// Decodes a length-prefixed (u32 little-endian length + UTF-8 bytes)
/// string at `offset`, returning the string and the offset just past it.
/// Borsh's own `String` deserializer does exactly this; this free
/// function exists because `name`/`symbol`/`uri` are read positionally
/// out of the raw payload rather than through a single `BorshDeserialize`
/// struct whenever a launchpad interleaves non-string fields first.
pub fn decode_length_prefixed_string(bytes: &[u8], offset: usize) -> Option<(String, usize)> {
    if bytes.len() < offset + 4 {
        return None;
    }
    let len = u32::from_le_bytes(bytes[offset..offset + 4].try_into().ok()?) as usize;
    let start = offset + 4;
    let end = start.checked_add(len)?;
    if bytes.len() < end {
        return None;
    }
    let s = String::from_utf8(bytes[start..end].to_vec()).ok()?;
    Some((s, end))
}

/// spec.md §8 testable property 7: reject instructions shaped like a spam
/// create rather than a real one — a duplicated account slot, a creator
/// that's actually a system/token program id, or a mint that isn't a real
/// on-curve address (i.e. a PDA masquerading as a mint).
fn is_spam_create(ix: &FlatInstruction, creator: Pubkey, mint: Pubkey) -> bool {
    if let (Some(&account_0), Some(&account_5)) = (ix.accounts.first(), ix.accounts.get(5)) {
        if account_0 == account_5 {
            return true;
        }
    }
    if creator == solana_sdk::system_program::id() || creator == spl_token::id() {
        return true;
    }
    !mint.is_on_curve()
}

fn try_decode_create(layout: &CreateLayout, ix: &FlatInstruction, signature: &str) -> Option<LaunchEvent> {
    if ix.program_id != layout.program_id || ix.data.len() < 8 {
        return None;
    }
    let discriminator: [u8; 8] = ix.data[..8].try_into().ok()?;
    if !layout.discriminators.contains(&discriminator) {
        return None;
    }
    let payload = &ix.data[8..];
    let (name, offset) = decode_length_prefixed_string(payload, 0)?;
    let (symbol, offset) = decode_length_prefixed_string(payload, offset)?;
    let (uri, _offset) = decode_length_prefixed_string(payload, offset)?;

    let mint = *ix.accounts.get(layout.mint_index)?;
    let creator = *ix.accounts.get(layout.creator_index)?;
    let bonding_curve = layout
        .bonding_curve_index
        .and_then(|i| ix.accounts.get(i))
        .copied();

    if is_spam_create(ix, creator, mint) {
        return None;
    }

    Some(LaunchEvent {
        source: layout.source.clone(),
        signature: signature.to_string(),
        mint,
        bonding_curve,
        creator,
        name,
        symbol,
        uri,
    })
}

/// Walks top-level instructions and, for alternative launchpads that
/// create via CPI, inner instructions too (spec.md §6 step 6), returning
/// the first matching launch event.
pub fn find_create_event(
    layouts: &[CreateLayout],
    top_level: &[FlatInstruction],
    inner: &[FlatInstruction],
    signature: &str,
) -> Option<LaunchEvent> {
    for ix in top_level.iter().chain(inner.iter()) {
        for layout in layouts {
            if let Some(event) = try_decode_create(layout, ix, signature) {
                return Some(event);
            }
        }
    }
    None
}

/// Best-effort extraction of `FlatInstruction`s from an RPC-fetched
/// transaction encoded as JSON. Anything that doesn't parse as expected
/// (legacy encodings, parsed-not-raw messages) is dropped with a warning
/// rather than panicking — spec.md §4.1 "a bad decode yields a warning
/// and is dropped, never a hard crash".
pub fn flatten_transaction(
    tx: &EncodedConfirmedTransactionWithStatusMeta,
) -> (Vec<FlatInstruction>, Vec<FlatInstruction>) {
    let EncodedTransaction::Json(ui_tx) = &tx.transaction.transaction else {
        warn!("transaction not in expected json encoding, dropping");
        return (Vec::new(), Vec::new());
    };
    let UiMessage::Raw(message) = &ui_tx.message else {
        warn!("transaction message not raw-encoded, dropping");
        return (Vec::new(), Vec::new());
    };

    let static_keys: Vec<Pubkey> = message
        .account_keys
        .iter()
        .filter_map(|k| Pubkey::from_str(k).ok())
        .collect();

    let (writable, readonly) = match &tx.transaction.meta {
        Some(meta) => match &meta.loaded_addresses {
            OptionSerializer::Some(loaded) => (
                loaded.writable.iter().filter_map(|k| Pubkey::from_str(k).ok()).collect(),
                loaded.readonly.iter().filter_map(|k| Pubkey::from_str(k).ok()).collect(),
            ),
            _ => (Vec::new(), Vec::new()),
        },
        None => (Vec::new(), Vec::new()),
    };

    let addresses = build_address_list(&static_keys, &writable, &readonly);

    let mut top_level = Vec::new();
    for ix in &message.instructions {
        if let Some(flat) = flatten_compiled(&addresses, ix.program_id_index as usize, &ix.accounts, &ix.data) {
            top_level.push(flat);
        }
    }

    let mut inner = Vec::new();
    if let Some(meta) = &tx.transaction.meta {
        if let OptionSerializer::Some(inner_groups) = &meta.inner_instructions {
            for group in inner_groups {
                for ix in &group.instructions {
                    if let solana_transaction_status::UiInstruction::Compiled(compiled) = ix {
                        if let Some(flat) =
                            flatten_compiled(&addresses, compiled.program_id_index as usize, &compiled.accounts, &compiled.data)
                        {
                            inner.push(flat);
                        }
                    }
                }
            }
        }
    }

    (top_level, inner)
}

fn flatten_compiled(
    addresses: &[Pubkey],
    program_id_index: usize,
    account_indexes: &[u8],
    data_base58: &str,
) -> Option<FlatInstruction> {
    let program_id = *addresses.get(program_id_index)?;
    let accounts = account_indexes
        .iter()
        .filter_map(|&idx| addresses.get(idx as usize).copied())
        .collect();
    let data = solana_sdk::bs58::decode(data_base58).into_vec().ok()?;
    Some(FlatInstruction {
        program_id,
        accounts,
        data,
    })
}

#[cfg(test)]
mod tests {
    use solana_sdk::signature::{Keypair, Signer};

    use super::*;

    fn encode_str(s: &str) -> Vec<u8> {
        let mut out = (s.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn decodes_three_consecutive_length_prefixed_strings() {
        let mut bytes = encode_str("PinkBull");
        bytes.extend(encode_str("PBULL"));
        bytes.extend(encode_str("ipfs://example"));

        let (name, offset) = decode_length_prefixed_string(&bytes, 0).unwrap();
        let (symbol, offset) = decode_length_prefixed_string(&bytes, offset).unwrap();
        let (uri, offset) = decode_length_prefixed_string(&bytes, offset).unwrap();

        assert_eq!(name, "PinkBull");
        assert_eq!(symbol, "PBULL");
        assert_eq!(uri, "ipfs://example");
        assert_eq!(offset, bytes.len());
    }

    #[test]
    fn truncated_length_prefix_is_none_not_a_panic() {
        assert!(decode_length_prefixed_string(&[1, 0, 0], 0).is_none());
        assert!(decode_length_prefixed_string(&[5, 0, 0, 0, b'h', b'i'], 0).is_none());
    }

    fn create_ix(layout: &CreateLayout, name: &str, symbol: &str, uri: &str) -> FlatInstruction {
        let mut data = layout.discriminators[0].to_vec();
        data.extend(encode_str(name));
        data.extend(encode_str(symbol));
        data.extend(encode_str(uri));

        // A real mint is a keypair-derived address, which is always on-curve;
        // `Pubkey::new_unique()` isn't guaranteed to be.
        let mint = Keypair::new().pubkey();
        let bonding_curve = Pubkey::new_unique();
        let creator = Pubkey::new_unique();
        let mut accounts = vec![Pubkey::new_unique(); 8];
        accounts[layout.mint_index] = mint;
        if let Some(i) = layout.bonding_curve_index {
            accounts[i] = bonding_curve;
        }
        accounts[layout.creator_index] = creator;

        FlatInstruction {
            program_id: layout.program_id,
            accounts,
            data,
        }
    }

    #[test]
    fn matching_layout_decodes_into_normalized_launch_event() {
        let program_id = Pubkey::new_unique();
        let layout = CreateLayout::pumpfun(program_id);
        let ix = create_ix(&layout, "PinkBull", "PBULL", "ipfs://example");
        let expected_mint = ix.accounts[layout.mint_index];

        let event = find_create_event(&[], &[ix.clone()], &[], "sig1");
        assert!(event.is_none(), "no layouts means nothing ever matches");

        let event = find_create_event(std::slice::from_ref(&layout), &[ix], &[], "sig1").unwrap();
        assert_eq!(event.source, "pumpfun");
        assert_eq!(event.name, "PinkBull");
        assert_eq!(event.symbol, "PBULL");
        assert_eq!(event.uri, "ipfs://example");
        assert_eq!(event.mint, expected_mint);
    }

    #[test]
    fn inner_instruction_is_scanned_when_top_level_has_no_match() {
        let program_id = Pubkey::new_unique();
        let layout = CreateLayout::pumpfun(program_id);
        let ix = create_ix(&layout, "InnerMint", "INNR", "ipfs://inner");

        let event = find_create_event(&[layout], &[], &[ix], "sig2").unwrap();
        assert_eq!(event.name, "InnerMint");
    }

    #[test]
    fn wrong_program_id_never_matches() {
        let layout = CreateLayout::pumpfun(Pubkey::new_unique());
        let mut ix = create_ix(&layout, "X", "X", "X");
        ix.program_id = Pubkey::new_unique();

        assert!(find_create_event(&[layout], &[ix], &[], "sig3").is_none());
    }

    #[test]
    fn duplicated_account_slot_is_rejected() {
        let program_id = Pubkey::new_unique();
        let layout = CreateLayout::pumpfun(program_id);
        let mut ix = create_ix(&layout, "Spam", "SPAM", "ipfs://spam");
        ix.accounts[5] = ix.accounts[0];

        assert!(find_create_event(&[layout], &[ix], &[], "sig4").is_none());
    }

    #[test]
    fn creator_as_a_system_or_token_program_id_is_rejected() {
        let program_id = Pubkey::new_unique();
        let layout = CreateLayout::pumpfun(program_id);
        let mut ix = create_ix(&layout, "Spam", "SPAM", "ipfs://spam");
        ix.accounts[layout.creator_index] = solana_sdk::system_program::id();

        assert!(find_create_event(&[layout], &[ix], &[], "sig5").is_none());
    }

    #[test]
    fn off_curve_mint_is_rejected() {
        let program_id = Pubkey::new_unique();
        let layout = CreateLayout::pumpfun(program_id);
        let mut ix = create_ix(&layout, "Spam", "SPAM", "ipfs://spam");
        let (pda, _bump) = Pubkey::find_program_address(&[b"not-a-mint"], &program_id);
        ix.accounts[layout.mint_index] = pda;

        assert!(find_create_event(&[layout], &[ix], &[], "sig6").is_none());
    }
}
