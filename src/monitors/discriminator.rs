use sha2::{Digest, Sha256};

/// Anchor account/event/instruction discriminators are the first 8 bytes
/// of `sha256("<namespace>:<name>")`. Launchpad programs are Anchor
/// programs, so this is how the monitor tells a `Create`/`Trade`/
/// `Complete` log line apart without depending on the program's IDL at
/// compile time (spec.md §6 "instruction decoding"). Grounded on
/// `other_examples/.../pumpfun-rs stream.rs`'s literal discriminator
/// bytes, generalized into the hash that produces them.
pub fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

pub fn global_discriminator(name: &str) -> [u8; 8] {
    discriminator("global", name)
}

pub fn event_discriminator(name: &str) -> [u8; 8] {
    discriminator("event", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_pumpfun_create_event_discriminator() {
        assert_eq!(
            event_discriminator("CreateEvent"),
            [27, 114, 169, 77, 222, 235, 99, 118]
        );
    }
}
