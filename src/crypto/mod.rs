//! Cryptographic primitives for the encrypting stream.
//!
//! Provides the counter-mode keystream engine, key derivation, the file
//! header codec, and the legacy XOR fallback keystream.

pub(crate) mod ctr;
pub(crate) mod header;
pub(crate) mod kdf;
pub(crate) mod xor;

use anyhow::{anyhow, Result};

/// Length of the verification header at the front of every encrypted file.
pub const HEADER_LEN: usize = 128;
/// Maximum salt length; longer salts are truncated.
pub const SALT_MAX_LEN: usize = 8;
/// Length of the KDF-derived IV (one AES block).
pub const IV_LEN: usize = 16;
/// Leading bytes of the IV that stay fixed; the rest holds the block counter.
pub const CTR_PREFIX_LEN: usize = 8;

/// Generate a random salt of the maximum usable length.
pub fn generate_salt() -> Result<[u8; SALT_MAX_LEN]> {
    let mut salt = [0u8; SALT_MAX_LEN];
    getrandom::fill(&mut salt).map_err(|_| anyhow!("OS random generator unavailable"))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salts_are_distinct() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();
        assert_ne!(a, b);
    }
}
