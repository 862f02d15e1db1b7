//! Password-based key derivation.
//!
//! Byte-for-byte equivalent to OpenSSL's `EVP_BytesToKey` with SHA-256 as
//! the digest: each round hashes the previous digest concatenated with the
//! password and salt, then re-hashes the result `rounds - 1` more times.
//! The concatenated digests are split into the cipher key followed by a
//! 16-byte IV.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::IV_LEN;

/// Derive `(key, iv)` from a password and salt.
///
/// `salt` must already be at most 8 bytes (the config layer truncates);
/// whatever bytes are passed are hashed verbatim. `rounds` must be >= 1.
pub fn bytes_to_key(
    password: &[u8],
    salt: &[u8],
    rounds: i32,
    key_len: usize,
) -> (Zeroizing<Vec<u8>>, [u8; IV_LEN]) {
    debug_assert!(rounds >= 1);

    let mut material = Zeroizing::new(Vec::with_capacity(key_len + IV_LEN));
    let mut digest = Zeroizing::new(Vec::new());

    while material.len() < key_len + IV_LEN {
        let mut hasher = Sha256::new();
        hasher.update(&*digest);
        hasher.update(password);
        hasher.update(salt);
        let mut d = hasher.finalize();
        for _ in 1..rounds {
            d = Sha256::digest(&d);
        }
        *digest = d.to_vec();
        material.extend_from_slice(&digest);
    }

    let key = Zeroizing::new(material[..key_len].to_vec());
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&material[key_len..key_len + IV_LEN]);
    (key, iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn matches_openssl_with_salt() {
        let (key, iv) = bytes_to_key(b"hello", b"s", 5, 32);
        assert_eq!(
            *key,
            unhex("c5818ca67ffb81877ffbd1e1fe5986871c6fab478c18151bf65f8f9d5a3a4654")
        );
        assert_eq!(iv.as_slice(), unhex("3c8a09a5d1b1b99496e1caf0912eb65a"));
    }

    #[test]
    fn matches_openssl_without_salt() {
        let (key, iv) = bytes_to_key(b"password", b"", 5, 16);
        assert_eq!(*key, unhex("1c9f63d17e1ca2c830d0fc831e9ba4f6"));
        assert_eq!(iv.as_slice(), unhex("452204480d7908d0a0dbd3a9835de17d"));
    }

    #[test]
    fn single_round_skips_rehashing() {
        let (key, iv) = bytes_to_key(b"pw", b"12345678", 1, 32);
        assert_eq!(
            *key,
            unhex("8d1bcc720731778ba30c865d8ecd4a8bf3bb1e77959579fa9e1ceed56cec7d97")
        );
        assert_eq!(iv.as_slice(), unhex("426fcb1084f2aed891aafb427248ec25"));
    }

    #[test]
    fn derivation_is_deterministic() {
        let (k1, iv1) = bytes_to_key(b"pw", b"salt", 5, 32);
        let (k2, iv2) = bytes_to_key(b"pw", b"salt", 5, 32);
        assert_eq!(*k1, *k2);
        assert_eq!(iv1, iv2);
    }

    #[test]
    fn salt_and_rounds_affect_output() {
        let (base, _) = bytes_to_key(b"pw", b"salt", 5, 32);
        let (other_salt, _) = bytes_to_key(b"pw", b"tlas", 5, 32);
        let (other_rounds, _) = bytes_to_key(b"pw", b"salt", 6, 32);
        assert_ne!(*base, *other_salt);
        assert_ne!(*base, *other_rounds);
    }

    #[test]
    fn key_lengths_are_honored() {
        for key_len in [16usize, 24, 32] {
            let (key, _) = bytes_to_key(b"pw", b"salt", 5, key_len);
            assert_eq!(key.len(), key_len);
        }
    }

    #[test]
    fn shorter_key_is_a_prefix_of_longer() {
        // The digest stream is independent of the requested split.
        let (short, _) = bytes_to_key(b"pw", b"salt", 5, 16);
        let (long, _) = bytes_to_key(b"pw", b"salt", 5, 32);
        assert_eq!(*short, long[..16]);
    }
}
