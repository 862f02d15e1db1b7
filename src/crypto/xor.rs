//! Legacy XOR fallback keystream.
//!
//! The keystream byte for absolute plaintext offset `i` is
//! `SHA3-512(password)[i % 64] ^ (i % 251)`. Stateless apart from the
//! offset, so seeks are trivial.

use sha3::{Digest, Sha3_512};

/// Offset-keyed XOR keystream.
pub(crate) struct XorKeystream {
    digest: [u8; 64],
    offset: u64,
}

impl XorKeystream {
    pub(crate) fn new(password: &[u8]) -> Self {
        let mut digest = [0u8; 64];
        digest.copy_from_slice(&Sha3_512::digest(password));
        Self { digest, offset: 0 }
    }

    pub(crate) fn reset_to(&mut self, pos: u64) {
        self.offset = pos;
    }

    /// XOR the keystream into `buf`, advancing the offset.
    pub(crate) fn apply(&mut self, buf: &mut [u8]) {
        for byte in buf {
            *byte ^= self.digest[(self.offset % 64) as usize] ^ (self.offset % 251) as u8;
            self.offset += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystream_follows_digest_formula() {
        let mut digest = [0u8; 64];
        digest.copy_from_slice(&Sha3_512::digest(b"hello"));
        let mut stream = XorKeystream::new(b"hello");

        let mut buf = vec![0u8; 600];
        stream.apply(&mut buf);
        for (i, byte) in buf.iter().enumerate() {
            assert_eq!(*byte, digest[i % 64] ^ (i % 251) as u8, "offset {i}");
        }
    }

    #[test]
    fn reset_matches_fresh_stream() {
        let mut reference = XorKeystream::new(b"pw");
        let mut full = vec![0u8; 300];
        reference.apply(&mut full);

        let mut stream = XorKeystream::new(b"pw");
        stream.reset_to(251);
        let mut tail = vec![0u8; 49];
        stream.apply(&mut tail);
        assert_eq!(tail, full[251..]);
    }

    #[test]
    fn application_is_an_involution() {
        let original = b"some plaintext worth protecting".to_vec();
        let mut data = original.clone();

        let mut stream = XorKeystream::new(b"pw");
        stream.apply(&mut data);
        assert_ne!(data, original);

        stream.reset_to(0);
        stream.apply(&mut data);
        assert_eq!(data, original);
    }
}
