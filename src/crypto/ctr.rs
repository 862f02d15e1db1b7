//! AES counter-mode keystream engine.
//!
//! Counter blocks are the 8-byte IV prefix followed by a big-endian
//! 64-bit block counter starting at zero, which is exactly the `Ctr64BE`
//! flavor of the `ctr` crate. Seeking restores both the block counter and
//! the byte position inside the current keystream block, so re-positioning
//! at any plaintext offset reproduces the exact keystream that was used
//! when that offset was written. That is what makes arbitrary seeks over
//! the ciphertext possible.

use aes::{Aes128, Aes192, Aes256};
use ctr::cipher::generic_array::GenericArray;
use ctr::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};

use super::{CTR_PREFIX_LEN, IV_LEN};
use crate::config::AesKeyLength;

type Aes128Ctr64BE = ctr::Ctr64BE<Aes128>;
type Aes192Ctr64BE = ctr::Ctr64BE<Aes192>;
type Aes256Ctr64BE = ctr::Ctr64BE<Aes256>;

/// CTR keystream positioned at some plaintext offset.
pub(crate) enum CtrKeystream {
    Aes128(Aes128Ctr64BE),
    Aes192(Aes192Ctr64BE),
    Aes256(Aes256Ctr64BE),
}

impl CtrKeystream {
    /// Engine keyed by the KDF output, positioned at offset 0.
    ///
    /// Only the first 8 bytes of `iv` matter; the trailing 8 are replaced
    /// by the block counter. `key` must be exactly `length.key_len()`
    /// bytes.
    pub(crate) fn new(length: AesKeyLength, key: &[u8], iv: &[u8; IV_LEN]) -> Self {
        let mut nonce = [0u8; IV_LEN];
        nonce[..CTR_PREFIX_LEN].copy_from_slice(&iv[..CTR_PREFIX_LEN]);
        let nonce = GenericArray::from_slice(&nonce);
        match length {
            AesKeyLength::Aes128 => {
                CtrKeystream::Aes128(Aes128Ctr64BE::new(GenericArray::from_slice(key), nonce))
            }
            AesKeyLength::Aes192 => {
                CtrKeystream::Aes192(Aes192Ctr64BE::new(GenericArray::from_slice(key), nonce))
            }
            AesKeyLength::Aes256 => {
                CtrKeystream::Aes256(Aes256Ctr64BE::new(GenericArray::from_slice(key), nonce))
            }
        }
    }

    /// Re-synchronize the keystream to plaintext offset `pos`.
    pub(crate) fn reset_to(&mut self, pos: u64) {
        match self {
            CtrKeystream::Aes128(cipher) => cipher.seek(pos),
            CtrKeystream::Aes192(cipher) => cipher.seek(pos),
            CtrKeystream::Aes256(cipher) => cipher.seek(pos),
        }
    }

    /// XOR the keystream into `buf`, advancing the stream by `buf.len()`.
    ///
    /// Encryption and decryption are the same operation.
    pub(crate) fn apply(&mut self, buf: &mut [u8]) {
        match self {
            CtrKeystream::Aes128(cipher) => cipher.apply_keystream(buf),
            CtrKeystream::Aes192(cipher) => cipher.apply_keystream(buf),
            CtrKeystream::Aes256(cipher) => cipher.apply_keystream(buf),
        }
    }
}
