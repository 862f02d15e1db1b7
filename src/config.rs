//! Cipher configuration for encrypted streams.
//!
//! A [`CipherConfig`] is built once, up front, and handed to the stream;
//! there are no post-construction setters. An empty password puts the
//! stream into passthrough mode (no encryption, no header).

use std::fmt;

use zeroize::Zeroizing;

use crate::crypto::SALT_MAX_LEN;
use crate::error::StreamError;

/// AES key size for the counter-mode cipher.
///
/// The numeric code (0, 1, 2) is what gets serialized into the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AesKeyLength {
    Aes128,
    Aes192,
    #[default]
    Aes256,
}

impl AesKeyLength {
    /// Key size in bytes.
    pub fn key_len(self) -> usize {
        match self {
            AesKeyLength::Aes128 => 16,
            AesKeyLength::Aes192 => 24,
            AesKeyLength::Aes256 => 32,
        }
    }

    /// Wire code stored in the file header.
    pub(crate) fn code(self) -> u32 {
        match self {
            AesKeyLength::Aes128 => 0,
            AesKeyLength::Aes192 => 1,
            AesKeyLength::Aes256 => 2,
        }
    }

    pub(crate) fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(AesKeyLength::Aes128),
            1 => Some(AesKeyLength::Aes192),
            2 => Some(AesKeyLength::Aes256),
            _ => None,
        }
    }
}

/// Keystream construction used for the encrypted payload.
///
/// `Xor` is a legacy fallback kept for compatibility with existing files;
/// new files should use `Aes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMethod {
    #[default]
    Aes,
    Xor,
}

/// Default number of KDF rounds.
///
/// Deliberately low: it is a compatibility constant of the on-disk format,
/// not a hardening recommendation.
pub const DEFAULT_KDF_ROUNDS: i32 = 5;

/// Cipher parameters for a [`CryptFile`](crate::CryptFile).
///
/// Built fluently:
///
/// ```ignore
/// use cryptfile::{AesKeyLength, CipherConfig};
///
/// let config = CipherConfig::new("secret")
///     .salt(b"12345678".as_slice())
///     .key_length(AesKeyLength::Aes256)
///     .kdf_rounds(5);
/// ```
///
/// Salts longer than eight bytes are truncated; shorter salts are used
/// verbatim, never padded. This matches the legacy on-disk format exactly.
#[derive(Clone)]
pub struct CipherConfig {
    password: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,
    key_length: AesKeyLength,
    kdf_rounds: i32,
    method: EncryptionMethod,
}

impl CipherConfig {
    /// Configuration with the given password and all other parameters at
    /// their defaults (no salt, AES-256, 5 rounds, AES-CTR method).
    pub fn new(password: impl Into<Vec<u8>>) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
            salt: Vec::new(),
            key_length: AesKeyLength::default(),
            kdf_rounds: DEFAULT_KDF_ROUNDS,
            method: EncryptionMethod::default(),
        }
    }

    /// Configuration with an empty password: the stream reads and writes
    /// the back-end verbatim, with no header.
    pub fn passthrough() -> Self {
        Self::new(Vec::new())
    }

    /// Sets the salt, truncated to [`SALT_MAX_LEN`] bytes.
    pub fn salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        let mut salt = salt.into();
        salt.truncate(SALT_MAX_LEN);
        self.salt = salt;
        self
    }

    /// Sets the AES key length.
    pub fn key_length(mut self, key_length: AesKeyLength) -> Self {
        self.key_length = key_length;
        self
    }

    /// Sets the KDF round count.
    pub fn kdf_rounds(mut self, rounds: i32) -> Self {
        self.kdf_rounds = rounds;
        self
    }

    /// Sets the encryption method.
    pub fn method(mut self, method: EncryptionMethod) -> Self {
        self.method = method;
        self
    }

    pub(crate) fn password(&self) -> &[u8] {
        &self.password
    }

    pub(crate) fn salt_bytes(&self) -> &[u8] {
        &self.salt
    }

    pub(crate) fn aes_key_length(&self) -> AesKeyLength {
        self.key_length
    }

    pub(crate) fn rounds(&self) -> i32 {
        self.kdf_rounds
    }

    pub(crate) fn cipher_method(&self) -> EncryptionMethod {
        self.method
    }

    /// True when no password is set and the stream will not encrypt.
    pub fn is_passthrough(&self) -> bool {
        self.password.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), StreamError> {
        if self.kdf_rounds < 1 {
            return Err(StreamError::InvalidRounds(self.kdf_rounds));
        }
        Ok(())
    }
}

impl fmt::Debug for CipherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherConfig")
            .field("password", &"[REDACTED]")
            .field("salt_len", &self.salt.len())
            .field("key_length", &self.key_length)
            .field("kdf_rounds", &self.kdf_rounds)
            .field("method", &self.method)
            .finish()
    }
}
