//! Verification header at the front of every encrypted file.
//!
//! Fixed 128-byte layout:
//!
//! ```text
//! MAGIC (1) | VERSION (1) | KEY_LENGTH (4) | ROUNDS (4) |
//! SHA3-256(password) (32) | SHA3-256(salt) (32) | 0xCD padding (54)
//! ```
//!
//! The key-length code and round count are serialized little-endian. The
//! legacy format wrote them in host byte order; little-endian is the
//! portable reading of files produced on the platforms the format shipped
//! on, and is fixed here as the wire format.

use sha3::{Digest, Sha3_256};

use super::HEADER_LEN;
use crate::config::{AesKeyLength, CipherConfig};
use crate::error::StreamError;

pub const MAGIC: u8 = 0xCD;
pub const VERSION: u8 = 0x01;
const PAD_BYTE: u8 = 0xCD;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 1;
const KEY_LENGTH_OFFSET: usize = 2;
const ROUNDS_OFFSET: usize = 6;
const PASSWORD_HASH_OFFSET: usize = 10;
const SALT_HASH_OFFSET: usize = 42;
const PADDING_OFFSET: usize = 74;

const HASH_LEN: usize = 32;

/// Parsed or about-to-be-written file header.
#[derive(Debug)]
pub(crate) struct Header {
    version: u8,
    key_length: AesKeyLength,
    kdf_rounds: i32,
    password_hash: [u8; HASH_LEN],
    salt_hash: [u8; HASH_LEN],
}

impl Header {
    /// The header a file written with `config` must carry.
    pub(crate) fn for_config(config: &CipherConfig) -> Self {
        Self {
            version: VERSION,
            key_length: config.aes_key_length(),
            kdf_rounds: config.rounds(),
            password_hash: Sha3_256::digest(config.password()).into(),
            salt_hash: Sha3_256::digest(config.salt_bytes()).into(),
        }
    }

    pub(crate) fn version(&self) -> u8 {
        self.version
    }

    pub(crate) fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [PAD_BYTE; HEADER_LEN];
        buf[MAGIC_OFFSET] = MAGIC;
        buf[VERSION_OFFSET] = self.version;
        buf[KEY_LENGTH_OFFSET..ROUNDS_OFFSET]
            .copy_from_slice(&self.key_length.code().to_le_bytes());
        buf[ROUNDS_OFFSET..PASSWORD_HASH_OFFSET]
            .copy_from_slice(&self.kdf_rounds.to_le_bytes());
        buf[PASSWORD_HASH_OFFSET..SALT_HASH_OFFSET].copy_from_slice(&self.password_hash);
        buf[SALT_HASH_OFFSET..PADDING_OFFSET].copy_from_slice(&self.salt_hash);
        buf
    }

    /// Structural parse: length, magic, padding, and a known key-length
    /// code. The version byte is read but deliberately not checked, so
    /// newer writers remain readable.
    pub(crate) fn parse(data: &[u8]) -> Result<Self, StreamError> {
        if data.len() < HEADER_LEN {
            return Err(StreamError::HeaderTooShort(data.len()));
        }
        if data[MAGIC_OFFSET] != MAGIC {
            return Err(StreamError::BadMagic(data[MAGIC_OFFSET]));
        }
        if data[PADDING_OFFSET..HEADER_LEN].iter().any(|b| *b != PAD_BYTE) {
            return Err(StreamError::FieldMismatch("padding"));
        }

        let mut code = [0u8; 4];
        code.copy_from_slice(&data[KEY_LENGTH_OFFSET..ROUNDS_OFFSET]);
        let key_length = AesKeyLength::from_code(u32::from_le_bytes(code))
            .ok_or(StreamError::FieldMismatch("key length"))?;

        let mut rounds = [0u8; 4];
        rounds.copy_from_slice(&data[ROUNDS_OFFSET..PASSWORD_HASH_OFFSET]);
        let kdf_rounds = i32::from_le_bytes(rounds);

        let mut password_hash = [0u8; HASH_LEN];
        password_hash.copy_from_slice(&data[PASSWORD_HASH_OFFSET..SALT_HASH_OFFSET]);
        let mut salt_hash = [0u8; HASH_LEN];
        salt_hash.copy_from_slice(&data[SALT_HASH_OFFSET..PADDING_OFFSET]);

        Ok(Self {
            version: data[VERSION_OFFSET],
            key_length,
            kdf_rounds,
            password_hash,
            salt_hash,
        })
    }

    /// Verify that this header was written with the caller's credentials
    /// and cipher parameters. Any mismatch means wrong credentials or a
    /// corrupted file; none of them are retryable.
    pub(crate) fn check(&self, config: &CipherConfig) -> Result<(), StreamError> {
        if self.key_length != config.aes_key_length() {
            return Err(StreamError::FieldMismatch("key length"));
        }
        if self.kdf_rounds != config.rounds() {
            return Err(StreamError::FieldMismatch("rounds"));
        }
        let password_hash: [u8; HASH_LEN] = Sha3_256::digest(config.password()).into();
        if self.password_hash != password_hash {
            return Err(StreamError::FieldMismatch("password"));
        }
        let salt_hash: [u8; HASH_LEN] = Sha3_256::digest(config.salt_bytes()).into();
        if self.salt_hash != salt_hash {
            return Err(StreamError::FieldMismatch("salt"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncryptionMethod;

    fn config() -> CipherConfig {
        CipherConfig::new("hello").salt(b"s".as_slice())
    }

    #[test]
    fn roundtrip_parses_and_checks() {
        let header = Header::for_config(&config());
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);

        let parsed = Header::parse(&bytes).unwrap();
        assert_eq!(parsed.version(), VERSION);
        parsed.check(&config()).unwrap();
    }

    #[test]
    fn layout_is_pinned() {
        let bytes = Header::for_config(&config()).to_bytes();
        assert_eq!(bytes[0], 0xCD);
        assert_eq!(bytes[1], 0x01);
        // AES-256 code 2, little-endian.
        assert_eq!(&bytes[2..6], &[2, 0, 0, 0]);
        // Five rounds, little-endian.
        assert_eq!(&bytes[6..10], &[5, 0, 0, 0]);
        // SHA3-256("hello")
        assert_eq!(bytes[10], 0x33);
        assert_eq!(bytes[11], 0x38);
        assert_eq!(bytes[41], 0x92);
        // SHA3-256("s")
        assert_eq!(bytes[42], 0xCD);
        assert_eq!(bytes[43], 0xC5);
        assert_eq!(bytes[73], 0xA4);
        assert!(bytes[74..].iter().all(|b| *b == 0xCD));
    }

    #[test]
    fn wrong_magic_fails() {
        let mut bytes = Header::for_config(&config()).to_bytes();
        bytes[0] = 0xAB;
        assert!(matches!(
            Header::parse(&bytes),
            Err(StreamError::BadMagic(0xAB))
        ));
    }

    #[test]
    fn short_buffer_fails() {
        let bytes = Header::for_config(&config()).to_bytes();
        assert!(matches!(
            Header::parse(&bytes[..HEADER_LEN - 1]),
            Err(StreamError::HeaderTooShort(_))
        ));
    }

    #[test]
    fn corrupted_padding_fails() {
        let mut bytes = Header::for_config(&config()).to_bytes();
        bytes[100] = 0x00;
        assert!(matches!(
            Header::parse(&bytes),
            Err(StreamError::FieldMismatch("padding"))
        ));
    }

    #[test]
    fn unknown_key_length_code_fails() {
        let mut bytes = Header::for_config(&config()).to_bytes();
        bytes[2] = 9;
        assert!(matches!(
            Header::parse(&bytes),
            Err(StreamError::FieldMismatch("key length"))
        ));
    }

    #[test]
    fn future_version_byte_is_tolerated() {
        let mut bytes = Header::for_config(&config()).to_bytes();
        bytes[1] = 0x02;
        let parsed = Header::parse(&bytes).unwrap();
        assert_eq!(parsed.version(), 0x02);
        parsed.check(&config()).unwrap();
    }

    #[test]
    fn each_mismatched_parameter_is_rejected() {
        let header = Header::for_config(&config());
        let parsed = Header::parse(&header.to_bytes()).unwrap();

        let wrong_password = CipherConfig::new("olleh").salt(b"s".as_slice());
        assert!(matches!(
            parsed.check(&wrong_password),
            Err(StreamError::FieldMismatch("password"))
        ));

        let wrong_salt = CipherConfig::new("hello").salt(b"t".as_slice());
        assert!(matches!(
            parsed.check(&wrong_salt),
            Err(StreamError::FieldMismatch("salt"))
        ));

        let wrong_key_length = config().key_length(crate::AesKeyLength::Aes128);
        assert!(matches!(
            parsed.check(&wrong_key_length),
            Err(StreamError::FieldMismatch("key length"))
        ));

        let wrong_rounds = config().kdf_rounds(6);
        assert!(matches!(
            parsed.check(&wrong_rounds),
            Err(StreamError::FieldMismatch("rounds"))
        ));
    }

    #[test]
    fn method_does_not_affect_header() {
        let aes = Header::for_config(&config()).to_bytes();
        let xor = Header::for_config(&config().method(EncryptionMethod::Xor)).to_bytes();
        assert_eq!(aes, xor);
    }
}
