//! cryptfile - Transparent encrypting file I/O
//!
//! A [`CryptFile`] looks like an ordinary random-access file: reads return
//! plaintext, writes accept plaintext, and seeks land on plaintext offsets.
//! On disk the payload is AES-CTR ciphertext behind a fixed 128-byte
//! verification header, so any byte range can be decrypted independently
//! of the data around it.
//!
//! # Security
//!
//! The format provides confidentiality only: there is no authentication
//! tag, the plaintext length is visible (minus the header), and the header
//! stores a plain SHA3-256 digest of the password. The key derivation is
//! the legacy OpenSSL `EVP_BytesToKey` construction with a low default
//! round count, preserved for compatibility with existing files. Do not
//! use this format where tampering or offline password guessing is a
//! concern.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::io::{Read, Seek, SeekFrom, Write};
//! use cryptfile::{CipherConfig, CryptFile, OpenMode};
//!
//! let config = CipherConfig::new("password").salt(b"12345678".as_slice());
//! let mut file = CryptFile::with_path("/tmp/secret.bin", config);
//!
//! file.open(OpenMode::ReadWrite).unwrap();
//! file.write_all(b"The quick brown fox\n").unwrap();
//!
//! file.seek(SeekFrom::Start(4)).unwrap();
//! let mut word = [0u8; 5];
//! file.read_exact(&mut word).unwrap();
//! assert_eq!(&word, b"quick");
//! file.close();
//! ```

mod backend;
mod config;
mod crypto;
mod error;
mod stream;

pub use crate::backend::Backend;
pub use crate::config::{AesKeyLength, CipherConfig, EncryptionMethod, DEFAULT_KDF_ROUNDS};
pub use crate::crypto::{generate_salt, HEADER_LEN, SALT_MAX_LEN};
pub use crate::error::StreamError;
pub use crate::stream::{CryptFile, ErrorSink, OpenMode};
