//! The encrypting stream device.
//!
//! [`CryptFile`] behaves like an ordinary random-access file: reads hand
//! back plaintext, writes accept plaintext, and seeks land on plaintext
//! offsets. On disk the payload is AES-CTR ciphertext behind a 128-byte
//! verification header. Because the counter-mode keystream is keyed purely
//! by `(key, IV, offset)`, any byte range can be decrypted without
//! touching the surrounding data.
//!
//! Streams are not safe for concurrent use; callers serialize access
//! externally. One stream owns its back-end at a time.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, error, warn};

use crate::backend::Backend;
use crate::config::{CipherConfig, EncryptionMethod};
use crate::crypto::ctr::CtrKeystream;
use crate::crypto::header::Header;
use crate::crypto::kdf;
use crate::crypto::xor::XorKeystream;
use crate::crypto::HEADER_LEN;
use crate::error::StreamError;

/// How a stream is opened.
///
/// Write access always implies read access: the stream must be able to
/// read the verification header back, so a write-only mode does not
/// exist. `Append` opens read-write and positions the stream at the end
/// of the plaintext; `Truncate` opens read-write and discards any
/// existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    Truncate,
    Append,
}

/// Callback invoked with human-readable diagnostics for failures that
/// also surface as error returns (back-end write errors, allocation
/// failures).
pub type ErrorSink = Box<dyn FnMut(&str) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Closed,
    ReadOnly,
    ReadWrite,
    Append,
}

enum Engine {
    Ctr(CtrKeystream),
    Xor(XorKeystream),
}

impl Engine {
    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            Engine::Ctr(ctr) => ctr.apply(buf),
            Engine::Xor(xor) => xor.apply(buf),
        }
    }

    fn reset_to(&mut self, pos: u64) {
        match self {
            Engine::Ctr(ctr) => ctr.reset_to(pos),
            Engine::Xor(xor) => xor.reset_to(pos),
        }
    }
}

enum BackendSlot {
    /// No back-end attached; every open fails.
    Missing,
    /// Path-constructed back-end. The stream opens and closes the file
    /// handle itself and may remove or rename the underlying entry.
    Owned {
        path: PathBuf,
        file: Option<std::fs::File>,
    },
    /// Caller-supplied back-end. The stream drives the handle while open
    /// but never touches the filesystem entry behind it; the handle can
    /// be reclaimed with [`CryptFile::into_backend`].
    Adopted { backend: Box<dyn Backend>, open: bool },
}

fn active_backend(slot: &mut BackendSlot) -> Result<&mut dyn Backend, StreamError> {
    match slot {
        BackendSlot::Owned {
            file: Some(file), ..
        } => Ok(file),
        BackendSlot::Adopted { backend, open } if *open => Ok(backend.as_mut()),
        _ => Err(StreamError::NotOpen),
    }
}

/// A random-access byte stream whose on-disk representation is encrypted.
///
/// Implements [`Read`], [`Write`] and [`Seek`] over the plaintext, so it
/// can be wrapped in `BufReader`/`BufWriter` or handed to anything that
/// consumes ordinary byte streams.
pub struct CryptFile {
    config: CipherConfig,
    slot: BackendSlot,
    mode: Mode,
    pos: u64,
    encrypted: bool,
    engine: Option<Engine>,
    sink: Option<ErrorSink>,
}

impl CryptFile {
    /// Stream with cipher parameters but no back-end yet; attach one with
    /// [`set_path`](Self::set_path) or [`set_backend`](Self::set_backend).
    pub fn new(config: CipherConfig) -> Self {
        Self {
            config,
            slot: BackendSlot::Missing,
            mode: Mode::Closed,
            pos: 0,
            encrypted: false,
            engine: None,
            sink: None,
        }
    }

    /// Stream over the file at `path`, owned by the stream.
    pub fn with_path(path: impl Into<PathBuf>, config: CipherConfig) -> Self {
        let mut stream = Self::new(config);
        stream.slot = BackendSlot::Owned {
            path: path.into(),
            file: None,
        };
        stream
    }

    /// Stream over a caller-supplied back-end (an open file, an in-memory
    /// cursor, …). File-level operations (`remove`, `rename`, `exists`)
    /// are unavailable for adopted back-ends.
    pub fn with_backend(backend: impl Backend + 'static, config: CipherConfig) -> Self {
        let mut stream = Self::new(config);
        stream.slot = BackendSlot::Adopted {
            backend: Box::new(backend),
            open: false,
        };
        stream
    }

    /// Install a diagnostics callback; see [`ErrorSink`].
    pub fn on_error(&mut self, sink: impl FnMut(&str) + Send + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// Replace the back-end with the file at `path`, closing any current
    /// back-end first.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.close();
        self.slot = BackendSlot::Owned {
            path: path.into(),
            file: None,
        };
    }

    /// Replace the back-end with a caller-supplied one, closing any
    /// current back-end first.
    pub fn set_backend(&mut self, backend: impl Backend + 'static) {
        self.close();
        self.slot = BackendSlot::Adopted {
            backend: Box::new(backend),
            open: false,
        };
    }

    /// Close the stream and reclaim an adopted back-end. Returns `None`
    /// for path-owned or missing back-ends.
    pub fn into_backend(mut self) -> Option<Box<dyn Backend>> {
        self.close();
        match std::mem::replace(&mut self.slot, BackendSlot::Missing) {
            BackendSlot::Adopted { backend, .. } => Some(backend),
            other => {
                self.slot = other;
                None
            }
        }
    }

    /// Path of the owned back-end, if any.
    pub fn file_name(&self) -> Option<&Path> {
        match &self.slot {
            BackendSlot::Owned { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.mode != Mode::Closed
    }

    /// True while the open stream is encrypting (a password is set and
    /// the header checked out).
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Current plaintext position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn writable(&self) -> bool {
        matches!(self.mode, Mode::ReadWrite | Mode::Append)
    }

    /// Open the stream.
    ///
    /// With a non-empty password, an empty writable back-end gets a fresh
    /// verification header; a non-empty back-end must carry a header
    /// matching the configured password, salt, key length and round
    /// count, otherwise the open fails and the back-end is closed again.
    /// With an empty password the stream is a transparent passthrough.
    pub fn open(&mut self, mode: OpenMode) -> Result<()> {
        if self.is_open() {
            bail!(StreamError::AlreadyOpen);
        }
        self.config.validate()?;

        let (target, truncate) = match mode {
            OpenMode::ReadOnly => (Mode::ReadOnly, false),
            OpenMode::ReadWrite => (Mode::ReadWrite, false),
            OpenMode::Truncate => (Mode::ReadWrite, true),
            OpenMode::Append => (Mode::Append, false),
        };

        self.open_backend(target, truncate)?;
        self.mode = target;
        self.pos = 0;

        if let Err(err) = self.init_cipher(target) {
            self.discard_backend();
            return Err(err);
        }

        debug!(?mode, encrypted = self.encrypted, "stream opened");
        Ok(())
    }

    fn open_backend(&mut self, mode: Mode, truncate: bool) -> Result<()> {
        match &mut self.slot {
            BackendSlot::Missing => bail!(StreamError::BackendMissing),
            BackendSlot::Owned { path, file } => {
                let handle = if mode == Mode::ReadOnly {
                    OpenOptions::new().read(true).open(&path)
                } else {
                    OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create(true)
                        .truncate(truncate)
                        .open(&path)
                }
                .with_context(|| format!("cannot open back-end file '{}'", path.display()))?;
                *file = Some(handle);
            }
            BackendSlot::Adopted { backend, open } => {
                backend
                    .seek(SeekFrom::Start(0))
                    .context("cannot rewind adopted back-end")?;
                if truncate {
                    backend
                        .set_len(0)
                        .context("cannot truncate adopted back-end")?;
                }
                *open = true;
            }
        }
        Ok(())
    }

    fn init_cipher(&mut self, mode: Mode) -> Result<()> {
        if self.config.is_passthrough() {
            if mode == Mode::Append {
                let end = self.size()?;
                self.seek_to(end)?;
            }
            return Ok(());
        }

        self.engine = Some(match self.config.cipher_method() {
            EncryptionMethod::Aes => {
                let key_length = self.config.aes_key_length();
                let (key, iv) = kdf::bytes_to_key(
                    self.config.password(),
                    self.config.salt_bytes(),
                    self.config.rounds(),
                    key_length.key_len(),
                );
                Engine::Ctr(CtrKeystream::new(key_length, &key, &iv))
            }
            EncryptionMethod::Xor => Engine::Xor(XorKeystream::new(self.config.password())),
        });
        self.encrypted = true;

        let backend = active_backend(&mut self.slot)?;
        if backend.is_empty()? {
            if matches!(mode, Mode::ReadWrite | Mode::Append) {
                backend
                    .write_all(&Header::for_config(&self.config).to_bytes())
                    .context("cannot write encryption header")?;
            }
        } else {
            let mut buf = [0u8; HEADER_LEN];
            let mut filled = 0;
            while filled < HEADER_LEN {
                let n = backend
                    .read(&mut buf[filled..])
                    .context("cannot read encryption header")?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if let Err(err) = Header::parse(&buf[..filled]).and_then(|h| h.check(&self.config)) {
                warn!("encryption header rejected: {err}");
                return Err(err.into());
            }
        }

        if mode == Mode::Append {
            let end = self.size()?;
            self.seek_to(end)?;
        }
        Ok(())
    }

    /// Undo a half-finished open: rewind and close the back-end, clear
    /// cipher state.
    fn discard_backend(&mut self) {
        if let Ok(backend) = active_backend(&mut self.slot) {
            let _ = backend.seek(SeekFrom::Start(0));
        }
        match &mut self.slot {
            BackendSlot::Owned { file, .. } => *file = None,
            BackendSlot::Adopted { open, .. } => *open = false,
            BackendSlot::Missing => {}
        }
        self.mode = Mode::Closed;
        self.encrypted = false;
        self.engine = None;
        self.pos = 0;
    }

    /// Close the stream: flush pending writes (flush failures are logged,
    /// not raised), rewind and release the back-end, clear cipher state.
    /// Idempotent.
    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        if let Ok(backend) = active_backend(&mut self.slot) {
            if matches!(self.mode, Mode::ReadWrite | Mode::Append) {
                if let Err(err) = backend.sync() {
                    warn!("flush on close failed: {err}");
                }
            }
            let _ = backend.seek(SeekFrom::Start(0));
        }
        match &mut self.slot {
            BackendSlot::Owned { file, .. } => *file = None,
            BackendSlot::Adopted { open, .. } => *open = false,
            BackendSlot::Missing => {}
        }
        self.mode = Mode::Closed;
        self.encrypted = false;
        self.engine = None;
        self.pos = 0;
        debug!("stream closed");
    }

    /// Plaintext size: the back-end size minus the header when encrypted.
    pub fn size(&self) -> io::Result<u64> {
        let raw = match &self.slot {
            BackendSlot::Missing => return Ok(0),
            BackendSlot::Owned {
                file: Some(file), ..
            } => Backend::len(file)?,
            BackendSlot::Owned { path, file: None } => {
                fs::metadata(path).map(|m| m.len()).unwrap_or(0)
            }
            BackendSlot::Adopted { backend, .. } => backend.len()?,
        };
        if self.encrypted {
            Ok(raw.saturating_sub(HEADER_LEN as u64))
        } else {
            Ok(raw)
        }
    }

    /// Resize the plaintext to exactly `len` bytes. The stream must be
    /// open for writing. The position is left untouched; a position past
    /// the new end behaves like any other seek past EOF.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        if !self.is_open() {
            bail!(StreamError::NotOpen);
        }
        if !self.writable() {
            bail!(StreamError::NotWritable);
        }
        let physical = if self.encrypted {
            len + HEADER_LEN as u64
        } else {
            len
        };
        let backend = active_backend(&mut self.slot)?;
        backend.set_len(physical).context("cannot resize back-end")?;
        Ok(())
    }

    /// Remove the owned back-end file, closing the stream first. On
    /// success the stream has no back-end any more.
    pub fn remove(&mut self) -> Result<()> {
        let path = self.owned_path()?;
        self.close();
        fs::remove_file(&path).with_context(|| format!("cannot remove '{}'", path.display()))?;
        self.slot = BackendSlot::Missing;
        Ok(())
    }

    /// Rename the owned back-end file, closing the stream first. Refuses
    /// to overwrite an existing destination. On success the stream refers
    /// to the new name.
    pub fn rename(&mut self, new_path: impl AsRef<Path>) -> Result<()> {
        let new_path = new_path.as_ref();
        let path = self.owned_path()?;
        self.close();
        if new_path.exists() {
            bail!(StreamError::DestinationExists(
                new_path.display().to_string()
            ));
        }
        fs::rename(&path, new_path).with_context(|| {
            format!(
                "cannot rename '{}' to '{}'",
                path.display(),
                new_path.display()
            )
        })?;
        self.slot = BackendSlot::Owned {
            path: new_path.to_path_buf(),
            file: None,
        };
        Ok(())
    }

    /// True when the owned back-end file exists on disk.
    pub fn exists(&self) -> bool {
        match &self.slot {
            BackendSlot::Owned { path, .. } => path.exists(),
            _ => false,
        }
    }

    fn owned_path(&self) -> Result<PathBuf> {
        match &self.slot {
            BackendSlot::Missing => bail!(StreamError::BackendMissing),
            BackendSlot::Adopted { .. } => bail!(StreamError::NoFileName),
            BackendSlot::Owned { path, .. } => Ok(path.clone()),
        }
    }

    fn seek_to(&mut self, target: u64) -> io::Result<()> {
        let offset = if self.encrypted {
            target.checked_add(HEADER_LEN as u64).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek position overflow")
            })?
        } else {
            target
        };
        let backend = active_backend(&mut self.slot)?;
        backend.seek(SeekFrom::Start(offset))?;
        if let Some(engine) = self.engine.as_mut() {
            engine.reset_to(target);
        }
        self.pos = target;
        Ok(())
    }

    fn report(&mut self, msg: &str) {
        if let Some(sink) = self.sink.as_mut() {
            sink(msg);
        }
    }
}

impl Read for CryptFile {
    /// Reads up to `buf.len()` plaintext bytes, looping over short
    /// back-end reads; a short result means end-of-file or a back-end
    /// error after some bytes already arrived.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.is_open() {
            return Err(StreamError::NotOpen.into());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let backend = active_backend(&mut self.slot)?;
        let mut filled = 0;
        loop {
            match backend.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    if filled == buf.len() {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    if filled == 0 {
                        return Err(err);
                    }
                    break;
                }
            }
        }

        if let Some(engine) = self.engine.as_mut() {
            engine.apply(&mut buf[..filled]);
        }
        self.pos += filled as u64;
        Ok(filled)
    }
}

impl Write for CryptFile {
    /// Encrypts `buf` and commits the whole ciphertext to the back-end.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.is_open() {
            return Err(StreamError::NotOpen.into());
        }
        if !self.writable() {
            return Err(StreamError::NotWritable.into());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if self.engine.is_none() {
            let backend = active_backend(&mut self.slot)?;
            let n = backend.write(buf)?;
            self.pos += n as u64;
            return Ok(n);
        }

        let mut ciphertext = Vec::new();
        if ciphertext.try_reserve_exact(buf.len()).is_err() {
            let msg = format!(
                "cannot allocate a {} byte ciphertext buffer; try a smaller write",
                buf.len()
            );
            error!("{msg}");
            self.report(&msg);
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, msg));
        }
        ciphertext.extend_from_slice(buf);
        if let Some(engine) = self.engine.as_mut() {
            engine.apply(&mut ciphertext);
        }

        let backend = active_backend(&mut self.slot)?;
        if let Err(err) = backend.write_all(&ciphertext) {
            let msg = format!("back-end write error: {err}");
            error!("{msg}");
            self.report(&msg);
            return Err(err);
        }
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let backend = active_backend(&mut self.slot)?;
        backend.sync()
    }
}

impl Seek for CryptFile {
    /// Seeks to a plaintext offset, repositioning the back-end past the
    /// header and re-synchronizing the keystream. Seeking past EOF is
    /// allowed; a later write extends the file and the intervening bytes
    /// are whatever the filesystem provides.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if !self.is_open() {
            return Err(StreamError::NotOpen.into());
        }
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
            SeekFrom::End(delta) => self.size()? as i128 + delta as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        let target = target as u64;
        self.seek_to(target)?;
        Ok(target)
    }
}

impl Drop for CryptFile {
    fn drop(&mut self) {
        self.close();
    }
}
