//! Back-end capability interface.
//!
//! A back-end is any seekable byte store the stream can keep ciphertext
//! in. `File` is the usual choice; `Cursor<Vec<u8>>` gives an in-memory
//! back-end, handy for tests and for staging data before it touches disk.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};

/// Minimal capability set the stream needs from its storage.
pub trait Backend: Read + Write + Seek + Send {
    /// Current total size in bytes.
    fn len(&self) -> io::Result<u64>;

    /// True when the back-end holds no bytes.
    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Push written bytes down to durable storage.
    fn sync(&mut self) -> io::Result<()>;

    /// Grow or shrink the back-end to exactly `size` bytes.
    fn set_len(&mut self, size: u64) -> io::Result<()>;
}

impl Backend for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn set_len(&mut self, size: u64) -> io::Result<()> {
        File::set_len(self, size)
    }
}

impl Backend for Cursor<Vec<u8>> {
    fn len(&self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.get_mut().resize(size as usize, 0);
        Ok(())
    }
}
