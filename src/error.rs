use std::fmt;
use std::io;

#[derive(Debug)]
pub enum StreamError {
    BackendMissing,
    AlreadyOpen,
    NotOpen,
    NotWritable,
    NoFileName,
    InvalidRounds(i32),
    HeaderTooShort(usize),
    BadMagic(u8),
    FieldMismatch(&'static str),
    DestinationExists(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::BackendMissing => write!(f, "no back-end file is attached to the stream"),
            StreamError::AlreadyOpen => write!(f, "stream is already open"),
            StreamError::NotOpen => write!(f, "stream is not open"),
            StreamError::NotWritable => write!(f, "stream is not open for writing"),
            StreamError::NoFileName => write!(f, "stream back-end has no file name"),
            StreamError::InvalidRounds(n) => write!(f, "KDF round count must be >= 1, got {n}"),
            StreamError::HeaderTooShort(n) => {
                write!(f, "file too short for an encryption header ({n} bytes)")
            }
            StreamError::BadMagic(b) => write!(f, "invalid header magic byte 0x{b:02x}"),
            StreamError::FieldMismatch(field) => write!(f, "header mismatch: wrong {field}"),
            StreamError::DestinationExists(name) => {
                write!(f, "destination '{name}' already exists")
            }
        }
    }
}

impl std::error::Error for StreamError {}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> io::Error {
        let kind = match err {
            StreamError::NotOpen | StreamError::BackendMissing => io::ErrorKind::NotConnected,
            StreamError::NotWritable => io::ErrorKind::PermissionDenied,
            _ => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}
