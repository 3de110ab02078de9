use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while decoding an image.
///
/// Format errors carry the byte offset (from the start of the buffer) at which
/// the violation was detected. Decoding stops at the first one.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{format} signature not found at offset {offset:#x}")]
    SignatureNotFound { format: &'static str, offset: usize },

    #[error("{what} at offset {offset:#x}")]
    TruncatedInput { what: &'static str, offset: usize },

    #[error("{message} (offset {offset:#x})")]
    UnsupportedFormat { message: &'static str, offset: usize },

    #[error("unknown optional header magic {magic:#06x} at offset {offset:#x}")]
    UnknownFormat { magic: u16, offset: usize },

    #[error("raw data of section `{name}` ends at {end:#x}, past the end of the buffer (offset {offset:#x})")]
    SectionOutOfBounds {
        name: String,
        end: u64,
        offset: usize,
    },

    #[error("extended header offset {value:#x} points inside the DOS header (offset {offset:#x})")]
    InvalidHeaderOffset { value: u32, offset: usize },

    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn truncated(what: &'static str, offset: usize) -> Self {
        Error::TruncatedInput { what, offset }
    }

    /// Byte offset of the violation, or `None` for I/O errors.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::SignatureNotFound { offset, .. }
            | Error::TruncatedInput { offset, .. }
            | Error::UnsupportedFormat { offset, .. }
            | Error::UnknownFormat { offset, .. }
            | Error::SectionOutOfBounds { offset, .. }
            | Error::InvalidHeaderOffset { offset, .. } => Some(*offset),
            Error::Io { .. } => None,
        }
    }

    /// True when the input was read but is not a valid PE image.
    pub fn is_format(&self) -> bool {
        !matches!(self, Error::Io { .. })
    }

    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// Short name of the error kind, used for diagnostics output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::SignatureNotFound { .. } => "SignatureNotFound",
            Error::TruncatedInput { .. } => "TruncatedInput",
            Error::UnsupportedFormat { .. } => "UnsupportedFormat",
            Error::UnknownFormat { .. } => "UnknownFormat",
            Error::SectionOutOfBounds { .. } => "SectionOutOfBounds",
            Error::InvalidHeaderOffset { .. } => "InvalidHeaderOffset",
            Error::Io { .. } => "Io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_errors_carry_offsets() {
        let err = Error::truncated("COFF header incomplete", 0x84);
        assert_eq!(err.offset(), Some(0x84));
        assert!(err.is_format());
        assert_eq!(err.to_string(), "COFF header incomplete at offset 0x84");
    }

    #[test]
    fn unknown_magic_is_rendered_in_hex() {
        let err = Error::UnknownFormat {
            magic: 0xffff,
            offset: 0x98,
        };
        assert_eq!(
            err.to_string(),
            "unknown optional header magic 0xffff at offset 0x98"
        );
    }

    #[test]
    fn io_errors_are_not_format_errors() {
        let err = Error::Io {
            path: PathBuf::from("missing.exe"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(!err.is_format());
        assert_eq!(err.offset(), None);
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
        assert_eq!(err.kind_name(), "Io");
    }
}
