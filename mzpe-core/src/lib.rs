//! Decoder for Windows Portable Executable (PE32 / PE32+) images.
//!
//! [`Image::from_bytes`] runs the decode stages in file order (DOS header,
//! stub, COFF header, optional header, data directories, section table and
//! section data) and stops at the first malformed structure.

pub mod cursor;
pub mod directory;
pub mod error;
pub mod header;
pub mod image;
pub mod sections;

#[cfg(test)]
mod fixture;

pub use directory::*;
pub use error::{Error, Result};
pub use header::coff::{CoffHeader, FileCharacteristics, Machine};
pub use header::dos::DosHeader;
pub use header::optional::{
    DllCharacteristics, OptionalHeader, OptionalHeader32, OptionalHeader64, Subsystem,
};
pub use header::Header;
pub use image::*;
pub use sections::*;
