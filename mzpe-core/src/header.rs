pub mod coff;
pub mod dos;
pub mod optional;

use crate::directory::DataDirectory;
use optional::{DllCharacteristics, Subsystem};

/// Fields shared by the PE32 and PE32+ optional headers.
///
/// Address-width fields are widened to `u64` so callers can ignore which
/// layout the image uses.
pub trait Header: std::fmt::Debug + Send + Sync {
    /// Returns the RVA of the entry point, or zero if there is none.
    fn entry_point(&self) -> u32;

    /// Returns the preferred load address.
    fn image_base(&self) -> u64;

    /// Returns true for the PE32+ layout.
    fn is_64(&self) -> bool;

    /// Returns a short human-readable name, e.g. "PE32" or "PE32+".
    fn format_name(&self) -> &'static str;

    /// Returns the `(major, minor)` linker version.
    fn linker_version(&self) -> (u8, u8);

    fn section_alignment(&self) -> u32;

    fn file_alignment(&self) -> u32;

    fn size_of_image(&self) -> u32;

    fn size_of_headers(&self) -> u32;

    fn checksum(&self) -> u32;

    fn subsystem(&self) -> Subsystem;

    fn dll_characteristics(&self) -> DllCharacteristics;

    fn size_of_stack_reserve(&self) -> u64;

    fn size_of_stack_commit(&self) -> u64;

    fn size_of_heap_reserve(&self) -> u64;

    fn size_of_heap_commit(&self) -> u64;

    /// Returns the data directory table in on-disk order.
    fn data_directories(&self) -> &[DataDirectory];
}
