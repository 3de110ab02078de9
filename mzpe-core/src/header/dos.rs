use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// `MZ` read as a little-endian word.
pub const DOS_SIGNATURE: u16 = 0x5A4D;

/// Size of the MS-DOS header on disk.
pub const DOS_HEADER_SIZE: usize = 64;

/// Offset of `e_lfanew` inside the DOS header.
pub const E_LFANEW_OFFSET: usize = 0x3C;

/// The legacy MS-DOS header that opens every PE image.
///
/// Apart from `e_magic` and `e_lfanew` the fields only matter to the 16-bit
/// stub program and are kept verbatim.
///
/// Reference: [PE Format, MS-DOS Stub](https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#ms-dos-stub-image-only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DosHeader {
    /// Always `0x5A4D` ("MZ") for a decoded image.
    pub e_magic: u16,
    /// Bytes on the last page of the file.
    pub e_cblp: u16,
    /// Pages in the file.
    pub e_cp: u16,
    /// Relocations.
    pub e_crlc: u16,
    /// Size of the header in paragraphs.
    pub e_cparhdr: u16,
    pub e_minalloc: u16,
    pub e_maxalloc: u16,
    /// Initial (relative) SS value.
    pub e_ss: u16,
    /// Initial SP value.
    pub e_sp: u16,
    pub e_csum: u16,
    /// Initial IP value.
    pub e_ip: u16,
    /// Initial (relative) CS value.
    pub e_cs: u16,
    /// File address of the relocation table.
    pub e_lfarlc: u16,
    /// Overlay number.
    pub e_ovno: u16,
    pub e_res: [u16; 4],
    pub e_oemid: u16,
    pub e_oeminfo: u16,
    pub e_res2: [u16; 10],
    /// File offset of the `PE\0\0` signature and COFF header.
    pub e_lfanew: u32,
}

impl DosHeader {
    /// Decodes the header at the cursor, which must sit at offset 0.
    ///
    /// The signature is checked before the rest of the record is
    /// bounds-checked, so any buffer that does not start with `MZ` is rejected
    /// as a signature mismatch.
    pub fn decode(cur: &mut Cursor<'_>) -> Result<Self> {
        const WHAT: &str = "DOS header incomplete";

        let start = cur.offset();
        let e_magic = cur.u16(WHAT)?;
        if e_magic != DOS_SIGNATURE {
            return Err(Error::SignatureNotFound {
                format: "DOS",
                offset: start,
            });
        }

        cur.ensure(DOS_HEADER_SIZE - 2, WHAT)?;

        Ok(DosHeader {
            e_magic,
            e_cblp: cur.u16(WHAT)?,
            e_cp: cur.u16(WHAT)?,
            e_crlc: cur.u16(WHAT)?,
            e_cparhdr: cur.u16(WHAT)?,
            e_minalloc: cur.u16(WHAT)?,
            e_maxalloc: cur.u16(WHAT)?,
            e_ss: cur.u16(WHAT)?,
            e_sp: cur.u16(WHAT)?,
            e_csum: cur.u16(WHAT)?,
            e_ip: cur.u16(WHAT)?,
            e_cs: cur.u16(WHAT)?,
            e_lfarlc: cur.u16(WHAT)?,
            e_ovno: cur.u16(WHAT)?,
            e_res: cur.u16_array(WHAT)?,
            e_oemid: cur.u16(WHAT)?,
            e_oeminfo: cur.u16(WHAT)?,
            e_res2: cur.u16_array(WHAT)?,
            e_lfanew: cur.u32(WHAT)?,
        })
    }
}
