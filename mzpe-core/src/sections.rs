use bitflags::bitflags;
use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// Size of one section table entry.
pub const SECTION_HEADER_SIZE: usize = 40;

bitflags! {
    /// `IMAGE_SCN_*` section characteristics. Alignment bits are kept raw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct SectionCharacteristics: u32 {
        const TYPE_NO_PAD            = 0x0000_0008;
        const CNT_CODE               = 0x0000_0020;
        const CNT_INITIALIZED_DATA   = 0x0000_0040;
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        const LNK_INFO               = 0x0000_0200;
        const LNK_REMOVE             = 0x0000_0800;
        const LNK_COMDAT             = 0x0000_1000;
        const GPREL                  = 0x0000_8000;
        const LNK_NRELOC_OVFL        = 0x0100_0000;
        const MEM_DISCARDABLE        = 0x0200_0000;
        const MEM_NOT_CACHED         = 0x0400_0000;
        const MEM_NOT_PAGED          = 0x0800_0000;
        const MEM_SHARED             = 0x1000_0000;
        const MEM_EXECUTE            = 0x2000_0000;
        const MEM_READ               = 0x4000_0000;
        const MEM_WRITE              = 0x8000_0000;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionHeader {
    /// Name with trailing NULs removed. Not valid UTF-8 is replaced lossily.
    pub name: String,
    /// The 8 name bytes as stored on disk.
    #[serde(skip)]
    pub raw_name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: SectionCharacteristics,
}

/// Trims NUL padding from a section name. An 8-character name has no
/// terminator at all.
fn trim_name(raw: &[u8; 8]) -> String {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl SectionHeader {
    pub fn decode(cur: &mut Cursor<'_>) -> Result<Self> {
        const WHAT: &str = "section headers incomplete";

        cur.ensure(SECTION_HEADER_SIZE, WHAT)?;
        let raw_name = cur.array::<8>(WHAT)?;
        Ok(SectionHeader {
            name: trim_name(&raw_name),
            raw_name,
            virtual_size: cur.u32(WHAT)?,
            virtual_address: cur.u32(WHAT)?,
            size_of_raw_data: cur.u32(WHAT)?,
            pointer_to_raw_data: cur.u32(WHAT)?,
            pointer_to_relocations: cur.u32(WHAT)?,
            pointer_to_linenumbers: cur.u32(WHAT)?,
            number_of_relocations: cur.u16(WHAT)?,
            number_of_linenumbers: cur.u16(WHAT)?,
            characteristics: SectionCharacteristics::from_bits_retain(cur.u32(WHAT)?),
        })
    }

    /// End of the raw data in the file, without overflow.
    pub fn raw_data_end(&self) -> u64 {
        self.pointer_to_raw_data as u64 + self.size_of_raw_data as u64
    }

    pub fn is_code(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::CNT_CODE)
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics
            .contains(SectionCharacteristics::MEM_EXECUTE)
    }

    pub fn is_readable(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::MEM_READ)
    }

    pub fn is_writable(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::MEM_WRITE)
    }

    /// Memory permissions as `R`/`W`/`X` with `-` for missing ones.
    pub fn flags_string(&self) -> String {
        let mut flags = String::with_capacity(3);
        flags.push(if self.is_readable() { 'R' } else { '-' });
        flags.push(if self.is_writable() { 'W' } else { '-' });
        flags.push(if self.is_executable() { 'X' } else { '-' });
        flags
    }
}

/// A section header together with a private copy of its raw data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub header: SectionHeader,
    #[serde(skip)]
    data: Vec<u8>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Exactly `size_of_raw_data` bytes read from `pointer_to_raw_data`.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn raw_len(&self) -> usize {
        self.data.len()
    }

    /// Decodes `count` section headers at the cursor and copies each
    /// section's raw data out of `image`, the whole original buffer.
    pub fn decode_table(cur: &mut Cursor<'_>, count: usize, image: &[u8]) -> Result<Vec<Section>> {
        cur.ensure_records(count, SECTION_HEADER_SIZE, "section headers incomplete")?;

        let mut sections = Vec::with_capacity(count);
        for _ in 0..count {
            let entry_offset = cur.offset();
            let header = SectionHeader::decode(cur)?;

            let end = header.raw_data_end();
            if end > image.len() as u64 {
                return Err(Error::SectionOutOfBounds {
                    name: header.name.clone(),
                    end,
                    offset: entry_offset,
                });
            }

            let start = header.pointer_to_raw_data as usize;
            let data = image[start..end as usize].to_vec();
            log::debug!(
                "section {:<8} raw {:#x}..{:#x} ({} bytes)",
                header.name,
                start,
                end,
                data.len()
            );
            sections.push(Section { header, data });
        }
        Ok(sections)
    }
}
