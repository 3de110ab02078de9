//! Synthetic PE images for tests.
//!
//! Layout of a built image:
//!
//! ```text
//! 0x000  DOS header (e_lfanew = 0x80)
//! 0x040  DOS stub
//! 0x080  PE\0\0 + COFF header
//! 0x098  optional header + data directories (+ padding)
//!  ...   section table (.text, .data)
//! 0x200  .text raw data (0x200 bytes of 0x90)
//! 0x400  .data raw data (0x200 bytes of 0xda)
//! 0x600  end
//! ```

use byteorder::{WriteBytesExt, LE};

use crate::header::optional::{PE32_BODY_SIZE, PE32_MAGIC, PE32_PLUS_BODY_SIZE, PE32_PLUS_MAGIC};
use crate::sections::SECTION_HEADER_SIZE;

const LFANEW: usize = 0x80;
const FILE_ALIGNMENT: usize = 0x200;

const STUB_CODE: &[u8] = b"\x0e\x1f\xba\x0e\x00\xb4\x09\xcd\x21\xb8\x01\x4c\xcd\x21";
const STUB_TEXT: &[u8] = b"This program cannot be run in DOS mode.\r\r\n$";

struct SectionSpec {
    name: &'static [u8; 8],
    virtual_size: u32,
    virtual_address: u32,
    characteristics: u32,
    fill: u8,
}

const SECTIONS: [SectionSpec; 2] = [
    SectionSpec {
        name: b".text\0\0\0",
        virtual_size: 0x1f0,
        virtual_address: 0x1000,
        characteristics: 0x6000_0020,
        fill: 0x90,
    },
    SectionSpec {
        name: b".data\0\0\0",
        virtual_size: 0x100,
        virtual_address: 0x2000,
        characteristics: 0xc000_0040,
        fill: 0xda,
    },
];

pub struct PeBuilder {
    magic: u16,
    wide: bool,
    dll: bool,
    directories: u32,
    zero_directories: bool,
    padding: usize,
}

impl PeBuilder {
    /// Offset of the optional header magic in every built image.
    pub const OPTIONAL_HEADER_OFFSET: usize = LFANEW + 4 + 20;

    pub fn pe32() -> Self {
        Self {
            magic: PE32_MAGIC,
            wide: false,
            dll: false,
            directories: 16,
            zero_directories: false,
            padding: 0,
        }
    }

    pub fn pe64() -> Self {
        Self {
            magic: PE32_PLUS_MAGIC,
            wide: true,
            ..Self::pe32()
        }
    }

    /// Overrides the magic. The two known magics also switch the layout.
    pub fn magic(mut self, magic: u16) -> Self {
        self.magic = magic;
        match magic {
            PE32_MAGIC => self.wide = false,
            PE32_PLUS_MAGIC => self.wide = true,
            _ => {}
        }
        self
    }

    pub fn dll(mut self) -> Self {
        self.dll = true;
        self
    }

    pub fn data_directories(mut self, count: u32) -> Self {
        self.directories = count;
        self
    }

    /// Writes every directory entry as `(0, 0)`.
    pub fn zero_directories(mut self) -> Self {
        self.zero_directories = true;
        self
    }

    /// Extra bytes declared in `size_of_optional_header` after the table.
    pub fn optional_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Value written for directory `index` unless zeroed.
    pub fn directory_entry(index: usize) -> (u32, u32) {
        (0x3000 + 0x100 * index as u32, 0x18 + index as u32)
    }

    /// Section table offset for a layout with no optional header padding.
    pub fn section_table_offset(magic: u16, directories: usize) -> usize {
        let body = if magic == PE32_MAGIC {
            PE32_BODY_SIZE
        } else {
            PE32_PLUS_BODY_SIZE
        };
        Self::OPTIONAL_HEADER_OFFSET + 2 + body + directories * 8
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_ALIGNMENT * 3);
        self.write_dos(&mut out);
        self.write_coff(&mut out);
        self.write_optional(&mut out);
        self.write_section_table(&mut out);

        assert!(out.len() <= FILE_ALIGNMENT, "fixture headers overflow");
        out.resize(FILE_ALIGNMENT, 0);
        for spec in &SECTIONS {
            out.extend(std::iter::repeat(spec.fill).take(FILE_ALIGNMENT));
        }
        out
    }

    fn write_dos(&self, out: &mut Vec<u8>) {
        let words: [u16; 14] = [
            0x5a4d, 0x90, 0x03, 0x00, 0x04, 0x00, 0xffff, 0x00, 0xb8, 0x00, 0x00, 0x00, 0x40, 0x00,
        ];
        for word in words {
            out.write_u16::<LE>(word).unwrap();
        }
        // e_res, e_oemid, e_oeminfo, e_res2
        out.extend_from_slice(&[0u8; 32]);
        out.write_u32::<LE>(LFANEW as u32).unwrap();

        out.extend_from_slice(STUB_CODE);
        out.extend_from_slice(STUB_TEXT);
        out.resize(LFANEW, 0);
    }

    fn optional_size(&self) -> usize {
        let body = if self.wide {
            PE32_PLUS_BODY_SIZE
        } else {
            PE32_BODY_SIZE
        };
        2 + body + self.directories as usize * 8 + self.padding
    }

    fn write_coff(&self, out: &mut Vec<u8>) {
        let machine: u16 = if self.wide { 0x8664 } else { 0x014c };
        let mut characteristics: u16 = if self.wide { 0x0022 } else { 0x0102 };
        if self.dll {
            characteristics |= 0x2000;
        }

        out.extend_from_slice(b"PE\0\0");
        out.write_u16::<LE>(machine).unwrap();
        out.write_u16::<LE>(SECTIONS.len() as u16).unwrap();
        out.write_u32::<LE>(0x5f5e_1000).unwrap();
        out.write_u32::<LE>(0).unwrap();
        out.write_u32::<LE>(0).unwrap();
        out.write_u16::<LE>(self.optional_size() as u16).unwrap();
        out.write_u16::<LE>(characteristics).unwrap();
    }

    fn write_optional(&self, out: &mut Vec<u8>) {
        out.write_u16::<LE>(self.magic).unwrap();
        out.write_u8(14).unwrap();
        out.write_u8(0).unwrap();
        out.write_u32::<LE>(0x200).unwrap(); // size_of_code
        out.write_u32::<LE>(0x200).unwrap(); // size_of_initialized_data
        out.write_u32::<LE>(0).unwrap();
        out.write_u32::<LE>(0x1010).unwrap(); // entry point
        out.write_u32::<LE>(0x1000).unwrap(); // base_of_code
        if self.wide {
            out.write_u64::<LE>(0x1_4000_0000).unwrap();
        } else {
            out.write_u32::<LE>(0x2000).unwrap(); // base_of_data
            out.write_u32::<LE>(0x0040_0000).unwrap();
        }
        out.write_u32::<LE>(0x1000).unwrap();
        out.write_u32::<LE>(FILE_ALIGNMENT as u32).unwrap();
        for version in [6u16, 0, 0, 0, 6, 0] {
            out.write_u16::<LE>(version).unwrap();
        }
        out.write_u32::<LE>(0).unwrap(); // win32_version_value
        out.write_u32::<LE>(0x3000).unwrap(); // size_of_image
        out.write_u32::<LE>(FILE_ALIGNMENT as u32).unwrap(); // size_of_headers
        out.write_u32::<LE>(0).unwrap(); // checksum
        out.write_u16::<LE>(3).unwrap(); // windows console
        out.write_u16::<LE>(if self.wide { 0x8160 } else { 0x8140 })
            .unwrap();
        for size in [0x10_0000u64, 0x1000, 0x10_0000, 0x1000] {
            if self.wide {
                out.write_u64::<LE>(size).unwrap();
            } else {
                out.write_u32::<LE>(size as u32).unwrap();
            }
        }
        out.write_u32::<LE>(0).unwrap(); // loader_flags
        out.write_u32::<LE>(self.directories).unwrap();

        for index in 0..self.directories as usize {
            let (va, size) = if self.zero_directories {
                (0, 0)
            } else {
                Self::directory_entry(index)
            };
            out.write_u32::<LE>(va).unwrap();
            out.write_u32::<LE>(size).unwrap();
        }
        out.resize(out.len() + self.padding, 0);
    }

    fn write_section_table(&self, out: &mut Vec<u8>) {
        for (index, spec) in SECTIONS.iter().enumerate() {
            let start = out.len();
            out.extend_from_slice(spec.name);
            out.write_u32::<LE>(spec.virtual_size).unwrap();
            out.write_u32::<LE>(spec.virtual_address).unwrap();
            out.write_u32::<LE>(FILE_ALIGNMENT as u32).unwrap();
            out.write_u32::<LE>((FILE_ALIGNMENT * (index + 1)) as u32).unwrap();
            out.write_u32::<LE>(0).unwrap();
            out.write_u32::<LE>(0).unwrap();
            out.write_u16::<LE>(0).unwrap();
            out.write_u16::<LE>(0).unwrap();
            out.write_u32::<LE>(spec.characteristics).unwrap();
            debug_assert_eq!(out.len() - start, SECTION_HEADER_SIZE);
        }
    }
}
