//! The optional header, in its PE32 and PE32+ layouts.
//!
//! Both layouts open with a 2-byte magic. The two share most fields but
//! `image_base` and the stack/heap sizes widen to 64 bits in PE32+, and
//! `base_of_data` only exists in PE32.

use std::fmt;

use bitflags::bitflags;
use serde::Serialize;

use crate::cursor::Cursor;
use crate::directory::DataDirectory;
use crate::error::{Error, Result};
use crate::header::Header;

pub const PE32_MAGIC: u16 = 0x10b;
pub const PE32_PLUS_MAGIC: u16 = 0x20b;
pub const ROM_MAGIC: u16 = 0x107;

/// PE32 fields after the magic, up to and including `number_of_rva_and_sizes`.
pub const PE32_BODY_SIZE: usize = 94;
/// PE32+ fields after the magic, up to and including `number_of_rva_and_sizes`.
pub const PE32_PLUS_BODY_SIZE: usize = 110;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Subsystem {
    Unknown,
    Native,
    WindowsGui,
    WindowsCui,
    Os2Cui,
    PosixCui,
    NativeWindows,
    WindowsCeGui,
    EfiApplication,
    EfiBootServiceDriver,
    EfiRuntimeDriver,
    EfiRom,
    Xbox,
    WindowsBootApplication,
    Other(u16),
}

impl From<u16> for Subsystem {
    fn from(value: u16) -> Self {
        match value {
            0 => Subsystem::Unknown,
            1 => Subsystem::Native,
            2 => Subsystem::WindowsGui,
            3 => Subsystem::WindowsCui,
            5 => Subsystem::Os2Cui,
            7 => Subsystem::PosixCui,
            8 => Subsystem::NativeWindows,
            9 => Subsystem::WindowsCeGui,
            10 => Subsystem::EfiApplication,
            11 => Subsystem::EfiBootServiceDriver,
            12 => Subsystem::EfiRuntimeDriver,
            13 => Subsystem::EfiRom,
            14 => Subsystem::Xbox,
            16 => Subsystem::WindowsBootApplication,
            other => Subsystem::Other(other),
        }
    }
}

impl From<Subsystem> for u16 {
    fn from(subsystem: Subsystem) -> Self {
        match subsystem {
            Subsystem::Unknown => 0,
            Subsystem::Native => 1,
            Subsystem::WindowsGui => 2,
            Subsystem::WindowsCui => 3,
            Subsystem::Os2Cui => 5,
            Subsystem::PosixCui => 7,
            Subsystem::NativeWindows => 8,
            Subsystem::WindowsCeGui => 9,
            Subsystem::EfiApplication => 10,
            Subsystem::EfiBootServiceDriver => 11,
            Subsystem::EfiRuntimeDriver => 12,
            Subsystem::EfiRom => 13,
            Subsystem::Xbox => 14,
            Subsystem::WindowsBootApplication => 16,
            Subsystem::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subsystem::Unknown => "unknown",
            Subsystem::Native => "native",
            Subsystem::WindowsGui => "windows-gui",
            Subsystem::WindowsCui => "windows-cui",
            Subsystem::Os2Cui => "os2-cui",
            Subsystem::PosixCui => "posix-cui",
            Subsystem::NativeWindows => "native-windows",
            Subsystem::WindowsCeGui => "windows-ce-gui",
            Subsystem::EfiApplication => "efi-application",
            Subsystem::EfiBootServiceDriver => "efi-boot-service-driver",
            Subsystem::EfiRuntimeDriver => "efi-runtime-driver",
            Subsystem::EfiRom => "efi-rom",
            Subsystem::Xbox => "xbox",
            Subsystem::WindowsBootApplication => "windows-boot-application",
            Subsystem::Other(raw) => return write!(f, "other({raw})"),
        };
        write!(f, "{}", name)
    }
}

bitflags! {
    /// `IMAGE_DLLCHARACTERISTICS_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct DllCharacteristics: u16 {
        const HIGH_ENTROPY_VA       = 0x0020;
        const DYNAMIC_BASE          = 0x0040;
        const FORCE_INTEGRITY       = 0x0080;
        const NX_COMPAT             = 0x0100;
        const NO_ISOLATION          = 0x0200;
        const NO_SEH                = 0x0400;
        const NO_BIND               = 0x0800;
        const APPCONTAINER          = 0x1000;
        const WDM_DRIVER            = 0x2000;
        const GUARD_CF              = 0x4000;
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// PE32 optional header (magic `0x10b`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionalHeader32 {
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub base_of_data: u32,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: Subsystem,
    pub dll_characteristics: DllCharacteristics,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: Vec<DataDirectory>,
}

/// PE32+ optional header (magic `0x20b`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionalHeader64 {
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: Subsystem,
    pub dll_characteristics: DllCharacteristics,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: Vec<DataDirectory>,
}

impl OptionalHeader32 {
    /// Decodes the fields following the magic, then the directory table.
    fn decode_body(cur: &mut Cursor<'_>) -> Result<Self> {
        const WHAT: &str = "PE32 optional header incomplete";

        cur.ensure(PE32_BODY_SIZE, WHAT)?;
        let mut header = OptionalHeader32 {
            major_linker_version: cur.u8(WHAT)?,
            minor_linker_version: cur.u8(WHAT)?,
            size_of_code: cur.u32(WHAT)?,
            size_of_initialized_data: cur.u32(WHAT)?,
            size_of_uninitialized_data: cur.u32(WHAT)?,
            address_of_entry_point: cur.u32(WHAT)?,
            base_of_code: cur.u32(WHAT)?,
            base_of_data: cur.u32(WHAT)?,
            image_base: cur.u32(WHAT)?,
            section_alignment: cur.u32(WHAT)?,
            file_alignment: cur.u32(WHAT)?,
            major_operating_system_version: cur.u16(WHAT)?,
            minor_operating_system_version: cur.u16(WHAT)?,
            major_image_version: cur.u16(WHAT)?,
            minor_image_version: cur.u16(WHAT)?,
            major_subsystem_version: cur.u16(WHAT)?,
            minor_subsystem_version: cur.u16(WHAT)?,
            win32_version_value: cur.u32(WHAT)?,
            size_of_image: cur.u32(WHAT)?,
            size_of_headers: cur.u32(WHAT)?,
            checksum: cur.u32(WHAT)?,
            subsystem: Subsystem::from(cur.u16(WHAT)?),
            dll_characteristics: DllCharacteristics::from_bits_retain(cur.u16(WHAT)?),
            size_of_stack_reserve: cur.u32(WHAT)?,
            size_of_stack_commit: cur.u32(WHAT)?,
            size_of_heap_reserve: cur.u32(WHAT)?,
            size_of_heap_commit: cur.u32(WHAT)?,
            loader_flags: cur.u32(WHAT)?,
            number_of_rva_and_sizes: cur.u32(WHAT)?,
            data_directories: Vec::new(),
        };
        header.data_directories =
            DataDirectory::decode_table(cur, header.number_of_rva_and_sizes as usize)?;
        Ok(header)
    }
}

impl OptionalHeader64 {
    fn decode_body(cur: &mut Cursor<'_>) -> Result<Self> {
        const WHAT: &str = "PE32+ optional header incomplete";

        cur.ensure(PE32_PLUS_BODY_SIZE, WHAT)?;
        let mut header = OptionalHeader64 {
            major_linker_version: cur.u8(WHAT)?,
            minor_linker_version: cur.u8(WHAT)?,
            size_of_code: cur.u32(WHAT)?,
            size_of_initialized_data: cur.u32(WHAT)?,
            size_of_uninitialized_data: cur.u32(WHAT)?,
            address_of_entry_point: cur.u32(WHAT)?,
            base_of_code: cur.u32(WHAT)?,
            image_base: cur.u64(WHAT)?,
            section_alignment: cur.u32(WHAT)?,
            file_alignment: cur.u32(WHAT)?,
            major_operating_system_version: cur.u16(WHAT)?,
            minor_operating_system_version: cur.u16(WHAT)?,
            major_image_version: cur.u16(WHAT)?,
            minor_image_version: cur.u16(WHAT)?,
            major_subsystem_version: cur.u16(WHAT)?,
            minor_subsystem_version: cur.u16(WHAT)?,
            win32_version_value: cur.u32(WHAT)?,
            size_of_image: cur.u32(WHAT)?,
            size_of_headers: cur.u32(WHAT)?,
            checksum: cur.u32(WHAT)?,
            subsystem: Subsystem::from(cur.u16(WHAT)?),
            dll_characteristics: DllCharacteristics::from_bits_retain(cur.u16(WHAT)?),
            size_of_stack_reserve: cur.u64(WHAT)?,
            size_of_stack_commit: cur.u64(WHAT)?,
            size_of_heap_reserve: cur.u64(WHAT)?,
            size_of_heap_commit: cur.u64(WHAT)?,
            loader_flags: cur.u32(WHAT)?,
            number_of_rva_and_sizes: cur.u32(WHAT)?,
            data_directories: Vec::new(),
        };
        header.data_directories =
            DataDirectory::decode_table(cur, header.number_of_rva_and_sizes as usize)?;
        Ok(header)
    }
}

/// The decoded optional header. ROM images and unknown magics never produce
/// a value of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OptionalHeader {
    Pe32(OptionalHeader32),
    Pe64(OptionalHeader64),
}

impl OptionalHeader {
    /// Reads the magic and decodes the matching layout, including the data
    /// directory table.
    pub fn decode(cur: &mut Cursor<'_>) -> Result<Self> {
        let offset = cur.offset();
        let magic = cur.u16("optional header magic incomplete")?;
        match magic {
            PE32_MAGIC => Ok(OptionalHeader::Pe32(OptionalHeader32::decode_body(cur)?)),
            PE32_PLUS_MAGIC => Ok(OptionalHeader::Pe64(OptionalHeader64::decode_body(cur)?)),
            ROM_MAGIC => Err(Error::UnsupportedFormat {
                message: "ROM images are not supported",
                offset,
            }),
            magic => Err(Error::UnknownFormat { magic, offset }),
        }
    }

    pub fn magic(&self) -> u16 {
        match self {
            OptionalHeader::Pe32(_) => PE32_MAGIC,
            OptionalHeader::Pe64(_) => PE32_PLUS_MAGIC,
        }
    }

    pub fn as_pe32(&self) -> Option<&OptionalHeader32> {
        match self {
            OptionalHeader::Pe32(header) => Some(header),
            OptionalHeader::Pe64(_) => None,
        }
    }

    pub fn as_pe64(&self) -> Option<&OptionalHeader64> {
        match self {
            OptionalHeader::Pe64(header) => Some(header),
            OptionalHeader::Pe32(_) => None,
        }
    }

    /// Bytes occupied on disk: magic, fixed fields and directory table.
    pub fn size_on_disk(&self) -> usize {
        let body = match self {
            OptionalHeader::Pe32(_) => PE32_BODY_SIZE,
            OptionalHeader::Pe64(_) => PE32_PLUS_BODY_SIZE,
        };
        2 + body + self.data_directories().len() * crate::directory::DATA_DIRECTORY_SIZE
    }

    fn inner(&self) -> &dyn Header {
        match self {
            OptionalHeader::Pe32(header) => header,
            OptionalHeader::Pe64(header) => header,
        }
    }
}

macro_rules! impl_header {
    ($typ:ty, $is_64:expr, $name:literal) => {
        impl Header for $typ {
            fn entry_point(&self) -> u32 {
                self.address_of_entry_point
            }

            fn image_base(&self) -> u64 {
                self.image_base as u64
            }

            fn is_64(&self) -> bool {
                $is_64
            }

            fn format_name(&self) -> &'static str {
                $name
            }

            fn linker_version(&self) -> (u8, u8) {
                (self.major_linker_version, self.minor_linker_version)
            }

            fn section_alignment(&self) -> u32 {
                self.section_alignment
            }

            fn file_alignment(&self) -> u32 {
                self.file_alignment
            }

            fn size_of_image(&self) -> u32 {
                self.size_of_image
            }

            fn size_of_headers(&self) -> u32 {
                self.size_of_headers
            }

            fn checksum(&self) -> u32 {
                self.checksum
            }

            fn subsystem(&self) -> Subsystem {
                self.subsystem
            }

            fn dll_characteristics(&self) -> DllCharacteristics {
                self.dll_characteristics
            }

            fn size_of_stack_reserve(&self) -> u64 {
                self.size_of_stack_reserve as u64
            }

            fn size_of_stack_commit(&self) -> u64 {
                self.size_of_stack_commit as u64
            }

            fn size_of_heap_reserve(&self) -> u64 {
                self.size_of_heap_reserve as u64
            }

            fn size_of_heap_commit(&self) -> u64 {
                self.size_of_heap_commit as u64
            }

            fn data_directories(&self) -> &[DataDirectory] {
                &self.data_directories
            }
        }
    };
}

impl_header!(OptionalHeader32, false, "PE32");
impl_header!(OptionalHeader64, true, "PE32+");

impl Header for OptionalHeader {
    fn entry_point(&self) -> u32 {
        self.inner().entry_point()
    }

    fn image_base(&self) -> u64 {
        self.inner().image_base()
    }

    fn is_64(&self) -> bool {
        matches!(self, OptionalHeader::Pe64(_))
    }

    fn format_name(&self) -> &'static str {
        self.inner().format_name()
    }

    fn linker_version(&self) -> (u8, u8) {
        self.inner().linker_version()
    }

    fn section_alignment(&self) -> u32 {
        self.inner().section_alignment()
    }

    fn file_alignment(&self) -> u32 {
        self.inner().file_alignment()
    }

    fn size_of_image(&self) -> u32 {
        self.inner().size_of_image()
    }

    fn size_of_headers(&self) -> u32 {
        self.inner().size_of_headers()
    }

    fn checksum(&self) -> u32 {
        self.inner().checksum()
    }

    fn subsystem(&self) -> Subsystem {
        self.inner().subsystem()
    }

    fn dll_characteristics(&self) -> DllCharacteristics {
        self.inner().dll_characteristics()
    }

    fn size_of_stack_reserve(&self) -> u64 {
        self.inner().size_of_stack_reserve()
    }

    fn size_of_stack_commit(&self) -> u64 {
        self.inner().size_of_stack_commit()
    }

    fn size_of_heap_reserve(&self) -> u64 {
        self.inner().size_of_heap_reserve()
    }

    fn size_of_heap_commit(&self) -> u64 {
        self.inner().size_of_heap_commit()
    }

    fn data_directories(&self) -> &[DataDirectory] {
        self.inner().data_directories()
    }
}
