use std::fmt;

use bitflags::bitflags;
use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// `PE\0\0`, found at `e_lfanew`.
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";

/// Size of the COFF file header, not counting the signature.
pub const COFF_HEADER_SIZE: usize = 20;

/// Target machine of an image. Values without a variant are kept in
/// [`Machine::Unknown`] so nothing read from disk is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Machine {
    Any,
    I386,
    R4000,
    Arm,
    ArmThumb2,
    PowerPc,
    Ia64,
    Amd64,
    Arm64,
    RiscV32,
    RiscV64,
    LoongArch64,
    Unknown(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Machine::Any,
            0x014c => Machine::I386,
            0x0166 => Machine::R4000,
            0x01c0 => Machine::Arm,
            0x01c4 => Machine::ArmThumb2,
            0x01f0 => Machine::PowerPc,
            0x0200 => Machine::Ia64,
            0x8664 => Machine::Amd64,
            0xaa64 => Machine::Arm64,
            0x5032 => Machine::RiscV32,
            0x5064 => Machine::RiscV64,
            0x6264 => Machine::LoongArch64,
            other => Machine::Unknown(other),
        }
    }
}

impl From<Machine> for u16 {
    fn from(machine: Machine) -> Self {
        match machine {
            Machine::Any => 0x0000,
            Machine::I386 => 0x014c,
            Machine::R4000 => 0x0166,
            Machine::Arm => 0x01c0,
            Machine::ArmThumb2 => 0x01c4,
            Machine::PowerPc => 0x01f0,
            Machine::Ia64 => 0x0200,
            Machine::Amd64 => 0x8664,
            Machine::Arm64 => 0xaa64,
            Machine::RiscV32 => 0x5032,
            Machine::RiscV64 => 0x5064,
            Machine::LoongArch64 => 0x6264,
            Machine::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Machine::Any => "any",
            Machine::I386 => "i386",
            Machine::R4000 => "r4000",
            Machine::Arm => "arm",
            Machine::ArmThumb2 => "armnt",
            Machine::PowerPc => "powerpc",
            Machine::Ia64 => "ia64",
            Machine::Amd64 => "amd64",
            Machine::Arm64 => "arm64",
            Machine::RiscV32 => "riscv32",
            Machine::RiscV64 => "riscv64",
            Machine::LoongArch64 => "loongarch64",
            Machine::Unknown(raw) => return write!(f, "unknown({raw:#06x})"),
        };
        write!(f, "{}", name)
    }
}

bitflags! {
    /// `IMAGE_FILE_*` characteristics of the COFF header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct FileCharacteristics: u16 {
        const RELOCS_STRIPPED         = 0x0001;
        const EXECUTABLE_IMAGE        = 0x0002;
        const LINE_NUMS_STRIPPED      = 0x0004;
        const LOCAL_SYMS_STRIPPED     = 0x0008;
        const AGGRESSIVE_WS_TRIM      = 0x0010;
        const LARGE_ADDRESS_AWARE     = 0x0020;
        const BYTES_REVERSED_LO       = 0x0080;
        const MACHINE_32BIT           = 0x0100;
        const DEBUG_STRIPPED          = 0x0200;
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        const NET_RUN_FROM_SWAP       = 0x0800;
        const SYSTEM                  = 0x1000;
        const DLL                     = 0x2000;
        const UP_SYSTEM_ONLY          = 0x4000;
        const BYTES_REVERSED_HI       = 0x8000;
    }
}

/// The COFF file header that follows the `PE\0\0` signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoffHeader {
    pub machine: Machine,
    /// Number of entries in the section table.
    pub number_of_sections: u16,
    /// Low 32 bits of the link time, in seconds since the Unix epoch.
    pub time_date_stamp: u32,
    /// Deprecated for images; zero in modern binaries.
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    /// Size of the optional header including the data directory table.
    pub size_of_optional_header: u16,
    pub characteristics: FileCharacteristics,
}

impl CoffHeader {
    /// Verifies the `PE\0\0` signature at the cursor and decodes the header
    /// that follows it.
    pub fn decode(cur: &mut Cursor<'_>) -> Result<Self> {
        const WHAT: &str = "COFF header incomplete";

        let start = cur.offset();
        let signature = cur.array::<4>("PE signature incomplete")?;
        if signature != PE_SIGNATURE {
            return Err(Error::SignatureNotFound {
                format: "PE",
                offset: start,
            });
        }

        cur.ensure(COFF_HEADER_SIZE, WHAT)?;
        Ok(CoffHeader {
            machine: Machine::from(cur.u16(WHAT)?),
            number_of_sections: cur.u16(WHAT)?,
            time_date_stamp: cur.u32(WHAT)?,
            pointer_to_symbol_table: cur.u32(WHAT)?,
            number_of_symbols: cur.u32(WHAT)?,
            size_of_optional_header: cur.u16(WHAT)?,
            characteristics: FileCharacteristics::from_bits_retain(cur.u16(WHAT)?),
        })
    }

    pub fn is_dll(&self) -> bool {
        self.characteristics.contains(FileCharacteristics::DLL)
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics
            .contains(FileCharacteristics::EXECUTABLE_IMAGE)
    }
}
