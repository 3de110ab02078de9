use std::fmt;

use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::Result;

/// Size of one `(virtual_address, size)` entry.
pub const DATA_DIRECTORY_SIZE: usize = 8;

/// Well-known data directory slots, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DirectoryKind {
    Export,
    Import,
    Resource,
    Exception,
    Certificate,
    BaseRelocation,
    Debug,
    Architecture,
    GlobalPtr,
    Tls,
    LoadConfig,
    BoundImport,
    Iat,
    DelayImport,
}

impl DirectoryKind {
    /// Number of named slots. Entries past this index are positional only.
    pub const COUNT: usize = 14;

    pub const ALL: [DirectoryKind; DirectoryKind::COUNT] = [
        DirectoryKind::Export,
        DirectoryKind::Import,
        DirectoryKind::Resource,
        DirectoryKind::Exception,
        DirectoryKind::Certificate,
        DirectoryKind::BaseRelocation,
        DirectoryKind::Debug,
        DirectoryKind::Architecture,
        DirectoryKind::GlobalPtr,
        DirectoryKind::Tls,
        DirectoryKind::LoadConfig,
        DirectoryKind::BoundImport,
        DirectoryKind::Iat,
        DirectoryKind::DelayImport,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::str::FromStr for DirectoryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "export" | "exports" => Ok(DirectoryKind::Export),
            "import" | "imports" => Ok(DirectoryKind::Import),
            "resource" | "resources" | "rsrc" => Ok(DirectoryKind::Resource),
            "exception" | "pdata" => Ok(DirectoryKind::Exception),
            "certificate" | "security" => Ok(DirectoryKind::Certificate),
            "basereloc" | "base-relocation" | "reloc" => Ok(DirectoryKind::BaseRelocation),
            "debug" => Ok(DirectoryKind::Debug),
            "architecture" => Ok(DirectoryKind::Architecture),
            "globalptr" | "global-ptr" => Ok(DirectoryKind::GlobalPtr),
            "tls" => Ok(DirectoryKind::Tls),
            "loadconfig" | "load-config" => Ok(DirectoryKind::LoadConfig),
            "boundimport" | "bound-import" => Ok(DirectoryKind::BoundImport),
            "iat" => Ok(DirectoryKind::Iat),
            "delayimport" | "delay-import" => Ok(DirectoryKind::DelayImport),
            _ => Err(format!("Unknown data directory: {}", s)),
        }
    }
}

impl fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectoryKind::Export => "export",
            DirectoryKind::Import => "import",
            DirectoryKind::Resource => "resource",
            DirectoryKind::Exception => "exception",
            DirectoryKind::Certificate => "certificate",
            DirectoryKind::BaseRelocation => "basereloc",
            DirectoryKind::Debug => "debug",
            DirectoryKind::Architecture => "architecture",
            DirectoryKind::GlobalPtr => "globalptr",
            DirectoryKind::Tls => "tls",
            DirectoryKind::LoadConfig => "loadconfig",
            DirectoryKind::BoundImport => "boundimport",
            DirectoryKind::Iat => "iat",
            DirectoryKind::DelayImport => "delayimport",
        };
        write!(f, "{}", name)
    }
}

/// Name of a directory entry: a well-known slot or just its table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DirectoryName {
    Known(DirectoryKind),
    Raw(usize),
}

impl DirectoryName {
    pub fn for_index(index: usize) -> Self {
        match DirectoryKind::from_index(index) {
            Some(kind) => DirectoryName::Known(kind),
            None => DirectoryName::Raw(index),
        }
    }

    pub fn kind(self) -> Option<DirectoryKind> {
        match self {
            DirectoryName::Known(kind) => Some(kind),
            DirectoryName::Raw(_) => None,
        }
    }
}

impl fmt::Display for DirectoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryName::Known(kind) => write!(f, "{}", kind),
            DirectoryName::Raw(index) => write!(f, "#{}", index),
        }
    }
}

/// Location of an embedded table. The decoder never follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataDirectory {
    pub name: DirectoryName,
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 || self.size != 0
    }

    /// Decodes `count` consecutive entries after checking that the whole
    /// table fits in the remaining buffer.
    pub fn decode_table(cur: &mut Cursor<'_>, count: usize) -> Result<Vec<DataDirectory>> {
        const WHAT: &str = "data directories incomplete";

        cur.ensure_records(count, DATA_DIRECTORY_SIZE, WHAT)?;
        let mut table = Vec::with_capacity(count);
        for index in 0..count {
            table.push(DataDirectory {
                name: DirectoryName::for_index(index),
                virtual_address: cur.u32(WHAT)?,
                size: cur.u32(WHAT)?,
            });
        }
        Ok(table)
    }
}
