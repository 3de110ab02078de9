use std::path::Path;

use serde::Serialize;

use crate::cursor::Cursor;
use crate::directory::{DataDirectory, DirectoryKind};
use crate::error::{Error, Result};
use crate::header::coff::CoffHeader;
use crate::header::dos::{DosHeader, DOS_HEADER_SIZE, E_LFANEW_OFFSET};
use crate::header::optional::OptionalHeader;
use crate::header::Header;
use crate::sections::Section;

/// A fully decoded PE image.
///
/// Built only by [`Image::from_bytes`] or [`Image::from_file`]; either every
/// stage succeeds or no image exists. There is no way to mutate one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    #[serde(skip)]
    data: Vec<u8>,
    dos_header: DosHeader,
    #[serde(skip)]
    stub: Vec<u8>,
    coff_header: CoffHeader,
    optional_header: OptionalHeader,
    sections: Vec<Section>,
}

impl Image {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Read {} bytes from {}", data.len(), path.display());
        Self::from_bytes(data)
    }

    pub fn from_bytes<B: Into<Vec<u8>>>(bytes: B) -> Result<Self> {
        let data: Vec<u8> = bytes.into();
        let mut cur = Cursor::new(&data);

        let dos_header = DosHeader::decode(&mut cur)?;
        log::debug!("DOS header ok, e_lfanew = {:#x}", dos_header.e_lfanew);

        let lfanew = dos_header.e_lfanew as usize;
        if lfanew < DOS_HEADER_SIZE {
            return Err(Error::InvalidHeaderOffset {
                value: dos_header.e_lfanew,
                offset: E_LFANEW_OFFSET,
            });
        }
        let stub = cur
            .bytes(lfanew - DOS_HEADER_SIZE, "DOS stub incomplete")?
            .to_vec();

        let coff_header = CoffHeader::decode(&mut cur)?;
        log::debug!(
            "COFF header ok: machine {}, {} sections",
            coff_header.machine,
            coff_header.number_of_sections
        );

        let optional_start = cur.offset();
        let optional_header = OptionalHeader::decode(&mut cur)?;
        log::debug!(
            "{} optional header ok, {} data directories",
            optional_header.format_name(),
            optional_header.data_directories().len()
        );

        let declared_end = optional_start + coff_header.size_of_optional_header as usize;
        if declared_end > cur.offset() {
            log::debug!(
                "skipping {} bytes of optional header padding",
                declared_end - cur.offset()
            );
            cur.skip_to(declared_end, "section headers incomplete")?;
        } else if declared_end < cur.offset() {
            log::warn!(
                "size_of_optional_header ({}) is smaller than the decoded header ({} bytes)",
                coff_header.size_of_optional_header,
                cur.offset() - optional_start
            );
        }

        let sections = Section::decode_table(
            &mut cur,
            coff_header.number_of_sections as usize,
            &data,
        )?;
        log::info!(
            "Decoded {} image with {} sections",
            optional_header.format_name(),
            sections.len()
        );

        Ok(Self {
            data,
            dos_header,
            stub,
            coff_header,
            optional_header,
            sections,
        })
    }

    pub fn dos_header(&self) -> &DosHeader {
        &self.dos_header
    }

    /// Bytes between the DOS header and `e_lfanew`, uninterpreted.
    pub fn stub(&self) -> &[u8] {
        &self.stub
    }

    pub fn coff_header(&self) -> &CoffHeader {
        &self.coff_header
    }

    pub fn optional_header(&self) -> &OptionalHeader {
        &self.optional_header
    }

    pub fn data_directories(&self) -> &[DataDirectory] {
        self.optional_header.data_directories()
    }

    /// The entry for a well-known directory, if the table is long enough.
    pub fn directory(&self, kind: DirectoryKind) -> Option<&DataDirectory> {
        self.data_directories().get(kind.index())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// First section with the given (trimmed) name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name() == name)
    }

    pub fn is_64(&self) -> bool {
        self.optional_header.is_64()
    }

    pub fn is_dll(&self) -> bool {
        self.coff_header.is_dll()
    }

    pub fn entry_point(&self) -> u32 {
        self.optional_header.entry_point()
    }

    pub fn image_base(&self) -> u64 {
        self.optional_header.image_base()
    }

    /// Length of the original buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The buffer the image was decoded from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Serializes the image back to disk form. Decoding is lossless, so this
    /// is the original input byte for byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }
}
