use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{ChestError, Result};

pub const MAGIC: &[u8; 4] = b"CHST";
pub const VERSION: u32 = 1;

/// "No page": empty chain head, chain terminator, empty catalog root.
pub const NO_PAGE: u32 = 0x7fff_ffff;

/// On-disk size of the header. The remainder of page 0 is zero padding.
pub const HEADER_SIZE: usize = 24;

/// Smallest page size the format allows. Must hold the header plus a
/// page header's worth of slack, and keeps the power-of-two check honest.
pub const MIN_PAGE_SIZE: u32 = 64;

pub const DEFAULT_PAGE_SIZE: u32 = 512;

/// The container file header, stored at offset 0 inside reserved page 0.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub page_size: u32,
    pub page_count: u32,
    /// Head page of the catalog chain, or [`NO_PAGE`] for an empty container.
    pub root_page: u32,
}

impl FileHeader {
    pub fn new(page_size: u32, page_count: u32, root_page: u32) -> Self {
        Self { page_size, page_count, root_page }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(VERSION)?;
        writer.write_u32::<LittleEndian>(self.page_size)?;
        writer.write_u32::<LittleEndian>(self.page_count)?;
        writer.write_u32::<LittleEndian>(self.root_page)?;
        writer.write_u32::<LittleEndian>(0)?; // reserved
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ChestError::NotAContainer("invalid magic number".into()));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(ChestError::NotAContainer(format!(
                "unsupported format version {version}"
            )));
        }
        let page_size = reader.read_u32::<LittleEndian>()?;
        let page_count = reader.read_u32::<LittleEndian>()?;
        let root_page = reader.read_u32::<LittleEndian>()?;
        let _reserved = reader.read_u32::<LittleEndian>()?;

        let header = Self { page_size, page_count, root_page };
        header.validate()?;
        Ok(header)
    }

    /// Structural invariants: page size is a power of two within bounds,
    /// the root pointer is NO_PAGE or a valid data-page index.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE || !self.page_size.is_power_of_two() {
            return Err(ChestError::NotAContainer(format!(
                "page size {} is not a power of two >= {MIN_PAGE_SIZE}",
                self.page_size
            )));
        }
        if self.root_page != NO_PAGE && (self.root_page == 0 || self.root_page >= self.page_count)
        {
            return Err(ChestError::OutOfRange {
                page: self.root_page,
                count: self.page_count,
            });
        }
        Ok(())
    }
}

/// Signature sniff: does `bytes` begin with a plausible container header?
///
/// Used to decide whether an element payload is itself a nested container.
/// Deliberately cheap — full validation happens when the payload is opened.
pub fn is_container(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE {
        return false;
    }
    FileHeader::read(bytes).is_ok()
}
