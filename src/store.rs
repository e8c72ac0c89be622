//! Whole-page access to a container image.
//!
//! All reads and writes above this layer are whole pages addressed by index;
//! no partial-page I/O is exposed, which keeps alignment out of the chain and
//! catalog code entirely.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{ChestError, Result};
use crate::header::{FileHeader, HEADER_SIZE};

/// Read-side page access. Page 0 is reserved for the file header; data pages
/// are numbered from 1.
pub trait BlockStore {
    fn page_size(&self) -> u32;
    fn page_count(&self) -> u32;

    /// Returns the full `page_size` bytes of page `index`.
    /// Fails with [`ChestError::OutOfRange`] if `index >= page_count()`.
    fn read_page(&mut self, index: u32) -> Result<Vec<u8>>;

    /// Usable payload bytes per page, after the 8-byte page header.
    fn page_capacity(&self) -> u32 {
        self.page_size() - crate::chain::PAGE_HEADER_SIZE as u32
    }
}

// ── FileStore ────────────────────────────────────────────────────────────────

/// Read-only view of an existing container behind any `Read + Seek` source
/// (a `BufReader<File>` for the root container, a `Cursor` in tests).
pub struct FileStore<R: Read + Seek> {
    source: R,
    header: FileHeader,
}

impl<R: Read + Seek> FileStore<R> {
    /// Parse and validate the header, leaving the source positioned
    /// arbitrarily (every page read seeks absolutely).
    pub fn open(mut source: R) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let mut head_buf = [0u8; HEADER_SIZE];
        source.read_exact(&mut head_buf)?;
        let header = FileHeader::read(&head_buf[..])?;
        Ok(Self { source, header })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }
}

impl<R: Read + Seek> BlockStore for FileStore<R> {
    fn page_size(&self) -> u32 {
        self.header.page_size
    }

    fn page_count(&self) -> u32 {
        self.header.page_count
    }

    fn read_page(&mut self, index: u32) -> Result<Vec<u8>> {
        if index >= self.header.page_count {
            return Err(ChestError::OutOfRange { page: index, count: self.header.page_count });
        }
        let offset = u64::from(index) * u64::from(self.header.page_size);
        self.source.seek(SeekFrom::Start(offset))?;
        let mut page = vec![0u8; self.header.page_size as usize];
        self.source.read_exact(&mut page)?;
        Ok(page)
    }
}

// ── MemStore ─────────────────────────────────────────────────────────────────

/// In-memory container image.
///
/// The packer builds into a fresh `MemStore` and never reads pages back from
/// it; the unpacker wraps a nested element's decoded payload in one to recurse
/// without touching disk.
pub struct MemStore {
    page_size: u32,
    buf: Vec<u8>,
}

impl MemStore {
    /// Empty image with page 0 reserved (zeroed) for the header.
    pub fn new(page_size: u32) -> Self {
        Self { page_size, buf: vec![0u8; page_size as usize] }
    }

    /// Wrap an existing container image (e.g. a decoded nested payload).
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(ChestError::NotAContainer("container image too short".into()));
        }
        let header = FileHeader::read(&buf[..HEADER_SIZE])?;
        Ok(Self { page_size: header.page_size, buf })
    }

    pub fn header(&self) -> Result<FileHeader> {
        FileHeader::read(&self.buf[..HEADER_SIZE])
    }

    /// Write a full page, growing the image when `index` is past the current
    /// extent. Grown gap pages are zeroed.
    pub fn write_page(&mut self, index: u32, page: &[u8]) -> Result<()> {
        assert_eq!(page.len(), self.page_size as usize, "whole-page writes only");
        let start = index as usize * self.page_size as usize;
        let end = start + self.page_size as usize;
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[start..end].copy_from_slice(page);
        Ok(())
    }

    /// The single commit point: stamp the header into reserved page 0.
    pub fn write_header(&mut self, header: &FileHeader) -> Result<()> {
        let mut head_buf = Vec::with_capacity(HEADER_SIZE);
        header.write(&mut head_buf)?;
        self.buf[..HEADER_SIZE].copy_from_slice(&head_buf);
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl BlockStore for MemStore {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn page_count(&self) -> u32 {
        (self.buf.len() / self.page_size as usize) as u32
    }

    fn read_page(&mut self, index: u32) -> Result<Vec<u8>> {
        let count = self.page_count();
        if index >= count {
            return Err(ChestError::OutOfRange { page: index, count });
        }
        let start = index as usize * self.page_size as usize;
        Ok(self.buf[start..start + self.page_size as usize].to_vec())
    }
}
