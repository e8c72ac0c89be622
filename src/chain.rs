//! Singly-linked page chains.
//!
//! One logical byte stream (the catalog, or one element's payload) occupies a
//! chain of pages, each beginning with an 8-byte [`PageHeader`] that names the
//! next page and the payload bytes used in this one. Chains are walked by
//! index, never by pointer, so cycle detection is a bounded visited set.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::{BTreeSet, HashSet};
use std::io;

use crate::error::{ChestError, Result};
use crate::header::{FileHeader, NO_PAGE};
use crate::store::{BlockStore, MemStore};

pub const PAGE_HEADER_SIZE: usize = 8;

/// Embedded at the start of every data page.
#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    /// Next page in the chain, or [`NO_PAGE`] on the last page.
    pub next: u32,
    /// Payload bytes used in this page. Only the last page may be partial.
    pub used: u32,
}

impl PageHeader {
    pub fn write<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.next)?;
        writer.write_u32::<LittleEndian>(self.used)?;
        Ok(())
    }

    pub fn read<R: io::Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            next: reader.read_u32::<LittleEndian>()?,
            used: reader.read_u32::<LittleEndian>()?,
        })
    }
}

// ── ChainReader ──────────────────────────────────────────────────────────────

/// Walks one chain page by page, yielding each page's used payload bytes.
///
/// The traversal is finite by construction: a page revisited within the same
/// walk, or a pointer outside the container, fails with `CorruptChain` instead
/// of looping. Re-opening re-walks from the head.
pub struct ChainReader<'a, S: BlockStore> {
    store: &'a mut S,
    next: u32,
    visited: HashSet<u32>,
}

impl<'a, S: BlockStore> ChainReader<'a, S> {
    /// `head == NO_PAGE` yields the empty stream.
    pub fn open(store: &'a mut S, head: u32) -> Self {
        Self { store, next: head, visited: HashSet::new() }
    }

    /// Collect the whole chain into one buffer.
    pub fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk()? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Number of pages in the chain (walks it).
    pub fn count_pages(mut self) -> Result<usize> {
        let mut n = 0;
        while self.next_chunk()?.is_some() {
            n += 1;
        }
        Ok(n)
    }

    /// Advance one page; `Ok(None)` at the terminator.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.next == NO_PAGE {
            return Ok(None);
        }
        let index = self.next;
        if index == 0 || index >= self.store.page_count() {
            return Err(ChestError::CorruptChain(format!(
                "next-page pointer {index} out of range (container has {} pages)",
                self.store.page_count()
            )));
        }
        if !self.visited.insert(index) {
            return Err(ChestError::CorruptChain(format!(
                "cycle detected: page {index} visited twice in one chain"
            )));
        }

        let page = self.store.read_page(index)?;
        let header = PageHeader::read(&page[..PAGE_HEADER_SIZE])?;
        let capacity = self.store.page_capacity();
        if header.used > capacity {
            return Err(ChestError::CorruptChain(format!(
                "page {index} claims {} used bytes, capacity is {capacity}",
                header.used
            )));
        }
        let start = PAGE_HEADER_SIZE;
        let end = start + header.used as usize;
        self.next = header.next;
        Ok(Some(page[start..end].to_vec()))
    }

    /// Page indices this walk has consumed so far.
    pub fn visited(&self) -> &HashSet<u32> {
        &self.visited
    }
}

/// Convenience: collect the chain at `head` into one buffer.
pub fn read_chain<S: BlockStore>(store: &mut S, head: u32) -> Result<Vec<u8>> {
    ChainReader::open(store, head).read_to_end()
}

// ── PageAllocator ────────────────────────────────────────────────────────────

/// Explicit page-number state threaded through a pack operation.
///
/// Claims recomputed free pages first (lowest index first), then grows
/// monotonically. Never hands out the same page twice within a session.
#[derive(Debug)]
pub struct PageAllocator {
    free: BTreeSet<u32>,
    next: u32,
}

impl PageAllocator {
    /// Fresh allocator growing from `next` (page 1 for a new container).
    pub fn new(next: u32) -> Self {
        Self { free: BTreeSet::new(), next }
    }

    /// Allocator seeded with a recomputed free set; `next` must be past every
    /// live page.
    pub fn with_free_set(free: BTreeSet<u32>, next: u32) -> Self {
        Self { free, next }
    }

    pub fn claim(&mut self) -> u32 {
        if let Some(&page) = self.free.iter().next() {
            self.free.remove(&page);
            return page;
        }
        let page = self.next;
        self.next += 1;
        page
    }
}

// ── ChainWriter ──────────────────────────────────────────────────────────────

/// Split `bytes` into capacity-sized pieces, claim a page per piece, link
/// them, and return the head page index (`NO_PAGE` for empty input).
pub fn write_chain(store: &mut MemStore, alloc: &mut PageAllocator, bytes: &[u8]) -> Result<u32> {
    if bytes.is_empty() {
        return Ok(NO_PAGE);
    }
    let capacity = store.page_capacity() as usize;
    let pages: Vec<u32> = bytes.chunks(capacity).map(|_| alloc.claim()).collect();

    for (i, chunk) in bytes.chunks(capacity).enumerate() {
        let next = pages.get(i + 1).copied().unwrap_or(NO_PAGE);
        let mut page = vec![0u8; store.page_size() as usize];
        PageHeader { next, used: chunk.len() as u32 }.write(&mut page[..PAGE_HEADER_SIZE])?;
        page[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + chunk.len()].copy_from_slice(chunk);
        store.write_page(pages[i], &page)?;
    }
    Ok(pages[0])
}

// ── FreePageSet ──────────────────────────────────────────────────────────────

/// Recompute the set of data pages owned by no chain.
///
/// Live pages are the catalog chain plus every entry's data chain; the free
/// set is their complement within `[1, page_count)`. A page claimed by two
/// chains is a `CorruptChain` error (chains never share pages).
pub fn free_page_set<S: BlockStore>(store: &mut S, header: &FileHeader) -> Result<BTreeSet<u32>> {
    let mut live: HashSet<u32> = HashSet::new();

    let mut claim_chain = |store: &mut S, head: u32, live: &mut HashSet<u32>| -> Result<()> {
        let mut reader = ChainReader::open(store, head);
        while reader.next_chunk()?.is_some() {}
        for &page in reader.visited() {
            if !live.insert(page) {
                return Err(ChestError::CorruptChain(format!(
                    "page {page} claimed by two chains"
                )));
            }
        }
        Ok(())
    };

    claim_chain(store, header.root_page, &mut live)?;

    let catalog_bytes = read_chain(store, header.root_page)?;
    let catalog = crate::catalog::Catalog::decode(&catalog_bytes)?;
    for entry in &catalog.entries {
        claim_chain(store, entry.data_head, &mut live)?;
    }

    Ok((1..header.page_count).filter(|p| !live.contains(p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::DEFAULT_PAGE_SIZE;

    #[test]
    fn allocator_never_repeats_within_session() {
        let free: BTreeSet<u32> = [3, 5].into_iter().collect();
        let mut alloc = PageAllocator::with_free_set(free, 7);
        let claimed: Vec<u32> = (0..5).map(|_| alloc.claim()).collect();
        assert_eq!(claimed, vec![3, 5, 7, 8, 9]);
    }

    #[test]
    fn empty_chain_round_trip() {
        let mut store = MemStore::new(DEFAULT_PAGE_SIZE);
        let mut alloc = PageAllocator::new(1);
        let head = write_chain(&mut store, &mut alloc, b"").unwrap();
        assert_eq!(head, NO_PAGE);
        assert_eq!(read_chain(&mut store, head).unwrap(), b"");
    }

    #[test]
    fn multi_page_chain_round_trip() {
        let mut store = MemStore::new(DEFAULT_PAGE_SIZE);
        let mut alloc = PageAllocator::new(1);
        let data: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();
        let head = write_chain(&mut store, &mut alloc, &data).unwrap();
        assert_eq!(head, 1);
        assert_eq!(ChainReader::open(&mut store, head).count_pages().unwrap(), 3);
        assert_eq!(read_chain(&mut store, head).unwrap(), data);
    }
}
