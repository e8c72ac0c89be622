//! Recursive unpacker and packer — the orchestration layer.
//!
//! Unpack: header → catalog → per entry: data chain → payload decode → file
//! on disk, recursing when a payload carries the container signature.
//! Pack is the mirror: directory tree walked bottom-up, subdirectories packed
//! to bytes in memory first, chains allocated from a fresh store, the header
//! written last. The on-disk destination is committed by temp-file + rename,
//! so a failed pack leaves nothing behind.

use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::Utc;
use tracing::debug;

use crate::catalog::{Catalog, CatalogEntry, FLAG_COMPRESSED};
use crate::chain::{read_chain, write_chain, PageAllocator};
use crate::codec::Payload;
use crate::error::{ChestError, Result};
use crate::header::{is_container, FileHeader, DEFAULT_PAGE_SIZE, NO_PAGE};
use crate::store::{BlockStore, FileStore, MemStore};

/// Knobs for [`unpack_container`].
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Container nesting levels to descend. The root is level 0; a payload
    /// sitting at `max_depth` is written opaque instead of recursed into.
    pub max_depth: usize,
    /// Turn the depth guard into a hard [`ChestError::DepthLimitExceeded`]
    /// instead of opaque materialization.
    pub strict_depth: bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self { max_depth: 64, strict_depth: false }
    }
}

// ── Unpack ───────────────────────────────────────────────────────────────────

/// Unpack `src` into the directory `dest`, recursing into nested containers.
///
/// Extraction is best-effort, not atomic: a failure partway leaves the files
/// already written. Re-running over the same destination overwrites and
/// yields identical contents (a stale file is replaced by a directory and
/// vice versa).
pub fn unpack_container(src: &Path, dest: &Path, opts: &UnpackOptions) -> Result<()> {
    let file = fs::File::open(src)?;
    let mut store = FileStore::open(BufReader::new(file))?;
    let header = store.header().clone();
    debug!(src = %src.display(), page_size = header.page_size, pages = header.page_count,
           "opened container");
    unpack_store(&mut store, &header, dest, 0, opts)
}

fn unpack_store<S: BlockStore>(
    store: &mut S,
    header: &FileHeader,
    dest: &Path,
    depth: usize,
    opts: &UnpackOptions,
) -> Result<()> {
    fs::create_dir_all(dest)?;
    if header.root_page == NO_PAGE {
        return Ok(()); // empty container, empty directory
    }

    let catalog = Catalog::decode(&read_chain(store, header.root_page)?)?;
    debug!(entries = catalog.entries.len(), depth, "decoded catalog");

    for (disk_name, entry) in catalog.disambiguated() {
        let raw = read_chain(store, entry.data_head)?;
        let data = Payload::from_parts(raw, entry.is_compressed()).decode()?;
        let path = dest.join(&disk_name);

        if is_container(&data) {
            if depth + 1 >= opts.max_depth {
                if opts.strict_depth {
                    return Err(ChestError::DepthLimitExceeded(opts.max_depth));
                }
                debug!(name = %disk_name, depth, "depth limit hit, keeping payload opaque");
                write_element_file(&path, &data)?;
                continue;
            }
            if path.is_file() {
                fs::remove_file(&path)?;
            }
            let mut nested = MemStore::from_bytes(data)?;
            let nested_header = nested.header()?;
            unpack_store(&mut nested, &nested_header, &path, depth + 1, opts)?;
        } else {
            write_element_file(&path, &data)?;
        }
    }
    Ok(())
}

fn write_element_file(path: &Path, data: &[u8]) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    }
    fs::write(path, data)?;
    Ok(())
}

// ── Pack ─────────────────────────────────────────────────────────────────────

/// Pack the directory tree at `src_dir` into a container file at `dest`.
///
/// The image is built fully in memory, persisted to a sibling temporary file
/// and renamed into place; on any failure the destination is untouched.
pub fn pack_container(src_dir: &Path, dest: &Path) -> Result<()> {
    let image = pack_directory(src_dir)?;

    let tmp = temp_sibling(dest);
    if let Err(e) = fs::write(&tmp, &image).and_then(|_| fs::rename(&tmp, dest)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    debug!(dest = %dest.display(), bytes = image.len(), "container committed");
    Ok(())
}

/// Recursively pack a directory into container-image bytes.
///
/// Entries are processed in file-name order so the catalog — and therefore
/// the whole image — is deterministic for a given tree. Subdirectories are
/// packed first (bottom-up) and become nested-container payloads.
pub fn pack_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut store = MemStore::new(DEFAULT_PAGE_SIZE);
    let mut alloc = PageAllocator::new(1);
    let mut catalog = Catalog::default();

    let mut dir_entries: Vec<fs::DirEntry> =
        fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    dir_entries.sort_by_key(|e| e.file_name());

    for dir_entry in dir_entries {
        let name = dir_entry.file_name().into_string().map_err(|raw| {
            ChestError::CorruptCatalog(format!("file name {raw:?} is not UTF-8"))
        })?;

        let data = if dir_entry.file_type()?.is_dir() {
            pack_directory(&dir_entry.path())?
        } else {
            fs::read(dir_entry.path())?
        };

        let (created, modified) = entry_timestamps(&dir_entry);
        let (raw, compressed) = Payload::encode(&data).into_parts();
        let data_head = write_chain(&mut store, &mut alloc, &raw)?;
        catalog.entries.push(CatalogEntry {
            name,
            created,
            modified,
            flags: if compressed { FLAG_COMPRESSED } else { 0 },
            data_head,
        });
    }

    let root_page = write_chain(&mut store, &mut alloc, &catalog.encode()?)?;
    let header = FileHeader::new(DEFAULT_PAGE_SIZE, store.page_count(), root_page);
    store.write_header(&header)?;
    Ok(store.into_bytes())
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

fn entry_timestamps(dir_entry: &fs::DirEntry) -> (u64, u64) {
    let now = Utc::now().timestamp().max(0) as u64;
    let secs = |t: std::time::SystemTime| {
        t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(now)
    };
    match dir_entry.metadata() {
        Ok(meta) => {
            let modified = meta.modified().map(secs).unwrap_or(now);
            let created = meta.created().map(secs).unwrap_or(modified);
            (created, modified)
        }
        Err(_) => (now, now),
    }
}
