//! The element directory: fixed-size records, back-to-back, no padding.
//!
//! Record layout (152 bytes, little-endian):
//! name `[u8; 128]` (UTF-8, NUL-padded) · created `u64` · modified `u64`
//! (unix seconds) · flags `u32` (bit 0 = deflate-compressed, remaining bits
//! opaque and preserved) · data head page `u32`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

use crate::error::{ChestError, Result};

pub const NAME_FIELD_LEN: usize = 128;
pub const RECORD_SIZE: usize = NAME_FIELD_LEN + 8 + 8 + 4 + 4;

/// Compressed-payload bit in the entry flag word.
pub const FLAG_COMPRESSED: u32 = 1;

/// One catalog record. `flags` bits beyond [`FLAG_COMPRESSED`] are vendor
/// territory and travel through unmodified.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub name: String,
    pub created: u64,
    pub modified: u64,
    pub flags: u32,
    /// Head page of the element's data chain, or `NO_PAGE` when the payload
    /// is empty.
    pub data_head: u32,
}

impl CatalogEntry {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    fn decode(record: &[u8]) -> Result<Self> {
        debug_assert_eq!(record.len(), RECORD_SIZE);
        let name_field = &record[..NAME_FIELD_LEN];
        let name_len = name_field.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_LEN);
        if name_field[name_len..].iter().any(|&b| b != 0) {
            return Err(ChestError::CorruptCatalog(
                "name field has bytes after the NUL terminator".into(),
            ));
        }
        let name = std::str::from_utf8(&name_field[..name_len])
            .map_err(|e| ChestError::CorruptCatalog(format!("name is not UTF-8: {e}")))?
            .to_owned();

        let mut rdr = Cursor::new(&record[NAME_FIELD_LEN..]);
        Ok(Self {
            name,
            created: rdr.read_u64::<LittleEndian>()?,
            modified: rdr.read_u64::<LittleEndian>()?,
            flags: rdr.read_u32::<LittleEndian>()?,
            data_head: rdr.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, mut writer: W) -> Result<()> {
        let name_bytes = self.name.as_bytes();
        if name_bytes.len() >= NAME_FIELD_LEN {
            return Err(ChestError::CorruptCatalog(format!(
                "element name {:?} exceeds {} bytes",
                self.name,
                NAME_FIELD_LEN - 1
            )));
        }
        let mut name_field = [0u8; NAME_FIELD_LEN];
        name_field[..name_bytes.len()].copy_from_slice(name_bytes);
        writer.write_all(&name_field)?;
        writer.write_u64::<LittleEndian>(self.created)?;
        writer.write_u64::<LittleEndian>(self.modified)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.data_head)?;
        Ok(())
    }
}

/// The decoded element directory, in on-disk (insertion) order.
#[derive(Debug, Default)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// There is no record-count field: the entry count is implicit in the
    /// chain's byte length. Trailing bytes shorter than one record are
    /// corruption, not slack.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(ChestError::CorruptCatalog(format!(
                "catalog length {} is not a multiple of the {RECORD_SIZE}-byte record size",
                bytes.len()
            )));
        }
        let entries = bytes
            .chunks_exact(RECORD_SIZE)
            .map(CatalogEntry::decode)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.entries.len() * RECORD_SIZE);
        for entry in &self.entries {
            entry.encode(&mut out)?;
        }
        Ok(out)
    }

    /// Deterministic on-disk names for materialization.
    ///
    /// The format does not enforce name uniqueness; the first occurrence of a
    /// name keeps it, and later occurrences become `name.k` for the smallest
    /// k ≥ 1 whose candidate is not already assigned — so a synthesized
    /// suffix can never shadow (or be shadowed by) a literal entry name.
    /// Order is the catalog's record order, so re-runs produce identical
    /// trees and no entry ever overwrites another.
    pub fn disambiguated(&self) -> Vec<(String, &CatalogEntry)> {
        let mut taken: std::collections::HashSet<String> = std::collections::HashSet::new();
        self.entries
            .iter()
            .map(|entry| {
                let mut disk_name = entry.name.clone();
                let mut k = 1usize;
                while taken.contains(&disk_name) {
                    disk_name = format!("{}.{}", entry.name, k);
                    k += 1;
                }
                taken.insert(disk_name.clone());
                (disk_name, entry)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::NO_PAGE;

    fn entry(name: &str, head: u32) -> CatalogEntry {
        CatalogEntry { name: name.into(), created: 10, modified: 20, flags: 0, data_head: head }
    }

    #[test]
    fn record_round_trip() {
        let catalog = Catalog {
            entries: vec![entry("module", 3), entry("meta", NO_PAGE)],
        };
        let bytes = catalog.encode().unwrap();
        assert_eq!(bytes.len(), 2 * RECORD_SIZE);

        let decoded = Catalog::decode(&bytes).unwrap();
        assert_eq!(decoded.entries.len(), 2);
        assert_eq!(decoded.entries[0].name, "module");
        assert_eq!(decoded.entries[0].data_head, 3);
        assert_eq!(decoded.entries[1].data_head, NO_PAGE);
    }

    #[test]
    fn trailing_partial_record_is_corrupt() {
        let mut bytes = Catalog { entries: vec![entry("a", 1)] }.encode().unwrap();
        bytes.truncate(RECORD_SIZE - 1);
        assert!(matches!(Catalog::decode(&bytes), Err(ChestError::CorruptCatalog(_))));
    }

    #[test]
    fn duplicate_names_get_numeric_suffixes() {
        let catalog = Catalog {
            entries: vec![entry("form", 1), entry("form", 2), entry("form", 3)],
        };
        let names: Vec<String> =
            catalog.disambiguated().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["form", "form.1", "form.2"]);
    }

    #[test]
    fn suffix_never_shadows_a_literal_name() {
        // A real entry named "same.1" must not collide with the synthesized
        // suffix for the duplicate "same".
        let catalog = Catalog {
            entries: vec![entry("same", 1), entry("same", 2), entry("same.1", 3)],
        };
        let names: Vec<String> =
            catalog.disambiguated().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["same", "same.1", "same.1.1"]);

        // Literal first, duplicates after: every entry still gets its own path.
        let catalog = Catalog {
            entries: vec![entry("same.1", 1), entry("same", 2), entry("same", 3)],
        };
        let names: Vec<String> =
            catalog.disambiguated().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["same.1", "same", "same.2"]);
    }

    #[test]
    fn overlong_name_rejected_on_encode() {
        let catalog = Catalog { entries: vec![entry(&"x".repeat(200), 1)] };
        assert!(matches!(catalog.encode(), Err(ChestError::CorruptCatalog(_))));
    }
}
