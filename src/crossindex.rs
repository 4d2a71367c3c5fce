//! Range-compressed mappings between catalog numbering schemes.
//!
//! Catalogs such as HD have hundreds of thousands of entries whose numbers
//! are mostly contiguous relative to the canonical numbering, so a mapping
//! is stored as a set of `(start, shift, length)` runs rather than one entry
//! per star. Runs never overlap; a run maps `start..start + length` to
//! `start + shift..start + shift + length`.
//!
//! A [`CrossIndex`] maps in one direction only. [`CatalogCrossIndex`] keeps
//! an explicit forward (catalog to canonical) and reverse (canonical to
//! catalog) index for each supported catalog.
//!
//! Cross-index files start with the magic `CELINDEX` and a little-endian
//! `u16` version. Version `0x0100` holds `(u32 catalog, u32 canonical)`
//! pairs, version `0x0200` holds `(u32 start, i64 shift, u32 length)` runs.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use rkyv::{Archive, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::LoadError;

pub const CROSS_INDEX_MAGIC: &[u8; 8] = b"CELINDEX";
pub const CROSS_INDEX_VERSION_PAIRS: u16 = 0x0100;
pub const CROSS_INDEX_VERSION_RANGES: u16 = 0x0200;

const HEADER_SIZE: usize = 10;
const PAIR_RECORD_SIZE: usize = 8;
const RANGE_RECORD_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrossIndexError {
    #[error(
        "range {start}+{length} (shift {shift}) conflicts with range {existing_start}+{existing_length} (shift {existing_shift})"
    )]
    ConflictingRange {
        start: u32,
        length: u32,
        shift: i64,
        existing_start: u32,
        existing_length: u32,
        existing_shift: i64,
    },

    #[error("range {start}+{length} (shift {shift}) leaves the 32-bit catalog number space")]
    OutOfBounds { start: u32, length: u32, shift: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
struct IndexRange {
    shift: i64,
    length: u32,
}

impl IndexRange {
    fn end(&self, start: u32) -> u64 {
        start as u64 + self.length as u64
    }
}

/// One-directional range-compressed number mapping.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct CrossIndex {
    ranges: BTreeMap<u32, IndexRange>,
}

impl CrossIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs (not of mapped numbers).
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterate over the stored runs as `(start, shift, length)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, i64, u32)> + '_ {
        self.ranges.iter().map(|(&start, r)| (start, r.shift, r.length))
    }

    /// Register `number..number + length` as mapping to `number + shift..`.
    ///
    /// Runs with the same shift that overlap or touch the new one are merged
    /// into a single run. Overlapping a run with a different shift fails and
    /// leaves the index untouched. A zero length is accepted and ignored.
    pub fn set(&mut self, number: u32, shift: i64, length: u32) -> Result<(), CrossIndexError> {
        let merge = self.check(number, shift, length)?;
        if length == 0 {
            return Ok(());
        }

        let mut start = number as u64;
        let mut end = number as u64 + length as u64;
        for merged_start in merge {
            if let Some(r) = self.ranges.remove(&merged_start) {
                start = start.min(merged_start as u64);
                end = end.max(r.end(merged_start));
            }
        }

        // check() guarantees both bounds fit once merged.
        self.ranges.insert(
            start as u32,
            IndexRange {
                shift,
                length: (end - start) as u32,
            },
        );
        Ok(())
    }

    /// Validate a registration without applying it.
    ///
    /// On success returns the starts of the runs that `set` would merge.
    pub fn check(&self, number: u32, shift: i64, length: u32) -> Result<Vec<u32>, CrossIndexError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let start = number as u64;
        let end = start + length as u64;
        let out_of_bounds = CrossIndexError::OutOfBounds {
            start: number,
            length,
            shift,
        };
        let target_start = start as i64 + shift;
        let target_last = end as i64 - 1 + shift;
        if end > u32::MAX as u64 + 1 || target_start < 0 || target_last > u32::MAX as i64 {
            return Err(out_of_bounds);
        }

        let upper = end.min(u32::MAX as u64) as u32;
        let mut merge = Vec::new();
        let mut merged_end = end;
        for (&r_start, r) in self.ranges.range(..=upper).rev() {
            let r_end = r.end(r_start);
            if r_end < start {
                break;
            }
            let overlaps = (r_start as u64) < end && r_end > start;
            if overlaps && r.shift != shift {
                return Err(CrossIndexError::ConflictingRange {
                    start: number,
                    length,
                    shift,
                    existing_start: r_start,
                    existing_length: r.length,
                    existing_shift: r.shift,
                });
            }
            if r.shift == shift {
                merge.push(r_start);
                merged_end = merged_end.max(r_end);
            }
        }
        if merged_end > u32::MAX as u64 + 1 {
            return Err(out_of_bounds);
        }
        Ok(merge)
    }

    /// Look up the number mapped to `number`.
    pub fn get(&self, number: u32) -> Option<u32> {
        let (&start, r) = self.ranges.range(..=number).next_back()?;
        if (number as u64) < r.end(start) {
            u32::try_from(number as i64 + r.shift).ok()
        } else {
            None
        }
    }
}

/// Catalogs that are mapped to canonical numbers through a cross index.
///
/// HIP and Tycho numbers are canonical numbers themselves and need no index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Catalog {
    HenryDraper,
    Sao,
    Gliese,
}

impl Catalog {
    pub const ALL: [Catalog; 3] = [Catalog::HenryDraper, Catalog::Sao, Catalog::Gliese];

    /// Designation prefix used when formatting numbers of this catalog.
    pub fn prefix(self) -> &'static str {
        match self {
            Catalog::HenryDraper => "HD",
            Catalog::Sao => "SAO",
            Catalog::Gliese => "Gliese",
        }
    }

    fn slot(self) -> usize {
        match self {
            Catalog::HenryDraper => 0,
            Catalog::Sao => 1,
            Catalog::Gliese => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
struct CatalogIndexPair {
    forward: CrossIndex,
    reverse: CrossIndex,
}

impl CatalogIndexPair {
    fn add_range(&mut self, catalog_start: u32, shift: i64, length: u32) -> Result<(), CrossIndexError> {
        let canonical_start = u32::try_from(catalog_start as i64 + shift).map_err(|_| {
            CrossIndexError::OutOfBounds {
                start: catalog_start,
                length,
                shift,
            }
        })?;
        self.forward.check(catalog_start, shift, length)?;
        self.reverse.check(canonical_start, -shift, length)?;
        self.forward.set(catalog_start, shift, length)?;
        self.reverse.set(canonical_start, -shift, length)
    }
}

/// Forward and reverse cross indexes for every [`Catalog`].
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct CatalogCrossIndex {
    pairs: [CatalogIndexPair; 3],
}

impl CatalogCrossIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single catalog number for a canonical star number.
    pub fn add_catalog_number(
        &mut self,
        canonical: u32,
        catalog: Catalog,
        value: u32,
    ) -> Result<(), CrossIndexError> {
        self.add_catalog_range(value, catalog, canonical as i64 - value as i64, 1)
    }

    /// Register catalog numbers `catalog_start..catalog_start + length` as
    /// corresponding to canonical numbers starting at `catalog_start + shift`.
    ///
    /// The forward and reverse indexes are both validated before either is
    /// changed, so a conflict in one direction leaves both untouched.
    pub fn add_catalog_range(
        &mut self,
        catalog_start: u32,
        catalog: Catalog,
        shift: i64,
        length: u32,
    ) -> Result<(), CrossIndexError> {
        self.pairs[catalog.slot()].add_range(catalog_start, shift, length)
    }

    /// Canonical number for a number of `catalog`.
    pub fn get(&self, catalog: Catalog, number: u32) -> Option<u32> {
        self.pairs[catalog.slot()].forward.get(number)
    }

    /// Number of `catalog` for a canonical number.
    pub fn reverse_get(&self, catalog: Catalog, canonical: u32) -> Option<u32> {
        self.pairs[catalog.slot()].reverse.get(canonical)
    }

    pub fn forward(&self, catalog: Catalog) -> &CrossIndex {
        &self.pairs[catalog.slot()].forward
    }

    pub fn reverse(&self, catalog: Catalog) -> &CrossIndex {
        &self.pairs[catalog.slot()].reverse
    }

    /// Replace the index of `catalog` with the contents of a cross-index file.
    ///
    /// Entries that conflict with earlier entries of the same file are
    /// skipped with a warning. On error the existing index is kept.
    pub fn load<R: Read>(&mut self, catalog: Catalog, mut reader: R) -> Result<(), LoadError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() < HEADER_SIZE || &bytes[..8] != CROSS_INDEX_MAGIC {
            return Err(LoadError::BadHeader("missing CELINDEX magic".to_string()));
        }

        let version = LittleEndian::read_u16(&bytes[8..10]);
        let body = &bytes[HEADER_SIZE..];
        let ranges: Vec<(u32, i64, u32)> = match version {
            CROSS_INDEX_VERSION_PAIRS => pairs_to_ranges(read_records(body, PAIR_RECORD_SIZE)?.map(
                |rec| (LittleEndian::read_u32(&rec[0..4]), LittleEndian::read_u32(&rec[4..8])),
            )),
            CROSS_INDEX_VERSION_RANGES => read_records(body, RANGE_RECORD_SIZE)?
                .map(|rec| {
                    (
                        LittleEndian::read_u32(&rec[0..4]),
                        LittleEndian::read_i64(&rec[4..12]),
                        LittleEndian::read_u32(&rec[12..16]),
                    )
                })
                .collect(),
            other => {
                return Err(LoadError::BadHeader(format!(
                    "unsupported cross index version {other:#06x}"
                )))
            }
        };

        let mut pair = CatalogIndexPair::default();
        let mut skipped = 0usize;
        for (start, shift, length) in ranges {
            if let Err(e) = pair.add_range(start, shift, length) {
                debug!("Skipping {} cross index entry: {}", catalog.prefix(), e);
                skipped += 1;
            }
        }
        if skipped > 0 {
            warn!(
                "Skipped {} conflicting {} cross index entries",
                skipped,
                catalog.prefix()
            );
        }
        debug!(
            "Loaded {} cross index: {} runs",
            catalog.prefix(),
            pair.forward.len()
        );
        self.pairs[catalog.slot()] = pair;
        Ok(())
    }

    /// Write the forward index of `catalog` in the range-compressed format.
    pub fn write<W: Write>(&self, catalog: Catalog, mut writer: W) -> std::io::Result<()> {
        writer.write_all(CROSS_INDEX_MAGIC)?;
        writer.write_u16::<LittleEndian>(CROSS_INDEX_VERSION_RANGES)?;
        for (start, shift, length) in self.forward(catalog).iter() {
            writer.write_u32::<LittleEndian>(start)?;
            writer.write_i64::<LittleEndian>(shift)?;
            writer.write_u32::<LittleEndian>(length)?;
        }
        Ok(())
    }
}

fn read_records(body: &[u8], size: usize) -> Result<std::slice::ChunksExact<'_, u8>, LoadError> {
    let remainder = body.len() % size;
    if remainder != 0 {
        return Err(LoadError::Truncated {
            record: body.len() / size,
            expected: size,
            actual: remainder,
        });
    }
    Ok(body.chunks_exact(size))
}

/// Coalesce `(catalog, canonical)` pairs into runs sorted by catalog number.
fn pairs_to_ranges(pairs: impl Iterator<Item = (u32, u32)>) -> Vec<(u32, i64, u32)> {
    let mut pairs: Vec<(u32, u32)> = pairs.collect();
    pairs.sort_unstable();

    let mut ranges: Vec<(u32, i64, u32)> = Vec::new();
    for (catalog, canonical) in pairs {
        let shift = canonical as i64 - catalog as i64;
        if let Some((start, last_shift, length)) = ranges.last_mut() {
            if *last_shift == shift && *start as u64 + *length as u64 == catalog as u64 {
                *length += 1;
                continue;
            }
        }
        ranges.push((catalog, shift, 1));
    }
    ranges
}
