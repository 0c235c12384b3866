//! Allocation-table chain resolution.
//!
//! The FAT and the MiniFAT are both arrays mapping a sector index to the
//! next index in its chain, or to a marker (`END_OF_CHAIN`, `FREE_SECT`,
//! `FAT_SECT`, `DIFAT_SECT`). The same resolution rules apply to both; they
//! differ only in sector class and size. Resolution is an explicit walk
//! producing the ordered sequence of sector indices for a stream, with a
//! cycle guard bounded by the table size.

use crate::consts::*;
use crate::error::{Error, Result};
use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

/// Ordered sector indices forming one stream chain.
pub type SectorChain = SmallVec<[u32; 16]>;

/// Allocator class of a stream, decided by declared length vs. the
/// mini stream cutoff (the root entry always uses `Big`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorClass {
    /// Regular sectors chained through the FAT
    Big,
    /// Mini sectors chained through the MiniFAT
    Small,
}

/// One allocation table (FAT or MiniFAT).
#[derive(Debug, Clone)]
pub struct AllocTable {
    entries: Vec<u32>,
    class: SectorClass,
    sector_size: usize,
}

impl AllocTable {
    pub fn new(entries: Vec<u32>, class: SectorClass, sector_size: usize) -> Self {
        Self {
            entries,
            class,
            sector_size,
        }
    }

    pub fn class(&self) -> SectorClass {
        self.class
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: u32) -> Option<u32> {
        self.entries.get(index as usize).copied()
    }

    fn table_name(&self) -> &'static str {
        match self.class {
            SectorClass::Big => "FAT",
            SectorClass::Small => "MiniFAT",
        }
    }

    /// Resolve a start index into the ordered chain of sector indices.
    ///
    /// Fails with [`Error::CorruptChain`] when the walk revisits an index,
    /// an index falls outside the table, or a chain link is a non-chain
    /// marker. `END_OF_CHAIN` as the start yields an empty chain.
    pub fn walk(&self, start: u32) -> Result<SectorChain> {
        let mut chain = SectorChain::new();
        if start == END_OF_CHAIN {
            return Ok(chain);
        }

        let mut visited = FixedBitSet::with_capacity(self.entries.len());
        let mut sector = start;
        loop {
            if sector >= self.entries.len() as u32 {
                return Err(Error::CorruptChain(format!(
                    "{} index {} outside table of {} entries",
                    self.table_name(),
                    sector,
                    self.entries.len()
                )));
            }
            if visited.put(sector as usize) {
                return Err(Error::CorruptChain(format!(
                    "{} chain revisits sector {}",
                    self.table_name(),
                    sector
                )));
            }
            chain.push(sector);

            match self.entries[sector as usize] {
                END_OF_CHAIN => break,
                next @ (FREE_SECT | FAT_SECT | DIFAT_SECT) => {
                    return Err(Error::CorruptChain(format!(
                        "{} chain runs into marker 0x{:08X} at sector {}",
                        self.table_name(),
                        next,
                        sector
                    )));
                },
                next => sector = next,
            }
        }

        Ok(chain)
    }

    /// Resolve a chain and check it against a declared byte length.
    ///
    /// The resolved chain may differ from `ceil(declared_len / sector_size)`
    /// by at most one sector; a larger disagreement is fatal.
    pub fn chain(&self, start: u32, declared_len: u64) -> Result<SectorChain> {
        let chain = self.walk(start)?;
        let expected = declared_len.div_ceil(self.sector_size as u64);
        let actual = chain.len() as u64;
        if actual.abs_diff(expected) > 1 {
            return Err(Error::CorruptChain(format!(
                "{} chain from sector {} has {} sectors, declared length {} needs {}",
                self.table_name(),
                start,
                actual,
                declared_len,
                expected
            )));
        }
        Ok(chain)
    }
}
