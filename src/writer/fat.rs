//! FAT generation.
//!
//! The write-side FAT is built by allocating sector chains for every region
//! of the new container. Allocation takes from the free list first and
//! appends fresh sectors after it; the table's own sectors are reserved as a
//! contiguous run marked `FAT_SECT` (or `DIFAT_SECT`), sized by the caller's
//! fixpoint over the total sector count.

use crate::alloc::SectorChain;
use crate::consts::*;
use crate::error::{Error, Result};
use fixedbitset::FixedBitSet;

/// Write-side sector allocator and FAT table.
#[derive(Debug)]
pub struct SectorAllocator {
    /// The FAT under construction; index is the sector number
    table: Vec<u32>,
    /// Released sectors, ascending, consumed before appending
    free: Vec<u32>,
    sector_size: usize,
}

impl SectorAllocator {
    pub fn new(sector_size: usize) -> Self {
        assert!(
            sector_size == SECTOR_SIZE_V3 || sector_size == SECTOR_SIZE_V4,
            "sector size must be 512 or 4096"
        );
        Self {
            table: Vec::new(),
            free: Vec::new(),
            sector_size,
        }
    }

    /// Lowest free sector, or a fresh one appended to the table.
    fn take(&mut self) -> u32 {
        if self.free.is_empty() {
            let sector = self.table.len() as u32;
            self.table.push(FREE_SECT);
            sector
        } else {
            self.free.remove(0)
        }
    }

    /// Allocate and link a chain covering `len` bytes, returning the
    /// ordered sector indices. Empty input yields an empty chain.
    pub fn chain_for(&mut self, len: usize) -> SectorChain {
        let count = len.div_ceil(self.sector_size);
        let mut chain = SectorChain::new();
        for _ in 0..count {
            chain.push(self.take());
        }
        for pair in chain.windows(2) {
            self.table[pair[0] as usize] = pair[1];
        }
        if let Some(&last) = chain.last() {
            self.table[last as usize] = END_OF_CHAIN;
        }
        chain
    }

    /// Reserve a contiguous run of sectors for table machinery, marked with
    /// `FAT_SECT` or `DIFAT_SECT`. Returns the first sector of the run, or
    /// `END_OF_CHAIN` for an empty reservation.
    pub fn reserve(&mut self, count: u32, marker: u32) -> u32 {
        if count == 0 {
            return END_OF_CHAIN;
        }
        let start = self.table.len() as u32;
        for _ in 0..count {
            self.table.push(marker);
        }
        start
    }

    /// Return a chain's sectors to the free list.
    pub fn release(&mut self, chain: &[u32]) {
        for &sector in chain {
            if let Some(slot) = self.table.get_mut(sector as usize) {
                *slot = FREE_SECT;
                self.free.push(sector);
            }
        }
        self.free.sort_unstable();
    }

    pub fn table(&self) -> &[u32] {
        &self.table
    }

    /// Total sectors the table covers.
    pub fn total(&self) -> u32 {
        self.table.len() as u32
    }

    /// Render the table into `FREE_SECT`-padded sectors.
    pub fn render(&self) -> Vec<Vec<u8>> {
        let entries_per_sector = self.sector_size / 4;
        let count = self.table.len().div_ceil(entries_per_sector);
        let mut sectors = Vec::with_capacity(count);
        for sector_index in 0..count {
            let mut data = vec![0xFFu8; self.sector_size];
            let start = sector_index * entries_per_sector;
            let end = (start + entries_per_sector).min(self.table.len());
            for (i, &entry) in self.table[start..end].iter().enumerate() {
                data[i * 4..i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
            }
            sectors.push(data);
        }
        sectors
    }

    /// Check the built table against the read-side chain invariants:
    /// every link lands inside the table and no sector is the successor of
    /// two chains.
    pub fn verify(&self) -> Result<()> {
        let mut referenced = FixedBitSet::with_capacity(self.table.len());
        for (sector, &entry) in self.table.iter().enumerate() {
            match entry {
                END_OF_CHAIN | FREE_SECT | FAT_SECT | DIFAT_SECT => {},
                next => {
                    if next as usize >= self.table.len() {
                        return Err(Error::Validation(format!(
                            "FAT entry at sector {} links outside the table ({})",
                            sector, next
                        )));
                    }
                    if referenced.put(next as usize) {
                        return Err(Error::Validation(format!(
                            "sector {} is the successor of two chains",
                            next
                        )));
                    }
                },
            }
        }
        Ok(())
    }
}
