//! MiniFAT and mini stream generation.
//!
//! Streams below the cutoff are packed into the mini stream, 64 bytes per
//! mini sector, and chained through the MiniFAT. The mini stream itself is
//! a FAT-chained stream owned by the root entry; the MiniFAT table is
//! stored in regular sectors of its own.

use crate::consts::*;

/// Write-side mini sector allocator.
#[derive(Debug)]
pub struct MiniAllocator {
    /// The MiniFAT under construction; index is the mini sector number
    table: Vec<u32>,
    /// Mini stream content, padded to mini sector boundaries
    stream: Vec<u8>,
    mini_sector_size: usize,
}

impl MiniAllocator {
    pub fn new(mini_sector_size: usize) -> Self {
        Self {
            table: Vec::new(),
            stream: Vec::new(),
            mini_sector_size,
        }
    }

    /// Append a small stream to the mini stream and chain its mini sectors.
    /// Returns the first mini sector, or `END_OF_CHAIN` for empty input.
    pub fn push_stream(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return END_OF_CHAIN;
        }

        let count = data.len().div_ceil(self.mini_sector_size);
        let start = self.table.len() as u32;
        for i in 0..count {
            let next = if i + 1 < count {
                start + i as u32 + 1
            } else {
                END_OF_CHAIN
            };
            self.table.push(next);
        }

        let padded = count * self.mini_sector_size;
        let offset = self.stream.len();
        self.stream.resize(offset + padded, 0);
        self.stream[offset..offset + data.len()].copy_from_slice(data);

        start
    }

    /// Mini stream content, to be placed in FAT-chained sectors referenced
    /// by the root entry.
    pub fn stream_bytes(&self) -> &[u8] {
        &self.stream
    }

    pub fn mini_sector_count(&self) -> u32 {
        self.table.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &[u32] {
        &self.table
    }

    /// Render the MiniFAT into `FREE_SECT`-padded regular sectors.
    pub fn render(&self, sector_size: usize) -> Vec<Vec<u8>> {
        if self.table.is_empty() {
            return Vec::new();
        }

        let entries_per_sector = sector_size / 4;
        let count = self.table.len().div_ceil(entries_per_sector);
        let mut sectors = Vec::with_capacity(count);
        for sector_index in 0..count {
            let mut data = vec![0xFFu8; sector_size];
            let start = sector_index * entries_per_sector;
            let end = (start + entries_per_sector).min(self.table.len());
            for (i, &entry) in self.table[start..end].iter().enumerate() {
                data[i * 4..i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
            }
            sectors.push(data);
        }
        sectors
    }
}
