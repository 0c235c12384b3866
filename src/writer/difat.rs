//! DIFAT overflow generation.
//!
//! The header holds the first 109 FAT sector locations inline; containers
//! whose FAT is larger continue the list in DIFAT sectors. Each DIFAT
//! sector packs `sector_size / 4 - 1` locations followed by the index of
//! the next DIFAT sector (`END_OF_CHAIN` on the last).

use crate::consts::*;

/// Write-side DIFAT overflow table.
#[derive(Debug)]
pub struct DifatTable {
    /// FAT sector locations beyond the 109 header slots
    overflow: Vec<u32>,
    sector_size: usize,
}

impl DifatTable {
    pub fn new(sector_size: usize) -> Self {
        Self {
            overflow: Vec::new(),
            sector_size,
        }
    }

    /// Record the full FAT sector location list; the first 109 stay in the
    /// header and only the remainder is kept here.
    pub fn set_locations(&mut self, locations: &[u32]) {
        self.overflow = locations
            .get(HEADER_DIFAT_ENTRIES..)
            .map(|rest| rest.to_vec())
            .unwrap_or_default();
    }

    pub fn is_needed(&self) -> bool {
        !self.overflow.is_empty()
    }

    /// Number of DIFAT sectors required for the overflow.
    pub fn sector_count(&self) -> u32 {
        let per_sector = self.sector_size / 4 - 1;
        self.overflow.len().div_ceil(per_sector) as u32
    }

    /// Render the DIFAT sectors, chained from `first_sector` upward.
    pub fn render(&self, first_sector: u32) -> Vec<Vec<u8>> {
        if self.overflow.is_empty() {
            return Vec::new();
        }

        let per_sector = self.sector_size / 4 - 1;
        let count = self.sector_count();
        let mut sectors = Vec::with_capacity(count as usize);
        for index in 0..count {
            let mut data = vec![0xFFu8; self.sector_size];
            let start = index as usize * per_sector;
            let end = (start + per_sector).min(self.overflow.len());
            for (i, &location) in self.overflow[start..end].iter().enumerate() {
                data[i * 4..i * 4 + 4].copy_from_slice(&location.to_le_bytes());
            }

            let next = if index + 1 < count {
                first_sector + index + 1
            } else {
                END_OF_CHAIN
            };
            let tail = self.sector_size - 4;
            data[tail..tail + 4].copy_from_slice(&next.to_le_bytes());

            sectors.push(data);
        }
        sectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_fat_needs_no_overflow() {
        let mut difat = DifatTable::new(512);
        difat.set_locations(&(0..100).collect::<Vec<u32>>());
        assert!(!difat.is_needed());
        assert_eq!(difat.sector_count(), 0);
        assert!(difat.render(0).is_empty());
    }

    #[test]
    fn overflow_fills_one_sector() {
        let mut difat = DifatTable::new(512);
        // 150 locations: 109 inline, 41 in the overflow (127 fit per sector).
        difat.set_locations(&(0..150).collect::<Vec<u32>>());
        assert!(difat.is_needed());
        assert_eq!(difat.sector_count(), 1);

        let sectors = difat.render(200);
        assert_eq!(sectors.len(), 1);
        assert_eq!(&sectors[0][0..4], &109u32.to_le_bytes());
        assert_eq!(&sectors[0][508..512], &END_OF_CHAIN.to_le_bytes());
    }

    #[test]
    fn overflow_sectors_chain_forward() {
        let mut difat = DifatTable::new(512);
        // 109 + 141 locations: two overflow sectors (127 + 14).
        difat.set_locations(&(0..250).collect::<Vec<u32>>());
        assert_eq!(difat.sector_count(), 2);

        let sectors = difat.render(300);
        assert_eq!(&sectors[0][508..512], &301u32.to_le_bytes());
        assert_eq!(&sectors[1][508..512], &END_OF_CHAIN.to_le_bytes());
    }
}
