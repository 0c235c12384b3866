//! Header generation.
//!
//! Renders the 512-byte header with the magic signature, version and sector
//! geometry, table locations, and the first 109 FAT sector locations. For
//! version 4 containers the header's big block spans 4096 bytes; the
//! remainder is zero-filled.

use crate::consts::*;

/// Header builder for a freshly written container.
pub struct HeaderWriter {
    sector_size: usize,
    first_dir_sector: u32,
    /// Directory sector count; written for version 4 only
    num_dir_sectors: u32,
    first_minifat_sector: u32,
    num_minifat_sectors: u32,
    first_difat_sector: u32,
    num_difat_sectors: u32,
    /// Every FAT sector location; the first 109 are rendered inline
    fat_locations: Vec<u32>,
}

impl HeaderWriter {
    pub fn new(sector_size: usize) -> Self {
        Self {
            sector_size,
            first_dir_sector: END_OF_CHAIN,
            num_dir_sectors: 0,
            first_minifat_sector: END_OF_CHAIN,
            num_minifat_sectors: 0,
            first_difat_sector: END_OF_CHAIN,
            num_difat_sectors: 0,
            fat_locations: Vec::new(),
        }
    }

    pub fn set_first_dir_sector(&mut self, sector: u32) {
        self.first_dir_sector = sector;
    }

    /// Version 3 files must write zero here.
    pub fn set_num_dir_sectors(&mut self, count: u32) {
        self.num_dir_sectors = if self.sector_size == SECTOR_SIZE_V3 {
            0
        } else {
            count
        };
    }

    pub fn set_minifat(&mut self, first_sector: u32, count: u32) {
        self.first_minifat_sector = first_sector;
        self.num_minifat_sectors = count;
    }

    pub fn set_difat(&mut self, first_sector: u32, count: u32) {
        self.first_difat_sector = first_sector;
        self.num_difat_sectors = count;
    }

    pub fn add_fat_locations(&mut self, sectors: &[u32]) {
        self.fat_locations.extend_from_slice(sectors);
    }

    /// Render the header block, `sector_size` bytes long.
    pub fn render(&self) -> Vec<u8> {
        let mut header = vec![0u8; self.sector_size.max(HEADER_SIZE)];

        header[0..8].copy_from_slice(MAGIC);
        // CLSID at 8..24 stays zero.
        header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
        let major: u16 = if self.sector_size == SECTOR_SIZE_V3 { 3 } else { 4 };
        header[26..28].copy_from_slice(&major.to_le_bytes());
        header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
        let shift: u16 = if self.sector_size == SECTOR_SIZE_V3 { 9 } else { 12 };
        header[30..32].copy_from_slice(&shift.to_le_bytes());
        header[32..34].copy_from_slice(&6u16.to_le_bytes());
        // Reserved bytes at 34..40 stay zero.
        header[40..44].copy_from_slice(&self.num_dir_sectors.to_le_bytes());
        header[44..48].copy_from_slice(&(self.fat_locations.len() as u32).to_le_bytes());
        header[48..52].copy_from_slice(&self.first_dir_sector.to_le_bytes());
        // Transaction signature at 52..56 stays zero.
        header[56..60].copy_from_slice(&MINI_STREAM_CUTOFF.to_le_bytes());
        header[60..64].copy_from_slice(&self.first_minifat_sector.to_le_bytes());
        header[64..68].copy_from_slice(&self.num_minifat_sectors.to_le_bytes());
        header[68..72].copy_from_slice(&self.first_difat_sector.to_le_bytes());
        header[72..76].copy_from_slice(&self.num_difat_sectors.to_le_bytes());

        for i in 0..HEADER_DIFAT_ENTRIES {
            let offset = 76 + i * 4;
            let value = self.fat_locations.get(i).copied().unwrap_or(FREE_SECT);
            header[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }

        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_version_3_geometry() {
        let mut writer = HeaderWriter::new(512);
        writer.set_first_dir_sector(10);
        writer.add_fat_locations(&[1, 2, 3]);
        let header = writer.render();

        assert_eq!(header.len(), 512);
        assert_eq!(&header[0..8], MAGIC);
        assert_eq!(&header[26..28], &3u16.to_le_bytes());
        assert_eq!(&header[28..30], &0xFFFEu16.to_le_bytes());
        assert_eq!(&header[30..32], &9u16.to_le_bytes());
        assert_eq!(&header[44..48], &3u32.to_le_bytes());
        assert_eq!(&header[48..52], &10u32.to_le_bytes());
        assert_eq!(&header[76..80], &1u32.to_le_bytes());
        assert_eq!(&header[88..92], &FREE_SECT.to_le_bytes());
    }

    #[test]
    fn renders_version_4_geometry() {
        let writer = HeaderWriter::new(4096);
        let header = writer.render();
        assert_eq!(header.len(), 4096);
        assert_eq!(&header[26..28], &4u16.to_le_bytes());
        assert_eq!(&header[30..32], &12u16.to_le_bytes());
    }

    #[test]
    fn version_3_zeroes_directory_count() {
        let mut writer = HeaderWriter::new(512);
        writer.set_num_dir_sectors(7);
        assert_eq!(&writer.render()[40..44], &0u32.to_le_bytes());

        let mut writer = HeaderWriter::new(4096);
        writer.set_num_dir_sectors(7);
        assert_eq!(&writer.render()[40..44], &7u32.to_le_bytes());
    }
}
