//! Compound file header parsing.
//!
//! The first 512 bytes of a container hold the signature, sector geometry,
//! and the locations of the FAT, MiniFAT, DIFAT and directory structures.

use crate::consts::*;
use crate::error::{Error, Result};
use zerocopy::{FromBytes, LE, U16, U32};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// Raw header structure (512 bytes, on-disk layout)
#[derive(DeriveFromBytes)]
#[repr(C)]
struct RawHeader {
    /// Magic signature
    signature: [u8; 8],
    /// Header CLSID (16 bytes, unused by modern writers)
    clsid: [u8; 16],
    /// Minor version
    minor_version: U16<LE>,
    /// Major version (3 = 512-byte sectors, 4 = 4096-byte sectors)
    major_version: U16<LE>,
    /// Byte-order mark, must read as 0xFFFE little-endian
    byte_order: U16<LE>,
    /// Sector size as a power of two (9 or 12)
    sector_shift: U16<LE>,
    /// Mini sector size as a power of two (always 6)
    mini_sector_shift: U16<LE>,
    /// Reserved, zero
    reserved: [u8; 6],
    /// Directory sector count (version 4 only; zero for version 3)
    num_dir_sectors: U32<LE>,
    /// FAT sector count
    num_fat_sectors: U32<LE>,
    /// First directory sector index
    first_dir_sector: U32<LE>,
    /// Transaction signature, zero
    transaction_signature: U32<LE>,
    /// Mini stream cutoff size (4096 by convention)
    mini_stream_cutoff: U32<LE>,
    /// First MiniFAT sector index
    first_minifat_sector: U32<LE>,
    /// MiniFAT sector count
    num_minifat_sectors: U32<LE>,
    /// First DIFAT sector index
    first_difat_sector: U32<LE>,
    /// DIFAT sector count
    num_difat_sectors: U32<LE>,
    /// First 109 FAT sector locations
    difat: [U32<LE>; HEADER_DIFAT_ENTRIES],
}

/// Parsed and validated container header.
#[derive(Debug, Clone)]
pub struct Header {
    pub major_version: u16,
    pub minor_version: u16,
    /// Big sector size in bytes (512 or 4096)
    pub sector_size: usize,
    /// Mini sector size in bytes (64)
    pub mini_sector_size: usize,
    /// Streams below this size resolve through the MiniFAT (root excepted)
    pub mini_stream_cutoff: u32,
    /// Directory sector count (version 4 only; zero for version 3)
    pub num_dir_sectors: u32,
    pub num_fat_sectors: u32,
    pub first_dir_sector: u32,
    pub first_minifat_sector: u32,
    pub num_minifat_sectors: u32,
    pub first_difat_sector: u32,
    pub num_difat_sectors: u32,
    /// FAT sector locations stored inline in the header
    pub difat_head: [u32; HEADER_DIFAT_ENTRIES],
}

impl Header {
    /// Parse and validate the header from the start of the container.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::MalformedHeader(format!(
                "container too small for a header: {} bytes",
                data.len()
            )));
        }

        let raw = RawHeader::read_from_bytes(&data[..HEADER_SIZE])
            .map_err(|_| Error::MalformedHeader("unreadable header block".to_string()))?;

        if &raw.signature != MAGIC {
            return Err(Error::MalformedHeader("bad signature".to_string()));
        }
        if raw.byte_order.get() != 0xFFFE {
            return Err(Error::MalformedHeader(format!(
                "byte-order mark 0x{:04X}, expected 0xFFFE",
                raw.byte_order.get()
            )));
        }

        let major_version = raw.major_version.get();
        let sector_shift = raw.sector_shift.get();
        match (major_version, sector_shift) {
            (3, 9) | (4, 12) => {},
            _ => {
                return Err(Error::MalformedHeader(format!(
                    "major version {} does not match sector shift {}",
                    major_version, sector_shift
                )));
            },
        }

        let mini_sector_shift = raw.mini_sector_shift.get();
        if mini_sector_shift != 6 {
            return Err(Error::MalformedHeader(format!(
                "mini sector shift {}, expected 6",
                mini_sector_shift
            )));
        }

        let mut difat_head = [FREE_SECT; HEADER_DIFAT_ENTRIES];
        for (slot, value) in difat_head.iter_mut().zip(raw.difat.iter()) {
            *slot = value.get();
        }

        Ok(Header {
            major_version,
            minor_version: raw.minor_version.get(),
            sector_size: 1usize << sector_shift,
            mini_sector_size: 1usize << mini_sector_shift,
            mini_stream_cutoff: raw.mini_stream_cutoff.get(),
            num_dir_sectors: raw.num_dir_sectors.get(),
            num_fat_sectors: raw.num_fat_sectors.get(),
            first_dir_sector: raw.first_dir_sector.get(),
            first_minifat_sector: raw.first_minifat_sector.get(),
            num_minifat_sectors: raw.num_minifat_sectors.get(),
            first_difat_sector: raw.first_difat_sector.get(),
            num_difat_sectors: raw.num_difat_sectors.get(),
            difat_head,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_header_bytes() -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[0..8].copy_from_slice(MAGIC);
        data[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
        data[26..28].copy_from_slice(&3u16.to_le_bytes());
        data[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
        data[30..32].copy_from_slice(&9u16.to_le_bytes());
        data[32..34].copy_from_slice(&6u16.to_le_bytes());
        data[56..60].copy_from_slice(&4096u32.to_le_bytes());
        for i in 0..HEADER_DIFAT_ENTRIES {
            let offset = 76 + i * 4;
            data[offset..offset + 4].copy_from_slice(&FREE_SECT.to_le_bytes());
        }
        data
    }

    #[test]
    fn parses_minimal_header() {
        let header = Header::parse(&minimal_header_bytes()).unwrap();
        assert_eq!(header.major_version, 3);
        assert_eq!(header.sector_size, 512);
        assert_eq!(header.mini_sector_size, 64);
        assert_eq!(header.mini_stream_cutoff, 4096);
        assert!(header.difat_head.iter().all(|&s| s == FREE_SECT));
    }

    #[test]
    fn rejects_bad_signature() {
        let mut data = minimal_header_bytes();
        data[0] = 0x00;
        assert!(matches!(
            Header::parse(&data),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn rejects_bad_byte_order() {
        let mut data = minimal_header_bytes();
        data[28..30].copy_from_slice(&0xFEFFu16.to_le_bytes());
        assert!(matches!(
            Header::parse(&data),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn rejects_version_shift_mismatch() {
        let mut data = minimal_header_bytes();
        // Version 3 with a 4096-byte sector shift
        data[30..32].copy_from_slice(&12u16.to_le_bytes());
        assert!(matches!(
            Header::parse(&data),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            Header::parse(&[0u8; 100]),
            Err(Error::MalformedHeader(_))
        ));
    }
}
