/// Magic bytes that begin every compound file
pub const MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Size of the on-disk header structure in bytes
pub const HEADER_SIZE: usize = 512;

/// Minimal size of an empty compound file with 512-byte sectors (1536 bytes)
pub const MINIMAL_FILE_SIZE: usize = 1536;

/// Size of a directory entry in bytes
pub const DIR_ENTRY_SIZE: usize = 128;

/// Default sector size for version 3 (512 bytes)
pub const SECTOR_SIZE_V3: usize = 512;

/// Default sector size for version 4 (4096 bytes)
pub const SECTOR_SIZE_V4: usize = 4096;

/// Mini sector size (64 bytes, mini sector shift 6)
pub const MINI_SECTOR_SIZE: usize = 64;

/// Streams below this size live in the mini stream (root entry excepted)
pub const MINI_STREAM_CUTOFF: u32 = 4096;

/// Number of FAT sector locations stored inline in the header
pub const HEADER_DIFAT_ENTRIES: usize = 109;

// Sector numbers at or above MAX_REG_SECT are markers, not indices.
/// Largest regular sector index
pub const MAX_REG_SECT: u32 = 0xFFFFFFFA;
/// Marks a DIFAT sector in the FAT
pub const DIFAT_SECT: u32 = 0xFFFFFFFC;
/// Marks a FAT sector in the FAT
pub const FAT_SECT: u32 = 0xFFFFFFFD;
/// Terminates a sector chain
pub const END_OF_CHAIN: u32 = 0xFFFFFFFE;
/// Unallocated sector
pub const FREE_SECT: u32 = 0xFFFFFFFF;

/// Unallocated directory entry reference
pub const NO_STREAM: u32 = 0xFFFFFFFF;

// Directory entry kind bytes.
/// Unused directory entry
pub const KIND_EMPTY: u8 = 0;
/// Entry is a storage (directory-like container)
pub const KIND_STORAGE: u8 = 1;
/// Entry is a stream
pub const KIND_STREAM: u8 = 2;
/// Entry is the root storage
pub const KIND_ROOT: u8 = 5;

/// Maximum directory entry name length in UTF-16 code units
pub const MAX_NAME_UNITS: usize = 31;
