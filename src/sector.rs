//! Sector-level access to the container image.
//!
//! A [`SectorStore`] is an immutable view over the fully loaded container
//! bytes; sectors are fixed-size blocks addressed by a zero-based index,
//! starting right after the header. A [`Block`] binds one sector to a
//! zero-copy byte range and carries the logical chain link and role tag
//! used during stream reconstruction.

use crate::consts::END_OF_CHAIN;
use crate::error::{Error, Result};
use bytes::Bytes;

/// What a sector is used for within the container.
///
/// Table and orphan sectors are never part of stream payload; a payload
/// chain that runs into one is structurally inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorRole {
    /// Stream payload (including the mini stream held by the root entry)
    Payload,
    /// Allocation-table machinery: FAT, MiniFAT, or DIFAT sectors
    Table,
    /// Directory stream sectors
    Directory,
    /// Unallocated
    Free,
    /// Allocated in the FAT but claimed by no chain
    Orphan,
}

/// Immutable, randomly-addressable view over the raw container bytes.
///
/// Sector `n` occupies the byte range `(n + 1) * sector_size ..
/// (n + 2) * sector_size`; the header occupies the range before sector 0.
#[derive(Debug, Clone)]
pub struct SectorStore {
    data: Bytes,
    sector_size: usize,
}

impl SectorStore {
    pub fn new(data: impl Into<Bytes>, sector_size: usize) -> Self {
        Self {
            data: data.into(),
            sector_size,
        }
    }

    /// Total container size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sector size in bytes for this store.
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Number of whole sectors following the header.
    pub fn sector_count(&self) -> u32 {
        (self.data.len() / self.sector_size).saturating_sub(1) as u32
    }

    /// Zero-copy slice of one sector's content.
    pub fn sector(&self, index: u32) -> Result<Bytes> {
        let offset = (index as usize + 1) * self.sector_size;
        let end = offset + self.sector_size;
        if end > self.data.len() {
            return Err(Error::CorruptChain(format!(
                "sector {} extends past the end of the container",
                index
            )));
        }
        Ok(self.data.slice(offset..end))
    }
}

/// A bound view onto one sector plus its logical chain successor.
///
/// The chain link orders stream content and is independent of physical
/// sector order.
#[derive(Debug, Clone)]
pub struct Block {
    index: u32,
    data: Bytes,
    next: u32,
    role: SectorRole,
}

impl Block {
    /// Bind a zero-copy view onto one sector of the store.
    pub fn bind(store: &SectorStore, index: u32) -> Result<Self> {
        Ok(Self {
            index,
            data: store.sector(index)?,
            next: END_OF_CHAIN,
            role: SectorRole::Payload,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Full sector content.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Sub-range of the sector content.
    pub fn slice(&self, start: usize, end: usize) -> Result<&[u8]> {
        if start > end || end > self.data.len() {
            return Err(Error::CorruptChain(format!(
                "range {}..{} outside sector {} ({} bytes)",
                start,
                end,
                self.index,
                self.data.len()
            )));
        }
        Ok(&self.data[start..end])
    }

    /// Set the logical chain successor.
    pub fn link(&mut self, next: u32) {
        self.next = next;
    }

    /// Logical chain successor, `END_OF_CHAIN` when last.
    pub fn next(&self) -> u32 {
        self.next
    }

    pub fn set_role(&mut self, role: SectorRole) {
        self.role = role;
    }

    pub fn role(&self) -> SectorRole {
        self.role
    }
}
