//! Core container writer.
//!
//! All mutations are staged in memory; [`ContainerWriter::write_to`] is
//! two-phase. Phase one validates the staged set and aborts before any byte
//! is emitted. Phase two allocates every region ascending in emission order
//! (FAT, DIFAT, directory, MiniFAT, mini stream, big payloads), sizes the
//! FAT and DIFAT together via a fixpoint (the tables cover their own
//! sectors), assembles the full sector image, and writes header plus
//! sectors sequentially. The destination only needs [`std::io::Write`].

use super::difat::DifatTable;
use super::directory::DirTreeBuilder;
use super::fat::SectorAllocator;
use super::header::HeaderWriter;
use super::minifat::MiniAllocator;
use crate::alloc::SectorChain;
use crate::consts::*;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::Write;

/// Builds a fresh container from a staged set of streams and storages.
pub struct ContainerWriter {
    sector_size: usize,
    mini_sector_size: usize,
    mini_stream_cutoff: u32,
    root_clsid: [u8; 16],
    /// Streams in insertion order (path components, bytes)
    streams: Vec<(Vec<String>, Vec<u8>)>,
    /// Explicitly created storages in insertion order
    storages: Vec<Vec<String>>,
}

impl ContainerWriter {
    /// Writer with default 512-byte sectors.
    pub fn new() -> Self {
        Self::with_sector_size(SECTOR_SIZE_V3)
    }

    /// Writer with the given sector size (512 or 4096).
    ///
    /// # Panics
    ///
    /// Panics on any other sector size.
    pub fn with_sector_size(sector_size: usize) -> Self {
        assert!(
            sector_size == SECTOR_SIZE_V3 || sector_size == SECTOR_SIZE_V4,
            "sector size must be 512 or 4096"
        );
        Self {
            sector_size,
            mini_sector_size: MINI_SECTOR_SIZE,
            mini_stream_cutoff: MINI_STREAM_CUTOFF,
            root_clsid: [0; 16],
            streams: Vec::new(),
            storages: Vec::new(),
        }
    }

    /// CLSID written into the root entry.
    pub fn set_root_clsid(&mut self, clsid: [u8; 16]) {
        self.root_clsid = clsid;
    }

    /// Stage a stream at a '/'-delimited path, replacing any staged stream
    /// of the same (case-insensitive) path.
    pub fn add_stream(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.add_stream_segments(&split_path(path), data)
    }

    /// Stage a stream at a path given as components.
    pub fn add_stream_segments(&mut self, path: &[String], data: &[u8]) -> Result<()> {
        if path.is_empty() {
            return Err(Error::Validation("empty stream path".to_string()));
        }
        if let Some(slot) = self
            .streams
            .iter_mut()
            .find(|(p, _)| eq_fold_paths(p, path))
        {
            slot.1 = data.to_vec();
        } else {
            self.streams.push((path.to_vec(), data.to_vec()));
        }
        Ok(())
    }

    /// Stage a storage at a '/'-delimited path. Parents are implied; an
    /// existing storage of the same path is a no-op.
    pub fn add_storage(&mut self, path: &str) -> Result<()> {
        self.add_storage_segments(&split_path(path))
    }

    /// Stage a storage at a path given as components.
    pub fn add_storage_segments(&mut self, path: &[String]) -> Result<()> {
        if path.is_empty() {
            return Err(Error::Validation("empty storage path".to_string()));
        }
        if !self.storages.iter().any(|p| eq_fold_paths(p, path)) {
            self.storages.push(path.to_vec());
        }
        Ok(())
    }

    /// Serialize the staged set into `destination`.
    pub fn write_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        self.validate()?;

        let sector_size = self.sector_size;
        let cutoff = self.mini_stream_cutoff as usize;

        // Mini chains first, in stream insertion order.
        let mut mini = MiniAllocator::new(self.mini_sector_size);
        let mut mini_starts: Vec<Option<u32>> = Vec::with_capacity(self.streams.len());
        for (_, data) in &self.streams {
            if data.len() < cutoff {
                mini_starts.push(Some(mini.push_stream(data)));
            } else {
                mini_starts.push(None);
            }
        }

        // Region sizes in sectors.
        let storages = self.collect_storages();
        let entry_count = 1 + storages.len() + self.streams.len();
        let dir_len = entry_count * DIR_ENTRY_SIZE;
        let n_dir = dir_len.div_ceil(sector_size);
        let n_minifat = (mini.mini_sector_count() as usize * 4).div_ceil(sector_size);
        let ministream_len = mini.stream_bytes().len();
        let n_ministream = ministream_len.div_ceil(sector_size);
        let n_payload: usize = self
            .streams
            .iter()
            .filter(|(_, data)| data.len() >= cutoff)
            .map(|(_, data)| data.len().div_ceil(sector_size))
            .sum();
        let n_used = n_dir + n_minifat + n_ministream + n_payload;

        // Fixpoint: the FAT covers every sector including its own and the
        // DIFAT's, so the table sizes feed back into the total.
        let entries_per_fat = sector_size / 4;
        let ids_per_difat = entries_per_fat - 1;
        let mut n_fat = 0usize;
        let mut n_difat = 0usize;
        loop {
            let total = n_used + n_fat + n_difat;
            let want_fat = total.div_ceil(entries_per_fat);
            let want_difat = want_fat
                .saturating_sub(HEADER_DIFAT_ENTRIES)
                .div_ceil(ids_per_difat);
            if want_fat == n_fat && want_difat == n_difat {
                break;
            }
            n_fat = want_fat;
            n_difat = want_difat;
        }
        let total = n_used + n_fat + n_difat;
        if total as u64 >= MAX_REG_SECT as u64 {
            return Err(Error::Validation(format!(
                "container needs {} sectors, exceeding the representable count",
                total
            )));
        }

        // Allocate ascending sector indices in emission order.
        let mut alloc = SectorAllocator::new(sector_size);
        let fat_start = alloc.reserve(n_fat as u32, FAT_SECT);
        let difat_start = alloc.reserve(n_difat as u32, DIFAT_SECT);
        let dir_chain = alloc.chain_for(dir_len);
        let minifat_chain = alloc.chain_for(n_minifat * sector_size);
        let ministream_chain = alloc.chain_for(ministream_len);
        let mut big_chains: Vec<Option<SectorChain>> = Vec::with_capacity(self.streams.len());
        for (i, (_, data)) in self.streams.iter().enumerate() {
            if mini_starts[i].is_some() {
                big_chains.push(None);
            } else {
                big_chains.push(Some(alloc.chain_for(data.len())));
            }
        }
        debug_assert_eq!(alloc.total() as usize, total);
        alloc.verify()?;

        // Directory tree over the final chain starts.
        let ministream_start = ministream_chain.first().copied().unwrap_or(END_OF_CHAIN);
        let mut dir = DirTreeBuilder::new(ministream_start, ministream_len as u64);
        dir.set_root_clsid(self.root_clsid);
        for path in &storages {
            dir.add_storage(path);
        }
        for (i, (path, data)) in self.streams.iter().enumerate() {
            let start = match (&mini_starts[i], &big_chains[i]) {
                (Some(start), _) => *start,
                (None, Some(chain)) => chain.first().copied().unwrap_or(END_OF_CHAIN),
                (None, None) => END_OF_CHAIN,
            };
            dir.add_stream(path, start, data.len() as u64);
        }
        debug_assert_eq!(dir.entry_count(), entry_count);
        let dir_bytes = dir.render();
        debug_assert_eq!(dir_bytes.len(), dir_len);

        // Assemble the full sector image, then emit sequentially.
        let mut image: Vec<Vec<u8>> = vec![vec![0u8; sector_size]; total];
        for (i, sector) in alloc.render().into_iter().enumerate() {
            image[fat_start as usize + i] = sector;
        }

        let fat_locations: Vec<u32> = (0..n_fat as u32).map(|i| fat_start + i).collect();
        let mut difat = DifatTable::new(sector_size);
        difat.set_locations(&fat_locations);
        if difat.is_needed() {
            for (i, sector) in difat.render(difat_start).into_iter().enumerate() {
                image[difat_start as usize + i] = sector;
            }
        }

        place(&mut image, &dir_chain, &dir_bytes, sector_size);
        for (i, sector) in mini.render(sector_size).into_iter().enumerate() {
            image[minifat_chain[i] as usize] = sector;
        }
        place(&mut image, &ministream_chain, mini.stream_bytes(), sector_size);
        for (i, (_, data)) in self.streams.iter().enumerate() {
            if let Some(chain) = &big_chains[i] {
                place(&mut image, chain, data, sector_size);
            }
        }

        let mut header = HeaderWriter::new(sector_size);
        header.set_first_dir_sector(dir_chain.first().copied().unwrap_or(END_OF_CHAIN));
        header.set_num_dir_sectors(n_dir as u32);
        if !mini.is_empty() {
            header.set_minifat(minifat_chain[0], n_minifat as u32);
        }
        if n_difat > 0 {
            header.set_difat(difat_start, n_difat as u32);
        }
        header.add_fat_locations(&fat_locations);

        destination.write_all(&header.render())?;
        for sector in &image {
            destination.write_all(sector)?;
        }
        destination.flush()?;
        Ok(())
    }

    /// Explicit storages plus every storage implied by a stream path,
    /// parents before children, first appearance wins.
    fn collect_storages(&self) -> Vec<Vec<String>> {
        let mut seen: Vec<Vec<String>> = Vec::new();
        let mut out: Vec<Vec<String>> = Vec::new();
        for path in self
            .storages
            .iter()
            .map(|p| p.as_slice())
            .flat_map(prefixes)
            .chain(
                self.streams
                    .iter()
                    .map(|(p, _)| parent_of(p))
                    .flat_map(prefixes),
            )
        {
            let folded: Vec<String> = path.iter().map(|s| s.to_uppercase()).collect();
            if !seen.contains(&folded) {
                seen.push(folded);
                out.push(path.to_vec());
            }
        }
        out
    }

    /// Phase-one validation. Nothing is emitted when this fails.
    fn validate(&self) -> Result<()> {
        let storages = self.collect_storages();

        for path in self.streams.iter().map(|(p, _)| p).chain(storages.iter()) {
            for name in path {
                if name.is_empty() {
                    return Err(Error::Validation("empty entry name".to_string()));
                }
                if name.encode_utf16().count() > MAX_NAME_UNITS {
                    return Err(Error::Validation(format!(
                        "name {:?} exceeds {} UTF-16 units",
                        name, MAX_NAME_UNITS
                    )));
                }
            }
        }

        // No two siblings may share a name, stream or storage alike.
        let mut siblings: HashMap<(Vec<String>, String), ()> = HashMap::new();
        for path in storages.iter().chain(self.streams.iter().map(|(p, _)| p)) {
            if siblings.insert(sibling_key(path), ()).is_some() {
                return Err(Error::Validation(format!(
                    "duplicate sibling name in {:?}",
                    path.join("/")
                )));
            }
        }

        if self.sector_size == SECTOR_SIZE_V3 {
            for (path, data) in &self.streams {
                if data.len() as u64 > u32::MAX as u64 {
                    return Err(Error::Validation(format!(
                        "stream {:?} exceeds the representable size",
                        path.join("/")
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for ContainerWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split stream data across its chain's sectors within the image.
fn place(image: &mut [Vec<u8>], chain: &[u32], data: &[u8], sector_size: usize) {
    for (i, &sector) in chain.iter().enumerate() {
        let start = i * sector_size;
        if start >= data.len() {
            break;
        }
        let end = (start + sector_size).min(data.len());
        image[sector as usize][..end - start].copy_from_slice(&data[start..end]);
    }
}

fn prefixes(path: &[String]) -> impl Iterator<Item = &[String]> {
    (1..=path.len()).map(move |end| &path[..end])
}

fn parent_of(path: &[String]) -> &[String] {
    &path[..path.len().saturating_sub(1)]
}

/// Case-folded (parent path, entry name) pair for sibling uniqueness.
fn sibling_key(path: &[String]) -> (Vec<String>, String) {
    let mut folded: Vec<String> = path.iter().map(|s| s.to_uppercase()).collect();
    let name = folded.pop().unwrap_or_default();
    (folded, name)
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn eq_fold_paths(a: &[String], b: &[String]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.to_uppercase() == y.to_uppercase())
}
