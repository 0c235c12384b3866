//! Compound file facade.
//!
//! [`CompoundFile`] orchestrates open (header, then allocation tables, then
//! directory tree, then a whole-file chain audit) and write (staged streams
//! handed to the writer, which regenerates every table and sector). Stream
//! reads are always whole-stream: record-level parsers need random access
//! across sector boundaries, and these files are small enough that eager
//! materialization is simpler and no less correct than sector-relative
//! seeking.

use crate::alloc::{AllocTable, SectorChain, SectorClass};
use crate::consts::*;
use crate::dir::{DirTree, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::sector::{Block, SectorRole, SectorStore};
use crate::writer::ContainerWriter;
use bytes::Bytes;
use fixedbitset::FixedBitSet;
use once_cell::unsync::OnceCell;
use std::io::{Read, Write};
use std::path::Path;
use zerocopy::{FromBytes, LE, U32};

/// Check whether data begins with the compound file magic signature.
pub fn is_compound_file(data: &[u8]) -> bool {
    data.len() >= MINIMAL_FILE_SIZE && &data[0..8] == MAGIC
}

/// An opened compound file.
///
/// One instance is single-threaded and has no internal synchronization;
/// concurrent reads from distinct instances over the same bytes are safe
/// because the sector store is immutable. Mutation never touches the source
/// bytes: staged streams are held in memory and [`CompoundFile::write`]
/// regenerates the whole container into the destination.
pub struct CompoundFile {
    store: SectorStore,
    header: Header,
    fat: AllocTable,
    minifat: AllocTable,
    tree: DirTree,
    /// Role of every big sector, assigned by the open-time audit
    roles: Vec<SectorRole>,
    /// Mini stream content, materialized on first small-stream read
    ministream: OnceCell<Vec<u8>>,
    /// Staged stream writes in insertion order (path components, bytes)
    staged: Vec<(Vec<String>, Vec<u8>)>,
    diagnostics: Vec<String>,
}

impl CompoundFile {
    /// Open a compound file, reading the source to its end.
    pub fn open<R: Read>(mut source: R) -> Result<Self> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Open a compound file from a filesystem path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(std::fs::File::open(path)?)
    }

    /// Open a compound file over fully loaded container bytes.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = data.into();
        if data.len() < MINIMAL_FILE_SIZE {
            return Err(Error::MalformedHeader(format!(
                "container of {} bytes is below the {} byte minimum",
                data.len(),
                MINIMAL_FILE_SIZE
            )));
        }

        let header = Header::parse(&data)?;
        let store = SectorStore::new(data, header.sector_size);

        let (fat_locations, difat_locations) = fat_sector_locations(&header, &store)?;
        let fat = load_fat(&store, &fat_locations)?;

        let dir_chain = fat.walk(header.first_dir_sector)?;
        let dir_bytes = concat_chain(&store, &dir_chain)?;
        let tree = DirTree::parse(&dir_bytes, header.sector_size)?;

        let (minifat, minifat_chain) = load_minifat(&header, &store, &fat)?;

        let mut file = CompoundFile {
            store,
            header,
            fat,
            minifat,
            tree,
            roles: Vec::new(),
            ministream: OnceCell::new(),
            staged: Vec::new(),
            diagnostics: Vec::new(),
        };
        file.diagnostics.extend_from_slice(file.tree.diagnostics());
        file.audit(&fat_locations, &difat_locations, &dir_chain, &minifat_chain)?;

        Ok(file)
    }

    /// Build a container holding only a root entry.
    pub fn create_empty() -> Result<Self> {
        let mut buffer = Vec::new();
        ContainerWriter::new().write_to(&mut buffer)?;
        Self::from_bytes(buffer)
    }

    /// Resolve every chain once and assign each sector exactly one role.
    ///
    /// A sector claimed by two chains, an out-of-range index, or a cycle is
    /// fatal here; allocated sectors claimed by no chain become orphans with
    /// a diagnostic.
    fn audit(
        &mut self,
        fat_locations: &[u32],
        difat_locations: &[u32],
        dir_chain: &SectorChain,
        minifat_chain: &SectorChain,
    ) -> Result<()> {
        fn claim(roles: &mut [SectorRole], index: u32, role: SectorRole) -> Result<()> {
            let slot = roles.get_mut(index as usize).ok_or_else(|| {
                Error::CorruptChain(format!("sector {} outside the container", index))
            })?;
            if *slot != SectorRole::Free {
                return Err(Error::CorruptChain(format!(
                    "sector {} belongs to more than one chain",
                    index
                )));
            }
            *slot = role;
            Ok(())
        }

        let count = self.store.sector_count() as usize;
        let mut roles = vec![SectorRole::Free; count];

        for &sector in fat_locations.iter().chain(difat_locations) {
            claim(&mut roles, sector, SectorRole::Table)?;
        }
        for &sector in dir_chain {
            claim(&mut roles, sector, SectorRole::Directory)?;
        }
        for &sector in minifat_chain {
            claim(&mut roles, sector, SectorRole::Table)?;
        }

        let root = self.tree.root();
        for &sector in &self.fat.chain(root.start_sector, root.size)? {
            claim(&mut roles, sector, SectorRole::Payload)?;
        }

        let cutoff = self.header.mini_stream_cutoff;
        let streams: Vec<(u32, u64, SectorClass)> = self
            .tree
            .entries()
            .filter(|e| e.is_stream())
            .map(|e| (e.start_sector, e.size, e.sector_class(cutoff)))
            .collect();
        for (start, size, class) in streams {
            match class {
                SectorClass::Big => {
                    for &sector in &self.fat.chain(start, size)? {
                        claim(&mut roles, sector, SectorRole::Payload)?;
                    }
                },
                // Mini chains are audited for integrity; mini sectors live
                // inside the mini stream and occupy no big sector of their own.
                SectorClass::Small => {
                    self.minifat.chain(start, size)?;
                },
            }
        }

        for index in 0..count.min(self.fat.len()) {
            if roles[index] == SectorRole::Free
                && self.fat.entry(index as u32).is_some_and(|e| e != FREE_SECT)
            {
                roles[index] = SectorRole::Orphan;
                let message = format!("sector {} is allocated but claimed by no chain", index);
                tracing::warn!("{}", message);
                self.diagnostics.push(message);
            }
        }

        self.roles = roles;
        Ok(())
    }

    /// Parsed container header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The root storage entry.
    pub fn root(&self) -> &Entry {
        self.tree.root()
    }

    /// Resolve a path to its directory entry.
    pub fn entry(&self, path: &str) -> Result<&Entry> {
        self.tree.lookup(path)
    }

    /// Role assigned to a big sector by the open-time audit.
    pub fn sector_role(&self, index: u32) -> Option<SectorRole> {
        self.roles.get(index as usize).copied()
    }

    /// Non-fatal anomalies recorded while opening.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Read a whole stream by its case-insensitive, '/'-delimited path.
    ///
    /// Staged [`CompoundFile::put_stream`] bytes shadow container bytes of
    /// the same path.
    pub fn get_stream(&self, path: &str) -> Result<Vec<u8>> {
        let segments = split_path(path);
        if segments.is_empty() {
            return Err(Error::MissingStream(path.to_string()));
        }
        if let Some(data) = self.staged_lookup(&segments) {
            return Ok(data.to_vec());
        }

        let entry = self.tree.lookup(path)?;
        if entry.kind != EntryKind::Stream {
            return Err(Error::MissingStream(path.to_string()));
        }
        self.read_entry(entry)
    }

    /// Names of the streams directly inside the storage at `path`
    /// (the root for an empty path), staged streams included.
    pub fn list_streams(&self, path: &str) -> Result<Vec<String>> {
        let prefix = split_path(path);
        let mut names = Vec::new();
        let mut storage_exists = prefix.is_empty();

        if let Ok(entry) = self.tree.lookup(path) {
            if entry.is_storage() {
                storage_exists = true;
                for child in self.tree.children_of(entry).filter(|e| e.is_stream()) {
                    names.push(child.name.clone());
                }
            }
        }

        for (segments, _) in &self.staged {
            if segments.len() > prefix.len() && eq_fold_slices(&segments[..prefix.len()], &prefix) {
                // Staging a deeper path implies every storage on the way.
                storage_exists = true;
                if segments.len() == prefix.len() + 1 {
                    let name = &segments[prefix.len()];
                    if !names.iter().any(|n| eq_fold(n, name)) {
                        names.push(name.clone());
                    }
                }
            }
        }

        if !storage_exists {
            return Err(Error::MissingStream(path.to_string()));
        }
        Ok(names)
    }

    /// `(name, kind)` of every entry directly inside the storage at `path`,
    /// staged streams and their implied storages included.
    pub fn list_entries(&self, path: &str) -> Result<Vec<(String, EntryKind)>> {
        let prefix = split_path(path);
        let mut entries = Vec::new();
        let mut storage_exists = prefix.is_empty();

        if let Ok(entry) = self.tree.lookup(path) {
            if entry.is_storage() {
                storage_exists = true;
                for child in self.tree.children_of(entry) {
                    entries.push((child.name.clone(), child.kind));
                }
            }
        }

        for (segments, _) in &self.staged {
            if segments.len() > prefix.len() && eq_fold_slices(&segments[..prefix.len()], &prefix) {
                storage_exists = true;
                let name = &segments[prefix.len()];
                let kind = if segments.len() == prefix.len() + 1 {
                    EntryKind::Stream
                } else {
                    EntryKind::Storage
                };
                if !entries.iter().any(|(n, _)| eq_fold(n, name)) {
                    entries.push((name.clone(), kind));
                }
            }
        }

        if !storage_exists {
            return Err(Error::MissingStream(path.to_string()));
        }
        Ok(entries)
    }

    /// '/'-joined paths of every stream, staged streams included.
    pub fn stream_paths(&self) -> Vec<String> {
        let mut paths = self.tree.stream_paths();
        for (segments, _) in &self.staged {
            let joined = segments.join("/");
            if !paths.iter().any(|p| eq_fold(p, &joined)) {
                paths.push(joined);
            }
        }
        paths
    }

    /// Stage a stream insertion or replacement. No effect on the source
    /// bytes; the change is serialized by [`CompoundFile::write`].
    pub fn put_stream(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let segments = split_path(path);
        if segments.is_empty() {
            return Err(Error::Validation("empty stream path".to_string()));
        }
        if let Some(slot) = self
            .staged
            .iter_mut()
            .find(|(p, _)| eq_fold_slices(p, &segments))
        {
            slot.1 = data.to_vec();
        } else {
            self.staged.push((segments, data.to_vec()));
        }
        Ok(())
    }

    /// Serialize the logical stream set (container streams overlaid with
    /// staged writes) into a fresh container.
    ///
    /// Two-phase: validation first, then allocation and sequential emission.
    /// Any validation failure aborts before a byte reaches the destination.
    pub fn write<W: Write>(&self, destination: &mut W) -> Result<()> {
        let mut writer = ContainerWriter::with_sector_size(self.header.sector_size);
        writer.set_root_clsid(self.tree.root().clsid);

        for storage in self.tree.storage_paths() {
            writer.add_storage_segments(&storage)?;
        }
        for path in self.tree.stream_paths() {
            let segments = split_path(&path);
            if self.staged_lookup(&segments).is_some() {
                continue;
            }
            let entry = self.tree.lookup(&path)?;
            let data = self.read_entry(entry)?;
            writer.add_stream_segments(&segments, &data)?;
        }
        for (segments, data) in &self.staged {
            writer.add_stream_segments(segments, data)?;
        }

        writer.write_to(destination)
    }

    /// Write the container to a file path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut buffered = std::io::BufWriter::new(file);
        self.write(&mut buffered)?;
        buffered.flush()?;
        Ok(())
    }

    fn staged_lookup(&self, segments: &[String]) -> Option<&[u8]> {
        self.staged
            .iter()
            .rev()
            .find(|(p, _)| eq_fold_slices(p, segments))
            .map(|(_, data)| data.as_slice())
    }

    fn read_entry(&self, entry: &Entry) -> Result<Vec<u8>> {
        match entry.sector_class(self.header.mini_stream_cutoff) {
            SectorClass::Big => self.read_big(entry),
            SectorClass::Small => self.read_small(entry),
        }
    }

    /// Concatenate a FAT-chained stream through bound sector blocks.
    fn read_big(&self, entry: &Entry) -> Result<Vec<u8>> {
        let chain = self.fat.chain(entry.start_sector, entry.size)?;
        let mut data = Vec::with_capacity(chain.len() * self.header.sector_size);
        for (i, &index) in chain.iter().enumerate() {
            let mut block = Block::bind(&self.store, index)?;
            block.set_role(self.sector_role(index).unwrap_or(SectorRole::Orphan));
            block.link(chain.get(i + 1).copied().unwrap_or(END_OF_CHAIN));
            match block.role() {
                SectorRole::Table | SectorRole::Orphan => {
                    return Err(Error::CorruptChain(format!(
                        "payload chain crosses {:?} sector {}",
                        block.role(),
                        index
                    )));
                },
                _ => data.extend_from_slice(block.bytes()),
            }
        }
        data.truncate(entry.size as usize);
        Ok(data)
    }

    /// Slice a MiniFAT-chained stream out of the mini stream.
    fn read_small(&self, entry: &Entry) -> Result<Vec<u8>> {
        let ministream = self.ministream()?;
        let chain = self.minifat.chain(entry.start_sector, entry.size)?;
        let mini = self.header.mini_sector_size;
        let mut data = Vec::with_capacity(chain.len() * mini);
        for &index in &chain {
            let offset = index as usize * mini;
            if offset + mini > ministream.len() {
                return Err(Error::CorruptChain(format!(
                    "mini sector {} outside the mini stream",
                    index
                )));
            }
            data.extend_from_slice(&ministream[offset..offset + mini]);
        }
        data.truncate(entry.size as usize);
        Ok(data)
    }

    fn ministream(&self) -> Result<&Vec<u8>> {
        self.ministream.get_or_try_init(|| {
            let root = self.tree.root();
            let chain = self.fat.chain(root.start_sector, root.size)?;
            concat_chain(&self.store, &chain)
        })
    }
}

/// FAT sector locations: 109 inline header slots, continued in the DIFAT
/// sector chain for large containers. Returns the FAT locations and the
/// DIFAT sectors themselves.
fn fat_sector_locations(header: &Header, store: &SectorStore) -> Result<(Vec<u32>, Vec<u32>)> {
    let mut locations = Vec::new();
    for &sector in &header.difat_head {
        if sector == FREE_SECT || sector == END_OF_CHAIN {
            break;
        }
        locations.push(sector);
    }

    let mut difat_sectors = Vec::new();
    let per_sector = store.sector_size() / 4 - 1;
    let mut guard = FixedBitSet::with_capacity(store.sector_count() as usize + 1);
    let mut sector = header.first_difat_sector;
    for _ in 0..header.num_difat_sectors {
        if sector == END_OF_CHAIN || sector == FREE_SECT {
            break;
        }
        if sector >= store.sector_count() {
            return Err(Error::CorruptChain(format!(
                "DIFAT sector {} outside the container",
                sector
            )));
        }
        if guard.put(sector as usize) {
            return Err(Error::CorruptChain(format!(
                "DIFAT chain revisits sector {}",
                sector
            )));
        }
        difat_sectors.push(sector);

        let data = store.sector(sector)?;
        for i in 0..per_sector {
            let location = read_u32(&data, i * 4);
            if location == FREE_SECT || location == END_OF_CHAIN {
                break;
            }
            locations.push(location);
        }
        sector = read_u32(&data, per_sector * 4);
    }

    Ok((locations, difat_sectors))
}

/// Read the FAT sectors into one entry table.
fn load_fat(store: &SectorStore, locations: &[u32]) -> Result<AllocTable> {
    let entries_per_sector = store.sector_size() / 4;
    let mut entries = Vec::with_capacity(locations.len() * entries_per_sector);
    for &location in locations {
        let data = store.sector(location)?;
        for i in 0..entries_per_sector {
            entries.push(read_u32(&data, i * 4));
        }
    }
    Ok(AllocTable::new(
        entries,
        SectorClass::Big,
        store.sector_size(),
    ))
}

/// Read the MiniFAT stream (FAT-chained) into its own entry table.
fn load_minifat(
    header: &Header,
    store: &SectorStore,
    fat: &AllocTable,
) -> Result<(AllocTable, SectorChain)> {
    let chain = if header.num_minifat_sectors > 0 && header.first_minifat_sector != END_OF_CHAIN {
        fat.chain(
            header.first_minifat_sector,
            header.num_minifat_sectors as u64 * store.sector_size() as u64,
        )?
    } else {
        SectorChain::new()
    };

    let data = concat_chain(store, &chain)?;
    let mut entries = Vec::with_capacity(data.len() / 4);
    for i in 0..data.len() / 4 {
        entries.push(read_u32(&data, i * 4));
    }
    Ok((
        AllocTable::new(entries, SectorClass::Small, header.mini_sector_size),
        chain,
    ))
}

fn concat_chain(store: &SectorStore, chain: &SectorChain) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(chain.len() * store.sector_size());
    for &index in chain {
        data.extend_from_slice(&store.sector(index)?);
    }
    Ok(data)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    U32::<LE>::read_from_bytes(&data[offset..offset + 4])
        .map(|v| v.get())
        .unwrap_or(0)
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn eq_fold(a: &str, b: &str) -> bool {
    a.to_uppercase() == b.to_uppercase()
}

fn eq_fold_slices(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq_fold(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_empty_has_only_root() {
        let file = CompoundFile::create_empty().unwrap();
        assert_eq!(file.root().kind, EntryKind::Root);
        assert!(file.list_streams("").unwrap().is_empty());
        assert!(file.stream_paths().is_empty());
        assert!(file.diagnostics().is_empty());
    }

    #[test]
    fn staged_stream_is_visible_before_write() {
        let mut file = CompoundFile::create_empty().unwrap();
        file.put_stream("Workbook", b"records").unwrap();
        assert_eq!(file.get_stream("Workbook").unwrap(), b"records");
        assert_eq!(file.list_streams("").unwrap(), vec!["Workbook"]);

        file.put_stream("Workbook", b"replaced").unwrap();
        assert_eq!(file.get_stream("workbook").unwrap(), b"replaced");
        assert_eq!(file.list_streams("").unwrap().len(), 1);
    }

    #[test]
    fn staged_nested_path_implies_storage() {
        let mut file = CompoundFile::create_empty().unwrap();
        file.put_stream("Macros/VBA/Module1", b"Sub Main").unwrap();
        assert_eq!(file.list_streams("Macros/VBA").unwrap(), vec!["Module1"]);
        assert_eq!(
            file.list_entries("").unwrap(),
            vec![("Macros".to_string(), EntryKind::Storage)]
        );
        assert!(matches!(
            file.list_streams("Other"),
            Err(Error::MissingStream(_))
        ));
    }

    #[test]
    fn missing_stream_is_recoverable() {
        let file = CompoundFile::create_empty().unwrap();
        assert!(matches!(
            file.get_stream("Foo"),
            Err(Error::MissingStream(_))
        ));
    }

    #[test]
    fn empty_put_path_is_rejected() {
        let mut file = CompoundFile::create_empty().unwrap();
        assert!(matches!(
            file.put_stream("//", b"x"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn sniffs_magic_signature() {
        let mut buffer = Vec::new();
        CompoundFile::create_empty()
            .unwrap()
            .write(&mut buffer)
            .unwrap();
        assert!(is_compound_file(&buffer));
        assert!(!is_compound_file(b"PK\x03\x04"));
    }

    #[test]
    fn undersized_container_is_malformed() {
        assert!(matches!(
            CompoundFile::from_bytes(vec![0u8; 100]),
            Err(Error::MalformedHeader(_))
        ));
    }

    fn write_dir_record(slot: &mut [u8], name: &str, kind: u8, child: u32, start: u32, size: u64) {
        let utf16: Vec<u16> = name.encode_utf16().collect();
        for (i, &unit) in utf16.iter().enumerate() {
            slot[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        slot[64..66].copy_from_slice(&(((utf16.len() + 1) * 2) as u16).to_le_bytes());
        slot[66] = kind;
        slot[67] = 1;
        slot[68..72].copy_from_slice(&NO_STREAM.to_le_bytes());
        slot[72..76].copy_from_slice(&NO_STREAM.to_le_bytes());
        slot[76..80].copy_from_slice(&child.to_le_bytes());
        slot[116..120].copy_from_slice(&start.to_le_bytes());
        slot[120..128].copy_from_slice(&size.to_le_bytes());
    }

    #[test]
    fn reads_foreign_layout_with_header_cutoff() {
        // Hand-built container: FAT at sector 0, directory at 1, sector 2
        // free, and a 600-byte stream chained 3 -> 4. The header declares a
        // 512-byte cutoff, so the stream resolves through the FAT.
        let mut data = vec![0u8; 512 * 6];
        data[0..8].copy_from_slice(MAGIC);
        data[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
        data[26..28].copy_from_slice(&3u16.to_le_bytes());
        data[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
        data[30..32].copy_from_slice(&9u16.to_le_bytes());
        data[32..34].copy_from_slice(&6u16.to_le_bytes());
        data[44..48].copy_from_slice(&1u32.to_le_bytes());
        data[48..52].copy_from_slice(&1u32.to_le_bytes());
        data[56..60].copy_from_slice(&512u32.to_le_bytes());
        data[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
        data[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
        for i in 0..HEADER_DIFAT_ENTRIES {
            let offset = 76 + i * 4;
            data[offset..offset + 4].copy_from_slice(&FREE_SECT.to_le_bytes());
        }
        data[76..80].copy_from_slice(&0u32.to_le_bytes());

        let fat = [FAT_SECT, END_OF_CHAIN, FREE_SECT, 4, END_OF_CHAIN];
        for (i, entry) in fat.iter().enumerate() {
            data[512 + i * 4..512 + i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
        }
        for i in fat.len()..128 {
            data[512 + i * 4..512 + i * 4 + 4].copy_from_slice(&FREE_SECT.to_le_bytes());
        }

        let (root_slot, rest) = data[1024..].split_at_mut(128);
        write_dir_record(root_slot, "Root Entry", KIND_ROOT, 1, END_OF_CHAIN, 0);
        write_dir_record(&mut rest[..128], "Workbook", KIND_STREAM, NO_STREAM, 3, 600);

        data[512 * 4..512 * 5].fill(0xAB);
        data[512 * 5..512 * 6].fill(0xCD);

        let file = CompoundFile::from_bytes(data).unwrap();
        let stream = file.get_stream("Workbook").unwrap();
        assert_eq!(stream.len(), 600);
        assert!(stream[..512].iter().all(|&b| b == 0xAB));
        assert!(stream[512..].iter().all(|&b| b == 0xCD));

        assert_eq!(file.sector_role(0), Some(SectorRole::Table));
        assert_eq!(file.sector_role(1), Some(SectorRole::Directory));
        assert_eq!(file.sector_role(2), Some(SectorRole::Free));
        assert_eq!(file.sector_role(3), Some(SectorRole::Payload));
    }

    #[test]
    fn fat_entry_at_sector_count_is_corrupt_on_open() {
        let mut file = CompoundFile::create_empty().unwrap();
        file.put_stream("Big", &[0x5Au8; 5000]).unwrap();
        let mut buffer = Vec::new();
        file.write(&mut buffer).unwrap();

        let reopened = CompoundFile::from_bytes(buffer.clone()).unwrap();
        let start = reopened.entry("Big").unwrap().start_sector;
        let total = reopened.store.sector_count();

        // Point the stream's first FAT entry one past the last sector.
        let offset = HEADER_SIZE + start as usize * 4;
        buffer[offset..offset + 4].copy_from_slice(&total.to_le_bytes());
        assert!(matches!(
            CompoundFile::from_bytes(buffer),
            Err(Error::CorruptChain(_))
        ));
    }
}
