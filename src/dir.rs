//! Directory tree parsing and path lookup.
//!
//! The directory stream is a sequence of fixed 128-byte records. Each
//! record names an entry (root, storage, or stream) and links to siblings
//! and children by SID; walking those links from the root's child yields
//! one tree rooted at "Root Entry". Sibling order is the in-order traversal
//! of the sibling links, which is name order for well-formed files.

use crate::alloc::SectorClass;
use crate::consts::*;
use crate::error::{Error, Result};
use fixedbitset::FixedBitSet;
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// Raw directory entry structure (128 bytes, on-disk layout)
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawDirEntry {
    /// Entry name in UTF-16LE (64 bytes, null-padded)
    name: [u8; 64],
    /// Length of name in bytes, including the null terminator
    name_len: U16<LE>,
    /// Entry kind (1 = storage, 2 = stream, 5 = root)
    kind: u8,
    /// Tree color byte (0 = red, 1 = black), kept for layout fidelity only
    color: u8,
    /// Left sibling SID
    sid_left: U32<LE>,
    /// Right sibling SID
    sid_right: U32<LE>,
    /// Child SID
    sid_child: U32<LE>,
    /// CLSID (16 bytes)
    clsid: [u8; 16],
    /// State bits
    state_bits: U32<LE>,
    /// Creation time (FILETIME)
    creation_time: U64<LE>,
    /// Modified time (FILETIME)
    modified_time: U64<LE>,
    /// Starting sector
    start_sector: U32<LE>,
    /// Stream size
    size: U64<LE>,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The root storage, owner of the mini stream
    Root,
    /// A storage: a named container of further entries
    Storage,
    /// A stream: a named byte sequence backed by a sector chain
    Stream,
}

/// One parsed directory entry, linked into the storage tree by SID.
#[derive(Debug, Clone)]
pub struct Entry {
    /// SID: index of this entry in the directory stream
    pub sid: u32,
    /// Entry name, decoded from UTF-16LE
    pub name: String,
    pub kind: EntryKind,
    /// Tree color byte, carried for layout fidelity
    pub color: u8,
    /// CLSID of this entry (all zeros when unset)
    pub clsid: [u8; 16],
    pub state_bits: u32,
    pub creation_time: u64,
    pub modified_time: u64,
    /// First sector of the entry's chain (mini stream chain for the root)
    pub start_sector: u32,
    /// Declared byte length
    pub size: u64,
    /// Parent SID; `None` only for the root
    pub parent: Option<u32>,
    /// Child SIDs in sibling order (storages and the root only)
    pub children: Vec<u32>,
}

impl Entry {
    /// Which allocation table this entry's payload resolves through.
    ///
    /// Streams below the cutoff live in the mini stream; everything else,
    /// including the root's mini stream itself, is chained through the FAT.
    pub fn sector_class(&self, cutoff: u32) -> SectorClass {
        if self.kind == EntryKind::Stream && self.size < cutoff as u64 {
            SectorClass::Small
        } else {
            SectorClass::Big
        }
    }

    pub fn is_stream(&self) -> bool {
        self.kind == EntryKind::Stream
    }

    pub fn is_storage(&self) -> bool {
        matches!(self.kind, EntryKind::Storage | EntryKind::Root)
    }
}

/// The directory tree of one container.
#[derive(Debug, Clone)]
pub struct DirTree {
    /// Entries indexed by SID; `None` for records excluded from the tree
    entries: Vec<Option<Entry>>,
    diagnostics: Vec<String>,
}

impl DirTree {
    /// Parse the directory stream and link the entries into one tree.
    ///
    /// Duplicate sibling names keep the first occurrence; later duplicates,
    /// unreachable records, and records of unknown kind are excluded from
    /// the namespace with a diagnostic. Sibling or child links that revisit
    /// a record are fatal.
    pub fn parse(dir_stream: &[u8], sector_size: usize) -> Result<Self> {
        let count = dir_stream.len() / DIR_ENTRY_SIZE;
        if count == 0 {
            return Err(Error::CorruptChain("empty directory stream".to_string()));
        }

        let mut raws = Vec::with_capacity(count);
        for sid in 0..count {
            let offset = sid * DIR_ENTRY_SIZE;
            let raw = RawDirEntry::read_from_bytes(&dir_stream[offset..offset + DIR_ENTRY_SIZE])
                .map_err(|_| {
                    Error::CorruptChain(format!("unreadable directory entry at SID {}", sid))
                })?;
            raws.push(raw);
        }

        if raws[0].kind != KIND_ROOT {
            return Err(Error::CorruptChain(
                "first directory entry is not the root storage".to_string(),
            ));
        }

        let mut tree = DirTree {
            entries: vec![None; count],
            diagnostics: Vec::new(),
        };
        let mut claimed = FixedBitSet::with_capacity(count);
        claimed.put(0);
        tree.entries[0] = Some(make_entry(&raws[0], 0, EntryKind::Root, None, sector_size));

        tree.attach_children(0, raws[0].sid_child.get(), &raws, &mut claimed, sector_size)?;

        // Records never reached from the root are orphans. Records reached
        // but excluded (duplicates, unknown kinds) are already noted.
        for (sid, raw) in raws.iter().enumerate() {
            if raw.kind != KIND_EMPTY && !claimed.contains(sid) {
                tree.note(format!(
                    "directory entry {:?} (SID {}) unreachable from the root; excluded",
                    decode_name(raw),
                    sid
                ));
            }
        }

        Ok(tree)
    }

    /// Link one storage's children, then recurse into child storages.
    fn attach_children(
        &mut self,
        parent_sid: u32,
        child_head: u32,
        raws: &[RawDirEntry],
        claimed: &mut FixedBitSet,
        sector_size: usize,
    ) -> Result<()> {
        let mut siblings = Vec::new();
        collect_in_order(child_head, raws, claimed, &mut siblings)?;

        let mut seen_names: Vec<String> = Vec::new();
        for sid in siblings {
            let raw = &raws[sid as usize];
            let kind = match raw.kind {
                KIND_STORAGE => EntryKind::Storage,
                KIND_STREAM => EntryKind::Stream,
                other => {
                    self.note(format!(
                        "directory entry at SID {} has kind {}; excluded",
                        sid, other
                    ));
                    continue;
                },
            };

            let entry = make_entry(raw, sid, kind, Some(parent_sid), sector_size);
            let folded = entry.name.to_uppercase();
            if seen_names.contains(&folded) {
                self.note(format!(
                    "duplicate sibling name {:?} at SID {}; keeping the first occurrence",
                    entry.name, sid
                ));
                continue;
            }
            seen_names.push(folded);

            self.entries[sid as usize] = Some(entry);
            if let Some(parent) = self.entries[parent_sid as usize].as_mut() {
                parent.children.push(sid);
            }

            if kind == EntryKind::Storage {
                self.attach_children(sid, raw.sid_child.get(), raws, claimed, sector_size)?;
            }
        }

        Ok(())
    }

    /// The root entry. Always present after a successful parse.
    pub fn root(&self) -> &Entry {
        self.entries[0].as_ref().expect("root entry is always parsed")
    }

    pub fn get(&self, sid: u32) -> Option<&Entry> {
        self.entries.get(sid as usize).and_then(|e| e.as_ref())
    }

    /// Entries directly under the given storage, in sibling order.
    pub fn children_of<'a>(&'a self, entry: &'a Entry) -> impl Iterator<Item = &'a Entry> {
        entry.children.iter().filter_map(|&sid| self.get(sid))
    }

    /// Resolve a case-insensitive, '/'-delimited path to an entry.
    ///
    /// The empty path (or "/") resolves to the root.
    pub fn lookup(&self, path: &str) -> Result<&Entry> {
        let mut current = self.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let folded = segment.to_uppercase();
            current = self
                .children_of(current)
                .find(|e| e.name.to_uppercase() == folded)
                .ok_or_else(|| Error::MissingStream(path.to_string()))?;
        }
        Ok(current)
    }

    /// '/'-joined paths of every stream, depth first in sibling order.
    pub fn stream_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.walk_paths(self.root(), &mut Vec::new(), &mut paths);
        paths
    }

    fn walk_paths(&self, entry: &Entry, prefix: &mut Vec<String>, out: &mut Vec<String>) {
        for child in self.children_of(entry) {
            prefix.push(child.name.clone());
            match child.kind {
                EntryKind::Stream => out.push(prefix.join("/")),
                _ => self.walk_paths(child, prefix, out),
            }
            prefix.pop();
        }
    }

    /// Path components of every storage (root excluded), depth first.
    pub fn storage_paths(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        let mut prefix = Vec::new();
        self.walk_storages(self.root(), &mut prefix, &mut paths);
        paths
    }

    fn walk_storages(&self, entry: &Entry, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        for child in self.children_of(entry) {
            if child.kind == EntryKind::Storage {
                prefix.push(child.name.clone());
                out.push(prefix.clone());
                self.walk_storages(child, prefix, out);
                prefix.pop();
            }
        }
    }

    /// Every entry linked into the tree, in SID order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter_map(|e| e.as_ref())
    }

    /// Non-fatal anomalies recorded while parsing.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    fn note(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.diagnostics.push(message);
    }
}

/// In-order traversal of the sibling links starting at `sid`.
///
/// Any SID visited twice, whether a sibling loop or a record claimed by two
/// storages, violates the one-parent invariant and is fatal.
fn collect_in_order(
    sid: u32,
    raws: &[RawDirEntry],
    claimed: &mut FixedBitSet,
    out: &mut Vec<u32>,
) -> Result<()> {
    if sid == NO_STREAM {
        return Ok(());
    }
    if sid as usize >= raws.len() {
        return Err(Error::CorruptChain(format!(
            "directory sibling link to SID {} outside {} entries",
            sid,
            raws.len()
        )));
    }
    if claimed.put(sid as usize) {
        return Err(Error::CorruptChain(format!(
            "directory entry at SID {} reachable twice",
            sid
        )));
    }

    let raw = &raws[sid as usize];
    collect_in_order(raw.sid_left.get(), raws, claimed, out)?;
    out.push(sid);
    collect_in_order(raw.sid_right.get(), raws, claimed, out)?;
    Ok(())
}

fn make_entry(
    raw: &RawDirEntry,
    sid: u32,
    kind: EntryKind,
    parent: Option<u32>,
    sector_size: usize,
) -> Entry {
    // 512-byte-sector files only define the low 32 bits of the size field.
    let size = if sector_size == SECTOR_SIZE_V3 {
        raw.size.get() & 0xFFFF_FFFF
    } else {
        raw.size.get()
    };

    Entry {
        sid,
        name: decode_name(raw),
        kind,
        color: raw.color,
        clsid: raw.clsid,
        state_bits: raw.state_bits.get(),
        creation_time: raw.creation_time.get(),
        modified_time: raw.modified_time.get(),
        start_sector: raw.start_sector.get(),
        size,
        parent,
        children: Vec::new(),
    }
}

/// Decode an entry name from UTF-16LE, dropping the null terminator.
fn decode_name(raw: &RawDirEntry) -> String {
    let len = (raw.name_len.get() as usize).min(64);
    let bytes = &raw.name[..len.saturating_sub(2)];
    let (text, _, _) = encoding_rs::UTF_16LE.decode(bytes);
    text.trim_end_matches('\0').to_string()
}
