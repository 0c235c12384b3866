//! Directory tree generation.
//!
//! Entries are registered by path; missing parent storages are created on
//! the way. At render time each storage's children are sorted by name
//! length, then case-insensitive name, and linked into a balanced binary
//! search tree whose in-order traversal is that sorted order. Records are
//! serialized in SID order, 128 bytes each.

use crate::consts::*;
use std::collections::HashMap;

/// One pending 128-byte directory record.
#[derive(Debug, Clone)]
struct EntryRecord {
    name: String,
    kind: u8,
    start_sector: u32,
    size: u64,
    sid_left: u32,
    sid_right: u32,
    sid_child: u32,
    clsid: [u8; 16],
}

impl EntryRecord {
    fn root(ministream_start: u32, ministream_size: u64) -> Self {
        Self {
            name: "Root Entry".to_string(),
            kind: KIND_ROOT,
            start_sector: ministream_start,
            size: ministream_size,
            sid_left: NO_STREAM,
            sid_right: NO_STREAM,
            sid_child: NO_STREAM,
            clsid: [0; 16],
        }
    }

    fn storage(name: String) -> Self {
        Self {
            name,
            kind: KIND_STORAGE,
            start_sector: 0,
            size: 0,
            sid_left: NO_STREAM,
            sid_right: NO_STREAM,
            sid_child: NO_STREAM,
            clsid: [0; 16],
        }
    }

    fn stream(name: String, start_sector: u32, size: u64) -> Self {
        Self {
            name,
            kind: KIND_STREAM,
            start_sector,
            size,
            sid_left: NO_STREAM,
            sid_right: NO_STREAM,
            sid_child: NO_STREAM,
            clsid: [0; 16],
        }
    }

    fn render(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut data = [0u8; DIR_ENTRY_SIZE];

        let utf16: Vec<u16> = self.name.encode_utf16().collect();
        let unit_count = utf16.len().min(MAX_NAME_UNITS);
        for (i, &unit) in utf16.iter().take(unit_count).enumerate() {
            data[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        // Name length in bytes, including the null terminator.
        let name_len = ((unit_count + 1) * 2) as u16;
        data[64..66].copy_from_slice(&name_len.to_le_bytes());

        data[66] = self.kind;
        // Color byte: black. Readers only require a traversable tree.
        data[67] = 1;
        data[68..72].copy_from_slice(&self.sid_left.to_le_bytes());
        data[72..76].copy_from_slice(&self.sid_right.to_le_bytes());
        data[76..80].copy_from_slice(&self.sid_child.to_le_bytes());
        data[80..96].copy_from_slice(&self.clsid);
        // State bits and FILETIME stamps stay zero.
        data[116..120].copy_from_slice(&self.start_sector.to_le_bytes());
        data[120..128].copy_from_slice(&self.size.to_le_bytes());

        data
    }
}

/// Directory stream builder.
pub struct DirTreeBuilder {
    /// Records in SID order; the root is SID 0
    records: Vec<EntryRecord>,
    /// Uppercased path components to storage SID
    path_to_sid: HashMap<Vec<String>, u32>,
    /// Child SIDs per parent SID, in registration order
    children: HashMap<u32, Vec<u32>>,
}

impl DirTreeBuilder {
    pub fn new(ministream_start: u32, ministream_size: u64) -> Self {
        let mut path_to_sid = HashMap::new();
        path_to_sid.insert(Vec::new(), 0);
        Self {
            records: vec![EntryRecord::root(ministream_start, ministream_size)],
            path_to_sid,
            children: HashMap::new(),
        }
    }

    pub fn set_root_clsid(&mut self, clsid: [u8; 16]) {
        self.records[0].clsid = clsid;
    }

    fn fold(path: &[String]) -> Vec<String> {
        path.iter().map(|s| s.to_uppercase()).collect()
    }

    /// Ensure a storage path exists, creating missing storages on the way.
    /// Returns the SID of the storage at the full path.
    pub fn add_storage(&mut self, path: &[String]) -> u32 {
        let mut parent_sid = 0u32;
        let mut folded = Vec::new();

        for component in path {
            folded.push(component.to_uppercase());
            if let Some(&sid) = self.path_to_sid.get(&folded) {
                parent_sid = sid;
                continue;
            }

            let sid = self.records.len() as u32;
            self.records.push(EntryRecord::storage(component.clone()));
            self.path_to_sid.insert(folded.clone(), sid);
            self.children.entry(parent_sid).or_default().push(sid);
            parent_sid = sid;
        }

        parent_sid
    }

    /// Register a stream at its full path. Returns the stream's SID.
    pub fn add_stream(&mut self, path: &[String], start_sector: u32, size: u64) -> u32 {
        debug_assert!(!path.is_empty(), "stream path must not be empty");
        let parent_sid = self.add_storage(&path[..path.len() - 1]);

        let name = path.last().cloned().unwrap_or_default();
        let sid = self.records.len() as u32;
        self.records.push(EntryRecord::stream(name, start_sector, size));
        self.children.entry(parent_sid).or_default().push(sid);
        sid
    }

    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    /// Link every storage's children and serialize the records in SID order.
    pub fn render(&mut self) -> Vec<u8> {
        for parent_sid in 0..self.records.len() as u32 {
            let kind = self.records[parent_sid as usize].kind;
            if kind != KIND_ROOT && kind != KIND_STORAGE {
                continue;
            }

            let mut sorted = self
                .children
                .get(&parent_sid)
                .cloned()
                .unwrap_or_default();
            sorted.sort_by(|&a, &b| {
                let left = &self.records[a as usize].name;
                let right = &self.records[b as usize].name;
                left.encode_utf16()
                    .count()
                    .cmp(&right.encode_utf16().count())
                    .then_with(|| left.to_uppercase().cmp(&right.to_uppercase()))
            });
            let head = link_balanced(&sorted, &mut self.records);
            self.records[parent_sid as usize].sid_child = head;
        }

        let mut data = Vec::with_capacity(self.records.len() * DIR_ENTRY_SIZE);
        for record in &self.records {
            data.extend_from_slice(&record.render());
        }
        data
    }
}

/// Link sorted siblings into a balanced BST; the midpoint of each range
/// becomes the subtree head. In-order traversal restores sorted order.
fn link_balanced(sorted: &[u32], records: &mut [EntryRecord]) -> u32 {
    if sorted.is_empty() {
        return NO_STREAM;
    }
    let mid = sorted.len() / 2;
    let sid = sorted[mid];
    let left = link_balanced(&sorted[..mid], records);
    let right = link_balanced(&sorted[mid + 1..], records);
    records[sid as usize].sid_left = left;
    records[sid as usize].sid_right = right;
    sid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_record_layout() {
        let mut dir = DirTreeBuilder::new(END_OF_CHAIN, 0);
        let data = dir.render();
        assert_eq!(data.len(), DIR_ENTRY_SIZE);
        // "Root Entry" is 10 characters, 22 bytes with the terminator.
        assert_eq!(&data[64..66], &22u16.to_le_bytes());
        assert_eq!(data[66], KIND_ROOT);
        assert_eq!(&data[76..80], &NO_STREAM.to_le_bytes());
    }

    #[test]
    fn streams_link_from_root() {
        let mut dir = DirTreeBuilder::new(0, 128);
        let sid = dir.add_stream(&["Workbook".to_string()], 5, 1024);
        assert_eq!(sid, 1);
        assert_eq!(dir.entry_count(), 2);

        let data = dir.render();
        assert_eq!(data.len(), 2 * DIR_ENTRY_SIZE);
        // Root's child points at the stream.
        assert_eq!(&data[76..80], &1u32.to_le_bytes());
        assert_eq!(&data[128 + 116..128 + 120], &5u32.to_le_bytes());
        assert_eq!(&data[128 + 120..128 + 128], &1024u64.to_le_bytes());
    }

    #[test]
    fn implicit_parents_are_created_once() {
        let mut dir = DirTreeBuilder::new(END_OF_CHAIN, 0);
        dir.add_stream(
            &["Macros".to_string(), "Module1".to_string()],
            0,
            10,
        );
        dir.add_stream(
            &["macros".to_string(), "Module2".to_string()],
            1,
            20,
        );
        // Root + one storage + two streams.
        assert_eq!(dir.entry_count(), 4);
    }

    #[test]
    fn siblings_sort_by_length_then_name() {
        let mut dir = DirTreeBuilder::new(END_OF_CHAIN, 0);
        let wb = dir.add_stream(&["WorkbookXYZ".to_string()], 0, 1);
        let short = dir.add_stream(&["Data".to_string()], 1, 1);
        let other = dir.add_stream(&["DOCS".to_string()], 2, 1);
        let data = dir.render();

        // Sorted order: Data, DOCS, WorkbookXYZ; midpoint DOCS is the head.
        let child = u32::from_le_bytes(data[76..80].try_into().unwrap());
        assert_eq!(child, other);
        let head = other as usize * DIR_ENTRY_SIZE;
        let left = u32::from_le_bytes(data[head + 68..head + 72].try_into().unwrap());
        let right = u32::from_le_bytes(data[head + 72..head + 76].try_into().unwrap());
        assert_eq!(left, short);
        assert_eq!(right, wb);
    }
}
