//! Integration tests for the writer.
//!
//! Containers are built with [`ContainerWriter`] or the facade, then
//! reopened with the reader to check names, bytes, and allocator placement.

use super::ContainerWriter;
use crate::alloc::SectorClass;
use crate::consts::*;
use crate::error::Error;
use crate::file::{CompoundFile, is_compound_file};
use proptest::prelude::*;

fn write_to_vec(writer: &ContainerWriter) -> Vec<u8> {
    let mut buffer = Vec::new();
    writer.write_to(&mut buffer).unwrap();
    buffer
}

#[test]
fn simple_round_trip() {
    let mut writer = ContainerWriter::new();
    writer.add_stream("TestStream", b"Hello, World!").unwrap();

    let data = write_to_vec(&writer);
    assert!(data.len() >= MINIMAL_FILE_SIZE);
    assert!(is_compound_file(&data));

    let file = CompoundFile::from_bytes(data).unwrap();
    assert_eq!(file.get_stream("TestStream").unwrap(), b"Hello, World!");
}

#[test]
fn empty_container_is_minimal() {
    let data = write_to_vec(&ContainerWriter::new());
    // Header + one FAT sector + one directory sector.
    assert_eq!(data.len(), MINIMAL_FILE_SIZE);

    let file = CompoundFile::from_bytes(data).unwrap();
    assert!(file.list_streams("").unwrap().is_empty());
}

#[test]
fn multiple_streams_round_trip() {
    let mut writer = ContainerWriter::new();
    writer.add_stream("Small1", b"Small").unwrap();
    writer.add_stream("Small2", b"Data").unwrap();
    writer.add_stream("Large1", &vec![0xAAu8; 5000]).unwrap();
    writer.add_stream("Large2", &vec![0xBBu8; 10000]).unwrap();

    let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
    assert_eq!(file.get_stream("Small1").unwrap(), b"Small");
    assert_eq!(file.get_stream("Small2").unwrap(), b"Data");

    let large1 = file.get_stream("Large1").unwrap();
    assert_eq!(large1.len(), 5000);
    assert!(large1.iter().all(|&b| b == 0xAA));

    let large2 = file.get_stream("Large2").unwrap();
    assert_eq!(large2.len(), 10000);
    assert!(large2.iter().all(|&b| b == 0xBB));
}

#[test]
fn empty_stream_round_trip() {
    let mut writer = ContainerWriter::new();
    writer.add_stream("Empty", b"").unwrap();

    let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
    assert_eq!(file.get_stream("Empty").unwrap().len(), 0);
    assert_eq!(file.entry("Empty").unwrap().start_sector, END_OF_CHAIN);
}

#[test]
fn small_streams_use_the_mini_stream() {
    let mut writer = ContainerWriter::new();
    for i in 0..10usize {
        let name = format!("Stream{}", i);
        writer.add_stream(&name, &vec![i as u8; 100 + i * 50]).unwrap();
    }

    let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
    for i in 0..10usize {
        let name = format!("Stream{}", i);
        let data = file.get_stream(&name).unwrap();
        assert_eq!(data.len(), 100 + i * 50);
        assert!(data.iter().all(|&b| b == i as u8));
        assert_eq!(
            file.entry(&name).unwrap().sector_class(MINI_STREAM_CUTOFF),
            SectorClass::Small
        );
    }
}

#[test]
fn allocator_placement_follows_cutoff() {
    // A 10-byte stream lands in the mini stream, a 5000-byte stream in
    // FAT-chained sectors; both come back with correct lengths.
    let mut writer = ContainerWriter::new();
    writer.add_stream("Tiny", &[0x11u8; 10]).unwrap();
    writer.add_stream("Big", &vec![0x22u8; 5000]).unwrap();

    let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
    assert_eq!(
        file.entry("Tiny").unwrap().sector_class(MINI_STREAM_CUTOFF),
        SectorClass::Small
    );
    assert_eq!(
        file.entry("Big").unwrap().sector_class(MINI_STREAM_CUTOFF),
        SectorClass::Big
    );
    assert_eq!(file.get_stream("Tiny").unwrap(), vec![0x11u8; 10]);
    assert_eq!(file.get_stream("Big").unwrap(), vec![0x22u8; 5000]);
}

#[test]
fn cutoff_boundary_round_trip() {
    let mut writer = ContainerWriter::new();
    writer.add_stream("JustUnder", &vec![0xAAu8; 4095]).unwrap();
    writer.add_stream("Exactly", &vec![0xBBu8; 4096]).unwrap();
    writer.add_stream("JustOver", &vec![0xCCu8; 4097]).unwrap();

    let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
    assert_eq!(file.get_stream("JustUnder").unwrap().len(), 4095);
    assert_eq!(file.get_stream("Exactly").unwrap().len(), 4096);
    assert_eq!(file.get_stream("JustOver").unwrap().len(), 4097);

    let cutoff = MINI_STREAM_CUTOFF;
    assert_eq!(
        file.entry("JustUnder").unwrap().sector_class(cutoff),
        SectorClass::Small
    );
    assert_eq!(
        file.entry("Exactly").unwrap().sector_class(cutoff),
        SectorClass::Big
    );
}

#[test]
fn large_stream_round_trip() {
    let mut writer = ContainerWriter::new();
    writer.add_stream("LargeStream", &vec![0x42u8; 100_000]).unwrap();

    let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
    let data = file.get_stream("LargeStream").unwrap();
    assert_eq!(data.len(), 100_000);
    assert!(data.iter().all(|&b| b == 0x42));
}

#[test]
fn nested_storages_round_trip() {
    let mut writer = ContainerWriter::new();
    writer.add_storage("Empty Storage").unwrap();
    writer.add_stream("Macros/VBA/Module1", b"Sub Main").unwrap();
    writer.add_stream("Macros/dir", b"records").unwrap();

    let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
    assert_eq!(file.get_stream("Macros/VBA/Module1").unwrap(), b"Sub Main");
    assert_eq!(file.get_stream("macros/DIR").unwrap(), b"records");
    assert_eq!(file.list_streams("Macros/VBA").unwrap(), vec!["Module1"]);

    // The explicitly created empty storage survives.
    let names: Vec<String> = file
        .list_entries("")
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert!(names.contains(&"Empty Storage".to_string()));
    assert!(names.contains(&"Macros".to_string()));
}

#[test]
fn sector_size_4096_round_trip() {
    let mut writer = ContainerWriter::with_sector_size(4096);
    writer.add_stream("Test", b"Hello, 4096!").unwrap();

    let data = write_to_vec(&writer);
    let sector_shift = u16::from_le_bytes([data[0x1E], data[0x1F]]);
    assert_eq!(sector_shift, 12);

    let file = CompoundFile::from_bytes(data).unwrap();
    assert_eq!(file.header().sector_size, 4096);
    assert_eq!(file.get_stream("Test").unwrap(), b"Hello, 4096!");
}

#[test]
fn fat_overflowing_the_header_uses_difat() {
    // ~7.4 MB of payload needs more than 109 FAT sectors with 512-byte
    // sectors, pushing the remaining locations into a DIFAT sector.
    let mut writer = ContainerWriter::new();
    let data = vec![0x5Au8; 7_400_000];
    writer.add_stream("Payload", &data).unwrap();

    let bytes = write_to_vec(&writer);
    let num_fat = u32::from_le_bytes(bytes[44..48].try_into().unwrap());
    let num_difat = u32::from_le_bytes(bytes[72..76].try_into().unwrap());
    assert!(num_fat > 109);
    assert_eq!(num_difat, 1);

    let file = CompoundFile::from_bytes(bytes).unwrap();
    let read_back = file.get_stream("Payload").unwrap();
    assert_eq!(read_back.len(), data.len());
    assert!(read_back.iter().all(|&b| b == 0x5A));
}

#[test]
fn writing_twice_is_deterministic() {
    let build = || {
        let mut writer = ContainerWriter::new();
        writer.add_stream("Alpha", &vec![1u8; 300]).unwrap();
        writer.add_stream("Beta", &vec![2u8; 6000]).unwrap();
        writer.add_stream("Gamma/Delta", b"nested").unwrap();
        writer
    };
    assert_eq!(write_to_vec(&build()), write_to_vec(&build()));

    // The same writer emits identical bytes on repeated calls too.
    let writer = build();
    assert_eq!(write_to_vec(&writer), write_to_vec(&writer));
}

#[test]
fn reopen_and_rewrite_preserves_streams() {
    let mut writer = ContainerWriter::new();
    writer.add_stream("Keep", &vec![7u8; 200]).unwrap();
    writer.add_stream("Grow", &vec![8u8; 100]).unwrap();
    let first = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();

    // Replace one stream across the cutoff; the write path migrates it to
    // the FAT allocator.
    let mut edited = first;
    edited.put_stream("Grow", &vec![9u8; 5000]).unwrap();
    let mut buffer = Vec::new();
    edited.write(&mut buffer).unwrap();

    let reopened = CompoundFile::from_bytes(buffer).unwrap();
    assert_eq!(reopened.get_stream("Keep").unwrap(), vec![7u8; 200]);
    assert_eq!(reopened.get_stream("Grow").unwrap(), vec![9u8; 5000]);
    assert_eq!(
        reopened.entry("Grow").unwrap().sector_class(MINI_STREAM_CUTOFF),
        SectorClass::Big
    );
}

#[test]
fn root_clsid_survives_rewrite() {
    let clsid: [u8; 16] = [
        0x06, 0x09, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x46,
    ];
    let mut writer = ContainerWriter::new();
    writer.set_root_clsid(clsid);
    writer.add_stream("Doc", b"content").unwrap();

    let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
    assert_eq!(file.root().clsid, clsid);

    let mut buffer = Vec::new();
    file.write(&mut buffer).unwrap();
    let reopened = CompoundFile::from_bytes(buffer).unwrap();
    assert_eq!(reopened.root().clsid, clsid);
}

#[test]
fn duplicate_sibling_write_is_rejected_before_output() {
    let mut writer = ContainerWriter::new();
    writer.add_stream("Name", b"stream").unwrap();
    writer.add_storage("NAME").unwrap();

    let mut sink = Vec::new();
    assert!(matches!(
        writer.write_to(&mut sink),
        Err(Error::Validation(_))
    ));
    assert!(sink.is_empty());
}

#[test]
fn save_and_reopen_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("container.bin");

    let mut file = CompoundFile::create_empty().unwrap();
    file.put_stream("OnDisk", b"file content").unwrap();
    file.save(&path).unwrap();

    let reopened = CompoundFile::open_path(&path).unwrap();
    assert_eq!(reopened.get_stream("OnDisk").unwrap(), b"file content");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Containers assembled purely by this writer round-trip every
    /// stream's name and bytes.
    #[test]
    fn round_trip_identity(
        // Lowercase-only names: sibling uniqueness is case-insensitive.
        streams in proptest::collection::btree_map(
            "[a-z][a-z0-9]{0,14}",
            proptest::collection::vec(any::<u8>(), 0..6000),
            1..8,
        )
    ) {
        let mut writer = ContainerWriter::new();
        for (name, data) in &streams {
            writer.add_stream(name, data).unwrap();
        }

        let file = CompoundFile::from_bytes(write_to_vec(&writer)).unwrap();
        for (name, data) in &streams {
            prop_assert_eq!(&file.get_stream(name).unwrap(), data);
        }
        prop_assert_eq!(file.stream_paths().len(), streams.len());
    }
}
