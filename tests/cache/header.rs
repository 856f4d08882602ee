use std::fs;

use tempdir::TempDir;
use wordcode::CacheError;
use wordcode::cache::format::{FORMAT_VERSION, MIN_MAP_BYTES};
use wordcode::cache::{AutoloadStyle, ByteOrder, CacheLoader, DumpWriter, MapPolicy, load_header};

use crate::compile;

fn written(dir: &TempDir, policy: MapPolicy) -> std::path::PathBuf {
    let mut writer = DumpWriter::new(policy);
    writer.add_program("lib/alpha", compile("print alpha"), AutoloadStyle::Zsh);
    writer.add_program("lib/beta", compile("print beta"), AutoloadStyle::Ksh);
    writer.write(dir.path().join("lib")).expect("write should succeed")
}

#[test]
fn header_lists_names_and_version() {
    let dir = TempDir::new("wordcode-header").expect("temporary directory");
    let path = written(&dir, MapPolicy::Never);

    let header = load_header(&path, ByteOrder::native()).expect("header should load");
    assert_eq!(header.version, FORMAT_VERSION);
    assert_eq!(header.names().collect::<Vec<_>>(), vec!["lib/alpha", "lib/beta"]);
    assert_eq!(header.find("beta").map(|d| d.style), Some(AutoloadStyle::Ksh));
    assert!(header.find("lib/beta").is_none(), "lookup uses the last path component");
    assert_eq!(header.summary(), format!("zwc file (read) for {FORMAT_VERSION}"));

    let loader = CacheLoader::new();
    assert!(loader.contains(&path, "alpha"));
    assert!(!loader.contains(&path, "gamma"));
}

#[test]
fn first_body_starts_after_the_header() {
    let dir = TempDir::new("wordcode-layout").expect("temporary directory");
    let path = written(&dir, MapPolicy::Never);
    let header = load_header(&path, ByteOrder::native()).expect("header should load");

    let header_words: u32 = 12 + header.descriptors.iter().map(|d| d.header_words).sum::<u32>();
    assert_eq!(header.descriptors[0].start, header_words);
    let first = &header.descriptors[0];
    assert!(header.descriptors[1].start >= first.start + first.len.div_ceil(4));
}

#[test]
fn small_files_are_read_unless_mapping_is_forced() {
    let dir = TempDir::new("wordcode-policy").expect("temporary directory");
    let auto = written(&dir, MapPolicy::Auto);
    assert!(fs::metadata(&auto).expect("metadata").len() < 2 * MIN_MAP_BYTES as u64);
    assert!(!load_header(&auto, ByteOrder::native()).expect("header").mapped);

    let forced = written(&dir, MapPolicy::Always);
    let header = load_header(&forced, ByteOrder::native()).expect("header");
    assert!(header.mapped);
    assert!(header.summary().contains("(mapped)"));
}

#[test]
fn foreign_files_are_rejected() {
    let dir = TempDir::new("wordcode-foreign").expect("temporary directory");
    let path = dir.path().join("junk.zwc");
    fs::write(&path, vec![0x5a; 256]).expect("write junk");

    let error = load_header(&path, ByteOrder::native()).expect_err("junk has no magic");
    assert!(matches!(error, CacheError::BadMagic { .. }), "{error}");
    assert!(CacheLoader::new().load(&path, "junk").is_none());
}

#[test]
fn other_versions_are_rejected() {
    let dir = TempDir::new("wordcode-version").expect("temporary directory");
    let path = written(&dir, MapPolicy::Never);
    let mut bytes = fs::read(&path).expect("read file");
    bytes[8] ^= 0x20;
    fs::write(&path, &bytes).expect("rewrite file");

    let error = load_header(&path, ByteOrder::native()).expect_err("version differs");
    assert!(matches!(error, CacheError::VersionMismatch { .. }), "{error}");
    assert!(CacheLoader::new().load(&path, "alpha").is_none());
}

#[test]
fn damaged_second_image_rejects_the_file() {
    let dir = TempDir::new("wordcode-damaged").expect("temporary directory");
    let path = written(&dir, MapPolicy::Never);
    let header = load_header(&path, ByteOrder::native()).expect("header should load");
    let mut bytes = fs::read(&path).expect("read file");
    bytes[header.other_offset] ^= 0xff;
    fs::write(&path, &bytes).expect("rewrite file");

    assert!(load_header(&path, ByteOrder::native()).is_err());
}

#[test]
fn truncated_files_are_rejected() {
    let dir = TempDir::new("wordcode-truncated").expect("temporary directory");
    let path = written(&dir, MapPolicy::Never);
    let bytes = fs::read(&path).expect("read file");
    fs::write(&path, &bytes[..20]).expect("truncate file");

    let error = load_header(&path, ByteOrder::native()).expect_err("file is cut short");
    assert!(matches!(error, CacheError::Truncated { .. }), "{error}");
}

fn corrupted(dir: &TempDir, policy: MapPolicy, at: usize, value: u32) -> std::path::PathBuf {
    let mut writer = DumpWriter::new(policy).with_order(ByteOrder::Little);
    writer.add_program("f", compile("print corrupted"), AutoloadStyle::Zsh);
    let path = writer.write(dir.path().join(format!("f{at}"))).expect("write should succeed");
    let mut bytes = fs::read(&path).expect("cache file");
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    fs::write(&path, bytes).expect("rewrite");
    path
}

#[test]
fn oversized_header_length_is_not_found() {
    let dir = TempDir::new("wordcode-header-length").expect("temporary directory");
    let path = corrupted(&dir, MapPolicy::Never, 48, 0xFFFF_FFF0);

    let loader = CacheLoader::with_order(ByteOrder::Little);
    assert!(loader.load(&path, "f").is_none());
    assert!(matches!(
        load_header(&path, ByteOrder::Little),
        Err(CacheError::Truncated { .. })
    ));
}

#[test]
fn oversized_program_length_is_not_found() {
    let dir = TempDir::new("wordcode-body-length").expect("temporary directory");
    for policy in [MapPolicy::Never, MapPolicy::Always] {
        let path = corrupted(&dir, policy, 52, 0xFFFF_FFF0);
        let loader = CacheLoader::with_order(ByteOrder::Little);
        assert!(loader.load(&path, "f").is_none(), "{policy:?}");
        assert_eq!(loader.registry().live(), 0);
    }
}

#[test]
fn strings_past_the_body_are_not_found() {
    let dir = TempDir::new("wordcode-strings-offset").expect("temporary directory");
    for policy in [MapPolicy::Never, MapPolicy::Always] {
        let path = corrupted(&dir, policy, 60, 0x0010_0000);
        assert!(CacheLoader::with_order(ByteOrder::Little).load(&path, "f").is_none(), "{policy:?}");
    }
}
