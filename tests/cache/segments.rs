use std::rc::Rc;

use tempdir::TempDir;
use wordcode::cache::{AutoloadStyle, CacheLoader, DumpWriter, MapPolicy, SegmentStats};
use wordcode::{Program, ProgramFlags};

use crate::compile;

fn mapped_file(dir: &TempDir) -> std::path::PathBuf {
    let mut writer = DumpWriter::new(MapPolicy::Always);
    writer.add_program("one", compile("print one"), AutoloadStyle::Unspecified);
    writer.add_program("two", compile("print two"), AutoloadStyle::Unspecified);
    writer.write(dir.path().join("shared")).expect("write should succeed")
}

#[test]
fn programs_from_one_file_share_a_single_mapping() {
    let dir = TempDir::new("wordcode-segments").expect("temporary directory");
    let path = mapped_file(&dir);
    let loader = CacheLoader::new();

    let one = loader.load(&path, "one").expect("one loads");
    let two = loader.load(&path, "two").expect("two loads");
    assert!(one.flags().contains(ProgramFlags::MAP));
    assert_eq!(loader.registry().stats(), SegmentStats { maps: 1, unmaps: 0 });
    assert_eq!(loader.registry().live(), 1);

    drop(one);
    assert_eq!(loader.registry().stats(), SegmentStats { maps: 1, unmaps: 0 });
    assert!(two.words().len() > 1, "remaining program still reads its words");

    drop(two);
    assert_eq!(loader.registry().stats(), SegmentStats { maps: 1, unmaps: 1 });
    assert_eq!(loader.registry().live(), 0);
}

#[test]
fn reloading_after_release_maps_again() {
    let dir = TempDir::new("wordcode-remap").expect("temporary directory");
    let path = mapped_file(&dir);
    let loader = CacheLoader::new();

    drop(loader.load(&path, "one").expect("first load"));
    let again = loader.load(&path, "one").expect("second load");
    assert_eq!(loader.registry().stats(), SegmentStats { maps: 2, unmaps: 1 });
    assert_eq!(Program::ref_count(&again), Some(1));
}

#[test]
fn program_handles_count_independently_of_the_segment() {
    let dir = TempDir::new("wordcode-handles").expect("temporary directory");
    let path = mapped_file(&dir);
    let loader = CacheLoader::new();

    let program = loader.load(&path, "two").expect("program loads");
    let alias = Rc::clone(&program);
    assert_eq!(Program::ref_count(&program), Some(2));
    drop(program);
    assert_eq!(loader.registry().stats().unmaps, 0);
    drop(alias);
    assert_eq!(loader.registry().stats().unmaps, 1);
}

#[test]
fn duplicating_a_mapped_program_detaches_it() {
    let dir = TempDir::new("wordcode-duplicate").expect("temporary directory");
    let path = mapped_file(&dir);
    let loader = CacheLoader::new();

    let mapped = loader.load(&path, "one").expect("program loads");
    let owned = mapped.duplicate(false);
    drop(mapped);
    assert_eq!(loader.registry().stats().unmaps, 1);
    assert!(!owned.is_mapped());
    assert_eq!(owned.flags(), ProgramFlags::REAL);
    assert!(wordcode::wordcode::disassemble(&owned).contains("\"one\""));
}
