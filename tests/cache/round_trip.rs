use std::fs;

use tempdir::TempDir;
use wordcode::cache::{AutoloadStyle, CacheLoader, DumpWriter, MapPolicy};
use wordcode::wordcode::disassemble;

use crate::compile;

fn round_trip(policy: MapPolicy) {
    let dir = TempDir::new("wordcode-round-trip").expect("temporary directory");
    let greet = compile("greet() { print -r -- \"hello $1\"; }\ngreet world");
    let count = compile("for i in one two three; do print $i; done");

    let mut writer = DumpWriter::new(policy);
    writer.add_program("functions/greet", greet.clone(), AutoloadStyle::Zsh);
    writer.add_program("functions/count", count.clone(), AutoloadStyle::Unspecified);
    let path = writer.write(dir.path().join("digest")).expect("write should succeed");
    assert_eq!(path, dir.path().join("digest.zwc"));

    let loader = CacheLoader::new();
    for (name, original) in [("greet", &greet), ("count", &count)] {
        let loaded = loader.load(&path, name).expect("program should load");
        assert_eq!(loaded.words(), original.words(), "{name}");
        assert_eq!(loaded.strings(), original.strings(), "{name}");
        assert_eq!(loaded.pattern_count(), original.pattern_count(), "{name}");
        assert_eq!(disassemble(&loaded), disassemble(original), "{name}");
        assert_eq!(loaded.is_mapped(), policy == MapPolicy::Always, "{name}");
    }
    assert!(loader.load(&path, "missing").is_none());
}

#[test]
fn read_programs_round_trip() {
    round_trip(MapPolicy::Never);
}

#[test]
fn mapped_programs_round_trip() {
    round_trip(MapPolicy::Always);
}

#[test]
fn lookup_reports_the_autoload_style() {
    let dir = TempDir::new("wordcode-style").expect("temporary directory");
    let mut writer = DumpWriter::default();
    writer.add_program("f", compile("true"), AutoloadStyle::Ksh);
    let path = writer.write(dir.path().join("f")).expect("write should succeed");

    let loaded = CacheLoader::new().lookup(&path, "f").expect("program should load");
    assert_eq!(loaded.style, AutoloadStyle::Ksh);
}

#[test]
fn source_files_are_compiled_with_the_current_style() {
    let dir = TempDir::new("wordcode-sources").expect("temporary directory");
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    crate::write_file(&first, "print first\n");
    crate::write_file(&second, "print second\n");

    let mut writer = DumpWriter::default();
    writer.add_source_file(&first).expect("first compiles");
    writer.add_source_file("-k").expect("style switch");
    writer.add_source_file(&second).expect("second compiles");
    assert_eq!(writer.len(), 2);
    let path = writer.write(dir.path().join("all")).expect("write should succeed");

    let loader = CacheLoader::new();
    let first = loader.lookup(&path, "first").expect("first loads");
    let second = loader.lookup(&path, "second").expect("second loads");
    assert_eq!(first.style, AutoloadStyle::Unspecified);
    assert_eq!(second.style, AutoloadStyle::Ksh);
    assert!(disassemble(&second.program).contains("\"second\""));
}

#[test]
fn broken_source_file_is_reported() {
    let dir = TempDir::new("wordcode-broken").expect("temporary directory");
    let broken = dir.path().join("broken");
    crate::write_file(&broken, "if true; then\n");

    let mut writer = DumpWriter::default();
    let error = writer.add_source_file(&broken).expect_err("source does not compile");
    assert!(matches!(error, wordcode::CacheError::Compile { .. }), "{error}");
    assert!(writer.is_empty());
    assert!(writer.add_source_file(dir.path()).is_err(), "directories are not sources");
}

#[test]
fn rewriting_replaces_the_file_and_leaves_no_temporary() {
    let dir = TempDir::new("wordcode-rewrite").expect("temporary directory");
    let mut writer = DumpWriter::default();
    writer.add_program("one", compile("print one"), AutoloadStyle::Unspecified);
    let path = writer.write(dir.path().join("cache.zwc")).expect("first write");

    let mut writer = DumpWriter::default();
    writer.add_program("two", compile("print two"), AutoloadStyle::Unspecified);
    writer.write(&path).expect("second write");

    let loader = CacheLoader::new();
    assert!(loader.load(&path, "one").is_none());
    assert!(loader.load(&path, "two").is_some());
    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("directory listing")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("cache.zwc")]);
}

#[test]
fn failed_write_leaves_nothing_behind() {
    let dir = TempDir::new("wordcode-failed").expect("temporary directory");
    let blocked = dir.path().join("blocked.zwc");
    fs::create_dir(&blocked).expect("create blocking directory");

    let mut writer = DumpWriter::default();
    writer.add_program("x", compile("true"), AutoloadStyle::Unspecified);
    assert!(writer.write(&blocked).is_err());
    let entries = fs::read_dir(dir.path()).expect("directory listing").count();
    assert_eq!(entries, 1);
    assert!(blocked.is_dir());
}
