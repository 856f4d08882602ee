use tempdir::TempDir;
use wordcode::cache::{AutoloadStyle, ByteOrder, CacheLoader, DumpWriter, MapPolicy, load_header};

use crate::compile;

fn check_both_orders(policy: MapPolicy) {
    let dir = TempDir::new("wordcode-byte-order").expect("temporary directory");
    let program = compile("case $1 in\n start) run --now;;\n stop) halt;;\nesac");

    let mut writer = DumpWriter::new(policy).with_order(ByteOrder::Big);
    writer.add_program("service", program.clone(), AutoloadStyle::Unspecified);
    let path = writer.write(dir.path().join("service")).expect("write should succeed");

    for order in [ByteOrder::Big, ByteOrder::Little] {
        let loader = CacheLoader::with_order(order);
        let loaded = loader.load(&path, "service").expect("both orders find the program");
        assert_eq!(loaded.words(), program.words(), "{order:?}");
        assert_eq!(loaded.strings(), program.strings(), "{order:?}");
    }
}

#[test]
fn read_images_serve_either_order() {
    check_both_orders(MapPolicy::Never);
}

#[test]
fn mapped_images_serve_either_order() {
    check_both_orders(MapPolicy::Always);
}

#[test]
fn second_image_is_marked_other() {
    let dir = TempDir::new("wordcode-other").expect("temporary directory");
    let mut writer = DumpWriter::new(MapPolicy::Never).with_order(ByteOrder::Little);
    writer.add_program("f", compile("true"), AutoloadStyle::Unspecified);
    let path = writer.write(dir.path().join("f")).expect("write should succeed");

    let little = load_header(&path, ByteOrder::Little).expect("little header");
    let big = load_header(&path, ByteOrder::Big).expect("big header");
    assert!(!little.is_other);
    assert_eq!(little.image_offset, 0);
    assert!(big.is_other);
    assert_eq!(big.image_offset, little.other_offset);
    assert_eq!(little.descriptors, big.descriptors);

    let bytes = std::fs::read(&path).expect("read file");
    assert_eq!(bytes.len(), 2 * little.other_offset);
}
