use std::path::PathBuf;

use callscope::domain::InstrMapError;
use callscope::instrs::{InstrDesc, InstrTable};
use callscope::symbolization::NullSource;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

#[test]
fn test_load_fixture_names() {
    let mut table = InstrTable::new();
    assert_eq!(table.load_names(fixture("instrs.map")).unwrap(), 2);

    let names: Vec<(u64, Option<&str>)> =
        table.sorted().into_iter().map(|i| (i.addr(), i.name())).collect();
    assert_eq!(names, vec![(0x4005d0, Some("lex_loop")), (0x4005d4, Some("lex_exit"))]);
    // The line with invalid UTF-8 is skipped, not fatal
    assert!(table.find_instr(0x4005e0).is_none());
}

#[test]
fn test_named_instructions_learn_size_later() {
    let mut table = InstrTable::new();
    table.load_names(fixture("instrs.map")).unwrap();
    assert_eq!(table.find_instr(0x4005d0).unwrap().size(), 0);

    table.get_instr(0x4005d0, 4);
    let instr = table.find_instr(0x4005d0).unwrap();
    assert_eq!(instr.size(), 4);
    assert_eq!(instr.name(), Some("lex_loop"));
    assert_eq!(instr.to_string(), "0x4005d0 [4]");

    assert_eq!(table.description(0x4005d0, &NullSource), &InstrDesc::Unknown);
}

#[test]
fn test_missing_map_is_an_error() {
    let mut table = InstrTable::new();
    let err = table.load_names(fixture("does_not_exist.map")).unwrap_err();
    assert!(matches!(err, InstrMapError::Read { .. }));
    assert!(err.to_string().contains("does_not_exist.map"));
    assert!(table.is_empty());
}
