use std::fs;
use std::path::Path;

use pal_deck::{generate_deck, parse_deck_file, parse_deck_str, DeckError, DeckOptions};
use pal_model::samples;

fn write(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

/// Move the GRID property arrays of a generated deck into an include file.
fn split_deck(dir: &Path) -> String {
    let request = samples::two_well_oil_water(3, 3, 2);
    let deck = generate_deck(&request, &DeckOptions::default()).unwrap();
    let start = deck.find("PORO\n").unwrap();
    let end = deck.find("\nPROPS\n").unwrap();
    write(&dir.join("include/props.inc"), &deck[start..end]);
    format!(
        "{}INCLUDE\n 'include/props.inc' /\n{}",
        &deck[..start],
        &deck[end..]
    )
}

#[test]
fn include_resolves_relative_to_including_file() {
    let dir = tempfile::tempdir().unwrap();
    let main = split_deck(dir.path());
    write(&dir.path().join("CASE.DATA"), &main);

    let parsed = parse_deck_file(&dir.path().join("CASE.DATA")).unwrap();
    assert_eq!(parsed.properties.porosity.len(), 18);
    assert_eq!(parsed.well_names(), vec!["INJ1", "PROD1"]);
}

#[test]
fn nested_include_uses_the_nested_files_directory() {
    let dir = tempfile::tempdir().unwrap();
    let main = split_deck(dir.path());
    // The outer include only forwards to the real one, which sits next to it.
    let inner = fs::read_to_string(dir.path().join("include/props.inc")).unwrap();
    write(&dir.path().join("include/inner/arrays.inc"), &inner);
    write(
        &dir.path().join("include/props.inc"),
        "INCLUDE\n 'inner/arrays.inc' /\n",
    );
    write(&dir.path().join("CASE.DATA"), &main);

    let parsed = parse_deck_file(&dir.path().join("CASE.DATA")).unwrap();
    assert_eq!(parsed.properties.permx_md.len(), 18);
}

#[test]
fn in_memory_text_resolves_against_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    let main = split_deck(dir.path());
    let parsed = parse_deck_str(&main, Some(dir.path())).unwrap();
    assert_eq!(parsed.properties.porosity.len(), 18);
}

#[test]
fn circular_include_is_structural() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("a.inc"), "INCLUDE\n 'b.inc' /\n");
    write(&dir.path().join("b.inc"), "INCLUDE\n 'a.inc' /\n");
    write(
        &dir.path().join("CASE.DATA"),
        "RUNSPEC\nINCLUDE\n 'a.inc' /\n",
    );

    let err = parse_deck_file(&dir.path().join("CASE.DATA")).unwrap_err();
    assert!(matches!(err, DeckError::Structural { .. }), "{err}");
    assert!(err.to_string().contains("circular"), "{err}");
}

#[test]
fn missing_include_reports_location() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("CASE.DATA"),
        "RUNSPEC\n\nINCLUDE\n 'nowhere.inc' /\n",
    );
    let err = parse_deck_file(&dir.path().join("CASE.DATA")).unwrap_err();
    match &err {
        DeckError::Include { location, .. } => assert_eq!(location.line, 3),
        other => panic!("unexpected error {other}"),
    }
}
