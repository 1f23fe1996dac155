mod common;

use claims_prep::{
    data::Value,
    io_utils::{LoadOptions, load_frame, write_frame},
    sniff::sniff_delimiter,
};
use common::{TestWorkspace, fixture_path};
use proptest::prelude::*;

fn render(rows: &[Vec<String>], delimiter: char) -> String {
    let mut text = format!("a{delimiter}b{delimiter}c\n");
    for row in rows {
        text.push_str(&row.join(&delimiter.to_string()));
        text.push('\n');
    }
    text
}

#[test]
fn chunked_fixture_load_matches_whole_load() {
    let path = fixture_path("claims_sample.txt");
    let whole = load_frame(&path, &LoadOptions::new(b'|')).expect("whole load");
    for chunk_size in [1, 2, 7, 24, 25, 1000] {
        let options = LoadOptions {
            chunk_size: Some(chunk_size),
            ..LoadOptions::new(b'|')
        };
        let chunked = load_frame(&path, &options).expect("chunked load");
        assert_eq!(chunked, whole, "chunk size {chunk_size}");
    }
    assert_eq!(whole.row_count(), 25);
    assert_eq!(whole.column_count(), 17);
}

#[test]
fn na_tokens_load_as_missing() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("na.csv", "gender,bank\nNA,\nMale,N/A\n");
    let frame = load_frame(&path, &LoadOptions::new(b',')).expect("load");
    assert_eq!(frame.cell(0, "gender"), None);
    assert_eq!(frame.cell(0, "bank"), None);
    assert_eq!(frame.cell(1, "gender"), Some(&Value::Text("Male".into())));
    assert_eq!(frame.cell(1, "bank"), None);
}

#[test]
fn whitespace_only_fields_load_as_text() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("blank.csv", "a,b\n  ,x\n NA ,y\n");
    let frame = load_frame(&path, &LoadOptions::new(b',')).expect("load");
    assert_eq!(frame.cell(0, "a"), Some(&Value::Text("  ".into())));
    assert_eq!(frame.cell(1, "a"), Some(&Value::Text(" NA ".into())));
}

#[test]
fn empty_file_is_a_load_error() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("empty.csv", "");
    assert!(load_frame(&path, &LoadOptions::new(b',')).is_err());
}

#[test]
fn written_output_reloads_to_the_same_text_cells() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("quoted.csv", "id,note\n1,\"Smith, J\"\n2,plain\n");
    let frame = load_frame(&path, &LoadOptions::new(b',')).expect("load");
    let out = workspace.path().join("out").join("quoted.csv");
    write_frame(&frame, &out).expect("write");
    let reloaded = load_frame(&out, &LoadOptions::new(b',')).expect("reload");
    assert_eq!(reloaded, frame);
    assert_eq!(reloaded.cell(0, "note"), Some(&Value::Text("Smith, J".into())));
}

proptest! {
    #[test]
    fn chunked_load_equals_unchunked_load(
        rows in proptest::collection::vec(
            proptest::collection::vec("[a-z0-9 ]{0,6}", 3),
            0..40
        ),
        chunk_size in 1usize..12,
    ) {
        let workspace = TestWorkspace::new();
        let path = workspace.write("chunks.txt", &render(&rows, '|'));
        let whole = load_frame(&path, &LoadOptions::new(b'|')).expect("whole");
        let options = LoadOptions {
            chunk_size: Some(chunk_size),
            ..LoadOptions::new(b'|')
        };
        let chunked = load_frame(&path, &options).expect("chunked");
        prop_assert_eq!(chunked.row_count(), rows.len());
        prop_assert_eq!(chunked, whole);
    }

    #[test]
    fn sniffer_finds_the_delimiter_of_regular_tables(
        rows in proptest::collection::vec(
            proptest::collection::vec("[a-z0-9]{1,6}", 3),
            1..20
        ),
        delimiter in prop::sample::select(vec!['|', ',', ';', '\t']),
    ) {
        let text = render(&rows, delimiter);
        prop_assert_eq!(sniff_delimiter(&text, false), Some(delimiter as u8));
    }
}
