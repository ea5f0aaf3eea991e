use spxls_core::project::Project;
use spxls_lsp::analyzer::{compile, default_analyzers, CompileResult, SourceFile};
use spxls_lsp::position::{from_position, pos_at, position_offset, to_position, utf16_offset, utf16_offset_to_utf8};
use tower_lsp::lsp_types::Position;

const CONTENT: &str = "broadcast \"héllo wörld\"\nx := 1\nbroadcast \"日本語 text\"\n";

fn compiled() -> CompileResult {
    let proj = Project::new(vec![("main.spx".to_string(), CONTENT.to_string())]);
    compile(&proj, "file:///", &default_analyzers()).expect("compile succeeded")
}

fn source(result: &CompileResult) -> &SourceFile {
    result.source_file("main.spx").expect("main source")
}

#[test]
fn utf16_offset_counts_code_units() {
    assert_eq!(utf16_offset(""), 0);
    assert_eq!(utf16_offset("abc"), 3);
    assert_eq!(utf16_offset("héllo"), 5);
    assert_eq!(utf16_offset("日本語"), 3);
    // Surrogate pair.
    assert_eq!(utf16_offset("🌍"), 2);
}

#[test]
fn utf16_to_utf8_clips_at_string_end() {
    assert_eq!(utf16_offset_to_utf8("héllo", 0), 0);
    assert_eq!(utf16_offset_to_utf8("héllo", 2), 3); // h + é(2 bytes)
    assert_eq!(utf16_offset_to_utf8("héllo", 99), "héllo".len());
}

#[test]
fn position_offset_identity_on_rune_boundaries() {
    // For every rune boundary: derive the (line, utf16) position by hand,
    // then positionOffset must return the original byte offset.
    let mut line = 0u32;
    let mut line_start = 0usize;
    for (offset, c) in CONTENT.char_indices() {
        let character = utf16_offset(&CONTENT[line_start..offset]);
        assert_eq!(
            position_offset(CONTENT, Position::new(line, character)),
            offset,
            "mismatch at byte {offset}"
        );
        if c == '\n' {
            line += 1;
            line_start = offset + 1;
        }
    }
}

#[test]
fn position_offset_clips_out_of_range() {
    assert_eq!(position_offset("", Position::new(5, 3)), 0);
    assert_eq!(position_offset(CONTENT, Position::new(99, 0)), CONTENT.len());
    // Character beyond the line saturates at end of line.
    let line1_end = CONTENT.find('\n').unwrap();
    assert_eq!(position_offset(CONTENT, Position::new(0, 999)), line1_end);
}

#[test]
fn from_position_matches_manual_utf16_prefix() {
    let result = compiled();
    let source = source(&result);

    // Token position of the `ö` line's closing quote.
    let byte = CONTENT.rfind("wörld").unwrap() + "wörld".len();
    let token_pos = source.token_file.position(source.token_file.pos(byte));
    let lsp = from_position(source, token_pos);
    assert_eq!(lsp.line, 0);
    let line = &CONTENT[..byte];
    assert_eq!(lsp.character, utf16_offset(line));
}

#[test]
fn to_position_round_trips_through_from_position() {
    let result = compiled();
    let source = source(&result);

    for (line, character) in [(0u32, 0u32), (0, 11), (1, 3), (2, 12)] {
        let token_pos = to_position(source, Position::new(line, character));
        assert_eq!(token_pos.line, line + 1);
        let back = from_position(source, token_pos);
        assert_eq!(back, Position::new(line, character));
    }
}

#[test]
fn pos_at_saturates_at_end_of_file() {
    let result = compiled();
    let source = source(&result);
    assert_eq!(pos_at(source, Position::new(999, 0)), source.token_file.end_pos());

    let start = pos_at(source, Position::new(0, 0));
    assert_eq!(source.token_file.offset(start), 0);
}

#[test]
fn multibyte_identifier_ranges_are_utf16() {
    let result = compiled();
    let source = source(&result);
    // `x` on line 1 sits after no multibyte text; its diagnostic-free range
    // conversion still exercises the line-prefix math.
    let ident = result
        .ident_at_position(source, Position::new(1, 0))
        .expect("ident at x");
    assert_eq!(ident.name, "x");
    let range = result.range_for_span((ident.pos, ident.end));
    assert_eq!(range.start, Position::new(1, 0));
    assert_eq!(range.end, Position::new(1, 1));
}
