use spxls_core::project::Project;
use spxls_lsp::analyzer::{compile, default_analyzers, document_highlights, CompileResult};
use tower_lsp::lsp_types::{DocumentHighlightKind, Position};

fn compile_ok(files: &[(&str, &str)]) -> CompileResult {
    let proj = Project::new(files.iter().map(|(p, s)| (p.to_string(), s.to_string())));
    compile(&proj, "file:///", &default_analyzers()).expect("compile succeeded")
}

fn kinds_at(result: &CompileResult, path: &str, position: Position) -> Vec<(u32, u32, DocumentHighlightKind)> {
    let source = result.source_file(path).expect("source file");
    document_highlights(result, source, position)
        .expect("highlights")
        .into_iter()
        .map(|h| {
            (
                h.range.start.line,
                h.range.start.character,
                h.kind.unwrap_or(DocumentHighlightKind::TEXT),
            )
        })
        .collect()
}

#[test]
fn define_lhs_is_write_and_uses_are_read() {
    let result = compile_ok(&[(
        "main.spx",
        "count := 1\nplay \"boom\"\nbroadcast \"go\", count > 0\nrun \"assets\"\n",
    )]);
    let highlights = kinds_at(&result, "main.spx", Position::new(0, 2));

    assert_eq!(highlights.len(), 2);
    assert_eq!(highlights[0], (0, 0, DocumentHighlightKind::WRITE));
    assert_eq!(highlights[1].2, DocumentHighlightKind::READ);
}

#[test]
fn assignment_lhs_and_rhs_are_classified() {
    let result = compile_ok(&[("main.spx", "x := 1\ny := 2\nx = y\nrun \"assets\"\n")]);

    let x = kinds_at(&result, "main.spx", Position::new(0, 0));
    assert_eq!(x.len(), 2);
    assert!(x.contains(&(0, 0, DocumentHighlightKind::WRITE)));
    assert!(x.contains(&(2, 0, DocumentHighlightKind::WRITE)));

    let y = kinds_at(&result, "main.spx", Position::new(1, 0));
    assert!(y.contains(&(1, 0, DocumentHighlightKind::WRITE)));
    assert!(y.contains(&(2, 4, DocumentHighlightKind::READ)));
}

#[test]
fn inc_dec_counts_as_write() {
    let result = compile_ok(&[("main.spx", "n := 0\nn++\nrun \"assets\"\n")]);
    let highlights = kinds_at(&result, "main.spx", Position::new(1, 0));
    assert!(highlights.contains(&(1, 0, DocumentHighlightKind::WRITE)));
}

#[test]
fn var_spec_name_is_write() {
    let result = compile_ok(&[
        ("main.spx", "var (\n\ts Sound\n)\nonStart => {\n\tplay s\n}\nrun \"assets\"\n"),
        ("assets/sounds/s/index.json", "{}"),
    ]);
    let highlights = kinds_at(&result, "main.spx", Position::new(1, 1));
    assert!(highlights.contains(&(1, 1, DocumentHighlightKind::WRITE)));
    // The use inside the handler reads through the call expression.
    assert!(highlights.contains(&(4, 6, DocumentHighlightKind::READ)));
}

#[test]
fn for_range_key_is_write_and_range_expr_is_read() {
    let result = compile_ok(&[(
        "main.spx",
        "items := [1, 2]\nfor k in items {\n\tbroadcast \"go\", k > 0\n}\nrun \"assets\"\n",
    )]);
    let items = kinds_at(&result, "main.spx", Position::new(0, 0));
    assert!(items.contains(&(0, 0, DocumentHighlightKind::WRITE)));
    assert!(items.contains(&(1, 9, DocumentHighlightKind::READ)));

    let k = kinds_at(&result, "main.spx", Position::new(1, 4));
    assert!(k.contains(&(1, 4, DocumentHighlightKind::WRITE)));
}
