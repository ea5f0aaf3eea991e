use spxls_core::project::Project;
use spxls_lsp::analyzer::{
    compile, default_analyzers, CompileError, CompileResult, SpxResourceId, SpxResourceRefKind,
};
use tower_lsp::lsp_types::DiagnosticSeverity;

fn compile_files(files: &[(&str, &str)]) -> Result<CompileResult, CompileError> {
    let proj = Project::new(files.iter().map(|(p, s)| (p.to_string(), s.to_string())));
    compile(&proj, "file:///", &default_analyzers())
}

fn diags<'a>(result: &'a CompileResult, path: &str) -> Vec<&'a tower_lsp::lsp_types::Diagnostic> {
    result
        .diagnostics
        .get(&result.to_document_uri(path))
        .map(|d| d.iter().collect())
        .unwrap_or_default()
}

#[test]
fn empty_snapshot_fails_with_no_main_file() {
    let err = compile_files(&[]).expect_err("compile must fail");
    assert_eq!(err, CompileError::NoMainSpxFile);
    assert_eq!(err.to_string(), "no valid main.spx file found in main package");
}

#[test]
fn non_main_package_gets_diagnostic_at_package_ident() {
    let result = compile_files(&[("main.spx", "package foo\n")]).expect("partial result");
    let diags = diags(&result, "main.spx");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "package name must be main");
    assert_eq!(diags[0].severity, Some(DiagnosticSeverity::ERROR));
    // The range covers the `foo` identifier.
    assert_eq!(diags[0].range.start.line, 0);
    assert_eq!(diags[0].range.start.character, 8);
    assert_eq!(diags[0].range.end.character, 11);
}

#[test]
fn resource_root_string_literal_is_accepted() {
    let result = compile_files(&[("main.spx", "run \"assets\"\n")]).expect("compile");
    assert_eq!(result.resource_root_dir, "assets");
    assert!(!diags(&result, "main.spx")
        .iter()
        .any(|d| d.message.contains("first argument of run")));
}

#[test]
fn resource_root_non_string_is_rejected() {
    let result = compile_files(&[("main.spx", "run 123\n")]).expect("compile");
    assert!(diags(&result, "main.spx")
        .iter()
        .any(|d| d.message == "first argument of run must be a string literal or constant"));
    assert_eq!(result.resource_root_dir, "assets");
}

#[test]
fn auto_binding_in_first_var_block_is_recorded() {
    let result = compile_files(&[
        ("main.spx", "var (\n\ts Sound\n)\nrun \"assets\"\n"),
        ("assets/sounds/s/index.json", "{}"),
    ])
    .expect("compile");

    assert_eq!(result.sound_auto_bindings.len(), 1);
    let field_pos = result.source_file("main.spx").unwrap().token_file.pos(7);
    let r = result
        .resource_refs
        .iter()
        .find(|r| r.kind == SpxResourceRefKind::AutoBinding)
        .expect("auto-binding reference");
    assert_eq!(r.id, SpxResourceId::Sound { name: "s".into() });
    assert_eq!(r.span.0, field_pos);
    assert!(!diags(&result, "main.spx")
        .iter()
        .any(|d| d.severity == Some(DiagnosticSeverity::WARNING)));
}

#[test]
fn auto_binding_outside_first_var_block_warns() {
    let result = compile_files(&[
        ("main.spx", "var x = 1\nvar (\n\ts Sound\n)\nrun \"assets\"\n"),
        ("assets/sounds/s/index.json", "{}"),
    ])
    .expect("compile");

    assert!(result.sound_auto_bindings.is_empty());
    assert!(diags(&result, "main.spx").iter().any(|d| {
        d.severity == Some(DiagnosticSeverity::WARNING)
            && d.message == "resources must be defined in the first var block for auto-binding"
    }));
    assert!(!result
        .resource_refs
        .iter()
        .any(|r| r.kind == SpxResourceRefKind::AutoBinding));
}

#[test]
fn unknown_sound_literal_still_records_reference() {
    let result = compile_files(&[("main.spx", "play \"missing\"\nrun \"assets\"\n")]).expect("compile");

    assert!(diags(&result, "main.spx")
        .iter()
        .any(|d| d.message == "sound resource \"missing\" not found"));
    let r = result
        .resource_refs
        .iter()
        .find(|r| r.id == SpxResourceId::Sound { name: "missing".into() })
        .expect("reference recorded despite the miss");
    assert_eq!(r.kind, SpxResourceRefKind::StringLiteral);
}

#[test]
fn auto_binding_reference_use_is_classified() {
    let result = compile_files(&[
        (
            "main.spx",
            "var (\n\ts Sound\n)\nonStart => {\n\tplay s\n}\nrun \"assets\"\n",
        ),
        ("assets/sounds/s/index.json", "{}"),
    ])
    .expect("compile");

    let kinds: Vec<SpxResourceRefKind> = result
        .resource_refs
        .iter()
        .filter(|r| r.id == SpxResourceId::Sound { name: "s".into() })
        .map(|r| r.kind)
        .collect();
    assert!(kinds.contains(&SpxResourceRefKind::AutoBinding));
    assert!(kinds.contains(&SpxResourceRefKind::AutoBindingReference));
}

#[test]
fn partial_result_survives_broken_file() {
    // A broken sprite file must not blind the rest of the project.
    let result = compile_files(&[
        ("main.spx", "run \"assets\"\n"),
        ("Hero.spx", "var = =\n"),
    ])
    .expect("compile");
    assert!(!diags(&result, "Hero.spx").is_empty());
    assert_eq!(result.main_spx_file, "main.spx");
    assert_eq!(result.resource_root_dir, "assets");
}

#[test]
fn non_main_file_alone_returns_partial_result() {
    // Diagnostics exist for the file, so the compile degrades instead of
    // failing outright.
    let result = compile_files(&[("Hero.spx", "turn 90\n")]).expect("partial result");
    assert!(result.main_spx_file.is_empty());
}

#[test]
fn type_errors_become_positioned_diagnostics() {
    let result = compile_files(&[("main.spx", "play bogus\nrun \"assets\"\n")]).expect("compile");
    let diags = diags(&result, "main.spx");
    let diag = diags
        .iter()
        .find(|d| d.message == "undefined: bogus")
        .expect("undefined diagnostic");
    assert_eq!(diag.range.start.line, 0);
    assert_eq!(diag.range.start.character, 5);
}
