use super::*;
use spxls_core::project::Project;
use tower_lsp::lsp_types::{DiagnosticSeverity, Position, Range};

fn project(files: &[(&str, &str)]) -> Project {
    Project::new(files.iter().map(|(p, s)| (p.to_string(), s.to_string())))
}

fn compile_files(files: &[(&str, &str)]) -> Result<CompileResult, CompileError> {
    compile(&project(files), "file:///", &default_analyzers())
}

fn compile_ok(files: &[(&str, &str)]) -> CompileResult {
    compile_files(files).expect("compile succeeded")
}

fn messages_for<'a>(result: &'a CompileResult, path: &str) -> Vec<&'a str> {
    result
        .diagnostics
        .get(&result.to_document_uri(path))
        .map(|diags| diags.iter().map(|d| d.message.as_str()).collect())
        .unwrap_or_default()
}

const SOUND_META: &str = r#"{"path": "sound.wav"}"#;

#[test]
fn resource_root_from_constant() {
    let result = compile_ok(&[("main.spx", "const dir = \"res\"\nrun dir\n")]);
    assert_eq!(result.resource_root_dir, "res");
}

#[test]
fn shadowed_run_does_not_set_resource_root() {
    // The callee is resolved through the checker, so a user-defined `run`
    // never names the resource root.
    let result = compile_ok(&[("main.spx", "func run(dir string) {\n}\nrun \"elsewhere\"\n")]);
    assert_eq!(result.resource_root_dir, "assets");
    assert!(!messages_for(&result, "main.spx")
        .iter()
        .any(|m| m.contains("first argument of run")));
}

#[test]
fn assigned_name_identifier_is_chased_to_its_right_hand_side() {
    // Inspecting the assigned identifier chases through the enclosing
    // assignment to the literal on its right-hand side.
    let result = compile_ok(&[
        (
            "main.spx",
            "var (\n\tbgm SoundName\n)\nbgm = \"boom\"\nrun \"assets\"\n",
        ),
        ("assets/sounds/boom/index.json", SOUND_META),
    ]);
    assert!(result
        .resource_refs
        .iter()
        .any(|r| r.id == SpxResourceId::Sound { name: "boom".into() }
            && r.kind == SpxResourceRefKind::StringLiteral));
    assert!(!messages_for(&result, "main.spx").iter().any(|m| m.contains("not found")));
}

#[test]
fn sprite_costume_resolves_through_receiver() {
    let result = compile_ok(&[
        (
            "main.spx",
            "var (\n\tHero Hero\n)\nHero.setCostume \"idle\"\nrun \"assets\"\n",
        ),
        ("Hero.spx", "\n"),
        (
            "assets/sprites/Hero/index.json",
            r#"{"costumes": [{"name": "idle"}], "fAnimations": {"walk": {}}}"#,
        ),
    ]);
    assert!(result.resource_refs.iter().any(|r| r.id
        == SpxResourceId::SpriteCostume {
            sprite: "Hero".into(),
            name: "idle".into(),
        }));
    let messages = messages_for(&result, "main.spx");
    assert!(
        !messages.iter().any(|m| m.contains("not found")),
        "unexpected diagnostics: {messages:?}"
    );
}

#[test]
fn receiverless_sprite_call_names_the_enclosing_file() {
    let result = compile_ok(&[
        ("main.spx", "run \"assets\"\n"),
        ("Hero.spx", "animate \"walk\"\n"),
        (
            "assets/sprites/Hero/index.json",
            r#"{"costumes": [], "fAnimations": {"walk": {}}}"#,
        ),
    ]);
    assert!(result.resource_refs.iter().any(|r| r.id
        == SpxResourceId::SpriteAnimation {
            sprite: "Hero".into(),
            name: "walk".into(),
        }));
    assert!(!messages_for(&result, "Hero.spx").iter().any(|m| m.contains("not found")));
}

#[test]
fn missing_costume_is_reported_per_sprite() {
    let result = compile_ok(&[
        ("main.spx", "run \"assets\"\n"),
        ("Hero.spx", "setCostume \"bogus\"\n"),
        ("assets/sprites/Hero/index.json", r#"{"costumes": [], "fAnimations": {}}"#),
    ]);
    assert!(messages_for(&result, "Hero.spx")
        .iter()
        .any(|m| *m == "costume resource \"bogus\" not found in sprite \"Hero\""));
}

#[test]
fn empty_resource_name_is_an_error() {
    let result = compile_ok(&[("main.spx", "play \"\"\nrun \"assets\"\n")]);
    assert!(messages_for(&result, "main.spx")
        .iter()
        .any(|m| *m == "sound resource name cannot be empty"));
}

#[test]
fn broken_resource_metadata_degrades_to_diagnostic() {
    let result = compile_ok(&[
        ("main.spx", "run \"assets\"\n"),
        ("assets/sounds/s/index.json", "{not json"),
    ]);
    assert!(messages_for(&result, "main.spx")
        .iter()
        .any(|m| m.starts_with("failed to create spx resource set:")));
}

#[test]
fn building_the_index_twice_is_deterministic() {
    let files = [
        (
            "main.spx",
            "var (\n\ts Sound\n)\nonStart => {\n\tplay s\n\tplay \"boom\"\n}\nrun \"assets\"\n",
        ),
        ("assets/sounds/s/index.json", SOUND_META),
        ("assets/sounds/boom/index.json", SOUND_META),
    ];
    let a = compile_ok(&files);
    let b = compile_ok(&files);
    assert_eq!(a.resource_refs, b.resource_refs);
}

#[test]
fn diagnostic_dedup_is_by_severity_range_message() {
    let mut result = compile_ok(&[("main.spx", "run \"assets\"\n")]);
    let uri = result.to_document_uri("main.spx");
    let range = Range::new(Position::new(0, 0), Position::new(0, 3));
    let before = result.diagnostics[&uri].len();

    result.add_error(uri.clone(), range, "duplicate me");
    result.add_error(uri.clone(), range, "duplicate me");
    assert_eq!(result.diagnostics[&uri].len(), before + 1);

    // A different severity with the same range and message is a new entry.
    result.add_warning(uri.clone(), range, "duplicate me");
    assert_eq!(result.diagnostics[&uri].len(), before + 2);
    assert!(result.has_error_severity_diagnostic);
}

#[test]
fn unreachable_code_analyzer_reports() {
    let result = compile_ok(&[(
        "main.spx",
        "func f() {\n\treturn\n\tplay \"x\"\n}\nrun \"assets\"\n",
    )]);
    assert!(messages_for(&result, "main.spx").iter().any(|m| *m == "unreachable code"));
}

#[test]
fn overload_expansion_round_trip() {
    let result = compile_ok(&[("main.spx", "play \"boom\"\nrun \"assets\"\n")]);
    let source = result.source_file("main.spx").unwrap();
    let ident = result
        .ident_at_position(source, Position::new(0, 1))
        .expect("ident under cursor");
    assert_eq!(ident.name, "play");

    let defs = definitions_for_ident(&result, ident.pos, &ident.name);
    assert_eq!(defs.len(), 3);
    assert!(defs.iter().all(|d| d.name == "play"));
    let ids: Vec<&str> = defs.iter().filter_map(|d| d.overload_id.as_deref()).collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
}

#[test]
fn unexpandable_overloadable_func_yields_nothing() {
    let result = compile_ok(&[("main.spx", "getWidget \"score\"\nrun \"assets\"\n")]);
    let source = result.source_file("main.spx").unwrap();
    let ident = result
        .ident_at_position(source, Position::new(0, 1))
        .expect("ident under cursor");
    assert!(definitions_for_ident(&result, ident.pos, &ident.name).is_empty());
}

#[test]
fn walk_struct_visits_embedded_members_once() {
    let result = compile_ok(&[("main.spx", "run \"assets\"\n"), ("Hero.spx", "\n")]);
    let hero = result.tinfo.sprite_classes["Hero"];

    let mut members: Vec<(String, String)> = Vec::new();
    walk_struct(&result.tinfo, hero, &mut |member, selector| {
        members.push((
            result.tinfo.object(member).name.clone(),
            result.tinfo.named_type(selector).name.clone(),
        ));
        true
    });

    // The embedded field itself comes first (selector Hero), then sprite
    // members through the embedded chain (selector SpriteImpl).
    assert_eq!(members[0], ("SpriteImpl".to_string(), "Hero".to_string()));
    assert!(members
        .iter()
        .any(|(name, selector)| name == "setCostume" && selector == "SpriteImpl"));
    let count = members.iter().filter(|(name, _)| name == "setCostume").count();
    assert_eq!(count, 1);
}

#[test]
fn event_handler_detection_uses_enclosing_calls() {
    let result = compile_ok(&[(
        "main.spx",
        "var (\n\ts Sound\n)\nonStart => {\n\tplay s\n}\nrun \"assets\"\n",
    ), ("assets/sounds/s/index.json", SOUND_META)]);
    let source = result.source_file("main.spx").unwrap();
    let offset = source.content.find("play").unwrap();
    let inside = source.token_file.pos(offset + 1);
    assert!(result.is_in_spx_event_handler(inside));

    let top_level = source.token_file.pos(source.content.find("var").unwrap() + 1);
    assert!(!result.is_in_spx_event_handler(top_level));
}

#[test]
fn document_links_cover_resource_refs() {
    let result = compile_ok(&[
        ("main.spx", "play \"boom\"\nrun \"assets\"\n"),
        ("assets/sounds/boom/index.json", SOUND_META),
    ]);
    let source = result.source_file("main.spx").unwrap();
    let links = result.document_links(source);
    assert!(links
        .iter()
        .any(|l| l.target.as_ref().is_some_and(|t| t.as_str() == "spx://resources/sounds/boom")));
    // Memoised per document.
    let again = result.document_links(source);
    assert_eq!(links.len(), again.len());
}

#[test]
fn name_convention_helpers() {
    assert_eq!(parse_overload_func_name("Play__0"), ("play".to_string(), Some("0".to_string())));
    assert_eq!(parse_overload_func_name("step"), ("step".to_string(), None));
    assert!(is_event_handler_func_name("onStart"));
    assert!(!is_event_handler_func_name("once"));
    assert_eq!(split_gopt_method_name("Gopt_Game_Gopx_GetWidget"), Some(("Game", "GetWidget")));
    assert_eq!(split_gopt_method_name("Gopt_Sprite_Clone"), Some(("Sprite", "Clone")));
    assert_eq!(split_gopt_method_name("Clone"), None);
    assert_eq!(to_lower_camel_case("SetCostume"), "setCostume");
}

#[test]
fn diagnostics_map_has_entry_per_source_file() {
    let result = compile_ok(&[("main.spx", "run \"assets\"\n"), ("Hero.spx", "\n")]);
    assert!(result.diagnostics.contains_key(&result.to_document_uri("main.spx")));
    assert!(result.diagnostics.contains_key(&result.to_document_uri("Hero.spx")));
    assert_eq!(messages_for(&result, "Hero.spx").len(), 0);
}

#[test]
fn ident_at_position_uses_line_index() {
    let result = compile_ok(&[("main.spx", "var (\n\ts Sound\n)\nrun \"assets\"\n")]);
    let source = result.source_file("main.spx").unwrap();
    let ident = result.ident_at_position(source, Position::new(1, 1)).expect("ident");
    assert_eq!(ident.name, "s");
    assert!(result.ident_at_position(source, Position::new(2, 0)).is_none());

    let sound = result.ident_at_position(source, Position::new(1, 3)).expect("type ident");
    assert_eq!(sound.name, "Sound");
}

#[test]
fn resource_ref_at_position_picks_smallest_span() {
    let result = compile_ok(&[
        ("main.spx", "play \"boom\"\nrun \"assets\"\n"),
        ("assets/sounds/boom/index.json", SOUND_META),
    ]);
    let source = result.source_file("main.spx").unwrap();
    let r = result
        .resource_ref_at_position(source, Position::new(0, 7))
        .expect("resource ref under cursor");
    assert_eq!(r.id, SpxResourceId::Sound { name: "boom".into() });
    assert_eq!(r.kind, SpxResourceRefKind::StringLiteral);
}

#[test]
fn severity_flag_reflects_errors_only() {
    let result = compile_ok(&[
        ("main.spx", "var (\n\ts Sound\n)\nvar (\n\tt Sound\n)\nrun \"assets\"\n"),
        ("assets/sounds/s/index.json", SOUND_META),
        ("assets/sounds/t/index.json", SOUND_META),
    ]);
    // `t` only triggers the first-var-block warning.
    let uri = result.to_document_uri("main.spx");
    let diags = &result.diagnostics[&uri];
    assert!(diags.iter().all(|d| d.severity == Some(DiagnosticSeverity::WARNING)));
    assert!(!result.has_error_severity_diagnostic);
}
