use crate::ast;
use crate::parser::parse_file;
use crate::token::Pos;
use crate::typ::*;

struct Checked {
    sources: Vec<(String, String)>,
    files: Vec<(String, ast::File)>,
    info: TypeInfo,
}

fn check(sources: &[(&str, &str)]) -> Checked {
    let mut base: Pos = 1;
    let mut files = Vec::new();
    for (path, src) in sources {
        let result = parse_file(path, src, base);
        assert!(
            result.errors.is_empty(),
            "parse errors in {path}: {:?}",
            result.errors
        );
        base += src.len() as Pos + 1;
        files.push(((*path).to_string(), result.file));
    }
    let refs: Vec<(&str, &ast::File)> = files.iter().map(|(p, f)| (p.as_str(), f)).collect();
    let info = check_files(&refs);
    Checked {
        sources: sources
            .iter()
            .map(|(p, s)| ((*p).to_string(), (*s).to_string()))
            .collect(),
        files,
        info,
    }
}

impl Checked {
    fn pos_of(&self, path: &str, needle: &str) -> Pos {
        let mut base: Pos = 1;
        for (p, src) in &self.sources {
            if p == path {
                return base + src.find(needle).expect("needle not in source") as Pos;
            }
            base += src.len() as Pos + 1;
        }
        panic!("no such file {path}");
    }

    fn file(&self, path: &str) -> &ast::File {
        &self.files.iter().find(|(p, _)| p == path).unwrap().1
    }
}

#[test]
fn var_decl_gets_declared_spx_type() {
    let c = check(&[("main.spx", "var (\n\ts Sound\n)\nrun \"assets\"\n")]);
    let s_pos = c.pos_of("main.spx", "s Sound");
    let obj = c.info.defs.get(&s_pos).copied().expect("def for s");
    let object = c.info.object(obj);
    assert_eq!(object.typ, c.info.spx.sound_type);
    assert!(object.in_class_fields_decl);
    assert_eq!(object.pkg, Pkg::Main);
}

#[test]
fn later_var_block_is_not_fields_decl() {
    let c = check(&[("main.spx", "var x = 1\nvar (\n\ts Sound\n)\n")]);
    let s_pos = c.pos_of("main.spx", "s Sound");
    let obj = c.info.defs.get(&s_pos).copied().expect("def for s");
    assert!(!c.info.object(obj).in_class_fields_decl);
}

#[test]
fn undefined_identifier_is_reported() {
    let c = check(&[("main.spx", "play bogus\n")]);
    assert!(c
        .info
        .errors
        .iter()
        .any(|e| e.message == "undefined: bogus" && e.pos == c.pos_of("main.spx", "bogus")));
}

#[test]
fn command_call_resolves_overload_by_argument() {
    let c = check(&[("main.spx", "play \"boom\"\n")]);
    let play_pos = c.pos_of("main.spx", "play");
    // The use still names the overloadable marker...
    let marker = c.info.uses.get(&play_pos).copied().expect("use of play");
    assert!(c.info.is_overloadable_func(marker));
    // ...while the recorded callee type is the resolved concrete variant.
    let tv = c.info.type_of((play_pos, play_pos + 4)).expect("type of callee");
    let Type::Func(sig) = &tv.typ else {
        panic!("callee is not a function");
    };
    let sig = c.info.signature(*sig);
    assert_eq!(sig.params.len(), 1);
    assert_eq!(sig.params[0].typ, c.info.spx.sound_name_type);
}

#[test]
fn overload_expansion_is_stable() {
    let c = check(&[("main.spx", "play \"boom\"\n")]);
    let marker = c.info.uses[&c.pos_of("main.spx", "play")];
    let overloads = c.info.expand_overloads(marker).expect("expansion");
    let names: Vec<&str> = overloads
        .iter()
        .map(|&o| c.info.object(o).name.as_str())
        .collect();
    assert_eq!(names, vec!["play__0", "play__1", "play__2"]);
}

#[test]
fn get_widget_is_unexpandable() {
    let c = check(&[("main.spx", "run \"assets\"\n")]);
    let obj = c
        .info
        .lookup_chain(c.info.spx.game_scope, "getWidget")
        .expect("getWidget");
    assert!(c.info.is_overloadable_func(obj));
    assert!(c.info.is_unexpandable_overloadable_func(obj));
}

#[test]
fn const_value_flows_to_uses() {
    let c = check(&[("main.spx", "const bgm = \"level1\"\nplay bgm\n")]);
    let use_pos = c.pos_of("main.spx", "bgm\n");
    let tv = c.info.type_of((use_pos, use_pos + 3)).expect("type of bgm use");
    assert_eq!(tv.value, Some(ConstValue::String("level1".to_string())));
}

#[test]
fn sprite_file_sees_sprite_members() {
    let c = check(&[
        ("main.spx", "run \"assets\"\n"),
        ("Hero.spx", "setCostume \"idle\"\n"),
    ]);
    let pos = c.pos_of("Hero.spx", "setCostume");
    let obj = c.info.uses.get(&pos).copied().expect("use of setCostume");
    let object = c.info.object(obj);
    assert_eq!(object.pkg, Pkg::Spx);
    let sig = c.info.func_signature(obj).unwrap();
    assert_eq!(sig.params[0].typ, c.info.spx.costume_name_type);
}

#[test]
fn sprite_class_selector_resolves_method() {
    let c = check(&[
        ("main.spx", "Hero.turn 90\n"),
        ("Hero.spx", "\n"),
    ]);
    let named = c.info.sprite_classes["Hero"];
    assert!(c.info.is_sprite_class(named));
    let turn_pos = c.pos_of("main.spx", "turn");
    let obj = c.info.uses.get(&turn_pos).copied().expect("use of turn");
    assert_eq!(c.info.object(obj).name, "turn");
    // Found through the embedded SpriteImpl of the class.
    let sig = c.info.func_signature(obj).unwrap();
    assert_eq!(sig.recv, Some(c.info.spx.sprite_impl_type.clone()));
}

#[test]
fn innermost_scope_distinguishes_file_and_body() {
    let c = check(&[("main.spx", "var (\n\ts Sound\n)\nonStart => {\n\tname := \"x\"\n}\n")]);
    let file = c.file("main.spx");
    let file_scope = c.info.file_scopes["main.spx"];

    let s_pos = c.pos_of("main.spx", "s Sound");
    assert_eq!(c.info.innermost_scope_at(s_pos), Some(file_scope));

    let name_pos = c.pos_of("main.spx", "name");
    let inner = c.info.innermost_scope_at(name_pos).expect("scope at name");
    assert_ne!(inner, file_scope);
    assert!(file.shadow_func().is_some());
}

#[test]
fn dialect_package_is_recognised_by_marker() {
    let c = check(&[("main.spx", "run \"assets\"\n")]);
    assert!(c.info.is_dialect_pkg_scope(c.info.spx.game_scope));
    assert!(!c.info.is_dialect_pkg_scope(c.info.pkg_scope));
}

#[test]
fn member_lookup_walks_embedded_structs() {
    let c = check(&[("main.spx", "run \"assets\"\n")]);
    // Sprite itself declares no methods; `turn` is found through the
    // embedded SpriteImpl.
    let obj = c.info.lookup_member(c.info.spx.sprite, "turn").expect("turn on Sprite");
    assert_eq!(c.info.object(obj).name, "turn");
}
