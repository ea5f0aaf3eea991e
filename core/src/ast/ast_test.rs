use crate::ast::*;
use crate::parser::parse_file;
use crate::token::Pos;

fn parse(src: &str) -> File {
    parse_file("main.spx", src, 1).file
}

fn pos_of(src: &str, needle: &str) -> Pos {
    src.find(needle).expect("needle not in source") as Pos + 1
}

#[test]
fn file_spans_cover_token_range() {
    let src = "var x = 1\n";
    let file = parse(src);
    assert_eq!(file.pos, 1);
    assert_eq!(file.end, src.len() as Pos + 1);
    assert!(!file.has_pkg_decl());
}

#[test]
fn package_clause_is_recorded() {
    let src = "package main\nvar x = 1\n";
    let file = parse(src);
    let pkg = file.package.as_ref().expect("package clause");
    assert_eq!(pkg.name.name, "main");
    assert_eq!(pkg.name.pos, pos_of(src, "main"));
}

#[test]
fn shadow_func_collects_top_level_statements() {
    let src = "var x = 1\nplay \"boom\"\nx = 2\n";
    let file = parse(src);
    let shadow = file.shadow_func().expect("shadow func");
    assert!(shadow.shadow);
    assert_eq!(shadow.body.stmts.len(), 2);
    // The shadow declaration spans its statements, not the whole file.
    assert_eq!(shadow.pos(), pos_of(src, "play"));
}

#[test]
fn ident_and_literal_spans() {
    let src = "play \"boom\"\n";
    let file = parse(src);
    let shadow = file.shadow_func().unwrap();
    let Stmt::Expr(stmt) = &shadow.body.stmts[0] else {
        panic!("expected expression statement");
    };
    let Expr::Call(call) = &stmt.x else {
        panic!("expected call, got {:?}", stmt.x);
    };
    assert_eq!(call.fun.pos(), pos_of(src, "play"));
    assert_eq!(call.fun.end(), pos_of(src, "play") + 4);
    let Expr::Lit(lit) = &call.args[0] else {
        panic!("expected literal argument");
    };
    assert_eq!(lit.raw, "\"boom\"");
    assert_eq!(lit.value.as_deref(), Some("boom"));
    assert_eq!(lit.end(), lit.pos + lit.raw.len() as Pos);
    // Command-form call: the span runs from callee to last argument.
    assert_eq!(stmt.x.span(), (call.fun.pos(), lit.end()));
}

#[test]
fn unparen_strips_nesting() {
    let src = "x = ((y))\n";
    let file = parse(src);
    let shadow = file.shadow_func().unwrap();
    let Stmt::Assign(assign) = &shadow.body.stmts[0] else {
        panic!("expected assignment");
    };
    let inner = assign.rhs[0].unparen();
    assert!(matches!(inner, Expr::Ident(id) if id.name == "y"));
}

#[test]
fn walk_visits_every_identifier() {
    let src = "var s Sound\nonStart => {\n\tplay s\n}\n";
    let file = parse(src);
    let mut names = Vec::new();
    walk(Node::File(&file), &mut |node| {
        match node {
            Node::Ident(id) => names.push(id.name.clone()),
            Node::Expr(Expr::Ident(id)) => names.push(id.name.clone()),
            _ => {}
        }
        true
    });
    assert_eq!(names, vec!["s", "Sound", "onStart", "play", "s"]);
}
