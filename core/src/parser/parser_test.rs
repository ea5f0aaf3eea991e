use crate::ast::*;
use crate::parser::parse_file;

fn parse_ok(src: &str) -> File {
    let result = parse_file("main.spx", src, 1);
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    result.file
}

fn shadow_stmts(file: &File) -> &[Stmt] {
    &file.shadow_func().expect("shadow func").body.stmts
}

#[test]
fn parses_var_block_with_specs() {
    let file = parse_ok("var (\n\ts Sound\n\tHero Hero\n)\n");
    let Decl::Gen(decl) = &file.decls[0] else {
        panic!("expected gen decl");
    };
    assert_eq!(decl.tok, DeclTok::Var);
    assert_eq!(decl.specs.len(), 2);
    assert_eq!(decl.specs[0].names[0].name, "s");
    assert!(matches!(&decl.specs[0].typ, Some(Expr::Ident(id)) if id.name == "Sound"));
}

#[test]
fn parses_unparenthesised_var_and_const() {
    let file = parse_ok("var x = 1\nconst bgm = \"level1\"\n");
    assert_eq!(file.decls.len(), 2);
    let Decl::Gen(konst) = &file.decls[1] else {
        panic!("expected const decl");
    };
    assert_eq!(konst.tok, DeclTok::Const);
    assert!(matches!(&konst.specs[0].values[0], Expr::Lit(l) if l.value.as_deref() == Some("level1")));
}

#[test]
fn parses_command_call_without_parens() {
    let file = parse_ok("play \"boom\", true\n");
    let [Stmt::Expr(stmt)] = shadow_stmts(&file) else {
        panic!("expected one expression statement");
    };
    let Expr::Call(call) = &stmt.x else {
        panic!("expected call");
    };
    assert_eq!(call.lparen, crate::token::NO_POS);
    assert_eq!(call.args.len(), 2);
}

#[test]
fn parses_parenthesised_call() {
    let file = parse_ok("play(\"boom\")\n");
    let [Stmt::Expr(stmt)] = shadow_stmts(&file) else {
        panic!("expected one expression statement");
    };
    let Expr::Call(call) = &stmt.x else {
        panic!("expected call");
    };
    assert_ne!(call.lparen, crate::token::NO_POS);
    assert_eq!(call.args.len(), 1);
}

#[test]
fn parses_handler_lambda() {
    let file = parse_ok("onStart => {\n\tplay \"boom\"\n}\n");
    let [Stmt::Expr(stmt)] = shadow_stmts(&file) else {
        panic!("expected one expression statement");
    };
    let Expr::Call(call) = &stmt.x else {
        panic!("expected call");
    };
    assert!(matches!(&call.args[0], Expr::Lambda(_)));
}

#[test]
fn parses_selector_command() {
    let file = parse_ok("Hero.turn 90\n");
    let [Stmt::Expr(stmt)] = shadow_stmts(&file) else {
        panic!("expected one expression statement");
    };
    let Expr::Call(call) = &stmt.x else {
        panic!("expected call");
    };
    let Expr::Selector(sel) = call.fun.as_ref() else {
        panic!("expected selector callee");
    };
    assert_eq!(sel.sel.name, "turn");
}

#[test]
fn parses_define_and_assign() {
    let file = parse_ok("name := \"Flappy\"\nname = \"Bird\"\nn++\n");
    let stmts = shadow_stmts(&file);
    assert!(matches!(&stmts[0], Stmt::Assign(a) if a.op == AssignOp::Define));
    assert!(matches!(&stmts[1], Stmt::Assign(a) if a.op == AssignOp::Assign));
    assert!(matches!(&stmts[2], Stmt::IncDec(i) if i.op == IncDecOp::Inc));
}

#[test]
fn parses_func_decl_with_params() {
    let file = parse_ok("func greet(who SpriteName) {\n\tsay who\n}\n");
    let Decl::Func(func) = &file.decls[0] else {
        panic!("expected func decl");
    };
    assert_eq!(func.name.name, "greet");
    let params = func.params.as_ref().unwrap();
    assert_eq!(params.fields.len(), 1);
    assert_eq!(params.fields[0].name.name, "who");
}

#[test]
fn parses_if_else_and_for() {
    let file = parse_ok("if x > 1 {\n\tx = 0\n} else {\n\tx++\n}\nfor k, v in items {\n\tsay v\n}\n");
    let stmts = shadow_stmts(&file);
    let Stmt::If(if_stmt) = &stmts[0] else {
        panic!("expected if");
    };
    assert!(if_stmt.else_branch.is_some());
    let Stmt::For(for_stmt) = &stmts[1] else {
        panic!("expected for");
    };
    assert_eq!(for_stmt.key.as_ref().unwrap().name, "k");
    assert_eq!(for_stmt.value.as_ref().unwrap().name, "v");
}

#[test]
fn keeps_going_after_errors() {
    let result = parse_file("main.spx", "var = 3\nplay \"boom\"\n", 1);
    assert!(!result.errors.is_empty());
    // The good statement after the broken declaration still parses.
    let shadow = result.file.shadow_func().expect("shadow func");
    assert!(shadow
        .body
        .stmts
        .iter()
        .any(|s| matches!(s, Stmt::Expr(e) if matches!(&e.x, Expr::Call(_)))));
}

#[test]
fn package_clause_other_than_main_still_parses() {
    let result = parse_file("main.spx", "package foo\n", 1);
    assert!(result.errors.is_empty());
    assert_eq!(result.file.package.as_ref().unwrap().name.name, "foo");
    assert!(result.file.decls.is_empty());
}
