use crate::ast::*;
use crate::parser::parse_file;
use crate::token::Pos;

fn parse(src: &str) -> File {
    parse_file("main.spx", src, 1).file
}

fn pos_of(src: &str, needle: &str) -> Pos {
    src.find(needle).expect("needle not in source") as Pos + 1
}

fn describe(node: &Node<'_>) -> &'static str {
    match node {
        Node::File(_) => "file",
        Node::Decl(_) => "decl",
        Node::Spec(_) => "spec",
        Node::FieldList(_) => "fieldlist",
        Node::Field(_) => "field",
        Node::Stmt(_) => "stmt",
        Node::Block(_) => "block",
        Node::Expr(Expr::Ident(_)) => "ident",
        Node::Expr(Expr::Call(_)) => "call",
        Node::Expr(_) => "expr",
        Node::Ident(_) => "ident",
        Node::Tok(..) => "tok",
    }
}

#[test]
fn whole_file_interval_is_exact_root() {
    let src = "play \"boom\"\n";
    let file = parse(src);
    let (path, exact) = path_enclosing_interval(&file, file.pos, file.end);
    assert!(exact);
    assert_eq!(path.len(), 1);
    assert!(matches!(path[0], Node::File(_)));
}

#[test]
fn identifier_interval_binds_innermost() {
    let src = "x := 1\nplay \"boom\"\n";
    let file = parse(src);
    let p = pos_of(src, "play");
    let (path, exact) = path_enclosing_interval(&file, p, p + 4);
    assert!(exact);
    assert_eq!(describe(&path[0]), "ident");
    assert!(path.iter().any(|n| matches!(n, Node::Expr(Expr::Call(_)))));
    assert!(matches!(path.last(), Some(Node::File(_))));
}

#[test]
fn zero_width_cursor_uses_following_byte() {
    let src = "play \"boom\"\n";
    let file = parse(src);
    let p = pos_of(src, "play") + 1; // inside `play`
    let (path, _) = path_enclosing_interval(&file, p, p);
    assert_eq!(describe(&path[0]), "ident");
}

#[test]
fn interior_whitespace_binds_parent_inexactly() {
    let src = "play \"boom\"\n";
    let file = parse(src);
    let space = pos_of(src, " \"boom\"");
    let (path, exact) = path_enclosing_interval(&file, space, space + 1);
    assert!(!exact);
    assert_eq!(describe(&path[0]), "call");
}

#[test]
fn token_query_stops_at_parent() {
    // Tokens participate in the search but never appear in the result: the
    // `:=` of an assignment yields the assignment itself.
    let src = "x := 1\n";
    let file = parse(src);
    let p = pos_of(src, ":=");
    let (path, _) = path_enclosing_interval(&file, p, p + 2);
    assert_eq!(describe(&path[0]), "stmt");
    assert!(matches!(path[0], Node::Stmt(Stmt::Assign(_))));
}

#[test]
fn interval_spanning_children_is_inexact() {
    let src = "x := 1\n";
    let file = parse(src);
    let start = pos_of(src, "x");
    let end = pos_of(src, ":=") + 2; // covers `x :=`
    let (path, exact) = path_enclosing_interval(&file, start, end);
    assert!(!exact);
    assert!(matches!(path[0], Node::Stmt(Stmt::Assign(_))));
}

#[test]
fn swapped_bounds_are_normalised() {
    let src = "play \"boom\"\n";
    let file = parse(src);
    let p = pos_of(src, "play");
    let (path, _) = path_enclosing_interval(&file, p + 4, p);
    assert_eq!(describe(&path[0]), "ident");
}

#[test]
fn enlarging_interval_keeps_outer_path_prefix() {
    // The path of a larger interval is always an outermost-side prefix of
    // the path of any interval it contains.
    let src = "var s Sound\nonStart => {\n\tplay s\n}\n";
    let file = parse(src);
    let p = pos_of(src, "play");

    let (small, _) = path_enclosing_interval(&file, p, p + 4);
    let (large, _) = path_enclosing_interval(&file, pos_of(src, "onStart"), p + 4);

    let small_outer: Vec<Pos> = small.iter().rev().map(Node::pos).collect();
    let large_outer: Vec<Pos> = large.iter().rev().map(Node::pos).collect();
    assert!(large_outer.len() <= small_outer.len());
    assert_eq!(&small_outer[..large_outer.len()], &large_outer[..]);
}

#[test]
fn var_block_spec_path() {
    let src = "var (\n\ts Sound\n)\nrun \"assets\"\n";
    let file = parse(src);
    let p = pos_of(src, "s Sound");
    let (path, _) = path_enclosing_interval(&file, p, p + 1);
    assert_eq!(describe(&path[0]), "ident");
    assert!(path.iter().any(|n| matches!(n, Node::Spec(_))));
    assert!(path.iter().any(|n| matches!(n, Node::Decl(Decl::Gen(_)))));
}

#[test]
fn handler_block_statement_path_flattens_shadow() {
    let src = "onStart => {\n\tplay \"boom\"\n}\n";
    let file = parse(src);
    let p = pos_of(src, "\"boom\"");
    let (path, _) = path_enclosing_interval(&file, p, p + 6);
    // Expected chain: literal, call, block statement machinery, lambda,
    // outer call, shadow declaration, file. The shadow declaration itself
    // appears, its synthetic name never does.
    assert_eq!(describe(&path[0]), "expr");
    assert!(path.iter().any(|n| matches!(n, Node::Expr(Expr::Lambda(_)))));
    assert!(
        path.iter()
            .any(|n| matches!(n, Node::Decl(Decl::Func(f)) if f.shadow)),
        "shadow declaration missing from path"
    );
    assert!(matches!(path.last(), Some(Node::File(_))));
}
