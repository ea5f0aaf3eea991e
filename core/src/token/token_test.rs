use super::*;

fn kinds(src: &str) -> Vec<Token> {
    let (tokens, _, errors) = scan(src);
    assert!(errors.is_empty(), "unexpected scan errors: {errors:?}");
    tokens.into_iter().map(|t| t.tok).collect()
}

#[test]
fn scans_command_call_line() {
    let toks = kinds("play \"explosion\"\n");
    assert_eq!(
        toks,
        vec![
            Token::Ident("play".into()),
            Token::Str("explosion".into()),
            Token::Semi,
            Token::Eof,
        ]
    );
}

#[test]
fn inserts_terminator_only_after_statement_enders() {
    let toks = kinds("x =\n1\n");
    assert_eq!(
        toks,
        vec![
            Token::Ident("x".into()),
            Token::Assign,
            Token::Int(1),
            Token::Semi,
            Token::Eof,
        ]
    );
}

#[test]
fn scans_operators_longest_first() {
    let toks = kinds("a := b == c => d += 1");
    assert!(toks.contains(&Token::Define));
    assert!(toks.contains(&Token::Eq));
    assert!(toks.contains(&Token::Arrow));
    assert!(toks.contains(&Token::AddAssign));
}

#[test]
fn decodes_string_escapes() {
    let (tokens, _, errors) = scan(r#""a\n\"b\"""#);
    assert!(errors.is_empty());
    assert_eq!(tokens[0].tok, Token::Str("a\n\"b\"".into()));
}

#[test]
fn reports_unterminated_string() {
    let (tokens, _, errors) = scan("\"oops\nx = 1\n");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("not terminated"));
    assert!(matches!(tokens[0].tok, Token::Str(_)));
}

#[test]
fn collects_line_comments() {
    let (tokens, comments, _) = scan("// the stage\nvar x = 1\n");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, " the stage");
    assert_eq!(tokens[0].tok, Token::Var);
}

#[test]
fn token_file_positions() {
    let mut fset = FileSet::new();
    let file = fset.add_file("main.spx", "ab\ncd\n");
    assert_eq!(file.line_count(), 3);
    assert_eq!(file.position(file.pos(0)).line, 1);
    assert_eq!(file.position(file.pos(3)).line, 2);
    assert_eq!(file.position(file.pos(3)).column, 1);
    assert_eq!(file.position(file.pos(4)).column, 2);
    // Clamped lookups.
    assert_eq!(file.line_start(99), file.pos(6));
    assert_eq!(file.offset(file.end_pos()), 6);
}

#[test]
fn file_set_bases_do_not_overlap() {
    let mut fset = FileSet::new();
    let a = fset.add_file("a.spx", "aaaa");
    let b = fset.add_file("b.spx", "bb");
    assert!(b.base() > a.end_pos());
    assert_eq!(fset.file(a.pos(2)).unwrap().name(), "a.spx");
    assert_eq!(fset.file(b.pos(0)).unwrap().name(), "b.spx");
    assert!(fset.file(NO_POS).is_none());
}
