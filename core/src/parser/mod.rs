#[cfg(test)]
mod parser_test;

use crate::ast::*;
use crate::token::{scan, ParseError, Pos, RawToken, Token, NO_POS};

/// Output of [parse_file]: the file is always present, even for broken input,
/// so callers can still index and render diagnostics.
#[derive(Debug)]
pub struct ParseResult {
    pub file: File,
    pub errors: Vec<ParseError>,
}

/// Parses one source file. `base` is the file's base in the owning file set;
/// all node positions are global.
pub fn parse_file(path: &str, src: &str, base: Pos) -> ParseResult {
    let (tokens, comments, scan_errors) = scan(src);

    let mut parser = Parser {
        src,
        base,
        tokens,
        i: 0,
        errors: Vec::new(),
    };
    for e in scan_errors {
        parser
            .errors
            .push(ParseError::new(base + e.offset as Pos, e.message));
    }

    let file = parser.parse(path, comments);
    ParseResult {
        file,
        errors: parser.errors,
    }
}

struct Parser<'a> {
    src: &'a str,
    base: Pos,
    tokens: Vec<RawToken>,
    i: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn cur(&self) -> &Token {
        &self.tokens[self.i].tok
    }

    fn peek(&self) -> &Token {
        let j = (self.i + 1).min(self.tokens.len() - 1);
        &self.tokens[j].tok
    }

    fn cur_pos(&self) -> Pos {
        self.base + self.tokens[self.i].start as Pos
    }

    fn cur_end(&self) -> Pos {
        self.base + self.tokens[self.i].end as Pos
    }

    fn raw(&self) -> &'a str {
        let t = &self.tokens[self.i];
        &self.src[t.start..t.end]
    }

    fn advance(&mut self) {
        if self.i + 1 < self.tokens.len() {
            self.i += 1;
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.cur(), Token::Eof)
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let pos = self.cur_pos();
        self.errors.push(ParseError::new(pos, message));
    }

    /// Consumes a token that carries no payload, reporting its absence.
    fn expect(&mut self, want: &Token) -> Pos {
        if std::mem::discriminant(self.cur()) == std::mem::discriminant(want) {
            let pos = self.cur_pos();
            self.advance();
            pos
        } else {
            self.error_here(format!("expected {}, found {}", want, self.cur()));
            NO_POS
        }
    }

    fn expect_ident(&mut self) -> Ident {
        if let Token::Ident(name) = self.cur() {
            let id = Ident::new(self.cur_pos(), name.clone());
            self.advance();
            id
        } else {
            self.error_here(format!("expected identifier, found {}", self.cur()));
            Ident::new(NO_POS, "_")
        }
    }

    fn skip_semis(&mut self) {
        while matches!(self.cur(), Token::Semi) {
            self.advance();
        }
    }

    /// Consumes the statement terminator, resynchronising on garbage.
    fn expect_terminator(&mut self) {
        match self.cur() {
            Token::Semi => self.advance(),
            Token::RBrace | Token::RParen | Token::Eof => {}
            other => {
                let msg = format!("expected newline, found {other}");
                self.error_here(msg);
                self.sync_stmt();
            }
        }
    }

    fn sync_stmt(&mut self) {
        loop {
            match self.cur() {
                Token::Semi => {
                    self.advance();
                    return;
                }
                Token::RBrace | Token::Eof => return,
                _ => self.advance(),
            }
        }
    }

    fn parse(&mut self, path: &str, comments: Vec<crate::token::RawComment>) -> File {
        let pos = self.base;
        let end = self.base + self.src.len() as Pos;

        self.skip_semis();
        let package = if matches!(self.cur(), Token::Package) {
            let package_pos = self.cur_pos();
            self.advance();
            let name = self.expect_ident();
            self.expect_terminator();
            Some(PackageClause { package_pos, name })
        } else {
            None
        };

        let mut decls: Vec<Decl> = Vec::new();
        let mut shadow_stmts: Vec<Stmt> = Vec::new();
        loop {
            self.skip_semis();
            match self.cur() {
                Token::Eof => break,
                Token::Var | Token::Const => {
                    let decl = self.gen_decl();
                    self.expect_terminator();
                    decls.push(Decl::Gen(decl));
                }
                Token::Func => {
                    let decl = self.func_decl();
                    self.expect_terminator();
                    decls.push(Decl::Func(decl));
                }
                _ => shadow_stmts.push(self.stmt()),
            }
        }

        if !shadow_stmts.is_empty() {
            decls.push(Decl::Func(FuncDecl {
                func_pos: NO_POS,
                name: Ident::new(NO_POS, "main"),
                params: None,
                body: Block {
                    lbrace: NO_POS,
                    stmts: shadow_stmts,
                    rbrace: NO_POS,
                },
                shadow: true,
            }));
        }

        File {
            path: path.to_string(),
            package,
            decls,
            comments: comments
                .into_iter()
                .map(|c| Comment {
                    pos: self.base + c.start as Pos,
                    end: self.base + c.end as Pos,
                    text: c.text,
                })
                .collect(),
            pos,
            end,
        }
    }

    fn gen_decl(&mut self) -> GenDecl {
        let tok_pos = self.cur_pos();
        let tok = if matches!(self.cur(), Token::Var) {
            DeclTok::Var
        } else {
            DeclTok::Const
        };
        self.advance();

        let mut specs = Vec::new();
        let mut lparen = NO_POS;
        let mut rparen = NO_POS;
        if matches!(self.cur(), Token::LParen) {
            lparen = self.cur_pos();
            self.advance();
            loop {
                self.skip_semis();
                if matches!(self.cur(), Token::RParen | Token::Eof) {
                    break;
                }
                specs.push(self.value_spec());
                self.expect_terminator();
            }
            rparen = self.expect(&Token::RParen);
        } else {
            specs.push(self.value_spec());
        }

        GenDecl {
            tok_pos,
            tok,
            lparen,
            specs,
            rparen,
        }
    }

    fn value_spec(&mut self) -> ValueSpec {
        let mut names = vec![self.expect_ident()];
        while matches!(self.cur(), Token::Comma) {
            self.advance();
            names.push(self.expect_ident());
        }

        let typ = if matches!(self.cur(), Token::Ident(_)) {
            Some(self.type_expr())
        } else {
            None
        };

        let mut values = Vec::new();
        if matches!(self.cur(), Token::Assign) {
            self.advance();
            values.push(self.expr());
            while matches!(self.cur(), Token::Comma) {
                self.advance();
                values.push(self.expr());
            }
        }

        ValueSpec { names, typ, values }
    }

    /// Type denotations are identifiers, optionally selector-qualified.
    fn type_expr(&mut self) -> Expr {
        let mut x = Expr::Ident(self.expect_ident());
        while matches!(self.cur(), Token::Dot) {
            self.advance();
            let sel = self.expect_ident();
            x = Expr::Selector(SelectorExpr { x: Box::new(x), sel });
        }
        x
    }

    fn func_decl(&mut self) -> FuncDecl {
        let func_pos = self.cur_pos();
        self.advance();
        let name = self.expect_ident();
        let params = if matches!(self.cur(), Token::LParen) {
            Some(self.field_list())
        } else {
            None
        };
        let body = self.block();
        FuncDecl {
            func_pos,
            name,
            params,
            body,
            shadow: false,
        }
    }

    fn field_list(&mut self) -> FieldList {
        let opening = self.cur_pos();
        self.advance();
        let mut fields = Vec::new();
        while !matches!(self.cur(), Token::RParen | Token::Eof) {
            let name = self.expect_ident();
            let typ = if matches!(self.cur(), Token::Ident(_)) {
                Some(self.type_expr())
            } else {
                None
            };
            fields.push(Field { name, typ });
            if matches!(self.cur(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        let closing = self.expect(&Token::RParen);
        FieldList {
            opening,
            fields,
            closing,
        }
    }

    fn block(&mut self) -> Block {
        let lbrace = self.expect(&Token::LBrace);
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if matches!(self.cur(), Token::RBrace | Token::Eof) {
                break;
            }
            stmts.push(self.stmt());
        }
        let rbrace = self.expect(&Token::RBrace);
        Block { lbrace, stmts, rbrace }
    }

    fn stmt(&mut self) -> Stmt {
        match self.cur() {
            Token::If => self.if_stmt(),
            Token::For => self.for_stmt(),
            Token::Return => {
                let return_pos = self.cur_pos();
                self.advance();
                let mut results = Vec::new();
                if !matches!(self.cur(), Token::Semi | Token::RBrace | Token::Eof) {
                    results.push(self.expr());
                    while matches!(self.cur(), Token::Comma) {
                        self.advance();
                        results.push(self.expr());
                    }
                }
                self.expect_terminator();
                Stmt::Return(ReturnStmt { return_pos, results })
            }
            Token::Break | Token::Continue => {
                let pos = self.cur_pos();
                let kind = if matches!(self.cur(), Token::Break) {
                    BranchKind::Break
                } else {
                    BranchKind::Continue
                };
                self.advance();
                self.expect_terminator();
                Stmt::Branch(BranchStmt { pos, kind })
            }
            Token::LBrace => {
                let block = self.block();
                self.expect_terminator();
                Stmt::Block(block)
            }
            Token::Var | Token::Const => {
                let decl = self.gen_decl();
                self.expect_terminator();
                Stmt::Decl(DeclStmt { decl })
            }
            _ => self.simple_stmt(),
        }
    }

    fn if_stmt(&mut self) -> Stmt {
        let if_pos = self.cur_pos();
        self.advance();
        let cond = self.expr();
        let body = self.block();
        let else_branch = if matches!(self.cur(), Token::Else) {
            self.advance();
            if matches!(self.cur(), Token::If) {
                Some(Box::new(self.if_stmt()))
            } else {
                let block = self.block();
                self.expect_terminator();
                Some(Box::new(Stmt::Block(block)))
            }
        } else {
            self.expect_terminator();
            None
        };
        Stmt::If(IfStmt {
            if_pos,
            cond,
            body,
            else_branch,
        })
    }

    fn for_stmt(&mut self) -> Stmt {
        let for_pos = self.cur_pos();
        self.advance();

        let mut key = None;
        let mut value = None;
        let mut in_pos = NO_POS;
        let mut x = None;

        if !matches!(self.cur(), Token::LBrace) {
            let is_range = matches!(self.cur(), Token::Ident(_)) && matches!(self.peek(), Token::Comma | Token::In);
            if is_range {
                key = Some(self.expect_ident());
                if matches!(self.cur(), Token::Comma) {
                    self.advance();
                    value = Some(self.expect_ident());
                }
                in_pos = self.expect(&Token::In);
                x = Some(self.expr());
            } else {
                x = Some(self.expr());
            }
        }
        let body = self.block();
        self.expect_terminator();
        Stmt::For(ForStmt {
            for_pos,
            key,
            value,
            in_pos,
            x,
            body,
        })
    }

    fn simple_stmt(&mut self) -> Stmt {
        let first = self.expr();

        match self.cur() {
            Token::Comma => {
                let mut lhs = vec![first];
                while matches!(self.cur(), Token::Comma) {
                    self.advance();
                    lhs.push(self.expr());
                }
                let (op, op_pos) = self.assign_op();
                let mut rhs = Vec::new();
                if op_pos != NO_POS {
                    rhs.push(self.expr());
                    while matches!(self.cur(), Token::Comma) {
                        self.advance();
                        rhs.push(self.expr());
                    }
                }
                self.expect_terminator();
                Stmt::Assign(AssignStmt { lhs, op_pos, op, rhs })
            }
            Token::Assign
            | Token::Define
            | Token::AddAssign
            | Token::SubAssign
            | Token::MulAssign
            | Token::DivAssign
            | Token::ModAssign => {
                let (op, op_pos) = self.assign_op();
                let mut rhs = vec![self.expr()];
                while matches!(self.cur(), Token::Comma) {
                    self.advance();
                    rhs.push(self.expr());
                }
                self.expect_terminator();
                Stmt::Assign(AssignStmt {
                    lhs: vec![first],
                    op_pos,
                    op,
                    rhs,
                })
            }
            Token::Inc | Token::Dec => {
                let op_pos = self.cur_pos();
                let op = if matches!(self.cur(), Token::Inc) {
                    IncDecOp::Inc
                } else {
                    IncDecOp::Dec
                };
                self.advance();
                self.expect_terminator();
                Stmt::IncDec(IncDecStmt { x: first, op_pos, op })
            }
            _ => {
                // Command form: `play "x"` calls an identifier or selector
                // without parentheses.
                let x = if matches!(first, Expr::Ident(_) | Expr::Selector(_)) && self.starts_command_arg() {
                    let args = self.command_args();
                    Expr::Call(CallExpr {
                        fun: Box::new(first),
                        lparen: NO_POS,
                        args,
                        rparen: NO_POS,
                    })
                } else {
                    first
                };
                self.expect_terminator();
                Stmt::Expr(ExprStmt { x })
            }
        }
    }

    fn assign_op(&mut self) -> (AssignOp, Pos) {
        let op = match self.cur() {
            Token::Assign => AssignOp::Assign,
            Token::Define => AssignOp::Define,
            Token::AddAssign => AssignOp::Add,
            Token::SubAssign => AssignOp::Sub,
            Token::MulAssign => AssignOp::Mul,
            Token::DivAssign => AssignOp::Div,
            Token::ModAssign => AssignOp::Rem,
            other => {
                let msg = format!("expected assignment operator, found {other}");
                self.error_here(msg);
                return (AssignOp::Assign, NO_POS);
            }
        };
        let pos = self.cur_pos();
        self.advance();
        (op, pos)
    }

    fn starts_command_arg(&self) -> bool {
        matches!(
            self.cur(),
            Token::Ident(_)
                | Token::Str(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::LBracket
                | Token::Sub
                | Token::Not
                | Token::Arrow
        )
    }

    fn command_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        loop {
            if matches!(self.cur(), Token::Arrow) {
                args.push(self.lambda());
            } else {
                args.push(self.expr());
            }
            if matches!(self.cur(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        args
    }

    fn lambda(&mut self) -> Expr {
        let arrow = self.cur_pos();
        self.advance();
        let body = self.block();
        Expr::Lambda(LambdaExpr {
            arrow,
            params: Vec::new(),
            body,
        })
    }

    fn expr(&mut self) -> Expr {
        self.binary_expr(0)
    }

    fn binary_expr(&mut self, min_prec: u8) -> Expr {
        let mut x = self.unary_expr();
        loop {
            let (op, prec) = match self.cur() {
                Token::OrOr => (BinOp::Or, 1),
                Token::AndAnd => (BinOp::And, 2),
                Token::Eq => (BinOp::Eq, 3),
                Token::Ne => (BinOp::Ne, 3),
                Token::Lt => (BinOp::Lt, 3),
                Token::Gt => (BinOp::Gt, 3),
                Token::Le => (BinOp::Le, 3),
                Token::Ge => (BinOp::Ge, 3),
                Token::Add => (BinOp::Add, 4),
                Token::Sub => (BinOp::Sub, 4),
                Token::Star => (BinOp::Mul, 5),
                Token::Slash => (BinOp::Div, 5),
                Token::Percent => (BinOp::Rem, 5),
                _ => break,
            };
            if prec <= min_prec {
                break;
            }
            let op_pos = self.cur_pos();
            self.advance();
            let y = self.binary_expr(prec);
            x = Expr::Binary(BinaryExpr {
                x: Box::new(x),
                op_pos,
                op,
                y: Box::new(y),
            });
        }
        x
    }

    fn unary_expr(&mut self) -> Expr {
        match self.cur() {
            Token::Sub | Token::Not => {
                let op_pos = self.cur_pos();
                let op = if matches!(self.cur(), Token::Sub) {
                    UnOp::Neg
                } else {
                    UnOp::Not
                };
                self.advance();
                let x = self.unary_expr();
                Expr::Unary(UnaryExpr {
                    op_pos,
                    op,
                    x: Box::new(x),
                })
            }
            _ => self.postfix_expr(),
        }
    }

    fn postfix_expr(&mut self) -> Expr {
        let mut x = self.primary_expr();
        loop {
            match self.cur() {
                Token::Dot => {
                    self.advance();
                    let sel = self.expect_ident();
                    x = Expr::Selector(SelectorExpr { x: Box::new(x), sel });
                }
                Token::LParen => {
                    let lparen = self.cur_pos();
                    self.advance();
                    let mut args = Vec::new();
                    while !matches!(self.cur(), Token::RParen | Token::Eof) {
                        if matches!(self.cur(), Token::Arrow) {
                            args.push(self.lambda());
                        } else {
                            args.push(self.expr());
                        }
                        if matches!(self.cur(), Token::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    let rparen = self.expect(&Token::RParen);
                    x = Expr::Call(CallExpr {
                        fun: Box::new(x),
                        lparen,
                        args,
                        rparen,
                    });
                }
                Token::LBracket => {
                    let lbrack = self.cur_pos();
                    self.advance();
                    let index = self.expr();
                    let rbrack = self.expect(&Token::RBracket);
                    x = Expr::Index(IndexExpr {
                        x: Box::new(x),
                        lbrack,
                        index: Box::new(index),
                        rbrack,
                    });
                }
                _ => break,
            }
        }
        x
    }

    fn primary_expr(&mut self) -> Expr {
        match self.cur().clone() {
            Token::Ident(name) => {
                let id = Ident::new(self.cur_pos(), name);
                self.advance();
                Expr::Ident(id)
            }
            Token::Str(value) => {
                let lit = BasicLit {
                    pos: self.cur_pos(),
                    kind: LitKind::String,
                    raw: self.raw().to_string(),
                    value: Some(value),
                };
                self.advance();
                Expr::Lit(lit)
            }
            Token::Int(_) => {
                let lit = BasicLit {
                    pos: self.cur_pos(),
                    kind: LitKind::Int,
                    raw: self.raw().to_string(),
                    value: None,
                };
                self.advance();
                Expr::Lit(lit)
            }
            Token::Float(_) => {
                let lit = BasicLit {
                    pos: self.cur_pos(),
                    kind: LitKind::Float,
                    raw: self.raw().to_string(),
                    value: None,
                };
                self.advance();
                Expr::Lit(lit)
            }
            Token::LParen => {
                let lparen = self.cur_pos();
                self.advance();
                let x = self.expr();
                let rparen = self.expect(&Token::RParen);
                Expr::Paren(ParenExpr {
                    lparen,
                    x: Box::new(x),
                    rparen,
                })
            }
            Token::LBracket => {
                let lbrack = self.cur_pos();
                self.advance();
                let mut elts = Vec::new();
                while !matches!(self.cur(), Token::RBracket | Token::Eof) {
                    elts.push(self.expr());
                    if matches!(self.cur(), Token::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let rbrack = self.expect(&Token::RBracket);
                Expr::List(ListLit { lbrack, elts, rbrack })
            }
            Token::Arrow => self.lambda(),
            other => {
                let pos = self.cur_pos();
                let end = self.cur_end();
                self.error_here(format!("expected expression, found {other}"));
                if !self.at_eof() {
                    self.advance();
                }
                Expr::Bad(BadExpr { pos, end })
            }
        }
    }
}
