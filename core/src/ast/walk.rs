use super::*;
use crate::token::Pos;

/// A borrowed reference to any place in the tree, including bare identifiers
/// (declaration names, selector members) and, inside enclosing paths,
/// synthetic token nodes.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    File(&'a File),
    Decl(&'a Decl),
    Spec(&'a ValueSpec),
    FieldList(&'a FieldList),
    Field(&'a Field),
    Stmt(&'a Stmt),
    Block(&'a Block),
    Expr(&'a Expr),
    Ident(&'a Ident),
    Tok(Pos, Pos),
}

impl<'a> Node<'a> {
    pub fn pos(&self) -> Pos {
        match self {
            Node::File(n) => n.pos,
            Node::Decl(n) => n.pos(),
            Node::Spec(n) => n.pos(),
            Node::FieldList(n) => n.pos(),
            Node::Field(n) => n.pos(),
            Node::Stmt(n) => n.pos(),
            Node::Block(n) => n.pos(),
            Node::Expr(n) => n.pos(),
            Node::Ident(n) => n.pos,
            Node::Tok(pos, _) => *pos,
        }
    }

    pub fn end(&self) -> Pos {
        match self {
            Node::File(n) => n.end,
            Node::Decl(n) => n.end(),
            Node::Spec(n) => n.end(),
            Node::FieldList(n) => n.end(),
            Node::Field(n) => n.end(),
            Node::Stmt(n) => n.end(),
            Node::Block(n) => n.end(),
            Node::Expr(n) => n.end(),
            Node::Ident(n) => n.end(),
            Node::Tok(_, end) => *end,
        }
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Node::Tok(..))
    }
}

/// Preorder traversal. The visitor returns false to skip a node's children,
/// mirroring `ast.Inspect`.
pub fn walk<'a, F>(node: Node<'a>, f: &mut F)
where
    F: FnMut(Node<'a>) -> bool,
{
    if !f(node) {
        return;
    }
    match node {
        Node::File(file) => {
            if let Some(pkg) = &file.package {
                walk(Node::Ident(&pkg.name), f);
            }
            for decl in &file.decls {
                walk(Node::Decl(decl), f);
            }
        }
        Node::Decl(decl) => match decl {
            Decl::Gen(d) => {
                for spec in &d.specs {
                    walk(Node::Spec(spec), f);
                }
            }
            Decl::Func(d) => {
                if !d.shadow {
                    walk(Node::Ident(&d.name), f);
                    if let Some(params) = &d.params {
                        walk(Node::FieldList(params), f);
                    }
                }
                walk(Node::Block(&d.body), f);
            }
            Decl::Bad(_) => {}
        },
        Node::Spec(spec) => {
            for name in &spec.names {
                walk(Node::Ident(name), f);
            }
            if let Some(typ) = &spec.typ {
                walk(Node::Expr(typ), f);
            }
            for value in &spec.values {
                walk(Node::Expr(value), f);
            }
        }
        Node::FieldList(list) => {
            for field in &list.fields {
                walk(Node::Field(field), f);
            }
        }
        Node::Field(field) => {
            walk(Node::Ident(&field.name), f);
            if let Some(typ) = &field.typ {
                walk(Node::Expr(typ), f);
            }
        }
        Node::Block(block) => {
            for stmt in &block.stmts {
                walk(Node::Stmt(stmt), f);
            }
        }
        Node::Stmt(stmt) => match stmt {
            Stmt::Expr(s) => walk(Node::Expr(&s.x), f),
            Stmt::Assign(s) => {
                for lhs in &s.lhs {
                    walk(Node::Expr(lhs), f);
                }
                for rhs in &s.rhs {
                    walk(Node::Expr(rhs), f);
                }
            }
            Stmt::IncDec(s) => walk(Node::Expr(&s.x), f),
            Stmt::Return(s) => {
                for result in &s.results {
                    walk(Node::Expr(result), f);
                }
            }
            Stmt::Branch(_) => {}
            Stmt::If(s) => {
                walk(Node::Expr(&s.cond), f);
                walk(Node::Block(&s.body), f);
                if let Some(else_branch) = &s.else_branch {
                    walk(Node::Stmt(else_branch), f);
                }
            }
            Stmt::For(s) => {
                if let Some(key) = &s.key {
                    walk(Node::Ident(key), f);
                }
                if let Some(value) = &s.value {
                    walk(Node::Ident(value), f);
                }
                if let Some(x) = &s.x {
                    walk(Node::Expr(x), f);
                }
                walk(Node::Block(&s.body), f);
            }
            Stmt::Block(s) => walk(Node::Block(s), f),
            Stmt::Decl(s) => {
                for spec in &s.decl.specs {
                    walk(Node::Spec(spec), f);
                }
            }
            Stmt::Bad(_) => {}
        },
        Node::Expr(expr) => match expr {
            Expr::Ident(_) | Expr::Lit(_) | Expr::Bad(_) => {}
            Expr::Paren(x) => walk(Node::Expr(&x.x), f),
            Expr::Unary(x) => walk(Node::Expr(&x.x), f),
            Expr::Binary(x) => {
                walk(Node::Expr(&x.x), f);
                walk(Node::Expr(&x.y), f);
            }
            Expr::Call(x) => {
                walk(Node::Expr(&x.fun), f);
                for arg in &x.args {
                    walk(Node::Expr(arg), f);
                }
            }
            Expr::Selector(x) => {
                walk(Node::Expr(&x.x), f);
                walk(Node::Ident(&x.sel), f);
            }
            Expr::Index(x) => {
                walk(Node::Expr(&x.x), f);
                walk(Node::Expr(&x.index), f);
            }
            Expr::List(x) => {
                for elt in &x.elts {
                    walk(Node::Expr(elt), f);
                }
            }
            Expr::Lambda(x) => {
                for param in &x.params {
                    walk(Node::Ident(param), f);
                }
                walk(Node::Block(&x.body), f);
            }
        },
        Node::Ident(_) | Node::Tok(..) => {}
    }
}

/// Visits every expression in the subtree rooted at `node`.
pub fn walk_expr<'a, F>(node: Node<'a>, f: &mut F)
where
    F: FnMut(&'a Expr),
{
    walk(node, &mut |n| {
        if let Node::Expr(e) = n {
            f(e);
        }
        true
    });
}
