use super::walk::{walk, Node};
use super::*;
use crate::token::{Pos, NO_POS};

/// Returns the chain of nodes enclosing the source interval `[start, end)`,
/// innermost first, together with an exactness flag.
///
/// "Enclosing" extends each child's interval into the whitespace separating
/// it from its siblings, so a cursor resting just after an identifier still
/// binds to it. Bare tokens (keywords, punctuation) participate in the search
/// but never appear in the result: querying the `+` of `x + y` yields the
/// binary expression.
///
/// If `start == end`, the 1-byte interval following `start` is used. The
/// result always contains at least the file root. `exact` is true when the
/// interval covers only the innermost node and perhaps adjacent whitespace,
/// false when it overlaps several children or lies in interior whitespace.
pub fn path_enclosing_interval<'a>(root: &'a File, start: Pos, end: Pos) -> (Vec<Node<'a>>, bool) {
    let (mut start, mut end) = if start > end { (end, start) } else { (start, end) };

    let mut path: Vec<Node<'a>> = Vec::new();
    let mut exact = false;

    let intersects = start < root.end && (end > root.pos || (!root.has_pkg_decl() && end == root.pos));
    if intersects {
        if start == end {
            end = start + 1;
        }
        exact = visit(Node::File(root), &mut start, &mut end, &mut path);
        path.reverse();
    } else {
        // Selection lies wholly outside the file's token range; the result
        // nonetheless includes the file itself.
        path.push(Node::File(root));
    }

    (path, exact)
}

fn visit<'a>(node: Node<'a>, start: &mut Pos, end: &mut Pos, path: &mut Vec<Node<'a>>) -> bool {
    path.push(node);

    let node_pos = node.pos();
    let node_end = node.end();

    // Intersect [start, end) with the node's interval.
    if *start < node_pos {
        *start = node_pos;
    }
    if *end > node_end {
        *end = node_end;
    }

    // Find the sole child whose augmented interval contains [start, end).
    let children = children_of(node);
    let l = children.len();
    for (i, child) in children.iter().enumerate() {
        let child_pos = child.pos();
        let child_end = child.end();

        let aug_pos = if i > 0 { children[i - 1].end() } else { child_pos };
        let mut aug_end = child_end;
        if i < l - 1 {
            let next_child_pos = children[i + 1].pos();
            // Does [start, end) lie between this child and the next?
            if *start >= aug_end && *end <= next_child_pos {
                return false; // inexact match
            }
            aug_end = next_child_pos;
        }

        if aug_pos <= *start && *end <= aug_end {
            if child.is_token() {
                return true;
            }
            return visit(*child, start, end, path);
        }

        // Does [start, end) overlap multiple children?
        if *start < child_end && *end > aug_end {
            break;
        }
    }

    // No single child contained the interval, so this node is the result.
    // (This check must come after the child loop: a node and its sole child
    // can have equal intervals.)
    *start == node_pos && *end == node_end
}

fn tok(pos: Pos, len: usize) -> Option<Node<'static>> {
    if pos == NO_POS {
        None
    } else {
        Some(Node::Tok(pos, pos + len as Pos))
    }
}

/// Direct children of `node` in position order: true subtrees plus synthetic
/// nodes for bare tokens. Token nodes are transient; they never appear in an
/// enclosing path.
fn children_of<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    // Shadow declarations flatten into their body statements.
    if let Node::Decl(Decl::Func(f)) = node {
        if f.shadow {
            return f.body.stmts.iter().map(Node::Stmt).collect();
        }
    }

    // True subtrees first, via a single-level traversal.
    let mut children: Vec<Node<'a>> = Vec::new();
    let mut is_root = true;
    walk(node, &mut |child| {
        if is_root {
            is_root = false;
            return true;
        }
        children.push(child);
        false
    });

    // Then synthetic nodes for bare tokens, positions from per-kind fields.
    let mut toks: Vec<Option<Node<'a>>> = Vec::new();
    match node {
        Node::File(f) => {
            if let Some(pkg) = &f.package {
                toks.push(tok(pkg.package_pos, "package".len()));
            }
        }
        Node::Decl(Decl::Gen(d)) | Node::Stmt(Stmt::Decl(DeclStmt { decl: d })) => {
            toks.push(tok(d.tok_pos, d.tok.text().len()));
            if d.lparen != NO_POS {
                toks.push(tok(d.lparen, 1));
                toks.push(tok(d.rparen, 1));
            }
        }
        Node::Decl(Decl::Func(d)) => {
            toks.push(tok(d.func_pos, "func".len()));
        }
        Node::FieldList(list) => {
            toks.push(tok(list.opening, 1));
            toks.push(tok(list.closing, 1));
        }
        Node::Block(b) => {
            toks.push(tok(b.lbrace, 1));
            toks.push(tok(b.rbrace, 1));
        }
        Node::Stmt(stmt) => match stmt {
            Stmt::Assign(s) => toks.push(tok(s.op_pos, s.op.text().len())),
            Stmt::IncDec(s) => toks.push(tok(s.op_pos, 2)),
            Stmt::Return(s) => toks.push(tok(s.return_pos, "return".len())),
            Stmt::If(s) => toks.push(tok(s.if_pos, "if".len())),
            Stmt::For(s) => {
                toks.push(tok(s.for_pos, "for".len()));
                if s.in_pos != NO_POS {
                    toks.push(tok(s.in_pos, "in".len()));
                }
            }
            _ => {}
        },
        Node::Expr(expr) => match expr {
            Expr::Lit(x) => toks.push(tok(x.pos, x.raw.len())),
            Expr::Paren(x) => {
                toks.push(tok(x.lparen, 1));
                toks.push(tok(x.rparen, 1));
            }
            Expr::Unary(x) => toks.push(tok(x.op_pos, x.op.text().len())),
            Expr::Binary(x) => toks.push(tok(x.op_pos, x.op.text().len())),
            Expr::Call(x) => {
                if x.lparen != NO_POS {
                    toks.push(tok(x.lparen, 1));
                    toks.push(tok(x.rparen, 1));
                }
            }
            Expr::Index(x) => {
                toks.push(tok(x.lbrack, 1));
                toks.push(tok(x.rbrack, 1));
            }
            Expr::List(x) => {
                toks.push(tok(x.lbrack, 1));
                toks.push(tok(x.rbrack, 1));
            }
            Expr::Lambda(x) => toks.push(tok(x.arrow, "=>".len())),
            Expr::Ident(x) => toks.push(tok(x.pos, x.name.len())),
            _ => {}
        },
        Node::Ident(id) => toks.push(tok(id.pos, id.name.len())),
        _ => {}
    }
    children.extend(toks.into_iter().flatten());

    children.sort_by_key(Node::pos);
    children
}
