use tower_lsp::lsp_types::{DocumentHighlight, DocumentHighlightKind, Position};

use spxls_core::ast::walk::{walk, Node};
use spxls_core::ast::{path_enclosing_interval, AssignOp, Decl, Expr, Ident, Stmt};
use spxls_core::token::Pos;

use super::{CompileResult, SourceFile};

/// Read/Write/Text classification for every occurrence of the identifier's
/// object in the document, derived from each occurrence's enclosing context.
pub fn document_highlights(
    result: &CompileResult,
    source: &SourceFile,
    position: Position,
) -> Option<Vec<DocumentHighlight>> {
    let ident = result.ident_at_position(source, position)?;
    let target_obj = result.tinfo.object_of(ident.pos)?;

    let mut occurrences: Vec<(Pos, Pos)> = Vec::new();
    walk(Node::File(&source.ast), &mut |node| {
        let id = match node {
            Node::Ident(id) => Some(id),
            Node::Expr(Expr::Ident(id)) => Some(id),
            _ => None,
        };
        if let Some(id) = id {
            if result.tinfo.object_of(id.pos) == Some(target_obj) {
                occurrences.push((id.pos, id.end()));
            }
        }
        true
    });

    let mut highlights = Vec::new();
    for (pos, end) in occurrences {
        let kind = classify(source, pos, end);
        highlights.push(DocumentHighlight {
            range: result.range_for_span((pos, end)),
            kind: Some(kind),
        });
    }
    Some(highlights)
}

fn is_same_ident(expr: &Expr, pos: Pos) -> bool {
    matches!(expr, Expr::Ident(id) if id.pos == pos)
}

fn ident_matches(id: &Ident, pos: Pos) -> bool {
    id.pos == pos
}

fn classify(source: &SourceFile, pos: Pos, end: Pos) -> DocumentHighlightKind {
    let (path, _) = path_enclosing_interval(&source.ast, pos, end);
    if path.len() < 2 {
        return DocumentHighlightKind::TEXT;
    }

    // Walk the enclosing chain from just under the file root inward; the
    // first governing parent decides.
    for parent in path[..path.len() - 1].iter().rev() {
        let kind = match parent {
            Node::Spec(spec) => {
                if spec.names.iter().any(|n| ident_matches(n, pos)) {
                    Some(DocumentHighlightKind::WRITE)
                } else {
                    None
                }
            }
            Node::Field(field) => {
                if ident_matches(&field.name, pos) {
                    Some(DocumentHighlightKind::WRITE)
                } else {
                    None
                }
            }
            Node::Decl(Decl::Func(func)) => {
                if !func.shadow && ident_matches(&func.name, pos) {
                    Some(DocumentHighlightKind::WRITE)
                } else {
                    None
                }
            }
            Node::Stmt(stmt) => match stmt {
                Stmt::Assign(assign) => match assign.op {
                    AssignOp::Assign => {
                        if assign.lhs.iter().any(|l| is_same_ident(l, pos)) {
                            Some(DocumentHighlightKind::WRITE)
                        } else if assign.rhs.iter().any(|r| is_same_ident(r, pos)) {
                            Some(DocumentHighlightKind::READ)
                        } else {
                            None
                        }
                    }
                    AssignOp::Define => {
                        if assign.lhs.iter().any(|l| is_same_ident(l, pos)) {
                            Some(DocumentHighlightKind::WRITE)
                        } else {
                            None
                        }
                    }
                    // Compound assignment both reads and writes; report the
                    // write.
                    _ => Some(DocumentHighlightKind::WRITE),
                },
                Stmt::IncDec(incdec) => {
                    if is_same_ident(&incdec.x, pos) {
                        Some(DocumentHighlightKind::WRITE)
                    } else {
                        None
                    }
                }
                Stmt::For(for_stmt) => {
                    if for_stmt.x.as_ref().is_some_and(|x| is_same_ident(x, pos)) {
                        Some(DocumentHighlightKind::READ)
                    } else if for_stmt.key.as_ref().is_some_and(|k| ident_matches(k, pos))
                        || for_stmt.value.as_ref().is_some_and(|v| ident_matches(v, pos))
                    {
                        Some(DocumentHighlightKind::WRITE)
                    } else {
                        None
                    }
                }
                Stmt::Return(_) => Some(DocumentHighlightKind::READ),
                _ => None,
            },
            Node::Expr(expr) => match expr {
                Expr::Binary(_) | Expr::Unary(_) | Expr::Call(_) | Expr::Index(_) | Expr::List(_) => {
                    Some(DocumentHighlightKind::READ)
                }
                Expr::Selector(selector) => {
                    if is_same_ident(&selector.x, pos) {
                        Some(DocumentHighlightKind::READ)
                    } else {
                        None
                    }
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(kind) = kind {
            return kind;
        }
    }
    DocumentHighlightKind::TEXT
}
