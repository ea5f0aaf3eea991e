use std::sync::Arc;

use spxls_core::ast::walk::{walk, Node};
use spxls_core::ast::{Block, Stmt};
use spxls_core::token::Pos;
use spxls_core::typ::TypeInfo;

use super::SourceFile;

/// A finding reported by an analyzer, anchored to a source interval.
#[derive(Debug, Clone)]
pub struct AnalyzerDiag {
    pub span: (Pos, Pos),
    pub message: String,
}

/// Per-file context handed to each analyzer run. Analyzers must be pure over
/// their inputs; findings go through [AnalyzerPass::report].
pub struct AnalyzerPass<'a> {
    pub source: &'a SourceFile,
    pub tinfo: &'a TypeInfo,
    reports: Vec<AnalyzerDiag>,
}

impl<'a> AnalyzerPass<'a> {
    pub(crate) fn new(source: &'a SourceFile, tinfo: &'a TypeInfo) -> Self {
        Self {
            source,
            tinfo,
            reports: Vec::new(),
        }
    }

    pub fn report(&mut self, span: (Pos, Pos), message: impl Into<String>) {
        self.reports.push(AnalyzerDiag {
            span,
            message: message.into(),
        });
    }

    pub(crate) fn into_reports(self) -> Vec<AnalyzerDiag> {
        self.reports
    }
}

/// A registered static check run over every source file after compilation.
/// Findings become error-severity diagnostics; a crash inside `analyze` is
/// caught and reported as a diagnostic naming the analyzer.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;
    fn analyze(&self, pass: &mut AnalyzerPass<'_>) -> Result<(), String>;
}

pub fn default_analyzers() -> Vec<Arc<dyn Analyzer>> {
    vec![Arc::new(UnreachableCode)]
}

/// Flags statements that can never run because an unconditional return,
/// break or continue precedes them in the same block.
struct UnreachableCode;

impl UnreachableCode {
    fn check_stmts(stmts: &[Stmt], pass: &mut AnalyzerPass<'_>) {
        for (i, stmt) in stmts.iter().enumerate() {
            if matches!(stmt, Stmt::Return(_) | Stmt::Branch(_)) {
                if let Some(next) = stmts.get(i + 1) {
                    pass.report((next.pos(), next.end()), "unreachable code");
                }
                break;
            }
        }
    }
}

impl Analyzer for UnreachableCode {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn analyze(&self, pass: &mut AnalyzerPass<'_>) -> Result<(), String> {
        let ast = pass.source.ast.clone();
        let mut blocks: Vec<&Block> = Vec::new();
        walk(Node::File(&ast), &mut |node| {
            if let Node::Block(block) = node {
                blocks.push(block);
            }
            true
        });
        for block in blocks {
            Self::check_stmts(&block.stmts, pass);
        }
        Ok(())
    }
}
