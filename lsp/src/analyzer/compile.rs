use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tower_lsp::lsp_types::Range;

use spxls_core::ast::walk::{walk, Node};
use spxls_core::ast::Expr;
use spxls_core::project::{Project, MAIN_SPX_FILE};
use spxls_core::typ::{BasicKind, Type};

use super::refs::inspect_resource_refs;
use super::{Analyzer, AnalyzerPass, CompileResult, SourceFile, SpxResourceSet};

/// Default resource root when `run` does not name one.
const DEFAULT_RESOURCE_ROOT: &str = "assets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// No valid `main.spx` file exists in the main package.
    NoMainSpxFile,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::NoMainSpxFile => write!(f, "no valid main.spx file found in main package"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Runs the full analysis pass over the snapshot: parse every source file,
/// type-check, discover the resource root and load the resource set, build
/// the resource-reference index, and run the registered analyzers. Problems
/// accumulate as diagnostics; the only failure is the absence of a usable
/// main file when there is nothing to report instead.
pub fn compile(
    proj: &Project,
    root_uri: &str,
    analyzers: &[Arc<dyn Analyzer>],
) -> Result<CompileResult, CompileError> {
    let spx_files = proj.spx_files();
    if spx_files.is_empty() {
        return Err(CompileError::NoMainSpxFile);
    }

    let tinfo = proj.type_info();
    let mut result = CompileResult::new(root_uri, tinfo.clone(), proj.pkg_doc());

    for path in &spx_files {
        let uri = result.to_document_uri(path);
        result.diagnostics.entry(uri.clone()).or_default();

        let Ok(entry) = proj.ast(path) else { continue };
        let file = proj.file(path).expect("listed file exists");
        result.files.insert(
            path.clone(),
            SourceFile {
                path: path.clone(),
                content: file.content.clone(),
                version: file.version,
                token_file: entry.token_file.clone(),
                ast: entry.file.clone(),
                parse_errors: entry.errors.clone(),
            },
        );

        for err in &entry.errors {
            let range = result.range_for_pos(err.pos);
            result.add_error(uri.clone(), range, err.message.clone());
        }

        let ast = entry.file.clone();
        if let Some(pkg) = &ast.package {
            if pkg.name.name != "main" {
                let range = result.range_for_span((pkg.name.pos, pkg.name.end()));
                result.add_error(uri.clone(), range, "package name must be main");
                continue;
            }
        }
        if path.rsplit('/').next() == Some(MAIN_SPX_FILE) {
            result.main_spx_file = path.clone();
        }
    }

    if result.main_spx_file.is_empty() {
        if result.diagnostics.is_empty() {
            return Err(CompileError::NoMainSpxFile);
        }
        return Ok(result);
    }

    // Route every checker error through per-position diagnostics.
    let type_errors = tinfo.errors.clone();
    for err in type_errors {
        let Some(source) = result.file_of_pos(err.pos) else {
            continue;
        };
        let uri = result.to_document_uri(&source.path);
        let range = result.range_for_pos(err.pos);
        result.add_error(uri, range, err.message);
    }

    inspect_resource_root(&mut result);
    match SpxResourceSet::load(proj, &result.resource_root_dir) {
        Ok(set) => result.resource_set = set,
        Err(err) => {
            let uri = result.to_document_uri(&result.main_spx_file);
            result.add_error(uri, Range::default(), format!("failed to create spx resource set: {err}"));
        }
    }

    inspect_resource_refs(&mut result);
    run_analyzers(&mut result, analyzers);

    Ok(result)
}

/// Finds the resource root named by the main file's `run` call. The callee
/// is resolved through the type checker, so a shadowed or misspelled `run`
/// does not count. The first argument must be a string literal or constant.
fn inspect_resource_root(result: &mut CompileResult) {
    let Some(main) = result.files.get(&result.main_spx_file) else {
        return;
    };
    let tinfo = result.tinfo.clone();
    let ast = main.ast.clone();

    let mut root_dir = String::new();
    let mut bad_arg_span: Option<(spxls_core::token::Pos, spxls_core::token::Pos)> = None;
    walk(Node::File(&ast), &mut |node| {
        if !root_dir.is_empty() || bad_arg_span.is_some() {
            return false;
        }
        let Node::Expr(Expr::Call(call)) = node else {
            return true;
        };
        let Expr::Ident(fun) = call.fun.unparen() else {
            return true;
        };
        let Some(obj) = tinfo.object_of(fun.pos) else {
            return true;
        };
        if obj != tinfo.spx.run_func {
            return true;
        }
        let Some(first_arg) = call.args.first() else {
            return true;
        };

        let string_typed = tinfo.type_of(first_arg.span()).is_some_and(|tv| {
            matches!(
                tv.typ,
                Type::Basic(BasicKind::String) | Type::Basic(BasicKind::UntypedString)
            )
        });
        if string_typed {
            if let Some(value) = string_value(&tinfo, first_arg) {
                root_dir = value;
            }
        } else {
            bad_arg_span = Some(first_arg.span());
        }
        false
    });

    if let Some(span) = bad_arg_span {
        let uri = result.to_document_uri(&result.main_spx_file);
        let range = result.range_for_span(span);
        result.add_error(uri, range, "first argument of run must be a string literal or constant");
    }
    if root_dir.is_empty() {
        root_dir = DEFAULT_RESOURCE_ROOT.to_string();
    }
    result.resource_root_dir = root_dir;
}

fn string_value(tinfo: &spxls_core::typ::TypeInfo, expr: &Expr) -> Option<String> {
    match expr.unparen() {
        Expr::Lit(lit) => lit.value.clone(),
        Expr::Ident(_) => tinfo
            .type_of(expr.span())
            .and_then(|tv| tv.value.as_ref())
            .and_then(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}

fn run_analyzers(result: &mut CompileResult, analyzers: &[Arc<dyn Analyzer>]) {
    let tinfo = result.tinfo.clone();
    let sources: Vec<SourceFile> = result.files.values().cloned().collect();

    for source in &sources {
        let uri = result.to_document_uri(&source.path);
        for analyzer in analyzers {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut pass = AnalyzerPass::new(source, &tinfo);
                analyzer.analyze(&mut pass).map(|()| pass.into_reports())
            }));
            match outcome {
                Ok(Ok(reports)) => {
                    for report in reports {
                        let range = result.range_for_span(report.span);
                        result.add_error(uri.clone(), range, report.message);
                    }
                }
                Ok(Err(err)) => {
                    let name = analyzer.name();
                    result.add_error(
                        uri.clone(),
                        Range::default(),
                        format!("analyzer {name:?} failed: {err}"),
                    );
                }
                Err(_) => {
                    let name = analyzer.name();
                    result.add_error(
                        uri.clone(),
                        Range::default(),
                        format!("analyzer {name:?} failed: panic during analysis"),
                    );
                }
            }
        }
    }
}
