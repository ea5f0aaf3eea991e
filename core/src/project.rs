use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::ast;
use crate::parser::parse_file;
use crate::token::{FileSet, ParseError, Pos, Position, TokenFile};
use crate::typ::{check_files, TypeInfo};

pub const SPX_EXT: &str = ".spx";
pub const MAIN_SPX_FILE: &str = "main.spx";

/// One file of the snapshot. Content is whole-replaced; the version only
/// ever advances.
#[derive(Debug, Clone)]
pub struct File {
    pub content: Arc<str>,
    pub version: i64,
}

/// Cached parse of one file: the AST is valid even when `errors` is not
/// empty, so diagnostics can always be rendered.
#[derive(Debug)]
pub struct AstEntry {
    pub version: i64,
    pub token_file: Arc<TokenFile>,
    pub file: Arc<ast::File>,
    pub errors: Vec<ParseError>,
}

/// Documentation extracted from comments directly above top-level
/// declarations, keyed by declared name.
#[derive(Debug, Default)]
pub struct PkgDoc {
    docs: HashMap<String, String>,
}

impl PkgDoc {
    pub fn doc_for(&self, name: &str) -> Option<&str> {
        self.docs.get(name).map(String::as_str)
    }
}

#[derive(Debug)]
pub enum ProjectError {
    FileNotFound(String),
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::FileNotFound(path) => write!(f, "file not found: {path}"),
        }
    }
}

impl std::error::Error for ProjectError {}

/// The snapshot facade: the in-memory file map plus memoised derived state
/// (token file set, per-path ASTs, type info, package docs).
///
/// Mutation happens through `&mut self` (the server's single-writer path);
/// derived caches fill concurrently from readers. AST cache entries are
/// immutable once stored and the first writer wins. The file set is
/// append-only, so positions inside cached ASTs stay valid across edits.
pub struct Project {
    files: HashMap<String, File>,
    fset: Mutex<FileSet>,
    asts: DashMap<String, Arc<AstEntry>>,
    type_info: OnceCell<Arc<TypeInfo>>,
    pkg_doc: OnceCell<Arc<PkgDoc>>,
}

impl Project {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(path, content)| {
                (
                    path.into(),
                    File {
                        content: content.into().into(),
                        version: 0,
                    },
                )
            })
            .collect();
        Self {
            files,
            fset: Mutex::new(FileSet::new()),
            asts: DashMap::new(),
            type_info: OnceCell::new(),
            pkg_doc: OnceCell::new(),
        }
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &File)> {
        self.files.iter().map(|(path, file)| (path.as_str(), file))
    }

    pub fn file(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Stores `content` under `path`. A version that does not advance past
    /// the stored one makes this a no-op; returns whether the write landed.
    pub fn put_file(&mut self, path: &str, content: Arc<str>, version: i64) -> bool {
        if let Some(existing) = self.files.get(path) {
            if version <= existing.version {
                return false;
            }
        }
        self.files.insert(path.to_string(), File { content, version });
        self.invalidate(path);
        true
    }

    /// Replaces the whole file map, keeping caches of files whose version is
    /// unchanged.
    pub fn update_files(&mut self, files: HashMap<String, File>) {
        let stale: Vec<String> = self
            .asts
            .iter()
            .filter(|entry| {
                files
                    .get(entry.key())
                    .map_or(true, |f| f.version != entry.value().version)
            })
            .map(|entry| entry.key().clone())
            .collect();
        self.files = files;
        for path in stale {
            self.asts.remove(&path);
        }
        self.type_info = OnceCell::new();
        self.pkg_doc = OnceCell::new();
    }

    fn invalidate(&mut self, path: &str) {
        self.asts.remove(path);
        self.type_info = OnceCell::new();
        self.pkg_doc = OnceCell::new();
    }

    /// Paths of all source files with the dialect extension, sorted.
    pub fn spx_files(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files
            .keys()
            .filter(|p| p.ends_with(SPX_EXT))
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Parses `path`, memoised per (path, version). The returned entry
    /// carries the AST even when parse errors occurred.
    pub fn ast(&self, path: &str) -> Result<Arc<AstEntry>, ProjectError> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| ProjectError::FileNotFound(path.to_string()))?;
        if let Some(entry) = self.asts.get(path) {
            if entry.version == file.version {
                return Ok(entry.clone());
            }
        }

        let token_file = self.fset.lock().unwrap().add_file(path, &file.content);
        let result = parse_file(path, &file.content, token_file.base());
        let entry = Arc::new(AstEntry {
            version: file.version,
            token_file,
            file: Arc::new(result.file),
            errors: result.errors,
        });
        // First writer wins; a racing parse of the same version is discarded.
        let stored = self
            .asts
            .entry(path.to_string())
            .and_modify(|existing| {
                if existing.version != entry.version {
                    *existing = entry.clone();
                }
            })
            .or_insert_with(|| entry.clone());
        Ok(stored.clone())
    }

    /// Parses every source file of the package.
    pub fn ast_package(&self) -> HashMap<String, Arc<AstEntry>> {
        let mut out = HashMap::new();
        for path in self.spx_files() {
            if let Ok(entry) = self.ast(&path) {
                out.insert(path, entry);
            }
        }
        out
    }

    /// Type info for the current snapshot, computed once and shared. Checker
    /// problems surface in `TypeInfo::errors`, never as a failure here.
    pub fn type_info(&self) -> Arc<TypeInfo> {
        self.type_info
            .get_or_init(|| {
                let entries = self.ast_package();
                let mut order: Vec<&String> = entries.keys().collect();
                // The stage file checks first, then sprites in path order.
                order.sort_by(|a, b| {
                    (a.as_str() != MAIN_SPX_FILE, a.as_str()).cmp(&(b.as_str() != MAIN_SPX_FILE, b.as_str()))
                });
                let files: Vec<(&str, &ast::File)> = order
                    .iter()
                    .map(|path| (path.as_str(), &*entries[*path].file))
                    .collect();
                Arc::new(check_files(&files))
            })
            .clone()
    }

    pub fn pkg_doc(&self) -> Arc<PkgDoc> {
        self.pkg_doc
            .get_or_init(|| {
                let mut docs = HashMap::new();
                for entry in self.ast_package().into_values() {
                    collect_docs(&entry, &mut docs);
                }
                Arc::new(PkgDoc { docs })
            })
            .clone()
    }

    pub fn token_file(&self, path: &str) -> Option<Arc<TokenFile>> {
        self.asts.get(path).map(|entry| entry.token_file.clone())
    }

    pub fn position(&self, pos: Pos) -> Position {
        self.fset.lock().unwrap().position(pos)
    }

    pub fn pos_file(&self, pos: Pos) -> Option<Arc<TokenFile>> {
        self.fset.lock().unwrap().file(pos)
    }

    pub fn pos_filename(&self, pos: Pos) -> Option<String> {
        self.pos_file(pos).map(|f| f.name().to_string())
    }
}

/// A comment block ending on the line directly above a top-level declaration
/// documents its first declared name.
fn collect_docs(entry: &AstEntry, docs: &mut HashMap<String, String>) {
    let token_file = &entry.token_file;
    for decl in &entry.file.decls {
        let name = match decl {
            ast::Decl::Gen(gen) => gen.specs.first().and_then(|s| s.names.first()),
            ast::Decl::Func(func) if !func.shadow => Some(&func.name),
            _ => None,
        };
        let Some(name) = name else { continue };

        let decl_line = token_file.line_for(decl.pos());
        let doc: Vec<&str> = entry
            .file
            .comments
            .iter()
            .filter(|c| {
                let comment_line = token_file.line_for(c.pos);
                comment_line + 1 == decl_line
            })
            .map(|c| c.text.trim())
            .collect();
        if !doc.is_empty() {
            docs.insert(name.name.clone(), doc.join("\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(files: &[(&str, &str)]) -> Project {
        Project::new(files.iter().map(|(p, s)| (p.to_string(), s.to_string())))
    }

    #[test]
    fn put_file_requires_newer_version() {
        let mut proj = project(&[("main.spx", "run \"assets\"\n")]);
        assert!(proj.put_file("main.spx", "play \"a\"\n".into(), 2));
        assert!(!proj.put_file("main.spx", "stale\n".into(), 1));
        assert!(!proj.put_file("main.spx", "stale\n".into(), 2));
        assert_eq!(&*proj.file("main.spx").unwrap().content, "play \"a\"\n");
        assert_eq!(proj.file("main.spx").unwrap().version, 2);
    }

    #[test]
    fn ast_is_memoised_per_version() {
        let mut proj = project(&[("main.spx", "run \"assets\"\n")]);
        let a = proj.ast("main.spx").unwrap();
        let b = proj.ast("main.spx").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        proj.put_file("main.spx", "play \"boom\"\n".into(), 1);
        let c = proj.ast("main.spx").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        // The old token file keeps its positions; the new one gets a fresh
        // base past it.
        assert!(c.token_file.base() > a.token_file.end_pos());
    }

    #[test]
    fn ast_survives_parse_errors() {
        let proj = project(&[("main.spx", "var = 3\nplay \"boom\"\n")]);
        let entry = proj.ast("main.spx").unwrap();
        assert!(!entry.errors.is_empty());
        assert!(!entry.file.decls.is_empty());
    }

    #[test]
    fn ast_reports_missing_file() {
        let proj = project(&[]);
        assert!(matches!(
            proj.ast("missing.spx"),
            Err(ProjectError::FileNotFound(_))
        ));
    }

    #[test]
    fn type_info_is_memoised_until_mutation() {
        let mut proj = project(&[("main.spx", "var (\n\ts Sound\n)\nrun \"assets\"\n")]);
        let a = proj.type_info();
        let b = proj.type_info();
        assert!(Arc::ptr_eq(&a, &b));

        proj.put_file("main.spx", "run \"assets\"\n".into(), 5);
        let c = proj.type_info();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn update_files_keeps_unchanged_versions() {
        let mut proj = project(&[("main.spx", "run \"assets\"\n"), ("Hero.spx", "turn 90\n")]);
        let main_ast = proj.ast("main.spx").unwrap();
        let hero_ast = proj.ast("Hero.spx").unwrap();

        let mut files: HashMap<String, File> =
            proj.files().map(|(p, f)| (p.to_string(), f.clone())).collect();
        files.insert(
            "Hero.spx".to_string(),
            File {
                content: "turn 180\n".into(),
                version: 3,
            },
        );
        proj.update_files(files);

        let main_after = proj.ast("main.spx").unwrap();
        let hero_after = proj.ast("Hero.spx").unwrap();
        assert!(Arc::ptr_eq(&main_ast, &main_after));
        assert!(!Arc::ptr_eq(&hero_ast, &hero_after));
    }

    #[test]
    fn spx_files_are_sorted_and_filtered() {
        let proj = project(&[
            ("b.spx", ""),
            ("a.spx", ""),
            ("assets/sounds/s/index.json", "{}"),
        ]);
        assert_eq!(proj.spx_files(), vec!["a.spx".to_string(), "b.spx".to_string()]);
    }

    #[test]
    fn pkg_doc_reads_leading_comments() {
        let proj = project(&[(
            "main.spx",
            "// Background music for level one.\nconst bgm = \"level1\"\nrun \"assets\"\n",
        )]);
        let doc = proj.pkg_doc();
        assert_eq!(doc.doc_for("bgm"), Some("Background music for level one."));
        assert_eq!(doc.doc_for("run"), None);
    }
}
