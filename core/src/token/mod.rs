mod scanner;

#[cfg(test)]
mod token_test;

pub use scanner::{scan, RawComment, RawToken, ScanError, Token};

use std::fmt;
use std::sync::Arc;

/// A compact position inside a [FileSet]: the file's base plus a byte offset.
/// `NO_POS` marks positions that do not point anywhere.
pub type Pos = u32;

pub const NO_POS: Pos = 0;

/// Expanded position: 1-based line, 1-based byte column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub filename: String,
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filename.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.filename, self.line, self.column)
        }
    }
}

/// One source file registered in a [FileSet]. Line starts are byte offsets,
/// the first always 0.
#[derive(Debug)]
pub struct TokenFile {
    name: String,
    base: Pos,
    size: u32,
    line_starts: Vec<u32>,
}

impl TokenFile {
    fn new(name: String, base: Pos, content: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            name,
            base,
            size: content.len() as u32,
            line_starts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Pos {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Global position of the start of the 1-based `line`, clamped to the
    /// last line.
    pub fn line_start(&self, line: u32) -> Pos {
        let idx = (line.max(1) as usize - 1).min(self.line_starts.len() - 1);
        self.base + self.line_starts[idx]
    }

    pub fn pos(&self, offset: usize) -> Pos {
        self.base + (offset as u32).min(self.size)
    }

    pub fn end_pos(&self) -> Pos {
        self.base + self.size
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos >= self.base && pos <= self.base + self.size
    }

    pub fn offset(&self, pos: Pos) -> usize {
        (pos.saturating_sub(self.base)).min(self.size) as usize
    }

    /// 1-based line number for a global position.
    pub fn line_for(&self, pos: Pos) -> u32 {
        let off = self.offset(pos) as u32;
        match self.line_starts.binary_search(&off) {
            Ok(i) => i as u32 + 1,
            Err(i) => i as u32,
        }
    }

    pub fn position(&self, pos: Pos) -> Position {
        let off = self.offset(pos);
        let line = self.line_for(pos);
        let line_off = self.line_starts[line as usize - 1] as usize;
        Position {
            filename: self.name.clone(),
            offset: off,
            line,
            column: (off - line_off) as u32 + 1,
        }
    }
}

/// Assigns non-overlapping byte-position ranges to files, so a bare [Pos]
/// identifies both a file and an offset within it. Bases are append-only for
/// the lifetime of the set; replacing a file's content registers a new range.
#[derive(Debug, Default)]
pub struct FileSet {
    files: Vec<Arc<TokenFile>>,
    next_base: Pos,
}

impl FileSet {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            next_base: 1,
        }
    }

    pub fn add_file(&mut self, name: &str, content: &str) -> Arc<TokenFile> {
        let file = Arc::new(TokenFile::new(name.to_string(), self.next_base, content));
        self.next_base = file.end_pos() + 1;
        self.files.push(file.clone());
        file
    }

    /// The file whose range contains `pos`, if any. Later registrations win
    /// on the (never-produced) boundary overlap.
    pub fn file(&self, pos: Pos) -> Option<Arc<TokenFile>> {
        if pos == NO_POS {
            return None;
        }
        self.files.iter().rev().find(|f| f.contains(pos)).cloned()
    }

    pub fn position(&self, pos: Pos) -> Position {
        match self.file(pos) {
            Some(f) => f.position(pos),
            None => Position::default(),
        }
    }
}

/// A parse or scan problem, carried as data so a broken file still yields an
/// AST (callers render these as diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub pos: Pos,
    pub message: String,
}

impl ParseError {
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}
