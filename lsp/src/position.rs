//! UTF-16 <-> UTF-8 <-> byte-offset <-> token-position conversions against a
//! live token file. All routines clip to document boundaries instead of
//! failing on malformed input.

use tower_lsp::lsp_types::{Position, Range};

use spxls_core::token::{Pos, Position as TokenPosition};

use crate::analyzer::SourceFile;

/// Sum of UTF-16 code-unit lengths of the string's characters.
pub fn utf16_offset(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Converts a UTF-16 code-unit offset into a UTF-8 byte offset within `s`,
/// clipped to the string's length.
pub fn utf16_offset_to_utf8(s: &str, utf16_offset: usize) -> usize {
    if utf16_offset == 0 {
        return 0;
    }
    let mut utf16_units = 0usize;
    let mut utf8_bytes = 0usize;
    for c in s.chars() {
        if utf16_units >= utf16_offset {
            break;
        }
        utf16_units += c.len_utf16();
        utf8_bytes += c.len_utf8();
    }
    utf8_bytes
}

/// Converts an LSP position to a byte offset into `content`. An out-of-range
/// line yields the end of the content; an out-of-range character saturates
/// at the end of its line.
pub fn position_offset(content: &str, position: Position) -> usize {
    if content.is_empty() {
        return 0;
    }

    let mut line_starts = vec![0usize];
    for (i, b) in content.bytes().enumerate() {
        if b == b'\n' {
            line_starts.push(i + 1);
        }
    }

    let line_index = position.line as usize;
    if line_index >= line_starts.len() {
        return content.len();
    }

    let line_offset = line_starts[line_index];
    if line_offset >= content.len() {
        return content.len();
    }
    let line_end = if line_index + 1 < line_starts.len() {
        line_starts[line_index + 1] - 1
    } else {
        content.len()
    };
    let line_content = &content[line_offset..line_end.min(content.len())];

    line_offset + utf16_offset_to_utf8(line_content, position.character as usize)
}

/// Converts a 1-based token position (byte column) into a 0-based LSP
/// position with a UTF-16 character index.
pub fn from_position(source: &SourceFile, position: TokenPosition) -> Position {
    if !position.is_valid() {
        return Position::new(0, 0);
    }
    let token_file = &source.token_file;
    let line_start = token_file.offset(token_file.line_start(position.line));
    let prefix_end = (line_start + position.column.saturating_sub(1) as usize).min(source.content.len());
    let line_prefix = source.content.get(line_start..prefix_end).unwrap_or("");

    Position {
        line: position.line - 1,
        character: utf16_offset(line_prefix),
    }
}

/// Converts an LSP position into a 1-based token position with byte column
/// and absolute byte offset into the file.
pub fn to_position(source: &SourceFile, position: Position) -> TokenPosition {
    let token_file = &source.token_file;
    let line = (position.line + 1).min(token_file.line_count() as u32);
    let line_start = token_file.offset(token_file.line_start(line));
    let mut line_content = source.content.get(line_start..).unwrap_or("");
    if let Some(i) = line_content.find('\n') {
        line_content = &line_content[..i];
    }
    let utf8_offset = utf16_offset_to_utf8(line_content, position.character as usize);

    TokenPosition {
        filename: token_file.name().to_string(),
        offset: line_start + utf8_offset,
        line,
        column: utf8_offset as u32 + 1,
    }
}

/// Token-file position handle for an LSP position; out-of-range lines
/// saturate at end of file.
pub fn pos_at(source: &SourceFile, position: Position) -> Pos {
    let token_file = &source.token_file;
    if position.line as usize > token_file.line_count() - 1 {
        return token_file.end_pos();
    }
    token_file.pos(to_position(source, position).offset)
}

/// LSP range covering the interval `[start, end)` in `source`.
pub fn range_for_span(source: &SourceFile, start: Pos, end: Pos) -> Range {
    let token_file = &source.token_file;
    Range {
        start: from_position(source, token_file.position(start)),
        end: from_position(source, token_file.position(end)),
    }
}
