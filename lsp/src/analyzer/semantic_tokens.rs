use tower_lsp::lsp_types::{SemanticToken, SemanticTokenModifier, SemanticTokenType, SemanticTokensLegend};

use spxls_core::token::{scan, Token};
use spxls_core::typ::ObjKind;

use crate::position::utf16_offset;

use super::{CompileResult, SourceFile};

const TOKEN_KEYWORD: u32 = 0;
const TOKEN_STRING: u32 = 1;
const TOKEN_NUMBER: u32 = 2;
const TOKEN_COMMENT: u32 = 3;
const TOKEN_VARIABLE: u32 = 4;
const TOKEN_FUNCTION: u32 = 5;
const TOKEN_TYPE: u32 = 6;
const TOKEN_OPERATOR: u32 = 7;
const TOKEN_NAMESPACE: u32 = 8;

const MODIFIER_DECLARATION: u32 = 1 << 0;
const MODIFIER_READONLY: u32 = 1 << 1;

/// Legend matching the indices produced by [semantic_tokens_for].
pub fn semantic_token_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: vec![
            SemanticTokenType::KEYWORD,
            SemanticTokenType::STRING,
            SemanticTokenType::NUMBER,
            SemanticTokenType::COMMENT,
            SemanticTokenType::VARIABLE,
            SemanticTokenType::FUNCTION,
            SemanticTokenType::TYPE,
            SemanticTokenType::OPERATOR,
            SemanticTokenType::NAMESPACE,
        ],
        token_modifiers: vec![SemanticTokenModifier::DECLARATION, SemanticTokenModifier::READONLY],
    }
}

/// Classifies the file's scanner stream with help from the defs/uses tables
/// and delta-encodes it per the LSP wire format (UTF-16 columns).
pub fn semantic_tokens_for(result: &CompileResult, source: &SourceFile) -> Vec<SemanticToken> {
    let (tokens, comments, _) = scan(&source.content);
    let token_file = &source.token_file;

    struct Abs {
        line: u32, // 0-based
        character: u32,
        length: u32,
        token_type: u32,
        modifiers: u32,
    }
    let mut abs: Vec<Abs> = Vec::new();

    let mut push = |start: usize, end: usize, token_type: u32, modifiers: u32| {
        if end <= start {
            return;
        }
        let pos = token_file.pos(start);
        let line = token_file.line_for(pos);
        let line_start = token_file.offset(token_file.line_start(line));
        let prefix = source.content.get(line_start..start).unwrap_or("");
        let text = source.content.get(start..end).unwrap_or("");
        abs.push(Abs {
            line: line - 1,
            character: utf16_offset(prefix),
            length: utf16_offset(text),
            token_type,
            modifiers,
        });
    };

    for comment in &comments {
        push(comment.start, comment.end, TOKEN_COMMENT, 0);
    }

    for raw in &tokens {
        match &raw.tok {
            Token::Ident(_) => {
                let pos = token_file.pos(raw.start);
                let (type_index, mut modifiers) = match result.tinfo.object_of(pos) {
                    Some(obj) => {
                        let object = result.tinfo.object(obj);
                        match object.kind {
                            ObjKind::Func | ObjKind::Builtin => (TOKEN_FUNCTION, 0),
                            ObjKind::TypeName => (TOKEN_TYPE, 0),
                            ObjKind::PkgName => (TOKEN_NAMESPACE, 0),
                            ObjKind::Const => (TOKEN_VARIABLE, MODIFIER_READONLY),
                            ObjKind::Var => (TOKEN_VARIABLE, 0),
                        }
                    }
                    None => (TOKEN_VARIABLE, 0),
                };
                if result.tinfo.defs.contains_key(&pos) {
                    modifiers |= MODIFIER_DECLARATION;
                }
                push(raw.start, raw.end, type_index, modifiers);
            }
            Token::Str(_) => push(raw.start, raw.end, TOKEN_STRING, 0),
            Token::Int(_) | Token::Float(_) => push(raw.start, raw.end, TOKEN_NUMBER, 0),
            Token::Package
            | Token::Var
            | Token::Const
            | Token::Func
            | Token::If
            | Token::Else
            | Token::For
            | Token::In
            | Token::Return
            | Token::Break
            | Token::Continue => push(raw.start, raw.end, TOKEN_KEYWORD, 0),
            Token::Assign
            | Token::Define
            | Token::Arrow
            | Token::Add
            | Token::Sub
            | Token::Star
            | Token::Slash
            | Token::Percent
            | Token::AddAssign
            | Token::SubAssign
            | Token::MulAssign
            | Token::DivAssign
            | Token::ModAssign
            | Token::Inc
            | Token::Dec
            | Token::Eq
            | Token::Ne
            | Token::Lt
            | Token::Gt
            | Token::Le
            | Token::Ge
            | Token::AndAnd
            | Token::OrOr
            | Token::Not => push(raw.start, raw.end, TOKEN_OPERATOR, 0),
            _ => {}
        }
    }

    abs.sort_by_key(|t| (t.line, t.character));

    let mut data = Vec::with_capacity(abs.len());
    let mut prev_line = 0u32;
    let mut prev_char = 0u32;
    for token in abs {
        let delta_line = token.line - prev_line;
        let delta_start = if delta_line == 0 {
            token.character - prev_char
        } else {
            token.character
        };
        data.push(SemanticToken {
            delta_line,
            delta_start,
            length: token.length,
            token_type: token.token_type,
            token_modifiers_bitset: token.modifiers,
        });
        prev_line = token.line;
        prev_char = token.character;
    }
    data
}
