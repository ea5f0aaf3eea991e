use std::collections::HashMap;

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, Hover, HoverContents, InlayHint, InlayHintKind,
    InlayHintLabel, Location, MarkupContent, MarkupKind, ParameterInformation, ParameterLabel, Position, Range,
    SignatureHelp, SignatureInformation, TextEdit, Url, WorkspaceEdit,
};

use spxls_core::ast::walk::{walk, Node};
use spxls_core::ast::{path_enclosing_interval, CallExpr, Expr};
use spxls_core::token::{Pos, NO_POS};
use spxls_core::typ::{ObjKind, ObjectId, Pkg, Type};

use crate::analyzer::{
    definitions_for_ident, CompileResult, SourceFile, SpxDefinition, SpxDefinitionKind, SpxResourceId,
    SpxResourceRefKind,
};
use crate::position::{pos_at, position_offset, range_for_span};

fn resource_kind_name(id: &SpxResourceId) -> &'static str {
    match id {
        SpxResourceId::Backdrop { .. } => "backdrop",
        SpxResourceId::Sprite { .. } => "sprite",
        SpxResourceId::SpriteCostume { .. } => "costume",
        SpxResourceId::SpriteAnimation { .. } => "animation",
        SpxResourceId::Sound { .. } => "sound",
        SpxResourceId::Widget { .. } => "widget",
    }
}

/// Hover: resource reference info when the cursor rests on one, identifier
/// definitions otherwise.
pub(crate) fn hover_for(result: &CompileResult, source: &SourceFile, position: Position) -> Option<Hover> {
    if let Some(r) = result.resource_ref_at_position(source, position) {
        let text = format!(
            "{} resource {:?}\n\n[{}]({})",
            resource_kind_name(&r.id),
            r.id.name(),
            r.id.uri(),
            r.id.uri(),
        );
        return Some(Hover {
            contents: markdown(text),
            range: Some(result.range_for_span(r.span)),
        });
    }

    let ident = result.ident_at_position(source, position)?;
    let defs = definitions_for_ident(result, ident.pos, &ident.name);
    if defs.is_empty() {
        return None;
    }
    let mut text = String::new();
    for def in &defs {
        text.push_str(&format!("```spx\n{}\n```\n", def.header()));
        if let Some(doc) = &def.doc {
            text.push_str(doc);
            text.push('\n');
        }
    }
    Some(Hover {
        contents: markdown(text),
        range: Some(range_for_span(source, ident.pos, ident.end)),
    })
}

fn markdown(value: String) -> HoverContents {
    HoverContents::Markup(MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    })
}

fn completion_kind(kind: SpxDefinitionKind) -> CompletionItemKind {
    match kind {
        SpxDefinitionKind::Var => CompletionItemKind::VARIABLE,
        SpxDefinitionKind::Const => CompletionItemKind::CONSTANT,
        SpxDefinitionKind::Type => CompletionItemKind::CLASS,
        SpxDefinitionKind::Func | SpxDefinitionKind::Builtin => CompletionItemKind::FUNCTION,
        SpxDefinitionKind::Pkg => CompletionItemKind::MODULE,
    }
}

fn item_for_definition(def: &SpxDefinition) -> CompletionItem {
    CompletionItem {
        label: def.name.clone(),
        kind: Some(completion_kind(def.kind)),
        detail: Some(def.type_string.clone()),
        documentation: def.doc.clone().map(|doc| {
            Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value: doc,
            })
        }),
        ..Default::default()
    }
}

/// Completion: member completion after a dot, resource names inside
/// resource-name arguments, otherwise everything in scope plus keywords.
pub(crate) fn completion_items(
    result: &CompileResult,
    source: &SourceFile,
    position: Position,
) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut push = |items: &mut Vec<CompletionItem>, item: CompletionItem| {
        if seen.insert(item.label.clone()) {
            items.push(item);
        }
    };

    // Member completion after `ident.`.
    if let Some(base) = selector_base_before(result, source, position) {
        if let Type::Named(named) = result.tinfo.object(base).typ.clone() {
            for def in result.definitions_for_named_struct(named).iter() {
                push(&mut items, item_for_definition(def));
            }
            return items;
        }
    }

    let pos = pos_at(source, position);

    // Resource-name completion inside a matching argument.
    if let Some((call, active)) = enclosing_call(source, pos) {
        if let Some(param_type) = param_type_at(result, call, active) {
            let spx = &result.tinfo.spx;
            let names: Vec<String> = if param_type == spx.backdrop_name_type {
                result.resource_set.backdrops().map(|b| b.name.clone()).collect()
            } else if param_type == spx.sprite_name_type {
                result.resource_set.sprites().map(|s| s.name.clone()).collect()
            } else if param_type == spx.sound_name_type {
                result.resource_set.sounds().map(|s| s.name.clone()).collect()
            } else if param_type == spx.widget_name_type {
                result.resource_set.widgets().map(|w| w.name.clone()).collect()
            } else {
                Vec::new()
            };
            for name in names {
                push(
                    &mut items,
                    CompletionItem {
                        label: name.clone(),
                        kind: Some(CompletionItemKind::VALUE),
                        insert_text: Some(format!("{name:?}")),
                        detail: Some("resource".to_string()),
                        ..Default::default()
                    },
                );
            }
        }
    }

    // Everything visible in the scope chain at the cursor.
    let tinfo = &result.tinfo;
    let mut scopes = Vec::new();
    let mut scope = tinfo.innermost_scope_at(pos);
    while let Some(id) = scope {
        scopes.push(id);
        scope = tinfo.scope(id).parent;
    }
    let class_scope = if tinfo.sprite_classes.contains_key(file_stem(&source.path)) {
        tinfo.spx.sprite_scope
    } else {
        tinfo.spx.game_scope
    };
    let mut class = Some(class_scope);
    while let Some(id) = class {
        scopes.push(id);
        class = tinfo.scope(id).parent;
    }

    for scope in scopes {
        let mut names: Vec<(&String, &ObjectId)> = tinfo.scope(scope).names.iter().collect();
        names.sort_by_key(|(name, _)| name.as_str());
        for (name, &obj) in names {
            if name == "GopPackage" {
                continue;
            }
            for def in crate::analyzer::definitions_for_object(result, obj, None) {
                push(&mut items, item_for_definition(&def));
            }
        }
    }

    for keyword in [
        "var", "const", "func", "if", "else", "for", "in", "return", "break", "continue",
    ] {
        push(
            &mut items,
            CompletionItem {
                label: keyword.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                ..Default::default()
            },
        );
    }

    items
}

fn file_stem(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.strip_suffix(".spx").unwrap_or(base)
}

/// The object of `ident` when the text just before `position` is `ident.`.
fn selector_base_before(result: &CompileResult, source: &SourceFile, position: Position) -> Option<ObjectId> {
    let offset = position_offset(&source.content, position);
    let before = &source.content[..offset.min(source.content.len())];
    let rest = before.strip_suffix('.')?;
    let ident_start = rest
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)?;
    let pos = source.token_file.pos(ident_start);
    result.tinfo.object_of(pos)
}

/// The innermost call expression containing `pos` and the active argument
/// index at that point.
pub(crate) fn enclosing_call<'a>(source: &'a SourceFile, pos: Pos) -> Option<(&'a CallExpr, usize)> {
    let (path, _) = path_enclosing_interval(&source.ast, pos, pos);
    for node in &path {
        let Node::Expr(Expr::Call(call)) = *node else {
            continue;
        };
        let mut active = call.args.len().saturating_sub(1);
        for (i, arg) in call.args.iter().enumerate() {
            if pos <= arg.end() {
                active = i;
                break;
            }
        }
        return Some((call, active));
    }
    None
}

/// Declared parameter type at an argument index, through the resolved
/// callee signature (variadic parameters reuse the last type).
fn param_type_at(result: &CompileResult, call: &CallExpr, index: usize) -> Option<Type> {
    let tv = result.tinfo.type_of(call.fun.span())?;
    let Type::Func(sig) = &tv.typ else {
        return None;
    };
    let sig = result.tinfo.signature(*sig);
    let param = sig.params.get(index).or(sig.params.last())?;
    Some(param.typ.clone())
}

/// Signature help: one entry per expanded overload of the enclosing callee.
pub(crate) fn signature_help_for(
    result: &CompileResult,
    source: &SourceFile,
    position: Position,
) -> Option<SignatureHelp> {
    let pos = pos_at(source, position);
    let (call, active) = enclosing_call(source, pos)?;
    let Expr::Ident(fun) = call.fun.unparen() else {
        return None;
    };
    let defs = definitions_for_ident(result, fun.pos, &fun.name);
    if defs.is_empty() {
        return None;
    }

    let obj = result.tinfo.object_of(fun.pos)?;
    let candidates: Vec<ObjectId> = result
        .tinfo
        .expand_overloads(obj)
        .unwrap_or_else(|| vec![obj]);

    let mut signatures = Vec::new();
    for candidate in candidates {
        let Some(sig) = result.tinfo.func_signature(candidate) else {
            continue;
        };
        let (display, _) = crate::analyzer::parse_overload_func_name(&result.tinfo.object(candidate).name);
        let params: Vec<String> = sig
            .params
            .iter()
            .map(|p| format!("{} {}", p.name, result.tinfo.type_string(&p.typ)))
            .collect();
        signatures.push(SignatureInformation {
            label: format!("{}({})", display, params.join(", ")),
            documentation: result.tinfo.object(candidate).doc.clone().map(Documentation::String),
            parameters: Some(
                params
                    .into_iter()
                    .map(|p| ParameterInformation {
                        label: ParameterLabel::Simple(p),
                        documentation: None,
                    })
                    .collect(),
            ),
            active_parameter: None,
        });
    }
    if signatures.is_empty() {
        return None;
    }

    Some(SignatureHelp {
        signatures,
        active_signature: Some(0),
        active_parameter: Some(active as u32),
    })
}

/// Every occurrence (definition and uses) of the object across the
/// snapshot, as locations.
pub(crate) fn references_for_object(result: &CompileResult, obj: ObjectId) -> Vec<Location> {
    let mut locations: Vec<(String, (Pos, Pos))> = Vec::new();
    for source in result.files.values() {
        walk(Node::File(&source.ast), &mut |node| {
            let ident = match node {
                Node::Ident(id) => Some(id),
                Node::Expr(Expr::Ident(id)) => Some(id),
                _ => None,
            };
            if let Some(id) = ident {
                if result.tinfo.object_of(id.pos) == Some(obj) {
                    locations.push((source.path.clone(), (id.pos, id.end())));
                }
            }
            true
        });
    }
    locations.sort_by_key(|(_, span)| span.0);
    locations.dedup();
    locations
        .into_iter()
        .map(|(path, span)| Location {
            uri: result.to_document_uri(&path),
            range: result.range_for_span(span),
        })
        .collect()
}

/// Whether the object may be renamed: main-package vars, consts, types and
/// functions with a declaration site.
pub(crate) fn is_renameable_object(result: &CompileResult, obj: ObjectId) -> bool {
    let object = result.tinfo.object(obj);
    object.pkg == Pkg::Main
        && object.decl_pos != NO_POS
        && matches!(
            object.kind,
            ObjKind::Var | ObjKind::Const | ObjKind::Func | ObjKind::TypeName
        )
        && object.name != "_"
}

/// Workspace edit renaming every occurrence of the object.
pub(crate) fn rename_edits(result: &CompileResult, obj: ObjectId, new_name: &str) -> WorkspaceEdit {
    let mut changes: HashMap<Url, Vec<TextEdit>> = HashMap::new();
    for location in references_for_object(result, obj) {
        changes.entry(location.uri).or_default().push(TextEdit {
            range: location.range,
            new_text: new_name.to_string(),
        });
    }
    WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    }
}

/// Workspace edit renaming a resource: string-literal references get new
/// quoted text, identifier references the bare name.
pub(crate) fn rename_resource_edits(result: &CompileResult, resource_uri: &str, new_name: &str) -> WorkspaceEdit {
    let mut changes: HashMap<Url, Vec<TextEdit>> = HashMap::new();
    for r in &result.resource_refs {
        if r.id.uri() != resource_uri {
            continue;
        }
        let Some(uri) = result.pos_document_uri(r.span.0) else {
            continue;
        };
        let new_text = match r.kind {
            SpxResourceRefKind::StringLiteral => format!("{new_name:?}"),
            SpxResourceRefKind::ConstantReference
            | SpxResourceRefKind::AutoBinding
            | SpxResourceRefKind::AutoBindingReference => new_name.to_string(),
        };
        changes.entry(uri).or_default().push(TextEdit {
            range: result.range_for_span(r.span),
            new_text,
        });
    }
    WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    }
}

/// Parameter-name inlay hints for call arguments inside `range`, resolved
/// through the checked (overload-resolved) callee signature.
pub(crate) fn inlay_hints_for(result: &CompileResult, source: &SourceFile, range: Range) -> Vec<InlayHint> {
    let start = pos_at(source, range.start);
    let end = pos_at(source, range.end);

    let mut calls: Vec<&CallExpr> = Vec::new();
    walk(Node::File(&source.ast), &mut |node| {
        if let Node::Expr(Expr::Call(call)) = node {
            calls.push(call);
        }
        true
    });

    let mut hints = Vec::new();
    for call in calls {
        let Some(tv) = result.tinfo.type_of(call.fun.span()) else {
            continue;
        };
        let Type::Func(sig) = &tv.typ else {
            continue;
        };
        let sig = result.tinfo.signature(*sig).clone();
        for (i, arg) in call.args.iter().enumerate() {
            if arg.pos() < start || arg.pos() > end {
                continue;
            }
            if matches!(arg, Expr::Lambda(_)) {
                continue;
            }
            let Some(param) = sig.params.get(i).or(sig.params.last()) else {
                continue;
            };
            if param.name.is_empty() || param.name.starts_with("__") {
                continue;
            }
            hints.push(InlayHint {
                position: result.lsp_position(source, arg.pos()),
                label: InlayHintLabel::String(format!("{}:", param.name)),
                kind: Some(InlayHintKind::PARAMETER),
                text_edits: None,
                tooltip: None,
                padding_left: None,
                padding_right: Some(true),
                data: None,
            });
        }
    }
    hints
}

/// Canonical whitespace cleanup: strip trailing spaces, squeeze runs of
/// blank lines, end with exactly one newline.
pub(crate) fn format_document(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut blank_run = 0usize;
    for line in content.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    if content.is_empty() {
        out.clear();
    }
    out
}
