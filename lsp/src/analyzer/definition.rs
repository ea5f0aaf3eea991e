use once_cell::sync::Lazy;
use regex::Regex;

use spxls_core::token::{Pos, NO_POS};
use spxls_core::typ::{NamedId, ObjKind, ObjectId, Pkg, Type, TypeInfo, Underlying};

use super::CompileResult;

/// Overloaded function names follow the `<base>__<id>` convention with a
/// single digit or lowercase letter id.
static OVERLOAD_FUNC_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)__([0-9a-z])$").expect("static regex"));

/// Event-handler names look like `onStart`, `onMsg`, ...
static EVENT_HANDLER_FUNC_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^on[A-Z]\w*$").expect("static regex"));

const GOPT_PREFIX: &str = "Gopt_";
const GOPX_PREFIX: &str = "Gopx_";

pub fn is_overloaded_func_name(name: &str) -> bool {
    OVERLOAD_FUNC_NAME_RE.is_match(name)
}

/// Splits an overloaded function name into its display base (first character
/// lowered) and overload id.
pub fn parse_overload_func_name(name: &str) -> (String, Option<String>) {
    if let Some(captures) = OVERLOAD_FUNC_NAME_RE.captures(name) {
        (
            to_lower_camel_case(&captures[1]),
            Some(captures[2].to_string()),
        )
    } else {
        (to_lower_camel_case(name), None)
    }
}

pub fn is_event_handler_func_name(name: &str) -> bool {
    EVENT_HANDLER_FUNC_NAME_RE.is_match(name)
}

/// Splits a `Gopt_<RecvType>_<Method>` template-method name, tolerating the
/// optional `Gopx_` marker before the method part.
pub fn split_gopt_method_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix(GOPT_PREFIX)?;
    let (recv, method) = rest.split_once('_')?;
    if recv.is_empty() || method.is_empty() {
        return None;
    }
    Some((recv, method.strip_prefix(GOPX_PREFIX).unwrap_or(method)))
}

pub fn to_lower_camel_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpxDefinitionKind {
    Var,
    Const,
    Type,
    Func,
    Pkg,
    Builtin,
}

/// One definition record: what hover, completion and signature help render.
#[derive(Debug, Clone)]
pub struct SpxDefinition {
    pub kind: SpxDefinitionKind,
    /// Display name: overload base lowered to camel case.
    pub name: String,
    pub overload_id: Option<String>,
    pub type_string: String,
    pub doc: Option<String>,
    /// Named type the member is reached through, when any.
    pub selector_type_name: Option<String>,
    pub decl_pos: Pos,
    /// Whether a var was declared in the auto-binding var block.
    pub is_in_fields_decl: bool,
}

impl SpxDefinition {
    /// One-line markdown header for hover output.
    pub fn header(&self) -> String {
        let qualified = match &self.selector_type_name {
            Some(selector) => format!("{}.{}", selector, self.name),
            None => self.name.clone(),
        };
        match self.kind {
            SpxDefinitionKind::Func | SpxDefinitionKind::Builtin => format!("{} {}", qualified, self.type_string),
            SpxDefinitionKind::Type => format!("type {qualified}"),
            SpxDefinitionKind::Const => format!("const {} {}", qualified, self.type_string),
            SpxDefinitionKind::Var => format!("var {} {}", qualified, self.type_string),
            SpxDefinitionKind::Pkg => format!("package {qualified}"),
        }
    }
}

/// All definitions for the identifier starting at `ident_pos`. Multiple
/// records come back only for overloadable functions, one per expanded
/// overload; an overloadable function without an expansion yields nothing.
pub fn definitions_for_ident(result: &CompileResult, ident_pos: Pos, name: &str) -> Vec<SpxDefinition> {
    if name == "_" {
        return Vec::new();
    }
    let Some(obj) = result.tinfo.object_of(ident_pos) else {
        return Vec::new();
    };
    let selector = selector_type_name(&result.tinfo, obj);
    definitions_for_object(result, obj, selector)
}

pub(crate) fn definitions_for_object(
    result: &CompileResult,
    obj: ObjectId,
    selector_type_name: Option<String>,
) -> Vec<SpxDefinition> {
    let tinfo = &result.tinfo;
    let object = tinfo.object(obj);

    if object.pkg == Pkg::Universe {
        return vec![SpxDefinition {
            kind: SpxDefinitionKind::Builtin,
            name: object.name.clone(),
            overload_id: None,
            type_string: tinfo.type_string(&object.typ),
            doc: object.doc.clone(),
            selector_type_name: None,
            decl_pos: NO_POS,
            is_in_fields_decl: false,
        }];
    }

    let doc_for = |name: &str, builtin_doc: &Option<String>| -> Option<String> {
        if tinfo.object(obj).pkg == Pkg::Main {
            result.pkg_doc.doc_for(name).map(str::to_string)
        } else {
            builtin_doc.clone()
        }
    };

    match object.kind {
        ObjKind::Var => vec![SpxDefinition {
            kind: SpxDefinitionKind::Var,
            name: object.name.clone(),
            overload_id: None,
            type_string: tinfo.type_string(&object.typ),
            doc: doc_for(&object.name, &object.doc),
            selector_type_name,
            decl_pos: object.decl_pos,
            is_in_fields_decl: object.in_class_fields_decl,
        }],
        ObjKind::Const => vec![SpxDefinition {
            kind: SpxDefinitionKind::Const,
            name: object.name.clone(),
            overload_id: None,
            type_string: tinfo.type_string(&object.typ),
            doc: doc_for(&object.name, &object.doc),
            selector_type_name,
            decl_pos: object.decl_pos,
            is_in_fields_decl: false,
        }],
        ObjKind::TypeName => vec![SpxDefinition {
            kind: SpxDefinitionKind::Type,
            name: object.name.clone(),
            overload_id: None,
            type_string: tinfo.type_string(&object.typ),
            doc: doc_for(&object.name, &object.doc),
            selector_type_name: None,
            decl_pos: object.decl_pos,
            is_in_fields_decl: false,
        }],
        ObjKind::PkgName => vec![SpxDefinition {
            kind: SpxDefinitionKind::Pkg,
            name: object.name.clone(),
            overload_id: None,
            type_string: String::new(),
            doc: doc_for(&object.name, &object.doc),
            selector_type_name: None,
            decl_pos: object.decl_pos,
            is_in_fields_decl: false,
        }],
        ObjKind::Func | ObjKind::Builtin => {
            if tinfo.is_unexpandable_overloadable_func(obj) {
                return Vec::new();
            }
            if let Some(overloads) = tinfo.expand_overloads(obj) {
                return overloads
                    .iter()
                    .map(|&overload| func_definition(result, overload, selector_type_name.clone()))
                    .collect();
            }
            vec![func_definition(result, obj, selector_type_name)]
        }
    }
}

fn func_definition(result: &CompileResult, obj: ObjectId, selector_type_name: Option<String>) -> SpxDefinition {
    let tinfo = &result.tinfo;
    let object = tinfo.object(obj);
    let (name, overload_id) = parse_overload_func_name(&object.name);
    let doc = if object.pkg == Pkg::Main {
        result.pkg_doc.doc_for(&object.name).map(str::to_string)
    } else {
        object.doc.clone()
    };
    SpxDefinition {
        kind: SpxDefinitionKind::Func,
        name,
        overload_id,
        type_string: tinfo.type_string(&object.typ),
        doc,
        selector_type_name,
        decl_pos: object.decl_pos,
        is_in_fields_decl: false,
    }
}

/// Named type the object is reached through: the receiver for methods,
/// nothing for everything else.
fn selector_type_name(tinfo: &TypeInfo, obj: ObjectId) -> Option<String> {
    let recv = tinfo.func_signature(obj)?.recv.clone()?;
    match recv {
        Type::Named(id) => Some(tinfo.named_type(id).name.clone()),
        _ => None,
    }
}

fn is_exported_or_main_pkg_object(tinfo: &TypeInfo, obj: ObjectId) -> bool {
    let object = tinfo.object(obj);
    object.pkg == Pkg::Main || !object.name.starts_with('_')
}

/// Enumerates, without duplication, the fields and methods of a named struct
/// and its embedded struct fields: own fields first, own methods next, then
/// depth-first into each embedded field. The visitor receives the member and
/// its selector type (truncated at the first non-exported link and at the
/// Game/SpriteImpl roots); returning false stops the walk.
pub fn walk_struct(tinfo: &TypeInfo, named: NamedId, on_member: &mut dyn FnMut(ObjectId, NamedId) -> bool) {
    let mut walked: Vec<NamedId> = Vec::new();
    let mut seen_members: Vec<String> = Vec::new();

    fn walk_inner(
        tinfo: &TypeInfo,
        named: NamedId,
        named_path: &mut Vec<NamedId>,
        walked: &mut Vec<NamedId>,
        seen_members: &mut Vec<String>,
        on_member: &mut dyn FnMut(ObjectId, NamedId) -> bool,
    ) -> bool {
        if walked.contains(&named) {
            return true;
        }
        walked.push(named);

        let n = tinfo.named_type(named);
        let Underlying::Struct(fields) = &n.underlying else {
            return true;
        };

        let mut selector = named;
        for &link in named_path.iter() {
            if !is_exported_or_main_pkg_object(tinfo, tinfo.named_type(link).obj) {
                break;
            }
            selector = link;
            if link == tinfo.spx.game || link == tinfo.spx.sprite_impl {
                break;
            }
        }

        for field in fields {
            let name = &tinfo.object(field.obj).name;
            if seen_members.contains(name) || !is_exported_or_main_pkg_object(tinfo, field.obj) {
                continue;
            }
            seen_members.push(name.clone());
            if !on_member(field.obj, selector) {
                return false;
            }
        }
        for &method in &n.methods {
            let name = &tinfo.object(method).name;
            if seen_members.contains(name) || !is_exported_or_main_pkg_object(tinfo, method) {
                continue;
            }
            seen_members.push(name.clone());
            if !on_member(method, selector) {
                return false;
            }
        }
        for field in fields {
            if !field.embedded {
                continue;
            }
            let Type::Named(embedded) = tinfo.object(field.obj).typ.clone() else {
                continue;
            };
            named_path.push(embedded);
            let keep_going = walk_inner(tinfo, embedded, named_path, walked, seen_members, on_member);
            named_path.pop();
            if !keep_going {
                return false;
            }
        }
        true
    }

    let mut named_path = vec![named];
    walk_inner(tinfo, named, &mut named_path, &mut walked, &mut seen_members, on_member);
}
