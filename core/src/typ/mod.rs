mod check;
mod spx;

#[cfg(test)]
mod check_test;

pub use check::check_files;
pub use spx::SpxContext;

use std::collections::HashMap;

use crate::token::{Pos, NO_POS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamedId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Which package an object belongs to. The dialect surface is closed: user
/// code is always package main, the domain builtins live in the spx package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pkg {
    Universe,
    Spx,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    Var,
    Const,
    Func,
    TypeName,
    PkgName,
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Bool,
    Int,
    Float,
    String,
    UntypedBool,
    UntypedInt,
    UntypedFloat,
    UntypedString,
}

impl BasicKind {
    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool | BasicKind::UntypedInt | BasicKind::UntypedFloat | BasicKind::UntypedString
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Float => "float",
            BasicKind::String => "string",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedString => "untyped string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Invalid,
    /// The "no value" result of command-style calls.
    Unit,
    Basic(BasicKind),
    Named(NamedId),
    List(Box<Type>),
    Func(SigId),
    /// Sentinel parameter type marking an overloadable function signature.
    OverloadMarker,
}

impl Type {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ConstValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub kind: ObjKind,
    pub typ: Type,
    pub pkg: Pkg,
    /// Position of the defining identifier; NO_POS for synthesised objects.
    pub decl_pos: Pos,
    pub const_value: Option<ConstValue>,
    /// Whether a package-level var was declared in the first var block of its
    /// class file (the auto-binding block).
    pub in_class_fields_decl: bool,
    pub doc: Option<String>,
    /// Scope the object was declared in; drives overload expansion.
    pub parent_scope: Option<ScopeId>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub typ: Type,
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub recv: Option<Type>,
    pub params: Vec<Param>,
    pub results: Vec<Type>,
    pub variadic: bool,
}

impl Signature {
    /// An overloadable marker: exactly one parameter of the sentinel type.
    pub fn is_overload_marker(&self) -> bool {
        self.params.len() == 1 && self.params[0].typ == Type::OverloadMarker
    }
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub obj: ObjectId,
    pub embedded: bool,
}

#[derive(Debug, Clone)]
pub enum Underlying {
    Basic(BasicKind),
    Struct(Vec<StructField>),
}

#[derive(Debug, Clone)]
pub struct Named {
    pub name: String,
    pub obj: ObjectId,
    pub underlying: Underlying,
    pub methods: Vec<ObjectId>,
}

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// Extent in source; NO_POS for non-positional scopes (universe, spx,
    /// package).
    pub pos: Pos,
    pub end: Pos,
    pub names: HashMap<String, ObjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAndValue {
    pub typ: Type,
    pub value: Option<ConstValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub pos: Pos,
    pub message: String,
}

/// The checker's output for one snapshot: object/type/scope arenas plus the
/// index tables keyed by node identity (identifier start position, expression
/// span). The snapshot owns this; everything else borrows by id lookup.
#[derive(Debug)]
pub struct TypeInfo {
    pub(crate) objects: Vec<Object>,
    pub(crate) named: Vec<Named>,
    pub(crate) sigs: Vec<Signature>,
    pub(crate) scopes: Vec<Scope>,

    pub defs: HashMap<Pos, ObjectId>,
    pub uses: HashMap<Pos, ObjectId>,
    pub types: HashMap<(Pos, Pos), TypeAndValue>,
    pub file_scopes: HashMap<String, ScopeId>,
    pub pkg_scope: ScopeId,
    pub universe_scope: ScopeId,
    /// Sprite classes declared by `<Name>.spx` files, keyed by name.
    pub sprite_classes: HashMap<String, NamedId>,
    pub spx: SpxContext,
    pub errors: Vec<TypeError>,
}

impl TypeInfo {
    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn named_type(&self, id: NamedId) -> &Named {
        &self.named[id.0 as usize]
    }

    pub fn signature(&self, id: SigId) -> &Signature {
        &self.sigs[id.0 as usize]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// The object denoted by the identifier starting at `ident_pos`,
    /// definition sites first.
    pub fn object_of(&self, ident_pos: Pos) -> Option<ObjectId> {
        self.defs.get(&ident_pos).or_else(|| self.uses.get(&ident_pos)).copied()
    }

    pub fn type_of(&self, span: (Pos, Pos)) -> Option<&TypeAndValue> {
        self.types.get(&span)
    }

    /// Deepest positional scope whose extent contains `pos`.
    pub fn innermost_scope_at(&self, pos: Pos) -> Option<ScopeId> {
        let mut best: Option<(ScopeId, Pos)> = None;
        for (i, scope) in self.scopes.iter().enumerate() {
            if scope.pos == NO_POS || pos < scope.pos || pos >= scope.end {
                continue;
            }
            let width = scope.end - scope.pos;
            let better = match best {
                Some((_, w)) => width < w,
                None => true,
            };
            if better {
                best = Some((ScopeId(i as u32), width));
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<ObjectId> {
        self.scope(scope).names.get(name).copied()
    }

    /// Walks parent links.
    pub fn lookup_chain(&self, mut scope: ScopeId, name: &str) -> Option<ObjectId> {
        loop {
            if let Some(obj) = self.lookup(scope, name) {
                return Some(obj);
            }
            scope = self.scope(scope).parent?;
        }
    }

    pub fn func_signature(&self, obj: ObjectId) -> Option<&Signature> {
        match &self.object(obj).typ {
            Type::Func(sig) => Some(self.signature(*sig)),
            _ => None,
        }
    }

    /// Whether `obj` is a function with the overloadable marker signature.
    pub fn is_overloadable_func(&self, obj: ObjectId) -> bool {
        self.func_signature(obj).is_some_and(Signature::is_overload_marker)
    }

    /// Expands an overloadable function to its concrete `<base>__<id>`
    /// variants, in id order. Returns None for non-overloadable functions.
    pub fn expand_overloads(&self, obj: ObjectId) -> Option<Vec<ObjectId>> {
        if !self.is_overloadable_func(obj) {
            return None;
        }
        let object = self.object(obj);
        let scope = object.parent_scope?;
        let mut overloads = Vec::new();
        for id in "0123456789abcdefghijklmnopqrstuvwxyz".chars() {
            let name = format!("{}__{}", object.name, id);
            if let Some(candidate) = self.lookup(scope, &name) {
                overloads.push(candidate);
            }
        }
        Some(overloads)
    }

    /// An overloadable function whose expansion is empty cannot be presented
    /// as definitions at all.
    pub fn is_unexpandable_overloadable_func(&self, obj: ObjectId) -> bool {
        self.is_overloadable_func(obj) && self.expand_overloads(obj).is_some_and(|o| o.is_empty())
    }

    /// Member (field or method) lookup on a named type, walking embedded
    /// struct fields depth-first.
    pub fn lookup_member(&self, named: NamedId, name: &str) -> Option<ObjectId> {
        let mut visited = Vec::new();
        self.lookup_member_walk(named, name, &mut visited)
    }

    fn lookup_member_walk(&self, named: NamedId, name: &str, visited: &mut Vec<NamedId>) -> Option<ObjectId> {
        if visited.contains(&named) {
            return None;
        }
        visited.push(named);
        let n = self.named_type(named);
        if let Underlying::Struct(fields) = &n.underlying {
            for field in fields {
                if self.object(field.obj).name == name {
                    return Some(field.obj);
                }
            }
        }
        for &method in &n.methods {
            if self.object(method).name == name {
                return Some(method);
            }
        }
        if let Underlying::Struct(fields) = &n.underlying {
            for field in fields {
                if !field.embedded {
                    continue;
                }
                if let Type::Named(embedded) = &self.object(field.obj).typ {
                    if let Some(found) = self.lookup_member_walk(*embedded, name, visited) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    pub fn is_sprite_class(&self, id: NamedId) -> bool {
        self.sprite_classes.values().any(|&n| n == id)
    }

    /// Whether a scope belongs to this dialect's domain package: it defines
    /// `GopPackage` with untyped-bool type.
    pub fn is_dialect_pkg_scope(&self, scope: ScopeId) -> bool {
        self.lookup(scope, "GopPackage")
            .is_some_and(|obj| self.object(obj).typ == Type::Basic(BasicKind::UntypedBool))
    }

    /// Rendered type, with the spx package qualifier omitted.
    pub fn type_string(&self, typ: &Type) -> String {
        match typ {
            Type::Invalid => "invalid type".to_string(),
            Type::Unit => "()".to_string(),
            Type::Basic(kind) => kind.name().to_string(),
            Type::Named(id) => self.named_type(*id).name.clone(),
            Type::List(elem) => format!("[]{}", self.type_string(elem)),
            Type::Func(sig) => self.signature_string(*sig),
            Type::OverloadMarker => "overloadable".to_string(),
        }
    }

    pub fn signature_string(&self, sig: SigId) -> String {
        let sig = self.signature(sig);
        let params: Vec<String> = sig
            .params
            .iter()
            .map(|p| {
                if p.name.is_empty() {
                    self.type_string(&p.typ)
                } else {
                    format!("{} {}", p.name, self.type_string(&p.typ))
                }
            })
            .collect();
        let mut s = format!("func({})", params.join(", "));
        match sig.results.len() {
            0 => {}
            1 => {
                s.push(' ');
                s.push_str(&self.type_string(&sig.results[0]));
            }
            _ => {
                let results: Vec<String> = sig.results.iter().map(|t| self.type_string(t)).collect();
                s.push_str(&format!(" ({})", results.join(", ")));
            }
        }
        s
    }
}
