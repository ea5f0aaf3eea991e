use std::collections::HashMap;

use super::spx::build_spx_context;
use super::*;
use crate::ast;
use crate::ast::{AssignOp, Decl, Expr, LitKind, Stmt};
use crate::token::{Pos, NO_POS};

/// Arena builder shared between the checker and the spx context setup.
pub(crate) struct Builder {
    pub(crate) objects: Vec<Object>,
    pub(crate) named: Vec<Named>,
    pub(crate) sigs: Vec<Signature>,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) universe_scope: ScopeId,
}

impl Builder {
    fn new() -> Self {
        let mut b = Self {
            objects: Vec::new(),
            named: Vec::new(),
            sigs: Vec::new(),
            scopes: Vec::new(),
            universe_scope: ScopeId(0),
        };
        b.scopes.push(Scope {
            parent: None,
            pos: NO_POS,
            end: NO_POS,
            names: HashMap::new(),
        });
        b.declare_universe();
        b
    }

    fn declare_universe(&mut self) {
        let universe = self.universe_scope;
        for (name, kind) in [
            ("string", BasicKind::String),
            ("int", BasicKind::Int),
            ("float", BasicKind::Float),
            ("bool", BasicKind::Bool),
        ] {
            let obj = self.add_object(Object {
                name: name.to_string(),
                kind: ObjKind::TypeName,
                typ: Type::Basic(kind),
                pkg: Pkg::Universe,
                decl_pos: NO_POS,
                const_value: None,
                in_class_fields_decl: false,
                doc: None,
                parent_scope: Some(universe),
            });
            self.declare(universe, obj);
        }
        for (name, value) in [("true", true), ("false", false)] {
            let obj = self.add_object(Object {
                name: name.to_string(),
                kind: ObjKind::Const,
                typ: Type::Basic(BasicKind::UntypedBool),
                pkg: Pkg::Universe,
                decl_pos: NO_POS,
                const_value: Some(ConstValue::Bool(value)),
                in_class_fields_decl: false,
                doc: None,
                parent_scope: Some(universe),
            });
            self.declare(universe, obj);
        }
        for (name, doc) in [
            ("print", "Prints the arguments."),
            ("println", "Prints the arguments followed by a newline."),
        ] {
            let sig = self.add_sig(Signature {
                recv: None,
                params: vec![Param {
                    name: "args".to_string(),
                    typ: Type::Basic(BasicKind::String),
                }],
                results: Vec::new(),
                variadic: true,
            });
            let obj = self.add_object(Object {
                name: name.to_string(),
                kind: ObjKind::Builtin,
                typ: Type::Func(sig),
                pkg: Pkg::Universe,
                decl_pos: NO_POS,
                const_value: None,
                in_class_fields_decl: false,
                doc: Some(doc.to_string()),
                parent_scope: Some(universe),
            });
            self.declare(universe, obj);
        }
    }

    pub(crate) fn add_object(&mut self, obj: Object) -> ObjectId {
        self.objects.push(obj);
        ObjectId(self.objects.len() as u32 - 1)
    }

    pub(crate) fn add_named(&mut self, named: Named) -> NamedId {
        self.named.push(named);
        NamedId(self.named.len() as u32 - 1)
    }

    pub(crate) fn add_sig(&mut self, sig: Signature) -> SigId {
        self.sigs.push(sig);
        SigId(self.sigs.len() as u32 - 1)
    }

    pub(crate) fn add_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.add_scope_at(parent, NO_POS, NO_POS)
    }

    pub(crate) fn add_scope_at(&mut self, parent: Option<ScopeId>, pos: Pos, end: Pos) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            pos,
            end,
            names: HashMap::new(),
        });
        ScopeId(self.scopes.len() as u32 - 1)
    }

    pub(crate) fn declare(&mut self, scope: ScopeId, obj: ObjectId) {
        let name = self.objects[obj.0 as usize].name.clone();
        self.scopes[scope.0 as usize].names.insert(name, obj);
    }

    pub(crate) fn set_object_type(&mut self, obj: ObjectId, typ: Type) {
        self.objects[obj.0 as usize].typ = typ;
    }

    pub(crate) fn add_method(&mut self, named: NamedId, obj: ObjectId) {
        self.named[named.0 as usize].methods.push(obj);
    }

    fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.0 as usize]
    }

    fn lookup(&self, scope: ScopeId, name: &str) -> Option<ObjectId> {
        self.scopes[scope.0 as usize].names.get(name).copied()
    }

    fn lookup_chain(&self, mut scope: ScopeId, name: &str) -> Option<ObjectId> {
        loop {
            if let Some(obj) = self.lookup(scope, name) {
                return Some(obj);
            }
            scope = self.scopes[scope.0 as usize].parent?;
        }
    }
}

/// Type-checks the package: every file of the snapshot, main first. Produces
/// the index tables the analysis engine consumes; never fails, all problems
/// are accumulated in `errors`.
pub fn check_files(files: &[(&str, &ast::File)]) -> TypeInfo {
    let mut b = Builder::new();
    let spx = build_spx_context(&mut b);
    let pkg_scope = b.add_scope(Some(b.universe_scope));

    let mut checker = Checker {
        b,
        spx,
        pkg_scope,
        defs: HashMap::new(),
        uses: HashMap::new(),
        types: HashMap::new(),
        file_scopes: HashMap::new(),
        sprite_classes: HashMap::new(),
        errors: Vec::new(),
        lambda_sig: None,
        scope_stack: Vec::new(),
        class_scope: ScopeId(0),
    };

    checker.declare_sprite_classes(files);
    checker.collect_package_decls(files);
    for (path, file) in files {
        checker.check_file(path, file);
    }

    let Checker {
        b,
        spx,
        pkg_scope,
        defs,
        uses,
        types,
        file_scopes,
        sprite_classes,
        errors,
        ..
    } = checker;

    TypeInfo {
        universe_scope: b.universe_scope,
        objects: b.objects,
        named: b.named,
        sigs: b.sigs,
        scopes: b.scopes,
        defs,
        uses,
        types,
        file_scopes,
        pkg_scope,
        sprite_classes,
        spx,
        errors,
    }
}

struct Checker {
    b: Builder,
    spx: SpxContext,
    pkg_scope: ScopeId,
    defs: HashMap<Pos, ObjectId>,
    uses: HashMap<Pos, ObjectId>,
    types: HashMap<(Pos, Pos), TypeAndValue>,
    file_scopes: HashMap<String, ScopeId>,
    sprite_classes: HashMap<String, NamedId>,
    errors: Vec<TypeError>,
    lambda_sig: Option<SigId>,
    /// Innermost-last positional scopes of the body being checked.
    scope_stack: Vec<ScopeId>,
    /// Class member scope of the current file (sprite or stage).
    class_scope: ScopeId,
}

fn file_stem(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.strip_suffix(".spx").unwrap_or(base)
}

impl Checker {
    fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.errors.push(TypeError {
            pos,
            message: message.into(),
        });
    }

    /// Every `<Name>.spx` other than the stage file declares the sprite
    /// class `<Name>`.
    fn declare_sprite_classes(&mut self, files: &[(&str, &ast::File)]) {
        for (path, file) in files {
            let stem = file_stem(path);
            if stem == "main" || stem.is_empty() {
                continue;
            }
            let obj = self.b.add_object(Object {
                name: stem.to_string(),
                kind: ObjKind::TypeName,
                typ: Type::Invalid,
                pkg: Pkg::Main,
                decl_pos: file.pos,
                const_value: None,
                in_class_fields_decl: false,
                doc: None,
                parent_scope: Some(self.pkg_scope),
            });
            let embedded = self.b.add_object(Object {
                name: "SpriteImpl".to_string(),
                kind: ObjKind::Var,
                typ: self.spx.sprite_impl_type.clone(),
                pkg: Pkg::Main,
                decl_pos: NO_POS,
                const_value: None,
                in_class_fields_decl: false,
                doc: None,
                parent_scope: None,
            });
            let named = self.b.add_named(Named {
                name: stem.to_string(),
                obj,
                underlying: Underlying::Struct(vec![StructField {
                    obj: embedded,
                    embedded: true,
                }]),
                methods: Vec::new(),
            });
            self.b.set_object_type(obj, Type::Named(named));
            self.b.declare(self.pkg_scope, obj);
            self.sprite_classes.insert(stem.to_string(), named);
        }
    }

    fn class_scope_for(&self, path: &str) -> ScopeId {
        if self.sprite_classes.contains_key(file_stem(path)) {
            self.spx.sprite_scope
        } else {
            self.spx.game_scope
        }
    }

    fn collect_package_decls(&mut self, files: &[(&str, &ast::File)]) {
        // Declare first, resolve declared types second, so declaration order
        // never matters.
        for (path, file) in files {
            let file_scope = self.b.add_scope_at(Some(self.pkg_scope), file.pos, file.end);
            self.file_scopes.insert((*path).to_string(), file_scope);

            let mut saw_var_block = false;
            for decl in &file.decls {
                match decl {
                    Decl::Gen(gen) => {
                        let in_fields_decl = gen.tok == ast::DeclTok::Var && !saw_var_block;
                        if gen.tok == ast::DeclTok::Var {
                            saw_var_block = true;
                        }
                        for spec in &gen.specs {
                            for name in &spec.names {
                                let kind = match gen.tok {
                                    ast::DeclTok::Var => ObjKind::Var,
                                    ast::DeclTok::Const => ObjKind::Const,
                                };
                                let obj = self.b.add_object(Object {
                                    name: name.name.clone(),
                                    kind,
                                    typ: Type::Invalid,
                                    pkg: Pkg::Main,
                                    decl_pos: name.pos,
                                    const_value: None,
                                    in_class_fields_decl: in_fields_decl,
                                    doc: None,
                                    parent_scope: Some(self.pkg_scope),
                                });
                                if name.name != "_" {
                                    self.b.declare(self.pkg_scope, obj);
                                }
                                self.defs.insert(name.pos, obj);
                            }
                        }
                    }
                    Decl::Func(func) if !func.shadow => {
                        let obj = self.b.add_object(Object {
                            name: func.name.name.clone(),
                            kind: ObjKind::Func,
                            typ: Type::Invalid,
                            pkg: Pkg::Main,
                            decl_pos: func.name.pos,
                            const_value: None,
                            in_class_fields_decl: false,
                            doc: None,
                            parent_scope: Some(self.pkg_scope),
                        });
                        if func.name.name != "_" {
                            self.b.declare(self.pkg_scope, obj);
                        }
                        self.defs.insert(func.name.pos, obj);
                    }
                    _ => {}
                }
            }
        }

        // Resolve declared types and function signatures.
        for (path, file) in files {
            self.class_scope = self.class_scope_for(path);
            self.scope_stack = vec![self.file_scopes[*path]];
            for decl in &file.decls {
                match decl {
                    Decl::Gen(gen) => {
                        for spec in &gen.specs {
                            let declared = spec.typ.as_ref().map(|t| self.check_type_expr(t));
                            if let Some(typ) = declared {
                                for name in &spec.names {
                                    if let Some(&obj) = self.defs.get(&name.pos) {
                                        self.b.set_object_type(obj, typ.clone());
                                    }
                                }
                            }
                        }
                    }
                    Decl::Func(func) if !func.shadow => {
                        let params = func
                            .params
                            .iter()
                            .flat_map(|list| &list.fields)
                            .map(|field| Param {
                                name: field.name.name.clone(),
                                typ: field
                                    .typ
                                    .as_ref()
                                    .map_or(Type::Invalid, |t| self.check_type_expr(t)),
                            })
                            .collect();
                        let sig = self.b.add_sig(Signature {
                            recv: None,
                            params,
                            results: Vec::new(),
                            variadic: false,
                        });
                        if let Some(&obj) = self.defs.get(&func.name.pos) {
                            self.b.set_object_type(obj, Type::Func(sig));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn check_file(&mut self, path: &str, file: &ast::File) {
        let file_scope = self.file_scopes[path];
        self.class_scope = self.class_scope_for(path);

        for decl in &file.decls {
            self.scope_stack = vec![file_scope];
            match decl {
                Decl::Gen(gen) => self.check_gen_decl(gen, true),
                Decl::Func(func) => {
                    if func.shadow {
                        let scope = self
                            .b
                            .add_scope_at(Some(file_scope), decl.pos(), decl.end().max(decl.pos() + 1));
                        self.scope_stack.push(scope);
                        for stmt in &func.body.stmts {
                            self.check_stmt(stmt);
                        }
                    } else {
                        let scope = self.b.add_scope_at(Some(file_scope), func.pos(), func.end());
                        self.scope_stack.push(scope);
                        let param_types: Vec<Type> = self
                            .defs
                            .get(&func.name.pos)
                            .and_then(|&obj| match &self.b.object(obj).typ {
                                Type::Func(sig) => Some(
                                    self.b.sigs[sig.0 as usize]
                                        .params
                                        .iter()
                                        .map(|p| p.typ.clone())
                                        .collect(),
                                ),
                                _ => None,
                            })
                            .unwrap_or_default();
                        for (i, field) in func.params.iter().flat_map(|list| &list.fields).enumerate() {
                            let typ = param_types.get(i).cloned().unwrap_or(Type::Invalid);
                            let obj = self.b.add_object(Object {
                                name: field.name.name.clone(),
                                kind: ObjKind::Var,
                                typ,
                                pkg: Pkg::Main,
                                decl_pos: field.name.pos,
                                const_value: None,
                                in_class_fields_decl: false,
                                doc: None,
                                parent_scope: Some(scope),
                            });
                            if field.name.name != "_" {
                                self.b.declare(scope, obj);
                            }
                            self.defs.insert(field.name.pos, obj);
                        }
                        for stmt in &func.body.stmts {
                            self.check_stmt(stmt);
                        }
                    }
                }
                Decl::Bad(_) => {}
            }
        }
    }

    /// Checks initializers of a var/const declaration. `package_level` specs
    /// update objects declared during collection; local specs declare fresh
    /// objects in the current scope.
    fn check_gen_decl(&mut self, gen: &ast::GenDecl, package_level: bool) {
        for spec in &gen.specs {
            // Package-level declared types were already resolved during
            // collection; resolving again would duplicate errors.
            let declared = if package_level {
                None
            } else {
                spec.typ.as_ref().map(|t| self.check_type_expr(t))
            };
            let values: Vec<TypeAndValue> = spec.values.iter().map(|v| self.check_expr(v)).collect();

            for (i, name) in spec.names.iter().enumerate() {
                let value_tv = values.get(i);
                let typ = declared.clone().unwrap_or_else(|| {
                    value_tv.map_or(Type::Invalid, |tv| default_type(&tv.typ))
                });
                let const_value = if gen.tok == ast::DeclTok::Const {
                    value_tv.and_then(|tv| tv.value.clone())
                } else {
                    None
                };

                if package_level {
                    if let Some(&obj) = self.defs.get(&name.pos) {
                        if self.b.object(obj).typ.is_invalid() {
                            self.b.set_object_type(obj, typ);
                        }
                        self.b.objects[obj.0 as usize].const_value = const_value;
                    }
                } else {
                    let scope = *self.scope_stack.last().expect("local decl outside scope");
                    let obj = self.b.add_object(Object {
                        name: name.name.clone(),
                        kind: match gen.tok {
                            ast::DeclTok::Var => ObjKind::Var,
                            ast::DeclTok::Const => ObjKind::Const,
                        },
                        typ,
                        pkg: Pkg::Main,
                        decl_pos: name.pos,
                        const_value,
                        in_class_fields_decl: false,
                        doc: None,
                        parent_scope: Some(scope),
                    });
                    if name.name != "_" {
                        self.b.declare(scope, obj);
                    }
                    self.defs.insert(name.pos, obj);
                }
            }
        }
    }

    fn resolve(&self, name: &str) -> Option<ObjectId> {
        for &scope in self.scope_stack.iter().rev() {
            if let Some(obj) = self.b.lookup(scope, name) {
                return Some(obj);
            }
        }
        if let Some(obj) = self.b.lookup(self.pkg_scope, name) {
            return Some(obj);
        }
        self.b.lookup_chain(self.class_scope, name)
    }

    fn check_type_expr(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::Ident(ident) => match self.resolve(&ident.name) {
                Some(obj) if self.b.object(obj).kind == ObjKind::TypeName => {
                    self.uses.insert(ident.pos, obj);
                    self.b.object(obj).typ.clone()
                }
                Some(obj) => {
                    self.uses.insert(ident.pos, obj);
                    let name = ident.name.clone();
                    self.error(ident.pos, format!("{name} is not a type"));
                    Type::Invalid
                }
                None => {
                    let name = ident.name.clone();
                    self.error(ident.pos, format!("undefined: {name}"));
                    Type::Invalid
                }
            },
            _ => {
                self.error(expr.pos(), "invalid type expression");
                Type::Invalid
            }
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(s) => {
                self.check_expr(&s.x);
            }
            Stmt::Assign(s) => self.check_assign(s),
            Stmt::IncDec(s) => {
                self.check_expr(&s.x);
            }
            Stmt::Return(s) => {
                for result in &s.results {
                    self.check_expr(result);
                }
            }
            Stmt::Branch(_) => {}
            Stmt::If(s) => {
                self.check_expr(&s.cond);
                self.check_block(&s.body);
                if let Some(else_branch) = &s.else_branch {
                    self.check_stmt(else_branch);
                }
            }
            Stmt::For(s) => {
                let scope = self
                    .b
                    .add_scope_at(self.scope_stack.last().copied(), s.for_pos, s.body.end());
                self.scope_stack.push(scope);
                if let Some(x) = &s.x {
                    let tv = self.check_expr(x);
                    if s.in_pos != NO_POS {
                        let elem = match tv.typ {
                            Type::List(elem) => *elem,
                            _ => Type::Invalid,
                        };
                        if let Some(key) = &s.key {
                            self.declare_local(key, Type::Basic(BasicKind::Int));
                        }
                        if let Some(value) = &s.value {
                            self.declare_local(value, elem);
                        }
                    }
                }
                for inner in &s.body.stmts {
                    self.check_stmt(inner);
                }
                self.scope_stack.pop();
            }
            Stmt::Block(block) => self.check_block(block),
            Stmt::Decl(s) => self.check_gen_decl(&s.decl, false),
            Stmt::Bad(_) => {}
        }
    }

    fn check_block(&mut self, block: &ast::Block) {
        let scope = self
            .b
            .add_scope_at(self.scope_stack.last().copied(), block.pos(), block.end());
        self.scope_stack.push(scope);
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.scope_stack.pop();
    }

    fn declare_local(&mut self, ident: &ast::Ident, typ: Type) {
        let scope = *self.scope_stack.last().expect("no current scope");
        let obj = self.b.add_object(Object {
            name: ident.name.clone(),
            kind: ObjKind::Var,
            typ,
            pkg: Pkg::Main,
            decl_pos: ident.pos,
            const_value: None,
            in_class_fields_decl: false,
            doc: None,
            parent_scope: Some(scope),
        });
        if ident.name != "_" {
            self.b.declare(scope, obj);
        }
        self.defs.insert(ident.pos, obj);
    }

    fn check_assign(&mut self, s: &ast::AssignStmt) {
        let rhs: Vec<TypeAndValue> = s.rhs.iter().map(|r| self.check_expr(r)).collect();
        if s.op == AssignOp::Define {
            for (i, lhs) in s.lhs.iter().enumerate() {
                match lhs {
                    Expr::Ident(ident) => {
                        let typ = if s.lhs.len() == rhs.len() {
                            default_type(&rhs[i].typ)
                        } else {
                            Type::Invalid
                        };
                        self.declare_local(ident, typ);
                    }
                    other => {
                        self.error(other.pos(), "non-name on left side of :=");
                        self.check_expr(other);
                    }
                }
            }
        } else {
            for lhs in &s.lhs {
                self.check_expr(lhs);
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> TypeAndValue {
        let tv = self.check_expr_inner(expr);
        self.types.insert(expr.span(), tv.clone());
        tv
    }

    fn check_expr_inner(&mut self, expr: &Expr) -> TypeAndValue {
        match expr {
            Expr::Ident(ident) => {
                if ident.name == "_" {
                    return invalid();
                }
                match self.resolve(&ident.name) {
                    Some(obj) => {
                        if !self.defs.contains_key(&ident.pos) {
                            self.uses.insert(ident.pos, obj);
                        }
                        let object = self.b.object(obj);
                        TypeAndValue {
                            typ: object.typ.clone(),
                            value: object.const_value.clone(),
                        }
                    }
                    None => {
                        let name = ident.name.clone();
                        self.error(ident.pos, format!("undefined: {name}"));
                        invalid()
                    }
                }
            }
            Expr::Lit(lit) => match lit.kind {
                LitKind::String => TypeAndValue {
                    typ: Type::Basic(BasicKind::UntypedString),
                    value: lit.value.clone().map(ConstValue::String),
                },
                LitKind::Int => TypeAndValue {
                    typ: Type::Basic(BasicKind::UntypedInt),
                    value: lit.raw.parse::<i64>().ok().map(ConstValue::Int),
                },
                LitKind::Float => TypeAndValue {
                    typ: Type::Basic(BasicKind::UntypedFloat),
                    value: lit.raw.parse::<f64>().ok().map(ConstValue::Float),
                },
            },
            Expr::Paren(paren) => self.check_expr(&paren.x),
            Expr::Unary(unary) => {
                let tv = self.check_expr(&unary.x);
                match unary.op {
                    ast::UnOp::Not => TypeAndValue {
                        typ: Type::Basic(BasicKind::UntypedBool),
                        value: None,
                    },
                    ast::UnOp::Neg => TypeAndValue {
                        typ: tv.typ,
                        value: None,
                    },
                }
            }
            Expr::Binary(binary) => {
                let x = self.check_expr(&binary.x);
                let y = self.check_expr(&binary.y);
                use ast::BinOp::*;
                match binary.op {
                    Eq | Ne | Lt | Gt | Le | Ge | And | Or => TypeAndValue {
                        typ: Type::Basic(BasicKind::UntypedBool),
                        value: None,
                    },
                    _ => TypeAndValue {
                        typ: if x.typ.is_invalid() { y.typ } else { x.typ },
                        value: None,
                    },
                }
            }
            Expr::List(list) => {
                let mut elem = Type::Invalid;
                for (i, elt) in list.elts.iter().enumerate() {
                    let tv = self.check_expr(elt);
                    if i == 0 {
                        elem = default_type(&tv.typ);
                    }
                }
                TypeAndValue {
                    typ: Type::List(Box::new(elem)),
                    value: None,
                }
            }
            Expr::Index(index) => {
                let x = self.check_expr(&index.x);
                self.check_expr(&index.index);
                TypeAndValue {
                    typ: match x.typ {
                        Type::List(elem) => *elem,
                        _ => Type::Invalid,
                    },
                    value: None,
                }
            }
            Expr::Lambda(lambda) => {
                let scope = self
                    .b
                    .add_scope_at(self.scope_stack.last().copied(), lambda.arrow, lambda.body.end());
                self.scope_stack.push(scope);
                for stmt in &lambda.body.stmts {
                    self.check_stmt(stmt);
                }
                self.scope_stack.pop();
                let sig = match self.lambda_sig {
                    Some(sig) => sig,
                    None => {
                        let sig = self.b.add_sig(Signature {
                            recv: None,
                            params: Vec::new(),
                            results: Vec::new(),
                            variadic: false,
                        });
                        self.lambda_sig = Some(sig);
                        sig
                    }
                };
                TypeAndValue {
                    typ: Type::Func(sig),
                    value: None,
                }
            }
            Expr::Selector(selector) => self.check_selector(selector),
            Expr::Call(call) => self.check_call(call),
            Expr::Bad(_) => invalid(),
        }
    }

    fn check_selector(&mut self, selector: &ast::SelectorExpr) -> TypeAndValue {
        let base = self.check_expr(&selector.x);
        let named = match &base.typ {
            Type::Named(id) => Some(*id),
            _ => None,
        };
        let Some(named) = named else {
            return invalid();
        };

        // Temporarily move member lookup through an immutable view.
        let member = {
            let info = MemberView { b: &self.b };
            info.lookup_member(named, &selector.sel.name)
        };
        match member {
            Some(obj) => {
                self.uses.insert(selector.sel.pos, obj);
                let object = self.b.object(obj);
                TypeAndValue {
                    typ: object.typ.clone(),
                    value: object.const_value.clone(),
                }
            }
            None => {
                let type_name = self.b.named[named.0 as usize].name.clone();
                let sel = selector.sel.name.clone();
                self.error(
                    selector.sel.pos,
                    format!("{sel} undefined (type {type_name} has no field or method {sel})"),
                );
                invalid()
            }
        }
    }

    fn check_call(&mut self, call: &ast::CallExpr) -> TypeAndValue {
        let fun_tv = self.check_expr(&call.fun);
        let arg_tvs: Vec<TypeAndValue> = call.args.iter().map(|a| self.check_expr(a)).collect();

        let fun_obj = match call.fun.unparen() {
            Expr::Ident(ident) => self.uses.get(&ident.pos).copied(),
            Expr::Selector(selector) => self.uses.get(&selector.sel.pos).copied(),
            _ => None,
        };

        let mut sig_id = match fun_tv.typ {
            Type::Func(sig) => Some(sig),
            Type::Invalid => None,
            _ => {
                self.error(call.fun.pos(), "cannot call non-function value");
                None
            }
        };

        // Overloadable marker: substitute the concrete variant picked by the
        // argument shapes, recording the resolved signature on the callee.
        if let (Some(sig), Some(obj)) = (sig_id, fun_obj) {
            if self.b.sigs[sig.0 as usize].is_overload_marker() {
                if let Some(picked) = self.pick_overload(obj, &arg_tvs) {
                    if let Type::Func(picked_sig) = &self.b.object(picked).typ {
                        let picked_sig = *picked_sig;
                        sig_id = Some(picked_sig);
                        self.types.insert(
                            call.fun.span(),
                            TypeAndValue {
                                typ: Type::Func(picked_sig),
                                value: None,
                            },
                        );
                    }
                }
            }
        }

        let result = sig_id
            .map(|sig| {
                let sig = &self.b.sigs[sig.0 as usize];
                sig.results.first().cloned().unwrap_or(Type::Unit)
            })
            .unwrap_or(Type::Invalid);
        TypeAndValue {
            typ: result,
            value: None,
        }
    }

    /// Chooses the overload variant whose parameter list matches the
    /// arguments: first by count and per-argument compatibility, then by
    /// count alone, then the first variant.
    fn pick_overload(&self, marker: ObjectId, args: &[TypeAndValue]) -> Option<ObjectId> {
        let object = self.b.object(marker);
        let scope = object.parent_scope?;
        let mut variants = Vec::new();
        for id in "0123456789abcdefghijklmnopqrstuvwxyz".chars() {
            let name = format!("{}__{}", object.name, id);
            if let Some(obj) = self.b.lookup(scope, &name) {
                variants.push(obj);
            }
        }
        if variants.is_empty() {
            return None;
        }

        let count_matches = |sig: &Signature| sig.params.len() == args.len();
        for &variant in &variants {
            if let Type::Func(sig) = &self.b.object(variant).typ {
                let sig = &self.b.sigs[sig.0 as usize];
                if count_matches(sig)
                    && sig
                        .params
                        .iter()
                        .zip(args)
                        .all(|(p, a)| arg_compatible(&self.b, &a.typ, &p.typ))
                {
                    return Some(variant);
                }
            }
        }
        for &variant in &variants {
            if let Type::Func(sig) = &self.b.object(variant).typ {
                if count_matches(&self.b.sigs[sig.0 as usize]) {
                    return Some(variant);
                }
            }
        }
        variants.first().copied()
    }
}

struct MemberView<'a> {
    b: &'a Builder,
}

impl MemberView<'_> {
    fn lookup_member(&self, named: NamedId, name: &str) -> Option<ObjectId> {
        let mut visited = Vec::new();
        self.walk(named, name, &mut visited)
    }

    fn walk(&self, named: NamedId, name: &str, visited: &mut Vec<NamedId>) -> Option<ObjectId> {
        if visited.contains(&named) {
            return None;
        }
        visited.push(named);
        let n = &self.b.named[named.0 as usize];
        if let Underlying::Struct(fields) = &n.underlying {
            for field in fields {
                if self.b.object(field.obj).name == name {
                    return Some(field.obj);
                }
            }
        }
        for &method in &n.methods {
            if self.b.object(method).name == name {
                return Some(method);
            }
        }
        if let Underlying::Struct(fields) = &n.underlying {
            for field in fields {
                if !field.embedded {
                    continue;
                }
                if let Type::Named(embedded) = &self.b.object(field.obj).typ {
                    if let Some(found) = self.walk(*embedded, name, visited) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }
}

fn invalid() -> TypeAndValue {
    TypeAndValue {
        typ: Type::Invalid,
        value: None,
    }
}

/// Untyped constants assume their default type when they flow into a
/// declaration.
fn default_type(typ: &Type) -> Type {
    match typ {
        Type::Basic(BasicKind::UntypedBool) => Type::Basic(BasicKind::Bool),
        Type::Basic(BasicKind::UntypedInt) => Type::Basic(BasicKind::Int),
        Type::Basic(BasicKind::UntypedFloat) => Type::Basic(BasicKind::Float),
        Type::Basic(BasicKind::UntypedString) => Type::Basic(BasicKind::String),
        other => other.clone(),
    }
}

fn arg_compatible(b: &Builder, arg: &Type, param: &Type) -> bool {
    if arg.is_invalid() || param.is_invalid() {
        return true;
    }
    if arg == param {
        return true;
    }
    let named_underlying = |t: &Type| match t {
        Type::Named(id) => match &b.named[id.0 as usize].underlying {
            Underlying::Basic(kind) => Some(*kind),
            Underlying::Struct(_) => None,
        },
        _ => None,
    };
    match (arg, param) {
        (Type::Basic(a), Type::Basic(p)) => {
            matches!(
                (a, p),
                (BasicKind::UntypedString, BasicKind::String)
                    | (BasicKind::UntypedInt, BasicKind::Int)
                    | (BasicKind::UntypedInt, BasicKind::Float)
                    | (BasicKind::UntypedFloat, BasicKind::Float)
                    | (BasicKind::UntypedBool, BasicKind::Bool)
                    | (BasicKind::Int, BasicKind::Float)
            )
        }
        (Type::Basic(a), Type::Named(_)) => {
            let under = named_underlying(param);
            matches!(
                (a, under),
                (BasicKind::UntypedString, Some(BasicKind::String)) | (BasicKind::String, Some(BasicKind::String))
            )
        }
        (Type::Func(_), Type::Func(_)) => true,
        _ => false,
    }
}
