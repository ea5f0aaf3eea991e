use spxls_core::ast::walk::{walk, Node};
use spxls_core::ast::{path_enclosing_interval, Expr, Ident, LitKind, Stmt};
use spxls_core::token::Pos;
use spxls_core::typ::{ObjKind, Type, TypeInfo};

use super::{
    CompileResult, SourceFile, SpxBackdropResource, SpxResourceId, SpxResourceRef, SpxResourceRefKind,
    SpxSoundResource, SpxSpriteAnimationResource, SpxSpriteCostumeResource, SpxSpriteResource, SpxWidgetResource,
};

/// Discovers every resource reference in the snapshot: identifier
/// definitions with resource-typed initialisers, auto-bound fields,
/// identifier uses, and typed expressions (walking call arguments with
/// sprite-receiver propagation).
pub(crate) fn inspect_resource_refs(result: &mut CompileResult) {
    let tinfo = result.tinfo.clone();
    let sources: Vec<SourceFile> = result.files.values().cloned().collect();
    let inspector = RefInspector {
        tinfo: &tinfo,
        sources: &sources,
    };

    inspector.inspect_defs(result);
    inspector.inspect_uses(result);
    inspector.inspect_typed_exprs(result);
}

struct RefInspector<'a> {
    tinfo: &'a TypeInfo,
    sources: &'a [SourceFile],
}

impl<'a> RefInspector<'a> {
    fn source_of_pos(&self, pos: Pos) -> Option<&'a SourceFile> {
        self.sources.iter().find(|s| s.token_file.contains(pos))
    }

    fn file_stem_of_pos(&self, pos: Pos) -> Option<String> {
        let source = self.source_of_pos(pos)?;
        let base = source.path.rsplit('/').next().unwrap_or(&source.path);
        Some(base.strip_suffix(".spx").unwrap_or(base).to_string())
    }

    /// Pass over identifier definitions: initialiser expressions of value
    /// specs, then auto-binding detection for main-file fields.
    fn inspect_defs(&self, result: &mut CompileResult) {
        for source in self.sources {
            let mut spec_work: Vec<(&Expr, Type)> = Vec::new();
            walk(Node::File(&source.ast), &mut |node| {
                if let Node::Spec(spec) = node {
                    for (i, name) in spec.names.iter().enumerate() {
                        let Some(&obj) = self.tinfo.defs.get(&name.pos) else {
                            continue;
                        };
                        let object = self.tinfo.object(obj);
                        if !matches!(object.kind, ObjKind::Var | ObjKind::Const) {
                            continue;
                        }
                        let Some(value) = spec.values.get(i) else {
                            continue;
                        };
                        spec_work.push((value, object.typ.clone()));
                    }
                }
                true
            });
            for (value, typ) in spec_work {
                self.inspect_for_type_at_expr(result, value, &typ, None);
            }
        }

        self.inspect_auto_bindings(result);
    }

    fn inspect_auto_bindings(&self, result: &mut CompileResult) {
        let spx = &self.tinfo.spx;
        let Some(&main_file_scope) = self.tinfo.file_scopes.get(&result.main_spx_file) else {
            return;
        };

        let mut defs: Vec<(Pos, spxls_core::typ::ObjectId)> =
            self.tinfo.defs.iter().map(|(&p, &o)| (p, o)).collect();
        defs.sort_by_key(|&(p, _)| p);

        for (pos, obj) in defs {
            let object = self.tinfo.object(obj);
            if object.kind != ObjKind::Var {
                continue;
            }
            let Type::Named(named_id) = object.typ.clone() else {
                continue;
            };

            let Some(source) = self.source_of_pos(pos) else {
                continue;
            };
            if source.path != result.main_spx_file
                || self.tinfo.innermost_scope_at(pos) != Some(main_file_scope)
            {
                continue;
            }

            let var_type = &object.typ;
            let is_sound_binding =
                *var_type == spx.sound_type && result.resource_set.sound(&object.name).is_some();
            let is_sprite_binding = if *var_type == spx.sprite_type {
                result.resource_set.sprite(&object.name).is_some()
            } else {
                object.name == self.tinfo.named_type(named_id).name && self.tinfo.is_sprite_class(named_id)
            };
            if !is_sound_binding && !is_sprite_binding {
                continue;
            }

            let ident = Ident::new(pos, object.name.clone());
            if !object.in_class_fields_decl {
                let uri = result.to_document_uri(&source.path);
                let range = result.range_for_span((ident.pos, ident.end()));
                result.add_warning(
                    uri,
                    range,
                    "resources must be defined in the first var block for auto-binding",
                );
                continue;
            }

            if is_sound_binding {
                result.sound_auto_bindings.insert(obj);
            } else {
                result.sprite_auto_bindings.insert(obj);
            }
            let typ = object.typ.clone();
            let expr = Expr::Ident(ident);
            self.inspect_for_type_at_expr(result, &expr, &typ, None);
        }
    }

    /// Pass over identifier uses: every used identifier is inspected under
    /// its object's declared type.
    fn inspect_uses(&self, result: &mut CompileResult) {
        for source in self.sources {
            let mut work: Vec<(Pos, String, Type)> = Vec::new();
            walk(Node::File(&source.ast), &mut |node| {
                let ident = match node {
                    Node::Ident(id) => Some(id),
                    Node::Expr(Expr::Ident(id)) => Some(id),
                    _ => None,
                };
                if let Some(id) = ident {
                    if let Some(&obj) = self.tinfo.uses.get(&id.pos) {
                        work.push((id.pos, id.name.clone(), self.tinfo.object(obj).typ.clone()));
                    }
                }
                true
            });
            for (pos, name, typ) in work {
                let expr = Expr::Ident(Ident::new(pos, name));
                self.inspect_for_type_at_expr(result, &expr, &typ, None);
            }
        }
    }

    /// Pass over typed expressions: call arguments against parameter types
    /// (with sprite-receiver propagation, variadic reuse, and elementwise
    /// list parameters), everything else against its own type.
    fn inspect_typed_exprs(&self, result: &mut CompileResult) {
        for source in self.sources {
            let mut exprs: Vec<&Expr> = Vec::new();
            walk(Node::File(&source.ast), &mut |node| {
                if let Node::Expr(expr) = node {
                    if self.tinfo.type_of(expr.span()).is_some() {
                        exprs.push(expr);
                    }
                }
                true
            });
            for expr in exprs {
                match expr {
                    Expr::Call(call) => self.inspect_call(result, expr, call),
                    _ => {
                        if let Some(tv) = self.tinfo.type_of(expr.span()) {
                            let typ = tv.typ.clone();
                            self.inspect_for_type_at_expr(result, expr, &typ, None);
                        }
                    }
                }
            }
        }
    }

    fn inspect_call(&self, result: &mut CompileResult, expr: &Expr, call: &spxls_core::ast::CallExpr) {
        let Some(fun_tv) = self.tinfo.type_of(call.fun.span()) else {
            return;
        };
        let Type::Func(sig_id) = fun_tv.typ.clone() else {
            return;
        };
        let sig = self.tinfo.signature(sig_id).clone();

        let spx = &self.tinfo.spx;
        let mut sprite_ctx: Option<SpxSpriteResource> = None;
        if let Some(recv) = &sig.recv {
            if *recv == spx.sprite_type || *recv == spx.sprite_impl_type {
                sprite_ctx = self.inspect_sprite(result, expr, Some(recv.clone()));
            }
        }

        let mut last_param_type: Option<Type> = None;
        for (i, arg) in call.args.iter().enumerate() {
            let mut param_type = if i < sig.params.len() {
                let t = sig.params[i].typ.clone();
                last_param_type = Some(t.clone());
                Some(t)
            } else {
                // Variadic calls reuse the last parameter type.
                last_param_type.clone()
            };

            if let Some(Type::List(elem)) = &param_type {
                param_type = Some((**elem).clone());
            }
            let Some(param_type) = param_type else { continue };

            if let Expr::List(list) = arg.unparen() {
                for elt in &list.elts {
                    self.inspect_for_type_at_expr(result, elt, &param_type, sprite_ctx.as_ref());
                }
            } else {
                self.inspect_for_type_at_expr(result, arg, &param_type, sprite_ctx.as_ref());
            }
        }
    }

    /// Inspects one expression under an expected type, dispatching to the
    /// per-kind resolver. A plain identifier expected to be a resource name
    /// is first chased through an enclosing assignment to its right-hand
    /// side, so `name := "foo"; use(name)` resolves to `"foo"`.
    fn inspect_for_type_at_expr(
        &self,
        result: &mut CompileResult,
        expr: &Expr,
        typ: &Type,
        sprite_ctx: Option<&SpxSpriteResource>,
    ) {
        let spx = &self.tinfo.spx;
        let mut target = expr;

        if let Expr::Ident(ident) = expr {
            let is_chased_name_type = *typ == spx.backdrop_name_type
                || *typ == spx.sprite_name_type
                || *typ == spx.sound_name_type
                || *typ == spx.widget_name_type;
            if is_chased_name_type {
                if let Some(source) = self.source_of_pos(ident.pos) {
                    let (path, _) = path_enclosing_interval(&source.ast, ident.pos, ident.end());
                    for node in &path {
                        let Node::Stmt(Stmt::Assign(assign)) = *node else {
                            continue;
                        };
                        let Some(idx) = assign
                            .lhs
                            .iter()
                            .position(|lhs| lhs.span() == expr.span())
                        else {
                            continue;
                        };
                        if idx < assign.rhs.len() {
                            target = &assign.rhs[idx];
                            break;
                        }
                    }
                }
            }
        }

        if *typ == spx.backdrop_name_type {
            self.inspect_backdrop(result, target);
        } else if *typ == spx.sprite_name_type || *typ == spx.sprite_type {
            self.inspect_sprite(result, target, Some(typ.clone()));
        } else if *typ == spx.costume_name_type {
            if let Some(sprite) = sprite_ctx {
                self.inspect_costume(result, sprite, target);
            }
        } else if *typ == spx.animation_name_type {
            if let Some(sprite) = sprite_ctx {
                self.inspect_animation(result, sprite, target);
            }
        } else if *typ == spx.sound_name_type || *typ == spx.sound_type {
            self.inspect_sound(result, target, typ);
        } else if *typ == spx.widget_name_type {
            self.inspect_widget(result, target);
        } else if let Type::Named(id) = typ {
            if self.tinfo.is_sprite_class(*id) {
                self.inspect_sprite(result, target, Some(typ.clone()));
            }
        }
    }

    fn string_lit_or_const_value(&self, expr: &Expr) -> Option<String> {
        match expr.unparen() {
            Expr::Lit(lit) if lit.kind == LitKind::String => lit.value.clone(),
            Expr::Ident(_) => self
                .tinfo
                .type_of(expr.span())
                .and_then(|tv| tv.value.as_ref())
                .and_then(|v| v.as_str().map(str::to_string)),
            _ => None,
        }
    }

    fn literal_ref_kind(expr: &Expr) -> SpxResourceRefKind {
        if matches!(expr.unparen(), Expr::Ident(_)) {
            SpxResourceRefKind::ConstantReference
        } else {
            SpxResourceRefKind::StringLiteral
        }
    }

    fn diag_anchor(&self, result: &mut CompileResult, expr: &Expr) -> (tower_lsp::lsp_types::Url, tower_lsp::lsp_types::Range) {
        let uri = result
            .pos_document_uri(expr.pos())
            .unwrap_or_else(|| result.to_document_uri(""));
        let range = result.range_for_span(expr.span());
        (uri, range)
    }

    fn inspect_backdrop(&self, result: &mut CompileResult, expr: &Expr) -> Option<SpxBackdropResource> {
        let (uri, range) = self.diag_anchor(result, expr);
        let name = self.string_lit_or_const_value(expr)?;
        if name.is_empty() {
            result.add_error(uri, range, "backdrop resource name cannot be empty");
            return None;
        }
        result.add_resource_ref(SpxResourceRef {
            id: SpxResourceId::Backdrop { name: name.clone() },
            kind: Self::literal_ref_kind(expr),
            span: expr.span(),
        });

        let found = result.resource_set.backdrop(&name).cloned();
        if found.is_none() {
            result.add_error(uri.clone(), range, format!("backdrop resource {name:?} not found"));
        }
        found
    }

    fn inspect_sprite(&self, result: &mut CompileResult, expr: &Expr, declared: Option<Type>) -> Option<SpxSpriteResource> {
        let spx = &self.tinfo.spx;
        let (uri, range) = self.diag_anchor(result, expr);
        let typ = declared
            .clone()
            .or_else(|| self.tinfo.type_of(expr.span()).map(|tv| tv.typ.clone()))
            .unwrap_or(Type::Invalid);

        let mut sprite_name = String::new();
        if let Expr::Call(call) = expr.unparen() {
            match call.fun.unparen() {
                Expr::Ident(_) => {
                    // A receiverless call names the sprite declared by the
                    // enclosing `<name>.spx` file.
                    sprite_name = self.file_stem_of_pos(expr.pos()).unwrap_or_default();
                }
                Expr::Selector(selector) => {
                    if !matches!(selector.x.unparen(), Expr::Ident(_)) {
                        return None;
                    }
                    return self.inspect_sprite(result, &selector.x, declared);
                }
                _ => return None,
            }
        }

        if sprite_name.is_empty() {
            let kind;
            if typ == spx.sprite_name_type {
                sprite_name = self.string_lit_or_const_value(expr)?;
                kind = Self::literal_ref_kind(expr);
            } else {
                let Expr::Ident(ident) = expr.unparen() else {
                    return None;
                };
                let obj = self.tinfo.object_of(ident.pos)?;
                if !result.sprite_auto_bindings.contains(&obj) {
                    return None;
                }
                let object = self.tinfo.object(obj);
                sprite_name = object.name.clone();
                kind = if object.decl_pos == ident.pos {
                    SpxResourceRefKind::AutoBinding
                } else {
                    SpxResourceRefKind::AutoBindingReference
                };
            }
            if sprite_name.is_empty() {
                result.add_error(uri, range, "sprite resource name cannot be empty");
                return None;
            }
            result.add_resource_ref(SpxResourceRef {
                id: SpxResourceId::Sprite {
                    name: sprite_name.clone(),
                },
                kind,
                span: expr.span(),
            });
        }

        let found = result.resource_set.sprite(&sprite_name).cloned();
        if found.is_none() {
            result.add_error(uri, range, format!("sprite resource {sprite_name:?} not found"));
        }
        found
    }

    fn inspect_costume(
        &self,
        result: &mut CompileResult,
        sprite: &SpxSpriteResource,
        expr: &Expr,
    ) -> Option<SpxSpriteCostumeResource> {
        let (uri, range) = self.diag_anchor(result, expr);
        let name = self.string_lit_or_const_value(expr)?;
        if name.is_empty() {
            result.add_error(uri, range, "sprite costume resource name cannot be empty");
            return None;
        }
        result.add_resource_ref(SpxResourceRef {
            id: SpxResourceId::SpriteCostume {
                sprite: sprite.name.clone(),
                name: name.clone(),
            },
            kind: Self::literal_ref_kind(expr),
            span: expr.span(),
        });

        let found = sprite.costume(&name).cloned();
        if found.is_none() {
            result.add_error(
                uri,
                range,
                format!("costume resource {:?} not found in sprite {:?}", name, sprite.name),
            );
        }
        found
    }

    fn inspect_animation(
        &self,
        result: &mut CompileResult,
        sprite: &SpxSpriteResource,
        expr: &Expr,
    ) -> Option<SpxSpriteAnimationResource> {
        let (uri, range) = self.diag_anchor(result, expr);
        let name = self.string_lit_or_const_value(expr)?;
        if name.is_empty() {
            result.add_error(uri, range, "sprite animation resource name cannot be empty");
            return None;
        }
        result.add_resource_ref(SpxResourceRef {
            id: SpxResourceId::SpriteAnimation {
                sprite: sprite.name.clone(),
                name: name.clone(),
            },
            kind: Self::literal_ref_kind(expr),
            span: expr.span(),
        });

        let found = sprite.animation(&name).cloned();
        if found.is_none() {
            result.add_error(
                uri,
                range,
                format!("animation resource {:?} not found in sprite {:?}", name, sprite.name),
            );
        }
        found
    }

    fn inspect_sound(&self, result: &mut CompileResult, expr: &Expr, typ: &Type) -> Option<SpxSoundResource> {
        let spx = &self.tinfo.spx;
        let (uri, range) = self.diag_anchor(result, expr);

        let sound_name;
        let kind;
        if *typ == spx.sound_name_type {
            sound_name = self.string_lit_or_const_value(expr)?;
            kind = Self::literal_ref_kind(expr);
        } else if *typ == spx.sound_type {
            let Expr::Ident(ident) = expr.unparen() else {
                return None;
            };
            let obj = self.tinfo.object_of(ident.pos)?;
            if !result.sound_auto_bindings.contains(&obj) {
                return None;
            }
            let object = self.tinfo.object(obj);
            sound_name = object.name.clone();
            kind = if object.decl_pos == ident.pos {
                SpxResourceRefKind::AutoBinding
            } else {
                SpxResourceRefKind::AutoBindingReference
            };
        } else {
            return None;
        }

        if sound_name.is_empty() {
            result.add_error(uri, range, "sound resource name cannot be empty");
            return None;
        }
        result.add_resource_ref(SpxResourceRef {
            id: SpxResourceId::Sound {
                name: sound_name.clone(),
            },
            kind,
            span: expr.span(),
        });

        let found = result.resource_set.sound(&sound_name).cloned();
        if found.is_none() {
            result.add_error(uri, range, format!("sound resource {sound_name:?} not found"));
        }
        found
    }

    fn inspect_widget(&self, result: &mut CompileResult, expr: &Expr) -> Option<SpxWidgetResource> {
        let (uri, range) = self.diag_anchor(result, expr);
        let name = self.string_lit_or_const_value(expr)?;
        if name.is_empty() {
            result.add_error(uri, range, "widget resource name cannot be empty");
            return None;
        }
        result.add_resource_ref(SpxResourceRef {
            id: SpxResourceId::Widget { name: name.clone() },
            kind: Self::literal_ref_kind(expr),
            span: expr.span(),
        });

        let found = result.resource_set.widget(&name).cloned();
        if found.is_none() {
            result.add_error(uri, range, format!("widget resource {name:?} not found"));
        }
        found
    }
}
