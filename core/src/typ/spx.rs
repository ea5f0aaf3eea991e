use super::check::Builder;
use super::*;
use crate::token::NO_POS;

/// Ids of the spx domain types and scopes, built once per check and threaded
/// through analysis instead of living in process-wide state. All ids index
/// the owning [TypeInfo]'s arenas.
#[derive(Debug)]
pub struct SpxContext {
    pub game: NamedId,
    pub sprite: NamedId,
    pub sprite_impl: NamedId,
    pub sound: NamedId,

    pub game_type: Type,
    pub sprite_type: Type,
    pub sprite_impl_type: Type,
    pub sound_type: Type,

    pub backdrop_name_type: Type,
    pub sprite_name_type: Type,
    pub sound_name_type: Type,
    pub widget_name_type: Type,
    pub costume_name_type: Type,
    pub animation_name_type: Type,

    pub run_func: ObjectId,

    /// Stage members and spx type names; parent of every class scope.
    pub game_scope: ScopeId,
    /// Sprite members; parent is `game_scope`.
    pub sprite_scope: ScopeId,
}

impl SpxContext {
    /// Whether `typ` is one of the resource-name types.
    pub fn is_resource_name_type(&self, typ: &Type) -> bool {
        *typ == self.backdrop_name_type
            || *typ == self.sprite_name_type
            || *typ == self.sound_name_type
            || *typ == self.widget_name_type
            || *typ == self.costume_name_type
            || *typ == self.animation_name_type
    }
}

struct FuncSpec<'a> {
    name: &'a str,
    params: &'a [(&'a str, Type)],
    results: &'a [Type],
    doc: &'a str,
}

pub(crate) fn build_spx_context(b: &mut Builder) -> SpxContext {
    let game_scope = b.add_scope(Some(b.universe_scope));
    let sprite_scope = b.add_scope(Some(game_scope));

    // Package marker: this is how a scope is recognised as the dialect's.
    let marker = b.add_object(Object {
        name: "GopPackage".to_string(),
        kind: ObjKind::Const,
        typ: Type::Basic(BasicKind::UntypedBool),
        pkg: Pkg::Spx,
        decl_pos: NO_POS,
        const_value: Some(ConstValue::Bool(true)),
        in_class_fields_decl: false,
        doc: None,
        parent_scope: Some(game_scope),
    });
    b.declare(game_scope, marker);

    let backdrop_name_type = named_string(b, game_scope, "BackdropName", "Name of a backdrop resource.");
    let sprite_name_type = named_string(b, game_scope, "SpriteName", "Name of a sprite resource.");
    let sound_name_type = named_string(b, game_scope, "SoundName", "Name of a sound resource.");
    let widget_name_type = named_string(b, game_scope, "WidgetName", "Name of a widget resource.");
    let costume_name_type = named_string(b, game_scope, "SpriteCostumeName", "Name of a sprite costume.");
    let animation_name_type = named_string(b, game_scope, "SpriteAnimationName", "Name of a sprite animation.");

    let sound = named_struct(b, game_scope, "Sound", "A sound resource bound to a field.", Vec::new());
    let sound_type = Type::Named(sound);

    let sprite_impl = named_struct(b, game_scope, "SpriteImpl", "Implementation base of every sprite.", Vec::new());
    let sprite_impl_type = Type::Named(sprite_impl);

    // Sprite embeds SpriteImpl, so member lookup falls through to it.
    let embedded = b.add_object(Object {
        name: "SpriteImpl".to_string(),
        kind: ObjKind::Var,
        typ: sprite_impl_type.clone(),
        pkg: Pkg::Spx,
        decl_pos: NO_POS,
        const_value: None,
        in_class_fields_decl: false,
        doc: None,
        parent_scope: None,
    });
    let sprite = named_struct(
        b,
        game_scope,
        "Sprite",
        "A sprite on the stage.",
        vec![StructField {
            obj: embedded,
            embedded: true,
        }],
    );
    let sprite_type = Type::Named(sprite);

    let game = named_struct(b, game_scope, "Game", "The stage and program entry.", Vec::new());
    let game_type = Type::Named(game);

    let str_t = Type::Basic(BasicKind::String);
    let int_t = Type::Basic(BasicKind::Int);
    let float_t = Type::Basic(BasicKind::Float);
    let bool_t = Type::Basic(BasicKind::Bool);
    let handler_t = {
        let sig = b.add_sig(Signature {
            recv: None,
            params: Vec::new(),
            results: Vec::new(),
            variadic: false,
        });
        Type::Func(sig)
    };

    let game_funcs = [
        FuncSpec {
            name: "run",
            params: &[("resource", str_t.clone())],
            results: &[],
            doc: "Starts the game with resources loaded from the given root directory.",
        },
        FuncSpec {
            name: "play",
            params: &[("__overload_args__", Type::OverloadMarker)],
            results: &[],
            doc: "Plays a sound.",
        },
        FuncSpec {
            name: "play__0",
            params: &[("name", sound_name_type.clone())],
            results: &[],
            doc: "Plays the sound with the given name.",
        },
        FuncSpec {
            name: "play__1",
            params: &[("sound", sound_type.clone())],
            results: &[],
            doc: "Plays a bound sound.",
        },
        FuncSpec {
            name: "play__2",
            params: &[("name", sound_name_type.clone()), ("wait", bool_t.clone())],
            results: &[],
            doc: "Plays the sound with the given name, optionally waiting for it to finish.",
        },
        FuncSpec {
            name: "stopAllSounds",
            params: &[],
            results: &[],
            doc: "Stops every playing sound.",
        },
        FuncSpec {
            name: "onStart",
            params: &[("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback when the game starts.",
        },
        FuncSpec {
            name: "onClick",
            params: &[("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback when the stage is clicked.",
        },
        FuncSpec {
            name: "onMsg",
            params: &[("__overload_args__", Type::OverloadMarker)],
            results: &[],
            doc: "Runs the callback when a broadcast message arrives.",
        },
        FuncSpec {
            name: "onMsg__0",
            params: &[("msg", str_t.clone()), ("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback when the given message arrives.",
        },
        FuncSpec {
            name: "onMsg__1",
            params: &[("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback for every message.",
        },
        FuncSpec {
            name: "onBackdrop",
            params: &[("__overload_args__", Type::OverloadMarker)],
            results: &[],
            doc: "Runs the callback when the backdrop changes.",
        },
        FuncSpec {
            name: "onBackdrop__0",
            params: &[("backdrop", backdrop_name_type.clone()), ("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback when the given backdrop becomes active.",
        },
        FuncSpec {
            name: "onBackdrop__1",
            params: &[("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback for every backdrop change.",
        },
        FuncSpec {
            name: "setBackdrop",
            params: &[("__overload_args__", Type::OverloadMarker)],
            results: &[],
            doc: "Switches the backdrop.",
        },
        FuncSpec {
            name: "setBackdrop__0",
            params: &[("backdrop", backdrop_name_type.clone())],
            results: &[],
            doc: "Switches to the backdrop with the given name.",
        },
        FuncSpec {
            name: "setBackdrop__1",
            params: &[("index", int_t.clone())],
            results: &[],
            doc: "Switches to the backdrop at the given index.",
        },
        FuncSpec {
            name: "prevBackdrop",
            params: &[],
            results: &[],
            doc: "Switches to the previous backdrop.",
        },
        FuncSpec {
            name: "nextBackdrop",
            params: &[],
            results: &[],
            doc: "Switches to the next backdrop.",
        },
        FuncSpec {
            name: "broadcast",
            params: &[("__overload_args__", Type::OverloadMarker)],
            results: &[],
            doc: "Broadcasts a message.",
        },
        FuncSpec {
            name: "broadcast__0",
            params: &[("msg", str_t.clone())],
            results: &[],
            doc: "Broadcasts the given message.",
        },
        FuncSpec {
            name: "broadcast__1",
            params: &[("msg", str_t.clone()), ("wait", bool_t.clone())],
            results: &[],
            doc: "Broadcasts the given message, optionally waiting for handlers.",
        },
        // Overloadable but without concrete variants: the expansion is empty
        // and definition queries treat it as uninteresting.
        FuncSpec {
            name: "getWidget",
            params: &[("__overload_args__", Type::OverloadMarker)],
            results: &[],
            doc: "Returns the widget with the given name.",
        },
        FuncSpec {
            name: "setWidgetVisible",
            params: &[("widget", widget_name_type.clone()), ("visible", bool_t.clone())],
            results: &[],
            doc: "Shows or hides the widget with the given name.",
        },
        FuncSpec {
            name: "wait",
            params: &[("seconds", float_t.clone())],
            results: &[],
            doc: "Pauses the current handler.",
        },
        FuncSpec {
            name: "exit",
            params: &[],
            results: &[],
            doc: "Stops the game.",
        },
    ];
    let run_func = declare_methods(b, game_scope, game, &game_type, &game_funcs);

    let sprite_funcs = [
        FuncSpec {
            name: "setCostume",
            params: &[("costume", costume_name_type.clone())],
            results: &[],
            doc: "Switches the sprite to the costume with the given name.",
        },
        FuncSpec {
            name: "animate",
            params: &[("animation", animation_name_type.clone())],
            results: &[],
            doc: "Plays the animation with the given name.",
        },
        FuncSpec {
            name: "say",
            params: &[("__overload_args__", Type::OverloadMarker)],
            results: &[],
            doc: "Shows a speech bubble.",
        },
        FuncSpec {
            name: "say__0",
            params: &[("msg", str_t.clone())],
            results: &[],
            doc: "Shows a speech bubble with the given message.",
        },
        FuncSpec {
            name: "say__1",
            params: &[("msg", str_t.clone()), ("seconds", float_t.clone())],
            results: &[],
            doc: "Shows a speech bubble for the given duration.",
        },
        FuncSpec {
            name: "think",
            params: &[("msg", str_t.clone())],
            results: &[],
            doc: "Shows a thought bubble.",
        },
        FuncSpec {
            name: "turn",
            params: &[("degrees", float_t.clone())],
            results: &[],
            doc: "Rotates the sprite.",
        },
        FuncSpec {
            name: "step",
            params: &[("distance", float_t.clone())],
            results: &[],
            doc: "Moves the sprite forward.",
        },
        FuncSpec {
            name: "glide",
            params: &[("x", float_t.clone()), ("y", float_t.clone()), ("seconds", float_t.clone())],
            results: &[],
            doc: "Glides the sprite to a position.",
        },
        FuncSpec {
            name: "setXYpos",
            params: &[("x", float_t.clone()), ("y", float_t.clone())],
            results: &[],
            doc: "Moves the sprite to a position.",
        },
        FuncSpec {
            name: "show",
            params: &[],
            results: &[],
            doc: "Makes the sprite visible.",
        },
        FuncSpec {
            name: "hide",
            params: &[],
            results: &[],
            doc: "Hides the sprite.",
        },
        FuncSpec {
            name: "clone",
            params: &[],
            results: &[],
            doc: "Clones the sprite.",
        },
        FuncSpec {
            name: "touching",
            params: &[("sprite", sprite_name_type.clone())],
            results: &[bool_t.clone()],
            doc: "Reports whether the sprite touches the named sprite.",
        },
        FuncSpec {
            name: "distanceTo",
            params: &[("sprite", sprite_name_type.clone())],
            results: &[float_t.clone()],
            doc: "Distance to the named sprite.",
        },
        FuncSpec {
            name: "onCloned",
            params: &[("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback when a clone of the sprite is created.",
        },
        FuncSpec {
            name: "onTouchStart",
            params: &[("__overload_args__", Type::OverloadMarker)],
            results: &[],
            doc: "Runs the callback when the sprite is touched.",
        },
        FuncSpec {
            name: "onTouchStart__0",
            params: &[("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback when any sprite touches this one.",
        },
        FuncSpec {
            name: "onTouchStart__1",
            params: &[("sprite", sprite_name_type.clone()), ("callback", handler_t.clone())],
            results: &[],
            doc: "Runs the callback when the named sprite touches this one.",
        },
    ];
    declare_methods(b, sprite_scope, sprite_impl, &sprite_impl_type, &sprite_funcs);

    SpxContext {
        game,
        sprite,
        sprite_impl,
        sound,
        game_type,
        sprite_type,
        sprite_impl_type,
        sound_type,
        backdrop_name_type,
        sprite_name_type,
        sound_name_type,
        widget_name_type,
        costume_name_type,
        animation_name_type,
        run_func,
        game_scope,
        sprite_scope,
    }
}

fn named_string(b: &mut Builder, scope: ScopeId, name: &str, doc: &str) -> Type {
    let obj = b.add_object(Object {
        name: name.to_string(),
        kind: ObjKind::TypeName,
        typ: Type::Invalid, // patched below
        pkg: Pkg::Spx,
        decl_pos: NO_POS,
        const_value: None,
        in_class_fields_decl: false,
        doc: Some(doc.to_string()),
        parent_scope: Some(scope),
    });
    let named = b.add_named(Named {
        name: name.to_string(),
        obj,
        underlying: Underlying::Basic(BasicKind::String),
        methods: Vec::new(),
    });
    let typ = Type::Named(named);
    b.set_object_type(obj, typ.clone());
    b.declare(scope, obj);
    typ
}

fn named_struct(b: &mut Builder, scope: ScopeId, name: &str, doc: &str, fields: Vec<StructField>) -> NamedId {
    let obj = b.add_object(Object {
        name: name.to_string(),
        kind: ObjKind::TypeName,
        typ: Type::Invalid,
        pkg: Pkg::Spx,
        decl_pos: NO_POS,
        const_value: None,
        in_class_fields_decl: false,
        doc: Some(doc.to_string()),
        parent_scope: Some(scope),
    });
    let named = b.add_named(Named {
        name: name.to_string(),
        obj,
        underlying: Underlying::Struct(fields),
        methods: Vec::new(),
    });
    b.set_object_type(obj, Type::Named(named));
    b.declare(scope, obj);
    named
}

/// Declares each function in `scope` and registers it as a method of
/// `recv_named`. Returns the id of `run` when present (NO-op object otherwise).
fn declare_methods(
    b: &mut Builder,
    scope: ScopeId,
    recv_named: NamedId,
    recv_type: &Type,
    funcs: &[FuncSpec<'_>],
) -> ObjectId {
    let mut run_func = ObjectId(0);
    for spec in funcs {
        let sig = b.add_sig(Signature {
            recv: Some(recv_type.clone()),
            params: spec
                .params
                .iter()
                .map(|(name, typ)| Param {
                    name: (*name).to_string(),
                    typ: typ.clone(),
                })
                .collect(),
            results: spec.results.to_vec(),
            variadic: false,
        });
        let obj = b.add_object(Object {
            name: spec.name.to_string(),
            kind: ObjKind::Func,
            typ: Type::Func(sig),
            pkg: Pkg::Spx,
            decl_pos: NO_POS,
            const_value: None,
            in_class_fields_decl: false,
            doc: Some(spec.doc.to_string()),
            parent_scope: Some(scope),
        });
        b.declare(scope, obj);
        b.add_method(recv_named, obj);
        if spec.name == "run" {
            run_func = obj;
        }
    }
    run_func
}
