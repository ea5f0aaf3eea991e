use std::collections::HashMap;

use serde::Deserialize;
use spxls_core::project::Project;

/// Identity of one resource within the workspace resource set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpxResourceId {
    Backdrop { name: String },
    Sprite { name: String },
    SpriteCostume { sprite: String, name: String },
    SpriteAnimation { sprite: String, name: String },
    Sound { name: String },
    Widget { name: String },
}

impl SpxResourceId {
    /// Stable URI used by document links and the rename-resources command.
    pub fn uri(&self) -> String {
        match self {
            SpxResourceId::Backdrop { name } => format!("spx://resources/backdrops/{name}"),
            SpxResourceId::Sprite { name } => format!("spx://resources/sprites/{name}"),
            SpxResourceId::SpriteCostume { sprite, name } => {
                format!("spx://resources/sprites/{sprite}/costumes/{name}")
            }
            SpxResourceId::SpriteAnimation { sprite, name } => {
                format!("spx://resources/sprites/{sprite}/animations/{name}")
            }
            SpxResourceId::Sound { name } => format!("spx://resources/sounds/{name}"),
            SpxResourceId::Widget { name } => format!("spx://resources/widgets/{name}"),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SpxResourceId::Backdrop { name }
            | SpxResourceId::Sprite { name }
            | SpxResourceId::SpriteCostume { name, .. }
            | SpxResourceId::SpriteAnimation { name, .. }
            | SpxResourceId::Sound { name }
            | SpxResourceId::Widget { name } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpxResourceRefKind {
    StringLiteral,
    ConstantReference,
    AutoBinding,
    AutoBindingReference,
}

/// One reference from source code to a resource; `span` is the referencing
/// node's interval in the snapshot that produced this result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpxResourceRef {
    pub id: SpxResourceId,
    pub kind: SpxResourceRefKind,
    pub span: (spxls_core::token::Pos, spxls_core::token::Pos),
}

#[derive(Debug, Clone, Default)]
pub struct SpxBackdropResource {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpxWidgetResource {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpxSoundResource {
    pub name: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SpxSpriteCostumeResource {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpxSpriteAnimationResource {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpxSpriteResource {
    pub name: String,
    pub costumes: Vec<SpxSpriteCostumeResource>,
    pub animations: Vec<SpxSpriteAnimationResource>,
}

impl SpxSpriteResource {
    pub fn costume(&self, name: &str) -> Option<&SpxSpriteCostumeResource> {
        self.costumes.iter().find(|c| c.name == name)
    }

    pub fn animation(&self, name: &str) -> Option<&SpxSpriteAnimationResource> {
        self.animations.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SoundMetadata {
    path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CostumeMetadata {
    name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SpriteMetadata {
    costumes: Vec<CostumeMetadata>,
    #[serde(rename = "fAnimations")]
    animations: HashMap<String, serde_json::Value>,
}

/// The enumeration of resources under the snapshot's resource root
/// directory. Lookup is by name within a kind.
#[derive(Debug, Clone, Default)]
pub struct SpxResourceSet {
    backdrops: HashMap<String, SpxBackdropResource>,
    sprites: HashMap<String, SpxSpriteResource>,
    sounds: HashMap<String, SpxSoundResource>,
    widgets: HashMap<String, SpxWidgetResource>,
}

impl SpxResourceSet {
    /// Reads resource metadata files below `root_dir` in the snapshot:
    /// `backdrops/<name>.json`, `widgets/<name>.json`,
    /// `sounds/<name>/index.json` and `sprites/<name>/index.json`.
    pub fn load(proj: &Project, root_dir: &str) -> Result<SpxResourceSet, String> {
        let prefix = format!("{}/", root_dir.trim_end_matches('/'));
        let mut set = SpxResourceSet::default();

        for (path, file) in proj.files() {
            let Some(rel) = path.strip_prefix(&prefix) else {
                continue;
            };
            let segments: Vec<&str> = rel.split('/').collect();
            match segments.as_slice() {
                ["backdrops", file_name] => {
                    if let Some(name) = file_name.strip_suffix(".json") {
                        parse_metadata::<serde_json::Value>(path, &file.content)?;
                        set.backdrops.insert(
                            name.to_string(),
                            SpxBackdropResource {
                                name: name.to_string(),
                            },
                        );
                    }
                }
                ["widgets", file_name] => {
                    if let Some(name) = file_name.strip_suffix(".json") {
                        parse_metadata::<serde_json::Value>(path, &file.content)?;
                        set.widgets.insert(
                            name.to_string(),
                            SpxWidgetResource {
                                name: name.to_string(),
                            },
                        );
                    }
                }
                ["sounds", name, "index.json"] => {
                    let metadata: SoundMetadata = parse_metadata(path, &file.content)?;
                    set.sounds.insert(
                        (*name).to_string(),
                        SpxSoundResource {
                            name: (*name).to_string(),
                            path: metadata.path,
                        },
                    );
                }
                ["sprites", name, "index.json"] => {
                    let metadata: SpriteMetadata = parse_metadata(path, &file.content)?;
                    let mut animations: Vec<SpxSpriteAnimationResource> = metadata
                        .animations
                        .into_keys()
                        .map(|name| SpxSpriteAnimationResource { name })
                        .collect();
                    animations.sort_by(|a, b| a.name.cmp(&b.name));
                    set.sprites.insert(
                        (*name).to_string(),
                        SpxSpriteResource {
                            name: (*name).to_string(),
                            costumes: metadata
                                .costumes
                                .into_iter()
                                .map(|c| SpxSpriteCostumeResource { name: c.name })
                                .collect(),
                            animations,
                        },
                    );
                }
                _ => {}
            }
        }

        Ok(set)
    }

    pub fn backdrop(&self, name: &str) -> Option<&SpxBackdropResource> {
        self.backdrops.get(name)
    }

    pub fn sprite(&self, name: &str) -> Option<&SpxSpriteResource> {
        self.sprites.get(name)
    }

    pub fn sound(&self, name: &str) -> Option<&SpxSoundResource> {
        self.sounds.get(name)
    }

    pub fn widget(&self, name: &str) -> Option<&SpxWidgetResource> {
        self.widgets.get(name)
    }

    pub fn backdrops(&self) -> impl Iterator<Item = &SpxBackdropResource> {
        self.backdrops.values()
    }

    pub fn sprites(&self) -> impl Iterator<Item = &SpxSpriteResource> {
        self.sprites.values()
    }

    pub fn sounds(&self) -> impl Iterator<Item = &SpxSoundResource> {
        self.sounds.values()
    }

    pub fn widgets(&self) -> impl Iterator<Item = &SpxWidgetResource> {
        self.widgets.values()
    }
}

fn parse_metadata<'a, T: Deserialize<'a>>(path: &str, content: &'a str) -> Result<T, String> {
    serde_json::from_str(content).map_err(|err| format!("invalid resource metadata {path}: {err}"))
}
