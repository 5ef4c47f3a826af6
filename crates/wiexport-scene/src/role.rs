// wiexport-scene/src/role.rs
//! One-time classification of scene objects

use serde::{Deserialize, Serialize};

use crate::object::{ForceFieldKind, ObjectData, SourceObject};

/// What an object means to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ObjectRole {
    Mesh,
    Armature,
    Light,
    Camera,
    /// Projected decal box
    Decal {
        texture: Option<String>,
        normal: Option<String>,
    },
    /// Collision sphere parented to another object or bone
    HitSphere { property: String },
    WindField { strength: f32 },
    Empty,
}

impl ObjectRole {
    /// Classify an object from its payload and custom properties
    pub fn classify(object: &SourceObject) -> Self {
        match &object.data {
            ObjectData::Mesh { .. } => ObjectRole::Mesh,
            ObjectData::Armature { .. } => ObjectRole::Armature,
            ObjectData::Light(_) => ObjectRole::Light,
            ObjectData::Camera(_) => ObjectRole::Camera,
            ObjectData::Empty(empty) => {
                if object.property("decal").is_some_and(|p| p.is_truthy()) {
                    return ObjectRole::Decal {
                        texture: string_property(object, "texture"),
                        normal: string_property(object, "normal"),
                    };
                }
                if object.is_parented() {
                    let property = object
                        .property("property")
                        .filter(|p| p.is_truthy())
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "hit".to_string());
                    return ObjectRole::HitSphere { property };
                }
                match &empty.field {
                    Some(field) if field.kind == ForceFieldKind::Wind => ObjectRole::WindField {
                        strength: field.strength,
                    },
                    _ => ObjectRole::Empty,
                }
            }
        }
    }

    /// Short role name for listings
    pub fn name(&self) -> &'static str {
        match self {
            ObjectRole::Mesh => "mesh",
            ObjectRole::Armature => "armature",
            ObjectRole::Light => "light",
            ObjectRole::Camera => "camera",
            ObjectRole::Decal { .. } => "decal",
            ObjectRole::HitSphere { .. } => "hitsphere",
            ObjectRole::WindField { .. } => "wind",
            ObjectRole::Empty => "empty",
        }
    }
}

fn string_property(object: &SourceObject, key: &str) -> Option<String> {
    object
        .property(key)
        .and_then(|p| p.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
