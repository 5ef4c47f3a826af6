// wiexport-scene/src/scene.rs
//! The scene snapshot: every object and data block of one authoring-tool scene

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use wiexport_core::{Color, Error, Result};

use crate::action::Action;
use crate::armature::SourceArmature;
use crate::material::SourceMaterial;
use crate::mesh::SourceMesh;
use crate::object::SourceObject;

/// Distance fog settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mist {
    pub start: f32,
    pub depth: f32,
    #[serde(default)]
    pub height: f32,
}

/// Environment lighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    #[serde(default = "default_horizon")]
    pub horizon: Color,
    #[serde(default)]
    pub zenith: Color,
    #[serde(default = "default_ambient")]
    pub ambient: Color,
    #[serde(default)]
    pub mist: Option<Mist>,
}

fn default_horizon() -> Color {
    Color::rgb(0.05, 0.05, 0.05)
}

fn default_ambient() -> Color {
    Color::BLACK
}

impl Default for World {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            zenith: Color::WHITE,
            ambient: default_ambient(),
            mist: None,
        }
    }
}

/// Owned snapshot of an authoring-tool scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceScene {
    pub name: String,
    /// Configured playback start
    #[serde(default = "default_frame_start")]
    pub frame_start: i32,
    #[serde(default = "default_frame_end")]
    pub frame_end: i32,
    #[serde(default)]
    pub objects: Vec<SourceObject>,
    #[serde(default)]
    pub meshes: Vec<SourceMesh>,
    #[serde(default)]
    pub armatures: Vec<SourceArmature>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub materials: Vec<SourceMaterial>,
    #[serde(default)]
    pub world: Option<World>,
}

fn default_frame_start() -> i32 {
    1
}

fn default_frame_end() -> i32 {
    250
}

impl SourceScene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame_start: default_frame_start(),
            frame_end: default_frame_end(),
            objects: Vec::new(),
            meshes: Vec::new(),
            armatures: Vec::new(),
            actions: Vec::new(),
            materials: Vec::new(),
            world: None,
        }
    }

    pub fn object(&self, name: &str) -> Option<&SourceObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn mesh(&self, name: &str) -> Option<&SourceMesh> {
        self.meshes.iter().find(|m| m.name == name)
    }

    pub fn armature(&self, name: &str) -> Option<&SourceArmature> {
        self.armatures.iter().find(|a| a.name == name)
    }

    pub fn material(&self, name: &str) -> Option<&SourceMaterial> {
        self.materials.iter().find(|m| m.name == name)
    }

    /// Armature data of an armature object
    pub fn armature_of(&self, object: &SourceObject) -> Option<&SourceArmature> {
        object.armature_name().and_then(|name| self.armature(name))
    }

    /// Objects whose payload is an armature
    pub fn armature_objects(&self) -> impl Iterator<Item = &SourceObject> {
        self.objects.iter().filter(|o| o.armature_name().is_some())
    }

    /// Actions animating an armature object and its armature data
    pub fn actions_for<'a>(
        &'a self,
        armature_object: &'a str,
        armature_data: &'a str,
    ) -> impl Iterator<Item = &'a Action> {
        self.actions
            .iter()
            .filter(move |a| a.belongs_to(armature_object, armature_data))
    }

    /// Number of object parent links between `name` and its root
    pub fn hierarchy_depth(&self, name: &str) -> Result<usize> {
        let mut depth = 0;
        let mut seen = HashSet::from([name]);
        let mut current = self
            .object(name)
            .ok_or_else(|| Error::invalid_reference(format!("object '{}'", name)))?;

        while let Some(parent) = current.parent.as_deref() {
            if !seen.insert(parent) {
                return Err(Error::invalid_data(format!(
                    "object '{}' is its own ancestor",
                    name
                )));
            }
            current = self.object(parent).ok_or_else(|| {
                Error::invalid_reference(format!(
                    "object '{}' has unknown parent '{}'",
                    current.name, parent
                ))
            })?;
            depth += 1;
        }
        Ok(depth)
    }

    /// Structural checks: every reference resolves and no hierarchy loops.
    ///
    /// The first broken reference is returned; the exporter refuses to
    /// write anything for a scene that fails here.
    pub fn validate(&self) -> Result<()> {
        for armature in &self.armatures {
            armature.validate()?;
        }

        for mesh in &self.meshes {
            let count = mesh.vertices.len();
            for (face_index, face) in mesh.faces.iter().enumerate() {
                if let Some(corner) = face.corners.iter().find(|c| c.vertex_index as usize >= count) {
                    return Err(Error::invalid_reference(format!(
                        "mesh '{}' face {} references vertex {} of {}",
                        mesh.name, face_index, corner.vertex_index, count
                    )));
                }
            }
        }

        for object in &self.objects {
            if let Some(mesh) = object.mesh_name() {
                if self.mesh(mesh).is_none() {
                    return Err(Error::invalid_reference(format!(
                        "object '{}' uses unknown mesh '{}'",
                        object.name, mesh
                    )));
                }
            }
            if let Some(armature) = object.armature_name() {
                if self.armature(armature).is_none() {
                    return Err(Error::invalid_reference(format!(
                        "object '{}' uses unknown armature '{}'",
                        object.name, armature
                    )));
                }
            }
            self.check_parent_bone(object)?;
            self.hierarchy_depth(&object.name)?;
        }

        Ok(())
    }

    fn check_parent_bone(&self, object: &SourceObject) -> Result<()> {
        let Some(bone) = object.parent_bone.as_deref() else {
            return Ok(());
        };
        let armature = object
            .parent
            .as_deref()
            .and_then(|p| self.object(p))
            .and_then(|p| self.armature_of(p));

        match armature {
            Some(armature) if armature.find_bone(bone).is_some() => Ok(()),
            _ => Err(Error::invalid_reference(format!(
                "object '{}' is parented to unknown bone '{}'",
                object.name, bone
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::armature::SourceBone;
    use crate::mesh::{SourceFace, SourceVertex};
    use crate::object::ObjectData;
    use wiexport_core::Vec3;

    fn make_scene() -> SourceScene {
        let mut scene = SourceScene::new("Scene");

        let mut mesh = SourceMesh::new("CubeMesh");
        mesh.vertices = vec![
            SourceVertex::new(Vec3::ZERO),
            SourceVertex::new(Vec3::X),
            SourceVertex::new(Vec3::Y),
        ];
        mesh.faces = vec![SourceFace::from_indices(&[0, 1, 2])];
        scene.meshes.push(mesh);

        let mut armature = SourceArmature::new("RigData");
        armature.add_bone(SourceBone::new("hand"));
        scene.armatures.push(armature);

        scene.objects.push(SourceObject::new(
            "Rig",
            ObjectData::Armature { armature: "RigData".into() },
        ));
        let mut cube = SourceObject::new("Cube", ObjectData::Mesh { mesh: "CubeMesh".into() });
        cube.parent = Some("Rig".into());
        cube.parent_bone = Some("hand".into());
        scene.objects.push(cube);

        scene
    }

    #[test]
    fn test_valid_scene() {
        let scene = make_scene();
        assert!(scene.validate().is_ok());
        assert_eq!(scene.hierarchy_depth("Cube").unwrap(), 1);
        assert_eq!(scene.armature_objects().count(), 1);
    }

    #[test]
    fn test_unknown_parent_bone() {
        let mut scene = make_scene();
        scene.objects[1].parent_bone = Some("foot".into());
        assert!(matches!(scene.validate(), Err(Error::InvalidReference { .. })));
    }

    #[test]
    fn test_vertex_out_of_range() {
        let mut scene = make_scene();
        scene.meshes[0].faces.push(SourceFace::from_indices(&[0, 1, 9]));
        let err = scene.validate().unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_object_parent_loop() {
        let mut scene = make_scene();
        scene.objects[0].parent = Some("Cube".into());
        scene.objects[1].parent_bone = None;
        assert!(scene.hierarchy_depth("Cube").is_err());
    }

    #[test]
    fn test_frame_defaults() {
        let scene: SourceScene = serde_json::from_str(r#"{"name": "Empty"}"#).unwrap();
        assert_eq!(scene.frame_start, 1);
        assert_eq!(scene.frame_end, 250);
        assert!(scene.world.is_none());
    }
}
