// wiexport-scene/src/armature.rs
//! Armature and bone structures

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use wiexport_core::{Error, Mat4, Result, Vec3};

use crate::object::Properties;

/// Armature data: an ordered list of bones linked by parent name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceArmature {
    /// Armature data name
    pub name: String,
    /// All bones, in the tool's order
    #[serde(default)]
    pub bones: Vec<SourceBone>,
    #[serde(default)]
    pub properties: Properties,
}

impl SourceArmature {
    /// Create a new empty armature
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bones: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Add a bone and return its index
    pub fn add_bone(&mut self, bone: SourceBone) -> usize {
        self.bones.push(bone);
        self.bones.len() - 1
    }

    /// Get bone count
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Find bone by name
    pub fn find_bone(&self, name: &str) -> Option<&SourceBone> {
        self.bones.iter().find(|b| b.name == name)
    }

    /// Find bone index by name
    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Bone name to index mapping
    pub fn bone_map(&self) -> HashMap<&str, usize> {
        self.bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.as_str(), i))
            .collect()
    }

    /// Get children of a bone
    pub fn children(&self, bone_index: usize) -> Vec<usize> {
        let Some(name) = self.bones.get(bone_index).map(|b| b.name.as_str()) else {
            return Vec::new();
        };
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent.as_deref() == Some(name))
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of bones without a parent
    pub fn root_bones(&self) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Get bone chain from a bone up to its root.
    ///
    /// Fails with [`Error::CyclicHierarchy`] when the chain revisits a bone
    /// and with [`Error::InvalidReference`] when a parent name is unknown.
    pub fn bone_chain_to_root(&self, bone_index: usize) -> Result<Vec<usize>> {
        let map = self.bone_map();
        let mut chain = vec![bone_index];
        let mut seen = HashSet::from([bone_index]);
        let mut current = bone_index;

        while let Some(parent) = self.bones.get(current).and_then(|b| b.parent.as_deref()) {
            let parent_index = *map.get(parent).ok_or_else(|| {
                Error::invalid_reference(format!(
                    "bone '{}' in armature '{}' has unknown parent '{}'",
                    self.bones[current].name, self.name, parent
                ))
            })?;
            if !seen.insert(parent_index) {
                return Err(Error::CyclicHierarchy {
                    armature: self.name.clone(),
                    bone: self.bones[bone_index].name.clone(),
                });
            }
            chain.push(parent_index);
            current = parent_index;
        }

        Ok(chain)
    }

    /// Validate skeleton structure: unique names, known parents, no cycles
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for bone in &self.bones {
            if !names.insert(bone.name.as_str()) {
                return Err(Error::invalid_data(format!(
                    "duplicate bone '{}' in armature '{}'",
                    bone.name, self.name
                )));
            }
        }

        for index in 0..self.bones.len() {
            self.bone_chain_to_root(index)?;
        }
        Ok(())
    }

    /// Rest matrix of a bone's parent in armature space, identity for roots
    pub fn parent_rest(&self, bone: &SourceBone) -> Mat4 {
        bone.parent
            .as_deref()
            .and_then(|p| self.find_bone(p))
            .map(|p| p.matrix_local)
            .unwrap_or(Mat4::IDENTITY)
    }
}

/// One bone of an armature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBone {
    /// Bone name, unique within the armature
    pub name: String,
    /// Parent bone name (None for root bones)
    #[serde(default)]
    pub parent: Option<String>,
    /// Rest matrix in armature space (column-major)
    #[serde(default = "identity")]
    pub matrix_local: Mat4,
    #[serde(default)]
    pub head: Vec3,
    #[serde(default = "default_tail")]
    pub tail: Vec3,
    /// Head is attached to the parent's tail
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub properties: Properties,
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

fn default_tail() -> Vec3 {
    Vec3::Y
}

impl SourceBone {
    /// Create a root bone at the armature origin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            matrix_local: Mat4::IDENTITY,
            head: Vec3::ZERO,
            tail: Vec3::Y,
            connected: false,
            properties: Properties::new(),
        }
    }

    /// Set the parent bone
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the armature-space rest matrix
    pub fn with_matrix(mut self, matrix_local: Mat4) -> Self {
        self.matrix_local = matrix_local;
        self
    }

    /// Check if this is a root bone
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Distance from head to tail
    pub fn length(&self) -> f32 {
        (self.tail - self.head).length()
    }

    fn flag(&self, key: &str) -> bool {
        self.properties.get(key).is_some_and(|p| p.is_truthy())
    }

    /// Simulated by the engine's bone physics
    pub fn is_physics(&self) -> bool {
        self.flag("physicsbone")
    }

    pub fn is_cloth(&self) -> bool {
        self.flag("cloth")
    }

    pub fn is_ragdoll(&self) -> bool {
        self.flag("ragdoll")
    }

    /// Names of bones linked to this one by a spring constraint
    pub fn spring_partners(&self) -> Vec<String> {
        self.properties
            .get("spring")
            .and_then(|p| p.as_string_list())
            .unwrap_or_default()
    }
}
