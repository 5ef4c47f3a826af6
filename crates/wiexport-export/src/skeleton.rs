//! Bone hierarchy flattening
//!
//! Bones are emitted depth-first from each root, so a bone's parent is always
//! written before the bone itself.

use serde::Serialize;
use tracing::debug;
use wiexport_core::{Quat, Result, Vec3};
use wiexport_scene::{SourceArmature, SourceBone, SourceObject};

use crate::convert::Transform;

/// One bone with its parent-relative rest pose in engine space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatBone {
    pub name: String,
    pub parent: Option<String>,
    /// Position of the parent in the flattened order
    pub parent_index: Option<usize>,
    #[serde(skip)]
    pub rest: Transform,
    pub length: f32,
    pub connected: bool,
    pub physics: bool,
    pub cloth: bool,
    pub ragdoll: bool,
    pub springs: Vec<String>,
}

impl FlatBone {
    pub fn rest_rotation(&self) -> Quat {
        self.rest.rotation
    }

    pub fn rest_translation(&self) -> Vec3 {
        self.rest.translation
    }
}

/// A flattened armature object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatSkeleton {
    /// Armature object name
    pub name: String,
    /// Armature data name
    pub data_name: String,
    #[serde(skip)]
    pub transform: Transform,
    pub bones: Vec<FlatBone>,
}

impl FlatSkeleton {
    pub fn find_bone(&self, name: &str) -> Option<&FlatBone> {
        self.bones.iter().find(|b| b.name == name)
    }
}

/// Parent-relative rest transform: `parent_rest⁻¹ · bone_rest`, decomposed
/// in source space and then converted.
pub fn local_rest_transform(armature: &SourceArmature, bone: &SourceBone) -> Transform {
    let parent_rest = armature.parent_rest(bone);
    let local = parent_rest.inverse() * bone.matrix_local;
    Transform::from_source_matrix(&local)
}

/// Flatten an armature object's bones.
///
/// Fails on a cyclic or dangling parent chain before anything is built.
pub fn flatten_skeleton(object: &SourceObject, armature: &SourceArmature) -> Result<FlatSkeleton> {
    armature.validate()?;

    let mut order = Vec::with_capacity(armature.bones.len());
    let mut stack: Vec<usize> = armature.root_bones().into_iter().rev().collect();
    while let Some(index) = stack.pop() {
        order.push(index);
        stack.extend(armature.children(index).into_iter().rev());
    }

    let mut bones: Vec<FlatBone> = Vec::with_capacity(order.len());
    for index in order {
        let bone = &armature.bones[index];
        let parent_index = bone
            .parent
            .as_deref()
            .and_then(|p| bones.iter().position(|b| b.name == p));
        bones.push(FlatBone {
            name: bone.name.clone(),
            parent: bone.parent.clone(),
            parent_index,
            rest: local_rest_transform(armature, bone),
            length: bone.length(),
            connected: bone.connected,
            physics: bone.is_physics(),
            cloth: bone.is_cloth(),
            ragdoll: bone.is_ragdoll(),
            springs: bone.spring_partners(),
        });
    }

    debug!(armature = %object.name, bones = bones.len(), "Skeleton flattened");
    Ok(FlatSkeleton {
        name: object.name.clone(),
        data_name: armature.name.clone(),
        transform: Transform::from_source(&object.transform),
        bones,
    })
}
