// wiexport-scene/src/evaluator.rs
//! Pose evaluator backed by a scene snapshot

use std::collections::HashMap;

use tracing::trace;
use wiexport_core::{Quat, Vec3};

use crate::action::{Action, ChannelKind, CurveGroup};
use crate::object::euler_xyz_to_quat;
use crate::scene::SourceScene;
use crate::traits::{BonePose, EvalError, PoseEvaluator};

/// Largest frame magnitude the authoring tool accepts
pub const MAX_FRAME: i32 = 1_048_574;

/// Evaluates bound actions' curves at the playback cursor
#[derive(Debug)]
pub struct SnapshotEvaluator<'a> {
    scene: &'a SourceScene,
    frame: i32,
    /// Armature object name to bound action
    bound: HashMap<String, &'a Action>,
}

impl<'a> SnapshotEvaluator<'a> {
    /// Start at the scene's first frame with no actions bound
    pub fn new(scene: &'a SourceScene) -> Self {
        Self {
            scene,
            frame: scene.frame_start,
            bound: HashMap::new(),
        }
    }

    /// Action currently linked to an armature
    pub fn bound_action(&self, armature: &str) -> Option<&str> {
        self.bound.get(armature).map(|a| a.name.as_str())
    }

    fn check_armature(&self, armature: &str) -> Result<(), EvalError> {
        match self.scene.object(armature) {
            Some(object) if object.armature_name().is_some() => Ok(()),
            _ => Err(EvalError::UnknownArmature(armature.to_string())),
        }
    }
}

impl PoseEvaluator for SnapshotEvaluator<'_> {
    fn bind_action(&mut self, armature: &str, action: &str) -> Result<(), EvalError> {
        self.check_armature(armature)?;
        let found = self
            .scene
            .actions
            .iter()
            .find(|a| a.name == action)
            .ok_or_else(|| EvalError::UnknownAction(action.to_string()))?;
        self.bound.insert(armature.to_string(), found);
        Ok(())
    }

    fn clear_action(&mut self, armature: &str) -> Result<(), EvalError> {
        self.check_armature(armature)?;
        self.bound.remove(armature);
        Ok(())
    }

    fn set_frame(&mut self, frame: i32) -> Result<(), EvalError> {
        if !(-MAX_FRAME..=MAX_FRAME).contains(&frame) {
            return Err(EvalError::FrameOutOfRange { frame });
        }
        trace!(frame, "Cursor moved");
        self.frame = frame;
        Ok(())
    }

    fn current_frame(&self) -> i32 {
        self.frame
    }

    fn bone_pose(&self, armature: &str, bone: &str) -> Result<BonePose, EvalError> {
        self.check_armature(armature)?;
        let has_bone = self
            .scene
            .object(armature)
            .and_then(|o| self.scene.armature_of(o))
            .is_some_and(|a| a.find_bone(bone).is_some());
        if !has_bone {
            return Err(EvalError::UnknownBone {
                armature: armature.to_string(),
                bone: bone.to_string(),
            });
        }

        let group = self.bound.get(armature).and_then(|a| a.group(bone));
        Ok(match group {
            Some(group) => evaluate_group(group, self.frame as f32),
            None => BonePose::REST,
        })
    }
}

/// Pose of one curve group at a frame; unanimated components stay at rest
fn evaluate_group(group: &CurveGroup, frame: f32) -> BonePose {
    let mut quat = [1.0, 0.0, 0.0, 0.0];
    let mut euler: Option<[f32; 3]> = None;
    let mut location = [0.0; 3];
    let mut scale = [1.0; 3];

    for curve in &group.channels {
        let (Some(kind), Some(value)) = (curve.channel_kind(), curve.evaluate(frame)) else {
            continue;
        };
        let i = curve.array_index;
        match kind {
            ChannelKind::Rotation if curve.data_path.contains("euler") => {
                if let Some(slot) = euler.get_or_insert([0.0; 3]).get_mut(i) {
                    *slot = value;
                }
            }
            ChannelKind::Rotation => {
                if let Some(slot) = quat.get_mut(i) {
                    *slot = value;
                }
            }
            ChannelKind::Translation => {
                if let Some(slot) = location.get_mut(i) {
                    *slot = value;
                }
            }
            ChannelKind::Scale => {
                if let Some(slot) = scale.get_mut(i) {
                    *slot = value;
                }
            }
        }
    }

    let rotation = match euler {
        Some(angles) => euler_xyz_to_quat(angles),
        None => {
            let [w, x, y, z] = quat;
            let q = Quat::from_xyzw(x, y, z, w);
            if q.length_squared() > f32::EPSILON {
                q.normalize()
            } else {
                Quat::IDENTITY
            }
        }
    };

    BonePose {
        rotation,
        location: Vec3::from_array(location),
        scale: Vec3::from_array(scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::FCurve;
    use crate::armature::{SourceArmature, SourceBone};
    use crate::object::{ObjectData, SourceObject};

    fn make_scene() -> SourceScene {
        let mut scene = SourceScene::new("Scene");
        let mut armature = SourceArmature::new("RigData");
        armature.add_bone(SourceBone::new("spine"));
        armature.add_bone(SourceBone::new("tail"));
        scene.armatures.push(armature);
        scene.objects.push(SourceObject::new(
            "Rig",
            ObjectData::Armature { armature: "RigData".into() },
        ));
        scene.actions.push(
            crate::action::Action::new("RigWave").with_group(
                CurveGroup::new("spine")
                    .with_curve(FCurve::new("pose.bones[\"spine\"].location", 1).with_key(0.0, 0.0).with_key(10.0, 2.0))
                    .with_curve(FCurve::new("pose.bones[\"spine\"].scale", 0).with_key(0.0, 2.0)),
            ),
        );
        scene
    }

    #[test]
    fn test_pose_follows_cursor() {
        let scene = make_scene();
        let mut eval = SnapshotEvaluator::new(&scene);
        eval.bind_action("Rig", "RigWave").unwrap();

        eval.set_frame(5).unwrap();
        let pose = eval.bone_pose("Rig", "spine").unwrap();
        assert_eq!(pose.location, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(pose.scale, Vec3::new(2.0, 1.0, 1.0));
        assert_eq!(pose.rotation, Quat::IDENTITY);

        eval.set_frame(10).unwrap();
        assert_eq!(eval.bone_pose("Rig", "spine").unwrap().location.y, 2.0);
        assert_eq!(eval.current_frame(), 10);
    }

    #[test]
    fn test_unanimated_bone_is_at_rest() {
        let scene = make_scene();
        let mut eval = SnapshotEvaluator::new(&scene);
        eval.bind_action("Rig", "RigWave").unwrap();
        assert_eq!(eval.bone_pose("Rig", "tail").unwrap(), BonePose::REST);

        eval.clear_action("Rig").unwrap();
        assert!(eval.bound_action("Rig").is_none());
        assert_eq!(eval.bone_pose("Rig", "spine").unwrap(), BonePose::REST);
    }

    #[test]
    fn test_bad_lookups() {
        let scene = make_scene();
        let mut eval = SnapshotEvaluator::new(&scene);

        assert!(matches!(eval.bind_action("Nope", "RigWave"), Err(EvalError::UnknownArmature(_))));
        assert!(matches!(eval.bind_action("Rig", "Nope"), Err(EvalError::UnknownAction(_))));
        assert!(matches!(eval.bone_pose("Rig", "foot"), Err(EvalError::UnknownBone { .. })));
        assert!(matches!(
            eval.set_frame(MAX_FRAME + 1),
            Err(EvalError::FrameOutOfRange { .. })
        ));
        assert_eq!(eval.current_frame(), scene.frame_start);
    }
}
