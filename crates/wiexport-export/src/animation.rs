//! Sparse keyframe extraction
//!
//! Every bone channel only samples the frames that carry authored keys. Each
//! channel moves through [`ChannelState`]: keys are collected from every
//! matching curve, the set is clipped to the action's frame range, then each
//! retained frame is sampled right after moving the playback cursor to it.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, instrument};
use wiexport_core::{Quat, Vec3};
use wiexport_scene::{Action, BonePose, ChannelKind, PoseEvaluator};

use crate::convert::{convert_position, convert_rotation, convert_scale};
use crate::diagnostics::Diagnostics;
use crate::skeleton::FlatSkeleton;

/// Progress of one channel through extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelState {
    NoKeys,
    Collecting,
    FrameRangeResolved,
    Sampled,
}

/// Converted value of one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ChannelValue {
    Rotation(#[serde(skip)] Quat),
    Translation(#[serde(skip)] Vec3),
    Scale(#[serde(skip)] Vec3),
}

impl ChannelValue {
    fn from_pose(kind: ChannelKind, pose: &BonePose) -> Self {
        match kind {
            ChannelKind::Rotation => ChannelValue::Rotation(convert_rotation(pose.rotation)),
            ChannelKind::Translation => ChannelValue::Translation(convert_position(pose.location)),
            ChannelKind::Scale => ChannelValue::Scale(convert_scale(pose.scale)),
        }
    }

    /// Raw components: quaternions as (x, y, z, w), vectors as (x, y, z)
    pub fn components(&self) -> Vec<f32> {
        match self {
            ChannelValue::Rotation(q) => q.to_array().to_vec(),
            ChannelValue::Translation(v) | ChannelValue::Scale(v) => v.to_array().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub frame: i32,
    pub value: ChannelValue,
}

/// Keys and samples of one transform component of one bone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStream {
    pub kind: ChannelKind,
    pub state: ChannelState,
    /// Distinct key frames, ascending
    pub frames: BTreeSet<i32>,
    pub samples: Vec<Sample>,
}

impl ChannelStream {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            state: ChannelState::NoKeys,
            frames: BTreeSet::new(),
            samples: Vec::new(),
        }
    }

    /// Add a key time; the frame is its integer part
    pub fn collect(&mut self, key_time: f32) {
        self.frames.insert(key_time as i32);
        self.state = ChannelState::Collecting;
    }

    /// Drop frames outside `[start, end]`
    pub fn resolve(&mut self, start: f32, end: f32) {
        self.frames.retain(|&f| f as f32 >= start && f as f32 <= end);
        if self.state == ChannelState::Collecting {
            self.state = ChannelState::FrameRangeResolved;
        }
    }

    fn finish(&mut self) {
        if self.state == ChannelState::FrameRangeResolved {
            self.state = ChannelState::Sampled;
        }
    }
}

/// Channels of one bone, in rotation, translation, scale order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoneTrack {
    pub bone: String,
    /// The action has a curve group for this bone
    pub animated: bool,
    pub channels: Vec<ChannelStream>,
}

impl BoneTrack {
    fn new(bone: &str, animated: bool) -> Self {
        Self {
            bone: bone.to_string(),
            animated,
            channels: ChannelKind::ALL.into_iter().map(ChannelStream::new).collect(),
        }
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&ChannelStream> {
        self.channels.iter().find(|c| c.kind == kind)
    }
}

/// Sparse keyframe data of one action on one armature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedAction {
    pub name: String,
    pub armature: String,
    pub frame_start: f32,
    pub frame_end: f32,
    pub tracks: Vec<BoneTrack>,
}

impl ExtractedAction {
    /// Length of the action in whole frames
    pub fn duration(&self) -> i32 {
        (self.frame_end - self.frame_start) as i32
    }

    pub fn track(&self, bone: &str) -> Option<&BoneTrack> {
        self.tracks.iter().find(|t| t.bone == bone)
    }

    pub fn sample_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| t.channels.iter())
            .map(|c| c.samples.len())
            .sum()
    }
}

/// Frame range of an action: the latest key ends it, the earliest key or the
/// scene start (whichever comes first) starts it
pub fn resolve_frame_range(action: &Action, scene_frame_start: i32) -> Option<(f32, f32)> {
    let (lo, hi) = action.key_range()?;
    Some((lo.min(scene_frame_start as f32), hi))
}

/// Extract one action for a flattened skeleton.
///
/// Returns `None` when the action cannot be sampled at all. Missing bone
/// groups and failed frames are recorded in `diagnostics` and skipped.
#[instrument(skip_all, fields(action = %action.name, armature = %skeleton.name))]
pub fn extract_action<E: PoseEvaluator + ?Sized>(
    evaluator: &mut E,
    skeleton: &FlatSkeleton,
    action: &Action,
    scene_frame_start: i32,
    diagnostics: &mut Diagnostics,
) -> Option<ExtractedAction> {
    let scope = format!("action '{}'", action.name);

    if !action.has_curves() {
        diagnostics.info(&scope, "has no curves, skipped");
        return None;
    }
    let Some((frame_start, frame_end)) = resolve_frame_range(action, scene_frame_start) else {
        diagnostics.warn(&scope, "has curves but no keyframes, skipped");
        return None;
    };

    // unlink first so the pose resets to rest before the new action links
    if let Err(e) = evaluator
        .clear_action(&skeleton.name)
        .and_then(|_| evaluator.bind_action(&skeleton.name, &action.name))
    {
        diagnostics.warn(&scope, format!("cannot be bound: {}", e));
        return None;
    }

    let mut tracks = Vec::with_capacity(skeleton.bones.len());
    for bone in &skeleton.bones {
        let Some(group) = action.group(&bone.name) else {
            diagnostics.warn(&scope, format!("[bone {}] has not got any fcurves", bone.name));
            tracks.push(BoneTrack::new(&bone.name, false));
            continue;
        };

        let mut track = BoneTrack::new(&bone.name, true);
        for channel in &mut track.channels {
            for curve in group.curves_for(channel.kind) {
                for key in &curve.keyframes {
                    channel.collect(key.frame);
                }
            }
            channel.resolve(frame_start, frame_end);
        }

        for channel in &mut track.channels {
            let frames: Vec<i32> = channel.frames.iter().copied().collect();
            for frame in frames {
                if let Err(e) = evaluator.set_frame(frame) {
                    diagnostics.warn(&scope, format!("{} setting scene frame {} failed: {}", bone.name, frame, e));
                    continue;
                }
                match evaluator.bone_pose(&skeleton.name, &bone.name) {
                    Ok(pose) => channel.samples.push(Sample {
                        frame,
                        value: ChannelValue::from_pose(channel.kind, &pose),
                    }),
                    Err(e) => diagnostics.warn(
                        &scope,
                        format!("{} query for corresponding bone failed: {}", bone.name, e),
                    ),
                }
            }
            channel.finish();
        }
        tracks.push(track);
    }

    if let Err(e) = evaluator.clear_action(&skeleton.name) {
        diagnostics.warn(&scope, format!("cannot be unlinked: {}", e));
    }

    let extracted = ExtractedAction {
        name: action.name.clone(),
        armature: skeleton.name.clone(),
        frame_start,
        frame_end,
        tracks,
    };
    debug!(
        frame_start,
        frame_end,
        samples = extracted.sample_count(),
        "Action extracted"
    );
    Some(extracted)
}
