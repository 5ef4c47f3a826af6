// wiexport-scene/src/action.rs
//! Actions: per-bone groups of animation curves

use serde::{Deserialize, Serialize};

/// Transform component an animation curve drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Rotation,
    Translation,
    Scale,
}

impl ChannelKind {
    /// Every channel, in record order
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Rotation,
        ChannelKind::Translation,
        ChannelKind::Scale,
    ];

    /// Classify a curve data path by substring, `None` for other properties
    pub fn from_data_path(path: &str) -> Option<Self> {
        if path.contains("rotation") {
            Some(ChannelKind::Rotation)
        } else if path.contains("location") {
            Some(ChannelKind::Translation)
        } else if path.contains("scale") {
            Some(ChannelKind::Scale)
        } else {
            None
        }
    }

    /// Record letter of the legacy text format
    pub fn letter(&self) -> char {
        match self {
            ChannelKind::Rotation => 'r',
            ChannelKind::Translation => 't',
            ChannelKind::Scale => 's',
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelKind::Rotation => "rotation",
            ChannelKind::Translation => "translation",
            ChannelKind::Scale => "scale",
        };
        f.write_str(name)
    }
}

/// Keyframe interpolation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Constant,
    /// Bezier keys are evaluated linearly
    #[default]
    #[serde(alias = "bezier")]
    Linear,
}

/// One authored key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Key time in (possibly fractional) frames
    pub frame: f32,
    pub value: f32,
}

impl Keyframe {
    pub fn new(frame: f32, value: f32) -> Self {
        Self { frame, value }
    }
}

/// An animation curve driving one component of one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FCurve {
    /// Property path, e.g. `pose.bones["spine"].rotation_quaternion`
    pub data_path: String,
    /// Component of the property (w, x, y, z for quaternions)
    #[serde(default)]
    pub array_index: usize,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl FCurve {
    pub fn new(data_path: impl Into<String>, array_index: usize) -> Self {
        Self {
            data_path: data_path.into(),
            array_index,
            keyframes: Vec::new(),
            interpolation: Interpolation::Linear,
        }
    }

    /// Append a key
    pub fn with_key(mut self, frame: f32, value: f32) -> Self {
        self.keyframes.push(Keyframe::new(frame, value));
        self
    }

    pub fn channel_kind(&self) -> Option<ChannelKind> {
        ChannelKind::from_data_path(&self.data_path)
    }

    /// Earliest and latest key time
    pub fn key_range(&self) -> Option<(f32, f32)> {
        self.keyframes.iter().fold(None, |range, key| match range {
            None => Some((key.frame, key.frame)),
            Some((lo, hi)) => Some((lo.min(key.frame), hi.max(key.frame))),
        })
    }

    /// Value at `frame`, clamped to the first and last key
    pub fn evaluate(&self, frame: f32) -> Option<f32> {
        let mut keys: Vec<&Keyframe> = self.keyframes.iter().collect();
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));

        let first = *keys.first()?;
        let last = *keys.last()?;
        if frame <= first.frame {
            return Some(first.value);
        }
        if frame >= last.frame {
            return Some(last.value);
        }

        let next = keys.iter().position(|k| k.frame > frame)?;
        let (a, b) = (keys[next - 1], keys[next]);
        match self.interpolation {
            Interpolation::Constant => Some(a.value),
            Interpolation::Linear => {
                let span = b.frame - a.frame;
                if span <= f32::EPSILON {
                    return Some(b.value);
                }
                let t = (frame - a.frame) / span;
                Some(a.value + (b.value - a.value) * t)
            }
        }
    }
}

/// Curves of one action that drive one bone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGroup {
    /// Bone name
    pub name: String,
    #[serde(default)]
    pub channels: Vec<FCurve>,
}

impl CurveGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
        }
    }

    pub fn with_curve(mut self, curve: FCurve) -> Self {
        self.channels.push(curve);
        self
    }

    /// Curves driving one channel kind
    pub fn curves_for(&self, kind: ChannelKind) -> impl Iterator<Item = &FCurve> {
        self.channels
            .iter()
            .filter(move |c| c.channel_kind() == Some(kind))
    }
}

/// A named animation clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    /// Armature object this action was authored for
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub groups: Vec<CurveGroup>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: CurveGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Curve group of a bone
    pub fn group(&self, bone: &str) -> Option<&CurveGroup> {
        self.groups.iter().find(|g| g.name == bone)
    }

    /// All curves of the action
    pub fn curves(&self) -> impl Iterator<Item = &FCurve> {
        self.groups.iter().flat_map(|g| g.channels.iter())
    }

    pub fn has_curves(&self) -> bool {
        self.curves().next().is_some()
    }

    /// Earliest and latest key time across every curve
    pub fn key_range(&self) -> Option<(f32, f32)> {
        self.curves()
            .filter_map(FCurve::key_range)
            .reduce(|(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }

    /// Whether the action animates an armature object carrying `armature_data`.
    ///
    /// An explicit target names the object. Untargeted actions match when
    /// their name contains the armature data name.
    pub fn belongs_to(&self, armature_object: &str, armature_data: &str) -> bool {
        match &self.target {
            Some(target) => target == armature_object,
            None => self.name.contains(armature_data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kind_from_data_path() {
        assert_eq!(
            ChannelKind::from_data_path(r#"pose.bones["a"].rotation_quaternion"#),
            Some(ChannelKind::Rotation)
        );
        assert_eq!(
            ChannelKind::from_data_path(r#"pose.bones["a"].location"#),
            Some(ChannelKind::Translation)
        );
        assert_eq!(
            ChannelKind::from_data_path(r#"pose.bones["a"].scale"#),
            Some(ChannelKind::Scale)
        );
        assert_eq!(ChannelKind::from_data_path("influence"), None);
    }

    #[test]
    fn test_evaluate_linear_and_clamped() {
        let curve = FCurve::new("location", 0).with_key(10.0, 1.0).with_key(0.0, 0.0);

        assert_eq!(curve.evaluate(-5.0), Some(0.0));
        assert_eq!(curve.evaluate(5.0), Some(0.5));
        assert_eq!(curve.evaluate(20.0), Some(1.0));
        assert_eq!(FCurve::new("location", 0).evaluate(1.0), None);
    }

    #[test]
    fn test_evaluate_constant() {
        let mut curve = FCurve::new("scale", 1).with_key(0.0, 1.0).with_key(4.0, 2.0);
        curve.interpolation = Interpolation::Constant;
        assert_eq!(curve.evaluate(3.9), Some(1.0));
        assert_eq!(curve.evaluate(4.0), Some(2.0));
    }

    #[test]
    fn test_action_key_range() {
        let action = Action::new("Walk")
            .with_group(
                CurveGroup::new("spine")
                    .with_curve(FCurve::new("rotation_quaternion", 0).with_key(0.0, 1.0).with_key(10.0, 1.0)),
            )
            .with_group(CurveGroup::new("arm").with_curve(FCurve::new("location", 0).with_key(5.0, 0.0)));

        assert_eq!(action.key_range(), Some((0.0, 10.0)));
        assert!(action.has_curves());
        assert!(Action::new("Empty").key_range().is_none());
    }

    #[test]
    fn test_belongs_to() {
        let mut action = Action::new("RigDataWalk");
        assert!(action.belongs_to("Armature", "RigData"));
        assert!(!action.belongs_to("Armature", "Other"));
        assert!(!Action::new("ArmatureWalk").belongs_to("Armature", "RigData"));

        action.target = Some("Other".into());
        assert!(action.belongs_to("Other", "OtherData"));
        assert!(!action.belongs_to("Armature", "RigData"));
    }
}
