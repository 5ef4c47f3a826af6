// wiexport-scene/src/object.rs
//! Scene objects: transform, parenting and the per-type payload

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wiexport_core::{Color, Mat4, Quat, Vec3};

/// A rotation as stored by the authoring tool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRotation {
    /// Quaternion in (w, x, y, z) order
    Quaternion([f32; 4]),
    /// XYZ Euler angles in radians
    Euler([f32; 3]),
}

impl SourceRotation {
    /// The rotation as a quaternion, still in source space.
    pub fn to_quat(&self) -> Quat {
        match *self {
            SourceRotation::Quaternion([w, x, y, z]) => Quat::from_xyzw(x, y, z, w),
            SourceRotation::Euler(angles) => euler_xyz_to_quat(angles),
        }
    }
}

impl Default for SourceRotation {
    fn default() -> Self {
        SourceRotation::Quaternion([1.0, 0.0, 0.0, 0.0])
    }
}

/// XYZ Euler angles to a quaternion: X is applied first, then Y, then Z.
pub fn euler_xyz_to_quat(angles: [f32; 3]) -> Quat {
    let [x, y, z] = angles;
    Quat::from_rotation_z(z) * Quat::from_rotation_y(y) * Quat::from_rotation_x(x)
}

/// Local transform of an object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceTransform {
    pub location: Vec3,
    pub rotation: SourceRotation,
    pub scale: Vec3,
}

impl Default for SourceTransform {
    fn default() -> Self {
        Self {
            location: Vec3::ZERO,
            rotation: SourceRotation::default(),
            scale: Vec3::ONE,
        }
    }
}

/// Custom property value attached to objects, meshes, bones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Truthiness the way the authoring tool's scripting layer sees it
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::Bool(b) => *b,
            PropertyValue::Int(i) => *i != 0,
            PropertyValue::Float(f) => *f != 0.0,
            PropertyValue::String(s) => !s.is_empty(),
            PropertyValue::List(items) => !items.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f32_list(&self) -> Option<Vec<f32>> {
        match self {
            PropertyValue::List(items) => items
                .iter()
                .map(|item| match item {
                    PropertyValue::Int(i) => Some(*i as f32),
                    PropertyValue::Float(f) => Some(*f as f32),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            PropertyValue::List(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            PropertyValue::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Named custom properties
pub type Properties = BTreeMap<String, PropertyValue>;

/// Light types known to the authoring tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Sun,
    Point,
    Spot,
    Hemi,
    Area,
}

/// Lamp payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    #[serde(default)]
    pub color: Color,
    #[serde(default = "default_energy")]
    pub energy: f32,
    #[serde(default = "default_distance")]
    pub distance: f32,
    #[serde(default)]
    pub shadow: bool,
    /// Cone angle in radians, spot lights only
    #[serde(default = "default_spot_size")]
    pub spot_size: f32,
    /// Projected texture image names
    #[serde(default)]
    pub textures: Vec<String>,
}

fn default_energy() -> f32 {
    1.0
}

fn default_distance() -> f32 {
    25.0
}

fn default_spot_size() -> f32 {
    std::f32::consts::FRAC_PI_4
}

/// Camera payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default = "default_clip_start")]
    pub clip_start: f32,
    #[serde(default = "default_clip_end")]
    pub clip_end: f32,
}

fn default_fov() -> f32 {
    0.857
}

fn default_clip_start() -> f32 {
    0.1
}

fn default_clip_end() -> f32 {
    100.0
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: default_fov(),
            clip_start: default_clip_start(),
            clip_end: default_clip_end(),
        }
    }
}

/// Force field attached to an empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceField {
    pub kind: ForceFieldKind,
    #[serde(default = "default_energy")]
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceFieldKind {
    Wind,
    Vortex,
    Magnet,
    Other,
}

/// Empty payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {
    #[serde(default)]
    pub field: Option<ForceField>,
}

/// Typed payload of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectData {
    Mesh { mesh: String },
    Armature { armature: String },
    Light(Light),
    Camera(Camera),
    Empty(Empty),
}

impl ObjectData {
    /// Type tag as the authoring tool names it
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectData::Mesh { .. } => "MESH",
            ObjectData::Armature { .. } => "ARMATURE",
            ObjectData::Light(_) => "LAMP",
            ObjectData::Camera(_) => "CAMERA",
            ObjectData::Empty(_) => "EMPTY",
        }
    }
}

/// Soft-body simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftBody {
    #[serde(default = "default_energy")]
    pub mass: f32,
    #[serde(default = "default_friction")]
    pub friction: f32,
    #[serde(default)]
    pub goal_group: String,
    #[serde(default)]
    pub mass_group: String,
    #[serde(default)]
    pub spring_group: String,
}

fn default_friction() -> f32 {
    0.5
}

/// Rigid-body simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_shape")]
    pub collision_shape: String,
    #[serde(default = "default_energy")]
    pub mass: f32,
    #[serde(default = "default_friction")]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
    #[serde(default)]
    pub linear_damping: f32,
    #[serde(default = "default_body_type")]
    pub body_type: String,
    #[serde(default)]
    pub kinematic: bool,
}

fn default_true() -> bool {
    true
}

fn default_shape() -> String {
    "CONVEX_HULL".to_string()
}

fn default_body_type() -> String {
    "ACTIVE".to_string()
}

/// Particle system settings attached to a mesh object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParticleSettings {
    Emitter {
        #[serde(default = "default_true")]
        visible: bool,
        #[serde(default)]
        particle_size: f32,
        #[serde(default)]
        factor_random: f32,
        #[serde(default)]
        normal_factor: f32,
        #[serde(default)]
        count: u32,
        #[serde(default)]
        lifetime: f32,
        #[serde(default)]
        lifetime_random: f32,
        #[serde(default)]
        billboard_size: [f32; 2],
        #[serde(default)]
        tangent_phase: f32,
    },
    Hair {
        #[serde(default)]
        hair_length: f32,
        #[serde(default)]
        count: u32,
        #[serde(default)]
        density_group: String,
        #[serde(default)]
        length_group: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSystem {
    pub name: String,
    /// Name of the material slot the particles render with
    #[serde(default)]
    pub material: String,
    pub settings: ParticleSettings,
}

/// One object of the authoring-tool scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceObject {
    pub name: String,
    pub data: ObjectData,
    #[serde(default)]
    pub transform: SourceTransform,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub parent_bone: Option<String>,
    /// Correction applied at parenting time (column-major)
    #[serde(default = "identity")]
    pub parent_inverse: Mat4,
    #[serde(default)]
    pub properties: Properties,
    /// Vertex group names, indexed by `GroupWeight::group`
    #[serde(default)]
    pub vertex_groups: Vec<String>,
    #[serde(default)]
    pub soft_body: Option<SoftBody>,
    #[serde(default)]
    pub rigid_body: Option<RigidBody>,
    #[serde(default)]
    pub particle_systems: Vec<ParticleSystem>,
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

impl SourceObject {
    /// Create an object with a default transform
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            data,
            transform: SourceTransform::default(),
            parent: None,
            parent_bone: None,
            parent_inverse: Mat4::IDENTITY,
            properties: Properties::new(),
            vertex_groups: Vec::new(),
            soft_body: None,
            rigid_body: None,
            particle_systems: Vec::new(),
        }
    }

    /// Parented to an object, a bone, or both
    pub fn is_parented(&self) -> bool {
        self.parent.is_some() || self.parent_bone.is_some()
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Mesh data name, for mesh objects
    pub fn mesh_name(&self) -> Option<&str> {
        match &self.data {
            ObjectData::Mesh { mesh } => Some(mesh),
            _ => None,
        }
    }

    /// Armature data name, for armature objects
    pub fn armature_name(&self) -> Option<&str> {
        match &self.data {
            ObjectData::Armature { armature } => Some(armature),
            _ => None,
        }
    }
}
