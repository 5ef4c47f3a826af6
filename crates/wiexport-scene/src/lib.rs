//! wiexport-scene
//!
//! The authoring-tool side of the export pipeline: an owned snapshot of one
//! scene, one-time object classification, and the playback-cursor trait the
//! animation extractor samples through.
//!
//! # Snapshot formats
//!
//! | Format | Extension | Parser |
//! |--------|-----------|--------|
//! | JSON   | `.json`   | [`SnapshotParser`] |
//! | YAML   | `.yaml`, `.yml` | [`SnapshotParser`] |
//!
//! # Example
//!
//! ```rust,ignore
//! use wiexport_scene::{SceneParser, SnapshotParser, SnapshotEvaluator};
//!
//! let parser = SnapshotParser::for_path(path)?;
//! let scene = parser.parse_file(path)?;
//! let evaluator = SnapshotEvaluator::new(&scene);
//!
//! println!("Found {} objects", scene.objects.len());
//! ```

pub mod action;
pub mod armature;
pub mod evaluator;
pub mod logging;
pub mod material;
pub mod mesh;
pub mod object;
pub mod parser;
pub mod role;
pub mod scene;
pub mod traits;

pub use action::{Action, ChannelKind, CurveGroup, FCurve, Interpolation, Keyframe};
pub use armature::{SourceArmature, SourceBone};
pub use evaluator::{SnapshotEvaluator, MAX_FRAME};
pub use material::{SourceMaterial, TextureSlot, TextureUsage};
pub use mesh::{GroupWeight, SourceCorner, SourceFace, SourceMesh, SourceVertex};
pub use object::{
    euler_xyz_to_quat, Camera, Empty, ForceField, ForceFieldKind, Light, LightKind, ObjectData,
    ParticleSettings, ParticleSystem, Properties, PropertyValue, RigidBody, SoftBody,
    SourceObject, SourceRotation, SourceTransform,
};
pub use parser::{SnapshotFormat, SnapshotParser};
pub use role::ObjectRole;
pub use scene::{Mist, SourceScene, World};
pub use traits::{
    BonePose, EvalError, ParseError, ParseOptions, ParseResult, PoseEvaluator, SceneParser,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
