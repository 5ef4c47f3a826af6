// wiexport-scene/src/traits.rs
//! Core traits at the two seams between the exporter and the authoring tool.
//!
//! - [`SceneParser`] produces an owned [`SourceScene`] snapshot
//! - [`PoseEvaluator`] is the tool's single playback cursor, used to sample
//!   evaluated bone poses one frame at a time

use std::io::Read;
use std::path::Path;

use thiserror::Error;
use wiexport_core::{Quat, Vec3};

use crate::scene::SourceScene;

/// Errors that can occur while reading a scene snapshot
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported snapshot format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Object '{object}' is nested {depth} levels deep (limit {limit})")]
    TooDeep {
        object: String,
        depth: usize,
        limit: u32,
    },

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<ParseError> for wiexport_core::Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Io(e) => wiexport_core::Error::Io(e),
            ParseError::UnsupportedFormat(format) => wiexport_core::Error::UnsupportedFormat { format },
            ParseError::Nested { context, source } => {
                wiexport_core::Error::from(*source).with_context(context)
            }
            other => wiexport_core::Error::invalid_data(other.to_string()),
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Configuration options for parsing
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Run the structural scene checks right after parsing
    pub strict_validation: bool,
    /// Maximum object parent depth
    pub max_nesting_depth: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_validation: false,
            max_nesting_depth: 32,
        }
    }
}

/// Trait for scene snapshot readers
pub trait SceneParser: Send + Sync {
    /// Returns the file extensions this parser handles (e.g., ["json"])
    fn extensions(&self) -> &[&str];

    /// Returns a human-readable name for this parser
    fn name(&self) -> &str;

    /// Parse from a reader with default options
    fn parse<R: Read>(&self, reader: R) -> ParseResult<SourceScene> {
        self.parse_with_options(reader, &ParseOptions::default())
    }

    /// Parse from a reader with custom options
    fn parse_with_options<R: Read>(
        &self,
        reader: R,
        options: &ParseOptions,
    ) -> ParseResult<SourceScene>;

    /// Parse from a file path
    fn parse_file(&self, path: &Path) -> ParseResult<SourceScene> {
        self.parse_file_with_options(path, &ParseOptions::default())
    }

    /// Parse from a file path with options
    fn parse_file_with_options(
        &self,
        path: &Path,
        options: &ParseOptions,
    ) -> ParseResult<SourceScene> {
        let context = || path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| ParseError::from(e).with_context(context()))?;
        let reader = std::io::BufReader::new(file);
        self.parse_with_options(reader, options)
            .map_err(|e| e.with_context(context()))
    }

    /// Check if this parser can handle the given file
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions().iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }
}

/// Errors reported by a pose evaluator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Frame {frame} is outside the evaluable range")]
    FrameOutOfRange { frame: i32 },

    #[error("Unknown armature object: {0}")]
    UnknownArmature(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Armature '{armature}' has no pose bone '{bone}'")]
    UnknownBone { armature: String, bone: String },
}

impl From<EvalError> for wiexport_core::Error {
    fn from(err: EvalError) -> Self {
        wiexport_core::Error::External(err.to_string())
    }
}

/// Evaluated local pose of one bone, in source space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub rotation: Quat,
    pub location: Vec3,
    pub scale: Vec3,
}

impl BonePose {
    /// The rest pose: no rotation, no offset, unit scale
    pub const REST: Self = Self {
        rotation: Quat::IDENTITY,
        location: Vec3::ZERO,
        scale: Vec3::ONE,
    };
}

impl Default for BonePose {
    fn default() -> Self {
        Self::REST
    }
}

/// The authoring tool's evaluation context.
///
/// There is one playback cursor. A pose read is only valid for the frame
/// most recently passed to [`PoseEvaluator::set_frame`], so callers must not
/// interleave reads for different frames.
pub trait PoseEvaluator {
    /// Link an action to an armature object, resetting its pose to rest
    fn bind_action(&mut self, armature: &str, action: &str) -> Result<(), EvalError>;

    /// Unlink whatever action the armature has
    fn clear_action(&mut self, armature: &str) -> Result<(), EvalError>;

    /// Move the playback cursor
    fn set_frame(&mut self, frame: i32) -> Result<(), EvalError>;

    /// Frame the cursor currently points at
    fn current_frame(&self) -> i32;

    /// Local pose of a bone at the current frame
    fn bone_pose(&self, armature: &str, bone: &str) -> Result<BonePose, EvalError>;
}
