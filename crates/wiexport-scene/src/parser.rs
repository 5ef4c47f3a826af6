// wiexport-scene/src/parser.rs
//! JSON / YAML scene snapshot parser

use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::logging::instrument_parse;
use crate::scene::SourceScene;
use crate::traits::{ParseError, ParseOptions, ParseResult, SceneParser};

/// Serialization format of a snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
}

impl SnapshotFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> ParseResult<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "yaml" | "yml" => Ok(SnapshotFormat::Yaml),
            other => Err(ParseError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Reads a [`SourceScene`] dumped by the authoring tool
#[derive(Debug, Clone)]
pub struct SnapshotParser {
    format: SnapshotFormat,
}

impl SnapshotParser {
    pub fn new(format: SnapshotFormat) -> Self {
        Self { format }
    }

    /// Parser matching a file's extension
    pub fn for_path(path: &Path) -> ParseResult<Self> {
        SnapshotFormat::from_path(path).map(Self::new)
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Parse snapshot text directly
    pub fn parse_str(&self, text: &str, options: &ParseOptions) -> ParseResult<SourceScene> {
        let scene: SourceScene = match self.format {
            SnapshotFormat::Json => serde_json::from_str(text)?,
            SnapshotFormat::Yaml => serde_yaml::from_str(text)?,
        };
        check_scene(&scene, options)?;
        Ok(scene)
    }
}

impl SceneParser for SnapshotParser {
    fn extensions(&self) -> &[&str] {
        match self.format {
            SnapshotFormat::Json => &["json"],
            SnapshotFormat::Yaml => &["yaml", "yml"],
        }
    }

    fn name(&self) -> &str {
        match self.format {
            SnapshotFormat::Json => "JSON Scene Snapshot Parser",
            SnapshotFormat::Yaml => "YAML Scene Snapshot Parser",
        }
    }

    fn parse_with_options<R: Read>(
        &self,
        mut reader: R,
        options: &ParseOptions,
    ) -> ParseResult<SourceScene> {
        instrument_parse(self.name(), || {
            let start = std::time::Instant::now();
            let mut text = String::new();
            reader.read_to_string(&mut text)?;

            let scene = self.parse_str(&text, options)?;
            crate::log_parse_complete!(self.name(), start.elapsed(), scene.objects.len());
            Ok(scene)
        })
    }
}

fn check_scene(scene: &SourceScene, options: &ParseOptions) -> ParseResult<()> {
    debug!(
        scene = %scene.name,
        objects = scene.objects.len(),
        meshes = scene.meshes.len(),
        armatures = scene.armatures.len(),
        actions = scene.actions.len(),
        "Snapshot loaded"
    );

    for object in &scene.objects {
        // broken parent links are reported by the structural validation below
        let Ok(depth) = scene.hierarchy_depth(&object.name) else {
            continue;
        };
        if depth > options.max_nesting_depth as usize {
            return Err(ParseError::TooDeep {
                object: object.name.clone(),
                depth,
                limit: options.max_nesting_depth,
            });
        }
    }

    if options.strict_validation {
        scene
            .validate()
            .map_err(|e| ParseError::InvalidStructure(e.to_string()))?;
    } else if let Err(e) = scene.validate() {
        warn!(scene = %scene.name, error = %e, "Snapshot has structural problems");
    }
    Ok(())
}
