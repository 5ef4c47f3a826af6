//! Unified error handling for wiexport
//!
//! This module provides the error type shared by the scene, export and CLI
//! crates. Per-item soft failures (a bone without curves, a frame that could
//! not be evaluated) are not errors; they are collected as diagnostics by the
//! exporter. Everything here aborts the unit or the whole export.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all wiexport operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ==================== Data Errors ====================

    /// Invalid data structure
    #[error("Invalid data: {message}")]
    InvalidData {
        message: String,
    },

    /// Unexpected end of a record while decoding
    #[error("Unexpected end of record at offset {offset}")]
    UnexpectedEof {
        offset: u64,
    },

    /// Unsupported record format version
    #[error("Unsupported version: {version} (supported: {supported})")]
    UnsupportedVersion {
        version: i32,
        supported: i32,
    },

    // ==================== Structural Scene Errors ====================

    /// A face corner carries a UV attribute that is not a (u, v) pair
    #[error("Malformed attribute in mesh '{mesh}', face {face}: expected 2 UV components, found {count}")]
    MalformedAttribute {
        mesh: String,
        face: usize,
        count: usize,
    },

    /// A bone parent chain loops back on itself
    #[error("Cyclic bone hierarchy in armature '{armature}' at bone '{bone}'")]
    CyclicHierarchy {
        armature: String,
        bone: String,
    },

    /// Faces of one material are not contiguous in the welder input
    #[error("Faces of material {material_index} are not contiguous (face {face})")]
    UngroupedMaterials {
        material_index: u32,
        face: usize,
    },

    /// Reference to an entity that does not exist
    #[error("Invalid reference: {reference}")]
    InvalidReference {
        reference: String,
    },

    // ==================== Archive Errors ====================

    /// Archive could not be opened or is already closed
    #[error("Archive is not open: {path}")]
    ArchiveNotOpen {
        path: String,
    },

    /// Unsupported input or output format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        format: String,
    },

    // ==================== Configuration Errors ====================

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    // ==================== General Errors ====================

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// External error (from other crates)
    #[error("{0}")]
    External(String),
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Create an invalid reference error
    pub fn invalid_reference(reference: impl Into<String>) -> Self {
        Error::InvalidReference {
            reference: reference.into(),
        }
    }

    /// Check if this error describes a broken scene structure.
    ///
    /// Structural errors abort the whole export before anything reaches the
    /// archive.
    pub fn is_structural(&self) -> bool {
        match self {
            Error::MalformedAttribute { .. }
            | Error::CyclicHierarchy { .. }
            | Error::UngroupedMaterials { .. }
            | Error::InvalidReference { .. }
            | Error::ArchiveNotOpen { .. } => true,
            Error::WithContext { source, .. } => source.is_structural(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::FileNotFound(PathBuf::from("/scene.json"));
        let message = err.with_context("while loading snapshot").to_string();

        assert!(message.starts_with("while loading snapshot: "));
        assert!(message.contains("/scene.json"));
    }

    #[test]
    fn test_is_structural() {
        let cyclic = Error::CyclicHierarchy {
            armature: "Rig".into(),
            bone: "spine".into(),
        };
        assert!(cyclic.is_structural());
        assert!(cyclic.with_context("flattening skeleton").is_structural());

        assert!(!Error::invalid_data("bad float").is_structural());
        assert!(!Error::FileNotFound(PathBuf::from("a.json")).is_structural());
    }

    #[test]
    fn test_malformed_attribute_message() {
        let err = Error::MalformedAttribute {
            mesh: "Cube".into(),
            face: 3,
            count: 3,
        };
        let message = err.to_string();
        assert!(message.contains("Cube"));
        assert!(message.contains("face 3"));
    }
}
