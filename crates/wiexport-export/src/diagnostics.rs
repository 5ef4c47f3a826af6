//! Soft, per-item export problems
//!
//! A diagnostic never aborts an export. Each one is logged through `tracing`
//! when recorded and returned to the caller in the export report.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

/// One recorded problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Item the problem belongs to, e.g. `action 'Walk' bone 'spine'`
    pub scope: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.scope, self.message)
    }
}

/// Diagnostics accumulated over one export pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        let (scope, message) = (scope.into(), message.into());
        warn!(scope = %scope, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            scope,
            message,
        });
    }

    pub fn info(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        let (scope, message) = (scope.into(), message.into());
        info!(scope = %scope, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Info,
            scope,
            message,
        });
    }

    /// Move every entry of `other` into this list
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_and_filter() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("action 'Walk'", "bone 'tail' has no curves");
        diagnostics.info("mesh 'Cube'", "generated missing normals");

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.warnings().count(), 1);
        assert_eq!(
            diagnostics.iter().next().unwrap().to_string(),
            "action 'Walk' bone 'tail' has no curves"
        );
    }
}
