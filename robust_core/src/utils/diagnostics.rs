//! Sink collecting advisory messages raised while building and compiling models
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// A single advisory message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.level {
            DiagnosticLevel::Info => write!(f, "INFO: {}", self.message),
            DiagnosticLevel::Warning => write!(f, "WARNING: {}", self.message),
        }
    }
}

/// Collection of diagnostics owned by the caller of an operation
///
/// Entries are also forwarded to `tracing`, so an installed subscriber sees them as they happen.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(message = %message, "robust model advisory");
        self.entries.push(Diagnostic {
            level: DiagnosticLevel::Warning,
            message,
        });
    }

    /// Record an informational message
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(message = %message, "robust model info");
        self.entries.push(Diagnostic {
            level: DiagnosticLevel::Info,
            message,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Iterate over the recorded warnings only
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    /// Move all entries of another sink into this one
    pub fn absorb(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
