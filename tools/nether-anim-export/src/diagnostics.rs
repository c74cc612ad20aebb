//! Recoverable import issues
//!
//! Every entry is also emitted as a `tracing` warning when recorded, so
//! callers that only watch logs lose nothing.

use std::fmt;

/// Category of a recorded issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Present but odd data, recovered locally
    DataQuality,
    /// Something requested does not exist
    MissingSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            DiagnosticKind::DataQuality => "data",
            DiagnosticKind::MissingSource => "missing",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Issues collected during one import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_quality(&mut self, message: impl Into<String>) {
        self.push(DiagnosticKind::DataQuality, message.into());
    }

    pub fn missing_source(&mut self, message: impl Into<String>) {
        self.push(DiagnosticKind::MissingSource, message.into());
    }

    fn push(&mut self, kind: DiagnosticKind, message: String) {
        tracing::warn!("{message}");
        self.entries.push(Diagnostic { kind, message });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry's message contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        diagnostics.data_quality("renormalized 2 rotation keys");
        diagnostics.missing_source("clip 'Jump' not found");

        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::DataQuality, DiagnosticKind::MissingSource]
        );
        assert!(diagnostics.mentions("Jump"));
        assert_eq!(
            diagnostics.iter().next().unwrap().to_string(),
            "[data] renormalized 2 rotation keys"
        );
    }
}
