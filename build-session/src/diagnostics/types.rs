//! Diagnostic records extracted from compiler output

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic, from the dialect keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// `error` and `fatal error`
    Error,
    Warning,
    /// `note`, `help` and other informational follow-ups
    Note,
}

impl Severity {
    /// Map a dialect keyword to a severity
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "error" | "fatal error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "note" | "help" | "info" => Some(Self::Note),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Note => write!(f, "note"),
        }
    }
}

/// A single diagnostic located in a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileError {
    /// File path, resolved against the build's base directory
    pub source_file: String,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    pub severity: Severity,
    pub message: String,
}

impl CompileError {
    /// `file:line:col: severity: message`, the gcc rendering
    pub fn format_location(&self) -> String {
        format!(
            "{}:{}:{}: {}: {}",
            self.source_file, self.line, self.column, self.severity, self.message
        )
    }
}

/// Counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    pub errors: usize,
    pub warnings: usize,
    pub notes: usize,
}

impl DiagnosticSummary {
    pub fn of(diagnostics: &[CompileError]) -> Self {
        let mut summary = Self::default();
        for d in diagnostics {
            match d.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Note => summary.notes += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.notes
    }
}

impl std::fmt::Display for DiagnosticSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s), {} note(s)",
            self.errors, self.warnings, self.notes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_keywords() {
        assert_eq!(Severity::from_keyword("fatal error"), Some(Severity::Error));
        assert_eq!(Severity::from_keyword("Warning"), Some(Severity::Warning));
        assert_eq!(Severity::from_keyword("note"), Some(Severity::Note));
        assert_eq!(Severity::from_keyword("remark"), None);
    }

    #[test]
    fn test_summary() {
        let make = |severity| CompileError {
            source_file: "a.c".to_string(),
            line: 1,
            column: 1,
            severity,
            message: String::new(),
        };
        let summary = DiagnosticSummary::of(&[
            make(Severity::Error),
            make(Severity::Warning),
            make(Severity::Error),
        ]);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.to_string(), "2 error(s), 1 warning(s), 0 note(s)");
    }
}
