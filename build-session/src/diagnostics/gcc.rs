//! GCC/Clang diagnostic dialect
//!
//! Matches lines of the form `file:line[:col]: severity: message`.
//! Context lines (`In file included from ...`, source excerpts, carets)
//! are skipped.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::types::{CompileError, Severity};
use super::{resolve_source_path, DiagnosticParser, Dialect};

/// `file:line[:col]: severity: message`; the lazy file group lets Windows
/// drive letters (`C:\x.cpp`) through.
static GCC_LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>.+?):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<severity>fatal error|error|warning|note):\s*(?P<message>.*)$",
    )
    .unwrap()
});

/// Parser for gcc/clang style diagnostics
#[derive(Debug, Clone, Copy, Default)]
pub struct GccErrorParser;

impl GccErrorParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a single line; `None` when it is not a diagnostic
    pub fn parse_line(&self, line: &str, base_dir: &Path) -> Option<CompileError> {
        let caps = GCC_LINE_PATTERN.captures(line.trim_end_matches(['\r', '\n']))?;

        let line_no: u32 = caps.name("line")?.as_str().parse().ok()?;
        let column: u32 = match caps.name("col") {
            Some(col) => col.as_str().parse().ok()?,
            None => 1,
        };
        let severity = Severity::from_keyword(caps.name("severity")?.as_str())?;

        Some(CompileError {
            source_file: resolve_source_path(caps.name("file")?.as_str(), base_dir),
            line: line_no,
            column,
            severity,
            message: caps.name("message")?.as_str().trim_end().to_string(),
        })
    }
}

impl DiagnosticParser for GccErrorParser {
    fn dialect(&self) -> Dialect {
        Dialect::Gcc
    }

    fn parse(&self, text: &str, base_dir: &Path) -> Vec<CompileError> {
        text.lines()
            .filter_map(|line| self.parse_line(line, base_dir))
            .collect()
    }
}
