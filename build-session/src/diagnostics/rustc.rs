//! rustc human-readable diagnostic dialect
//!
//! A diagnostic is a header line (`error[E0308]: mismatched types`)
//! followed by a location line (`  --> src/main.rs:5:10`). Headers with no
//! location (`error: aborting due to ...`) produce no record.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::types::{CompileError, Severity};
use super::{resolve_source_path, DiagnosticParser, Dialect};

static HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<severity>error|warning|note|help)(?:\[(?P<code>[A-Za-z0-9]+)\])?:\s*(?P<message>.+)$")
        .unwrap()
});

static LOCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-->\s*(?P<file>.+?):(?P<line>\d+):(?P<col>\d+)\s*$").unwrap()
});

/// Parser for rustc/cargo human-readable diagnostics
#[derive(Debug, Clone, Copy, Default)]
pub struct RustcErrorParser;

impl RustcErrorParser {
    pub fn new() -> Self {
        Self
    }
}

struct PendingHeader {
    severity: Severity,
    message: String,
}

impl DiagnosticParser for RustcErrorParser {
    fn dialect(&self) -> Dialect {
        Dialect::Rustc
    }

    fn parse(&self, text: &str, base_dir: &Path) -> Vec<CompileError> {
        let mut errors = Vec::new();
        let mut pending: Option<PendingHeader> = None;

        for raw in text.lines() {
            let line = raw.trim_end_matches('\r');

            if let Some(caps) = HEADER_PATTERN.captures(line) {
                pending = Severity::from_keyword(&caps["severity"]).map(|severity| {
                    let message = match caps.name("code") {
                        Some(code) => format!("[{}] {}", code.as_str(), caps["message"].trim_end()),
                        None => caps["message"].trim_end().to_string(),
                    };
                    PendingHeader { severity, message }
                });
                continue;
            }

            let Some(caps) = LOCATION_PATTERN.captures(line) else {
                continue;
            };
            // Only the first location after a header is the primary span
            let Some(header) = pending.take() else {
                continue;
            };
            let (Ok(line_no), Ok(column)) = (caps["line"].parse(), caps["col"].parse()) else {
                continue;
            };
            errors.push(CompileError {
                source_file: resolve_source_path(&caps["file"], base_dir),
                line: line_no,
                column,
                severity: header.severity,
                message: header.message,
            });
        }

        errors
    }
}
