//! Compiler diagnostics parsing
//!
//! Turns raw combined build output into ordered [`CompileError`] records.
//! Parsers are pluggable by [`Dialect`]; lines that do not match a dialect
//! produce no record and are never an error.
//!
//! ```text
//! stdout + "\n" + stderr → DiagnosticParser → Vec<CompileError>
//! ```

pub mod gcc;
pub mod rustc;
pub mod types;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use gcc::GccErrorParser;
pub use rustc::RustcErrorParser;
pub use types::{CompileError, DiagnosticSummary, Severity};

/// Diagnostic line formats understood by the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `file:line:col: severity: message` (gcc, clang)
    #[default]
    Gcc,
    /// `error[E0000]: message` + ` --> file:line:col`
    Rustc,
}

impl Dialect {
    /// Construct the parser for this dialect
    pub fn parser(&self) -> Box<dyn DiagnosticParser> {
        match self {
            Dialect::Gcc => Box::new(GccErrorParser::new()),
            Dialect::Rustc => Box::new(RustcErrorParser::new()),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Gcc => write!(f, "gcc"),
            Dialect::Rustc => write!(f, "rustc"),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcc" | "clang" => Ok(Dialect::Gcc),
            "rustc" | "cargo" => Ok(Dialect::Rustc),
            other => Err(format!("unknown diagnostic dialect: {other}")),
        }
    }
}

/// Extracts diagnostics from raw compiler text
pub trait DiagnosticParser: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Parse `text`, resolving relative file paths against `base_dir`.
    /// Never fails: unmatched or malformed lines are skipped.
    fn parse(&self, text: &str, base_dir: &Path) -> Vec<CompileError>;
}

/// Resolve a diagnostic path against the build's base directory.
///
/// Windows absolute forms (`C:\x`, `\\server\x`) count as absolute on every
/// host so transcripts from other platforms are not mangled.
pub fn resolve_source_path(file: &str, base_dir: &Path) -> String {
    if is_absolute_path(file) || base_dir.as_os_str().is_empty() {
        return file.to_string();
    }
    base_dir.join(file).to_string_lossy().into_owned()
}

fn is_absolute_path(file: &str) -> bool {
    if Path::new(file).is_absolute() || file.starts_with("\\\\") {
        return true;
    }
    let bytes = file.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("gcc".parse::<Dialect>(), Ok(Dialect::Gcc));
        assert_eq!("Clang".parse::<Dialect>(), Ok(Dialect::Gcc));
        assert_eq!("rustc".parse::<Dialect>(), Ok(Dialect::Rustc));
        assert!("msvc".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_dialect_parser() {
        assert_eq!(Dialect::Rustc.parser().dialect(), Dialect::Rustc);
        assert_eq!(Dialect::default().parser().dialect(), Dialect::Gcc);
    }

    #[test]
    fn test_resolve_source_path() {
        assert_eq!(resolve_source_path("/abs/x.c", Path::new("/base")), "/abs/x.c");
        assert_eq!(resolve_source_path("D:/x.c", Path::new("/base")), "D:/x.c");
        assert_eq!(resolve_source_path("x.c", Path::new("")), "x.c");
        assert_eq!(
            Path::new(&resolve_source_path("sub/x.c", Path::new("/base"))),
            Path::new("/base/sub/x.c")
        );
    }
}
