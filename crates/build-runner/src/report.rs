//! Terminal rendering of finished builds

use std::fmt::Write;

use build_session::{DiagnosticSummary, OutputKind};

use crate::runner::BuildReport;

/// Human summary: the diagnostics in gcc form, then a status line
pub fn render_summary(report: &BuildReport) -> String {
    let result = &report.result;
    let mut out = String::new();

    for error in &result.errors {
        let _ = writeln!(out, "{}", error.format_location());
    }
    if result.errors.is_empty() && !report.succeeded {
        // Nothing parseable; show the raw error text instead
        let stderr = result.text_of(OutputKind::Error);
        if !stderr.trim().is_empty() {
            out.push_str(&stderr);
            if !stderr.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    let status = if report.succeeded { "succeeded" } else { "failed" };
    let _ = write!(
        out,
        "build {} {} for {}: {}",
        report.build_id,
        status,
        result.target_file,
        DiagnosticSummary::of(&result.errors)
    );
    if let Some(code) = report.exit_code {
        let _ = write!(out, " (exit code {code})");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use build_session::{BuildOutput, BuildResult, CompileError, Severity};

    fn report(succeeded: bool, errors: Vec<CompileError>, stderr: &str) -> BuildReport {
        BuildReport {
            build_id: 4,
            succeeded,
            exit_code: Some(if succeeded { 0 } else { 1 }),
            result: BuildResult {
                target_file: "~/src/x.cpp".to_string(),
                outputs: vec![BuildOutput::normal(""), BuildOutput::error(stderr)],
                errors,
            },
        }
    }

    #[test]
    fn test_failed_summary_lists_diagnostics() {
        let error = CompileError {
            source_file: "/src/x.cpp".to_string(),
            line: 3,
            column: 1,
            severity: Severity::Error,
            message: "bad".to_string(),
        };
        let text = render_summary(&report(false, vec![error], "x.cpp:3:1: error: bad\n"));

        assert_eq!(
            text,
            "/src/x.cpp:3:1: error: bad\n\
             build 4 failed for ~/src/x.cpp: 1 error(s), 0 warning(s), 0 note(s) (exit code 1)"
        );
    }

    #[test]
    fn test_unparsed_failure_shows_stderr() {
        let text = render_summary(&report(false, vec![], "ld: cannot find -lfoo"));
        assert!(text.starts_with("ld: cannot find -lfoo\n"));
    }

    #[test]
    fn test_success_summary() {
        let text = render_summary(&report(true, vec![], ""));
        assert!(text.starts_with("build 4 succeeded"));
    }
}
