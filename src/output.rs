//! CLI output formatting for build and check runs.
//!
//! Each surface has a `format_*` function returning lines (pure, testable)
//! and a `print_*` wrapper that writes to stdout. Structured diagnostics
//! (warnings, per-failure details as they happen) go through `tracing`;
//! this module renders the end-of-run summary a human reads.
//!
//! ```text
//! Pages
//! 001 404.tera — rendered
//! 002 about.tera — rendered
//! 003 guides/rounding.tera — up to date
//!
//! 4 page renders, 1 up to date
//! Assets: 3 transformed, 0 cached
//! Artifacts: 1 written, root redirect written
//! ```

use crate::generate::{BuildReport, PageAction};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Render the end-of-build summary.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Pages".to_string());
    for (idx, outcome) in report.pages.iter().enumerate() {
        let status = match outcome.action {
            PageAction::Rendered => "rendered",
            PageAction::Skipped => "up to date",
            PageAction::Failed => "FAILED",
        };
        lines.push(format!(
            "{} {} — {}",
            format_index(idx + 1),
            outcome.page,
            status
        ));
    }

    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push("Failures".to_string());
        for failure in &report.failures {
            lines.push(format!(
                "    {} [{}]: {}",
                failure.page, failure.locale, failure.reason
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{} page renders, {} up to date",
        report.renders, report.pages_skipped
    ));
    lines.push(format!(
        "Assets: {} transformed, {} cached",
        report.assets_transformed, report.assets_skipped
    ));
    lines.push(format!(
        "Artifacts: {} written, root redirect {}",
        report.artifacts_written,
        if report.redirect_written {
            "written"
        } else {
            "kept"
        }
    ));

    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{line}");
    }
}

/// What the `check` command verified.
#[derive(Debug)]
pub struct CheckSummary {
    pub locales: Vec<String>,
    pub features: usize,
    pub pages: usize,
    pub has_layout: bool,
}

/// Render the check summary.
pub fn format_check_report(summary: &CheckSummary) -> Vec<String> {
    vec![
        format!("Locales: {}", summary.locales.join(", ")),
        format!("Features: {}", summary.features),
        format!("Pages: {}", summary.pages),
        format!(
            "Layout: {}",
            if summary.has_layout {
                "includes/layout.tera"
            } else {
                "none (pages render unwrapped)"
            }
        ),
    ]
}

pub fn print_check_report(summary: &CheckSummary) {
    for line in format_check_report(summary) {
        println!("{line}");
    }
}
