//! Report types for the migration and validation passes, and their text/JSON rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assets::CollectReport;
use crate::error::Error;
use crate::mapping::Collision;
use crate::types::{FileFailure, ValidationIssue};

/// A rewritten reference target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// One-based line of the reference.
    pub line: u32,
    /// Target before the rewrite.
    pub original_target: String,
    /// Target after the rewrite.
    pub resolved_target: String,
    /// Document containing the reference, relative to the content root.
    pub source_document: PathBuf,
}

impl Ord for Change {
    /// Compare by (document, line, original target) for deterministic ordering.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        return (&self.source_document, self.line, &self.original_target, &self.resolved_target).cmp(&(
            &other.source_document,
            other.line,
            &other.original_target,
            &other.resolved_target,
        ));
    }
}

impl PartialOrd for Change {
    /// Delegate to `Ord` implementation.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        return Some(self.cmp(other));
    }
}

/// Outcome of a migration pass.
#[derive(Debug, Default, Serialize)]
pub struct MigrationReport {
    /// Every changed reference, sorted by document, line, then target.
    pub changes: Vec<Change>,
    /// Filename collisions in the asset mapping.
    pub collisions: Vec<Collision>,
    /// Documents visited.
    pub documents: usize,
    /// Whether files were left untouched.
    pub dry_run: bool,
    /// Documents that could not be read, decoded, or written.
    pub failures: Vec<FileFailure>,
    /// Documents whose content changed.
    pub files_changed: usize,
}

/// Output encoding for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// Pretty-printed JSON.
    Json,
    /// Human-readable lines.
    #[default]
    Text,
}

/// Outcome of a validation pass.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    /// References that failed.
    pub broken: usize,
    /// Documents visited.
    pub documents: usize,
    /// Documents that could not be read or decoded.
    pub failures: Vec<FileFailure>,
    /// One entry per failed reference, sorted by document, line, then target.
    pub issues: Vec<ValidationIssue>,
    /// References checked.
    pub total: usize,
    /// References that resolved.
    pub valid: usize,
}

impl MigrationReport {
    /// Sort entries so identical runs render identically.
    pub fn finish(&mut self) {
        self.changes.sort();
        self.collisions.sort();
        self.failures.sort();
    }
}

impl ValidationReport {
    /// Sort entries so identical runs render identically.
    pub fn finish(&mut self) {
        self.issues.sort_by(|a, b| {
            return (&a.document_path, a.line, &a.reference_target, a.reason)
                .cmp(&(&b.document_path, b.line, &b.reference_target, b.reason));
        });
        self.failures.sort();
    }
}

/// Write `rendered` to `path`, or to stdout when no path is given.
///
/// # Errors
///
/// Returns `Error::Io` if the report file cannot be written.
pub fn emit(rendered: &str, path: Option<&Path>) -> Result<(), Error> {
    match path {
        None => print!("{rendered}"),
        Some(p) => {
            std::fs::write(p, rendered)?;
            tracing::info!(path = %p.display(), "wrote report");
        },
    }
    return Ok(());
}

/// Render the asset collection report.
///
/// # Errors
///
/// Returns `Error::Json` if JSON serialization fails.
pub fn render_collect(report: &CollectReport, format: ReportFormat) -> Result<String, Error> {
    if format == ReportFormat::Json {
        return to_json(report);
    }
    let mut out = String::new();
    for copied in &report.copied {
        let _ = writeln!(out, "COPIED   {} -> {}", copied.source.display(), copied.destination.display());
    }
    for skipped in &report.skipped {
        let _ = writeln!(out, "SKIPPED  {} (already present)", skipped.display());
    }
    render_failures(&mut out, &report.failures);
    let _ = writeln!(
        out,
        "{} copied, {} already present, {} failed",
        report.copied.len(),
        report.skipped.len(),
        report.failures.len()
    );
    return Ok(out);
}

/// Append one `ERROR` line per failure.
fn render_failures(out: &mut String, failures: &[FileFailure]) {
    for failure in failures {
        let kind = match failure.kind {
            crate::types::FailureKind::Decode => "not utf-8",
            crate::types::FailureKind::Filesystem => "filesystem",
        };
        let _ = writeln!(out, "ERROR    {} ({kind}: {})", failure.document_path.display(), failure.message);
    }
}

/// Render a migration report.
///
/// # Errors
///
/// Returns `Error::Json` if JSON serialization fails.
pub fn render_migration(report: &MigrationReport, format: ReportFormat) -> Result<String, Error> {
    if format == ReportFormat::Json {
        return to_json(report);
    }
    let mut out = String::new();
    for change in &report.changes {
        let _ = writeln!(
            out,
            "CHANGED  {}:{}  {} -> {}",
            change.source_document.display(),
            change.line,
            change.original_target,
            change.resolved_target
        );
    }
    for collision in &report.collisions {
        let _ = writeln!(
            out,
            "AMBIGUOUS {}  using {} (shadows {})",
            collision.filename, collision.kept, collision.shadowed
        );
    }
    render_failures(&mut out, &report.failures);

    let verb = if report.dry_run { "would change" } else { "changed" };
    let _ = writeln!(
        out,
        "{verb} {} references in {} of {} documents, {} failed",
        report.changes.len(),
        report.files_changed,
        report.documents,
        report.failures.len()
    );
    return Ok(out);
}

/// Render a validation report.
///
/// # Errors
///
/// Returns `Error::Json` if JSON serialization fails.
pub fn render_validation(report: &ValidationReport, format: ReportFormat) -> Result<String, Error> {
    if format == ReportFormat::Json {
        return to_json(report);
    }
    let mut out = String::new();
    for issue in &report.issues {
        let _ = writeln!(
            out,
            "BROKEN   {}:{}  {} ({})",
            issue.document_path.display(),
            issue.line,
            issue.reference_target,
            issue.reason.label()
        );
    }
    render_failures(&mut out, &report.failures);

    if report.broken == 0 && report.failures.is_empty() {
        let _ = writeln!(out, "All {} references valid in {} documents", report.total, report.documents);
    } else {
        let _ = writeln!(
            out,
            "{} checked, {} valid, {} broken, {} unreadable",
            report.total,
            report.valid,
            report.broken,
            report.failures.len()
        );
    }
    return Ok(out);
}

/// Pretty JSON with a trailing newline.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
fn to_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    return Ok(json);
}
