/// Core domain types for documents, references, and the findings produced about them.
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A markdown document loaded from the content tree.
/// Mutated only by the migration pass; the validator treats it as read-only.
#[derive(Debug, Clone)]
pub struct Document {
    /// Full UTF-8 text of the file.
    pub content: String,
    /// Path relative to the content root.
    pub path: PathBuf,
}

impl Document {
    /// Read `relative` under `content_root` as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns a `FileFailure` of kind `Decode` when the bytes are not UTF-8,
    /// or `Filesystem` when the file cannot be read at all.
    pub fn load(content_root: &Path, relative: &Path) -> Result<Self, FileFailure> {
        let bytes = std::fs::read(content_root.join(relative))
            .map_err(|e| return FileFailure::filesystem(relative, &e))?;
        let content = String::from_utf8(bytes).map_err(|e| {
            return FileFailure {
                document_path: relative.to_path_buf(),
                kind: FailureKind::Decode,
                message: e.utf8_error().to_string(),
            };
        })?;
        return Ok(Self { content, path: relative.to_path_buf() });
    }
}

/// Directory depth of a content-root-relative document path.
/// A document directly under the root has depth 0.
pub fn depth_of(relative: &Path) -> usize {
    return relative.parent().map_or(0, |dir| return dir.components().count());
}

/// Which per-file problem stopped a document from being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The file is not valid UTF-8.
    Decode,
    /// Read, write, or permission failure.
    Filesystem,
}

/// A document that could not be read, decoded, or written.
/// Recorded in the run's report; never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FileFailure {
    /// Document that failed, relative to the content root.
    pub document_path: PathBuf,
    /// Failure category.
    pub kind: FailureKind,
    /// Underlying error text.
    pub message: String,
}

impl FileFailure {
    /// Wrap an I/O error raised while touching `relative`.
    pub fn filesystem(relative: &Path, error: &std::io::Error) -> Self {
        return Self {
            document_path: relative.to_path_buf(),
            kind: FailureKind::Filesystem,
            message: error.to_string(),
        };
    }
}

/// Why a reference failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueReason {
    /// The target points outside the content root and cannot be resolved.
    BrokenLink,
    /// The target's document exists but has no heading or id matching its `#fragment`.
    MissingAnchor,
    /// The target resolves to a path that does not exist.
    MissingFile,
}

impl IssueReason {
    /// Short label used in text reports.
    pub const fn label(self) -> &'static str {
        return match self {
            Self::BrokenLink => "broken link",
            Self::MissingAnchor => "missing anchor",
            Self::MissingFile => "missing file",
        };
    }
}

/// One embedded resource or hyperlink target found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Alt text or link text; empty for HTML tags.
    pub display_text: String,
    /// Image or link.
    pub kind: ReferenceKind,
    /// One-based line number of the reference in the source document.
    pub line: u32,
    /// Document containing this reference, relative to the content root.
    pub source_document: PathBuf,
    /// Byte range of `target` within the document text.
    pub span: Range<usize>,
    /// Target exactly as written in the document.
    pub target: String,
}

/// Syntax family of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `![alt](target)` or `<img src="target">`.
    Image,
    /// `[text](target)` or `<a href="target">`.
    Link,
}

/// Output of the rewriter for a single reference. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    /// Whether `resolved_target` differs from `original_target`.
    pub changed: bool,
    /// Target as found in the document.
    pub original_target: String,
    /// Corrected target.
    pub resolved_target: String,
}

impl ResolutionResult {
    /// A result that leaves the target as it was.
    pub fn unchanged(target: &str) -> Self {
        return Self {
            changed: false,
            original_target: target.to_string(),
            resolved_target: target.to_string(),
        };
    }

    /// Build a result, deriving `changed` from the two strings.
    pub fn new(original: &str, resolved: String) -> Self {
        return Self {
            changed: original != resolved,
            original_target: original.to_string(),
            resolved_target: resolved,
        };
    }
}

/// A reference whose target could not be found on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ValidationIssue {
    /// Document containing the reference, relative to the content root.
    pub document_path: PathBuf,
    /// One-based line of the reference.
    pub line: u32,
    /// Why the reference failed.
    pub reason: IssueReason,
    /// Target as written in the document.
    pub reference_target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_counts_parent_segments() {
        assert_eq!(depth_of(Path::new("index.md")), 0);
        assert_eq!(depth_of(Path::new("en/index.md")), 1);
        assert_eq!(depth_of(Path::new("en/guide/setup.md")), 2);
    }

    #[test]
    fn load_reports_decode_failure_for_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.md"), [0xff_u8, 0xfe, 0x00]).unwrap();

        let err = Document::load(dir.path(), Path::new("bad.md")).unwrap_err();
        assert_eq!(err.kind, FailureKind::Decode);
        assert_eq!(err.document_path, PathBuf::from("bad.md"));
    }

    #[test]
    fn load_reports_filesystem_failure_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Document::load(dir.path(), Path::new("absent.md")).unwrap_err();
        assert_eq!(err.kind, FailureKind::Filesystem);
    }

    #[test]
    fn result_tracks_change() {
        assert!(!ResolutionResult::new("a.png", "a.png".to_string()).changed);
        assert!(ResolutionResult::new("a.png", "../a.png".to_string()).changed);
    }
}
