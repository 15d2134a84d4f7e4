//! Existence checks for reference targets. Read-only: nothing here writes to disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::report::ValidationReport;
use crate::resolver::{Classification, Layout, Located, classify, locate};
use crate::scanner::{ReferenceSource, documents};
use crate::types::{Document, IssueReason, Reference, ReferenceKind, ValidationIssue};

/// Extensions tried for a link target written without one (clean URLs).
const CLEAN_URL_SUFFIXES: [&str; 3] = [".md", ".mdx", "/index.md"];

/// Filesystem paths that would satisfy the reference.
fn candidates(reference: &Reference, layout: &Layout, segments: &[String]) -> Vec<PathBuf> {
    let relative: PathBuf = segments.iter().collect();
    let mut bases = vec![layout.content_root.join(&relative)];
    if classify(&reference.target) == Classification::Absolute
        && let Some(public) = &layout.public_dir
    {
        bases.push(public.join(&relative));
    }

    let clean_url = reference.kind == ReferenceKind::Link
        && segments.last().is_some_and(|name| return Path::new(name).extension().is_none());
    if !clean_url {
        return bases;
    }
    let mut all = Vec::with_capacity(bases.len().saturating_mul(CLEAN_URL_SUFFIXES.len().saturating_add(1)));
    for base in bases {
        for suffix in CLEAN_URL_SUFFIXES {
            let mut with_suffix = base.clone().into_os_string();
            with_suffix.push(suffix);
            all.push(PathBuf::from(with_suffix));
        }
        all.push(base);
    }
    return all;
}

/// Check every reference of one loaded document, accumulating into `report`.
fn check_document(
    document: &Document,
    config: &Config,
    layout: &Layout,
    source: &impl ReferenceSource,
    report: &mut ValidationReport,
    anchors: &mut HashMap<PathBuf, HashSet<String>>,
) {
    for reference in source.references(document) {
        report.total = report.total.saturating_add(1);
        let found = check_reference(&reference, layout).or_else(|| {
            if !config.check_anchors {
                return None;
            }
            return check_fragment(&reference, config, layout, source, anchors);
        });
        match found {
            None => report.valid = report.valid.saturating_add(1),
            Some(issue) => {
                report.broken = report.broken.saturating_add(1);
                report.issues.push(issue);
            },
        }
    }
}

/// Check the `#fragment` of a link whose target exists.
///
/// Only fragments on links into another document are checked; anchor-only
/// targets and non-document targets pass. `anchors` caches each target
/// document's anchors for the rest of the run.
fn check_fragment(
    reference: &Reference,
    config: &Config,
    layout: &Layout,
    source: &impl ReferenceSource,
    anchors: &mut HashMap<PathBuf, HashSet<String>>,
) -> Option<ValidationIssue> {
    if reference.kind != ReferenceKind::Link {
        return None;
    }
    let (_, fragment) = reference.target.split_once('#')?;
    if fragment.is_empty() {
        return None;
    }
    let Located::Inside(segments) = locate(&reference.target, &reference.source_document) else {
        return None;
    };
    let target = existing_target(reference, layout, &segments)?;
    if !target.is_file() || !config.is_document(&target) {
        return None;
    }

    if !anchors.contains_key(&target) {
        // Unreadable targets are reported when they are scanned themselves.
        let content = std::fs::read_to_string(&target).ok()?;
        let defined = source.anchors(&Document { content, path: target.clone() });
        anchors.insert(target.clone(), defined);
    }
    let defined = anchors.get(&target)?;
    if defined.contains(fragment) || defined.contains(&fragment.to_lowercase()) {
        return None;
    }
    return Some(issue(reference, IssueReason::MissingAnchor));
}

/// Check one reference against the filesystem.
///
/// External and anchor-only targets are always valid. Absolute targets are
/// looked up under the content root and then the public directory; relative
/// targets under the document's directory. Returns at most one issue.
pub fn check_reference(reference: &Reference, layout: &Layout) -> Option<ValidationIssue> {
    let reason = match locate(&reference.target, &reference.source_document) {
        Located::NotLocal => return None,
        Located::Outside => IssueReason::BrokenLink,
        Located::Inside(segments) => {
            if existing_target(reference, layout, &segments).is_some() {
                return None;
            }
            IssueReason::MissingFile
        },
    };
    return Some(issue(reference, reason));
}

/// Check every reference in every document under the content root.
///
/// Never stops at the first problem: unreadable documents are recorded and
/// skipped, and every reference of every readable document is checked.
/// With `check_anchors` set, fragments on links to other documents are
/// checked too.
pub fn check_tree(config: &Config, layout: &Layout, source: &impl ReferenceSource) -> ValidationReport {
    let set = documents(config);
    let mut report = ValidationReport { failures: set.failures, ..ValidationReport::default() };
    let mut anchors = HashMap::new();

    for path in &set.paths {
        let document = match Document::load(&layout.content_root, path) {
            Ok(d) => d,
            Err(failure) => {
                tracing::warn!(path = %path.display(), "skipping document: {}", failure.message);
                report.failures.push(failure);
                continue;
            },
        };
        report.documents = report.documents.saturating_add(1);
        check_document(&document, config, layout, source, &mut report, &mut anchors);
    }

    report.finish();
    return report;
}

/// First candidate path that exists on disk.
fn existing_target(reference: &Reference, layout: &Layout, segments: &[String]) -> Option<PathBuf> {
    return candidates(reference, layout, segments).into_iter().find(|p| return p.exists());
}

/// Build the issue for `reference`, logging it at debug level.
fn issue(reference: &Reference, reason: IssueReason) -> ValidationIssue {
    tracing::debug!(
        document = %reference.source_document.display(),
        target = %reference.target,
        text = %reference.display_text,
        reason = reason.label(),
        "unresolved reference"
    );
    return ValidationIssue {
        document_path: reference.source_document.clone(),
        line: reference.line,
        reason,
        reference_target: reference.target.clone(),
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;
    use crate::scanner::Extractor;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    fn setup() -> (tempfile::TempDir, Config, Layout) {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(docs.join("assets")).unwrap();
        let mut config = Config::default();
        config.content_root = docs.clone();
        config.asset_root = docs.join("assets");
        let layout = Layout::new(&config).unwrap();
        return (dir, config, layout);
    }

    fn reference(doc: &str, target: &str) -> Reference {
        return Reference {
            display_text: String::new(),
            kind: ReferenceKind::Link,
            line: 1,
            source_document: PathBuf::from(doc),
            span: 0..0,
            target: target.to_string(),
        };
    }

    #[test]
    fn missing_relative_link_is_reported() {
        let (_dir, _config, layout) = setup();
        let issue = check_reference(&reference("en/guide/setup.md", "../index.md"), &layout).unwrap();
        assert_eq!(issue.reason, IssueReason::MissingFile);
        assert_eq!(issue.reference_target, "../index.md");
        assert_eq!(issue.document_path, PathBuf::from("en/guide/setup.md"));
    }

    #[test]
    fn existing_relative_link_is_valid() {
        let (_dir, _config, layout) = setup();
        touch(&layout.content_root.join("en/index.md"));
        assert!(check_reference(&reference("en/guide/setup.md", "../index.md#intro"), &layout).is_none());
    }

    #[test]
    fn external_and_anchor_are_never_checked() {
        let (_dir, _config, layout) = setup();
        assert!(check_reference(&reference("a.md", "https://example.com/a.png"), &layout).is_none());
        assert!(check_reference(&reference("a.md", "#top"), &layout).is_none());
    }

    #[test]
    fn escaping_the_root_is_a_broken_link() {
        let (_dir, _config, layout) = setup();
        let issue = check_reference(&reference("a.md", "../secret.md"), &layout).unwrap();
        assert_eq!(issue.reason, IssueReason::BrokenLink);
    }

    #[test]
    fn absolute_target_falls_back_to_public_dir() {
        let (dir, _config, mut layout) = setup();
        let public = dir.path().join("docs/public");
        touch(&public.join("images/logo.png"));
        assert!(check_reference(&reference("en/a.md", "/images/logo.png"), &layout).is_some());

        layout.public_dir = Some(public);
        assert!(check_reference(&reference("en/a.md", "/images/logo.png"), &layout).is_none());
    }

    #[test]
    fn clean_urls_match_markdown_files() {
        let (_dir, _config, layout) = setup();
        touch(&layout.content_root.join("en/guide/setup.md"));
        touch(&layout.content_root.join("en/plugins/index.md"));
        assert!(check_reference(&reference("en/a.md", "/en/guide/setup"), &layout).is_none());
        assert!(check_reference(&reference("en/a.md", "plugins/"), &layout).is_none());
        assert!(check_reference(&reference("en/a.md", "plugins"), &layout).is_none());

        let mut image = reference("en/a.md", "/en/guide/setup");
        image.kind = ReferenceKind::Image;
        assert!(check_reference(&image, &layout).is_some());
    }

    #[test]
    fn tree_check_counts_every_broken_reference() {
        let (_dir, config, layout) = setup();
        let root = &layout.content_root;
        std::fs::write(root.join("index.md"), "[en](en/a.md) ![gone](gone.png)\n").unwrap();
        touch(&root.join("en/a.md"));
        std::fs::write(root.join("en/a.md"), "[home](../index.md)\n[x](x.md) [y](y.md)\n").unwrap();
        std::fs::write(root.join("en/bad.md"), [0xc3_u8, 0x28]).unwrap();

        let report = check_tree(&config, &layout, &Extractor::new());

        assert_eq!(report.documents, 2);
        assert_eq!(report.total, 5);
        assert_eq!(report.valid, 2);
        assert_eq!(report.broken, 3);
        assert_eq!(report.issues.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].document_path, PathBuf::from("en/bad.md"));
        let targets: Vec<&str> = report.issues.iter().map(|i| i.reference_target.as_str()).collect();
        assert_eq!(targets, vec!["x.md", "y.md", "gone.png"]);
    }

    #[test]
    fn fragments_are_checked_only_when_enabled() {
        let (_dir, mut config, layout) = setup();
        let root = &layout.content_root;
        std::fs::create_dir_all(root.join("en")).unwrap();
        std::fs::write(root.join("en/setup.md"), "# Setup\n\n## Install Steps\n").unwrap();
        std::fs::write(
            root.join("index.md"),
            "[a](en/setup.md#install-steps) [b](en/setup.md#missing) [c](#local) [d](en/setup#setup)\n",
        )
        .unwrap();

        let report = check_tree(&config, &layout, &Extractor::new());
        assert_eq!(report.broken, 0);

        config.check_anchors = true;
        let report = check_tree(&config, &layout, &Extractor::new());
        assert_eq!(report.total, 4);
        assert_eq!(report.broken, 1);
        assert_eq!(report.issues[0].reason, IssueReason::MissingAnchor);
        assert_eq!(report.issues[0].reference_target, "en/setup.md#missing");
    }

    #[test]
    fn fragments_on_non_documents_pass() {
        let (_dir, mut config, layout) = setup();
        config.check_anchors = true;
        let root = &layout.content_root;
        touch(&root.join("assets/guide.pdf"));
        std::fs::write(root.join("index.md"), "[pdf](assets/guide.pdf#page=2)\n").unwrap();

        let report = check_tree(&config, &layout, &Extractor::new());
        assert_eq!(report.broken, 0);
    }

    #[test]
    fn tree_check_leaves_files_untouched() {
        let (_dir, config, layout) = setup();
        let path = layout.content_root.join("page.md");
        std::fs::write(&path, "![a](/images/a.png) [b](./b.md)\n").unwrap();
        let before_bytes = std::fs::read(&path).unwrap();
        let before_mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

        check_tree(&config, &layout, &Extractor::new());

        assert_eq!(std::fs::read(&path).unwrap(), before_bytes);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), before_mtime);
    }
}
