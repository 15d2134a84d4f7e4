//! Migration pass: rewrite reference targets in place across a document tree.

use crate::config::Config;
use crate::mapping::PathMapping;
use crate::report::{Change, MigrationReport};
use crate::resolver::{Layout, rewrite};
use crate::scanner::{ReferenceSource, documents};
use crate::types::{Document, FileFailure};

/// Rewrite the references of one document.
///
/// Returns the new content and one `Change` per rewritten target. The
/// document itself is not modified; unchanged references keep their exact bytes.
pub fn migrate_document(
    document: &Document,
    layout: &Layout,
    mapping: &PathMapping,
    source: &impl ReferenceSource,
) -> (String, Vec<Change>) {
    let mut changes = Vec::new();
    let mut output = String::with_capacity(document.content.len());
    let mut copied_up_to = 0_usize;

    for reference in source.references(document) {
        let result = rewrite(&reference, layout, mapping);
        if !result.changed {
            continue;
        }
        let Some(before) = document.content.get(copied_up_to..reference.span.start) else {
            continue;
        };
        tracing::debug!(
            document = %document.path.display(),
            line = reference.line,
            from = %result.original_target,
            to = %result.resolved_target,
            "rewrite"
        );
        output.push_str(before);
        output.push_str(&result.resolved_target);
        copied_up_to = reference.span.end;
        changes.push(Change {
            line: reference.line,
            original_target: result.original_target,
            resolved_target: result.resolved_target,
            source_document: document.path.clone(),
        });
    }

    output.push_str(document.content.get(copied_up_to..).unwrap_or_default());
    return (output, changes);
}

/// Rewrite every document under the content root.
///
/// Documents are written back only when their content changed and `dry_run`
/// is false. A document that cannot be read, decoded, or written is recorded
/// in the report and the batch carries on.
pub fn migrate_tree(
    config: &Config,
    layout: &Layout,
    mapping: &PathMapping,
    source: &impl ReferenceSource,
    dry_run: bool,
) -> MigrationReport {
    let set = documents(config);
    let mut report = MigrationReport {
        collisions: mapping.collisions().to_vec(),
        dry_run,
        failures: set.failures,
        ..MigrationReport::default()
    };

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

        let (content, changes) = migrate_document(&document, layout, mapping, source);
        if changes.is_empty() {
            continue;
        }
        if !dry_run && let Err(e) = std::fs::write(layout.content_root.join(path), &content) {
            tracing::warn!(path = %path.display(), "cannot write document: {e}");
            report.failures.push(FileFailure::filesystem(path, &e));
            continue;
        }
        tracing::info!(path = %path.display(), references = changes.len(), "updated references");
        report.files_changed = report.files_changed.saturating_add(1);
        report.changes.extend(changes);
    }

    report.finish();
    return report;
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::scanner::Extractor;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    fn setup() -> (tempfile::TempDir, Config, Layout, PathMapping) {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        touch(&docs.join("assets/images/logo.png"));
        touch(&docs.join("assets/gif/demo.gif"));
        let mut config = Config::default();
        config.content_root = docs.clone();
        config.asset_root = docs.join("assets");
        let layout = Layout::new(&config).unwrap();
        let mapping = PathMapping::build(&config.content_root, &config.asset_root).unwrap();
        return (dir, config, layout, mapping);
    }

    fn doc(path: &str, content: &str) -> Document {
        return Document { content: content.to_string(), path: PathBuf::from(path) };
    }

    #[test]
    fn rewrites_only_changed_targets_and_keeps_surroundings() {
        let (_dir, _config, layout, mapping) = setup();
        let document = doc(
            "en/guide/setup.md",
            "# Setup\n\n![logo](/images/logo.png \"Logo\")\nSee [site](https://example.com) and <img src=\"demo.gif\" width=\"300\">.\n",
        );

        let (content, changes) = migrate_document(&document, &layout, &mapping, &Extractor::new());

        assert_eq!(
            content,
            "# Setup\n\n![logo](../../assets/images/logo.png \"Logo\")\nSee [site](https://example.com) and <img src=\"../../assets/gif/demo.gif\" width=\"300\">.\n"
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].line, 3);
        assert_eq!(changes[1].original_target, "demo.gif");
    }

    #[test]
    fn migrating_twice_changes_nothing_the_second_time() {
        let (_dir, config, layout, mapping) = setup();
        let root = &layout.content_root;
        std::fs::create_dir_all(root.join("en/guide")).unwrap();
        std::fs::write(root.join("en/guide/setup.md"), "![a](/images/logo.png) [home](/en/index.md) ![b](missing.png)\n").unwrap();
        std::fs::write(root.join("index.md"), "![a](images/logo.png)\n").unwrap();

        let first = migrate_tree(&config, &layout, &mapping, &Extractor::new(), false);
        let after_first = std::fs::read_to_string(root.join("en/guide/setup.md")).unwrap();
        let second = migrate_tree(&config, &layout, &mapping, &Extractor::new(), false);

        assert_eq!(first.changes.len(), 4);
        assert_eq!(first.files_changed, 2);
        assert!(second.changes.is_empty());
        assert_eq!(second.files_changed, 0);
        assert_eq!(
            after_first,
            "![a](../../assets/images/logo.png) [home](../index.md) ![b](../../assets/images/missing.png)\n"
        );
        assert_eq!(std::fs::read_to_string(root.join("index.md")).unwrap(), "![a](assets/images/logo.png)\n");
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let (_dir, config, layout, mapping) = setup();
        let path = layout.content_root.join("page.md");
        std::fs::write(&path, "![a](/images/logo.png)\n").unwrap();

        let report = migrate_tree(&config, &layout, &mapping, &Extractor::new(), true);

        assert!(report.dry_run);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "![a](/images/logo.png)\n");
    }

    #[test]
    fn undecodable_document_does_not_stop_the_batch() {
        let (_dir, config, layout, mapping) = setup();
        let root = &layout.content_root;
        std::fs::write(root.join("a.md"), [0xff_u8, 0xfe]).unwrap();
        std::fs::write(root.join("b.md"), "![a](/images/logo.png)\n").unwrap();

        let report = migrate_tree(&config, &layout, &mapping, &Extractor::new(), false);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].document_path, PathBuf::from("a.md"));
        assert_eq!(report.files_changed, 1);
    }
}
