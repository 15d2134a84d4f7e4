//! Reference extraction: finds image and link targets in markdown text.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::{CaptureMatches, Captures, Regex};
use walkdir::WalkDir;

use crate::config::Config;
use crate::types::{Document, FileFailure, Reference, ReferenceKind};

/// Alternation of every recognized syntax. Order matters: the linked-image
/// form must win over a plain image, and a plain image over a plain link.
const REFERENCE_PATTERN: &str = concat!(
    r#"\[!\[(?P<badge_alt>[^\]]*)\]\((?P<badge_src>[^)\s]+)(?:\s+"[^"]*")?\)\]\((?P<badge_href>[^)\s]+)(?:\s+"[^"]*")?\)"#,
    r#"|!\[(?P<alt>[^\]]*)\]\((?P<src>[^)\s]+)(?:\s+"[^"]*")?\)"#,
    r#"|\[(?P<text>[^\[\]]*)\]\((?P<href>[^)\s]+)(?:\s+"[^"]*")?\)"#,
    r#"|<img\b[^>]*?\ssrc=["'](?P<img_src>[^"']+)["'][^>]*>"#,
    r#"|<a\b[^>]*?\shref=["'](?P<a_href>[^"']+)["'][^>]*>"#,
);

/// Fragment targets a document defines: ATX headings and HTML `id` attributes.
const ANCHOR_PATTERN: &str = r#"(?m)^ {0,3}#{1,6}[ \t]+(?P<heading>[^\n]*?)[ \t#]*$|\sid=["'](?P<id>[^"']+)["']"#;

/// Document paths found under a content root, plus entries the walk could not read.
#[derive(Debug, Default)]
pub struct DocumentSet {
    /// Directory entries that could not be visited.
    pub failures: Vec<FileFailure>,
    /// Document paths relative to the content root, in lexicographic order.
    pub paths: Vec<PathBuf>,
}

/// Pattern-based reference extractor. Best-effort: markup that does not
/// match one of the recognized forms is ignored, not rejected.
#[derive(Debug, Clone)]
pub struct Extractor {
    /// Compiled `ANCHOR_PATTERN`.
    anchor_pattern: Regex,
    /// Compiled `REFERENCE_PATTERN`.
    pattern: Regex,
}

/// Something that can enumerate the references in a document.
/// The migration and validation pipelines only depend on this trait.
pub trait ReferenceSource {
    /// Every `#fragment` that resolves inside `document`.
    fn anchors(&self, document: &Document) -> HashSet<String>;

    /// All references in `document`, first to last.
    fn references<'a>(&'a self, document: &'a Document) -> impl Iterator<Item = Reference> + 'a;
}

/// Lazy iterator over the references of one text, in textual order.
pub struct References<'a> {
    /// Underlying regex matches.
    captures: CaptureMatches<'a, 'a>,
    /// Byte ranges of fenced code blocks.
    fences: Vec<Range<usize>>,
    /// Line number at `line_cursor`.
    line: u32,
    /// Byte offset up to which newlines have been counted.
    line_cursor: usize,
    /// Second half of a linked image, yielded after the image itself.
    pending: Option<Reference>,
    /// Document the references belong to.
    source: &'a Path,
    /// Full text being scanned.
    text: &'a str,
}

impl Extractor {
    /// Anchors defined in `text`: a slug per heading (GitHub style, repeats
    /// numbered `-1`, `-2`, ...), a heading's explicit `{#id}` instead of its
    /// slug, and every HTML `id` attribute. Fenced code is skipped.
    pub fn anchor_ids(&self, text: &str) -> HashSet<String> {
        let fences = fenced_code_ranges(text);
        let mut anchors = HashSet::new();
        let mut repeats: HashMap<String, usize> = HashMap::new();

        for cap in self.anchor_pattern.captures_iter(text) {
            let start = cap.get(0).map_or(0, |m| return m.start());
            if fences.iter().any(|r| return r.contains(&start)) {
                continue;
            }
            if let Some(id) = cap.name("id") {
                anchors.insert(id.as_str().to_string());
                continue;
            }
            let Some(heading) = cap.name("heading").map(|m| return m.as_str()) else {
                continue;
            };
            if let Some((_, custom)) = heading.trim_end().strip_suffix('}').and_then(|h| return h.rsplit_once("{#")) {
                anchors.insert(custom.to_string());
                continue;
            }
            let slug = slugify(heading);
            let seen = repeats.entry(slug.clone()).or_insert(0);
            let numbered = if *seen == 0 { slug } else { format!("{slug}-{seen}") };
            *seen = seen.saturating_add(1);
            anchors.insert(numbered);
        }
        return anchors;
    }

    /// Compile the reference and anchor patterns.
    ///
    /// # Panics
    ///
    /// Panics if a hardcoded regex is invalid (compile-time invariant).
    pub fn new() -> Self {
        return Self {
            anchor_pattern: Regex::new(ANCHOR_PATTERN).expect("valid regex"),
            pattern: Regex::new(REFERENCE_PATTERN).expect("valid regex"),
        };
    }

    /// Scan `text` for references belonging to `source`.
    /// Each call starts a fresh scan from the beginning of the text.
    pub fn scan<'a>(&'a self, text: &'a str, source: &'a Path) -> References<'a> {
        return References {
            captures: self.pattern.captures_iter(text),
            fences: fenced_code_ranges(text),
            line: 1,
            line_cursor: 0,
            pending: None,
            source,
            text,
        };
    }
}

impl Default for Extractor {
    /// Same as `Extractor::new`.
    fn default() -> Self {
        return Self::new();
    }
}

impl ReferenceSource for Extractor {
    fn anchors(&self, document: &Document) -> HashSet<String> {
        return self.anchor_ids(&document.content);
    }

    fn references<'a>(&'a self, document: &'a Document) -> impl Iterator<Item = Reference> + 'a {
        return self.scan(&document.content, &document.path);
    }
}

impl References<'_> {
    /// Build the reference(s) for one regex match.
    /// Returns the primary reference and, for a linked image, the trailing link.
    fn build_from_captures(&mut self, cap: &Captures<'_>) -> Option<(Reference, Option<Reference>)> {
        if let (Some(src), Some(href)) = (cap.name("badge_src"), cap.name("badge_href")) {
            let alt = cap.name("badge_alt").map_or("", |m| return m.as_str());
            let image = self.make(ReferenceKind::Image, alt, src);
            let link = self.make(ReferenceKind::Link, "", href);
            return Some((image, Some(link)));
        }
        if let Some(src) = cap.name("src") {
            let alt = cap.name("alt").map_or("", |m| return m.as_str());
            return Some((self.make(ReferenceKind::Image, alt, src), None));
        }
        if let Some(href) = cap.name("href") {
            let text = cap.name("text").map_or("", |m| return m.as_str());
            return Some((self.make(ReferenceKind::Link, text, href), None));
        }
        if let Some(src) = cap.name("img_src") {
            return Some((self.make(ReferenceKind::Image, "", src), None));
        }
        if let Some(href) = cap.name("a_href") {
            return Some((self.make(ReferenceKind::Link, "", href), None));
        }
        return None;
    }

    /// Whether `offset` falls inside a fenced code block.
    fn in_fence(&self, offset: usize) -> bool {
        return self.fences.iter().any(|r| return r.contains(&offset));
    }

    /// One-based line number of `offset`. Offsets must be non-decreasing across calls.
    fn line_at(&mut self, offset: usize) -> u32 {
        let start = self.line_cursor.min(offset);
        let newlines = self.text.get(start..offset).map_or(0, |s| return s.matches('\n').count());
        self.line = self.line.saturating_add(u32::try_from(newlines).unwrap_or(u32::MAX));
        self.line_cursor = offset.max(self.line_cursor);
        return self.line;
    }

    /// Construct a reference whose target is the given match.
    fn make(&mut self, kind: ReferenceKind, display_text: &str, target: regex::Match<'_>) -> Reference {
        return Reference {
            display_text: display_text.to_string(),
            kind,
            line: self.line_at(target.start()),
            source_document: self.source.to_path_buf(),
            span: target.range(),
            target: target.as_str().to_string(),
        };
    }
}

impl Iterator for References<'_> {
    type Item = Reference;

    fn next(&mut self) -> Option<Reference> {
        if let Some(pending) = self.pending.take() {
            return Some(pending);
        }
        loop {
            let cap = self.captures.next()?;
            let start = cap.get(0).map_or(0, |m| return m.start());
            if self.in_fence(start) {
                continue;
            }
            if let Some((first, second)) = self.build_from_captures(&cap) {
                self.pending = second;
                return Some(first);
            }
        }
    }
}

/// Walk `config.content_root` and collect document paths in lexicographic order,
/// filtered by extension and the config's include/exclude prefixes.
pub fn documents(config: &Config) -> DocumentSet {
    let root = &config.content_root;
    let mut set = DocumentSet::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e.path().map_or_else(PathBuf::new, |p| return relative_to(root, p));
                tracing::warn!(path = %path.display(), "cannot read directory entry: {e}");
                set.failures.push(FileFailure::filesystem(&path, &std::io::Error::other(e.to_string())));
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_to(root, entry.path());
        if !config.is_document(&relative) {
            continue;
        }
        if !config.should_scan(&slash_path(&relative)) {
            continue;
        }
        set.paths.push(relative);
    }

    return set;
}

/// Byte ranges covered by ``` or ~~~ fenced code blocks, fences included.
/// An unterminated fence runs to the end of the text.
fn fenced_code_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<(usize, &str)> = None;
    let mut offset = 0_usize;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let marker = ["```", "~~~"].into_iter().find(|m| return trimmed.starts_with(m));
        match (open, marker) {
            (None, Some(m)) => open = Some((offset, m)),
            (Some((start, fence)), Some(m)) if m == fence => {
                ranges.push(start..offset.saturating_add(line.len()));
                open = None;
            },
            _ => {},
        }
        offset = offset.saturating_add(line.len());
    }
    if let Some((start, _)) = open {
        ranges.push(start..text.len());
    }
    return ranges;
}

/// `path` relative to `root`, or `path` itself when it is not under `root`.
fn relative_to(root: &Path, path: &Path) -> PathBuf {
    return path.strip_prefix(root).unwrap_or(path).to_path_buf();
}

/// Lowercased heading text with spaces as `-` and punctuation dropped.
fn slugify(heading: &str) -> String {
    let mut slug = String::with_capacity(heading.len());
    for c in heading.trim().chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() {
            slug.push('-');
        }
    }
    return slug;
}

/// Render a relative path with forward slashes regardless of platform.
pub fn slash_path(path: &Path) -> String {
    return path
        .components()
        .map(|c| return c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    fn scan_all(text: &str) -> Vec<Reference> {
        let extractor = Extractor::new();
        return extractor.scan(text, Path::new("en/guide.md")).collect();
    }

    #[test]
    fn finds_markdown_image_and_link_in_order() {
        let refs = scan_all("See [setup](./setup.md).\n\n![logo](/images/logo.png \"Logo\")\n");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, ReferenceKind::Link);
        assert_eq!(refs[0].display_text, "setup");
        assert_eq!(refs[0].target, "./setup.md");
        assert_eq!(refs[0].line, 1);
        assert_eq!(refs[1].kind, ReferenceKind::Image);
        assert_eq!(refs[1].target, "/images/logo.png");
        assert_eq!(refs[1].line, 3);
    }

    #[test]
    fn span_covers_exactly_the_target() {
        let text = "x ![a](img/a.png) y";
        let refs = scan_all(text);
        assert_eq!(&text[refs[0].span.clone()], "img/a.png");
    }

    #[test]
    fn finds_html_tags() {
        let refs = scan_all("<img width=\"40\" src='pic.gif'>\n<a class=\"x\" href=\"../faq.md\">FAQ</a>");
        assert_eq!(refs.len(), 2);
        assert_eq!((refs[0].kind, refs[0].target.as_str()), (ReferenceKind::Image, "pic.gif"));
        assert_eq!((refs[1].kind, refs[1].target.as_str()), (ReferenceKind::Link, "../faq.md"));
        assert_eq!(refs[1].line, 2);
    }

    #[test]
    fn data_attributes_are_not_targets() {
        let refs = scan_all("<img data-src=\"lazy.png\" src=\"real.png\">\n<a data-href=\"x.md\" href=\"y.md\">y</a>");
        let targets: Vec<&str> = refs.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["real.png", "y.md"]);
    }

    #[test]
    fn linked_image_yields_image_then_link() {
        let refs = scan_all("[![badge](shield.svg)](https://example.com)");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, ReferenceKind::Image);
        assert_eq!(refs[0].display_text, "badge");
        assert_eq!(refs[0].target, "shield.svg");
        assert_eq!(refs[1].kind, ReferenceKind::Link);
        assert_eq!(refs[1].target, "https://example.com");
    }

    #[test]
    fn skips_fenced_code_blocks() {
        let text = "![a](a.png)\n```md\n![b](b.png)\n```\n~~~\n[c](c.md)\n~~~\n[d](d.md)\n";
        let targets: Vec<String> = scan_all(text).into_iter().map(|r| r.target).collect();
        assert_eq!(targets, vec!["a.png", "d.md"]);
    }

    #[test]
    fn malformed_markup_is_ignored() {
        assert!(scan_all("![broken](no-close.png\n[text] (spaced.md)").is_empty());
    }

    #[test]
    fn rescan_restarts_from_the_top() {
        let extractor = Extractor::new();
        let text = "[a](a.md) [b](b.md)";
        let first: Vec<Reference> = extractor.scan(text, Path::new("x.md")).collect();
        let second: Vec<Reference> = extractor.scan(text, Path::new("x.md")).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn anchors_come_from_headings_and_ids() {
        let text = "# Getting Started\n\n## FAQ: Install?\n\n## Usage\n\n## Usage ##\n\n### Setup {#custom-setup}\n\n<span id=\"pinned\"></span>\n\n```sh\n# not-a-heading\n```\n#hashtag\n";
        let anchors = Extractor::new().anchor_ids(text);

        for expected in ["getting-started", "faq-install", "usage", "usage-1", "custom-setup", "pinned"] {
            assert!(anchors.contains(expected), "missing {expected} in {anchors:?}");
        }
        assert!(!anchors.contains("setup"));
        assert!(!anchors.contains("not-a-heading"));
        assert!(!anchors.contains("hashtag"));
    }

    #[test]
    fn documents_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("en/guide")).unwrap();
        std::fs::create_dir_all(root.join("drafts")).unwrap();
        std::fs::write(root.join("index.md"), "").unwrap();
        std::fs::write(root.join("en/guide/setup.mdx"), "").unwrap();
        std::fs::write(root.join("en/a.md"), "").unwrap();
        std::fs::write(root.join("en/logo.png"), "").unwrap();
        std::fs::write(root.join("drafts/wip.md"), "").unwrap();

        let mut config = Config::parse("exclude = [\"drafts/\"]").unwrap();
        config.content_root = root.to_path_buf();
        let set = documents(&config);

        let paths: Vec<String> = set.paths.iter().map(|p| slash_path(p)).collect();
        assert_eq!(paths, vec!["en/a.md", "en/guide/setup.mdx", "index.md"]);
        assert!(set.failures.is_empty());
    }
}
