//! Reference classification and target rewriting.
//!
//! All path arithmetic here is lexical and works on forward-slash segments
//! relative to the content root. Nothing in this module touches the filesystem.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assets::AssetCategory;
use crate::config::Config;
use crate::error::{Error, require_dir};
use crate::mapping::{PathMapping, asset_prefix, join_slash};
use crate::types::{Reference, ResolutionResult, depth_of};


/// How a target is interpreted. Exactly one applies to any string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Starts with `/`: relative to the content root.
    Absolute,
    /// Starts with `#`: a fragment on the current page.
    Anchor,
    /// Any URL with a scheme (`https:`, `mailto:`, `data:`, `jetbrains:`, ...) or protocol-relative.
    External,
    /// Anything else: relative to the document's directory.
    Relative,
}

/// Directories a run operates on, resolved once from the config.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Asset root relative to the content root, forward slashes; empty if they coincide.
    pub asset_prefix: String,
    /// Top-level directory of the documents.
    pub content_root: PathBuf,
    /// Directory the site serves at `/`, if any.
    pub public_dir: Option<PathBuf>,
}

/// Where a local target points, relative to the content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// Resolves to these segments under the content root; empty means the root itself.
    Inside(Vec<String>),
    /// External, anchor-only, or a bare fragment/query: nothing to resolve.
    NotLocal,
    /// Climbs above the content root.
    Outside,
}

impl Layout {
    /// Resolve the config's directories.
    ///
    /// # Errors
    ///
    /// Returns `Error::RootNotFound` if the content root is not a directory, or
    /// `Error::AssetRootOutsideContent` if the asset root is not under it.
    pub fn new(config: &Config) -> Result<Self, Error> {
        require_dir(&config.content_root, "content root")?;
        return Ok(Self {
            asset_prefix: asset_prefix(&config.content_root, &config.asset_root)?,
            content_root: config.content_root.clone(),
            public_dir: config.public_dir.clone(),
        });
    }

    /// Content-root-relative location used for an asset missing from the mapping.
    pub fn default_location(&self, category: AssetCategory, filename: &str) -> String {
        return join_slash(&join_slash(&self.asset_prefix, category.dir()), filename);
    }
}

/// Classify a target. First match wins: external, anchor, absolute, relative.
pub fn classify(target: &str) -> Classification {
    let trimmed = target.trim_start();
    if trimmed.starts_with("//") || has_scheme(trimmed) {
        return Classification::External;
    }
    if target.starts_with('#') {
        return Classification::Anchor;
    }
    if target.starts_with('/') {
        return Classification::Absolute;
    }
    return Classification::Relative;
}

/// Segments of the directory containing `document`.
fn document_dir(document: &Path) -> Vec<String> {
    return document
        .parent()
        .map(|dir| {
            return dir
                .components()
                .map(|c| return c.as_os_str().to_string_lossy().into_owned())
                .collect();
        })
        .unwrap_or_default();
}

/// Whether `target` starts with a URL scheme: a letter, then letters, digits,
/// `+`, `-` or `.`, then `:`.
fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    return chars.next().is_some_and(|c| return c.is_ascii_alphabetic())
        && chars.all(|c| return c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
}

/// Resolve a target against `document` (relative to the content root) without
/// consulting the filesystem. Any `#fragment` or `?query` is ignored.
pub fn locate(target: &str, document: &Path) -> Located {
    let classification = classify(target);
    if matches!(classification, Classification::External | Classification::Anchor) {
        return Located::NotLocal;
    }
    let (path, _) = split_suffix(target);
    if path.is_empty() {
        return Located::NotLocal;
    }
    let base = match classification {
        Classification::Absolute => Vec::new(),
        _ => document_dir(document),
    };
    return match normalize(base, path.split('/')) {
        Some(segments) => Located::Inside(segments),
        None => Located::Outside,
    };
}

/// Lexically apply `segments` on top of `base`, collapsing `.` and `..`.
/// Returns `None` when `..` would climb above the root.
fn normalize<'a>(base: Vec<String>, segments: impl Iterator<Item = &'a str>) -> Option<Vec<String>> {
    let mut out = base;
    for segment in segments {
        match segment {
            "" | "." => {},
            ".." => {
                out.pop()?;
            },
            other => out.push(other.to_string()),
        }
    }
    return Some(out);
}

/// Path from directory `from` to `to`, both as segments under the same root.
fn relative_from(from: &[String], to: &[String]) -> String {
    let common = from.iter().zip(to).take_while(|(a, b)| return a == b).count();
    let ups = from.len().saturating_sub(common);
    let parts: Vec<&str> = std::iter::repeat_n("..", ups)
        .chain(to.iter().skip(common).map(String::as_str))
        .collect();
    if parts.is_empty() {
        return ".".to_string();
    }
    return parts.join("/");
}

/// Compute the corrected target for one reference.
pub fn rewrite(reference: &Reference, layout: &Layout, mapping: &PathMapping) -> ResolutionResult {
    return rewrite_target(&reference.target, &reference.source_document, layout, mapping);
}

/// Compute the corrected target for `target` found in `document`
/// (a path relative to the content root).
///
/// External and anchor-only targets are returned untouched. Asset targets are
/// pointed at the mapped (or default) location with one `../` per level of
/// document depth. Other local targets are normalized and re-expressed
/// relative to the document's directory. Applying this to its own output is a no-op.
pub fn rewrite_target(target: &str, document: &Path, layout: &Layout, mapping: &PathMapping) -> ResolutionResult {
    let classification = classify(target);
    if matches!(classification, Classification::External | Classification::Anchor) {
        return ResolutionResult::unchanged(target);
    }
    let (path, suffix) = split_suffix(target);
    if path.is_empty() {
        return ResolutionResult::unchanged(target);
    }

    let filename = path.rsplit('/').next().unwrap_or(path);
    if let Some(category) = AssetCategory::from_path(path)
        && !filename.is_empty()
    {
        let location = mapping
            .get(filename)
            .map_or_else(|| return layout.default_location(category, filename), str::to_string);
        let prefix = "../".repeat(depth_of(document));
        return ResolutionResult::new(target, format!("{prefix}{location}{suffix}"));
    }

    let Located::Inside(resolved) = locate(target, document) else {
        return ResolutionResult::unchanged(target);
    };
    let mut relative = relative_from(&document_dir(document), &resolved);
    if path.ends_with('/') && !relative.ends_with('/') {
        relative.push('/');
    }
    return ResolutionResult::new(target, format!("{relative}{suffix}"));
}

/// Split a target into its path and the `#fragment`/`?query` suffix.
pub fn split_suffix(target: &str) -> (&str, &str) {
    let cut = target.find(['#', '?']).unwrap_or(target.len());
    return target.split_at(cut);
}
