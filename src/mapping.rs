//! Lookup table from bare asset filename to its location under the content root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::assets::AssetCategory;
use crate::error::{Error, require_dir};
use crate::scanner::slash_path;

/// Two asset files sharing one bare filename. The mapping keeps the path
/// that sorts last; the other is shadowed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Collision {
    /// The shared bare filename.
    pub filename: String,
    /// Location the mapping resolves to.
    pub kept: String,
    /// Location no longer reachable by filename.
    pub shadowed: String,
}

/// Bare filename -> content-root-relative location (forward slashes).
///
/// Built once per run from every file under the asset root, inserted in
/// lexicographic order of the full slash path, so on a filename collision the
/// lexicographically last path wins. Read-only after construction.
#[derive(Debug, Default, Clone)]
pub struct PathMapping {
    /// Every collision seen during the walk, in walk order.
    collisions: Vec<Collision>,
    /// Filename to location.
    entries: BTreeMap<String, String>,
}

impl PathMapping {
    /// Walk `asset_root` and map every asset file's name to its path relative
    /// to `content_root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::RootNotFound` if `asset_root` is not a directory, or
    /// `Error::AssetRootOutsideContent` if it is not under `content_root`.
    pub fn build(content_root: &Path, asset_root: &Path) -> Result<Self, Error> {
        require_dir(asset_root, "asset root")?;
        let prefix = asset_prefix(content_root, asset_root)?;
        let mut mapping = Self::default();

        let mut found: Vec<(String, String)> = WalkDir::new(asset_root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| return e.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(asset_root).ok()?;
                let location = join_slash(&prefix, &slash_path(relative));
                AssetCategory::from_path(&location)?;
                return Some((location, entry.file_name().to_string_lossy().into_owned()));
            })
            .collect();
        // Whole-path order, not per-directory walk order: `a-b/` sorts before `a/`.
        found.sort();

        for (location, filename) in found {
            mapping.insert(filename, location);
        }

        for collision in &mapping.collisions {
            tracing::warn!(
                filename = %collision.filename,
                kept = %collision.kept,
                shadowed = %collision.shadowed,
                "ambiguous asset filename, keeping the last path in sort order"
            );
        }
        return Ok(mapping);
    }

    /// Collisions found while building.
    pub fn collisions(&self) -> &[Collision] {
        return &self.collisions;
    }

    /// Location for a bare filename, if any asset has that name.
    pub fn get(&self, filename: &str) -> Option<&str> {
        return self.entries.get(filename).map(String::as_str);
    }

    /// Add or replace an entry; a replacement is recorded as a collision.
    pub fn insert(&mut self, filename: String, location: String) {
        if let Some(previous) = self.entries.insert(filename.clone(), location.clone())
            && previous != location
        {
            self.collisions.push(Collision { filename, kept: location, shadowed: previous });
        }
    }

    /// Whether no assets were found.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Number of distinct filenames.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }
}

/// Location of `asset_root` relative to `content_root`, forward slashes,
/// empty when they are the same directory.
///
/// # Errors
///
/// Returns `Error::AssetRootOutsideContent` if `asset_root` is not under `content_root`.
pub fn asset_prefix(content_root: &Path, asset_root: &Path) -> Result<String, Error> {
    let outside = || {
        return Error::AssetRootOutsideContent {
            asset_root: asset_root.to_path_buf(),
            content_root: content_root.to_path_buf(),
        };
    };
    let relative: PathBuf = match asset_root.strip_prefix(content_root) {
        Ok(r) => r.to_path_buf(),
        Err(_) => {
            let (Ok(root), Ok(assets)) = (content_root.canonicalize(), asset_root.canonicalize()) else {
                return Err(outside());
            };
            assets.strip_prefix(&root).map_err(|_err| return outside())?.to_path_buf()
        },
    };
    let prefix = slash_path(&relative);
    if prefix.split('/').any(|segment| return segment == "..") {
        return Err(outside());
    }
    return Ok(prefix);
}

/// Join two slash paths, skipping an empty prefix.
pub fn join_slash(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        return rest.to_string();
    }
    return format!("{prefix}/{rest}");
}
