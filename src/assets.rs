//! Asset categories, collection of loose assets into the asset root, and the asset index.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::scanner::slash_path;
use crate::types::FileFailure;

/// Kind of asset, decided by file extension. Each kind has its own directory
/// under the asset root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    /// PDFs and archives.
    Document,
    /// Animated gifs, kept apart from still images.
    Gif,
    /// Still images and icons.
    Image,
    /// Video clips.
    Video,
}

/// One file placed (or, in a dry run, to be placed) under the asset root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopiedAsset {
    /// Where the file was copied to.
    pub destination: PathBuf,
    /// Where the file came from.
    pub source: PathBuf,
}

/// Outcome of `collect`.
#[derive(Debug, Default, Serialize)]
pub struct CollectReport {
    /// Files copied into the asset root.
    pub copied: Vec<CopiedAsset>,
    /// Files that could not be read or copied.
    pub failures: Vec<FileFailure>,
    /// Files already present with identical content.
    pub skipped: Vec<PathBuf>,
}

impl AssetCategory {
    /// Directory name under the asset root.
    pub const fn dir(self) -> &'static str {
        return match self {
            Self::Document => "documents",
            Self::Gif => "gif",
            Self::Image => "images",
            Self::Video => "videos",
        };
    }

    /// Category of a path or URL path by its extension, case-insensitive.
    /// `None` for anything that is not an asset (documents, directories, no extension).
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        return match ext.as_str() {
            "bmp" | "icns" | "ico" | "jpeg" | "jpg" | "png" | "svg" | "webp" => Some(Self::Image),
            "gif" => Some(Self::Gif),
            "avi" | "mov" | "mp4" | "webm" => Some(Self::Video),
            "pdf" | "zip" => Some(Self::Document),
            _ => None,
        };
    }
}

/// Copy every asset under `source_dir` into `<asset_root>/<category>/<filename>`.
///
/// An identical file already at the destination is skipped. A different file
/// with the same name is kept and the new one gets a `_1`, `_2`, ... suffix.
/// Nothing is written when `dry_run` is set. Anything already inside
/// `asset_root` is not re-collected.
pub fn collect(source_dir: &Path, asset_root: &Path, dry_run: bool) -> CollectReport {
    let mut report = CollectReport::default();
    let mut planned: HashSet<PathBuf> = HashSet::new();

    let walker = WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| return !e.path().starts_with(asset_root));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e.path().map_or_else(PathBuf::new, Path::to_path_buf);
                report.failures.push(FileFailure::filesystem(&path, &std::io::Error::other(e.to_string())));
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let source = entry.path();
        let Some(category) = AssetCategory::from_path(&source.to_string_lossy()) else {
            continue;
        };
        match place_asset(source, &asset_root.join(category.dir()), &planned) {
            Err(e) => {
                tracing::warn!(path = %source.display(), "cannot collect asset: {e}");
                report.failures.push(FileFailure::filesystem(source, &e));
            },
            Ok(Placement::AlreadyPresent) => report.skipped.push(source.to_path_buf()),
            Ok(Placement::Copy(destination)) => {
                if !dry_run
                    && let Err(e) = copy_into(source, &destination)
                {
                    tracing::warn!(path = %source.display(), "cannot copy asset: {e}");
                    report.failures.push(FileFailure::filesystem(source, &e));
                    continue;
                }
                tracing::info!(from = %source.display(), to = %destination.display(), "collected asset");
                planned.insert(destination.clone());
                report.copied.push(CopiedAsset { destination, source: source.to_path_buf() });
            },
        }
    }

    return report;
}

/// Copy `source` to `destination`, creating parent directories.
///
/// # Errors
///
/// Returns the I/O error from directory creation or copying.
fn copy_into(source: &Path, destination: &Path) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, destination)?;
    return Ok(());
}

/// Where a collected asset ends up.
enum Placement {
    /// A byte-identical file is already there.
    AlreadyPresent,
    /// Copy to this path.
    Copy(PathBuf),
}

/// Pick the destination for `source` inside `dir`, avoiding name clashes.
///
/// # Errors
///
/// Returns an I/O error if the source or an existing destination cannot be read.
fn place_asset(source: &Path, dir: &Path, planned: &HashSet<PathBuf>) -> std::io::Result<Placement> {
    let stem = source.file_stem().map_or_else(String::new, |s| return s.to_string_lossy().into_owned());
    let ext = source.extension().map(|e| return e.to_string_lossy().into_owned());
    let source_bytes = std::fs::read(source)?;

    let mut counter = 0_u32;
    loop {
        let name = match (counter, &ext) {
            (0, Some(ext)) => format!("{stem}.{ext}"),
            (0, None) => stem.clone(),
            (n, Some(ext)) => format!("{stem}_{n}.{ext}"),
            (n, None) => format!("{stem}_{n}"),
        };
        let candidate = dir.join(name);
        let taken = planned.contains(&candidate) || candidate.exists();
        if !taken {
            return Ok(Placement::Copy(candidate));
        }
        if candidate.exists() && std::fs::read(&candidate)? == source_bytes {
            return Ok(Placement::AlreadyPresent);
        }
        counter = counter.saturating_add(1);
    }
}

/// Markdown index of every image and gif under `asset_root`, as root-absolute
/// paths relative to `content_root`, sorted.
pub fn render_index(content_root: &Path, asset_root: &Path) -> String {
    let mut out = String::from("# Asset index\n\nGenerated list of every image asset.\n\n");

    let entries = WalkDir::new(asset_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file());

    for entry in entries {
        let category = AssetCategory::from_path(&entry.path().to_string_lossy());
        if !matches!(category, Some(AssetCategory::Gif | AssetCategory::Image)) {
            continue;
        }
        let relative = entry.path().strip_prefix(content_root).unwrap_or(entry.path());
        let _ = writeln!(out, "- `/{}`", slash_path(relative));
    }
    return out;
}
