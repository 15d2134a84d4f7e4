use std::path::{Path, PathBuf};

use crate::error::Error;

/// Name of the optional project config file.
pub const CONFIG_FILE: &str = ".docrelink.toml";

/// Project configuration loaded from `.docrelink.toml`.
/// Include/exclude patterns are path prefixes applied to documents,
/// relative to the content root.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding asset files; must lie inside `content_root`.
    pub asset_root: PathBuf,
    /// Also check that `#fragment`s on links to other documents name a heading or id there.
    pub check_anchors: bool,
    /// Top-level directory of the documents being processed.
    pub content_root: PathBuf,
    /// File extensions treated as documents, without the leading dot.
    pub extensions: Vec<String>,
    /// Path prefixes excluded from scanning.
    exclude: Vec<String>,
    /// Path prefixes to scan; empty means everything.
    include: Vec<String>,
    /// Directory the site generator serves at `/`, checked for absolute targets.
    pub public_dir: Option<PathBuf>,
}

/// Raw TOML structure for `.docrelink.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DocrelinkTomlConfig {
    #[serde(default)]
    asset_root: Option<PathBuf>,
    #[serde(default)]
    check_anchors: bool,
    #[serde(default)]
    content_root: Option<PathBuf>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    extensions: Option<Vec<String>>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    public_dir: Option<PathBuf>,
}

/// Values given on the command line; each one beats the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// `--assets`
    pub asset_root: Option<PathBuf>,
    /// `check --anchors`; can only switch the check on.
    pub check_anchors: bool,
    /// `--root`
    pub content_root: Option<PathBuf>,
    /// `--public`
    pub public_dir: Option<PathBuf>,
}

impl Config {
    /// Apply command-line overrides on top of the loaded config.
    ///
    /// Overriding only the content root moves the default asset root along with it.
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(root) = overrides.content_root {
            if overrides.asset_root.is_none() && self.asset_root == default_asset_root(&self.content_root) {
                self.asset_root = default_asset_root(&root);
            }
            self.content_root = root;
        }
        if let Some(assets) = overrides.asset_root {
            self.asset_root = assets;
        }
        if overrides.check_anchors {
            self.check_anchors = true;
        }
        if overrides.public_dir.is_some() {
            self.public_dir = overrides.public_dir;
        }
        return self;
    }

    /// Whether `relative_path` has one of the configured document extensions.
    pub fn is_document(&self, relative_path: &Path) -> bool {
        return relative_path
            .extension()
            .and_then(|ext| return ext.to_str())
            .is_some_and(|ext| return self.extensions.iter().any(|e| return e.eq_ignore_ascii_case(ext)));
    }

    /// Load config from `.docrelink.toml` in the given directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; a config the
    /// user wrote is never silently replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content);
    }

    /// Parse config TOML, filling unset keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: DocrelinkTomlConfig = toml::from_str(content)?;
        let defaults = Self::default();
        let content_root = raw.content_root.unwrap_or(defaults.content_root);
        let asset_root = raw.asset_root.unwrap_or_else(|| return default_asset_root(&content_root));
        return Ok(Self {
            asset_root,
            check_anchors: raw.check_anchors,
            content_root,
            exclude: raw.exclude,
            extensions: raw.extensions.unwrap_or(defaults.extensions),
            include: raw.include,
            public_dir: raw.public_dir,
        });
    }

    /// Check whether a document path (relative to the content root) should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

impl Default for Config {
    /// `docs/` with assets under `docs/assets/`, scanning `.md` and `.mdx`.
    fn default() -> Self {
        let content_root = PathBuf::from("docs");
        return Self {
            asset_root: default_asset_root(&content_root),
            check_anchors: false,
            content_root,
            exclude: Vec::new(),
            extensions: vec!["md".to_string(), "mdx".to_string()],
            include: Vec::new(),
            public_dir: None,
        };
    }
}

/// The asset root used when none is configured.
fn default_asset_root(content_root: &Path) -> PathBuf {
    return content_root.join("assets");
}
