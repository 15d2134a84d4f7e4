//! CLI commands for docrelink: migrate, check, collect-assets, index.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::assets;
use crate::config::{Config, Overrides};
use crate::error::{self, require_dir};
use crate::mapping::PathMapping;
use crate::migrate::migrate_tree;
use crate::report::{self, ReportFormat};
use crate::resolver::Layout;
use crate::scanner::Extractor;
use crate::validator::check_tree;

/// Options shared by every command.
pub struct Options {
    /// Report encoding.
    pub format: ReportFormat,
    /// Directory overrides from the command line.
    pub overrides: Overrides,
    /// File to write the report to instead of stdout.
    pub report: Option<PathBuf>,
}

/// Scan every document and report references whose target does not exist.
/// Never modifies any file.
///
/// # Errors
///
/// Returns errors from config loading, a missing content root, or report output.
pub fn check(options: &Options) -> Result<ExitCode, error::Error> {
    let config = load_config(options)?;
    let layout = Layout::new(&config)?;

    let outcome = check_tree(&config, &layout, &Extractor::new());
    let rendered = report::render_validation(&outcome, options.format)?;
    report::emit(&rendered, options.report.as_deref())?;

    return Ok(exit_code(outcome.broken, outcome.failures.len()));
}

/// Copy loose assets from `from` into the asset root, sorted by category.
///
/// # Errors
///
/// Returns errors from config loading, a missing source directory, or report output.
pub fn collect_assets(options: &Options, from: &Path, dry_run: bool) -> Result<ExitCode, error::Error> {
    let config = load_config(options)?;
    require_dir(from, "asset source")?;

    let outcome = assets::collect(from, &config.asset_root, dry_run);
    let rendered = report::render_collect(&outcome, options.format)?;
    report::emit(&rendered, options.report.as_deref())?;

    return Ok(exit_code(0, outcome.failures.len()));
}

/// Exit code priority: broken references (2) > unreadable files (1) > clean (0).
fn exit_code(broken: usize, failures: usize) -> ExitCode {
    if broken > 0 {
        return ExitCode::from(2);
    }
    if failures > 0 {
        return ExitCode::from(1);
    }
    return ExitCode::SUCCESS;
}

/// Print or write the markdown index of image assets.
///
/// # Errors
///
/// Returns errors from config loading, missing roots, or writing the output.
pub fn index(options: &Options, output: Option<&Path>) -> Result<ExitCode, error::Error> {
    let config = load_config(options)?;
    let layout = Layout::new(&config)?;
    require_dir(&config.asset_root, "asset root")?;

    let rendered = assets::render_index(&layout.content_root, &config.asset_root);
    report::emit(&rendered, output)?;
    return Ok(ExitCode::SUCCESS);
}

/// Load `.docrelink.toml` from the working directory and apply CLI overrides.
///
/// # Errors
///
/// Returns `Error::Io` or `Error::TomlDe` for an unreadable or malformed config.
fn load_config(options: &Options) -> Result<Config, error::Error> {
    let config = Config::load(Path::new("."))?.apply(options.overrides.clone());
    tracing::debug!(
        content_root = %config.content_root.display(),
        asset_root = %config.asset_root.display(),
        "loaded config"
    );
    return Ok(config);
}

/// Build the asset mapping and rewrite every document's references.
///
/// # Errors
///
/// Returns errors from config loading, missing or misplaced roots, or report output.
pub fn migrate(options: &Options, dry_run: bool) -> Result<ExitCode, error::Error> {
    let config = load_config(options)?;
    let layout = Layout::new(&config)?;
    let mapping = PathMapping::build(&config.content_root, &config.asset_root)?;
    if mapping.is_empty() {
        tracing::warn!(asset_root = %config.asset_root.display(), "no assets found, every asset falls back to its default location");
    }
    tracing::info!(assets = mapping.len(), "built asset mapping");

    let outcome = migrate_tree(&config, &layout, &mapping, &Extractor::new(), dry_run);
    let rendered = report::render_migration(&outcome, options.format)?;
    report::emit(&rendered, options.report.as_deref())?;

    return Ok(exit_code(0, outcome.failures.len()));
}
