mod assets;
mod commands;
mod config;
mod diagnostics;
mod error;
mod mapping;
mod migrate;
mod report;
mod resolver;
mod scanner;
mod types;
mod validator;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::Options;
use crate::config::Overrides;
use crate::report::ReportFormat;

#[derive(Parser)]
#[command(name = "docrelink", version, about = "Rewrite and validate markdown image and link references")]
struct Cli {
    /// Asset root (default: <root>/assets)
    #[arg(long, global = true)]
    assets: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
    /// Directory the site serves at `/`, also searched for absolute targets
    #[arg(long, global = true)]
    public: Option<PathBuf>,
    /// Write the report to this file instead of stdout
    #[arg(long, global = true)]
    report: Option<PathBuf>,
    /// Content root (default: docs)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Report references whose target does not exist
    Check {
        /// Also report `#fragment`s that match no heading or id in the linked document
        #[arg(long)]
        anchors: bool,
    },
    /// Copy loose assets into the asset root, one directory per category
    CollectAssets {
        /// Report what would be copied without copying
        #[arg(long)]
        dry_run: bool,
        /// Directory to collect assets from
        #[arg(long)]
        from: PathBuf,
    },
    /// Print a markdown index of every image asset
    Index {
        /// Write the index to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rewrite reference targets in place for the new layout
    Migrate {
        /// Report the changes without writing any file
        #[arg(long)]
        dry_run: bool,
    },
}

/// Send logs to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| return EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = Options {
        format: cli.format,
        overrides: Overrides {
            asset_root: cli.assets,
            check_anchors: matches!(cli.command, Commands::Check { anchors: true }),
            content_root: cli.root,
            public_dir: cli.public,
        },
        report: cli.report,
    };

    let result = match cli.command {
        Commands::Check { .. } => commands::check(&options),
        Commands::CollectAssets { dry_run, from } => commands::collect_assets(&options, &from, dry_run),
        Commands::Index { output } => commands::index(&options, output.as_deref()),
        Commands::Migrate { dry_run } => commands::migrate(&options, dry_run),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3)
        },
    };
}
