//! # Sift CLI
//!
//! Command-line interface for the Sift grouped library index.
//!
//! ## Commands
//!
//! - `sift group <library>` - Group a library and print the rows
//! - `sift query <library> <pattern>` - Filter groups by display value
//! - `sift replay <library> <script>` - Apply an operation script and print change events
//! - `sift interactive <library>` - Browse groups in a TUI
//! - `sift config` - Show the effective configuration
//!
//! A library is a JSON array of items:
//!
//! ```json
//! [{ "id": 1, "fields": { "artist": "Nina Simone", "genre": "Jazz" } }]
//! ```
//!
//! ## Example Usage
//!
//! ```bash
//! # Group by genre, then year
//! sift group library.json --columns genre,date=Year
//!
//! # Artists whose name starts with "The"
//! sift query library.json "The *"
//!
//! # Interactive browser
//! sift interactive library.json
//! ```

mod app;
mod commands;
mod tui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sift - Grouped browsing for large media libraries
#[derive(Parser)]
#[command(name = "sift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Grouping columns, overriding the configuration (e.g. "genre,date=Year")
    #[arg(short = 'C', long, global = true, env = "SIFT_COLUMNS")]
    columns: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group a library and print every row
    Group {
        /// Library file (JSON array of items)
        library: PathBuf,

        /// Hide the "All (...)" summary row
        #[arg(long)]
        no_summary: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Filter groups by display value
    Query {
        /// Library file (JSON array of items)
        library: PathBuf,

        /// Filter pattern (wildcards, r/regex/, =exact, col:field, min:N, max:N)
        pattern: String,

        /// Maximum number of groups to show
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Apply an operation script to a library and print the change events
    Replay {
        /// Library file (JSON array of items)
        library: PathBuf,

        /// Script file (JSON array of operations)
        script: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Start interactive TUI mode
    #[command(alias = "i")]
    Interactive {
        /// Library file (JSON array of items)
        library: PathBuf,
    },

    /// Show the effective configuration
    Config {
        /// Only print the configuration file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => sift_core::Config::load_from(path)?,
        None => sift_core::Config::load()?,
    };

    // Setup logging
    let log_level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.general.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    if let Some(columns) = &cli.columns {
        config.grouping.columns = sift_core::Config::parse_columns(columns)?;
    }

    // Execute command
    match cli.command {
        Commands::Group {
            library,
            no_summary,
            output,
        } => {
            if no_summary {
                config.grouping.show_summary = false;
            }
            commands::group::run(config, &library, output)
        }
        Commands::Query {
            library,
            pattern,
            limit,
            output,
        } => commands::query::run(config, &library, &pattern, limit, output),
        Commands::Replay {
            library,
            script,
            output,
        } => commands::replay::run(config, &library, &script, output),
        Commands::Interactive { library } => tui::run(config, &library),
        Commands::Config { path } => commands::config::run(config, cli.config, path),
    }
}
