//! Config command - show the effective configuration.

use sift_core::Config;
use std::path::PathBuf;

/// Run the config command.
///
/// `explicit` is the `--config` path, if one was given.
pub fn run(config: Config, explicit: Option<PathBuf>, path_only: bool) -> anyhow::Result<()> {
    let path = match explicit {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    let exists = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("# {}{}", path.display(), exists);
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}
