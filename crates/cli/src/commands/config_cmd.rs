//! `chatclaw config` — inspect or scaffold configuration.

use chatclaw_config::AppConfig;
use std::path::PathBuf;

/// Print the effective configuration. Secrets are redacted by the config
/// type's Debug implementation.
pub fn show(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => AppConfig::load_from(&path)?,
        None => AppConfig::load()?,
    };
    println!("{config:#?}");
    Ok(())
}

/// Print a default configuration file to stdout.
pub fn init() {
    println!("{}", AppConfig::default_toml());
}
