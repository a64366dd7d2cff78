//! Validate command implementation.

use std::path::Path;
use steady_core::ControllerConfig;
use tracing::info;

/// Loads and validates the config at `path`.
pub fn load(path: &Path) -> Result<ControllerConfig, Box<dyn std::error::Error>> {
    let config = ControllerConfig::from_json_file(path)?;
    if config.target_name.is_none() {
        return Err("config has no target_name; the controller would reconcile nothing".into());
    }
    Ok(config)
}

/// Runs the validate command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(path)?;
    info!(path = %path.display(), "config is valid");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
