//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::DriverConfig;
use tracing::info;

pub use info::run_info;
pub use run::run_bridge;
pub use validate::run_validate;

/// Load `path` or fall back to the defaults
fn load_config(path: Option<&Path>) -> Result<DriverConfig> {
    let Some(path) = path else {
        info!("No configuration file given, using defaults");
        return Ok(DriverConfig::default());
    };
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Names of the enabled filter stages, in order
fn enabled_filters(config: &DriverConfig) -> Vec<String> {
    config
        .filters
        .iter()
        .filter(|f| f.enabled)
        .map(|f| f.name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.camera_name, "camera");
        assert!(enabled_filters(&config).is_empty());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "camera_name = \"front\"\n\n[[filters]]\nname = \"decimation\"\nenabled = true"
        )
        .unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.camera_name, "front");
        assert_eq!(enabled_filters(&config), vec!["decimation"]);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/bridge.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
