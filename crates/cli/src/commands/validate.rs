//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DriverConfig, StageTag, StreamKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

use super::enabled_filters;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    camera_name: String,
    unite_imu_method: String,
    align_depth: bool,
    clip_distance: f32,
    publish_tf: bool,
    tf_publish_rate: f64,
    filters: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    camera_name: config.camera_name.clone(),
                    unite_imu_method: format!("{:?}", config.unite_imu_method),
                    align_depth: config.align_depth,
                    clip_distance: config.clip_distance,
                    publish_tf: config.publish_tf,
                    tf_publish_rate: config.tf_publish_rate,
                    filters: enabled_filters(&config),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &DriverConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.publish_tf && config.tf_publish_rate > 0.0 {
        warnings.push("tf_publish_rate is ignored while publish_tf is false".to_string());
    }

    if config.clip_distance > 0.0 && config.clip_distance < 0.1 {
        warnings.push(format!(
            "clip_distance {} m removes nearly all depth",
            config.clip_distance
        ));
    }

    if config.filter_enabled(StageTag::Pointcloud)
        && config.pointcloud.texture_stream == StreamKind::Infrared
        && !config.device.enable_infrared
    {
        warnings.push(
            "point cloud textured by infrared but the device has infrared disabled".to_string(),
        );
    }

    let configured = config.filters.len();
    if configured < StageTag::CANONICAL_ORDER.len() {
        warnings.push(format!(
            "{} of {} filter stages not listed; they cannot be toggled at runtime",
            StageTag::CANONICAL_ORDER.len() - configured,
            StageTag::CANONICAL_ORDER.len()
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Camera: {}", summary.camera_name);
            println!("  IMU sync: {}", summary.unite_imu_method);
            println!("  Align depth: {}", summary.align_depth);
            println!("  Clip distance: {}", summary.clip_distance);
            println!(
                "  TF: {} ({} Hz)",
                summary.publish_tf, summary.tf_publish_rate
            );
            println!("  Filters: {:?}", summary.filters);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::path::PathBuf;

    fn args_for(content: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_defaults_are_valid_without_warnings() {
        let (_file, args) = args_for("");
        let result = validate_config(&args);
        assert!(result.valid);
        assert!(result.warnings.is_none());
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let (_file, args) = args_for("imu_queue_capacity = 0");
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("imu_queue_capacity"));
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: PathBuf::from("/nonexistent/bridge.toml"),
            json: false,
        };
        assert!(!validate_config(&args).valid);
    }

    #[test]
    fn test_warnings() {
        let config = DriverConfig {
            publish_tf: false,
            tf_publish_rate: 10.0,
            clip_distance: 0.05,
            ..DriverConfig::default()
        };
        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 2);
    }
}
