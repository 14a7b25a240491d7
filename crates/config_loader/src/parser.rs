//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, DriverConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<DriverConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<DriverConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<DriverConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ImuSyncMethod, StageTag, StreamKind};

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
camera_name = "d435"
clip_distance = 3.5
align_depth = true
unite_imu_method = "copy"
tf_publish_rate = 10.0

[imu]
linear_accel_cov = 0.02
angular_velocity_cov = 0.05

[[filters]]
name = "decimation"
enabled = true

[[filters]]
name = "pointcloud"
enabled = true

[pointcloud]
texture_stream = "infrared"
texture_index = 1

[device]
width = 320
height = 240
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.camera_name, "d435");
        assert_eq!(config.unite_imu_method, ImuSyncMethod::Copy);
        assert!((config.imu.angular_velocity_cov - 0.05).abs() < 1e-12);
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters[1].name, StageTag::Pointcloud);
        assert_eq!(config.pointcloud.texture_stream, StreamKind::Infrared);
        assert_eq!(config.device.width, 320);
        assert_eq!(config.device.fps, 30);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "align_depth": true, "unite_imu_method": "linear_interpolation" }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert!(config.align_depth);
        assert_eq!(config.unite_imu_method, ImuSyncMethod::LinearInterpolation);
    }

    #[test]
    fn test_parse_unknown_filter_name() {
        let content = r#"
[[filters]]
name = "sharpen"
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
