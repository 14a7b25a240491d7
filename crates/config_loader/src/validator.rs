//! 配置校验模块
//!
//! 校验规则：
//! - camera_name 非空
//! - filter 名称唯一
//! - imu_queue_capacity > 0
//! - 协方差 >= 0
//! - tf_publish_rate 有限
//! - monitor.interval_ms > 0
//! - 纹理流必须是视频流
//! - 模拟设备分辨率与帧率 > 0

use std::collections::HashSet;

use contracts::{ContractError, DriverConfig};

/// 校验 DriverConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &DriverConfig) -> Result<(), ContractError> {
    validate_camera_name(config)?;
    validate_filters(config)?;
    validate_imu(config)?;
    validate_tf(config)?;
    validate_monitor(config)?;
    validate_pointcloud(config)?;
    validate_device(config)?;
    Ok(())
}

fn validate_camera_name(config: &DriverConfig) -> Result<(), ContractError> {
    if config.camera_name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "camera_name",
            "camera_name cannot be empty",
        ));
    }
    Ok(())
}

/// 校验 filter 名称唯一性
fn validate_filters(config: &DriverConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, filter) in config.filters.iter().enumerate() {
        if !seen.insert(filter.name) {
            return Err(ContractError::config_validation(
                format!("filters[{}].name", idx),
                format!("duplicate filter '{}'", filter.name),
            ));
        }
    }
    Ok(())
}

/// 校验 IMU 配置
fn validate_imu(config: &DriverConfig) -> Result<(), ContractError> {
    if config.imu_queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "imu_queue_capacity",
            "imu_queue_capacity must be > 0",
        ));
    }

    let covariances = [
        ("imu.linear_accel_cov", config.imu.linear_accel_cov),
        ("imu.angular_velocity_cov", config.imu.angular_velocity_cov),
    ];
    for (field, value) in covariances {
        if !value.is_finite() || value < 0.0 {
            return Err(ContractError::config_validation(
                field,
                format!("covariance must be finite and >= 0, got {}", value),
            ));
        }
    }
    Ok(())
}

fn validate_tf(config: &DriverConfig) -> Result<(), ContractError> {
    if !config.tf_publish_rate.is_finite() {
        return Err(ContractError::config_validation(
            "tf_publish_rate",
            format!("tf_publish_rate must be finite, got {}", config.tf_publish_rate),
        ));
    }
    if !config.clip_distance.is_finite() {
        return Err(ContractError::config_validation(
            "clip_distance",
            "clip_distance must be finite",
        ));
    }
    Ok(())
}

fn validate_monitor(config: &DriverConfig) -> Result<(), ContractError> {
    if config.monitor.enabled && config.monitor.interval_ms == 0 {
        return Err(ContractError::config_validation(
            "monitor.interval_ms",
            "interval_ms must be > 0 when the monitor is enabled",
        ));
    }
    Ok(())
}

/// 纹理流不能是 motion / pose
fn validate_pointcloud(config: &DriverConfig) -> Result<(), ContractError> {
    let kind = config.pointcloud.texture_stream;
    if !kind.is_video() {
        return Err(ContractError::config_validation(
            "pointcloud.texture_stream",
            format!("'{}' cannot texture a point cloud", kind),
        ));
    }
    Ok(())
}

/// 校验模拟设备参数
fn validate_device(config: &DriverConfig) -> Result<(), ContractError> {
    let device = &config.device;
    if device.width == 0 || device.height == 0 {
        return Err(ContractError::config_validation(
            "device.width / device.height",
            format!(
                "resolution must be > 0, got {}x{}",
                device.width, device.height
            ),
        ));
    }

    let rates = [
        ("device.fps", device.fps),
        ("device.accel_hz", device.accel_hz),
        ("device.gyro_hz", device.gyro_hz),
    ];
    for (field, value) in rates {
        if value == 0 {
            return Err(ContractError::config_validation(field, "rate must be > 0"));
        }
    }

    if !(device.depth_scale.is_finite() && device.depth_scale > 0.0) {
        return Err(ContractError::config_validation(
            "device.depth_scale",
            format!("depth_scale must be > 0, got {}", device.depth_scale),
        ));
    }
    Ok(())
}
