//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DeviceService, DriverConfig};
use device::SimulatedDevice;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

use super::load_config;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    camera_name: String,
    imu: ImuInfo,
    depth: DepthInfo,
    tf: TfInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filters: Vec<FilterInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    streams: Vec<StreamInfo>,
}

#[derive(Serialize)]
struct ImuInfo {
    unite_imu_method: String,
    queue_capacity: usize,
    linear_accel_cov: f64,
    angular_velocity_cov: f64,
}

#[derive(Serialize)]
struct DepthInfo {
    clip_distance: f32,
    align_depth: bool,
}

#[derive(Serialize)]
struct TfInfo {
    publish_tf: bool,
    tf_publish_rate: f64,
    publish_odom_tf: bool,
}

#[derive(Serialize)]
struct FilterInfo {
    name: String,
    enabled: bool,
}

#[derive(Serialize)]
struct StreamInfo {
    name: String,
    format: String,
    width: u32,
    height: u32,
    fps: u32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = ?args.config, "Loading configuration info");

    let config = load_config(args.config.as_deref())?;
    let streams = if args.streams {
        stream_infos(&config)?
    } else {
        Vec::new()
    };

    if args.json {
        let info = build_config_info(&config, args, streams);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args, &streams);
    }

    Ok(())
}

fn stream_infos(config: &DriverConfig) -> Result<Vec<StreamInfo>> {
    let device = SimulatedDevice::new(config.device.clone())
        .context("Failed to create simulated device")?;
    Ok(device
        .stream_profiles()
        .into_iter()
        .map(|p| StreamInfo {
            name: p.key.name(),
            format: format!("{:?}", p.format),
            width: p.width,
            height: p.height,
            fps: p.fps,
        })
        .collect())
}

fn build_config_info(config: &DriverConfig, args: &InfoArgs, streams: Vec<StreamInfo>) -> ConfigInfo {
    let filters = if args.filters {
        config
            .filters
            .iter()
            .map(|f| FilterInfo {
                name: f.name.to_string(),
                enabled: f.enabled,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        camera_name: config.camera_name.clone(),
        imu: ImuInfo {
            unite_imu_method: format!("{:?}", config.unite_imu_method),
            queue_capacity: config.imu_queue_capacity,
            linear_accel_cov: config.imu.linear_accel_cov,
            angular_velocity_cov: config.imu.angular_velocity_cov,
        },
        depth: DepthInfo {
            clip_distance: config.clip_distance,
            align_depth: config.align_depth,
        },
        tf: TfInfo {
            publish_tf: config.publish_tf,
            tf_publish_rate: config.tf_publish_rate,
            publish_odom_tf: config.publish_odom_tf,
        },
        filters,
        streams,
    }
}

fn print_config_info(config: &DriverConfig, args: &InfoArgs, streams: &[StreamInfo]) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               rs-bridge Configuration                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📷 Camera: {}", config.camera_name);

    println!("\n🧭 IMU");
    println!("   ├─ Sync method: {:?}", config.unite_imu_method);
    println!("   ├─ Queue capacity: {}", config.imu_queue_capacity);
    println!(
        "   └─ Covariance: accel {} / gyro {}",
        config.imu.linear_accel_cov, config.imu.angular_velocity_cov
    );

    println!("\n📏 Depth");
    if config.clip_distance > 0.0 {
        println!("   ├─ Clip distance: {} m", config.clip_distance);
    } else {
        println!("   ├─ Clip distance: disabled");
    }
    println!("   └─ Aligned depth: {}", config.align_depth);

    println!("\n⚙️  Transforms");
    println!("   ├─ Publish TF: {}", config.publish_tf);
    if config.tf_publish_rate > 0.0 {
        println!("   ├─ Republish: {} Hz", config.tf_publish_rate);
    } else {
        println!("   ├─ Republish: static only");
    }
    println!("   └─ Odom TF: {}", config.publish_odom_tf);

    let enabled: Vec<_> = config.filters.iter().filter(|f| f.enabled).collect();
    println!("\n🔧 Filters ({} enabled)", enabled.len());
    let shown: Vec<_> = if args.filters {
        config.filters.iter().collect()
    } else {
        enabled
    };
    for (i, filter) in shown.iter().enumerate() {
        let prefix = if i + 1 == shown.len() { "└─" } else { "├─" };
        let state = if filter.enabled { "on" } else { "off" };
        println!("   {} {} ({})", prefix, filter.name, state);
    }

    if !streams.is_empty() {
        println!("\n📡 Streams ({})", streams.len());
        for (i, stream) in streams.iter().enumerate() {
            let prefix = if i + 1 == streams.len() { "└─" } else { "├─" };
            if stream.width > 0 {
                println!(
                    "   {} {} ({}, {}x{} @ {} Hz)",
                    prefix, stream.name, stream.format, stream.width, stream.height, stream.fps
                );
            } else {
                println!("   {} {} ({}, {} Hz)", prefix, stream.name, stream.format, stream.fps);
            }
        }
    }

    println!();
}
