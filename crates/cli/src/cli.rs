//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::ImuSyncMethod;
use std::path::PathBuf;

/// rs-bridge - depth camera to message bus bridge
#[derive(Parser, Debug)]
#[command(
    name = "rs-bridge",
    author,
    version,
    about = "Depth camera to message bus bridge",
    long_about = "Streams a (simulated) depth camera onto a message bus.\n\n\
                  Publishes images with camera info, synchronised IMU, odometry, \n\
                  point clouds and the static transform tree of the rig."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RS_BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RS_BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge against the simulated device
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "RS_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the camera name (frame id prefix)
    #[arg(long, env = "RS_BRIDGE_CAMERA_NAME")]
    pub camera_name: Option<String>,

    /// Override the IMU synchronisation method
    #[arg(long, value_enum)]
    pub unite_imu_method: Option<ImuMethodArg>,

    /// Publish depth aligned to the other streams
    #[arg(long)]
    pub align_depth: bool,

    /// Override the depth clipping distance in meters
    #[arg(long)]
    pub clip_distance: Option<f32>,

    /// Override the TF republish rate in Hz (0 = static only)
    #[arg(long)]
    pub tf_publish_rate: Option<f64>,

    /// Run time in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "RS_BRIDGE_DURATION")]
    pub duration: u64,

    /// Validate configuration and exit without streaming
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "RS_BRIDGE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bridge.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the filter list including disabled stages
    #[arg(long)]
    pub filters: bool,

    /// Show the simulated device streams
    #[arg(long)]
    pub streams: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// IMU synchronisation method
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ImuMethodArg {
    None,
    Copy,
    LinearInterpolation,
}

impl From<ImuMethodArg> for ImuSyncMethod {
    fn from(method: ImuMethodArg) -> Self {
        match method {
            ImuMethodArg::None => Self::None,
            ImuMethodArg::Copy => Self::Copy,
            ImuMethodArg::LinearInterpolation => Self::LinearInterpolation,
        }
    }
}
