//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::bridge::{BridgeSession, SessionConfig};
use crate::cli::RunArgs;

use super::{enabled_filters, load_config};

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI overrides
    if let Some(ref name) = args.camera_name {
        info!(camera_name = %name, "Overriding camera name from CLI");
        config.camera_name = name.clone();
    }
    if let Some(method) = args.unite_imu_method {
        config.unite_imu_method = method.into();
    }
    if args.align_depth {
        config.align_depth = true;
    }
    if let Some(clip) = args.clip_distance {
        config.clip_distance = clip;
    }
    if let Some(rate) = args.tf_publish_rate {
        config.tf_publish_rate = rate;
    }
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;

    info!(
        camera = %config.camera_name,
        unite_imu_method = ?config.unite_imu_method,
        align_depth = config.align_depth,
        clip_distance = config.clip_distance,
        filters = ?enabled_filters(&config),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        println!(
            "{}",
            config_loader::ConfigLoader::to_toml(&config).context("Failed to render config")?
        );
        return Ok(());
    }

    let session = BridgeSession::new(SessionConfig {
        driver: config,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting bridge...");
    let stats = session
        .run(shutdown_signal())
        .await
        .context("Bridge execution failed")?;
    stats.print_summary();

    info!("rs-bridge finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
