//! Bridge session - wires the simulated device, the driver node and the bus.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DriverConfig, SystemClock};
use device::{SimulatedDevice, SimulatedSource};
use dispatcher::{DriverNode, LogBus};
use tracing::{info, warn};

use super::BridgeStats;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub driver: DriverConfig,

    /// Stop after this long (None = until the shutdown signal)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// One run of the bridge
pub struct BridgeSession {
    config: SessionConfig,
}

impl BridgeSession {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Stream until the duration elapses or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<BridgeStats> {
        let started = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let driver = self.config.driver;
        let device = Arc::new(
            SimulatedDevice::new(driver.device.clone())
                .context("Failed to create simulated device")?,
        );
        let bus = Arc::new(LogBus::new("log"));
        let source = Arc::new(SimulatedSource::new(Arc::clone(&device)));

        let mut node = DriverNode::new(
            driver,
            device.clone(),
            bus.clone(),
            Arc::new(SystemClock),
        );
        node.start(source.clone())
            .context("Failed to start bridge node")?;

        info!(
            duration = ?self.config.duration,
            "Bridge running (simulated device)"
        );

        match self.config.duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        info!(duration_secs = duration.as_secs(), "Run duration reached");
                    }
                    _ = shutdown => {
                        warn!("Received shutdown signal, stopping bridge...");
                    }
                }
            }
            None => {
                shutdown.await;
                warn!("Received shutdown signal, stopping bridge...");
            }
        }

        info!("Shutting down bridge...");
        let dispatch = node.shutdown().await;
        bus.close();

        let stats = BridgeStats {
            duration: started.elapsed(),
            samples_emitted: source.emitted(),
            dispatch,
            channels: bus.counts(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Bridge shutdown complete"
        );
        Ok(stats)
    }
}
