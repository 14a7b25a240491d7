//! Periodic device temperature readout

use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, DeviceOption, DeviceService};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Read every temperature option once; unsupported options are skipped
pub fn read_temperatures(device: &dyn DeviceService) -> Vec<(DeviceOption, f32)> {
    DeviceOption::TEMPERATURES
        .iter()
        .filter_map(|&option| match device.option_value(option) {
            Ok(value) => Some((option, value)),
            Err(ContractError::OptionUnsupported { .. }) => None,
            Err(e) => {
                debug!(option = %option, error = %e, "failed checking for temperature");
                None
            }
        })
        .collect()
}

/// Spawn the monitor loop
///
/// The first readout happens one interval after start.
pub fn spawn_temperature_monitor(
    device: Arc<dyn DeviceService>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        info!(interval_ms = interval.as_millis() as u64, "temperature monitor started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for (option, value) in read_temperatures(device.as_ref()) {
                        observability::record_temperature(option.as_str(), value as f64);
                        debug!(option = %option, celsius = value, "temperature");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("temperature monitor stopped");
    })
}
