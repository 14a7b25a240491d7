//! DriverNode - wires device, dispatcher, transforms and background tasks

use std::sync::Arc;
use std::time::Duration;

use calibration::{extrinsics_message, imu_info, CalibrationRegistry};
use contracts::{
    Channel, Clock, ContractError, DeviceService, DriverConfig, Header, Message, MessageBus,
    SampleCallback, SampleSource, StreamKey, StreamKind, StreamProfile,
};
use sync_engine::ClockBase;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use transforms::{FrameNames, TransformPublisher};

use crate::dispatcher::FrameDispatcher;
use crate::error::DispatcherResult;
use crate::metrics::DispatchSnapshot;
use crate::monitor::spawn_temperature_monitor;

/// One bridge session
pub struct DriverNode {
    config: DriverConfig,
    names: FrameNames,
    device: Arc<dyn DeviceService>,
    bus: Arc<dyn MessageBus>,
    clock: Arc<dyn Clock>,
    calibration: Arc<CalibrationRegistry>,
    transforms: Arc<TransformPublisher>,
    dispatcher: Arc<FrameDispatcher>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    source: Option<Arc<dyn SampleSource>>,
}

impl DriverNode {
    pub fn new(
        config: DriverConfig,
        device: Arc<dyn DeviceService>,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let names = FrameNames::new(&config.camera_name);
        let calibration = Arc::new(CalibrationRegistry::new());
        let dispatcher = Arc::new(FrameDispatcher::new(
            &config,
            Arc::clone(&device),
            Arc::clone(&bus),
            Arc::new(ClockBase::new(Arc::clone(&clock))),
            Arc::clone(&calibration),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            transforms: Arc::new(TransformPublisher::new(names.clone())),
            names,
            config,
            device,
            bus,
            clock,
            calibration,
            dispatcher,
            shutdown_tx,
            tasks: Vec::new(),
            source: None,
        }
    }

    pub fn dispatcher(&self) -> &Arc<FrameDispatcher> {
        &self.dispatcher
    }

    pub fn transforms(&self) -> &Arc<TransformPublisher> {
        &self.transforms
    }

    pub fn calibration(&self) -> &Arc<CalibrationRegistry> {
        &self.calibration
    }

    /// Calibration, one-shot messages, transforms and background tasks
    ///
    /// Fails only when no base stream exists for the transforms.
    #[instrument(name = "driver_node_setup", skip(self), fields(device = %self.device.name()))]
    pub fn setup(&mut self) -> DispatcherResult<()> {
        let profiles = self.device.stream_profiles();
        info!(profiles = profiles.len(), "setting up bridge");

        self.calibration
            .update_profiles(&profiles, self.device.as_ref());
        self.publish_imu_info(&profiles)?;
        self.publish_extrinsics(&profiles)?;

        if self.config.publish_tf {
            self.transforms
                .compute_all(&profiles, self.device.as_ref(), self.clock.now())?;
            let handle = self.transforms.start(
                self.config.tf_publish_rate,
                Arc::clone(&self.bus),
                Arc::clone(&self.clock),
                self.shutdown_tx.subscribe(),
            )?;
            self.tasks.extend(handle);
        }

        if self.config.monitor.enabled {
            self.tasks.push(spawn_temperature_monitor(
                Arc::clone(&self.device),
                Duration::from_millis(self.config.monitor.interval_ms),
                self.shutdown_tx.subscribe(),
            ));
        }
        Ok(())
    }

    /// Set up and start streaming from `source`
    pub fn start(&mut self, source: Arc<dyn SampleSource>) -> DispatcherResult<()> {
        self.setup()?;

        let dispatcher = Arc::clone(&self.dispatcher);
        let callback: SampleCallback = Arc::new(move |sample| {
            if let Err(e) = dispatcher.on_sample(sample) {
                warn!(error = %e, "sample callback failed");
            }
        });
        source.start(callback);
        self.source = Some(source);
        info!("bridge streaming");
        Ok(())
    }

    /// Stop the source, signal background tasks and wait for them
    #[instrument(name = "driver_node_shutdown", skip(self))]
    pub async fn shutdown(mut self) -> DispatchSnapshot {
        if let Some(source) = self.source.take() {
            source.stop();
        }
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        let snapshot = self.dispatcher.metrics().snapshot();
        info!(
            framesets = snapshot.framesets_processed,
            failed = snapshot.framesets_failed,
            frames = snapshot.frames_published,
            imu = snapshot.imu_published,
            "bridge stopped"
        );
        snapshot
    }

    fn publish_imu_info(&self, profiles: &[StreamProfile]) -> DispatcherResult<()> {
        let stamp = self.clock.now();
        for profile in profiles.iter().filter(|p| p.key.kind.is_motion()) {
            let header = Header::new(stamp, self.names.optical_frame_id(profile.key));
            let info = imu_info(profile, self.device.as_ref(), header);
            self.bus
                .publish(&Channel::ImuInfo(profile.key), Message::ImuInfo(info))?;
        }
        Ok(())
    }

    /// Depth to stream extrinsics, once per video stream
    fn publish_extrinsics(&self, profiles: &[StreamProfile]) -> DispatcherResult<()> {
        let depth_key = StreamKey::new(StreamKind::Depth, 0);
        let Some(depth) = profiles.iter().find(|p| p.key == depth_key) else {
            return Ok(());
        };
        let stamp = self.clock.now();
        let frame_id = self.names.optical_frame_id(depth_key);

        for profile in profiles
            .iter()
            .filter(|p| p.is_video() && p.key != depth_key)
        {
            match self.device.extrinsics(depth, profile) {
                Ok(ex) => {
                    let message = extrinsics_message(&ex, Header::new(stamp, frame_id.clone()));
                    self.bus
                        .publish(&Channel::Extrinsics(profile.key), Message::Extrinsics(message))?;
                }
                Err(ContractError::ExtrinsicsUnavailable { .. }) => {
                    warn!(stream = %profile.key, "no extrinsics from depth, message skipped");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use contracts::{DriverConfig, SystemClock};

    use crate::bus::RecordingBus;
    use crate::testing::{FakeDevice, ManualSource};

    fn node(config: DriverConfig, device: FakeDevice, bus: Arc<RecordingBus>) -> DriverNode {
        DriverNode::new(config, Arc::new(device), bus, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_setup_publishes_static_messages() {
        let bus = Arc::new(RecordingBus::new());
        let mut node = node(DriverConfig::default(), FakeDevice::new(), bus.clone());
        node.setup().unwrap();

        let channels = bus.channels();
        let accel = StreamKey::new(StreamKind::Accel, 0);
        let color = StreamKey::new(StreamKind::Color, 0);
        assert!(channels.contains(&Channel::ImuInfo(accel)));
        assert!(channels.contains(&Channel::Extrinsics(color)));
        assert_eq!(bus.on(&Channel::TfStatic).len(), 1);
        assert!(!node.transforms().is_empty());
        assert!(node.calibration().lookup(color).is_some());

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_setup_without_base_stream_fails() {
        let bus = Arc::new(RecordingBus::new());
        let mut node = node(DriverConfig::default(), FakeDevice::without_depth(), bus);
        let err = node.setup().unwrap_err();
        assert!(err.to_string().contains("base_stream"));
    }

    #[tokio::test]
    async fn test_tf_disabled() {
        let bus = Arc::new(RecordingBus::new());
        let config = DriverConfig {
            publish_tf: false,
            ..DriverConfig::default()
        };
        let mut node = node(config, FakeDevice::without_depth(), bus.clone());
        node.setup().unwrap();
        assert!(bus.on(&Channel::TfStatic).is_empty());
        node.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_tf_stops_on_shutdown() {
        let bus = Arc::new(RecordingBus::new());
        let config = DriverConfig {
            tf_publish_rate: 20.0,
            ..DriverConfig::default()
        };
        let mut node = node(config, FakeDevice::new(), bus.clone());
        node.setup().unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        node.shutdown().await;
        let ticks = bus.on(&Channel::Tf).len();
        assert!(ticks >= 2, "got {ticks} ticks");
        assert!(bus.on(&Channel::TfStatic).is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(bus.on(&Channel::Tf).len(), ticks);
    }

    #[tokio::test]
    async fn test_start_routes_samples() {
        let bus = Arc::new(RecordingBus::new());
        let mut node = node(DriverConfig::default(), FakeDevice::new(), bus.clone());
        let source = Arc::new(ManualSource::default());
        node.start(source.clone()).unwrap();
        assert!(source.is_streaming());

        source.emit(FakeDevice::frameset(1, 10.0));
        let depth = StreamKey::new(StreamKind::Depth, 0);
        assert_eq!(bus.on(&Channel::Image(depth)).len(), 1);

        let snapshot = node.shutdown().await;
        assert!(!source.is_streaming());
        assert_eq!(snapshot.framesets_processed, 1);
    }
}
