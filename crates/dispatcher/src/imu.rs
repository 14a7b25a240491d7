//! Inertial path: per-axis messages or combined accel + gyro messages.

use std::sync::{Arc, Mutex};

use contracts::{
    read_record, Channel, Frame, FramePayload, ImuCovariance, ImuMessage, Message, MessageBus,
    MotionReading,
};
use nalgebra::Vector3 as Vec3;
use sync_engine::{empty_imu_message, ClockBase, ImuAxis, ImuSynchronizer, InertialSample, PausableSink};
use tracing::{instrument, trace};
use transforms::FrameNames;

use crate::error::{DispatcherError, DispatcherResult};
use crate::metrics::DispatchMetrics;

/// Routes accel/gyro samples to the bus
pub struct ImuRouter {
    names: FrameNames,
    covariance: ImuCovariance,
    clock: Arc<ClockBase>,
    /// Shared by accel and gyro callbacks
    synchronizer: Option<Mutex<ImuSynchronizer>>,
    synced_sink: Arc<PausableSink<ImuMessage>>,
    bus: Arc<dyn MessageBus>,
    metrics: Arc<DispatchMetrics>,
}

impl std::fmt::Debug for ImuRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImuRouter")
            .field("synced", &self.synchronizer.is_some())
            .field("sink", &self.synced_sink)
            .finish()
    }
}

impl ImuRouter {
    pub fn new(
        names: FrameNames,
        covariance: ImuCovariance,
        clock: Arc<ClockBase>,
        synchronizer: Option<ImuSynchronizer>,
        synced_sink: Arc<PausableSink<ImuMessage>>,
        bus: Arc<dyn MessageBus>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            names,
            covariance,
            clock,
            synchronizer: synchronizer.map(Mutex::new),
            synced_sink,
            bus,
            metrics,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synchronizer.is_some()
    }

    /// Handle one motion sample; returns the number of messages handed to the bus
    #[instrument(
        level = "trace",
        name = "imu_router_handle",
        skip(self, frame),
        fields(stream = %frame.key(), frame_number = frame.frame_number)
    )]
    pub fn handle(&self, frame: &Frame) -> DispatcherResult<usize> {
        let axis = ImuAxis::from_kind(frame.kind())
            .ok_or_else(|| DispatcherError::unexpected_sample(frame.key()))?;
        match &self.synchronizer {
            Some(synchronizer) => self.handle_synced(synchronizer, axis, frame),
            None => self.handle_single(axis, frame),
        }
    }

    fn reading(frame: &Frame) -> DispatcherResult<Vec3<f64>> {
        let FramePayload::Motion(bytes) = &frame.payload else {
            return Err(DispatcherError::unexpected_sample(frame.key()));
        };
        let reading: MotionReading = read_record(frame.key(), bytes)?;
        Ok(Vec3::new(reading.x as f64, reading.y as f64, reading.z as f64))
    }

    fn handle_synced(
        &self,
        synchronizer: &Mutex<ImuSynchronizer>,
        axis: ImuAxis,
        frame: &Frame,
    ) -> DispatcherResult<usize> {
        let mut synchronizer = synchronizer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !self.bus.has_subscribers(&Channel::SyncedImu) {
            self.skip(frame);
            return Ok(0);
        }

        let time_ns = self.clock.elapsed_ns(frame.timestamp_ms);
        let sample = InertialSample::new(axis, Self::reading(frame)?, time_ns);
        let unified = synchronizer.ingest(sample);
        let frame_id = self.names.imu_optical_frame_id();

        let count = unified.len();
        for entry in unified {
            let stamp = self.clock.bus_time_from_elapsed(entry.time_ns);
            self.synced_sink
                .publish(entry.into_message(stamp, &frame_id, &self.covariance))?;
            observability::record_imu_published(true);
        }
        self.metrics.inc_imu_published(count as u64);
        trace!(axis = ?axis, count, "united imu messages");
        Ok(count)
    }

    fn handle_single(&self, axis: ImuAxis, frame: &Frame) -> DispatcherResult<usize> {
        let key = frame.key();
        let channel = Channel::Imu(key);
        if !self.bus.has_subscribers(&channel) {
            self.skip(frame);
            return Ok(0);
        }

        let reading = Self::reading(frame)?;
        let stamp = self.clock.to_bus_time(frame.timestamp_ms);
        let mut message = empty_imu_message(
            stamp,
            &self.names.optical_frame_id(key),
            &self.covariance,
        );
        let vector = transforms::axes::to_vector(&reading);
        match axis {
            ImuAxis::Accel => message.linear_acceleration = vector,
            ImuAxis::Gyro => message.angular_velocity = vector,
        }

        self.bus.publish(&channel, Message::Imu(message))?;
        observability::record_imu_published(false);
        self.metrics.inc_imu_published(1);
        Ok(1)
    }

    fn skip(&self, frame: &Frame) {
        observability::record_sample_skipped(&frame.key().name());
        self.metrics.inc_samples_skipped();
    }
}
