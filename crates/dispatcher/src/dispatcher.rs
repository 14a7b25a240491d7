//! FrameDispatcher - classifies device samples and routes them to the bus

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use calibration::CalibrationRegistry;
use contracts::{
    Channel, DeviceService, DriverConfig, Frame, FrameFilter, FramePayload, Frameset, ImuMessage,
    Message, MessageBus, Sample, Stamp, StreamKey, StreamKind,
};
use sync_engine::{ClockBase, ImuSynchronizer, PausableSink, Publisher};
use tracing::{debug, error, info, instrument, trace, warn};
use transforms::FrameNames;

use crate::clip::clip_depth;
use crate::error::{DispatcherError, DispatcherResult};
use crate::imu::ImuRouter;
use crate::metrics::DispatchMetrics;
use crate::pipeline::FilterPipeline;
use crate::pose::PoseRouter;
use crate::publish::ImagePublisher;

/// Name of the gate in front of the combined inertial channel
pub const SYNCED_IMU_SINK: &str = "synced_imu";

/// Indices of the frames that survive into the publish set
///
/// A later frame with the same (kind, index) replaces the earlier one in the
/// earlier one's slot. Only the first point cloud is kept.
pub fn dedup_indices(frames: &[Frame]) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(frames.len());
    let mut slots: HashMap<StreamKey, usize> = HashMap::new();
    let mut points_seen = false;

    for (i, frame) in frames.iter().enumerate() {
        if frame.is_points() {
            if !points_seen {
                points_seen = true;
                selected.push(i);
            }
            continue;
        }
        match slots.get(&frame.key()) {
            Some(&slot) => selected[slot] = i,
            None => {
                slots.insert(frame.key(), selected.len());
                selected.push(i);
            }
        }
    }
    selected
}

/// Top-level sample callback
pub struct FrameDispatcher {
    names: FrameNames,
    device: Arc<dyn DeviceService>,
    bus: Arc<dyn MessageBus>,
    clock: Arc<ClockBase>,
    pipeline: FilterPipeline,
    images: ImagePublisher,
    imu: ImuRouter,
    pose: PoseRouter,
    synced_sink: Arc<PausableSink<ImuMessage>>,
    /// One align block per target stream kind, created on first use
    align_blocks: Mutex<HashMap<StreamKind, Arc<dyn FrameFilter>>>,
    clip_distance: f32,
    align_depth: bool,
    depth_scale: f32,
    metrics: Arc<DispatchMetrics>,
}

impl std::fmt::Debug for FrameDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDispatcher")
            .field("device", &self.device.name())
            .field("pipeline", &self.pipeline)
            .field("clip_distance", &self.clip_distance)
            .field("align_depth", &self.align_depth)
            .finish()
    }
}

impl FrameDispatcher {
    #[instrument(name = "frame_dispatcher_new", skip_all, fields(device = %device.name()))]
    pub fn new(
        config: &DriverConfig,
        device: Arc<dyn DeviceService>,
        bus: Arc<dyn MessageBus>,
        clock: Arc<ClockBase>,
        calibration: Arc<CalibrationRegistry>,
    ) -> Self {
        let names = FrameNames::new(&config.camera_name);
        let metrics = Arc::new(DispatchMetrics::new());
        let depth_scale = device.depth_scale();

        let synchronizer = ImuSynchronizer::for_method(config.unite_imu_method);
        let sink_bus = Arc::clone(&bus);
        let publisher: Publisher<ImuMessage> = Arc::new(move |message| {
            sink_bus.publish(&Channel::SyncedImu, Message::Imu(message))
        });
        let synced_sink = Arc::new(PausableSink::new(
            SYNCED_IMU_SINK,
            config.imu_queue_capacity,
            synchronizer.is_some(),
            publisher,
        ));

        let pipeline =
            FilterPipeline::from_config(&config.filters, device.as_ref(), &config.pointcloud);

        info!(
            unite_imu_method = ?config.unite_imu_method,
            clip_distance = config.clip_distance,
            align_depth = config.align_depth,
            depth_scale,
            "frame dispatcher ready"
        );

        Self {
            images: ImagePublisher::new(names.clone(), calibration, depth_scale),
            imu: ImuRouter::new(
                names.clone(),
                config.imu,
                Arc::clone(&clock),
                synchronizer,
                Arc::clone(&synced_sink),
                Arc::clone(&bus),
                Arc::clone(&metrics),
            ),
            pose: PoseRouter::new(
                names.clone(),
                Arc::clone(&clock),
                Arc::clone(&bus),
                config.publish_odom_tf,
                config.imu,
                Arc::clone(&metrics),
            ),
            names,
            device,
            bus,
            clock,
            pipeline,
            synced_sink,
            align_blocks: Mutex::new(HashMap::new()),
            clip_distance: config.clip_distance,
            align_depth: config.align_depth,
            depth_scale,
            metrics,
        }
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    pub fn clock(&self) -> &Arc<ClockBase> {
        &self.clock
    }

    pub fn synced_sink(&self) -> &Arc<PausableSink<ImuMessage>> {
        &self.synced_sink
    }

    /// Entry point of the device callback
    ///
    /// Frameset errors are logged and swallowed. Errors of single video,
    /// motion and pose samples are returned to the caller.
    pub fn on_sample(&self, sample: Sample) -> DispatcherResult<()> {
        match sample {
            Sample::Frameset(frameset) => {
                self.on_frameset(frameset);
                Ok(())
            }
            Sample::Frame(frame) => self.on_frame(frame),
        }
    }

    fn on_frame(&self, frame: Frame) -> DispatcherResult<()> {
        self.clock
            .ensure_initialized(frame.timestamp_ms, frame.metadata_available());
        match &frame.payload {
            FramePayload::Motion(_) => self.imu.handle(&frame).map(|_| ()),
            FramePayload::Pose(_) => self.pose.handle(&frame),
            FramePayload::Video(_) => self.on_video_frame(frame),
            FramePayload::Points(_) => Err(DispatcherError::unexpected_sample(frame.key())),
        }
    }

    /// Single video frame outside a frameset
    #[instrument(
        level = "trace",
        name = "frame_dispatcher_video",
        skip(self, frame),
        fields(stream = %frame.key(), frame_number = frame.frame_number)
    )]
    fn on_video_frame(&self, mut frame: Frame) -> DispatcherResult<()> {
        let guard = self.synced_sink.pause_guard();
        let stamp = self.clock.to_bus_time(frame.timestamp_ms);
        self.clip(&mut frame);
        let published = self.images.publish_frame(&frame, stamp, self.bus.as_ref());
        guard.resume()?;
        if published? {
            self.metrics.inc_frames_published();
        }
        Ok(())
    }

    /// Composite frameset; inertial delivery is held until it is published
    #[instrument(
        level = "trace",
        name = "frame_dispatcher_frameset",
        skip(self, frameset),
        fields(frames = frameset.len())
    )]
    fn on_frameset(&self, frameset: Frameset) {
        let started = Instant::now();
        let guard = self.synced_sink.pause_guard();

        let result = self.process_frameset(frameset);

        if let Err(e) = guard.resume() {
            error!(error = %e, "failed to flush inertial messages after frameset");
        }

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(published) => {
                trace!(published, latency_ms, "frameset dispatched");
                self.metrics.record_frameset(true, latency_ms);
            }
            Err(e) => {
                error!(error = %e, "An error has occurred during frame callback");
                self.metrics.record_frameset(false, latency_ms);
            }
        }
    }

    fn process_frameset(&self, mut frameset: Frameset) -> DispatcherResult<usize> {
        let Some(timestamp_ms) = frameset.timestamp_ms() else {
            debug!("empty frameset");
            return Ok(0);
        };
        let metadata_available = frameset
            .frames
            .first()
            .is_some_and(Frame::metadata_available);
        self.clock
            .ensure_initialized(timestamp_ms, metadata_available);
        let stamp = self.clock.to_bus_time(timestamp_ms);

        if let Some(depth) = frameset.first_mut(StreamKind::Depth) {
            self.clip(depth);
        }
        let depth_arrived = self.align_depth && frameset.frames.iter().any(Frame::is_depth_z16);

        let filtered = self.pipeline.process(frameset)?;

        let mut published = 0;
        for index in dedup_indices(&filtered.frames) {
            let frame = &filtered.frames[index];
            let sent = match &frame.payload {
                FramePayload::Points(points) => self.publish_points(points, stamp, &filtered)?,
                _ => self.images.publish_frame(frame, stamp, self.bus.as_ref())?,
            };
            if sent {
                published += 1;
                self.metrics.inc_frames_published();
            }
        }

        if depth_arrived {
            published += self.publish_aligned_depth(&filtered, stamp)?;
        }
        Ok(published)
    }

    fn clip(&self, frame: &mut Frame) {
        if self.clip_distance <= 0.0 || !frame.is_depth_z16() {
            return;
        }
        let (depth_scale, clip_distance) = (self.depth_scale, self.clip_distance);
        if let Some(video) = frame.video_mut() {
            let cleared = clip_depth(&mut video.data, video.width, depth_scale, clip_distance);
            observability::record_depth_clipped(cleared);
        }
    }

    fn publish_points(
        &self,
        points: &contracts::PointsBuffer,
        stamp: Stamp,
        frameset: &Frameset,
    ) -> DispatcherResult<bool> {
        let Some(filter) = self.pipeline.point_cloud() else {
            warn!("point cloud frame without a point cloud stage, dropped");
            return Ok(false);
        };
        let frame_id = self
            .names
            .optical_frame_id(StreamKey::new(StreamKind::Depth, 0));
        Ok(filter.publish(points, stamp, frameset, &frame_id, self.bus.as_ref())?)
    }

    fn align_block(&self, kind: StreamKind) -> Arc<dyn FrameFilter> {
        let mut blocks = self
            .align_blocks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(blocks.entry(kind).or_insert_with(|| {
            debug!(target_stream = %kind.as_str(), "allocating align block");
            self.device.align_to(kind)
        }))
    }

    /// Depth re-projected into every other video stream of the frameset
    fn publish_aligned_depth(&self, frameset: &Frameset, stamp: Stamp) -> DispatcherResult<usize> {
        let mut published = 0;
        for target in &frameset.frames {
            let key = target.key();
            if matches!(key.kind, StreamKind::Depth | StreamKind::Confidence)
                || key.index > 1
                || target.video().is_none()
            {
                continue;
            }
            if !self.bus.has_subscribers(&Channel::AlignedDepthImage(key))
                && !self.bus.has_subscribers(&Channel::AlignedDepthInfo(key))
            {
                continue;
            }

            let aligned = self.align_block(key.kind).process(frameset.clone())?;
            let Some(depth) = aligned.frames.iter().find(|f| f.is_depth_z16()) else {
                debug!(target_stream = %key, "align produced no depth frame");
                continue;
            };
            if self
                .images
                .publish_aligned(depth, &target.profile, stamp, self.bus.as_ref())?
            {
                published += 1;
            }
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use contracts::{
        ContractError, PixelFormat, PointsBuffer, StreamProfile, SystemClock, TimestampDomain,
        VideoBuffer,
    };

    use crate::bus::RecordingBus;
    use crate::testing::{motion_frame, video_frame, FakeDevice};

    fn frame(kind: StreamKind, format: PixelFormat, number: u64) -> Frame {
        Frame {
            profile: Arc::new(StreamProfile {
                key: StreamKey::new(kind, 0),
                format,
                width: 1,
                height: 1,
                fps: 30,
                intrinsics: None,
            }),
            timestamp_ms: 0.0,
            domain: TimestampDomain::HardwareClock,
            frame_number: number,
            payload: FramePayload::Video(VideoBuffer {
                width: 1,
                height: 1,
                bpp: format.bytes_per_pixel().unwrap_or(1),
                data: vec![0; format.bytes_per_pixel().unwrap_or(1) as usize],
            }),
        }
    }

    fn points(number: u64) -> Frame {
        let mut f = frame(StreamKind::Depth, PixelFormat::Xyz32f, number);
        f.payload = FramePayload::Points(PointsBuffer::default());
        f
    }

    #[test]
    fn test_dedup_later_wins_in_earlier_slot() {
        let frames = vec![
            frame(StreamKind::Depth, PixelFormat::Z16, 0),
            frame(StreamKind::Color, PixelFormat::Rgb8, 1),
            frame(StreamKind::Depth, PixelFormat::Rgb8, 2),
        ];
        let selected = dedup_indices(&frames);
        assert_eq!(selected, vec![2, 1]);
        assert_eq!(frames[selected[0]].format(), PixelFormat::Rgb8);
    }

    #[test]
    fn test_dedup_first_point_cloud_only() {
        let frames = vec![
            points(0),
            frame(StreamKind::Depth, PixelFormat::Z16, 1),
            points(2),
        ];
        assert_eq!(dedup_indices(&frames), vec![0, 1]);
    }

    fn dispatcher_with(config: DriverConfig, device: Arc<dyn DeviceService>, bus: Arc<RecordingBus>) -> FrameDispatcher {
        FrameDispatcher::new(
            &config,
            device,
            bus,
            Arc::new(ClockBase::new(Arc::new(SystemClock))),
            Arc::new(CalibrationRegistry::new()),
        )
    }

    fn depth_values(message: &Message) -> Vec<u16> {
        let Message::Image(image) = message else {
            panic!("expected image");
        };
        image
            .data
            .chunks_exact(2)
            .map(|p| u16::from_le_bytes([p[0], p[1]]))
            .collect()
    }

    #[test]
    fn test_frameset_clipped_and_published() {
        let bus = Arc::new(RecordingBus::new());
        let config = DriverConfig {
            clip_distance: 0.5,
            ..DriverConfig::default()
        };
        let dispatcher = dispatcher_with(config, Arc::new(FakeDevice::new()), bus.clone());
        dispatcher.on_sample(FakeDevice::frameset(1, 100.0)).unwrap();

        let depth = StreamKey::new(StreamKind::Depth, 0);
        let color = StreamKey::new(StreamKind::Color, 0);
        assert_eq!(
            bus.channels(),
            vec![
                Channel::CameraInfo(depth),
                Channel::Image(depth),
                Channel::CameraInfo(color),
                Channel::Image(color),
            ]
        );
        assert!(depth_values(&bus.on(&Channel::Image(depth))[0])
            .iter()
            .all(|&v| v == 0));
        assert!(dispatcher.clock().is_initialized());
        assert_eq!(dispatcher.metrics().snapshot().frames_published, 2);
    }

    #[test]
    fn test_aligned_depth_to_color() {
        let bus = Arc::new(RecordingBus::new());
        let config = DriverConfig {
            align_depth: true,
            ..DriverConfig::default()
        };
        let dispatcher = dispatcher_with(config, Arc::new(FakeDevice::new()), bus.clone());
        dispatcher.on_sample(FakeDevice::frameset(1, 0.0)).unwrap();

        let color = StreamKey::new(StreamKind::Color, 0);
        let aligned = bus.on(&Channel::AlignedDepthImage(color));
        assert_eq!(aligned.len(), 1);
        let Message::Image(image) = &aligned[0] else {
            panic!("expected image");
        };
        assert_eq!(image.encoding, "16UC1");
        assert_eq!(image.header.frame_id, "camera_color_optical_frame");
        assert_eq!(bus.on(&Channel::AlignedDepthInfo(color)).len(), 1);
        assert!(bus
            .on(&Channel::AlignedDepthImage(StreamKey::new(StreamKind::Depth, 0)))
            .is_empty());
    }

    #[test]
    fn test_aligned_depth_needs_subscribers() {
        let bus = Arc::new(RecordingBus::new());
        let color = StreamKey::new(StreamKind::Color, 0);
        bus.set_subscribers(Channel::AlignedDepthImage(color), 0);
        bus.set_subscribers(Channel::AlignedDepthInfo(color), 0);
        let config = DriverConfig {
            align_depth: true,
            ..DriverConfig::default()
        };
        let dispatcher = dispatcher_with(config, Arc::new(FakeDevice::new()), bus.clone());
        dispatcher.on_sample(FakeDevice::frameset(1, 0.0)).unwrap();
        assert!(bus.on(&Channel::AlignedDepthImage(color)).is_empty());
    }

    /// Fails every frameset
    struct Failing;

    impl FrameFilter for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn process(&self, _frameset: Frameset) -> Result<Frameset, ContractError> {
            Err(ContractError::device("block failed"))
        }
    }

    /// Device whose only block fails
    struct FailingDevice(FakeDevice);

    impl DeviceService for FailingDevice {
        fn name(&self) -> &str {
            "failing"
        }

        fn stream_profiles(&self) -> Vec<StreamProfile> {
            self.0.stream_profiles()
        }

        fn extrinsics(
            &self,
            from: &StreamProfile,
            to: &StreamProfile,
        ) -> Result<contracts::Extrinsics, ContractError> {
            self.0.extrinsics(from, to)
        }

        fn motion_intrinsics(
            &self,
            profile: &StreamProfile,
        ) -> Result<contracts::MotionIntrinsics, ContractError> {
            self.0.motion_intrinsics(profile)
        }

        fn depth_scale(&self) -> f32 {
            self.0.depth_scale()
        }

        fn option_value(&self, option: contracts::DeviceOption) -> Result<f32, ContractError> {
            self.0.option_value(option)
        }

        fn processing_block(&self, _tag: contracts::StageTag) -> Option<Arc<dyn FrameFilter>> {
            Some(Arc::new(Failing))
        }

        fn align_to(&self, target: StreamKind) -> Arc<dyn FrameFilter> {
            self.0.align_to(target)
        }
    }

    #[test]
    fn test_frameset_error_caught_and_gate_resumed() {
        let bus = Arc::new(RecordingBus::new());
        let mut config = DriverConfig {
            unite_imu_method: contracts::ImuSyncMethod::Copy,
            ..DriverConfig::default()
        };
        config.filters = vec![contracts::FilterConfig {
            name: contracts::StageTag::Decimation,
            enabled: true,
        }];
        let dispatcher =
            dispatcher_with(config, Arc::new(FailingDevice(FakeDevice::new())), bus.clone());

        assert!(dispatcher.on_sample(FakeDevice::frameset(1, 0.0)).is_ok());
        assert!(!dispatcher.synced_sink().is_paused());
        assert_eq!(dispatcher.metrics().framesets_failed(), 1);
        assert!(bus.is_empty());

        // inertial path still flows
        dispatcher
            .on_sample(Sample::Frame(motion_frame(StreamKind::Accel, [0.0, 0.0, 9.8], 1.0)))
            .unwrap();
        dispatcher
            .on_sample(Sample::Frame(motion_frame(StreamKind::Gyro, [0.1, 0.0, 0.0], 2.0)))
            .unwrap();
        assert_eq!(bus.on(&Channel::SyncedImu).len(), 1);
    }

    #[test]
    fn test_single_depth_frame_clipped() {
        let bus = Arc::new(RecordingBus::new());
        let config = DriverConfig {
            clip_distance: 0.5,
            ..DriverConfig::default()
        };
        let dispatcher = dispatcher_with(config, Arc::new(FakeDevice::new()), bus.clone());
        let data: Vec<u8> = [400u16, 600, 500, 501, 1, 2, 3, 4]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let frame = video_frame(StreamKind::Depth, 0, PixelFormat::Z16, data, 1, 5.0);
        dispatcher.on_sample(Sample::Frame(frame)).unwrap();

        let depth = StreamKey::new(StreamKind::Depth, 0);
        assert_eq!(
            depth_values(&bus.on(&Channel::Image(depth))[0]),
            vec![400, 0, 500, 0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_lone_points_frame_rejected() {
        let bus = Arc::new(RecordingBus::new());
        let dispatcher =
            dispatcher_with(DriverConfig::default(), Arc::new(FakeDevice::new()), bus);
        assert!(matches!(
            dispatcher.on_sample(Sample::Frame(points(0))),
            Err(DispatcherError::UnexpectedSample { .. })
        ));
    }

    #[test]
    fn test_dedup_distinct_keys_kept() {
        let frames = vec![
            frame(StreamKind::Depth, PixelFormat::Z16, 0),
            frame(StreamKind::Color, PixelFormat::Rgb8, 1),
            frame(StreamKind::Infrared, PixelFormat::Y8, 2),
        ];
        assert_eq!(dedup_indices(&frames), vec![0, 1, 2]);
        assert!(dedup_indices(&[]).is_empty());
    }
}
