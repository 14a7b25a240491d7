//! Test doubles shared by the dispatcher unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{
    ContractError, DeviceOption, DeviceService, DistortionModel, Extrinsics, Frame,
    FrameFilter, FramePayload, Frameset, Intrinsics, MotionIntrinsics, MotionReading, PixelFormat,
    Sample, SampleCallback, SampleSource, StageTag, StreamKey, StreamKind, StreamProfile,
    TimestampDomain, VideoBuffer,
};

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;

/// Returns the frameset unchanged
pub struct PassThrough(pub &'static str);

impl FrameFilter for PassThrough {
    fn name(&self) -> &str {
        self.0
    }

    fn process(&self, frameset: Frameset) -> Result<Frameset, ContractError> {
        Ok(frameset)
    }
}

/// Depth, color, stereo infrared and motion profiles with fixed extrinsics
pub struct FakeDevice {
    profiles: Vec<StreamProfile>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let mut profiles = vec![video_profile(StreamKind::Depth, 0, PixelFormat::Z16)];
        profiles.extend(Self::without_depth().profiles);
        Self { profiles }
    }

    pub fn without_depth() -> Self {
        Self {
            profiles: vec![
                video_profile(StreamKind::Color, 0, PixelFormat::Rgb8),
                video_profile(StreamKind::Infrared, 1, PixelFormat::Y8),
                video_profile(StreamKind::Infrared, 2, PixelFormat::Y8),
                motion_profile(StreamKind::Accel),
                motion_profile(StreamKind::Gyro),
            ],
        }
    }

    /// Depth (1 m everywhere) + color frameset
    pub fn frameset(number: u64, timestamp_ms: f64) -> Sample {
        let depth: Vec<u8> = (0..WIDTH * HEIGHT)
            .flat_map(|_| 1000u16.to_le_bytes())
            .collect();
        Sample::Frameset(Frameset::new(vec![
            video_frame(StreamKind::Depth, 0, PixelFormat::Z16, depth, number, timestamp_ms),
            video_frame(
                StreamKind::Color,
                0,
                PixelFormat::Rgb8,
                vec![128; (WIDTH * HEIGHT * 3) as usize],
                number,
                timestamp_ms,
            ),
        ]))
    }
}

pub fn video_profile(kind: StreamKind, index: u8, format: PixelFormat) -> StreamProfile {
    StreamProfile {
        key: StreamKey::new(kind, index),
        format,
        width: WIDTH,
        height: HEIGHT,
        fps: 30,
        intrinsics: Some(Intrinsics {
            width: WIDTH,
            height: HEIGHT,
            fx: 2.0,
            fy: 2.0,
            ppx: 2.0,
            ppy: 1.0,
            model: DistortionModel::BrownConrady,
            coeffs: [0.0; 5],
        }),
    }
}

pub fn motion_profile(kind: StreamKind) -> StreamProfile {
    StreamProfile {
        key: StreamKey::new(kind, 0),
        format: PixelFormat::MotionXyz32f,
        width: 0,
        height: 0,
        fps: 200,
        intrinsics: None,
    }
}

pub fn video_frame(
    kind: StreamKind,
    index: u8,
    format: PixelFormat,
    data: Vec<u8>,
    number: u64,
    timestamp_ms: f64,
) -> Frame {
    let bpp = format.bytes_per_pixel().unwrap_or(1);
    Frame {
        profile: Arc::new(video_profile(kind, index, format)),
        timestamp_ms,
        domain: TimestampDomain::HardwareClock,
        frame_number: number,
        payload: FramePayload::Video(VideoBuffer {
            width: WIDTH,
            height: HEIGHT,
            bpp,
            data,
        }),
    }
}

pub fn motion_frame(kind: StreamKind, reading: [f32; 3], timestamp_ms: f64) -> Frame {
    let record = MotionReading {
        x: reading[0],
        y: reading[1],
        z: reading[2],
    };
    Frame {
        profile: Arc::new(motion_profile(kind)),
        timestamp_ms,
        domain: TimestampDomain::HardwareClock,
        frame_number: 0,
        payload: FramePayload::Motion(Bytes::copy_from_slice(bytemuck::bytes_of(&record))),
    }
}

impl DeviceService for FakeDevice {
    fn name(&self) -> &str {
        "fake"
    }

    fn stream_profiles(&self) -> Vec<StreamProfile> {
        self.profiles.clone()
    }

    fn extrinsics(
        &self,
        from: &StreamProfile,
        to: &StreamProfile,
    ) -> Result<Extrinsics, ContractError> {
        if from.key == to.key {
            return Ok(Extrinsics::identity());
        }
        if from.key.kind.is_motion() || to.key.kind.is_motion() {
            return Err(ContractError::extrinsics_unavailable(
                from.key.name(),
                to.key.name(),
            ));
        }
        Ok(Extrinsics {
            rotation: Extrinsics::IDENTITY_ROTATION,
            translation: [0.05, 0.0, 0.0],
        })
    }

    fn motion_intrinsics(&self, profile: &StreamProfile) -> Result<MotionIntrinsics, ContractError> {
        Err(ContractError::MotionIntrinsicsUnavailable {
            stream: profile.key.name(),
        })
    }

    fn depth_scale(&self) -> f32 {
        0.001
    }

    fn option_value(&self, option: DeviceOption) -> Result<f32, ContractError> {
        match option {
            DeviceOption::AsicTemperature => Ok(41.5),
            DeviceOption::ProjectorTemperature => Err(ContractError::OptionUnsupported {
                option: option.to_string(),
            }),
        }
    }

    fn processing_block(&self, tag: StageTag) -> Option<Arc<dyn FrameFilter>> {
        Some(Arc::new(PassThrough(tag.as_str())))
    }

    fn align_to(&self, _target: StreamKind) -> Arc<dyn FrameFilter> {
        Arc::new(PassThrough("align"))
    }
}

/// Source driven by the test through [`ManualSource::emit`]
#[derive(Default)]
pub struct ManualSource {
    callback: Mutex<Option<SampleCallback>>,
    streaming: AtomicBool,
}

impl ManualSource {
    pub fn emit(&self, sample: Sample) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(sample);
        }
    }
}

impl SampleSource for ManualSource {
    fn start(&self, callback: SampleCallback) {
        if self.streaming.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn stop(&self) {
        self.streaming.store(false, Ordering::SeqCst);
        self.callback.lock().unwrap().take();
    }

    fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }
}
