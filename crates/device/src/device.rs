//! SimulatedDevice - a fixed stereo depth rig described by `DeviceConfig`

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{
    ContractError, DeviceConfig, DeviceOption, DeviceService, DistortionModel, Extrinsics,
    FrameFilter, Intrinsics, MotionIntrinsics, PixelFormat, StageTag, StreamKey, StreamKind,
    StreamProfile,
};
use tracing::{debug, info, instrument, warn};

use crate::blocks::{Align, Colorizer, Decimation, PassThrough, PointCloud};
use crate::error::{DeviceError, DeviceResult};

/// Distance between the two infrared imagers (meters)
pub const STEREO_BASELINE: f32 = 0.05;

/// Pose stream rate (Hz)
pub const POSE_RATE_HZ: u32 = 200;

/// Decimation factor of the reference block
pub const DECIMATION_FACTOR: u32 = 2;

const COLOR_OFFSET: [f32; 3] = [0.015, 0.0, 0.0];
const IMU_OFFSET: [f32; 3] = [-0.0117, -0.0055, 0.0001];

const ASIC_TEMPERATURE: f32 = 38.5;
const PROJECTOR_TEMPERATURE: f32 = 34.0;

pub struct SimulatedDevice {
    config: DeviceConfig,
    profiles: Vec<Arc<StreamProfile>>,
    /// Sensor origins in the depth frame
    positions: HashMap<StreamKey, [f32; 3]>,
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("profiles", &self.profiles.len())
            .field("width", &self.config.width)
            .field("height", &self.config.height)
            .field("fps", &self.config.fps)
            .finish()
    }
}

impl SimulatedDevice {
    #[instrument(name = "simulated_device_new", skip(config))]
    pub fn new(config: DeviceConfig) -> DeviceResult<Self> {
        validate(&config)?;

        let mut profiles = vec![
            video_profile(&config, StreamKey::new(StreamKind::Depth, 0), PixelFormat::Z16),
            video_profile(&config, StreamKey::new(StreamKind::Color, 0), PixelFormat::Rgb8),
        ];
        let mut positions = HashMap::from([
            (StreamKey::new(StreamKind::Depth, 0), [0.0; 3]),
            (StreamKey::new(StreamKind::Color, 0), COLOR_OFFSET),
            (StreamKey::new(StreamKind::Accel, 0), IMU_OFFSET),
            (StreamKey::new(StreamKind::Gyro, 0), IMU_OFFSET),
        ]);

        if config.enable_infrared {
            for (index, x) in [(1, 0.0), (2, STEREO_BASELINE)] {
                let key = StreamKey::new(StreamKind::Infrared, index);
                profiles.push(video_profile(&config, key, PixelFormat::Y8));
                positions.insert(key, [x, 0.0, 0.0]);
            }
        }

        profiles.push(motion_profile(StreamKind::Accel, config.accel_hz));
        profiles.push(motion_profile(StreamKind::Gyro, config.gyro_hz));

        if config.enable_pose {
            // no calibrated relation to the other sensors
            profiles.push(Arc::new(StreamProfile {
                key: StreamKey::new(StreamKind::Pose, 0),
                format: PixelFormat::SixDof,
                width: 0,
                height: 0,
                fps: POSE_RATE_HZ,
                intrinsics: None,
            }));
        }

        info!(
            profiles = profiles.len(),
            width = config.width,
            height = config.height,
            fps = config.fps,
            "simulated device created"
        );

        Ok(Self {
            config,
            profiles,
            positions,
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn profiles(&self) -> &[Arc<StreamProfile>] {
        &self.profiles
    }

    pub fn profile(&self, key: StreamKey) -> Option<Arc<StreamProfile>> {
        self.profiles.iter().find(|p| p.key == key).cloned()
    }

    fn first_of_kind(&self, kind: StreamKind) -> Option<Arc<StreamProfile>> {
        self.profiles.iter().find(|p| p.key.kind == kind).cloned()
    }

    fn extrinsics_between(&self, from: StreamKey, to: StreamKey) -> Result<Extrinsics, ContractError> {
        match (self.positions.get(&from), self.positions.get(&to)) {
            (Some(a), Some(b)) => Ok(Extrinsics {
                rotation: Extrinsics::IDENTITY_ROTATION,
                translation: [a[0] - b[0], a[1] - b[1], a[2] - b[2]],
            }),
            _ => Err(ContractError::extrinsics_unavailable(from.name(), to.name())),
        }
    }
}

fn validate(config: &DeviceConfig) -> DeviceResult<()> {
    if config.width == 0 || config.height == 0 {
        return Err(DeviceError::invalid_config("device.width", "resolution must be > 0"));
    }
    if config.fps == 0 || config.accel_hz == 0 || config.gyro_hz == 0 {
        return Err(DeviceError::invalid_config("device.fps", "rates must be > 0"));
    }
    if config.depth_scale.is_nan() || config.depth_scale <= 0.0 {
        return Err(DeviceError::invalid_config("device.depth_scale", "must be > 0"));
    }
    Ok(())
}

fn video_profile(config: &DeviceConfig, key: StreamKey, format: PixelFormat) -> Arc<StreamProfile> {
    let (width, height) = (config.width, config.height);
    let focal = width as f32 * 0.6;
    let model = match key.kind {
        StreamKind::Color => DistortionModel::InverseBrownConrady,
        _ => DistortionModel::BrownConrady,
    };
    Arc::new(StreamProfile {
        key,
        format,
        width,
        height,
        fps: config.fps,
        intrinsics: Some(Intrinsics {
            width,
            height,
            fx: focal,
            fy: focal,
            ppx: width as f32 / 2.0,
            ppy: height as f32 / 2.0,
            model,
            coeffs: [0.0; 5],
        }),
    })
}

fn motion_profile(kind: StreamKind, rate_hz: u32) -> Arc<StreamProfile> {
    Arc::new(StreamProfile {
        key: StreamKey::new(kind, 0),
        format: PixelFormat::MotionXyz32f,
        width: 0,
        height: 0,
        fps: rate_hz,
        intrinsics: None,
    })
}

impl DeviceService for SimulatedDevice {
    fn name(&self) -> &str {
        "simulated"
    }

    fn stream_profiles(&self) -> Vec<StreamProfile> {
        self.profiles.iter().map(|p| p.as_ref().clone()).collect()
    }

    fn extrinsics(
        &self,
        from: &StreamProfile,
        to: &StreamProfile,
    ) -> Result<Extrinsics, ContractError> {
        self.extrinsics_between(from.key, to.key)
    }

    fn motion_intrinsics(&self, profile: &StreamProfile) -> Result<MotionIntrinsics, ContractError> {
        let noise = match profile.key.kind {
            StreamKind::Accel => 1.0e-4,
            StreamKind::Gyro => 1.0e-5,
            _ => {
                return Err(ContractError::MotionIntrinsicsUnavailable {
                    stream: profile.key.name(),
                })
            }
        };
        Ok(MotionIntrinsics {
            noise_variances: [noise; 3],
            bias_variances: [noise * 0.1; 3],
            ..MotionIntrinsics::default()
        })
    }

    fn depth_scale(&self) -> f32 {
        self.config.depth_scale
    }

    fn option_value(&self, option: DeviceOption) -> Result<f32, ContractError> {
        match option {
            DeviceOption::AsicTemperature => Ok(ASIC_TEMPERATURE),
            // the projector sits on the stereo module
            DeviceOption::ProjectorTemperature if self.config.enable_infrared => {
                Ok(PROJECTOR_TEMPERATURE)
            }
            DeviceOption::ProjectorTemperature => Err(ContractError::OptionUnsupported {
                option: option.to_string(),
            }),
        }
    }

    fn processing_block(&self, tag: StageTag) -> Option<Arc<dyn FrameFilter>> {
        let block: Arc<dyn FrameFilter> = match tag {
            StageTag::Decimation => Arc::new(Decimation::new(DECIMATION_FACTOR)),
            StageTag::Colorizer => Arc::new(Colorizer),
            StageTag::Pointcloud => {
                let texture = self.first_of_kind(StreamKind::Color)?;
                let extrinsics = self
                    .extrinsics_between(StreamKey::new(StreamKind::Depth, 0), texture.key)
                    .ok()?;
                Arc::new(PointCloud::new(texture, extrinsics, self.config.depth_scale))
            }
            StageTag::DisparityStart
            | StageTag::Spatial
            | StageTag::Temporal
            | StageTag::HoleFilling
            | StageTag::DisparityEnd => Arc::new(PassThrough::new(tag.as_str())),
        };
        debug!(stage = %tag, "processing block created");
        Some(block)
    }

    fn align_to(&self, target: StreamKind) -> Arc<dyn FrameFilter> {
        let depth = StreamKey::new(StreamKind::Depth, 0);
        let aligned = self.first_of_kind(target).and_then(|profile| {
            self.extrinsics_between(depth, profile.key)
                .ok()
                .map(|ex| Align::new(profile, ex, self.config.depth_scale))
        });
        match aligned {
            Some(block) => Arc::new(block),
            None => {
                warn!(target_stream = %target, "no calibrated stream to align to, depth passes through");
                Arc::new(PassThrough::new("align"))
            }
        }
    }
}
