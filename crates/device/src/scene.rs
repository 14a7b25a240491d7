//! Synthetic scene rendered by the simulated source
//!
//! A back wall 3 m away with a round obstacle sweeping left and right in
//! front of it; the rig itself sits still (gravity on accel, small gyro
//! wobble) unless a pose stream is enabled, which circles the origin.

use std::f64::consts::TAU;
use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    Frame, FramePayload, Frameset, MotionReading, PoseData, StreamKey, StreamKind, StreamProfile,
    TimestampDomain, VideoBuffer,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::device::SimulatedDevice;

const WALL_M: f32 = 3.0;
const OBSTACLE_M: f32 = 1.5;
const DEPTH_NOISE_M: f32 = 0.002;
const GRAVITY: f32 = 9.81;
const ACCEL_NOISE: f32 = 0.02;
const GYRO_NOISE: f32 = 0.002;
const POSE_RADIUS_M: f64 = 1.0;
const POSE_RATE_RAD_S: f64 = 0.5;

pub struct Scene {
    depth: Option<Arc<StreamProfile>>,
    color: Option<Arc<StreamProfile>>,
    infrared: Vec<Arc<StreamProfile>>,
    accel: Option<Arc<StreamProfile>>,
    gyro: Option<Arc<StreamProfile>>,
    pose: Option<Arc<StreamProfile>>,
    depth_scale: f32,
    domain: TimestampDomain,
    rng: StdRng,
}

impl Scene {
    /// `stream_seed` separates the noise of scenes sharing one device seed
    pub fn new(device: &SimulatedDevice, stream_seed: u64) -> Self {
        let get = |kind, index| device.profile(StreamKey::new(kind, index));
        let config = device.config();
        Self {
            depth: get(StreamKind::Depth, 0),
            color: get(StreamKind::Color, 0),
            infrared: [1, 2]
                .into_iter()
                .filter_map(|i| get(StreamKind::Infrared, i))
                .collect(),
            accel: get(StreamKind::Accel, 0),
            gyro: get(StreamKind::Gyro, 0),
            pose: get(StreamKind::Pose, 0),
            depth_scale: config.depth_scale,
            domain: if config.system_time_domain {
                TimestampDomain::SystemTime
            } else {
                TimestampDomain::HardwareClock
            },
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(stream_seed)),
        }
    }

    pub fn domain(&self) -> TimestampDomain {
        self.domain
    }

    fn frame(&self, profile: &Arc<StreamProfile>, number: u64, ts: f64, payload: FramePayload) -> Frame {
        Frame {
            profile: Arc::clone(profile),
            timestamp_ms: ts,
            domain: self.domain,
            frame_number: number,
            payload,
        }
    }

    /// Scene depth in meters at pixel (u, v); 0 where the sensor sees nothing
    fn depth_at(width: u32, height: u32, u: u32, v: u32, seconds: f64) -> f32 {
        // left band without stereo overlap
        if u < width / 16 {
            return 0.0;
        }
        let cx = width as f64 / 2.0 + width as f64 / 4.0 * seconds.sin();
        let cy = height as f64 / 2.0;
        let radius = height as f64 / 4.0;
        let (dx, dy) = (u as f64 - cx, v as f64 - cy);
        let inside = 1.0 - (dx * dx + dy * dy) / (radius * radius);
        if inside > 0.0 {
            WALL_M - OBSTACLE_M * inside.sqrt() as f32
        } else {
            WALL_M
        }
    }

    /// Depth, color and infrared frames sharing one timestamp
    pub fn frameset(&mut self, number: u64, timestamp_ms: f64) -> Frameset {
        let seconds = timestamp_ms / 1000.0;
        let mut frames = Vec::with_capacity(2 + self.infrared.len());

        let mut depth_m = Vec::new();
        if let Some(profile) = self.depth.clone() {
            let (w, h) = (profile.width, profile.height);
            depth_m.reserve((w * h) as usize);
            let mut data = Vec::with_capacity((w * h * 2) as usize);
            for v in 0..h {
                for u in 0..w {
                    let mut d = Self::depth_at(w, h, u, v, seconds);
                    if d > 0.0 {
                        d += self.rng.random_range(-DEPTH_NOISE_M..DEPTH_NOISE_M);
                    }
                    depth_m.push(d);
                    let units = (d / self.depth_scale).round().clamp(0.0, u16::MAX as f32) as u16;
                    data.extend_from_slice(&units.to_le_bytes());
                }
            }
            let payload = FramePayload::Video(VideoBuffer {
                width: w,
                height: h,
                bpp: 2,
                data,
            });
            frames.push(self.frame(&profile, number, timestamp_ms, payload));
        }

        if let Some(profile) = self.color.clone() {
            let (w, h) = (profile.width, profile.height);
            let shift = (number % 256) as u32;
            let mut data = Vec::with_capacity((w * h * 3) as usize);
            for v in 0..h {
                for u in 0..w {
                    data.extend_from_slice(&[
                        (u * 255 / w.max(1)) as u8,
                        (v * 255 / h.max(1)) as u8,
                        ((u + v + shift) % 256) as u8,
                    ]);
                }
            }
            let payload = FramePayload::Video(VideoBuffer {
                width: w,
                height: h,
                bpp: 3,
                data,
            });
            frames.push(self.frame(&profile, number, timestamp_ms, payload));
        }

        for profile in self.infrared.clone() {
            let (w, h) = (profile.width, profile.height);
            let data: Vec<u8> = (0..w * h)
                .map(|i| {
                    // brighter when closer, dark where depth is missing
                    let d = depth_m.get(i as usize).copied().unwrap_or(WALL_M);
                    if d <= 0.0 {
                        0
                    } else {
                        (255.0 * (1.0 - d / (WALL_M * 1.5))).clamp(0.0, 255.0) as u8
                    }
                })
                .collect();
            let payload = FramePayload::Video(VideoBuffer {
                width: w,
                height: h,
                bpp: 1,
                data,
            });
            frames.push(self.frame(&profile, number, timestamp_ms, payload));
        }

        Frameset::new(frames)
    }

    /// One accel or gyro sample; `None` when the rig has no such stream
    pub fn motion(&mut self, kind: StreamKind, number: u64, timestamp_ms: f64) -> Option<Frame> {
        let seconds = timestamp_ms / 1000.0;
        let (profile, reading) = match kind {
            StreamKind::Accel => {
                let n = ACCEL_NOISE;
                (
                    self.accel.clone()?,
                    MotionReading {
                        x: self.rng.random_range(-n..n),
                        y: -GRAVITY + self.rng.random_range(-n..n),
                        z: self.rng.random_range(-n..n),
                    },
                )
            }
            StreamKind::Gyro => {
                let n = GYRO_NOISE;
                (
                    self.gyro.clone()?,
                    MotionReading {
                        x: 0.01 * seconds.sin() as f32 + self.rng.random_range(-n..n),
                        y: self.rng.random_range(-n..n),
                        z: self.rng.random_range(-n..n),
                    },
                )
            }
            _ => return None,
        };
        let payload = FramePayload::Motion(Bytes::copy_from_slice(bytemuck::bytes_of(&reading)));
        Some(self.frame(&profile, number, timestamp_ms, payload))
    }

    /// Rig pose on a circle around the origin, device axes (y up, z back)
    pub fn pose(&mut self, number: u64, timestamp_ms: f64) -> Option<Frame> {
        let profile = self.pose.clone()?;
        let angle = (timestamp_ms / 1000.0 * POSE_RATE_RAD_S) % TAU;
        let (sin, cos) = angle.sin_cos();
        let speed = POSE_RADIUS_M * POSE_RATE_RAD_S;
        let half = angle / 2.0;

        let data = PoseData {
            translation: [(POSE_RADIUS_M * cos) as f32, 0.0, (POSE_RADIUS_M * sin) as f32],
            velocity: [(-speed * sin) as f32, 0.0, (speed * cos) as f32],
            acceleration: [0.0; 3],
            rotation: [0.0, half.sin() as f32, 0.0, half.cos() as f32],
            angular_velocity: [0.0, POSE_RATE_RAD_S as f32, 0.0],
            angular_acceleration: [0.0; 3],
            tracker_confidence: 3,
            mapper_confidence: 3,
        };
        let payload = FramePayload::Pose(Bytes::copy_from_slice(bytemuck::bytes_of(&data)));
        Some(self.frame(&profile, number, timestamp_ms, payload))
    }
}
