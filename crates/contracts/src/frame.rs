//! Frames and samples delivered by the device callback
//!
//! A callback delivers either a composite [`Frameset`] or a single [`Frame`].
//! Single frames may be video, motion (accel/gyro) or pose samples.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ContractError, PixelFormat, StreamKey, StreamKind, StreamProfile};

/// Clock domain of a frame timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampDomain {
    /// Device hardware clock (frame metadata available)
    #[default]
    HardwareClock,
    /// Host arrival time, used when frame metadata is missing
    SystemTime,
    GlobalTime,
}

/// 视频帧像素缓冲
#[derive(Debug, Clone, PartialEq)]
pub struct VideoBuffer {
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel
    pub bpp: u32,
    /// Row-major, tightly packed pixels (little-endian for 16-bit data)
    pub data: Vec<u8>,
}

impl VideoBuffer {
    pub fn stride(&self) -> usize {
        (self.width * self.bpp) as usize
    }
}

/// 点云缓冲
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointsBuffer {
    pub vertices: Vec<[f32; 3]>,
    /// Normalized (u, v) into the texture stream, one per vertex
    pub tex_coords: Vec<[f32; 2]>,
}

/// Frame payload
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Video(VideoBuffer),
    /// Raw motion record (`MotionReading`)
    Motion(Bytes),
    /// Raw pose record (`PoseData`)
    Pose(Bytes),
    Points(PointsBuffer),
}

/// One frame of one stream
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub profile: Arc<StreamProfile>,
    /// Device timestamp in milliseconds
    pub timestamp_ms: f64,
    pub domain: TimestampDomain,
    pub frame_number: u64,
    pub payload: FramePayload,
}

impl Frame {
    pub fn key(&self) -> StreamKey {
        self.profile.key
    }

    pub fn kind(&self) -> StreamKind {
        self.profile.key.kind
    }

    pub fn format(&self) -> PixelFormat {
        self.profile.format
    }

    pub fn is_points(&self) -> bool {
        matches!(self.payload, FramePayload::Points(_))
    }

    pub fn video(&self) -> Option<&VideoBuffer> {
        match &self.payload {
            FramePayload::Video(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn video_mut(&mut self) -> Option<&mut VideoBuffer> {
        match &mut self.payload {
            FramePayload::Video(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// Depth sample with 16-bit data, as accepted by clipping and alignment
    pub fn is_depth_z16(&self) -> bool {
        self.kind() == StreamKind::Depth && self.format() == PixelFormat::Z16
    }

    /// Whether hardware timestamps are available for this frame
    pub fn metadata_available(&self) -> bool {
        self.domain != TimestampDomain::SystemTime
    }
}

/// Composite of frames captured together
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frameset {
    pub frames: Vec<Frame>,
}

impl Frameset {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// First frame of the given kind
    pub fn first(&self, kind: StreamKind) -> Option<&Frame> {
        self.frames.iter().find(|f| f.kind() == kind)
    }

    pub fn first_mut(&mut self, kind: StreamKind) -> Option<&mut Frame> {
        self.frames.iter_mut().find(|f| f.kind() == kind)
    }

    pub fn get(&self, key: StreamKey) -> Option<&Frame> {
        self.frames.iter().find(|f| f.key() == key)
    }

    /// Timestamp of the composite, taken from its first frame
    pub fn timestamp_ms(&self) -> Option<f64> {
        self.frames.first().map(|f| f.timestamp_ms)
    }

    pub fn domain(&self) -> TimestampDomain {
        self.frames.first().map(|f| f.domain).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// One device callback
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Frameset(Frameset),
    Frame(Frame),
}

/// Raw motion record: x, y, z as f32
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct MotionReading {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Raw pose record as produced by a tracking sensor
///
/// Device frame: x right, y up, z backward.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PoseData {
    pub translation: [f32; 3],
    pub velocity: [f32; 3],
    pub acceleration: [f32; 3],
    /// x, y, z, w
    pub rotation: [f32; 4],
    pub angular_velocity: [f32; 3],
    pub angular_acceleration: [f32; 3],
    pub tracker_confidence: u32,
    pub mapper_confidence: u32,
}

/// Decode a plain-old-data record from a raw payload
///
/// The payload may be unaligned; the value is copied out.
pub fn read_record<T: Pod>(stream: StreamKey, bytes: &[u8]) -> Result<T, ContractError> {
    let size = std::mem::size_of::<T>();
    if bytes.len() < size {
        return Err(ContractError::payload_parse(
            stream.name(),
            format!("expected {size} bytes, got {}", bytes.len()),
        ));
    }
    Ok(bytemuck::pod_read_unaligned(&bytes[..size]))
}
