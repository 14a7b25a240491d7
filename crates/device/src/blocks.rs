//! Reference processing blocks
//!
//! Stand-ins for the SDK filters. They produce the same frame shapes the
//! bridge expects from real hardware with deliberately simple math.

use std::sync::Arc;

use contracts::{
    ContractError, Extrinsics, Frame, FrameFilter, FramePayload, Frameset, Intrinsics,
    PixelFormat, PointsBuffer, StreamKey, StreamKind, StreamProfile, VideoBuffer,
};
use tracing::trace;

use crate::geometry::{deproject, project, scale_intrinsics, transform};

fn depth_values(video: &VideoBuffer) -> impl Iterator<Item = u16> + '_ {
    video
        .data
        .chunks_exact(2)
        .map(|px| u16::from_le_bytes([px[0], px[1]]))
}

fn depth_intrinsics(frame: &Frame) -> Option<(&VideoBuffer, &Intrinsics)> {
    if !frame.is_depth_z16() {
        return None;
    }
    Some((frame.video()?, frame.profile.intrinsics.as_ref()?))
}

/// Frame sharing timing with `source` but carrying a new profile and payload
fn derived(source: &Frame, profile: StreamProfile, payload: FramePayload) -> Frame {
    Frame {
        profile: Arc::new(profile),
        timestamp_ms: source.timestamp_ms,
        domain: source.domain,
        frame_number: source.frame_number,
        payload,
    }
}

/// Returns its input
#[derive(Debug)]
pub struct PassThrough {
    name: &'static str,
}

impl PassThrough {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl FrameFilter for PassThrough {
    fn name(&self) -> &str {
        self.name
    }

    fn process(&self, frameset: Frameset) -> Result<Frameset, ContractError> {
        Ok(frameset)
    }
}

/// Keeps every `factor`-th pixel of depth frames in both directions
#[derive(Debug)]
pub struct Decimation {
    factor: u32,
}

impl Decimation {
    pub fn new(factor: u32) -> Self {
        Self {
            factor: factor.max(1),
        }
    }

    fn decimate(&self, frame: &Frame) -> Option<Frame> {
        let (video, intrinsics) = depth_intrinsics(frame)?;
        let f = self.factor;
        let (width, height) = (video.width / f, video.height / f);
        let bpp = video.bpp as usize;

        let mut data = Vec::with_capacity((width * height) as usize * bpp);
        for y in 0..height {
            let row = (y * f) as usize * video.stride();
            for x in 0..width {
                let at = row + (x * f) as usize * bpp;
                data.extend_from_slice(&video.data[at..at + bpp]);
            }
        }

        let profile = StreamProfile {
            width,
            height,
            intrinsics: Some(scale_intrinsics(intrinsics, f)),
            ..frame.profile.as_ref().clone()
        };
        Some(derived(
            frame,
            profile,
            FramePayload::Video(VideoBuffer {
                width,
                height,
                bpp: video.bpp,
                data,
            }),
        ))
    }
}

impl FrameFilter for Decimation {
    fn name(&self) -> &str {
        "decimation"
    }

    fn process(&self, mut frameset: Frameset) -> Result<Frameset, ContractError> {
        for frame in frameset.frames.iter_mut() {
            if let Some(smaller) = self.decimate(frame) {
                *frame = smaller;
            }
        }
        Ok(frameset)
    }
}

/// Appends an RGB rendering of the depth frame under the depth key
///
/// Near is red, far is blue, missing depth is black.
#[derive(Debug, Default)]
pub struct Colorizer;

impl Colorizer {
    pub fn colorize(video: &VideoBuffer) -> Vec<u8> {
        let (min, max) = depth_values(video)
            .filter(|&d| d > 0)
            .fold((u16::MAX, 0u16), |(lo, hi), d| (lo.min(d), hi.max(d)));
        let span = max.saturating_sub(min).max(1) as f32;

        let mut rgb = Vec::with_capacity(video.data.len() / 2 * 3);
        for d in depth_values(video) {
            if d == 0 {
                rgb.extend_from_slice(&[0, 0, 0]);
                continue;
            }
            let t = (d.saturating_sub(min)) as f32 / span;
            let r = 255.0 * (1.0 - t);
            let g = 255.0 * (1.0 - (2.0 * t - 1.0).abs());
            let b = 255.0 * t;
            rgb.extend_from_slice(&[r as u8, g as u8, b as u8]);
        }
        rgb
    }
}

impl FrameFilter for Colorizer {
    fn name(&self) -> &str {
        "colorizer"
    }

    fn process(&self, mut frameset: Frameset) -> Result<Frameset, ContractError> {
        let Some(depth) = frameset.frames.iter().find(|f| f.is_depth_z16()) else {
            return Ok(frameset);
        };
        let Some(video) = depth.video() else {
            return Ok(frameset);
        };

        let profile = StreamProfile {
            format: PixelFormat::Rgb8,
            ..depth.profile.as_ref().clone()
        };
        let colored = derived(
            depth,
            profile,
            FramePayload::Video(VideoBuffer {
                width: video.width,
                height: video.height,
                bpp: 3,
                data: Self::colorize(video),
            }),
        );
        frameset.frames.push(colored);
        Ok(frameset)
    }
}

/// Deprojects depth into vertices with texture coordinates into `texture`
#[derive(Debug)]
pub struct PointCloud {
    texture: Arc<StreamProfile>,
    extrinsics: Extrinsics,
    depth_scale: f32,
}

impl PointCloud {
    pub fn new(texture: Arc<StreamProfile>, extrinsics: Extrinsics, depth_scale: f32) -> Self {
        Self {
            texture,
            extrinsics,
            depth_scale,
        }
    }

    pub fn texture_key(&self) -> StreamKey {
        self.texture.key
    }

    fn deproject(&self, video: &VideoBuffer, intrinsics: &Intrinsics) -> PointsBuffer {
        let pixels = (video.width * video.height) as usize;
        let mut points = PointsBuffer {
            vertices: Vec::with_capacity(pixels),
            tex_coords: Vec::with_capacity(pixels),
        };
        let texture = self.texture.intrinsics.as_ref();

        for (i, d) in depth_values(video).enumerate() {
            let u = (i as u32 % video.width) as f32;
            let v = (i as u32 / video.width) as f32;
            let vertex = deproject(intrinsics, u, v, d as f32 * self.depth_scale);

            let uv = texture
                .and_then(|k| {
                    let (tu, tv) = project(k, &transform(&self.extrinsics, &vertex))?;
                    Some([tu / k.width as f32, tv / k.height as f32])
                })
                .unwrap_or([0.0, 0.0]);

            points.vertices.push([vertex.x, vertex.y, vertex.z]);
            points.tex_coords.push(uv);
        }
        points
    }
}

impl FrameFilter for PointCloud {
    fn name(&self) -> &str {
        "pointcloud"
    }

    fn process(&self, mut frameset: Frameset) -> Result<Frameset, ContractError> {
        let Some(depth) = frameset.frames.iter().find(|f| f.is_depth_z16()) else {
            return Ok(frameset);
        };
        let Some((video, intrinsics)) = depth_intrinsics(depth) else {
            return Err(ContractError::device("depth frame without intrinsics"));
        };

        let points = self.deproject(video, intrinsics);
        trace!(vertices = points.vertices.len(), "point cloud computed");
        let profile = StreamProfile {
            key: StreamKey::new(StreamKind::Depth, 0),
            format: PixelFormat::Xyz32f,
            intrinsics: None,
            ..depth.profile.as_ref().clone()
        };
        let frame = derived(depth, profile, FramePayload::Points(points));
        frameset.frames.push(frame);
        Ok(frameset)
    }
}

/// Re-projects depth into the image plane of `target`
///
/// The depth frame of the result has the target's resolution and
/// intrinsics. Where several depth pixels land on one target pixel the
/// nearest wins.
#[derive(Debug)]
pub struct Align {
    target: Arc<StreamProfile>,
    extrinsics: Extrinsics,
    depth_scale: f32,
}

impl Align {
    pub fn new(target: Arc<StreamProfile>, extrinsics: Extrinsics, depth_scale: f32) -> Self {
        Self {
            target,
            extrinsics,
            depth_scale,
        }
    }

    pub fn target(&self) -> StreamKey {
        self.target.key
    }

    fn align(&self, video: &VideoBuffer, depth: &Intrinsics, target: &Intrinsics) -> Vec<u16> {
        let (tw, th) = (target.width, target.height);
        let mut aligned = vec![0u16; (tw * th) as usize];

        for (i, d) in depth_values(video).enumerate() {
            if d == 0 {
                continue;
            }
            let u = (i as u32 % video.width) as f32;
            let v = (i as u32 / video.width) as f32;
            let point = transform(
                &self.extrinsics,
                &deproject(depth, u, v, d as f32 * self.depth_scale),
            );
            let Some((tu, tv)) = project(target, &point) else {
                continue;
            };
            let (tu, tv) = (tu.round(), tv.round());
            if tu < 0.0 || tv < 0.0 || tu >= tw as f32 || tv >= th as f32 {
                continue;
            }
            let value = (point.z / self.depth_scale).round().min(u16::MAX as f32) as u16;
            let slot = &mut aligned[(tv as u32 * tw + tu as u32) as usize];
            if *slot == 0 || value < *slot {
                *slot = value;
            }
        }
        aligned
    }
}

impl FrameFilter for Align {
    fn name(&self) -> &str {
        "align"
    }

    fn process(&self, mut frameset: Frameset) -> Result<Frameset, ContractError> {
        let Some(target) = self.target.intrinsics else {
            return Err(ContractError::device(format!(
                "align target {} has no intrinsics",
                self.target.key
            )));
        };
        let Some(slot) = frameset.frames.iter().position(Frame::is_depth_z16) else {
            return Ok(frameset);
        };
        let depth = &frameset.frames[slot];
        let Some((video, intrinsics)) = depth_intrinsics(depth) else {
            return Err(ContractError::device("depth frame without intrinsics"));
        };

        let data: Vec<u8> = self
            .align(video, intrinsics, &target)
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let profile = StreamProfile {
            width: target.width,
            height: target.height,
            intrinsics: Some(target),
            ..depth.profile.as_ref().clone()
        };
        let aligned = derived(
            depth,
            profile,
            FramePayload::Video(VideoBuffer {
                width: target.width,
                height: target.height,
                bpp: 2,
                data,
            }),
        );
        frameset.frames[slot] = aligned;
        Ok(frameset)
    }
}
