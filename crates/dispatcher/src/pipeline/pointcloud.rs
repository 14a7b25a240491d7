//! Point cloud stage and its publish step.

use contracts::{
    Channel, ContractError, Frameset, Header, Message, MessageBus, PixelFormat,
    PointCloudConfig, PointCloudMessage, PointsBuffer, Stamp, StreamKey, VideoBuffer,
};
use tracing::{debug, trace};

use super::NamedFilter;

/// Point cloud generation with texture mapping from the source frameset
#[derive(Debug)]
pub struct PointCloudFilter {
    named: NamedFilter,
    config: PointCloudConfig,
}

impl PointCloudFilter {
    pub fn new(named: NamedFilter, config: PointCloudConfig) -> Self {
        Self { named, config }
    }

    pub(super) fn named(&self) -> &NamedFilter {
        &self.named
    }

    pub fn config(&self) -> &PointCloudConfig {
        &self.config
    }

    pub fn texture_key(&self) -> StreamKey {
        StreamKey::new(self.config.texture_stream, self.config.texture_index)
    }

    /// Build the cloud message
    ///
    /// Zero-depth vertices are dropped. Vertices whose texture coordinate
    /// falls outside the texture image are kept only when
    /// `allow_no_texture_points` is set.
    pub fn build_message(
        &self,
        points: &PointsBuffer,
        stamp: Stamp,
        frameset: &Frameset,
        frame_id: &str,
    ) -> PointCloudMessage {
        let texture = frameset
            .get(self.texture_key())
            .and_then(|frame| frame.video().map(|video| (frame.format(), video)));

        let mut cloud = Vec::with_capacity(points.vertices.len());
        let mut colors = texture.map(|_| Vec::with_capacity(points.vertices.len()));

        for (i, vertex) in points.vertices.iter().enumerate() {
            if vertex[2] <= 0.0 {
                continue;
            }
            match (&texture, colors.as_mut()) {
                (Some((format, video)), Some(colors)) => {
                    let color = points
                        .tex_coords
                        .get(i)
                        .and_then(|uv| sample_texture(*format, video, *uv));
                    match color {
                        Some(rgb) => colors.push(rgb),
                        None if self.config.allow_no_texture_points => colors.push([0, 0, 0]),
                        None => continue,
                    }
                }
                _ => {}
            }
            cloud.push(*vertex);
        }

        trace!(
            vertices = points.vertices.len(),
            kept = cloud.len(),
            textured = colors.is_some(),
            "point cloud built"
        );

        PointCloudMessage {
            header: Header::new(stamp, frame_id),
            points: cloud,
            colors,
        }
    }

    /// Publish the cloud on [`Channel::PointCloud`] when anyone listens
    pub fn publish(
        &self,
        points: &PointsBuffer,
        stamp: Stamp,
        frameset: &Frameset,
        frame_id: &str,
        bus: &dyn MessageBus,
    ) -> Result<bool, ContractError> {
        if !bus.has_subscribers(&Channel::PointCloud) {
            return Ok(false);
        }
        let message = self.build_message(points, stamp, frameset, frame_id);
        debug!(points = message.points.len(), "point cloud published");
        bus.publish(&Channel::PointCloud, Message::PointCloud(message))?;
        Ok(true)
    }
}

/// RGB of the texture pixel under a normalized (u, v) coordinate
fn sample_texture(format: PixelFormat, video: &VideoBuffer, uv: [f32; 2]) -> Option<[u8; 3]> {
    let [u, v] = uv;
    if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
        return None;
    }
    let x = (u * video.width as f32) as usize;
    let y = (v * video.height as f32) as usize;
    let bpp = video.bpp as usize;
    let offset = y * video.stride() + x * bpp;
    let pixel = video.data.get(offset..offset + bpp)?;

    match format {
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => Some([pixel[0], pixel[1], pixel[2]]),
        PixelFormat::Bgr8 => Some([pixel[2], pixel[1], pixel[0]]),
        PixelFormat::Y8 => Some([pixel[0]; 3]),
        _ => None,
    }
}
