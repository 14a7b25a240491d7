//! Image + camera info publishing.

use std::sync::Arc;

use bytes::Bytes;
use calibration::CalibrationRegistry;
use contracts::{
    Channel, ContractError, Frame, Header, ImageMessage, Message, MessageBus, Stamp, StreamKey,
    StreamProfile,
};
use tracing::trace;
use transforms::FrameNames;

use crate::clip::fix_depth_scale;
use crate::error::DispatcherResult;

/// Bus encoding for a pixel width
pub fn encoding_for(bpp: u32) -> Option<&'static str> {
    match bpp {
        1 => Some("mono8"),
        2 => Some("16UC1"),
        3 => Some("rgb8"),
        _ => None,
    }
}

/// Publishes video frames with their calibration
#[derive(Debug)]
pub struct ImagePublisher {
    names: FrameNames,
    calibration: Arc<CalibrationRegistry>,
    depth_scale: f32,
}

impl ImagePublisher {
    pub fn new(names: FrameNames, calibration: Arc<CalibrationRegistry>, depth_scale: f32) -> Self {
        Self {
            names,
            calibration,
            depth_scale,
        }
    }

    pub fn names(&self) -> &FrameNames {
        &self.names
    }

    /// Publish a frame on its own image/info channels
    ///
    /// Returns `Ok(false)` when nobody listens on either channel.
    pub fn publish_frame(
        &self,
        frame: &Frame,
        stamp: Stamp,
        bus: &dyn MessageBus,
    ) -> DispatcherResult<bool> {
        let key = frame.key();
        self.publish_image(
            frame,
            key,
            &frame.profile,
            Channel::Image(key),
            Channel::CameraInfo(key),
            stamp,
            bus,
        )
    }

    /// Publish depth re-projected into `target`'s viewpoint
    ///
    /// The message uses the target's optical frame and calibration.
    pub fn publish_aligned(
        &self,
        depth: &Frame,
        target: &StreamProfile,
        stamp: Stamp,
        bus: &dyn MessageBus,
    ) -> DispatcherResult<bool> {
        self.publish_image(
            depth,
            target.key,
            target,
            Channel::AlignedDepthImage(target.key),
            Channel::AlignedDepthInfo(target.key),
            stamp,
            bus,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn publish_image(
        &self,
        frame: &Frame,
        key: StreamKey,
        calibration_profile: &StreamProfile,
        image_channel: Channel,
        info_channel: Channel,
        stamp: Stamp,
        bus: &dyn MessageBus,
    ) -> DispatcherResult<bool> {
        if !bus.has_subscribers(&image_channel) && !bus.has_subscribers(&info_channel) {
            return Ok(false);
        }

        let video = frame.video().ok_or_else(|| {
            ContractError::payload_parse(frame.key().name(), "frame carries no video buffer")
        })?;
        let encoding = encoding_for(video.bpp).ok_or_else(|| ContractError::UnsupportedFormat {
            stream: frame.key().name(),
            bpp: video.bpp,
        })?;

        let data = if frame.is_depth_z16() {
            Bytes::from(fix_depth_scale(&video.data, self.depth_scale).into_owned())
        } else {
            Bytes::copy_from_slice(&video.data)
        };

        let frame_id = self.names.optical_frame_id(key);
        let image = ImageMessage {
            header: Header::new(stamp, frame_id.clone()),
            width: video.width,
            height: video.height,
            encoding: encoding.to_string(),
            is_bigendian: false,
            step: video.width * video.bpp,
            data,
        };

        let record = self
            .calibration
            .record_for_frame(calibration_profile, video.width)?;
        let info = record.to_camera_info(Header::new(stamp, frame_id));

        bus.publish(&info_channel, Message::CameraInfo(info))?;
        bus.publish(&image_channel, Message::Image(image))?;

        observability::record_frame_published(&key.name(), image_channel_kind(&image_channel));
        trace!(stream = %key, channel = %image_channel, stamp = %stamp, "frame published");
        Ok(true)
    }
}

fn image_channel_kind(channel: &Channel) -> &'static str {
    match channel {
        Channel::AlignedDepthImage(_) => "aligned_depth",
        _ => "image",
    }
}
