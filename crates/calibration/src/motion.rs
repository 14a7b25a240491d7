//! Motion-module intrinsics and extrinsics messages

use contracts::{
    DeviceService, Extrinsics, ExtrinsicsMessage, Header, ImuInfo, MotionIntrinsics,
    StreamProfile,
};
use tracing::debug;

/// IMU info for a motion profile
///
/// Falls back to [`MotionIntrinsics::default`] when the device has no
/// intrinsics for the stream.
pub fn imu_info(profile: &StreamProfile, device: &dyn DeviceService, header: Header) -> ImuInfo {
    let intrinsics = match device.motion_intrinsics(profile) {
        Ok(intrinsics) => intrinsics,
        Err(e) => {
            debug!(stream = %profile.key, error = %e, "using default motion intrinsics");
            MotionIntrinsics::default()
        }
    };

    let mut data = [0.0; 12];
    for (row, values) in intrinsics.data.iter().enumerate() {
        for (col, &value) in values.iter().enumerate() {
            data[row * 4 + col] = value as f64;
        }
    }

    ImuInfo {
        header,
        data,
        noise_variances: intrinsics.noise_variances.map(f64::from),
        bias_variances: intrinsics.bias_variances.map(f64::from),
    }
}

pub fn extrinsics_message(ex: &Extrinsics, header: Header) -> ExtrinsicsMessage {
    ExtrinsicsMessage {
        header,
        rotation: ex.rotation.map(f64::from),
        translation: ex.translation.map(f64::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extrinsics_message() {
        let ex = Extrinsics {
            rotation: Extrinsics::IDENTITY_ROTATION,
            translation: [0.015, 0.0, 0.0],
        };
        let msg = extrinsics_message(&ex, Header::new(Default::default(), "depth_to_color"));
        assert_eq!(msg.rotation[4], 1.0);
        assert!((msg.translation[0] - 0.015).abs() < 1e-6);
        assert_eq!(msg.header.frame_id, "depth_to_color");
    }

    #[test]
    fn test_default_intrinsics_layout() {
        let defaults = MotionIntrinsics::default();
        assert_eq!(defaults.data[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(defaults.data[2], [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(defaults.noise_variances, [0.0; 3]);
    }
}
