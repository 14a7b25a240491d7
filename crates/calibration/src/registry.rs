//! Calibration registry keyed by stream.
//!
//! All records live behind one lock so a reader never observes a record
//! whose fields come from two different updates.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use contracts::{DeviceService, StreamKey, StreamProfile};
use nalgebra::{Matrix3, Matrix3x4};
use tracing::{debug, info, instrument, warn};

use crate::error::{CalibrationError, CalibrationResult};
use crate::record::CalibrationRecord;

/// Cached camera models for every video stream of the session
#[derive(Debug, Default)]
pub struct CalibrationRegistry {
    records: Mutex<HashMap<StreamKey, CalibrationRecord>>,
}

impl CalibrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StreamKey, CalibrationRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// (Re)write the record of a profile from its intrinsics
    #[instrument(level = "debug", name = "calibration_update", skip(self, profile), fields(stream = %profile.key))]
    pub fn update(&self, profile: &StreamProfile) -> CalibrationResult<CalibrationRecord> {
        let intrinsics = profile
            .intrinsics
            .as_ref()
            .ok_or_else(|| CalibrationError::missing_intrinsics(profile.key))?;
        let record = CalibrationRecord::from_intrinsics(intrinsics);
        self.lock().insert(profile.key, record.clone());
        debug!(
            width = record.width,
            height = record.height,
            model = record.distortion_model,
            "calibration updated"
        );
        Ok(record)
    }

    /// Stereo rig: derive the right camera's rotation and projection
    ///
    /// Translation is forced onto the X axis. The projection composes the
    /// left camera's intrinsic matrix with `[R | T]`.
    #[instrument(
        level = "debug",
        name = "calibration_update_extrinsics",
        skip(self, left, right, device),
        fields(left = %left.key, right = %right.key)
    )]
    pub fn update_extrinsics(
        &self,
        left: &StreamProfile,
        right: &StreamProfile,
        device: &dyn DeviceService,
    ) -> CalibrationResult<()> {
        let ex = device.extrinsics(right, left)?;

        let mut records = self.lock();
        let k_left = records
            .get(&left.key)
            .map(|r| r.k)
            .ok_or(CalibrationError::NotCalibrated { stream: left.key })?;

        let right_record = records
            .get_mut(&right.key)
            .ok_or(CalibrationError::NotCalibrated { stream: right.key })?;

        let rotation: Vec<f64> = ex.rotation.iter().map(|&v| v as f64).collect();
        let r = Matrix3::from_row_slice(&rotation);
        let k = Matrix3::from_row_slice(&k_left);

        let mut rt = Matrix3x4::<f64>::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        rt[(0, 3)] = ex.translation[0] as f64;

        let p = k * rt;
        for row in 0..3 {
            for col in 0..4 {
                right_record.p[row * 4 + col] = p[(row, col)];
            }
        }
        for (dst, src) in right_record.r.iter_mut().zip(rotation.iter()) {
            *dst = *src;
        }

        info!(baseline = ex.translation[0], "stereo extrinsics applied");
        Ok(())
    }

    /// Update every video profile, then the stereo pair if one is active
    pub fn update_profiles(&self, profiles: &[StreamProfile], device: &dyn DeviceService) {
        for profile in profiles.iter().filter(|p| p.is_video()) {
            if let Err(e) = self.update(profile) {
                warn!(stream = %profile.key, error = %e, "skipping calibration");
            }
        }

        if let Some((left, right)) = stereo_pair(profiles) {
            if let Err(e) = self.update_extrinsics(left, right, device) {
                warn!(error = %e, "stereo extrinsics unavailable, right camera keeps plain projection");
            }
        }
    }

    /// Read accessor; `None` means "not yet calibrated"
    pub fn lookup(&self, key: StreamKey) -> Option<CalibrationRecord> {
        self.lock().get(&key).cloned()
    }

    /// Record for a frame of the given width, refreshed when the resolution changed
    pub fn record_for_frame(
        &self,
        profile: &StreamProfile,
        width: u32,
    ) -> CalibrationResult<CalibrationRecord> {
        match self.lookup(profile.key) {
            Some(record) if record.width == width => Ok(record),
            Some(record) => {
                debug!(
                    stream = %profile.key,
                    cached = record.width,
                    width,
                    "resolution changed, refreshing calibration"
                );
                self.update(profile)
            }
            None => self.update(profile),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Video profiles at index 1 and 2 of the same kind
fn stereo_pair(profiles: &[StreamProfile]) -> Option<(&StreamProfile, &StreamProfile)> {
    profiles
        .iter()
        .filter(|p| p.is_video() && p.key.index == 1)
        .find_map(|left| {
            profiles
                .iter()
                .find(|p| p.is_video() && p.key.kind == left.key.kind && p.key.index == 2)
                .map(|right| (left, right))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use contracts::{
        ContractError, DeviceOption, DistortionModel, Extrinsics, FrameFilter, Intrinsics,
        MotionIntrinsics, PixelFormat, StageTag, StreamKind,
    };

    struct StereoDevice {
        baseline: Option<f32>,
    }

    impl DeviceService for StereoDevice {
        fn name(&self) -> &str {
            "stereo"
        }

        fn stream_profiles(&self) -> Vec<StreamProfile> {
            Vec::new()
        }

        fn extrinsics(
            &self,
            from: &StreamProfile,
            to: &StreamProfile,
        ) -> Result<Extrinsics, ContractError> {
            match self.baseline {
                Some(b) => Ok(Extrinsics {
                    rotation: Extrinsics::IDENTITY_ROTATION,
                    translation: [b, 0.002, 0.003],
                }),
                None => Err(ContractError::extrinsics_unavailable(
                    from.key.name(),
                    to.key.name(),
                )),
            }
        }

        fn motion_intrinsics(
            &self,
            profile: &StreamProfile,
        ) -> Result<MotionIntrinsics, ContractError> {
            Err(ContractError::MotionIntrinsicsUnavailable {
                stream: profile.key.name(),
            })
        }

        fn depth_scale(&self) -> f32 {
            0.001
        }

        fn option_value(&self, option: DeviceOption) -> Result<f32, ContractError> {
            Err(ContractError::OptionUnsupported {
                option: option.to_string(),
            })
        }

        fn processing_block(&self, _tag: StageTag) -> Option<Arc<dyn FrameFilter>> {
            None
        }

        fn align_to(&self, _target: StreamKind) -> Arc<dyn FrameFilter> {
            unimplemented!("not used by calibration tests")
        }
    }

    fn infra(index: u8, width: u32) -> StreamProfile {
        StreamProfile {
            key: StreamKey::new(StreamKind::Infrared, index),
            format: PixelFormat::Y8,
            width,
            height: 480,
            fps: 30,
            intrinsics: Some(Intrinsics {
                width,
                height: 480,
                fx: 400.0,
                fy: 400.0,
                ppx: 320.0,
                ppy: 240.0,
                model: DistortionModel::BrownConrady,
                coeffs: [0.0; 5],
            }),
        }
    }

    #[test]
    fn test_lookup_miss() {
        let registry = CalibrationRegistry::new();
        assert!(registry
            .lookup(StreamKey::new(StreamKind::Color, 0))
            .is_none());
    }

    #[test]
    fn test_update_requires_intrinsics() {
        let registry = CalibrationRegistry::new();
        let mut profile = infra(1, 640);
        profile.intrinsics = None;
        assert!(matches!(
            registry.update(&profile),
            Err(CalibrationError::MissingIntrinsics { .. })
        ));
    }

    #[test]
    fn test_stereo_projection() {
        let registry = CalibrationRegistry::new();
        let device = StereoDevice {
            baseline: Some(-0.05),
        };
        let profiles = vec![infra(1, 640), infra(2, 640)];
        registry.update_profiles(&profiles, &device);

        let left = registry.lookup(profiles[0].key).unwrap();
        let right = registry.lookup(profiles[1].key).unwrap();

        assert_eq!(left.p, [400.0, 0.0, 320.0, 0.0, 0.0, 400.0, 240.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        // Tx = fx * baseline, Y/Z translation dropped
        assert!((right.p[3] - 400.0 * -0.05f32 as f64).abs() < 1e-9);
        assert_eq!(right.p[7], 0.0);
        assert_eq!(right.p[11], 0.0);
        assert_eq!(right.r, crate::record::IDENTITY_3X3);
    }

    #[test]
    fn test_stereo_without_extrinsics_keeps_plain_projection() {
        let registry = CalibrationRegistry::new();
        let device = StereoDevice { baseline: None };
        let profiles = vec![infra(1, 640), infra(2, 640)];
        registry.update_profiles(&profiles, &device);

        let right = registry.lookup(profiles[1].key).unwrap();
        assert_eq!(right.p[3], 0.0);
    }

    #[test]
    fn test_refresh_on_resize() {
        let registry = CalibrationRegistry::new();
        let small = infra(1, 320);
        registry.update(&small).unwrap();

        let large = infra(1, 640);
        let record = registry.record_for_frame(&large, 640).unwrap();
        assert_eq!(record.width, 640);
        assert_eq!(registry.lookup(large.key).unwrap().width, 640);

        // Same width: cached record is returned untouched
        let again = registry.record_for_frame(&small, 640).unwrap();
        assert_eq!(again.width, 640);
        assert_eq!(registry.len(), 1);
    }
}
