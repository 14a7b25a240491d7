//! Accelerometer / gyroscope combination strategies.
//!
//! Both strategies own their state; nothing is shared between instances.

use std::collections::VecDeque;

use contracts::{
    Header, ImuCovariance, ImuMessage, ImuSyncMethod, Quaternion, Stamp, StreamKind, Vector3,
};
use nalgebra::Vector3 as Vec3;
use tracing::trace;

/// Inertial sensor axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImuAxis {
    Accel,
    Gyro,
}

impl ImuAxis {
    pub fn from_kind(kind: StreamKind) -> Option<Self> {
        match kind {
            StreamKind::Accel => Some(Self::Accel),
            StreamKind::Gyro => Some(Self::Gyro),
            _ => None,
        }
    }
}

/// One accel or gyro reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertialSample {
    pub axis: ImuAxis,
    pub reading: Vec3<f64>,
    /// Nanoseconds since the session clock base
    pub time_ns: f64,
}

impl InertialSample {
    pub fn new(axis: ImuAxis, reading: Vec3<f64>, time_ns: f64) -> Self {
        Self {
            axis,
            reading,
            time_ns,
        }
    }
}

/// Combined accel + gyro reading at a gyro timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifiedInertial {
    pub time_ns: f64,
    pub linear_acceleration: Vec3<f64>,
    pub angular_velocity: Vec3<f64>,
}

impl UnifiedInertial {
    /// Build the outgoing message
    ///
    /// Orientation is zero and flagged unavailable by `-1` in the first
    /// covariance slot.
    pub fn into_message(
        self,
        stamp: Stamp,
        frame_id: &str,
        covariance: &ImuCovariance,
    ) -> ImuMessage {
        let mut message = empty_imu_message(stamp, frame_id, covariance);
        message.linear_acceleration = to_vector(&self.linear_acceleration);
        message.angular_velocity = to_vector(&self.angular_velocity);
        message
    }
}

/// Message with zero readings and the fixed covariance blocks
pub fn empty_imu_message(stamp: Stamp, frame_id: &str, covariance: &ImuCovariance) -> ImuMessage {
    let mut orientation_covariance = [0.0; 9];
    orientation_covariance[0] = -1.0;

    ImuMessage {
        header: Header::new(stamp, frame_id),
        orientation: Quaternion::ZERO,
        orientation_covariance,
        angular_velocity: Vector3::default(),
        angular_velocity_covariance: diagonal(covariance.angular_velocity_cov),
        linear_acceleration: Vector3::default(),
        linear_acceleration_covariance: diagonal(covariance.linear_accel_cov),
    }
}

fn diagonal(value: f64) -> [f64; 9] {
    [value, 0.0, 0.0, 0.0, value, 0.0, 0.0, 0.0, value]
}

fn to_vector(v: &Vec3<f64>) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}

/// Pairs each gyro sample with the latest accel sample
#[derive(Debug, Default)]
pub struct CopyLatest {
    accel: Option<InertialSample>,
}

impl CopyLatest {
    pub fn ingest(&mut self, sample: InertialSample) -> Vec<UnifiedInertial> {
        match sample.axis {
            ImuAxis::Accel => {
                self.accel = Some(sample);
                Vec::new()
            }
            ImuAxis::Gyro => match self.accel {
                Some(accel) => vec![UnifiedInertial {
                    time_ns: sample.time_ns,
                    linear_acceleration: accel.reading,
                    angular_velocity: sample.reading,
                }],
                None => Vec::new(),
            },
        }
    }
}

/// Interpolates accel readings at gyro timestamps
#[derive(Debug, Default)]
pub struct LinearInterpolation {
    history: VecDeque<InertialSample>,
}

impl LinearInterpolation {
    const MIN_HISTORY: usize = 3;

    pub fn ingest(&mut self, sample: InertialSample) -> Vec<UnifiedInertial> {
        self.history.push_back(sample);
        if sample.axis != ImuAxis::Accel || self.history.len() < Self::MIN_HISTORY {
            return Vec::new();
        }

        let mut output = Vec::new();
        let mut accel0: Option<InertialSample> = None;
        let mut pending_gyros: Vec<InertialSample> = Vec::new();
        let mut last = sample;

        while let Some(current) = self.history.pop_front() {
            match (current.axis, accel0) {
                (ImuAxis::Accel, None) => accel0 = Some(current),
                (ImuAxis::Accel, Some(a0)) => {
                    let span = current.time_ns - a0.time_ns;
                    for gyro in pending_gyros.drain(..) {
                        let alpha = if span > 0.0 {
                            (gyro.time_ns - a0.time_ns) / span
                        } else {
                            0.0
                        };
                        output.push(UnifiedInertial {
                            time_ns: gyro.time_ns,
                            linear_acceleration: a0.reading.lerp(&current.reading, alpha),
                            angular_velocity: gyro.reading,
                        });
                    }
                    accel0 = Some(current);
                }
                (ImuAxis::Gyro, Some(a0)) if current.time_ns >= a0.time_ns => {
                    pending_gyros.push(current);
                }
                (ImuAxis::Gyro, _) => {
                    trace!(time_ns = current.time_ns, "gyro sample before first accel dropped");
                }
            }
            last = current;
        }

        // The newest accel seeds the next round
        self.history.push_back(last);
        output
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Configured combination strategy
#[derive(Debug)]
pub enum ImuSynchronizer {
    Copy(CopyLatest),
    LinearInterpolation(LinearInterpolation),
}

impl ImuSynchronizer {
    /// `None` for the unsynchronised mode
    pub fn for_method(method: ImuSyncMethod) -> Option<Self> {
        match method {
            ImuSyncMethod::None => None,
            ImuSyncMethod::Copy => Some(Self::Copy(CopyLatest::default())),
            ImuSyncMethod::LinearInterpolation => {
                Some(Self::LinearInterpolation(LinearInterpolation::default()))
            }
        }
    }

    pub fn ingest(&mut self, sample: InertialSample) -> Vec<UnifiedInertial> {
        match self {
            Self::Copy(strategy) => strategy.ingest(sample),
            Self::LinearInterpolation(strategy) => strategy.ingest(sample),
        }
    }

    pub fn method(&self) -> ImuSyncMethod {
        match self {
            Self::Copy(_) => ImuSyncMethod::Copy,
            Self::LinearInterpolation(_) => ImuSyncMethod::LinearInterpolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel(t: f64, v: f64) -> InertialSample {
        InertialSample::new(ImuAxis::Accel, Vec3::new(v, v, v), t)
    }

    fn gyro(t: f64, v: f64) -> InertialSample {
        InertialSample::new(ImuAxis::Gyro, Vec3::new(v, -v, 0.5 * v), t)
    }

    #[test]
    fn test_copy_accel_gyro_gyro() {
        let mut sync = ImuSynchronizer::for_method(ImuSyncMethod::Copy).unwrap();
        assert!(sync.ingest(accel(0.0, 9.8)).is_empty());
        let first = sync.ingest(gyro(1.0, 0.1));
        let second = sync.ingest(gyro(2.0, 0.2));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].linear_acceleration, second[0].linear_acceleration);
        assert_eq!(second[0].time_ns, 2.0);
        assert_eq!(second[0].angular_velocity, Vec3::new(0.2, -0.2, 0.1));
    }

    #[test]
    fn test_copy_gyro_before_accel() {
        let mut sync = ImuSynchronizer::for_method(ImuSyncMethod::Copy).unwrap();
        assert!(sync.ingest(gyro(0.0, 1.0)).is_empty());
        assert!(sync.ingest(gyro(1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_linear_midpoint() {
        let mut sync = ImuSynchronizer::for_method(ImuSyncMethod::LinearInterpolation).unwrap();
        assert!(sync.ingest(accel(0.0, 0.0)).is_empty());
        assert!(sync.ingest(gyro(50.0, 0.3)).is_empty());
        let out = sync.ingest(accel(100.0, 2.0));

        assert_eq!(out.len(), 1);
        let accel = out[0].linear_acceleration;
        assert!((accel - Vec3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
        assert_eq!(out[0].time_ns, 50.0);
        assert_eq!(out[0].angular_velocity, Vec3::new(0.3, -0.3, 0.15));
    }

    #[test]
    fn test_linear_reseeds_last_accel() {
        let mut strategy = LinearInterpolation::default();
        strategy.ingest(accel(0.0, 0.0));
        strategy.ingest(gyro(10.0, 1.0));
        strategy.ingest(accel(20.0, 2.0));
        assert_eq!(strategy.history_len(), 1);

        // accel@20 is the new accel0
        assert!(strategy.ingest(gyro(30.0, 1.0)).is_empty());
        let out = strategy.ingest(accel(40.0, 4.0));
        assert_eq!(out.len(), 1);
        assert!((out[0].linear_acceleration - Vec3::new(3.0, 3.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_linear_single_accel_no_output() {
        let mut strategy = LinearInterpolation::default();
        assert!(strategy.ingest(gyro(0.0, 1.0)).is_empty());
        assert!(strategy.ingest(gyro(1.0, 1.0)).is_empty());
        assert!(strategy.ingest(accel(2.0, 1.0)).is_empty());
    }

    #[test]
    fn test_linear_discards_gyro_before_first_accel() {
        let mut strategy = LinearInterpolation::default();
        strategy.ingest(gyro(0.0, 1.0));
        strategy.ingest(accel(10.0, 0.0));
        strategy.ingest(gyro(15.0, 1.0));
        let out = strategy.ingest(accel(20.0, 2.0));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].time_ns, 15.0);
    }

    #[test]
    fn test_linear_multiple_gyros_between_accels() {
        let mut strategy = LinearInterpolation::default();
        strategy.ingest(accel(0.0, 0.0));
        strategy.ingest(gyro(25.0, 1.0));
        strategy.ingest(gyro(75.0, 1.0));
        let out = strategy.ingest(accel(100.0, 4.0));

        assert_eq!(out.len(), 2);
        assert!((out[0].linear_acceleration.x - 1.0).abs() < 1e-12);
        assert!((out[1].linear_acceleration.x - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unsynchronised_mode() {
        assert!(ImuSynchronizer::for_method(ImuSyncMethod::None).is_none());
    }

    #[test]
    fn test_message_defaults() {
        let unified = UnifiedInertial {
            time_ns: 0.0,
            linear_acceleration: Vec3::new(0.0, 0.0, 9.81),
            angular_velocity: Vec3::new(0.1, 0.0, 0.0),
        };
        let covariance = ImuCovariance {
            linear_accel_cov: 0.02,
            angular_velocity_cov: 0.03,
        };
        let msg = unified.into_message(Stamp::from_nanos(5), "camera_imu_optical_frame", &covariance);

        assert_eq!(msg.header.frame_id, "camera_imu_optical_frame");
        assert_eq!(msg.orientation, Quaternion::ZERO);
        assert_eq!(msg.orientation_covariance[0], -1.0);
        assert_eq!(msg.linear_acceleration_covariance[4], 0.02);
        assert_eq!(msg.angular_velocity_covariance[8], 0.03);
        assert_eq!(msg.angular_velocity_covariance[1], 0.0);
        assert_eq!(msg.linear_acceleration.z, 9.81);
    }
}
