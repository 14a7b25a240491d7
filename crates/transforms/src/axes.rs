//! Axis conventions between the device and the bus.
//!
//! Optical frames: x right, y down, z forward. Bus frames: x forward,
//! y left, z up. The pose sensor reports x right, y up, z backward.

use std::f64::consts::FRAC_PI_2;

use contracts::{PoseData, Quaternion, Vector3};
use nalgebra::{Matrix3, Quaternion as NaQuaternion, Rotation3, UnitQuaternion, Vector3 as Vec3};

/// Rotation from a sensor frame to its optical frame (roll -90°, yaw -90°)
pub fn optical_rotation() -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(-FRAC_PI_2, 0.0, -FRAC_PI_2)
}

/// Quaternion of a column-major 3x3 rotation
pub fn rotation_to_quaternion(rotation: &[f32; 9]) -> UnitQuaternion<f64> {
    let values: Vec<f64> = rotation.iter().map(|&v| v as f64).collect();
    let matrix = Matrix3::from_column_slice(&values);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(matrix))
}

/// Extrinsic translation (optical axes) expressed in bus axes
pub fn optical_translation(t: &[f32; 3]) -> Vector3 {
    Vector3::new(t[2] as f64, -(t[0] as f64), -(t[1] as f64))
}

/// Pose-sensor vector expressed in bus axes
pub fn pose_vector(v: &[f32; 3]) -> Vec3<f64> {
    Vec3::new(-(v[2] as f64), -(v[0] as f64), v[1] as f64)
}

/// Pose-sensor orientation expressed in bus axes
pub fn pose_orientation(pose: &PoseData) -> UnitQuaternion<f64> {
    let [x, y, z, w] = pose.rotation.map(f64::from);
    UnitQuaternion::from_quaternion(NaQuaternion::new(w, -z, -x, y))
}

pub fn to_quaternion(q: &UnitQuaternion<f64>) -> Quaternion {
    Quaternion {
        x: q.i,
        y: q.j,
        z: q.k,
        w: q.w,
    }
}

pub fn to_vector(v: &Vec3<f64>) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optical_rotation_maps_axes() {
        let q = optical_rotation();
        // optical z (forward) is bus x
        let forward = q * Vec3::new(0.0, 0.0, 1.0);
        assert!((forward - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        // optical x (right) is bus -y
        let right = q * Vec3::new(1.0, 0.0, 0.0);
        assert!((right - Vec3::new(0.0, -1.0, 0.0)).norm() < 1e-12);
        // optical y (down) is bus -z
        let down = q * Vec3::new(0.0, 1.0, 0.0);
        assert!((down - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_identity_rotation_to_quaternion() {
        let q = rotation_to_quaternion(&contracts::Extrinsics::IDENTITY_ROTATION);
        assert!(q.angle() < 1e-12);
    }

    #[test]
    fn test_column_major_rotation() {
        // 90° about z, column-major: first column is (0, 1, 0)
        let rotation = [0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let q = rotation_to_quaternion(&rotation);
        let x = q * Vec3::new(1.0, 0.0, 0.0);
        assert!((x - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_optical_translation() {
        let t = optical_translation(&[0.05, 0.01, 0.2]);
        assert!((t.x - 0.2).abs() < 1e-6);
        assert!((t.y + 0.05).abs() < 1e-6);
        assert!((t.z + 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_pose_vector() {
        // device forward is -z
        let v = pose_vector(&[0.0, 0.0, -1.0]);
        assert_eq!(v, Vec3::new(1.0, 0.0, 0.0));
        // device up is +y
        assert_eq!(pose_vector(&[0.0, 1.0, 0.0]), Vec3::new(0.0, 0.0, 1.0));
    }
}
