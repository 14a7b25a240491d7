//! Pinhole projection helpers shared by the reference blocks

use contracts::{Extrinsics, Intrinsics};
use nalgebra::{Matrix3, Vector3};

/// Pixel (u, v) at depth `z` meters to a 3D point in the camera frame
pub fn deproject(intrinsics: &Intrinsics, u: f32, v: f32, z: f32) -> Vector3<f32> {
    Vector3::new(
        (u - intrinsics.ppx) / intrinsics.fx * z,
        (v - intrinsics.ppy) / intrinsics.fy * z,
        z,
    )
}

/// 3D point to pixel coordinates; `None` behind the camera
pub fn project(intrinsics: &Intrinsics, point: &Vector3<f32>) -> Option<(f32, f32)> {
    if point.z <= 0.0 {
        return None;
    }
    Some((
        point.x / point.z * intrinsics.fx + intrinsics.ppx,
        point.y / point.z * intrinsics.fy + intrinsics.ppy,
    ))
}

/// Apply extrinsics (column-major rotation) to a point
pub fn transform(extrinsics: &Extrinsics, point: &Vector3<f32>) -> Vector3<f32> {
    let rotation = Matrix3::from_column_slice(&extrinsics.rotation);
    rotation * point + Vector3::from_column_slice(&extrinsics.translation)
}

/// Intrinsics of an image downscaled by `factor`
pub fn scale_intrinsics(intrinsics: &Intrinsics, factor: u32) -> Intrinsics {
    let f = factor as f32;
    Intrinsics {
        width: intrinsics.width / factor,
        height: intrinsics.height / factor,
        fx: intrinsics.fx / f,
        fy: intrinsics.fy / f,
        ppx: intrinsics.ppx / f,
        ppy: intrinsics.ppy / f,
        ..*intrinsics
    }
}
