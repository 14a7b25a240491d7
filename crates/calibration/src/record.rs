//! Per-stream calibration record

use contracts::{CameraInfo, DistortionModel, Header, Intrinsics};

pub const EQUIDISTANT: &str = "equidistant";
pub const PLUMB_BOB: &str = "plumb_bob";

/// Identity rotation, row-major
pub const IDENTITY_3X3: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Camera model of one stream, as sent alongside every image
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub ppx: f64,
    pub ppy: f64,
    pub distortion_model: &'static str,
    /// At most five coefficients
    pub d: Vec<f64>,
    /// Intrinsic matrix, row-major
    pub k: [f64; 9],
    /// Rectification rotation, row-major
    pub r: [f64; 9],
    /// Projection matrix, row-major 3x4
    pub p: [f64; 12],
}

impl CalibrationRecord {
    pub fn from_intrinsics(intrinsics: &Intrinsics) -> Self {
        let fx = intrinsics.fx as f64;
        let fy = intrinsics.fy as f64;
        let ppx = intrinsics.ppx as f64;
        let ppy = intrinsics.ppy as f64;

        let distortion_model = match intrinsics.model {
            DistortionModel::KannalaBrandt4 => EQUIDISTANT,
            _ => PLUMB_BOB,
        };

        Self {
            width: intrinsics.width,
            height: intrinsics.height,
            fx,
            fy,
            ppx,
            ppy,
            distortion_model,
            d: intrinsics.coeffs.iter().map(|&c| c as f64).collect(),
            k: [fx, 0.0, ppx, 0.0, fy, ppy, 0.0, 0.0, 1.0],
            r: IDENTITY_3X3,
            p: [fx, 0.0, ppx, 0.0, 0.0, fy, ppy, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    pub fn to_camera_info(&self, header: Header) -> CameraInfo {
        CameraInfo {
            header,
            width: self.width,
            height: self.height,
            distortion_model: self.distortion_model.to_string(),
            d: self.d.clone(),
            k: self.k,
            r: self.r,
            p: self.p,
        }
    }
}
