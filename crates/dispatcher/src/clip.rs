//! Dense per-pixel passes over 16-bit depth images.

use std::borrow::Cow;

use rayon::prelude::*;

/// One millimetre, the unit of outgoing depth images
pub const MILLIMETER: f32 = 0.001;

/// Depth unit threshold for a clipping distance in meters
///
/// Rounded to the nearest unit; distances beyond the u16 range clip nothing.
pub fn clip_threshold(clip_distance: f32, depth_scale: f32) -> u16 {
    (clip_distance / depth_scale).round().min(u16::MAX as f32) as u16
}

/// Zero every depth value greater than [`clip_threshold`]
///
/// `data` holds little-endian u16 values, `width` pixels per row. Rows are
/// processed in parallel. Returns the number of cleared pixels.
pub fn clip_depth(data: &mut [u8], width: u32, depth_scale: f32, clip_distance: f32) -> usize {
    if clip_distance <= 0.0 || depth_scale <= 0.0 {
        return 0;
    }
    let threshold = clip_threshold(clip_distance, depth_scale);
    let stride = (width as usize * 2).max(2);

    data.par_chunks_mut(stride)
        .map(|row| {
            let mut cleared = 0;
            for pixel in row.chunks_exact_mut(2) {
                if u16::from_le_bytes([pixel[0], pixel[1]]) > threshold {
                    pixel.copy_from_slice(&[0, 0]);
                    cleared += 1;
                }
            }
            cleared
        })
        .sum()
}

/// Rescale depth values to millimetres
///
/// Borrowed when the device unit already is one millimetre.
pub fn fix_depth_scale(data: &[u8], depth_scale: f32) -> Cow<'_, [u8]> {
    if (depth_scale - MILLIMETER).abs() < 1e-6 {
        return Cow::Borrowed(data);
    }

    let factor = depth_scale / MILLIMETER;
    let scaled = data
        .chunks_exact(2)
        .flat_map(|pixel| {
            let value = u16::from_le_bytes([pixel[0], pixel[1]]) as f32 * factor;
            (value as u16).to_le_bytes()
        })
        .collect();
    Cow::Owned(scaled)
}
