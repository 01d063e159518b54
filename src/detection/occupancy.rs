use image::{GenericImageView, GrayImage};

use crate::models::{OccupancyState, Roi};

/// Default mean-intensity threshold above which a spot counts as occupied
pub const DEFAULT_THRESHOLD: f32 = 20.0;

/// Mean intensity of the part of `roi` that lies inside the mask.
/// None when the ROI does not overlap the mask at all.
pub fn region_mean(mask: &GrayImage, roi: &Roi) -> Option<f32> {
    let (x, y, w, h) = roi.clip_to(mask.width(), mask.height())?;
    let view = mask.view(x, y, w, h);

    let sum: u64 = view.pixels().map(|(_, _, p)| p[0] as u64).sum();
    Some(sum as f32 / (w as u64 * h as u64) as f32)
}

/// A spot is occupied when its mean mask intensity exceeds the threshold.
/// Regions with no visible pixels are free.
pub fn is_occupied(mask: &GrayImage, roi: &Roi, threshold: f32) -> bool {
    region_mean(mask, roi).is_some_and(|mean| mean > threshold)
}

/// Split ROI indices into occupied and free sets
pub fn classify(mask: &GrayImage, rois: &[Roi], threshold: f32) -> OccupancyState {
    let mut state = OccupancyState::default();
    for (idx, roi) in rois.iter().enumerate() {
        if is_occupied(mask, roi, threshold) {
            state.occupied.push(idx);
        } else {
            state.free.push(idx);
        }
    }
    state
}
