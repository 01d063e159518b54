pub mod preprocessing;
pub mod occupancy;
pub mod steps;

use image::RgbImage;

use crate::models::{OccupancyState, Roi};
use crate::pipeline::Pipeline;

/// Per-frame occupancy detector: preprocessing chain plus mean-intensity test
pub struct OccupancyDetector {
    pub threshold: f32,
    preprocessor: Pipeline,
}

impl OccupancyDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            preprocessor: build_standard_pipeline(),
        }
    }

    pub fn preprocessor(&self) -> &Pipeline {
        &self.preprocessor
    }

    /// Classify every ROI on one color frame
    pub fn detect(&self, frame: &RgbImage, rois: &[Roi]) -> anyhow::Result<OccupancyState> {
        let mask = self.preprocessor.run(frame)?;
        Ok(occupancy::classify(&mask, rois, self.threshold))
    }
}

impl Default for OccupancyDetector {
    fn default() -> Self {
        Self::new(occupancy::DEFAULT_THRESHOLD)
    }
}

/// Grayscale → 3x3 blur → inverted adaptive threshold
pub fn build_standard_pipeline() -> Pipeline {
    use crate::detection::steps::*;
    use std::sync::Arc;

    Pipeline::new()
        .add_step(Arc::new(GrayscaleStep))
        .add_step(Arc::new(BlurStep))
        .add_step(Arc::new(AdaptiveThresholdStep::default()))
}
