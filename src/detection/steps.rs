use crate::detection::preprocessing;
use crate::pipeline::{PipelineContext, PipelineStep};
use anyhow::{Result, bail};
use image::DynamicImage;

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, image: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        let gray = preprocessing::to_grayscale(&image.to_rgb8());
        Ok(DynamicImage::ImageLuma8(gray))
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }

    fn snapshot_name(&self) -> &str {
        "gray"
    }
}

/// Apply 3x3 Gaussian blur
pub struct BlurStep;

impl PipelineStep for BlurStep {
    fn process(&self, image: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        let blurred = preprocessing::apply_blur(&image.to_luma8());
        Ok(DynamicImage::ImageLuma8(blurred))
    }

    fn name(&self) -> &str {
        "Gaussian Blur"
    }

    fn snapshot_name(&self) -> &str {
        "blur"
    }
}

/// Binarize against a local Gaussian mean, dark detail becomes 255
pub struct AdaptiveThresholdStep {
    pub block_size: usize,
    pub offset: f32,
}

impl Default for AdaptiveThresholdStep {
    fn default() -> Self {
        Self {
            block_size: preprocessing::ADAPTIVE_BLOCK_SIZE,
            offset: preprocessing::ADAPTIVE_OFFSET,
        }
    }
}

impl PipelineStep for AdaptiveThresholdStep {
    fn process(&self, image: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            bail!("adaptive threshold block size must be odd and >= 3, got {}", self.block_size);
        }
        let mask = preprocessing::adaptive_threshold(&image.to_luma8(), self.block_size, self.offset);
        Ok(DynamicImage::ImageLuma8(mask))
    }

    fn name(&self) -> &str {
        "Adaptive Threshold"
    }

    fn snapshot_name(&self) -> &str {
        "thresh"
    }
}
