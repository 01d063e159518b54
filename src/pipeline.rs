use image::{DynamicImage, GrayImage, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};

/// Snapshot configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Directory receiving one `<snapshot_name>.png` per step
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub snapshots: Option<SnapshotConfig>,
}

/// Trait that all preprocessing steps must implement
pub trait PipelineStep: Send + Sync {
    /// Transform one image into the next stage's input
    fn process(&self, image: DynamicImage, context: &PipelineContext) -> Result<DynamicImage>;

    /// Human-readable name for this step (used in log output)
    fn name(&self) -> &str;

    /// File stem used when the step's output is saved as a snapshot
    fn snapshot_name(&self) -> &str;
}

/// Composable preprocessing chain.
/// The last step must produce a single-channel image.
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run every step on a color frame and return the final mask
    pub fn run(&self, frame: &RgbImage) -> Result<GrayImage> {
        self.execute(frame, &PipelineContext::default())
    }

    /// Run the pipeline and save each step's output into `output_dir`
    pub fn run_with_snapshots(&self, frame: &RgbImage, output_dir: &Path) -> Result<GrayImage> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create snapshot directory {}", output_dir.display())
        })?;
        let context = PipelineContext {
            snapshots: Some(SnapshotConfig {
                output_dir: output_dir.to_path_buf(),
            }),
        };
        self.execute(frame, &context)
    }

    fn execute(&self, frame: &RgbImage, context: &PipelineContext) -> Result<GrayImage> {
        let mut image = DynamicImage::ImageRgb8(frame.clone());

        for step in &self.steps {
            log::trace!("Running step: {}", step.name());
            image = step
                .process(image, context)
                .with_context(|| format!("Step '{}' failed", step.name()))?;

            if let Some(snapshots) = &context.snapshots {
                let path = snapshots.output_dir.join(format!("{}.png", step.snapshot_name()));
                image
                    .save(&path)
                    .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
                log::debug!("Saved {} snapshot to {}", step.name(), path.display());
            }
        }

        Ok(image.to_luma8())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::build_standard_pipeline;
    use image::Rgb;

    #[test]
    fn standard_pipeline_keeps_dimensions() {
        let frame = RgbImage::from_pixel(13, 7, Rgb([40, 80, 120]));
        let mask = build_standard_pipeline().run(&frame).unwrap();
        assert_eq!(mask.dimensions(), (13, 7));
        assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn empty_pipeline_returns_luma_of_input() {
        let frame = RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]));
        let out = Pipeline::new().run(&frame).unwrap();
        assert!(out.pixels().all(|p| p[0] == 9));
    }

    #[test]
    fn snapshots_written_per_step() {
        let dir = tempfile::tempdir().unwrap();
        let frame = RgbImage::from_pixel(8, 8, Rgb([200, 10, 10]));
        build_standard_pipeline()
            .run_with_snapshots(&frame, dir.path())
            .unwrap();
        for name in ["gray.png", "blur.png", "thresh.png"] {
            assert!(dir.path().join(name).is_file(), "missing {}", name);
        }
    }
}
