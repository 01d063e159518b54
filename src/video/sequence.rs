//! Image-sequence backend: a directory of numbered still frames.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use image::RgbImage;

use super::{FrameSink, FrameSource};
use crate::error::ParkError;
use crate::models::VideoProperties;

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Reads every image in a directory, sorted by file name
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    cursor: usize,
    properties: VideoProperties,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, ParkError> {
        let open_err = |reason: String| ParkError::VideoOpen {
            path: dir.to_path_buf(),
            reason,
        };

        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| open_err(e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_frame_file(p))
            .collect();
        frames.sort();

        let first = frames
            .first()
            .ok_or_else(|| open_err("directory contains no image frames".to_string()))?;
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| open_err(format!("cannot read {}: {}", first.display(), e)))?;

        Ok(Self {
            frames,
            cursor: 0,
            properties: VideoProperties { width, height, fps },
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        self.cursor = usize::try_from(index).unwrap_or(usize::MAX).min(self.frames.len());
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let frame = image::open(path)
            .with_context(|| format!("Failed to decode frame {}", path.display()))?
            .to_rgb8();
        if frame.dimensions() != (self.properties.width, self.properties.height) {
            bail!(
                "frame {} is {}x{}, expected {}x{}",
                path.display(),
                frame.width(),
                frame.height(),
                self.properties.width,
                self.properties.height
            );
        }
        Ok(Some(frame))
    }
}

/// Writes `frame_000000.png`, `frame_000001.png`, ... into a directory
pub struct ImageSequenceSink {
    dir: PathBuf,
    properties: VideoProperties,
    written: u64,
    finished: bool,
}

impl ImageSequenceSink {
    pub fn create(dir: &Path, properties: VideoProperties) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            properties,
            written: 0,
            finished: false,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            bail!("sink {} is already finished", self.dir.display());
        }
        if frame.dimensions() != (self.properties.width, self.properties.height) {
            bail!(
                "frame is {}x{}, sink expects {}x{}",
                frame.width(),
                frame.height(),
                self.properties.width,
                self.properties.height
            );
        }
        let path = self.frame_path(self.written);
        frame
            .save(&path)
            .with_context(|| format!("Failed to write frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}
