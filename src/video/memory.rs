//! In-memory frame source and sink, for embedding and headless runs.

use anyhow::{Result, bail};
use image::RgbImage;

use super::{FrameSink, FrameSource};
use crate::models::VideoProperties;

/// Plays back a fixed list of frames.
/// Set `fail_at` to simulate an unreadable frame at that position.
pub struct MemorySource {
    frames: Vec<RgbImage>,
    cursor: usize,
    properties: VideoProperties,
    pub fail_at: Option<usize>,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            frames,
            cursor: 0,
            properties: VideoProperties { width, height, fps },
            fail_at: None,
        }
    }
}

impl FrameSource for MemorySource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        self.cursor = usize::try_from(index).unwrap_or(usize::MAX).min(self.frames.len());
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.fail_at == Some(self.cursor) {
            bail!("simulated read failure at frame {}", self.cursor);
        }
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }
}

/// Collects written frames
#[derive(Default)]
pub struct MemorySink {
    pub frames: Vec<RgbImage>,
    pub finished: bool,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            bail!("sink is already finished");
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames.len() as u64
    }
}
