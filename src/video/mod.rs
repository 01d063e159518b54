//! Frame sources and sinks.
//!
//! A directory is read and written as an image sequence (one file per frame,
//! ordered by file name). Container files (`.mp4`, `.avi`, ...) need the
//! `ffmpeg` feature.

pub mod memory;
pub mod sequence;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

use std::path::Path;

use anyhow::Result;
use image::RgbImage;

use crate::error::ParkError;
use crate::models::VideoProperties;

/// Four-character codec tag used for container output
pub const CODEC_TAG: &str = "mp4v";

/// Sequential reader of color frames
pub trait FrameSource {
    /// Geometry and frame rate of the stream
    fn properties(&self) -> VideoProperties;

    /// Position the stream so the next read returns frame `index`
    fn seek(&mut self, index: u64) -> Result<()>;

    /// Next frame, or None once the stream is exhausted
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Sequential writer of color frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush buffered output; no frames may be written afterwards
    fn finish(&mut self) -> Result<()>;

    fn frames_written(&self) -> u64;
}

/// Open a video for reading.
/// `fallback_fps` is used when the source carries no timing (image sequences).
pub fn open_source(path: &Path, fallback_fps: f64) -> Result<Box<dyn FrameSource>, ParkError> {
    if path.is_dir() {
        let source = sequence::ImageSequenceSource::open(path, fallback_fps)?;
        return Ok(Box::new(source));
    }
    if !path.exists() {
        return Err(ParkError::VideoOpen {
            path: path.to_path_buf(),
            reason: "no such file or directory".to_string(),
        });
    }

    #[cfg(feature = "ffmpeg")]
    {
        let source = ffmpeg::FfmpegSource::open(path)?;
        Ok(Box::new(source))
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        Err(ParkError::VideoOpen {
            path: path.to_path_buf(),
            reason: "container decoding requires the `ffmpeg` feature; pass a frame directory instead"
                .to_string(),
        })
    }
}

/// True when `path` names an image-sequence output rather than a container file
pub fn is_sequence_path(path: &Path) -> bool {
    path.is_dir() || path.extension().is_none()
}

/// Create a writer at source resolution and frame rate
pub fn create_sink(path: &Path, properties: VideoProperties) -> Result<Box<dyn FrameSink>> {
    if is_sequence_path(path) {
        return Ok(Box::new(sequence::ImageSequenceSink::create(path, properties)?));
    }

    #[cfg(feature = "ffmpeg")]
    {
        Ok(Box::new(ffmpeg::FfmpegSink::create(path, properties)?))
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        Err(ParkError::Codec(format!(
            "cannot encode '{}': container output requires the `ffmpeg` feature; \
             use an output path without extension to write an image sequence",
            path.display()
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_source(&dir.path().join("nope.mp4"), 30.0);
        assert!(matches!(result, Err(ParkError::VideoOpen { .. })));
    }

    #[test]
    fn extensionless_output_is_a_sequence() {
        assert!(is_sequence_path(Path::new("out/frames")));
        assert!(!is_sequence_path(Path::new("out/video.mp4")));
    }
}
