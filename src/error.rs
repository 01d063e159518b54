use std::path::PathBuf;
use thiserror::Error;

use crate::models::Roi;

/// Errors raised by the library layer
#[derive(Debug, Error)]
pub enum ParkError {
    #[error("could not open video '{path}': {reason}")]
    VideoOpen { path: PathBuf, reason: String },

    #[error("malformed ROI on line {line}: {reason}")]
    RoiParse { line: usize, reason: String },

    #[error("ROI {0} has zero width or height")]
    InvalidRoi(Roi),

    #[error("ROI {roi} does not fit inside a {width}x{height} frame")]
    RoiOutOfBounds { roi: Roi, width: u32, height: u32 },

    #[error("codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParkError>;
