use std::fmt;

use crate::error::{ParkError, Result};

/// A parking spot: axis-aligned rectangle in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Roi {
    /// Create a ROI, rejecting empty rectangles
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Result<Self> {
        let roi = Self { x, y, w, h };
        if w == 0 || h == 0 {
            return Err(ParkError::InvalidRoi(roi));
        }
        Ok(roi)
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.w as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.h as u64
    }

    /// True if the whole rectangle lies inside a `width` x `height` frame
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }

    /// Intersect with a `width` x `height` frame.
    /// Returns `(x, y, w, h)` of the visible part, or None if nothing is visible.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = (self.right().min(width as u64) - self.x as u64) as u32;
        let h = (self.bottom().min(height as u64) - self.y as u64) as u32;
        Some((self.x, self.y, w, h))
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.w, self.h)
    }
}

/// How ROIs that extend past the frame edge are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    /// Use only the visible part of the rectangle
    #[default]
    Clip,
    /// Refuse ROIs that are not fully inside the frame
    Reject,
}

impl BoundsPolicy {
    /// Validate a ROI set against the frame size under this policy
    pub fn check(&self, rois: &[Roi], width: u32, height: u32) -> Result<()> {
        if *self == BoundsPolicy::Clip {
            return Ok(());
        }
        match rois.iter().find(|r| !r.fits_within(width, height)) {
            Some(roi) => Err(ParkError::RoiOutOfBounds {
                roi: *roi,
                width,
                height,
            }),
            None => Ok(()),
        }
    }
}

/// Per-frame classification result.
/// `occupied` and `free` are ascending and partition `0..total`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyState {
    pub occupied: Vec<usize>,
    pub free: Vec<usize>,
}

impl OccupancyState {
    pub fn total(&self) -> usize {
        self.occupied.len() + self.free.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }
}

/// Free-space count for every processed frame, in order
pub type CountSeries = Vec<usize>;

/// Geometry and timing of a video source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoProperties {
    /// Wait between frames when pacing playback
    pub fn frame_interval(&self) -> std::time::Duration {
        if self.fps > 0.0 {
            std::time::Duration::from_millis((1000.0 / self.fps) as u64)
        } else {
            std::time::Duration::ZERO
        }
    }
}
