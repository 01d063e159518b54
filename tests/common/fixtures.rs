use anyhow::Result;
use image::{Rgb, RgbImage};
use parkwatch::display::{CancelToken, Display};
use parkwatch::{OccupancyState, Roi, RunConfig};
use std::path::Path;

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 32;

const ASPHALT: Rgb<u8> = Rgb([120, 120, 120]);
const DARK: Rgb<u8> = Rgb([10, 10, 10]);
const LIGHT: Rgb<u8> = Rgb([230, 230, 230]);

/// Four 12x12 spots in a row, 4px apart
pub fn lot_rois() -> Vec<Roi> {
    (0..4)
        .map(|i| Roi::new(2 + i * 16, 2, 12, 12).unwrap())
        .collect()
}

/// Flat asphalt with a high-contrast checkerboard "car" in every occupied spot
pub fn synthetic_frame(occupied: &[Roi]) -> RgbImage {
    let mut frame = RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, ASPHALT);
    for roi in occupied {
        for y in roi.y..roi.y + roi.h {
            for x in roi.x..roi.x + roi.w {
                let cell = (x - roi.x) / 2 + (y - roi.y) / 2;
                frame.put_pixel(x, y, if cell % 2 == 0 { DARK } else { LIGHT });
            }
        }
    }
    frame
}

/// Write frames as `000.png`, `001.png`, ... so they sort in order
pub fn write_frames(dir: &Path, frames: &[RgbImage]) {
    std::fs::create_dir_all(dir).expect("Failed to create frame directory");
    for (i, frame) in frames.iter().enumerate() {
        frame
            .save(dir.join(format!("{:03}.png", i)))
            .expect("Failed to save frame");
    }
}

/// Config with every output inside `root`
pub fn config_in(root: &Path) -> RunConfig {
    RunConfig {
        video: root.join("input"),
        video_output: root.join("output"),
        graph_output: root.join("graph.png"),
        rois: root.join("rois.txt"),
        start_frame: 0,
        snapshot_dir: Some(root.join("snapshots")),
        fallback_fps: 10.0,
        ..RunConfig::default()
    }
}

/// Display that answers the ROI prompt from a script and can cancel mid-run
#[derive(Default)]
pub struct ScriptedDisplay {
    pub regions: Vec<Roi>,
    pub shown: Vec<usize>,
    pub cancel_after: Option<(usize, CancelToken)>,
    pub closed: bool,
}

impl Display for ScriptedDisplay {
    fn solicit_regions(&mut self, _frame: &RgbImage) -> Result<Vec<Roi>> {
        Ok(self.regions.clone())
    }

    fn show(&mut self, _frame_index: usize, _frame: &RgbImage, state: &OccupancyState) -> Result<()> {
        self.shown.push(state.free_count());
        if let Some((limit, token)) = &self.cancel_after {
            if self.shown.len() >= *limit {
                token.cancel();
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
