use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::font::{self, GLYPH_HEIGHT};
use crate::video::FrameSink;

/// Write every frame in order, then finalize the sink.
/// Returns the number of frames written.
pub fn write_video(frames: &[RgbImage], sink: &mut dyn FrameSink) -> Result<u64> {
    for (idx, frame) in frames.iter().enumerate() {
        sink.write_frame(frame)
            .with_context(|| format!("Failed to write frame {}", idx))?;
    }
    sink.finish().context("Failed to finalize video output")?;
    Ok(sink.frames_written())
}

/// Text of a time-series plot
#[derive(Debug, Clone)]
pub struct PlotLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl Default for PlotLabels {
    fn default() -> Self {
        Self {
            title: "Free spaces over time".to_string(),
            x_label: "Frame".to_string(),
            y_label: "Free spaces".to_string(),
        }
    }
}

/// Canvas size of a rendered plot
#[derive(Debug, Clone, Copy)]
pub struct PlotSize {
    pub width: u32,
    pub height: u32,
}

impl Default for PlotSize {
    fn default() -> Self {
        Self { width: 800, height: 600 }
    }
}

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

const MARGIN_LEFT: u32 = 70;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 60;
const MARGIN_BOTTOM: u32 = 70;
const TICK_LEN: f32 = 5.0;

/// Round `range / target` up to 1, 2 or 5 times a power of ten
fn nice_step(range: f64, target: usize) -> f64 {
    if range <= 0.0 {
        return 1.0;
    }
    let raw = range / target.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    step.max(1.0)
}

/// Render a line plot of `series` against its index
pub fn render_time_series(series: &[usize], labels: &PlotLabels, size: PlotSize) -> RgbImage {
    let mut img = RgbImage::from_pixel(size.width, size.height, BACKGROUND);

    let left = MARGIN_LEFT as f32;
    let top = MARGIN_TOP as f32;
    let right = size.width.saturating_sub(MARGIN_RIGHT).max(MARGIN_LEFT + 1) as f32;
    let bottom = size.height.saturating_sub(MARGIN_BOTTOM).max(MARGIN_TOP + 1) as f32;

    let x_max = series.len().saturating_sub(1).max(1) as f64;
    let y_max = series.iter().copied().max().unwrap_or(0).max(1) as f64;

    let to_px = |i: f64, v: f64| -> (f32, f32) {
        let x = left + ((i / x_max) as f32) * (right - left);
        let y = bottom - ((v / y_max) as f32) * (bottom - top);
        (x, y)
    };

    // Grid and tick labels
    let y_step = nice_step(y_max, 6);
    let mut v = 0.0;
    while v <= y_max + 1e-9 {
        let (_, y) = to_px(0.0, v);
        draw_line_segment_mut(&mut img, (left, y), (right, y), GRID);
        draw_line_segment_mut(&mut img, (left - TICK_LEN, y), (left, y), AXIS);
        let text = format!("{}", v as u64);
        let tx = left as i32 - TICK_LEN as i32 - 4 - font::text_width(&text, 1) as i32;
        font::draw_text(&mut img, &text, tx, y as i32 - GLYPH_HEIGHT as i32 / 2, 1, AXIS);
        v += y_step;
    }

    let x_step = nice_step(x_max, 8);
    let mut i = 0.0;
    while i <= x_max + 1e-9 {
        let (x, _) = to_px(i, 0.0);
        draw_line_segment_mut(&mut img, (x, top), (x, bottom), GRID);
        draw_line_segment_mut(&mut img, (x, bottom), (x, bottom + TICK_LEN), AXIS);
        let text = format!("{}", i as u64);
        let tx = x as i32 - font::text_width(&text, 1) as i32 / 2;
        font::draw_text(&mut img, &text, tx, bottom as i32 + TICK_LEN as i32 + 4, 1, AXIS);
        i += x_step;
    }

    // Axes
    draw_line_segment_mut(&mut img, (left, top), (left, bottom), AXIS);
    draw_line_segment_mut(&mut img, (left, bottom), (right, bottom), AXIS);

    // Series
    match series {
        [] => {}
        [only] => {
            let (x, y) = to_px(0.0, *only as f64);
            draw_filled_rect_mut(&mut img, Rect::at(x as i32 - 1, y as i32 - 1).of_size(3, 3), LINE);
        }
        _ => {
            for (idx, pair) in series.windows(2).enumerate() {
                let a = to_px(idx as f64, pair[0] as f64);
                let b = to_px((idx + 1) as f64, pair[1] as f64);
                draw_line_segment_mut(&mut img, a, b, LINE);
                draw_line_segment_mut(&mut img, (a.0, a.1 + 1.0), (b.0, b.1 + 1.0), LINE);
            }
        }
    }

    // Labels
    let center = |text: &str, scale: u32| -> i32 {
        (size.width as i32 - font::text_width(text, scale) as i32) / 2
    };
    let title_y = (MARGIN_TOP as i32 - 2 * GLYPH_HEIGHT as i32) / 2;
    font::draw_text(&mut img, &labels.title, center(&labels.title, 2), title_y, 2, AXIS);
    let x_label_y = size.height as i32 - MARGIN_BOTTOM as i32 / 2;
    font::draw_text(&mut img, &labels.x_label, center(&labels.x_label, 2), x_label_y, 2, AXIS);
    font::draw_text(
        &mut img,
        &labels.y_label,
        10,
        MARGIN_TOP as i32 - GLYPH_HEIGHT as i32 - 8,
        1,
        AXIS,
    );

    img
}

/// Render the plot once and save it to `output`
pub fn plot_time_series(series: &[usize], labels: &PlotLabels, size: PlotSize, output: &Path) -> Result<()> {
    let img = render_time_series(series, labels, size);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    img.save(output)
        .with_context(|| format!("Failed to save graph to {}", output.display()))?;
    Ok(())
}
