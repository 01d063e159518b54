use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::font;
use crate::models::{OccupancyState, Roi};

/// Colour for ROIs that have not been classified yet
pub const UNCLASSIFIED: Rgb<u8> = Rgb([0, 0, 255]);
pub const OCCUPIED: Rgb<u8> = Rgb([255, 0, 0]);
pub const FREE: Rgb<u8> = Rgb([0, 255, 0]);
pub const OVERLAY_TEXT: Rgb<u8> = Rgb([255, 255, 0]);

pub const BOX_THICKNESS: u32 = 2;
const TEXT_ORIGIN: (i32, i32) = (10, 10);
const TEXT_SCALE: u32 = 3;

/// Outline each ROI with a `BOX_THICKNESS`-pixel rectangle.
/// ROIs are clipped to the frame first; one fully outside it draws nothing.
pub fn draw_boxes<'a>(frame: &mut RgbImage, rois: impl IntoIterator<Item = &'a Roi>, color: Rgb<u8>) {
    let (width, height) = frame.dimensions();
    for roi in rois {
        let Some((x, y, w, h)) = roi.clip_to(width, height) else {
            continue;
        };
        let (x, y) = (i32::try_from(x).unwrap_or(i32::MAX), i32::try_from(y).unwrap_or(i32::MAX));
        for inset in 0..BOX_THICKNESS {
            // Grow outwards; the inner edge stays on the ROI boundary
            let grow = inset.saturating_mul(2);
            let rect = Rect::at(x.saturating_sub(inset as i32), y.saturating_sub(inset as i32))
                .of_size(w.saturating_add(grow), h.saturating_add(grow));
            draw_hollow_rect_mut(frame, rect, color);
        }
    }
}

/// Write `"<free>/<total>"` in the top-left corner
pub fn draw_count(frame: &mut RgbImage, free: usize, total: usize) {
    let text = format!("{}/{}", free, total);
    font::draw_text(frame, &text, TEXT_ORIGIN.0, TEXT_ORIGIN.1, TEXT_SCALE, OVERLAY_TEXT);
}

/// Colour occupied spots red, free spots green and add the count overlay
pub fn annotate_frame(frame: &mut RgbImage, rois: &[Roi], state: &OccupancyState) {
    draw_boxes(frame, state.occupied.iter().map(|&i| &rois[i]), OCCUPIED);
    draw_boxes(frame, state.free.iter().map(|&i| &rois[i]), FREE);
    draw_count(frame, state.free_count(), rois.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_outline_is_two_pixels_wide() {
        let mut frame = RgbImage::new(20, 20);
        let roi = Roi::new(5, 5, 6, 6).unwrap();
        draw_boxes(&mut frame, [&roi], FREE);

        assert_eq!(*frame.get_pixel(5, 5), FREE);
        assert_eq!(*frame.get_pixel(4, 4), FREE);
        assert_eq!(*frame.get_pixel(10, 8), FREE);
        assert_eq!(*frame.get_pixel(11, 8), FREE);
        assert_eq!(*frame.get_pixel(3, 3), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(7, 7), Rgb([0, 0, 0]));
    }

    #[test]
    fn annotate_uses_state_colours() {
        let mut frame = RgbImage::new(120, 60);
        let rois = vec![Roi::new(40, 30, 10, 10).unwrap(), Roi::new(70, 30, 10, 10).unwrap()];
        let state = OccupancyState {
            occupied: vec![1],
            free: vec![0],
        };
        annotate_frame(&mut frame, &rois, &state);

        assert_eq!(*frame.get_pixel(40, 30), FREE);
        assert_eq!(*frame.get_pixel(70, 30), OCCUPIED);
        // First glyph of "1/2" lands at the overlay origin
        assert!(frame.enumerate_pixels().any(|(x, y, p)| x < 40 && y < 40 && *p == OVERLAY_TEXT));
    }

    #[test]
    fn boxes_near_edge_are_clipped() {
        let mut frame = RgbImage::new(10, 10);
        let roi = Roi::new(0, 0, 30, 30).unwrap();
        draw_boxes(&mut frame, [&roi], UNCLASSIFIED);
        assert_eq!(*frame.get_pixel(0, 0), UNCLASSIFIED);
        assert_eq!(*frame.get_pixel(9, 5), UNCLASSIFIED);
    }

    #[test]
    fn huge_and_offscreen_rois_do_not_overflow() {
        let mut frame = RgbImage::new(16, 8);
        let rois = [
            Roi::new(0, 0, u32::MAX, 4).unwrap(),
            Roi::new(u32::MAX - 1, u32::MAX - 1, 5, 5).unwrap(),
            Roi::new(3, 2, u32::MAX, u32::MAX).unwrap(),
        ];
        draw_boxes(&mut frame, &rois, FREE);

        assert_eq!(*frame.get_pixel(0, 0), FREE);
        assert_eq!(*frame.get_pixel(15, 2), FREE);
        assert_eq!(*frame.get_pixel(3, 7), FREE);
    }
}
