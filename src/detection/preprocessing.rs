use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::{gaussian_blur_f32, separable_filter_equal};

/// Block size of the local mean used by [`adaptive_threshold`]
pub const ADAPTIVE_BLOCK_SIZE: usize = 7;

/// Offset subtracted from the local mean by [`adaptive_threshold`]
pub const ADAPTIVE_OFFSET: f32 = 5.0;

/// 3-tap binomial kernel used by [`apply_blur`]
pub const BLUR_KERNEL: [f32; 3] = [0.25, 0.5, 0.25];

const KERNEL_5: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];
const KERNEL_7: [f32; 7] = [0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125];

/// Convert image to grayscale (BT.601 luma)
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let Rgb([r, g, b]) = *img.get_pixel(x, y);
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Apply a 3x3 Gaussian blur
pub fn apply_blur(img: &GrayImage) -> GrayImage {
    separable_filter_equal(img, &BLUR_KERNEL)
}

/// Fixed Gaussian taps for the small block sizes, `None` above 7
pub fn small_gaussian_kernel(block_size: usize) -> Option<&'static [f32]> {
    match block_size {
        3 => Some(&BLUR_KERNEL),
        5 => Some(&KERNEL_5),
        7 => Some(&KERNEL_7),
        _ => None,
    }
}

/// Gaussian-weighted mean over a `block_size` x `block_size` neighbourhood
fn local_mean(img: &GrayImage, block_size: usize) -> GrayImage {
    match small_gaussian_kernel(block_size) {
        Some(kernel) => separable_filter_equal(img, kernel),
        None => {
            let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
            gaussian_blur_f32(img, sigma)
        }
    }
}

/// Inverted adaptive threshold against a Gaussian-weighted local mean.
///
/// A pixel becomes 255 when it is at most `mean - offset`, where `mean` is
/// taken over a `block_size` x `block_size` neighbourhood; everything else is 0.
pub fn adaptive_threshold(img: &GrayImage, block_size: usize, offset: f32) -> GrayImage {
    let mean = local_mean(img, block_size);

    let mut out = GrayImage::new(img.width(), img.height());
    for ((dst, src), m) in out.pixels_mut().zip(img.pixels()).zip(mean.pixels()) {
        let local = m[0] as f32 - offset;
        *dst = if (src[0] as f32) <= local { Luma([255]) } else { Luma([0]) };
    }
    out
}
