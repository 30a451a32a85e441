// ============================================================================
// COMPOSITOR — square submission canvas, mask extraction, result cropping
// ============================================================================
//
// The edit service only accepts square images. A loaded image is fitted
// inside the square (aspect preserved) and letterboxed with a sentinel
// background; `PaddingInfo` remembers where it landed so the mask and the
// returned candidates can be aligned with it.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{EditError, Result};

/// Overlay pixels with alpha below this count as painted.
pub const MASK_ALPHA_THRESHOLD: u8 = 128;

/// Placement of the fitted image inside the square working canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaddingInfo {
    pub img_width: u32,
    pub img_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl PaddingInfo {
    /// True when square-canvas pixel (`x`, `y`) lies on the image.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.offset_x
            && x < self.offset_x + self.img_width
            && y >= self.offset_y
            && y < self.offset_y + self.img_height
    }
}

/// Which alpha value marks the region the service may regenerate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskConvention {
    /// Painted pixels are transparent, everything else opaque.
    TransparentIsEditable,
    /// Painted pixels are opaque, everything else transparent.
    OpaqueIsEditable,
}

impl MaskConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskConvention::TransparentIsEditable => "transparent",
            MaskConvention::OpaqueIsEditable => "opaque",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "transparent" => Some(MaskConvention::TransparentIsEditable),
            "opaque" => Some(MaskConvention::OpaqueIsEditable),
            _ => None,
        }
    }
}

/// Fit a `width`×`height` image into a `square`×`square` canvas.
///
/// Wider images are letterboxed vertically, taller ones horizontally and
/// square images sit at the origin.
pub fn fit_to_square(width: u32, height: u32, square: u32) -> PaddingInfo {
    if width == 0 || height == 0 || square == 0 {
        return PaddingInfo::default();
    }
    let scale = (square as f64 / width as f64).min(square as f64 / height as f64);
    let img_width = ((width as f64 * scale).round() as u32).clamp(1, square);
    let img_height = ((height as f64 * scale).round() as u32).clamp(1, square);

    let (offset_x, offset_y) = match width.cmp(&height) {
        std::cmp::Ordering::Greater => (0, (square - img_height) / 2),
        std::cmp::Ordering::Less => ((square - img_width) / 2, 0),
        std::cmp::Ordering::Equal => (0, 0),
    };

    PaddingInfo {
        img_width,
        img_height,
        offset_x,
        offset_y,
    }
}

/// Resize `image` to its fitted size inside the square.
pub fn fit_image(image: &RgbaImage, square: u32) -> (RgbaImage, PaddingInfo) {
    let padding = fit_to_square(image.width(), image.height(), square);
    let fitted = if image.dimensions() == (padding.img_width, padding.img_height) {
        image.clone()
    } else {
        imageops::resize(image, padding.img_width, padding.img_height, FilterType::Triangle)
    };
    (fitted, padding)
}

/// Build the square, background-filled canvas sent as `image`.
pub fn build_submission_canvas(
    image: &RgbaImage,
    square: u32,
    background: Rgba<u8>,
) -> (RgbaImage, PaddingInfo) {
    let (fitted, padding) = fit_image(image, square);
    let mut canvas = RgbaImage::from_pixel(square, square, background);
    for (x, y, px) in fitted.enumerate_pixels() {
        let dst = canvas.get_pixel_mut(x + padding.offset_x, y + padding.offset_y);
        *dst = composite_over(*px, *dst);
    }
    (canvas, padding)
}

/// Source-over with integer rounding, so opaque pixels copy through exactly.
fn composite_over(top: Rgba<u8>, bottom: Rgba<u8>) -> Rgba<u8> {
    let a = top[3] as u32;
    if a == 255 {
        return top;
    }
    if a == 0 {
        return bottom;
    }
    let inv = 255 - a;
    let ch = |t: u8, b: u8| ((t as u32 * a + b as u32 * inv + 127) / 255) as u8;
    Rgba([
        ch(top[0], bottom[0]),
        ch(top[1], bottom[1]),
        ch(top[2], bottom[2]),
        (a + (bottom[3] as u32 * inv + 127) / 255).min(255) as u8,
    ])
}

/// Build the square mask from the painted overlay.
///
/// The overlay is the working canvas (fitted size); it is placed at the
/// same offsets as the submission image. Padding is never editable.
pub fn extract_mask(
    overlay: &RgbaImage,
    padding: &PaddingInfo,
    square: u32,
    background: Rgba<u8>,
    convention: MaskConvention,
) -> Result<RgbaImage> {
    let expected = (padding.img_width, padding.img_height);
    if overlay.dimensions() != expected
        || padding.offset_x + padding.img_width > square
        || padding.offset_y + padding.img_height > square
    {
        return Err(EditError::DimensionMismatch {
            expected,
            actual: overlay.dimensions(),
        });
    }

    let (keep, edit) = match convention {
        MaskConvention::TransparentIsEditable => (
            Rgba([background[0], background[1], background[2], 255]),
            Rgba([0, 0, 0, 0]),
        ),
        MaskConvention::OpaqueIsEditable => (Rgba([0, 0, 0, 0]), Rgba([255, 255, 255, 255])),
    };

    let mut mask = RgbaImage::from_pixel(square, square, keep);
    let row_bytes = square as usize * 4;
    let padding = *padding;
    mask.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            if y < padding.offset_y || y >= padding.offset_y + padding.img_height {
                return;
            }
            let oy = y - padding.offset_y;
            for ox in 0..padding.img_width {
                if overlay.get_pixel(ox, oy)[3] >= MASK_ALPHA_THRESHOLD {
                    continue;
                }
                let i = (padding.offset_x + ox) as usize * 4;
                row[i..i + 4].copy_from_slice(&edit.0);
            }
        });

    Ok(mask)
}

/// Cut the fitted image region back out of a square service result.
pub fn crop_result(result: &RgbaImage, padding: &PaddingInfo, square: u32) -> RgbaImage {
    let squared;
    let source = if result.dimensions() == (square, square) {
        result
    } else {
        squared = imageops::resize(result, square, square, FilterType::Triangle);
        &squared
    };
    imageops::crop_imm(
        source,
        padding.offset_x,
        padding.offset_y,
        padding.img_width,
        padding.img_height,
    )
    .to_image()
}
