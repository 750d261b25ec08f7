use crate::error::LoadError;
use crate::geometry::ViewportSize;
use crate::pixels::{pixel_offset, rounded_div, PixelBuffer, BYTES_PER_PIXEL};
use std::str::FromStr;

/// Post-decode fitting applied after orientation is corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Letterbox into a transparent viewport-sized canvas, aspect preserved.
    Rect,
    /// Scale to the viewport width and center vertically on a viewport-sized canvas.
    Scale,
    /// Scale to the viewport width, height follows the aspect ratio.
    Width,
    /// Scale to the viewport height, width follows the aspect ratio.
    Height,
    /// Uniform scale so the image fits inside the viewport, no canvas.
    Fill,
}

impl FitMode {
    pub fn apply(
        self,
        buffer: PixelBuffer,
        viewport: ViewportSize,
    ) -> Result<PixelBuffer, LoadError> {
        let (vw, vh) = (viewport.width(), viewport.height());
        match self {
            FitMode::Rect => fit_to_view_by_rect(buffer, vw, vh),
            FitMode::Scale => fit_to_view_by_scale(buffer, vw, vh),
            FitMode::Width => scale_to_fit_width(buffer, vw),
            FitMode::Height => scale_to_fit_height(buffer, vh),
            FitMode::Fill => scale_to_fill(buffer, vw, vh),
        }
    }
}

impl FromStr for FitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rect" => Ok(FitMode::Rect),
            "scale" => Ok(FitMode::Scale),
            "width" => Ok(FitMode::Width),
            "height" => Ok(FitMode::Height),
            "fill" => Ok(FitMode::Fill),
            other => Err(format!(
                "unknown fit mode '{}' (expected rect, scale, width, height or fill)",
                other
            )),
        }
    }
}

fn scaled_dim(dim: u32, factor: f64) -> u32 {
    ((dim as f64 * factor) as u32).max(1)
}

/// Scale to `width`, keeping the aspect ratio.
pub fn scale_to_fit_width(buffer: PixelBuffer, width: u32) -> Result<PixelBuffer, LoadError> {
    let factor = width as f64 / buffer.width() as f64;
    let height = scaled_dim(buffer.height(), factor);
    resize_bilinear(buffer, width.max(1), height)
}

/// Scale to `height`, keeping the aspect ratio.
pub fn scale_to_fit_height(buffer: PixelBuffer, height: u32) -> Result<PixelBuffer, LoadError> {
    let factor = height as f64 / buffer.height() as f64;
    let width = scaled_dim(buffer.width(), factor);
    resize_bilinear(buffer, width, height.max(1))
}

/// Uniform scale by the smaller of the two axis factors.
pub fn scale_to_fill(
    buffer: PixelBuffer,
    width: u32,
    height: u32,
) -> Result<PixelBuffer, LoadError> {
    let (src_w, src_h) = buffer.dimensions();
    let factor = (width as f64 / src_w as f64).min(height as f64 / src_h as f64);
    resize_bilinear(buffer, scaled_dim(src_w, factor), scaled_dim(src_h, factor))
}

/// Center the image in a transparent `width x height` canvas, scaled to fit.
pub fn fit_to_view_by_rect(
    buffer: PixelBuffer,
    width: u32,
    height: u32,
) -> Result<PixelBuffer, LoadError> {
    let mut canvas = PixelBuffer::try_new(width, height)?;
    let scaled = scale_to_fill(buffer, width, height)?;
    let ox = (width as i64 - scaled.width() as i64) / 2;
    let oy = (height as i64 - scaled.height() as i64) / 2;
    blit(&mut canvas, &scaled, ox, oy);
    Ok(canvas)
}

/// Scale to the canvas width and center vertically; rows outside the canvas are clipped.
pub fn fit_to_view_by_scale(
    buffer: PixelBuffer,
    width: u32,
    height: u32,
) -> Result<PixelBuffer, LoadError> {
    let mut canvas = PixelBuffer::try_new(width, height)?;
    let scaled = scale_to_fit_width(buffer, width)?;
    let oy = (height as i64 - scaled.height() as i64) / 2;
    blit(&mut canvas, &scaled, 0, oy);
    Ok(canvas)
}

/// Copy `img` onto `canvas` at (ox, oy), clipping to the canvas.
fn blit(canvas: &mut PixelBuffer, img: &PixelBuffer, ox: i64, oy: i64) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let (iw, ih) = (img.width() as i64, img.height() as i64);

    let x0 = ox.max(0);
    let x1 = (ox + iw).min(cw);
    if x0 >= x1 {
        return;
    }
    let span = (x1 - x0) as usize * BYTES_PER_PIXEL;
    let src = img.as_raw();
    let dst = canvas.as_raw_mut();

    for dy in oy.max(0)..(oy + ih).min(ch) {
        let sy = dy - oy;
        let s = ((sy * iw + (x0 - ox)) as usize) * BYTES_PER_PIXEL;
        let d = ((dy * cw + x0) as usize) * BYTES_PER_PIXEL;
        dst[d..d + span].copy_from_slice(&src[s..s + span]);
    }
}

/// Fractional bits of the fixed-point sample positions.
const FRAC_BITS: u32 = 8;
const FRAC_ONE: u32 = 1 << FRAC_BITS;

/// Source position of each destination column or row: the lower neighbour,
/// the upper neighbour, and the weight of the upper one in `FRAC_ONE` units.
/// End points map onto end points.
fn sample_positions(src: u32, dst: u32) -> Vec<(u32, u32, u32)> {
    let span = u64::from(src - 1) << FRAC_BITS;
    // A single destination sample sits on the first source sample
    let steps = if dst > 1 { u64::from(dst - 1) } else { u64::MAX };
    (0..dst)
        .map(|d| {
            let pos = (span * u64::from(d) / steps) as u32;
            let lo = pos >> FRAC_BITS;
            (lo, (lo + 1).min(src - 1), pos & (FRAC_ONE - 1))
        })
        .collect()
}

/// Resize using bilinear interpolation. Consumes the input.
pub fn resize_bilinear(
    src: PixelBuffer,
    dst_w: u32,
    dst_h: u32,
) -> Result<PixelBuffer, LoadError> {
    let (src_w, src_h) = src.dimensions();
    if src_w == dst_w && src_h == dst_h {
        return Ok(src);
    }

    let mut out = PixelBuffer::try_new(dst_w, dst_h)?;
    let cols = sample_positions(src_w, dst_w);
    let rows = sample_positions(src_h, dst_h);
    let raw = src.as_raw();
    let out_raw = out.as_raw_mut();

    for (dy, &(y0, y1, fy)) in rows.iter().enumerate() {
        for (dx, &(x0, x1, fx)) in cols.iter().enumerate() {
            let taps = [
                (pixel_offset(src_w, x0, y0), (FRAC_ONE - fx) * (FRAC_ONE - fy)),
                (pixel_offset(src_w, x1, y0), fx * (FRAC_ONE - fy)),
                (pixel_offset(src_w, x0, y1), (FRAC_ONE - fx) * fy),
                (pixel_offset(src_w, x1, y1), fx * fy),
            ];
            let d = pixel_offset(dst_w, dx as u32, dy as u32);
            for c in 0..BYTES_PER_PIXEL {
                let sum: u32 = taps.iter().map(|&(i, w)| u32::from(raw[i + c]) * w).sum();
                out_raw[d + c] = rounded_div(sum, FRAC_ONE * FRAC_ONE);
            }
        }
    }

    Ok(out)
}
