use crate::error::LoadError;
use crate::orientation::OrientationTag;
use crate::pixels::{PixelBuffer, BYTES_PER_PIXEL};
use log::debug;

/// Rotate `buffer` so the orientation recorded in `tag` ends up upright.
///
/// `Normal` and `Unknown` return the same buffer without copying. Quarter
/// turns allocate a new buffer with width and height exchanged; the input is
/// dropped either way.
pub fn normalize_orientation(buffer: PixelBuffer, tag: OrientationTag) -> PixelBuffer {
    let (w, h) = buffer.dimensions();
    match tag {
        OrientationTag::Normal | OrientationTag::Unknown => buffer,
        OrientationTag::Rotate90 => rotate_90_into(&buffer, PixelBuffer::new(h, w)),
        OrientationTag::Rotate180 => rotate_180_into(&buffer, PixelBuffer::new(w, h)),
        OrientationTag::Rotate270 => rotate_270_into(&buffer, PixelBuffer::new(h, w)),
    }
}

/// Like [`normalize_orientation`], but reports an allocation failure for the
/// rotated buffer instead of aborting. The input is released in both cases.
pub fn try_normalize_orientation(
    buffer: PixelBuffer,
    tag: OrientationTag,
) -> Result<PixelBuffer, LoadError> {
    let (w, h) = buffer.dimensions();
    let out = match tag {
        OrientationTag::Normal | OrientationTag::Unknown => return Ok(buffer),
        OrientationTag::Rotate90 => rotate_90_into(&buffer, PixelBuffer::try_new(h, w)?),
        OrientationTag::Rotate180 => rotate_180_into(&buffer, PixelBuffer::try_new(w, h)?),
        OrientationTag::Rotate270 => rotate_270_into(&buffer, PixelBuffer::try_new(h, w)?),
    };
    debug!(
        "rotated {}x{} by {} degrees -> {}x{}",
        w,
        h,
        tag.degrees(),
        out.width(),
        out.height()
    );
    Ok(out)
}

// ============================================================
// Quarter-turn remaps
// ============================================================

fn rotate_90_into(img: &PixelBuffer, mut out: PixelBuffer) -> PixelBuffer {
    let (w, h) = img.dimensions();
    let src_data = img.as_raw();
    let dst_data = out.as_raw_mut();
    for y in 0..h {
        for x in 0..w {
            let src = ((y * w + x) as usize) * BYTES_PER_PIXEL;
            let dst_x = h - 1 - y;
            let dst_y = x;
            let dst = ((dst_y * h + dst_x) as usize) * BYTES_PER_PIXEL;
            dst_data[dst..dst + BYTES_PER_PIXEL]
                .copy_from_slice(&src_data[src..src + BYTES_PER_PIXEL]);
        }
    }
    out
}

fn rotate_180_into(img: &PixelBuffer, mut out: PixelBuffer) -> PixelBuffer {
    let (w, h) = img.dimensions();
    let src_data = img.as_raw();
    let dst_data = out.as_raw_mut();
    for y in 0..h {
        for x in 0..w {
            let src = ((y * w + x) as usize) * BYTES_PER_PIXEL;
            let dst = (((h - 1 - y) * w + (w - 1 - x)) as usize) * BYTES_PER_PIXEL;
            dst_data[dst..dst + BYTES_PER_PIXEL]
                .copy_from_slice(&src_data[src..src + BYTES_PER_PIXEL]);
        }
    }
    out
}

fn rotate_270_into(img: &PixelBuffer, mut out: PixelBuffer) -> PixelBuffer {
    let (w, h) = img.dimensions();
    let src_data = img.as_raw();
    let dst_data = out.as_raw_mut();
    for y in 0..h {
        for x in 0..w {
            let src = ((y * w + x) as usize) * BYTES_PER_PIXEL;
            let dst_x = y;
            let dst_y = w - 1 - x;
            let dst = ((dst_y * h + dst_x) as usize) * BYTES_PER_PIXEL;
            dst_data[dst..dst + BYTES_PER_PIXEL]
                .copy_from_slice(&src_data[src..src + BYTES_PER_PIXEL]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::tests::coordinate_buffer;

    #[test]
    fn test_absent_buffer_stays_absent() {
        for tag in [OrientationTag::Normal, OrientationTag::Rotate90, OrientationTag::Unknown] {
            let none: Option<PixelBuffer> = None;
            assert!(none.map(|b| normalize_orientation(b, tag)).is_none());
        }
        let some = Some(coordinate_buffer(2, 1));
        let rotated = some.map(|b| normalize_orientation(b, OrientationTag::Rotate90));
        assert_eq!(rotated.map(|b| b.dimensions()), Some((1, 2)));
    }

    #[test]
    fn test_normal_is_passthrough() {
        let buf = coordinate_buffer(5, 3);
        let ptr = buf.as_raw().as_ptr();
        let expected = coordinate_buffer(5, 3);
        let out = normalize_orientation(buf, OrientationTag::Normal);
        assert_eq!(out, expected);
        // same allocation, no copy
        assert_eq!(out.as_raw().as_ptr(), ptr);

        let out = normalize_orientation(out, OrientationTag::Unknown);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_rotate_90_clockwise() {
        let out = normalize_orientation(coordinate_buffer(3, 2), OrientationTag::Rotate90);
        assert_eq!(out.dimensions(), (2, 3));
        // source top-left lands top-right
        assert_eq!(out.pixel(1, 0), [255, 0, 0, 0]);
        // source bottom-left lands top-left
        assert_eq!(out.pixel(0, 0), [255, 0, 1, 1]);
        // source top-right lands bottom-right
        assert_eq!(out.pixel(1, 2), [255, 2, 0, 2]);
    }

    #[test]
    fn test_rotate_180() {
        let out = normalize_orientation(coordinate_buffer(3, 2), OrientationTag::Rotate180);
        assert_eq!(out.dimensions(), (3, 2));
        assert_eq!(out.pixel(0, 0), [255, 2, 1, 3]);
        assert_eq!(out.pixel(2, 1), [255, 0, 0, 0]);
    }

    #[test]
    fn test_rotate_270_clockwise() {
        let out = normalize_orientation(coordinate_buffer(3, 2), OrientationTag::Rotate270);
        assert_eq!(out.dimensions(), (2, 3));
        // source top-left lands bottom-left
        assert_eq!(out.pixel(0, 2), [255, 0, 0, 0]);
        // source top-right lands top-left
        assert_eq!(out.pixel(0, 0), [255, 2, 0, 2]);
    }

    #[test]
    fn test_quarter_turns_round_trip() {
        let original = coordinate_buffer(7, 4);
        let turned = normalize_orientation(coordinate_buffer(7, 4), OrientationTag::Rotate90);
        assert_eq!(turned.dimensions(), (4, 7));
        let back = normalize_orientation(turned, OrientationTag::Rotate270);
        assert_eq!(back.dimensions(), original.dimensions());
        assert_eq!(back, original);

        let twice = normalize_orientation(
            normalize_orientation(coordinate_buffer(7, 4), OrientationTag::Rotate180),
            OrientationTag::Rotate180,
        );
        assert_eq!(twice, original);
    }

    #[test]
    fn test_try_normalize_matches_infallible() {
        for tag in [
            OrientationTag::Normal,
            OrientationTag::Rotate90,
            OrientationTag::Rotate180,
            OrientationTag::Rotate270,
            OrientationTag::Unknown,
        ] {
            let a = normalize_orientation(coordinate_buffer(6, 5), tag);
            let b = try_normalize_orientation(coordinate_buffer(6, 5), tag).unwrap();
            assert_eq!(a, b, "{:?}", tag);
        }
    }

    #[test]
    fn test_single_row_and_column() {
        let out = normalize_orientation(coordinate_buffer(4, 1), OrientationTag::Rotate90);
        assert_eq!(out.dimensions(), (1, 4));
        let out = normalize_orientation(out, OrientationTag::Rotate90);
        assert_eq!(out.dimensions(), (4, 1));
        assert_eq!(out.pixel(0, 0), [255, 3, 0, 3]);
    }
}
