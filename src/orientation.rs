use crate::error::LoadError;
use log::debug;

/// EXIF IFD0 orientation tag id.
const TAG_ORIENTATION: u16 = 0x0112;

pub(crate) const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Capture-time rotation recorded in image metadata.
///
/// Raw EXIF values are mapped onto this enum once, at the metadata boundary:
///
/// | EXIF | tag |
/// |---|---|
/// | 1 | `Normal` |
/// | 3 | `Rotate180` |
/// | 6 | `Rotate90` |
/// | 8 | `Rotate270` |
/// | 0 | `Unknown` (EXIF "undefined") |
/// | absent, 2, 4, 5, 7, other | `Normal` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrientationTag {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Unknown,
}

impl OrientationTag {
    pub fn from_exif(value: u16) -> Self {
        match value {
            0 => OrientationTag::Unknown,
            3 => OrientationTag::Rotate180,
            6 => OrientationTag::Rotate90,
            8 => OrientationTag::Rotate270,
            _ => OrientationTag::Normal,
        }
    }

    /// Clockwise rotation needed to bring the image upright.
    pub fn degrees(self) -> u32 {
        match self {
            OrientationTag::Normal | OrientationTag::Unknown => 0,
            OrientationTag::Rotate90 => 90,
            OrientationTag::Rotate180 => 180,
            OrientationTag::Rotate270 => 270,
        }
    }

    /// Whether the upright image has width and height exchanged.
    pub fn swaps_axes(self) -> bool {
        matches!(self, OrientationTag::Rotate90 | OrientationTag::Rotate270)
    }
}

/// Read the orientation tag from an encoded JPEG or PNG.
///
/// Never fails: missing or corrupt metadata yields `Normal`.
pub fn read_orientation_tag(data: &[u8]) -> OrientationTag {
    let raw = if data.starts_with(&[0xFF, 0xD8]) {
        read_jpeg_orientation(data)
    } else if data.starts_with(&PNG_SIGNATURE) {
        read_png_orientation(data)
    } else {
        Err(LoadError::MetadataUnavailable(
            "not a JPEG or PNG stream".to_string(),
        ))
    };

    match raw {
        Ok(Some(value)) => {
            let tag = OrientationTag::from_exif(value);
            debug!("EXIF orientation {} -> {:?}", value, tag);
            tag
        }
        Ok(None) => OrientationTag::Normal,
        Err(e) => {
            debug!("{}; assuming normal orientation", e);
            OrientationTag::Normal
        }
    }
}

fn unavailable(reason: &str) -> LoadError {
    LoadError::MetadataUnavailable(reason.to_string())
}

// ============================================================
// JPEG: APP1 "Exif\0\0" segment
// ============================================================

/// Returns the raw orientation value, `Ok(None)` when the stream carries no EXIF orientation.
pub(crate) fn read_jpeg_orientation(data: &[u8]) -> Result<Option<u16>, LoadError> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(unavailable("missing JPEG SOI marker"));
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return Err(unavailable("JPEG marker expected"));
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // SOS: entropy-coded data follows, no more metadata
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            return Err(unavailable("JPEG segment length too short"));
        }
        let seg_start = pos + 4;
        let seg_end = pos + 2 + seg_len;
        if seg_end > data.len() {
            return Err(unavailable("JPEG segment runs past end of data"));
        }
        if marker == 0xE1 && data[seg_start..seg_end].starts_with(b"Exif\0\0") {
            return parse_tiff_orientation(&data[seg_start + 6..seg_end]);
        }
        pos = seg_end;
    }
    Ok(None)
}

// ============================================================
// PNG: eXIf chunk
// ============================================================

pub(crate) fn read_png_orientation(data: &[u8]) -> Result<Option<u16>, LoadError> {
    if !data.starts_with(&PNG_SIGNATURE) {
        return Err(unavailable("missing PNG signature"));
    }

    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let kind = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let body_end = body_start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| unavailable("PNG chunk runs past end of data"))?;

        match kind {
            b"eXIf" => {
                let mut body = &data[body_start..body_end];
                // Some writers keep the JPEG APP1 prefix
                if body.starts_with(b"Exif\0\0") {
                    body = &body[6..];
                }
                return parse_tiff_orientation(body);
            }
            b"IEND" => break,
            _ => {}
        }
        // chunk body + CRC
        pos = body_end + 4;
    }
    Ok(None)
}

// ============================================================
// TIFF IFD0 walk
// ============================================================

fn parse_tiff_orientation(d: &[u8]) -> Result<Option<u16>, LoadError> {
    if d.len() < 8 {
        return Err(unavailable("TIFF header truncated"));
    }

    // Byte order: "II" = little-endian, "MM" = big-endian
    let le = match (d[0], d[1]) {
        (b'I', b'I') => true,
        (b'M', b'M') => false,
        _ => return Err(unavailable("bad TIFF byte order")),
    };

    let read_u16 = |off: usize| -> Option<u16> {
        let b = d.get(off..off + 2)?;
        Some(if le {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        })
    };

    let read_u32 = |off: usize| -> Option<u32> {
        let b = d.get(off..off + 4)?;
        Some(if le {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        })
    };

    if read_u16(2) != Some(42) {
        return Err(unavailable("bad TIFF magic"));
    }

    let ifd_offset = read_u32(4).ok_or_else(|| unavailable("TIFF header truncated"))? as usize;
    let entry_count =
        read_u16(ifd_offset).ok_or_else(|| unavailable("IFD0 offset out of range"))? as usize;
    let entries_start = ifd_offset + 2;

    for i in 0..entry_count {
        let entry_off = entries_start + i * 12;
        let tag = read_u16(entry_off).ok_or_else(|| unavailable("IFD0 entry truncated"))?;
        if tag == TAG_ORIENTATION {
            // SHORT value stored inline in the offset field
            let value = read_u16(entry_off + 8)
                .ok_or_else(|| unavailable("orientation entry truncated"))?;
            return Ok(Some(value));
        }
    }
    Ok(None)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal TIFF block holding a single IFD0 orientation entry.
    pub(crate) fn tiff_with_orientation(value: u16, le: bool) -> Vec<u8> {
        let mut t = Vec::new();
        let u16b = |v: u16| if le { v.to_le_bytes() } else { v.to_be_bytes() };
        let u32b = |v: u32| if le { v.to_le_bytes() } else { v.to_be_bytes() };
        t.extend_from_slice(if le { b"II" } else { b"MM" });
        t.extend_from_slice(&u16b(42));
        t.extend_from_slice(&u32b(8));
        t.extend_from_slice(&u16b(1));
        t.extend_from_slice(&u16b(TAG_ORIENTATION));
        t.extend_from_slice(&u16b(3)); // SHORT
        t.extend_from_slice(&u32b(1));
        t.extend_from_slice(&u16b(value));
        t.extend_from_slice(&[0, 0]);
        t.extend_from_slice(&u32b(0));
        t
    }

    /// Insert an APP1 EXIF segment right after the SOI marker of a JPEG stream.
    pub(crate) fn with_jpeg_exif(jpeg: &[u8], value: u16) -> Vec<u8> {
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&tiff_with_orientation(value, false));
        let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn png_chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut c = (body.len() as u32).to_be_bytes().to_vec();
        c.extend_from_slice(kind);
        c.extend_from_slice(body);
        // CRC is not checked by the metadata reader
        c.extend_from_slice(&[0, 0, 0, 0]);
        c
    }

    #[test]
    fn test_exif_value_mapping() {
        assert_eq!(OrientationTag::from_exif(1), OrientationTag::Normal);
        assert_eq!(OrientationTag::from_exif(3), OrientationTag::Rotate180);
        assert_eq!(OrientationTag::from_exif(6), OrientationTag::Rotate90);
        assert_eq!(OrientationTag::from_exif(8), OrientationTag::Rotate270);
        assert_eq!(OrientationTag::from_exif(0), OrientationTag::Unknown);
        for mirrored in [2, 4, 5, 7, 9, 0xFFFF] {
            assert_eq!(OrientationTag::from_exif(mirrored), OrientationTag::Normal);
        }
    }

    #[test]
    fn test_swaps_axes() {
        assert!(OrientationTag::Rotate90.swaps_axes());
        assert!(OrientationTag::Rotate270.swaps_axes());
        assert!(!OrientationTag::Rotate180.swaps_axes());
        assert!(!OrientationTag::Normal.swaps_axes());
        assert!(!OrientationTag::Unknown.swaps_axes());
    }

    #[test]
    fn test_jpeg_app1_orientation() {
        let jpeg = with_jpeg_exif(&[0xFF, 0xD8, 0xFF, 0xD9], 6);
        assert_eq!(read_jpeg_orientation(&jpeg).unwrap(), Some(6));
        assert_eq!(read_orientation_tag(&jpeg), OrientationTag::Rotate90);
    }

    #[test]
    fn test_little_endian_tiff() {
        let tiff = tiff_with_orientation(8, true);
        assert_eq!(parse_tiff_orientation(&tiff).unwrap(), Some(8));
    }

    #[test]
    fn test_jpeg_without_exif_is_normal() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xD9];
        assert_eq!(read_jpeg_orientation(&jpeg).unwrap(), None);
        assert_eq!(read_orientation_tag(&jpeg), OrientationTag::Normal);
    }

    #[test]
    fn test_corrupt_metadata_falls_back_to_normal() {
        let mut jpeg = with_jpeg_exif(&[0xFF, 0xD8, 0xFF, 0xD9], 3);
        // Break the TIFF byte order mark
        jpeg[12] = b'X';
        assert!(read_jpeg_orientation(&jpeg).is_err());
        assert_eq!(read_orientation_tag(&jpeg), OrientationTag::Normal);

        assert_eq!(read_orientation_tag(b"GIF89a"), OrientationTag::Normal);
        assert_eq!(read_orientation_tag(&[]), OrientationTag::Normal);
    }

    #[test]
    fn test_png_exif_chunk() {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend(png_chunk(b"IHDR", &[0; 13]));
        png.extend(png_chunk(b"eXIf", &tiff_with_orientation(3, true)));
        png.extend(png_chunk(b"IEND", &[]));
        assert_eq!(read_png_orientation(&png).unwrap(), Some(3));
        assert_eq!(read_orientation_tag(&png), OrientationTag::Rotate180);
    }

    #[test]
    fn test_png_truncated_chunk() {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&1000u32.to_be_bytes());
        png.extend_from_slice(b"eXIf");
        assert!(read_png_orientation(&png).is_err());
        assert_eq!(read_orientation_tag(&png), OrientationTag::Normal);
    }
}
