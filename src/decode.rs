use crate::error::LoadError;
use crate::geometry::NaturalSize;
use crate::orientation::{self, OrientationTag, PNG_SIGNATURE};
use crate::pixels::{BoxReducer, PixelBuffer, BYTES_PER_PIXEL};
use crate::sample::SampleFactor;
use log::{debug, warn};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Supported image extensions (lowercase).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// The decoder-side operations the loading pipeline needs.
///
/// Implemented for [`EncodedImage`]; tests and embedders can supply their own.
pub trait ImageSource {
    /// Pixel dimensions read from the header, without decoding pixels.
    fn decode_bounds(&self) -> Result<NaturalSize, LoadError>;

    /// Decode at `ceil(width / N) x ceil(height / N)`.
    fn decode_pixels(&self, sample: SampleFactor) -> Result<PixelBuffer, LoadError>;

    /// Orientation from embedded metadata. Missing or corrupt metadata is `Normal`.
    fn read_orientation_tag(&self) -> OrientationTag;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Detect the format from magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(&PNG_SIGNATURE) {
            Some(ImageFormat::Png)
        } else {
            None
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
        }
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    ImageFormat::from_extension(path).is_some()
}

/// An encoded JPEG or PNG held in memory.
pub struct EncodedImage {
    data: Vec<u8>,
    format: ImageFormat,
}

impl EncodedImage {
    /// Read a file from disk. The format comes from the magic bytes, then the extension.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let data = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let format = ImageFormat::sniff(&data)
            .or_else(|| ImageFormat::from_extension(path))
            .ok_or_else(|| LoadError::UnsupportedFormat(path.display().to_string()))?;
        debug!("{}: {} stream, {} bytes", path.display(), format.name(), data.len());
        Ok(Self { data, format })
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, LoadError> {
        let format = ImageFormat::sniff(&data)
            .ok_or_else(|| LoadError::UnsupportedFormat("unrecognized magic bytes".to_string()))?;
        Ok(Self { data, format })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ImageSource for EncodedImage {
    fn decode_bounds(&self) -> Result<NaturalSize, LoadError> {
        match self.format {
            ImageFormat::Jpeg => jpeg_bounds(&self.data),
            ImageFormat::Png => png_bounds(&self.data),
        }
    }

    fn decode_pixels(&self, sample: SampleFactor) -> Result<PixelBuffer, LoadError> {
        match self.format {
            ImageFormat::Jpeg => decode_jpeg(&self.data, sample),
            ImageFormat::Png => decode_png(&self.data, sample),
        }
    }

    fn read_orientation_tag(&self) -> OrientationTag {
        orientation::read_orientation_tag(&self.data)
    }
}

// ============================================================
// JPEG via system libturbojpeg
// ============================================================

fn jpeg_bounds(data: &[u8]) -> Result<NaturalSize, LoadError> {
    let mut decompressor =
        turbojpeg::Decompressor::new().map_err(|e| LoadError::decode("JPEG", e))?;
    let header = decompressor
        .read_header(data)
        .map_err(|e| LoadError::decode("JPEG", e))?;
    NaturalSize::new(header.width as u32, header.height as u32)
        .ok_or_else(|| LoadError::decode("JPEG", "zero image dimension"))
}

/// DCT scaling handles 1/2, 1/4 and 1/8; 1/16 decodes at 1/8 and box-reduces the rest.
fn jpeg_scaling(sample: SampleFactor) -> (turbojpeg::ScalingFactor, SampleFactor) {
    match sample {
        SampleFactor::One => (turbojpeg::ScalingFactor::ONE, SampleFactor::One),
        SampleFactor::Two => (turbojpeg::ScalingFactor::ONE_HALF, SampleFactor::One),
        SampleFactor::Four => (turbojpeg::ScalingFactor::ONE_QUARTER, SampleFactor::One),
        SampleFactor::Eight => (turbojpeg::ScalingFactor::ONE_EIGHTH, SampleFactor::One),
        SampleFactor::Sixteen => (turbojpeg::ScalingFactor::ONE_EIGHTH, SampleFactor::Two),
    }
}

fn decode_jpeg(data: &[u8], sample: SampleFactor) -> Result<PixelBuffer, LoadError> {
    let mut decompressor =
        turbojpeg::Decompressor::new().map_err(|e| LoadError::decode("JPEG", e))?;

    let header = decompressor
        .read_header(data)
        .map_err(|e| LoadError::decode("JPEG", e))?;

    let (src_w, src_h) = (header.width, header.height);
    let (scaling, residual) = jpeg_scaling(sample);
    if scaling != turbojpeg::ScalingFactor::ONE {
        decompressor
            .set_scaling_factor(scaling)
            .map_err(|e| LoadError::decode("JPEG", e))?;
    }

    let scaled_header = header.scaled(scaling);
    let w = scaled_header.width;
    let h = scaled_header.height;
    let pitch = w * BYTES_PER_PIXEL;
    debug!(
        "JPEG {}x{} decoding at 1/{} -> {}x{}",
        src_w,
        src_h,
        sample.get(),
        w,
        h
    );

    let mut pixels = PixelBuffer::try_new(w as u32, h as u32)?.into_raw();
    let image = turbojpeg::Image {
        pixels: pixels.as_mut_slice(),
        width: w,
        pitch,
        height: h,
        format: turbojpeg::PixelFormat::ARGB,
    };

    decompressor
        .decompress(data, image)
        .map_err(|e| LoadError::decode("JPEG", e))?;

    let img = PixelBuffer::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| LoadError::decode("JPEG", "pixel buffer size mismatch"))?;

    img.downsample(residual)
}

// ============================================================
// PNG via the png crate
// ============================================================

fn png_reader(data: &[u8]) -> Result<png::Reader<&[u8]>, LoadError> {
    let mut decoder = png::Decoder::new(data);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    decoder.read_info().map_err(|e| LoadError::decode("PNG", e))
}

fn png_bounds(data: &[u8]) -> Result<NaturalSize, LoadError> {
    let reader = png_reader(data)?;
    let info = reader.info();
    NaturalSize::new(info.width, info.height)
        .ok_or_else(|| LoadError::decode("PNG", "zero image dimension"))
}

/// Expand one 8-bit row of the post-transform color type to ARGB.
fn row_to_argb(src: &[u8], color: png::ColorType, dst: &mut [u8]) -> Result<(), LoadError> {
    let channels = match color {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        other => {
            return Err(LoadError::decode(
                "PNG",
                format!("unexpected color type {:?} after expansion", other),
            ))
        }
    };
    for (s, d) in src
        .chunks_exact(channels)
        .zip(dst.chunks_exact_mut(BYTES_PER_PIXEL))
    {
        let argb = match channels {
            1 => [255, s[0], s[0], s[0]],
            2 => [s[1], s[0], s[0], s[0]],
            3 => [255, s[0], s[1], s[2]],
            _ => [s[3], s[0], s[1], s[2]],
        };
        d.copy_from_slice(&argb);
    }
    Ok(())
}

fn decode_png(data: &[u8], sample: SampleFactor) -> Result<PixelBuffer, LoadError> {
    let mut reader = png_reader(data)?;
    let (color, _) = reader.output_color_type();
    let (width, height, interlaced) = {
        let info = reader.info();
        (info.width, info.height, info.interlaced)
    };
    let row_bytes = width as usize * BYTES_PER_PIXEL;

    if interlaced {
        // Passes arrive out of row order: decode the whole frame, then reduce.
        debug!("PNG {}x{} is interlaced, decoding full frame", width, height);
        let len = reader.output_buffer_size();
        let mut frame = Vec::new();
        frame
            .try_reserve_exact(len)
            .map_err(|_| LoadError::AllocationFailure {
                width,
                height,
                bytes: len,
            })?;
        frame.resize(len, 0);
        let out_info = reader
            .next_frame(&mut frame)
            .map_err(|e| LoadError::decode("PNG", e))?;

        let mut full = PixelBuffer::try_new(width, height)?;
        for (src, dst) in frame
            .chunks_exact(out_info.line_size)
            .zip(full.as_raw_mut().chunks_exact_mut(row_bytes))
        {
            row_to_argb(src, color, dst)?;
        }
        return full.downsample(sample);
    }

    let mut reducer = BoxReducer::new(width, height, sample)?;
    let mut argb_row = vec![0u8; row_bytes];
    let mut rows = 0u32;
    while let Some(row) = reader
        .next_row()
        .map_err(|e| LoadError::decode("PNG", e))?
    {
        row_to_argb(row.data(), color, &mut argb_row)?;
        reducer.push_row(&argb_row);
        rows += 1;
    }
    if rows < height {
        warn!("PNG: expected {} rows, got {}", height, rows);
    }
    debug!(
        "PNG {}x{} decoded at 1/{} -> {} rows",
        width,
        height,
        sample.get(),
        reducer.rows_done()
    );
    Ok(reducer.finish())
}

/// Encode a buffer as an 8-bit RGBA PNG.
pub fn write_png<W: Write>(buffer: PixelBuffer, out: W) -> Result<(), LoadError> {
    let (w, h) = buffer.dimensions();
    let mut encoder = png::Encoder::new(out, w, h);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| LoadError::EncodeFailure(e.to_string()))?;
    writer
        .write_image_data(&buffer.into_rgba())
        .map_err(|e| LoadError::EncodeFailure(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| LoadError::EncodeFailure(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::orientation::tests::{tiff_with_orientation, with_jpeg_exif};

    /// RGBA test pattern: left half red, right half blue, opaque.
    pub(crate) fn split_rgba(w: u32, h: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for _y in 0..h {
            for x in 0..w {
                if x < w / 2 {
                    data.extend_from_slice(&[255, 0, 0, 255]);
                } else {
                    data.extend_from_slice(&[0, 0, 255, 255]);
                }
            }
        }
        data
    }

    pub(crate) fn encode_png(w: u32, h: u32, rgba: &[u8], exif: Option<u16>) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            if let Some(value) = exif {
                writer
                    .write_chunk(
                        png::chunk::ChunkType(*b"eXIf"),
                        &tiff_with_orientation(value, true),
                    )
                    .unwrap();
            }
            writer.write_image_data(rgba).unwrap();
        }
        out
    }

    pub(crate) fn encode_jpeg(w: u32, h: u32, rgba: &[u8], exif: Option<u16>) -> Vec<u8> {
        let image = turbojpeg::Image {
            pixels: rgba,
            width: w as usize,
            pitch: w as usize * 4,
            height: h as usize,
            format: turbojpeg::PixelFormat::RGBA,
        };
        let jpeg = turbojpeg::compress(image, 95, turbojpeg::Subsamp::None).unwrap();
        match exif {
            Some(value) => with_jpeg_exif(&jpeg, value),
            None => jpeg.to_vec(),
        }
    }

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(&PNG_SIGNATURE), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(b"GIF89a"), None);
        assert!(EncodedImage::from_bytes(b"BM....".to_vec()).is_err());
    }

    #[test]
    fn test_extension_detection() {
        assert!(is_supported_image(Path::new("a/b/photo.JPG")));
        assert!(is_supported_image(Path::new("x.png")));
        assert!(!is_supported_image(Path::new("x.gif")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    #[test]
    fn test_png_bounds_and_full_decode() {
        let png = encode_png(10, 6, &split_rgba(10, 6), None);
        let img = EncodedImage::from_bytes(png).unwrap();
        assert_eq!(img.format(), ImageFormat::Png);
        let bounds = img.decode_bounds().unwrap();
        assert_eq!((bounds.width(), bounds.height()), (10, 6));

        let buf = img.decode_pixels(SampleFactor::One).unwrap();
        assert_eq!(buf.dimensions(), (10, 6));
        assert_eq!(buf.pixel(0, 0), [255, 255, 0, 0]);
        assert_eq!(buf.pixel(9, 5), [255, 0, 0, 255]);
    }

    #[test]
    fn test_png_subsampled_decode() {
        let png = encode_png(10, 6, &split_rgba(10, 6), None);
        let img = EncodedImage::from_bytes(png).unwrap();
        let buf = img.decode_pixels(SampleFactor::Four).unwrap();
        assert_eq!(buf.dimensions(), (3, 2));
        // first block is entirely red
        assert_eq!(buf.pixel(0, 0), [255, 255, 0, 0]);
        // last block is entirely blue
        assert_eq!(buf.pixel(2, 1), [255, 0, 0, 255]);
    }

    #[test]
    fn test_png_exif_orientation() {
        let png = encode_png(4, 2, &split_rgba(4, 2), Some(6));
        let img = EncodedImage::from_bytes(png).unwrap();
        assert_eq!(img.read_orientation_tag(), OrientationTag::Rotate90);
    }

    #[test]
    fn test_png_truncated_is_decode_failure() {
        let mut png = encode_png(16, 16, &split_rgba(16, 16), None);
        png.truncate(40);
        let img = EncodedImage::from_bytes(png).unwrap();
        assert!(matches!(
            img.decode_pixels(SampleFactor::One),
            Err(LoadError::DecodeFailure { format: "PNG", .. })
        ));
    }

    #[test]
    fn test_jpeg_bounds_and_scaled_decode() {
        let jpeg = encode_jpeg(64, 48, &split_rgba(64, 48), None);
        let img = EncodedImage::from_bytes(jpeg).unwrap();
        assert_eq!(img.format(), ImageFormat::Jpeg);
        let bounds = img.decode_bounds().unwrap();
        assert_eq!((bounds.width(), bounds.height()), (64, 48));

        for (sample, dims) in [
            (SampleFactor::One, (64, 48)),
            (SampleFactor::Two, (32, 24)),
            (SampleFactor::Four, (16, 12)),
            (SampleFactor::Eight, (8, 6)),
            (SampleFactor::Sixteen, (4, 3)),
        ] {
            let buf = img.decode_pixels(sample).unwrap();
            assert_eq!(buf.dimensions(), dims, "{:?}", sample);
            // opaque and red-dominant in the top-left corner
            let [a, r, _, b] = buf.pixel(0, 0);
            assert_eq!(a, 255);
            assert!(r > 200 && b < 60, "{:?}: r={} b={}", sample, r, b);
        }
    }

    #[test]
    fn test_jpeg_exif_orientation() {
        let jpeg = encode_jpeg(16, 8, &split_rgba(16, 8), Some(8));
        let img = EncodedImage::from_bytes(jpeg).unwrap();
        assert_eq!(img.read_orientation_tag(), OrientationTag::Rotate270);
        // metadata injection leaves the stream decodable
        assert_eq!(img.decode_pixels(SampleFactor::One).unwrap().dimensions(), (16, 8));
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let err = EncodedImage::open(Path::new("/nonexistent/fitload/x.jpg"))
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_write_png_round_trip() {
        let buf = PixelBuffer::from_rgba(10, 6, split_rgba(10, 6)).unwrap();
        let mut out = Vec::new();
        write_png(buf, &mut out).unwrap();
        let img = EncodedImage::from_bytes(out).unwrap();
        let decoded = img.decode_pixels(SampleFactor::One).unwrap();
        assert_eq!(decoded.into_rgba(), split_rgba(10, 6));
    }
}
