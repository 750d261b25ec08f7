use crate::error::LoadError;
use crate::sample::SampleFactor;

/// Bytes per ARGB pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Owned ARGB pixel buffer: row-major, 4 bytes per pixel in A, R, G, B order.
///
/// Deliberately not `Clone`: every transformation takes the buffer by value,
/// so at most one live handle exists per load.
#[derive(Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

/// Byte offset of pixel (x, y) in a row-major buffer `width` pixels wide.
pub(crate) fn pixel_offset(width: u32, x: u32, y: u32) -> usize {
    (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL
}

/// `num / den` rounded half up, saturated to a channel value.
pub(crate) fn rounded_div(num: u32, den: u32) -> u8 {
    ((num + den / 2) / den).min(u8::MAX as u32) as u8
}

fn byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

impl PixelBuffer {
    /// Transparent black buffer. Aborts on allocation failure like `Vec`.
    pub fn new(width: u32, height: u32) -> Self {
        let len = byte_len(width, height).unwrap_or(usize::MAX);
        Self {
            data: vec![0u8; len],
            width,
            height,
        }
    }

    /// Transparent black buffer, reporting allocation failure as an error.
    pub fn try_new(width: u32, height: u32) -> Result<Self, LoadError> {
        let failure = |bytes| LoadError::AllocationFailure {
            width,
            height,
            bytes,
        };
        let len = byte_len(width, height).ok_or_else(|| failure(usize::MAX))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| failure(len))?;
        data.resize(len, 0);
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Wrap raw ARGB bytes. Returns `None` on a length mismatch.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if byte_len(width, height) == Some(data.len()) {
            Some(Self {
                data,
                width,
                height,
            })
        } else {
            None
        }
    }

    /// Wrap raw RGBA bytes, reordering them to ARGB in place.
    pub fn from_rgba(width: u32, height: u32, mut data: Vec<u8>) -> Option<Self> {
        for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.rotate_right(1);
        }
        Self::from_raw(width, height, data)
    }

    /// Consume the buffer, returning RGBA bytes.
    pub fn into_rgba(self) -> Vec<u8> {
        let mut data = self.data;
        for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.rotate_left(1);
        }
        data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// ARGB value of the pixel at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = pixel_offset(self.width, x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, argb: [u8; 4]) {
        let i = pixel_offset(self.width, x, y);
        self.data[i..i + BYTES_PER_PIXEL].copy_from_slice(&argb);
    }

    /// Box-average every N×N block into one pixel. Consumes the input.
    pub fn downsample(self, factor: SampleFactor) -> Result<Self, LoadError> {
        if factor == SampleFactor::One {
            return Ok(self);
        }
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        let mut reducer = BoxReducer::new(self.width, self.height, factor)?;
        for row in self.data.chunks_exact(row_bytes) {
            reducer.push_row(row);
        }
        Ok(reducer.finish())
    }
}

/// Streaming N×N box filter: feed source rows one at a time, keep only one
/// block row of sums plus the output buffer.
pub(crate) struct BoxReducer {
    n: u32,
    src_w: u32,
    out: PixelBuffer,
    sums: Vec<u32>,
    rows_in_block: u32,
    out_y: u32,
}

impl BoxReducer {
    pub(crate) fn new(src_w: u32, src_h: u32, factor: SampleFactor) -> Result<Self, LoadError> {
        let out_w = factor.scale(src_w);
        let out_h = factor.scale(src_h);
        let out = PixelBuffer::try_new(out_w, out_h)?;
        let sums_len = out_w as usize * BYTES_PER_PIXEL;
        let mut sums = Vec::new();
        sums.try_reserve_exact(sums_len)
            .map_err(|_| LoadError::AllocationFailure {
                width: out_w,
                height: 1,
                bytes: sums_len * std::mem::size_of::<u32>(),
            })?;
        sums.resize(sums_len, 0);
        Ok(Self {
            n: factor.get(),
            src_w,
            out,
            sums,
            rows_in_block: 0,
            out_y: 0,
        })
    }

    /// Add one ARGB source row (`src_w * 4` bytes). Rows past the image height are ignored.
    pub(crate) fn push_row(&mut self, row: &[u8]) {
        if self.out_y >= self.out.height {
            return;
        }
        for x in 0..self.src_w as usize {
            let dst = (x / self.n as usize) * BYTES_PER_PIXEL;
            let src = x * BYTES_PER_PIXEL;
            for c in 0..BYTES_PER_PIXEL {
                self.sums[dst + c] += row[src + c] as u32;
            }
        }
        self.rows_in_block += 1;
        if self.rows_in_block == self.n {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.rows_in_block == 0 {
            return;
        }
        let out_w = self.out.width;
        let y = self.out_y;
        for ox in 0..out_w {
            // Last column block may be narrower than n
            let cols = (self.src_w - ox * self.n).min(self.n);
            let count = cols * self.rows_in_block;
            let s = pixel_offset(out_w, ox, 0);
            let mut px = [0u8; 4];
            for c in 0..BYTES_PER_PIXEL {
                px[c] = rounded_div(self.sums[s + c], count);
            }
            self.out.set_pixel(ox, y, px);
        }
        self.sums.fill(0);
        self.rows_in_block = 0;
        self.out_y += 1;
    }

    /// Number of output rows completed so far.
    pub(crate) fn rows_done(&self) -> u32 {
        self.out_y
    }

    pub(crate) fn finish(mut self) -> PixelBuffer {
        if self.out_y < self.out.height {
            self.flush();
        }
        self.out
    }
}
