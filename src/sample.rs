use crate::geometry::{NaturalSize, ViewportSize};
use crate::orientation::OrientationTag;

/// Decoder subsampling: one output pixel per N×N block of source pixels.
///
/// Only the factors every supported decoder accepts are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SampleFactor {
    #[default]
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
    Sixteen = 16,
}

impl SampleFactor {
    pub const ALL: [SampleFactor; 5] = [
        SampleFactor::One,
        SampleFactor::Two,
        SampleFactor::Four,
        SampleFactor::Eight,
        SampleFactor::Sixteen,
    ];

    pub fn get(self) -> u32 {
        self as u32
    }

    /// Quantize a raw candidate with the decoder clamp ladder.
    ///
    /// The ladder maps 16 itself to 8; only candidates above 16 reach 16.
    /// Candidates below 1 are raised to 1.
    pub fn from_candidate(candidate: u32) -> Self {
        if candidate > 16 {
            SampleFactor::Sixteen
        } else if candidate > 8 {
            SampleFactor::Eight
        } else if candidate > 4 {
            SampleFactor::Four
        } else if candidate >= 2 {
            SampleFactor::Two
        } else {
            SampleFactor::One
        }
    }

    /// Size of one dimension after decoding at this factor (rounded up).
    pub fn scale(self, dim: u32) -> u32 {
        dim.div_ceil(self.get())
    }
}

/// How the loader picks a sample factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleStrategy {
    /// Rounded ratio of natural to viewport size, quantized by the clamp ladder.
    #[default]
    Ladder,
    /// Largest power of two that keeps both dimensions at or above the
    /// smaller viewport side.
    PowerOfTwo,
}

impl SampleStrategy {
    pub fn compute(
        self,
        natural: NaturalSize,
        viewport: ViewportSize,
        tag: OrientationTag,
    ) -> SampleFactor {
        match self {
            SampleStrategy::Ladder => compute_sample_size(natural, viewport, tag),
            SampleStrategy::PowerOfTwo => power_of_two_sample_size(natural, viewport),
        }
    }
}

/// Round-half-away-from-zero of a single-precision ratio.
fn rounded_ratio(num: u32, den: u32) -> u32 {
    (num as f32 / den as f32).round() as u32
}

/// Pick the decode subsampling factor for an image shown in `viewport`.
///
/// When the tag rotates by a quarter turn the natural height is compared
/// against the viewport width and vice versa. Never upsamples: an image that
/// already fits gets factor 1.
pub fn compute_sample_size(
    natural: NaturalSize,
    viewport: ViewportSize,
    tag: OrientationTag,
) -> SampleFactor {
    let (nw, nh) = (natural.width(), natural.height());
    let (vw, vh) = (viewport.width(), viewport.height());

    let candidate = if tag.swaps_axes() && (nh > vw || nw > vh) {
        rounded_ratio(nh, vw).min(rounded_ratio(nw, vh))
    } else if nh > vh || nw > vw {
        rounded_ratio(nh, vh).min(rounded_ratio(nw, vw))
    } else {
        1
    };

    SampleFactor::from_candidate(candidate)
}

/// Power-of-two subsampling: halve while both halves stay at or above the
/// smaller viewport side.
pub fn power_of_two_sample_size(natural: NaturalSize, viewport: ViewportSize) -> SampleFactor {
    let required = viewport.width().min(viewport.height());
    let (mut w, mut h) = (natural.width(), natural.height());
    let mut factor = SampleFactor::One;

    while factor < SampleFactor::Sixteen && w / 2 >= required && h / 2 >= required {
        w /= 2;
        h /= 2;
        factor = match factor {
            SampleFactor::One => SampleFactor::Two,
            SampleFactor::Two => SampleFactor::Four,
            SampleFactor::Four => SampleFactor::Eight,
            _ => SampleFactor::Sixteen,
        };
    }
    factor
}
