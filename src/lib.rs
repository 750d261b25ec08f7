//! Bounded-memory JPEG/PNG loading.
//!
//! Reads an image's natural size from its header, picks a decoder sample
//! factor for the target viewport, decodes at that reduced resolution and
//! rotates the result upright according to its EXIF orientation.
//!
//! The two core operations are pure functions:
//! [`compute_sample_size`] and [`normalize_orientation`].

pub mod decode;
pub mod error;
pub mod fit;
pub mod geometry;
pub mod loader;
pub mod normalize;
pub mod orientation;
pub mod pixels;
pub mod sample;

pub use decode::{EncodedImage, ImageFormat, ImageSource};
pub use error::LoadError;
pub use fit::FitMode;
pub use geometry::{NaturalSize, ViewportSize};
pub use loader::{load_for_viewport, load_handle, load_path, resolve_handle, LoadOptions, Loaded};
pub use normalize::{normalize_orientation, try_normalize_orientation};
pub use orientation::OrientationTag;
pub use pixels::PixelBuffer;
pub use sample::{compute_sample_size, SampleFactor, SampleStrategy};
