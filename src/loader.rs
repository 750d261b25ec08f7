use crate::decode::{is_supported_image, EncodedImage, ImageSource};
use crate::error::LoadError;
use crate::fit::FitMode;
use crate::geometry::{NaturalSize, ViewportSize};
use crate::normalize::try_normalize_orientation;
use crate::orientation::OrientationTag;
use crate::pixels::PixelBuffer;
use crate::sample::{SampleFactor, SampleStrategy};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Settings for one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    pub viewport: ViewportSize,
    pub strategy: SampleStrategy,
    pub fit: Option<FitMode>,
}

impl LoadOptions {
    pub fn new(viewport: ViewportSize) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }
}

/// A normalized image together with the facts that produced it.
#[derive(Debug)]
pub struct Loaded {
    pub natural: NaturalSize,
    pub orientation: OrientationTag,
    pub sample: SampleFactor,
    pub pixels: PixelBuffer,
}

/// Decode `source` at a resolution suited to `options.viewport`, upright.
///
/// Returns `Ok(None)` when a buffer cannot be allocated: the partial result is
/// released and the failure is logged, no retry is attempted.
pub fn load_for_viewport<S: ImageSource + ?Sized>(
    source: &S,
    options: &LoadOptions,
) -> Result<Option<Loaded>, LoadError> {
    let natural = source.decode_bounds()?;
    let orientation = source.read_orientation_tag();
    let sample = options.strategy.compute(natural, options.viewport, orientation);
    debug!(
        "natural {}x{}, viewport {}x{}, {:?} -> sample 1/{}",
        natural.width(),
        natural.height(),
        options.viewport.width(),
        options.viewport.height(),
        orientation,
        sample.get()
    );

    let pixels = source
        .decode_pixels(sample)
        .and_then(|buf| try_normalize_orientation(buf, orientation))
        .and_then(|buf| match options.fit {
            Some(mode) => mode.apply(buf, options.viewport),
            None => Ok(buf),
        });

    release_on_allocation_failure(pixels).map(|pixels| {
        pixels.map(|pixels| Loaded {
            natural,
            orientation,
            sample,
            pixels,
        })
    })
}

/// Decode at full resolution, then correct orientation.
pub fn load_without_scaling<S: ImageSource + ?Sized>(
    source: &S,
) -> Result<Option<PixelBuffer>, LoadError> {
    let orientation = source.read_orientation_tag();
    let pixels = source
        .decode_pixels(SampleFactor::One)
        .and_then(|buf| try_normalize_orientation(buf, orientation));
    release_on_allocation_failure(pixels)
}

fn release_on_allocation_failure(
    result: Result<PixelBuffer, LoadError>,
) -> Result<Option<PixelBuffer>, LoadError> {
    match result {
        Ok(pixels) => Ok(Some(pixels)),
        Err(e) if e.is_allocation_failure() => {
            warn!("{}; returning no image", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Load a file from disk.
pub fn load_path(path: &Path, options: &LoadOptions) -> Result<Option<Loaded>, LoadError> {
    let image = EncodedImage::open(path)?;
    load_for_viewport(&image, options)
}

/// Load by logical handle: a `file://` URI or a plain path.
pub fn load_handle(handle: &str, options: &LoadOptions) -> Result<Option<Loaded>, LoadError> {
    let path = resolve_handle(handle)?;
    load_path(&path, options)
}

/// Map a logical handle to a filesystem path.
///
/// Accepts `file:` URIs on the local host and plain paths. Other schemes need
/// a content index and are rejected.
pub fn resolve_handle(handle: &str) -> Result<PathBuf, LoadError> {
    let unresolvable = || LoadError::UnresolvableHandle(handle.to_string());
    if handle.is_empty() {
        return Err(unresolvable());
    }

    match Url::parse(handle) {
        Ok(url) if url.scheme() == "file" => {
            if has_malformed_escape(url.path()) {
                return Err(unresolvable());
            }
            url.to_file_path().map_err(|()| unresolvable())
        }
        Ok(url) => {
            debug!("no resolver for scheme {:?}", url.scheme());
            Err(unresolvable())
        }
        // Not a URI at all
        Err(_) => Ok(PathBuf::from(handle)),
    }
}

/// `%` not followed by two hex digits. `Url` keeps such sequences verbatim.
fn has_malformed_escape(path: &str) -> bool {
    path.split('%').skip(1).any(|rest| {
        !rest
            .as_bytes()
            .get(..2)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    })
}

/// Collect image paths from CLI arguments, descending into directories.
///
/// Unreadable directories are skipped with a warning. The result is ordered by
/// file name.
pub fn collect_paths(args: &[String]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut pending: Vec<PathBuf> = Vec::new();

    for arg in args {
        let p = PathBuf::from(arg);
        if p.is_dir() {
            pending.push(p);
        } else if is_supported_image(&p) {
            paths.push(p);
        }
    }

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping directory {}: {}", dir.display(), e);
                continue;
            }
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if is_supported_image(&path) {
                paths.push(path);
            }
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    paths
}
