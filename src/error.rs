use std::path::PathBuf;

/// Errors produced while loading and normalizing an image.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Viewport with a zero dimension. Fatal to the call; nothing is decoded.
    #[error("invalid viewport {width}x{height}: both dimensions must be positive")]
    InvalidViewport { width: u32, height: u32 },

    /// Orientation or bounds metadata missing or unparseable.
    /// Metadata readers recover from this locally; the pipeline never returns it.
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("failed to decode {format}: {reason}")]
    DecodeFailure { format: &'static str, reason: String },

    #[error("failed to allocate {bytes} bytes for a {width}x{height} buffer")]
    AllocationFailure { width: u32, height: u32, bytes: usize },

    #[error("failed to encode PNG: {0}")]
    EncodeFailure(String),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot resolve handle {0:?}")]
    UnresolvableHandle(String),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub(crate) fn decode(format: &'static str, reason: impl ToString) -> Self {
        LoadError::DecodeFailure {
            format,
            reason: reason.to_string(),
        }
    }

    /// True for errors the pipeline reports as "no image" rather than failing.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, LoadError::AllocationFailure { .. })
    }
}
