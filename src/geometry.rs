use crate::error::LoadError;

/// Undecoded pixel dimensions of an image, as read from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaturalSize {
    width: u32,
    height: u32,
}

impl NaturalSize {
    /// Returns `None` if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Target display bounds the decoded image must fit within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    width: u32,
    height: u32,
}

impl ViewportSize {
    /// Portrait phone screen, used when the caller gives no viewport.
    pub const DEFAULT: ViewportSize = ViewportSize {
        width: 1080,
        height: 1920,
    };

    pub fn new(width: u32, height: u32) -> Result<Self, LoadError> {
        if width == 0 || height == 0 {
            return Err(LoadError::InvalidViewport { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}
