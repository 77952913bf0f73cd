use serde::Serialize;

/// One captured video frame as tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
///
/// Only built through [`FrameSample::from_rgba`], so the buffer always
/// matches the geometry.
pub struct FrameSample {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameSample {
    /// Wrap an RGBA buffer, checking it matches the geometry.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Luminance at (x, y): plain average of the R, G and B channels.
    #[inline]
    pub fn luminance(&self, x: u32, y: u32) -> u8 {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let sum = self.data[idx] as u16 + self.data[idx + 1] as u16 + self.data[idx + 2] as u16;
        (sum / 3) as u8
    }
}

/// Per-detector counts for one analyzed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameAnalysis {
    pub finder_patterns: usize,
    pub contrast_areas: usize,
    pub square_edges: usize,
    pub present: bool,
}

/// Outcome of a scan that saw a marker-like object.
///
/// The detector never decodes the marker, so `code` is always the configured
/// placeholder proof, not a value read from the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub present: bool,
    pub code: String,
}

impl DetectionResult {
    pub fn placeholder(code: impl Into<String>) -> Self {
        Self {
            present: true,
            code: code.into(),
        }
    }
}
