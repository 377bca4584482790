//! Binary silhouette rasters and the row queries the extractors need.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Binary foreground mask aligned to the source image (row-major, nonzero = body)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilhouetteMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Topmost and bottommost rows that contain foreground pixels (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerticalExtent {
    pub top: u32,
    pub bottom: u32,
}

impl VerticalExtent {
    /// Distance in pixels between the first and last foreground rows
    pub fn pixels(&self) -> u32 {
        self.bottom - self.top
    }

    /// Row at `fraction` of the extent measured from the top, clamped to the image
    pub fn row_at(&self, fraction: f64, image_height: u32) -> u32 {
        let row = (self.top as f64 + self.pixels() as f64 * fraction).floor();
        row.clamp(0.0, image_height.saturating_sub(1) as f64) as u32
    }
}

impl SilhouetteMask {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::InvalidObservation(format!(
                "mask buffer holds {} pixels, expected {}x{} = {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a mask by evaluating `foreground(x, y)` for every pixel
    pub fn from_fn(width: u32, height: u32, foreground: impl Fn(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(u8::from(foreground(x, y)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn row_has_foreground(&self, y: u32) -> bool {
        y < self.height && self.row(y).iter().any(|&p| p != 0)
    }

    /// Leftmost and rightmost foreground columns of row `y`
    pub fn row_span(&self, y: u32) -> Option<(u32, u32)> {
        if y >= self.height {
            return None;
        }
        let row = self.row(y);
        let first = row.iter().position(|&p| p != 0)?;
        let last = row.iter().rposition(|&p| p != 0)?;
        Some((first as u32, last as u32))
    }

    pub fn vertical_extent(&self) -> Option<VerticalExtent> {
        let top = (0..self.height).find(|&y| self.row_has_foreground(y))?;
        let bottom = (0..self.height)
            .rev()
            .find(|&y| self.row_has_foreground(y))?;
        Some(VerticalExtent { top, bottom })
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&p| p != 0).count()
    }
}
