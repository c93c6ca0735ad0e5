use serde::{Deserialize, Serialize};

use crate::{error::VolumeError, VolumeSize};

/// A rectangular region of interest in the xy plane with an optional shape mask.
///
/// The region applies to every z-slice of a volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge of the bounds.
    pub x: usize,
    /// Top edge of the bounds.
    pub y: usize,
    /// Width of the bounds.
    pub width: usize,
    /// Height of the bounds.
    pub height: usize,
    /// Optional row-major shape mask of `width * height` entries inside the bounds.
    pub mask: Option<Vec<bool>>,
}

impl Roi {
    /// Create a rectangular region of interest.
    pub fn rect(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            mask: None,
        }
    }

    /// Create a region of interest covering a full slice of `size`.
    pub fn full(size: VolumeSize) -> Self {
        Self::rect(0, 0, size.width, size.height)
    }

    /// The bounds as `(x, y, width, height)`.
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (self.x, self.y, self.width, self.height)
    }

    /// Check the region against the slice size of a volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounds are empty, leave the slice, or the shape
    /// mask has the wrong length.
    pub fn validate(&self, size: VolumeSize) -> Result<(), VolumeError> {
        if self.width == 0
            || self.height == 0
            || self.x + self.width > size.width
            || self.y + self.height > size.height
        {
            return Err(VolumeError::RoiOutOfBounds(
                format!("{:?}", self.bounds()),
                size.width,
                size.height,
            ));
        }

        if let Some(mask) = &self.mask {
            if mask.len() != self.width * self.height {
                return Err(VolumeError::InvalidRoiMask(
                    mask.len(),
                    self.width * self.height,
                ));
            }
        }

        Ok(())
    }

    /// Whether the slice position `(x, y)` lies inside the region.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        if x < self.x || y < self.y || x >= self.x + self.width || y >= self.y + self.height {
            return false;
        }
        match &self.mask {
            Some(mask) => mask[(y - self.y) * self.width + (x - self.x)],
            None => true,
        }
    }
}
