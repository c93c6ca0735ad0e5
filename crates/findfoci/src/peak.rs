use findfoci_volume::VolumeSize;
use serde::{Deserialize, Serialize};

/// A peak found by the search and its region measurements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    /// Id assigned by the maxima search; ids rank the maxima by value.
    pub id: u32,
    /// Reported x coordinate.
    pub x: usize,
    /// Reported y coordinate.
    pub y: usize,
    /// Reported z coordinate.
    pub z: usize,
    /// Linear index of the seed voxel of the region.
    pub seed: usize,
    /// Value of the seed voxel in the searched volume.
    pub max_value: f64,
    /// Number of pixels in the region.
    pub count: usize,
    /// Summed unblurred intensity of the region.
    pub intensity: f64,
    /// Value of the highest saddle to a neighbouring region, 0 without a neighbour.
    pub highest_saddle_value: f64,
    /// Id of the neighbour across the highest saddle, 0 without a neighbour.
    pub saddle_neighbour_id: u32,
    /// Number of pixels above the highest saddle.
    pub count_above_saddle: usize,
    /// Summed unblurred intensity of the pixels above the highest saddle.
    pub intensity_above_saddle: f64,
    /// Mean unblurred intensity of the region.
    pub average_intensity: f64,
    /// Intensity above the background level.
    pub intensity_minus_background: f64,
    /// Mean intensity above the background level.
    pub average_intensity_minus_background: f64,
    /// Intensity above the minimum of the searched region.
    pub intensity_minus_min: f64,
    /// Mean intensity above the minimum of the searched region.
    pub average_intensity_minus_min: f64,
    /// Connected object holding the peak, 0 when object analysis is off.
    pub object_id: u32,
    /// Mask value at the peak seed, 0 without a mask.
    pub state: u32,
    /// Key used for the final ordering.
    pub sort_key: f64,
}

impl PeakRecord {
    /// Create a record for a maximum seeded at a linear index.
    pub fn new(id: u32, seed: usize, max_value: f64, size: VolumeSize) -> Self {
        let (x, y, z) = size.coords(seed);
        Self {
            id,
            x,
            y,
            z,
            seed,
            max_value,
            ..Default::default()
        }
    }

    /// Whether the peak has a neighbouring region.
    pub fn has_saddle(&self) -> bool {
        self.saddle_neighbour_id != 0
    }

    /// Move the seed and the reported coordinate to a linear index.
    pub(crate) fn set_seed(&mut self, seed: usize, size: VolumeSize) {
        self.seed = seed;
        (self.x, self.y, self.z) = size.coords(seed);
    }

    /// Fill the averages and the background-relative intensities.
    pub fn update_derived(&mut self, background: f64, minimum: f64) {
        let n = self.count as f64;
        self.average_intensity = if self.count > 0 {
            self.intensity / n
        } else {
            0.0
        };
        self.intensity_minus_background = self.intensity - background * n;
        self.intensity_minus_min = self.intensity - minimum * n;
        self.average_intensity_minus_background = if self.count > 0 {
            self.intensity_minus_background / n
        } else {
            0.0
        };
        self.average_intensity_minus_min = if self.count > 0 {
            self.intensity_minus_min / n
        } else {
            0.0
        };
    }
}
