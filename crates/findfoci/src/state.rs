use findfoci_volume::{Pixel, VolumeSize};

use crate::{flags, neighbors::Neighbourhood};

/// Working buffers shared by the search stages.
///
/// Holds the searched values, the unblurred values used for intensity sums,
/// one flag word per pixel and one region label per pixel (0 is unassigned).
pub struct SearchState<'a, T> {
    pub(crate) size: VolumeSize,
    pub(crate) search: &'a [T],
    pub(crate) original: &'a [T],
    pub(crate) flags: Vec<u16>,
    pub(crate) labels: Vec<u32>,
    pub(crate) neighbourhood: Neighbourhood,
}

impl<'a, T: Pixel> SearchState<'a, T> {
    /// Create the state; pixels for which `excluded` returns true, and NaN
    /// pixels, are never searched.
    ///
    /// `search` and `original` must both hold `size.len()` samples.
    pub fn new(
        size: VolumeSize,
        search: &'a [T],
        original: &'a [T],
        excluded: impl Fn(usize) -> bool,
    ) -> Self {
        let flags = search
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let v: f64 = v.into();
                if v.is_nan() || excluded(i) {
                    flags::EXCLUDED
                } else {
                    0
                }
            })
            .collect();

        Self {
            size,
            search,
            original,
            flags,
            labels: vec![0; size.len()],
            neighbourhood: Neighbourhood::new(size),
        }
    }

    /// Size of the searched volume.
    pub fn size(&self) -> VolumeSize {
        self.size
    }

    /// The region label of every pixel.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Searched value of a pixel.
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.search[index].into()
    }

    /// Unblurred value of a pixel.
    #[inline]
    pub fn original_value(&self, index: usize) -> f64 {
        self.original[index].into()
    }

    /// Whether a pixel is outside the searched region.
    #[inline]
    pub fn is_excluded(&self, index: usize) -> bool {
        self.flags[index] & flags::EXCLUDED != 0
    }

    #[inline]
    pub(crate) fn has_flag(&self, index: usize, flag: u16) -> bool {
        self.flags[index] & flag != 0
    }

    pub(crate) fn clear_flag(&mut self, flag: u16) {
        self.flags.iter_mut().for_each(|f| *f &= !flag);
    }

    /// Group the pixel indices of every region by label, in scan order.
    pub(crate) fn region_pixels(&self, max_label: u32) -> Vec<Vec<usize>> {
        let mut regions = vec![Vec::new(); max_label as usize + 1];
        for (i, &label) in self.labels.iter().enumerate() {
            if label != 0 && label <= max_label {
                regions[label as usize].push(i);
            }
        }
        regions
    }
}
