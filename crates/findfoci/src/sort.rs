use findfoci_volume::VolumeSize;

use crate::{
    config::{SortMethod, SortOrder},
    peak::PeakRecord,
};

/// The sort key of a peak.
///
/// `background` is the resolved background level; heights of peaks without a
/// neighbour are measured from it.
pub fn sort_key(peak: &PeakRecord, method: SortMethod, background: f64, size: VolumeSize) -> f64 {
    let absolute_height = || {
        let base = if peak.has_saddle() {
            peak.highest_saddle_value
        } else {
            background
        };
        peak.max_value - base
    };

    match method {
        SortMethod::Count => peak.count as f64,
        SortMethod::Intensity => peak.intensity,
        SortMethod::MaxValue => peak.max_value,
        SortMethod::AverageIntensity => peak.average_intensity,
        SortMethod::IntensityMinusBackground => peak.intensity_minus_background,
        SortMethod::AverageIntensityMinusBackground => peak.average_intensity_minus_background,
        SortMethod::X => peak.x as f64,
        SortMethod::Y => peak.y as f64,
        SortMethod::Z => peak.z as f64,
        SortMethod::SaddleHeight => peak.highest_saddle_value,
        SortMethod::CountAboveSaddle => peak.count_above_saddle as f64,
        SortMethod::IntensityAboveSaddle => peak.intensity_above_saddle,
        SortMethod::AbsoluteHeight => absolute_height(),
        SortMethod::RelativeHeight => {
            let range = peak.max_value - background;
            if range > 0.0 {
                absolute_height() / range
            } else {
                0.0
            }
        }
        SortMethod::PeakId => peak.id as f64,
        SortMethod::Xyz => {
            ((peak.x * size.height + peak.y) * size.depth + peak.z) as f64
        }
        SortMethod::IntensityMinusMin => peak.intensity_minus_min,
        SortMethod::AverageIntensityMinusMin => peak.average_intensity_minus_min,
    }
}

/// Stable sort of the peaks by a key.
///
/// Peaks with equal keys keep their incoming order. The key of each peak is
/// stored in [`PeakRecord::sort_key`].
pub fn sort_peaks(
    peaks: &mut [PeakRecord],
    method: SortMethod,
    order: SortOrder,
    background: f64,
    size: VolumeSize,
) {
    for peak in peaks.iter_mut() {
        peak.sort_key = sort_key(peak, method, background, size);
    }
    match order {
        SortOrder::Ascending => peaks.sort_by(|a, b| a.sort_key.total_cmp(&b.sort_key)),
        SortOrder::Descending => peaks.sort_by(|a, b| b.sort_key.total_cmp(&a.sort_key)),
    }
}
