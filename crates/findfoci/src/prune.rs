use findfoci_volume::Pixel;

use crate::{flags, peak::PeakRecord, state::SearchState};

/// Remove the pixels below the search threshold of their region.
///
/// `thresholds[id]` is the level of the peak with that id. Returns the number
/// of pixels removed.
pub fn prune_regions<T: Pixel>(state: &mut SearchState<T>, thresholds: &[f64]) -> usize {
    let mut removed = 0;
    for i in 0..state.labels.len() {
        let label = state.labels[i] as usize;
        if label == 0 {
            continue;
        }
        if state.value(i) < thresholds[label] {
            state.labels[i] = 0;
            state.flags[i] &= !flags::IN_REGION;
            removed += 1;
        }
    }
    if removed > 0 {
        log::debug!("Pruned {} pixels below the search thresholds", removed);
    }
    removed
}

/// Recount the pixels and unblurred intensity of every region.
///
/// `peaks[k]` must carry the id `k + 1`.
pub fn measure_regions<T: Pixel>(state: &SearchState<T>, peaks: &mut [PeakRecord]) {
    for peak in peaks.iter_mut() {
        peak.count = 0;
        peak.intensity = 0.0;
    }
    for (i, &label) in state.labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        if let Some(peak) = peaks.get_mut(label as usize - 1) {
            peak.count += 1;
            peak.intensity += state.original_value(i);
        }
    }
}
