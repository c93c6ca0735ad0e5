use std::collections::HashMap;

use findfoci_volume::Pixel;

use crate::{flags, peak::PeakRecord, state::SearchState};

/// The saddle between a peak and one of its neighbouring peaks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Saddle {
    /// Id of the neighbouring peak.
    pub id: u32,
    /// Highest value at which the two regions touch.
    pub value: f64,
}

/// Saddles of every peak, indexed by peak id.
pub type SaddleAdjacency = Vec<Vec<Saddle>>;

/// Record a saddle, keeping the highest value per neighbour.
pub(crate) fn upsert(list: &mut Vec<Saddle>, id: u32, value: f64) {
    match list.iter_mut().find(|s| s.id == id) {
        Some(s) => s.value = s.value.max(value),
        None => list.push(Saddle { id, value }),
    }
}

/// The highest saddle of a list, ties to the lower neighbour id.
pub fn highest_saddle(list: &[Saddle]) -> Option<Saddle> {
    list.iter().copied().reduce(|best, s| {
        if s.value > best.value || (s.value == best.value && s.id < best.id) {
            s
        } else {
            best
        }
    })
}

/// Find the saddles between touching regions.
///
/// Each region is flooded from its seed. Where a region pixel touches a pixel
/// of another region, the lower of the two values is a candidate saddle; the
/// highest candidate per neighbour is kept. The highest saddle of each peak is
/// written to its record.
pub fn find_saddles<T: Pixel>(
    state: &mut SearchState<T>,
    peaks: &mut [PeakRecord],
) -> SaddleAdjacency {
    let max_id = peaks.iter().map(|p| p.id).max().unwrap_or(0);
    let mut adjacency: SaddleAdjacency = vec![Vec::new(); max_id as usize + 1];
    let mut list: Vec<usize> = Vec::new();

    state.clear_flag(flags::SADDLE_CANDIDATE);

    for peak in peaks.iter() {
        let id = peak.id;
        if state.labels[peak.seed] != id {
            continue;
        }

        list.clear();
        list.push(peak.seed);
        state.flags[peak.seed] |= flags::LISTED;
        let saddles = &mut adjacency[id as usize];

        let mut head = 0;
        while head < list.len() {
            let p = list[head];
            head += 1;
            let vp = state.value(p);
            for (_, n) in state.neighbourhood.neighbours(p) {
                let label = state.labels[n];
                if label == 0 {
                    continue;
                }
                if label == id {
                    if !state.has_flag(n, flags::LISTED) {
                        state.flags[n] |= flags::LISTED;
                        list.push(n);
                    }
                } else {
                    upsert(saddles, label, vp.min(state.value(n)));
                    state.flags[p] |= flags::SADDLE_CANDIDATE;
                }
            }
        }

        for &p in &list {
            state.flags[p] &= !flags::LISTED;
        }
    }

    assign_highest_saddles(peaks, &adjacency);
    adjacency
}

/// Write the highest saddle of every peak to its record.
pub fn assign_highest_saddles(peaks: &mut [PeakRecord], adjacency: &SaddleAdjacency) {
    for peak in peaks.iter_mut() {
        let saddle = adjacency
            .get(peak.id as usize)
            .and_then(|list| highest_saddle(list));
        match saddle {
            Some(s) => {
                peak.saddle_neighbour_id = s.id;
                peak.highest_saddle_value = s.value;
            }
            None => {
                peak.saddle_neighbour_id = 0;
                peak.highest_saddle_value = 0.0;
            }
        }
    }
}

/// Count the pixels and unblurred intensity above the highest saddle of each peak.
///
/// A peak without a neighbour counts its whole region. With `contiguous` only
/// the pixels connected to the seed through above-saddle pixels are counted.
/// Region pixels at or below the saddle are flagged.
pub fn measure_above_saddle<T: Pixel>(
    state: &mut SearchState<T>,
    peaks: &mut [PeakRecord],
    contiguous: bool,
) {
    let position: HashMap<u32, usize> = peaks.iter().enumerate().map(|(k, p)| (p.id, k)).collect();
    let cutoff = |peak: &PeakRecord| {
        if peak.has_saddle() {
            peak.highest_saddle_value
        } else {
            f64::NEG_INFINITY
        }
    };

    for peak in peaks.iter_mut() {
        peak.count_above_saddle = 0;
        peak.intensity_above_saddle = 0.0;
    }
    state.clear_flag(flags::BELOW_SADDLE);

    for i in 0..state.labels.len() {
        let label = state.labels[i];
        if label == 0 {
            continue;
        }
        let Some(&k) = position.get(&label) else {
            continue;
        };
        let peak = &mut peaks[k];
        if state.value(i) > cutoff(peak) {
            if !contiguous {
                peak.count_above_saddle += 1;
                peak.intensity_above_saddle += state.original_value(i);
            }
        } else {
            state.flags[i] |= flags::BELOW_SADDLE;
        }
    }

    if !contiguous {
        return;
    }

    let mut list: Vec<usize> = Vec::new();
    for peak in peaks.iter_mut() {
        let seed = peak.seed;
        if state.labels[seed] != peak.id || state.has_flag(seed, flags::BELOW_SADDLE) {
            continue;
        }
        list.clear();
        list.push(seed);
        state.flags[seed] |= flags::LISTED;
        let mut head = 0;
        while head < list.len() {
            let p = list[head];
            head += 1;
            for (_, n) in state.neighbourhood.neighbours(p) {
                if state.labels[n] == peak.id
                    && !state.has_flag(n, flags::LISTED | flags::BELOW_SADDLE)
                {
                    state.flags[n] |= flags::LISTED;
                    list.push(n);
                }
            }
        }
        peak.count_above_saddle = list.len();
        peak.intensity_above_saddle = list.iter().map(|&p| state.original_value(p)).sum();
        for &p in &list {
            state.flags[p] &= !flags::LISTED;
        }
    }
}
