use findfoci_volume::Pixel;

use crate::{
    cancel::CancelToken, error::FociError, flags, histogram::Histogram, state::SearchState,
};

/// Assign every unlabelled pixel at or above the background to a maximum.
///
/// Pixels are bucketed by value and processed from the highest level down.
/// Within a level, sweeps are repeated until no pixel changes: a pixel joins
/// the region of its highest labelled neighbour, preferring a neighbour across
/// a flat edge, then the first in direction order. Pixels still unassigned
/// when a level stops changing are carried to the next level.
///
/// Returns the number of pixels left unassigned.
pub fn grow_regions<T: Pixel>(
    state: &mut SearchState<T>,
    background: f64,
    cancel: &CancelToken,
) -> Result<usize, FociError> {
    let eligible = |s: &SearchState<T>, i: usize| {
        !s.is_excluded(i) && s.labels[i] == 0 && s.value(i) >= background
    };

    let hist = Histogram::build(state.search, |i| eligible(state, i));
    if hist.is_empty() {
        return Ok(0);
    }

    // counting sort of the eligible pixels into level buckets
    let counts = hist.counts();
    let mut starts = Vec::with_capacity(counts.len() + 1);
    let mut acc = 0usize;
    starts.push(0);
    for &c in counts {
        acc += c as usize;
        starts.push(acc);
    }
    let mut order = vec![0usize; acc];
    let mut next = starts.clone();
    for i in 0..state.size.len() {
        if !eligible(state, i) {
            continue;
        }
        if let Some(bin) = hist.bin_of(state.value(i)) {
            order[next[bin]] = i;
            next[bin] += 1;
        }
    }

    let mut pending: Vec<usize> = Vec::new();
    for level in (0..counts.len()).rev() {
        if starts[level] == starts[level + 1] {
            continue;
        }
        cancel.check()?;

        pending.extend_from_slice(&order[starts[level]..starts[level + 1]]);
        loop {
            let mut changed = 0usize;
            for &p in &pending {
                if state.labels[p] != 0 {
                    continue;
                }
                if let Some(label) = best_neighbour_label(state, p) {
                    state.labels[p] = label;
                    state.flags[p] |= flags::IN_REGION;
                    changed += 1;
                }
            }
            pending.retain(|&p| state.labels[p] == 0);
            if changed == 0 || pending.is_empty() {
                break;
            }
        }
    }

    if !pending.is_empty() {
        log::debug!("{} pixels could not be assigned to a region", pending.len());
    }

    Ok(pending.len())
}

fn best_neighbour_label<T: Pixel>(state: &SearchState<T>, index: usize) -> Option<u32> {
    let hood = &state.neighbourhood;
    let mut best: Option<(f64, bool, u32)> = None;
    for (d, n) in hood.neighbours(index) {
        let label = state.labels[n];
        if label == 0 || state.is_excluded(n) {
            continue;
        }
        let vn = state.value(n);
        let flat = hood.is_flat_edge(d);
        let better = match best {
            None => true,
            Some((bv, bflat, _)) => vn > bv || (vn == bv && flat && !bflat),
        };
        if better {
            best = Some((vn, flat, label));
        }
    }
    best.map(|(_, _, label)| label)
}
