use findfoci_volume::Pixel;

use crate::{cancel::CancelToken, error::FociError, flags, peak::PeakRecord, state::SearchState};

const CANCEL_INTERVAL: usize = 4096;

/// Find the local maxima at or above the background level.
///
/// A pixel is a maximum if no included neighbour is strictly higher. Pixels
/// with an equal neighbour are resolved as a plateau: the connected set of
/// equal pixels is a single maximum unless any pixel bordering it is higher.
/// A plateau is seeded at the member closest to its mean coordinate.
///
/// The maxima are returned in descending order of value, ties in scan order,
/// with ids `1..=n` in that order. Each plateau is labelled with the id of
/// its maximum.
///
/// # Errors
///
/// Returns [`FociError::TooManyMaxima`] if more than `capacity` maxima are found
/// and [`FociError::Cancelled`] if the token is cancelled.
pub fn find_maxima<T: Pixel>(
    state: &mut SearchState<T>,
    background: f64,
    capacity: usize,
    cancel: &CancelToken,
) -> Result<Vec<PeakRecord>, FociError> {
    let mut maxima: Vec<PeakRecord> = Vec::new();
    let mut plateau: Vec<usize> = Vec::new();

    for index in 0..state.size.len() {
        if index % CANCEL_INTERVAL == 0 {
            cancel.check()?;
        }
        if state.has_flag(index, flags::EXCLUDED | flags::PLATEAU) {
            continue;
        }
        let v = state.value(index);
        if v < background {
            continue;
        }

        let mut has_equal = false;
        let mut is_max = true;
        for (_, n) in state.neighbourhood.neighbours(index) {
            if state.is_excluded(n) {
                continue;
            }
            let vn = state.value(n);
            if vn > v {
                is_max = false;
                break;
            }
            if vn == v {
                has_equal = true;
            }
        }
        if !is_max {
            continue;
        }

        let id = maxima.len() as u32 + 1;
        let seed = if has_equal {
            match expand_plateau(state, index, v, &mut plateau) {
                Some(seed) => seed,
                None => continue,
            }
        } else {
            plateau.clear();
            plateau.push(index);
            index
        };

        for &p in &plateau {
            state.flags[p] |= flags::MAX_AREA;
            state.labels[p] = id;
        }
        state.flags[seed] |= flags::MAXIMUM;
        maxima.push(PeakRecord::new(id, seed, v, state.size));

        if maxima.len() > capacity {
            log::warn!(
                "Aborting the maxima search, more than {} candidate maxima",
                capacity
            );
            return Err(FociError::TooManyMaxima(maxima.len(), capacity));
        }
    }

    maxima.sort_by(|a, b| b.max_value.total_cmp(&a.max_value));

    let mut new_id = vec![0u32; maxima.len() + 1];
    for (i, peak) in maxima.iter_mut().enumerate() {
        new_id[peak.id as usize] = i as u32 + 1;
        peak.id = i as u32 + 1;
    }
    for label in state.labels.iter_mut() {
        *label = new_id[*label as usize];
    }

    log::debug!("Found {} maxima above {}", maxima.len(), background);

    Ok(maxima)
}

/// Flood the plateau of equal pixels around `start` into `plateau`.
///
/// Returns the seed of the plateau, or `None` if a higher pixel borders it.
fn expand_plateau<T: Pixel>(
    state: &mut SearchState<T>,
    start: usize,
    v: f64,
    plateau: &mut Vec<usize>,
) -> Option<usize> {
    plateau.clear();
    plateau.push(start);
    state.flags[start] |= flags::LISTED | flags::PLATEAU;

    let mut is_max = true;
    let mut head = 0;
    while head < plateau.len() {
        let p = plateau[head];
        head += 1;
        for (_, n) in state.neighbourhood.neighbours(p) {
            if state.is_excluded(n) {
                continue;
            }
            let vn = state.value(n);
            if vn > v {
                is_max = false;
            } else if vn == v && !state.has_flag(n, flags::LISTED) {
                state.flags[n] |= flags::LISTED | flags::PLATEAU;
                plateau.push(n);
            }
        }
    }

    for &p in plateau.iter() {
        state.flags[p] &= !flags::LISTED;
    }

    if !is_max {
        return None;
    }

    let size = state.size;
    let n = plateau.len() as f64;
    let (mut sx, mut sy, mut sz) = (0.0, 0.0, 0.0);
    for &p in plateau.iter() {
        let (x, y, z) = size.coords(p);
        sx += x as f64;
        sy += y as f64;
        sz += z as f64;
    }
    let (mx, my, mz) = (sx / n, sy / n, sz / n);

    plateau
        .iter()
        .map(|&p| {
            let (x, y, z) = size.coords(p);
            let d = (x as f64 - mx).powi(2) + (y as f64 - my).powi(2) + (z as f64 - mz).powi(2);
            (d, p)
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, p)| p)
}
