use findfoci_volume::Pixel;

use crate::{peak::PeakRecord, state::SearchState};

/// Number the connected components of the labelled pixels.
///
/// Components are numbered from 1 in scan order of their first pixel; pixels
/// of touching regions belong to the same component. Returns the component of
/// every pixel (0 for unlabelled pixels) and the number of components.
pub fn label_objects<T: Pixel>(state: &SearchState<T>) -> (Vec<u32>, u32) {
    let mut objects = vec![0u32; state.labels.len()];
    let mut next = 0u32;
    let mut stack: Vec<usize> = Vec::new();

    for start in 0..state.labels.len() {
        if state.labels[start] == 0 || objects[start] != 0 {
            continue;
        }
        next += 1;
        objects[start] = next;
        stack.push(start);
        while let Some(p) = stack.pop() {
            for (_, n) in state.neighbourhood.neighbours(p) {
                if state.labels[n] != 0 && objects[n] == 0 {
                    objects[n] = next;
                    stack.push(n);
                }
            }
        }
    }

    (objects, next)
}

/// Record the object holding each peak's seed.
pub fn assign_objects(peaks: &mut [PeakRecord], objects: &[u32]) {
    for peak in peaks.iter_mut() {
        peak.object_id = objects[peak.seed];
    }
}

/// Record the mask value at each peak's seed.
///
/// A single-slice mask applies to every z-slice.
pub fn assign_states(peaks: &mut [PeakRecord], mask: &[u16], slice_len: usize) {
    let single_slice = mask.len() == slice_len;
    for peak in peaks.iter_mut() {
        let index = if single_slice {
            peak.seed % slice_len
        } else {
            peak.seed
        };
        peak.state = mask.get(index).copied().unwrap_or(0) as u32;
    }
}
