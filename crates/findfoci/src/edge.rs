use findfoci_volume::Pixel;

use crate::{merge::PeakMerger, state::SearchState};

/// Dissolve the peaks whose region touches the border of the analysis bounds.
///
/// `bounds` is `(x, y, width, height)` in the xy plane and applies to every
/// z-slice. Call [`PeakMerger::sweep`] afterwards to relabel the pixels.
/// Returns the number of peaks removed.
pub fn remove_edge_maxima<T: Pixel>(
    state: &SearchState<T>,
    merger: &mut PeakMerger,
    bounds: (usize, usize, usize, usize),
) -> usize {
    let (bx, by, bw, bh) = bounds;
    if bw == 0 || bh == 0 {
        return 0;
    }
    let size = state.size;
    let (x1, y1) = (bx + bw - 1, by + bh - 1);

    let mut touching = vec![false; merger.remap().max_id() as usize + 1];
    let mut mark = |x: usize, y: usize, z: usize| {
        let label = merger.remap().resolve(state.labels[size.index(x, y, z)]);
        touching[label as usize] = true;
    };

    for z in 0..size.depth {
        for x in bx..=x1 {
            mark(x, by, z);
            mark(x, y1, z);
        }
        for y in by..=y1 {
            mark(bx, y, z);
            mark(x1, y, z);
        }
    }

    let mut removed = 0;
    for (id, &edge) in touching.iter().enumerate().skip(1) {
        if edge && merger.remap().is_live(id as u32) {
            merger.dissolve(id as u32);
            removed += 1;
        }
    }

    if removed > 0 {
        log::debug!("Removed {} peaks touching the edge", removed);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cancel::CancelToken, error::FociError, grow::grow_regions, maxima::find_maxima,
        prune::measure_regions, saddle::find_saddles,
    };
    use findfoci_volume::VolumeSize;

    #[test]
    fn test_remove_edge_maxima() -> Result<(), FociError> {
        #[rustfmt::skip]
        let data = vec![
            9u8, 0, 0, 0, 0,
            0, 0, 0, 0, 0,
            0, 0, 7, 0, 0,
            0, 0, 0, 0, 0,
            0, 0, 0, 0, 8,
        ];
        let cancel = CancelToken::new();
        let mut state = SearchState::new(VolumeSize::new_2d(5, 5), &data, &data, |_| false);
        let mut peaks = find_maxima(&mut state, 1.0, 10, &cancel)?;
        grow_regions(&mut state, 1.0, &cancel)?;
        measure_regions(&state, &mut peaks);
        let adjacency = find_saddles(&mut state, &mut peaks);
        let mut merger = PeakMerger::new(peaks, adjacency);

        let removed = remove_edge_maxima(&state, &mut merger, (0, 0, 5, 5));
        assert_eq!(removed, 2);
        merger.sweep(&mut state, false);

        let peaks = merger.into_peaks();
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].max_value, 7.0);
        assert_eq!(state.labels.iter().filter(|&&l| l != 0).count(), 1);
        Ok(())
    }

    #[test]
    fn test_inner_bounds_keep_border_peaks_outside() -> Result<(), FociError> {
        let data = vec![9u8, 0, 0, 5, 0, 0];
        let cancel = CancelToken::new();
        let mut state = SearchState::new(VolumeSize::new_2d(6, 1), &data, &data, |_| false);
        let mut peaks = find_maxima(&mut state, 1.0, 10, &cancel)?;
        measure_regions(&state, &mut peaks);
        let adjacency = find_saddles(&mut state, &mut peaks);
        let mut merger = PeakMerger::new(peaks, adjacency);

        let removed = remove_edge_maxima(&state, &mut merger, (1, 0, 5, 1));
        assert_eq!(removed, 1);
        assert_eq!(merger.live_count(), 1);
        Ok(())
    }
}
