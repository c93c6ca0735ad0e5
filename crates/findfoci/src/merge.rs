use findfoci_volume::Pixel;

use crate::{
    cancel::CancelToken,
    config::PeakHeightMethod,
    error::FociError,
    flags,
    peak::PeakRecord,
    remap::IdRemap,
    saddle::{self, Saddle, SaddleAdjacency},
    state::SearchState,
    stats::Statistics,
};

/// Parameters of the merge passes.
#[derive(Clone, Copy, Debug)]
pub struct MergeParams {
    /// Method for the minimum height of a peak above its highest saddle.
    pub height_method: PeakHeightMethod,
    /// Parameter of the height method.
    pub height_parameter: f64,
    /// Minimum region size.
    pub min_size: usize,
    /// Apply the minimum size to the pixels above the highest saddle.
    pub minimum_above_saddle: bool,
    /// Only count above-saddle pixels connected to the seed.
    pub contiguous_above_saddle: bool,
}

/// Merges insignificant peaks into their neighbours.
///
/// Peaks are kept in an arena addressed by id; absorbed peaks stay in the
/// arena but no longer resolve to themselves in the remap table.
pub struct PeakMerger {
    peaks: Vec<PeakRecord>,
    adjacency: SaddleAdjacency,
    remap: IdRemap,
}

impl PeakMerger {
    /// Create a merger from the peaks ordered by id and their saddles.
    ///
    /// `peaks[k]` must carry the id `k + 1`.
    pub fn new(peaks: Vec<PeakRecord>, mut adjacency: SaddleAdjacency) -> Self {
        let max_id = peaks.len() as u32;
        adjacency.resize(peaks.len() + 1, Vec::new());
        Self {
            peaks,
            adjacency,
            remap: IdRemap::new(max_id),
        }
    }

    /// The remap table of the merges so far.
    pub fn remap(&self) -> &IdRemap {
        &self.remap
    }

    /// Number of peaks still live.
    pub fn live_count(&self) -> usize {
        self.peaks.iter().filter(|p| self.remap.is_live(p.id)).count()
    }

    fn peak(&self, id: u32) -> &PeakRecord {
        &self.peaks[id as usize - 1]
    }

    fn highest_saddle(&self, id: u32) -> Option<Saddle> {
        saddle::highest_saddle(&self.adjacency[id as usize])
    }

    fn live_ids(&self) -> Vec<u32> {
        self.peaks
            .iter()
            .map(|p| p.id)
            .filter(|&id| self.remap.is_live(id))
            .collect()
    }

    /// Run the merge passes and refresh the surviving peaks.
    ///
    /// 1. Peaks too low above their highest saddle, highest saddles first.
    /// 2. Peaks smaller than the minimum size, smallest first.
    /// 3. Optionally, peaks with too few pixels above their highest saddle.
    pub fn merge<T: Pixel>(
        &mut self,
        state: &mut SearchState<T>,
        stats: &Statistics,
        params: &MergeParams,
        cancel: &CancelToken,
    ) -> Result<(), FociError> {
        let before = self.live_count();

        self.merge_by_height(stats, params);
        cancel.check()?;
        let after_height = self.live_count();

        self.merge_by_size(params.min_size);
        cancel.check()?;
        let after_size = self.live_count();

        if params.minimum_above_saddle {
            self.merge_by_size_above_saddle(state, params, cancel)?;
        }

        self.sweep(state, params.contiguous_above_saddle);

        log::debug!(
            "Merged peaks: {} found, {} after height, {} after size, {} remaining",
            before,
            after_height,
            after_size,
            self.live_count()
        );

        Ok(())
    }

    fn merge_by_height(&mut self, stats: &Statistics, params: &MergeParams) {
        let mut order = self.live_ids();
        order.sort_by(|&a, &b| {
            let sa = self.highest_saddle(a).map_or(f64::NEG_INFINITY, |s| s.value);
            let sb = self.highest_saddle(b).map_or(f64::NEG_INFINITY, |s| s.value);
            sb.total_cmp(&sa)
        });

        for id in order {
            if !self.remap.is_live(id) {
                continue;
            }
            let peak = self.peak(id);
            let saddle = self.highest_saddle(id);
            let base = saddle.map_or(stats.background, |s| s.value);
            let threshold =
                stats.peak_height_threshold(params.height_method, params.height_parameter, peak.max_value);
            if peak.max_value - base < threshold {
                self.absorb(id, saddle.map(|s| s.id));
            }
        }
    }

    fn merge_by_size(&mut self, min_size: usize) {
        let mut order = self.live_ids();
        order.sort_by_key(|&id| self.peak(id).count);

        for id in order {
            if !self.remap.is_live(id) || self.peak(id).count >= min_size {
                continue;
            }
            let target = self.highest_saddle(id).map(|s| s.id);
            self.absorb(id, target);
        }
    }

    fn merge_by_size_above_saddle<T: Pixel>(
        &mut self,
        state: &mut SearchState<T>,
        params: &MergeParams,
        cancel: &CancelToken,
    ) -> Result<(), FociError> {
        loop {
            cancel.check()?;
            self.sweep(state, params.contiguous_above_saddle);

            let mut order = self.live_ids();
            order.sort_by_key(|&id| self.peak(id).count_above_saddle);

            let mut stale = vec![false; self.peaks.len() + 1];
            let mut merged = 0;
            for id in order {
                if !self.remap.is_live(id) || stale[id as usize] {
                    continue;
                }
                if self.peak(id).count_above_saddle >= params.min_size {
                    continue;
                }
                let target = self.highest_saddle(id).map(|s| s.id);
                if let Some(t) = target {
                    stale[t as usize] = true;
                }
                self.absorb(id, target);
                merged += 1;
            }

            if merged == 0 {
                return Ok(());
            }
        }
    }

    /// Merge a peak into a neighbour, or dissolve it into the background.
    pub(crate) fn absorb(&mut self, id: u32, target: Option<u32>) {
        match target {
            Some(t) if t != id && self.remap.is_live(t) => self.merge_into(id, t),
            _ => self.dissolve(id),
        }
    }

    fn merge_into(&mut self, from: u32, to: u32) {
        let (f, t) = (from as usize - 1, to as usize - 1);
        let absorbed = std::mem::take(&mut self.peaks[f]);
        let target = &mut self.peaks[t];
        target.count += absorbed.count;
        target.intensity += absorbed.intensity;
        if absorbed.max_value > target.max_value {
            target.max_value = absorbed.max_value;
            target.seed = absorbed.seed;
            target.x = absorbed.x;
            target.y = absorbed.y;
            target.z = absorbed.z;
        }
        self.peaks[f] = PeakRecord {
            id: from,
            seed: absorbed.seed,
            max_value: absorbed.max_value,
            ..Default::default()
        };

        let saddles = std::mem::take(&mut self.adjacency[from as usize]);
        for s in saddles {
            let n = self.remap.resolve(s.id);
            if n == 0 || n == from || n == to {
                continue;
            }
            saddle::upsert(&mut self.adjacency[to as usize], n, s.value);
            let list = &mut self.adjacency[n as usize];
            list.retain(|x| x.id != from);
            saddle::upsert(list, to, s.value);
        }
        self.adjacency[to as usize].retain(|x| x.id != from && x.id != to);

        self.remap.merge(from, to);
    }

    /// Remove a peak; its pixels return to the background.
    pub(crate) fn dissolve(&mut self, id: u32) {
        let saddles = std::mem::take(&mut self.adjacency[id as usize]);
        for s in saddles {
            if let Some(list) = self.adjacency.get_mut(s.id as usize) {
                list.retain(|x| x.id != id);
            }
        }
        let peak = &mut self.peaks[id as usize - 1];
        peak.count = 0;
        peak.intensity = 0.0;
        self.remap.dissolve(id);
    }

    /// Relabel the pixels of absorbed peaks and refresh the saddle details
    /// and above-saddle measurements of the live peaks.
    pub fn sweep<T: Pixel>(&mut self, state: &mut SearchState<T>, contiguous: bool) {
        self.remap.apply(&mut state.labels);
        for (label, flag) in state.labels.iter().zip(state.flags.iter_mut()) {
            if *label == 0 {
                *flag &= !flags::IN_REGION;
            }
        }

        let mut live: Vec<PeakRecord> = self
            .peaks
            .iter()
            .filter(|p| self.remap.is_live(p.id))
            .cloned()
            .collect();
        saddle::assign_highest_saddles(&mut live, &self.adjacency);
        saddle::measure_above_saddle(state, &mut live, contiguous);
        for peak in live {
            let id = peak.id as usize;
            self.peaks[id - 1] = peak;
        }
    }

    /// The live peaks in id order.
    pub fn into_peaks(self) -> Vec<PeakRecord> {
        let remap = self.remap;
        self.peaks
            .into_iter()
            .filter(|p| remap.is_live(p.id))
            .collect()
    }
}
