use findfoci_volume::{ops::check_mask_size, Pixel, Roi, Volume, VolumeError};
use serde::Serialize;

use crate::{
    blur::gaussian_blur,
    cancel::CancelToken,
    centroid::locate_peaks,
    config::FindFociConfig,
    edge::remove_edge_maxima,
    error::FociError,
    grow::grow_regions,
    mask::{render_mask, LabelVolume, MaskParams},
    maxima::find_maxima,
    merge::{MergeParams, PeakMerger},
    objects::{assign_objects, assign_states, label_objects},
    peak::PeakRecord,
    prune::{measure_regions, prune_regions},
    saddle::find_saddles,
    sort::sort_peaks,
    state::SearchState,
    stats::{Statistics, StatisticsEngine},
};

/// The outcome of a single search.
#[derive(Clone, Debug, Serialize)]
pub struct FociResult {
    /// The reported peaks in their final order.
    pub peaks: Vec<PeakRecord>,
    /// Global statistics and the resolved background.
    pub statistics: Statistics,
    /// The rendered label volume, if requested and representable.
    #[serde(skip)]
    pub label_volume: Option<LabelVolume>,
}

/// Finds the foci of intensity volumes with a fixed configuration.
///
/// The finder holds no per-run state and can be shared across threads.
///
/// # Example
///
/// ```
/// use findfoci::config::{BackgroundMethod, FindFociConfig};
/// use findfoci::pipeline::FindFoci;
/// use findfoci_volume::{Volume, VolumeSize};
///
/// let config = FindFociConfig {
///     background_method: BackgroundMethod::Absolute,
///     background_parameter: 1.0,
///     ..Default::default()
/// };
/// let finder = FindFoci::new(config)?;
///
/// #[rustfmt::skip]
/// let data = vec![
///     0u8, 0, 0, 0, 0,
///     0, 9, 0, 0, 0,
///     0, 0, 0, 0, 0,
///     0, 0, 0, 5, 0,
///     0, 0, 0, 0, 0,
/// ];
/// let volume = Volume::new(VolumeSize::new_2d(5, 5), data)?;
/// let result = finder.run(&volume, None, None)?;
///
/// assert_eq!(result.peaks.len(), 2);
/// assert_eq!((result.peaks[0].x, result.peaks[0].y), (1, 1));
/// # Ok::<(), findfoci::error::FociError>(())
/// ```
#[derive(Clone, Debug)]
pub struct FindFoci {
    config: FindFociConfig,
}

impl FindFoci {
    /// Create a finder after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns the error of [`FindFociConfig::validate`].
    pub fn new(config: FindFociConfig) -> Result<Self, FociError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration of the finder.
    pub fn config(&self) -> &FindFociConfig {
        &self.config
    }

    /// Search a volume.
    ///
    /// `mask` restricts the search to its non-zero pixels and may have one
    /// z-slice or as many as the volume. `roi` restricts the search to a region
    /// of every z-slice.
    pub fn run<T: Pixel>(
        &self,
        volume: &Volume<T>,
        mask: Option<&Volume<u16>>,
        roi: Option<&Roi>,
    ) -> Result<FociResult, FociError> {
        self.run_with_cancel(volume, mask, roi, &CancelToken::new())
    }

    /// Search a volume, aborting with [`FociError::Cancelled`] once the token
    /// is cancelled.
    pub fn run_with_cancel<T: Pixel>(
        &self,
        volume: &Volume<T>,
        mask: Option<&Volume<u16>>,
        roi: Option<&Roi>,
        cancel: &CancelToken,
    ) -> Result<FociResult, FociError> {
        let config = &self.config;
        let size = volume.size();
        let slice_len = size.slice_len();

        if let Some(mask) = mask {
            check_mask_size(volume, mask).map_err(|e| match e {
                VolumeError::SizeMismatch(w, h, d, mw, mh, md) => {
                    FociError::MaskSizeMismatch(mw, mh, md, w, h, d)
                }
                other => other.into(),
            })?;
        }
        if let Some(roi) = roi {
            roi.validate(size)?;
        }

        let blurred = match config.gaussian_blur {
            Some(sigma) => Some(gaussian_blur(volume, sigma)?),
            None => None,
        };
        let search = blurred.as_ref().unwrap_or(volume);
        cancel.check()?;

        let mask_data = mask.map(|m| m.as_slice());
        let excluded = |i: usize| {
            if let Some(roi) = roi {
                let (x, y, _) = size.coords(i);
                if !roi.contains(x, y) {
                    return true;
                }
            }
            match mask_data {
                Some(m) if m.len() == slice_len => m[i % slice_len] == 0,
                Some(m) => m[i] == 0,
                None => false,
            }
        };

        let mut state = SearchState::new(size, search.as_slice(), volume.as_slice(), excluded);
        let statistics = StatisticsEngine::new(search.as_slice(), excluded).statistics(config);
        let background = statistics.background;
        log::debug!(
            "Background {} ({:?}), {} pixels searched",
            background,
            config.background_method,
            statistics.region.count
        );
        cancel.check()?;

        let mut peaks = find_maxima(&mut state, background, config.maxima_capacity, cancel)?;
        if peaks.is_empty() {
            log::info!("No maxima found above the background {}", background);
            let label_volume = self.render(&state, &[], &statistics);
            return Ok(FociResult {
                peaks,
                statistics,
                label_volume,
            });
        }
        cancel.check()?;

        grow_regions(&mut state, background, cancel)?;
        cancel.check()?;

        let mut thresholds = vec![0.0; peaks.len() + 1];
        for peak in &peaks {
            thresholds[peak.id as usize] = statistics.search_threshold(
                config.search_method,
                config.search_parameter,
                peak.max_value,
            );
        }
        prune_regions(&mut state, &thresholds);
        measure_regions(&state, &mut peaks);
        cancel.check()?;

        let adjacency = find_saddles(&mut state, &mut peaks);
        cancel.check()?;

        let contiguous = config.options.contiguous_above_saddle;
        let mut merger = PeakMerger::new(peaks, adjacency);
        merger.merge(
            &mut state,
            &statistics,
            &MergeParams {
                height_method: config.peak_height_method,
                height_parameter: config.peak_height_parameter,
                min_size: config.min_size,
                minimum_above_saddle: config.options.minimum_above_saddle,
                contiguous_above_saddle: contiguous,
            },
            cancel,
        )?;

        if config.options.remove_edge_maxima {
            let bounds = roi.map_or((0, 0, size.width, size.height), |r| r.bounds());
            if remove_edge_maxima(&state, &mut merger, bounds) > 0 {
                merger.sweep(&mut state, contiguous);
            }
        }
        cancel.check()?;

        let mut peaks = merger.into_peaks();
        for peak in peaks.iter_mut() {
            peak.update_derived(background, statistics.region.min);
        }

        locate_peaks(
            &state,
            &mut peaks,
            config.centroid_method,
            config.centroid_parameter,
        );

        if config.options.object_analysis {
            let (objects, count) = label_objects(&state);
            assign_objects(&mut peaks, &objects);
            log::debug!("Found {} objects", count);
        }
        if let Some(mask) = mask_data {
            assign_states(&mut peaks, mask, slice_len);
        }

        sort_peaks(
            &mut peaks,
            config.sort_method,
            config.resolved_sort_order(),
            background,
            size,
        );
        peaks.truncate(config.max_peaks);
        cancel.check()?;

        let label_volume = self.render(&state, &peaks, &statistics);

        log::info!(
            "Found {} peaks (background {}, {} pixels searched)",
            peaks.len(),
            background,
            statistics.region.count
        );

        Ok(FociResult {
            peaks,
            statistics,
            label_volume,
        })
    }

    /// Render the label volume if requested; a capacity overflow only drops the volume.
    fn render<T: Pixel>(
        &self,
        state: &SearchState<T>,
        peaks: &[PeakRecord],
        statistics: &Statistics,
    ) -> Option<LabelVolume> {
        let options = self.config.mask?;
        let params = MaskParams {
            options,
            fraction: self.config.fraction_parameter,
            background: statistics.background,
            threshold_method: self.config.auto_threshold_method,
        };
        match render_mask(state, peaks, &params) {
            Ok(volume) => Some(volume),
            Err(e) => {
                log::warn!("Label volume not rendered: {}", e);
                None
            }
        }
    }
}
