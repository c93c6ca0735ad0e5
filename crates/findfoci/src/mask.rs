use findfoci_volume::{Pixel, Volume, VolumeSize};

use crate::{
    config::{MaskClip, MaskKind, MaskOptions},
    error::FociError,
    flags,
    histogram::Histogram,
    peak::PeakRecord,
    state::SearchState,
    threshold::AutoThresholdMethod,
};

/// Value of the background pixels of a threshold mask.
pub const THRESHOLD_BACKGROUND: u8 = 0;
/// Value of the pixels bordering another region in a threshold mask.
pub const THRESHOLD_BORDER: u8 = 1;
/// Value of the region pixels at or below the region threshold.
pub const THRESHOLD_BELOW: u8 = 2;
/// Value of the region pixels above the region threshold.
pub const THRESHOLD_ABOVE: u8 = 3;
/// Value of the apex markers in a threshold mask.
pub const THRESHOLD_APEX: u8 = 4;

/// A rendered label volume, stored in the narrowest type that holds its labels.
#[derive(Clone, Debug, PartialEq)]
pub enum LabelVolume {
    /// Labels up to 255.
    U8(Volume<u8>),
    /// Labels up to 65535.
    U16(Volume<u16>),
}

impl LabelVolume {
    /// Size of the volume.
    pub fn size(&self) -> VolumeSize {
        match self {
            LabelVolume::U8(v) => v.size(),
            LabelVolume::U16(v) => v.size(),
        }
    }

    /// The label at a linear index.
    pub fn label(&self, index: usize) -> u32 {
        match self {
            LabelVolume::U8(v) => v.as_slice()[index] as u32,
            LabelVolume::U16(v) => v.as_slice()[index] as u32,
        }
    }

    /// All labels widened to `u32`.
    pub fn to_u32_vec(&self) -> Vec<u32> {
        match self {
            LabelVolume::U8(v) => v.as_slice().iter().map(|&l| l as u32).collect(),
            LabelVolume::U16(v) => v.as_slice().iter().map(|&l| l as u32).collect(),
        }
    }
}

/// Settings used to render a label volume.
#[derive(Clone, Copy, Debug)]
pub struct MaskParams {
    /// Rendering options.
    pub options: MaskOptions,
    /// Fraction used by the fractional clipping modes.
    pub fraction: f64,
    /// Resolved background level.
    pub background: f64,
    /// Threshold method of the threshold mode.
    pub threshold_method: AutoThresholdMethod,
}

/// Render the regions of the reported peaks.
///
/// In peak mode the region of the i-th peak (0-based) gets the value `n - i`,
/// so the first peak has the highest value, and apex markers get `n + 1`.
///
/// # Errors
///
/// Returns [`FociError::TooManyLabels`] if the labels do not fit in 16 bits.
pub fn render_mask<T: Pixel>(
    state: &SearchState<T>,
    peaks: &[PeakRecord],
    params: &MaskParams,
) -> Result<LabelVolume, FociError> {
    let size = state.size;
    let n = peaks.len();
    let options = params.options;

    let max_label = match options.kind {
        MaskKind::Peaks => n + options.show_apex as usize,
        MaskKind::Threshold => THRESHOLD_APEX as usize,
    };
    if max_label > u16::MAX as usize {
        log::warn!("Cannot render {} labels in a 16-bit mask", max_label);
        return Err(FociError::TooManyLabels(max_label, u16::MAX as usize));
    }

    // position in the reported list, by label
    let max_id = state.labels.iter().copied().max().unwrap_or(0) as usize;
    let mut rank: Vec<Option<usize>> = vec![None; max_id + 1];
    for (i, peak) in peaks.iter().enumerate() {
        if let Some(r) = rank.get_mut(peak.id as usize) {
            *r = Some(i);
        }
    }

    let mut regions: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, &label) in state.labels.iter().enumerate() {
        if let Some(Some(k)) = rank.get(label as usize) {
            regions[*k].push(i);
        }
    }
    for (k, region) in regions.iter_mut().enumerate() {
        clip_region(state, &peaks[k], region, params);
    }

    let mut out = vec![0u32; size.len()];
    match options.kind {
        MaskKind::Peaks => {
            for (k, region) in regions.iter().enumerate() {
                for &i in region {
                    out[i] = (n - k) as u32;
                }
            }
        }
        MaskKind::Threshold => {
            // mark the region of each pixel first so borders can be detected
            for (k, region) in regions.iter().enumerate() {
                for &i in region {
                    out[i] = (k + 1) as u32;
                }
            }
            let owner = out.clone();
            for region in regions.iter() {
                let values: Vec<T> = region.iter().map(|&i| state.search[i]).collect();
                let hist = Histogram::build(&values, |_| true);
                let cutoff = params.threshold_method.threshold_value(&hist);
                for &i in region {
                    let border = state
                        .neighbourhood
                        .neighbours(i)
                        .any(|(_, nb)| owner[nb] != 0 && owner[nb] != owner[i]);
                    let code = if border {
                        THRESHOLD_BORDER
                    } else if state.value(i) > cutoff {
                        THRESHOLD_ABOVE
                    } else {
                        THRESHOLD_BELOW
                    };
                    out[i] = code as u32;
                }
            }
        }
    }

    if options.show_apex {
        let apex = match options.kind {
            MaskKind::Peaks => n as u32 + 1,
            MaskKind::Threshold => THRESHOLD_APEX as u32,
        };
        for peak in peaks {
            out[size.index(peak.x, peak.y, peak.z)] = apex;
        }
    }

    Ok(if max_label <= u8::MAX as usize {
        LabelVolume::U8(Volume::new(size, out.iter().map(|&v| v as u8).collect())?)
    } else {
        LabelVolume::U16(Volume::new(size, out.iter().map(|&v| v as u16).collect())?)
    })
}

/// Restrict a region to the sub-region selected by the clipping mode.
fn clip_region<T: Pixel>(
    state: &SearchState<T>,
    peak: &PeakRecord,
    region: &mut Vec<usize>,
    params: &MaskParams,
) {
    let background = params.background;
    match params.options.clip {
        MaskClip::None => {}
        MaskClip::AboveSaddle => {
            region.retain(|&i| !state.has_flag(i, flags::BELOW_SADDLE));
        }
        MaskClip::FractionOfHeight => {
            let cutoff = background + params.fraction * (peak.max_value - background);
            region.retain(|&i| state.value(i) >= cutoff);
        }
        MaskClip::FractionOfIntensity => {
            let mut ranked: Vec<(f64, usize)> = region
                .iter()
                .map(|&i| (state.value(i) - background, i))
                .collect();
            ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
            let total: f64 = ranked.iter().map(|(v, _)| v.max(0.0)).sum();
            let target = params.fraction * total;

            let mut kept = Vec::new();
            let mut sum = 0.0;
            for (v, i) in ranked {
                kept.push(i);
                sum += v.max(0.0);
                if sum >= target {
                    break;
                }
            }
            kept.sort_unstable();
            *region = kept;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(kind: MaskKind, clip: MaskClip, show_apex: bool) -> MaskParams {
        MaskParams {
            options: MaskOptions {
                kind,
                clip,
                show_apex,
            },
            fraction: 0.5,
            background: 0.0,
            threshold_method: AutoThresholdMethod::Otsu,
        }
    }

    fn two_regions<'a>(data: &'a [u8]) -> (SearchState<'a, u8>, Vec<PeakRecord>) {
        let size = VolumeSize::new_2d(data.len(), 1);
        let mut state = SearchState::new(size, data, data, |_| false);
        state.labels = vec![1, 1, 1, 2, 2, 2];
        let mut a = PeakRecord::new(1, 1, 9.0, size);
        a.count = 3;
        let mut b = PeakRecord::new(2, 4, 6.0, size);
        b.count = 3;
        (state, vec![b, a])
    }

    #[test]
    fn test_peak_mask_ranks() -> Result<(), FociError> {
        let data = vec![2u8, 9, 4, 3, 6, 2];
        let (state, peaks) = two_regions(&data);
        let mask = render_mask(&state, &peaks, &params(MaskKind::Peaks, MaskClip::None, false))?;
        assert!(matches!(mask, LabelVolume::U8(_)));
        assert_eq!(mask.to_u32_vec(), vec![1, 1, 1, 2, 2, 2]);

        let mask = render_mask(&state, &peaks, &params(MaskKind::Peaks, MaskClip::None, true))?;
        assert_eq!(mask.to_u32_vec(), vec![1, 3, 1, 2, 3, 2]);
        Ok(())
    }

    #[test]
    fn test_mask_fraction_of_height() -> Result<(), FociError> {
        let data = vec![2u8, 9, 4, 3, 6, 2];
        let (state, peaks) = two_regions(&data);
        let mask = render_mask(
            &state,
            &peaks,
            &params(MaskKind::Peaks, MaskClip::FractionOfHeight, false),
        )?;
        assert_eq!(mask.to_u32_vec(), vec![0, 1, 0, 2, 2, 0]);
        Ok(())
    }

    #[test]
    fn test_mask_fraction_of_intensity() -> Result<(), FociError> {
        let data = vec![2u8, 9, 4, 3, 6, 2];
        let (state, peaks) = two_regions(&data);
        let mut p = params(MaskKind::Peaks, MaskClip::FractionOfIntensity, false);
        p.fraction = 0.7;
        let mask = render_mask(&state, &peaks, &p)?;
        assert_eq!(mask.to_u32_vec(), vec![0, 1, 1, 2, 2, 0]);
        Ok(())
    }

    #[test]
    fn test_threshold_mask() -> Result<(), FociError> {
        let data = vec![2u8, 9, 4, 3, 6, 2];
        let (state, peaks) = two_regions(&data);
        let mask = render_mask(
            &state,
            &peaks,
            &params(MaskKind::Threshold, MaskClip::None, false),
        )?;
        let labels = mask.to_u32_vec();
        assert_eq!(labels[2], THRESHOLD_BORDER as u32);
        assert_eq!(labels[3], THRESHOLD_BORDER as u32);
        assert_eq!(labels[1], THRESHOLD_ABOVE as u32);
        assert_eq!(labels[0], THRESHOLD_BELOW as u32);
        Ok(())
    }

    #[test]
    fn test_mask_u16_output() -> Result<(), FociError> {
        let size = VolumeSize::new_2d(300, 1);
        let data = vec![1u8; 300];
        let mut state = SearchState::new(size, &data, &data, |_| false);
        state.labels = (1..=300).collect();
        let peaks: Vec<PeakRecord> = (1..=300u32)
            .map(|id| PeakRecord::new(id, id as usize - 1, 1.0, size))
            .collect();
        let mask = render_mask(&state, &peaks, &params(MaskKind::Peaks, MaskClip::None, false))?;
        assert!(matches!(mask, LabelVolume::U16(_)));
        assert_eq!(mask.label(0), 300);
        assert_eq!(mask.label(299), 1);
        Ok(())
    }
}
