use findfoci_volume::{Pixel, VolumeSize};

use crate::{
    config::CentroidMethod, neighbors::Neighbourhood, peak::PeakRecord, state::SearchState,
};

const MAX_ITERATIONS: usize = 10;

/// Move the reported coordinate of every peak according to the centroid method.
///
/// Each peak is measured over its region pixels above its highest saddle, or
/// its whole region if it has no neighbour. The seed of the peak is left
/// unchanged.
pub fn locate_peaks<T: Pixel>(
    state: &SearchState<T>,
    peaks: &mut [PeakRecord],
    method: CentroidMethod,
    parameter: f64,
) {
    if method == CentroidMethod::SearchImage || peaks.is_empty() {
        return;
    }

    let max_id = peaks.iter().map(|p| p.id).max().unwrap_or(0);
    let regions = state.region_pixels(max_id);
    let use_original = method.uses_original();
    let value = |i: usize| {
        if use_original {
            state.original_value(i)
        } else {
            state.value(i)
        }
    };

    for peak in peaks.iter_mut() {
        let pixels: Vec<usize> = regions[peak.id as usize]
            .iter()
            .copied()
            .filter(|&i| !peak.has_saddle() || state.value(i) > peak.highest_saddle_value)
            .collect();
        if pixels.is_empty() {
            continue;
        }

        let located = match method {
            CentroidMethod::SearchImage => None,
            CentroidMethod::MaxValueSearch | CentroidMethod::MaxValueOriginal => {
                Some(max_value_position(state.size, &state.neighbourhood, &pixels, &value))
            }
            CentroidMethod::CentreOfMassSearch | CentroidMethod::CentreOfMassOriginal => {
                Some(centre_of_mass(
                    state.size,
                    &state.neighbourhood,
                    &pixels,
                    parameter,
                    value,
                ))
            }
            CentroidMethod::GaussianSearch | CentroidMethod::GaussianOriginal => {
                gaussian_position(state.size, &pixels, parameter, value)
            }
        };

        match located {
            Some((x, y, z)) => {
                peak.x = x;
                peak.y = y;
                peak.z = z;
            }
            None => log::warn!("Gaussian fit failed for peak {}, keeping its seed", peak.id),
        }
    }
}

/// The brightest pixel.
///
/// Ties are resolved over the plateau of equal pixels connected to the first
/// brightest pixel: the member closest to the plateau's mean coordinate wins.
/// `pixels` must be in ascending order.
fn max_value_position(
    size: VolumeSize,
    hood: &Neighbourhood,
    pixels: &[usize],
    value: &impl Fn(usize) -> f64,
) -> (usize, usize, usize) {
    let max = pixels
        .iter()
        .map(|&i| value(i))
        .fold(f64::NEG_INFINITY, f64::max);
    let candidates: Vec<usize> = pixels.iter().copied().filter(|&i| value(i) == max).collect();

    let mut listed = vec![false; candidates.len()];
    let mut top: Vec<usize> = Vec::new();
    if let Some(&first) = candidates.first() {
        listed[0] = true;
        top.push(first);
    }
    let mut head = 0;
    while head < top.len() {
        let p = top[head];
        head += 1;
        for (_, n) in hood.neighbours(p) {
            if let Ok(k) = candidates.binary_search(&n) {
                if !listed[k] {
                    listed[k] = true;
                    top.push(n);
                }
            }
        }
    }

    let n = top.len() as f64;
    let mean = top.iter().fold((0.0, 0.0, 0.0), |acc, &i| {
        let (x, y, z) = size.coords(i);
        (acc.0 + x as f64 / n, acc.1 + y as f64 / n, acc.2 + z as f64 / n)
    });

    let best = top
        .iter()
        .map(|&i| {
            let (x, y, z) = size.coords(i);
            let d = (x as f64 - mean.0).powi(2)
                + (y as f64 - mean.1).powi(2)
                + (z as f64 - mean.2).powi(2);
            (d, i)
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map_or(pixels[0], |(_, i)| i);

    size.coords(best)
}

/// Iterative centre of mass in a window of half-width `half_window` around the
/// current estimate, starting from the brightest pixel.
///
/// Stops once the estimate moves by at most one pixel (squared shift <= 1).
fn centre_of_mass(
    size: VolumeSize,
    hood: &Neighbourhood,
    pixels: &[usize],
    half_window: f64,
    value: impl Fn(usize) -> f64,
) -> (usize, usize, usize) {
    let (sx, sy, sz) = max_value_position(size, hood, pixels, &value);
    let mut centre = (sx as f64, sy as f64, sz as f64);
    let r = half_window.max(0.0);
    let rz = if size.is_3d() { r } else { 0.0 };

    for _ in 0..MAX_ITERATIONS {
        let (mut sw, mut wx, mut wy, mut wz) = (0.0, 0.0, 0.0, 0.0);
        for &i in pixels {
            let (x, y, z) = size.coords(i);
            let (x, y, z) = (x as f64, y as f64, z as f64);
            if (x - centre.0).abs() > r || (y - centre.1).abs() > r || (z - centre.2).abs() > rz {
                continue;
            }
            let w = value(i);
            sw += w;
            wx += w * x;
            wy += w * y;
            wz += w * z;
        }
        if sw <= 0.0 {
            break;
        }
        let next = (wx / sw, wy / sw, wz / sw);
        let shift = (next.0 - centre.0).powi(2) + (next.1 - centre.1).powi(2) + (next.2 - centre.2).powi(2);
        centre = next;
        if shift <= 1.0 {
            break;
        }
    }

    let clamp = |v: f64, len: usize| (v.round().max(0.0) as usize).min(len - 1);
    (
        clamp(centre.0, size.width),
        clamp(centre.1, size.height),
        clamp(centre.2, size.depth),
    )
}

#[cfg(feature = "gaussian-fit")]
fn gaussian_position(
    size: VolumeSize,
    pixels: &[usize],
    projection: f64,
    value: impl Fn(usize) -> f64,
) -> Option<(usize, usize, usize)> {
    use crate::gauss_fit::{fit_gaussian_2d, FitParams};

    let (mut x0, mut y0, mut z0) = (usize::MAX, usize::MAX, usize::MAX);
    let (mut x1, mut y1, mut z1) = (0, 0, 0);
    for &i in pixels {
        let (x, y, z) = size.coords(i);
        x0 = x0.min(x);
        y0 = y0.min(y);
        z0 = z0.min(z);
        x1 = x1.max(x);
        y1 = y1.max(y);
        z1 = z1.max(z);
    }
    let (w, h, depth) = (x1 - x0 + 1, y1 - y0 + 1, z1 - z0 + 1);

    // maximum projection for a zero parameter, otherwise average
    let mut image = vec![0.0; w * h];
    for &i in pixels {
        let (x, y, _) = size.coords(i);
        let cell = &mut image[(y - y0) * w + (x - x0)];
        let v = value(i);
        if projection == 0.0 {
            *cell = f64::max(*cell, v);
        } else {
            *cell += v / depth as f64;
        }
    }

    let fit = fit_gaussian_2d(&image, w, h, &FitParams::default())?;
    let x = x0 + fit.x0.round() as usize;
    let y = y0 + fit.y0.round() as usize;

    let (mut sw, mut wz) = (0.0, 0.0);
    for &i in pixels {
        let (px, py, pz) = size.coords(i);
        if px == x && py == y {
            let v = value(i);
            sw += v;
            wz += v * pz as f64;
        }
    }
    let z = if sw > 0.0 {
        (wz / sw).round() as usize
    } else {
        size.coords(pixels[0]).2
    };

    Some((x, y, z.clamp(z0, z1)))
}

#[cfg(not(feature = "gaussian-fit"))]
fn gaussian_position(
    _size: VolumeSize,
    _pixels: &[usize],
    _projection: f64,
    _value: impl Fn(usize) -> f64,
) -> Option<(usize, usize, usize)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_over_all(state: &mut SearchState<f32>, seed: usize) -> PeakRecord {
        state.labels.iter_mut().for_each(|l| *l = 1);
        let v = state.value(seed);
        PeakRecord::new(1, seed, v, state.size)
    }

    #[test]
    fn test_centroid_search_image_keeps_seed() {
        let data = vec![1.0f32, 5.0, 1.0];
        let size = VolumeSize::new_2d(3, 1);
        let mut state = SearchState::new(size, &data, &data, |_| false);
        let mut peaks = vec![peak_over_all(&mut state, 1)];
        locate_peaks(&state, &mut peaks, CentroidMethod::SearchImage, 2.0);
        assert_eq!((peaks[0].x, peaks[0].y), (1, 0));
    }

    #[test]
    fn test_centroid_max_value_original() {
        let search = vec![1.0f32, 5.0, 4.0, 1.0];
        let original = vec![1.0f32, 2.0, 8.0, 1.0];
        let size = VolumeSize::new_2d(4, 1);
        let mut state = SearchState::new(size, &search, &original, |_| false);
        let mut peaks = vec![peak_over_all(&mut state, 1)];
        locate_peaks(&state, &mut peaks, CentroidMethod::MaxValueOriginal, 0.0);
        assert_eq!(peaks[0].x, 2);
        assert_eq!(peaks[0].seed, 1);
    }

    #[test]
    fn test_centroid_centre_of_mass_symmetric() {
        #[rustfmt::skip]
        let data = vec![
            0.0f32, 1.0, 0.0,
            1.0, 4.0, 1.0,
            0.0, 1.0, 0.0,
        ];
        let size = VolumeSize::new_2d(3, 3);
        let mut state = SearchState::new(size, &data, &data, |_| false);
        let mut peaks = vec![peak_over_all(&mut state, 4)];
        locate_peaks(&state, &mut peaks, CentroidMethod::CentreOfMassSearch, 2.0);
        assert_eq!((peaks[0].x, peaks[0].y, peaks[0].z), (1, 1, 0));
    }

    #[test]
    fn test_centroid_centre_of_mass_shifts() {
        let data = vec![0.0f32, 0.0, 0.0, 9.0, 9.0, 9.0, 9.0];
        let size = VolumeSize::new_2d(7, 1);
        let mut state = SearchState::new(size, &data, &data, |_| false);
        let mut peaks = vec![peak_over_all(&mut state, 3)];
        locate_peaks(&state, &mut peaks, CentroidMethod::CentreOfMassSearch, 1.0);
        assert_eq!(peaks[0].x, 4);
    }

    #[test]
    fn test_centroid_centre_of_mass_stops_at_unit_shift() {
        // the first step moves from x = 2 to x = 3 exactly
        let data = vec![0.0f32, 0.0, 9.0, 0.0, 9.0, 8.0, 0.0, 0.0];
        let size = VolumeSize::new_2d(8, 1);
        let mut state = SearchState::new(size, &data, &data, |_| false);
        let mut peaks = vec![peak_over_all(&mut state, 2)];
        locate_peaks(&state, &mut peaks, CentroidMethod::CentreOfMassSearch, 2.0);
        assert_eq!(peaks[0].x, 3);
    }

    #[test]
    fn test_centroid_max_value_ties_use_connected_plateau() {
        let data = vec![9.0f32, 0.0, 0.0, 9.0, 9.0];
        let size = VolumeSize::new_2d(5, 1);
        let mut state = SearchState::new(size, &data, &data, |_| false);
        let mut peaks = vec![peak_over_all(&mut state, 0)];
        locate_peaks(&state, &mut peaks, CentroidMethod::MaxValueSearch, 0.0);
        assert_eq!(peaks[0].x, 0);
    }

    #[cfg(feature = "gaussian-fit")]
    #[test]
    fn test_centroid_gaussian() {
        let (w, h) = (11, 9);
        let data: Vec<f32> = (0..w * h)
            .map(|i| {
                let (x, y) = ((i % w) as f64, (i / w) as f64);
                let v = 2.0 + 50.0 * (-((x - 6.2).powi(2) + (y - 3.9).powi(2)) / 4.0).exp();
                v as f32
            })
            .collect();
        let size = VolumeSize::new_2d(w, h);
        let mut state = SearchState::new(size, &data, &data, |_| false);
        let mut peaks = vec![peak_over_all(&mut state, size.index(6, 4, 0))];
        locate_peaks(&state, &mut peaks, CentroidMethod::GaussianSearch, 0.0);
        assert_eq!((peaks[0].x, peaks[0].y), (6, 4));
    }
}
