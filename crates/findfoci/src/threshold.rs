use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{error::FociError, histogram::Histogram};

/// Automatic histogram threshold methods.
///
/// Every method returns the bin index of the threshold: samples in bins above
/// it are foreground.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutoThresholdMethod {
    /// Iterative intermeans variant ignoring the extreme bins.
    Default,
    /// Huang's fuzzy thresholding.
    Huang,
    /// Midpoint of the two modes of the smoothed histogram.
    Intermodes,
    /// Ridler-Calvard iterative intermeans.
    IsoData,
    /// Li's minimum cross entropy.
    Li,
    /// Kapur's maximum entropy.
    MaxEntropy,
    /// Mean of the samples.
    Mean,
    /// Minimum between the two modes of the smoothed histogram.
    Minimum,
    /// Tsai's moment preservation.
    Moments,
    /// Otsu's maximum between-class variance.
    #[default]
    Otsu,
    /// Median of the samples.
    Percentile,
    /// Zack's triangle method.
    Triangle,
    /// Yen's maximum correlation.
    Yen,
    /// First cut of a three-class Otsu partition.
    #[serde(alias = "Otsu_3_Level")]
    MultiOtsu3,
    /// First cut of a four-class Otsu partition.
    #[serde(alias = "Otsu_4_Level")]
    MultiOtsu4,
}

impl FromStr for AutoThresholdMethod {
    type Err = FociError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_lowercase().as_str() {
            "default" => Self::Default,
            "huang" => Self::Huang,
            "intermodes" => Self::Intermodes,
            "isodata" => Self::IsoData,
            "li" => Self::Li,
            "maxentropy" => Self::MaxEntropy,
            "mean" => Self::Mean,
            "minimum" => Self::Minimum,
            "moments" => Self::Moments,
            "otsu" => Self::Otsu,
            "percentile" => Self::Percentile,
            "triangle" => Self::Triangle,
            "yen" => Self::Yen,
            "otsu_3_level" | "multiotsu3" => Self::MultiOtsu3,
            "otsu_4_level" | "multiotsu4" => Self::MultiOtsu4,
            _ => {
                return Err(FociError::InvalidConfig(format!(
                    "unknown threshold method: {s}"
                )))
            }
        };
        Ok(method)
    }
}

// bins handed to the cubic multi-level searches
const MULTI_OTSU_BINS: usize = 256;
// bins handed to the other methods for floating point histograms
const FLOAT_BINS: usize = 65536;

impl AutoThresholdMethod {

    /// Compute the threshold bin of a histogram given as bin counts.
    ///
    /// # Example
    ///
    /// ```
    /// use findfoci::threshold::AutoThresholdMethod;
    ///
    /// let counts = [10, 12, 10, 0, 0, 0, 0, 10, 12, 10];
    /// assert_eq!(AutoThresholdMethod::Otsu.threshold_bin(&counts), 2);
    /// ```
    pub fn threshold_bin(&self, counts: &[u64]) -> usize {
        if counts.len() < 2 {
            return 0;
        }
        let data: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        let bin = match self {
            Self::Default => ij_isodata(&data),
            Self::Huang => huang(&data),
            Self::Intermodes => intermodes(&data),
            Self::IsoData => isodata(&data),
            Self::Li => li(&data),
            Self::MaxEntropy => max_entropy(&data),
            Self::Mean => mean(&data),
            Self::Minimum => minimum(&data),
            Self::Moments => moments(&data),
            Self::Otsu => otsu(&data),
            Self::Percentile => percentile(&data, 0.5),
            Self::Triangle => triangle(&data),
            Self::Yen => yen(&data),
            Self::MultiOtsu3 => multi_otsu(&data, 3),
            Self::MultiOtsu4 => multi_otsu(&data, 4),
        };
        bin.min(counts.len() - 1)
    }

    /// Compute the threshold sample value of a histogram.
    ///
    /// Integer histograms are thresholded on every level. The multi-level
    /// methods, and floating point histograms with more distinct values than
    /// the other methods handle, are rebinned first; the chosen bin maps back
    /// to the highest sample level it holds. An empty histogram yields zero.
    pub fn threshold_value(&self, histogram: &Histogram) -> f64 {
        if histogram.is_empty() {
            return 0.0;
        }
        let max_bins = match self {
            Self::MultiOtsu3 | Self::MultiOtsu4 => MULTI_OTSU_BINS,
            _ if histogram.is_contiguous() => histogram.len(),
            _ => FLOAT_BINS,
        };
        let hist = histogram.compacted(max_bins);
        hist.value(self.threshold_bin(hist.counts()))
    }
}

fn first_nonzero(data: &[f64]) -> Option<usize> {
    data.iter().position(|&c| c > 0.0)
}

fn last_nonzero(data: &[f64]) -> Option<usize> {
    data.iter().rposition(|&c| c > 0.0)
}

fn ij_isodata(data: &[f64]) -> usize {
    let mut data = data.to_vec();
    let max_value = data.len() - 1;
    data[0] = 0.0;
    data[max_value] = 0.0;

    let Some(min) = first_nonzero(&data) else {
        return data.len() / 2;
    };
    let max = last_nonzero(&data).unwrap_or(min);
    if min >= max {
        return data.len() / 2;
    }

    let mut moving = min;
    let mut result;
    loop {
        let (mut sum1, mut sum2, mut sum3, mut sum4) = (0.0, 0.0, 0.0, 0.0);
        for (i, &c) in data.iter().enumerate().take(moving + 1).skip(min) {
            sum1 += i as f64 * c;
            sum2 += c;
        }
        for (i, &c) in data.iter().enumerate().take(max + 1).skip(moving + 1) {
            sum3 += i as f64 * c;
            sum4 += c;
        }
        result = (sum1 / sum2 + sum3 / sum4) / 2.0;
        moving += 1;
        if !((moving + 1) as f64 <= result && moving + 1 < max) {
            break;
        }
    }
    result.round() as usize
}

fn huang(data: &[f64]) -> usize {
    let (Some(first), Some(last)) = (first_nonzero(data), last_nonzero(data)) else {
        return 0;
    };
    if first == last {
        return first;
    }

    let mut s = vec![0.0; last + 1];
    let mut w = vec![0.0; last + 1];
    s[first] = data[first];
    w[first] = first as f64 * data[first];
    for i in first + 1..=last {
        s[i] = s[i - 1] + data[i];
        w[i] = w[i - 1] + i as f64 * data[i];
    }

    let c = (last - first) as f64;
    let mut smu = vec![0.0; last - first + 1];
    for (i, m) in smu.iter_mut().enumerate().skip(1) {
        let mu = 1.0 / (1.0 + i as f64 / c);
        *m = -mu * mu.ln() - (1.0 - mu) * (1.0 - mu).ln();
    }

    let mut best = first;
    let mut best_entropy = f64::MAX;
    for t in first..=last {
        let mut entropy = 0.0;
        let mu = (w[t] / s[t]).round() as i64;
        for i in first..=t {
            entropy += smu[(i as i64 - mu).unsigned_abs() as usize] * data[i];
        }
        let back = s[last] - s[t];
        if back > 0.0 {
            let mu = ((w[last] - w[t]) / back).round() as i64;
            for i in t + 1..=last {
                entropy += smu[(i as i64 - mu).unsigned_abs() as usize] * data[i];
            }
        }
        if best_entropy > entropy {
            best_entropy = entropy;
            best = t;
        }
    }
    best
}

fn count_modes(y: &[f64]) -> usize {
    (1..y.len() - 1)
        .filter(|&k| y[k - 1] < y[k] && y[k + 1] < y[k])
        .count()
}

fn smooth_until_bimodal(data: &[f64]) -> Option<Vec<f64>> {
    let mut y = data.to_vec();
    let n = y.len();
    if n < 3 {
        return None;
    }
    for _ in 0..10_000 {
        if count_modes(&y) == 2 {
            return Some(y);
        }
        let prev = y.clone();
        y[0] = (prev[0] + prev[0] + prev[1]) / 3.0;
        for i in 1..n - 1 {
            y[i] = (prev[i - 1] + prev[i] + prev[i + 1]) / 3.0;
        }
        y[n - 1] = (prev[n - 2] + prev[n - 1] + prev[n - 1]) / 3.0;
    }
    None
}

fn intermodes(data: &[f64]) -> usize {
    let Some(y) = smooth_until_bimodal(data) else {
        return 0;
    };
    let modes: usize = (1..y.len() - 1)
        .filter(|&i| y[i - 1] < y[i] && y[i + 1] < y[i])
        .sum();
    modes / 2
}

fn minimum(data: &[f64]) -> usize {
    let Some(y) = smooth_until_bimodal(data) else {
        return 0;
    };
    (1..y.len() - 1)
        .find(|&i| y[i - 1] > y[i] && y[i + 1] >= y[i])
        .unwrap_or(0)
}

fn isodata(data: &[f64]) -> usize {
    let Some(mut g) = data.iter().skip(1).position(|&c| c > 0.0).map(|i| i + 2) else {
        return 0;
    };
    loop {
        if g > data.len() - 2 {
            return 0;
        }
        let (mut l, mut totl) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().take(g + 1) {
            totl += c;
            l += c * i as f64;
        }
        let (mut h, mut toth) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().skip(g + 1) {
            toth += c;
            h += c * i as f64;
        }
        if totl > 0.0 && toth > 0.0 {
            l /= totl;
            h /= toth;
            if g == ((l + h) / 2.0).round() as usize {
                return g;
            }
        }
        g += 1;
    }
}

fn li(data: &[f64]) -> usize {
    let total: f64 = data.iter().sum();
    if total == 0.0 {
        return 0;
    }
    let mean = data
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c)
        .sum::<f64>()
        / total;

    let tolerance = 0.5;
    let mut new_thresh = mean;
    let mut threshold;
    let mut iterations = 0;
    loop {
        let old_thresh = new_thresh;
        threshold = (old_thresh + 0.5).max(0.0) as usize;
        threshold = threshold.min(data.len() - 1);

        let (mut sum_back, mut num_back) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().take(threshold + 1) {
            sum_back += i as f64 * c;
            num_back += c;
        }
        let mean_back = if num_back == 0.0 { 0.0 } else { sum_back / num_back };

        let (mut sum_obj, mut num_obj) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().skip(threshold + 1) {
            sum_obj += i as f64 * c;
            num_obj += c;
        }
        let mean_obj = if num_obj == 0.0 { 0.0 } else { sum_obj / num_obj };

        let temp = (mean_back - mean_obj) / (mean_back.ln() - mean_obj.ln());
        if !temp.is_finite() {
            break;
        }
        new_thresh = if temp < -f64::EPSILON {
            (temp - 0.5).trunc()
        } else {
            (temp + 0.5).trunc()
        };

        iterations += 1;
        if (new_thresh - old_thresh).abs() <= tolerance || iterations > 1000 {
            break;
        }
    }
    threshold
}

fn normalized(data: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let total: f64 = data.iter().sum();
    let norm: Vec<f64> = data.iter().map(|&c| c / total).collect();
    let mut p1 = vec![0.0; norm.len()];
    let mut acc = 0.0;
    for (p, &n) in p1.iter_mut().zip(norm.iter()) {
        acc += n;
        *p = acc;
    }
    (norm, p1)
}

fn max_entropy(data: &[f64]) -> usize {
    if data.iter().sum::<f64>() == 0.0 {
        return 0;
    }
    let (norm, p1) = normalized(data);
    let p2: Vec<f64> = p1.iter().map(|p| 1.0 - p).collect();

    let first = p1.iter().position(|p| p.abs() >= f64::EPSILON).unwrap_or(0);
    let last = p2
        .iter()
        .rposition(|p| p.abs() >= f64::EPSILON)
        .unwrap_or(data.len() - 1);

    let mut threshold = first;
    let mut max_ent = f64::MIN;
    for it in first..=last {
        let mut ent_back = 0.0;
        for n in norm.iter().take(it + 1) {
            if *n != 0.0 {
                ent_back -= (n / p1[it]) * (n / p1[it]).ln();
            }
        }
        let mut ent_obj = 0.0;
        for n in norm.iter().skip(it + 1) {
            if *n != 0.0 {
                ent_obj -= (n / p2[it]) * (n / p2[it]).ln();
            }
        }
        let total = ent_back + ent_obj;
        if max_ent < total {
            max_ent = total;
            threshold = it;
        }
    }
    threshold
}

fn mean(data: &[f64]) -> usize {
    let total: f64 = data.iter().sum();
    if total == 0.0 {
        return 0;
    }
    let sum: f64 = data.iter().enumerate().map(|(i, &c)| i as f64 * c).sum();
    (sum / total).floor() as usize
}

fn moments(data: &[f64]) -> usize {
    let total: f64 = data.iter().sum();
    if total == 0.0 {
        return 0;
    }
    let histo: Vec<f64> = data.iter().map(|c| c / total).collect();
    let (mut m1, mut m2, mut m3) = (0.0, 0.0, 0.0);
    for (i, &h) in histo.iter().enumerate() {
        let di = i as f64;
        m1 += di * h;
        m2 += di * di * h;
        m3 += di * di * di * h;
    }
    let m0 = 1.0;
    let cd = m0 * m2 - m1 * m1;
    if cd == 0.0 {
        return m1 as usize;
    }
    let c0 = (-m2 * m2 + m1 * m3) / cd;
    let c1 = (m0 * -m3 + m2 * m1) / cd;
    let disc = (c1 * c1 - 4.0 * c0).max(0.0).sqrt();
    let z0 = 0.5 * (-c1 - disc);
    let z1 = 0.5 * (-c1 + disc);
    let p0 = (z1 - m1) / (z1 - z0);

    let mut sum = 0.0;
    for (i, &h) in histo.iter().enumerate() {
        sum += h;
        if sum > p0 {
            return i;
        }
    }
    histo.len() - 1
}

fn otsu(data: &[f64]) -> usize {
    let total: f64 = data.iter().sum();
    let sum: f64 = data.iter().enumerate().map(|(i, &c)| i as f64 * c).sum();

    let mut sum_b = 0.0;
    let mut weight_b = 0.0;
    let mut max_variance = 0.0;
    let mut threshold = 0;
    for (i, &c) in data.iter().enumerate() {
        weight_b += c;
        if weight_b == 0.0 {
            continue;
        }
        let weight_f = total - weight_b;
        if weight_f == 0.0 {
            break;
        }
        sum_b += i as f64 * c;
        let mean_b = sum_b / weight_b;
        let mean_f = (sum - sum_b) / weight_f;
        let variance = weight_b * weight_f * (mean_b - mean_f).powi(2);
        if variance > max_variance {
            max_variance = variance;
            threshold = i;
        }
    }
    threshold
}

fn percentile(data: &[f64], fraction: f64) -> usize {
    let total: f64 = data.iter().sum();
    if total == 0.0 {
        return 0;
    }
    let mut threshold = 0;
    let mut best = f64::MAX;
    let mut acc = 0.0;
    for (i, &c) in data.iter().enumerate() {
        acc += c;
        let diff = (acc / total - fraction).abs();
        if diff < best {
            best = diff;
            threshold = i;
        }
    }
    threshold
}

fn triangle(data: &[f64]) -> usize {
    let n = data.len();
    let (Some(first), Some(last)) = (first_nonzero(data), last_nonzero(data)) else {
        return 0;
    };
    let min = first.saturating_sub(1);
    let min2 = (last + 1).min(n - 1);

    let mut dmax = 0;
    let mut peak = 0.0;
    for (i, &c) in data.iter().enumerate() {
        if c > peak {
            peak = c;
            dmax = i;
        }
    }

    // work on the longer tail; mirror the histogram when it is on the left
    let inverted = (dmax - min) < (min2 - dmax);
    let (h, min, dmax) = if inverted {
        let h: Vec<f64> = data.iter().rev().copied().collect();
        (h, n - 1 - min2, n - 1 - dmax)
    } else {
        (data.to_vec(), min, dmax)
    };

    if min == dmax {
        return if inverted { n - 1 - min } else { min };
    }

    let nx = h[dmax];
    let ny = min as f64 - dmax as f64;
    let d = (nx * nx + ny * ny).sqrt();
    let (nx, ny) = (nx / d, ny / d);
    let d = nx * min as f64 + ny * h[min];

    let mut split = min;
    let mut split_distance = 0.0;
    for (i, &c) in h.iter().enumerate().take(dmax + 1).skip(min + 1) {
        let new_distance = nx * i as f64 + ny * c - d;
        if new_distance > split_distance {
            split = i;
            split_distance = new_distance;
        }
    }
    let split = split.saturating_sub(1);

    if inverted {
        n - 1 - split
    } else {
        split
    }
}

fn yen(data: &[f64]) -> usize {
    if data.iter().sum::<f64>() == 0.0 {
        return 0;
    }
    let (norm, p1) = normalized(data);
    let n = norm.len();
    let mut p1_sq = vec![0.0; n];
    let mut acc = 0.0;
    for (p, &v) in p1_sq.iter_mut().zip(norm.iter()) {
        acc += v * v;
        *p = acc;
    }
    let mut p2_sq = vec![0.0; n];
    let mut acc = 0.0;
    for i in (0..n - 1).rev() {
        acc += norm[i + 1] * norm[i + 1];
        p2_sq[i] = acc;
    }

    let mut threshold = 0;
    let mut max_crit = f64::MIN;
    for it in 0..n {
        let a = p1_sq[it] * p2_sq[it];
        let b = p1[it] * (1.0 - p1[it]);
        let crit = -(if a > 0.0 { a.ln() } else { 0.0 }) + 2.0 * (if b > 0.0 { b.ln() } else { 0.0 });
        if crit > max_crit {
            max_crit = crit;
            threshold = it;
        }
    }
    threshold
}

// Exhaustive search over ordered cuts; returns the first cut of the best partition.
fn multi_otsu(data: &[f64], classes: usize) -> usize {
    let n = data.len();
    if n < classes {
        return 0;
    }
    // prefix sums of counts and first moments
    let mut w = vec![0.0; n + 1];
    let mut m = vec![0.0; n + 1];
    for i in 0..n {
        w[i + 1] = w[i] + data[i];
        m[i + 1] = m[i] + i as f64 * data[i];
    }
    let total = w[n];
    if total == 0.0 {
        return 0;
    }

    // between-class term for bins [a, b)
    let term = |a: usize, b: usize| -> f64 {
        let wk = w[b] - w[a];
        if wk > 0.0 {
            let mk = m[b] - m[a];
            mk * mk / wk
        } else {
            0.0
        }
    };

    let mut best = f64::MIN;
    let mut best_cut = 0;
    match classes {
        3 => {
            for t1 in 0..n - 2 {
                for t2 in t1 + 1..n - 1 {
                    let v = term(0, t1 + 1) + term(t1 + 1, t2 + 1) + term(t2 + 1, n);
                    if v > best {
                        best = v;
                        best_cut = t1;
                    }
                }
            }
        }
        _ => {
            for t1 in 0..n - 3 {
                for t2 in t1 + 1..n - 2 {
                    let head = term(0, t1 + 1) + term(t1 + 1, t2 + 1);
                    for t3 in t2 + 1..n - 1 {
                        let v = head + term(t2 + 1, t3 + 1) + term(t3 + 1, n);
                        if v > best {
                            best = v;
                            best_cut = t1;
                        }
                    }
                }
            }
        }
    }
    best_cut
}
