use findfoci_volume::Pixel;

/// Summary statistics of a set of samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionStatistics {
    /// Number of samples.
    pub count: u64,
    /// Minimum sample value.
    pub min: f64,
    /// Maximum sample value.
    pub max: f64,
    /// Mean sample value.
    pub mean: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Sum of the samples.
    pub sum: f64,
}

/// Occupancy histogram of a volume.
///
/// Integer volumes use one bin per integer level between the smallest and the
/// largest included sample. Floating volumes use one bin per distinct sample
/// value. Bin values are stored in ascending order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Histogram {
    values: Vec<f64>,
    counts: Vec<u64>,
    contiguous: bool,
}

impl Histogram {
    /// Compute the histogram of the samples for which `include` returns true.
    ///
    /// NaN samples are never counted.
    ///
    /// # Example
    ///
    /// ```
    /// use findfoci::histogram::Histogram;
    ///
    /// let data = vec![3u8, 5, 5, 9];
    /// let hist = Histogram::build(&data, |_| true);
    ///
    /// assert_eq!(hist.len(), 7);
    /// assert_eq!(hist.counts()[2], 2);
    /// assert_eq!(hist.value(6), 9.0);
    /// ```
    pub fn build<T: Pixel>(data: &[T], include: impl Fn(usize) -> bool) -> Self {
        if T::INTEGER {
            Self::build_integer(data, include)
        } else {
            Self::build_sorted(data, include)
        }
    }

    fn build_integer<T: Pixel>(data: &[T], include: impl Fn(usize) -> bool) -> Self {
        let mut range: Option<(i64, i64)> = None;
        for (i, &v) in data.iter().enumerate() {
            if !include(i) {
                continue;
            }
            let v = Into::<f64>::into(v) as i64;
            range = Some(match range {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }

        let Some((lo, hi)) = range else {
            return Self::empty();
        };

        let mut counts = vec![0u64; (hi - lo + 1) as usize];
        for (i, &v) in data.iter().enumerate() {
            if include(i) {
                let v = Into::<f64>::into(v) as i64;
                counts[(v - lo) as usize] += 1;
            }
        }

        Self {
            values: (lo..=hi).map(|v| v as f64).collect(),
            counts,
            contiguous: true,
        }
    }

    fn build_sorted<T: Pixel>(data: &[T], include: impl Fn(usize) -> bool) -> Self {
        let mut samples: Vec<f64> = data
            .iter()
            .enumerate()
            .filter(|(i, _)| include(*i))
            .map(|(_, &v)| v.into())
            .filter(|v: &f64| !v.is_nan())
            .collect();
        samples.sort_by(|a, b| a.total_cmp(b));

        let mut values: Vec<f64> = Vec::new();
        let mut counts: Vec<u64> = Vec::new();
        for v in samples {
            match values.last() {
                Some(&last) if last == v => {
                    if let Some(c) = counts.last_mut() {
                        *c += 1;
                    }
                }
                _ => {
                    values.push(v);
                    counts.push(1);
                }
            }
        }

        Self {
            values,
            counts,
            contiguous: false,
        }
    }

    /// A histogram without samples.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the histogram has no bins.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The count of each bin.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// The sample value of each bin.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The sample value of the bin, clamped to the last bin.
    pub fn value(&self, bin: usize) -> f64 {
        match self.values.len() {
            0 => 0.0,
            n => self.values[bin.min(n - 1)],
        }
    }

    /// Total number of counted samples.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The bin holding the sample value `v`, if any.
    pub fn bin_of(&self, v: f64) -> Option<usize> {
        if self.contiguous {
            let first = *self.values.first()?;
            let offset = v - first;
            if offset < 0.0 || offset.fract() != 0.0 {
                return None;
            }
            let bin = offset as usize;
            (bin < self.values.len()).then_some(bin)
        } else {
            self.values.binary_search_by(|x| x.total_cmp(&v)).ok()
        }
    }

    /// Merge two histograms into one holding the samples of both.
    pub fn combine(&self, other: &Histogram) -> Histogram {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        let mut values = Vec::with_capacity(self.len() + other.len());
        let mut counts = Vec::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.len() || j < other.len() {
            let a = self.values.get(i).copied();
            let b = other.values.get(j).copied();
            match (a, b) {
                (Some(a), Some(b)) if a == b => {
                    values.push(a);
                    counts.push(self.counts[i] + other.counts[j]);
                    i += 1;
                    j += 1;
                }
                (Some(a), Some(b)) if a < b => {
                    values.push(a);
                    counts.push(self.counts[i]);
                    i += 1;
                }
                (Some(_), Some(b)) | (None, Some(b)) => {
                    values.push(b);
                    counts.push(other.counts[j]);
                    j += 1;
                }
                (Some(a), None) => {
                    values.push(a);
                    counts.push(self.counts[i]);
                    i += 1;
                }
                (None, None) => break,
            }
        }

        let mut combined = Histogram {
            values,
            counts,
            contiguous: false,
        };

        if self.contiguous && other.contiguous {
            combined = combined.fill_integer_gaps();
        }
        combined
    }

    fn fill_integer_gaps(self) -> Histogram {
        let (Some(&lo), Some(&hi)) = (self.values.first(), self.values.last()) else {
            return self;
        };
        let mut counts = vec![0u64; (hi - lo) as usize + 1];
        for (v, c) in self.values.iter().zip(self.counts.iter()) {
            counts[(v - lo) as usize] += c;
        }
        Histogram {
            values: (0..counts.len()).map(|i| lo + i as f64).collect(),
            counts,
            contiguous: true,
        }
    }

    /// Rebin into at most `max_bins` equal-width bins spanning the sample range.
    ///
    /// Each new bin takes the value of the highest original level it holds, so
    /// a threshold chosen on the rebinned histogram maps back to a level of the
    /// samples. An empty bin takes the value of the closest lower bin.
    pub fn compacted(&self, max_bins: usize) -> Histogram {
        if self.len() <= max_bins || max_bins == 0 {
            return self.clone();
        }

        let lo = self.value(0);
        let hi = self.value(self.len() - 1);
        let width = (hi - lo) / max_bins as f64;
        let mut counts = vec![0u64; max_bins];
        let mut values: Vec<Option<f64>> = vec![None; max_bins];
        for (&v, &c) in self.values.iter().zip(self.counts.iter()) {
            let bin = (((v - lo) / width) as usize).min(max_bins - 1);
            counts[bin] += c;
            values[bin] = Some(v);
        }

        let mut last = lo;
        let values = values
            .into_iter()
            .map(|v| {
                last = v.unwrap_or(last);
                last
            })
            .collect();

        Histogram {
            values,
            counts,
            contiguous: false,
        }
    }

    /// Whether the bins are the consecutive integer levels of an integer volume.
    pub fn is_contiguous(&self) -> bool {
        self.contiguous
    }

    /// Min, max, mean, standard deviation and sum of the counted samples.
    ///
    /// An empty histogram yields all-zero statistics.
    pub fn statistics(&self) -> RegionStatistics {
        let mut count = 0u64;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut min = None;
        let mut max = 0.0;
        for (&v, &c) in self.values.iter().zip(self.counts.iter()) {
            if c == 0 {
                continue;
            }
            if min.is_none() {
                min = Some(v);
            }
            max = v;
            count += c;
            sum += v * c as f64;
            sum_sq += v * v * c as f64;
        }

        let Some(min) = min else {
            return RegionStatistics::default();
        };

        let n = count as f64;
        let mean = sum / n;
        let std_dev = if count > 1 {
            ((sum_sq - sum * sum / n) / (n - 1.0)).max(0.0).sqrt()
        } else {
            0.0
        };

        RegionStatistics {
            count,
            min,
            max,
            mean,
            std_dev,
            sum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_histogram_integer() {
        let data = vec![1u16, 4, 4, 2, 100];
        let hist = Histogram::build(&data, |i| i != 4);
        assert_eq!(hist.counts(), &[1, 1, 0, 2]);
        assert_eq!(hist.values(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(hist.bin_of(3.0), Some(2));
        assert_eq!(hist.bin_of(100.0), None);
        assert_eq!(hist.total(), 4);
    }

    #[test]
    fn test_histogram_float() {
        let data = vec![0.5f32, 0.25, 0.5, f32::NAN, 2.0];
        let hist = Histogram::build(&data, |_| true);
        assert_eq!(hist.values(), &[0.25, 0.5, 2.0]);
        assert_eq!(hist.counts(), &[1, 2, 1]);
        assert_eq!(hist.bin_of(2.0), Some(2));
        assert_eq!(hist.bin_of(1.0), None);
    }

    #[test]
    fn test_histogram_statistics() {
        let data = vec![2u8, 4, 4, 4, 5, 5, 7, 9];
        let stats = Histogram::build(&data, |_| true).statistics();
        assert_eq!(stats.count, 8);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_relative_eq!(stats.mean, 5.0);
        assert_relative_eq!(stats.sum, 40.0);
        assert_relative_eq!(stats.std_dev, (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_histogram_empty_statistics() {
        let data = vec![1u8, 2, 3];
        let hist = Histogram::build(&data, |_| false);
        assert!(hist.is_empty());
        assert_eq!(hist.statistics(), RegionStatistics::default());
    }

    #[test]
    fn test_histogram_combine() {
        let data = vec![1u8, 2, 6, 6];
        let a = Histogram::build(&data, |i| i < 2);
        let b = Histogram::build(&data, |i| i >= 2);
        let both = a.combine(&b);
        assert_eq!(both.len(), 6);
        assert_eq!(both.counts(), &[1, 1, 0, 0, 0, 2]);
        assert_eq!(both, Histogram::build(&data, |_| true));
    }

    #[test]
    fn test_histogram_compacted() {
        let data: Vec<u16> = (0..1000).collect();
        let hist = Histogram::build(&data, |_| true).compacted(10);
        assert_eq!(hist.len(), 10);
        assert_eq!(hist.total(), 1000);
        assert_eq!(hist.counts()[0], 100);
        assert_eq!(hist.value(0), 99.0);
        assert_eq!(hist.value(1), 199.0);
        assert_eq!(hist.value(9), 999.0);
        assert!(!hist.is_contiguous());
    }

    #[test]
    fn test_histogram_compacted_empty_bins() {
        let data = vec![0u16, 0, 5, 1000];
        let hist = Histogram::build(&data, |_| true).compacted(4);
        assert_eq!(hist.counts(), &[3, 0, 0, 1]);
        assert_eq!(hist.values(), &[5.0, 5.0, 5.0, 1000.0]);
    }
}
