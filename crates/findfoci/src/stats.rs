use findfoci_volume::Pixel;
use serde::{Deserialize, Serialize};

use crate::{
    config::{BackgroundMethod, FindFociConfig, PeakHeightMethod, SearchMethod},
    histogram::{Histogram, RegionStatistics},
};

/// Which pixels feed the background statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatisticsScope {
    /// Pixels inside the analysis region.
    #[default]
    Inside,
    /// Pixels outside the analysis region.
    Outside,
    /// All pixels.
    Both,
}

impl StatisticsScope {
    /// Resolve the scope from the inside/outside option flags.
    ///
    /// With neither flag set the inside pixels are used.
    pub fn from_flags(inside: bool, outside: bool) -> Self {
        match (inside, outside) {
            (true, true) => StatisticsScope::Both,
            (false, true) => StatisticsScope::Outside,
            _ => StatisticsScope::Inside,
        }
    }
}

/// Global statistics of a search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Statistics of the searched (included) pixels.
    pub region: RegionStatistics,
    /// Statistics of the pixels outside the searched region.
    pub outside: RegionStatistics,
    /// Statistics of the pixels selected by the background scope.
    pub background_region: RegionStatistics,
    /// Scope used for the background statistics.
    pub scope: StatisticsScope,
    /// Resolved background level.
    pub background: f64,
    /// Whether thresholds are rounded to integer levels.
    pub integer: bool,
}

/// Histograms of the pixels inside and outside the searched region.
pub struct StatisticsEngine {
    inside: Histogram,
    outside: Histogram,
    integer: bool,
}

impl StatisticsEngine {
    /// Histogram a volume; `excluded` marks the pixels outside the searched region.
    pub fn new<T: Pixel>(data: &[T], excluded: impl Fn(usize) -> bool) -> Self {
        Self {
            inside: Histogram::build(data, |i| !excluded(i)),
            outside: Histogram::build(data, &excluded),
            integer: T::INTEGER,
        }
    }

    /// Histogram of the searched pixels.
    pub fn inside(&self) -> &Histogram {
        &self.inside
    }

    /// Histogram of the selected background scope.
    pub fn scoped(&self, scope: StatisticsScope) -> Histogram {
        match scope {
            StatisticsScope::Inside => self.inside.clone(),
            StatisticsScope::Outside => self.outside.clone(),
            StatisticsScope::Both => self.inside.combine(&self.outside),
        }
    }

    /// Compute the statistics and resolve the background level.
    pub fn statistics(&self, config: &FindFociConfig) -> Statistics {
        let scope = StatisticsScope::from_flags(
            config.options.stats_inside,
            config.options.stats_outside,
        );
        let scoped = self.scoped(scope);

        let mut stats = Statistics {
            region: self.inside.statistics(),
            outside: self.outside.statistics(),
            background_region: scoped.statistics(),
            scope,
            background: 0.0,
            integer: self.integer,
        };

        let background = match config.background_method {
            BackgroundMethod::Absolute => config.background_parameter,
            BackgroundMethod::Mean => stats.background_region.mean,
            BackgroundMethod::StdDevAboveMean => {
                stats.background_region.mean
                    + config.background_parameter.max(0.0) * stats.background_region.std_dev
            }
            BackgroundMethod::AutoThreshold => {
                config.auto_threshold_method.threshold_value(&scoped)
            }
            BackgroundMethod::MinRoi => stats.region.min,
            BackgroundMethod::None => 0.0,
        };
        stats.background = stats.round(background);
        stats
    }
}

impl Statistics {
    /// Round a level for integer volumes.
    pub fn round(&self, v: f64) -> f64 {
        if self.integer {
            v.round()
        } else {
            v
        }
    }

    /// The level down to which a peak with seed value `v0` grows.
    ///
    /// # Example
    ///
    /// ```
    /// use findfoci::config::SearchMethod;
    /// use findfoci::stats::Statistics;
    ///
    /// let stats = Statistics { background: 10.0, integer: true, ..Default::default() };
    ///
    /// assert_eq!(stats.search_threshold(SearchMethod::AboveBackground, 0.3, 50.0), 10.0);
    /// assert_eq!(stats.search_threshold(SearchMethod::FractionOfPeakMinusBackground, 0.3, 50.0), 22.0);
    /// assert_eq!(stats.search_threshold(SearchMethod::HalfPeakValue, 0.3, 51.0), 31.0);
    /// ```
    pub fn search_threshold(&self, method: SearchMethod, parameter: f64, v0: f64) -> f64 {
        let background = self.background;
        let level = match method {
            SearchMethod::AboveBackground => background,
            SearchMethod::FractionOfPeakMinusBackground => {
                background + parameter.max(0.0) * (v0 - background)
            }
            SearchMethod::HalfPeakValue => background + 0.5 * (v0 - background),
        };
        self.round(level)
    }

    /// The minimum height of a peak with value `v0` above its highest saddle.
    ///
    /// The height is never below one.
    pub fn peak_height_threshold(&self, method: PeakHeightMethod, parameter: f64, v0: f64) -> f64 {
        let height = match method {
            PeakHeightMethod::Absolute => parameter,
            PeakHeightMethod::Relative => v0 * parameter,
            PeakHeightMethod::RelativeAboveBackground => (v0 - self.background) * parameter,
        };
        self.round(height).max(1.0)
    }
}
