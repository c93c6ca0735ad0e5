use serde::{Deserialize, Serialize};

use crate::{error::FociError, threshold::AutoThresholdMethod};

/// Method used to resolve the background level of the volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackgroundMethod {
    /// The background parameter is used as an absolute level.
    Absolute,
    /// The mean of the background region.
    Mean,
    /// The mean of the background region plus `parameter` standard deviations.
    StdDevAboveMean,
    /// An automatic threshold computed from the background region histogram.
    #[default]
    AutoThreshold,
    /// The minimum of the searched region.
    MinRoi,
    /// A background of zero.
    None,
}

/// Method used to resolve the level at which each peak region stops growing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMethod {
    /// Grow down to the background level.
    #[default]
    AboveBackground,
    /// Grow down to `background + parameter * (peak - background)`.
    FractionOfPeakMinusBackground,
    /// Grow down to the midpoint between the peak and the background.
    HalfPeakValue,
}

/// Method used to compute the minimum height of a peak above its highest saddle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakHeightMethod {
    /// The parameter is an absolute height.
    Absolute,
    /// The parameter is a fraction of the peak value.
    Relative,
    /// The parameter is a fraction of the peak height above background.
    #[default]
    RelativeAboveBackground,
}

/// Key used to order the final peak list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMethod {
    /// Number of pixels in the peak region.
    Count,
    /// Summed intensity of the peak region.
    #[default]
    Intensity,
    /// Maximum value of the peak.
    MaxValue,
    /// Average intensity of the peak region.
    AverageIntensity,
    /// Intensity above the background.
    IntensityMinusBackground,
    /// Average intensity above the background.
    AverageIntensityMinusBackground,
    /// The x coordinate.
    X,
    /// The y coordinate.
    Y,
    /// The z coordinate.
    Z,
    /// The highest saddle value.
    SaddleHeight,
    /// Number of pixels above the highest saddle.
    CountAboveSaddle,
    /// Summed intensity above the highest saddle.
    IntensityAboveSaddle,
    /// Height of the peak above its highest saddle.
    AbsoluteHeight,
    /// Height above the highest saddle relative to the height above background.
    RelativeHeight,
    /// The peak id assigned by the maxima search.
    PeakId,
    /// The coordinates combined in x, y, z order.
    Xyz,
    /// Intensity above the minimum of the searched region.
    IntensityMinusMin,
    /// Average intensity above the minimum of the searched region.
    AverageIntensityMinusMin,
}

impl SortMethod {
    /// The order used when the caller does not override it.
    ///
    /// Statistics sort with the largest first; coordinates and ids sort ascending.
    pub fn natural_order(&self) -> SortOrder {
        match self {
            SortMethod::X | SortMethod::Y | SortMethod::Z | SortMethod::PeakId | SortMethod::Xyz => {
                SortOrder::Ascending
            }
            _ => SortOrder::Descending,
        }
    }
}

/// Direction of the final ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest key first.
    Ascending,
    /// Largest key first.
    Descending,
}

/// Method used to report the coordinate of each peak.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CentroidMethod {
    /// The seed coordinate found by the maxima search.
    #[default]
    SearchImage,
    /// The tie-broken maximum of the above-saddle region in the search image.
    MaxValueSearch,
    /// The tie-broken maximum of the above-saddle region in the original image.
    MaxValueOriginal,
    /// Iterative centre of mass in the search image.
    CentreOfMassSearch,
    /// Iterative centre of mass in the original image.
    CentreOfMassOriginal,
    /// 2D Gaussian fit of the z-projection of the search image.
    GaussianSearch,
    /// 2D Gaussian fit of the z-projection of the original image.
    GaussianOriginal,
}

impl CentroidMethod {
    /// Whether the method measures the unblurred volume.
    pub fn uses_original(&self) -> bool {
        matches!(
            self,
            CentroidMethod::MaxValueOriginal
                | CentroidMethod::CentreOfMassOriginal
                | CentroidMethod::GaussianOriginal
        )
    }

    /// Whether the method requires Gaussian fitting.
    pub fn is_gaussian(&self) -> bool {
        matches!(
            self,
            CentroidMethod::GaussianSearch | CentroidMethod::GaussianOriginal
        )
    }
}

/// Kind of label volume to render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskKind {
    /// Each region gets its rank value.
    #[default]
    Peaks,
    /// Each region is auto-thresholded into border, below and above values.
    Threshold,
}

/// Sub-region of each peak kept in the label volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskClip {
    /// The whole region.
    #[default]
    None,
    /// Pixels above the highest saddle.
    AboveSaddle,
    /// The brightest pixels holding a fraction of the region intensity.
    FractionOfIntensity,
    /// Pixels above a fraction of the height above background.
    FractionOfHeight,
}

/// Options for the label volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskOptions {
    /// Rendering mode.
    pub kind: MaskKind,
    /// Region clipping.
    pub clip: MaskClip,
    /// Stamp an apex marker at each peak coordinate.
    pub show_apex: bool,
}

/// Optional behaviours of the search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionFlags {
    /// Merge peaks whose size above the highest saddle is below the minimum size.
    pub minimum_above_saddle: bool,
    /// Only count above-saddle pixels connected to the peak seed.
    pub contiguous_above_saddle: bool,
    /// Use the pixels inside the mask for background statistics.
    pub stats_inside: bool,
    /// Use the pixels outside the mask for background statistics.
    pub stats_outside: bool,
    /// Discard peaks touching the analysis bounds.
    pub remove_edge_maxima: bool,
    /// Number the connected objects and record the object of each peak.
    pub object_analysis: bool,
}

/// Configuration of a single foci search.
///
/// # Examples
///
/// ```
/// use findfoci::config::{BackgroundMethod, FindFociConfig};
///
/// let config = FindFociConfig::from_json(r#"{"background_method": "Mean", "min_size": 3}"#).unwrap();
/// assert_eq!(config.background_method, BackgroundMethod::Mean);
/// assert_eq!(config.min_size, 3);
/// assert_eq!(config.max_peaks, 50);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindFociConfig {
    /// Method for the background level.
    pub background_method: BackgroundMethod,
    /// Parameter of the background method.
    pub background_parameter: f64,
    /// Threshold method for automatic background levels and threshold masks.
    pub auto_threshold_method: AutoThresholdMethod,
    /// Method for the per-peak growth stop level.
    pub search_method: SearchMethod,
    /// Parameter of the search method.
    pub search_parameter: f64,
    /// Maximum number of peaks reported.
    pub max_peaks: usize,
    /// Minimum number of pixels in a peak region.
    pub min_size: usize,
    /// Method for the minimum peak height above its saddle.
    pub peak_height_method: PeakHeightMethod,
    /// Parameter of the peak height method.
    pub peak_height_parameter: f64,
    /// Key of the final ordering.
    pub sort_method: SortMethod,
    /// Override of the natural order of the sort key.
    pub sort_order: Option<SortOrder>,
    /// Method used to report the peak coordinate.
    pub centroid_method: CentroidMethod,
    /// Half-window for the centre of mass, or projection for the Gaussian fit
    /// (0 for a maximum projection, otherwise an average projection).
    pub centroid_parameter: f64,
    /// Fraction used by the fractional mask clipping modes.
    pub fraction_parameter: f64,
    /// Optional behaviours.
    pub options: OptionFlags,
    /// Label volume rendering, if requested.
    pub mask: Option<MaskOptions>,
    /// Sigma of a Gaussian blur applied before the search.
    pub gaussian_blur: Option<f64>,
    /// Maximum number of candidate maxima before the run aborts.
    pub maxima_capacity: usize,
}

impl Default for FindFociConfig {
    fn default() -> Self {
        Self {
            background_method: BackgroundMethod::AutoThreshold,
            background_parameter: 3.0,
            auto_threshold_method: AutoThresholdMethod::Otsu,
            search_method: SearchMethod::AboveBackground,
            search_parameter: 0.3,
            max_peaks: 50,
            min_size: 1,
            peak_height_method: PeakHeightMethod::RelativeAboveBackground,
            peak_height_parameter: 0.5,
            sort_method: SortMethod::Intensity,
            sort_order: None,
            centroid_method: CentroidMethod::SearchImage,
            centroid_parameter: 2.0,
            fraction_parameter: 0.5,
            options: OptionFlags {
                stats_inside: true,
                ..Default::default()
            },
            mask: None,
            gaussian_blur: None,
            maxima_capacity: 1_000_000,
        }
    }
}

impl FindFociConfig {
    /// Parse a configuration from a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, FociError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration to a JSON document.
    pub fn to_json(&self) -> Result<String, FociError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The order of the final peak list.
    pub fn resolved_sort_order(&self) -> SortOrder {
        self.sort_order
            .unwrap_or_else(|| self.sort_method.natural_order())
    }

    /// Check the configuration before any stage runs.
    ///
    /// # Errors
    ///
    /// Returns [`FociError::InvalidConfig`] for out-of-range parameters and
    /// [`FociError::GaussianFitUnavailable`] when a Gaussian centroid is requested
    /// without the `gaussian-fit` feature.
    pub fn validate(&self) -> Result<(), FociError> {
        if self.max_peaks == 0 {
            return Err(FociError::InvalidConfig(
                "max_peaks must be at least 1".to_string(),
            ));
        }

        if self.maxima_capacity == 0 {
            return Err(FociError::InvalidConfig(
                "maxima_capacity must be at least 1".to_string(),
            ));
        }

        if !self.background_parameter.is_finite() {
            return Err(FociError::InvalidConfig(format!(
                "background_parameter must be finite, got {}",
                self.background_parameter
            )));
        }

        if self.search_method == SearchMethod::FractionOfPeakMinusBackground
            && !(0.0..=1.0).contains(&self.search_parameter)
        {
            return Err(FociError::InvalidConfig(format!(
                "search_parameter must be within [0, 1], got {}",
                self.search_parameter
            )));
        }

        if !(self.peak_height_parameter >= 0.0 && self.peak_height_parameter.is_finite()) {
            return Err(FociError::InvalidConfig(format!(
                "peak_height_parameter must be a non-negative number, got {}",
                self.peak_height_parameter
            )));
        }

        if !(self.centroid_parameter >= 0.0 && self.centroid_parameter.is_finite()) {
            return Err(FociError::InvalidConfig(format!(
                "centroid_parameter must be a non-negative number, got {}",
                self.centroid_parameter
            )));
        }

        if let Some(mask) = &self.mask {
            if matches!(
                mask.clip,
                MaskClip::FractionOfIntensity | MaskClip::FractionOfHeight
            ) && !(self.fraction_parameter > 0.0 && self.fraction_parameter <= 1.0)
            {
                return Err(FociError::InvalidConfig(format!(
                    "fraction_parameter must be within (0, 1], got {}",
                    self.fraction_parameter
                )));
            }
        }

        if let Some(sigma) = self.gaussian_blur {
            if !(sigma > 0.0 && sigma.is_finite()) {
                return Err(FociError::InvalidConfig(format!(
                    "gaussian_blur sigma must be positive, got {sigma}"
                )));
            }
        }

        if self.centroid_method.is_gaussian() && !cfg!(feature = "gaussian-fit") {
            return Err(FociError::GaussianFitUnavailable);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_is_valid() -> Result<(), FociError> {
        let config = FindFociConfig::default();
        config.validate()?;
        assert!(config.options.stats_inside);
        assert_eq!(config.resolved_sort_order(), SortOrder::Descending);
        Ok(())
    }

    #[test]
    fn test_config_json_roundtrip() -> Result<(), FociError> {
        let config = FindFociConfig {
            sort_method: SortMethod::Xyz,
            mask: Some(MaskOptions {
                kind: MaskKind::Threshold,
                clip: MaskClip::AboveSaddle,
                show_apex: true,
            }),
            gaussian_blur: Some(1.5),
            ..Default::default()
        };
        let parsed = FindFociConfig::from_json(&config.to_json()?)?;
        assert_eq!(parsed, config);
        assert_eq!(parsed.resolved_sort_order(), SortOrder::Ascending);
        Ok(())
    }

    #[test]
    fn test_config_json_threshold_name() -> Result<(), FociError> {
        let config = FindFociConfig::from_json(r#"{"auto_threshold_method": "Otsu_3_Level"}"#)?;
        assert_eq!(config.auto_threshold_method, AutoThresholdMethod::MultiOtsu3);
        Ok(())
    }

    #[test]
    fn test_config_invalid() {
        let config = FindFociConfig {
            search_method: SearchMethod::FractionOfPeakMinusBackground,
            search_parameter: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FociError::InvalidConfig(_))
        ));

        let config = FindFociConfig {
            gaussian_blur: Some(-1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(matches!(
            FindFociConfig::from_json("{\"max_peaks\": \"many\"}"),
            Err(FociError::ConfigParse(_))
        ));
    }

    #[cfg(not(feature = "gaussian-fit"))]
    #[test]
    fn test_config_gaussian_unavailable() {
        let config = FindFociConfig {
            centroid_method: CentroidMethod::GaussianSearch,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FociError::GaussianFitUnavailable)
        ));
    }
}
