use findfoci_volume::VolumeError;

/// An error type for the foci search.
#[derive(thiserror::Error, Debug)]
pub enum FociError {
    /// Error coming from the volume containers.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// Error when a configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error when a configuration document cannot be parsed.
    #[error("Failed to parse configuration")]
    ConfigParse(#[from] serde_json::Error),

    /// Error when the mask volume does not match the searched volume.
    #[error("Mask size ({0}, {1}, {2}) does not match the volume size ({3}, {4}, {5})")]
    MaskSizeMismatch(usize, usize, usize, usize, usize, usize),

    /// Error when Gaussian centroid fitting is requested but not compiled in.
    #[error("Gaussian fitting is not available; enable the `gaussian-fit` feature")]
    GaussianFitUnavailable,

    /// Error when the number of candidate maxima exceeds the configured capacity.
    #[error("Too many candidate maxima ({0}), the capacity is {1}")]
    TooManyMaxima(usize, usize),

    /// Error when the number of labels exceeds what the output mask can represent.
    #[error("Too many labels ({0}) for the output mask, the capacity is {1}")]
    TooManyLabels(usize, usize),

    /// Error when the run was cancelled by the caller.
    #[error("The search was cancelled")]
    Cancelled,
}
