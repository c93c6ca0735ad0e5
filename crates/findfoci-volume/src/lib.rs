#![deny(missing_docs)]
//! Volume types and traits for 2D/3D grayscale intensity data

/// volume representation for 2D/3D intensity data.
pub mod volume;

/// Error types for the volume module.
pub mod error;

/// region of interest bounds.
pub mod roi;

/// basic operations on volumes.
pub mod ops;

pub use crate::error::VolumeError;
pub use crate::roi::Roi;
pub use crate::volume::{Pixel, Volume, VolumeSize};
