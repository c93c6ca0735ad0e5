#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// batch processing on the rayon thread pool.
pub mod batch;

/// gaussian pre-filter module.
pub mod blur;

/// cooperative cancellation of a running search.
pub mod cancel;

/// peak coordinate refinement module.
pub mod centroid;

/// search configuration module.
pub mod config;

/// removal of peaks touching the analysis bounds.
pub mod edge;

/// Error types for the foci search.
pub mod error;

/// per-pixel flag bits of the search state.
pub(crate) mod flags;

/// 2D gaussian fitting module.
#[cfg(feature = "gaussian-fit")]
pub mod gauss_fit;

/// region growing module.
pub mod grow;

/// compute volume histogram module.
pub mod histogram;

/// label volume rendering module.
pub mod mask;

/// local maxima detection module.
pub mod maxima;

/// peak merging module.
pub mod merge;

/// neighbour offsets of 2D and 3D volumes.
pub mod neighbors;

/// connected objects and mask states of the peaks.
pub mod objects;

/// peak record module.
pub mod peak;

/// the full search pipeline.
pub mod pipeline;

/// region pruning and measurement module.
pub mod prune;

/// named result store owned by the caller.
pub mod registry;

/// peak id remapping module.
pub mod remap;

/// saddle detection module.
pub mod saddle;

/// result ordering module.
pub mod sort;

/// working buffers of a search.
pub mod state;

/// global statistics and background resolution.
pub mod stats;

/// automatic threshold methods.
pub mod threshold;

pub use crate::config::FindFociConfig;
pub use crate::error::FociError;
pub use crate::pipeline::{FindFoci, FociResult};
