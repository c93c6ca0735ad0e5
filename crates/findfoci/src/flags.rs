//! Per-pixel bit flags used by the search stages.

/// Outside the searched region, or not a number.
pub const EXCLUDED: u16 = 1;
/// Seed voxel of a local maximum.
pub const MAXIMUM: u16 = 1 << 1;
/// Queued on the current work list.
pub const LISTED: u16 = 1 << 2;
/// Member of the plateau of an accepted maximum.
pub const MAX_AREA: u16 = 1 << 3;
/// Already examined as part of a plateau.
pub const PLATEAU: u16 = 1 << 4;
/// Assigned to a peak region.
pub const IN_REGION: u16 = 1 << 5;
/// Touches a pixel of another peak region.
pub const SADDLE_CANDIDATE: u16 = 1 << 6;
/// At or below the highest saddle of its peak.
pub const BELOW_SADDLE: u16 = 1 << 7;
