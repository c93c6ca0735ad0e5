/// An error type for the volume module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum VolumeError {
    /// Error when a dimension of the volume is zero.
    #[error("Invalid volume size ({0}, {1}, {2})")]
    InvalidSize(usize, usize, usize),

    /// Error when the data length does not match the volume size.
    #[error("Data length ({0}) does not match the volume size ({1})")]
    InvalidDataLength(usize, usize),

    /// Error when two volumes do not share the same size.
    #[error("Volume size mismatch: ({0}, {1}, {2}) vs ({3}, {4}, {5})")]
    SizeMismatch(usize, usize, usize, usize, usize, usize),

    /// Error when a voxel index is outside the volume.
    #[error("Voxel ({0}, {1}, {2}) is out of bounds")]
    VoxelOutOfBounds(usize, usize, usize),

    /// Error when the region of interest does not fit into the volume.
    #[error("Region of interest {0} does not fit into a {1}x{2} slice")]
    RoiOutOfBounds(String, usize, usize),

    /// Error when the shape mask of a region of interest has the wrong length.
    #[error("Region of interest mask length ({0}) does not match its bounds ({1})")]
    InvalidRoiMask(usize, usize),
}
