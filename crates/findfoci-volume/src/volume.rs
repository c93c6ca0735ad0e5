use serde::{Deserialize, Serialize};

use crate::error::VolumeError;

/// Volume size in voxels
///
/// A struct to represent the size of a 2D or 3D volume. A 2D image is a volume
/// with a depth of one.
///
/// # Examples
///
/// ```
/// use findfoci_volume::VolumeSize;
///
/// let size = VolumeSize {
///   width: 10,
///   height: 20,
///   depth: 3,
/// };
///
/// assert_eq!(size.len(), 600);
/// assert_eq!(size.index(1, 2, 1), 200 + 2 * 10 + 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSize {
    /// Width of the volume in voxels
    pub width: usize,
    /// Height of the volume in voxels
    pub height: usize,
    /// Number of z-slices in the volume
    pub depth: usize,
}

impl VolumeSize {
    /// Create the size of a single-slice image.
    pub fn new_2d(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Total number of voxels.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Number of voxels in one z-slice.
    pub fn slice_len(&self) -> usize {
        self.width * self.height
    }

    /// Whether the volume has more than one z-slice.
    pub fn is_3d(&self) -> bool {
        self.depth > 1
    }

    /// Linear index of the voxel at `(x, y, z)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.width * self.height + y * self.width + x
    }

    /// Coordinates `(x, y, z)` of the voxel at the linear index.
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let slice = self.width * self.height;
        let z = index / slice;
        let rem = index % slice;
        (rem % self.width, rem / self.width, z)
    }
}

impl std::fmt::Display for VolumeSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "VolumeSize {{ width: {}, height: {}, depth: {} }}",
            self.width, self.height, self.depth
        )
    }
}

impl From<[usize; 3]> for VolumeSize {
    fn from(size: [usize; 3]) -> Self {
        VolumeSize {
            width: size[0],
            height: size[1],
            depth: size[2],
        }
    }
}

/// Trait for volume sample types.
///
/// Samples are compared with `PartialOrd` and widened to `f64` for arithmetic.
pub trait Pixel: Copy + Default + PartialOrd + Into<f64> + Send + Sync + std::fmt::Debug {
    /// Whether the sample type holds integer values.
    const INTEGER: bool;

    /// Convert a f64 value to the sample type, rounding and clamping integer types.
    fn from_f64(x: f64) -> Self;
}

impl Pixel for u8 {
    const INTEGER: bool = true;

    fn from_f64(x: f64) -> Self {
        x.round().clamp(0.0, u8::MAX as f64) as u8
    }
}

impl Pixel for u16 {
    const INTEGER: bool = true;

    fn from_f64(x: f64) -> Self {
        x.round().clamp(0.0, u16::MAX as f64) as u16
    }
}

impl Pixel for f32 {
    const INTEGER: bool = false;

    fn from_f64(x: f64) -> Self {
        x as f32
    }
}

/// Represents a 2D or 3D grayscale volume.
///
/// The samples are stored in a flat buffer with x varying fastest, then y, then z.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume<T> {
    size: VolumeSize,
    data: Vec<T>,
}

impl<T> Volume<T> {
    /// Create a new volume from sample data.
    ///
    /// # Arguments
    ///
    /// * `size` - The size of the volume in voxels.
    /// * `data` - The samples of the volume in `z, y, x` order.
    ///
    /// # Errors
    ///
    /// If any dimension is zero or the length of the data does not match the
    /// volume size, an error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use findfoci_volume::{Volume, VolumeSize};
    ///
    /// let volume = Volume::<u8>::new(
    ///     VolumeSize { width: 2, height: 1, depth: 2 },
    ///     vec![0, 1, 2, 3],
    /// ).unwrap();
    ///
    /// assert_eq!(volume.get(1, 0, 1), Some(&3));
    /// ```
    pub fn new(size: VolumeSize, data: Vec<T>) -> Result<Self, VolumeError> {
        if size.width == 0 || size.height == 0 || size.depth == 0 {
            return Err(VolumeError::InvalidSize(
                size.width,
                size.height,
                size.depth,
            ));
        }

        if data.len() != size.len() {
            return Err(VolumeError::InvalidDataLength(data.len(), size.len()));
        }

        Ok(Self { size, data })
    }

    /// Create a new volume with the given size filled with `val`.
    pub fn from_size_val(size: VolumeSize, val: T) -> Result<Self, VolumeError>
    where
        T: Clone,
    {
        Self::new(size, vec![val; size.len()])
    }

    /// The size of the volume in voxels.
    pub fn size(&self) -> VolumeSize {
        self.size
    }

    /// The width of the volume.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// The height of the volume.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// The number of z-slices of the volume.
    pub fn depth(&self) -> usize {
        self.size.depth
    }

    /// The samples as a flat slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The samples as a mutable flat slice.
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the volume and return the sample buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// The sample at `(x, y, z)`, or `None` if outside the volume.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&T> {
        if x >= self.size.width || y >= self.size.height || z >= self.size.depth {
            return None;
        }
        self.data.get(self.size.index(x, y, z))
    }

    /// The samples of the z-slice `z`.
    pub fn slice(&self, z: usize) -> Result<&[T], VolumeError> {
        if z >= self.size.depth {
            return Err(VolumeError::VoxelOutOfBounds(0, 0, z));
        }
        let n = self.size.slice_len();
        Ok(&self.data[z * n..(z + 1) * n])
    }
}

impl<T: Pixel> Volume<T> {
    /// The samples widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.iter().map(|&v| v.into()).collect()
    }
}
