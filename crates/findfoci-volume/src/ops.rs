use crate::{Volume, VolumeError};

/// Cast the samples of a volume to a different type.
///
/// # Arguments
///
/// * `src` - The source volume.
/// * `scale` - The scale to multiply the samples with after the cast.
///
/// Example:
///
/// ```
/// use findfoci_volume::{Volume, VolumeSize};
/// use findfoci_volume::ops::cast_and_scale;
///
/// let volume = Volume::<u8>::new(VolumeSize::new_2d(2, 1), vec![0u8, 255]).unwrap();
/// let scaled = cast_and_scale::<u8, f32>(&volume, 1. / 255.0).unwrap();
///
/// assert_eq!(scaled.as_slice(), &[0.0f32, 1.0]);
/// ```
pub fn cast_and_scale<T, U>(src: &Volume<T>, scale: U) -> Result<Volume<U>, VolumeError>
where
    T: Copy + num_traits::NumCast,
    U: Copy + num_traits::NumCast + std::ops::Mul<U, Output = U>,
{
    let data = src
        .as_slice()
        .iter()
        .map(|&v| U::from(v).map(|x| x * scale))
        .collect::<Option<Vec<U>>>()
        .ok_or(VolumeError::InvalidDataLength(0, src.size().len()))?;

    Volume::new(src.size(), data)
}

/// Check that two volumes share the xy size and that `other` has either one
/// z-slice or as many z-slices as `volume`.
pub fn check_mask_size<T, U>(volume: &Volume<T>, other: &Volume<U>) -> Result<(), VolumeError> {
    let (a, b) = (volume.size(), other.size());
    if a.width != b.width || a.height != b.height || (b.depth != 1 && b.depth != a.depth) {
        return Err(VolumeError::SizeMismatch(
            a.width, a.height, a.depth, b.width, b.height, b.depth,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VolumeSize;

    #[test]
    fn test_cast_and_scale() -> Result<(), VolumeError> {
        let volume = Volume::<f32>::new(VolumeSize::new_2d(3, 1), vec![0.5, 1.0, 2.0])?;
        let cast = cast_and_scale::<f32, u16>(&volume, 10)?;
        assert_eq!(cast.as_slice(), &[0, 10, 20]);
        Ok(())
    }

    #[test]
    fn test_check_mask_size() -> Result<(), VolumeError> {
        let volume = Volume::<u8>::from_size_val([4, 3, 5].into(), 0)?;
        let single = Volume::<u8>::from_size_val([4, 3, 1].into(), 1)?;
        let full = Volume::<u8>::from_size_val([4, 3, 5].into(), 1)?;
        let wrong = Volume::<u8>::from_size_val([4, 3, 2].into(), 1)?;
        check_mask_size(&volume, &single)?;
        check_mask_size(&volume, &full)?;
        assert!(check_mask_size(&volume, &wrong).is_err());
        Ok(())
    }
}
