use findfoci_volume::{Pixel, Volume};

use crate::error::FociError;

/// Create a gaussian blur kernel.
///
/// # Arguments
///
/// * `kernel_size` - The size of the kernel.
/// * `sigma` - The sigma of the gaussian kernel.
///
/// # Returns
///
/// A normalized vector of the kernel.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f64) -> Vec<f64> {
    let mut kernel = Vec::with_capacity(kernel_size);

    let mean = (kernel_size - 1) as f64 / 2.0;
    let sigma_sq = sigma * sigma;

    // compute the kernel
    for i in 0..kernel_size {
        let x = i as f64 - mean;
        kernel.push((-(x * x) / (2.0 * sigma_sq)).exp());
    }

    // normalize the kernel
    let norm = kernel.iter().sum::<f64>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// Blur every z-slice of a volume with a 2D Gaussian.
///
/// The kernel radius is `ceil(3 * sigma)` and the border samples are replicated.
/// Integer volumes are rounded back to their sample type.
///
/// # Example
///
/// ```
/// use findfoci::blur::gaussian_blur;
/// use findfoci_volume::{Volume, VolumeSize};
///
/// let volume = Volume::new(VolumeSize::new_2d(3, 3), vec![0.0f32, 0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0, 0.0])?;
/// let blurred = gaussian_blur(&volume, 1.0)?;
///
/// assert!(blurred.as_slice()[4] < 9.0);
/// assert!(blurred.as_slice()[0] > 0.0);
/// # Ok::<(), findfoci::error::FociError>(())
/// ```
pub fn gaussian_blur<T: Pixel>(src: &Volume<T>, sigma: f64) -> Result<Volume<T>, FociError> {
    if !(sigma > 0.0 && sigma.is_finite()) {
        return Err(FociError::InvalidConfig(format!(
            "gaussian_blur sigma must be positive, got {sigma}"
        )));
    }

    let radius = (3.0 * sigma).ceil() as usize;
    let kernel = gaussian_kernel_1d(2 * radius + 1, sigma);
    let (width, height) = (src.width(), src.height());
    let slice_len = width * height;

    let mut out = Vec::with_capacity(src.size().len());
    let mut temp = vec![0.0; slice_len];
    for slice in src.as_slice().chunks_exact(slice_len) {
        // apply the horizontal filter
        for y in 0..height {
            let row = &slice[y * width..(y + 1) * width];
            for x in 0..width {
                let mut sum = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    let x_pos = (x + k).saturating_sub(radius).min(width - 1);
                    sum += Into::<f64>::into(row[x_pos]) * w;
                }
                temp[y * width + x] = sum;
            }
        }

        // apply the vertical filter
        for y in 0..height {
            for x in 0..width {
                let mut sum = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    let y_pos = (y + k).saturating_sub(radius).min(height - 1);
                    sum += temp[y_pos * width + x] * w;
                }
                out.push(T::from_f64(sum));
            }
        }
    }

    Ok(Volume::new(src.size(), out)?)
}
