use findfoci_volume::{Pixel, Volume};
use rayon::prelude::*;

use crate::{
    cancel::CancelToken,
    error::FociError,
    pipeline::{FindFoci, FociResult},
};

/// Search a batch of volumes on the rayon thread pool.
///
/// Every run owns its own buffers; the results are returned in the order of
/// the input volumes. Cancelling the token aborts the runs still in flight.
pub fn find_foci_batch<T: Pixel>(
    finder: &FindFoci,
    volumes: &[Volume<T>],
    cancel: &CancelToken,
) -> Vec<Result<FociResult, FociError>> {
    volumes
        .par_iter()
        .map(|volume| finder.run_with_cancel(volume, None, None, cancel))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackgroundMethod, FindFociConfig};
    use findfoci_volume::VolumeSize;

    #[test]
    fn test_batch_matches_sequential() -> Result<(), FociError> {
        let finder = FindFoci::new(FindFociConfig {
            background_method: BackgroundMethod::Absolute,
            background_parameter: 1.0,
            ..Default::default()
        })?;

        let size = VolumeSize::new_2d(8, 8);
        let volumes = (0..6)
            .map(|k| {
                let mut data = vec![0u8; size.len()];
                data[size.index(1 + k, 2, 0)] = 10;
                data[size.index(6, 6, 0)] = 4;
                Volume::new(size, data)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let results = find_foci_batch(&finder, &volumes, &CancelToken::new());
        assert_eq!(results.len(), volumes.len());
        for (k, (result, volume)) in results.into_iter().zip(volumes.iter()).enumerate() {
            let result = result?;
            let expected = finder.run(volume, None, None)?;
            assert_eq!(result.peaks, expected.peaks);
            assert_eq!(result.peaks[0].x, 1 + k);
        }
        Ok(())
    }

    #[test]
    fn test_batch_cancelled() -> Result<(), FociError> {
        let finder = FindFoci::new(FindFociConfig::default())?;
        let volumes = vec![Volume::from_size_val(VolumeSize::new_2d(4, 4), 1.0f32)?; 3];
        let cancel = CancelToken::new();
        cancel.cancel();
        let results = find_foci_batch(&finder, &volumes, &cancel);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(FociError::Cancelled))));
        Ok(())
    }
}
