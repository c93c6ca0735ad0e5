use findfoci::config::{
    BackgroundMethod, CentroidMethod, FindFociConfig, MaskClip, MaskOptions, OptionFlags,
    PeakHeightMethod, SortMethod,
};
use findfoci::error::FociError;
use findfoci::mask::LabelVolume;
use findfoci::pipeline::FindFoci;
use findfoci::remap::IdRemap;
use findfoci_volume::{Volume, VolumeSize};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn absolute(level: f64) -> FindFociConfig {
    FindFociConfig {
        background_method: BackgroundMethod::Absolute,
        background_parameter: level,
        ..Default::default()
    }
}

fn spots_volume(seed: u64) -> Result<Volume<u8>, FociError> {
    let size = VolumeSize::new_2d(48, 40);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data: Vec<f64> = (0..size.len()).map(|_| rng.random_range(0.0..8.0)).collect();
    for _ in 0..12 {
        let cx = rng.random_range(0.0..48.0);
        let cy = rng.random_range(0.0..40.0);
        let amplitude = rng.random_range(40.0..200.0);
        for (i, v) in data.iter_mut().enumerate() {
            let (x, y, _) = size.coords(i);
            let d2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
            *v += amplitude * (-d2 / 6.0).exp();
        }
    }
    let data = data.into_iter().map(|v| v.round().min(255.0) as u8).collect();
    Ok(Volume::new(size, data)?)
}

fn label_counts(labels: &LabelVolume, n: usize) -> Vec<usize> {
    let mut counts = vec![0; n + 1];
    for label in labels.to_u32_vec() {
        if (label as usize) <= n {
            counts[label as usize] += 1;
        }
    }
    counts
}

#[rustfmt::skip]
fn two_peaks_with_ridge() -> Vec<u8> {
    vec![
        0, 0, 0, 0, 0,
        0, 10, 0, 0, 0,
        0, 0, 3, 0, 0,
        0, 0, 0, 10, 0,
        0, 0, 0, 0, 0,
    ]
}

#[test]
fn two_peaks_joined_by_a_ridge() -> Result<(), FociError> {
    let volume = Volume::new(VolumeSize::new_2d(5, 5), two_peaks_with_ridge())?;

    let result = FindFoci::new(absolute(1.0))?.run(&volume, None, None)?;
    assert_eq!(result.peaks.len(), 2);
    for peak in &result.peaks {
        assert!(peak.has_saddle());
        assert_eq!(peak.highest_saddle_value, 3.0);
        assert_eq!(peak.max_value, 10.0);
    }
    let total: usize = result.peaks.iter().map(|p| p.count).sum();
    assert_eq!(total, 3);

    let merged = FindFoci::new(FindFociConfig {
        min_size: 2,
        ..absolute(1.0)
    })?
    .run(&volume, None, None)?;
    assert_eq!(merged.peaks.len(), 1);
    assert_eq!(merged.peaks[0].count, 3);
    assert_eq!(merged.peaks[0].intensity, 23.0);
    assert!(!merged.peaks[0].has_saddle());
    Ok(())
}

#[test]
fn plateau_column_reports_middle_slice() -> Result<(), FociError> {
    let size = VolumeSize {
        width: 1,
        height: 1,
        depth: 3,
    };
    let volume = Volume::new(size, vec![5u8, 5, 5])?;
    let result = FindFoci::new(absolute(0.0))?.run(&volume, None, None)?;
    assert_eq!(result.peaks.len(), 1);
    assert_eq!((result.peaks[0].x, result.peaks[0].y, result.peaks[0].z), (0, 0, 1));
    assert_eq!(result.peaks[0].count, 3);
    Ok(())
}

#[test]
fn edge_maxima_are_removed() -> Result<(), FociError> {
    let size = VolumeSize::new_2d(6, 6);
    let mut data = vec![0u8; size.len()];
    data[size.index(2, 2, 0)] = 9;
    data[size.index(5, 3, 0)] = 7;
    let volume = Volume::new(size, data)?;

    let kept = FindFoci::new(absolute(1.0))?.run(&volume, None, None)?;
    assert_eq!(kept.peaks.len(), 2);

    let finder = FindFoci::new(FindFociConfig {
        options: OptionFlags {
            remove_edge_maxima: true,
            ..absolute(1.0).options
        },
        ..absolute(1.0)
    })?;
    let result = finder.run(&volume, None, None)?;
    assert_eq!(result.peaks.len(), 1);
    assert_eq!((result.peaks[0].x, result.peaks[0].y), (2, 2));
    Ok(())
}

#[test]
fn centre_of_mass_of_flat_top() -> Result<(), FociError> {
    let size = VolumeSize::new_2d(5, 5);
    let mut data = vec![0u8; size.len()];
    for y in 1..4 {
        for x in 1..4 {
            data[size.index(x, y, 0)] = 5;
        }
    }
    let volume = Volume::new(size, data)?;
    let finder = FindFoci::new(FindFociConfig {
        centroid_method: CentroidMethod::CentreOfMassSearch,
        centroid_parameter: 2.0,
        ..absolute(1.0)
    })?;
    let result = finder.run(&volume, None, None)?;
    assert_eq!(result.peaks.len(), 1);
    assert_eq!((result.peaks[0].x, result.peaks[0].y), (2, 2));
    assert_eq!(result.peaks[0].count, 9);
    Ok(())
}

#[test]
fn pixel_counts_partition_the_volume() -> Result<(), FociError> {
    let volume = spots_volume(7)?;
    let finder = FindFoci::new(FindFociConfig {
        max_peaks: 10_000,
        mask: Some(MaskOptions::default()),
        ..Default::default()
    })?;
    let result = finder.run(&volume, None, None)?;
    assert!(!result.peaks.is_empty());

    let n = result.peaks.len();
    let labels = result.label_volume.ok_or(FociError::TooManyLabels(n, 0))?;
    let counts = label_counts(&labels, n);
    let labelled: usize = counts[1..].iter().sum();
    let peak_total: usize = result.peaks.iter().map(|p| p.count).sum();
    assert_eq!(labelled, peak_total);
    assert_eq!(labelled + counts[0], volume.size().len());

    for (i, peak) in result.peaks.iter().enumerate() {
        assert_eq!(counts[n - i], peak.count);
    }
    Ok(())
}

#[test]
fn above_saddle_mask_matches_counts() -> Result<(), FociError> {
    let volume = spots_volume(11)?;
    let finder = FindFoci::new(FindFociConfig {
        max_peaks: 10_000,
        mask: Some(MaskOptions {
            clip: MaskClip::AboveSaddle,
            ..Default::default()
        }),
        ..Default::default()
    })?;
    let result = finder.run(&volume, None, None)?;
    let n = result.peaks.len();
    let labels = result.label_volume.ok_or(FociError::TooManyLabels(n, 0))?;
    let counts = label_counts(&labels, n);
    for (i, peak) in result.peaks.iter().enumerate() {
        assert_eq!(counts[n - i], peak.count_above_saddle);
        assert!(peak.count_above_saddle <= peak.count);
    }
    Ok(())
}

#[test]
fn merged_peaks_clear_the_height_threshold() -> Result<(), FociError> {
    for seed in [1, 2, 3] {
        let volume = spots_volume(seed)?;
        let config = FindFociConfig {
            max_peaks: 10_000,
            ..Default::default()
        };
        let result = FindFoci::new(config.clone())?.run(&volume, None, None)?;
        for peak in result.peaks.iter().filter(|p| p.has_saddle()) {
            let threshold = result.statistics.peak_height_threshold(
                config.peak_height_method,
                config.peak_height_parameter,
                peak.max_value,
            );
            assert!(peak.max_value - peak.highest_saddle_value >= threshold);
        }
    }
    Ok(())
}

#[test]
fn sort_is_stable_for_equal_keys() -> Result<(), FociError> {
    let size = VolumeSize::new_2d(9, 3);
    let mut data = vec![0u8; size.len()];
    for x in [1, 4, 7] {
        data[size.index(x, 1, 0)] = 8;
    }
    let volume = Volume::new(size, data)?;
    let finder = FindFoci::new(FindFociConfig {
        sort_method: SortMethod::MaxValue,
        ..absolute(1.0)
    })?;
    let result = finder.run(&volume, None, None)?;
    let ids: Vec<u32> = result.peaks.iter().map(|p| p.id).collect();
    let xs: Vec<usize> = result.peaks.iter().map(|p| p.x).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(xs, vec![1, 4, 7]);
    Ok(())
}

#[test]
fn remap_resolution_is_idempotent() {
    let mut remap = IdRemap::new(6);
    remap.merge(2, 1);
    remap.merge(3, 2);
    remap.merge(5, 4);
    remap.merge(4, 1);
    remap.dissolve(6);
    for id in 0..=6 {
        let once = remap.resolve(id);
        assert_eq!(remap.resolve(once), once);
    }
    assert_eq!(remap.resolve(5), 1);
    assert_eq!(remap.resolve(6), 0);
}

#[test]
fn small_shoulder_merges_only_when_sized_above_saddle() -> Result<(), FociError> {
    let volume = Volume::new(VolumeSize::new_2d(8, 1), vec![1u8, 9, 8, 7, 6, 5, 6, 1])?;
    let config = |minimum_above_saddle: bool, contiguous_above_saddle: bool| FindFociConfig {
        peak_height_method: PeakHeightMethod::Absolute,
        peak_height_parameter: 1.0,
        min_size: 2,
        options: OptionFlags {
            minimum_above_saddle,
            contiguous_above_saddle,
            stats_inside: true,
            ..Default::default()
        },
        ..absolute(1.0)
    };

    let whole = FindFoci::new(config(false, false))?.run(&volume, None, None)?;
    assert_eq!(whole.peaks.len(), 2);

    let above = FindFoci::new(config(true, false))?.run(&volume, None, None)?;
    assert_eq!(above.peaks.len(), 1);
    assert_eq!(above.peaks[0].max_value, 9.0);
    assert_eq!(above.peaks[0].count, 8);
    assert!(!above.peaks[0].has_saddle());

    let contiguous = FindFoci::new(config(true, true))?.run(&volume, None, None)?;
    assert_eq!(contiguous.peaks.len(), 1);
    assert_eq!(contiguous.peaks[0].count, 8);
    Ok(())
}

#[test]
fn blurred_search_measures_original_intensity() -> Result<(), FociError> {
    let size = VolumeSize::new_2d(15, 15);
    let mut data = vec![0u8; size.len()];
    data[size.index(7, 7, 0)] = 200;
    let volume = Volume::new(size, data)?;

    let result = FindFoci::new(FindFociConfig {
        gaussian_blur: Some(1.0),
        ..absolute(1.0)
    })?
    .run(&volume, None, None)?;

    assert_eq!(result.peaks.len(), 1);
    let peak = &result.peaks[0];
    assert_eq!((peak.x, peak.y), (7, 7));
    assert!(peak.max_value < 200.0);
    assert!(peak.count > 1);
    assert_eq!(peak.intensity, 200.0);
    Ok(())
}

#[test]
fn object_analysis_groups_touching_regions() -> Result<(), FociError> {
    let volume = Volume::new(VolumeSize::new_2d(9, 1), vec![0u8, 9, 3, 9, 0, 0, 5, 0, 0])?;
    let result = FindFoci::new(FindFociConfig {
        options: OptionFlags {
            object_analysis: true,
            stats_inside: true,
            ..Default::default()
        },
        ..absolute(1.0)
    })?
    .run(&volume, None, None)?;

    assert_eq!(result.peaks.len(), 3);
    let object_at = |x: usize| {
        result
            .peaks
            .iter()
            .find(|p| p.x == x)
            .map(|p| p.object_id)
            .unwrap_or(0)
    };
    assert_ne!(object_at(1), 0);
    assert_eq!(object_at(1), object_at(3));
    assert_ne!(object_at(6), 0);
    assert_ne!(object_at(6), object_at(1));
    Ok(())
}
