use argh::FromArgs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use findfoci::config::FindFociConfig;
use findfoci::pipeline::FindFoci;
use findfoci_volume::{ops::cast_and_scale, Volume, VolumeSize};

#[derive(FromArgs)]
/// Find the foci of a synthetic volume of Gaussian spots and print them as JSON
struct Args {
    /// width of the volume
    #[argh(option, default = "128")]
    width: usize,

    /// height of the volume
    #[argh(option, default = "128")]
    height: usize,

    /// number of z-slices
    #[argh(option, default = "1")]
    depth: usize,

    /// number of spots to render
    #[argh(option, short = 'n', default = "10")]
    spots: usize,

    /// sigma of the spots in pixels
    #[argh(option, default = "2.0")]
    sigma: f64,

    /// seed of the random generator
    #[argh(option, default = "42")]
    seed: u64,

    /// search the floating point rendering instead of the 16-bit one
    #[argh(switch)]
    float: bool,

    /// search configuration as a JSON document
    #[argh(option, short = 'c')]
    config: Option<String>,
}

/// Render spots of random position and amplitude over uniform noise.
fn render_spots(size: VolumeSize, spots: usize, sigma: f64, rng: &mut StdRng) -> Vec<f32> {
    let mut data: Vec<f64> = (0..size.len()).map(|_| rng.random_range(0.0..50.0)).collect();
    let two_sigma_sq = 2.0 * sigma * sigma;

    for _ in 0..spots {
        let cx = rng.random_range(0.0..size.width as f64);
        let cy = rng.random_range(0.0..size.height as f64);
        let cz = rng.random_range(0.0..size.depth as f64);
        let amplitude = rng.random_range(200.0..2000.0);
        log::debug!("spot at ({cx:.1}, {cy:.1}, {cz:.1}) amplitude {amplitude:.0}");

        for (i, v) in data.iter_mut().enumerate() {
            let (x, y, z) = size.coords(i);
            let d2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2) + (z as f64 - cz).powi(2);
            *v += amplitude * (-d2 / two_sigma_sq).exp();
        }
    }

    data.into_iter()
        .map(|v| v.min(u16::MAX as f64) as f32)
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(json) => FindFociConfig::from_json(json)?,
        None => FindFociConfig::default(),
    };
    let finder = FindFoci::new(config)?;

    // render the synthetic volume
    let size = VolumeSize {
        width: args.width,
        height: args.height,
        depth: args.depth,
    };
    let mut rng = StdRng::seed_from_u64(args.seed);
    let volume = Volume::new(size, render_spots(size, args.spots, args.sigma, &mut rng))?;

    // search the volume and print the result
    let result = if args.float {
        finder.run(&volume, None, None)?
    } else {
        let volume = cast_and_scale::<f32, u16>(&volume, 1)?;
        finder.run(&volume, None, None)?
    };
    log::info!("{} spots rendered, {} peaks found", args.spots, result.peaks.len());

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
