//! Levenberg-Marquardt fit of an elliptical 2D Gaussian.

use nalgebra::{Matrix6, Vector6};

/// Parameters controlling the fit.
#[derive(Debug, Clone)]
pub struct FitParams {
    /// Maximum number of iterations.
    pub max_iters: usize,
    /// Convergence threshold on the decrease of the squared error.
    pub eps: f64,
    /// Initial damping factor (lambda).
    pub lambda_init: f64,
    /// Multiplicative factor to increase/decrease lambda.
    pub lambda_mul: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            max_iters: 100,
            eps: 1e-9,
            lambda_init: 1e-3,
            lambda_mul: 10.0,
        }
    }
}

/// A fitted Gaussian `b + a * exp(-(x-x0)^2 / 2sx^2 - (y-y0)^2 / 2sy^2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian2d {
    /// Constant background.
    pub background: f64,
    /// Amplitude above the background.
    pub amplitude: f64,
    /// Centre x.
    pub x0: f64,
    /// Centre y.
    pub y0: f64,
    /// Width along x.
    pub sx: f64,
    /// Width along y.
    pub sy: f64,
}

impl Gaussian2d {
    fn from_vector(p: &Vector6<f64>) -> Self {
        Self {
            background: p[0],
            amplitude: p[1],
            x0: p[2],
            y0: p[3],
            sx: p[4],
            sy: p[5],
        }
    }

    /// Evaluate the model and its gradient with respect to the parameters.
    fn eval(&self, x: f64, y: f64) -> (f64, Vector6<f64>) {
        let dx = x - self.x0;
        let dy = y - self.y0;
        let sx2 = self.sx * self.sx;
        let sy2 = self.sy * self.sy;
        let e = (-(dx * dx) / (2.0 * sx2) - (dy * dy) / (2.0 * sy2)).exp();
        let ae = self.amplitude * e;
        let grad = Vector6::new(
            1.0,
            e,
            ae * dx / sx2,
            ae * dy / sy2,
            ae * dx * dx / (sx2 * self.sx),
            ae * dy * dy / (sy2 * self.sy),
        );
        (self.background + ae, grad)
    }
}

fn initial_estimate(data: &[f64], width: usize, height: usize) -> Vector6<f64> {
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (mut sw, mut sx, mut sy) = (0.0, 0.0, 0.0);
    for (i, &v) in data.iter().enumerate() {
        let w = v - min;
        sw += w;
        sx += w * (i % width) as f64;
        sy += w * (i / width) as f64;
    }
    let (cx, cy) = if sw > 0.0 {
        (sx / sw, sy / sw)
    } else {
        ((width as f64 - 1.0) / 2.0, (height as f64 - 1.0) / 2.0)
    };

    let (mut vx, mut vy) = (0.0, 0.0);
    for (i, &v) in data.iter().enumerate() {
        let w = v - min;
        vx += w * ((i % width) as f64 - cx).powi(2);
        vy += w * ((i / width) as f64 - cy).powi(2);
    }
    let spread = |var: f64| {
        if sw > 0.0 {
            (var / sw).sqrt().max(0.5)
        } else {
            1.0
        }
    };

    Vector6::new(min, max - min, cx, cy, spread(vx), spread(vy))
}

fn squared_error(data: &[f64], width: usize, p: &Vector6<f64>) -> f64 {
    let model = Gaussian2d::from_vector(p);
    data.iter()
        .enumerate()
        .map(|(i, &v)| {
            let (f, _) = model.eval((i % width) as f64, (i / width) as f64);
            (v - f).powi(2)
        })
        .sum()
}

/// Fit a 2D Gaussian to a row-major `width * height` image.
///
/// Returns `None` if the image is smaller than 3x3, the solver diverges, or the
/// fitted centre leaves the image.
pub fn fit_gaussian_2d(
    data: &[f64],
    width: usize,
    height: usize,
    params: &FitParams,
) -> Option<Gaussian2d> {
    if width < 3 || height < 3 || data.len() != width * height {
        return None;
    }

    let mut p = initial_estimate(data, width, height);
    let mut err = squared_error(data, width, &p);
    let mut lambda = params.lambda_init;

    for _ in 0..params.max_iters {
        let model = Gaussian2d::from_vector(&p);
        let mut jtj = Matrix6::<f64>::zeros();
        let mut jtr = Vector6::<f64>::zeros();
        for (i, &v) in data.iter().enumerate() {
            let (f, g) = model.eval((i % width) as f64, (i / width) as f64);
            jtj += g * g.transpose();
            jtr += g * (v - f);
        }

        let mut damped = jtj;
        for k in 0..6 {
            damped[(k, k)] += lambda * jtj[(k, k)].max(1e-12);
        }

        let Some(delta) = damped.lu().solve(&jtr) else {
            lambda *= params.lambda_mul;
            continue;
        };

        let candidate = p + delta;
        let err_new = squared_error(data, width, &candidate);
        if err_new.is_finite() && err_new < err {
            p = candidate;
            let decrease = err - err_new;
            err = err_new;
            lambda = (lambda / params.lambda_mul).max(1e-12);
            if decrease < params.eps * err.max(1.0) {
                break;
            }
        } else {
            lambda *= params.lambda_mul;
            if lambda > 1e12 {
                break;
            }
        }
    }

    let fit = Gaussian2d::from_vector(&p);
    let valid = p.iter().all(|v| v.is_finite())
        && fit.amplitude > 0.0
        && fit.sx.abs() > 0.0
        && fit.sy.abs() > 0.0
        && (0.0..=(width - 1) as f64).contains(&fit.x0)
        && (0.0..=(height - 1) as f64).contains(&fit.y0);

    valid.then_some(Gaussian2d {
        sx: fit.sx.abs(),
        sy: fit.sy.abs(),
        ..fit
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn render(width: usize, height: usize, g: &Gaussian2d) -> Vec<f64> {
        (0..width * height)
            .map(|i| g.eval((i % width) as f64, (i / width) as f64).0)
            .collect()
    }

    #[test]
    fn test_fit_recovers_centre() {
        let truth = Gaussian2d {
            background: 10.0,
            amplitude: 100.0,
            x0: 6.3,
            y0: 4.7,
            sx: 1.8,
            sy: 1.2,
        };
        let data = render(13, 11, &truth);
        let fit = fit_gaussian_2d(&data, 13, 11, &FitParams::default());
        let Some(fit) = fit else {
            panic!("fit failed");
        };
        assert_relative_eq!(fit.x0, truth.x0, epsilon = 1e-3);
        assert_relative_eq!(fit.y0, truth.y0, epsilon = 1e-3);
        assert_relative_eq!(fit.sx, truth.sx, epsilon = 1e-3);
        assert_relative_eq!(fit.amplitude, truth.amplitude, epsilon = 1e-2);
    }

    #[test]
    fn test_fit_rejects_small_input() {
        let data = vec![1.0; 4];
        assert!(fit_gaussian_2d(&data, 2, 2, &FitParams::default()).is_none());
    }

    #[test]
    fn test_fit_flat_image() {
        let data = vec![5.0; 25];
        assert!(fit_gaussian_2d(&data, 5, 5, &FitParams::default()).is_none());
    }
}
