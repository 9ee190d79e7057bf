use std::path::Path;

use ndarray::Array2;
use serde::Serialize;

use crate::{
    Raster, Residual,
    config::ResidualConfig,
    error::Result,
    image_utils::{gaussian_kernel, rgb_to_luma, separable_blur},
};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResidualStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub energy: f64,
}

/// Isolates sensor noise as luminance minus its Gaussian low-pass version.
#[derive(Debug, Clone)]
pub struct ResidualExtractor {
    kernel: Vec<f64>,
}

impl ResidualExtractor {
    pub fn new() -> Self {
        Self::with_config(&ResidualConfig::default())
    }

    pub fn with_config(config: &ResidualConfig) -> Self {
        Self {
            kernel: gaussian_kernel(config.kernel_size, config.sigma),
        }
    }

    pub fn extract(&self, raster: &Raster, source: Option<&Path>) -> Result<Residual> {
        let luma = rgb_to_luma(raster);
        self.extract_luma(luma, source)
    }

    /// Same as [`extract`](Self::extract) for an already single-channel grid.
    pub fn extract_luma(&self, luma: Array2<f64>, source: Option<&Path>) -> Result<Residual> {
        let denoised = separable_blur(&luma, &self.kernel);
        let noise = luma - denoised;

        Residual::normalized(noise, source.map(Path::to_path_buf))
    }
}

impl Default for ResidualExtractor {
    fn default() -> Self {
        Self::new()
    }
}

pub fn residual_statistics(data: &Array2<f64>) -> ResidualStatistics {
    let n = data.len() as f64;
    if data.is_empty() {
        return ResidualStatistics {
            mean: 0.0,
            std_dev: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
            energy: 0.0,
        };
    }

    let mean = data.sum() / n;
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let skewness = if std_dev > 0.0 {
        data.iter().map(|v| ((v - mean) / std_dev).powi(3)).sum::<f64>() / n
    } else {
        0.0
    };

    let kurtosis = if std_dev > 0.0 {
        data.iter().map(|v| ((v - mean) / std_dev).powi(4)).sum::<f64>() / n - 3.0
    } else {
        0.0
    };

    let energy = data.iter().map(|v| v * v).sum::<f64>() / n;

    ResidualStatistics {
        mean,
        std_dev,
        skewness,
        kurtosis,
        energy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::PrnuError, image_utils::std_dev};
    use image::Rgb;
    use rand_chacha::ChaCha8Rng;
    use rand_core::{RngCore, SeedableRng};

    fn noisy_raster(width: u32, height: u32, seed: u64) -> Raster {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Raster::from_fn(width, height, |x, y| {
            let base = 20_000 + 40 * (x + y) as u16;
            let v = base + (rng.next_u32() % 2_000) as u16;
            Rgb([v, v, v])
        })
    }

    #[test]
    fn test_residual_has_unit_std() {
        for seed in 0..4 {
            let raster = noisy_raster(48, 32, seed);
            let residual = ResidualExtractor::new().extract(&raster, None).unwrap();
            assert_eq!(residual.dim(), (32, 48));
            assert!((std_dev(&residual.data().view()) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_residual_removes_linear_gradient() {
        let luma = Array2::from_shape_fn((20, 20), |(y, x)| 3.0 * x as f64 + 2.0 * y as f64);
        let denoised = separable_blur(&luma, &gaussian_kernel(5, 0.0));
        let interior = (&luma - &denoised).slice(ndarray::s![2..18, 2..18]).to_owned();
        assert!(interior.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_uniform_raster_is_degenerate() {
        let raster = Raster::from_pixel(16, 16, Rgb([1234, 1234, 1234]));
        let err = ResidualExtractor::new().extract(&raster, None).unwrap_err();
        assert!(matches!(err, PrnuError::DegenerateInput(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_source_is_recorded() {
        let raster = noisy_raster(16, 16, 9);
        let residual = ResidualExtractor::new()
            .extract(&raster, Some(Path::new("/refs/IMG_0001.CR2")))
            .unwrap();
        assert_eq!(residual.source(), Some(Path::new("/refs/IMG_0001.CR2")));
    }

    #[test]
    fn test_statistics_of_unit_residual() {
        let raster = noisy_raster(64, 64, 3);
        let residual = ResidualExtractor::new().extract(&raster, None).unwrap();
        let stats = residual_statistics(residual.data());
        assert!((stats.std_dev - 1.0).abs() < 1e-9);
        assert!(stats.mean.abs() < 0.1);
        assert!((stats.energy - (1.0 + stats.mean * stats.mean)).abs() < 1e-9);
    }
}
