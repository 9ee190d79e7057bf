use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};
use ndarray::Array2;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::{
    error::{PrnuError, Result},
    image_utils::std_dev,
};

pub mod analysis;
pub mod config;
pub mod decode;
pub mod error;
pub mod image_utils;
pub mod logger;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod validation;

pub use analysis::{
    correlation::CorrelationComparator, fingerprint::FingerprintBuilder,
    residual::ResidualExtractor,
};
pub use config::PipelineConfig;
pub use pipeline::PrnuPipeline;
pub use validation::{ReferenceSet, ReferenceValidator};

/// Linear-light 16-bit RGB raster as produced by a [`decode::RawDecoder`].
pub type Raster = ImageBuffer<Rgb<u16>, Vec<u16>>;

/// High-frequency noise residual of a single image, scaled to unit standard
/// deviation. Indexed `[row, column]`.
#[derive(Debug, Clone)]
pub struct Residual {
    data: Array2<f64>,
    source: Option<PathBuf>,
}

impl Residual {
    /// Rescales `raw` by its own standard deviation.
    ///
    /// Fails with [`PrnuError::DegenerateInput`] when the deviation is not
    /// finite or negligible next to the largest magnitude in `raw`, which
    /// happens for uniform or empty inputs.
    pub fn normalized(raw: Array2<f64>, source: Option<PathBuf>) -> Result<Self> {
        let magnitude = raw.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let data = scale_to_unit_std(raw, magnitude, || match &source {
            Some(path) => format!("residual of {} has negligible variance", path.display()),
            None => "residual has negligible variance".to_string(),
        })?;

        Ok(Self { data, source })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// `(height, width)`
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Camera reference pattern: the renormalized mean of cropped residuals.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    data: Array2<f64>,
    contributors: usize,
}

impl Fingerprint {
    /// `mean` is an average of unit-deviation residuals, so a deviation that
    /// is negligible against 1 means the contributors cancelled out.
    pub(crate) fn new(mean: Array2<f64>, contributors: usize) -> Result<Self> {
        let data = scale_to_unit_std(mean, 1.0, || {
            format!(
                "fingerprint averaged from {} residual(s) has negligible variance",
                contributors
            )
        })?;

        Ok(Self { data, contributors })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Number of residuals averaged into this fingerprint.
    pub fn contributors(&self) -> usize {
        self.contributors
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Deviations at or below this fraction of the reference scale are rounding
/// noise rather than signal.
const NEGLIGIBLE_DEVIATION: f64 = 1e-10;

fn scale_to_unit_std<F: FnOnce() -> String>(
    raw: Array2<f64>,
    reference_scale: f64,
    describe: F,
) -> Result<Array2<f64>> {
    let sigma = std_dev(&raw.view());
    if !sigma.is_finite() || sigma <= reference_scale * NEGLIGIBLE_DEVIATION {
        return Err(PrnuError::DegenerateInput(describe()));
    }
    Ok(raw / sigma)
}

/// Normalized cross-correlation of two equally shaped grids.
///
/// Bounded to `[-1, 1]` by construction; not clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationScore {
    pub value: f64,
    pub compared_pixels: usize,
}

impl CorrelationScore {
    /// Under the hypothesis of independent noise the score is approximately
    /// `N(0, 1/n)`; this is the score in units of that null deviation.
    pub fn z_score(&self) -> f64 {
        self.value * (self.compared_pixels as f64).sqrt()
    }

    /// One-sided probability of a score at least this large arising from
    /// unrelated noise.
    pub fn p_value(&self) -> f64 {
        Normal::new(0.0, 1.0)
            .map(|normal| 1.0 - normal.cdf(self.z_score()))
            .unwrap_or(f64::NAN)
    }
}

impl std::fmt::Display for CorrelationScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.value)
    }
}
