use std::path::PathBuf;

use log::{info, warn};
use ndarray::Array2;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;

use crate::{
    Fingerprint, Residual,
    analysis::residual::ResidualExtractor,
    decode::RawDecoder,
    error::{PrnuError, Result},
    image_utils::crop_top_left,
    validation::ReferenceSet,
};

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct FingerprintOutcome {
    pub fingerprint: Fingerprint,
    pub processed: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

pub struct FingerprintBuilder {
    parallel: bool,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Extracts a residual from every reference and aggregates the survivors.
    ///
    /// Files whose decode or extraction fails are logged and left out. The
    /// surviving count is not checked against any reference minimum here.
    /// References are decoded one batch per worker thread at a time and folded
    /// into a running sum, so at most one batch of residuals is held at once.
    pub fn build(
        &self,
        references: &ReferenceSet,
        decoder: &dyn RawDecoder,
        extractor: &ResidualExtractor,
    ) -> Result<FingerprintOutcome> {
        let extract_one = |path: &PathBuf| -> Result<Residual> {
            let raster = decoder.decode(path)?;
            extractor.extract(&raster, Some(path))
        };

        let batch_size = if self.parallel {
            rayon::current_num_threads().max(1)
        } else {
            1
        };

        let mut sum = ResidualSum::default();
        let mut processed = Vec::new();
        let mut skipped = Vec::new();

        for batch in references.files().chunks(batch_size) {
            let attempts = if self.parallel {
                batch
                    .par_iter()
                    .map(|path| (path, extract_one(path)))
                    .collect::<Vec<_>>()
            } else {
                batch
                    .iter()
                    .map(|path| (path, extract_one(path)))
                    .collect::<Vec<_>>()
            };

            for (path, attempt) in attempts {
                match attempt {
                    Ok(residual) => {
                        info!("[+] Processed {}", path.display());
                        processed.push(path.clone());
                        sum.add(&residual);
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!("[!] Skipping {}, error: {}", path.display(), e);
                        skipped.push(SkippedFile {
                            path: path.clone(),
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let fingerprint = sum.into_fingerprint(references.len())?;

        Ok(FingerprintOutcome {
            fingerprint,
            processed,
            skipped,
        })
    }

    /// Crops every residual to the smallest common top-left region, averages
    /// them and rescales the mean to unit standard deviation.
    pub fn aggregate(&self, residuals: &[Residual]) -> Result<Fingerprint> {
        let mut sum = ResidualSum::default();
        for residual in residuals {
            sum.add(residual);
        }
        sum.into_fingerprint(residuals.len())
    }
}

/// Running top-left sum of residuals. Cropping commutes with addition, so
/// shrinking the sum whenever a smaller residual arrives gives the same result
/// as cropping everything to the final minimum first.
#[derive(Debug, Default)]
struct ResidualSum {
    total: Option<Array2<f64>>,
    shapes: Vec<(usize, usize)>,
}

impl ResidualSum {
    fn add(&mut self, residual: &Residual) {
        self.shapes.push(residual.dim());

        self.total = Some(match self.total.take() {
            None => residual.data().clone(),
            Some(total) => {
                let height = total.dim().0.min(residual.dim().0);
                let width = total.dim().1.min(residual.dim().1);
                let mut total = if total.dim() == (height, width) {
                    total
                } else {
                    crop_top_left(&total, height, width).to_owned()
                };
                total += &crop_top_left(residual.data(), height, width);
                total
            }
        });
    }

    fn into_fingerprint(self, attempted: usize) -> Result<Fingerprint> {
        let total = self
            .total
            .ok_or(PrnuError::NoUsableResiduals { attempted })?;
        let (height, width) = total.dim();
        let count = self.shapes.len();

        let cropped_count = self
            .shapes
            .iter()
            .filter(|&&shape| shape != (height, width))
            .count();
        if cropped_count > 0 {
            warn!(
                "Reference residual shapes differ; cropping {} of {} to {}x{}",
                cropped_count, count, height, width
            );
        }

        Fingerprint::new(total / count as f64, count)
    }
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Element-wise minimum `(height, width)`; `None` for an empty collection.
pub fn minimum_shape(residuals: &[Residual]) -> Option<(usize, usize)> {
    let height = residuals.iter().map(|r| r.dim().0).min()?;
    let width = residuals.iter().map(|r| r.dim().1).min()?;
    Some((height, width))
}

/// Crops each residual to [`minimum_shape`] without averaging.
pub fn crop_to_common(residuals: &[Residual]) -> Vec<Array2<f64>> {
    match minimum_shape(residuals) {
        Some((height, width)) => residuals
            .iter()
            .map(|r| crop_top_left(r.data(), height, width).to_owned())
            .collect(),
        None => Vec::new(),
    }
}
