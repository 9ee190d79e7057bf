use ndarray::{ArrayView2, Zip};

use crate::{
    CorrelationScore, Fingerprint, Residual,
    error::{PrnuError, Result},
    image_utils::crop_top_left,
};

/// Cosine similarity between flattened noise grids.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationComparator;

impl CorrelationComparator {
    pub fn new() -> Self {
        Self
    }

    /// `sum(a*b) / (sqrt(sum(a^2)) * sqrt(sum(b^2)))` over two equal-shaped grids.
    pub fn score(&self, a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> Result<CorrelationScore> {
        if a.dim() != b.dim() {
            return Err(PrnuError::InvalidParameter(format!(
                "cannot correlate grids of shape {:?} and {:?}",
                a.dim(),
                b.dim()
            )));
        }

        let (mut dot, mut energy_a, mut energy_b) = (0.0, 0.0, 0.0);
        Zip::from(a).and(b).for_each(|&x, &y| {
            dot += x * y;
            energy_a += x * x;
            energy_b += y * y;
        });

        if energy_a == 0.0 || energy_b == 0.0 {
            return Err(PrnuError::DegenerateInput(
                "correlation operand is an all-zero grid".into(),
            ));
        }

        Ok(CorrelationScore {
            value: dot / (energy_a.sqrt() * energy_b.sqrt()),
            compared_pixels: a.len(),
        })
    }

    /// Crops the test residual to the fingerprint's shape (top-left aligned)
    /// and scores the overlap. The test residual must be at least as large as
    /// the fingerprint in both dimensions.
    pub fn score_against_fingerprint(
        &self,
        test: &Residual,
        fingerprint: &Fingerprint,
    ) -> Result<CorrelationScore> {
        let (test_height, test_width) = test.dim();
        let (fingerprint_height, fingerprint_width) = fingerprint.dim();

        if test_height < fingerprint_height || test_width < fingerprint_width {
            return Err(PrnuError::ShapeMismatch {
                test_height,
                test_width,
                fingerprint_height,
                fingerprint_width,
            });
        }

        let cropped = crop_top_left(test.data(), fingerprint_height, fingerprint_width);
        self.score(&cropped, &fingerprint.data().view())
    }

    /// Direct comparison of two residuals over their common top-left region.
    pub fn score_residuals(&self, a: &Residual, b: &Residual) -> Result<CorrelationScore> {
        let height = a.dim().0.min(b.dim().0);
        let width = a.dim().1.min(b.dim().1);

        self.score(
            &crop_top_left(a.data(), height, width),
            &crop_top_left(b.data(), height, width),
        )
    }
}
