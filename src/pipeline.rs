//! Composition of validator, extractor, builder, comparator and renderer.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::{
    Fingerprint, Residual,
    analysis::{
        correlation::CorrelationComparator,
        fingerprint::{FingerprintBuilder, FingerprintOutcome},
        residual::{ResidualExtractor, residual_statistics},
    },
    config::PipelineConfig,
    decode::{AutoDecoder, RawDecoder},
    error::Result,
    image_utils::crop_top_left,
    report::{
        ComparisonMode, ComparisonReport, FingerprintSection, ScoreSection,
        visualization::{Panel, PngReportRenderer, ReportRenderer, output_path},
    },
    validation::{ReferenceSet, ReferenceValidator, ValidationReport, custody::basename},
};

/// A fingerprint together with the audit trail of how it was built.
#[derive(Debug, Clone)]
pub struct ReferenceFingerprint {
    pub validation: ValidationReport,
    pub outcome: FingerprintOutcome,
    /// Fewer residuals survived than the configured minimum. The set was
    /// admitted on its input count and is not re-validated.
    pub below_minimum_after_skips: bool,
}

impl ReferenceFingerprint {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.outcome.fingerprint
    }
}

pub struct PrnuPipeline {
    config: PipelineConfig,
    decoder: Box<dyn RawDecoder>,
    renderer: Option<Box<dyn ReportRenderer>>,
    extractor: ResidualExtractor,
    builder: FingerprintBuilder,
    comparator: CorrelationComparator,
}

impl PrnuPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            decoder: Box::new(AutoDecoder::new()),
            renderer: Some(Box::new(PngReportRenderer::new(config.visualization.clone()))),
            extractor: ResidualExtractor::with_config(&config.residual),
            builder: FingerprintBuilder::new().with_parallel(config.parallel),
            comparator: CorrelationComparator::new(),
            config,
        })
    }

    pub fn with_decoder<D: RawDecoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn with_renderer<R: ReportRenderer + 'static>(mut self, renderer: R) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn without_renderer(mut self) -> Self {
        self.renderer = None;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extract_residual(&self, path: &Path) -> Result<Residual> {
        let raster = self.decoder.decode(path)?;
        self.extractor.extract(&raster, Some(path))
    }

    /// Scans `dir` for reference files and builds the fingerprint.
    pub fn build_fingerprint_from_dir<P: AsRef<Path>>(&self, dir: P) -> Result<ReferenceFingerprint> {
        let references = ReferenceSet::discover(dir, self.config.extension())?;
        self.build_fingerprint(&references)
    }

    /// Validates the set (aborting on any policy violation), then extracts and
    /// aggregates residuals, skipping files that fail.
    pub fn build_fingerprint(&self, references: &ReferenceSet) -> Result<ReferenceFingerprint> {
        let validation = ReferenceValidator::new(&self.config).validate(references)?;

        let outcome = self
            .builder
            .build(references, self.decoder.as_ref(), &self.extractor)?;

        let survivors = outcome.processed.len();
        let below_minimum_after_skips = survivors < self.config.minimum_reference_count;
        if below_minimum_after_skips {
            // The admitted set is not re-validated against the survivors.
            warn!(
                "Only {} of {} reference files produced residuals, below the configured minimum of {}; \
                 fingerprint built anyway",
                survivors,
                references.len(),
                self.config.minimum_reference_count
            );
        }

        info!(
            "Fingerprint built from {} residual(s), {}x{}",
            outcome.fingerprint.contributors(),
            outcome.fingerprint.dim().0,
            outcome.fingerprint.dim().1
        );

        Ok(ReferenceFingerprint {
            validation,
            outcome,
            below_minimum_after_skips,
        })
    }

    pub fn compare_to_fingerprint(
        &self,
        test_image: &Path,
        reference: &ReferenceFingerprint,
    ) -> Result<ComparisonReport> {
        let fingerprint = reference.fingerprint();
        let test = self.extract_residual(test_image)?;
        let score = self.comparator.score_against_fingerprint(&test, fingerprint)?;
        debug!("Fingerprint correlation for {}: {}", test_image.display(), score);

        let (height, width) = fingerprint.dim();
        let cropped_test = crop_top_left(test.data(), height, width).to_owned();
        let visualization = self.render(
            Panel {
                title: "Reference PRNU Fingerprint",
                data: fingerprint.data(),
            },
            Panel {
                title: "Test Image Residual",
                data: &cropped_test,
            },
            &basename(test_image),
        );

        let metadata_warnings = reference
            .validation
            .metadata
            .as_ref()
            .map(|m| m.warnings.clone())
            .unwrap_or_default();

        Ok(ComparisonReport {
            mode: ComparisonMode::FingerprintVsTest,
            inputs: vec![test_image.to_path_buf()],
            score: ScoreSection {
                correlation: score.value,
                compared_pixels: score.compared_pixels,
                z_score: score.z_score(),
                p_value: score.p_value(),
            },
            fingerprint: Some(FingerprintSection {
                contributors: fingerprint.contributors(),
                height,
                width,
                statistics: residual_statistics(fingerprint.data()),
                processed: reference.outcome.processed.clone(),
                skipped: reference.outcome.skipped.clone(),
                below_minimum_after_skips: reference.below_minimum_after_skips,
            }),
            custody: reference.validation.custody.clone(),
            metadata_warnings,
            visualization,
        })
    }

    /// File-vs-file comparison over the common top-left region. No reference
    /// policy is applied.
    pub fn compare_files(&self, first: &Path, second: &Path) -> Result<ComparisonReport> {
        let a = self.extract_residual(first)?;
        let b = self.extract_residual(second)?;
        let score = self.comparator.score_residuals(&a, &b)?;
        debug!(
            "Direct correlation {} vs {}: {}",
            first.display(),
            second.display(),
            score
        );

        let (name_a, name_b) = (basename(first), basename(second));
        let (title_a, title_b) = (format!("{} residual", name_a), format!("{} residual", name_b));
        let visualization = self.render(
            Panel {
                title: &title_a,
                data: a.data(),
            },
            Panel {
                title: &title_b,
                data: b.data(),
            },
            &format!("{}_{}", name_a, name_b),
        );

        Ok(ComparisonReport {
            mode: ComparisonMode::Direct,
            inputs: vec![first.to_path_buf(), second.to_path_buf()],
            score: ScoreSection {
                correlation: score.value,
                compared_pixels: score.compared_pixels,
                z_score: score.z_score(),
                p_value: score.p_value(),
            },
            fingerprint: None,
            custody: Vec::new(),
            metadata_warnings: Vec::new(),
            visualization,
        })
    }

    /// Best effort: a failure is logged and yields `None`.
    fn render(&self, left: Panel<'_>, right: Panel<'_>, name: &str) -> Option<PathBuf> {
        let renderer = self.renderer.as_ref()?;
        let path = output_path(
            &self.config.visualization.output_dir,
            &self.config.report_prefix,
            name,
        );

        match renderer.render(left, right, &path) {
            Ok(()) => {
                info!("[+] Saved residual comparison: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Failed to save residual comparison {}: {}", path.display(), e);
                None
            }
        }
    }
}
