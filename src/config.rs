//! Pipeline configuration.
//!
//! The three historical workflows (no-camera strict validation, camera-available
//! fingerprinting and direct file-vs-file comparison) are profiles of one
//! [`PipelineConfig`] rather than separate code paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PrnuError, Result};

pub const DEFAULT_REFERENCE_EXTENSION: &str = "CR2";
pub const STRICT_MINIMUM_REFERENCES: usize = 15;
pub const CAMERA_AVAILABLE_MINIMUM_REFERENCES: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidualConfig {
    /// Low-pass support in pixels; must be odd.
    pub kernel_size: usize,
    /// Gaussian bandwidth. Non-positive selects the default for `kernel_size`.
    pub sigma: f64,
}

impl Default for ResidualConfig {
    fn default() -> Self {
        Self {
            kernel_size: 5,
            sigma: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub output_dir: PathBuf,
    /// Panels wider than this are downscaled before composition.
    pub max_panel_width: u32,
    pub padding: u32,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            max_panel_width: 1200,
            padding: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub minimum_reference_count: usize,
    pub require_extension_check: bool,
    pub log_chain_of_custody: bool,
    /// RAW container extension, compared case-insensitively and without the dot.
    pub reference_extension: String,
    pub inspect_metadata: bool,
    pub parallel: bool,
    /// File-name prefix of rendered comparisons.
    pub report_prefix: String,
    pub residual: ResidualConfig,
    pub visualization: VisualizationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl PipelineConfig {
    /// Reference corpus without access to the physical camera.
    pub fn strict() -> Self {
        Self {
            minimum_reference_count: STRICT_MINIMUM_REFERENCES,
            require_extension_check: true,
            log_chain_of_custody: true,
            reference_extension: DEFAULT_REFERENCE_EXTENSION.into(),
            inspect_metadata: false,
            parallel: true,
            report_prefix: "PRNU_strict_".into(),
            residual: ResidualConfig::default(),
            visualization: VisualizationConfig::default(),
        }
    }

    /// Reference images captured directly from the camera under test.
    pub fn camera_available() -> Self {
        Self {
            minimum_reference_count: CAMERA_AVAILABLE_MINIMUM_REFERENCES,
            require_extension_check: false,
            log_chain_of_custody: false,
            report_prefix: "PRNU_test_".into(),
            ..Self::strict()
        }
    }

    /// File-vs-file comparison; no reference policy applies.
    pub fn direct_compare() -> Self {
        Self {
            minimum_reference_count: 0,
            require_extension_check: false,
            log_chain_of_custody: false,
            report_prefix: "PRNU_compare_".into(),
            ..Self::strict()
        }
    }

    pub fn with_minimum_reference_count(mut self, count: usize) -> Self {
        self.minimum_reference_count = count;
        self
    }

    pub fn with_reference_extension(mut self, extension: &str) -> Self {
        self.reference_extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.visualization.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Loads a TOML file; absent keys keep the strict defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::strict().merge_file(path)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Self::strict().merge_toml(content)
    }

    /// Overlays the keys present in a TOML file onto this configuration.
    pub fn merge_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PrnuError::Config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        self.merge_toml(&content)
    }

    /// Overlays the keys present in `content` onto this configuration; nested
    /// tables merge key by key, everything absent keeps its current value.
    pub fn merge_toml(self, content: &str) -> Result<Self> {
        let overlay = content
            .parse::<toml::Table>()
            .map_err(|e| PrnuError::Config(e.to_string()))?;

        let mut base = match toml::Value::try_from(&self) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) => return Err(PrnuError::Config("configuration is not a table".into())),
            Err(e) => return Err(PrnuError::Config(e.to_string())),
        };
        merge_tables(&mut base, overlay);

        let config: Self = toml::Value::Table(base)
            .try_into()
            .map_err(|e: toml::de::Error| PrnuError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Direct file-vs-file comparison keeps the analysis and rendering
    /// settings but never applies the reference policy.
    pub fn into_direct_compare(self) -> Self {
        let direct = Self::direct_compare();
        Self {
            minimum_reference_count: direct.minimum_reference_count,
            require_extension_check: direct.require_extension_check,
            log_chain_of_custody: direct.log_chain_of_custody,
            report_prefix: direct.report_prefix,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.residual.kernel_size == 0 || self.residual.kernel_size % 2 == 0 {
            return Err(PrnuError::Config(format!(
                "kernel_size must be a positive odd number, got {}",
                self.residual.kernel_size
            )));
        }
        if !self.residual.sigma.is_finite() || self.residual.sigma < 0.0 {
            return Err(PrnuError::Config(format!(
                "sigma must be finite and non-negative, got {}",
                self.residual.sigma
            )));
        }
        if self.reference_extension.trim_start_matches('.').is_empty() {
            return Err(PrnuError::Config("reference_extension is empty".into()));
        }
        if self.visualization.max_panel_width == 0 {
            return Err(PrnuError::Config("max_panel_width must be positive".into()));
        }
        Ok(())
    }

    /// Extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.reference_extension.trim_start_matches('.')
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => match base.get_mut(&key) {
                Some(toml::Value::Table(inner)) => merge_tables(inner, nested),
                _ => {
                    base.insert(key, toml::Value::Table(nested));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}
