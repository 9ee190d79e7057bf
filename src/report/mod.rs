pub mod visualization;

use std::path::PathBuf;

use serde::Serialize;

use crate::{
    analysis::{fingerprint::SkippedFile, residual::ResidualStatistics},
    validation::CustodyRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    FingerprintVsTest,
    Direct,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreSection {
    pub correlation: f64,
    pub compared_pixels: usize,
    pub z_score: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerprintSection {
    pub contributors: usize,
    pub height: usize,
    pub width: usize,
    pub statistics: ResidualStatistics,
    pub processed: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
    /// Survivors fell below the configured reference minimum after skips.
    pub below_minimum_after_skips: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub mode: ComparisonMode,
    pub inputs: Vec<PathBuf>,
    pub score: ScoreSection,
    pub fingerprint: Option<FingerprintSection>,
    pub custody: Vec<CustodyRecord>,
    pub metadata_warnings: Vec<String>,
    pub visualization: Option<PathBuf>,
}

impl ComparisonReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let report = ComparisonReport {
            mode: ComparisonMode::Direct,
            inputs: vec![PathBuf::from("a.CR2"), PathBuf::from("b.CR2")],
            score: ScoreSection {
                correlation: 0.25,
                compared_pixels: 16,
                z_score: 1.0,
                p_value: 0.1587,
            },
            fingerprint: None,
            custody: Vec::new(),
            metadata_warnings: Vec::new(),
            visualization: Some(PathBuf::from("PRNU_compare_a.CR2_b.CR2.png")),
        };

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["mode"], "direct");
        assert_eq!(value["score"]["correlation"], 0.25);
        assert!(value["fingerprint"].is_null());
        assert_eq!(value["inputs"][1], "b.CR2");
    }
}
