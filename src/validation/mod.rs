//! Reference-corpus admission policy.
//!
//! Runs before any pixel work: a set is either admitted in full, with a hash
//! recorded for every member, or rejected with the first rule it breaks.

pub mod custody;

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::PipelineConfig,
    error::{PolicyViolation, Result},
    metadata::exif::{ExifExtractor, MetadataSummary},
};

pub use custody::CustodyRecord;

/// Ordered candidate reference files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    files: Vec<PathBuf>,
}

impl ReferenceSet {
    pub fn new<I: IntoIterator<Item = PathBuf>>(files: I) -> Self {
        Self {
            files: files.into_iter().collect(),
        }
    }

    /// Non-recursive scan of `dir` for files whose extension matches
    /// `extension` case-insensitively, sorted by path.
    pub fn discover<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Self> {
        let extension = extension.trim_start_matches('.');
        let mut files = Vec::new();

        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, extension) {
                files.push(path);
            }
        }
        files.sort();

        debug!(
            "Discovered {} *.{} file(s) in {}",
            files.len(),
            extension,
            dir.as_ref().display()
        );

        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub file_count: usize,
    pub custody: Vec<CustodyRecord>,
    pub metadata: Option<MetadataSummary>,
}

#[derive(Debug, Clone)]
pub struct ReferenceValidator {
    minimum_reference_count: usize,
    require_extension_check: bool,
    log_chain_of_custody: bool,
    inspect_metadata: bool,
    extension: String,
}

impl ReferenceValidator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            minimum_reference_count: config.minimum_reference_count,
            require_extension_check: config.require_extension_check,
            log_chain_of_custody: config.log_chain_of_custody,
            inspect_metadata: config.inspect_metadata,
            extension: config.extension().to_string(),
        }
    }

    /// Applies, in order: the minimum count, the extension check and the
    /// custody hashing of every member. Metadata inspection, when enabled,
    /// only produces warnings.
    pub fn validate(&self, references: &ReferenceSet) -> Result<ValidationReport> {
        if references.len() < self.minimum_reference_count {
            return Err(PolicyViolation::InsufficientReferences {
                found: references.len(),
                required: self.minimum_reference_count,
                extension: self.extension.to_uppercase(),
            }
            .into());
        }

        if self.require_extension_check {
            if let Some(path) = references
                .files()
                .iter()
                .find(|p| !has_extension(p, &self.extension))
            {
                return Err(PolicyViolation::InvalidExtension {
                    path: path.clone(),
                    expected: self.extension.to_uppercase(),
                }
                .into());
            }
        }

        let custody = if self.log_chain_of_custody {
            self.record_custody(references)?
        } else {
            Vec::new()
        };

        let metadata = if self.inspect_metadata {
            let summary = ExifExtractor::summarize(references.files())?;
            for warning in &summary.warnings {
                warn!("Metadata: {}", warning);
            }
            Some(summary)
        } else {
            None
        };

        Ok(ValidationReport {
            file_count: references.len(),
            custody,
            metadata,
        })
    }

    fn record_custody(&self, references: &ReferenceSet) -> Result<Vec<CustodyRecord>> {
        info!("Reference File Validation:");

        references
            .files()
            .iter()
            .map(|path| -> Result<CustodyRecord> {
                let record = CustodyRecord::for_file(path)?;
                info!("  {}", record);
                Ok(record)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrnuError;

    fn write_files(dir: &Path, names: &[String]) -> ReferenceSet {
        ReferenceSet::new(names.iter().map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        }))
    }

    fn numbered(count: usize, extension: &str) -> Vec<String> {
        (0..count)
            .map(|i| format!("IMG_{:04}.{}", i, extension))
            .collect()
    }

    #[test]
    fn test_strict_rejects_fourteen() {
        let dir = tempfile::tempdir().unwrap();
        let set = write_files(dir.path(), &numbered(14, "CR2"));

        let err = ReferenceValidator::new(&PipelineConfig::strict())
            .validate(&set)
            .unwrap_err();
        assert!(matches!(
            err,
            PrnuError::Policy(PolicyViolation::InsufficientReferences {
                found: 14,
                required: 15,
                ..
            })
        ));
        assert!(err.to_string().contains("need at least 15"));
    }

    #[test]
    fn test_strict_accepts_fifteen_and_hashes_all() {
        let dir = tempfile::tempdir().unwrap();
        let set = write_files(dir.path(), &numbered(15, "CR2"));

        let report = ReferenceValidator::new(&PipelineConfig::strict())
            .validate(&set)
            .unwrap();
        assert_eq!(report.file_count, 15);
        assert_eq!(report.custody.len(), 15);
        assert_eq!(report.custody[3].basename, "IMG_0003.CR2");
        assert_eq!(report.custody[3].sha256.len(), 64);
        assert!(report.metadata.is_none());
    }

    #[test]
    fn test_mixed_case_extension_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut names = numbered(14, "CR2");
        names.push("IMG_LOWER.cr2".into());
        names.push("IMG_MIXED.Cr2".into());
        let set = write_files(dir.path(), &names);

        assert!(
            ReferenceValidator::new(&PipelineConfig::strict())
                .validate(&set)
                .is_ok()
        );
    }

    #[test]
    fn test_wrong_extension_fails_whole_set() {
        for bad in ["IMG_FAKE.jpg", "IMG_FAKE.JPG", "IMG_FAKE.Jpg", "IMG_FAKE.CR3", "IMG_FAKE"] {
            let dir = tempfile::tempdir().unwrap();
            let mut names = numbered(15, "CR2");
            names.push(bad.to_string());
            let set = write_files(dir.path(), &names);

            let err = ReferenceValidator::new(&PipelineConfig::strict())
                .validate(&set)
                .unwrap_err();
            match err {
                PrnuError::Policy(PolicyViolation::InvalidExtension { path, expected }) => {
                    assert!(path.ends_with(bad));
                    assert_eq!(expected, "CR2");
                }
                other => panic!("unexpected error for {}: {}", bad, other),
            }
        }
    }

    #[test]
    fn test_count_checked_before_extension() {
        let dir = tempfile::tempdir().unwrap();
        let set = write_files(dir.path(), &numbered(3, "jpg"));
        let err = ReferenceValidator::new(&PipelineConfig::strict())
            .validate(&set)
            .unwrap_err();
        assert!(matches!(
            err,
            PrnuError::Policy(PolicyViolation::InsufficientReferences { .. })
        ));
    }

    #[test]
    fn test_camera_available_profile_skips_extension_and_custody() {
        let dir = tempfile::tempdir().unwrap();
        let mut names = numbered(9, "CR2");
        names.push("extra.tif".into());
        let set = write_files(dir.path(), &names);

        let report = ReferenceValidator::new(&PipelineConfig::camera_available())
            .validate(&set)
            .unwrap();
        assert_eq!(report.file_count, 10);
        assert!(report.custody.is_empty());
    }

    #[test]
    fn test_unreadable_member_aborts_custody() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = write_files(dir.path(), &numbered(15, "CR2")).files().to_vec();
        set.push(dir.path().join("IMG_MISSING.CR2"));

        let err = ReferenceValidator::new(&PipelineConfig::strict())
            .validate(&ReferenceSet::new(set))
            .unwrap_err();
        assert!(matches!(err, PrnuError::Io(_)));
    }

    #[test]
    fn test_discover_matches_extension_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        write_files(
            dir.path(),
            &[
                "b.CR2".to_string(),
                "a.cr2".to_string(),
                "c.jpg".to_string(),
                "notes.txt".to_string(),
            ],
        );
        std::fs::create_dir(dir.path().join("nested.CR2")).unwrap();

        let set = ReferenceSet::discover(dir.path(), ".CR2").unwrap();
        let names = set
            .files()
            .iter()
            .map(|p| custody::basename(p))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.cr2", "b.CR2"]);
    }

    #[test]
    fn test_metadata_inspection_reports_missing_exif() {
        let dir = tempfile::tempdir().unwrap();
        let set = write_files(dir.path(), &numbered(2, "CR2"));
        let config = PipelineConfig {
            inspect_metadata: true,
            ..PipelineConfig::direct_compare()
        };

        let report = ReferenceValidator::new(&config).validate(&set).unwrap();
        let metadata = report.metadata.unwrap();
        assert_eq!(metadata.files.len(), 2);
        assert_eq!(metadata.warnings.len(), 2);
    }
}
