use std::{
    collections::BTreeSet,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::error::Result;

/// Editing tools whose signature in a "camera original" is a red flag.
const EDITING_SOFTWARE: [&str; 5] = ["photoshop", "lightroom", "gimp", "paint", "affinity"];

#[derive(Debug, Clone, Serialize)]
pub struct CameraMetadata {
    pub path: PathBuf,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub software: Option<String>,
    pub date_time_original: Option<String>,
    pub suspicious_indicators: Vec<String>,
}

impl CameraMetadata {
    pub fn camera(&self) -> Option<String> {
        match (&self.camera_make, &self.camera_model) {
            (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
            (None, Some(model)) => Some(model.clone()),
            (Some(make), None) => Some(make.clone()),
            (None, None) => None,
        }
    }
}

/// Advisory findings over a whole reference set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataSummary {
    pub files: Vec<CameraMetadata>,
    pub distinct_cameras: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct ExifExtractor;

impl ExifExtractor {
    pub fn extract<P: AsRef<Path>>(path: P) -> Result<CameraMetadata> {
        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let path = path.as_ref().to_path_buf();

        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif_data) => Ok(Self::parse_exif(path, &exif_data)),
            Err(_) => Ok(CameraMetadata {
                path,
                camera_make: None,
                camera_model: None,
                software: None,
                date_time_original: None,
                suspicious_indicators: vec!["No EXIF data found".into()],
            }),
        }
    }

    fn parse_exif(path: PathBuf, exif: &exif::Exif) -> CameraMetadata {
        let text = |tag| {
            exif.get_field(tag, exif::In::PRIMARY)
                .map(|f| f.display_value().to_string().trim_matches('"').trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let camera_make = text(exif::Tag::Make);
        let camera_model = text(exif::Tag::Model);
        let software = text(exif::Tag::Software);
        let date_time_original = text(exif::Tag::DateTimeOriginal);

        let mut suspicious_indicators = Vec::new();

        if let Some(ref sw) = software {
            let sw_lower = sw.to_lowercase();
            if EDITING_SOFTWARE.iter().any(|tool| sw_lower.contains(tool)) {
                suspicious_indicators.push(format!("Edited with: {}", sw));
            }
        }

        if camera_make.is_none() && camera_model.is_none() {
            suspicious_indicators.push("Camera make and model missing".into());
        }

        if date_time_original.is_none() {
            suspicious_indicators.push("Original datetime missing (may be stripped)".into());
        }

        CameraMetadata {
            path,
            camera_make,
            camera_model,
            software,
            date_time_original,
            suspicious_indicators,
        }
    }

    /// Reads every file and flags editing traces and mixed camera bodies.
    pub fn summarize(files: &[PathBuf]) -> Result<MetadataSummary> {
        let files = files
            .iter()
            .map(Self::extract)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::summarize_metadata(files))
    }

    pub fn summarize_metadata(files: Vec<CameraMetadata>) -> MetadataSummary {
        let distinct_cameras = files
            .iter()
            .filter_map(CameraMetadata::camera)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        let mut warnings = files
            .iter()
            .flat_map(|m| {
                let name = m
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                m.suspicious_indicators
                    .iter()
                    .map(move |s| format!("{}: {}", name, s))
            })
            .collect::<Vec<_>>();

        if distinct_cameras.len() > 1 {
            warnings.push(format!(
                "Reference set mixes {} camera bodies: {}",
                distinct_cameras.len(),
                distinct_cameras.join(", ")
            ));
        }

        MetadataSummary {
            files,
            distinct_cameras,
            warnings,
        }
    }
}
