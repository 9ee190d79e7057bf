//! Chain-of-custody hashing for reference files.

use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Content digest of one reference file, keyed by basename for the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustodyRecord {
    pub basename: String,
    pub path: PathBuf,
    pub sha256: String,
}

impl CustodyRecord {
    pub fn for_file(path: &Path) -> Result<Self> {
        Ok(Self {
            basename: basename(path),
            path: path.to_path_buf(),
            sha256: sha256_file(path)?,
        })
    }
}

impl std::fmt::Display for CustodyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> SHA256: {}", self.basename, self.sha256)
    }
}

/// Hex SHA-256 of the file contents, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
