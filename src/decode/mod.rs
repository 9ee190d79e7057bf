//! Decoding of image files into 16-bit linear RGB rasters.

pub mod raw;
pub mod standard;

use std::path::Path;

use log::debug;

use crate::{Raster, error::Result};

pub use raw::RawloaderDecoder;
pub use standard::StandardImageDecoder;

/// Turns a file on disk into a [`Raster`].
///
/// Implementations must be shareable across threads; the fingerprint builder
/// may decode several references concurrently.
pub trait RawDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Raster>;
}

/// Uses the `image` crate for formats it recognises by extension, `rawloader`
/// for everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoDecoder {
    raw: RawloaderDecoder,
    standard: StandardImageDecoder,
}

impl AutoDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RawDecoder for AutoDecoder {
    fn decode(&self, path: &Path) -> Result<Raster> {
        if StandardImageDecoder::supports(path) {
            debug!("Decoding {} with the standard image decoder", path.display());
            self.standard.decode(path)
        } else {
            debug!("Decoding {} with the RAW decoder", path.display());
            self.raw.decode(path)
        }
    }
}
