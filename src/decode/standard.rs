use std::path::Path;

use image::ImageFormat;

use crate::{
    Raster,
    decode::RawDecoder,
    error::{PrnuError, Result},
};

/// Decoder for already-developed images (TIFF, PNG, ...), promoted to 16-bit RGB.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardImageDecoder;

impl StandardImageDecoder {
    pub fn supports(path: &Path) -> bool {
        ImageFormat::from_path(path).is_ok()
    }
}

impl RawDecoder for StandardImageDecoder {
    fn decode(&self, path: &Path) -> Result<Raster> {
        let image = image::open(path).map_err(|e| PrnuError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(image.to_rgb16())
    }
}
