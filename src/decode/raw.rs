//! RAW development through `rawloader` and the `bayer` demosaicer.
//!
//! Produces linear 16-bit RGB with camera white balance applied and no
//! brightness or tone adjustment: black level subtracted, white level mapped to
//! full scale, per-channel WB normalized to green, bilinear demosaic, then the
//! sensor crop reported by the camera.

use std::{io::Cursor, path::Path};

use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use log::debug;
use rawloader::{RawImage, RawImageData};

use crate::{
    Raster,
    decode::RawDecoder,
    error::{PrnuError, Result},
};

const FULL_SCALE: f32 = u16::MAX as f32;

#[derive(Debug, Default, Clone, Copy)]
pub struct RawloaderDecoder;

impl RawDecoder for RawloaderDecoder {
    fn decode(&self, path: &Path) -> Result<Raster> {
        let fail = |reason: String| PrnuError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let raw = rawloader::decode_file(path).map_err(|e| fail(e.to_string()))?;
        debug!(
            "Decoded {} {} RAW: {}x{}, cpp={}",
            raw.clean_make, raw.clean_model, raw.width, raw.height, raw.cpp
        );

        let samples = linearize(&raw);
        let developed = match raw.cpp {
            1 => demosaic(&raw, &samples).map_err(fail)?,
            3 => samples
                .iter()
                .map(|&v| (v * FULL_SCALE).clamp(0.0, FULL_SCALE) as u16)
                .collect(),
            other => return Err(fail(format!("unsupported {} components per pixel", other))),
        };

        let full = Raster::from_raw(raw.width as u32, raw.height as u32, developed)
            .ok_or_else(|| fail("developed buffer does not match sensor dimensions".into()))?;

        Ok(apply_crop(full, raw.crops))
    }
}

/// Black/white-level normalization and white balance, giving samples in `[0, 1]`
/// (values above 1 are clipped highlights after WB).
fn linearize(raw: &RawImage) -> Vec<f32> {
    let wb = white_balance(raw.wb_coeffs);

    match &raw.data {
        RawImageData::Integer(values) => values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let channel = channel_of(raw, i);
                let black = raw.blacklevels[channel] as f32;
                let white = raw.whitelevels[channel] as f32;
                let range = (white - black).max(1.0);
                ((v as f32 - black).max(0.0) / range) * wb[channel]
            })
            .collect(),
        RawImageData::Float(values) => values
            .iter()
            .enumerate()
            .map(|(i, &v)| v.max(0.0) * wb[channel_of(raw, i)])
            .collect(),
    }
}

fn channel_of(raw: &RawImage, index: usize) -> usize {
    if raw.cpp == 1 {
        let row = index / raw.width;
        let col = index % raw.width;
        raw.cfa.color_at(row, col).min(3)
    } else {
        (index % raw.cpp).min(3)
    }
}

fn white_balance(coeffs: [f32; 4]) -> [f32; 4] {
    let green = coeffs[1];
    if !green.is_finite() || green <= 0.0 {
        return [1.0; 4];
    }

    let mut wb = [1.0; 4];
    for (out, &c) in wb.iter_mut().zip(coeffs.iter()) {
        if c.is_finite() && c > 0.0 {
            *out = c / green;
        }
    }
    // Second green / emerald shares the green gain.
    wb[3] = 1.0;
    wb
}

fn cfa_pattern(raw: &RawImage) -> std::result::Result<CFA, String> {
    let code = |row, col| match raw.cfa.color_at(row, col) {
        0 => 'R',
        1 | 3 => 'G',
        2 => 'B',
        _ => '?',
    };
    let pattern: String = [code(0, 0), code(0, 1), code(1, 0), code(1, 1)]
        .iter()
        .collect();

    match pattern.as_str() {
        "RGGB" => Ok(CFA::RGGB),
        "BGGR" => Ok(CFA::BGGR),
        "GRBG" => Ok(CFA::GRBG),
        "GBRG" => Ok(CFA::GBRG),
        other => Err(format!("unsupported colour filter array {}", other)),
    }
}

fn demosaic(raw: &RawImage, samples: &[f32]) -> std::result::Result<Vec<u16>, String> {
    let cfa = cfa_pattern(raw)?;
    let (width, height) = (raw.width, raw.height);

    let bayer_bytes = samples
        .iter()
        .flat_map(|&v| ((v * FULL_SCALE).clamp(0.0, FULL_SCALE) as u16).to_le_bytes())
        .collect::<Vec<u8>>();

    let mut output = vec![0u8; width * height * 3 * 2];
    let mut raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut output);

    bayer::run_demosaic(
        &mut Cursor::new(&bayer_bytes[..]),
        BayerDepth::Depth16LE,
        cfa,
        Demosaic::Linear,
        &mut raster,
    )
    .map_err(|e| format!("demosaic failed: {:?}", e))?;

    Ok(output
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// `crops` is `[top, right, bottom, left]` in sensor pixels.
fn apply_crop(full: Raster, crops: [usize; 4]) -> Raster {
    let (width, height) = full.dimensions();
    let [top, right, bottom, left] = crops.map(|c| c as u32);

    if crops.iter().all(|&c| c == 0) || left + right >= width || top + bottom >= height {
        return full;
    }

    image::imageops::crop_imm(&full, left, top, width - left - right, height - top - bottom)
        .to_image()
}
