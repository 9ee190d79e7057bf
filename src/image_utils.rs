use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayView2, s};

use crate::Raster;

const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Rec.601 luminance of a 16-bit RGB raster, indexed `[row, column]`.
pub fn rgb_to_luma(raster: &Raster) -> Array2<f64> {
    let (width, height) = raster.dimensions();
    let mut luma = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in raster.enumerate_pixels() {
        luma[[y as usize, x as usize]] = LUMA_R * pixel[0] as f64
            + LUMA_G * pixel[1] as f64
            + LUMA_B * pixel[2] as f64;
    }

    luma
}

/// Bandwidth used when no sigma is given for a kernel of `size` taps.
pub fn default_sigma(size: usize) -> f64 {
    0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian taps. A non-positive `sigma` selects [`default_sigma`].
pub fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f64> {
    let sigma = if sigma > 0.0 { sigma } else { default_sigma(size) };
    let center = (size as f64 - 1.0) / 2.0;
    let scale = -0.5 / (sigma * sigma);

    let taps = (0..size)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect::<Vec<_>>();

    let sum = taps.iter().sum::<f64>();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Mirrors an out-of-range index without repeating the edge sample (`dcb|abcd|cba`).
pub fn reflect_101(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }

    let last = len as isize - 1;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}

/// Separable convolution of `input` with `kernel` along rows then columns.
pub fn separable_blur(input: &Array2<f64>, kernel: &[f64]) -> Array2<f64> {
    let (height, width) = input.dim();
    let half = (kernel.len() / 2) as isize;

    let mut horizontal = Array2::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - half, width);
                sum += input[[y, sx]] * weight;
            }
            horizontal[[y, x]] = sum;
        }
    }

    let mut output = Array2::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect_101(y as isize + k as isize - half, height);
                sum += horizontal[[sy, x]] * weight;
            }
            output[[y, x]] = sum;
        }
    }

    output
}

/// Top-left aligned view of at most `height` x `width` elements.
pub fn crop_top_left(arr: &Array2<f64>, height: usize, width: usize) -> ArrayView2<'_, f64> {
    let (h, w) = arr.dim();
    arr.slice(s![..height.min(h), ..width.min(w)])
}

/// Population standard deviation; zero for an empty grid.
///
/// Deviations are taken from the first sample before averaging, so a constant
/// grid yields exactly zero.
pub fn std_dev(arr: &ArrayView2<f64>) -> f64 {
    let Some(&pivot) = arr.iter().next() else {
        return 0.0;
    };
    arr.mapv(|v| v - pivot).std(0.0)
}

pub fn array_to_gray(arr: &Array2<f64>) -> GrayImage {
    let (height, width) = arr.dim();
    let mut image = GrayImage::new(width as u32, height as u32);

    for y in 0..height {
        for x in 0..width {
            let value = arr[[y, x]].clamp(0.0, 255.0) as u8;
            image.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    image
}

pub fn normalize_to_u8(arr: &Array2<f64>) -> Array2<f64> {
    let min = arr.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = arr.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range < 1e-10 {
        Array2::zeros(arr.dim())
    } else {
        arr.mapv(|v| ((v - min) / range) * 255.0)
    }
}
