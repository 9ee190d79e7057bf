use std::path::{Path, PathBuf};

use image::{GrayImage, Rgb, RgbImage, imageops::FilterType};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use ndarray::Array2;

use crate::{
    config::VisualizationConfig,
    error::Result,
    image_utils::{array_to_gray, normalize_to_u8},
};

/// One titled grid of a side-by-side comparison.
pub struct Panel<'a> {
    pub title: &'a str,
    pub data: &'a Array2<f64>,
}

/// Persists a visual aid for a comparison. Produces nothing the score depends on.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, left: Panel<'_>, right: Panel<'_>, output: &Path) -> Result<()>;
}

pub struct Visualizer {
    config: VisualizationConfig,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            config: VisualizationConfig::default(),
        }
    }

    pub fn with_config(config: VisualizationConfig) -> Self {
        Self { config }
    }

    /// Min/max autoscaled grayscale rendering of a residual grid.
    pub fn residual_to_gray(&self, data: &Array2<f64>) -> GrayImage {
        array_to_gray(&normalize_to_u8(data))
    }

    fn panel_image(&self, data: &Array2<f64>) -> RgbImage {
        let gray = self.residual_to_gray(data);
        let (width, height) = gray.dimensions();
        let rgb = image::DynamicImage::ImageLuma8(gray).to_rgb8();

        let max_width = self.config.max_panel_width;
        if width <= max_width || width == 0 {
            return rgb;
        }

        let scaled_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
        image::imageops::resize(&rgb, max_width, scaled_height, FilterType::Triangle)
    }

    pub fn create_comparison(&self, images: &[(&str, &RgbImage)]) -> RgbImage {
        if images.is_empty() {
            return RgbImage::new(1, 1);
        }

        let padding = self.config.padding;
        let label_height = 20u32;

        let max_height = images
            .iter()
            .map(|(_, img)| img.height())
            .max()
            .unwrap_or(0);

        let total_width = images.iter().map(|(_, img)| img.width()).sum::<u32>()
            + padding * (images.len() as u32 + 1);
        let total_height = max_height + label_height + padding * 2;

        let mut result = RgbImage::from_pixel(total_width, total_height, Rgb([40, 40, 40]));

        let mut x_offset = padding;
        for (label, img) in images {
            self.draw_label(&mut result, x_offset, padding / 2, label, Rgb([255, 255, 255]));

            let y_offset = label_height + padding;
            image::imageops::replace(&mut result, *img, x_offset as i64, y_offset as i64);

            if img.width() > 0 && img.height() > 0 {
                draw_hollow_rect_mut(
                    &mut result,
                    Rect::at(x_offset as i32 - 1, y_offset as i32 - 1)
                        .of_size(img.width() + 2, img.height() + 2),
                    Rgb([160, 160, 160]),
                );
            }

            x_offset += img.width() + padding;
        }

        result
    }

    pub fn side_by_side(&self, left: &Panel<'_>, right: &Panel<'_>) -> RgbImage {
        let left_image = self.panel_image(left.data);
        let right_image = self.panel_image(right.data);
        self.create_comparison(&[(left.title, &left_image), (right.title, &right_image)])
    }

    // Block glyphs only; the title length is what the reader sees.
    fn draw_label(&self, image: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
        let (width, height) = image.dimensions();
        let char_width = 6;
        let char_height = 8;

        let bg_width = (text.len() * char_width + 4) as u32;
        let bg_height = (char_height + 4) as u32;

        for dy in 0..bg_height {
            for dx in 0..bg_width {
                let px = x + dx;
                let py = y + dy;
                if px < width && py < height {
                    image.put_pixel(px, py, Rgb([0, 0, 0]));
                }
            }
        }

        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            let cx = x + 2 + (i * char_width) as u32;
            let cy = y + 2;

            for dy in 0..(char_height as u32) {
                for dx in 0..((char_width - 1) as u32) {
                    let px = cx + dx;
                    let py = cy + dy;
                    if px < width && py < height {
                        image.put_pixel(px, py, color);
                    }
                }
            }
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes the side-by-side comparison as PNG.
pub struct PngReportRenderer {
    visualizer: Visualizer,
}

impl PngReportRenderer {
    pub fn new(config: VisualizationConfig) -> Self {
        Self {
            visualizer: Visualizer::with_config(config),
        }
    }
}

impl ReportRenderer for PngReportRenderer {
    fn render(&self, left: Panel<'_>, right: Panel<'_>, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.visualizer.side_by_side(&left, &right).save(output)?;
        Ok(())
    }
}

/// `<dir>/<prefix><name>.png`
pub fn output_path(dir: &Path, prefix: &str, name: &str) -> PathBuf {
    dir.join(format!("{}{}.png", prefix, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_residual_autoscaled_to_full_range() {
        let data = array![[-2.0, 0.0], [1.0, 2.0]];
        let gray = Visualizer::new().residual_to_gray(&data);
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_side_by_side_layout() {
        let left = Array2::from_shape_fn((30, 40), |(y, x)| (x + y) as f64);
        let right = Array2::from_shape_fn((20, 50), |(y, x)| (x * y) as f64);
        let vis = Visualizer::new().side_by_side(
            &Panel {
                title: "Reference PRNU Fingerprint",
                data: &left,
            },
            &Panel {
                title: "Test Image Residual",
                data: &right,
            },
        );
        // 10 + 40 + 10 + 50 + 10 wide, 30 + 20 + 2 * 10 tall
        assert_eq!(vis.dimensions(), (120, 70));
    }

    #[test]
    fn test_wide_panels_downscaled() {
        let config = VisualizationConfig {
            max_panel_width: 100,
            ..VisualizationConfig::default()
        };
        let data = Array2::from_shape_fn((200, 400), |(y, x)| (x ^ y) as f64);
        let panel = Visualizer::with_config(config).panel_image(&data);
        assert_eq!(panel.dimensions(), (100, 50));
    }

    #[test]
    fn test_png_renderer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(&dir.path().join("out"), "PRNU_strict_", "IMG_0001.CR2");
        let data = Array2::from_shape_fn((8, 8), |(y, x)| (x as f64) - (y as f64));

        PngReportRenderer::new(VisualizationConfig::default())
            .render(
                Panel {
                    title: "a",
                    data: &data,
                },
                Panel {
                    title: "b",
                    data: &data,
                },
                &path,
            )
            .unwrap();

        assert!(path.ends_with("PRNU_strict_IMG_0001.CR2.png"));
        assert!(path.exists());
    }
}
