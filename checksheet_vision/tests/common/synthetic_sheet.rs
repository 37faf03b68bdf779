//! Synthetic inspection sheets for the integration tests: white paper, a content
//! frame inset from the page edge, full-width divider rules and checkbox squares.

use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};

pub const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
pub const INK: Rgb<u8> = Rgb([0, 0, 0]);
/// Columns of blank paper on each side of the content.
pub const INSET: u32 = 20;

pub struct SheetBuilder {
    image: RgbImage,
}

impl SheetBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, PAPER),
        }
    }

    fn fill(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        let (width, height) = self.image.dimensions();
        for y in y0..y1.min(height) {
            for x in x0..x1.min(width) {
                self.image.put_pixel(x, y, color);
            }
        }
    }

    /// A rule across the content frame, `thickness` rows tall, starting at `row`.
    pub fn rule(mut self, row: u32, thickness: u32) -> Self {
        let width = self.image.width();
        self.fill(INSET, row, width - INSET, row + thickness, INK);
        self
    }

    /// A rule covering only `[x0, x1)`.
    pub fn partial_rule(mut self, row: u32, thickness: u32, x0: u32, x1: u32) -> Self {
        self.fill(x0, row, x1, row + thickness, INK);
        self
    }

    /// A square with a black border around a flat gray interior.
    pub fn checkbox(mut self, x0: u32, y0: u32, side: u32) -> Self {
        let border = 2;
        self.fill(x0, y0, x0 + side, y0 + side, INK);
        self.fill(
            x0 + border,
            y0 + border,
            x0 + side - border,
            y0 + side - border,
            Rgb([90, 90, 90]),
        );
        self
    }

    pub fn build(self) -> DynamicImage {
        DynamicImage::ImageRgb8(self.image)
    }

    pub fn save(self, path: &Path) -> PathBuf {
        self.image.save(path).expect("synthetic sheet saved");
        path.to_path_buf()
    }
}

/// A page with one 25-row rule at every row in `rules`.
pub fn ruled_page(width: u32, height: u32, rules: &[u32]) -> DynamicImage {
    rules
        .iter()
        .fold(SheetBuilder::new(width, height), |sheet, &row| sheet.rule(row, 25))
        .build()
}

pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .expect("utf-8 file name")
                .to_string()
        })
        .collect()
}
