// THEORY:
// The `Composite` builder reassembles the saved segments of one serial into a
// single reviewable sheet. It is stateless: paths in, one image out.
//
// Three layouts, one per physical document family:
// - **VerticalStack**: every segment resized to a common width, stacked top-down.
// - **LeftFixedRightStacked**: the first segment is a fixed left anchor at native
//   resolution; the rest are stacked into a right column which is then scaled to
//   the anchor's height.
// - **LeftMultiRightSingle**: the mirror image. All but the last segment form the
//   left column; the last one is scaled to that column's height on the right.
//
// A path that does not decode is skipped and reported. Only an empty usable set
// fails the composite, and then nothing is written.

use crate::config::CompositeConfig;
use crate::core_modules::image_helper::image_helper::{self, OutputFormat};
use crate::error::{Result, SheetError};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeLayout {
    VerticalStack,
    LeftFixedRightStacked,
    LeftMultiRightSingle,
}

/// An input that could not be used, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CompositeReport {
    pub output: PathBuf,
    pub layout: CompositeLayout,
    pub width: u32,
    pub height: u32,
    pub used: usize,
    pub skipped: Vec<SkippedInput>,
}

/// Decodes every path as RGB, in order. Unreadable paths are skipped with a warning.
pub fn load_inputs<P: AsRef<Path>>(paths: &[P]) -> (Vec<RgbImage>, Vec<SkippedInput>) {
    let mut images = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match image_helper::load(path) {
            Ok(image) => images.push(image.to_rgb8()),
            Err(err) => {
                warn!("composite input skipped: {err}");
                skipped.push(SkippedInput {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                });
            }
        }
    }
    (images, skipped)
}

fn scaled(length: u32, numerator: u32, denominator: u32) -> u32 {
    ((length as f64 * numerator as f64 / denominator.max(1) as f64).round() as u32).max(1)
}

/// Lanczos resize to `width`, aspect preserved. Images already that wide are copied.
pub fn resize_to_width(image: &RgbImage, width: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if w == width {
        return image.clone();
    }
    imageops::resize(image, width, scaled(h, width, w), FilterType::Lanczos3)
}

/// Resize to `height`, aspect preserved: cubic when enlarging, area-average when shrinking.
pub fn resize_to_height(image: &RgbImage, height: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if h == height {
        return image.clone();
    }
    let width = scaled(w, height, h);
    if height > h {
        imageops::resize(image, width, height, FilterType::CatmullRom)
    } else {
        imageops::thumbnail(image, width, height)
    }
}

/// Top-to-bottom concatenation. Narrower images are left-aligned on white.
pub fn stack_vertical(images: &[RgbImage]) -> RgbImage {
    let width = images.iter().map(RgbImage::width).max().unwrap_or(0);
    let height = images.iter().map(RgbImage::height).sum();
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    let mut y = 0i64;
    for image in images {
        imageops::replace(&mut canvas, image, 0, y);
        y += image.height() as i64;
    }
    canvas
}

/// Left-to-right concatenation. Shorter images are top-aligned on white.
pub fn concat_horizontal(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, left.width() as i64, 0);
    canvas
}

/// Resizes every image to the widest one and stacks them.
fn column(images: &[RgbImage]) -> RgbImage {
    let width = images.iter().map(RgbImage::width).max().unwrap_or(1);
    let resized: Vec<RgbImage> = images.iter().map(|i| resize_to_width(i, width)).collect();
    stack_vertical(&resized)
}

pub fn vertical_stack(images: &[RgbImage], target_width: Option<u32>) -> Option<RgbImage> {
    let width = target_width.or_else(|| images.iter().map(RgbImage::width).max())?;
    if images.is_empty() {
        return None;
    }
    let resized: Vec<RgbImage> = images.iter().map(|i| resize_to_width(i, width)).collect();
    Some(stack_vertical(&resized))
}

pub fn left_fixed_right_stacked(images: &[RgbImage]) -> Option<RgbImage> {
    let (left, rest) = images.split_first()?;
    if rest.is_empty() {
        return Some(left.clone());
    }
    let right = resize_to_height(&column(rest), left.height());
    Some(concat_horizontal(left, &right))
}

pub fn left_multi_right_single(images: &[RgbImage]) -> Option<RgbImage> {
    let (right, rest) = images.split_last()?;
    if rest.is_empty() {
        return Some(right.clone());
    }
    let left = column(rest);
    let right = resize_to_height(right, left.height());
    Some(concat_horizontal(&left, &right))
}

/// Builds the composite for `paths` and writes it to `output`.
/// The format follows the extension: PNG, or JPEG at the configured quality.
pub fn compose<P: AsRef<Path>>(
    layout: CompositeLayout,
    paths: &[P],
    output: &Path,
    config: &CompositeConfig,
) -> Result<CompositeReport> {
    let format = OutputFormat::from_path(output, config.jpeg_quality)?;
    let (images, skipped) = load_inputs(paths);
    if images.is_empty() {
        warn!(
            "composite {} not written: none of {} inputs were usable",
            output.display(),
            paths.len()
        );
        return Err(SheetError::NoUsableImages);
    }

    let sheet = match layout {
        CompositeLayout::VerticalStack => vertical_stack(&images, config.target_width),
        CompositeLayout::LeftFixedRightStacked => left_fixed_right_stacked(&images),
        CompositeLayout::LeftMultiRightSingle => left_multi_right_single(&images),
    }
    .ok_or(SheetError::NoUsableImages)?;

    image_helper::save_rgb(output, &sheet, format)?;
    info!(
        "composite {:?} written to {} ({}x{}, {} inputs, {} skipped)",
        layout,
        output.display(),
        sheet.width(),
        sheet.height(),
        images.len(),
        skipped.len()
    );

    Ok(CompositeReport {
        output: output.to_path_buf(),
        layout,
        width: sheet.width(),
        height: sheet.height(),
        used: images.len(),
        skipped,
    })
}
