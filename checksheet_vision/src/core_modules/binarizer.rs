// THEORY:
// The `Binarizer` is the lowest layer of the segmentation stack. It turns a scanned
// page into an ink/no-ink mask that every later stage reads.
//
// Key architectural principles:
// 1.  **Fixed Threshold, Inverted**: Inspection sheets are dark print on light paper.
//     A gray sample at or below the threshold is ink (255); anything brighter is
//     background (0). No adaptive thresholding: the sheets are rendered from PDFs,
//     so the paper tone is stable.
// 2.  **Pure Function**: The mask is derived deterministically from the image and
//     the threshold. It is never persisted and never shared between calls.

pub mod binarizer {
    use image::{DynamicImage, GrayImage, Luma};

    /// Mask sample marking ink (foreground).
    pub const INK: u8 = 255;
    /// Mask sample marking paper (background).
    pub const BACKGROUND: u8 = 0;

    /// Converts any decoded image to single-channel intensity.
    pub fn to_gray(image: &DynamicImage) -> GrayImage {
        image.to_luma8()
    }

    /// Inverted fixed-threshold binarization: `gray <= threshold` becomes ink.
    pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
        let (width, height) = gray.dimensions();
        let mut mask = GrayImage::new(width, height);
        for (dst, src) in mask.pixels_mut().zip(gray.pixels()) {
            *dst = if src.0[0] <= threshold {
                Luma([INK])
            } else {
                Luma([BACKGROUND])
            };
        }
        mask
    }

    /// Grayscale conversion followed by binarization.
    pub fn binarize_image(image: &DynamicImage, threshold: u8) -> GrayImage {
        binarize(&to_gray(image), threshold)
    }
}
