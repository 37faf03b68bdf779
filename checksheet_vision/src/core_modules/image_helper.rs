// Raster I/O for the engine: decode sources, encode segments, composites and
// preview overlays. Output format follows the requested file extension.

pub mod image_helper {
    use crate::error::{Result, SheetError};
    use image::codecs::jpeg::JpegEncoder;
    use image::codecs::png::PngEncoder;
    use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage};
    use std::fs::File;
    use std::io::BufWriter;
    use std::path::Path;

    /// Encodings the engine writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum OutputFormat {
        Png,
        Jpeg { quality: u8 },
    }

    impl OutputFormat {
        /// PNG for `.png`, JPEG for `.jpg`/`.jpeg`, anything else is unsupported.
        pub fn from_path(path: &Path, jpeg_quality: u8) -> Result<Self> {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            match extension.as_deref() {
                Some("png") => Ok(OutputFormat::Png),
                Some("jpg") | Some("jpeg") => Ok(OutputFormat::Jpeg {
                    quality: jpeg_quality,
                }),
                _ => Err(SheetError::UnsupportedOutputFormat {
                    path: path.to_path_buf(),
                }),
            }
        }
    }

    /// Decodes an image file; decode failures become `UnreadableInput`.
    pub fn load(path: &Path) -> Result<DynamicImage> {
        image::open(path).map_err(|source| SheetError::UnreadableInput {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes an RGB image in the given format, creating parent directories.
    pub fn save_rgb(path: &Path, image: &RgbImage, format: OutputFormat) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let output = BufWriter::new(File::create(path)?);
        let (width, height) = image.dimensions();
        match format {
            OutputFormat::Png => {
                PngEncoder::new(output).write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)?
            }
            OutputFormat::Jpeg { quality } => JpegEncoder::new_with_quality(output, quality)
                .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)?,
        }
        Ok(())
    }

    /// Writes as PNG regardless of extension. Segments are always saved lossless.
    pub fn save_png(path: &Path, image: &RgbImage) -> Result<()> {
        save_rgb(path, image, OutputFormat::Png)
    }

    /// PNG bytes in memory, for previews handed back to a caller.
    pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let (width, height) = image.dimensions();
        PngEncoder::new(&mut bytes).write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::image_helper::*;
    use crate::error::SheetError;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    #[test]
    fn format_follows_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a/b.PNG"), 95).unwrap(), OutputFormat::Png);
        assert_eq!(
            OutputFormat::from_path(Path::new("sheet.jpeg"), 90).unwrap(),
            OutputFormat::Jpeg { quality: 90 }
        );
        assert!(matches!(
            OutputFormat::from_path(Path::new("sheet.bmp"), 95),
            Err(SheetError::UnsupportedOutputFormat { .. })
        ));
    }

    #[test]
    fn save_white_file_and_read_it_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("white_file.png");
        let image = RgbImage::from_pixel(50, 30, Rgb([255, 255, 255]));

        save_png(&path, &image).expect("Error Saving File.");
        let loaded = load(&path).expect("readable").to_rgb8();
        assert_eq!(loaded.dimensions(), (50, 30));
        assert_eq!(loaded.get_pixel(10, 10), &Rgb([255, 255, 255]));
    }

    #[test]
    fn save_gradient_jpeg() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gradient_file.jpg");
        let mut image = RgbImage::new(64, 64);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            let v = (x * 4) as u8;
            *pixel = Rgb([v, v, v]);
        }

        save_rgb(&path, &image, OutputFormat::Jpeg { quality: 95 }).expect("Error Saving File.");
        assert_eq!(load(&path).expect("readable").width(), 64);
    }

    #[test]
    fn unreadable_file_is_reported_as_such() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").expect("write");
        assert!(matches!(load(&path), Err(SheetError::UnreadableInput { .. })));
    }

    #[test]
    fn png_bytes_carry_the_signature() {
        let bytes = encode_png(&RgbImage::new(4, 4)).expect("encodes");
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }
}
