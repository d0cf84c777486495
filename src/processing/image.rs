use crate::utils::ScanError;
use image::{DynamicImage, Rgb, RgbImage};
use log::debug;

pub struct ImageProcessor;

impl ImageProcessor {
    /// Decode an uploaded image and make it safe for the transform pipeline.
    pub fn load(image_bytes: &[u8]) -> Result<DynamicImage, ScanError> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| ScanError::ImageProcessingError(format!("Failed to open image: {}", e)))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(ScanError::ImageProcessingError("Image has no pixels".to_string()));
        }
        Ok(Self::normalize_color(image))
    }

    /// Flatten an image with an alpha channel onto white, giving opaque RGB.
    ///
    /// Images without alpha are returned untouched.
    pub fn normalize_color(image: DynamicImage) -> DynamicImage {
        if !image.color().has_alpha() {
            return image;
        }
        debug!("Flattening {:?} image onto white background", image.color());

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut flattened = RgbImage::new(width, height);
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            let blend = |channel: u8| -> u8 {
                ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8
            };
            flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
        }
        DynamicImage::ImageRgb8(flattened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn test_transparent_pixels_become_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let flattened = ImageProcessor::normalize_color(DynamicImage::ImageRgba8(rgba));
        assert_eq!(flattened.color(), ColorType::Rgb8);
        let rgb = flattened.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_opaque_image_untouched() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(3, 3));
        let result = ImageProcessor::normalize_color(gray.clone());
        assert_eq!(result, gray);
    }

    #[test]
    fn test_load_png_with_alpha() {
        let rgba = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let loaded = ImageProcessor::load(&bytes).unwrap();
        assert_eq!(loaded.color(), ColorType::Rgb8);
        assert_eq!(loaded.to_rgb8().get_pixel(0, 0), &Rgb([127, 127, 127]));
    }

    #[test]
    fn test_load_garbage_fails() {
        assert!(matches!(
            ImageProcessor::load(b"definitely not an image"),
            Err(ScanError::ImageProcessingError(_))
        ));
    }
}
