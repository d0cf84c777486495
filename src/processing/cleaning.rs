use crate::config::CleaningConfig;
use crate::utils::ScanError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::filter3x3;
use log::warn;

/// 3x3 Gaussian kernel (1-2-1 outer product, normalised).
#[rustfmt::skip]
const GAUSSIAN_3X3: [f32; 9] = [
    1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0,
    2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0,
    1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0,
];

/// Grayscale, 3x3 Gaussian blur, then adaptive mean thresholding.
///
/// The output is pure black and white: holographic overlays and guilloche
/// backgrounds mostly fall above their local threshold while printed MRZ
/// glyphs stay dark.
pub fn clean_image(image: &DynamicImage, config: &CleaningConfig) -> Result<DynamicImage, ScanError> {
    let gray = image.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(ScanError::ImageProcessingError("Cannot clean an empty image".to_string()));
    }
    if config.block_size < 3 || config.block_size % 2 == 0 {
        return Err(ScanError::ImageProcessingError(format!(
            "Invalid threshold block size {}",
            config.block_size
        )));
    }
    let blurred: GrayImage = filter3x3::<_, f32, u8>(&gray, &GAUSSIAN_3X3);
    let binary = adaptive_threshold(&blurred, config.block_size / 2, config.offset);
    Ok(DynamicImage::ImageLuma8(binary))
}

/// Best-effort cleaning: on failure the source image is used as-is.
pub fn cleaned_or_source(image: &DynamicImage, config: &CleaningConfig) -> DynamicImage {
    match clean_image(image, config) {
        Ok(cleaned) => cleaned,
        Err(e) => {
            warn!("Cleaning failed, falling back to the source image: {}", e);
            image.clone()
        }
    }
}

/// Pixels brighter than `local_mean - offset` become white, the rest black.
///
/// The local mean is taken over a `(2 * radius + 1)` square clipped to the image.
pub fn adaptive_threshold(gray: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let stride = width as usize + 1;

    // Summed-area table with a zero row and column in front
    let mut integral = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += gray.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut result = GrayImage::new(width, height);
    for y in 0..height {
        let top = y.saturating_sub(radius) as usize;
        let bottom = (y + radius).min(height - 1) as usize + 1;
        for x in 0..width {
            let left = x.saturating_sub(radius) as usize;
            let right = (x + radius).min(width - 1) as usize + 1;

            let sum = integral[bottom * stride + right] + integral[top * stride + left]
                - integral[top * stride + right]
                - integral[bottom * stride + left];
            let count = ((bottom - top) * (right - left)) as u64;
            let threshold = (sum / count) as i64 - offset as i64;

            let value = if gray.get_pixel(x, y)[0] as i64 > threshold { 255 } else { 0 };
            result.put_pixel(x, y, Luma([value]));
        }
    }
    result
}
