use crate::config::{CleaningConfig, SearchConfig, MAJOR_ANGLES, MICRO_ANGLES};
use crate::processing::cleaning;
use crate::utils::ScanError;
use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use log::{debug, warn};
use std::fmt;

/// Fill colour for canvas area uncovered by a rotation.
const CANVAS_FILL: Rgb<u8> = Rgb([255, 255, 255]);

/// How a variant was derived from the base image. Angles are degrees,
/// counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Identity,
    MicroRotation(i32),
    MajorRotation(i32),
    BottomCrop,
}

impl TransformKind {
    /// The fixed walk order: identity, small skews, full rotations, bottom crop.
    pub fn plan(config: &SearchConfig) -> Vec<TransformKind> {
        let mut plan = vec![TransformKind::Identity];
        plan.extend(config.micro_angles.iter().map(|&a| TransformKind::MicroRotation(a)));
        plan.extend(config.major_angles.iter().map(|&a| TransformKind::MajorRotation(a)));
        plan.push(TransformKind::BottomCrop);
        plan
    }

    /// Short name used for workspace files and logs.
    pub fn label(&self) -> String {
        match self {
            TransformKind::Identity => "identity".to_string(),
            TransformKind::MicroRotation(a) => format!("micro_{}", a),
            TransformKind::MajorRotation(a) => format!("major_{}", a),
            TransformKind::BottomCrop => "bottom_crop".to_string(),
        }
    }

    /// Produce this transform of `base`. Always applied to the base image,
    /// never to another variant.
    pub fn apply(&self, base: &DynamicImage, crop_start: f64) -> Result<DynamicImage, ScanError> {
        if base.width() == 0 || base.height() == 0 {
            return Err(ScanError::ImageProcessingError(format!(
                "Cannot apply {} to an empty image",
                self
            )));
        }
        match *self {
            TransformKind::Identity => Ok(base.clone()),
            TransformKind::MicroRotation(angle) if MICRO_ANGLES.contains(&angle) => {
                Ok(rotate_expanded(base, angle as f32))
            }
            // Positive angles turn counter-clockwise, image's rotateN turn clockwise
            TransformKind::MajorRotation(90) => Ok(base.rotate270()),
            TransformKind::MajorRotation(180) => Ok(base.rotate180()),
            TransformKind::MajorRotation(270) => Ok(base.rotate90()),
            TransformKind::BottomCrop => bottom_crop(base, crop_start),
            TransformKind::MicroRotation(angle) | TransformKind::MajorRotation(angle) => {
                Err(ScanError::ImageProcessingError(format!(
                    "Unsupported rotation angle {} (micro: {:?}, major: {:?})",
                    angle, MICRO_ANGLES, MAJOR_ANGLES
                )))
            }
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One candidate image plus where it came from.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: TransformKind,
    pub cleaned: bool,
    pub image: DynamicImage,
}

impl ImageVariant {
    pub fn new(kind: TransformKind, image: DynamicImage) -> Self {
        ImageVariant {
            kind,
            cleaned: false,
            image,
        }
    }

    pub fn label(&self) -> String {
        if self.cleaned {
            format!("{}_clean", self.kind.label())
        } else {
            self.kind.label()
        }
    }

    /// The thresholded derivative of this variant, computed on demand.
    ///
    /// Returns `None` when called on a variant that is already cleaned. When
    /// cleaning fails the derivative carries the unmodified source pixels.
    pub fn cleaned_derivative(&self, config: &CleaningConfig) -> Option<ImageVariant> {
        if self.cleaned {
            return None;
        }
        Some(ImageVariant {
            kind: self.kind,
            cleaned: true,
            image: cleaning::cleaned_or_source(&self.image, config),
        })
    }
}

/// Lazily yields the variants of one base image in plan order.
///
/// A transform that fails is logged and skipped; the rest still come out.
pub struct VariantGenerator<'a> {
    base: &'a DynamicImage,
    plan: std::vec::IntoIter<TransformKind>,
    crop_start: f64,
}

impl<'a> VariantGenerator<'a> {
    pub fn new(base: &'a DynamicImage, config: &SearchConfig) -> Self {
        VariantGenerator {
            base,
            plan: TransformKind::plan(config).into_iter(),
            crop_start: config.bottom_crop_start,
        }
    }
}

impl<'a> Iterator for VariantGenerator<'a> {
    type Item = ImageVariant;

    fn next(&mut self) -> Option<ImageVariant> {
        for kind in self.plan.by_ref() {
            match kind.apply(self.base, self.crop_start) {
                Ok(image) => {
                    debug!("Generated variant {} ({}x{})", kind, image.width(), image.height());
                    return Some(ImageVariant::new(kind, image));
                }
                Err(e) => warn!("Skipping variant {}: {}", kind, e),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.plan.len()))
    }
}

/// Rotate about the centre on a canvas grown to hold the whole rotated image.
fn rotate_expanded(image: &DynamicImage, degrees: f32) -> DynamicImage {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());

    let canvas_width = ((width as f32 * cos + height as f32 * sin).ceil() as u32).max(width);
    let canvas_height = ((width as f32 * sin + height as f32 * cos).ceil() as u32).max(height);

    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, CANVAS_FILL);
    imageops::overlay(
        &mut canvas,
        &rgb,
        ((canvas_width - width) / 2) as i64,
        ((canvas_height - height) / 2) as i64,
    );

    // rotate_about_center turns clockwise
    let rotated = rotate_about_center(&canvas, -theta, Interpolation::Bilinear, CANVAS_FILL);
    DynamicImage::ImageRgb8(rotated)
}

fn bottom_crop(image: &DynamicImage, crop_start: f64) -> Result<DynamicImage, ScanError> {
    let (width, height) = (image.width(), image.height());
    let top = (height as f64 * crop_start).floor() as u32;
    if top >= height {
        return Err(ScanError::ImageProcessingError(format!(
            "Bottom crop from row {} leaves nothing of a {} px tall image",
            top, height
        )));
    }
    Ok(image.crop_imm(0, top, width, height - top))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 40, 40])))
    }

    #[test]
    fn test_default_plan_order() {
        let plan = TransformKind::plan(&SearchConfig::default());
        assert_eq!(
            plan,
            vec![
                TransformKind::Identity,
                TransformKind::MicroRotation(-3),
                TransformKind::MicroRotation(3),
                TransformKind::MicroRotation(-5),
                TransformKind::MicroRotation(5),
                TransformKind::MajorRotation(90),
                TransformKind::MajorRotation(180),
                TransformKind::MajorRotation(270),
                TransformKind::BottomCrop,
            ]
        );
    }

    #[test]
    fn test_generator_yields_every_variant_uncleaned() {
        let image = base(200, 100);
        let variants: Vec<ImageVariant> =
            VariantGenerator::new(&image, &SearchConfig::default()).collect();
        assert_eq!(variants.len(), 9);
        assert!(variants.iter().all(|v| !v.cleaned));
        assert_eq!(variants[0].image, image);
    }

    #[test]
    fn test_major_rotation_swaps_dimensions() {
        let image = base(200, 100);
        for angle in [90, 270] {
            let rotated = TransformKind::MajorRotation(angle).apply(&image, 0.65).unwrap();
            assert_eq!((rotated.width(), rotated.height()), (100, 200));
        }
        let flipped = TransformKind::MajorRotation(180).apply(&image, 0.65).unwrap();
        assert_eq!((flipped.width(), flipped.height()), (200, 100));
    }

    #[test]
    fn test_major_rotation_is_counter_clockwise() {
        let mut rgb = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        rgb.put_pixel(3, 0, Rgb([0, 0, 0]));
        let rotated = TransformKind::MajorRotation(90)
            .apply(&DynamicImage::ImageRgb8(rgb), 0.65)
            .unwrap()
            .to_rgb8();
        // Top-right corner moves to top-left
        assert_eq!(rotated.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_micro_rotation_expands_canvas() {
        let image = base(200, 100);
        let rotated = TransformKind::MicroRotation(5).apply(&image, 0.65).unwrap();
        assert!(rotated.width() > 200);
        assert!(rotated.height() > 100);
        // Corners of the grown canvas are background fill
        assert_eq!(rotated.to_rgb8().get_pixel(0, 0), &CANVAS_FILL);
    }

    #[test]
    fn test_bottom_crop_keeps_lower_35_percent() {
        let image = base(200, 100);
        let cropped = TransformKind::BottomCrop.apply(&image, 0.65).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (200, 35));
    }

    #[test]
    fn test_bottom_crop_starts_at_65_percent_row() {
        // 0.65 * 180 is exactly 117: rows 117..180 survive
        let cropped = TransformKind::BottomCrop.apply(&base(10, 180), 0.65).unwrap();
        assert_eq!(cropped.height(), 63);

        let start = SearchConfig::default().bottom_crop_start;
        for height in 1..=4000u32 {
            let image = DynamicImage::ImageLuma8(image::GrayImage::new(1, height));
            let expected_top = height * 65 / 100;
            match bottom_crop(&image, start) {
                Ok(cropped) => assert_eq!(cropped.height(), height - expected_top, "height {}", height),
                Err(_) => assert_eq!(expected_top, height, "height {}", height),
            }
        }
    }

    #[test]
    fn test_unsupported_angle_is_skipped() {
        let image = base(50, 50);
        assert!(TransformKind::MicroRotation(7).apply(&image, 0.65).is_err());
        let config = SearchConfig {
            micro_angles: vec![-3, 7],
            major_angles: vec![],
            ..SearchConfig::default()
        };
        let kinds: Vec<TransformKind> = VariantGenerator::new(&image, &config).map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![TransformKind::Identity, TransformKind::MicroRotation(-3), TransformKind::BottomCrop]
        );
    }

    #[test]
    fn test_empty_image_yields_nothing() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert_eq!(VariantGenerator::new(&image, &SearchConfig::default()).count(), 0);
    }

    #[test]
    fn test_cleaned_derivative_only_once() {
        let variant = ImageVariant::new(TransformKind::Identity, base(30, 30));
        let cleaned = variant.cleaned_derivative(&CleaningConfig::default()).unwrap();
        assert!(cleaned.cleaned);
        assert_eq!(cleaned.kind, TransformKind::Identity);
        assert_eq!(cleaned.label(), "identity_clean");
        assert!(cleaned.cleaned_derivative(&CleaningConfig::default()).is_none());
    }
}
