use crate::models::ScoredCandidate;
use crate::processing::variants::TransformKind;
use crate::utils::ScanError;
use image::DynamicImage;
use std::path::Path;

/// Everything a decode engine may want to know about one attempt.
pub struct DecodeInput<'a> {
    pub image: &'a DynamicImage,
    /// The same pixels, saved as PNG inside the request workspace.
    pub path: &'a Path,
    pub transform: TransformKind,
    pub cleaned: bool,
}

/// Locates and decodes an MRZ in one image.
///
/// `Ok(None)` means no MRZ was found. `Err` is an engine failure; the search
/// treats both as "no result" for that attempt.
pub trait MrzDecoder {
    fn decode(&self, input: &DecodeInput) -> Result<Option<ScoredCandidate>, ScanError>;
}

impl<D: MrzDecoder + ?Sized> MrzDecoder for &D {
    fn decode(&self, input: &DecodeInput) -> Result<Option<ScoredCandidate>, ScanError> {
        (**self).decode(input)
    }
}

impl<D: MrzDecoder + ?Sized> MrzDecoder for Box<D> {
    fn decode(&self, input: &DecodeInput) -> Result<Option<ScoredCandidate>, ScanError> {
        (**self).decode(input)
    }
}

/// Adapts a closure into a decode engine.
pub struct FnDecoder<F>(F);

impl<F> FnDecoder<F>
where
    F: Fn(&DecodeInput) -> Result<Option<ScoredCandidate>, ScanError>,
{
    pub fn new(f: F) -> Self {
        FnDecoder(f)
    }
}

impl<F> MrzDecoder for FnDecoder<F>
where
    F: Fn(&DecodeInput) -> Result<Option<ScoredCandidate>, ScanError>,
{
    fn decode(&self, input: &DecodeInput) -> Result<Option<ScoredCandidate>, ScanError> {
        (self.0)(input)
    }
}

#[cfg(feature = "tesseract")]
pub use self::tesseract_engine::TesseractDecoder;

#[cfg(feature = "tesseract")]
mod tesseract_engine {
    use super::{DecodeInput, MrzDecoder};
    use crate::config::DecoderConfig;
    use crate::models::ScoredCandidate;
    use crate::processing::mrz;
    use crate::utils::ScanError;
    use log::debug;
    use tesseract::{PageSegMode, Tesseract};

    const MRZ_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789<";

    /// Tesseract OCR restricted to the MRZ alphabet, followed by MRZ parsing.
    pub struct TesseractDecoder {
        language: String,
        tessdata_dir: Option<String>,
    }

    impl TesseractDecoder {
        pub fn new(config: &DecoderConfig) -> Self {
            TesseractDecoder {
                language: config.language.clone(),
                tessdata_dir: config.tessdata_dir.clone(),
            }
        }

        fn read_text(&self, image_path: &str) -> Result<String, ScanError> {
            let mut tess = Tesseract::new(self.tessdata_dir.as_deref(), Some(self.language.as_str()))
                .map_err(|e| ScanError::DecodeError(format!("Tesseract init error: {}", e)))?
                .set_variable("tessedit_char_whitelist", MRZ_WHITELIST)
                .map_err(|e| ScanError::DecodeError(format!("Tesseract set variable error: {}", e)))?;

            // Set page seg mode separately as it modifies in-place
            tess.set_page_seg_mode(PageSegMode::PsmAuto);

            tess.set_image(image_path)
                .map_err(|e| ScanError::DecodeError(format!("Tesseract set image error: {}", e)))?
                .get_text()
                .map_err(|e| ScanError::DecodeError(format!("Tesseract error: {}", e)))
        }
    }

    impl MrzDecoder for TesseractDecoder {
        fn decode(&self, input: &DecodeInput) -> Result<Option<ScoredCandidate>, ScanError> {
            let path = input
                .path
                .to_str()
                .ok_or_else(|| ScanError::DecodeError("Failed to convert path to string".to_string()))?;
            let text = self.read_text(path)?;
            debug!("OCR text for {}:\n{}", input.transform, text);
            Ok(mrz::read_mrz(&text))
        }
    }
}
