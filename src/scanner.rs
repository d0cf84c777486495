use crate::config::ScanConfig;
use crate::models::{DocumentRecord, ScanEnvelope};
use crate::processing::pdf::is_pdf;
use crate::processing::{
    CandidateSearch, EmbeddedImageRenderer, FieldCorrection, ImageProcessor, MrzDecoder, PageRenderer,
    StopReason, VariantGenerator,
};
use crate::utils::{FailureKind, ScanError, Workspace};
use image::DynamicImage;
use log::{debug, error, info, warn};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Entry point for a single document submission.
///
/// Owns the decode engine, the PDF page renderer and the configuration. Each
/// call runs in its own [`Workspace`], which is gone again by the time the
/// call returns.
pub struct DocumentScanner<D, R = EmbeddedImageRenderer> {
    decoder: D,
    renderer: R,
    config: ScanConfig,
}

impl<D: MrzDecoder> DocumentScanner<D> {
    pub fn new(decoder: D, config: ScanConfig) -> Self {
        DocumentScanner {
            decoder,
            renderer: EmbeddedImageRenderer,
            config,
        }
    }
}

impl<D: MrzDecoder, R: PageRenderer> DocumentScanner<D, R> {
    pub fn with_renderer(decoder: D, renderer: R, config: ScanConfig) -> Self {
        DocumentScanner {
            decoder,
            renderer,
            config,
        }
    }

    /// Scan a file from disk. Read failures are reported in the envelope.
    pub fn scan_file(&self, path: &Path) -> ScanEnvelope {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match fs::read(path) {
            Ok(bytes) => self.scan_bytes(&bytes, &file_name),
            Err(e) => Self::envelope(Err(ScanError::UploadError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))),
        }
    }

    /// Scan an uploaded image or PDF. Never fails: every outcome, including
    /// a panic somewhere in the pipeline, ends up in the envelope.
    pub fn scan_bytes(&self, bytes: &[u8], file_name: &str) -> ScanEnvelope {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.extract(bytes, file_name)))
            .unwrap_or_else(|_| Err(ScanError::Internal("processing panicked".to_string())));
        Self::envelope(result)
    }

    /// Run the full pipeline and return the normalised record.
    pub fn extract(&self, bytes: &[u8], file_name: &str) -> Result<DocumentRecord, ScanError> {
        if bytes.is_empty() {
            return Err(ScanError::UploadError("Uploaded file is empty".to_string()));
        }
        info!("Scanning {} ({} bytes)", file_name, bytes.len());

        Workspace::scope(|workspace| {
            workspace.write_upload(file_name, bytes)?;
            let base = self.load_base_image(bytes, file_name)?;
            workspace.save_image("base", &base)?;

            let report = CandidateSearch::new(&self.decoder, &self.config.search, &self.config.cleaning)
                .run(VariantGenerator::new(&base, &self.config.search), workspace);
            debug!(
                "Search stopped ({:?}) after {} attempts in {:?}",
                report.stop,
                report.attempts.len(),
                report.elapsed
            );
            if report.stop == StopReason::TimeBudget && report.best.is_none() {
                warn!("Time budget ran out before any MRZ was decoded");
            }

            let best = report.best.ok_or(ScanError::NoMrzFound)?;
            Ok(FieldCorrection::normalize(&best))
        })
    }

    fn load_base_image(&self, bytes: &[u8], file_name: &str) -> Result<DynamicImage, ScanError> {
        if !is_pdf(bytes, file_name) {
            return ImageProcessor::load(bytes);
        }
        let page = self.renderer.render_first_page(bytes)?.ok_or(ScanError::PdfNoPage)?;
        if page.width() == 0 || page.height() == 0 {
            return Err(ScanError::PdfNoPage);
        }
        Ok(ImageProcessor::normalize_color(page))
    }

    fn envelope(result: Result<DocumentRecord, ScanError>) -> ScanEnvelope {
        match result {
            Ok(record) => {
                info!(
                    "Extracted {} MRZ ({}) with confidence {}",
                    record.mrz_type, record.document_type, record.confidence_score
                );
                ScanEnvelope::success(record)
            }
            Err(e) => {
                match e.kind() {
                    FailureKind::Unexpected => error!("MRZ extraction failed: {}", e),
                    _ => warn!("{}", e),
                }
                ScanEnvelope::failure(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, DocumentType, RawMrzFields, ScoredCandidate};
    use crate::processing::pdf::tests::pdf_with_images;
    use crate::processing::FnDecoder;
    use crate::utils::NO_MRZ_MESSAGE;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([230, 230, 230])));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn passport() -> ScoredCandidate {
        let fields = RawMrzFields {
            document_type: Some("P".to_string()),
            surname: Some("ERIKSSON".to_string()),
            names: Some("ANNA<MARIA".to_string()),
            number: Some("L898902C3".to_string()),
            date_of_birth: Some("740812".to_string()),
            ..RawMrzFields::default()
        };
        ScoredCandidate::new(fields, "TD3", "raw", Confidence::new(97))
    }

    struct NoPages;

    impl PageRenderer for NoPages {
        fn render_first_page(&self, _pdf: &[u8]) -> Result<Option<DynamicImage>, ScanError> {
            Ok(None)
        }
    }

    #[test]
    fn test_successful_scan() {
        let decoder = FnDecoder::new(|_| Ok(Some(passport())));
        let scanner = DocumentScanner::new(decoder, ScanConfig::default());

        let envelope = scanner.scan_bytes(&png_bytes(60, 40), "passport.png");
        assert!(envelope.success);
        let record = envelope.data.unwrap();
        assert_eq!(record.document_type, DocumentType::Passport);
        assert_eq!(record.first_name.as_deref(), Some("ANNA MARIA"));
        assert_eq!(record.date_of_birth.as_deref(), Some("1974-08-12"));
    }

    #[test]
    fn test_no_mrz_envelope() {
        let scanner = DocumentScanner::new(FnDecoder::new(|_| Ok(None)), ScanConfig::default());
        let envelope = scanner.scan_bytes(&png_bytes(60, 40), "blank.png");
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error.as_deref(), Some(NO_MRZ_MESSAGE));
    }

    #[test]
    fn test_pdf_without_page_image() {
        let scanner = DocumentScanner::with_renderer(FnDecoder::new(|_| Ok(Some(passport()))), NoPages, ScanConfig::default());
        let envelope = scanner.scan_bytes(b"%PDF-1.4\n", "scan.pdf");
        assert_eq!(envelope.error.as_deref(), Some("Failed to convert PDF to image"));
    }

    #[test]
    fn test_pdf_with_embedded_scan() {
        let pdf = pdf_with_images(&[(20, 10, "DeviceRGB", vec![128u8; 600])]);
        let seen = std::cell::Cell::new((0, 0));
        let decoder = FnDecoder::new(|input| {
            seen.set((input.image.width(), input.image.height()));
            Ok(Some(passport()))
        });
        let scanner = DocumentScanner::new(decoder, ScanConfig::default());

        assert!(scanner.scan_bytes(&pdf, "scan.pdf").success);
        assert_eq!(seen.get(), (20, 10));
    }

    #[test]
    fn test_corrupt_image_is_unexpected_failure() {
        let scanner = DocumentScanner::new(FnDecoder::new(|_| Ok(None)), ScanConfig::default());
        let envelope = scanner.scan_bytes(b"not an image", "photo.jpg");
        assert!(!envelope.success);
        assert!(envelope.error.unwrap().starts_with("MRZ extraction failed: "));
    }

    #[test]
    fn test_empty_upload() {
        let scanner = DocumentScanner::new(FnDecoder::new(|_| Ok(None)), ScanConfig::default());
        let envelope = scanner.scan_bytes(&[], "photo.jpg");
        assert_eq!(envelope.error.as_deref(), Some("Upload error: Uploaded file is empty"));
    }

    #[test]
    fn test_missing_file() {
        let scanner = DocumentScanner::new(FnDecoder::new(|_| Ok(None)), ScanConfig::default());
        let envelope = scanner.scan_file(Path::new("/definitely/not/here.png"));
        assert!(!envelope.success);
        assert!(envelope.error.unwrap().starts_with("Upload error: Failed to read"));
    }
}
