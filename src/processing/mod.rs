pub mod cleaning;
pub mod field_correction;
pub mod image;
pub mod mrz;
pub mod ocr;
pub mod pdf;
pub mod search;
pub mod variants;

pub use field_correction::FieldCorrection;
pub use self::image::ImageProcessor;
pub use ocr::{DecodeInput, FnDecoder, MrzDecoder};
#[cfg(feature = "tesseract")]
pub use ocr::TesseractDecoder;
pub use pdf::{EmbeddedImageRenderer, PageRenderer};
pub use search::{
    Attempt, BestCandidate, CandidateSearch, DecodeOutcome, NoResultReason, SearchReport, StopReason,
};
pub use variants::{ImageVariant, TransformKind, VariantGenerator};
