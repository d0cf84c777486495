use thiserror::Error;

/// Message returned to callers when every variant was tried without a decode.
pub const NO_MRZ_MESSAGE: &str =
    "No MRZ found in image. Please ensure the document is clearly visible and well-lit.";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Failed to convert PDF to image")]
    PdfNoPage,

    #[error("Failed to convert PDF to image: {0}")]
    PdfConversionError(String),

    #[error("{}", NO_MRZ_MESSAGE)]
    NoMrzFound,

    #[error("Image processing error: {0}")]
    ImageProcessingError(String),

    #[error("MRZ decode error: {0}")]
    DecodeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used when turning an error into a response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UploadOrConversion,
    NoMrzFound,
    Unexpected,
}

impl ScanError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScanError::UploadError(_) | ScanError::PdfNoPage | ScanError::PdfConversionError(_) => {
                FailureKind::UploadOrConversion
            }
            ScanError::NoMrzFound => FailureKind::NoMrzFound,
            _ => FailureKind::Unexpected,
        }
    }

    /// Human readable message for the failure envelope.
    pub fn envelope_message(&self) -> String {
        match self.kind() {
            FailureKind::UploadOrConversion | FailureKind::NoMrzFound => self.to_string(),
            FailureKind::Unexpected => format!("MRZ extraction failed: {}", self),
        }
    }
}
