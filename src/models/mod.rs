pub mod data;
pub mod envelope;

pub use data::{Confidence, DocumentRecord, DocumentType, RawMrzFields, ScoredCandidate};
pub use envelope::ScanEnvelope;
