// MRZ extraction for passports and ID cards.
// Decodes with an adaptive search over image variants, then normalises the result

pub mod config;
pub mod models;
pub mod processing;
pub mod scanner;
pub mod utils;

pub use config::ScanConfig;
pub use models::{DocumentRecord, ScanEnvelope};
pub use scanner::DocumentScanner;
pub use utils::{ScanError, Workspace};
