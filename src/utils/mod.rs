pub mod error;
pub mod workspace;

pub use error::{FailureKind, ScanError, NO_MRZ_MESSAGE};
pub use workspace::Workspace;
