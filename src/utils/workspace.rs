use crate::utils::ScanError;
use image::{DynamicImage, ImageFormat};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Request-scoped scratch area.
///
/// Owns every intermediate file a scan produces (the upload, the rendered PDF
/// page, each variant handed to the decode engine). Everything lives inside a
/// single temporary directory that is deleted by [`Workspace::release`] or,
/// failing that, when the workspace is dropped.
pub struct Workspace {
    dir: TempDir,
    files: Vec<PathBuf>,
}

impl Workspace {
    pub fn create() -> Result<Self, ScanError> {
        let dir = tempfile::Builder::new().prefix("mrzscan-").tempdir()?;
        debug!("Created workspace at {:?}", dir.path());
        Ok(Workspace {
            dir,
            files: Vec::new(),
        })
    }

    /// Run `f` with a fresh workspace and release it afterwards, whatever `f` returned.
    pub fn scope<T, F>(f: F) -> Result<T, ScanError>
    where
        F: FnOnce(&mut Workspace) -> Result<T, ScanError>,
    {
        let mut workspace = Self::create()?;
        let result = f(&mut workspace);
        if let Err(e) = workspace.release() {
            warn!("Failed to release workspace: {}", e);
        }
        result
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Files written so far, in creation order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Store the raw upload. Only the extension of `file_name` is kept.
    pub fn write_upload(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ScanError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin");
        let path = self.next_path("upload", extension);
        fs::write(&path, bytes)?;
        self.files.push(path.clone());
        Ok(path)
    }

    /// Encode `image` as PNG inside the workspace.
    pub fn save_image(&mut self, label: &str, image: &DynamicImage) -> Result<PathBuf, ScanError> {
        let path = self.next_path(label, "png");
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ScanError::ImageProcessingError(format!("Failed to save {}: {}", label, e)))?;
        self.files.push(path.clone());
        Ok(path)
    }

    /// Delete the directory and everything in it.
    pub fn release(self) -> Result<(), ScanError> {
        debug!("Releasing workspace with {} file(s)", self.files.len());
        self.dir.close()?;
        Ok(())
    }

    fn next_path(&self, label: &str, extension: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("{:03}_{}.{}", self.files.len(), label, extension))
    }
}
