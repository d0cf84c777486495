use crate::utils::ScanError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const MICRO_ANGLES: [i32; 4] = [-5, -3, 3, 5];
pub const MAJOR_ANGLES: [i32; 3] = [90, 180, 270];

/// Tunables for one scanner instance. Shared read-only by every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub search: SearchConfig,
    pub cleaning: CleaningConfig,
    pub decoder: DecoderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// A decode scoring at least this much ends the search immediately.
    pub early_exit_score: u8,
    /// Small skew corrections, tried in this order (degrees, counter-clockwise).
    pub micro_angles: Vec<i32>,
    /// Full rotations, tried in this order after the micro rotations.
    pub major_angles: Vec<i32>,
    /// The bottom crop keeps rows from this fraction of the height downwards.
    pub bottom_crop_start: f64,
    /// Optional wall-clock budget for one search. `None` means unbounded.
    pub time_budget_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            early_exit_score: 90,
            micro_angles: vec![-3, 3, -5, 5],
            major_angles: vec![90, 180, 270],
            bottom_crop_start: 0.65,
            time_budget_ms: None,
        }
    }
}

impl SearchConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}

/// Parameters of the thresholded derivative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Side of the square neighbourhood used for the local mean. Must be odd.
    pub block_size: u32,
    /// Subtracted from the local mean to get the per-pixel threshold.
    pub offset: i32,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        CleaningConfig {
            block_size: 21,
            offset: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub language: String,
    pub tessdata_dir: Option<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            language: "eng".to_string(),
            tessdata_dir: None,
        }
    }
}

impl ScanConfig {
    /// Load a JSON config file. Missing keys fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ScanError::ConfigError(format!("Failed to read {:?}: {}", path.as_ref(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ScanError> {
        let config: ScanConfig = serde_json::from_str(text)
            .map_err(|e| ScanError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        let search = &self.search;
        if search.early_exit_score > 100 {
            return Err(ScanError::ConfigError(format!(
                "early_exit_score must be within 0..=100, got {}",
                search.early_exit_score
            )));
        }
        if let Some(angle) = search.micro_angles.iter().find(|a| !MICRO_ANGLES.contains(a)) {
            return Err(ScanError::ConfigError(format!(
                "micro rotation angle {} is not one of {:?}",
                angle, MICRO_ANGLES
            )));
        }
        if let Some(angle) = search.major_angles.iter().find(|a| !MAJOR_ANGLES.contains(a)) {
            return Err(ScanError::ConfigError(format!(
                "major rotation angle {} is not one of {:?}",
                angle, MAJOR_ANGLES
            )));
        }
        if !(search.bottom_crop_start > 0.0 && search.bottom_crop_start < 1.0) {
            return Err(ScanError::ConfigError(format!(
                "bottom_crop_start must be strictly between 0 and 1, got {}",
                search.bottom_crop_start
            )));
        }
        if self.cleaning.block_size < 3 || self.cleaning.block_size % 2 == 0 {
            return Err(ScanError::ConfigError(format!(
                "block_size must be an odd number >= 3, got {}",
                self.cleaning.block_size
            )));
        }
        if self.decoder.language.trim().is_empty() {
            return Err(ScanError::ConfigError("decoder language is empty".to_string()));
        }
        Ok(())
    }
}
