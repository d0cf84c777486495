use serde::{Deserialize, Serialize};
use std::fmt;

/// Decode-engine confidence, clamped to 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Confidence(u8);

impl Confidence {
    pub fn new(score: u8) -> Self {
        Confidence(score.min(100))
    }

    /// Share of passed checks, rounded to the nearest integer percentage.
    pub fn from_ratio(passed: usize, total: usize) -> Self {
        if total == 0 {
            return Confidence(0);
        }
        let percent = (passed.min(total) * 200 + total) / (2 * total);
        Confidence(percent as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for Confidence {
    fn from(score: u8) -> Self {
        Confidence::new(score)
    }
}

impl From<Confidence> for u8 {
    fn from(score: Confidence) -> Self {
        score.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw, uncleaned field values as read from the MRZ.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMrzFields {
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub country: Option<String>,
    pub number: Option<String>,
    pub surname: Option<String>,
    pub names: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub expiration_date: Option<String>,
    pub sex: Option<String>,
}

/// The outcome of one successful decode attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub fields: RawMrzFields,
    pub mrz_type: String,
    pub raw_text: String,
    pub score: Confidence,
}

impl ScoredCandidate {
    pub fn new(fields: RawMrzFields, mrz_type: &str, raw_text: &str, score: Confidence) -> Self {
        ScoredCandidate {
            fields,
            mrz_type: mrz_type.to_string(),
            raw_text: raw_text.to_string(),
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Passport,
    IdCard,
    Unknown,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DocumentType::Passport => "PASSPORT",
            DocumentType::IdCard => "ID_CARD",
            DocumentType::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Normalised identity fields. Built once per request from the winning candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_type: DocumentType,
    pub country_code: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub document_number: Option<String>,
    pub nationality_iso3: Option<String>,
    pub date_of_birth: Option<String>,
    pub expiry_date: Option<String>,
    pub sex: char,
    pub confidence_score: Confidence,
    pub mrz_type: String,
    pub raw_mrz_text: String,
}
