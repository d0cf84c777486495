use crate::models::{DocumentRecord, DocumentType, ScoredCandidate};
use lazy_static::lazy_static;
use regex::Regex;

/// Letters OCR commonly reads in place of the `<` filler.
const FILLER_LOOKALIKES: &[char] = &['K', 'L', 'E', 'C', 'S', 'M'];

/// Two-letter codes that identify ID cards and residence permits.
const ID_CARD_CODES: &[&str] = &["ID", "AC", "IR", "RP"];

lazy_static! {
    // Filler look-alikes at the end of a name, only after a space so that a
    // genuine final letter ("MARK") survives
    static ref TRAILING_FILLER: Regex = Regex::new(r"\s+[KLECSM][KLECSM\s]*$").unwrap();
}

/// FieldCorrection turns raw MRZ fields, as decoded by OCR, into the clean
/// values of a [`DocumentRecord`].
///
/// Every function here is pure: the same input always gives the same output.
pub struct FieldCorrection;

impl FieldCorrection {
    /// Build the normalised record for the winning candidate.
    pub fn normalize(candidate: &ScoredCandidate) -> DocumentRecord {
        let fields = &candidate.fields;
        DocumentRecord {
            document_type: Self::map_document_type(fields.document_type.as_deref()),
            country_code: fields.country.clone(),
            last_name: fields.surname.as_deref().and_then(Self::clean_name),
            first_name: fields.names.as_deref().and_then(Self::clean_name),
            document_number: fields.number.as_deref().and_then(Self::clean_document_number),
            nationality_iso3: fields.nationality.clone(),
            date_of_birth: fields.date_of_birth.as_deref().and_then(Self::format_mrz_date),
            expiry_date: fields.expiration_date.as_deref().and_then(Self::format_mrz_date),
            sex: Self::normalize_sex(fields.sex.as_deref()),
            confidence_score: candidate.score,
            mrz_type: candidate.mrz_type.clone(),
            raw_mrz_text: candidate.raw_text.clone(),
        }
    }

    /// Strip filler and its OCR look-alikes from a name.
    ///
    /// `<` becomes a space. A trailing run of look-alike letters is removed
    /// when a space separates it from the name, and a single look-alike
    /// letter standing alone between two other words is dropped.
    pub fn clean_name(raw: &str) -> Option<String> {
        let spaced = raw.replace('<', " ");
        let trimmed = TRAILING_FILLER.replace(spaced.trim(), "");

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let last = tokens.len().saturating_sub(1);
        let kept: Vec<&str> = tokens
            .iter()
            .enumerate()
            .filter(|&(i, token)| !(i > 0 && i < last && Self::is_filler_token(token)))
            .map(|(_, token)| *token)
            .collect();

        let cleaned = kept.join(" ");
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// Remove filler and whitespace. Letters are kept as they are.
    pub fn clean_document_number(raw: &str) -> Option<String> {
        let cleaned: String = raw.chars().filter(|c| *c != '<' && !c.is_whitespace()).collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// `YYMMDD` to `YYYY-MM-DD`. Years 00-49 are 20xx, 50-99 are 19xx.
    ///
    /// Purely syntactic: anything that is not six ASCII digits is rejected,
    /// but month and day ranges are not checked.
    pub fn format_mrz_date(raw: &str) -> Option<String> {
        if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (yy, mm, dd) = (&raw[0..2], &raw[2..4], &raw[4..6]);
        let century = if yy < "50" { "20" } else { "19" };
        Some(format!("{}{}-{}-{}", century, yy, mm, dd))
    }

    pub fn map_document_type(raw: Option<&str>) -> DocumentType {
        let code: String = raw
            .unwrap_or_default()
            .trim()
            .chars()
            .filter(|c| *c != '<')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if code.starts_with('P') {
            DocumentType::Passport
        } else if code.starts_with(['I', 'A', 'C']) || ID_CARD_CODES.contains(&code.as_str()) {
            DocumentType::IdCard
        } else {
            DocumentType::Unknown
        }
    }

    /// `M`, `F` and `X` pass through; anything else is `U`.
    pub fn normalize_sex(raw: Option<&str>) -> char {
        match raw.map(str::trim).and_then(|s| s.chars().next()) {
            Some(c) if matches!(c.to_ascii_uppercase(), 'M' | 'F' | 'X') => c.to_ascii_uppercase(),
            _ => 'U',
        }
    }

    fn is_filler_token(token: &str) -> bool {
        let mut chars = token.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if FILLER_LOOKALIKES.contains(&c))
    }
}
