use crate::models::DocumentRecord;
use crate::utils::ScanError;
use serde::{Deserialize, Serialize};

/// What a caller gets back for every submission, success or not.
///
/// Failures never surface as transport errors; inspect `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DocumentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanEnvelope {
    pub fn success(record: DocumentRecord) -> Self {
        ScanEnvelope {
            success: true,
            data: Some(record),
            error: None,
        }
    }

    pub fn failure(error: &ScanError) -> Self {
        ScanEnvelope {
            success: false,
            data: None,
            error: Some(error.envelope_message()),
        }
    }

    pub fn to_json(&self, pretty: bool) -> String {
        let encoded = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        // Every field is a plain string, number, bool or option of those.
        encoded.unwrap_or_else(|e| {
            format!("{{\"success\":false,\"error\":\"Failed to encode response: {}\"}}", e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, DocumentType};
    use crate::utils::NO_MRZ_MESSAGE;
    use serde_json::Value;

    #[test]
    fn test_failure_shape() {
        let envelope = ScanEnvelope::failure(&ScanError::NoMrzFound);
        let value: Value = serde_json::from_str(&envelope.to_json(false)).unwrap();
        assert_eq!(value["success"], Value::Bool(false));
        assert_eq!(value["error"], Value::String(NO_MRZ_MESSAGE.to_string()));
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_success_shape() {
        let record = DocumentRecord {
            document_type: DocumentType::Passport,
            country_code: Some("UTO".to_string()),
            last_name: Some("ERIKSSON".to_string()),
            first_name: Some("ANNA MARIA".to_string()),
            document_number: Some("L898902C3".to_string()),
            nationality_iso3: Some("UTO".to_string()),
            date_of_birth: Some("1974-08-12".to_string()),
            expiry_date: Some("2012-04-15".to_string()),
            sex: 'F',
            confidence_score: Confidence::new(100),
            mrz_type: "TD3".to_string(),
            raw_mrz_text: String::new(),
        };
        let envelope = ScanEnvelope::success(record.clone());
        let json = envelope.to_json(true);
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["success"], Value::Bool(true));
        assert_eq!(value["data"]["document_type"], "PASSPORT");
        assert_eq!(value["data"]["sex"], "F");
        assert_eq!(value["data"]["confidence_score"], 100);
        assert!(value.get("error").is_none());

        let back: ScanEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data, Some(record));
    }
}
