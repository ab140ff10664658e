use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The fixed set of rider document types the tour requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    License,
    Passport,
    EntryPermit,
    LiabilityInsurance,
    MedicalInsurance,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::License,
        DocumentKind::Passport,
        DocumentKind::EntryPermit,
        DocumentKind::LiabilityInsurance,
        DocumentKind::MedicalInsurance,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "license" => Some(DocumentKind::License),
            "passport" => Some(DocumentKind::Passport),
            "entry_permit" => Some(DocumentKind::EntryPermit),
            "liability_insurance" => Some(DocumentKind::LiabilityInsurance),
            "medical_insurance" => Some(DocumentKind::MedicalInsurance),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::License => write!(f, "License"),
            DocumentKind::Passport => write!(f, "Passport"),
            DocumentKind::EntryPermit => write!(f, "Entry Permit"),
            DocumentKind::LiabilityInsurance => write!(f, "Liability Insurance"),
            DocumentKind::MedicalInsurance => write!(f, "Medical Insurance"),
        }
    }
}

/// Upload metadata for one document. The file itself lives in object
/// storage; only the reference is cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub url: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// The authenticated user's uploaded documents, keyed by kind.
pub type RiderDocuments = BTreeMap<DocumentKind, DocumentUpload>;

// Raw backend shapes for the documents record

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsRecord {
    #[serde(default)]
    pub documents: BTreeMap<String, DocumentUploadRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUploadRecord {
    pub url: Option<String>,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl DocumentsRecord {
    /// Convert to the cached map. Unknown document kinds and entries with
    /// no URL are skipped, with a log line for the former.
    pub fn to_rider_documents(&self) -> RiderDocuments {
        let mut documents = RiderDocuments::new();
        for (key, record) in &self.documents {
            let Some(kind) = DocumentKind::from_key(key) else {
                warn!(key = %key, "Skipping unknown document kind from backend");
                continue;
            };
            let Some(url) = record.url.clone() else {
                continue;
            };
            documents.insert(
                kind,
                DocumentUpload {
                    url,
                    file_name: record.file_name.clone().unwrap_or_default(),
                    uploaded_at: record.uploaded_at.unwrap_or(DateTime::UNIX_EPOCH),
                },
            );
        }
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kinds_and_empty_urls_are_skipped() {
        let record: DocumentsRecord = serde_json::from_str(
            r#"{
                "documents": {
                    "passport": {"url": "https://files.example/p.jpg", "fileName": "p.jpg"},
                    "visa": {"url": "https://files.example/v.jpg"},
                    "license": {"fileName": "orphan.jpg"}
                }
            }"#,
        )
        .expect("Failed to parse documents record JSON");

        let documents = record.to_rider_documents();
        assert_eq!(documents.len(), 1);
        assert!(documents.contains_key(&DocumentKind::Passport));
    }

    #[test]
    fn test_kind_key_round_trip() {
        for kind in DocumentKind::ALL {
            let key = serde_json::to_value(kind).expect("Failed to serialize kind");
            let key = key.as_str().expect("kind should serialize as string").to_string();
            assert_eq!(DocumentKind::from_key(&key), Some(kind));
        }
    }
}
