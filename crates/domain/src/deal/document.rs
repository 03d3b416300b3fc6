//! Files attached to a deal.

use chrono::{DateTime, Utc};
use common::{DealId, DocumentId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::record::Record;

/// Metadata of a file shared between the deal parties. The file itself
/// lives wherever `file_url` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealDocument {
    pub id: DocumentId,
    pub deal_id: DealId,
    pub uploaded_by: UserId,
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for DealDocument {
    type Id = DocumentId;
    const COLLECTION: &'static str = "deal_documents";
    const KIND: &'static str = "Document";

    fn id(&self) -> DocumentId {
        self.id
    }
}

impl DealDocument {
    pub fn attach(
        deal_id: DealId,
        uploaded_by: UserId,
        new: NewDealDocument,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        for (name, value) in [
            ("file_name", &new.file_name),
            ("file_url", &new.file_url),
            ("file_type", &new.file_type),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{name} is required")));
            }
        }

        Ok(Self {
            id: DocumentId::new(),
            deal_id,
            uploaded_by,
            file_name: new.file_name.trim().to_string(),
            file_url: new.file_url.trim().to_string(),
            file_type: new.file_type.trim().to_string(),
            description: new.description,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDealDocument {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_requires_file_fields() {
        let new = NewDealDocument {
            file_name: "nda.pdf".into(),
            file_url: "".into(),
            file_type: "application/pdf".into(),
            description: None,
        };
        assert!(DealDocument::attach(DealId::new(), UserId::new(), new, Utc::now()).is_err());
    }
}
