use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub i64);

/// Lifecycle of a routed document as seen by the workflow engine. The engine
/// only ever writes `Review`, `Approved`, and `Rejected`; the rest exist so
/// catalog rows round-trip without loss.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Review,
    Approved,
    Rejected,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Review => "review",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> DocumentStatus {
        match raw {
            "review" => DocumentStatus::Review,
            "approved" => DocumentStatus::Approved,
            "rejected" => DocumentStatus::Rejected,
            "archived" => DocumentStatus::Archived,
            _ => DocumentStatus::Draft,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub category: Option<String>,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
