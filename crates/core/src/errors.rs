use thiserror::Error;

use crate::domain::document::DocumentId;
use crate::domain::process::ProcessId;

/// Backend failure surfaced by a storage trait. Concrete stores (SQL,
/// in-memory) map their own error types into this before it crosses the
/// trait boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
}

/// Structural failures at workflow operations. Expected races at
/// `record_decision` (step already decided, wrong process) are not errors;
/// they come back as `Ok(false)`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("document {0:?} not found")]
    DocumentNotFound(DocumentId),
    #[error("process {0:?} not found")]
    ProcessNotFound(ProcessId),
    #[error("approver list is empty")]
    EmptyApproverList,
    #[error("no authenticated user")]
    Unauthenticated,
    #[error("workflow invariant violation: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use crate::domain::document::DocumentId;

    use super::{EngineError, StoreError};

    #[test]
    fn store_errors_convert_into_engine_errors() {
        let engine: EngineError = StoreError::Backend("disk full".to_owned()).into();
        assert!(matches!(engine, EngineError::Store(StoreError::Backend(_))));
    }

    #[test]
    fn error_messages_name_the_missing_record() {
        let error = EngineError::DocumentNotFound(DocumentId(42));
        assert!(error.to_string().contains("42"));
    }
}
