//! Service-level error: a domain rule violation or a storage failure.

use thiserror::Error;

use stockroom_core::{DomainError, ErrorClass};

use crate::ledger::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }

    /// Client-facing class; `None` for storage failures (opaque server errors).
    pub fn class(&self) -> Option<ErrorClass> {
        self.domain().map(DomainError::class)
    }
}
