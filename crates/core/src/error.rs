//! Domain error model.

use thiserror::Error;

use crate::id::{CountSessionId, ProductId, SaleId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, missing records, state-machine violations). Storage failures
/// belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No product matched the given identifier (id, barcode or external id).
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// A decrement asked for more units than the product holds.
    #[error("insufficient stock for '{product_name}': {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// A quantity was zero or negative where a positive one is required
    /// (or negative where a count is expected).
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// A value failed validation (e.g. blank name or reason).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("sale not found: {0}")]
    SaleNotFound(SaleId),

    /// Cancellation is one-way; a second attempt is an error.
    #[error("sale {0} is already cancelled")]
    AlreadyCancelled(SaleId),

    #[error("count session not found: {0}")]
    SessionNotFound(CountSessionId),

    /// Items of a completed session cannot be modified.
    #[error("count session {0} is completed and cannot be modified")]
    SessionCompleted(CountSessionId),

    #[error("count session {0} is already completed")]
    AlreadyCompleted(CountSessionId),

    #[error("product {product_id} is not part of count session {session_id}")]
    ProductNotInSession {
        session_id: CountSessionId,
        product_id: ProductId,
    },

    /// Inbound payload failed authenticity verification.
    #[error("invalid signature")]
    InvalidSignature,
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is wrong (validation, quantities).
    BadRequest,
    /// The request conflicts with current state (stock, lifecycle).
    Conflict,
    NotFound,
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn product_not_found(identifier: impl core::fmt::Display) -> Self {
        Self::ProductNotFound(identifier.to_string())
    }

    /// Units missing to satisfy an `InsufficientStock` request.
    pub fn shortfall(&self) -> Option<i64> {
        match self {
            Self::InsufficientStock {
                available,
                requested,
                ..
            } => Some(requested - available),
            _ => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::InvalidId(_) | Self::InvalidQuantity(_) => {
                ErrorClass::BadRequest
            }
            Self::InsufficientStock { .. }
            | Self::AlreadyCancelled(_)
            | Self::SessionCompleted(_)
            | Self::AlreadyCompleted(_) => ErrorClass::Conflict,
            Self::ProductNotFound(_)
            | Self::SaleNotFound(_)
            | Self::SessionNotFound(_)
            | Self::ProductNotInSession { .. } => ErrorClass::NotFound,
            Self::InvalidSignature => ErrorClass::Unauthorized,
        }
    }
}
