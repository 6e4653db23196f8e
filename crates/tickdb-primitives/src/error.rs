//! Common error types for primitives

use thiserror::Error;

/// Primitive parsing and validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// Site number outside the configured range
    #[error("invalid site id {0}: expected 1..={max}", max = crate::SITE_COUNT)]
    InvalidSiteId(i64),

    /// Variable name that is empty or has illegal characters
    #[error("invalid variable name: {0:?}")]
    InvalidVariable(String),

    /// Transaction name that is empty or has illegal characters
    #[error("invalid transaction id: {0:?}")]
    InvalidTransaction(String),
}

/// Result alias for primitive operations
pub type PrimitiveResult<T> = Result<T, PrimitiveError>;
