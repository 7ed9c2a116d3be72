//! Mapper error type.

use crate::driver::DriverError;
use crate::transaction::TransactionError;
use std::fmt;

/// Errors raised by compilation, hydration and flushing.
#[derive(Debug)]
pub enum MapperError {
    /// Invalid chain or entity setup (duplicate alias, unknown table, unknown entity)
    Configuration(String),
    /// Row columns do not line up with the relation chain
    ShapeMismatch(String),
    /// Driver failure, passed through unchanged
    Driver(DriverError),
    /// Transaction misuse or failure
    Transaction(TransactionError),
}

impl fmt::Display for MapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapperError::Configuration(s) => {
                write!(f, "Configuration error: {s}")
            }
            MapperError::ShapeMismatch(s) => {
                write!(f, "Shape mismatch: {s}")
            }
            MapperError::Driver(e) => {
                write!(f, "Driver error: {e}")
            }
            MapperError::Transaction(e) => {
                write!(f, "Transaction error: {e}")
            }
        }
    }
}

impl std::error::Error for MapperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapperError::Driver(e) => Some(e),
            MapperError::Transaction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DriverError> for MapperError {
    fn from(err: DriverError) -> Self {
        MapperError::Driver(err)
    }
}

impl From<TransactionError> for MapperError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Driver(e) => MapperError::Driver(e),
            other => MapperError::Transaction(other),
        }
    }
}
