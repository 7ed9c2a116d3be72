//! Transaction guard.
//!
//! [`Transaction`] borrows a [`Driver`] for the duration of one unit of work.
//! Statements issued through it are refused once it is closed, and a guard that
//! is dropped while still open rolls back.

use crate::driver::{Driver, DriverError, RowSet};
use crate::metrics::METRICS;
use crate::value::Value;
use std::fmt;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// Driver failure while inside the transaction
    Driver(DriverError),
    /// Transaction already committed or rolled back
    TransactionClosed,
    /// Other transaction errors
    Other(String),
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Driver(e) => {
                write!(f, "{e}")
            }
            TransactionError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
            TransactionError::Other(s) => {
                write!(f, "Transaction error: {s}")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<DriverError> for TransactionError {
    fn from(err: DriverError) -> Self {
        TransactionError::Driver(err)
    }
}

/// An open database transaction.
///
/// # Examples
///
/// ```
/// use relata::driver::{Driver, MockDriver};
/// use relata::transaction::Transaction;
///
/// let mut driver = MockDriver::new();
/// let mut tx = Transaction::begin(&mut driver)?;
/// tx.execute("DELETE FROM post WHERE id = ?", &[5.into()])?;
/// tx.commit()?;
/// assert_eq!(driver.committed().len(), 1);
/// # Ok::<(), relata::transaction::TransactionError>(())
/// ```
pub struct Transaction<'d, D: Driver + ?Sized> {
    driver: &'d mut D,
    closed: bool,
}

impl<'d, D: Driver + ?Sized> Transaction<'d, D> {
    /// Start a transaction on `driver`.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Driver` if the driver refuses to begin.
    pub fn begin(driver: &'d mut D) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        driver.begin()?;
        Ok(Self {
            driver,
            closed: false,
        })
    }

    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        log::debug!("Executing: {sql}");
        Ok(self.driver.execute(sql, params)?)
    }

    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        Ok(self.driver.query(sql, params)?)
    }

    pub fn last_insert_identity(&mut self) -> Result<Option<Value>, TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        Ok(self.driver.last_insert_identity()?)
    }

    /// Run an insert and read back the generated `key_column`.
    pub fn insert_returning(
        &mut self,
        sql: &str,
        params: &[Value],
        key_column: &str,
    ) -> Result<Option<Value>, TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        log::debug!("Executing: {sql} (returning {key_column})");
        Ok(self.driver.insert_returning(sql, params, key_column)?)
    }

    /// Commit all statements issued through this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is already closed or the driver fails.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        self.closed = true;
        self.driver.commit()?;
        Ok(())
    }

    /// Discard all statements issued through this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is already closed or the driver fails.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        self.rollback_in_place()
    }

    fn rollback_in_place(&mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        self.closed = true;
        METRICS.record_rollback();
        self.driver.rollback()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<D: Driver + ?Sized> Drop for Transaction<'_, D> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.rollback_in_place() {
                log::warn!("Rollback of abandoned transaction failed: {e}");
            }
        }
    }
}
