//! Database driver abstraction.
//!
//! The mapper only needs a handful of primitives from a database connection:
//! run a statement, run a query and walk its rows, control a transaction, and
//! read back the identity generated by the last insert. [`Driver`] captures those;
//! [`MayPostgresDriver`](postgres::MayPostgresDriver) implements them over
//! `may_postgres`, and `MockDriver` (behind the `mock` feature) scripts them in
//! memory for tests.
//!
//! Statements use `?` placeholders; drivers translate them to their own syntax.

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod postgres;

use crate::value::Value;
use may_postgres::Error as PostgresError;
use std::collections::VecDeque;
use std::fmt;

pub use postgres::MayPostgresDriver;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockDriver, RecordedStatement};

/// Driver error type
#[derive(Debug)]
pub enum DriverError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Connection string rejected before connecting
    InvalidConnectionString(String),
    /// Statement execution error
    QueryError(String),
    /// Row decoding error
    ParseError(String),
    /// Other driver errors
    Other(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            DriverError::InvalidConnectionString(s) => {
                write!(f, "Invalid connection string: {s}")
            }
            DriverError::QueryError(s) => {
                write!(f, "Query error: {s}")
            }
            DriverError::ParseError(s) => {
                write!(f, "Parse error: {s}")
            }
            DriverError::Other(s) => {
                write!(f, "Driver error: {s}")
            }
        }
    }
}

impl std::error::Error for DriverError {}

impl From<PostgresError> for DriverError {
    fn from(err: PostgresError) -> Self {
        DriverError::PostgresError(err)
    }
}

/// Description of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Owning table, when the driver can tell.
    pub table: Option<String>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
        }
    }

    pub fn with_table(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: Some(table.into()),
        }
    }
}

/// Buffered query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter().collect(),
        }
    }

    /// Result set whose columns carry no table information.
    pub fn from_names<I, S>(names: I, rows: impl IntoIterator<Item = Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(ColumnMeta::new).collect(), rows)
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Next row, `None` once the result is exhausted.
    pub fn next_row(&mut self) -> Option<Vec<Value>> {
        self.rows.pop_front()
    }

    /// Rows not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for RowSet {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

/// Connection primitives the mapper runs on.
pub trait Driver {
    /// Execute a statement and return the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError>;

    /// Run a query and buffer its result.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError>;

    fn begin(&mut self) -> Result<(), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Identity generated by the last insert on this connection, if any.
    fn last_insert_identity(&mut self) -> Result<Option<Value>, DriverError>;

    /// Run an insert and return the value it generated for `key_column`.
    ///
    /// The default executes the statement, then asks
    /// [`last_insert_identity`](Driver::last_insert_identity); a failed
    /// read-back is logged and yields `Ok(None)`. Drivers able to return the key
    /// from the statement itself override this so the read-back cannot disturb
    /// the surrounding transaction.
    fn insert_returning(
        &mut self,
        sql: &str,
        params: &[Value],
        key_column: &str,
    ) -> Result<Option<Value>, DriverError> {
        self.execute(sql, params)?;
        match self.last_insert_identity() {
            Ok(identity) => Ok(identity),
            Err(e) => {
                log::debug!("Read-back of '{key_column}' failed: {e}");
                Ok(None)
            }
        }
    }
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError> {
        (**self).query(sql, params)
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        (**self).rollback()
    }

    fn last_insert_identity(&mut self) -> Result<Option<Value>, DriverError> {
        (**self).last_insert_identity()
    }

    fn insert_returning(
        &mut self,
        sql: &str,
        params: &[Value],
        key_column: &str,
    ) -> Result<Option<Value>, DriverError> {
        (**self).insert_returning(sql, params, key_column)
    }
}

impl<D: Driver + ?Sized> Driver for &mut D {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError> {
        (**self).query(sql, params)
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        (**self).rollback()
    }

    fn last_insert_identity(&mut self) -> Result<Option<Value>, DriverError> {
        (**self).last_insert_identity()
    }

    fn insert_returning(
        &mut self,
        sql: &str,
        params: &[Value],
        key_column: &str,
    ) -> Result<Option<Value>, DriverError> {
        (**self).insert_returning(sql, params, key_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::QueryError("syntax".to_string());
        assert_eq!(err.to_string(), "Query error: syntax");

        let err = DriverError::ParseError("bad cell".to_string());
        assert!(err.to_string().contains("Parse error"));

        let err = DriverError::InvalidConnectionString("empty".to_string());
        assert!(err.to_string().contains("Invalid connection string"));

        let err = DriverError::Other("gone".to_string());
        assert!(err.to_string().contains("Driver error"));
    }

    #[test]
    fn test_row_set_drains_in_order() {
        let mut rows = RowSet::from_names(
            ["id"],
            vec![vec![Value::from(1)], vec![Value::from(2)]],
        );
        assert_eq!(rows.columns(), &[ColumnMeta::new("id")]);
        assert_eq!(rows.remaining(), 2);
        assert_eq!(rows.next_row(), Some(vec![Value::from(1)]));
        assert_eq!(rows.next(), Some(vec![Value::from(2)]));
        assert_eq!(rows.next_row(), None);
    }
}
