//! Scripted in-memory driver.
//!
//! [`MockDriver`] records every statement it receives and answers queries from a
//! queue of prepared [`RowSet`]s. Writes issued inside a transaction stay pending
//! until `commit` and are discarded by `rollback`, so tests can assert on what a
//! real database would have kept.

use super::{Driver, DriverError, RowSet};
use crate::value::Value;
use std::collections::VecDeque;

/// A statement as the driver saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl RecordedStatement {
    fn new(sql: &str, params: &[Value]) -> Self {
        Self {
            sql: sql.to_string(),
            params: params.to_vec(),
        }
    }
}

/// In-memory driver for tests.
#[derive(Debug, Default)]
pub struct MockDriver {
    results: VecDeque<RowSet>,
    identities: VecDeque<Result<Option<Value>, String>>,
    fail_on_execute: Option<usize>,
    executes: usize,
    in_transaction: bool,
    pending: Vec<RecordedStatement>,
    committed: Vec<RecordedStatement>,
    executed: Vec<RecordedStatement>,
    queries: Vec<RecordedStatement>,
    begins: usize,
    commits: usize,
    rollbacks: usize,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `query` call.
    pub fn push_result(&mut self, rows: RowSet) -> &mut Self {
        self.results.push_back(rows);
        self
    }

    /// Queue the answer of the next `last_insert_identity` call.
    pub fn push_identity(&mut self, identity: impl Into<Value>) -> &mut Self {
        self.identities.push_back(Ok(Some(identity.into())));
        self
    }

    /// Make the next `last_insert_identity` call fail.
    pub fn push_identity_failure(&mut self, message: impl Into<String>) -> &mut Self {
        self.identities.push_back(Err(message.into()));
        self
    }

    /// Fail the `n`th `execute` call (1-based, counted over the driver's lifetime).
    pub fn fail_on_execute(&mut self, n: usize) -> &mut Self {
        self.fail_on_execute = Some(n);
        self
    }

    /// Every statement that executed successfully, committed or not.
    pub fn executed(&self) -> &[RecordedStatement] {
        &self.executed
    }

    /// Statements that survived a commit (or ran outside a transaction).
    pub fn committed(&self) -> &[RecordedStatement] {
        &self.committed
    }

    pub fn queries(&self) -> &[RecordedStatement] {
        &self.queries
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn begins(&self) -> usize {
        self.begins
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }
}

impl Driver for MockDriver {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        self.executes += 1;
        if self.fail_on_execute == Some(self.executes) {
            return Err(DriverError::QueryError(format!(
                "injected failure on statement {}: {sql}",
                self.executes
            )));
        }
        let statement = RecordedStatement::new(sql, params);
        self.executed.push(statement.clone());
        if self.in_transaction {
            self.pending.push(statement);
        } else {
            self.committed.push(statement);
        }
        Ok(1)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError> {
        self.queries.push(RecordedStatement::new(sql, params));
        Ok(self.results.pop_front().unwrap_or_default())
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        if self.in_transaction {
            return Err(DriverError::Other("transaction already in progress".to_string()));
        }
        self.in_transaction = true;
        self.begins += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        if !self.in_transaction {
            return Err(DriverError::Other("no transaction in progress".to_string()));
        }
        self.in_transaction = false;
        self.committed.append(&mut self.pending);
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        if !self.in_transaction {
            return Err(DriverError::Other("no transaction in progress".to_string()));
        }
        self.in_transaction = false;
        self.pending.clear();
        self.rollbacks += 1;
        Ok(())
    }

    fn last_insert_identity(&mut self) -> Result<Option<Value>, DriverError> {
        match self.identities.pop_front() {
            Some(Ok(identity)) => Ok(identity),
            Some(Err(message)) => Err(DriverError::QueryError(message)),
            None => Ok(None),
        }
    }
}
