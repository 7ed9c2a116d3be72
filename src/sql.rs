//! Fluent SQL fragment builder.
//!
//! [`SqlBuilder`] is the contract the relation compiler and the unit of work write
//! statements through; [`Sql`] is the implementation shipped with the crate. Every
//! operation appends one clause to a text buffer and collects bound values in call
//! order, so `build()` and `params()` always line up:
//!
//! ```
//! use relata::sql::{Criteria, Sql, SqlBuilder};
//!
//! let sql = Sql::new()
//!     .update("post")
//!     .set(Criteria::new().with("title", "New"))
//!     .where_(Criteria::new().with("id", 5));
//! assert_eq!(sql.build(), "UPDATE post SET title = ? WHERE id = ?");
//! assert_eq!(sql.params().len(), 2);
//! ```
//!
//! Placeholders are always `?`; drivers that want another syntax rewrite them.
//! Empty operations (an empty criteria list, an empty column list) are no-ops.

pub mod criteria;

use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

pub use criteria::{Criteria, Criterion};

/// Keys ending with one of these render as `key ?` instead of `key = ?`.
static SQL_OPERATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s?(NOT)?\s?(=|==|<>|!=|>|>=|<|<=|LIKE)\s?$").unwrap_or_else(|e| {
        unreachable!("operator pattern is a literal: {e}")
    })
});

/// Fluent statement builder. Every operation returns the builder.
pub trait SqlBuilder: Sized {
    /// `SELECT a, b`
    fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;

    /// `SELECT DISTINCT a, b`
    fn select_distinct<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;

    /// `FROM a, b`
    fn from<I, S>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;

    /// `INNER JOIN table`
    fn inner_join(self, table: &str) -> Self;

    /// `LEFT JOIN table`
    fn left_join(self, table: &str) -> Self;

    /// `AS alias`
    fn alias(self, alias: &str) -> Self;

    /// `ON left = right AND ...`; both sides are identifiers, nothing is bound.
    fn on<I, L, R>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: AsRef<str>,
        R: AsRef<str>;

    /// `WHERE a = ? AND b = ?`
    fn where_(self, criteria: Criteria) -> Self;

    /// `AND a = ? AND b = ?`
    fn and(self, criteria: Criteria) -> Self;

    /// `OR a = ? OR b = ?`
    fn or(self, criteria: Criteria) -> Self;

    /// `SET a = ?, b = ?`
    fn set(self, criteria: Criteria) -> Self;

    /// `INSERT INTO table (a, b)`
    fn insert_into<I, S>(self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;

    /// `VALUES (?, ?)`
    fn values(self, values: Vec<Value>) -> Self;

    /// `UPDATE table`
    fn update(self, table: &str) -> Self;

    /// `DELETE FROM table`
    fn delete_from(self, table: &str) -> Self;

    /// `GROUP BY a, b`
    fn group_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;

    /// `HAVING a = ? AND b = ?`
    fn having(self, criteria: Criteria) -> Self;

    /// `ORDER BY a, b`
    fn order_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;

    /// `ASC`
    fn asc(self) -> Self;

    /// `DESC`
    fn desc(self) -> Self;

    /// `BETWEEN ? AND ?`
    fn between(self, low: Value, high: Value) -> Self;

    /// `IN (?, ?)`
    fn in_(self, values: Vec<Value>) -> Self;

    /// `LIMIT n`
    fn limit(self, count: u64) -> Self;

    /// Append another fragment's text and parameters.
    fn append(self, fragment: &Sql) -> Self;

    /// Render the statement text.
    fn build(&self) -> String;

    /// Bound values in bind order.
    fn params(&self) -> &[Value];
}

/// Text buffer plus ordered parameter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    query: String,
    params: Vec<Value>,
}

impl Sql {
    /// Empty statement
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from raw text and the values its placeholders bind.
    pub fn raw(text: impl Into<String>, params: Vec<Value>) -> Self {
        let mut query = text.into();
        if !query.is_empty() && !query.ends_with(' ') {
            query.push(' ');
        }
        Self { query, params }
    }

    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
    }

    /// Split into text and parameters.
    pub fn into_parts(self) -> (String, Vec<Value>) {
        let text = self.build();
        (text, self.params)
    }

    fn keyword(&mut self, keyword: &str) {
        self.query.push_str(keyword);
        self.query.push(' ');
    }

    fn list<I, S>(mut self, keyword: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<String> = items
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if items.is_empty() {
            return self;
        }
        self.keyword(keyword);
        self.query.push_str(&items.join(", "));
        self.query.push(' ');
        self
    }

    fn single(mut self, keyword: &str, name: &str) -> Self {
        if name.is_empty() {
            return self;
        }
        self.keyword(keyword);
        self.query.push_str(name);
        self.query.push(' ');
        self
    }

    /// Renders `criteria` joined by `separator`, binding column values.
    fn conditions(mut self, keyword: &str, criteria: Criteria, separator: &str) -> Self {
        if criteria.is_empty() {
            return self;
        }
        let mut parts = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            match criterion {
                Criterion::Column(key, value) => {
                    if SQL_OPERATORS.is_match(&key) {
                        parts.push(format!("{key} ?"));
                    } else {
                        parts.push(format!("{key} = ?"));
                    }
                    self.params.push(value);
                }
                Criterion::Raw(expression) => parts.push(expression),
            }
        }
        self.keyword(keyword);
        self.query.push_str(&parts.join(separator));
        self.query.push(' ');
        self
    }

    fn placeholders(mut self, keyword: &str, values: Vec<Value>) -> Self {
        if values.is_empty() {
            return self;
        }
        let marks = vec!["?"; values.len()].join(", ");
        self.params.extend(values);
        self.keyword(keyword);
        self.query.push_str(&format!("({marks}) "));
        self
    }
}

impl SqlBuilder for Sql {
    fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.list("SELECT", columns)
    }

    fn select_distinct<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.list("SELECT DISTINCT", columns)
    }

    fn from<I, S>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.list("FROM", tables)
    }

    fn inner_join(self, table: &str) -> Self {
        self.single("INNER JOIN", table)
    }

    fn left_join(self, table: &str) -> Self {
        self.single("LEFT JOIN", table)
    }

    fn alias(self, alias: &str) -> Self {
        self.single("AS", alias)
    }

    fn on<I, L, R>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: AsRef<str>,
        R: AsRef<str>,
    {
        let parts: Vec<String> = pairs
            .into_iter()
            .map(|(l, r)| format!("{} = {}", l.as_ref(), r.as_ref()))
            .collect();
        if parts.is_empty() {
            return self;
        }
        self.keyword("ON");
        self.query.push_str(&parts.join(" AND "));
        self.query.push(' ');
        self
    }

    fn where_(self, criteria: Criteria) -> Self {
        self.conditions("WHERE", criteria, " AND ")
    }

    fn and(self, criteria: Criteria) -> Self {
        self.conditions("AND", criteria, " AND ")
    }

    fn or(self, criteria: Criteria) -> Self {
        self.conditions("OR", criteria, " OR ")
    }

    fn set(self, criteria: Criteria) -> Self {
        self.conditions("SET", criteria, ", ")
    }

    fn insert_into<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns: Vec<String> = columns.into_iter().map(|c| c.as_ref().to_string()).collect();
        self.keyword("INSERT INTO");
        self.query.push_str(table);
        self.query.push(' ');
        if !columns.is_empty() {
            self.query.push_str(&format!("({}) ", columns.join(", ")));
        }
        self
    }

    fn values(self, values: Vec<Value>) -> Self {
        self.placeholders("VALUES", values)
    }

    fn update(self, table: &str) -> Self {
        self.single("UPDATE", table)
    }

    fn delete_from(self, table: &str) -> Self {
        self.single("DELETE FROM", table)
    }

    fn group_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.list("GROUP BY", columns)
    }

    fn having(self, criteria: Criteria) -> Self {
        self.conditions("HAVING", criteria, " AND ")
    }

    fn order_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.list("ORDER BY", columns)
    }

    fn asc(mut self) -> Self {
        self.keyword("ASC");
        self
    }

    fn desc(mut self) -> Self {
        self.keyword("DESC");
        self
    }

    fn between(mut self, low: Value, high: Value) -> Self {
        self.keyword("BETWEEN ? AND ?");
        self.params.push(low);
        self.params.push(high);
        self
    }

    fn in_(self, values: Vec<Value>) -> Self {
        self.placeholders("IN", values)
    }

    fn limit(mut self, count: u64) -> Self {
        self.keyword(&format!("LIMIT {count}"));
        self
    }

    fn append(mut self, fragment: &Sql) -> Self {
        let text = fragment.build();
        if text.is_empty() {
            return self;
        }
        self.query.push_str(&text);
        self.query.push(' ');
        self.params.extend(fragment.params.iter().cloned());
        self
    }

    fn build(&self) -> String {
        self.query.trim_end().to_string()
    }

    fn params(&self) -> &[Value] {
        &self.params
    }
}

impl fmt::Display for Sql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}
