//! Condition lists consumed by `WHERE`, `AND`, `OR`, `HAVING` and `SET`.

use crate::value::Value;

/// One entry of a condition list.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// `column = ?`, or `column op ?` when the key already ends with an operator
    /// (`"age >"`, `"name LIKE"`, `"status NOT ="`).
    Column(String, Value),
    /// A boolean expression rendered verbatim, without parameters.
    Raw(String),
}

/// Ordered list of criteria.
///
/// # Example
///
/// ```
/// use relata::sql::Criteria;
///
/// let criteria = Criteria::new()
///     .with("title", "Hello")
///     .with("views >", 10)
///     .raw("post.published_at IS NOT NULL");
/// assert_eq!(criteria.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(Vec<Criterion>);

impl Criteria {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column comparison.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push(Criterion::Column(column.into(), value.into()));
        self
    }

    /// Append a raw expression.
    pub fn raw(mut self, expression: impl Into<String>) -> Self {
        self.0.push(Criterion::Raw(expression.into()));
        self
    }

    pub fn push(&mut self, criterion: Criterion) {
        self.0.push(criterion);
    }

    pub fn extend(&mut self, other: Criteria) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Criterion> {
        self.0.iter()
    }
}

impl IntoIterator for Criteria {
    type Item = Criterion;
    type IntoIter = std::vec::IntoIter<Criterion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Criteria {
    type Item = &'a Criterion;
    type IntoIter = std::slice::Iter<'a, Criterion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Criteria
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| Criterion::Column(k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Vec<Criterion>> for Criteria {
    fn from(criteria: Vec<Criterion>) -> Self {
        Self(criteria)
    }
}
