//! Dynamic entity records.
//!
//! An [`Entity`] is an ordered list of named fields. A field is either a scalar
//! [`Value`] or a [`Field::Ref`] to another entity owned by the same unit of work.
//! Entities are addressed by [`EntityId`]; two ids are equal only when they name
//! the same instance.

pub mod registry;

use crate::value::{self, Value};
use std::fmt;

pub use registry::TypeRegistry;

/// Identity of an entity inside a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) usize);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content of one entity field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    Ref(EntityId),
}

impl Field {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Ref(_) => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<EntityId> {
        match self {
            Self::Ref(id) => Some(*id),
            Self::Value(_) => None,
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<EntityId> for Field {
    fn from(id: EntityId) -> Self {
        Self::Ref(id)
    }
}

/// Record with ordered named fields and an optional kind label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    kind: Option<String>,
    fields: Vec<(String, Field)>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity labelled with `kind`, e.g. `"Post"`.
    pub fn with_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            fields: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn set_kind(&mut self, kind: impl Into<String>) {
        self.kind = Some(kind.into());
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a scalar field, keeping its position when it already exists.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.set_field(name, Field::Value(value.into()));
    }

    /// Point a field at another entity.
    pub fn set_ref(&mut self, name: impl Into<String>, target: EntityId) {
        self.set_field(name, Field::Ref(target));
    }

    pub fn set_field(&mut self, name: impl Into<String>, field: Field) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = field,
            None => self.fields.push((name, field)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Scalar value of `name`, `None` when absent or a reference.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Field::as_value)
    }

    /// Target of `name`, `None` when absent or a scalar.
    pub fn reference(&self, name: &str) -> Option<EntityId> {
        self.get(name).and_then(Field::as_ref_id)
    }

    /// Whether `name` is present and holds a non-null value or a reference.
    pub fn is_set(&self, name: &str) -> bool {
        match self.get(name) {
            Some(Field::Value(v)) => !value::is_null(v),
            Some(Field::Ref(_)) => true,
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
