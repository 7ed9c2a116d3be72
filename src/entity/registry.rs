//! Discriminator factories.

use super::Entity;
use crate::value::{KeyValue, Value};
use std::collections::HashMap;
use std::fmt;

type Factory = Box<dyn Fn() -> Entity + Send + Sync>;

/// Maps discriminator values to entity factories.
///
/// Nodes declaring a type column create their entities through the factory
/// registered for that column's value. Unknown or null values fall back to a
/// plain [`Entity`].
///
/// ```
/// use relata::entity::TypeRegistry;
/// use relata::value::Value;
///
/// let mut types = TypeRegistry::new();
/// types.register_kind("article", "Article");
/// let entity = types.instantiate(Some(&Value::from("article")));
/// assert_eq!(entity.kind(), Some("Article"));
/// assert_eq!(types.instantiate(None).kind(), None);
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    factories: HashMap<String, Factory>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for the discriminator value `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Entity + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Register a factory producing empty entities labelled `kind`.
    pub fn register_kind(&mut self, name: impl Into<String>, kind: impl Into<String>) {
        let kind = kind.into();
        self.register(name, move || Entity::with_kind(kind.clone()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// New entity for a discriminator value.
    pub fn instantiate(&self, discriminator: Option<&Value>) -> Entity {
        discriminator
            .and_then(KeyValue::from_value)
            .and_then(|key| self.factories.get(&key.to_string()))
            .map(|factory| factory())
            .unwrap_or_default()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("factories", &names).finish()
    }
}
