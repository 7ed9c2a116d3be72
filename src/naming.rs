//! Naming conventions.
//!
//! A [`NamingStyle`] answers every "what is this called" question the compiler, the
//! hydrator and the unit of work ask: table ↔ entity names, primary and foreign key
//! column names, and the junction table that bridges two tables. The relation
//! compiler infers every join from these answers alone, so no foreign keys need to
//! be declared.
//!
//! Two styles ship with the crate:
//!
//! | style | table | primary key | foreign key | junction of `post`, `category` |
//! |-------|-------|-------------|-------------|--------------------------------|
//! | [`Standard`] | `post_category` | `id` | `post_id` | `post_category` |
//! | [`CakePhp`] | `post_categories` | `id` | `post_id` | `post_categories` |

pub mod cake_php;
pub mod inflect;

use serde::Deserialize;
use std::fmt;

pub use cake_php::CakePhp;

/// Strategy mapping tables, entities and key columns onto each other.
pub trait NamingStyle: fmt::Debug {
    /// `post_category` → `PostCategory`
    fn table_to_entity(&self, table: &str) -> String;

    /// `PostCategory` → `post_category`
    fn entity_to_table(&self, entity: &str) -> String;

    /// Primary key column of `table`.
    fn primary_key_column(&self, table: &str) -> String;

    /// Column other tables use to point at `table`.
    fn foreign_key_column(&self, table: &str) -> String;

    /// Whether `column` looks like a foreign key.
    fn is_foreign_key_column(&self, column: &str) -> bool;

    /// Table a foreign key column points at, `None` if it is not a foreign key.
    fn table_from_foreign_key_column(&self, column: &str) -> Option<String>;

    /// Junction table bridging `left` and `right` in a many-to-many relation.
    fn junction_table_name(&self, left: &str, right: &str) -> String;

    /// Entity property for a column. Identity by default.
    fn column_to_property(&self, column: &str) -> String {
        column.to_string()
    }

    /// Column for an entity property. Identity by default.
    fn property_to_column(&self, property: &str) -> String {
        property.to_string()
    }
}

/// Singular snake_case tables, `id` primary keys and `{table}_id` foreign keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Standard;

const KEY_SUFFIX: &str = "_id";

impl NamingStyle for Standard {
    fn table_to_entity(&self, table: &str) -> String {
        pascal_case(table)
    }

    fn entity_to_table(&self, entity: &str) -> String {
        snake_case(entity)
    }

    fn primary_key_column(&self, _table: &str) -> String {
        "id".to_string()
    }

    fn foreign_key_column(&self, table: &str) -> String {
        format!("{table}{KEY_SUFFIX}")
    }

    fn is_foreign_key_column(&self, column: &str) -> bool {
        column.len() > KEY_SUFFIX.len() && column.ends_with(KEY_SUFFIX)
    }

    fn table_from_foreign_key_column(&self, column: &str) -> Option<String> {
        if !self.is_foreign_key_column(column) {
            return None;
        }
        Some(column[..column.len() - KEY_SUFFIX.len()].to_string())
    }

    fn junction_table_name(&self, left: &str, right: &str) -> String {
        format!("{left}_{right}")
    }
}

/// Naming style selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStyleKind {
    /// [`Standard`]
    #[default]
    Standard,
    /// [`CakePhp`]
    CakePhp,
}

impl NamingStyleKind {
    /// Instantiate the selected style.
    pub fn build(self) -> Box<dyn NamingStyle> {
        match self {
            Self::Standard => Box::new(Standard),
            Self::CakePhp => Box::new(CakePhp),
        }
    }
}

/// `post_category` → `PostCategory`
pub(crate) fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `PostCategory` → `post_category`
pub(crate) fn snake_case(pascal: &str) -> String {
    let mut out = String::with_capacity(pascal.len() + 4);
    for (i, c) in pascal.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
