//! CakePHP-flavoured naming: plural tables, singular entities.

use super::inflect::{map_last_word, pluralize, singularize};
use super::{pascal_case, snake_case, NamingStyle};

/// Plural snake_case tables (`posts`, `post_categories`), `id` primary keys and
/// `{singular}_id` foreign keys.
///
/// Junction tables pair the singular left table with the plural right table:
/// `post` + `category` → `post_categories`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CakePhp;

const KEY_SUFFIX: &str = "_id";

impl NamingStyle for CakePhp {
    fn table_to_entity(&self, table: &str) -> String {
        pascal_case(&map_last_word(table, singularize))
    }

    fn entity_to_table(&self, entity: &str) -> String {
        map_last_word(&snake_case(entity), pluralize)
    }

    fn primary_key_column(&self, _table: &str) -> String {
        "id".to_string()
    }

    fn foreign_key_column(&self, table: &str) -> String {
        format!("{}{KEY_SUFFIX}", map_last_word(table, singularize))
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
        let left = map_last_word(left, singularize);
        let right = map_last_word(right, |word| pluralize(&singularize(word)));
        format!("{left}_{right}")
    }
}
