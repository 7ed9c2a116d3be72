//! Integration tests driving the public API through `MockDriver`.
//!
//! Schema used throughout (Standard naming):
//! - `post (id, title, text)`
//! - `comment (id, post_id, text)`
//! - `category (id, name)`
//! - `post_category (id, post_id, category_id)`

mod compile;
mod fetch;
mod flush;

use relata::driver::{MockDriver, RowSet};
use relata::value::Value;

/// One `comment → post` row: comment 7 on post 5.
pub fn comment_post_row() -> RowSet {
    RowSet::from_names(
        ["id", "post_id", "text", "id", "title", "text"],
        vec![vec![
            Value::from(7),
            Value::from(5),
            Value::from("hi"),
            Value::from(5),
            Value::from("T"),
            Value::from("body"),
        ]],
    )
}

pub fn driver_with(rows: RowSet) -> MockDriver {
    let mut driver = MockDriver::new();
    driver.push_result(rows);
    driver
}
