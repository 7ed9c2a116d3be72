//! Fetching entity graphs.

use crate::{comment_post_row, driver_with};
use relata::driver::{ColumnMeta, MockDriver, RowSet};
use relata::naming::Standard;
use relata::relation::RelationChain;
use relata::{Mapper, MapperError, Value};

#[test]
fn test_comment_post_scenario() {
    let mut mapper = Mapper::new(driver_with(comment_post_row()), Standard);
    let chain = RelationChain::new("comment").join("post").key(5);

    let comment = mapper.fetch(&chain).unwrap().unwrap();
    let comment_entity = mapper.entity(comment).unwrap();
    assert_eq!(comment_entity.value("id"), Some(&Value::from(7)));
    assert_eq!(comment_entity.value("text"), Some(&Value::from("hi")));

    let post = comment_entity.reference("post_id").unwrap();
    let post_entity = mapper.entity(post).unwrap();
    assert_eq!(post_entity.value("id"), Some(&Value::from(5)));
    assert_eq!(post_entity.value("title"), Some(&Value::from("T")));
    assert_eq!(post_entity.value("text"), Some(&Value::from("body")));

    assert!(mapper.is_tracked(comment));
    assert!(mapper.is_tracked(post));
    assert_eq!(mapper.get_tracked("post", 5), Some(post));
}

#[test]
fn test_identity_map_returns_same_instance() {
    let mut driver = MockDriver::new();
    driver.push_result(comment_post_row()).push_result(comment_post_row());
    let mut mapper = Mapper::new(driver, Standard);
    let chain = RelationChain::new("comment").join("post").key(5);

    let first = mapper.fetch(&chain).unwrap().unwrap();
    mapper.entity_mut(first).unwrap().set("text", "local edit");
    let second = mapper.fetch(&chain).unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(
        mapper.entity(second).unwrap().value("text"),
        Some(&Value::from("local edit"))
    );
}

#[test]
fn test_left_join_without_match() {
    let rows = RowSet::new(
        vec![
            ColumnMeta::with_table("id", "comment"),
            ColumnMeta::with_table("post_id", "comment"),
            ColumnMeta::with_table("id", "post"),
            ColumnMeta::with_table("title", "post"),
        ],
        vec![vec![Value::from(1), Value::Int(None), Value::Int(None), Value::String(None)]],
    );
    let mut mapper = Mapper::new(driver_with(rows), Standard);
    let chain = RelationChain::new("comment").left_join("post");

    let comment = mapper.fetch(&chain).unwrap().unwrap();
    assert_eq!(mapper.entity(comment).unwrap().reference("post_id"), None);
    assert!(mapper.get_tracked("post", 0).is_none());
    assert!(mapper.driver().queries()[0].sql.contains("LEFT JOIN post ON comment.post_id = post.id"));
}

#[test]
fn test_discriminator_factories() {
    let rows = RowSet::from_names(
        ["id", "kind", "title"],
        vec![
            vec![Value::from(1), Value::from("news"), Value::from("a")],
            vec![Value::from(2), Value::from("essay"), Value::from("b")],
        ],
    );
    let mut mapper = Mapper::new(driver_with(rows), Standard);
    mapper.types_mut().register_kind("news", "NewsPost");

    let posts = mapper.fetch_all(&RelationChain::new("post").typed("kind")).unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(mapper.entity(posts[0]).unwrap().kind(), Some("NewsPost"));
    assert_eq!(mapper.entity(posts[1]).unwrap().kind(), None);
}

#[test]
fn test_row_shape_mismatch() {
    let rows = RowSet::from_names(["id"], vec![vec![Value::from(1)]]);
    let mut mapper = Mapper::new(driver_with(rows), Standard);
    let chain = RelationChain::new("comment")
        .filters(["text"])
        .join("post")
        .filters(["title"]);
    let err = mapper.fetch(&chain).unwrap_err();
    assert!(matches!(err, MapperError::ShapeMismatch(_)));
}

#[test]
fn test_many_to_many_graph() {
    let rows = RowSet::from_names(
        ["id", "post_id", "text", "id", "title", "id", "post_id", "category_id", "id", "name"],
        vec![vec![
            Value::from(7),
            Value::from(5),
            Value::from("hi"),
            Value::from(5),
            Value::from("T"),
            Value::from(30),
            Value::from(5),
            Value::from(2),
            Value::from(2),
            Value::from("rust"),
        ]],
    );
    let mut mapper = Mapper::new(driver_with(rows), Standard);
    let chain = RelationChain::new("comment")
        .join("post")
        .join("post_category")
        .join("category")
        .key(2);

    let comment = mapper.fetch(&chain).unwrap().unwrap();
    let post = mapper.entity(comment).unwrap().reference("post_id").unwrap();
    let bridge = mapper.get_tracked("post_category", 30).unwrap();
    let category = mapper.get_tracked("category", 2).unwrap();

    let bridge_entity = mapper.entity(bridge).unwrap();
    assert_eq!(bridge_entity.reference("post_id"), Some(post));
    assert_eq!(bridge_entity.reference("category_id"), Some(category));
    assert_eq!(
        mapper.entity(category).unwrap().value("name"),
        Some(&Value::from("rust"))
    );
}
