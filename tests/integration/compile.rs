//! Chain compilation through the public API.

use relata::naming::{CakePhp, Standard};
use relata::query::QueryCompiler;
use relata::relation::RelationChain;
use relata::sql::{Criteria, Sql, SqlBuilder};
use relata::{MapperError, Value};

#[test]
fn test_single_table_selects_everything() {
    let query = QueryCompiler::new(&Standard)
        .compile(&RelationChain::new("author"))
        .unwrap();
    assert_eq!(query.text(), "SELECT author.* FROM author");
    assert!(query.params().is_empty());

    let query = QueryCompiler::new(&Standard)
        .compile(&RelationChain::new("author").key(3))
        .unwrap();
    assert_eq!(query.text(), "SELECT author.* FROM author WHERE author.id = ?");
    assert_eq!(query.params(), &[Value::from(3)]);
}

#[test]
fn test_many_to_many_chain() {
    let chain = RelationChain::new("comment")
        .join("post")
        .join("post_category")
        .join("category")
        .key(2);
    let query = QueryCompiler::new(&Standard).compile(&chain).unwrap();
    assert_eq!(
        query.text(),
        "SELECT comment.*, post.*, post_category.*, category.* FROM comment \
         INNER JOIN post ON comment.post_id = post.id \
         INNER JOIN post_category ON post_category.post_id = post.id \
         INNER JOIN category ON post_category.category_id = category.id \
         WHERE category.id = ?"
    );
    assert_eq!(query.params(), &[Value::from(2)]);
}

#[test]
fn test_cake_php_chain() {
    let chain = RelationChain::new("comments").join("posts").key(5);
    let query = QueryCompiler::new(&CakePhp).compile(&chain).unwrap();
    assert_eq!(
        query.text(),
        "SELECT comments.*, posts.* FROM comments INNER JOIN posts ON comments.post_id = posts.id WHERE posts.id = ?"
    );
}

#[test]
fn test_self_join_needs_alias() {
    let err = QueryCompiler::new(&Standard)
        .compile(&RelationChain::new("category").join("category"))
        .unwrap_err();
    assert!(matches!(err, MapperError::Configuration(_)));

    let chain = RelationChain::new("category")
        .join("category")
        .alias("parent")
        .matching(Criteria::new().with("name", "root"));
    let query = QueryCompiler::new(&Standard).compile(&chain).unwrap();
    assert_eq!(
        query.text(),
        "SELECT category.*, parent.* FROM category \
         INNER JOIN category AS parent ON category.category_id = parent.id \
         WHERE parent.name = ?"
    );
}

#[test]
fn test_parameters_follow_append_order() {
    let chain = RelationChain::new("comment")
        .matching(Criteria::new().with("approved", true))
        .join("post")
        .key(5);
    let extra = Sql::raw("AND comment.id > ?", vec![Value::from(100)]).limit(10);
    let query = QueryCompiler::new(&Standard)
        .compile(&chain)
        .unwrap()
        .append(&extra);
    assert!(query.text().ends_with("WHERE comment.approved = ? AND post.id = ? AND comment.id > ? LIMIT 10"));
    assert_eq!(
        query.params(),
        &[Value::from(true), Value::from(5), Value::from(100)]
    );
}
