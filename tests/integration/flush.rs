//! Persisting changes through the unit of work.

use crate::{comment_post_row, driver_with};
use relata::driver::MockDriver;
use relata::naming::{CakePhp, Standard};
use relata::relation::RelationChain;
use relata::{Entity, Mapper, MapperError, Value};

#[test]
fn test_persist_twice_is_one_insert() {
    let mut mapper = Mapper::new(MockDriver::new(), Standard);
    let post = mapper.create(Entity::new().with("title", "draft"));
    mapper.persist(post, Some("post")).unwrap();
    mapper.persist(post, Some("post")).unwrap();
    mapper.flush().unwrap();

    let committed = mapper.driver().committed();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].sql, "INSERT INTO post (title) VALUES (?)");
    assert_eq!(committed[0].params, vec![Value::from("draft")]);
}

#[test]
fn test_identity_read_back() {
    let mut driver = MockDriver::new();
    driver.push_identity(3);
    let mut mapper = Mapper::new(driver, Standard);
    let post = mapper.create(Entity::with_kind("Post").with("title", "new"));
    mapper.persist(post, None).unwrap();
    mapper.flush().unwrap();

    assert_eq!(mapper.entity(post).unwrap().value("id"), Some(&Value::from(3)));
    assert_eq!(mapper.get_tracked("post", 3), Some(post));
}

#[test]
fn test_flush_is_atomic() {
    let mut driver = MockDriver::new();
    driver.fail_on_execute(2);
    let mut mapper = Mapper::new(driver, Standard);
    for title in ["a", "b", "c"] {
        let post = mapper.create(Entity::new().with("title", title));
        mapper.persist(post, Some("post")).unwrap();
    }

    let err = mapper.flush().unwrap_err();
    assert!(matches!(err, MapperError::Driver(_)));
    assert!(mapper.driver().committed().is_empty());
    assert_eq!(mapper.driver().rollbacks(), 1);
    assert_eq!(mapper.driver().executed().len(), 1);
}

#[test]
fn test_remove_fetched_entity() {
    let mut mapper = Mapper::new(driver_with(comment_post_row()), Standard);
    let comment = mapper
        .fetch(&RelationChain::new("comment").join("post").key(5))
        .unwrap()
        .unwrap();
    mapper.remove(comment, None).unwrap();
    mapper.flush().unwrap();

    let committed = mapper.driver().committed();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].sql, "DELETE FROM comment WHERE id = ?");
    assert_eq!(committed[0].params, vec![Value::from(7)]);
    assert_eq!(mapper.get_tracked("comment", 7), Some(comment));
}

#[test]
fn test_new_comment_on_fetched_post() {
    let mut driver = driver_with(comment_post_row());
    driver.push_identity(8);
    let mut mapper = Mapper::new(driver, Standard);
    let existing = mapper
        .fetch(&RelationChain::new("comment").join("post").key(5))
        .unwrap()
        .unwrap();
    let post = mapper.entity(existing).unwrap().reference("post_id").unwrap();

    let mut reply = Entity::new().with("text", "me too");
    reply.set_ref("post_id", post);
    let reply = mapper.create(reply);
    mapper.persist(reply, Some("comment")).unwrap();
    mapper.flush().unwrap();

    let insert = &mapper.driver().committed()[0];
    assert_eq!(insert.sql, "INSERT INTO comment (text, post_id) VALUES (?, ?)");
    assert_eq!(insert.params, vec![Value::from("me too"), Value::from(5)]);
    assert_eq!(mapper.get_tracked("comment", 8), Some(reply));
}

#[test]
fn test_cake_php_table_inference() {
    let mut mapper = Mapper::new(MockDriver::new(), CakePhp);
    let category = mapper.create(Entity::with_kind("PostCategory").with("id", 1).with("post_id", 2));
    mapper.persist(category, None).unwrap();
    mapper.flush().unwrap();
    assert_eq!(
        mapper.driver().committed()[0].sql,
        "INSERT INTO post_categories (id, post_id) VALUES (?, ?)"
    );
}

#[test]
fn test_untracked_entity_needs_a_table() {
    let mut mapper = Mapper::new(MockDriver::new(), Standard);
    let orphan = mapper.create(Entity::new().with("title", "?"));
    assert!(matches!(
        mapper.persist(orphan, None),
        Err(MapperError::Configuration(_))
    ));
    mapper.flush().unwrap();
    assert_eq!(mapper.driver().begins(), 0);
}

#[test]
fn test_persist_mixin_entity_without_fetching() {
    let mut driver = MockDriver::new();
    driver.push_identity(4).push_identity(1);
    let mut mapper = Mapper::new(driver, Standard);
    let users = RelationChain::new("user").mixin("profile", ["bio"]);

    let user = mapper.create(Entity::new().with("name", "ann").with("bio", "hello"));
    mapper.persist_in(user, &users).unwrap();
    mapper.flush().unwrap();

    let committed = mapper.driver().committed();
    assert_eq!(committed.len(), 2);
    assert_eq!(committed[0].sql, "INSERT INTO profile (bio) VALUES (?)");
    assert_eq!(committed[1].sql, "INSERT INTO user (name, profile_id) VALUES (?, ?)");
    assert_eq!(committed[1].params, vec![Value::from("ann"), Value::from(4)]);
    assert_eq!(mapper.get_tracked("user", 1), Some(user));
}

#[test]
fn test_remove_mixin_entity_without_fetching() {
    let mut mapper = Mapper::new(MockDriver::new(), Standard);
    let users = RelationChain::new("user").mixin("profile", ["bio"]);
    let user = mapper.create(
        Entity::new()
            .with("id", 3)
            .with("name", "ann")
            .with("bio", "hello")
            .with("profile_id", 4),
    );
    mapper.remove_in(user, &users).unwrap();
    mapper.flush().unwrap();

    let sqls: Vec<&str> = mapper.driver().committed().iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(sqls, ["DELETE FROM user WHERE id = ?", "DELETE FROM profile WHERE id = ?"]);
    assert_eq!(mapper.driver().committed()[1].params, vec![Value::from(4)]);
}
