//! # Relata
//!
//! Convention-driven object-relational mapping over `may_postgres`.
//!
//! A [`RelationChain`] such as `comment → post → category[2]` is compiled into one
//! SELECT with joins inferred from a [`NamingStyle`]; result rows are hydrated into
//! graphs of [`Entity`] records whose foreign keys become references; and a
//! [`UnitOfWork`] turns the mutations you make into inserts, updates and deletes
//! written in a single transaction by [`Mapper::flush`].
//!
//! ```
//! use relata::naming::Standard;
//! use relata::query::QueryCompiler;
//! use relata::relation::RelationChain;
//!
//! let chain = RelationChain::new("comment")
//!     .join("post")
//!     .join("post_category")
//!     .join("category")
//!     .key(2);
//! let query = QueryCompiler::new(&Standard).compile(&chain)?;
//! assert!(query.text().contains("INNER JOIN post_category ON post_category.post_id = post.id"));
//! # Ok::<(), relata::MapperError>(())
//! ```

pub mod config;
pub mod driver;
pub mod entity;
pub mod error;
pub mod hydrate;
pub mod mapper;
pub mod metrics;
pub mod naming;
pub mod query;
pub mod relation;
pub mod sql;
pub mod transaction;
pub mod unit_of_work;
pub mod value;

pub use config::MapperConfig;
pub use driver::{Driver, DriverError, MayPostgresDriver};
pub use entity::{Entity, EntityId, Field, TypeRegistry};
pub use error::MapperError;
pub use mapper::Mapper;
pub use naming::{CakePhp, NamingStyle, NamingStyleKind, Standard};
pub use relation::RelationChain;
pub use sql::{Criteria, Sql, SqlBuilder};
pub use unit_of_work::UnitOfWork;
pub use value::Value;
