//! Relation chain compilation.
//!
//! [`QueryCompiler`] turns a [`RelationChain`](crate::relation::RelationChain) into one
//! SELECT statement with inferred joins. The [`RowLayout`] it produces alongside the
//! SQL tells the hydrator how to cut result rows back into per-node entities.

pub mod compiler;
pub mod layout;

pub use compiler::{CompiledQuery, QueryCompiler};
pub use layout::{MixinLayout, NodeLayout, OwnColumns, RowLayout, Width};
