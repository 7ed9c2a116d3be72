//! Relation chains.
//!
//! A [`RelationChain`] is the traversal path a query walks, e.g.
//! `comment → post → category`. Nodes live in an arena owned by the chain and
//! point at each other through [`NodeId`] indices, so a node never owns its
//! neighbours.
//!
//! # Example
//!
//! ```
//! use relata::relation::RelationChain;
//!
//! // comment → post[5]
//! let chain = RelationChain::new("comment").join("post").key(5);
//! assert_eq!(chain.len(), 2);
//! ```

pub mod extras;

use crate::error::MapperError;
use crate::naming::NamingStyle;
use crate::sql::Criteria;
use crate::value::Value;
use std::collections::HashSet;

pub use extras::{Extras, Mixin};

/// Index of a node inside its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Condition attached to a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeCondition {
    #[default]
    None,
    /// `alias.pk = value`
    Key(Value),
    /// Column comparisons and raw expressions scoped to the node's alias.
    Criteria(Criteria),
}

impl NodeCondition {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// One step of a relation chain.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationNode {
    name: String,
    alias: Option<String>,
    parent: Option<NodeId>,
    next: Option<NodeId>,
    required: bool,
    condition: NodeCondition,
    extras: Extras,
}

impl RelationNode {
    fn new(name: impl Into<String>, parent: Option<NodeId>, required: bool) -> Self {
        Self {
            name: name.into(),
            alias: None,
            parent,
            next: None,
            required,
            condition: NodeCondition::None,
            extras: Extras::default(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias used in compiled SQL; the table name unless one was set.
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn has_alias(&self) -> bool {
        self.alias.as_deref().is_some_and(|a| a != self.name)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// `true` for inner joins, `false` for left joins.
    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn condition(&self) -> &NodeCondition {
        &self.condition
    }

    pub fn extras(&self) -> &Extras {
        &self.extras
    }
}

/// Singly linked path of relation nodes.
///
/// Builder methods act on the last node added; [`join`](Self::join) and
/// [`left_join`](Self::left_join) append a new node.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationChain {
    nodes: Vec<RelationNode>,
}

impl RelationChain {
    /// Start a chain at `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            nodes: vec![RelationNode::new(table, None, true)],
        }
    }

    fn push(mut self, table: impl Into<String>, required: bool) -> Self {
        let parent = NodeId(self.nodes.len() - 1);
        let id = NodeId(self.nodes.len());
        self.nodes.push(RelationNode::new(table, Some(parent), required));
        self.nodes[parent.0].next = Some(id);
        self
    }

    fn last_mut(&mut self) -> &mut RelationNode {
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    /// Append `table`, joined with an inner join.
    pub fn join(self, table: impl Into<String>) -> Self {
        self.push(table, true)
    }

    /// Append `table`, joined with a left join.
    pub fn left_join(self, table: impl Into<String>) -> Self {
        self.push(table, false)
    }

    /// Make the last node optional (left join). No effect on the root.
    pub fn optional(mut self) -> Self {
        if self.nodes.len() > 1 {
            self.last_mut().required = false;
        }
        self
    }

    /// Restrict the last node to one primary key.
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.last_mut().condition = NodeCondition::Key(key.into());
        self
    }

    /// Restrict the last node with criteria. Repeated calls accumulate.
    pub fn matching(mut self, criteria: Criteria) -> Self {
        let node = self.last_mut();
        match &mut node.condition {
            NodeCondition::Criteria(existing) => existing.extend(criteria),
            other => *other = NodeCondition::Criteria(criteria),
        }
        self
    }

    /// Name the last node in SQL.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.last_mut().alias = Some(alias.into());
        self
    }

    /// Select only `columns` (plus the keys the chain needs) for the last node.
    pub fn filters<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.last_mut().extras.filters = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Store part of the last node's columns in a secondary `table`.
    pub fn mixin<I, S>(mut self, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.last_mut().extras.mixins.push(Mixin::new(table, columns));
        self
    }

    /// Instantiate the last node's entities through the factory registered
    /// for the value of `column`.
    pub fn typed(mut self, column: impl Into<String>) -> Self {
        self.last_mut().extras.type_column = Some(column.into());
        self
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &RelationNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&RelationNode> {
        self.nodes.get(id.0)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<&RelationNode> {
        self.node(id).parent.map(|p| self.node(p))
    }

    pub fn next_of(&self, id: NodeId) -> Option<&RelationNode> {
        self.node(id).next.map(|n| self.node(n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Nodes from the root following `next` links.
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            cursor: Some(self.root()),
        }
    }

    /// Fails on the first alias used twice.
    pub fn validate_aliases(&self) -> Result<(), MapperError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for (_, node) in self.iter() {
            if !seen.insert(node.alias()) {
                return Err(MapperError::Configuration(format!(
                    "duplicate alias '{}' in relation chain",
                    node.alias()
                )));
            }
        }
        Ok(())
    }

    /// Whether `id` is the junction table between its parent and its next node.
    pub fn is_bridge(&self, id: NodeId, style: &dyn NamingStyle) -> bool {
        let node = self.node(id);
        let (Some(parent), Some(next)) = (self.parent_of(id), self.next_of(id)) else {
            return false;
        };
        node.name == style.junction_table_name(parent.name(), next.name())
            || node.name == style.junction_table_name(next.name(), parent.name())
    }
}

/// Iterator over `(NodeId, &RelationNode)` in chain order.
pub struct ChainIter<'a> {
    chain: &'a RelationChain,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = (NodeId, &'a RelationNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.chain.get(id)?;
        self.cursor = node.next;
        Some((id, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{CakePhp, Standard};

    #[test]
    fn test_links_follow_chain_order() {
        let chain = RelationChain::new("comment").join("post").join("author");
        let names: Vec<&str> = chain.iter().map(|(_, n)| n.name()).collect();
        assert_eq!(names, ["comment", "post", "author"]);

        let post = NodeId(1);
        assert_eq!(chain.parent_of(post).map(RelationNode::name), Some("comment"));
        assert_eq!(chain.next_of(post).map(RelationNode::name), Some("author"));
        assert!(chain.node(chain.root()).parent().is_none());
        assert!(chain.node(NodeId(2)).next().is_none());
    }

    #[test]
    fn test_defaults() {
        let chain = RelationChain::new("post");
        let root = chain.node(chain.root());
        assert_eq!(root.alias(), "post");
        assert!(!root.has_alias());
        assert!(root.is_required());
        assert!(root.condition().is_none());
        assert_eq!(root.extras(), &Extras::default());
        assert!(chain.is_single());
    }

    #[test]
    fn test_builders_apply_to_last_node() {
        let chain = RelationChain::new("comment")
            .left_join("post")
            .alias("p")
            .key(5)
            .filters(["title"])
            .typed("kind");
        let post = chain.node(NodeId(1));
        assert!(!post.is_required());
        assert_eq!(post.alias(), "p");
        assert_eq!(post.condition(), &NodeCondition::Key(Value::from(5)));
        assert_eq!(post.extras().filters.as_deref(), Some(&["title".to_string()][..]));
        assert_eq!(post.extras().type_column.as_deref(), Some("kind"));
        assert!(chain.node(chain.root()).condition().is_none());
    }

    #[test]
    fn test_optional_ignores_root() {
        let chain = RelationChain::new("post").optional();
        assert!(chain.node(chain.root()).is_required());
        let chain = RelationChain::new("comment").join("post").optional();
        assert!(!chain.node(NodeId(1)).is_required());
    }

    #[test]
    fn test_matching_accumulates() {
        let chain = RelationChain::new("post")
            .matching(Criteria::new().with("title", "a"))
            .matching(Criteria::new().raw("post.id > 3"));
        match chain.node(chain.root()).condition() {
            NodeCondition::Criteria(c) => assert_eq!(c.len(), 2),
            other => panic!("unexpected condition {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_alias_is_rejected() {
        let chain = RelationChain::new("post").join("post");
        assert!(matches!(
            chain.validate_aliases(),
            Err(MapperError::Configuration(_))
        ));
        let chain = RelationChain::new("post").join("post").alias("parent");
        assert!(chain.validate_aliases().is_ok());
    }

    #[test]
    fn test_bridge_detection() {
        let chain = RelationChain::new("post").join("post_category").join("category");
        assert!(chain.is_bridge(NodeId(1), &Standard));
        assert!(!chain.is_bridge(NodeId(0), &Standard));
        assert!(!chain.is_bridge(NodeId(2), &Standard));

        let reversed = RelationChain::new("category").join("post_category").join("post");
        assert!(reversed.is_bridge(NodeId(1), &Standard));

        let cake = RelationChain::new("posts").join("post_categories").join("categories");
        assert!(cake.is_bridge(NodeId(1), &CakePhp));
    }
}
