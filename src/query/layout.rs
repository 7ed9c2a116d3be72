//! Column plan shared by the compiler and the hydrator.
//!
//! The compiler renders the select list from a [`RowLayout`]; the hydrator uses
//! the same layout to cut a flat row back into per-node segments. Each node owns
//! one contiguous segment: its own columns first, then every mixin's columns
//! followed by the mixin key.

use crate::naming::NamingStyle;
use crate::relation::{NodeId, RelationChain};

/// How many row cells a segment occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Exactly this many cells.
    Fixed(usize),
    /// `alias.*`: known only once the row arrives.
    Open,
}

/// Columns a node selects from its own table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnColumns {
    /// `alias.*`
    All,
    /// Primary key first, then the filtered columns and join keys.
    Listed(Vec<String>),
}

/// A mixin as it appears in the select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixinLayout {
    pub table: String,
    /// `{node_alias}_mix{table}`
    pub alias: String,
    pub columns: Vec<String>,
    pub primary_key: String,
    /// `{table}_id`, the name the mixin key is selected as.
    pub key_field: String,
}

impl MixinLayout {
    pub fn width(&self) -> usize {
        self.columns.len() + 1
    }
}

/// Segment plan of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLayout {
    pub node: NodeId,
    pub table: String,
    pub alias: String,
    pub primary_key: String,
    pub required: bool,
    pub own: OwnColumns,
    pub mixins: Vec<MixinLayout>,
}

impl NodeLayout {
    /// Width of the node's own columns.
    pub fn own_width(&self) -> Width {
        match &self.own {
            OwnColumns::All => Width::Open,
            OwnColumns::Listed(columns) => Width::Fixed(columns.len()),
        }
    }

    /// Cells taken by mixin columns and keys.
    pub fn mixin_width(&self) -> usize {
        self.mixins.iter().map(MixinLayout::width).sum()
    }

    /// Width of the whole segment.
    pub fn width(&self) -> Width {
        match self.own_width() {
            Width::Fixed(n) => Width::Fixed(n + self.mixin_width()),
            Width::Open => Width::Open,
        }
    }

    /// Qualified select expressions for this node.
    pub fn select_list(&self) -> Vec<String> {
        let mut list = match &self.own {
            OwnColumns::All => vec![format!("{}.*", self.alias)],
            OwnColumns::Listed(columns) => columns
                .iter()
                .map(|c| format!("{}.{c}", self.alias))
                .collect(),
        };
        for mixin in &self.mixins {
            list.extend(mixin.columns.iter().map(|c| format!("{}.{c}", mixin.alias)));
            list.push(format!(
                "{}.{} AS {}",
                mixin.alias, mixin.primary_key, mixin.key_field
            ));
        }
        list
    }
}

/// Column plan of a whole chain, in chain order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    nodes: Vec<NodeLayout>,
}

impl RowLayout {
    /// Derive the plan for `chain` under `style`.
    pub fn plan(chain: &RelationChain, style: &dyn NamingStyle) -> Self {
        let nodes = chain
            .iter()
            .map(|(id, node)| {
                let primary_key = style.primary_key_column(node.name());
                let own = match &node.extras().filters {
                    None => OwnColumns::All,
                    Some(filters) if filters.len() == 1 && filters[0] == "*" => {
                        OwnColumns::Listed(vec![primary_key.clone()])
                    }
                    Some(filters) => {
                        let mut columns = vec![primary_key.clone()];
                        columns.extend(filters.iter().filter(|c| c.as_str() != "*").cloned());
                        if let (Some(next_id), Some(next)) = (node.next(), chain.next_of(id)) {
                            // a bridge next joins back on our key, a direct next on its fk
                            if !chain.is_bridge(next_id, style) {
                                columns.push(style.foreign_key_column(next.name()));
                            }
                        }
                        if chain.is_bridge(id, style) {
                            if let Some(parent) = chain.parent_of(id) {
                                columns.push(style.foreign_key_column(parent.name()));
                            }
                        }
                        let mut seen = std::collections::HashSet::new();
                        columns.retain(|c| seen.insert(c.clone()));
                        OwnColumns::Listed(columns)
                    }
                };
                let mixins = node
                    .extras()
                    .mixins
                    .iter()
                    .map(|m| MixinLayout {
                        table: m.table.clone(),
                        alias: format!("{}_mix{}", node.alias(), m.table),
                        columns: m.columns.clone(),
                        primary_key: style.primary_key_column(&m.table),
                        key_field: m.key_field(),
                    })
                    .collect();
                NodeLayout {
                    node: id,
                    table: node.name().to_string(),
                    alias: node.alias().to_string(),
                    primary_key,
                    required: node.is_required(),
                    own,
                    mixins,
                }
            })
            .collect();
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeLayout] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Select expressions for the whole chain.
    pub fn select_list(&self) -> Vec<String> {
        self.nodes.iter().flat_map(NodeLayout::select_list).collect()
    }

    /// Sum of all fixed widths, open segments excluded.
    pub fn fixed_width(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| match n.own_width() {
                Width::Fixed(w) => w + n.mixin_width(),
                Width::Open => n.mixin_width(),
            })
            .sum()
    }

    /// Number of nodes selecting `alias.*`.
    pub fn open_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.own_width() == Width::Open)
            .count()
    }
}
