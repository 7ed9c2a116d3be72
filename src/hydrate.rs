//! Row → entity graph hydration.
//!
//! One result row of a compiled chain holds the columns of every node side by
//! side. [`RowHydrator`] cuts the row into per-node segments using the chain's
//! [`RowLayout`], builds one [`Entity`] per node and records which foreign-key
//! fields point at which sibling.
//!
//! Segments are located as follows:
//!
//! * filtered nodes and mixin columns have a fixed width;
//! * a single `alias.*` segment takes whatever the fixed segments leave;
//! * with several `alias.*` segments, each one but the last ends where the
//!   column metadata switches table, or without table metadata, where the next
//!   expected column name (the next node's primary key, or the node's first
//!   mixin column) shows up.

use crate::driver::ColumnMeta;
use crate::entity::{Entity, TypeRegistry};
use crate::error::MapperError;
use crate::naming::NamingStyle;
use crate::query::{NodeLayout, OwnColumns, RowLayout, Width};
use crate::relation::{NodeId, RelationChain};
use crate::value::{self, Value};
use std::ops::Range;

/// Entity built for one node of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedEntity {
    pub node: NodeId,
    pub table: String,
    /// Primary key read from the row.
    pub key: Value,
    pub entity: Entity,
}

/// `entities[from].field` refers to `entities[to]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub from: usize,
    pub field: String,
    pub to: usize,
}

/// Entities and links produced from one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydratedRow {
    pub entities: Vec<HydratedEntity>,
    pub links: Vec<Link>,
}

impl HydratedRow {
    /// Entity of the chain root, absent only for an empty row.
    pub fn root(&self) -> Option<&HydratedEntity> {
        self.entities.first()
    }

    pub fn find(&self, table: &str) -> Option<&HydratedEntity> {
        self.entities.iter().find(|e| e.table == table)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Cell ranges of one node inside a row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    own: Range<usize>,
    mixins: Range<usize>,
}

impl Segment {
    fn cells(&self) -> Range<usize> {
        self.own.start..self.mixins.end
    }
}

/// Turns rows into entity graphs.
#[derive(Debug, Clone, Copy)]
pub struct RowHydrator<'a> {
    style: &'a dyn NamingStyle,
    types: &'a TypeRegistry,
}

impl<'a> RowHydrator<'a> {
    pub fn new(style: &'a dyn NamingStyle, types: &'a TypeRegistry) -> Self {
        Self { style, types }
    }

    /// Hydrate one row.
    ///
    /// # Errors
    ///
    /// [`MapperError::ShapeMismatch`] when the row does not fit the layout or a
    /// node's primary key is missing.
    pub fn hydrate(
        &self,
        chain: &RelationChain,
        layout: &RowLayout,
        columns: &[ColumnMeta],
        row: Vec<Value>,
    ) -> Result<HydratedRow, MapperError> {
        if columns.len() != row.len() {
            return Err(MapperError::ShapeMismatch(format!(
                "row has {} cells but {} column descriptions",
                row.len(),
                columns.len()
            )));
        }
        let segments = segment(layout, columns)?;

        let mut hydrated = HydratedRow::default();
        for (node, seg) in layout.nodes().iter().zip(segments) {
            let cells = &row[seg.cells()];
            if !node.required && cells.iter().all(value::is_null) {
                log::debug!("Skipping absent left-joined node '{}'", node.alias);
                continue;
            }

            let key = seg
                .own
                .clone()
                .find(|&i| columns[i].name == node.primary_key)
                .map(|i| row[i].clone())
                .filter(|k| !value::is_null(k))
                .ok_or_else(|| {
                    MapperError::ShapeMismatch(format!(
                        "no primary key '{}' for '{}' in row",
                        node.primary_key, node.alias
                    ))
                })?;

            let mut entity = match &chain.node(node.node).extras().type_column {
                Some(column) => {
                    let discriminator = seg
                        .cells()
                        .find(|&i| columns[i].name == *column)
                        .map(|i| &row[i]);
                    self.types.instantiate(discriminator)
                }
                None => Entity::new(),
            };
            for i in seg.cells() {
                entity.set(self.style.column_to_property(&columns[i].name), row[i].clone());
            }

            hydrated.entities.push(HydratedEntity {
                node: node.node,
                table: node.table.clone(),
                key,
                entity,
            });
        }

        hydrated.links = self.backreferences(&hydrated.entities);
        Ok(hydrated)
    }

    /// Foreign-key fields that match a sibling's table and key.
    fn backreferences(&self, entities: &[HydratedEntity]) -> Vec<Link> {
        let mut links = Vec::new();
        for (from, source) in entities.iter().enumerate() {
            for (field, content) in source.entity.fields() {
                let column = self.style.property_to_column(field);
                if !self.style.is_foreign_key_column(&column) {
                    continue;
                }
                let Some(raw) = content.as_value() else {
                    continue;
                };
                let target_table = self.style.table_from_foreign_key_column(&column);
                let target = entities.iter().enumerate().find(|(to, sibling)| {
                    *to != from
                        && (target_table.as_deref() == Some(sibling.table.as_str())
                            || self.style.foreign_key_column(&sibling.table) == column)
                        && value::same_key(&sibling.key, raw)
                });
                if let Some((to, _)) = target {
                    links.push(Link {
                        from,
                        field: field.to_string(),
                        to,
                    });
                }
            }
        }
        links
    }
}

/// Cut `columns` into one segment per layout node.
fn segment(layout: &RowLayout, columns: &[ColumnMeta]) -> Result<Vec<Segment>, MapperError> {
    let total = columns.len();
    let fixed = layout.fixed_width();
    let open = layout.open_count();

    if total < fixed + open || (open == 0 && total != fixed) {
        return Err(MapperError::ShapeMismatch(format!(
            "row has {total} columns, layout expects {}{}",
            fixed,
            if open > 0 { " or more" } else { "" }
        )));
    }

    let has_tables = columns.iter().all(|c| c.table.is_some());
    let nodes = layout.nodes();
    let mut segments = Vec::with_capacity(nodes.len());
    let mut start = 0;
    let mut opens_left = open;

    for (index, node) in nodes.iter().enumerate() {
        let own_end = match node.own_width() {
            Width::Fixed(width) => start + width,
            Width::Open => {
                opens_left -= 1;
                // fixed cells still to come, this node's mixins included
                let reserved: usize = node.mixin_width()
                    + nodes[index + 1..]
                        .iter()
                        .map(|n| match n.own_width() {
                            Width::Fixed(w) => w + n.mixin_width(),
                            Width::Open => n.mixin_width(),
                        })
                        .sum::<usize>();
                let limit = total - reserved - opens_left;
                if opens_left == 0 {
                    limit
                } else {
                    open_boundary(node, nodes.get(index + 1), columns, start, limit, has_tables)?
                }
            }
        };
        let end = own_end + node.mixin_width();
        segments.push(Segment {
            own: start..own_end,
            mixins: own_end..end,
        });
        start = end;
    }

    Ok(segments)
}

/// End of a non-final open segment starting at `start`.
///
/// Table metadata decides first, unless the next node reads the same table
/// (self-joins); the expected column name decides otherwise.
fn open_boundary(
    node: &NodeLayout,
    next: Option<&NodeLayout>,
    columns: &[ColumnMeta],
    start: usize,
    limit: usize,
    has_tables: bool,
) -> Result<usize, MapperError> {
    let search = start + 1..=limit;
    let self_join = node.mixins.is_empty() && next.is_some_and(|n| n.table == node.table);
    let by_table = if has_tables && !self_join {
        let table = &columns[start].table;
        search.clone().find(|&i| columns[i].table != *table)
    } else {
        None
    };
    let found = match by_table {
        Some(end) => Some(end),
        None => match expected_column(node, next) {
            Some(expected) => search.clone().find(|&i| columns[i].name == expected),
            None => return Ok(limit),
        },
    };
    found.ok_or_else(|| {
        MapperError::ShapeMismatch(format!(
            "cannot find where '{}' ends in columns {}..={}",
            node.alias,
            search.start(),
            search.end()
        ))
    })
}

/// First column name expected after `node`'s own columns.
fn expected_column(node: &NodeLayout, next: Option<&NodeLayout>) -> Option<String> {
    match (node.mixins.first(), next) {
        (Some(mixin), _) => Some(
            mixin
                .columns
                .first()
                .cloned()
                .unwrap_or_else(|| mixin.key_field.clone()),
        ),
        (None, Some(next)) => Some(match &next.own {
            OwnColumns::Listed(listed) => listed
                .first()
                .cloned()
                .unwrap_or_else(|| next.primary_key.clone()),
            OwnColumns::All => next.primary_key.clone(),
        }),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::Standard;
    use crate::query::QueryCompiler;

    fn names(names: &[&str]) -> Vec<ColumnMeta> {
        names.iter().map(|n| ColumnMeta::new(*n)).collect()
    }

    fn run(
        chain: &RelationChain,
        columns: &[ColumnMeta],
        row: Vec<Value>,
    ) -> Result<HydratedRow, MapperError> {
        let types = TypeRegistry::new();
        let layout = QueryCompiler::new(&Standard).compile(chain).unwrap().layout().clone();
        RowHydrator::new(&Standard, &types).hydrate(chain, &layout, columns, row)
    }

    #[test]
    fn test_single_node_copies_row() {
        let chain = RelationChain::new("post");
        let row = run(
            &chain,
            &names(&["id", "title"]),
            vec![Value::from(1), Value::from("T")],
        )
        .unwrap();
        assert_eq!(row.len(), 1);
        let post = row.root().unwrap();
        assert_eq!(post.key, Value::from(1));
        assert_eq!(post.entity.value("title"), Some(&Value::from("T")));
        assert!(row.links.is_empty());
    }

    #[test]
    fn test_comment_post_by_primary_key_name() {
        let chain = RelationChain::new("comment").join("post").key(5);
        let row = run(
            &chain,
            &names(&["id", "post_id", "text", "id", "title", "text"]),
            vec![
                Value::from(7),
                Value::from(5),
                Value::from("hi"),
                Value::from(5),
                Value::from("T"),
                Value::from("body"),
            ],
        )
        .unwrap();
        assert_eq!(row.len(), 2);
        let comment = &row.entities[0];
        let post = &row.entities[1];
        assert_eq!(comment.entity.len(), 3);
        assert_eq!(post.entity.value("text"), Some(&Value::from("body")));
        assert_eq!(post.key, Value::from(5));
        assert_eq!(
            row.links,
            vec![Link {
                from: 0,
                field: "post_id".to_string(),
                to: 1
            }]
        );
    }

    #[test]
    fn test_table_metadata_takes_precedence() {
        let chain = RelationChain::new("comment").join("post");
        let columns = vec![
            ColumnMeta::with_table("id", "comment"),
            ColumnMeta::with_table("post_id", "comment"),
            ColumnMeta::with_table("id", "post"),
        ];
        let row = run(
            &chain,
            &columns,
            vec![Value::from(1), Value::from(2), Value::from(2)],
        )
        .unwrap();
        assert_eq!(row.entities[0].entity.len(), 2);
        assert_eq!(row.entities[1].entity.len(), 1);
    }

    #[test]
    fn test_fixed_segments_with_one_open() {
        let chain = RelationChain::new("comment").filters(["text"]).join("post");
        let row = run(
            &chain,
            &names(&["id", "text", "post_id", "id", "title"]),
            vec![
                Value::from(1),
                Value::from("x"),
                Value::from(9),
                Value::from(9),
                Value::from("T"),
            ],
        )
        .unwrap();
        assert_eq!(row.entities[0].entity.len(), 3);
        assert_eq!(row.entities[1].entity.value("title"), Some(&Value::from("T")));
        assert_eq!(row.links.len(), 1);
    }

    #[test]
    fn test_short_row_is_a_mismatch() {
        let chain = RelationChain::new("comment")
            .filters(["text"])
            .join("post")
            .filters(["title"]);
        let err = run(&chain, &names(&["id", "text"]), vec![Value::from(1), Value::from("x")])
            .unwrap_err();
        assert!(matches!(err, MapperError::ShapeMismatch(_)));
    }

    #[test]
    fn test_missing_boundary_is_a_mismatch() {
        let chain = RelationChain::new("comment").join("post");
        let err = run(
            &chain,
            &names(&["id", "text", "title"]),
            vec![Value::from(1), Value::from("x"), Value::from("T")],
        )
        .unwrap_err();
        assert!(matches!(err, MapperError::ShapeMismatch(_)));
    }

    #[test]
    fn test_null_primary_key_is_a_mismatch() {
        let chain = RelationChain::new("post");
        let err = run(&chain, &names(&["id", "title"]), vec![Value::Int(None), Value::from("T")])
            .unwrap_err();
        assert!(matches!(err, MapperError::ShapeMismatch(_)));
    }

    #[test]
    fn test_absent_left_join_is_skipped() {
        let chain = RelationChain::new("comment").left_join("post");
        let row = run(
            &chain,
            &names(&["id", "post_id", "id", "title"]),
            vec![Value::from(1), Value::Int(None), Value::Int(None), Value::String(None)],
        )
        .unwrap();
        assert_eq!(row.len(), 1);
        assert!(row.links.is_empty());
    }

    #[test]
    fn test_type_column_selects_factory() {
        let chain = RelationChain::new("post").typed("kind");
        let mut types = TypeRegistry::new();
        types.register_kind("news", "NewsPost");
        let layout = QueryCompiler::new(&Standard).compile(&chain).unwrap().layout().clone();
        let row = RowHydrator::new(&Standard, &types)
            .hydrate(
                &chain,
                &layout,
                &names(&["id", "kind"]),
                vec![Value::from(1), Value::from("news")],
            )
            .unwrap();
        assert_eq!(row.root().unwrap().entity.kind(), Some("NewsPost"));
    }

    #[test]
    fn test_mixin_columns_land_on_owner() {
        let chain = RelationChain::new("user").mixin("profile", ["bio"]);
        let row = run(
            &chain,
            &names(&["id", "name", "profile_id", "bio", "profile_id"]),
            vec![
                Value::from(1),
                Value::from("ann"),
                Value::from(4),
                Value::from("hello"),
                Value::from(4),
            ],
        )
        .unwrap();
        let user = &row.root().unwrap().entity;
        assert_eq!(user.value("bio"), Some(&Value::from("hello")));
        assert_eq!(user.value("profile_id"), Some(&Value::from(4)));
        assert_eq!(user.len(), 4);
    }

    #[test]
    fn test_many_to_many_links() {
        let chain = RelationChain::new("post").join("post_category").join("category");
        let row = run(
            &chain,
            &names(&["id", "title", "id", "post_id", "category_id", "id", "name"]),
            vec![
                Value::from(1),
                Value::from("T"),
                Value::from(10),
                Value::from(1),
                Value::from(2),
                Value::from(2),
                Value::from("rust"),
            ],
        )
        .unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(
            row.links,
            vec![
                Link { from: 1, field: "post_id".to_string(), to: 0 },
                Link { from: 1, field: "category_id".to_string(), to: 2 },
            ]
        );
    }

    #[test]
    fn test_self_join_with_table_metadata() {
        let chain = RelationChain::new("category")
            .key(8)
            .join("category")
            .alias("parent");
        let columns: Vec<ColumnMeta> = ["id", "category_id", "name", "id", "category_id", "name"]
            .into_iter()
            .map(|name| ColumnMeta::with_table(name, "category"))
            .collect();
        let row = run(
            &chain,
            &columns,
            vec![
                Value::from(8),
                Value::from(1),
                Value::from("child"),
                Value::from(1),
                Value::Int(None),
                Value::from("root"),
            ],
        )
        .unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.entities[0].key, Value::from(8));
        assert_eq!(row.entities[1].key, Value::from(1));
        assert_eq!(row.entities[1].entity.value("name"), Some(&Value::from("root")));
        assert_eq!(
            row.links,
            vec![Link { from: 0, field: "category_id".to_string(), to: 1 }]
        );
    }

    #[test]
    fn test_plural_tables_link_through_foreign_key_name() {
        use crate::naming::CakePhp;

        let chain = RelationChain::new("comments").join("posts");
        let types = TypeRegistry::new();
        let layout = QueryCompiler::new(&CakePhp).compile(&chain).unwrap().layout().clone();
        let row = RowHydrator::new(&CakePhp, &types)
            .hydrate(
                &chain,
                &layout,
                &names(&["id", "post_id", "text", "id", "title"]),
                vec![
                    Value::from(7),
                    Value::from(5),
                    Value::from("hi"),
                    Value::from(5),
                    Value::from("T"),
                ],
            )
            .unwrap();
        assert_eq!(
            row.links,
            vec![Link { from: 0, field: "post_id".to_string(), to: 1 }]
        );
    }
}
