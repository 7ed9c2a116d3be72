//! Chain → SELECT compiler.
//!
//! Joins are never declared; they are inferred from the naming style:
//!
//! * a node whose name is the junction table of its neighbours is a bridge and
//!   joins as `alias.fk(parent) = parent_alias.pk(parent)`;
//! * any other node joins as `parent_alias.fk(name) = alias.pk(name)`.

use super::layout::RowLayout;
use crate::error::MapperError;
use crate::naming::NamingStyle;
use crate::relation::{NodeCondition, NodeId, RelationChain, RelationNode};
use crate::sql::{Criteria, Criterion, Sql, SqlBuilder};
use crate::value::Value;
use regex::Regex;

/// SELECT statement plus the row layout it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    sql: Sql,
    layout: RowLayout,
}

impl CompiledQuery {
    /// Statement text with `?` placeholders.
    pub fn text(&self) -> String {
        self.sql.build()
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> &[Value] {
        self.sql.params()
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn sql(&self) -> &Sql {
        &self.sql
    }

    /// Append a trailing fragment (extra filters, ordering, limits). Its
    /// parameters follow the compiled ones.
    pub fn append(mut self, fragment: &Sql) -> Self {
        self.sql = self.sql.append(fragment);
        self
    }

    pub fn into_parts(self) -> (String, Vec<Value>, RowLayout) {
        let (text, params) = self.sql.into_parts();
        (text, params, self.layout)
    }
}

/// Compiles relation chains under one naming style.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'s> {
    style: &'s dyn NamingStyle,
}

impl<'s> QueryCompiler<'s> {
    pub fn new(style: &'s dyn NamingStyle) -> Self {
        Self { style }
    }

    /// Compile `chain` into a SELECT statement.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::Configuration`] when two nodes share an alias.
    ///
    /// # Examples
    ///
    /// ```
    /// use relata::naming::Standard;
    /// use relata::query::QueryCompiler;
    /// use relata::relation::RelationChain;
    ///
    /// let chain = RelationChain::new("comment").join("post").key(5);
    /// let query = QueryCompiler::new(&Standard).compile(&chain)?;
    /// assert_eq!(
    ///     query.text(),
    ///     "SELECT comment.*, post.* FROM comment INNER JOIN post ON comment.post_id = post.id WHERE post.id = ?"
    /// );
    /// # Ok::<(), relata::MapperError>(())
    /// ```
    pub fn compile(&self, chain: &RelationChain) -> Result<CompiledQuery, MapperError> {
        chain.validate_aliases()?;
        let layout = RowLayout::plan(chain, self.style);
        let sql = self.compile_into(Sql::new(), chain, &layout)?;
        log::debug!("Compiled relation chain: {}", sql.build());
        Ok(CompiledQuery { sql, layout })
    }

    /// Write the statement for `chain` into any builder.
    pub fn compile_into<B: SqlBuilder>(
        &self,
        builder: B,
        chain: &RelationChain,
        layout: &RowLayout,
    ) -> Result<B, MapperError> {
        let mut sql = builder.select(layout.select_list());
        let mut conditions = Criteria::new();

        for (id, node) in chain.iter() {
            conditions.extend(self.node_conditions(node)?);

            sql = match chain.parent_of(id) {
                None => sql.from([node.name()]),
                Some(_) if node.is_required() => sql.inner_join(node.name()),
                Some(_) => sql.left_join(node.name()),
            };
            if node.has_alias() {
                sql = sql.alias(node.alias());
            }
            if let Some(parent) = chain.parent_of(id) {
                sql = sql.on([self.join_keys(chain, id, node, parent)]);
            }

            for mixin in &node.extras().mixins {
                let mix_alias = format!("{}_mix{}", node.alias(), mixin.table);
                let on = (
                    format!("{mix_alias}.{}", self.style.primary_key_column(&mixin.table)),
                    format!("{}.{}", node.alias(), self.style.foreign_key_column(&mixin.table)),
                );
                sql = sql.inner_join(&mixin.table).alias(&mix_alias).on([on]);
            }
        }

        Ok(sql.where_(conditions))
    }

    fn join_keys(
        &self,
        chain: &RelationChain,
        id: NodeId,
        node: &RelationNode,
        parent: &RelationNode,
    ) -> (String, String) {
        let style = self.style;
        if chain.is_bridge(id, style) {
            (
                format!("{}.{}", node.alias(), style.foreign_key_column(parent.name())),
                format!("{}.{}", parent.alias(), style.primary_key_column(parent.name())),
            )
        } else {
            (
                format!("{}.{}", parent.alias(), style.foreign_key_column(node.name())),
                format!("{}.{}", node.alias(), style.primary_key_column(node.name())),
            )
        }
    }

    /// Scope a node's condition to its alias.
    fn node_conditions(&self, node: &RelationNode) -> Result<Criteria, MapperError> {
        let alias = node.alias();
        match node.condition() {
            NodeCondition::None => Ok(Criteria::new()),
            NodeCondition::Key(key) => Ok(Criteria::new().with(
                format!("{alias}.{}", self.style.primary_key_column(node.name())),
                key.clone(),
            )),
            NodeCondition::Criteria(criteria) => {
                let rewrite = QualifierRewrite::new(node.name(), alias)?;
                let mut scoped = Criteria::new();
                for criterion in criteria {
                    scoped.push(match criterion {
                        Criterion::Column(column, value) => {
                            let column = if column.contains('.') {
                                rewrite.apply(column)
                            } else {
                                format!("{alias}.{column}")
                            };
                            Criterion::Column(column, value.clone())
                        }
                        Criterion::Raw(expression) => Criterion::Raw(rewrite.apply(expression)),
                    });
                }
                Ok(scoped)
            }
        }
    }
}

/// Rewrites `name.` references to `alias.`.
struct QualifierRewrite<'a> {
    pattern: Option<Regex>,
    alias: &'a str,
}

impl<'a> QualifierRewrite<'a> {
    fn new(name: &str, alias: &'a str) -> Result<Self, MapperError> {
        if name == alias {
            return Ok(Self { pattern: None, alias });
        }
        let pattern = Regex::new(&format!(r"\b{}\.", regex::escape(name)))
            .map_err(|e| MapperError::Configuration(format!("invalid table name '{name}': {e}")))?;
        Ok(Self {
            pattern: Some(pattern),
            alias,
        })
    }

    fn apply(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, format!("{}.", self.alias).as_str())
                .into_owned(),
            None => text.to_string(),
        }
    }
}
