//! Optional per-node capabilities.

/// Capabilities a node may declare. Anything left at its default is off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extras {
    /// Columns to select instead of `alias.*`; `["*"]` selects only the primary key.
    pub filters: Option<Vec<String>>,
    /// Secondary tables holding part of this node's columns.
    pub mixins: Vec<Mixin>,
    /// Discriminator column choosing the entity factory.
    pub type_column: Option<String>,
}

impl Extras {
    pub fn has_filters(&self) -> bool {
        self.filters.is_some()
    }

    pub fn has_mixins(&self) -> bool {
        !self.mixins.is_empty()
    }
}

/// Secondary table and the columns it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mixin {
    pub table: String,
    pub columns: Vec<String>,
}

impl Mixin {
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Entity field carrying this mixin's key, `{table}_id`.
    pub fn key_field(&self) -> String {
        format!("{}_id", self.table)
    }

    pub fn owns(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}
