//! Identity map and change tracking.
//!
//! The [`UnitOfWork`] owns every entity a mapper has seen. Fetched rows are
//! absorbed into its identity map, so the same `(table, primary key)` always
//! resolves to the same [`EntityId`]. Entities marked with
//! [`persist`](UnitOfWork::persist) or [`remove`](UnitOfWork::remove) are written
//! by [`flush`](UnitOfWork::flush) inside one transaction, in the order they were
//! marked.
//!
//! ```text
//! untracked ──persist/remove──▶ changed ──flush──▶ tracked (clean)
//!      ▲                                             │
//!      └──────────────────forget─────────────────────┘
//! ```

use crate::driver::Driver;
use crate::entity::{Entity, EntityId, Field};
use crate::error::MapperError;
use crate::hydrate::HydratedRow;
use crate::metrics::METRICS;
use crate::naming::NamingStyle;
use crate::relation::Mixin;
use crate::sql::{Criteria, Sql, SqlBuilder};
use crate::transaction::Transaction;
use crate::value::{self, KeyValue, Value};
use std::collections::{HashMap, HashSet};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// What the unit of work knows about a tracked entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingRecord {
    pub table: String,
    /// Primary key when tracking started or at the last flush.
    pub key: Option<KeyValue>,
    /// Column snapshot taken at the same moment.
    pub columns: Vec<(String, Value)>,
}

/// Insertion-ordered set of entity ids.
#[derive(Debug, Clone, Default)]
struct ChangeSet {
    order: Vec<EntityId>,
    members: HashSet<EntityId>,
}

impl ChangeSet {
    fn insert(&mut self, id: EntityId) {
        if self.members.insert(id) {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: EntityId) {
        if self.members.remove(&id) {
            self.order.retain(|o| *o != id);
        }
    }

    fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Field values overwritten during a flush, restored if it fails.
type Undo = Vec<(EntityId, String, Option<Field>)>;

/// Entity arena, identity map and pending changes.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    entities: Vec<Entity>,
    tracked: HashMap<EntityId, TrackingRecord>,
    identity: HashMap<(String, KeyValue), EntityId>,
    new: ChangeSet,
    changed: ChangeSet,
    removed: ChangeSet,
    mixins: HashMap<String, Vec<Mixin>>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a new, untracked entity.
    pub fn create(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(entity);
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0)
    }

    fn existing(&self, id: EntityId) -> Result<&Entity, MapperError> {
        self.entity(id)
            .ok_or_else(|| MapperError::Configuration(format!("unknown entity {id}")))
    }

    fn existing_mut(&mut self, id: EntityId) -> Result<&mut Entity, MapperError> {
        self.entity_mut(id)
            .ok_or_else(|| MapperError::Configuration(format!("unknown entity {id}")))
    }

    /// Mark an entity for insert (untracked) or update (tracked).
    ///
    /// Untracked entities need a table: `table_hint`, or their kind mapped
    /// through [`NamingStyle::entity_to_table`].
    ///
    /// # Errors
    ///
    /// [`MapperError::Configuration`] for unknown ids or when no table can be
    /// inferred.
    pub fn persist(
        &mut self,
        id: EntityId,
        table_hint: Option<&str>,
        style: &dyn NamingStyle,
    ) -> Result<(), MapperError> {
        if !self.is_tracked(id) {
            self.track(id, table_hint, style)?;
            self.new.insert(id);
        }
        self.changed.insert(id);
        Ok(())
    }

    /// Mark an entity for deletion, tracking it first when needed.
    ///
    /// # Errors
    ///
    /// Same as [`persist`](Self::persist).
    pub fn remove(
        &mut self,
        id: EntityId,
        table_hint: Option<&str>,
        style: &dyn NamingStyle,
    ) -> Result<(), MapperError> {
        if !self.is_tracked(id) {
            self.track(id, table_hint, style)?;
        }
        self.changed.insert(id);
        self.removed.insert(id);
        Ok(())
    }

    fn track(
        &mut self,
        id: EntityId,
        table_hint: Option<&str>,
        style: &dyn NamingStyle,
    ) -> Result<(), MapperError> {
        let entity = self.existing(id)?;
        let table = match (table_hint, entity.kind()) {
            (Some(table), _) => table.to_string(),
            (None, Some(kind)) => style.entity_to_table(kind),
            (None, None) => {
                return Err(MapperError::Configuration(format!(
                    "cannot infer a table for untracked entity {id}"
                )))
            }
        };
        let key = entity
            .value(&style.primary_key_column(&table))
            .and_then(KeyValue::from_value);
        let columns = self.columns_of(id, style)?;
        if let Some(key) = &key {
            self.identity.insert((table.clone(), key.clone()), id);
        }
        self.tracked.insert(id, TrackingRecord { table, key, columns });
        Ok(())
    }

    pub fn is_tracked(&self, id: EntityId) -> bool {
        self.tracked.contains_key(&id)
    }

    /// Entity tracked for `(table, key)`.
    pub fn get_tracked(&self, table: &str, key: &Value) -> Option<EntityId> {
        let key = KeyValue::from_value(key)?;
        self.identity.get(&(table.to_string(), key)).copied()
    }

    pub fn tracking(&self, id: EntityId) -> Option<&TrackingRecord> {
        self.tracked.get(&id)
    }

    /// Whether `flush` has anything to write.
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn is_new(&self, id: EntityId) -> bool {
        self.new.contains(id)
    }

    pub fn is_removed(&self, id: EntityId) -> bool {
        self.removed.contains(id)
    }

    /// Register columns of `table` stored in secondary tables.
    pub fn declare_mixins(&mut self, table: impl Into<String>, mixins: Vec<Mixin>) {
        if !mixins.is_empty() {
            self.mixins.insert(table.into(), mixins);
        }
    }

    /// Register a hydrated row.
    ///
    /// A `(table, key)` already in the identity map resolves to the tracked
    /// entity, which is left as is. New entities are tracked clean and get their
    /// foreign-key fields replaced by references to their siblings.
    /// Returns one id per hydrated entity, in row order.
    pub fn absorb(
        &mut self,
        row: HydratedRow,
        style: &dyn NamingStyle,
    ) -> Result<Vec<EntityId>, MapperError> {
        let mut ids = Vec::with_capacity(row.entities.len());
        let mut fresh = HashSet::new();
        let mut keys = Vec::with_capacity(row.entities.len());

        for hydrated in row.entities {
            let key = KeyValue::from_value(&hydrated.key).ok_or_else(|| {
                MapperError::ShapeMismatch(format!("null key for '{}'", hydrated.table))
            })?;
            let slot = (hydrated.table, key);
            let id = match self.identity.get(&slot) {
                Some(id) => *id,
                None => {
                    let id = self.create(hydrated.entity);
                    self.identity.insert(slot.clone(), id);
                    fresh.insert(id);
                    id
                }
            };
            ids.push(id);
            keys.push(slot);
        }

        for link in &row.links {
            let (Some(&from), Some(&to)) = (ids.get(link.from), ids.get(link.to)) else {
                continue;
            };
            if fresh.contains(&from) {
                self.existing_mut(from)?.set_ref(link.field.clone(), to);
            }
        }

        for (id, (table, key)) in ids.iter().zip(keys) {
            if fresh.contains(id) {
                let columns = self.columns_of(*id, style)?;
                self.tracked.insert(
                    *id,
                    TrackingRecord {
                        table,
                        key: Some(key),
                        columns,
                    },
                );
            }
        }
        Ok(ids)
    }

    /// Flattened columns of an entity; references become the target's key.
    pub fn columns_of(
        &self,
        id: EntityId,
        style: &dyn NamingStyle,
    ) -> Result<Vec<(String, Value)>, MapperError> {
        let entity = self.existing(id)?;
        let mut columns = Vec::with_capacity(entity.len());
        for (name, field) in entity.fields() {
            let column = style.property_to_column(name);
            let value = match field {
                Field::Value(v) => v.clone(),
                Field::Ref(target) => self.key_of(*target, &column, style),
            };
            columns.push((column, value));
        }
        Ok(columns)
    }

    /// Primary key of `target`, using the referencing column to guess the
    /// table of untracked targets.
    fn key_of(&self, target: EntityId, column: &str, style: &dyn NamingStyle) -> Value {
        let table = match self.tracked.get(&target) {
            Some(record) => Some(record.table.clone()),
            None => style.table_from_foreign_key_column(column),
        };
        table
            .and_then(|t| {
                self.entity(target)
                    .and_then(|e| e.value(&style.primary_key_column(&t)))
                    .cloned()
            })
            .unwrap_or_else(value::null)
    }

    /// Whether the entity differs from its last snapshot. New entities are dirty.
    pub fn is_dirty(&self, id: EntityId, style: &dyn NamingStyle) -> bool {
        if self.new.contains(id) {
            return true;
        }
        match (self.tracked.get(&id), self.columns_of(id, style)) {
            (Some(record), Ok(columns)) => record.columns != columns,
            _ => false,
        }
    }

    /// Stop tracking an entity and drop it from every pending set.
    pub fn forget(&mut self, id: EntityId) {
        if let Some(record) = self.tracked.remove(&id) {
            if let Some(key) = record.key {
                let slot = (record.table, key);
                if self.identity.get(&slot) == Some(&id) {
                    self.identity.remove(&slot);
                }
            }
        }
        self.new.remove(id);
        self.changed.remove(id);
        self.removed.remove(id);
    }

    /// Write every pending change in one transaction.
    ///
    /// # Errors
    ///
    /// The first failing statement rolls the transaction back; its error is
    /// returned and all pending sets are left untouched.
    pub fn flush<D: Driver + ?Sized>(
        &mut self,
        driver: &mut D,
        style: &dyn NamingStyle,
    ) -> Result<(), MapperError> {
        if self.changed.is_empty() {
            log::debug!("Nothing to flush");
            return Ok(());
        }
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::flush_span(self.changed.len()).entered();

        let order = self.changed.order.clone();
        let mut undo = Undo::new();
        let mut tx = Transaction::begin(driver)?;

        for id in &order {
            if let Err(e) = self.write(&mut tx, *id, style, &mut undo) {
                log::warn!("Flush failed on entity {id}, rolling back: {e}");
                self.revert(undo);
                if let Err(rollback) = tx.rollback() {
                    log::warn!("Rollback failed: {rollback}");
                }
                return Err(e);
            }
        }

        if let Err(e) = tx.commit() {
            self.revert(undo);
            return Err(e.into());
        }
        METRICS.record_flush();

        for id in &order {
            let id = *id;
            if self.new.contains(id) && self.removed.contains(id) {
                self.forget(id);
                continue;
            }
            self.refresh(id, style)?;
        }
        self.new.clear();
        self.changed.clear();
        self.removed.clear();
        Ok(())
    }

    fn write<D: Driver + ?Sized>(
        &mut self,
        tx: &mut Transaction<'_, D>,
        id: EntityId,
        style: &dyn NamingStyle,
        undo: &mut Undo,
    ) -> Result<(), MapperError> {
        let table = self
            .tracked
            .get(&id)
            .map(|r| r.table.clone())
            .ok_or_else(|| MapperError::Configuration(format!("entity {id} is not tracked")))?;
        let is_new = self.new.contains(id);
        if is_new && self.removed.contains(id) {
            log::debug!("Skipping entity {id}: created and removed before flush");
            return Ok(());
        }

        let pk = style.primary_key_column(&table);
        let mixins = self.mixins.get(&table).cloned().unwrap_or_default();

        if self.removed.contains(id) {
            let key = match self.stored_key(id, &pk) {
                Some(stored) => stored,
                None => self.required_key(id, &table, &pk)?,
            };
            let sql = Sql::new()
                .delete_from(&table)
                .where_(Criteria::new().with(pk.as_str(), key));
            tx.execute(&sql.build(), sql.params())?;
            for mixin in &mixins {
                let Some(mix_key) = self.set_value(id, &mixin.key_field()) else {
                    continue;
                };
                let sql = Sql::new().delete_from(&mixin.table).where_(
                    Criteria::new().with(style.primary_key_column(&mixin.table), mix_key),
                );
                tx.execute(&sql.build(), sql.params())?;
            }
            return Ok(());
        }

        for mixin in &mixins {
            self.write_mixin(tx, id, mixin, style, undo)?;
        }

        let columns: Vec<(String, Value)> = self
            .columns_of(id, style)?
            .into_iter()
            .filter(|(c, _)| !mixins.iter().any(|m| m.owns(c)))
            .collect();

        if is_new {
            let columns: Vec<(String, Value)> = columns
                .into_iter()
                .filter(|(c, v)| !(*c == pk && value::is_null(v)))
                .collect();
            let sql = if columns.is_empty() {
                Sql::raw(format!("INSERT INTO {table} DEFAULT VALUES"), Vec::new())
            } else {
                let (names, values): (Vec<String>, Vec<Value>) = columns.into_iter().unzip();
                Sql::new().insert_into(&table, names).values(values)
            };
            if self.set_value(id, &pk).is_some() {
                tx.execute(&sql.build(), sql.params())?;
            } else {
                match tx.insert_returning(&sql.build(), sql.params(), &pk)? {
                    Some(identity) => self.assign(id, &pk, identity, undo)?,
                    None => log::debug!("No identity generated for '{table}'"),
                }
            }
        } else {
            let key = match self.stored_key(id, &pk) {
                Some(stored) => stored,
                None => self.required_key(id, &table, &pk)?,
            };
            let set: Criteria = columns
                .into_iter()
                .filter(|(c, v)| *c != pk || !value::same_key(v, &key))
                .collect();
            if set.is_empty() {
                log::debug!("Entity {id} has no columns to update");
                return Ok(());
            }
            let sql = Sql::new()
                .update(&table)
                .set(set)
                .where_(Criteria::new().with(pk.as_str(), key));
            tx.execute(&sql.build(), sql.params())?;
        }
        Ok(())
    }

    /// Insert or update the part of an entity stored in `mixin`.
    fn write_mixin<D: Driver + ?Sized>(
        &mut self,
        tx: &mut Transaction<'_, D>,
        id: EntityId,
        mixin: &Mixin,
        style: &dyn NamingStyle,
        undo: &mut Undo,
    ) -> Result<(), MapperError> {
        let columns: Vec<(String, Value)> = self
            .columns_of(id, style)?
            .into_iter()
            .filter(|(c, _)| mixin.owns(c))
            .collect();
        let key_field = mixin.key_field();

        match self.set_value(id, &key_field) {
            None => {
                let sql = if columns.is_empty() {
                    Sql::raw(format!("INSERT INTO {} DEFAULT VALUES", mixin.table), Vec::new())
                } else {
                    let (names, values): (Vec<String>, Vec<Value>) = columns.into_iter().unzip();
                    Sql::new().insert_into(&mixin.table, names).values(values)
                };
                let mix_pk = style.primary_key_column(&mixin.table);
                match tx.insert_returning(&sql.build(), sql.params(), &mix_pk)? {
                    Some(identity) => self.assign(id, &key_field, identity, undo)?,
                    None => log::debug!("No identity generated for mixin '{}'", mixin.table),
                }
            }
            Some(key) if !columns.is_empty() => {
                let sql = Sql::new()
                    .update(&mixin.table)
                    .set(columns.into_iter().collect())
                    .where_(Criteria::new().with(style.primary_key_column(&mixin.table), key));
                tx.execute(&sql.build(), sql.params())?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Non-null scalar value of a field.
    fn set_value(&self, id: EntityId, field: &str) -> Option<Value> {
        self.entity(id)
            .and_then(|e| e.value(field))
            .filter(|v| !value::is_null(v))
            .cloned()
    }

    /// Primary key as of the last snapshot, which addresses the stored row.
    fn stored_key(&self, id: EntityId, pk: &str) -> Option<Value> {
        self.tracked
            .get(&id)?
            .columns
            .iter()
            .find(|(c, _)| c == pk)
            .map(|(_, v)| v.clone())
            .filter(|v| !value::is_null(v))
    }

    fn required_key(&self, id: EntityId, table: &str, pk: &str) -> Result<Value, MapperError> {
        self.set_value(id, pk).ok_or_else(|| {
            MapperError::Configuration(format!(
                "entity {id} of '{table}' has no primary key '{pk}'"
            ))
        })
    }

    fn assign(
        &mut self,
        id: EntityId,
        field: &str,
        value: Value,
        undo: &mut Undo,
    ) -> Result<(), MapperError> {
        let entity = self.existing_mut(id)?;
        undo.push((id, field.to_string(), entity.get(field).cloned()));
        entity.set(field, value);
        Ok(())
    }

    fn revert(&mut self, undo: Undo) {
        for (id, field, previous) in undo.into_iter().rev() {
            if let Some(entity) = self.entity_mut(id) {
                match previous {
                    Some(previous) => entity.set_field(field, previous),
                    None => {
                        entity.remove(&field);
                    }
                }
            }
        }
    }

    /// Re-snapshot a flushed entity and index it under its current key.
    fn refresh(&mut self, id: EntityId, style: &dyn NamingStyle) -> Result<(), MapperError> {
        let columns = self.columns_of(id, style)?;
        let Some(record) = self.tracked.get(&id) else {
            return Ok(());
        };
        let table = record.table.clone();
        let previous = record.key.clone();
        let key = self
            .entity(id)
            .and_then(|e| e.value(&style.primary_key_column(&table)))
            .and_then(KeyValue::from_value);
        if let Some(previous) = previous.filter(|p| key.as_ref() != Some(p)) {
            let slot = (table.clone(), previous);
            if self.identity.get(&slot) == Some(&id) {
                self.identity.remove(&slot);
            }
        }
        if let Some(key) = &key {
            self.identity.insert((table.clone(), key.clone()), id);
        }
        self.tracked.insert(id, TrackingRecord { table, key, columns });
        Ok(())
    }
}
