//! The mapper facade.
//!
//! [`Mapper`] ties a [`Driver`], a [`NamingStyle`], a [`TypeRegistry`] and a
//! [`UnitOfWork`] together: fetch entity graphs through relation chains, mutate
//! them, then write everything back with one [`flush`](Mapper::flush).
//!
//! # Examples
//!
//! ```
//! use relata::driver::{MockDriver, RowSet};
//! use relata::naming::Standard;
//! use relata::relation::RelationChain;
//! use relata::value::Value;
//! use relata::Mapper;
//!
//! let mut driver = MockDriver::new();
//! driver.push_result(RowSet::from_names(
//!     ["id", "title"],
//!     vec![vec![Value::from(5), Value::from("Hello")]],
//! ));
//! let mut mapper = Mapper::new(driver, Standard);
//!
//! let post = mapper.fetch(&RelationChain::new("post").key(5))?.expect("post 5");
//! mapper.entity_mut(post).expect("tracked").set("title", "Hello, world");
//! mapper.persist(post, None)?;
//! mapper.flush()?;
//!
//! let update = &mapper.driver().committed()[0];
//! assert_eq!(update.sql, "UPDATE post SET title = ? WHERE id = ?");
//! # Ok::<(), relata::MapperError>(())
//! ```

use crate::config::MapperConfig;
use crate::driver::Driver;
use crate::entity::{Entity, EntityId, TypeRegistry};
use crate::error::MapperError;
use crate::hydrate::RowHydrator;
use crate::metrics::METRICS;
use crate::naming::NamingStyle;
use crate::query::{CompiledQuery, QueryCompiler};
use crate::relation::RelationChain;
use crate::sql::Sql;
use crate::unit_of_work::UnitOfWork;
use crate::value::Value;
use std::collections::HashSet;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Convention-driven mapper over one driver and one unit of work.
pub struct Mapper<D: Driver> {
    driver: D,
    style: Box<dyn NamingStyle>,
    types: TypeRegistry,
    uow: UnitOfWork,
    log_sql: bool,
}

impl<D: Driver> Mapper<D> {
    pub fn new(driver: D, style: impl NamingStyle + 'static) -> Self {
        Self::with_style(driver, Box::new(style))
    }

    pub fn with_style(driver: D, style: Box<dyn NamingStyle>) -> Self {
        Self {
            driver,
            style,
            types: TypeRegistry::new(),
            uow: UnitOfWork::new(),
            log_sql: false,
        }
    }

    /// Mapper using the naming style and logging settings of `config`.
    pub fn from_config(driver: D, config: &MapperConfig) -> Self {
        let mut mapper = Self::with_style(driver, config.naming_style.build());
        mapper.log_sql = config.log_sql;
        mapper
    }

    pub fn style(&self) -> &dyn NamingStyle {
        self.style.as_ref()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Register discriminator factories here.
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Compile a chain without running it.
    pub fn compile(&self, chain: &RelationChain) -> Result<CompiledQuery, MapperError> {
        QueryCompiler::new(self.style.as_ref()).compile(chain)
    }

    /// Root entity of the first row, `None` when nothing matches.
    pub fn fetch(&mut self, chain: &RelationChain) -> Result<Option<EntityId>, MapperError> {
        Ok(self.run(chain, None, Some(1))?.into_iter().next())
    }

    /// [`fetch`](Self::fetch) with a trailing fragment (filters, ordering, limits).
    pub fn fetch_with(
        &mut self,
        chain: &RelationChain,
        extra: &Sql,
    ) -> Result<Option<EntityId>, MapperError> {
        Ok(self.run(chain, Some(extra), Some(1))?.into_iter().next())
    }

    /// Root entities of every row, each listed once, in row order.
    pub fn fetch_all(&mut self, chain: &RelationChain) -> Result<Vec<EntityId>, MapperError> {
        self.run(chain, None, None)
    }

    pub fn fetch_all_with(
        &mut self,
        chain: &RelationChain,
        extra: &Sql,
    ) -> Result<Vec<EntityId>, MapperError> {
        self.run(chain, Some(extra), None)
    }

    fn run(
        &mut self,
        chain: &RelationChain,
        extra: Option<&Sql>,
        max_roots: Option<usize>,
    ) -> Result<Vec<EntityId>, MapperError> {
        let mut query = self.compile(chain)?;
        if let Some(extra) = extra {
            query = query.append(extra);
        }
        self.declare_mixins(chain);

        let text = query.text();
        if self.log_sql {
            log::info!("{text}");
        }
        let mut rows = {
            #[cfg(feature = "tracing")]
            let _span = tracing_helpers::execute_query_span(&text).entered();
            self.driver.query(&text, query.params())?
        };
        METRICS.record_query();

        let hydrator = RowHydrator::new(self.style.as_ref(), &self.types);
        let columns = rows.columns().to_vec();
        let mut roots = Vec::new();
        let mut seen = HashSet::new();
        let mut hydrated_rows = 0;
        while let Some(row) = rows.next_row() {
            let hydrated = hydrator.hydrate(chain, query.layout(), &columns, row)?;
            hydrated_rows += 1;
            let ids = self.uow.absorb(hydrated, self.style.as_ref())?;
            if let Some(root) = ids.first() {
                if seen.insert(*root) {
                    roots.push(*root);
                }
            }
            if max_roots.is_some_and(|max| roots.len() >= max) {
                break;
            }
        }
        METRICS.record_rows_hydrated(hydrated_rows);
        log::debug!("Fetched {} root entities from {hydrated_rows} rows", roots.len());
        Ok(roots)
    }

    /// Hand a new entity to the mapper. It stays untracked until persisted.
    pub fn create(&mut self, entity: Entity) -> EntityId {
        self.uow.create(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.uow.entity(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.uow.entity_mut(id)
    }

    /// Mark for insert or update; see [`UnitOfWork::persist`].
    pub fn persist(&mut self, id: EntityId, table: Option<&str>) -> Result<(), MapperError> {
        self.uow.persist(id, table, self.style.as_ref())
    }

    /// Mark for deletion; see [`UnitOfWork::remove`].
    pub fn remove(&mut self, id: EntityId, table: Option<&str>) -> Result<(), MapperError> {
        self.uow.remove(id, table, self.style.as_ref())
    }

    /// Register the mixins declared on every node of `chain` for later writes.
    pub fn declare_mixins(&mut self, chain: &RelationChain) {
        for (_, node) in chain.iter() {
            self.uow
                .declare_mixins(node.name(), node.extras().mixins.clone());
        }
    }

    /// Persist `id` as a row of `chain`'s root table, honouring the chain's mixins.
    pub fn persist_in(&mut self, id: EntityId, chain: &RelationChain) -> Result<(), MapperError> {
        self.declare_mixins(chain);
        let table = chain.node(chain.root()).name().to_string();
        self.uow.persist(id, Some(&table), self.style.as_ref())
    }

    /// Remove `id` as a row of `chain`'s root table, mixin rows included.
    pub fn remove_in(&mut self, id: EntityId, chain: &RelationChain) -> Result<(), MapperError> {
        self.declare_mixins(chain);
        let table = chain.node(chain.root()).name().to_string();
        self.uow.remove(id, Some(&table), self.style.as_ref())
    }

    /// Write all pending changes in one transaction.
    pub fn flush(&mut self) -> Result<(), MapperError> {
        self.uow.flush(&mut self.driver, self.style.as_ref())
    }

    pub fn is_tracked(&self, id: EntityId) -> bool {
        self.uow.is_tracked(id)
    }

    pub fn get_tracked(&self, table: &str, key: impl Into<Value>) -> Option<EntityId> {
        self.uow.get_tracked(table, &key.into())
    }

    pub fn is_dirty(&self, id: EntityId) -> bool {
        self.uow.is_dirty(id, self.style.as_ref())
    }

    pub fn forget(&mut self, id: EntityId) {
        self.uow.forget(id);
    }
}
