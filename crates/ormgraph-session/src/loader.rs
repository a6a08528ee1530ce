//! Applies fetch plans to the persistence context.

use std::collections::{HashMap, HashSet};

use ormgraph_core::{Error, LoadErrorKind, Result};
use ormgraph_query::{EntityPlan, FetchPlan, FetchPlanBuilder};
use serde::Serialize;

use crate::identity_map::IdentityMap;
use crate::store::{EntityKey, InMemoryStore};

/// Counters kept by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Calls to `find` and `list`
    pub loads: usize,
    /// Rows read into the persistence context
    pub rows_read: usize,
    /// Collections initialized, eagerly or lazily
    pub collections_initialized: usize,
    /// Proxies and collections initialized on demand after a load
    pub lazy_initializations: usize,
}

/// One load's walk over the store.
pub(crate) struct Loader<'a> {
    pub(crate) store: &'a InMemoryStore,
    pub(crate) planner: &'a FetchPlanBuilder,
    pub(crate) context: &'a mut IdentityMap,
    pub(crate) stats: &'a mut LoadStats,
    /// Entities whose default plan was applied during this load.
    defaulted: HashSet<EntityKey>,
}

impl<'a> Loader<'a> {
    pub(crate) fn new(
        store: &'a InMemoryStore,
        planner: &'a FetchPlanBuilder,
        context: &'a mut IdentityMap,
        stats: &'a mut LoadStats,
    ) -> Self {
        Self {
            store,
            planner,
            context,
            stats,
            defaulted: HashSet::new(),
        }
    }

    /// Make sure the row of `entity` with `id` is initialized in the context.
    ///
    /// An entry initialized earlier keeps its state. Owning to-one references
    /// are recorded, and their targets registered as proxies.
    pub(crate) fn hydrate(&mut self, entity: &str, id: i64) -> Result<(EntityKey, &'static str)> {
        let store = self.store;
        let metamodel = store.metamodel();
        let key = store.key(entity, id)?;
        if let Some(existing) = self.context.get(&key) {
            if existing.initialized {
                if !metamodel.is_subtype_of(existing.entity, entity) {
                    return Err(Error::load(
                        LoadErrorKind::RowNotFound,
                        entity,
                        format!("row {id} is a '{}'", existing.entity),
                    ));
                }
                return Ok((key, existing.entity));
            }
        }

        let row = store.row(entity, id)?;
        self.stats.rows_read += 1;
        let mut references = HashMap::new();
        for attribute in metamodel.attributes(row.entity)? {
            if !(attribute.kind.is_to_one() && attribute.is_owning_side()) {
                continue;
            }
            let target = metamodel.association_target(attribute)?;
            let target_key = match row.references.get(attribute.name) {
                Some(&target_id) => {
                    let target_key = store.key(target.name, target_id)?;
                    self.context.get_or_proxy(target_key, target.name);
                    Some(target_key)
                }
                None => None,
            };
            references.insert(attribute.name, target_key);
        }

        let managed = self.context.get_or_proxy(key, row.entity);
        managed.entity = row.entity;
        managed.initialized = true;
        managed.values.clone_from(&row.values);
        for (name, target) in references {
            managed.references.entry(name).or_insert(target);
        }
        tracing::trace!(entity = row.entity, id, "Initialized entity");
        Ok((key, row.entity))
    }

    /// Apply a complete plan to a hydrated root.
    pub(crate) fn apply_plan(
        &mut self,
        key: EntityKey,
        concrete: &'static str,
        plan: &FetchPlan,
    ) -> Result<()> {
        let entity_plan = plan.for_type(concrete).ok_or_else(|| {
            Error::load(
                LoadErrorKind::WrongState,
                concrete,
                format!("plan for '{}' has no entry for this type", plan.root),
            )
        })?;
        self.apply(key, concrete, entity_plan)
    }

    /// Initialize the eager associations of `plan` on the entity `key`.
    pub(crate) fn apply(
        &mut self,
        key: EntityKey,
        concrete: &'static str,
        plan: &EntityPlan,
    ) -> Result<()> {
        let store = self.store;
        let metamodel = store.metamodel();
        for fetch in plan.eager_fetches() {
            let attribute = metamodel.attribute(fetch.declared_by, fetch.attribute)?;
            let mut targets = Vec::new();
            for id in store.association_ids(concrete, key.id, attribute)? {
                targets.push(self.hydrate(fetch.target, id)?);
            }

            if let Some(managed) = self.context.get_mut(&key) {
                if fetch.kind.is_collection() {
                    managed
                        .collections
                        .insert(fetch.attribute, targets.iter().map(|(k, _)| *k).collect());
                    self.stats.collections_initialized += 1;
                } else {
                    managed
                        .references
                        .insert(fetch.attribute, targets.first().map(|(k, _)| *k));
                }
            }
            tracing::trace!(
                entity = concrete,
                id = key.id,
                attribute = fetch.attribute,
                style = fetch.style.as_str(),
                count = targets.len(),
                "Fetched association"
            );

            for (target_key, target_type) in targets {
                match fetch.target_plan(target_type) {
                    Some(nested) => self.apply(target_key, target_type, nested)?,
                    None => self.apply_default(target_key, target_type)?,
                }
            }
        }
        Ok(())
    }

    /// Apply the metadata-default plan of an entity, once per load.
    pub(crate) fn apply_default(&mut self, key: EntityKey, concrete: &'static str) -> Result<()> {
        if !self.defaulted.insert(key) {
            return Ok(());
        }
        let plan = self.planner.default_plan(concrete)?;
        self.apply_plan(key, concrete, &plan)
    }
}
