//! Persistence context and graph-aware loading for ormgraph.
//!
//! `ormgraph-session` is the **loading layer**. It executes fetch plans
//! against a row store and records, per managed entity, which associations
//! were initialized and which were left lazy.
//!
//! # Role In The Architecture
//!
//! - **Identity map**: one managed entry per hierarchy root and identifier;
//!   unread references are proxies.
//! - **Loader**: applies a [`FetchPlan`](ormgraph_query::FetchPlan), planning
//!   deferred targets from metadata defaults on demand.
//! - **Lazy initialization**: proxies and collections can be initialized
//!   after the load, tracked for N+1 patterns.
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new(Arc::new(store), SessionConfig::default());
//! let graph = parse_graph(store.metamodel(), "Foo", "bar(foos)")?;
//! let foo = session.find("Foo", 1, Some(&GraphHint::load(graph)))?;
//!
//! let bar = session.get(&foo).unwrap().reference("bar").unwrap();
//! assert!(bar.is_collection_initialized("foos"));
//! ```

pub mod identity_map;
pub mod loader;
pub mod n1_detection;
pub mod store;

pub use identity_map::{IdentityMap, ManagedEntity};
pub use loader::LoadStats;
pub use n1_detection::{CallSite, N1QueryTracker, N1Stats};
pub use store::{EntityKey, InMemoryStore, StoredRow};

use std::sync::Arc;

use ormgraph_core::{Error, LoadErrorKind, Metamodel, Result, Value};
use ormgraph_graph::GraphHint;
use ormgraph_query::{FetchPlan, FetchPlanBuilder, FetchPlanConfig};

use crate::loader::Loader;

// ============================================================================
// Session Configuration
// ============================================================================

/// Configuration for Session behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Fetch plan configuration used for every load.
    pub fetch: FetchPlanConfig,
    /// Lazy initializations of one (entity, attribute) before an N+1 warning;
    /// `None` disables tracking.
    pub n1_threshold: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fetch: FetchPlanConfig::default(),
            n1_threshold: Some(3),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fetch plan configuration (builder pattern).
    #[must_use]
    pub fn fetch(mut self, fetch: FetchPlanConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Set the N+1 warning threshold (builder pattern).
    #[must_use]
    pub fn n1_threshold(mut self, threshold: usize) -> Self {
        self.n1_threshold = Some(threshold);
        self
    }

    /// Disable N+1 tracking (builder pattern).
    #[must_use]
    pub fn without_n1_detection(mut self) -> Self {
        self.n1_threshold = None;
        self
    }
}

// ============================================================================
// Query Filters
// ============================================================================

/// Restricts a list to entities whose collection contains `member`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberOf {
    pub member: EntityKey,
    pub attribute: String,
}

impl MemberOf {
    pub fn new(member: EntityKey, attribute: impl Into<String>) -> Self {
        Self {
            member,
            attribute: attribute.into(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// A persistence context over an [`InMemoryStore`].
#[derive(Debug)]
pub struct Session {
    store: Arc<InMemoryStore>,
    planner: FetchPlanBuilder,
    context: IdentityMap,
    n1: Option<N1QueryTracker>,
    stats: LoadStats,
}

impl Session {
    /// Open a session. Graph hints passed to it must be built against the
    /// store's metamodel.
    pub fn new(store: Arc<InMemoryStore>, config: SessionConfig) -> Self {
        let planner = FetchPlanBuilder::new(Arc::clone(store.metamodel()), config.fetch);
        Self {
            store,
            planner,
            context: IdentityMap::new(),
            n1: config
                .n1_threshold
                .map(|threshold| N1QueryTracker::new().with_threshold(threshold)),
            stats: LoadStats::default(),
        }
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        self.store.metamodel()
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    fn loader(&mut self) -> Loader<'_> {
        Loader::new(&self.store, &self.planner, &mut self.context, &mut self.stats)
    }

    /// The plan a load of `entity` with `hint` would follow.
    pub fn explain(&self, entity: &str, hint: Option<&GraphHint>) -> Result<FetchPlan> {
        self.planner.plan_for(entity, hint)
    }

    /// Load one entity, initializing what the hint (or, without one, the
    /// metadata defaults) asks for.
    #[tracing::instrument(level = "debug", skip(self, hint), fields(graph = hint.is_some()))]
    pub fn find(&mut self, entity: &str, id: i64, hint: Option<&GraphHint>) -> Result<EntityKey> {
        let plan = self.planner.plan_for(entity, hint)?;
        self.stats.loads += 1;
        let mut loader = self.loader();
        let (key, concrete) = loader.hydrate(entity, id)?;
        loader.apply_plan(key, concrete, &plan)?;
        Ok(key)
    }

    /// Load every instance of `entity`, optionally restricted by a
    /// [`MemberOf`] filter, in identifier order.
    #[tracing::instrument(level = "debug", skip(self, filter, hint), fields(graph = hint.is_some()))]
    pub fn list(
        &mut self,
        entity: &str,
        filter: Option<&MemberOf>,
        hint: Option<&GraphHint>,
    ) -> Result<Vec<EntityKey>> {
        let plan = self.planner.plan_for(entity, hint)?;
        let store = Arc::clone(&self.store);
        let mut ids = store.ids_of(entity)?;
        if let Some(filter) = filter {
            let metamodel = store.metamodel();
            let attribute = metamodel.attribute(entity, &filter.attribute)?;
            if !attribute.kind.is_collection() {
                return Err(Error::load(
                    LoadErrorKind::WrongState,
                    entity,
                    format!("'{}' is not a collection", attribute.name),
                ));
            }
            let target_root = metamodel.hierarchy_root(metamodel.association_target(attribute)?.name)?;
            let mut kept = Vec::new();
            for id in ids {
                let concrete = store.row(entity, id)?.entity;
                if filter.member.root == target_root
                    && store
                        .association_ids(concrete, id, attribute)?
                        .contains(&filter.member.id)
                {
                    kept.push(id);
                }
            }
            ids = kept;
        }

        self.stats.loads += 1;
        let mut loader = self.loader();
        let mut keys = Vec::with_capacity(ids.len());
        for id in ids {
            let (key, concrete) = loader.hydrate(entity, id)?;
            loader.apply_plan(key, concrete, &plan)?;
            keys.push(key);
        }
        tracing::debug!(count = keys.len(), "Listed entities");
        Ok(keys)
    }

    /// Initialize a proxy by reading its row and applying metadata defaults.
    pub fn initialize(&mut self, key: &EntityKey) -> Result<()> {
        let Some(entry) = self.context.get(key) else {
            return Err(not_managed(key));
        };
        if entry.initialized {
            return Ok(());
        }
        let entity = entry.entity;
        self.stats.lazy_initializations += 1;
        let mut loader = self.loader();
        let (key, concrete) = loader.hydrate(entity, key.id)?;
        loader.apply_default(key, concrete)
    }

    /// Initialize a lazy collection of a managed entity.
    #[track_caller]
    pub fn initialize_collection(&mut self, key: &EntityKey, attribute: &str) -> Result<()> {
        if !self.context.contains(key) {
            return Err(not_managed(key));
        }
        self.initialize(key)?;
        let Some(entry) = self.context.get(key) else {
            return Err(not_managed(key));
        };
        if entry.is_collection_initialized(attribute) {
            return Ok(());
        }
        let concrete = entry.entity;
        let store = Arc::clone(&self.store);
        let mapping = store.metamodel().attribute(concrete, attribute)?;
        if !mapping.kind.is_collection() {
            return Err(Error::load(
                LoadErrorKind::WrongState,
                concrete,
                format!("'{attribute}' is not a collection"),
            ));
        }
        let target = store.metamodel().association_target(mapping)?.name;

        if let Some(n1) = &mut self.n1 {
            n1.record_load(concrete, mapping.name);
        }
        self.stats.lazy_initializations += 1;
        self.stats.collections_initialized += 1;

        let mut loader = self.loader();
        let mut elements = Vec::new();
        for id in store.association_ids(concrete, key.id, mapping)? {
            let (element, element_type) = loader.hydrate(target, id)?;
            loader.apply_default(element, element_type)?;
            elements.push(element);
        }
        if let Some(entry) = self.context.get_mut(key) {
            entry.collections.insert(mapping.name, elements);
        }
        Ok(())
    }

    /// Whether the entity is managed and its row has been read.
    pub fn is_initialized(&self, key: &EntityKey) -> bool {
        self.context.is_initialized(key)
    }

    pub fn is_collection_initialized(&self, key: &EntityKey, attribute: &str) -> bool {
        self.context
            .get(key)
            .is_some_and(|e| e.is_collection_initialized(attribute))
    }

    /// Whether an attribute can be read without touching the store: basic
    /// attributes of initialized entities, initialized collections, and
    /// to-one references that are null or point to an initialized entity.
    pub fn is_attribute_initialized(&self, key: &EntityKey, attribute: &str) -> bool {
        let Some(entry) = self.context.get(key) else {
            return false;
        };
        let Some(mapping) = self.metamodel().find_attribute(entry.entity, attribute) else {
            return false;
        };
        if mapping.kind.is_collection() {
            entry.is_collection_initialized(attribute)
        } else if mapping.kind.is_to_one() {
            match entry.reference(attribute) {
                Some(Some(target)) => self.context.is_initialized(&target),
                Some(None) => true,
                None => false,
            }
        } else {
            entry.initialized
        }
    }

    /// A read-only view of a managed entity.
    pub fn get(&self, key: &EntityKey) -> Option<EntityView<'_>> {
        self.context.get(key).map(|managed| EntityView {
            session: self,
            managed,
        })
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.context.contains(key)
    }

    /// Number of managed entries, proxies included.
    pub fn len(&self) -> usize {
        self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }

    /// Detach every managed entity.
    pub fn clear(&mut self) {
        self.context.clear();
        if let Some(n1) = &mut self.n1 {
            n1.reset();
        }
        tracing::debug!("Session cleared");
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// N+1 statistics, when tracking is enabled.
    pub fn n1_stats(&self) -> Option<N1Stats> {
        self.n1.as_ref().map(N1QueryTracker::stats)
    }
}

fn not_managed(key: &EntityKey) -> Error {
    Error::load(
        LoadErrorKind::NotManaged,
        key.root,
        format!("entity {} is not managed by this session", key.id),
    )
}

// ============================================================================
// Entity Views
// ============================================================================

/// A managed entity as seen through its session.
#[derive(Debug, Clone, Copy)]
pub struct EntityView<'s> {
    session: &'s Session,
    managed: &'s ManagedEntity,
}

impl<'s> EntityView<'s> {
    pub fn key(&self) -> EntityKey {
        self.managed.key
    }

    /// Concrete type, or the declared type while still a proxy.
    pub fn entity(&self) -> &'static str {
        self.managed.entity
    }

    pub fn id(&self) -> i64 {
        self.managed.key.id
    }

    pub fn is_initialized(&self) -> bool {
        self.managed.initialized
    }

    pub fn value(&self, attribute: &str) -> Option<&'s Value> {
        self.managed.value(attribute)
    }

    /// The target of a to-one association, initialized or not.
    pub fn reference(&self, attribute: &str) -> Option<EntityView<'s>> {
        let target = self.managed.reference(attribute)??;
        self.session.get(&target)
    }

    /// Elements of an initialized collection.
    pub fn collection(&self, attribute: &str) -> Option<Vec<EntityView<'s>>> {
        let keys = self.managed.collection(attribute)?;
        Some(keys.iter().filter_map(|k| self.session.get(k)).collect())
    }

    pub fn is_collection_initialized(&self, attribute: &str) -> bool {
        self.managed.is_collection_initialized(attribute)
    }

    pub fn is_attribute_initialized(&self, attribute: &str) -> bool {
        self.session.is_attribute_initialized(&self.managed.key, attribute)
    }
}
