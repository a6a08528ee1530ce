//! Identity map of managed entities.
//!
//! The identity map ensures that each stored row corresponds to exactly one
//! managed entry within a session:
//!
//! - **Uniqueness**: the same hierarchy root and identifier always resolve to
//!   the same entry, whichever subtype it was requested as
//! - **Proxies**: an entry known only through a reference stays
//!   uninitialized until its row is read
//! - **Initialization state**: collections are present only once initialized
//!
//! # Example
//!
//! ```ignore
//! let mut map = IdentityMap::new();
//! let key = EntityKey::new("Employee", 1);
//!
//! // Register a proxy for a referenced row
//! map.get_or_proxy(key, "Manager");
//! assert!(!map.get(&key).unwrap().initialized);
//! ```

use std::collections::HashMap;

use ormgraph_core::Value;

use crate::store::EntityKey;

/// State of one managed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedEntity {
    pub key: EntityKey,
    /// Concrete type once initialized; the declared target type for proxies.
    pub entity: &'static str,
    pub initialized: bool,
    pub values: HashMap<&'static str, Value>,
    /// Known to-one targets, `None` for a null reference.
    pub references: HashMap<&'static str, Option<EntityKey>>,
    /// Initialized collections, in load order.
    pub collections: HashMap<&'static str, Vec<EntityKey>>,
}

impl ManagedEntity {
    /// An uninitialized entry for a row known only by its key.
    pub fn proxy(key: EntityKey, entity: &'static str) -> Self {
        Self {
            key,
            entity,
            initialized: false,
            values: HashMap::new(),
            references: HashMap::new(),
            collections: HashMap::new(),
        }
    }

    pub fn value(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    /// The known target of a to-one association.
    ///
    /// `None` when the reference has not been read; `Some(None)` for a null
    /// reference.
    pub fn reference(&self, attribute: &str) -> Option<Option<EntityKey>> {
        self.references.get(attribute).copied()
    }

    /// Elements of an initialized collection.
    pub fn collection(&self, attribute: &str) -> Option<&[EntityKey]> {
        self.collections.get(attribute).map(Vec::as_slice)
    }

    pub fn is_collection_initialized(&self, attribute: &str) -> bool {
        self.collections.contains_key(attribute)
    }
}

/// Identity map keyed by hierarchy root and identifier.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<EntityKey, ManagedEntity>,
}

impl IdentityMap {
    /// Create a new empty identity map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&ManagedEntity> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &EntityKey) -> Option<&mut ManagedEntity> {
        self.entries.get_mut(key)
    }

    /// Get the entry for `key`, registering a proxy of `entity` if the row is
    /// not managed yet.
    pub fn get_or_proxy(&mut self, key: EntityKey, entity: &'static str) -> &mut ManagedEntity {
        self.entries
            .entry(key)
            .or_insert_with(|| ManagedEntity::proxy(key, entity))
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether the entry exists and its row has been read.
    pub fn is_initialized(&self, key: &EntityKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.initialized)
    }

    /// Detach every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the number of entries in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
