//! In-memory row storage.
//!
//! Rows are keyed by hierarchy root and identifier, the way joined or
//! single-table inheritance shares one identifier space per hierarchy. Each
//! row records its concrete type, its basic values, and the foreign keys of
//! its owning to-one associations. Owning collections are stored as links.
//! Inverse sides are never stored: they are derived from the owning side.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ormgraph_core::{
    AttributeKind, AttributeMapping, Error, LoadErrorKind, Metamodel, MetadataErrorKind, Result, Value,
};
use serde::Serialize;

/// Identity of a row: hierarchy root plus identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityKey {
    pub root: &'static str,
    pub id: i64,
}

impl EntityKey {
    pub const fn new(root: &'static str, id: i64) -> Self {
        Self { root, id }
    }
}

/// One stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Concrete type of the row.
    pub entity: &'static str,
    pub values: HashMap<&'static str, Value>,
    /// Owning to-one foreign keys, by attribute.
    pub references: HashMap<&'static str, i64>,
}

/// Rows and links for a metamodel.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    metamodel: Arc<Metamodel>,
    rows: BTreeMap<EntityKey, StoredRow>,
    /// (declaring entity, attribute, owner id) -> target ids, in insertion order.
    links: HashMap<(&'static str, &'static str, i64), Vec<i64>>,
}

impl InMemoryStore {
    pub fn new(metamodel: Arc<Metamodel>) -> Self {
        Self {
            metamodel,
            rows: BTreeMap::new(),
            links: HashMap::new(),
        }
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The key a row of `entity` with `id` is stored under.
    pub fn key(&self, entity: &str, id: i64) -> Result<EntityKey> {
        Ok(EntityKey::new(self.metamodel.hierarchy_root(entity)?, id))
    }

    /// Insert a row of concrete type `entity`.
    ///
    /// Values must name basic attributes of the entity or its supertypes.
    pub fn insert<'a>(
        &mut self,
        entity: &str,
        id: i64,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<EntityKey> {
        let mapping = self.metamodel.entity(entity)?;
        if mapping.is_abstract {
            return Err(Error::config(format!(
                "cannot store a row of abstract entity '{entity}'"
            )));
        }
        let key = self.key(entity, id)?;
        if self.rows.contains_key(&key) {
            return Err(Error::config(format!(
                "duplicate row {id} in hierarchy '{}'",
                key.root
            )));
        }

        let mut row = StoredRow {
            entity: mapping.name,
            values: HashMap::new(),
            references: HashMap::new(),
        };
        for (name, value) in values {
            let attribute = self.metamodel.attribute(entity, name)?;
            if attribute.kind.is_association() {
                return Err(Error::metadata(
                    MetadataErrorKind::NotAnAssociation,
                    entity,
                    Some(name),
                    format!("'{name}' is an association, store it with set_reference or add_link"),
                ));
            }
            if attribute.kind == AttributeKind::Basic {
                let selectable = attribute.selectables().selectable(0)?;
                if !selectable.sql_type.accepts(&value) {
                    return Err(Error::config(format!(
                        "'{entity}.{name}' is {}, got a {} value",
                        selectable.sql_type.sql_name(),
                        value.type_name()
                    )));
                }
            }
            row.values.insert(attribute.name, value);
        }
        self.rows.insert(key, row);
        tracing::trace!(entity, id, "Stored row");
        Ok(key)
    }

    /// Set an owning to-one association of a stored row.
    pub fn set_reference(&mut self, entity: &str, id: i64, attribute: &str, target_id: i64) -> Result<()> {
        let (name, owner_key) = self.owning(entity, id, attribute, true)?;
        self.require_target(entity, name, target_id)?;
        if let Some(row) = self.rows.get_mut(&owner_key) {
            row.references.insert(name, target_id);
        }
        Ok(())
    }

    /// Add an element to an owning collection of a stored row.
    pub fn add_link(&mut self, entity: &str, id: i64, attribute: &str, target_id: i64) -> Result<()> {
        let (name, _) = self.owning(entity, id, attribute, false)?;
        let declared_by = self.metamodel.declaring_type(entity, name)?.name;
        self.require_target(entity, name, target_id)?;
        let targets = self.links.entry((declared_by, name, id)).or_default();
        if !targets.contains(&target_id) {
            targets.push(target_id);
        }
        Ok(())
    }

    /// Validate an owning association of an existing row.
    fn owning(
        &self,
        entity: &str,
        id: i64,
        attribute: &str,
        to_one: bool,
    ) -> Result<(&'static str, EntityKey)> {
        let key = self.key(entity, id)?;
        let row = self.row_by_key(key)?;
        let mapping = self.metamodel.attribute(row.entity, attribute)?;
        if !mapping.is_owning_side() || mapping.kind.is_to_one() != to_one {
            let expected = if to_one { "an owning to-one" } else { "an owning collection" };
            return Err(Error::load(
                LoadErrorKind::WrongState,
                entity,
                format!("'{attribute}' is not {expected} association"),
            ));
        }
        Ok((mapping.name, key))
    }

    fn require_target(&self, entity: &str, attribute: &str, target_id: i64) -> Result<()> {
        let mapping = self.metamodel.attribute(entity, attribute)?;
        let target = self.metamodel.association_target(mapping)?;
        let row = self.row(target.name, target_id)?;
        if !self.metamodel.is_subtype_of(row.entity, target.name) {
            return Err(Error::load(
                LoadErrorKind::WrongState,
                row.entity,
                format!("row {target_id} is not a '{}'", target.name),
            ));
        }
        Ok(())
    }

    fn row_by_key(&self, key: EntityKey) -> Result<&StoredRow> {
        self.rows.get(&key).ok_or_else(|| {
            Error::load(
                LoadErrorKind::RowNotFound,
                key.root,
                format!("no row with id {}", key.id),
            )
        })
    }

    /// Read a row that must be an instance of `entity`.
    pub fn row(&self, entity: &str, id: i64) -> Result<&StoredRow> {
        let row = self.row_by_key(self.key(entity, id)?)?;
        if self.metamodel.is_subtype_of(row.entity, entity) {
            Ok(row)
        } else {
            Err(Error::load(
                LoadErrorKind::RowNotFound,
                entity,
                format!("row {id} is a '{}'", row.entity),
            ))
        }
    }

    /// Identifiers of every row that is an instance of `entity`, ascending.
    pub fn ids_of(&self, entity: &str) -> Result<Vec<i64>> {
        let root = self.metamodel.hierarchy_root(entity)?;
        Ok(self
            .rows
            .iter()
            .filter(|(key, row)| key.root == root && self.metamodel.is_subtype_of(row.entity, entity))
            .map(|(key, _)| key.id)
            .collect())
    }

    /// Target identifiers of an association of the row `(entity, id)`.
    ///
    /// Owning sides read the stored foreign key or links. Inverse sides scan
    /// the owning side for references back to the row.
    pub fn association_ids(&self, entity: &str, id: i64, attribute: &AttributeMapping) -> Result<Vec<i64>> {
        let row = self.row(entity, id)?;
        let metamodel = &self.metamodel;

        if let Some(owning) = metamodel.owning_side_of(attribute)? {
            let target = metamodel.association_target(attribute)?;
            let declared_by = metamodel.declaring_type(target.name, owning.name)?.name;
            let candidates = self.ids_of(target.name)?;
            let root = metamodel.hierarchy_root(target.name)?;
            let mut ids = Vec::new();
            for candidate in candidates {
                let points_back = if owning.kind.is_to_one() {
                    self.rows
                        .get(&EntityKey::new(root, candidate))
                        .and_then(|r| r.references.get(owning.name))
                        == Some(&id)
                } else {
                    self.links
                        .get(&(declared_by, owning.name, candidate))
                        .is_some_and(|targets| targets.contains(&id))
                };
                if points_back {
                    ids.push(candidate);
                }
            }
            return Ok(ids);
        }

        if attribute.kind.is_to_one() {
            return Ok(row.references.get(attribute.name).copied().into_iter().collect());
        }
        let declared_by = metamodel.declaring_type(row.entity, attribute.name)?.name;
        Ok(self
            .links
            .get(&(declared_by, attribute.name, id))
            .cloned()
            .unwrap_or_default())
    }
}
