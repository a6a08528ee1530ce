//! The metamodel: registry of all mapped entities.
//!
//! Built once at bootstrap via [`MetamodelBuilder`], then shared read-only
//! (typically behind an `Arc`) by graph construction, resolution, fetch
//! planning and loading.

use std::collections::HashMap;

use crate::attribute::AttributeMapping;
use crate::entity::EntityMapping;
use crate::error::{Error, MetadataErrorKind, Result};
use crate::identifiers::is_valid_identifier;

/// Builder for a [`Metamodel`].
#[derive(Debug, Default)]
pub struct MetamodelBuilder {
    entities: Vec<EntityMapping>,
}

impl MetamodelBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity. Registration order is preserved and used wherever
    /// the metamodel enumerates types.
    #[must_use]
    pub fn entity(mut self, entity: EntityMapping) -> Self {
        self.entities.push(entity);
        self
    }

    /// Validate the registered entities and build the metamodel.
    ///
    /// Checks identifier syntax, duplicate entities, duplicate or shadowing
    /// attributes, supertype existence and inheritance cycles. Association
    /// targets are only checked by [`Metamodel::validate_associations`]; a
    /// dangling target otherwise surfaces as a configuration error when a
    /// graph walk reaches it.
    #[tracing::instrument(level = "debug", skip(self), fields(entities = self.entities.len()))]
    pub fn build(self) -> Result<Metamodel> {
        let mut index = HashMap::with_capacity(self.entities.len());
        for (i, entity) in self.entities.iter().enumerate() {
            if !is_valid_identifier(entity.name) {
                return Err(Error::config(format!(
                    "invalid entity name '{}'",
                    entity.name
                )));
            }
            if index.insert(entity.name, i).is_some() {
                return Err(Error::config(format!(
                    "entity '{}' registered twice",
                    entity.name
                )));
            }
            for attr in entity.declared_attributes() {
                if !is_valid_identifier(attr.name) {
                    return Err(Error::config(format!(
                        "invalid attribute name '{}' on entity '{}'",
                        attr.name, entity.name
                    )));
                }
                if attr.kind.is_association() && attr.target.is_none() {
                    return Err(Error::config(format!(
                        "association '{}.{}' declares no target entity",
                        entity.name, attr.name
                    )));
                }
            }
        }

        let model = Metamodel {
            entities: self.entities,
            index,
        };

        for entity in &model.entities {
            model.check_hierarchy(entity)?;
        }

        for entity in &model.entities {
            for attr in entity.declared_attributes() {
                let Some(target) = attr.target else { continue };
                if !model.contains(target) {
                    tracing::warn!(
                        entity = entity.name,
                        attribute = attr.name,
                        target = target,
                        "Association target is not registered"
                    );
                }
            }
        }

        tracing::debug!(entities = model.entities.len(), "Metamodel built");
        Ok(model)
    }
}

/// Registry of mapped entities and their inheritance hierarchy.
#[derive(Debug)]
pub struct Metamodel {
    entities: Vec<EntityMapping>,
    index: HashMap<&'static str, usize>,
}

impl Metamodel {
    /// Start building a metamodel.
    pub fn builder() -> MetamodelBuilder {
        MetamodelBuilder::new()
    }

    /// Walk the supertype chain of `entity`, rejecting unknown supertypes,
    /// cycles, and attributes of `entity` redeclaring one of any ancestor.
    /// Run for every entity, this covers every pair of levels.
    fn check_hierarchy(&self, entity: &EntityMapping) -> Result<()> {
        let mut seen = vec![entity.name];
        let mut current = entity;
        while let Some(parent) = current.supertype {
            let Some(next) = self.get(parent) else {
                return Err(Error::config(format!(
                    "entity '{}' extends unknown entity '{}'",
                    current.name, parent
                )));
            };
            if seen.contains(&next.name) {
                return Err(Error::config(format!(
                    "inheritance cycle through entity '{}'",
                    entity.name
                )));
            }
            for attr in entity.declared_attributes() {
                if next.find_declared_attribute(attr.name).is_some() {
                    return Err(Error::config(format!(
                        "attribute '{}.{}' shadows an attribute of supertype '{}'",
                        entity.name, attr.name, next.name
                    )));
                }
            }
            seen.push(next.name);
            current = next;
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Option<&EntityMapping> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    /// Whether an entity with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up an entity.
    pub fn entity(&self, name: &str) -> Result<&EntityMapping> {
        self.get(name).ok_or_else(|| Error::unknown_entity(name))
    }

    /// All registered entities, in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityMapping> {
        self.entities.iter()
    }

    /// The entity followed by its supertypes, nearest first.
    pub fn supertype_chain(&self, name: &str) -> Result<Vec<&EntityMapping>> {
        let mut chain = vec![self.entity(name)?];
        while let Some(parent) = chain.last().and_then(|e| e.supertype) {
            chain.push(self.entity(parent)?);
        }
        Ok(chain)
    }

    /// The root of the entity's inheritance hierarchy.
    pub fn hierarchy_root(&self, name: &str) -> Result<&'static str> {
        let chain = self.supertype_chain(name)?;
        Ok(chain.last().map_or("", |e| e.name))
    }

    /// Whether `sub` is `sup` or one of its (transitive) subtypes.
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        let mut current = self.get(sub);
        while let Some(entity) = current {
            if entity.name == sup {
                return true;
            }
            current = entity.supertype.and_then(|p| self.get(p));
        }
        false
    }

    /// All transitive subtypes of `name`, excluding itself, in registration order.
    pub fn subtypes(&self, name: &str) -> Vec<&'static str> {
        self.entities
            .iter()
            .filter(|e| e.name != name && self.is_subtype_of(e.name, name))
            .map(|e| e.name)
            .collect()
    }

    /// Types a row declared as `name` can actually have at runtime: the type
    /// itself unless abstract, then every non-abstract subtype.
    pub fn concrete_types_of(&self, name: &str) -> Result<Vec<&'static str>> {
        let entity = self.entity(name)?;
        let mut types = Vec::new();
        if !entity.is_abstract {
            types.push(entity.name);
        }
        for sub in self.subtypes(name) {
            if !self.entity(sub)?.is_abstract {
                types.push(sub);
            }
        }
        Ok(types)
    }

    /// Find an attribute declared on the entity or inherited from a supertype.
    pub fn find_attribute(&self, entity: &str, attribute: &str) -> Option<&AttributeMapping> {
        let mut current = self.get(entity);
        while let Some(e) = current {
            if let Some(attr) = e.find_declared_attribute(attribute) {
                return Some(attr);
            }
            current = e.supertype.and_then(|p| self.get(p));
        }
        None
    }

    /// Look up an attribute, failing with a metadata error naming both the
    /// attribute and the entity it was looked up on.
    pub fn attribute(&self, entity: &str, attribute: &str) -> Result<&AttributeMapping> {
        self.entity(entity)?;
        self.find_attribute(entity, attribute)
            .ok_or_else(|| Error::unknown_attribute(entity, attribute))
    }

    /// The entity that declares `attribute` as seen from `entity`.
    pub fn declaring_type(&self, entity: &str, attribute: &str) -> Result<&EntityMapping> {
        for e in self.supertype_chain(entity)? {
            if e.find_declared_attribute(attribute).is_some() {
                return Ok(e);
            }
        }
        Err(Error::unknown_attribute(entity, attribute))
    }

    /// Every attribute of the entity, inherited ones first, each group in
    /// declaration order.
    pub fn attributes(&self, entity: &str) -> Result<Vec<&AttributeMapping>> {
        let chain = self.supertype_chain(entity)?;
        Ok(chain
            .iter()
            .rev()
            .flat_map(|e| e.declared_attributes().iter())
            .collect())
    }

    /// The target entity of an association attribute.
    ///
    /// A target missing from the metamodel is a configuration error: the
    /// bootstrap metadata is incomplete.
    pub fn association_target(&self, attribute: &AttributeMapping) -> Result<&EntityMapping> {
        let Some(target) = attribute.target else {
            return Err(Error::metadata(
                MetadataErrorKind::NotAnAssociation,
                "",
                Some(attribute.name),
                format!("attribute '{}' is not an association", attribute.name),
            ));
        };
        self.get(target).ok_or_else(|| {
            Error::config(format!(
                "association '{}' targets unregistered entity '{}'",
                attribute.name, target
            ))
        })
    }

    /// For an inverse (`mapped_by`) attribute, the owning attribute on the target.
    pub fn owning_side_of(&self, attribute: &AttributeMapping) -> Result<Option<&AttributeMapping>> {
        let Some(owner) = attribute.mapped_by else {
            return Ok(None);
        };
        let target = self.association_target(attribute)?;
        self.find_attribute(target.name, owner)
            .map(Some)
            .ok_or_else(|| {
                Error::config(format!(
                    "'{}' is mapped by '{}.{}', which does not exist",
                    attribute.name, target.name, owner
                ))
            })
    }

    /// Strictly validate every association: targets must be registered and
    /// `mapped_by` must name an owning association pointing back.
    pub fn validate_associations(&self) -> Result<()> {
        for entity in &self.entities {
            for attr in entity.declared_attributes() {
                if !attr.kind.is_association() {
                    continue;
                }
                self.association_target(attr)?;
                if let Some(owner) = self.owning_side_of(attr)? {
                    if !owner.is_owning_side() {
                        return Err(Error::config(format!(
                            "'{}.{}' is mapped by '{}', which is itself an inverse side",
                            entity.name, attr.name, owner.name
                        )));
                    }
                    let points_back = owner
                        .target
                        .is_some_and(|t| self.is_subtype_of(entity.name, t));
                    if !points_back {
                        return Err(Error::config(format!(
                            "'{}.{}' is mapped by '{}', which does not target '{}'",
                            entity.name, attr.name, owner.name, entity.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
