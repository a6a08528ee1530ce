//! Attribute nodes: one requested attribute inside a graph level.

use std::sync::Arc;

use ormgraph_core::{
    AttributeKind, AttributeMapping, Error, GraphErrorKind, Metamodel, MetadataErrorKind, Result,
};

use crate::subgraph::Subgraph;

/// A requested attribute, optionally carrying subgraphs keyed by the
/// attribute's target type or one of its subtypes.
///
/// Subgraph keys under one node are pairwise distinct.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeNode {
    name: &'static str,
    kind: AttributeKind,
    target: Option<&'static str>,
    subgraphs: Vec<Subgraph>,
}

impl AttributeNode {
    pub(crate) fn new(attribute: &AttributeMapping) -> Self {
        Self {
            name: attribute.name,
            kind: attribute.kind,
            target: attribute.target,
            subgraphs: Vec::new(),
        }
    }

    /// Copy of this node without its subgraphs.
    pub(crate) fn shallow(&self) -> Self {
        Self {
            name: self.name,
            kind: self.kind,
            target: self.target,
            subgraphs: Vec::new(),
        }
    }

    /// The attribute name.
    pub fn attribute_name(&self) -> &'static str {
        self.name
    }

    /// The attribute kind, copied from metadata.
    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// The declared target entity for associations.
    pub fn target(&self) -> Option<&'static str> {
        self.target
    }

    /// Subgraphs in declaration order.
    pub fn subgraphs(&self) -> &[Subgraph] {
        &self.subgraphs
    }

    /// The subgraph keyed by exactly `type_name`.
    pub fn subgraph(&self, type_name: &str) -> Option<&Subgraph> {
        self.subgraphs.iter().find(|s| s.type_name() == type_name)
    }

    pub(crate) fn subgraph_mut(&mut self, type_name: &str) -> Option<&mut Subgraph> {
        self.subgraphs.iter_mut().find(|s| s.type_name() == type_name)
    }

    pub(crate) fn push_subgraph(&mut self, subgraph: Subgraph) -> &mut Subgraph {
        self.subgraphs.push(subgraph);
        let last = self.subgraphs.len() - 1;
        &mut self.subgraphs[last]
    }

    pub(crate) fn subgraph_or_insert(
        &mut self,
        type_name: &str,
        make: impl FnOnce() -> Subgraph,
    ) -> &mut Subgraph {
        let index = match self.subgraphs.iter().position(|s| s.type_name() == type_name) {
            Some(index) => index,
            None => {
                self.subgraphs.push(make());
                self.subgraphs.len() - 1
            }
        };
        &mut self.subgraphs[index]
    }

    /// Merge another node for the same attribute into this one.
    ///
    /// Subgraphs keyed by the same type are merged recursively.
    pub(crate) fn merge_from(&mut self, other: &AttributeNode) {
        for sub in &other.subgraphs {
            match self.subgraph_mut(sub.type_name()) {
                Some(existing) => existing.merge_from(sub),
                None => self.subgraphs.push(sub.clone()),
            }
        }
    }
}

/// Check that a subgraph keyed by `key` may be declared on `attribute` of
/// `owner`, returning the key as registered in the metamodel.
pub(crate) fn subgraph_key(
    metamodel: &Arc<Metamodel>,
    owner: &str,
    attribute: &AttributeMapping,
    key: Option<&str>,
) -> Result<&'static str> {
    let Some(target) = attribute.target.filter(|_| attribute.accepts_subgraph()) else {
        return Err(Error::metadata(
            MetadataErrorKind::NotAnAssociation,
            owner,
            Some(attribute.name),
            format!(
                "attribute '{}' of '{}' is not an association and cannot take a subgraph",
                attribute.name, owner
            ),
        ));
    };
    let key = key.unwrap_or(target);
    let entity = metamodel.entity(key)?;
    if !metamodel.is_subtype_of(entity.name, target) {
        return Err(Error::metadata(
            MetadataErrorKind::NotASubtype,
            owner,
            Some(attribute.name),
            format!(
                "'{}' is not '{}' or a subtype of it (attribute '{}.{}')",
                entity.name, target, owner, attribute.name
            ),
        ));
    }
    Ok(entity.name)
}

pub(crate) fn duplicate_subgraph(owner: &str, attribute: &str, key: &str) -> Error {
    Error::graph(
        GraphErrorKind::DuplicateSubgraph,
        format!("attribute '{owner}.{attribute}' already has a subgraph for '{key}'"),
    )
}
