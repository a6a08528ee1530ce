//! Resolution: flattening a polymorphic entity graph for one concrete type.
//!
//! At every level the attribute nodes that apply to a concrete type `S` are
//! the union of the nodes of every subgraph at that level whose key is `S` or
//! one of its ancestors, ancestors first. Nodes for the same attribute merge
//! their subgraph lists, so a subgraph declared on a supertype attribute node
//! still applies below a subclass-keyed one. Associations recurse into every
//! concrete type their target can take at runtime.
//!
//! Only what the graph names is resolved. Nothing is inferred from the
//! inverse side of a bidirectional association: requesting `Bar.foos` says
//! nothing about `Baz.foos`, even though both are mapped by `Foo`.

use serde::Serialize;

use ormgraph_core::{AttributeKind, Error, GraphErrorKind, Metamodel, Result};

use crate::graph::EntityGraph;
use crate::subgraph::Subgraph;

/// The attributes to initialize for one concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFetchSet {
    /// The concrete type this set applies to.
    pub entity: &'static str,
    /// Requested attributes, in declaration order (ancestor nodes first).
    pub attributes: Vec<ResolvedAttribute>,
}

/// One requested attribute of a [`ResolvedFetchSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAttribute {
    pub name: &'static str,
    pub kind: AttributeKind,
    /// Declared target entity for associations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<&'static str>,
    /// One set per concrete target type a subgraph applies to.
    ///
    /// Empty when the association was requested without a subgraph: only the
    /// immediate target instance (or collection) is initialized.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<ResolvedFetchSet>,
}

impl ResolvedFetchSet {
    /// Whether `name` was requested.
    pub fn contains(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attribute(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Requested attribute names, in order.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        self.attributes.iter().map(|a| a.name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The nested set for `attribute` when its target is of type `concrete_type`.
    pub fn nested(&self, attribute: &str, concrete_type: &str) -> Option<&ResolvedFetchSet> {
        self.attribute(attribute)?.nested_for(concrete_type)
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ResolvedAttribute {
    /// The nested set for targets of type `concrete_type`.
    pub fn nested_for(&self, concrete_type: &str) -> Option<&ResolvedFetchSet> {
        self.nested.iter().find(|n| n.entity == concrete_type)
    }
}

/// Resolve `graph` for an instance whose runtime type is `concrete_type`.
///
/// Fails with a type-mismatch error if the type is not the graph's root or
/// one of its subtypes, and with a configuration error if an association
/// reached through the graph targets an unregistered entity.
#[tracing::instrument(level = "debug", skip(graph), fields(root = graph.root_type()))]
pub fn resolve(graph: &EntityGraph, concrete_type: &str) -> Result<ResolvedFetchSet> {
    let metamodel = graph.metamodel();
    let entity = metamodel.entity(concrete_type)?;
    if !metamodel.is_subtype_of(entity.name, graph.root_type()) {
        return Err(Error::graph(
            GraphErrorKind::TypeMismatch,
            format!(
                "cannot resolve a graph on '{}' for unrelated type '{}'",
                graph.root_type(),
                entity.name
            ),
        ));
    }

    let mut contributing = vec![graph.root()];
    contributing.extend(
        graph
            .subclass_subgraphs()
            .iter()
            .filter(|s| metamodel.is_subtype_of(entity.name, s.type_name())),
    );
    let resolved = resolve_level(metamodel, entity.name, contributing)?;
    tracing::debug!(
        entity = resolved.entity,
        attributes = resolved.attributes.len(),
        "Resolved fetch set"
    );
    Ok(resolved)
}

fn resolve_level(
    metamodel: &Metamodel,
    concrete_type: &'static str,
    mut contributing: Vec<&Subgraph>,
) -> Result<ResolvedFetchSet> {
    sort_ancestors_first(metamodel, &mut contributing);

    let mut merged: Vec<(&'static str, Vec<&Subgraph>)> = Vec::new();
    for subgraph in &contributing {
        for node in subgraph.attribute_nodes() {
            let name = node.attribute_name();
            match merged.iter().position(|(n, _)| *n == name) {
                Some(i) => merged[i].1.extend(node.subgraphs()),
                None => merged.push((name, node.subgraphs().iter().collect())),
            }
        }
    }

    let mut attributes = Vec::with_capacity(merged.len());
    for (name, subgraphs) in merged {
        let mapping = metamodel.attribute(concrete_type, name)?;
        let mut nested = Vec::new();
        if mapping.kind.is_association() {
            let target = metamodel.association_target(mapping)?;
            if !subgraphs.is_empty() {
                for target_type in metamodel.concrete_types_of(target.name)? {
                    let applicable: Vec<&Subgraph> = subgraphs
                        .iter()
                        .copied()
                        .filter(|s| metamodel.is_subtype_of(target_type, s.type_name()))
                        .collect();
                    if applicable.is_empty() {
                        continue;
                    }
                    nested.push(resolve_level(metamodel, target_type, applicable)?);
                }
            }
        }
        tracing::trace!(
            entity = concrete_type,
            attribute = name,
            nested = nested.len(),
            "Resolved attribute"
        );
        attributes.push(ResolvedAttribute {
            name,
            kind: mapping.kind,
            target: mapping.target,
            nested,
        });
    }

    Ok(ResolvedFetchSet {
        entity: concrete_type,
        attributes,
    })
}

/// Order subgraphs so that supertype keys come before subtype keys. All keys
/// are ancestors of one type, so depth alone decides; ties keep declaration
/// order.
fn sort_ancestors_first(metamodel: &Metamodel, subgraphs: &mut [&Subgraph]) {
    subgraphs.sort_by_key(|s| {
        metamodel
            .supertype_chain(s.type_name())
            .map_or(0, |chain| chain.len())
    });
}
