//! The entity graph: root type, root attribute nodes and subclass subgraphs.

use std::sync::Arc;

use ormgraph_core::{Error, GraphErrorKind, Metamodel, MetadataErrorKind, Result};

use crate::node::AttributeNode;
use crate::resolve::{ResolvedFetchSet, resolve};
use crate::subgraph::Subgraph;

/// A declarative description of which attributes of an entity type, and of
/// its subtypes, to initialize during a load.
///
/// Graphs are mutable while being built. Attaching one to a load through a
/// [`GraphHint`](crate::GraphHint) moves it behind an `Arc`, after which it is
/// read-only.
///
/// # Example
///
/// ```ignore
/// let mut graph = EntityGraph::new(&metamodel, "Foo")?;
/// graph.add_attribute_nodes(&["bar", "baz"])?;
/// graph.add_subgraph("bar")?.add_attribute_node("foos")?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGraph {
    name: Option<String>,
    root: Subgraph,
    subclass_subgraphs: Vec<Subgraph>,
}

impl EntityGraph {
    /// Create an empty graph rooted at `root`.
    pub fn new(metamodel: &Arc<Metamodel>, root: &str) -> Result<Self> {
        let entity = metamodel.entity(root)?;
        Ok(Self {
            name: None,
            root: Subgraph::new(Arc::clone(metamodel), entity.name),
            subclass_subgraphs: Vec::new(),
        })
    }

    /// Set the graph name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The graph name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The root entity type.
    pub fn root_type(&self) -> &'static str {
        self.root.type_name()
    }

    /// The metamodel the graph was validated against.
    pub fn metamodel(&self) -> &Arc<Metamodel> {
        self.root.metamodel()
    }

    /// The root level, keyed by the root type.
    pub fn root(&self) -> &Subgraph {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Subgraph {
        &mut self.root
    }

    /// Root attribute nodes in declaration order.
    pub fn attribute_nodes(&self) -> &[AttributeNode] {
        self.root.attribute_nodes()
    }

    /// Root attribute names in declaration order.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        self.root.attribute_names()
    }

    /// Find a root attribute node.
    pub fn find_attribute_node(&self, name: &str) -> Option<&AttributeNode> {
        self.root.find_attribute_node(name)
    }

    /// Add a root attribute node.
    pub fn add_attribute_node(&mut self, name: &str) -> Result<&mut AttributeNode> {
        self.root.add_attribute_node(name)
    }

    /// Add several root attribute nodes; nothing is added if any is unknown.
    pub fn add_attribute_nodes(&mut self, names: &[&str]) -> Result<()> {
        self.root.add_attribute_nodes(names)
    }

    /// Add a subgraph on a root attribute, keyed by its declared target.
    pub fn add_subgraph(&mut self, attribute: &str) -> Result<&mut Subgraph> {
        self.root.add_subgraph(attribute)
    }

    /// Add a subgraph on a root attribute, keyed by a subtype of its target.
    pub fn add_subgraph_of(&mut self, attribute: &str, subtype: &str) -> Result<&mut Subgraph> {
        self.root.add_subgraph_of(attribute, subtype)
    }

    /// Add a dotted attribute path below the root.
    pub fn add_attribute_path(&mut self, path: &str) -> Result<()> {
        self.root.add_attribute_path(path)
    }

    /// Add a root subgraph that only applies to instances of `subtype`.
    ///
    /// Its nodes may name attributes that only exist on the subtype. When an
    /// instance of the subtype (or of one of its own subtypes) is loaded, the
    /// root nodes are still applied.
    pub fn add_subclass_subgraph(&mut self, subtype: &str) -> Result<&mut Subgraph> {
        let metamodel = self.metamodel();
        let entity = metamodel.entity(subtype)?;
        let root = self.root_type();
        if !metamodel.is_subtype_of(entity.name, root) {
            return Err(Error::metadata(
                MetadataErrorKind::NotASubtype,
                root,
                None,
                format!("'{}' is not a subtype of graph root '{}'", entity.name, root),
            ));
        }
        if entity.name == root || self.subclass_subgraph(entity.name).is_some() {
            return Err(Error::graph(
                GraphErrorKind::DuplicateSubgraph,
                format!("graph on '{}' already has a root subgraph for '{}'", root, entity.name),
            ));
        }
        let subgraph = Subgraph::new(Arc::clone(metamodel), entity.name);
        self.subclass_subgraphs.push(subgraph);
        let last = self.subclass_subgraphs.len() - 1;
        Ok(&mut self.subclass_subgraphs[last])
    }

    /// Subclass root subgraphs in declaration order.
    pub fn subclass_subgraphs(&self) -> &[Subgraph] {
        &self.subclass_subgraphs
    }

    /// The subclass root subgraph keyed by exactly `subtype`.
    pub fn subclass_subgraph(&self, subtype: &str) -> Option<&Subgraph> {
        self.subclass_subgraphs
            .iter()
            .find(|s| s.type_name() == subtype)
    }

    /// Merge `other` into this graph.
    ///
    /// Both graphs must share a root type and metamodel. Nodes are unioned
    /// and subgraphs keyed by the same type are merged recursively rather
    /// than reported as duplicates.
    pub fn merge(&mut self, other: &EntityGraph) -> Result<()> {
        if self.root_type() != other.root_type() || !Arc::ptr_eq(self.metamodel(), other.metamodel())
        {
            return Err(Error::graph(
                GraphErrorKind::IncompatibleMerge,
                format!(
                    "cannot merge a graph on '{}' into a graph on '{}'",
                    other.root_type(),
                    self.root_type()
                ),
            ));
        }
        self.root.merge_from(&other.root);
        for sub in &other.subclass_subgraphs {
            match self
                .subclass_subgraphs
                .iter_mut()
                .find(|s| s.type_name() == sub.type_name())
            {
                Some(existing) => existing.merge_from(sub),
                None => self.subclass_subgraphs.push(sub.clone()),
            }
        }
        Ok(())
    }

    /// Resolve the fetch set for an instance of `concrete_type`.
    pub fn resolve(&self, concrete_type: &str) -> Result<ResolvedFetchSet> {
        resolve(self, concrete_type)
    }
}
