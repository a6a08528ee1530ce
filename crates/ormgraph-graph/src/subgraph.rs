//! Subgraphs: a type-scoped level of an entity graph.

use std::fmt;
use std::sync::Arc;

use ormgraph_core::{Error, Metamodel, Result};

use crate::node::{AttributeNode, duplicate_subgraph, subgraph_key};

/// The attribute nodes requested for one type at one level of a graph.
///
/// The root of an [`EntityGraph`] is a subgraph keyed by the root type;
/// subclass root subgraphs and the subgraphs under attribute nodes are keyed
/// by the type whose instances they apply to. Attribute names are validated
/// against that type (including inherited attributes) when they are added.
///
/// [`EntityGraph`]: crate::EntityGraph
#[derive(Clone)]
pub struct Subgraph {
    metamodel: Arc<Metamodel>,
    type_name: &'static str,
    nodes: Vec<AttributeNode>,
}

impl fmt::Debug for Subgraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subgraph")
            .field("type_name", &self.type_name)
            .field("nodes", &self.nodes)
            .finish()
    }
}

impl PartialEq for Subgraph {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.nodes == other.nodes
    }
}

impl Subgraph {
    pub(crate) fn new(metamodel: Arc<Metamodel>, type_name: &'static str) -> Self {
        Self {
            metamodel,
            type_name,
            nodes: Vec::new(),
        }
    }

    /// The type this subgraph applies to.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    /// Attribute nodes in declaration order.
    pub fn attribute_nodes(&self) -> &[AttributeNode] {
        &self.nodes
    }

    /// Names of the attribute nodes in declaration order.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        self.nodes.iter().map(AttributeNode::attribute_name).collect()
    }

    /// Find the node for `name` at this level.
    pub fn find_attribute_node(&self, name: &str) -> Option<&AttributeNode> {
        self.nodes.iter().find(|n| n.attribute_name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.attribute_name() == name)
    }

    /// Add a node for `name`, or return the existing one.
    ///
    /// Fails with a metadata error if the type has no such attribute.
    pub fn add_attribute_node(&mut self, name: &str) -> Result<&mut AttributeNode> {
        let attribute = self.metamodel.attribute(self.type_name, name)?;
        let index = match self.node_index(name) {
            Some(index) => index,
            None => {
                tracing::trace!(entity = self.type_name, attribute = name, "Adding attribute node");
                self.nodes.push(AttributeNode::new(attribute));
                self.nodes.len() - 1
            }
        };
        Ok(&mut self.nodes[index])
    }

    /// Add several nodes at once. Nothing is added if any name is unknown.
    pub fn add_attribute_nodes(&mut self, names: &[&str]) -> Result<()> {
        for name in names {
            self.metamodel.attribute(self.type_name, name)?;
        }
        for name in names {
            self.add_attribute_node(name)?;
        }
        Ok(())
    }

    /// Add a subgraph on `attribute` keyed by its declared target type.
    pub fn add_subgraph(&mut self, attribute: &str) -> Result<&mut Subgraph> {
        self.insert_subgraph(attribute, None)
    }

    /// Add a subgraph on `attribute` keyed by `subtype`, which must be the
    /// attribute's target type or one of its subtypes.
    ///
    /// Several subgraphs with distinct keys may coexist under one attribute;
    /// declaring the same key twice is a duplicate-subgraph error and leaves
    /// the graph unchanged.
    pub fn add_subgraph_of(&mut self, attribute: &str, subtype: &str) -> Result<&mut Subgraph> {
        self.insert_subgraph(attribute, Some(subtype))
    }

    fn insert_subgraph(&mut self, attribute: &str, key: Option<&str>) -> Result<&mut Subgraph> {
        let mapping = self.metamodel.attribute(self.type_name, attribute)?;
        let key = subgraph_key(&self.metamodel, self.type_name, mapping, key)?;
        if let Some(node) = self.find_attribute_node(attribute) {
            if node.subgraph(key).is_some() {
                return Err(duplicate_subgraph(self.type_name, attribute, key));
            }
        }
        let metamodel = Arc::clone(&self.metamodel);
        let node = self.add_attribute_node(attribute)?;
        Ok(node.push_subgraph(Subgraph::new(metamodel, key)))
    }

    /// The subgraph on `attribute` keyed by `key` (its target when `None`),
    /// created if it does not exist yet.
    pub(crate) fn subgraph_or_insert(
        &mut self,
        attribute: &str,
        key: Option<&str>,
    ) -> Result<&mut Subgraph> {
        let mapping = self.metamodel.attribute(self.type_name, attribute)?;
        let key = subgraph_key(&self.metamodel, self.type_name, mapping, key)?;
        let metamodel = Arc::clone(&self.metamodel);
        let node = self.add_attribute_node(attribute)?;
        Ok(node.subgraph_or_insert(key, || Subgraph::new(metamodel, key)))
    }

    /// Add a dotted attribute path such as `"employees.managers"`.
    ///
    /// Every segment but the last must be an association; intermediate
    /// subgraphs are keyed by the declared target and reused if present.
    /// The path is validated in full before anything is added.
    pub fn add_attribute_path(&mut self, path: &str) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut offset = 0;
        let mut owner = self.type_name;
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(Error::parse(offset, format!("empty segment in path '{path}'")));
            }
            let mapping = self.metamodel.attribute(owner, segment)?;
            if i + 1 < segments.len() {
                owner = subgraph_key(&self.metamodel, owner, mapping, None)?;
            }
            offset += segment.len() + 1;
        }

        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };
        let mut level = self;
        for segment in parents {
            level = level.subgraph_or_insert(segment, None)?;
        }
        level.add_attribute_node(last)?;
        Ok(())
    }

    /// Merge another subgraph of the same type into this one.
    pub(crate) fn merge_from(&mut self, other: &Subgraph) {
        for node in &other.nodes {
            let index = match self.node_index(node.attribute_name()) {
                Some(index) => index,
                None => {
                    self.nodes.push(node.shallow());
                    self.nodes.len() - 1
                }
            };
            self.nodes[index].merge_from(node);
        }
    }
}
