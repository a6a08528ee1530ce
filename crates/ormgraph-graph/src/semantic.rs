//! Load-graph vs fetch-graph semantics and the graph hint handed to loads.

use std::sync::Arc;

use serde::Serialize;

use ormgraph_core::{Error, Result};

use crate::graph::EntityGraph;

/// Hint name selecting load-graph semantics.
pub const LOAD_GRAPH_HINT: &str = "jakarta.persistence.loadgraph";
/// Legacy spelling of [`LOAD_GRAPH_HINT`].
pub const LEGACY_LOAD_GRAPH_HINT: &str = "javax.persistence.loadgraph";
/// Hint name selecting fetch-graph semantics.
pub const FETCH_GRAPH_HINT: &str = "jakarta.persistence.fetchgraph";
/// Legacy spelling of [`FETCH_GRAPH_HINT`].
pub const LEGACY_FETCH_GRAPH_HINT: &str = "javax.persistence.fetchgraph";

/// How attributes absent from the graph are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum GraphSemantic {
    /// Graph attributes are eager; all others keep their declared fetch style.
    #[default]
    Load,
    /// Graph attributes are eager; all others are lazy.
    Fetch,
}

impl GraphSemantic {
    /// Map a hint name to its semantic.
    pub fn from_hint_name(name: &str) -> Result<Self> {
        match name {
            LOAD_GRAPH_HINT | LEGACY_LOAD_GRAPH_HINT => Ok(GraphSemantic::Load),
            FETCH_GRAPH_HINT | LEGACY_FETCH_GRAPH_HINT => Ok(GraphSemantic::Fetch),
            other => Err(Error::config(format!("unknown graph hint '{other}'"))),
        }
    }

    /// The canonical hint name.
    pub const fn hint_name(self) -> &'static str {
        match self {
            GraphSemantic::Load => LOAD_GRAPH_HINT,
            GraphSemantic::Fetch => FETCH_GRAPH_HINT,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            GraphSemantic::Load => "load",
            GraphSemantic::Fetch => "fetch",
        }
    }
}

/// A graph attached to a load, together with its semantic.
///
/// The graph is shared and can no longer be modified once wrapped.
#[derive(Debug, Clone)]
pub struct GraphHint {
    graph: Arc<EntityGraph>,
    semantic: GraphSemantic,
}

impl GraphHint {
    pub fn new(graph: impl Into<Arc<EntityGraph>>, semantic: GraphSemantic) -> Self {
        Self {
            graph: graph.into(),
            semantic,
        }
    }

    /// Load-graph hint.
    pub fn load(graph: impl Into<Arc<EntityGraph>>) -> Self {
        Self::new(graph, GraphSemantic::Load)
    }

    /// Fetch-graph hint.
    pub fn fetch(graph: impl Into<Arc<EntityGraph>>) -> Self {
        Self::new(graph, GraphSemantic::Fetch)
    }

    /// Build a hint from a named property, e.g.
    /// `("javax.persistence.loadgraph", graph)`.
    pub fn from_hint(name: &str, graph: impl Into<Arc<EntityGraph>>) -> Result<Self> {
        Ok(Self::new(graph, GraphSemantic::from_hint_name(name)?))
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    pub fn semantic(&self) -> GraphSemantic {
        self.semantic
    }

    /// The root type of the attached graph.
    pub fn root_type(&self) -> &'static str {
        self.graph.root_type()
    }
}
