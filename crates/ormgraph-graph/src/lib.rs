//! Entity graphs for ormgraph.
//!
//! An [`EntityGraph`] describes which attributes of a root entity type, and
//! of its subtypes, a load should initialize. Graphs are built through the
//! builder methods, from dotted attribute paths, or from text via
//! [`parse_graph`], then attached to a load as a [`GraphHint`].
//!
//! [`resolve`] flattens a graph for one concrete runtime type into a
//! [`ResolvedFetchSet`], which the fetch plan builder consumes.

pub mod graph;
pub mod node;
pub mod parse;
pub mod resolve;
pub mod semantic;
pub mod subgraph;

#[cfg(test)]
mod fixtures;

pub use graph::EntityGraph;
pub use node::AttributeNode;
pub use parse::{MAX_NESTING_DEPTH, parse_graph, parse_into};
pub use resolve::{ResolvedAttribute, ResolvedFetchSet, resolve};
pub use semantic::{
    FETCH_GRAPH_HINT, GraphHint, GraphSemantic, LEGACY_FETCH_GRAPH_HINT, LEGACY_LOAD_GRAPH_HINT,
    LOAD_GRAPH_HINT,
};
pub use subgraph::Subgraph;
