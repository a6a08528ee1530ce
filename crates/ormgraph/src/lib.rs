//! ormgraph - entity-graph driven fetch planning for object-relational mapping.
//!
//! ormgraph decides, for every load, which associations are fetched with the
//! entity and how:
//!
//! - Entity graphs with attribute nodes, subgraphs and subclass subgraphs
//! - Load-graph and fetch-graph semantics
//! - Fetch plans that join at most one collection per statement
//! - A persistence context recording what each load initialized
//!
//! # Quick Start
//!
//! ```ignore
//! use ormgraph::prelude::*;
//!
//! let metamodel = Arc::new(
//!     Metamodel::builder()
//!         .entity(EntityMapping::new("Foo", "foo")
//!             .attribute(AttributeMapping::many_to_one("bar", "Bar").lazy()))
//!         .entity(EntityMapping::new("Bar", "bar")
//!             .attribute(AttributeMapping::one_to_many("foos", "Foo").mapped_by("bar")))
//!         .build()?,
//! );
//!
//! let mut store = InMemoryStore::new(Arc::clone(&metamodel));
//! store.insert("Bar", 1, [])?;
//! store.insert("Foo", 1, [])?;
//! store.set_reference("Foo", 1, "bar", 1)?;
//!
//! let mut session = Session::new(Arc::new(store), SessionConfig::default());
//! let graph = parse_graph(&metamodel, "Foo", "bar(foos)")?;
//! let hint = GraphHint::load(graph);
//!
//! println!("{}", Explain::for_load(&session, "Foo", Some(&hint))?.to_json()?);
//! let foo = session.find("Foo", 1, Some(&hint))?;
//! ```

pub mod explain;

pub use explain::Explain;

pub use ormgraph_core::{
    AttributeKind, AttributeMapping, CompositeSelectables, EntityMapping, Error, FetchType,
    LinkTableInfo, Metamodel, MetamodelBuilder, Result, SelectableList, SelectableMapping,
    SelectableMappings, SqlType, Value, for_each_selectable_in,
};
pub use ormgraph_graph::{
    AttributeNode, EntityGraph, GraphHint, GraphSemantic, ResolvedAttribute, ResolvedFetchSet,
    Subgraph, parse_graph, parse_into, resolve,
};
pub use ormgraph_query::{
    CollectionFetchPolicy, EntityPlan, Fetch, FetchPlan, FetchPlanBuilder, FetchPlanConfig,
    FetchSource, FetchStyle, SqlShape, plan_shapes,
};
pub use ormgraph_session::{
    EntityKey, EntityView, InMemoryStore, LoadStats, MemberOf, Session, SessionConfig,
};

/// Sub-crates, for items not re-exported at the top level.
pub mod core {
    pub use ormgraph_core::*;
}

pub mod graph {
    pub use ormgraph_graph::*;
}

pub mod query {
    pub use ormgraph_query::*;
}

pub mod session {
    pub use ormgraph_session::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{
        AttributeMapping, EntityGraph, EntityKey, EntityMapping, Error, Explain, FetchPlanBuilder,
        FetchPlanConfig, FetchStyle, GraphHint, GraphSemantic, InMemoryStore, LinkTableInfo,
        MemberOf, Metamodel, Result, Session, SessionConfig, SqlType, Value, parse_graph,
    };
}
