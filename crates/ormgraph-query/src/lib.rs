//! Fetch planning for ormgraph.
//!
//! `ormgraph-query` is the **planning layer**. It turns an entity graph hint
//! (or, without one, the fetch types declared in the metamodel) into a
//! [`FetchPlan`]: for every association reachable from the root, whether it
//! is joined into the owner's statement, loaded by a secondary select, or
//! left lazy.
//!
//! # Role In The Architecture
//!
//! - **Plan building**: [`FetchPlanBuilder`] applies load-graph or fetch-graph
//!   semantics and the one-collection-join-per-statement rule.
//! - **SQL shapes**: [`plan_shapes`] renders the statements a plan issues, with
//!   joins and column positions, for explain output and tests.
//!
//! Plans execute in `ormgraph-session`.

pub mod builder;
pub mod config;
pub mod join;
pub mod plan;
pub mod shape;

pub use builder::FetchPlanBuilder;
pub use config::{CollectionFetchPolicy, FetchPlanConfig};
pub use join::{Join, JoinType};
pub use plan::{EntityPlan, Fetch, FetchPlan, FetchSource, FetchStyle};
pub use shape::{Linkage, SelectColumn, SqlShape, TableRef, linkage, plan_shapes};
