//! Core mapping metadata for ormgraph.
//!
//! This crate provides the foundational model the fetch planner works on:
//!
//! - `SelectableMappings` for the columns and formulas an attribute or entity reads
//! - `AttributeMapping` / `EntityMapping` for per-type metadata
//! - `Metamodel` for the registry of entities and their inheritance hierarchy
//! - `Value` for dynamically-typed loaded state
//! - `Error` shared by every ormgraph crate

pub mod attribute;
pub mod entity;
pub mod error;
pub mod identifiers;
pub mod metamodel;
pub mod selectable;
pub mod types;
pub mod value;

pub use attribute::{AttributeKind, AttributeMapping, FetchType, LinkTableInfo};
pub use entity::EntityMapping;
pub use error::{
    BoundsError, ConfigError, Error, GraphError, GraphErrorKind, LoadError, LoadErrorKind,
    MetadataError, MetadataErrorKind, Result,
};
pub use identifiers::{is_valid_identifier, qualify, quote_ident};
pub use metamodel::{Metamodel, MetamodelBuilder};
pub use selectable::{
    CompositeSelectables, SelectableList, SelectableMapping, SelectableMappings,
    for_each_selectable_in,
};
pub use types::SqlType;
pub use value::Value;
