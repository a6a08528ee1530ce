//! Error types for metadata, graph and loading operations.

use std::fmt;

/// The primary error type for all ormgraph operations.
///
/// Every operation in the fetch-planning core is deterministic and in-memory,
/// so none of these variants is retryable: each one points at a programming
/// or configuration defect.
#[derive(Debug)]
pub enum Error {
    /// Metadata mismatch between a graph and the mapped model
    Metadata(MetadataError),
    /// Malformed entity graph (duplicate subgraph, type mismatch, parse error)
    Graph(GraphError),
    /// Positional lookup outside a selectable collection
    Bounds(BoundsError),
    /// Incomplete or inconsistent bootstrap metadata
    Config(ConfigError),
    /// Load-time errors raised by the session layer
    Load(LoadError),
    /// Serialization/deserialization errors
    Serde(String),
}

#[derive(Debug, Clone)]
pub struct MetadataError {
    pub kind: MetadataErrorKind,
    /// The entity the lookup was made against
    pub entity: String,
    /// The offending attribute, when there is one
    pub attribute: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataErrorKind {
    /// Entity name not registered in the metamodel
    UnknownEntity,
    /// Attribute name not declared on the entity or any supertype
    UnknownAttribute,
    /// Subgraph requested on an attribute that is not an association or embeddable
    NotAnAssociation,
    /// Subgraph key is not the attribute's target type or one of its subtypes
    NotASubtype,
}

#[derive(Debug, Clone)]
pub struct GraphError {
    pub kind: GraphErrorKind,
    pub message: String,
    /// Byte offset into the graph text, for parse errors
    pub position: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// Two subgraphs keyed by the same type under one attribute node
    DuplicateSubgraph,
    /// Resolution requested for a type outside the graph's hierarchy
    TypeMismatch,
    /// Two graphs with unrelated root types were merged
    IncompatibleMerge,
    /// Graph text could not be parsed
    Parse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsError {
    pub index: usize,
    pub count: usize,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone)]
pub struct LoadError {
    pub kind: LoadErrorKind,
    pub entity: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    /// Referenced row does not exist in the store
    RowNotFound,
    /// Instance is not managed by the persistence context
    NotManaged,
    /// Attribute exists but holds the wrong kind of state (e.g. a collection read as to-one)
    WrongState,
}

impl Error {
    /// Unknown attribute on a declaring type.
    pub fn unknown_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        let entity = entity.into();
        let attribute = attribute.into();
        Error::Metadata(MetadataError {
            kind: MetadataErrorKind::UnknownAttribute,
            message: format!("unable to locate attribute '{attribute}' on entity '{entity}'"),
            entity,
            attribute: Some(attribute),
        })
    }

    /// Unknown entity name.
    pub fn unknown_entity(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Error::Metadata(MetadataError {
            kind: MetadataErrorKind::UnknownEntity,
            message: format!("no entity named '{entity}' is registered"),
            entity,
            attribute: None,
        })
    }

    /// Create a metadata error of the given kind.
    pub fn metadata(
        kind: MetadataErrorKind,
        entity: impl Into<String>,
        attribute: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Error::Metadata(MetadataError {
            kind,
            entity: entity.into(),
            attribute: attribute.map(str::to_string),
            message: message.into(),
        })
    }

    /// Create a graph error without position information.
    pub fn graph(kind: GraphErrorKind, message: impl Into<String>) -> Self {
        Error::Graph(GraphError {
            kind,
            message: message.into(),
            position: None,
        })
    }

    /// Create a graph parse error at the given byte offset.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Graph(GraphError {
            kind: GraphErrorKind::Parse,
            message: message.into(),
            position: Some(position),
        })
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Create a load error.
    pub fn load(kind: LoadErrorKind, entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Load(LoadError {
            kind,
            entity: entity.into(),
            message: message.into(),
        })
    }

    /// Is this a metadata mismatch?
    pub fn is_metadata_error(&self) -> bool {
        matches!(self, Error::Metadata(_))
    }

    /// Is this a configuration (bootstrap) error?
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Is this a duplicate subgraph declaration?
    pub fn is_duplicate_subgraph(&self) -> bool {
        matches!(
            self,
            Error::Graph(GraphError {
                kind: GraphErrorKind::DuplicateSubgraph,
                ..
            })
        )
    }

    /// Get the metadata error kind, if any.
    pub fn metadata_kind(&self) -> Option<MetadataErrorKind> {
        match self {
            Error::Metadata(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the graph error kind, if any.
    pub fn graph_kind(&self) -> Option<GraphErrorKind> {
        match self {
            Error::Graph(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the load error kind, if any.
    pub fn load_kind(&self) -> Option<LoadErrorKind> {
        match self {
            Error::Load(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Metadata(e) => write!(f, "Metadata error: {}", e.message),
            Error::Graph(e) => {
                if let Some(pos) = e.position {
                    write!(f, "Graph error at offset {}: {}", pos, e.message)
                } else {
                    write!(f, "Graph error: {}", e.message)
                }
            }
            Error::Bounds(e) => write!(f, "Bounds error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Load(e) => write!(f, "Load error on '{}': {}", e.entity, e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "selectable index {} out of range (count {})",
            self.index, self.count
        )
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<BoundsError> for Error {
    fn from(err: BoundsError) -> Self {
        Error::Bounds(err)
    }
}

impl From<MetadataError> for Error {
    fn from(err: MetadataError) -> Self {
        Error::Metadata(err)
    }
}

impl From<GraphError> for Error {
    fn from(err: GraphError) -> Self {
        Error::Graph(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        Error::Load(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for ormgraph operations.
pub type Result<T> = std::result::Result<T, Error>;
