//! Attribute metadata for mapped entities.
//!
//! Attributes are declared once at bootstrap (normally generated from the
//! mapping source) and describe everything the fetch planner needs: the
//! attribute's kind, its association target, which side owns a
//! bidirectional association, its default fetch style, and the selectables it
//! contributes to the owner's `SELECT` list.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::selectable::{SelectableList, SelectableMapping, SelectableMappings};
use crate::types::SqlType;

static NO_SELECTABLES: SelectableList = SelectableList::empty();

/// The kind of a mapped attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeKind {
    /// A single column or formula.
    #[default]
    Basic,
    /// An embeddable value spread over several columns of the owner.
    Embedded,
    /// Many-to-one: many `Foo`s point at one `Bar`.
    ManyToOne,
    /// One-to-one: one `Employee` has one `Badge`.
    OneToOne,
    /// One-to-many: one `Bar` has many `Foo`s.
    OneToMany,
    /// Many-to-many via a link table.
    ManyToMany,
}

impl AttributeKind {
    /// Whether this attribute refers to other entities.
    pub const fn is_association(self) -> bool {
        matches!(
            self,
            AttributeKind::ManyToOne
                | AttributeKind::OneToOne
                | AttributeKind::OneToMany
                | AttributeKind::ManyToMany
        )
    }

    /// Whether this attribute is collection-valued.
    pub const fn is_collection(self) -> bool {
        matches!(self, AttributeKind::OneToMany | AttributeKind::ManyToMany)
    }

    /// Whether this attribute is a single-valued association.
    pub const fn is_to_one(self) -> bool {
        matches!(self, AttributeKind::ManyToOne | AttributeKind::OneToOne)
    }

    /// The fetch style used when the mapping does not declare one.
    ///
    /// To-one associations and values are eager, collections are lazy.
    pub const fn default_fetch(self) -> FetchType {
        if self.is_collection() {
            FetchType::Lazy
        } else {
            FetchType::Eager
        }
    }
}

/// Declared fetch style of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FetchType {
    /// Load together with the owner.
    Eager,
    /// Leave a proxy / uninitialized collection until first access.
    Lazy,
}

/// Information about a link/join table for many-to-many associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkTableInfo {
    /// The link table name (e.g., `"employee_friends"`).
    pub table_name: &'static str,

    /// Column in link table pointing to the owning entity.
    pub local_column: &'static str,

    /// Column in link table pointing to the target entity.
    pub remote_column: &'static str,
}

impl LinkTableInfo {
    /// Create a new link-table definition.
    #[must_use]
    pub const fn new(
        table_name: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Self {
        Self {
            table_name,
            local_column,
            remote_column,
        }
    }
}

/// Metadata about one attribute of an entity.
#[derive(Clone)]
pub struct AttributeMapping {
    /// Attribute name.
    pub name: &'static str,

    /// Kind of attribute.
    pub kind: AttributeKind,

    /// Target entity for associations.
    pub target: Option<&'static str>,

    /// Name of the owning attribute on the target when this is the inverse
    /// side of a bidirectional association (e.g. `Bar::foos` mapped by
    /// `Foo::bar`).
    pub mapped_by: Option<&'static str>,

    /// Declared fetch style.
    pub fetch: FetchType,

    /// Whether the association may be absent.
    pub optional: bool,

    /// Link table for many-to-many associations and unidirectional
    /// one-to-many associations.
    pub link_table: Option<LinkTableInfo>,

    /// Column name for basic attributes or join column for owning to-one
    /// associations. Defaults to the attribute name (`<name>_id` for joins).
    pub column: Option<&'static str>,

    /// SQL type of the single column, when the selectables are derived.
    pub sql_type: SqlType,

    selectables: Option<Arc<dyn SelectableMappings>>,
}

impl fmt::Debug for AttributeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeMapping")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("mapped_by", &self.mapped_by)
            .field("fetch", &self.fetch)
            .field("selectables", &self.selectables().count())
            .finish()
    }
}

impl AttributeMapping {
    fn with_kind(name: &'static str, kind: AttributeKind, target: Option<&'static str>) -> Self {
        Self {
            name,
            kind,
            target,
            mapped_by: None,
            fetch: kind.default_fetch(),
            optional: true,
            link_table: None,
            column: None,
            sql_type: SqlType::BigInt,
            selectables: None,
        }
    }

    /// A basic attribute stored in one column.
    pub fn basic(name: &'static str, sql_type: SqlType) -> Self {
        let mut attr = Self::with_kind(name, AttributeKind::Basic, None);
        attr.sql_type = sql_type;
        attr
    }

    /// An embeddable attribute; its selectables must be supplied.
    pub fn embedded(name: &'static str, selectables: impl SelectableMappings + 'static) -> Self {
        Self::with_kind(name, AttributeKind::Embedded, None).with_selectables(selectables)
    }

    /// Owning side of a many-to-one association.
    pub fn many_to_one(name: &'static str, target: &'static str) -> Self {
        Self::with_kind(name, AttributeKind::ManyToOne, Some(target))
    }

    /// One-to-one association (owning unless `mapped_by` is set).
    pub fn one_to_one(name: &'static str, target: &'static str) -> Self {
        Self::with_kind(name, AttributeKind::OneToOne, Some(target))
    }

    /// One-to-many collection.
    pub fn one_to_many(name: &'static str, target: &'static str) -> Self {
        Self::with_kind(name, AttributeKind::OneToMany, Some(target))
    }

    /// Many-to-many collection.
    pub fn many_to_many(name: &'static str, target: &'static str) -> Self {
        Self::with_kind(name, AttributeKind::ManyToMany, Some(target))
    }

    /// Mark this attribute as the inverse side, owned by `owner` on the target.
    #[must_use]
    pub fn mapped_by(mut self, owner: &'static str) -> Self {
        self.mapped_by = Some(owner);
        self
    }

    /// Set the declared fetch style.
    #[must_use]
    pub fn fetch(mut self, fetch: FetchType) -> Self {
        self.fetch = fetch;
        self
    }

    /// Shorthand for `fetch(FetchType::Lazy)`.
    #[must_use]
    pub fn lazy(self) -> Self {
        self.fetch(FetchType::Lazy)
    }

    /// Shorthand for `fetch(FetchType::Eager)`.
    #[must_use]
    pub fn eager(self) -> Self {
        self.fetch(FetchType::Eager)
    }

    /// Set whether the association may be absent.
    #[must_use]
    pub fn optional(mut self, value: bool) -> Self {
        self.optional = value;
        self
    }

    /// Set the link table.
    #[must_use]
    pub fn link_table(mut self, info: LinkTableInfo) -> Self {
        self.link_table = Some(info);
        self
    }

    /// Set the column (basic) or join column (owning to-one) name.
    #[must_use]
    pub fn column(mut self, name: &'static str) -> Self {
        self.column = Some(name);
        self
    }

    /// Provide explicit selectables instead of deriving them from `column`.
    #[must_use]
    pub fn with_selectables(mut self, selectables: impl SelectableMappings + 'static) -> Self {
        self.selectables = Some(Arc::new(selectables));
        self
    }

    /// Whether this is the owning side of its association.
    ///
    /// Inverse sides (`mapped_by`) hold no foreign key of their own.
    pub fn is_owning_side(&self) -> bool {
        self.kind.is_association() && self.mapped_by.is_none()
    }

    /// Whether a subgraph may be declared on this attribute.
    pub fn accepts_subgraph(&self) -> bool {
        self.kind.is_association()
    }

    /// The selectables this attribute contributes to its owner's table.
    pub fn selectables(&self) -> &dyn SelectableMappings {
        match &self.selectables {
            Some(s) => s.as_ref(),
            None => &NO_SELECTABLES,
        }
    }

    /// Materialize default selectables for the owner's table.
    ///
    /// Basic attributes get one column, owning to-one associations get one
    /// join column; inverse sides and collections get none. Explicit
    /// selectables are kept as they are.
    pub(crate) fn bind_table(mut self, table: &'static str) -> Self {
        if self.selectables.is_some() {
            return self;
        }
        let list = match self.kind {
            AttributeKind::Basic => SelectableList::single(
                SelectableMapping::column(table, self.column.unwrap_or(self.name), self.sql_type.clone())
                    .nullable(self.optional),
            ),
            AttributeKind::ManyToOne | AttributeKind::OneToOne if self.mapped_by.is_none() => {
                let column = match self.column {
                    Some(column) => column.to_string(),
                    None => format!("{}_id", self.name),
                };
                SelectableList::single(
                    SelectableMapping::named_column(table, column, self.sql_type.clone())
                        .nullable(self.optional),
                )
            }
            _ => SelectableList::empty(),
        };
        self.selectables = Some(Arc::new(list));
        self
    }
}
