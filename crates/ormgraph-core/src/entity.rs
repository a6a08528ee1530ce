//! Entity-level metadata.

use crate::attribute::{AttributeMapping, LinkTableInfo};
use crate::selectable::{SelectableMapping, SelectableMappings};
use crate::types::SqlType;

/// Metadata describing one mapped entity type.
///
/// Subclasses name their direct supertype and declare only the attributes
/// they add; inherited attributes are found through the [`Metamodel`].
///
/// [`Metamodel`]: crate::Metamodel
///
/// # Example
///
/// ```
/// use ormgraph_core::{AttributeMapping, EntityMapping, SqlType};
///
/// let foo = EntityMapping::new("Foo", "foo")
///     .basic("name", SqlType::Text)
///     .attribute(AttributeMapping::many_to_one("bar", "Bar").lazy());
/// assert_eq!(foo.declared_attributes().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct EntityMapping {
    /// Entity name, used as the stable type identifier.
    pub name: &'static str,
    /// Table holding the attributes this entity declares.
    pub table: &'static str,
    /// Direct supertype, if any.
    pub supertype: Option<&'static str>,
    /// Abstract entities never appear as the concrete type of a row.
    pub is_abstract: bool,
    identifier: AttributeMapping,
    attributes: Vec<AttributeMapping>,
}

impl EntityMapping {
    /// Create an entity with a `BIGINT` identifier column named `id`.
    pub fn new(name: &'static str, table: &'static str) -> Self {
        Self {
            name,
            table,
            supertype: None,
            is_abstract: false,
            identifier: AttributeMapping::basic("id", SqlType::BigInt)
                .optional(false)
                .bind_table(table),
            attributes: Vec::new(),
        }
    }

    /// Declare the direct supertype.
    #[must_use]
    pub fn extends(mut self, supertype: &'static str) -> Self {
        self.supertype = Some(supertype);
        self
    }

    /// Mark the entity abstract.
    #[must_use]
    pub fn abstract_entity(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Override the identifier column.
    #[must_use]
    pub fn identifier(mut self, column: &'static str, sql_type: SqlType) -> Self {
        self.identifier = AttributeMapping::basic("id", sql_type)
            .column(column)
            .optional(false)
            .bind_table(self.table);
        self
    }

    /// Declare a basic attribute stored in a column of the same name.
    #[must_use]
    pub fn basic(self, name: &'static str, sql_type: SqlType) -> Self {
        self.attribute(AttributeMapping::basic(name, sql_type))
    }

    /// Declare a formula-mapped basic attribute.
    #[must_use]
    pub fn formula(self, name: &'static str, formula: &'static str, sql_type: SqlType) -> Self {
        let table = self.table;
        self.attribute(
            AttributeMapping::basic(name, sql_type.clone()).with_selectables(
                crate::SelectableList::single(SelectableMapping::formula(table, formula, sql_type)),
            ),
        )
    }

    /// Declare a many-to-many collection through a link table.
    #[must_use]
    pub fn many_to_many(
        self,
        name: &'static str,
        target: &'static str,
        link: LinkTableInfo,
    ) -> Self {
        self.attribute(AttributeMapping::many_to_many(name, target).link_table(link))
    }

    /// Declare an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeMapping) -> Self {
        self.attributes.push(attribute.bind_table(self.table));
        self
    }

    /// The identifier attribute.
    pub fn identifier_attribute(&self) -> &AttributeMapping {
        &self.identifier
    }

    /// The identifier column name.
    pub fn identifier_column(&self) -> &str {
        self.identifier
            .selectables()
            .selectable(0)
            .map(|s| s.expression.as_ref())
            .unwrap_or("id")
    }

    /// Attributes declared directly on this entity, in declaration order.
    pub fn declared_attributes(&self) -> &[AttributeMapping] {
        &self.attributes
    }

    /// Find an attribute declared directly on this entity.
    pub fn find_declared_attribute(&self, name: &str) -> Option<&AttributeMapping> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeKind, FetchType};

    #[test]
    fn test_default_identifier() {
        let e = EntityMapping::new("Bar", "bar");
        assert_eq!(e.identifier_column(), "id");
        assert_eq!(e.identifier_attribute().selectables().count(), 1);
        assert!(!e.is_abstract);
        assert!(e.supertype.is_none());
    }

    #[test]
    fn test_identifier_override() {
        let e = EntityMapping::new("Bar", "bar").identifier("bar_pk", SqlType::Uuid);
        assert_eq!(e.identifier_column(), "bar_pk");
        assert_eq!(
            e.identifier_attribute().selectables().jdbc_mappings().as_ref(),
            &[SqlType::Uuid]
        );
    }

    #[test]
    fn test_declared_attributes_keep_order_and_table() {
        let e = EntityMapping::new("Employee", "employee")
            .basic("name", SqlType::Text)
            .formula("initials", "substr({alias}.name, 1, 2)", SqlType::Text)
            .many_to_many(
                "friends",
                "Employee",
                LinkTableInfo::new("employee_friends", "employee_id", "friend_id"),
            );
        let names: Vec<_> = e.declared_attributes().iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["name", "initials", "friends"]);

        let friends = e.find_declared_attribute("friends").unwrap();
        assert_eq!(friends.kind, AttributeKind::ManyToMany);
        assert_eq!(friends.fetch, FetchType::Lazy);
        assert_eq!(friends.selectables().count(), 0);

        let initials = e.find_declared_attribute("initials").unwrap();
        assert!(initials.selectables().selectable(0).unwrap().is_formula);
        assert_eq!(
            e.find_declared_attribute("name")
                .unwrap()
                .selectables()
                .selectable(0)
                .unwrap()
                .table,
            "employee"
        );
    }

    #[test]
    fn test_subclass_declaration() {
        let e = EntityMapping::new("Manager", "manager").extends("Employee");
        assert_eq!(e.supertype, Some("Employee"));
        assert!(e.find_declared_attribute("friends").is_none());
    }
}
