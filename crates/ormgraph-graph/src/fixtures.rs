//! Shared metamodel for unit tests.

use std::sync::Arc;

use ormgraph_core::{AttributeMapping, EntityMapping, LinkTableInfo, Metamodel, SqlType};

/// `Foo{bar, baz}`, `Bar{foos}`, `Baz{foos}`, `Company{employees, location}`,
/// `Employee{name, managers, friends}`, `Manager extends Employee{level}`,
/// `Location{address}`.
pub(crate) fn model() -> Arc<Metamodel> {
    let model = Metamodel::builder()
        .entity(
            EntityMapping::new("Foo", "foo")
                .attribute(AttributeMapping::many_to_one("bar", "Bar").lazy())
                .attribute(AttributeMapping::many_to_one("baz", "Baz").lazy()),
        )
        .entity(
            EntityMapping::new("Bar", "bar")
                .attribute(AttributeMapping::one_to_many("foos", "Foo").mapped_by("bar")),
        )
        .entity(
            EntityMapping::new("Baz", "baz")
                .attribute(AttributeMapping::one_to_many("foos", "Foo").mapped_by("baz")),
        )
        .entity(
            EntityMapping::new("Company", "company")
                .basic("name", SqlType::Text)
                .attribute(AttributeMapping::one_to_many("employees", "Employee").link_table(
                    LinkTableInfo::new("company_employees", "company_id", "employee_id"),
                ))
                .attribute(AttributeMapping::many_to_one("location", "Location")),
        )
        .entity(
            EntityMapping::new("Employee", "employee")
                .basic("name", SqlType::Text)
                .many_to_many(
                    "managers",
                    "Manager",
                    LinkTableInfo::new("employee_managers", "employee_id", "manager_id"),
                )
                .many_to_many(
                    "friends",
                    "Employee",
                    LinkTableInfo::new("employee_friends", "employee_id", "friend_id"),
                ),
        )
        .entity(
            EntityMapping::new("Manager", "manager")
                .extends("Employee")
                .basic("level", SqlType::Integer),
        )
        .entity(EntityMapping::new("Location", "location").basic("address", SqlType::Text))
        .build()
        .expect("fixture metamodel is valid");
    Arc::new(model)
}
