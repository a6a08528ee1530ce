//! SQL shapes of fetch plans.
//!
//! A plan issues one statement for the root plus one per secondary-select
//! path. Entities map to one table each (joined inheritance): an occurrence
//! of an entity joins its supertype and subtype tables on the identifier.
//! Column positions follow the running offsets of the selectables, so the
//! index recorded for each column is its position in the result row.

use serde::Serialize;

use ormgraph_core::{
    AttributeMapping, EntityMapping, Error, Metamodel, Result, SqlType, qualify, quote_ident,
};

use crate::join::{Join, JoinType};
use crate::plan::{EntityPlan, FetchPlan, FetchStyle, fetch_path};

/// A table in a FROM clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub table: &'static str,
    pub alias: String,
}

/// One selected expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectColumn {
    /// Position in the result row.
    pub index: usize,
    /// Alias-qualified column, or formula with its alias substituted.
    pub expression: String,
    /// Entity declaring the attribute.
    pub entity: &'static str,
    pub attribute: &'static str,
    pub sql_type: SqlType,
}

/// The shape of one statement issued by a fetch plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlShape {
    /// Fetch path this statement serves; empty for the root statement.
    pub path: String,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub columns: Vec<SelectColumn>,
    /// Restriction binding the owners' keys, for secondary selects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction: Option<String>,
}

impl SqlShape {
    /// Render the statement. The caller supplies the root restriction.
    pub fn to_sql(&self) -> String {
        let columns: Vec<&str> = self.columns.iter().map(|c| c.expression.as_str()).collect();
        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            columns.join(", "),
            quote_ident(self.from.table),
            self.from.alias
        );
        for join in &self.joins {
            sql.push_str(&join.to_sql());
        }
        if let Some(restriction) = &self.restriction {
            sql.push_str(" WHERE ");
            sql.push_str(restriction);
        }
        sql
    }

    /// Column types in row order.
    pub fn jdbc_mappings(&self) -> Vec<SqlType> {
        self.columns.iter().map(|c| c.sql_type.clone()).collect()
    }

    /// Joins introduced for the fetch at `path`.
    pub fn joins_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Join> + 'a {
        self.joins.iter().filter(move |j| j.path == path)
    }
}

/// Where the keys connecting an association's rows to the owner's live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkage {
    /// A link table with one column per side.
    LinkTable {
        table: &'static str,
        owner_column: &'static str,
        target_column: &'static str,
    },
    /// The owner's table holds the target's identifier.
    OwnerForeignKey { column: String },
    /// The table of `declaring`, on the target side, holds the owner's identifier.
    TargetForeignKey {
        declaring: &'static str,
        column: String,
    },
}

/// Work out how `attribute` is stored.
///
/// Inverse sides use the owning attribute's storage, read backwards.
pub fn linkage(metamodel: &Metamodel, attribute: &AttributeMapping) -> Result<Linkage> {
    if let Some(link) = attribute.link_table {
        return Ok(Linkage::LinkTable {
            table: link.table_name,
            owner_column: link.local_column,
            target_column: link.remote_column,
        });
    }
    if let Some(owning) = metamodel.owning_side_of(attribute)? {
        if let Some(link) = owning.link_table {
            return Ok(Linkage::LinkTable {
                table: link.table_name,
                owner_column: link.remote_column,
                target_column: link.local_column,
            });
        }
        let target = metamodel.association_target(attribute)?;
        return Ok(Linkage::TargetForeignKey {
            declaring: metamodel.declaring_type(target.name, owning.name)?.name,
            column: join_column(owning)?,
        });
    }
    if attribute.kind.is_to_one() {
        return Ok(Linkage::OwnerForeignKey {
            column: join_column(attribute)?,
        });
    }
    Err(Error::config(format!(
        "collection '{}' has neither a link table nor an owning side",
        attribute.name
    )))
}

fn join_column(attribute: &AttributeMapping) -> Result<String> {
    attribute
        .selectables()
        .selectable(0)
        .map(|s| s.expression.to_string())
        .map_err(|_| Error::config(format!("association '{}' has no join column", attribute.name)))
}

/// Render the statements `plan` issues: the root statement first, then one
/// per secondary-select path in plan order.
#[tracing::instrument(level = "debug", skip_all, fields(root = plan.root))]
pub fn plan_shapes(metamodel: &Metamodel, plan: &FetchPlan) -> Result<Vec<SqlShape>> {
    let root = metamodel.entity(plan.root)?;
    let plans: Vec<&EntityPlan> = plan.plans.iter().collect();
    let mut pending = Vec::new();

    let mut shape = ShapeBuilder::new(metamodel);
    let base = shape.alias();
    let tables = shape.occurrence(root.name, root.name, &base, JoinType::Inner, "")?;
    shape.fetches(&tables, "", &plans, &mut pending)?;
    let mut shapes = vec![shape.finish(
        String::new(),
        TableRef {
            table: root.table,
            alias: base,
        },
        None,
    )];

    let mut next = 0;
    while next < pending.len() {
        let select = pending[next].clone();
        shapes.push(select_shape(metamodel, &select, &mut pending)?);
        next += 1;
    }
    tracing::debug!(statements = shapes.len(), "Rendered fetch plan");
    Ok(shapes)
}

/// An association loaded by a secondary select, merged over the concrete
/// owner types at its site.
#[derive(Debug, Clone)]
struct PendingSelect<'p> {
    path: String,
    declared_by: &'static str,
    attribute: &'static str,
    targets: Vec<&'p EntityPlan>,
}

/// The fetches of one association across the concrete types at a site.
#[derive(Debug)]
struct Group<'p> {
    declared_by: &'static str,
    attribute: &'static str,
    narrowed_to: Option<&'static str>,
    target: &'static str,
    style: FetchStyle,
    targets: Vec<&'p EntityPlan>,
}

fn group_fetches<'p>(plans: &[&'p EntityPlan]) -> Vec<Group<'p>> {
    let mut groups: Vec<Group<'p>> = Vec::new();
    for &plan in plans {
        for fetch in &plan.fetches {
            let index = match groups
                .iter()
                .position(|g| g.declared_by == fetch.declared_by && g.attribute == fetch.attribute)
            {
                Some(index) => index,
                None => {
                    groups.push(Group {
                        declared_by: fetch.declared_by,
                        attribute: fetch.attribute,
                        narrowed_to: fetch.narrowed_to,
                        target: fetch.target,
                        style: FetchStyle::Lazy,
                        targets: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[index];
            group.style = stronger(group.style, fetch.style);
            group.targets.extend(fetch.targets.iter());
        }
    }
    groups
}

fn stronger(a: FetchStyle, b: FetchStyle) -> FetchStyle {
    match (a, b) {
        (FetchStyle::Join, _) | (_, FetchStyle::Join) => FetchStyle::Join,
        (FetchStyle::Select, _) | (_, FetchStyle::Select) => FetchStyle::Select,
        _ => FetchStyle::Lazy,
    }
}

impl Group<'_> {
    fn path(&self, prefix: &str) -> String {
        fetch_path(prefix, self.narrowed_to, self.attribute)
    }
}

fn select_shape<'p>(
    metamodel: &Metamodel,
    select: &PendingSelect<'p>,
    pending: &mut Vec<PendingSelect<'p>>,
) -> Result<SqlShape> {
    let attribute = metamodel.attribute(select.declared_by, select.attribute)?;
    let target = metamodel.association_target(attribute)?;
    let mut shape = ShapeBuilder::new(metamodel);
    let base = shape.alias();

    let (from, anchor, restriction) = match linkage(metamodel, attribute)? {
        Linkage::LinkTable {
            table,
            owner_column,
            target_column,
        } => {
            let link = shape.alias();
            let on = format!(
                "{} = {}",
                qualify(&link, target_column, false),
                qualify(&base, target.identifier_column(), false)
            );
            shape.joins.push(Join::inner(table, link.clone(), on).path(&select.path));
            (
                target.table,
                target.name,
                format!("{} IN (?)", qualify(&link, owner_column, false)),
            )
        }
        Linkage::OwnerForeignKey { .. } => (
            target.table,
            target.name,
            format!("{} IN (?)", qualify(&base, target.identifier_column(), false)),
        ),
        Linkage::TargetForeignKey { declaring, column } => (
            metamodel.entity(declaring)?.table,
            declaring,
            format!("{} IN (?)", qualify(&base, &column, false)),
        ),
    };

    let tables = shape.occurrence(target.name, anchor, &base, JoinType::Inner, &select.path)?;
    shape.fetches(&tables, &select.path, &select.targets, pending)?;
    Ok(shape.finish(
        select.path.clone(),
        TableRef {
            table: from,
            alias: base,
        },
        Some(restriction),
    ))
}

struct ShapeBuilder<'m> {
    metamodel: &'m Metamodel,
    joins: Vec<Join>,
    columns: Vec<SelectColumn>,
    aliases: usize,
}

impl<'m> ShapeBuilder<'m> {
    fn new(metamodel: &'m Metamodel) -> Self {
        Self {
            metamodel,
            joins: Vec::new(),
            columns: Vec::new(),
            aliases: 0,
        }
    }

    fn alias(&mut self) -> String {
        let alias = format!("t{}", self.aliases);
        self.aliases += 1;
        alias
    }

    fn finish(self, path: String, from: TableRef, restriction: Option<String>) -> SqlShape {
        SqlShape {
            path,
            from,
            joins: self.joins,
            columns: self.columns,
            restriction,
        }
    }

    /// Add an occurrence of `entity` whose `anchor` table is already present
    /// as `anchor_alias`. Returns the alias of every table of the occurrence.
    fn occurrence(
        &mut self,
        entity: &str,
        anchor: &'static str,
        anchor_alias: &str,
        chain: JoinType,
        path: &str,
    ) -> Result<Vec<(&'static str, String)>> {
        let metamodel = self.metamodel;
        let anchor_id = qualify(anchor_alias, metamodel.entity(anchor)?.identifier_column(), false);

        let mut extra: Vec<(&EntityMapping, JoinType)> = metamodel
            .supertype_chain(entity)?
            .into_iter()
            .filter(|e| e.name != anchor)
            .map(|e| (e, chain))
            .collect();
        for sub in metamodel.subtypes(entity) {
            extra.push((metamodel.entity(sub)?, JoinType::Left));
        }

        let mut tables = vec![(anchor, anchor_alias.to_string())];
        for (mapping, join_type) in extra {
            let alias = self.alias();
            let on = format!("{} = {anchor_id}", qualify(&alias, mapping.identifier_column(), false));
            let join = match join_type {
                JoinType::Inner => Join::inner(mapping.table, alias.clone(), on),
                JoinType::Left => Join::left(mapping.table, alias.clone(), on),
            };
            self.joins.push(join.path(path));
            tables.push((mapping.name, alias));
        }

        for (name, alias) in &tables {
            self.select_columns(metamodel.entity(name)?, alias);
        }
        Ok(tables)
    }

    fn select_columns(&mut self, mapping: &EntityMapping, alias: &str) {
        let columns = &mut self.columns;
        let mut offset = columns.len();
        let attributes =
            std::iter::once(mapping.identifier_attribute()).chain(mapping.declared_attributes());
        for attribute in attributes {
            offset += attribute
                .selectables()
                .for_each_selectable_from(offset, &mut |index, selectable| {
                    columns.push(SelectColumn {
                        index,
                        expression: qualify(alias, &selectable.expression, selectable.is_formula),
                        entity: mapping.name,
                        attribute: attribute.name,
                        sql_type: selectable.sql_type.clone(),
                    });
                });
        }
    }

    fn fetches<'p>(
        &mut self,
        owner: &[(&'static str, String)],
        prefix: &str,
        plans: &[&'p EntityPlan],
        pending: &mut Vec<PendingSelect<'p>>,
    ) -> Result<()> {
        for group in group_fetches(plans) {
            let path = group.path(prefix);
            match group.style {
                FetchStyle::Lazy => {}
                FetchStyle::Select => match pending.iter_mut().find(|p| {
                    p.path == path
                        && p.declared_by == group.declared_by
                        && p.attribute == group.attribute
                }) {
                    Some(existing) => existing.targets.extend(group.targets),
                    None => pending.push(PendingSelect {
                        path,
                        declared_by: group.declared_by,
                        attribute: group.attribute,
                        targets: group.targets,
                    }),
                },
                FetchStyle::Join => {
                    let owner_alias = owner
                        .iter()
                        .find(|(name, _)| *name == group.declared_by)
                        .map(|(_, alias)| alias.as_str())
                        .ok_or_else(|| {
                            Error::config(format!(
                                "'{}' has no table in the statement for '{path}'",
                                group.declared_by
                            ))
                        })?;
                    let (anchor, alias) = self.join_association(owner_alias, &group, &path)?;
                    let tables =
                        self.occurrence(group.target, anchor, &alias, JoinType::Left, &path)?;
                    self.fetches(&tables, &path, &group.targets, pending)?;
                }
            }
        }
        Ok(())
    }

    /// Join the rows of an association. Returns the anchor entity of the
    /// target occurrence and the alias of its table.
    fn join_association(
        &mut self,
        owner_alias: &str,
        group: &Group<'_>,
        path: &str,
    ) -> Result<(&'static str, String)> {
        let metamodel = self.metamodel;
        let attribute = metamodel.attribute(group.declared_by, group.attribute)?;
        let target = metamodel.association_target(attribute)?;
        let owner_id = qualify(
            owner_alias,
            metamodel.entity(group.declared_by)?.identifier_column(),
            false,
        );

        match linkage(metamodel, attribute)? {
            Linkage::LinkTable {
                table,
                owner_column,
                target_column,
            } => {
                let link = self.alias();
                let on = format!("{} = {owner_id}", qualify(&link, owner_column, false));
                self.joins.push(Join::left(table, link.clone(), on).path(path));
                let alias = self.alias();
                let on = format!(
                    "{} = {}",
                    qualify(&alias, target.identifier_column(), false),
                    qualify(&link, target_column, false)
                );
                self.joins.push(Join::left(target.table, alias.clone(), on).path(path));
                Ok((target.name, alias))
            }
            Linkage::OwnerForeignKey { column } => {
                let alias = self.alias();
                let on = format!(
                    "{} = {}",
                    qualify(&alias, target.identifier_column(), false),
                    qualify(owner_alias, &column, false)
                );
                self.joins.push(Join::left(target.table, alias.clone(), on).path(path));
                Ok((target.name, alias))
            }
            Linkage::TargetForeignKey { declaring, column } => {
                let table = metamodel.entity(declaring)?.table;
                let alias = self.alias();
                let on = format!("{} = {owner_id}", qualify(&alias, &column, false));
                self.joins.push(Join::left(table, alias.clone(), on).path(path));
                Ok((declaring, alias))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::builder::FetchPlanBuilder;
    use crate::config::FetchPlanConfig;
    use ormgraph_core::LinkTableInfo;
    use ormgraph_graph::{GraphHint, parse_graph};

    fn model() -> Arc<Metamodel> {
        Arc::new(
            Metamodel::builder()
                .entity(
                    EntityMapping::new("Foo", "foo")
                        .attribute(AttributeMapping::many_to_one("bar", "Bar").lazy()),
                )
                .entity(
                    EntityMapping::new("Bar", "bar")
                        .basic("label", SqlType::Text)
                        .attribute(AttributeMapping::one_to_many("foos", "Foo").mapped_by("bar")),
                )
                .entity(
                    EntityMapping::new("Company", "company")
                        .attribute(AttributeMapping::one_to_many("employees", "Employee").link_table(
                            LinkTableInfo::new("company_employees", "company_id", "employee_id"),
                        ))
                        .attribute(AttributeMapping::many_to_one("location", "Location")),
                )
                .entity(
                    EntityMapping::new("Employee", "employee")
                        .basic("name", SqlType::Text)
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
                .unwrap(),
        )
    }

    fn shapes(model: &Arc<Metamodel>, root: &str, graph: &str) -> (FetchPlan, Vec<SqlShape>) {
        let graph = parse_graph(model, root, graph).unwrap();
        let plan = FetchPlanBuilder::new(Arc::clone(model), FetchPlanConfig::default())
            .build(&GraphHint::load(graph))
            .unwrap();
        let shapes = plan_shapes(model, &plan).unwrap();
        (plan, shapes)
    }

    #[test]
    fn test_root_statement_joins_collection_and_inheritance() {
        let model = model();
        let (_, shapes) = shapes(&model, "Company", "employees");
        assert_eq!(
            shapes[0].to_sql(),
            "SELECT t0.\"id\", t0.\"location_id\", t2.\"id\", t2.\"name\", t3.\"id\", t3.\"level\", \
             t4.\"id\", t4.\"address\" FROM \"company\" AS t0 \
             LEFT JOIN \"company_employees\" AS t1 ON t1.\"company_id\" = t0.\"id\" \
             LEFT JOIN \"employee\" AS t2 ON t2.\"id\" = t1.\"employee_id\" \
             LEFT JOIN \"manager\" AS t3 ON t3.\"id\" = t2.\"id\" \
             LEFT JOIN \"location\" AS t4 ON t4.\"id\" = t0.\"location_id\""
        );
        assert_eq!(shapes[0].joins_for("employees").count(), 3);
        assert_eq!(shapes[0].joins_for("location").count(), 1);
    }

    #[test]
    fn test_column_indexes_are_row_positions() {
        let model = model();
        let (_, shapes) = shapes(&model, "Company", "employees(friends)");
        for shape in &shapes {
            for (position, column) in shape.columns.iter().enumerate() {
                assert_eq!(column.index, position);
            }
            assert_eq!(shape.jdbc_mappings().len(), shape.columns.len());
        }
        let level = shapes[0].columns.iter().find(|c| c.attribute == "level").unwrap();
        assert_eq!(level.entity, "Manager");
        assert_eq!(level.sql_type, SqlType::Integer);
    }

    #[test]
    fn test_one_shape_per_statement() {
        let model = model();
        let (plan, shapes) = shapes(&model, "Company", "employees(friends)");
        assert_eq!(shapes.len(), plan.statement_count());
        assert_eq!(shapes[1].path, "employees.friends");
        assert_eq!(
            shapes[1].to_sql(),
            "SELECT t0.\"id\", t0.\"name\", t2.\"id\", t2.\"level\" FROM \"employee\" AS t0 \
             INNER JOIN \"employee_friends\" AS t1 ON t1.\"friend_id\" = t0.\"id\" \
             LEFT JOIN \"manager\" AS t2 ON t2.\"id\" = t0.\"id\" \
             WHERE t1.\"employee_id\" IN (?)"
        );
    }

    fn pet_model() -> Arc<Metamodel> {
        Arc::new(
            Metamodel::builder()
                .entity(
                    EntityMapping::new("Person", "person").attribute(
                        AttributeMapping::one_to_many("pets", "Animal")
                            .link_table(LinkTableInfo::new("person_pets", "person_id", "pet_id")),
                    ),
                )
                .entity(EntityMapping::new("Animal", "animal").abstract_entity())
                .entity(EntityMapping::new("Dog", "dog").extends("Animal").attribute(
                    AttributeMapping::one_to_many("toys", "Toy")
                        .link_table(LinkTableInfo::new("dog_toys", "dog_id", "toy_id")),
                ))
                .entity(EntityMapping::new("Cat", "cat").extends("Animal").attribute(
                    AttributeMapping::one_to_many("toys", "Toy")
                        .link_table(LinkTableInfo::new("cat_toys", "cat_id", "toy_id")),
                ))
                .entity(EntityMapping::new("Toy", "toy"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_same_named_subtype_collections_get_own_selects() {
        let model = pet_model();
        let (plan, shapes) = shapes(&model, "Person", "pets:Dog(toys), pets:Cat(toys)");
        assert_eq!(plan.statement_count(), 3);
        assert_eq!(shapes.len(), 3);

        let paths: Vec<&str> = shapes.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["", "pets:Dog.toys", "pets:Cat.toys"]);
        assert_eq!(
            shapes[1].to_sql(),
            "SELECT t0.\"id\" FROM \"toy\" AS t0 \
             INNER JOIN \"dog_toys\" AS t1 ON t1.\"toy_id\" = t0.\"id\" \
             WHERE t1.\"dog_id\" IN (?)"
        );
        assert_eq!(
            shapes[2].to_sql(),
            "SELECT t0.\"id\" FROM \"toy\" AS t0 \
             INNER JOIN \"cat_toys\" AS t1 ON t1.\"toy_id\" = t0.\"id\" \
             WHERE t1.\"cat_id\" IN (?)"
        );
    }

    #[test]
    fn test_inherited_fetch_keeps_plain_path() {
        let model = model();
        let (plan, shapes) = shapes(&model, "Manager", "friends(friends)");
        let friends = plan.for_type("Manager").unwrap().fetch("friends").unwrap();
        assert_eq!(friends.narrowed_to, None);
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[1].path, "friends.friends");
    }

    #[test]
    fn test_inverse_collection_joins_on_owning_foreign_key() {
        let model = model();
        let (_, shapes) = shapes(&model, "Bar", "foos");
        assert_eq!(
            shapes[0].to_sql(),
            "SELECT t0.\"id\", t0.\"label\", t1.\"id\", t1.\"bar_id\" FROM \"bar\" AS t0 \
             LEFT JOIN \"foo\" AS t1 ON t1.\"bar_id\" = t0.\"id\""
        );
    }

    #[test]
    fn test_to_one_join_through_owner_column() {
        let model = model();
        let (_, shapes) = shapes(&model, "Foo", "bar");
        assert_eq!(shapes.len(), 1);
        let join = &shapes[0].joins[0];
        assert_eq!(join.join_type, JoinType::Left);
        assert_eq!(join.on, "t1.\"id\" = t0.\"bar_id\"");
        assert_eq!(join.path, "bar");
    }

    #[test]
    fn test_linkage_of_inverse_side() {
        let model = model();
        let foos = model.attribute("Bar", "foos").unwrap();
        assert_eq!(
            linkage(&model, foos).unwrap(),
            Linkage::TargetForeignKey {
                declaring: "Foo",
                column: "bar_id".to_string()
            }
        );
        let bar = model.attribute("Foo", "bar").unwrap();
        assert_eq!(
            linkage(&model, bar).unwrap(),
            Linkage::OwnerForeignKey {
                column: "bar_id".to_string()
            }
        );
    }

    #[test]
    fn test_collection_without_storage_is_config_error() {
        let model = Metamodel::builder()
            .entity(
                EntityMapping::new("A", "a")
                    .attribute(AttributeMapping::one_to_many("bs", "B")),
            )
            .entity(EntityMapping::new("B", "b"))
            .build()
            .unwrap();
        let bs = model.attribute("A", "bs").unwrap();
        assert!(linkage(&model, bs).unwrap_err().is_config_error());
    }
}
