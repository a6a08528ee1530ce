//! Explain output through the facade.

use ormgraph::prelude::*;
use ormgraph::{AttributeKind, CollectionFetchPolicy};

fn company_model() -> Arc<Metamodel> {
    Arc::new(
        Metamodel::builder()
            .entity(
                EntityMapping::new("Company", "company")
                    .attribute(AttributeMapping::one_to_many("employees", "Employee").link_table(
                        LinkTableInfo::new("company_employees", "company_id", "employee_id"),
                    )),
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
            .entity(EntityMapping::new("Manager", "manager").extends("Employee"))
            .build()
            .unwrap(),
    )
}

fn session(metamodel: &Arc<Metamodel>, config: SessionConfig) -> Session {
    Session::new(Arc::new(InMemoryStore::new(Arc::clone(metamodel))), config)
}

#[test]
fn sibling_collections_never_share_a_statement() {
    let metamodel = company_model();
    let session = session(&metamodel, SessionConfig::default());
    let graph = parse_graph(&metamodel, "Company", "employees(managers, friends)").unwrap();
    let explain = Explain::for_load(&session, "Company", Some(&GraphHint::load(graph))).unwrap();

    assert_eq!(explain.statements.len(), explain.plan.statement_count());
    let paths: Vec<&str> = explain.statements.iter().map(|s| s.path.as_str()).collect();
    assert_eq!(paths, vec!["", "employees.managers", "employees.friends"]);

    // Each statement joins at most one collection link table.
    for statement in &explain.statements {
        let link_joins = statement
            .joins
            .iter()
            .filter(|j| j.table.starts_with("company_") || j.table.starts_with("employee_"))
            .filter(|j| j.path != statement.path)
            .count();
        assert!(link_joins <= 1, "{}", statement.to_sql());
    }

    let employees = explain.plan.for_type("Company").unwrap().fetch("employees").unwrap();
    assert_eq!(employees.kind, AttributeKind::OneToMany);
    assert_eq!(employees.style, FetchStyle::Join);
}

#[test]
fn explain_json_names_styles() {
    let metamodel = company_model();
    let config = SessionConfig::default()
        .fetch(FetchPlanConfig::new().collection_fetch(CollectionFetchPolicy::AlwaysSelect));
    let session = session(&metamodel, config);
    let graph = parse_graph(&metamodel, "Company", "employees").unwrap();
    let explain = Explain::for_load(&session, "Company", Some(&GraphHint::load(graph))).unwrap();

    let json: serde_json::Value = serde_json::from_str(&explain.to_json().unwrap()).unwrap();
    assert_eq!(json["plan"]["root"], "Company");
    assert_eq!(json["plan"]["plans"][0]["fetches"][0]["style"], "Select");
    assert_eq!(json["statements"][1]["path"], "employees");
    assert_eq!(explain.sql().len(), 2);
    assert!(explain.sql()[1].ends_with("WHERE t1.\"company_id\" IN (?)"));
}

#[test]
fn fetch_graph_explain_has_single_statement() {
    let metamodel = company_model();
    let session = session(&metamodel, SessionConfig::default());
    let graph = parse_graph(&metamodel, "Company", "employees").unwrap();
    let explain = Explain::for_load(&session, "Company", Some(&GraphHint::fetch(graph))).unwrap();
    assert_eq!(explain.sql().len(), 1);
    assert_eq!(explain.plan.semantic, Some(GraphSemantic::Fetch));
}
