//! Loading through entity graphs, end to end.

use std::sync::Arc;

use ormgraph_core::{AttributeMapping, EntityMapping, LinkTableInfo, Metamodel, SqlType, Value};
use ormgraph_graph::{EntityGraph, GraphHint, parse_graph};
use ormgraph_query::{FetchPlanBuilder, FetchPlanConfig};
use ormgraph_session::{EntityKey, InMemoryStore, MemberOf, Session, SessionConfig};

fn model() -> Arc<Metamodel> {
    Arc::new(
        Metamodel::builder()
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
            .unwrap(),
    )
}

fn session(store: InMemoryStore) -> Session {
    Session::new(Arc::new(store), SessionConfig::default())
}

/// Bar 1 and Baz 1, each referenced by Foo 1.
fn foo_store() -> InMemoryStore {
    let mut store = InMemoryStore::new(model());
    store.insert("Bar", 1, []).unwrap();
    store.insert("Baz", 1, []).unwrap();
    store.insert("Foo", 1, []).unwrap();
    store.set_reference("Foo", 1, "bar", 1).unwrap();
    store.set_reference("Foo", 1, "baz", 1).unwrap();
    store
}

/// Company 1 employing Employee 2 and Manager 1, at Location 1. The employee
/// counts the manager as both friend and manager.
fn company_store() -> InMemoryStore {
    let mut store = InMemoryStore::new(model());
    store.insert("Location", 1, [("address", Value::from("Main St"))]).unwrap();
    store.insert("Manager", 1, [("name", Value::from("m")), ("level", Value::from(2))]).unwrap();
    store.insert("Employee", 2, [("name", Value::from("e"))]).unwrap();
    store.add_link("Employee", 2, "friends", 1).unwrap();
    store.add_link("Employee", 2, "managers", 1).unwrap();
    store.insert("Company", 1, [("name", Value::from("acme"))]).unwrap();
    store.add_link("Company", 1, "employees", 2).unwrap();
    store.add_link("Company", 1, "employees", 1).unwrap();
    store.set_reference("Company", 1, "location", 1).unwrap();
    store
}

#[test]
fn load_multiple_associations() {
    let store = foo_store();
    let graph = parse_graph(store.metamodel(), "Foo", "bar, baz").unwrap();
    let mut session = session(store);

    let foo = session.find("Foo", 1, Some(&GraphHint::load(graph))).unwrap();
    let view = session.get(&foo).unwrap();
    assert!(view.is_initialized());
    assert!(view.reference("bar").unwrap().is_initialized());
    assert!(view.reference("baz").unwrap().is_initialized());
    assert!(view.is_attribute_initialized("bar"));
}

#[test]
fn load_collection() {
    let store = foo_store();
    let graph = parse_graph(store.metamodel(), "Bar", "foos").unwrap();
    let mut session = session(store);

    let bar = session.find("Bar", 1, Some(&GraphHint::load(graph))).unwrap();
    let view = session.get(&bar).unwrap();
    assert!(view.is_initialized());
    let foos = view.collection("foos").unwrap();
    assert_eq!(foos.len(), 1);
    assert!(foos[0].is_initialized());
}

#[test]
fn load_inverse_collection_only_where_requested() {
    let store = foo_store();
    let mut graph = EntityGraph::new(store.metamodel(), "Foo").unwrap();
    graph.add_attribute_nodes(&["bar", "baz"]).unwrap();
    graph.add_subgraph("bar").unwrap().add_attribute_node("foos").unwrap();
    let mut session = session(store);

    let foo = session.find("Foo", 1, Some(&GraphHint::load(graph))).unwrap();
    let view = session.get(&foo).unwrap();
    let bar = view.reference("bar").unwrap();
    let baz = view.reference("baz").unwrap();
    assert!(bar.is_initialized());
    assert!(bar.is_collection_initialized("foos"));
    assert!(baz.is_initialized());
    assert!(!baz.is_collection_initialized("foos"));
    assert!(!session.is_attribute_initialized(&baz.key(), "foos"));
}

#[test]
fn subclass_subgraph_applies_to_every_employee() {
    let store = company_store();
    let mut graph = EntityGraph::new(store.metamodel(), "Company").unwrap();
    let employees = graph.add_subgraph("employees").unwrap();
    employees.add_attribute_nodes(&["managers", "friends"]).unwrap();
    employees
        .add_subgraph_of("managers", "Manager")
        .unwrap()
        .add_attribute_nodes(&["managers", "friends"])
        .unwrap();
    let hint = GraphHint::from_hint("javax.persistence.loadgraph", graph).unwrap();
    let mut session = session(store);

    let company = session.find("Company", 1, Some(&hint)).unwrap();
    let view = session.get(&company).unwrap();
    assert!(view.is_initialized());
    let employees = view.collection("employees").unwrap();
    assert_eq!(employees.len(), 2);
    assert_eq!(
        employees.iter().map(|e| e.entity()).collect::<Vec<_>>(),
        vec!["Employee", "Manager"]
    );
    for employee in &employees {
        assert!(employee.is_collection_initialized("managers"), "{}", employee.entity());
        assert!(employee.is_collection_initialized("friends"), "{}", employee.entity());
    }
    let plain = &employees[0];
    assert_eq!(plain.collection("managers").unwrap()[0].value("level"), Some(&Value::from(2)));
}

#[test]
fn inherited_attribute_nodes_on_subtype_root() {
    let mut store = InMemoryStore::new(model());
    store.insert("Manager", 1, []).unwrap();
    store.insert("Employee", 2, []).unwrap();
    store.insert("Manager", 3, []).unwrap();
    store.add_link("Manager", 1, "friends", 2).unwrap();
    store.add_link("Manager", 1, "managers", 3).unwrap();
    let mut graph = EntityGraph::new(store.metamodel(), "Manager").unwrap();
    graph.add_attribute_node("friends").unwrap();
    graph.add_attribute_node("managers").unwrap();
    let mut session = session(store);

    let manager = session.find("Manager", 1, Some(&GraphHint::load(graph))).unwrap();
    assert_eq!(manager, EntityKey::new("Employee", 1));
    let view = session.get(&manager).unwrap();
    assert!(view.is_initialized());
    assert_eq!(view.collection("friends").unwrap().len(), 1);
    assert_eq!(view.collection("managers").unwrap().len(), 1);
    assert_eq!(view.collection("managers").unwrap()[0].id(), 3);
}

#[test]
fn member_of_query_with_load_graph() {
    let mut store = foo_store();
    store.insert("Bar", 2, []).unwrap();
    let graph = parse_graph(store.metamodel(), "Bar", "foos").unwrap();
    let mut session = session(store);

    let foo = session.find("Foo", 1, None).unwrap();
    let bars = session
        .list("Bar", Some(&MemberOf::new(foo, "foos")), Some(&GraphHint::load(graph)))
        .unwrap();
    assert_eq!(bars, vec![EntityKey::new("Bar", 1)]);
    assert!(session.is_initialized(&bars[0]));
    assert!(session.is_collection_initialized(&bars[0], "foos"));
    assert!(!session.contains(&EntityKey::new("Bar", 2)));
}

#[test]
fn fetch_graph_overrides_eager_defaults() {
    let store = Arc::new(company_store());
    let metamodel = Arc::clone(store.metamodel());
    let graph = Arc::new(parse_graph(&metamodel, "Company", "employees").unwrap());

    let mut load = Session::new(Arc::clone(&store), SessionConfig::default());
    let company = load.find("Company", 1, Some(&GraphHint::load(Arc::clone(&graph)))).unwrap();
    assert!(load.is_attribute_initialized(&company, "location"));

    let mut fetch = Session::new(store, SessionConfig::default());
    let company = fetch.find("Company", 1, Some(&GraphHint::fetch(graph))).unwrap();
    assert!(fetch.is_collection_initialized(&company, "employees"));
    assert!(!fetch.is_attribute_initialized(&company, "location"));
    let location = fetch.get(&company).unwrap().reference("location").unwrap();
    assert!(!location.is_initialized());
}

#[test]
fn default_load_initializes_eager_to_one_only() {
    let mut session = session(company_store());
    let company = session.find("Company", 1, None).unwrap();
    assert!(session.is_attribute_initialized(&company, "location"));
    assert!(!session.is_collection_initialized(&company, "employees"));
    assert_eq!(session.stats().loads, 1);
}

#[test]
fn plans_are_shared_across_threads() {
    let metamodel = model();
    let graph = parse_graph(&metamodel, "Company", "employees(managers, friends)").unwrap();
    let hint = GraphHint::load(graph);
    let builder = FetchPlanBuilder::new(Arc::clone(&metamodel), FetchPlanConfig::default());
    let expected = builder.build(&hint).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| builder.build(&hint).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn eager_default_cycle_loads_each_entity_once() {
    let metamodel = Arc::new(
        Metamodel::builder()
            .entity(
                EntityMapping::new("Person", "person")
                    .basic("name", SqlType::Text)
                    .attribute(AttributeMapping::many_to_one("address", "Address")),
            )
            .entity(
                EntityMapping::new("Address", "address")
                    .attribute(AttributeMapping::many_to_one("resident", "Person")),
            )
            .build()
            .unwrap(),
    );
    // Person 1 -> Address 1 -> Person 2 -> Address 2 -> Person 1
    let mut store = InMemoryStore::new(Arc::clone(&metamodel));
    for id in [1, 2] {
        store.insert("Person", id, []).unwrap();
        store.insert("Address", id, []).unwrap();
        store.set_reference("Person", id, "address", id).unwrap();
        store.set_reference("Address", id, "resident", 3 - id).unwrap();
    }
    let mut session = session(store);

    let plan = session.explain("Person", None).unwrap();
    let address = plan.for_type("Person").unwrap().fetch("address").unwrap();
    let resident = address.target_plan("Address").unwrap().fetch("resident").unwrap();
    assert!(resident.is_deferred());

    let person = session.find("Person", 1, None).unwrap();
    assert_eq!(session.len(), 4);
    assert_eq!(session.stats().rows_read, 4);
    for key in [
        EntityKey::new("Person", 1),
        EntityKey::new("Person", 2),
        EntityKey::new("Address", 1),
        EntityKey::new("Address", 2),
    ] {
        assert!(session.is_initialized(&key), "{key:?}");
    }

    let view = session.get(&person).unwrap();
    let address = view.reference("address").unwrap();
    assert_eq!(address.id(), 1);
    let other = address.reference("resident").unwrap();
    assert_eq!(other.id(), 2);
    assert_eq!(other.reference("address").unwrap().reference("resident").unwrap().key(), person);
}
