//! Round-trip behavior of the mapper through a full session: every attribute
//! kind written through a unit of work reads back equal, honouring set and
//! list ordering rules.

mod support;

use std::sync::Arc;

use ontomap::{
    Assertion, Axiom, Descriptor, FieldState, FieldValue, Instance, Literal, PersistenceSettings,
    QueryRow, Session, Value,
};

use support::{iri, metamodel, resource, MemoryConnector, PARTICIPANT_QUERY};

fn session(connector: &Arc<MemoryConnector>) -> Session {
    support::init_tracing();
    Session::new(
        metamodel(),
        connector.clone(),
        PersistenceSettings::default(),
    )
}

fn literal(text: &str) -> Value {
    Value::Literal(Literal::string(text))
}

#[tokio::test]
async fn scalar_and_plural_data_round_trip() {
    let connector = MemoryConnector::new();
    let session = session(&connector);

    let p1 = resource("P1");
    let person = Instance::new("Person")
        .with_identifier(p1.clone())
        .with_field("firstName", FieldValue::scalar(literal("Alice")))
        .with_field(
            "nickname",
            FieldValue::set([literal("Al"), literal("Ally")]),
        );

    let mut uow = session.acquire_unit_of_work();
    uow.register_new(person, &Descriptor::new())
        .await
        .expect("register");
    uow.commit().await.expect("commit");

    session.cache().evict_all();
    let mut reader = session.acquire_unit_of_work();
    let found = reader
        .find("Person", &p1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present")
        .clone();

    assert_eq!(
        found.field("firstName"),
        &FieldState::Present(FieldValue::scalar(literal("Alice")))
    );
    assert_eq!(
        found.field("nickname"),
        &FieldState::Present(FieldValue::set([literal("Al"), literal("Ally")]))
    );
}

#[tokio::test]
async fn plural_values_are_order_independent_on_delivery() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");

    // Deliver the nickname statements in reverse order.
    connector.seed([
        Axiom::new(
            p1.clone(),
            Assertion::data(iri("nickname"), false),
            literal("Ally"),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::data(iri("nickname"), false),
            literal("Al"),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
    ]);

    let mut uow = session.acquire_unit_of_work();
    let found = uow
        .find("Person", &p1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present");
    assert_eq!(
        found.field("nickname"),
        &FieldState::Present(FieldValue::set([literal("Al"), literal("Ally")]))
    );
}

#[tokio::test]
async fn linked_sequence_reads_back_in_link_order() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");

    connector.seed([
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::object(iri("hasFirst"), false),
            Value::Resource(resource("P2")),
        ),
        Axiom::new(
            resource("P2"),
            Assertion::object(iri("hasNext"), false),
            Value::Resource(resource("P3")),
        ),
        Axiom::new(
            resource("P2"),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
        Axiom::new(
            resource("P3"),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
    ]);

    let mut uow = session.acquire_unit_of_work();
    let found = uow
        .find("Person", &p1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present");
    assert_eq!(
        found.field("friendsOrdered"),
        &FieldState::Present(FieldValue::list([
            Value::Resource(resource("P2")),
            Value::Resource(resource("P3")),
        ]))
    );
}

#[tokio::test]
async fn written_list_reads_back_identically() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");
    let order = [
        Value::Resource(resource("A")),
        Value::Resource(resource("B")),
        Value::Resource(resource("C")),
    ];

    let mut uow = session.acquire_unit_of_work();
    for friend in ["A", "B", "C"] {
        let member = Instance::new("Person").with_identifier(resource(friend));
        uow.register_new(member, &Descriptor::new())
            .await
            .expect("register friend");
    }
    let person = Instance::new("Person")
        .with_identifier(p1.clone())
        .with_field("friendsOrdered", FieldValue::list(order.clone()));
    uow.register_new(person, &Descriptor::new())
        .await
        .expect("register");
    uow.commit().await.expect("commit");

    session.cache().evict_all();
    let mut reader = session.acquire_unit_of_work();
    let found = reader
        .find("Person", &p1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present");
    assert_eq!(
        found.field("friendsOrdered"),
        &FieldState::Present(FieldValue::list(order))
    );
}

#[tokio::test]
async fn polymorphic_resolution_yields_most_specific_subtype() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");

    connector.seed([
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Student")),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::data(iri("school"), false),
            literal("CTU"),
        ),
    ]);

    let mut uow = session.acquire_unit_of_work();
    let found = uow
        .find("Person", &p1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present");
    assert_eq!(found.type_name(), "Student");
    assert_eq!(
        found.field("school"),
        &FieldState::Present(FieldValue::scalar(literal("CTU")))
    );
    // The primary class of the resolved subtype is excluded from types.
    assert_eq!(
        found.field("types"),
        &FieldState::Present(FieldValue::set([Value::Resource(resource("Person"))]))
    );
}

#[tokio::test]
async fn unrelated_most_specific_types_are_ambiguous() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");

    // Student and Teacher both specialize Person but not each other.
    connector.seed([
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Student")),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Teacher")),
        ),
    ]);

    let mut uow = session.acquire_unit_of_work();
    let err = uow
        .find("Person", &p1, &Descriptor::new())
        .await
        .expect_err("ambiguous");
    assert!(matches!(
        err,
        ontomap::Error::Mapping(ontomap::MappingError::AmbiguousEntityType { .. })
    ));
}

#[tokio::test]
async fn residual_statements_land_in_the_properties_attribute() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");

    connector.seed([
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::data(iri("shoeSize"), false),
            Value::Literal(Literal::integer(38)),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::data(iri("firstName"), false),
            literal("Alice"),
        ),
    ]);

    let mut uow = session.acquire_unit_of_work();
    let found = uow
        .find("Person", &p1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present");
    let FieldState::Present(FieldValue::Map(properties)) = found.field("properties") else {
        panic!("properties attribute expected");
    };
    assert_eq!(properties.len(), 1);
    assert!(properties
        .get(&iri("shoeSize"))
        .expect("residual predicate")
        .contains(&Value::Literal(Literal::integer(38))));
}

#[tokio::test]
async fn lazy_attribute_loads_once_through_the_session() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");

    connector.seed([
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::object(iri("bestFriend"), false),
            Value::Resource(resource("P2")),
        ),
    ]);

    let mut uow = session.acquire_unit_of_work();
    let found = uow
        .find("Person", &p1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present")
        .clone();
    assert_eq!(found.field("bestFriend"), &FieldState::Unloaded);
    // Detached reads degrade to the empty default instead of failing.
    assert_eq!(found.loaded("bestFriend"), &FieldState::Empty);

    uow.load_field(&p1, "bestFriend").await.expect("load");
    let loaded = uow.get_mut(&p1).expect("registered");
    assert_eq!(
        loaded.field("bestFriend"),
        &FieldState::Present(FieldValue::scalar(Value::Resource(resource("P2"))))
    );

    let loads_before = connector.call_count("find_axioms");
    uow.load_field(&p1, "bestFriend").await.expect("reload");
    assert_eq!(connector.call_count("find_axioms"), loads_before);
}

#[tokio::test]
async fn query_derived_attribute_is_read_only() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let e1 = resource("E1");

    connector.seed([
        Axiom::new(
            e1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Event")),
        ),
        Axiom::new(e1.clone(), Assertion::data(iri("title"), false), literal("Rust meetup")),
    ]);
    connector.respond_to_query(
        PARTICIPANT_QUERY,
        vec![
            QueryRow::new(vec![Value::Resource(resource("P1"))]),
            QueryRow::new(vec![Value::Resource(resource("P2"))]),
        ],
    );

    let mut uow = session.acquire_unit_of_work();
    let found = uow
        .find("Event", &e1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present");
    assert_eq!(
        found.field("participants"),
        &FieldState::Present(FieldValue::set([
            Value::Resource(resource("P1")),
            Value::Resource(resource("P2")),
        ]))
    );

    // Committing the unchanged instance issues no write for the derived
    // attribute.
    uow.commit().await.expect("commit");
    assert_eq!(connector.call_count("merge_field"), 0);
    assert_eq!(connector.call_count("persist"), 0);
}

#[tokio::test]
async fn null_sentinel_statements_are_markers_not_data() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");

    let person = Instance::new("Person").with_identifier(p1.clone());
    let mut uow = session.acquire_unit_of_work();
    uow.register_new(person, &Descriptor::new())
        .await
        .expect("register");
    uow.commit().await.expect("commit");

    // Only the class assertion survives in the store; the absence sentinels
    // of the optional attributes are not stored.
    let stored: Vec<Axiom> = connector
        .statements()
        .into_iter()
        .filter(|axiom| axiom.subject() == &p1)
        .collect();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].assertion().is_class_assertion());
    assert_eq!(stored[0].value(), &Value::Resource(resource("Person")));
}

#[tokio::test]
async fn eager_references_are_materialized_with_the_root() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let p1 = resource("P1");

    connector.seed([
        Axiom::new(
            p1.clone(),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
        Axiom::new(
            p1.clone(),
            Assertion::object(iri("knows"), false),
            Value::Resource(resource("P2")),
        ),
        Axiom::new(
            resource("P2"),
            Assertion::class(false),
            Value::Resource(resource("Person")),
        ),
        Axiom::new(
            resource("P2"),
            Assertion::data(iri("firstName"), false),
            literal("Bob"),
        ),
    ]);

    let mut uow = session.acquire_unit_of_work();
    uow.find("Person", &p1, &Descriptor::new())
        .await
        .expect("find")
        .expect("present");
    assert!(uow.contains(&resource("P2")));
    let neighbour = uow.get_mut(&resource("P2")).expect("registered");
    assert_eq!(
        neighbour.field("firstName"),
        &FieldState::Present(FieldValue::scalar(literal("Bob")))
    );
}

#[tokio::test]
async fn unknown_resource_is_absent() {
    let connector = MemoryConnector::new();
    let session = session(&connector);
    let mut uow = session.acquire_unit_of_work();
    let found = uow
        .find("Person", &resource("missing"), &Descriptor::new())
        .await
        .expect("find");
    assert!(found.is_none());
}
