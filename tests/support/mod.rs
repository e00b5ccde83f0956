//! Shared test infrastructure: an in-memory recording storage connector and
//! the fixture metamodel used by the integration suites.

// Not every suite uses every helper.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use ontomap::mapping::FieldDelta;
use ontomap::session::connector::is_storable;
use ontomap::{
    AttributeDescriptor, Axiom, Descriptor, IdentifierDescriptor, Iri, Metamodel,
    MetamodelBuilder, NamedResource, QueryBindings, QueryRow, SequenceLayout, StorageConnector,
    StorageError, TypeMapping,
};

pub const EX: &str = "https://example.org/";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn iri(local: &str) -> Iri {
    Iri::new(format!("{EX}{local}")).expect("valid iri")
}

pub fn resource(local: &str) -> NamedResource {
    NamedResource::new(iri(local))
}

/// In-memory storage connector recording every call, with copy-on-begin
/// transaction staging and injectable failures.
#[derive(Default)]
pub struct MemoryConnector {
    base: Mutex<Vec<Axiom>>,
    staged: Mutex<Option<Vec<Axiom>>>,
    calls: Mutex<Vec<String>>,
    query_results: Mutex<BTreeMap<String, Vec<QueryRow>>>,
    fail_on: Mutex<Option<String>>,
}

impl MemoryConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds statements directly into the committed store.
    pub fn seed(&self, axioms: impl IntoIterator<Item = Axiom>) {
        self.base.lock().unwrap().extend(axioms);
    }

    /// Returns a snapshot of the committed store.
    pub fn statements(&self) -> Vec<Axiom> {
        self.base.lock().unwrap().clone()
    }

    /// Returns the recorded operation names, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    /// Makes the named operation fail with an access error on its next call.
    pub fn fail_on(&self, operation: &str) {
        *self.fail_on.lock().unwrap() = Some(operation.to_owned());
    }

    /// Registers the canned result of a native query.
    pub fn respond_to_query(&self, query: &str, rows: Vec<QueryRow>) {
        self.query_results
            .lock()
            .unwrap()
            .insert(query.to_owned(), rows);
    }

    fn record(&self, operation: &str) -> Result<(), StorageError> {
        self.calls.lock().unwrap().push(operation.to_owned());
        let failing = self.fail_on.lock().unwrap().clone();
        if failing.as_deref() == Some(operation) {
            return Err(StorageError::access(format!(
                "injected failure on {operation}"
            )));
        }
        Ok(())
    }

    fn with_active<R>(&self, apply: impl FnOnce(&mut Vec<Axiom>) -> R) -> R {
        let mut staged = self.staged.lock().unwrap();
        match staged.as_mut() {
            Some(active) => apply(active),
            None => apply(&mut self.base.lock().unwrap()),
        }
    }
}

#[async_trait]
impl StorageConnector for MemoryConnector {
    type Error = StorageError;

    async fn find_axioms(
        &self,
        subject: &NamedResource,
        _descriptor: &Descriptor,
    ) -> Result<Vec<Axiom>, Self::Error> {
        self.record("find_axioms")?;
        Ok(self.with_active(|axioms| {
            axioms
                .iter()
                .filter(|axiom| axiom.subject() == subject)
                .cloned()
                .collect()
        }))
    }

    async fn persist(
        &self,
        _subject: &NamedResource,
        axioms: Vec<Axiom>,
        _descriptor: &Descriptor,
    ) -> Result<(), Self::Error> {
        self.record("persist")?;
        self.with_active(|store| {
            store.extend(axioms.into_iter().filter(is_storable));
        });
        Ok(())
    }

    async fn merge_field(
        &self,
        subject: &NamedResource,
        delta: FieldDelta,
        _descriptor: &Descriptor,
    ) -> Result<(), Self::Error> {
        self.record("merge_field")?;
        self.with_active(|store| {
            if delta.replace {
                let predicates: BTreeSet<_> = delta
                    .additions
                    .iter()
                    .map(|axiom| axiom.assertion().predicate().clone())
                    .collect();
                store.retain(|axiom| {
                    axiom.subject() != subject
                        || !predicates.contains(axiom.assertion().predicate())
                });
            } else {
                store.retain(|axiom| !delta.removals.contains(axiom));
            }
            store.extend(delta.additions.into_iter().filter(is_storable));
        });
        Ok(())
    }

    async fn remove_by_identifier(
        &self,
        subject: &NamedResource,
        _descriptor: &Descriptor,
    ) -> Result<(), Self::Error> {
        self.record("remove_by_identifier")?;
        self.with_active(|store| {
            store.retain(|axiom| axiom.subject() != subject);
        });
        Ok(())
    }

    async fn generate_identifier(&self, _class_iri: &Iri) -> Result<NamedResource, Self::Error> {
        self.record("generate_identifier")?;
        NamedResource::parse(format!("urn:uuid:{}", Uuid::new_v4()))
            .map_err(|err| StorageError::IdentifierGeneration(err.to_string()))
    }

    async fn execute_native_query(
        &self,
        query: &str,
        _bindings: &QueryBindings,
    ) -> Result<Vec<QueryRow>, Self::Error> {
        self.record("execute_native_query")?;
        Ok(self
            .query_results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn begin(&self) -> Result<(), Self::Error> {
        self.record("begin")?;
        let snapshot = self.base.lock().unwrap().clone();
        *self.staged.lock().unwrap() = Some(snapshot);
        Ok(())
    }

    async fn commit(&self) -> Result<(), Self::Error> {
        self.record("commit")?;
        if let Some(staged) = self.staged.lock().unwrap().take() {
            *self.base.lock().unwrap() = staged;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), Self::Error> {
        self.record("rollback")?;
        *self.staged.lock().unwrap() = None;
        Ok(())
    }

    async fn is_consistent(&self) -> Result<bool, Self::Error> {
        self.record("is_consistent")?;
        Ok(true)
    }
}

pub const PARTICIPANT_QUERY: &str =
    "SELECT ?participant WHERE { ?participant <https://example.org/attends> ?x . }";

/// Fixture metamodel: an abstract `Agent` root carrying the generated
/// identifier, `Person` with every attribute kind, its `Student` subtype,
/// an `Organization` with an inferred attribute and an `Event` with a
/// query-derived attribute.
pub fn metamodel() -> Arc<Metamodel> {
    let agent = TypeMapping::new("Agent", iri("Agent"))
        .abstract_type()
        .with_identifier(IdentifierDescriptor::new("uri").generated());

    let person = TypeMapping::new("Person", iri("Person"))
        .with_supertype("Agent")
        .with_attribute(AttributeDescriptor::data("firstName", iri("firstName")))
        .with_attribute(AttributeDescriptor::data("nickname", iri("nickname")).plural())
        .with_attribute(AttributeDescriptor::sequence(
            "friendsOrdered",
            iri("hasFirst"),
            SequenceLayout::Linked {
                next: iri("hasNext"),
            },
            "Person",
        ))
        .with_attribute(AttributeDescriptor::object("knows", iri("knows"), "Person").plural())
        .with_attribute(AttributeDescriptor::object("bestFriend", iri("bestFriend"), "Person").lazy())
        .with_attribute(AttributeDescriptor::types("types"))
        .with_attribute(AttributeDescriptor::properties("properties"));

    let student = TypeMapping::new("Student", iri("Student"))
        .with_supertype("Person")
        .with_attribute(AttributeDescriptor::data("school", iri("school")));

    let teacher = TypeMapping::new("Teacher", iri("Teacher"))
        .with_supertype("Person")
        .with_attribute(AttributeDescriptor::data("subject", iri("subject")));

    let organization = TypeMapping::new("Organization", iri("Organization"))
        .with_identifier(IdentifierDescriptor::new("uri"))
        .with_attribute(AttributeDescriptor::data("name", iri("name")))
        .with_attribute(
            AttributeDescriptor::object("members", iri("hasMember"), "Person")
                .plural()
                .inferred(),
        );

    let event = TypeMapping::new("Event", iri("Event"))
        .with_identifier(IdentifierDescriptor::new("uri"))
        .with_attribute(AttributeDescriptor::data("title", iri("title")))
        .with_attribute(AttributeDescriptor::query("participants", PARTICIPANT_QUERY).plural());

    Arc::new(
        MetamodelBuilder::new()
            .register(agent)
            .register(person)
            .register(student)
            .register(teacher)
            .register(organization)
            .register(event)
            .build()
            .expect("fixture metamodel"),
    )
}
