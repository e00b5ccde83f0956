use std::collections::{BTreeMap, BTreeSet};

use super::value_objects::{Iri, NamedResource, Value};

/// Concrete representation of a populated field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    /// Single value of a singular attribute.
    Scalar(Value),
    /// Unordered values of a plural attribute.
    Set(BTreeSet<Value>),
    /// Ordered values of a sequence attribute.
    List(Vec<Value>),
    /// Residual predicate–value pairs of a properties attribute.
    Map(BTreeMap<Iri, BTreeSet<Value>>),
}

impl FieldValue {
    /// Builds a scalar field value.
    #[must_use]
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    /// Builds an unordered field value from the supplied items.
    #[must_use]
    pub fn set(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Set(values.into_iter().collect())
    }

    /// Builds an ordered field value from the supplied items.
    #[must_use]
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Self::List(values.into_iter().collect())
    }

    /// Returns `true` when the value holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(value) => value.is_null(),
            Self::Set(values) => values.is_empty(),
            Self::List(values) => values.is_empty(),
            Self::Map(entries) => entries.is_empty(),
        }
    }
}

/// Lifecycle state of one field on an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldState {
    /// Lazily fetched field that has not been loaded yet.
    Unloaded,
    /// Loaded field with no value.
    Empty,
    /// Loaded field with a value.
    Present(FieldValue),
}

impl FieldState {
    /// Returns `true` unless the field is still pending a lazy load.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Self::Unloaded)
    }
}

const EMPTY: FieldState = FieldState::Empty;

/// A live, typed object materialized from (or destined for) the graph.
///
/// Instances are plain data: they carry no session wiring, so they can be
/// shared through the second-level cache and cloned into per-transaction
/// working copies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    type_name: String,
    identifier: Option<NamedResource>,
    fields: BTreeMap<String, FieldState>,
}

impl Instance {
    /// Creates an empty instance of the given managed type.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            identifier: None,
            fields: BTreeMap::new(),
        }
    }

    /// Sets the identifier during construction.
    #[must_use]
    pub fn with_identifier(mut self, identifier: NamedResource) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Sets a field during construction.
    #[must_use]
    pub fn with_field(mut self, attribute: impl Into<String>, value: FieldValue) -> Self {
        self.set(attribute, value);
        self
    }

    /// Returns the managed type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the resource identifier, if one has been assigned.
    #[must_use]
    pub fn identifier(&self) -> Option<&NamedResource> {
        self.identifier.as_ref()
    }

    /// Assigns the identifier once. Returns `false` if one was already set;
    /// identifiers are immutable after assignment.
    pub fn assign_identifier(&mut self, identifier: NamedResource) -> bool {
        if self.identifier.is_some() {
            return false;
        }
        self.identifier = Some(identifier);
        true
    }

    /// Sets a field to a concrete value.
    pub fn set(&mut self, attribute: impl Into<String>, value: FieldValue) {
        self.fields
            .insert(attribute.into(), FieldState::Present(value));
    }

    /// Marks a field as loaded and empty.
    pub fn clear(&mut self, attribute: impl Into<String>) {
        self.fields.insert(attribute.into(), FieldState::Empty);
    }

    /// Marks a field as pending a lazy load.
    pub fn mark_unloaded(&mut self, attribute: impl Into<String>) {
        self.fields.insert(attribute.into(), FieldState::Unloaded);
    }

    /// Replaces the raw state of a field.
    pub fn set_state(&mut self, attribute: impl Into<String>, state: FieldState) {
        self.fields.insert(attribute.into(), state);
    }

    /// Returns the raw state of a field; untouched fields read as empty.
    #[must_use]
    pub fn field(&self, attribute: &str) -> &FieldState {
        self.fields.get(attribute).unwrap_or(&EMPTY)
    }

    /// Returns whether a field has ever been touched. An untouched field
    /// reads as empty but carries no information, which matters when merging
    /// detached instances: untouched fields must not clear stored values.
    #[must_use]
    pub fn has_field(&self, attribute: &str) -> bool {
        self.fields.contains_key(attribute)
    }

    /// Detached-safe read: an unloaded field degrades to the empty default
    /// instead of failing, since a detached instance has no session to load
    /// through.
    #[must_use]
    pub fn loaded(&self, attribute: &str) -> &FieldState {
        match self.field(attribute) {
            FieldState::Unloaded => &EMPTY,
            state => state,
        }
    }

    /// Returns whether a field has been loaded.
    #[must_use]
    pub fn is_loaded(&self, attribute: &str) -> bool {
        self.field(attribute).is_loaded()
    }

    /// Iterates over all touched fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldState)> {
        self.fields.iter().map(|(name, state)| (name.as_str(), state))
    }
}
