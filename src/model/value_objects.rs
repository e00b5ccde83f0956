use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use oxrdf::vocab::xsd;
use oxrdf::NamedNode;
use thiserror::Error;

/// Value object ensuring that supplied text represents a valid IRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iri {
    value: String,
}

impl Iri {
    /// Validates and constructs a new [`Iri`] value object.
    ///
    /// The constructor rejects malformed identifiers in order to guarantee that
    /// every resource and predicate uses canonical identifiers.
    pub fn new(value: impl Into<String>) -> Result<Self, IriError> {
        let value = value.into();
        NamedNode::new(value.as_str()).map_err(|_| IriError::Invalid {
            value: value.clone(),
        })?;
        Ok(Self { value })
    }

    /// Constructs an [`Iri`] from text known to be valid, such as vocabulary
    /// constants shipped with `oxrdf`.
    pub(crate) fn new_unchecked(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Returns the underlying textual representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl Display for Iri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Iri {
    type Err = IriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for Iri {
    type Error = IriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Errors produced when validating an [`Iri`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IriError {
    /// The provided text could not be parsed as an IRI.
    #[error("invalid IRI: {value}")]
    Invalid { value: String },
}

/// A graph resource identified by IRI, usable as statement subject or object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedResource {
    identifier: Iri,
}

impl NamedResource {
    /// Wraps an already validated identifier.
    #[must_use]
    pub fn new(identifier: Iri) -> Self {
        Self { identifier }
    }

    /// Validates the supplied text and wraps it as a resource name.
    pub fn parse(value: impl Into<String>) -> Result<Self, IriError> {
        Ok(Self::new(Iri::new(value)?))
    }

    /// Returns the resource identifier.
    #[must_use]
    pub fn identifier(&self) -> &Iri {
        &self.identifier
    }

    /// Returns the textual form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.identifier.as_str()
    }
}

impl Display for NamedResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.identifier)
    }
}

impl From<Iri> for NamedResource {
    fn from(identifier: Iri) -> Self {
        Self::new(identifier)
    }
}

/// A literal kept in its exact lexical form together with its datatype.
///
/// Keeping the lexical form verbatim guarantees that values round-trip through
/// the store without silent widening or narrowing; typed accessors parse on
/// demand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    lexical: String,
    datatype: Iri,
    language: Option<String>,
}

impl Literal {
    /// Creates a plain `xsd:string` literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            lexical: value.into(),
            datatype: Iri::new_unchecked(xsd::STRING.as_str()),
            language: None,
        }
    }

    /// Creates a language-tagged string literal.
    #[must_use]
    pub fn lang_string(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            lexical: value.into(),
            datatype: Iri::new_unchecked(xsd::STRING.as_str()),
            language: Some(language.into()),
        }
    }

    /// Creates a literal from an explicit lexical form and datatype.
    #[must_use]
    pub fn typed(lexical: impl Into<String>, datatype: Iri) -> Self {
        Self {
            lexical: lexical.into(),
            datatype,
            language: None,
        }
    }

    /// Creates an `xsd:integer` literal.
    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), Iri::new_unchecked(xsd::INTEGER.as_str()))
    }

    /// Creates an `xsd:boolean` literal.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::typed(value.to_string(), Iri::new_unchecked(xsd::BOOLEAN.as_str()))
    }

    /// Creates an `xsd:double` literal.
    #[must_use]
    pub fn double(value: f64) -> Self {
        Self::typed(value.to_string(), Iri::new_unchecked(xsd::DOUBLE.as_str()))
    }

    /// Creates an `xsd:dateTime` literal from a UTC timestamp.
    #[must_use]
    pub fn date_time(value: chrono::DateTime<chrono::Utc>) -> Self {
        Self::typed(
            value.to_rfc3339(),
            Iri::new_unchecked(xsd::DATE_TIME.as_str()),
        )
    }

    /// Returns the exact lexical form.
    #[must_use]
    pub fn lexical_form(&self) -> &str {
        &self.lexical
    }

    /// Returns the datatype identifier.
    #[must_use]
    pub fn datatype(&self) -> &Iri {
        &self.datatype
    }

    /// Returns the language tag, if any.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Parses the lexical form as an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        self.lexical.parse().ok()
    }

    /// Parses the lexical form as a boolean.
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        self.lexical.parse().ok()
    }

    /// Parses the lexical form as a double.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        self.lexical.parse().ok()
    }

    /// Parses the lexical form as an RFC 3339 timestamp.
    #[must_use]
    pub fn as_date_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&self.lexical)
            .ok()
            .map(|parsed| parsed.with_timezone(&chrono::Utc))
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.language {
            Some(language) => write!(f, "\"{}\"@{language}", self.lexical),
            None => write!(f, "\"{}\"^^<{}>", self.lexical, self.datatype),
        }
    }
}

/// A statement value: either a resource reference, a literal, or the write-time
/// sentinel signalling intentional absence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// Reference to another resource.
    Resource(NamedResource),
    /// Literal value in exact lexical form.
    Literal(Literal),
    /// Sentinel marking an intentionally absent value; only ever written,
    /// never read back from the store.
    Null,
}

impl Value {
    /// Returns the resource reference, if this value is one.
    #[must_use]
    pub fn as_resource(&self) -> Option<&NamedResource> {
        match self {
            Self::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    /// Returns the literal, if this value is one.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// Returns `true` for the absence sentinel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(resource) => Display::fmt(resource, f),
            Self::Literal(literal) => Display::fmt(literal, f),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<NamedResource> for Value {
    fn from(resource: NamedResource) -> Self {
        Self::Resource(resource)
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}
