use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::model::namespaces::NamespaceResolver;
use crate::model::value_objects::{Iri, IriError};

use super::attributes::{AttributeDescriptor, AttributeKind, Cardinality, IdentifierDescriptor};
use super::types::{ManagedType, TypeMapping};
use super::{Metamodel, MetamodelError};

/// Assembles and validates a [`Metamodel`] from type mappings.
///
/// The builder is consumed by [`MetamodelBuilder::build`]; the resulting
/// metamodel is immutable and safe to share across units of work.
#[derive(Debug, Default)]
pub struct MetamodelBuilder {
    namespaces: NamespaceResolver,
    default_language: Option<String>,
    mappings: Vec<TypeMapping>,
}

impl MetamodelBuilder {
    /// Creates an empty builder with the default namespace prefixes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a namespace prefix for [`MetamodelBuilder::resolve`].
    pub fn register_namespace(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.namespaces.register(prefix, namespace);
    }

    /// Applies a persistence-unit default language to every data and
    /// annotation attribute that does not declare its own.
    #[must_use]
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = Some(language.into());
        self
    }

    /// Resolves possibly prefixed text into an absolute IRI.
    pub fn resolve(&self, value: &str) -> Result<Iri, IriError> {
        self.namespaces.resolve(value)
    }

    /// Registers one type mapping.
    #[must_use]
    pub fn register(mut self, mapping: TypeMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Resolves supertype graphs and inherited members, validates every
    /// mapping and produces the immutable metamodel.
    pub fn build(self) -> Result<Metamodel, MetamodelError> {
        debug!(types = self.mappings.len(), "building metamodel");
        let mut declared: BTreeMap<String, TypeMapping> = BTreeMap::new();
        for mapping in self.mappings {
            let name = mapping.name().to_owned();
            if declared.insert(name.clone(), mapping).is_some() {
                return Err(MetamodelError::DuplicateType(name));
            }
        }

        for mapping in declared.values() {
            for supertype in mapping.supertypes() {
                if !declared.contains_key(supertype) {
                    return Err(MetamodelError::UnknownSupertype {
                        type_name: mapping.name().to_owned(),
                        supertype: supertype.clone(),
                    });
                }
            }
        }
        detect_cycles(&declared)?;

        let mut types: BTreeMap<String, std::sync::Arc<ManagedType>> = BTreeMap::new();
        let mut by_class: BTreeMap<Iri, BTreeSet<String>> = BTreeMap::new();
        for mapping in declared.values() {
            let ancestors = collect_ancestors(mapping, &declared);
            let mut attributes = resolve_attributes(mapping, &declared)?;
            if let Some(language) = &self.default_language {
                apply_default_language(&mut attributes, language);
            }
            let identifier = resolve_identifier(mapping, &declared)?;
            validate_attributes(mapping.name(), &attributes, &declared)?;

            if identifier.is_none() && !mapping.is_abstract() {
                return Err(MetamodelError::MissingIdentifier {
                    type_name: mapping.name().to_owned(),
                });
            }

            let managed = ManagedType::new(
                mapping.name().to_owned(),
                mapping.class_iri().clone(),
                mapping.is_abstract(),
                mapping.supertypes().clone(),
                ancestors,
                attributes,
                identifier,
            );
            by_class
                .entry(managed.class_iri().clone())
                .or_default()
                .insert(managed.name().to_owned());
            types.insert(managed.name().to_owned(), std::sync::Arc::new(managed));
        }

        debug!(types = types.len(), "metamodel built");
        Ok(Metamodel::new(types, by_class))
    }
}

fn apply_default_language(
    attributes: &mut BTreeMap<String, AttributeDescriptor>,
    language: &str,
) {
    for attribute in attributes.values_mut() {
        if attribute.language().is_none()
            && matches!(
                attribute.kind(),
                AttributeKind::Data | AttributeKind::Annotation
            )
        {
            *attribute = attribute.clone().with_language(language);
        }
    }
}

fn detect_cycles(declared: &BTreeMap<String, TypeMapping>) -> Result<(), MetamodelError> {
    for start in declared.keys() {
        let mut stack: Vec<&str> = vec![start.as_str()];
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        while let Some(current) = stack.pop() {
            let Some(mapping) = declared.get(current) else {
                continue;
            };
            for supertype in mapping.supertypes() {
                if supertype == start {
                    return Err(MetamodelError::SupertypeCycle {
                        type_name: start.clone(),
                    });
                }
                if visited.insert(supertype) {
                    stack.push(supertype);
                }
            }
        }
    }
    Ok(())
}

fn collect_ancestors(
    mapping: &TypeMapping,
    declared: &BTreeMap<String, TypeMapping>,
) -> BTreeSet<String> {
    let mut ancestors = BTreeSet::new();
    let mut queue: VecDeque<&String> = mapping.supertypes().iter().collect();
    while let Some(current) = queue.pop_front() {
        if ancestors.insert(current.clone()) {
            if let Some(parent) = declared.get(current) {
                queue.extend(parent.supertypes().iter());
            }
        }
    }
    ancestors
}

/// Merges declared and inherited attributes breadth-first. A local
/// declaration shadows inherited ones; two inherited declarations of the
/// same name are compatible only when structurally equal.
fn resolve_attributes(
    mapping: &TypeMapping,
    declared: &BTreeMap<String, TypeMapping>,
) -> Result<BTreeMap<String, AttributeDescriptor>, MetamodelError> {
    let mut resolved: BTreeMap<String, AttributeDescriptor> = BTreeMap::new();
    let mut local: BTreeSet<String> = BTreeSet::new();
    for attribute in mapping.attributes() {
        if !local.insert(attribute.name().to_owned()) {
            return Err(MetamodelError::DuplicateAttribute {
                type_name: mapping.name().to_owned(),
                attribute: attribute.name().to_owned(),
            });
        }
        resolved.insert(attribute.name().to_owned(), attribute.clone());
    }

    let mut queue: VecDeque<&String> = mapping.supertypes().iter().collect();
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        let Some(parent) = declared.get(current) else {
            continue;
        };
        for attribute in parent.attributes() {
            if local.contains(attribute.name()) {
                continue;
            }
            match resolved.get(attribute.name()) {
                None => {
                    resolved.insert(attribute.name().to_owned(), attribute.clone());
                }
                Some(existing) if existing == attribute => {}
                Some(_) => {
                    return Err(MetamodelError::AmbiguousAttribute {
                        type_name: mapping.name().to_owned(),
                        attribute: attribute.name().to_owned(),
                    });
                }
            }
        }
        queue.extend(parent.supertypes().iter());
    }
    Ok(resolved)
}

/// Resolves the identifier declared across the inheritance chain; exactly one
/// distinct declaration is allowed.
fn resolve_identifier(
    mapping: &TypeMapping,
    declared: &BTreeMap<String, TypeMapping>,
) -> Result<Option<IdentifierDescriptor>, MetamodelError> {
    let mut found: Option<IdentifierDescriptor> = mapping.identifier().cloned();
    let mut queue: VecDeque<&String> = mapping.supertypes().iter().collect();
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        let Some(parent) = declared.get(current) else {
            continue;
        };
        if let Some(inherited) = parent.identifier() {
            match &found {
                None => found = Some(inherited.clone()),
                Some(existing) if existing == inherited => {}
                Some(_) => {
                    return Err(MetamodelError::AmbiguousIdentifier {
                        type_name: mapping.name().to_owned(),
                    });
                }
            }
        }
        queue.extend(parent.supertypes().iter());
    }
    Ok(found)
}

fn validate_attributes(
    type_name: &str,
    attributes: &BTreeMap<String, AttributeDescriptor>,
    declared: &BTreeMap<String, TypeMapping>,
) -> Result<(), MetamodelError> {
    let mut types_count = 0usize;
    let mut properties_count = 0usize;
    for attribute in attributes.values() {
        match attribute.kind() {
            AttributeKind::Types => types_count += 1,
            AttributeKind::Properties => properties_count += 1,
            AttributeKind::Sequence(_) => {
                debug_assert_eq!(attribute.cardinality(), Cardinality::List);
            }
            _ => {}
        }
        if let Some(target) = attribute.target() {
            if !declared.contains_key(target) {
                return Err(MetamodelError::UnknownTargetType {
                    type_name: type_name.to_owned(),
                    attribute: attribute.name().to_owned(),
                    target: target.to_owned(),
                });
            }
        }
    }
    if types_count > 1 {
        return Err(MetamodelError::DuplicateTypesAttribute {
            type_name: type_name.to_owned(),
        });
    }
    if properties_count > 1 {
        return Err(MetamodelError::DuplicatePropertiesAttribute {
            type_name: type_name.to_owned(),
        });
    }
    Ok(())
}
