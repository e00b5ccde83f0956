use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::mapping::delta::FieldDelta;
use crate::mapping::{compute_delta, extract_entity_axioms, MappingError, ObjectGraphMapper};
use crate::metamodel::attributes::{AttributeKind, FetchType};
use crate::metamodel::types::ManagedType;
use crate::metamodel::Metamodel;
use crate::model::axiom::Axiom;
use crate::model::descriptor::Descriptor;
use crate::model::instance::{FieldState, FieldValue, Instance};
use crate::model::value_objects::NamedResource;

use super::cache::CacheManager;
use super::connector::ConnectorHandle;

/// Transaction lifecycle of a unit of work.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Acquired, no operation performed yet.
    New,
    /// Operations in flight.
    Active,
    /// Commit in progress.
    Committing,
    /// Abort in progress after a failure.
    RollingBack,
    /// Released; no further operations are accepted.
    Closed,
}

/// Local programming errors: fatal to the call, not to the unit of work.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    /// The unit of work has already been committed or rolled back.
    #[error("unit of work is closed")]
    Closed,
    /// A read touched an instance removed in this unit of work.
    #[error("instance `{subject}` was removed in this unit of work")]
    InstanceRemoved { subject: String },
    /// An operation referenced an unregistered instance.
    #[error("instance `{subject}` is not registered in this unit of work")]
    NotRegistered { subject: String },
    /// A new instance collides with an already registered identifier.
    #[error("instance `{subject}` is already registered in this unit of work")]
    AlreadyRegistered { subject: String },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RegistrationState {
    Managed,
    New,
    Removed,
}

#[derive(Clone, Debug)]
struct Registration {
    original: Instance,
    working: Instance,
    descriptor: Descriptor,
    state: RegistrationState,
}

enum StorageOp {
    Insert {
        subject: NamedResource,
        axioms: Vec<Axiom>,
        descriptor: Descriptor,
    },
    Update {
        subject: NamedResource,
        delta: FieldDelta,
        descriptor: Descriptor,
    },
    Delete {
        subject: NamedResource,
        descriptor: Descriptor,
    },
}

#[derive(Default)]
struct CommitPlan {
    operations: Vec<StorageOp>,
    /// Touched types with their inferred flag and the touched identifiers.
    touched: BTreeMap<String, (bool, Vec<NamedResource>)>,
}

/// Per-transaction working set over the shared metamodel, cache and storage
/// collaborator.
///
/// A unit of work owns its working-copy object graph exclusively and is not
/// safe for concurrent use from multiple threads; concurrency happens by
/// acquiring independent units of work.
pub struct UnitOfWork {
    metamodel: Arc<Metamodel>,
    mapper: ObjectGraphMapper,
    connector: Arc<ConnectorHandle>,
    cache: Arc<CacheManager>,
    state: TransactionState,
    registrations: BTreeMap<NamedResource, Registration>,
    loading: BTreeSet<(NamedResource, String)>,
}

impl UnitOfWork {
    pub(crate) fn new(
        metamodel: Arc<Metamodel>,
        connector: Arc<ConnectorHandle>,
        cache: Arc<CacheManager>,
    ) -> Self {
        trace!("unit of work acquired");
        Self {
            mapper: ObjectGraphMapper::new(Arc::clone(&metamodel), Arc::clone(&connector)),
            metamodel,
            connector,
            cache,
            state: TransactionState::New,
            registrations: BTreeMap::new(),
            loading: BTreeSet::new(),
        }
    }

    /// Returns the current transaction state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns whether an instance is registered in this unit of work.
    #[must_use]
    pub fn contains(&self, identifier: &NamedResource) -> bool {
        self.registrations.contains_key(identifier)
    }

    fn ensure_active(&mut self) -> Result<(), UsageError> {
        match self.state {
            TransactionState::New => {
                self.state = TransactionState::Active;
                Ok(())
            }
            TransactionState::Active => Ok(()),
            _ => Err(UsageError::Closed),
        }
    }

    fn register(
        &mut self,
        identifier: NamedResource,
        original: Instance,
        working: Instance,
        descriptor: Descriptor,
        state: RegistrationState,
    ) {
        self.registrations.insert(
            identifier,
            Registration {
                original,
                working,
                descriptor,
                state,
            },
        );
    }

    /// Looks an instance up by identifier.
    ///
    /// The lookup goes through the local registrations, then the shared
    /// cache, then the storage collaborator; a freshly materialized instance
    /// is registered (snapshot plus working copy) before it is returned.
    /// Eagerly fetched object references are materialized along with it.
    pub async fn find(
        &mut self,
        type_name: &str,
        identifier: &NamedResource,
        descriptor: &Descriptor,
    ) -> Result<Option<&Instance>, Error> {
        self.ensure_active()?;
        match self.registrations.get(identifier).map(|r| r.state) {
            Some(RegistrationState::Removed) => {
                return Err(UsageError::InstanceRemoved {
                    subject: identifier.as_str().to_owned(),
                }
                .into())
            }
            Some(_) => {
                let registered = self
                    .registrations
                    .get(identifier)
                    .filter(|r| self.is_instance_of(&r.working, type_name));
                return Ok(registered.map(|r| &r.working));
            }
            None => {}
        }

        let Some(instance) = self.materialize(type_name, identifier, descriptor).await? else {
            return Ok(None);
        };
        self.register(
            identifier.clone(),
            instance.clone(),
            instance,
            descriptor.clone(),
            RegistrationState::Managed,
        );
        self.load_eager_references(identifier).await?;
        Ok(self.registrations.get(identifier).map(|r| &r.working))
    }

    fn is_instance_of(&self, instance: &Instance, type_name: &str) -> bool {
        self.metamodel
            .entity(instance.type_name())
            .map(|entity| entity.is_assignable_to(type_name))
            .unwrap_or(false)
    }

    /// Fetches an instance from the cache or the store without registering
    /// it.
    async fn materialize(
        &mut self,
        type_name: &str,
        identifier: &NamedResource,
        descriptor: &Descriptor,
    ) -> Result<Option<Instance>, Error> {
        for candidate in self.metamodel.assignable_types(type_name) {
            if candidate.is_abstract() {
                continue;
            }
            if let Some(cached) = self.cache.get(candidate.name(), identifier, descriptor) {
                trace!(subject = %identifier, "cache hit");
                return Ok(Some(cached));
            }
        }
        let axioms = self.connector.find_axioms(identifier, descriptor).await?;
        let Some(instance) = self
            .mapper
            .reconstruct(identifier, type_name, descriptor, &axioms)
            .await?
        else {
            return Ok(None);
        };
        self.cache.add(identifier, descriptor, &instance);
        Ok(Some(instance))
    }

    /// Materializes the targets of eagerly fetched reference attributes,
    /// iteratively and cycle-safe through the registration map.
    async fn load_eager_references(&mut self, root: &NamedResource) -> Result<(), Error> {
        let mut queue: VecDeque<(String, NamedResource, Descriptor)> =
            self.reference_targets(root)?.into();
        while let Some((type_name, identifier, descriptor)) = queue.pop_front() {
            if self.registrations.contains_key(&identifier) {
                continue;
            }
            let Some(instance) = self
                .materialize(&type_name, &identifier, &descriptor)
                .await?
            else {
                continue;
            };
            self.register(
                identifier.clone(),
                instance.clone(),
                instance,
                descriptor,
                RegistrationState::Managed,
            );
            queue.extend(self.reference_targets(&identifier)?);
        }
        Ok(())
    }

    fn reference_targets(
        &self,
        identifier: &NamedResource,
    ) -> Result<Vec<(String, NamedResource, Descriptor)>, Error> {
        let Some(registration) = self.registrations.get(identifier) else {
            return Ok(Vec::new());
        };
        let entity_type = self.metamodel.entity(registration.working.type_name())?;
        let mut targets = Vec::new();
        for attribute in entity_type.attributes().values() {
            if attribute.fetch() != FetchType::Eager {
                continue;
            }
            let Some(target) = attribute.target() else {
                continue;
            };
            if !matches!(
                attribute.kind(),
                AttributeKind::Object | AttributeKind::Sequence(_)
            ) {
                continue;
            }
            for resource in field_resources(registration.working.field(attribute.name())) {
                targets.push((
                    target.to_owned(),
                    resource,
                    registration.descriptor.clone(),
                ));
            }
        }
        Ok(targets)
    }

    /// Returns a mutable handle on a registered working copy.
    pub fn get_mut(&mut self, identifier: &NamedResource) -> Result<&mut Instance, Error> {
        self.ensure_active()?;
        let Some(registration) = self.registrations.get_mut(identifier) else {
            return Err(UsageError::NotRegistered {
                subject: identifier.as_str().to_owned(),
            }
            .into());
        };
        if registration.state == RegistrationState::Removed {
            return Err(UsageError::InstanceRemoved {
                subject: identifier.as_str().to_owned(),
            }
            .into());
        }
        Ok(&mut registration.working)
    }

    /// Registers a new instance as a pending insert, generating its
    /// identifier through the storage collaborator when the identifier is
    /// declared as generated.
    pub async fn register_new(
        &mut self,
        mut instance: Instance,
        descriptor: &Descriptor,
    ) -> Result<NamedResource, Error> {
        self.ensure_active()?;
        let entity_type = self.metamodel.entity(instance.type_name())?;
        if entity_type.is_abstract() {
            return Err(MappingError::AbstractInstantiation {
                type_name: entity_type.name().to_owned(),
            }
            .into());
        }

        let identifier = match instance.identifier() {
            Some(identifier) => identifier.clone(),
            None => {
                let generated = entity_type
                    .identifier()
                    .map(|id| id.is_generated())
                    .unwrap_or(false);
                if !generated {
                    return Err(MappingError::MissingIdentifier {
                        type_name: entity_type.name().to_owned(),
                    }
                    .into());
                }
                let minted = self
                    .connector
                    .generate_identifier(entity_type.class_iri())
                    .await?;
                instance.assign_identifier(minted.clone());
                minted
            }
        };
        if self.registrations.contains_key(&identifier) {
            return Err(UsageError::AlreadyRegistered {
                subject: identifier.as_str().to_owned(),
            }
            .into());
        }
        debug!(subject = %identifier, entity_type = entity_type.name(), "registered pending insert");
        self.register(
            identifier.clone(),
            instance.clone(),
            instance,
            descriptor.clone(),
            RegistrationState::New,
        );
        Ok(identifier)
    }

    /// Marks an instance for removal. Later reads of the instance within
    /// this unit of work fail as usage errors.
    pub fn remove(&mut self, identifier: &NamedResource) -> Result<(), Error> {
        self.ensure_active()?;
        let Some(state) = self.registrations.get(identifier).map(|r| r.state) else {
            return Err(UsageError::NotRegistered {
                subject: identifier.as_str().to_owned(),
            }
            .into());
        };
        match state {
            // A pending insert that is removed again never reaches storage.
            RegistrationState::New => {
                self.registrations.remove(identifier);
            }
            RegistrationState::Managed => {
                if let Some(registration) = self.registrations.get_mut(identifier) {
                    registration.state = RegistrationState::Removed;
                }
            }
            RegistrationState::Removed => {}
        }
        Ok(())
    }

    /// Merges a detached instance into this unit of work. The stored state
    /// becomes the comparison snapshot; an unknown identifier degrades to a
    /// pending insert.
    pub async fn merge(
        &mut self,
        instance: Instance,
        descriptor: &Descriptor,
    ) -> Result<NamedResource, Error> {
        self.ensure_active()?;
        let entity_type = self.metamodel.entity(instance.type_name())?;
        let Some(identifier) = instance.identifier().cloned() else {
            return Err(MappingError::MissingIdentifier {
                type_name: entity_type.name().to_owned(),
            }
            .into());
        };

        match self.registrations.get(&identifier).map(|r| r.state) {
            Some(RegistrationState::Removed) => {
                return Err(UsageError::InstanceRemoved {
                    subject: identifier.as_str().to_owned(),
                }
                .into())
            }
            Some(_) => {
                if let Some(registration) = self.registrations.get_mut(&identifier) {
                    registration.working = instance;
                }
                return Ok(identifier);
            }
            None => {}
        }

        let stored = self
            .materialize(instance.type_name(), &identifier, descriptor)
            .await?;
        match stored {
            Some(original) => self.register(
                identifier.clone(),
                original,
                instance,
                descriptor.clone(),
                RegistrationState::Managed,
            ),
            None => self.register(
                identifier.clone(),
                instance.clone(),
                instance,
                descriptor.clone(),
                RegistrationState::New,
            ),
        }
        Ok(identifier)
    }

    /// Registers a lazily materialized proxy: identifier set, every attribute
    /// unloaded, no storage access.
    pub fn get_reference(
        &mut self,
        type_name: &str,
        identifier: &NamedResource,
        descriptor: &Descriptor,
    ) -> Result<&Instance, Error> {
        self.ensure_active()?;
        match self.registrations.get(identifier).map(|r| r.state) {
            Some(RegistrationState::Removed) => {
                return Err(UsageError::InstanceRemoved {
                    subject: identifier.as_str().to_owned(),
                }
                .into())
            }
            Some(_) => {}
            None => {
                let entity_type = self.metamodel.entity(type_name)?;
                if entity_type.is_abstract() {
                    return Err(MappingError::AbstractInstantiation {
                        type_name: entity_type.name().to_owned(),
                    }
                    .into());
                }
                let mut instance = Instance::new(entity_type.name());
                instance.assign_identifier(identifier.clone());
                for attribute in entity_type.attributes().values() {
                    instance.mark_unloaded(attribute.name());
                }
                self.register(
                    identifier.clone(),
                    instance.clone(),
                    instance,
                    descriptor.clone(),
                    RegistrationState::Managed,
                );
            }
        }
        self.registrations
            .get(identifier)
            .map(|r| &r.working)
            .ok_or_else(|| {
                UsageError::NotRegistered {
                    subject: identifier.as_str().to_owned(),
                }
                .into()
            })
    }

    /// Loads one lazily fetched attribute and replaces its unloaded sentinel
    /// in both the working copy and the original snapshot, so the load never
    /// registers as a change.
    ///
    /// The load happens at most once per field; a reentrant trigger on the
    /// same field is a no-op instead of a deadlock.
    pub async fn load_field(
        &mut self,
        identifier: &NamedResource,
        attribute: &str,
    ) -> Result<(), Error> {
        self.ensure_active()?;
        let (type_name, descriptor) = {
            let Some(registration) = self.registrations.get(identifier) else {
                return Err(UsageError::NotRegistered {
                    subject: identifier.as_str().to_owned(),
                }
                .into());
            };
            if registration.state == RegistrationState::Removed {
                return Err(UsageError::InstanceRemoved {
                    subject: identifier.as_str().to_owned(),
                }
                .into());
            }
            if registration.working.is_loaded(attribute) {
                return Ok(());
            }
            (
                registration.working.type_name().to_owned(),
                registration.descriptor.clone(),
            )
        };

        let guard = (identifier.clone(), attribute.to_owned());
        if !self.loading.insert(guard.clone()) {
            return Ok(());
        }
        let result = match self.metamodel.entity(&type_name) {
            Ok(entity_type) => {
                self.mapper
                    .load_field(&entity_type, identifier, attribute, &descriptor)
                    .await
            }
            Err(error) => Err(error.into()),
        };
        self.loading.remove(&guard);
        let state = result?;

        if let Some(registration) = self.registrations.get_mut(identifier) {
            registration.original.set_state(attribute, state.clone());
            registration.working.set_state(attribute, state);
        }
        trace!(subject = %identifier, attribute, "lazy attribute loaded");
        Ok(())
    }

    /// Computes every registered clone's delta and applies inserts, updates
    /// and deletes inside one backend transaction.
    ///
    /// A commit without changes issues no storage calls at all. On storage
    /// failure the unit of work rolls the backend transaction back, discards
    /// its local state and surfaces the original failure; no partial commit
    /// is observable afterwards.
    pub async fn commit(&mut self) -> Result<(), Error> {
        match self.state {
            TransactionState::New | TransactionState::Active => {}
            _ => return Err(UsageError::Closed.into()),
        }
        self.state = TransactionState::Committing;

        let plan = match self.plan_commit() {
            Ok(plan) => plan,
            Err(error) => return self.abort_local(error),
        };
        if plan.operations.is_empty() {
            debug!("commit with no changes, no storage calls issued");
            self.registrations.clear();
            self.state = TransactionState::Closed;
            return Ok(());
        }

        if let Err(error) = self.connector.begin().await {
            return self.abort_local(error.into());
        }
        for operation in &plan.operations {
            let applied = match operation {
                StorageOp::Insert {
                    subject,
                    axioms,
                    descriptor,
                } => {
                    self.connector
                        .persist(subject, axioms.clone(), descriptor)
                        .await
                }
                StorageOp::Update {
                    subject,
                    delta,
                    descriptor,
                } => {
                    self.connector
                        .merge_field(subject, delta.clone(), descriptor)
                        .await
                }
                StorageOp::Delete {
                    subject,
                    descriptor,
                } => self.connector.remove_by_identifier(subject, descriptor).await,
            };
            if let Err(error) = applied {
                return self.abort_with_storage_rollback(error.into()).await;
            }
        }
        if let Err(error) = self.connector.commit().await {
            return self.abort_with_storage_rollback(error.into()).await;
        }

        for (type_name, (has_inferred, subjects)) in &plan.touched {
            if *has_inferred {
                self.cache.evict_type(type_name);
            } else {
                for subject in subjects {
                    self.cache.evict(type_name, subject);
                }
            }
        }
        debug!(operations = plan.operations.len(), "unit of work committed");
        self.registrations.clear();
        self.state = TransactionState::Closed;
        Ok(())
    }

    /// Discards all registered clones without touching storage or cache.
    pub fn rollback(&mut self) -> Result<(), Error> {
        match self.state {
            TransactionState::New | TransactionState::Active => {
                self.registrations.clear();
                self.loading.clear();
                self.state = TransactionState::Closed;
                debug!("unit of work rolled back");
                Ok(())
            }
            _ => Err(UsageError::Closed.into()),
        }
    }

    fn plan_commit(&self) -> Result<CommitPlan, Error> {
        let mut plan = CommitPlan::default();
        for (identifier, registration) in &self.registrations {
            let entity_type = self.metamodel.entity(registration.working.type_name())?;
            match registration.state {
                RegistrationState::New => {
                    self.check_references(&entity_type, &registration.working)?;
                    let axioms = extract_entity_axioms(&entity_type, &registration.working)?;
                    plan.operations.push(StorageOp::Insert {
                        subject: identifier.clone(),
                        axioms,
                        descriptor: registration.descriptor.clone(),
                    });
                    touch(&mut plan, &entity_type, identifier);
                }
                RegistrationState::Removed => {
                    plan.operations.push(StorageOp::Delete {
                        subject: identifier.clone(),
                        descriptor: registration.descriptor.clone(),
                    });
                    touch(&mut plan, &entity_type, identifier);
                }
                RegistrationState::Managed => {
                    let change_set =
                        compute_delta(&entity_type, &registration.original, &registration.working)?;
                    if change_set.is_empty() {
                        continue;
                    }
                    self.check_references(&entity_type, &registration.working)?;
                    for delta in change_set.deltas {
                        plan.operations.push(StorageOp::Update {
                            subject: identifier.clone(),
                            delta,
                            descriptor: registration.descriptor.clone(),
                        });
                    }
                    touch(&mut plan, &entity_type, identifier);
                }
            }
        }
        Ok(plan)
    }

    /// Rejects references to instances removed in this transaction.
    fn check_references(
        &self,
        entity_type: &ManagedType,
        instance: &Instance,
    ) -> Result<(), Error> {
        for attribute in entity_type.attributes().values() {
            if !matches!(
                attribute.kind(),
                AttributeKind::Object | AttributeKind::Sequence(_)
            ) {
                continue;
            }
            for resource in field_resources(instance.field(attribute.name())) {
                if self
                    .registrations
                    .get(&resource)
                    .map(|r| r.state == RegistrationState::Removed)
                    .unwrap_or(false)
                {
                    return Err(MappingError::DanglingReference {
                        attribute: attribute.name().to_owned(),
                        subject: resource.as_str().to_owned(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn abort_local(&mut self, error: Error) -> Result<(), Error> {
        self.state = TransactionState::RollingBack;
        self.registrations.clear();
        self.loading.clear();
        self.state = TransactionState::Closed;
        Err(error)
    }

    async fn abort_with_storage_rollback(&mut self, error: Error) -> Result<(), Error> {
        self.state = TransactionState::RollingBack;
        if let Err(rollback_error) = self.connector.rollback().await {
            warn!(error = %rollback_error, "storage rollback failed after commit failure");
        }
        self.registrations.clear();
        self.loading.clear();
        self.state = TransactionState::Closed;
        Err(error)
    }
}

fn touch(plan: &mut CommitPlan, entity_type: &ManagedType, identifier: &NamedResource) {
    let entry = plan
        .touched
        .entry(entity_type.name().to_owned())
        .or_insert_with(|| (entity_type.has_inferred_attributes(), Vec::new()));
    entry.1.push(identifier.clone());
}

fn field_resources(state: &FieldState) -> Vec<NamedResource> {
    match state {
        FieldState::Present(FieldValue::Scalar(value)) => {
            value.as_resource().cloned().into_iter().collect()
        }
        FieldState::Present(FieldValue::Set(values)) => values
            .iter()
            .filter_map(|value| value.as_resource().cloned())
            .collect(),
        FieldState::Present(FieldValue::List(values)) => values
            .iter()
            .filter_map(|value| value.as_resource().cloned())
            .collect(),
        _ => Vec::new(),
    }
}
