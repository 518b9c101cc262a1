use std::collections::{BTreeSet, HashMap};

use super::protocol::{FieldId, FieldUpdate, FieldValue};
use super::role::ConnectionId;
use crate::world::{EntityId, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicationScope {
    All,
    OwnerOnly,
    SkipOwner,
    /// Sent to everyone while the field's condition holds.
    Custom,
}

pub type ReplicationCondition<T> = fn(&T, f32) -> bool;

/// One row of a type's replicated-field manifest.
pub struct FieldSpec<T> {
    pub field: FieldId,
    pub scope: ReplicationScope,
    pub condition: Option<ReplicationCondition<T>>,
}

impl<T> FieldSpec<T> {
    pub fn admits(&self, entity: &T, viewer_is_owner: bool, now: f32) -> bool {
        let in_scope = match self.scope {
            ReplicationScope::All | ReplicationScope::Custom => true,
            ReplicationScope::OwnerOnly => viewer_is_owner,
            ReplicationScope::SkipOwner => !viewer_is_owner,
        };
        in_scope && self.condition.is_none_or(|condition| condition(entity, now))
    }
}

pub trait Replicable: Sized + 'static {
    const KIND: EntityKind;

    fn manifest() -> &'static [FieldSpec<Self>];

    /// Archetype sent with the spawn record so observers can build a mirror.
    fn archetype(&self) -> u16;

    fn read_field(&self, field: FieldId) -> Option<FieldValue>;

    /// Stores a replicated value. Returns false when the field or value
    /// shape does not belong to this type.
    fn write_field(&mut self, field: FieldId, value: &FieldValue) -> bool;
}

pub fn collect_fields<T: Replicable>(entity: &T, viewer_is_owner: bool, now: f32) -> Vec<FieldUpdate> {
    T::manifest()
        .iter()
        .filter(|spec| spec.admits(entity, viewer_is_owner, now))
        .filter_map(|spec| {
            entity.read_field(spec.field).map(|value| FieldUpdate {
                field: spec.field,
                value,
            })
        })
        .collect()
}

/// What one viewer has already been sent.
#[derive(Debug, Default)]
pub struct ViewerBaseline {
    known: BTreeSet<EntityId>,
    sent: HashMap<(EntityId, FieldId), FieldValue>,
}

impl ViewerBaseline {
    pub fn knows(&self, entity: EntityId) -> bool {
        self.known.contains(&entity)
    }

    pub fn introduce(&mut self, entity: EntityId) {
        self.known.insert(entity);
    }

    pub fn known(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.known.iter().copied()
    }

    /// Keeps only the fields whose value differs from what the viewer holds.
    pub fn diff(&mut self, entity: EntityId, fields: Vec<FieldUpdate>) -> Vec<FieldUpdate> {
        fields
            .into_iter()
            .filter(|update| {
                let key = (entity, update.field);
                if self.sent.get(&key) == Some(&update.value) {
                    return false;
                }
                self.sent.insert(key, update.value.clone());
                true
            })
            .collect()
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.known.remove(&entity);
        self.sent.retain(|(id, _), _| *id != entity);
    }
}

/// Per-viewer baselines kept by the authority.
#[derive(Debug, Default)]
pub struct Replicator {
    viewers: HashMap<ConnectionId, ViewerBaseline>,
}

impl Replicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_viewer(&mut self, viewer: ConnectionId) {
        self.viewers.entry(viewer).or_default();
    }

    pub fn remove_viewer(&mut self, viewer: ConnectionId) {
        self.viewers.remove(&viewer);
    }

    pub fn viewers(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.viewers.keys().copied()
    }

    pub fn baseline_mut(&mut self, viewer: ConnectionId) -> &mut ViewerBaseline {
        self.viewers.entry(viewer).or_default()
    }
}
