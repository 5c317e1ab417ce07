//! # Structural change events
//!
//! The [`EventRecorder`] keeps one append-only [`EntityEvents`] log per
//! `(EventKind, EventAction)` pair while enabled. An [`EventFilter`] answers
//! "did entity `E` see one of these changes" in `O(1)` per registered change.
//!
//! ## Materialization
//! Each log folds its entries into an `entity -> TypeSet` map lazily, up to a
//! watermark. A filter only asks the recorder to fold new entries when the
//! recorder's version moved since the filter's last check, so a burst of
//! `has_event` calls inside one epoch pays for the fold once.
//!
//! ## Matching
//! A registered change matches when the entity's folded bitset has the type
//! **and** the entity's current state agrees with the change direction: an
//! added change needs the component / tag to be present now, a removed change
//! needs it to be absent now. Adding and then removing a component within one
//! epoch therefore reports no "added" event.

use std::any::type_name;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::engine::component::Schema;
use crate::engine::store::EntityStore;
use crate::engine::types::{EntityId, TypeSet};

/// Direction of a structural change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventAction {
    Added,
    Removed,
}

/// Whether a change concerns a component or a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Component,
    Tag,
}

/// One logged change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityEvent {
    pub entity: EntityId,
    pub type_index: u16,
}

/// Append-only log of one kind of change and its per-entity projection.
#[derive(Debug, Default)]
pub struct EntityEvents {
    events: Vec<EntityEvent>,
    changes: FxHashMap<EntityId, TypeSet>,
    watermark: usize,
}

impl EntityEvents {
    fn record(&mut self, entity: EntityId, type_index: u16) {
        if self.events.len() == self.events.capacity() {
            self.events.reserve(self.events.len().max(16));
        }
        self.events.push(EntityEvent { entity, type_index });
    }

    /// Logged changes in recording order.
    pub fn events(&self) -> &[EntityEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of log entries already folded into the per-entity map.
    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// Folds entries past the watermark into the per-entity map.
    pub fn materialize(&mut self) {
        for event in &self.events[self.watermark..] {
            self.changes.entry(event.entity).or_default().set(event.type_index);
        }
        self.watermark = self.events.len();
    }

    /// Types changed for `entity`, as of the watermark.
    pub fn changed_types(&self, entity: EntityId) -> Option<&TypeSet> {
        self.changes.get(&entity)
    }

    fn clear(&mut self) {
        self.events.clear();
        self.changes.clear();
        self.watermark = 0;
    }
}

static NEXT_RECORDER_ID: AtomicU64 = AtomicU64::new(1);

/// Records component and tag additions and removals while enabled.
#[derive(Debug)]
pub struct EventRecorder {
    id: u64,
    enabled: bool,
    logs: [EntityEvents; 4],
    version: u64,
}

#[inline]
fn slot(kind: EventKind, action: EventAction) -> usize {
    match (kind, action) {
        (EventKind::Component, EventAction::Added) => 0,
        (EventKind::Component, EventAction::Removed) => 1,
        (EventKind::Tag, EventAction::Added) => 2,
        (EventKind::Tag, EventAction::Removed) => 3,
    }
}

impl EventRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            id: NEXT_RECORDER_ID.fetch_add(1, Ordering::Relaxed),
            enabled,
            logs: Default::default(),
            version: 0,
        }
    }

    /// Identity of this recorder, unique within the process.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Starts or stops recording. No-op if already in the requested state.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Appends a change if recording is enabled.
    #[inline]
    pub fn record(&mut self, kind: EventKind, action: EventAction, entity: EntityId, type_index: u16) {
        if !self.enabled {
            return;
        }
        self.logs[slot(kind, action)].record(entity, type_index);
        self.version += 1;
    }

    /// Log of one kind of change.
    pub fn log(&self, kind: EventKind, action: EventAction) -> &EntityEvents {
        &self.logs[slot(kind, action)]
    }

    /// Total number of logged changes in the current epoch.
    pub fn all_events_count(&self) -> usize {
        self.logs.iter().map(EntityEvents::len).sum()
    }

    /// Monotonic counter advanced by every recorded change and every clear.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Folds every log up to its end.
    pub fn materialize(&mut self) {
        for log in &mut self.logs {
            log.materialize();
        }
    }

    /// Drops all logs and projections, starting a new epoch.
    pub fn clear(&mut self) {
        for log in &mut self.logs {
            log.clear();
        }
        self.version += 1;
    }
}

/// A change an [`EventFilter`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventTrigger {
    pub type_index: u16,
    pub kind: EventKind,
    pub action: EventAction,
}

/// Set of changes to watch for.
///
/// A filter remembers which recorder and version it last folded, so it may
/// be used with several stores.
///
/// ## Example
/// ```ignore
/// let mut filter = EventFilter::new(schema.clone())
///     .component_added::<Position>()
///     .tag_removed::<Sleeping>();
/// if filter.has_event(&mut store, entity) { /* ... */ }
/// ```
#[derive(Debug)]
pub struct EventFilter {
    schema: Arc<Schema>,
    triggers: Vec<EventTrigger>,
    seen: Option<(u64, u64)>,
}

impl EventFilter {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema, triggers: Vec::new(), seen: None }
    }

    /// Registered changes.
    pub fn triggers(&self) -> &[EventTrigger] {
        &self.triggers
    }

    /// Watches additions of component `T`.
    ///
    /// ## Panics
    /// Panics if `T` is not a registered component.
    #[must_use]
    pub fn component_added<T: 'static>(self) -> Self {
        let id = self.component::<T>();
        self.watch(id, EventKind::Component, EventAction::Added)
    }

    /// Watches removals of component `T`.
    #[must_use]
    pub fn component_removed<T: 'static>(self) -> Self {
        let id = self.component::<T>();
        self.watch(id, EventKind::Component, EventAction::Removed)
    }

    /// Watches additions of tag `T`.
    #[must_use]
    pub fn tag_added<T: 'static>(self) -> Self {
        let id = self.tag::<T>();
        self.watch(id, EventKind::Tag, EventAction::Added)
    }

    /// Watches removals of tag `T`.
    #[must_use]
    pub fn tag_removed<T: 'static>(self) -> Self {
        let id = self.tag::<T>();
        self.watch(id, EventKind::Tag, EventAction::Removed)
    }

    fn component<T: 'static>(&self) -> u16 {
        self.schema
            .component_id::<T>()
            .unwrap_or_else(|| panic!("component `{}` is not registered", type_name::<T>()))
    }

    fn tag<T: 'static>(&self) -> u16 {
        self.schema
            .tag_id::<T>()
            .unwrap_or_else(|| panic!("tag `{}` is not registered", type_name::<T>()))
    }

    fn watch(mut self, type_index: u16, kind: EventKind, action: EventAction) -> Self {
        let trigger = EventTrigger { type_index, kind, action };
        if !self.triggers.contains(&trigger) {
            self.triggers.push(trigger);
        }
        self
    }

    /// Returns `true` if `entity` saw one of the registered changes in the
    /// current epoch and its present state still agrees with it.
    pub fn has_event(&mut self, store: &mut EntityStore, entity: EntityId) -> bool {
        let seen = (store.events().id(), store.events().version());
        if self.seen != Some(seen) {
            store.events_mut().materialize();
            self.seen = Some(seen);
        }

        let recorder = store.events();
        self.triggers.iter().any(|trigger| {
            let logged = recorder
                .log(trigger.kind, trigger.action)
                .changed_types(entity)
                .map_or(false, |types| types.has(trigger.type_index));
            if !logged {
                return false;
            }
            let present = match trigger.kind {
                EventKind::Component => store.has_component_id(entity, trigger.type_index),
                EventKind::Tag => store.has_tag_id(entity, trigger.type_index),
            };
            match trigger.action {
                EventAction::Added => present,
                EventAction::Removed => !present,
            }
        })
    }
}
