//! Event-driven bounding-sphere visibility.
//!
//! Entities are registered once with a bounding sphere. Each `cull` compares
//! the sphere against the camera frustum and reports only state changes, so
//! consumers keep their visible sets in sync without rescanning everything.

use std::collections::BTreeMap;

use murk_render::{Frustum, Sphere};

use crate::entity::EntityId;

/// What a culling entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CullTarget {
    Light(EntityId),
    Volume(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityEvent {
    Entered(CullTarget),
    Exited(CullTarget),
}

#[derive(Debug, Clone, Copy)]
struct CullEntry {
    sphere: Sphere,
    visible: bool,
}

/// Brute-force sphere culler. Every registered entity starts invisible, so
/// the first `cull` after registration reports `Entered` for those in view.
#[derive(Debug, Default)]
pub struct VisibilityCuller {
    entries: BTreeMap<CullTarget, CullEntry>,
}

impl VisibilityCuller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an entity's bounding sphere. Replacing keeps the
    /// last known visibility.
    pub fn register(&mut self, target: CullTarget, sphere: Sphere) {
        self.entries
            .entry(target)
            .and_modify(|e| e.sphere = sphere)
            .or_insert(CullEntry {
                sphere,
                visible: false,
            });
    }

    /// Move an already registered entity. Returns `false` if unknown.
    pub fn update_sphere(&mut self, target: CullTarget, sphere: Sphere) -> bool {
        match self.entries.get_mut(&target) {
            Some(entry) => {
                entry.sphere = sphere;
                true
            }
            None => false,
        }
    }

    /// Remove an entity, returning whether it was visible.
    pub fn unregister(&mut self, target: CullTarget) -> Option<bool> {
        self.entries.remove(&target).map(|e| e.visible)
    }

    /// Test every sphere and report transitions since the previous call.
    pub fn cull(&mut self, frustum: &Frustum) -> Vec<VisibilityEvent> {
        let mut events = Vec::new();
        for (target, entry) in &mut self.entries {
            let visible = frustum.intersects_sphere(&entry.sphere);
            if visible != entry.visible {
                entry.visible = visible;
                events.push(if visible {
                    VisibilityEvent::Entered(*target)
                } else {
                    VisibilityEvent::Exited(*target)
                });
            }
        }
        if !events.is_empty() {
            log::trace!("Culling produced {} visibility events", events.len());
        }
        events
    }

    pub fn is_visible(&self, target: CullTarget) -> bool {
        self.entries.get(&target).is_some_and(|e| e.visible)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detach everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
