//! The object table: id-indexed arena over units and buildings.
//!
//! Ids are `u32`, assigned sequentially starting at 1 and never reused
//! within a match. Cross-object references ("pointers") are stored as
//! ids and resolved lazily each tick; a lookup miss means the referent
//! is gone. Deletion is two-phase: deaths discovered while iterating
//! are queued and only freed at a fixed point later in the tick, so
//! live iteration is never invalidated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::buildings::Building;
use crate::units::Unit;

/// Unique object identifier. Never reused within a match.
pub type ObjectId = u32;

/// Owner index of the neutral "gaia" pseudo-player (trees, mines,
/// forage bushes).
pub const GAIA_PLAYER_INDEX: u8 = 0xFF;

/// Object payload: unit or building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A mobile unit.
    Unit(Unit),
    /// A building (including gaia resource nodes).
    Building(Building),
}

/// A live game object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameObject {
    /// Unique id.
    pub id: ObjectId,
    /// Owning player index, or [`GAIA_PLAYER_INDEX`].
    pub player: u8,
    /// Hit points. Float-backed; clients see the rounded value.
    pub hp: f32,
    /// Unit or building payload.
    pub kind: ObjectKind,
}

impl GameObject {
    /// HP as shown to clients: rounded, never negative.
    #[must_use]
    pub fn displayed_hp(&self) -> u32 {
        if self.hp <= 0.0 {
            0
        } else {
            self.hp.round() as u32
        }
    }

    /// Whether this object is a unit.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self.kind, ObjectKind::Unit(_))
    }

    /// Unit payload, if any.
    #[must_use]
    pub const fn as_unit(&self) -> Option<&Unit> {
        match &self.kind {
            ObjectKind::Unit(unit) => Some(unit),
            ObjectKind::Building(_) => None,
        }
    }

    /// Mutable unit payload, if any.
    pub fn as_unit_mut(&mut self) -> Option<&mut Unit> {
        match &mut self.kind {
            ObjectKind::Unit(unit) => Some(unit),
            ObjectKind::Building(_) => None,
        }
    }

    /// Building payload, if any.
    #[must_use]
    pub const fn as_building(&self) -> Option<&Building> {
        match &self.kind {
            ObjectKind::Building(building) => Some(building),
            ObjectKind::Unit(_) => None,
        }
    }

    /// Mutable building payload, if any.
    pub fn as_building_mut(&mut self) -> Option<&mut Building> {
        match &mut self.kind {
            ObjectKind::Building(building) => Some(building),
            ObjectKind::Unit(_) => None,
        }
    }
}

/// Storage for all objects in a match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectTable {
    objects: HashMap<ObjectId, GameObject>,
    next_id: ObjectId,
    /// Ids queued for removal at the end of the current tick.
    pending_deletes: Vec<ObjectId>,
}

impl ObjectTable {
    /// Create an empty table. The first assigned id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_id: 1,
            pending_deletes: Vec::new(),
        }
    }

    /// Insert a new object and return its id.
    pub fn insert(&mut self, player: u8, hp: f32, kind: ObjectKind) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(
            id,
            GameObject {
                id,
                player,
                hp,
                kind,
            },
        );
        id
    }

    /// Get an object by id.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Get a mutable reference to an object by id.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Check if an object exists.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sorted object ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.objects.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all objects (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    /// Queue an object for removal at the end of the tick.
    ///
    /// Queuing the same id twice is a no-op, so a death can never be
    /// processed more than once.
    pub fn schedule_delete(&mut self, id: ObjectId) {
        if self.objects.contains_key(&id) && !self.pending_deletes.contains(&id) {
            self.pending_deletes.push(id);
        }
    }

    /// Whether an object is queued for deletion.
    #[must_use]
    pub fn is_delete_pending(&self, id: ObjectId) -> bool {
        self.pending_deletes.contains(&id)
    }

    /// Take the queued deletions, leaving the queue empty.
    pub fn take_pending_deletes(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.pending_deletes)
    }

    /// Remove an object immediately. Prefer [`schedule_delete`] during
    /// iteration.
    ///
    /// [`schedule_delete`]: Self::schedule_delete
    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }
}
