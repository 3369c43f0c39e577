//! Occupant identities.
//!
//! The grid never owns the things standing on it. Cells and tracking maps
//! store an [`OccupantId`], a generational handle into an [`OccupantArena`].
//! When an occupant is removed its slot's generation is bumped, so every
//! handle still floating around in the grid becomes *dangling* and is
//! recognised as "destroyed" by the coherence pass.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Opaque, copyable identity of a unit or building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccupantId {
    index: u32,
    generation: u32,
}

impl OccupantId {
    /// Build a handle from raw parts.
    ///
    /// Mostly useful in tests and for hosts that manage their own identities.
    #[must_use]
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the arena.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for OccupantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// What an occupant is, as far as the grid cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupantKind {
    /// Single-cell mobile or static unit.
    Unit,
    /// Multi-cell building.
    Building,
}

/// Answers whether an occupant handle still refers to something alive.
///
/// The coherence pass depends on this instead of on any particular entity
/// store.
pub trait Liveness {
    /// True if `id` refers to a live occupant.
    fn is_alive(&self, id: OccupantId) -> bool;
}

impl Liveness for BTreeSet<OccupantId> {
    fn is_alive(&self, id: OccupantId) -> bool {
        self.contains(&id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    kind: Option<OccupantKind>,
}

/// Generational arena handing out [`OccupantId`]s.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OccupantArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl OccupantArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new occupant identity.
    ///
    /// Freed slots are reused most-recently-freed first, with their
    /// generation already bumped by [`remove`](Self::remove).
    pub fn insert(&mut self, kind: OccupantKind) -> OccupantId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.kind = Some(kind);
            return OccupantId::from_raw(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            kind: Some(kind),
        });
        OccupantId::from_raw(index, 0)
    }

    /// Destroy an occupant. Returns its kind, or `None` if already dead.
    pub fn remove(&mut self, id: OccupantId) -> Option<OccupantKind> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let kind = slot.kind.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(kind)
    }

    /// Kind of a live occupant.
    #[must_use]
    pub fn kind(&self, id: OccupantId) -> Option<OccupantKind> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.kind)
    }

    /// Number of live occupants.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// True if no occupant is alive.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live occupant ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (OccupantId, OccupantKind)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.kind
                .map(|kind| (OccupantId::from_raw(index as u32, slot.generation), kind))
        })
    }
}

impl Liveness for OccupantArena {
    fn is_alive(&self, id: OccupantId) -> bool {
        self.kind(id).is_some()
    }
}
