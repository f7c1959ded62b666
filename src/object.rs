//! Object registry
//!
//! Stationary room elements (doors, switches, tombs, guns...) live in a
//! bounded, ordered table. The scheduler walks it by position; picked
//! objects are removed by moving the last object into the freed position.
//! References that must outlive a compaction use an `ObjectId`, which carries
//! a generation and stops resolving once its object has been removed.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Maximum number of objects in a room
pub const MAX_OBJECTS: usize = 32;

/// Object kind tags
pub struct ObjectKind;

impl ObjectKind {
    pub const DOOR: u8 = 0;
    pub const DOOR_BUTTON: u8 = 1;
    pub const LIGHTNING_POLE: u8 = 2;
    pub const LIGHTNING_SWITCH: u8 = 3;
    pub const FORCEFIELD_TIMER: u8 = 4;
    pub const MUMMY_TOMB: u8 = 5;
    pub const KEY: u8 = 6;
    pub const DOOR_LOCK: u8 = 7;
    pub const RAYGUN: u8 = 8;
    pub const RAYGUN_CONTROL: u8 = 9;
    pub const TELEPORT: u8 = 10;
    pub const TRAPDOOR: u8 = 11;
    pub const TRAPDOOR_SWITCH: u8 = 12;
    pub const CONVEYOR: u8 = 13;
    pub const CONVEYOR_CONTROL: u8 = 14;
    pub const FRANKIE_COFFIN: u8 = 15;
}

/// Object flag bits
pub struct ObjectFlags;

impl ObjectFlags {
    /// Execute hook runs every tick while set
    pub const EXECUTE: u8 = 0x80;
    /// Removed from the room at the end of this tick
    pub const PICKED: u8 = 0x40;
    /// Not drawn and not collidable
    pub const DISABLE: u8 = 0x20;
}

/// One stationary object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// Kind tag (`ObjectKind`)
    pub kind: u8,

    /// Flag bits (`ObjectFlags`)
    pub flags: u8,

    /// Image currently drawn for the object
    pub gfx: u8,

    pub x: u8,
    pub y: u8,

    /// Collision box, width in pixels (image bytes * 4)
    pub width: u8,
    pub height: u8,

    /// Linked index or record offset, depending on kind
    pub id: u8,

    /// Kind-specific state
    pub state: u8,

    /// Kind-specific phase counter
    pub phase: u8,

    pub dest_x: u8,
    pub dest_y: u8,

    pub color: u8,

    /// Full address of the object's record (teleports)
    pub record: u16,
}

impl Object {
    /// A freshly created object: disabled and otherwise empty
    pub fn new(kind: u8) -> Self {
        Object {
            kind,
            flags: ObjectFlags::DISABLE,
            ..Default::default()
        }
    }

    #[inline]
    pub fn has(&self, bits: u8) -> bool {
        self.flags & bits != 0
    }
}

/// Stable reference to an object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    slot: u16,
    generation: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Slot {
    object: Option<Object>,
    generation: u32,
}

/// Ordered, bounded object table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectRegistry {
    /// Storage, indexed by `ObjectId::slot`
    slots: Vec<Slot>,

    /// Scheduling order; each entry is a storage slot
    order: Vec<u16>,
}

impl ObjectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        ObjectRegistry {
            slots: (0..MAX_OBJECTS).map(|_| Slot::default()).collect(),
            order: Vec::with_capacity(MAX_OBJECTS),
        }
    }

    /// Discard every object; outstanding ids stop resolving
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            if slot.object.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.order.clear();
    }

    /// Append an object, returning its position
    ///
    /// Returns `None` when the room already holds `MAX_OBJECTS` objects.
    pub fn create(&mut self, object: Object) -> Option<usize> {
        if self.order.len() >= MAX_OBJECTS {
            warn!("Object registry full, kind {} not created", object.kind);
            return None;
        }

        let slot = self.slots.iter().position(|s| s.object.is_none())?;
        self.slots[slot].object = Some(object);
        self.order.push(slot as u16);
        Some(self.order.len() - 1)
    }

    /// Remove the object at `position`, moving the last object into its place
    pub fn remove_at(&mut self, position: usize) -> Option<Object> {
        if position >= self.order.len() {
            return None;
        }

        let slot = self.order.swap_remove(position) as usize;
        let removed = self.slots[slot].object.take();
        self.slots[slot].generation = self.slots[slot].generation.wrapping_add(1);
        debug!("Object at {} removed, {} remain", position, self.order.len());
        removed
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stable id of the object at `position`
    pub fn id_at(&self, position: usize) -> Option<ObjectId> {
        let slot = *self.order.get(position)?;
        Some(ObjectId {
            slot,
            generation: self.slots[slot as usize].generation,
        })
    }

    /// Current position of an object, if it still exists
    pub fn position_of(&self, id: ObjectId) -> Option<usize> {
        self.get(id)?;
        self.order.iter().position(|&slot| slot == id.slot)
    }

    /// Resolve an id
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        let slot = self.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        let slot = self.slots.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Object at a scheduling position
    pub fn at(&self, position: usize) -> Option<&Object> {
        let slot = *self.order.get(position)?;
        self.slots[slot as usize].object.as_ref()
    }

    pub fn at_mut(&mut self, position: usize) -> Option<&mut Object> {
        let slot = *self.order.get(position)?;
        self.slots[slot as usize].object.as_mut()
    }

    /// First object of a kind carrying an id
    pub fn find(&self, kind: u8, id: u8) -> Option<ObjectId> {
        (0..self.len()).find_map(|position| {
            let object = self.at(position)?;
            if object.kind == kind && object.id == id {
                self.id_at(position)
            } else {
                None
            }
        })
    }

    /// Objects in scheduling order
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.order
            .iter()
            .filter_map(move |&slot| self.slots[slot as usize].object.as_ref())
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u8) -> Object {
        Object {
            id,
            ..Object::new(ObjectKind::KEY)
        }
    }

    #[test]
    fn created_objects_start_disabled() {
        let mut objects = ObjectRegistry::new();
        let position = objects.create(Object::new(ObjectKind::DOOR)).unwrap();
        assert_eq!(objects.at(position).unwrap().flags, ObjectFlags::DISABLE);
    }

    #[test]
    fn capacity_refusal_leaves_registry_unchanged() {
        let mut objects = ObjectRegistry::new();
        for n in 0..MAX_OBJECTS {
            assert_eq!(objects.create(key(n as u8)), Some(n));
        }
        assert_eq!(objects.create(key(0xFF)), None);
        assert_eq!(objects.len(), MAX_OBJECTS);
        assert!(objects.iter().all(|o| o.id != 0xFF));
    }

    #[test]
    fn removal_moves_last_into_place() {
        let mut objects = ObjectRegistry::new();
        for n in 0..4 {
            objects.create(key(n));
        }
        objects.remove_at(1);

        let ids: Vec<u8> = objects.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![0, 3, 2]);
    }

    #[test]
    fn stale_id_does_not_resolve() {
        let mut objects = ObjectRegistry::new();
        objects.create(key(1));
        objects.create(key(2));
        let first = objects.id_at(0).unwrap();
        let second = objects.id_at(1).unwrap();

        objects.remove_at(0);
        assert!(objects.get(first).is_none());
        assert_eq!(objects.position_of(second), Some(0));

        // The freed slot is reused, the old id still fails
        objects.create(key(3));
        assert!(objects.get(first).is_none());
        assert_eq!(objects.find(ObjectKind::KEY, 3).and_then(|id| objects.get(id)).map(|o| o.id), Some(3));
    }

    #[test]
    fn freed_positions_are_reusable() {
        let mut objects = ObjectRegistry::new();
        for n in 0..MAX_OBJECTS {
            objects.create(key(n as u8));
        }
        objects.remove_at(5);
        objects.remove_at(9);
        assert!(objects.create(key(0x40)).is_some());
        assert!(objects.create(key(0x41)).is_some());
        assert!(objects.create(key(0x42)).is_none());
    }
}
