//! Doors, door bells and locks
//!
//! Door record (8 bytes): x, y, flags (0x80 open), destination room,
//! destination door, two unused bytes, exit flag (non-zero: leaving through
//! this door escapes the castle). The stream stores a count byte before the
//! records.

use log::debug;

use super::player::player_at;
use super::{find_object, reach, ObjectBehavior};
use crate::castle::PlayerState;
use crate::draw::{draw_image, erase_image};
use crate::engine::{Effect, Engine};
use crate::memory::Memory;
use crate::object::{Object, ObjectFlags, ObjectKind};
use crate::sprite::SpriteData;

const RECORD_SIZE: u16 = 8;

/// Record flag: door is open
pub const OPEN: u8 = 0x80;

/// Room record flag: visited
const VISITED: u8 = 0x80;

/// Door frame image per exit flag
const FRAME_IMAGES: u16 = 0x41D1;

const IMAGE_CLOSED: u8 = 0x07;
const IMAGE_OPEN: u8 = 0x08;
const IMAGE_BUTTON: u8 = 0x09;
const IMAGE_LOCK: u8 = 0x58;

/// Slice of the door erased per opening step
const IMAGE_SLICE: u8 = 0x7C;

/// Image patches
const DOOR_COLOR: u16 = 0x6390;
const BUTTON_COLOR: u16 = 0x63D2;
const BUTTON_LAMP: u16 = 0x63D6;
const LOCK_COLOR: u16 = 0x6C53;

const DOOR_PITCH: u16 = 0x75B7;

/// Opening animation length
const OPENING_STEPS: u8 = 0x0E;

pub struct Door;

impl ObjectBehavior for Door {
    fn execute(&self, engine: &mut Engine, object: usize) {
        let Some(door) = engine.objects.at(object).copied() else {
            return;
        };

        let mut steps = door.phase;
        if door.state == 0 {
            steps = OPENING_STEPS;
            if let Some(o) = engine.objects.at_mut(object) {
                o.state = 1;
                o.phase = steps;
            }
            open_record(engine, door.id);
        }

        engine.memory.write(DOOR_PITCH, 0x10u8.wrapping_sub(steps));
        engine.play_effect(Effect::DOOR);

        if steps != 0 {
            if let Some(o) = engine.objects.at_mut(object) {
                o.phase = steps - 1;
            }
            erase_image(&mut engine.memory, IMAGE_SLICE, door.x, door.y.wrapping_add(steps));
            return;
        }

        engine.clear_object_flags(object, ObjectFlags::EXECUTE);
        engine.memory.fill(DOOR_COLOR, 6, door.color);
        engine.draw_object(object, IMAGE_OPEN, door.x, door.y);
    }

    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(door) = engine.objects.at(object).copied() else {
            return;
        };
        if door.state == 0 {
            return;
        }
        let Some(player) = player_at(engine, slot) else {
            return;
        };
        if player.joystick != 1 {
            return;
        }
        let number = player.number as usize;
        if engine.memory.player_state(number) != PlayerState::ALIVE {
            return;
        }

        engine.memory.set_player_state(number, PlayerState::ENTERING);

        let record = record_address(engine, door.id);
        let sprite = &mut engine.sprites[slot];
        sprite.period = 3;
        sprite.y = engine.memory.read(record.wrapping_add(1)).wrapping_add(0x0F);
        sprite.x = engine.memory.read(record).wrapping_add(6);
        if let SpriteData::Player(data) = &mut sprite.data {
            data.walk_step = 0;
        }

        if engine.memory.read(record.wrapping_add(7)) != 0 {
            engine.memory.set_escaped(number, true);
        }

        let room = engine.memory.read(record.wrapping_add(3));
        let entry = engine.memory.read(record.wrapping_add(4));
        engine.memory.set_bits(Memory::room_address(room), VISITED);
        engine.memory.set_current_room(number, room);
        engine.memory.set_current_door(number, entry);
        debug!("Player {} leaves for room {:02X} door {}", number, room, entry);
    }
}

fn record_address(engine: &Engine, id: u8) -> u16 {
    engine.room.doors.wrapping_add((id as u16) * RECORD_SIZE)
}

/// Mark a door open, along with the door it leads to
fn open_record(engine: &mut Engine, id: u8) {
    let record = record_address(engine, id);
    engine.memory.set_bits(record.wrapping_add(2), OPEN);

    let room = engine.memory.read(record.wrapping_add(3));
    let entry = engine.memory.read(record.wrapping_add(4));
    let table = engine.memory.read_word(Memory::room_address(room).wrapping_add(4));
    let target = table.wrapping_add(1).wrapping_add((entry as u16) * RECORD_SIZE);
    engine.memory.set_bits(target.wrapping_add(2), OPEN);
}

/// Parse the door records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    let count = engine.memory.read(ptr);
    ptr = ptr.wrapping_add(1);
    engine.room.doors = ptr;

    for id in 0..count {
        let x = engine.memory.read(ptr);
        let y = engine.memory.read(ptr.wrapping_add(1));
        let flags = engine.memory.read(ptr.wrapping_add(2));
        let room = engine.memory.read(ptr.wrapping_add(3));
        let exit = engine.memory.read(ptr.wrapping_add(7));

        let frame = engine.memory.read(FRAME_IMAGES.wrapping_add(exit as u16));
        draw_image(&mut engine.memory, frame, x, y);

        let nibble = engine.memory.read(Memory::room_address(room)) & 0x0F;
        let color = (nibble << 4) | nibble;
        let open = flags & OPEN != 0;

        if let Some(door) = engine.objects.create(Object {
            id,
            color,
            state: open as u8,
            ..Object::new(ObjectKind::DOOR)
        }) {
            let gfx = if open {
                engine.memory.fill(DOOR_COLOR.wrapping_add(1), 5, color);
                IMAGE_OPEN
            } else {
                IMAGE_CLOSED
            };
            engine.draw_object(door, gfx, x.wrapping_add(4), y.wrapping_add(0x10));
        }

        ptr = ptr.wrapping_add(RECORD_SIZE);
    }

    ptr
}

pub struct Button;

impl ObjectBehavior for Button {
    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(player) = player_at(engine, slot) else {
            return;
        };
        if !player.button || reach(engine, slot, object) >= 0x0C {
            return;
        }
        if engine.memory.player_state(player.number as usize) != PlayerState::ALIVE {
            return;
        }
        let Some(door_id) = engine.objects.at(object).map(|o| o.id) else {
            return;
        };
        open_door(engine, door_id);
    }
}

/// Start opening a closed door
fn open_door(engine: &mut Engine, id: u8) {
    let Some(door) = find_object(engine, ObjectKind::DOOR, id) else {
        debug!("No door {} in room", id);
        return;
    };
    if engine.objects.at(door).is_some_and(|o| o.state == 0) {
        engine.set_object_flags(door, ObjectFlags::EXECUTE);
    }
}

/// Parse the door bell records
pub fn load_buttons(engine: &mut Engine, mut ptr: u16) -> u16 {
    let count = engine.memory.read(ptr);
    ptr = ptr.wrapping_add(1);

    for _ in 0..count {
        let x = engine.memory.read(ptr);
        let y = engine.memory.read(ptr.wrapping_add(1));
        let id = engine.memory.read(ptr.wrapping_add(2));

        if let Some(button) = engine.objects.create(Object {
            id,
            ..Object::new(ObjectKind::DOOR_BUTTON)
        }) {
            let color = find_object(engine, ObjectKind::DOOR, id)
                .and_then(|door| engine.objects.at(door))
                .map_or(0, |door| door.color);

            engine.memory.fill(BUTTON_COLOR, 9, color);
            engine.memory.write(BUTTON_LAMP, (color >> 4) | 0x10);
            engine.draw_object(button, IMAGE_BUTTON, x, y);
        }

        ptr = ptr.wrapping_add(3);
    }

    ptr
}

pub struct Lock;

impl ObjectBehavior for Lock {
    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(player) = player_at(engine, slot) else {
            return;
        };
        let number = player.number as usize;
        if engine.memory.player_state(number) != PlayerState::ALIVE || !player.button {
            return;
        }
        let Some(lock) = engine.objects.at(object).copied() else {
            return;
        };
        if !engine.memory.has_key(number, lock.id) {
            return;
        }
        open_door(engine, lock.state);
    }
}

/// Parse the lock records: key, unused, door, x, y
pub fn load_locks(engine: &mut Engine, mut ptr: u16) -> u16 {
    while engine.memory.read(ptr) != 0 {
        let key = engine.memory.read(ptr);
        let door = engine.memory.read(ptr.wrapping_add(2));
        let x = engine.memory.read(ptr.wrapping_add(3));
        let y = engine.memory.read(ptr.wrapping_add(4));

        if let Some(lock) = engine.objects.create(Object {
            id: key,
            state: door,
            ..Object::new(ObjectKind::DOOR_LOCK)
        }) {
            engine.memory.fill(LOCK_COLOR, 9, (key << 4) | key);
            engine.draw_object(lock, IMAGE_LOCK, x, y);
        }

        ptr = ptr.wrapping_add(5);
    }

    ptr.wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::kinds::player;
    use crate::testing;

    /// Two doors: 0 closed to room 1 door 0, 1 open exit to room 2 door 1
    fn engine_with_doors() -> Engine {
        let mut engine = testing::engine();
        engine.memory.load(
            0x9000,
            &[
                2, //
                0x30, 0x40, 0x00, 0x01, 0x00, 0, 0, 0, //
                0x60, 0x40, 0x80, 0x02, 0x01, 0, 0, 1,
            ],
        );
        // Room 1 door table
        engine.memory.write(Memory::room_address(1), 0x05);
        engine.memory.write_word(Memory::room_address(1) + 4, 0x9100);
        engine.memory.load(0x9100, &[1, 0x20, 0x20, 0x00]);
        engine
    }

    #[test]
    fn load_draws_doors_in_their_state() {
        let mut engine = engine_with_doors();
        let next = load(&mut engine, 0x9000);

        assert_eq!(next, 0x9011);
        assert_eq!(engine.room.doors, 0x9001);
        let closed = engine.objects.at(0).unwrap();
        assert_eq!((closed.gfx, closed.x, closed.y), (IMAGE_CLOSED, 0x34, 0x50));
        assert_eq!(closed.color, 0x55);
        assert_eq!(closed.state, 0);
        assert_eq!(engine.objects.at(1).unwrap().gfx, IMAGE_OPEN);
        assert_eq!(engine.objects.at(1).unwrap().state, 1);
    }

    #[test]
    fn opening_marks_both_sides_and_animates() {
        let mut engine = engine_with_doors();
        load(&mut engine, 0x9000);
        engine.set_object_flags(0, ObjectFlags::EXECUTE);

        Door.execute(&mut engine, 0);
        assert_eq!(engine.memory.read(0x9003) & OPEN, OPEN);
        assert_eq!(engine.memory.read(0x9103) & OPEN, OPEN);
        assert_eq!(engine.objects.at(0).unwrap().phase, OPENING_STEPS - 1);

        for _ in 0..OPENING_STEPS {
            Door.execute(&mut engine, 0);
        }
        let door = engine.objects.at(0).unwrap();
        assert!(!door.has(ObjectFlags::EXECUTE));
        assert_eq!(door.gfx, IMAGE_OPEN);
    }

    #[test]
    fn button_opens_linked_door() {
        let mut engine = engine_with_doors();
        load(&mut engine, 0x9000);
        engine.memory.load(0x9200, &[1, 0x40, 0x48, 0x00]);
        let next = load_buttons(&mut engine, 0x9200);
        assert_eq!(next, 0x9204);
        assert_eq!(engine.memory.read(BUTTON_LAMP), 0x15);

        let slot = player::add(&mut engine, 0).unwrap();
        engine.sprites[slot].x = 0x40;
        if let SpriteData::Player(data) = &mut engine.sprites[slot].data {
            data.button = true;
        }

        Button.infront(&mut engine, 2, slot);
        assert!(engine.objects.at(0).unwrap().has(ObjectFlags::EXECUTE));
    }

    #[test]
    fn lock_needs_the_matching_key() {
        let mut engine = engine_with_doors();
        load(&mut engine, 0x9000);
        engine.memory.load(0x9200, &[0x03, 0, 0x00, 0x50, 0x50, 0]);
        assert_eq!(load_locks(&mut engine, 0x9200), 0x9206);
        assert_eq!(engine.memory.read(LOCK_COLOR), 0x33);

        let slot = player::add(&mut engine, 0).unwrap();
        if let SpriteData::Player(data) = &mut engine.sprites[slot].data {
            data.button = true;
        }

        Lock.infront(&mut engine, 2, slot);
        assert!(!engine.objects.at(0).unwrap().has(ObjectFlags::EXECUTE));

        engine.memory.add_key(0, 0x03);
        Lock.infront(&mut engine, 2, slot);
        assert!(engine.objects.at(0).unwrap().has(ObjectFlags::EXECUTE));
    }

    #[test]
    fn walking_through_an_exit_escapes() {
        let mut engine = engine_with_doors();
        load(&mut engine, 0x9000);
        let slot = player::add(&mut engine, 1).unwrap();
        engine.memory.set_player_state(1, PlayerState::ALIVE);
        engine.controllers[1].set_button_pressed(Controller::BUTTON_UP, true);
        engine.controllers[1].set_button_pressed(Controller::BUTTON_RIGHT, true);
        let (joystick, _) = engine.joystick(1);
        if let SpriteData::Player(data) = &mut engine.sprites[slot].data {
            data.joystick = joystick;
        }

        Door.infront(&mut engine, 1, slot);

        assert_eq!(engine.memory.player_state(1), PlayerState::ENTERING);
        assert!(engine.memory.escaped(1));
        assert_eq!(engine.memory.current_room(1), 2);
        assert_eq!(engine.memory.current_door(1), 1);
        assert_eq!(engine.memory.read(Memory::room_address(2)) & VISITED, VISITED);
        assert_eq!((engine.sprites[slot].x, engine.sprites[slot].y), (0x66, 0x4F));
    }
}
