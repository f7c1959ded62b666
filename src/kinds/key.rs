//! Keys
//!
//! Record (4 bytes): key id, image (0: already taken), x, y. A zero byte
//! ends the list.

use super::player::player_at;
use super::ObjectBehavior;
use crate::castle::PlayerState;
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectFlags, ObjectKind};

const RECORD_SIZE: u8 = 4;

pub struct Key;

impl ObjectBehavior for Key {
    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(player) = player_at(engine, slot) else {
            return;
        };
        let number = player.number as usize;
        if engine.memory.player_state(number) != PlayerState::ALIVE || !player.button {
            return;
        }
        let Some(offset) = engine.objects.at(object).map(|o| o.id) else {
            return;
        };

        engine.play_effect(Effect::KEY);
        engine.set_object_flags(object, ObjectFlags::PICKED);

        // Taken keys stay gone when the room is entered again
        let record = engine.room.keys.wrapping_add(offset as u16);
        engine.memory.write(record.wrapping_add(1), 0);
        let key = engine.memory.read(record);
        engine.memory.add_key(number, key);
    }
}

/// Parse the key records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    engine.room.keys = ptr;
    let mut offset = 0u8;

    loop {
        let gfx = engine.memory.read(ptr.wrapping_add(1));
        if gfx != 0 {
            let x = engine.memory.read(ptr.wrapping_add(2));
            let y = engine.memory.read(ptr.wrapping_add(3));

            if let Some(key) = engine.objects.create(Object {
                id: offset,
                ..Object::new(ObjectKind::KEY)
            }) {
                engine.draw_object(key, gfx, x, y);
            }
        }

        offset = offset.wrapping_add(RECORD_SIZE);
        ptr = ptr.wrapping_add(RECORD_SIZE as u16);

        if engine.memory.read(ptr) == 0 {
            break;
        }
    }

    ptr.wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::player;
    use crate::sprite::SpriteData;
    use crate::testing;

    fn engine_with_keys() -> Engine {
        let mut engine = testing::engine();
        engine.room.doors = 0x9100;
        engine.memory.load(0x9000, &[0x11, 0x4C, 0x40, 0x50, 0x12, 0x00, 0x60, 0x50, 0x00]);
        engine
    }

    #[test]
    fn taken_keys_are_not_created() {
        let mut engine = engine_with_keys();
        let next = load(&mut engine, 0x9000);

        assert_eq!(next, 0x9009);
        assert_eq!(engine.objects.len(), 1);
        let key = engine.objects.at(0).unwrap();
        assert_eq!((key.gfx, key.x, key.id), (0x4C, 0x40, 0));
    }

    #[test]
    fn pickup_needs_the_button() {
        let mut engine = engine_with_keys();
        load(&mut engine, 0x9000);
        let slot = player::add(&mut engine, 0).unwrap();

        Key.infront(&mut engine, 0, slot);
        assert!(!engine.objects.at(0).unwrap().has(ObjectFlags::PICKED));

        if let SpriteData::Player(data) = &mut engine.sprites[slot].data {
            data.button = true;
        }
        Key.infront(&mut engine, 0, slot);

        assert!(engine.objects.at(0).unwrap().has(ObjectFlags::PICKED));
        assert_eq!(engine.memory.keys(0), &[0x11]);
        assert_eq!(engine.memory.read(0x9001), 0);
    }
}
