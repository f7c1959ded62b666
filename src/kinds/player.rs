//! Player sprite
//!
//! A player walks the geometry map under joystick control, climbs ladders,
//! slides down poles and leaves through doors. Entering through a door plays
//! a short scripted walk from the door walk tables. The player's clock runs
//! while the sprite is in a room and is banked into the castle timer record
//! when the sprite is destroyed.

use super::{bit, reach, release, take_created, trapdoor, SpriteBehavior};
use crate::castle::PlayerState;
use crate::engine::Engine;
use crate::memory::Memory;
use crate::object::ObjectKind;
use crate::sprite::{PlayerData, SpriteData, SpriteKind, SpriteState};
use crate::util::time_to_timer;

/// Door walk tables: x and y deltas, image and next state per step of four
const WALK_DX: u16 = 0x34A1;
const WALK_DY: u16 = 0x34A2;
const WALK_IMAGE: u16 = 0x34A3;
const WALK_STATE: u16 = 0x34A4;

/// Movement deltas per direction
const MOVE_X: u16 = 0x34D7;
const MOVE_Y: u16 = 0x34DF;

/// Sprite colour per player
const PLAYER_COLOR: u16 = 0x34D3;

/// Direction and floor mask meaning "none"
const STANDING: u8 = 0x80;
const NO_SWITCH: u8 = 0xFF;

/// Images with the player on a ladder or pole
const IMAGE_POLE: u8 = 0x26;
const IMAGE_LADDER_FIRST: u8 = 0x2E;
const IMAGE_LADDER_LAST: u8 = 0x31;

pub struct Player;

impl SpriteBehavior for Player {
    fn execute(&self, engine: &mut Engine, slot: usize) {
        let data = payload(engine, slot);
        let number = data.number as usize;

        if release(engine, slot) {
            bank_time(engine, number);
            return;
        }

        if take_created(engine, slot) {
            engine.clock_start[number] = engine.frame;
            if engine.memory.player_state(number) != PlayerState::ENTERING {
                set_color(engine, slot);
                walk(engine, slot);
                return;
            }
        } else {
            match engine.memory.player_state(number) {
                PlayerState::WALKING_OUT => {
                    let next = engine.memory.read(WALK_STATE.wrapping_add(data.walk_step as u16));
                    if next != 0xFF {
                        engine.memory.set_player_state(number, next);
                        engine.sprites[slot].period = 1;
                        check_state(engine, slot, next);
                        return;
                    }

                    let mut data = data;
                    data.walk_step = data.walk_step.wrapping_add(4);
                    let step = data.walk_step as u16;
                    let dx = engine.memory.read(WALK_DX.wrapping_add(step));
                    let dy = engine.memory.read(WALK_DY.wrapping_add(step));

                    let sprite = &mut engine.sprites[slot];
                    sprite.x = sprite.x.wrapping_add(dx);
                    sprite.y = sprite.y.wrapping_add(dy);
                    sprite.data = SpriteData::Player(data);
                }
                PlayerState::ENTERING => {
                    engine.memory.set_player_state(number, PlayerState::WALKING_OUT);
                }
                state => {
                    check_state(engine, slot, state);
                    return;
                }
            }
        }

        let step = payload(engine, slot).walk_step;
        engine.sprites[slot].image = engine.memory.read(WALK_IMAGE.wrapping_add(step as u16));
        set_color(engine, slot);
    }

    fn object_collision(&self, engine: &mut Engine, slot: usize, object: usize) -> bool {
        let Some(kind) = engine.objects.at(object).map(|o| o.kind) else {
            return false;
        };

        match kind {
            ObjectKind::TRAPDOOR if reach(engine, slot, object) < 4 => {
                let number = payload(engine, slot).number as usize;
                engine.memory.set_player_state(number, PlayerState::DYING);
                true
            }
            ObjectKind::TRAPDOOR_SWITCH if reach(engine, slot, object) < 4 => {
                let id = engine.objects.at(object).map_or(NO_SWITCH, |o| o.id);
                update(engine, slot, |data| data.switch = id);
                false
            }
            _ => false,
        }
    }

    fn hit(&self, engine: &mut Engine, slot: usize, other: usize) -> bool {
        let target = engine.sprites[other];

        match target.kind {
            SpriteKind::FORCEFIELD => false,
            SpriteKind::PLAYER => {
                // Players pass each other, but one stands on the other's head
                if (IMAGE_LADDER_FIRST..=IMAGE_LADDER_LAST).contains(&target.image) || target.image == IMAGE_POLE {
                    return false;
                }
                let own_y = engine.sprites[slot].y;
                if target.y != own_y {
                    let mask = if target.y >= own_y { 0xEF } else { 0xFE };
                    update(engine, slot, |data| data.floor_mask = mask);
                }
                false
            }
            _ => {
                let number = payload(engine, slot).number as usize;
                if engine.memory.player_state(number) != PlayerState::ALIVE {
                    return false;
                }
                engine.memory.set_player_state(number, PlayerState::DYING);
                true
            }
        }
    }
}

fn payload(engine: &Engine, slot: usize) -> PlayerData {
    match engine.sprites[slot].data {
        SpriteData::Player(data) => data,
        _ => PlayerData::default(),
    }
}

/// Payload of a sprite if it is a player
pub(crate) fn player_at(engine: &Engine, slot: usize) -> Option<PlayerData> {
    if engine.sprites[slot].kind != SpriteKind::PLAYER {
        return None;
    }
    Some(payload(engine, slot))
}

fn update(engine: &mut Engine, slot: usize, f: impl FnOnce(&mut PlayerData)) {
    let mut data = payload(engine, slot);
    f(&mut data);
    engine.sprites[slot].data = SpriteData::Player(data);
}

/// Add the time since the clock was started and store it in the castle
fn bank_time(engine: &mut Engine, number: usize) {
    let elapsed = engine.frame.wrapping_sub(engine.clock_start[number]);
    engine.player_time[number] = engine.player_time[number].wrapping_add(elapsed);

    let timer = Memory::timer_address(number);
    for (n, value) in time_to_timer(engine.player_time[number]).into_iter().enumerate() {
        engine.memory.write(timer + 1 + n as u16, value);
    }
}

/// Anything other than alive ends the sprite
fn check_state(engine: &mut Engine, slot: usize, state: u8) {
    if state != PlayerState::ALIVE {
        engine.sprites[slot].state |= SpriteState::DESTROY;
        return;
    }
    walk(engine, slot);
}

fn set_color(engine: &mut Engine, slot: usize) {
    engine.prepare_sprite(slot);
    let number = payload(engine, slot).number;
    engine.hardware[slot].color = engine.memory.read(PLAYER_COLOR.wrapping_add(number as u16));
}

/// Directions the floor under the player allows
fn floor_directions(engine: &mut Engine, slot: usize) -> u8 {
    let cell = engine.floor_cell(slot);
    let mut data = payload(engine, slot);
    let mut mask = engine.memory.read(cell.address) & data.floor_mask;
    data.floor_mask = 0xFF;
    engine.sprites[slot].data = SpriteData::Player(data);

    if cell.sub_y != 0 {
        if mask & 0x11 == 0 {
            mask &= 0xBB;
            mask &= if cell.sub_y >> 1 != cell.sub_x { 0x77 } else { 0xDD };
        }
    } else if cell.sub_x == 3 {
        mask &= 0x75;
        mask |= engine.memory.read(cell.address.wrapping_sub(0x4E)) & 0x02;
    } else if cell.sub_x == 0 {
        mask &= 0x5D;
        mask |= engine.memory.read(cell.address.wrapping_sub(0x52)) & 0x80;
    } else {
        mask &= 0x55;
    }

    mask
}

/// Joystick driven movement
fn walk(engine: &mut Engine, slot: usize) {
    let mut data = payload(engine, slot);
    trapdoor::step_switch(engine, &mut data.last_switch, &mut data.switch);
    engine.sprites[slot].data = SpriteData::Player(data);

    let cell = engine.floor_cell(slot);
    let floor = floor_directions(engine, slot);

    let mut data = payload(engine, slot);
    let (joystick, button) = engine.joystick(data.number as usize);
    data.button = button;
    data.joystick = joystick;

    let moving = joystick & STANDING == 0
        && if bit(engine, joystick) & floor != 0 {
            data.direction = joystick;
            true
        } else if data.direction & STANDING == 0 {
            // Keep going when the stick is one step off the current direction
            let ahead = data.direction.wrapping_add(1) & 7;
            let near = ahead == joystick || ahead.wrapping_sub(2) & 7 == joystick;
            near && bit(engine, data.direction) & floor != 0
        } else {
            false
        };

    if !moving {
        data.direction = STANDING;
        engine.sprites[slot].data = SpriteData::Player(data);
        return;
    }

    let direction = data.direction;
    let sprite = &mut engine.sprites[slot];
    sprite.data = SpriteData::Player(data);

    match direction & 3 {
        2 => sprite.y = sprite.y.wrapping_sub(cell.sub_y),
        0 => sprite.x = sprite.x.wrapping_sub(cell.sub_x).wrapping_add(1),
        _ => {}
    }

    let dx = engine.memory.read(MOVE_X.wrapping_add(direction as u16));
    let dy = engine.memory.read(MOVE_Y.wrapping_add(direction as u16));
    let sprite = &mut engine.sprites[slot];
    sprite.x = sprite.x.wrapping_add(dx);
    sprite.y = sprite.y.wrapping_add(dy);

    if direction & 3 == 0 {
        if floor & 0x01 != 0 {
            // Ladder
            sprite.image = if direction == 0 {
                sprite.image.wrapping_add(1)
            } else {
                sprite.image.wrapping_sub(1)
            };
            if sprite.image < IMAGE_LADDER_FIRST {
                sprite.image = IMAGE_LADDER_LAST;
            } else if sprite.image > IMAGE_LADDER_LAST {
                sprite.image = IMAGE_LADDER_FIRST;
            }
        } else {
            sprite.image = IMAGE_POLE;
        }
    } else {
        sprite.image = sprite.image.wrapping_add(1);
        if direction < 4 {
            if !(3..6).contains(&sprite.image) {
                sprite.image = 3;
            }
        } else if sprite.image >= 3 {
            sprite.image = 0;
        }
    }

    set_color(engine, slot);
}

/// Put a player into the room at its current door
pub fn add(engine: &mut Engine, number: usize) -> Option<usize> {
    let slot = engine.sprites.allocate()?;
    engine.player_sprite[number] = Some(slot);

    let door = engine
        .room
        .doors
        .wrapping_add((engine.memory.current_door(number) as u16) << 3);
    let door_x = engine.memory.read(door);
    let door_y = engine.memory.read(door.wrapping_add(1));
    let mut data = PlayerData {
        number: number as u8,
        button: false,
        floor_mask: 0xFF,
        last_switch: NO_SWITCH,
        switch: NO_SWITCH,
        walk_step: 0,
        joystick: STANDING,
        direction: STANDING,
    };

    let sprite = &mut engine.sprites[slot];
    sprite.kind = SpriteKind::PLAYER;

    if engine.memory.read(door.wrapping_add(2)) & 0x80 != 0 {
        engine.memory.set_player_state(number, PlayerState::ENTERING);
        sprite.x = door_x.wrapping_add(0x0B);
        sprite.y = door_y.wrapping_add(0x0C);
        sprite.period = 3;
        data.walk_step = 0x18;
    } else {
        engine.memory.set_player_state(number, PlayerState::ALIVE);
        sprite.x = door_x.wrapping_add(6);
        sprite.y = door_y.wrapping_add(0x0F);
    }

    sprite.width = 3;
    sprite.height = 0x11;
    sprite.image = 0;
    sprite.data = SpriteData::Player(data);

    Some(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::testing;
    use crate::util::TICKS_PER_SECOND;

    fn engine_with_door(flags: u8) -> Engine {
        let mut engine = testing::engine();
        engine.room.doors = 0x9000;
        engine.memory.load(0x9000, &[0x40, 0x30, flags, 0, 0, 0, 0, 0]);
        engine.memory.write(PLAYER_COLOR, 0x0E);
        engine
    }

    #[test]
    fn added_player_stands_in_doorway() {
        let mut engine = engine_with_door(0);
        let slot = add(&mut engine, 0).unwrap();

        let sprite = engine.sprites[slot];
        assert_eq!((sprite.x, sprite.y), (0x46, 0x3F));
        assert_eq!((sprite.width, sprite.height), (3, 0x11));
        assert_eq!(engine.memory.player_state(0), PlayerState::ALIVE);
        assert_eq!(engine.player_sprite[0], Some(slot));
    }

    #[test]
    fn player_through_open_door_walks_in() {
        let mut engine = engine_with_door(0x80);
        let slot = add(&mut engine, 1).unwrap();

        assert_eq!(engine.memory.player_state(1), PlayerState::ENTERING);
        assert_eq!(engine.sprites[slot].period, 3);
        assert_eq!(payload(&engine, slot).walk_step, 0x18);

        Player.execute(&mut engine, slot);
        assert_eq!(engine.hardware[slot].color, engine.memory.read(PLAYER_COLOR + 1));

        Player.execute(&mut engine, slot);
        assert_eq!(engine.memory.player_state(1), PlayerState::WALKING_OUT);
    }

    #[test]
    fn walking_in_ends_at_the_table_state() {
        let mut engine = engine_with_door(0x80);
        let slot = add(&mut engine, 0).unwrap();
        engine.sprites[slot].state = 0;
        engine.memory.set_player_state(0, PlayerState::WALKING_OUT);
        engine.memory.write(WALK_STATE + 0x18, PlayerState::ALIVE);

        Player.execute(&mut engine, slot);

        assert_eq!(engine.memory.player_state(0), PlayerState::ALIVE);
        assert_eq!(engine.sprites[slot].period, 1);
        assert!(!engine.sprites[slot].has(SpriteState::DESTROY));
    }

    #[test]
    fn walks_right_along_a_walkway() {
        let mut engine = engine_with_door(0);
        let slot = add(&mut engine, 0).unwrap();
        engine.sprites[slot].state = 0;
        engine.memory.write(MOVE_X + 2, 1);

        let cell = engine.floor_cell(slot);
        engine.memory.write(cell.address, 0x44);
        engine.controllers[0].set_button_pressed(Controller::BUTTON_RIGHT, true);

        Player.execute(&mut engine, slot);

        assert_eq!(engine.sprites[slot].x, 0x47);
        assert_eq!(payload(&engine, slot).direction, 2);
        assert_eq!(engine.sprites[slot].image, 3);
    }

    #[test]
    fn blocked_stick_stands_still() {
        let mut engine = engine_with_door(0);
        let slot = add(&mut engine, 0).unwrap();
        engine.sprites[slot].state = 0;
        engine.controllers[0].set_button_pressed(Controller::BUTTON_UP, true);

        Player.execute(&mut engine, slot);

        assert_eq!(engine.sprites[slot].x, 0x46);
        assert_eq!(payload(&engine, slot).direction, STANDING);
    }

    #[test]
    fn leaving_banks_the_clock() {
        let mut engine = engine_with_door(0);
        let slot = add(&mut engine, 0).unwrap();
        Player.execute(&mut engine, slot);

        engine.frame += 75 * TICKS_PER_SECOND;
        engine.sprites[slot].state |= SpriteState::DESTROY;
        Player.execute(&mut engine, slot);

        assert!(engine.sprites[slot].has(SpriteState::ACTION_FREE));
        let timer = Memory::timer_address(0);
        assert_eq!(engine.memory.slice(timer + 1, 3), &[0x15, 0x01, 0x00]);
    }

    #[test]
    fn monsters_kill_a_living_player_once() {
        let mut engine = engine_with_door(0);
        let slot = add(&mut engine, 0).unwrap();
        let mummy = engine.sprites.allocate().unwrap();
        engine.sprites[mummy].kind = SpriteKind::MUMMY;

        assert!(Player.hit(&mut engine, slot, mummy));
        assert_eq!(engine.memory.player_state(0), PlayerState::DYING);
        assert!(!Player.hit(&mut engine, slot, mummy));
    }

    #[test]
    fn higher_player_blocks_the_lower_ones_floor() {
        let mut engine = engine_with_door(0);
        let slot = add(&mut engine, 0).unwrap();
        let other = add(&mut engine, 1).unwrap();
        engine.sprites[other].y = engine.sprites[slot].y + 8;

        assert!(!Player.hit(&mut engine, slot, other));
        assert_eq!(payload(&engine, slot).floor_mask, 0xEF);
    }

    #[test]
    fn switch_under_feet_is_recorded() {
        let mut engine = engine_with_door(0);
        let slot = add(&mut engine, 0).unwrap();
        let mut switch = crate::object::Object::new(ObjectKind::TRAPDOOR_SWITCH);
        switch.x = 0x47;
        switch.id = 5;
        let object = engine.objects.create(switch).unwrap();

        assert!(!Player.object_collision(&mut engine, slot, object));
        assert_eq!(payload(&engine, slot).switch, 5);
    }
}
