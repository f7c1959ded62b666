//! Room scenarios driven through the public engine API

mod common;

use common::{RoomBuilder, ROOM};
use rusty_creep::collision::Overlap;
use rusty_creep::controller::Controller;
use rusty_creep::engine::Effect;
use rusty_creep::kinds::frankie::FrankieFlags;
use rusty_creep::kinds::player;
use rusty_creep::object::{Object, ObjectKind, ObjectRegistry, MAX_OBJECTS};
use rusty_creep::sprite::{SpriteRegistry, SpriteState, MAX_SPRITES};
use rusty_creep::Engine;

const DOOR_X: u8 = 0x10;
const DOOR_Y: u8 = 0x18;

/// Where a player entering through the scenario door stands
const PLAYER_X: u8 = DOOR_X + 6;
const PLAYER_Y: u8 = DOOR_Y + 0x0F;

fn count(effects: &[u8], effect: u8) -> usize {
    effects.iter().filter(|&&e| e == effect).count()
}

#[test]
fn frankenstein_wakes_once_for_a_player_on_the_open_side() {
    let mut engine = RoomBuilder::new().door(DOOR_X, DOOR_Y).frankie(0x40, 0x30).build();
    let player = player::add(&mut engine, 0).unwrap();
    let record = engine.room.frankies;

    // Well above the coffin: no wake-up
    for _ in 0..4 {
        engine.tick(&[]);
    }
    assert_eq!(engine.memory.read(record) & FrankieFlags::AWAKE, 0);
    engine.sound.take_started();

    // Level with the monster, on the side the coffin opens to
    engine.sprites[player].x = 0x60;
    engine.sprites[player].y = 0x37;
    for _ in 0..6 {
        engine.tick(&[]);
    }

    assert_ne!(engine.memory.read(record) & FrankieFlags::AWAKE, 0);
    assert_eq!(count(&engine.sound.take_started(), Effect::FRANKIE), 1);
}

#[test]
fn monster_behind_the_coffin_keeps_sleeping() {
    let mut engine = RoomBuilder::new().door(DOOR_X, DOOR_Y).frankie(0x40, 0x30).build();
    let player = player::add(&mut engine, 0).unwrap();
    engine.sprites[player].x = 0x20;
    engine.sprites[player].y = 0x37;

    for _ in 0..6 {
        engine.tick(&[]);
    }
    assert_eq!(engine.memory.read(engine.room.frankies) & FrankieFlags::AWAKE, 0);
}

#[test]
fn key_is_picked_up_exactly_once() {
    let mut engine = RoomBuilder::new().door(DOOR_X, DOOR_Y).key(0x21, PLAYER_X, PLAYER_Y).build();
    assert_eq!(engine.objects.len(), 2);

    let player = player::add(&mut engine, 0).unwrap();
    assert_eq!((engine.sprites[player].x, engine.sprites[player].y), (PLAYER_X, PLAYER_Y));
    engine.controllers[0].set_button_pressed(Controller::BUTTON_FIRE, true);

    let touching = [Overlap::background(player)];
    let mut effects = Vec::new();
    for _ in 0..6 {
        engine.tick(&touching);
        effects.extend(engine.sound.take_started());
    }

    assert_eq!(engine.memory.keys(0), &[0x21]);
    assert_eq!(count(&effects, Effect::KEY), 1);
    assert!(engine.objects.iter().all(|o| o.kind != ObjectKind::KEY));

    // The record remembers the key is gone
    engine.load_room(ROOM).unwrap();
    assert!(engine.objects.iter().all(|o| o.kind != ObjectKind::KEY));
}

#[test]
fn key_needs_the_fire_button() {
    let mut engine = RoomBuilder::new().door(DOOR_X, DOOR_Y).key(0x21, PLAYER_X, PLAYER_Y).build();
    let player = player::add(&mut engine, 0).unwrap();

    for _ in 0..6 {
        engine.tick(&[Overlap::background(player)]);
    }
    assert!(engine.memory.keys(0).is_empty());
    assert_eq!(engine.objects.len(), 2);
}

/// Run a room for a while under a fixed input trace
fn replay() -> Engine {
    let mut engine = RoomBuilder::new()
        .door(DOOR_X, DOOR_Y)
        .key(0x21, 0x70, 0x50)
        .frankie(0x40, 0x30)
        .build();
    let player = player::add(&mut engine, 0).unwrap();

    let trace = [
        0,
        Controller::BUTTON_RIGHT,
        Controller::BUTTON_RIGHT | Controller::BUTTON_FIRE,
        Controller::BUTTON_DOWN,
        Controller::BUTTON_LEFT,
    ];
    for tick in 0..80 {
        engine.controllers[0].set_state(trace[tick % trace.len()]);
        let overlaps = if tick % 3 == 0 {
            vec![Overlap::background(player), Overlap::sprites(0, player)]
        } else {
            Vec::new()
        };
        engine.tick(&overlaps);
    }
    engine
}

#[test]
fn identical_traces_give_identical_rooms() {
    let first = replay();
    let second = replay();

    assert_eq!(first.memory.as_bytes(), second.memory.as_bytes());
    assert_eq!(first.sprites, second.sprites);
    assert_eq!(
        first.objects.iter().copied().collect::<Vec<_>>(),
        second.objects.iter().copied().collect::<Vec<_>>()
    );
    assert_eq!(first.hardware, second.hardware);
    assert_eq!(first.rng, second.rng);
    assert_eq!(first.ticks, second.ticks);
}

#[test]
fn sprite_registry_refuses_a_ninth_sprite_and_reuses_freed_slots() {
    let mut sprites = SpriteRegistry::new();
    let slots: Vec<usize> = (0..MAX_SPRITES).map(|_| sprites.allocate().unwrap()).collect();
    assert_eq!(slots, (0..MAX_SPRITES).collect::<Vec<_>>());

    let before = sprites.clone();
    assert_eq!(sprites.allocate(), None);
    assert_eq!(sprites, before);

    for slot in [1, 4, 6] {
        sprites[slot].state = SpriteState::FREE;
    }
    assert_eq!(sprites.live_count(), MAX_SPRITES - 3);
    assert_eq!(sprites.allocate(), Some(1));
    assert_eq!(sprites.allocate(), Some(4));
    assert_eq!(sprites.allocate(), Some(6));
    assert_eq!(sprites.allocate(), None);
}

#[test]
fn object_registry_refuses_past_capacity() {
    let mut objects = ObjectRegistry::new();
    for n in 0..MAX_OBJECTS {
        assert_eq!(objects.create(Object::new(ObjectKind::KEY)), Some(n));
    }
    assert_eq!(objects.create(Object::new(ObjectKind::DOOR)), None);
    assert_eq!(objects.len(), MAX_OBJECTS);

    let stale = objects.id_at(3).unwrap();
    objects.remove_at(3);
    assert!(objects.get(stale).is_none());
    assert_eq!(objects.create(Object::new(ObjectKind::DOOR)), Some(MAX_OBJECTS - 1));
}

#[test]
fn unmapped_sprite_kind_is_released() {
    let mut engine = RoomBuilder::new().build();
    let slot = engine.sprites.allocate().unwrap();
    engine.sprites[slot].kind = 0x3F;

    engine.tick(&[]);
    assert_eq!(engine.sprites.live_count(), 0);
    assert!(!engine.hardware[slot].enabled);
}
