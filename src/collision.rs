//! Collision pipeline
//!
//! Phase 1 folds the pixel overlap report of the last rendered frame into
//! the sprites' `OVERLAPS` (foreground pixels) and `COLLIDES` (another
//! sprite) bits. Phase 2 runs from the scheduler when a sprite is due: the
//! coarse bits gate precise bounding box re-tests against objects and other
//! sprites, which dispatch the kinds' collision, infront and hit hooks.
//!
//! Boxes are inclusive on both edges. A box that runs past 0xFF has its near
//! edge moved to zero, so it spans from the start of the axis to the wrapped
//! far edge.

use log::trace;

use crate::engine::Engine;
use crate::kinds::{object_behavior, sprite_entry, SpriteEntry};
use crate::object::ObjectFlags;
use crate::sprite::{SpriteState, MAX_SPRITES};

/// One pixel-level overlap seen while rendering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Overlap {
    /// Sprite slot
    pub sprite: usize,

    /// The other sprite, or `None` for the bitmap foreground
    pub other: Option<usize>,
}

impl Overlap {
    pub fn background(sprite: usize) -> Self {
        Overlap { sprite, other: None }
    }

    pub fn sprites(sprite: usize, other: usize) -> Self {
        Overlap { sprite, other: Some(other) }
    }
}

/// Reduce an overlap report to the sprite and background bitmasks
pub fn reduce(overlaps: &[Overlap]) -> (u8, u8) {
    let mut sprite_mask = 0u8;
    let mut background_mask = 0u8;

    for overlap in overlaps.iter().filter(|o| o.sprite < MAX_SPRITES) {
        match overlap.other {
            Some(other) if other < MAX_SPRITES => {
                sprite_mask |= 1 << overlap.sprite;
                sprite_mask |= 1 << other;
            }
            Some(_) => {}
            None => background_mask |= 1 << overlap.sprite,
        }
    }

    (sprite_mask, background_mask)
}

impl Engine {
    /// Phase 1: set the collision bits of every live sprite
    pub fn collect_overlaps(&mut self, overlaps: &[Overlap]) {
        let (sprite_mask, background_mask) = reduce(overlaps);

        for slot in 0..MAX_SPRITES {
            let sprite = &mut self.sprites[slot];
            if sprite.is_free() {
                continue;
            }

            let mut state = sprite.state & SpriteState::COLLISION_CLEAR;
            if sprite_mask & (1 << slot) != 0 {
                state |= SpriteState::COLLIDES;
            }
            if background_mask & (1 << slot) != 0 {
                state |= SpriteState::OVERLAPS;
            }
            sprite.state = state;
        }
    }

    /// Phase 2: test a sprite against every enabled object
    pub fn object_check(&mut self, slot: usize) {
        let sprite = self.sprites[slot];

        let mut left = sprite.x;
        let right = sprite.x.wrapping_add(sprite.collision_width);
        if sprite.x as u16 + sprite.collision_width as u16 > 0xFF {
            left = 0;
        }

        let mut top = sprite.y;
        let bottom = sprite.y.wrapping_add(sprite.collision_height);
        if sprite.y as u16 + sprite.collision_height as u16 > 0xFF {
            top = 0;
        }

        let count = self.objects.len();
        for position in 0..count {
            let Some(object) = self.objects.at(position).copied() else {
                continue;
            };

            if object.has(ObjectFlags::DISABLE)
                || right < object.x
                || (object.x as u16 + object.width as u16) < left as u16
                || bottom < object.y
                || (object.y as u16 + object.height as u16) < top as u16
            {
                continue;
            }

            trace!("Sprite {} over object {} (kind {})", slot, position, object.kind);

            let flash = match sprite_entry(self.sprites[slot].kind) {
                Some(entry) => entry.behavior.object_collision(self, slot, position),
                None => false,
            };
            if flash {
                self.sprites[slot].state |= SpriteState::FLASH;
            }

            if let Some(behavior) = object_behavior(object.kind) {
                behavior.infront(self, position, slot);
            }
        }
    }

    /// Phase 2: test a sprite against every other colliding sprite
    pub fn sprite_check(&mut self, slot: usize) {
        let group = self.hit_data(slot);
        if group & SpriteEntry::HIT_NEVER != 0 {
            return;
        }

        let sprite = self.sprites[slot];

        let mut left = sprite.x;
        let right = sprite.x.wrapping_add(sprite.collision_width);
        if sprite.x as u16 + sprite.collision_width as u16 > 0x100 {
            left = 0;
        }

        let mut top = sprite.y;
        let bottom = sprite.y.wrapping_add(sprite.collision_height);
        if sprite.y as u16 + sprite.collision_height as u16 > 0x100 {
            top = 0;
        }

        for other in 0..MAX_SPRITES {
            if other == slot {
                continue;
            }

            let target = self.sprites[other];
            if target.is_free() || !target.has(SpriteState::COLLIDES) {
                continue;
            }

            let other_group = self.hit_data(other);
            if other_group & SpriteEntry::HIT_NEVER != 0 || other_group & group != 0 {
                continue;
            }

            if right >= target.x
                && target.x.wrapping_add(target.collision_width) >= left
                && bottom >= target.y
                && (target.y as u16 + target.collision_height as u16) >= top as u16
            {
                trace!("Sprite {} hits sprite {}", slot, other);
                self.hit(slot, other);
                self.hit(other, slot);
            }
        }
    }

    /// Dispatch one direction of a sprite-sprite collision
    fn hit(&mut self, slot: usize, other: usize) {
        if self.sprites[slot].has(SpriteState::DYING) {
            return;
        }

        let flash = match sprite_entry(self.sprites[slot].kind) {
            Some(entry) => entry.behavior.hit(self, slot, other),
            None => true,
        };

        if flash {
            self.sprites[slot].state |= SpriteState::FLASH;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;
    use crate::object::{Object, ObjectKind};
    use crate::sprite::SpriteKind;

    fn engine() -> Engine {
        Engine::new(Memory::new(), Vec::new())
    }

    fn place(engine: &mut Engine, kind: u8, x: u8, y: u8, w: u8, h: u8) -> usize {
        let slot = engine.sprites.allocate().unwrap();
        let sprite = &mut engine.sprites[slot];
        sprite.kind = kind;
        sprite.state = SpriteState::COLLIDES;
        sprite.x = x;
        sprite.y = y;
        sprite.collision_width = w;
        sprite.collision_height = h;
        slot
    }

    #[test]
    fn sprite_overlap_marks_both_sprites() {
        let (sprites, background) = reduce(&[Overlap::sprites(1, 4), Overlap::background(2)]);
        assert_eq!(sprites, 0b0001_0010);
        assert_eq!(background, 0b0000_0100);
    }

    #[test]
    fn collection_replaces_old_bits() {
        let mut engine = engine();
        let slot = engine.sprites.allocate().unwrap();
        engine.sprites[slot].state |= SpriteState::COLLIDES;

        engine.collect_overlaps(&[Overlap::background(slot)]);

        assert!(engine.sprites[slot].has(SpriteState::OVERLAPS));
        assert!(!engine.sprites[slot].has(SpriteState::COLLIDES));
        assert!(engine.sprites[slot].has(SpriteState::CREATED));
    }

    #[test]
    fn free_sprites_are_left_alone() {
        let mut engine = engine();
        engine.collect_overlaps(&[Overlap::background(3)]);
        assert_eq!(engine.sprites[3].state, SpriteState::FREE);
    }

    #[test]
    fn hits_are_dispatched_both_ways() {
        let mut engine = engine();
        // Lasers flash on any hit, bolts veto their own
        let laser = place(&mut engine, SpriteKind::LASER, 0x40, 0x40, 8, 8);
        let mummy = place(&mut engine, SpriteKind::MUMMY, 0x44, 0x44, 8, 8);

        engine.sprite_check(laser);

        assert!(engine.sprites[laser].has(SpriteState::FLASH));
        assert!(engine.sprites[mummy].has(SpriteState::FLASH));
    }

    #[test]
    fn same_group_never_collides() {
        let mut engine = engine();
        let laser = place(&mut engine, SpriteKind::LASER, 0x40, 0x40, 8, 8);
        let bolt = place(&mut engine, SpriteKind::LIGHTNING, 0x40, 0x40, 8, 8);

        engine.sprite_check(laser);

        assert!(!engine.sprites[laser].has(SpriteState::FLASH));
        assert!(!engine.sprites[bolt].has(SpriteState::FLASH));
    }

    #[test]
    fn dying_sprite_ignores_hits() {
        let mut engine = engine();
        let laser = place(&mut engine, SpriteKind::LASER, 0x40, 0x40, 8, 8);
        let mummy = place(&mut engine, SpriteKind::MUMMY, 0x44, 0x44, 8, 8);
        engine.sprites[mummy].state |= SpriteState::DYING;

        engine.sprite_check(laser);

        assert!(engine.sprites[laser].has(SpriteState::FLASH));
        assert!(!engine.sprites[mummy].has(SpriteState::FLASH));
    }

    #[test]
    fn boxes_are_inclusive() {
        let mut engine = engine();
        let laser = place(&mut engine, SpriteKind::LASER, 0x40, 0x40, 8, 8);
        let mummy = place(&mut engine, SpriteKind::MUMMY, 0x48, 0x48, 8, 8);
        let far = place(&mut engine, SpriteKind::FRANKIE, 0x49, 0x40, 8, 8);

        engine.sprite_check(laser);

        assert!(engine.sprites[mummy].has(SpriteState::FLASH));
        assert!(!engine.sprites[far].has(SpriteState::FLASH));
    }

    #[test]
    fn disabled_objects_are_skipped() {
        let mut engine = engine();
        let slot = place(&mut engine, SpriteKind::LASER, 0x40, 0x40, 8, 8);

        let mut coffin = Object::new(ObjectKind::FRANKIE_COFFIN);
        coffin.x = 0x40;
        coffin.y = 0x40;
        coffin.width = 8;
        coffin.height = 8;
        engine.objects.create(coffin);

        engine.object_check(slot);
        assert!(!engine.sprites[slot].has(SpriteState::FLASH));

        engine.objects.at_mut(0).unwrap().flags = 0;
        engine.object_check(slot);
        assert!(engine.sprites[slot].has(SpriteState::FLASH));
    }
}
