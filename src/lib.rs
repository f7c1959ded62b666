//! rustyCreep - The Castles of Dr. Creep room engine
//!
//! The crate reproduces the room simulation of the game: a shared 64KB
//! memory image, the sprite and object registries, the per-kind behaviours,
//! the two-phase collision pipeline and the compositor that draws into the
//! multicolor bitmap. Around it sit the game flow, a software renderer, a
//! simple effect player, file persistence and an SDL2 front end.

pub mod audio;
pub mod castle;
pub mod collision;
pub mod controller;
pub mod draw;
pub mod engine;
pub mod game;
pub mod kinds;
pub mod memory;
pub mod object;
pub mod persistence;
pub mod rng;
pub mod room;
pub mod savestate;
pub mod sprite;
pub mod util;
pub mod video;

#[cfg(test)]
mod testing;

pub use engine::Engine;
pub use game::{Game, GameConfig, GameError};
pub use memory::Memory;
