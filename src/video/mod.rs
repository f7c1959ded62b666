//! Presentation
//!
//! The renderer turns the shared memory region and the engine's hardware
//! sprite registers into an RGB24 frame, the way the display chip would: the
//! multicolor bitmap first, then the eight sprites with sprite 0 on top.
//! Sprites flagged `behind` only show over background bitmap pixels.
//!
//! While compositing it records every pixel where a sprite meets the bitmap
//! foreground or another sprite. That overlap report is what the engine's
//! first collision phase consumes on the next tick.

mod bitmap;
mod palette;
mod sprites;

use std::path::Path;

use image::{ImageResult, RgbImage};
use log::debug;

use crate::collision::Overlap;
use crate::engine::Engine;
use crate::sprite::MAX_SPRITES;

pub use bitmap::*;
pub use palette::*;
pub use sprites::*;

/// Visible screen width in pixels
pub const SCREEN_WIDTH: u32 = 320;

/// Visible screen height in pixels
pub const SCREEN_HEIGHT: u32 = 200;

/// Colour behind bit pair 00
const BACKGROUND: u8 = 0x00;

/// Shared sprite colours for bit pairs 01 and 11
const SPRITE_MULTICOLOR: [u8; 2] = [0x0A, 0x01];

/// Software display
pub struct Renderer {
    /// Frame buffer (RGB24 format)
    pub frame_buffer: Vec<u8>,

    pub background: u8,
    pub sprite_multicolor: [u8; 2],

    /// Sprites seen on each pixel of the current frame, one bit per slot
    coverage: Vec<u8>,
}

impl Renderer {
    pub fn new() -> Self {
        let pixels = (SCREEN_WIDTH * SCREEN_HEIGHT) as usize;
        Renderer {
            frame_buffer: vec![0; pixels * 3],
            background: BACKGROUND,
            sprite_multicolor: SPRITE_MULTICOLOR,
            coverage: vec![0; pixels],
        }
    }

    /// Render one frame and report the overlaps seen while doing it
    pub fn render(&mut self, engine: &Engine) -> Vec<Overlap> {
        let memory = &engine.memory;
        self.coverage.fill(0);

        let mut foreground = vec![false; self.coverage.len()];
        let mut touched_background = 0u8;

        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                let index = (y * SCREEN_WIDTH + x) as usize;
                let bitmap_pixel = bitmap::pixel(memory, self.background, x, y);
                foreground[index] = bitmap_pixel.foreground;
                self.put(index, bitmap_pixel.color);
            }
        }

        // Lowest priority first so sprite 0 ends up on top
        for slot in (0..MAX_SPRITES).rev() {
            let sprite = &engine.hardware[slot];
            if !sprite.enabled {
                continue;
            }

            let (left, top, width, height) = sprites::bounds(sprite);
            for dy in 0..height {
                let y = top + dy;
                if y < 0 || y >= SCREEN_HEIGHT as i32 {
                    continue;
                }
                for dx in 0..width {
                    let x = left + dx;
                    if x < 0 || x >= SCREEN_WIDTH as i32 {
                        continue;
                    }
                    let Some(color) = sprites::pixel(memory, sprite, self.sprite_multicolor, dx, dy) else {
                        continue;
                    };

                    let index = (y as u32 * SCREEN_WIDTH + x as u32) as usize;
                    self.coverage[index] |= 1 << slot;
                    if foreground[index] {
                        touched_background |= 1 << slot;
                        if sprite.behind {
                            continue;
                        }
                    }
                    self.put(index, color);
                }
            }
        }

        let report = self.overlaps(touched_background);
        if !report.is_empty() {
            debug!("Frame overlaps: {:?}", report);
        }
        report
    }

    /// Collect the pairs recorded in the coverage map
    fn overlaps(&self, touched_background: u8) -> Vec<Overlap> {
        let mut pairs = [0u8; MAX_SPRITES];
        for &mask in self.coverage.iter().filter(|m| m.count_ones() > 1) {
            for slot in 0..MAX_SPRITES {
                if mask & (1 << slot) != 0 {
                    pairs[slot] |= mask & !(1 << slot);
                }
            }
        }

        let mut report = Vec::new();
        for slot in 0..MAX_SPRITES {
            if touched_background & (1 << slot) != 0 {
                report.push(Overlap::background(slot));
            }
            for other in (slot + 1)..MAX_SPRITES {
                if pairs[slot] & (1 << other) != 0 {
                    report.push(Overlap::sprites(slot, other));
                }
            }
        }
        report
    }

    #[inline]
    fn put(&mut self, index: usize, color: u8) {
        let RGB(r, g, b) = palette::color(color);
        let offset = index * 3;
        self.frame_buffer[offset] = r;
        self.frame_buffer[offset + 1] = g;
        self.frame_buffer[offset + 2] = b;
    }

    /// Get the frame buffer
    pub fn get_frame_buffer(&self) -> &[u8] {
        &self.frame_buffer
    }

    /// Write the last frame to a PNG file
    pub fn save_png(&self, path: &Path) -> ImageResult<()> {
        let image = RgbImage::from_raw(SCREEN_WIDTH, SCREEN_HEIGHT, self.frame_buffer.clone())
            .ok_or_else(|| {
                image::ImageError::Parameter(image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ))
            })?;
        image.save(path)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Memory, BITMAP, COLOR_PLANE_2, SPRITE_DATA};

    fn engine() -> Engine {
        Engine::new(Memory::new(), Vec::new())
    }

    /// Enable a solid hires sprite at a screen position
    fn solid_sprite(engine: &mut Engine, slot: usize, x: i16, y: u8) {
        let hardware = &mut engine.hardware[slot];
        hardware.enabled = true;
        hardware.x = x + 24;
        hardware.y = y + 50;
        hardware.color = 1;
        hardware.multicolor = false;
        let data = SPRITE_DATA + ((hardware.pointer as u16) << 6);
        engine.memory.fill(data, 63, 0xFF);
    }

    #[test]
    fn empty_screen_reports_nothing() {
        let mut renderer = Renderer::new();
        assert!(renderer.render(&engine()).is_empty());
        assert!(renderer.get_frame_buffer().iter().all(|&b| b == 0));
    }

    #[test]
    fn bitmap_colours_reach_the_frame() {
        let mut engine = engine();
        engine.memory.write(BITMAP, 0xFF);
        engine.memory.write(COLOR_PLANE_2, 0x01);

        let mut renderer = Renderer::new();
        renderer.render(&engine);

        assert_eq!(&renderer.frame_buffer[0..3], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&renderer.frame_buffer[8 * 3..8 * 3 + 3], &[0, 0, 0]);
    }

    #[test]
    fn touching_sprites_are_reported_once() {
        let mut engine = engine();
        solid_sprite(&mut engine, 0, 10, 10);
        solid_sprite(&mut engine, 3, 20, 15);
        solid_sprite(&mut engine, 5, 200, 100);

        let report = Renderer::new().render(&engine);

        assert_eq!(report, vec![Overlap::sprites(0, 3)]);
    }

    #[test]
    fn sprite_on_foreground_is_a_background_overlap() {
        let mut engine = engine();
        engine.memory.write(BITMAP, 0xAA);
        solid_sprite(&mut engine, 2, 0, 0);
        engine.hardware[2].behind = true;

        let mut renderer = Renderer::new();
        let report = renderer.render(&engine);

        assert_eq!(report, vec![Overlap::background(2)]);
        // Behind the foreground pixel, in front of the background one
        assert_eq!(&renderer.frame_buffer[0..3], &[0, 0, 0]);
        assert_eq!(&renderer.frame_buffer[8 * 3..8 * 3 + 3], &[0xFF, 0xFF, 0xFF]);
    }
}
