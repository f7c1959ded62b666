//! Audio processing and output
//!
//! The engine only ever asks for sound effects. `SoundBoard` steps the effect
//! byte code once per tick and exposes the tones of its open voices; the
//! `AudioSystem` turns those tones into square waves for the output device.

mod effects;
mod output;

use sdl2::Sdl;

pub use effects::*;
pub use output::*;

/// Audio sample format (16-bit signed PCM)
pub type Sample = i16;

/// Audio buffer (mono samples)
pub type AudioBuffer = Vec<Sample>;

/// Square wave oscillator for one voice
#[derive(Clone, Copy, Debug, Default)]
struct Oscillator {
    /// Position within the current period, 0.0 - 1.0
    phase: f32,
}

impl Oscillator {
    fn next(&mut self, frequency: f32, sample_rate: u32) -> f32 {
        self.phase = (self.phase + frequency / sample_rate as f32).fract();
        if self.phase < 0.5 {
            1.0
        } else {
            -1.0
        }
    }
}

/// Audio system for rendering and outputting effects
pub struct AudioSystem {
    /// Sample rate
    sample_rate: u32,

    /// One oscillator per voice
    oscillators: [Oscillator; 3],

    /// One-pole smoothing state
    smoothed: f32,

    /// Audio output
    output: AudioOutput,

    /// Temporary buffer for processing
    buffer: AudioBuffer,

    /// Volume (0.0 - 1.0)
    volume: f32,
}

impl AudioSystem {
    /// Create a new audio system
    pub fn new(sdl_context: &Sdl, sample_rate: u32) -> Self {
        let output = AudioOutput::new(sdl_context, sample_rate);
        AudioSystem {
            sample_rate: output.sample_rate(),
            oscillators: [Oscillator::default(); 3],
            smoothed: 0.0,
            output,
            buffer: Vec::new(),
            volume: 0.25,
        }
    }

    /// Render `seconds` of audio for the voices currently sounding
    pub fn process(&mut self, sound: &SoundBoard, seconds: f32) {
        let count = (self.sample_rate as f32 * seconds) as usize;
        let tones: Vec<Option<f32>> = sound.voices.iter().map(Voice::tone).collect();

        self.buffer.clear();
        self.buffer.reserve(count);

        for _ in 0..count {
            let mut mixed = 0.0;
            for (oscillator, tone) in self.oscillators.iter_mut().zip(&tones) {
                if let Some(frequency) = tone {
                    mixed += oscillator.next(*frequency, self.sample_rate) / 3.0;
                }
            }

            // Take the edge off the square waves
            self.smoothed += (mixed - self.smoothed) * 0.3;

            self.buffer.push((self.smoothed * self.volume * 32767.0) as Sample);
        }

        self.output.queue_audio(&self.buffer);
    }

    /// Set volume (0.0 - 1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Get current volume
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Pause audio output
    pub fn pause(&mut self) {
        self.output.pause();
    }

    /// Resume audio output
    pub fn resume(&mut self) {
        self.output.resume();
    }

    /// Close audio output
    pub fn close(&mut self) {
        self.output.close();
    }
}
