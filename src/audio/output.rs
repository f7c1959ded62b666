//! Audio output implementation
//!
//! Effect tones are rendered on the game thread and handed to SDL's audio
//! thread in blocks over a channel. The device callback plays them back in
//! mono and pads with silence when the game falls behind.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

use log::{debug, error, warn};
use sdl2::audio::{AudioCallback, AudioDevice, AudioSpecDesired};
use sdl2::Sdl;

use super::Sample;

/// Device buffer size in samples
const DEVICE_SAMPLES: u16 = 512;

/// Blocks of queued audio the callback keeps before dropping the oldest
const MAX_LATENCY_BLOCKS: usize = 4;

/// Callback end of the sample channel
struct EffectStream {
    pending: VecDeque<Sample>,
    blocks: Receiver<Vec<Sample>>,
}

impl AudioCallback for EffectStream {
    type Channel = Sample;

    fn callback(&mut self, out: &mut [Self::Channel]) {
        for block in self.blocks.try_iter() {
            self.pending.extend(block);
        }

        // Stay in step with the picture
        let limit = out.len() * MAX_LATENCY_BLOCKS;
        if self.pending.len() > limit {
            let excess = self.pending.len() - limit;
            self.pending.drain(..excess);
        }

        for dst in out.iter_mut() {
            *dst = self.pending.pop_front().unwrap_or(0);
        }
    }
}

/// Playback device fed from the game thread
pub struct AudioOutput {
    /// `None` when no device could be opened; output is then dropped
    device: Option<AudioDevice<EffectStream>>,
    blocks: Sender<Vec<Sample>>,
    sample_rate: u32,
}

impl AudioOutput {
    /// Open the default playback device
    ///
    /// A missing audio device is logged and leaves the output silent.
    pub fn new(sdl_context: &Sdl, sample_rate: u32) -> Self {
        let (sender, receiver) = channel();

        let mut sample_rate = sample_rate;
        let device = match open_device(sdl_context, sample_rate, receiver) {
            Ok(device) => {
                // The device may not grant the rate asked for
                sample_rate = device.spec().freq as u32;
                device.resume();
                Some(device)
            }
            Err(err) => {
                error!("Audio disabled: {}", err);
                None
            }
        };

        AudioOutput {
            device,
            blocks: sender,
            sample_rate,
        }
    }

    /// Queue a block of mono samples
    pub fn queue_audio(&mut self, samples: &[Sample]) {
        if self.device.is_none() || samples.is_empty() {
            return;
        }
        if let Err(err) = self.blocks.send(samples.to_vec()) {
            warn!("Audio block dropped: {}", err);
        }
    }

    pub fn pause(&mut self) {
        if let Some(device) = &self.device {
            device.pause();
        }
    }

    pub fn resume(&mut self) {
        if let Some(device) = &self.device {
            device.resume();
        }
    }

    /// Rate the device actually plays at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Close the device
    pub fn close(&mut self) {
        self.device = None;
    }
}

fn open_device(
    sdl_context: &Sdl,
    sample_rate: u32,
    blocks: Receiver<Vec<Sample>>,
) -> Result<AudioDevice<EffectStream>, String> {
    let audio_subsystem = sdl_context.audio()?;
    let desired_spec = AudioSpecDesired {
        freq: Some(sample_rate as i32),
        channels: Some(1),
        samples: Some(DEVICE_SAMPLES),
    };

    audio_subsystem.open_playback(None, &desired_spec, |spec| {
        debug!("Audio output: {}Hz, {} channel(s), {} samples", spec.freq, spec.channels, spec.samples);
        EffectStream {
            pending: VecDeque::with_capacity(spec.samples as usize * MAX_LATENCY_BLOCKS),
            blocks,
        }
    })
}
