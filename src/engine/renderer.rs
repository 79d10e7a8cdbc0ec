// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Writes the active source into the host's output buffer.

use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::SourceBuffer;

/// Peak amplitude of the injected noise before gain.
pub const NOISE_AMPLITUDE: f32 = 0.09;

/// Frequency of the beep tone in Hz.
pub const BEEP_FREQUENCY: f32 = 880.0;

/// Peak amplitude of the beep tone before gain.
pub const BEEP_AMPLITUDE: f32 = 0.25;

/// The source rendered for one block. Chosen between blocks, never mid-block.
#[derive(Clone, Copy)]
pub enum ActiveSource<'a> {
    /// Leave the buffer untouched.
    Bypass,
    /// Replace the buffer with silence.
    Silence,
    /// Add a sine tone.
    Beep,
    /// Add uniform white noise.
    Noise,
    /// Add the armed sample.
    Sample(&'a SourceBuffer),
}

impl std::fmt::Debug for ActiveSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActiveSource::Bypass => write!(f, "Bypass"),
            ActiveSource::Silence => write!(f, "Silence"),
            ActiveSource::Beep => write!(f, "Beep"),
            ActiveSource::Noise => write!(f, "Noise"),
            ActiveSource::Sample(buffer) => write!(f, "Sample({:?})", buffer),
        }
    }
}

/// Renders sources into planar output channels. Holds the noise generator so
/// nothing is allocated per block.
pub struct SignalRenderer {
    rng: StdRng,
    sample_rate: f32,
}

impl SignalRenderer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            sample_rate,
        }
    }

    /// Creates a renderer with a deterministic noise sequence.
    pub fn with_seed(sample_rate: f32, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sample_rate,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Renders one playing block. `playhead` is the frame offset of the first
    /// frame of this block into the source; advancing it is the caller's job.
    pub fn render(
        &mut self,
        source: ActiveSource<'_>,
        channels: &mut [&mut [f32]],
        playhead: usize,
        gain: f32,
    ) {
        match source {
            ActiveSource::Bypass => {}
            ActiveSource::Silence => {
                for channel in channels.iter_mut() {
                    channel.fill(0.0);
                }
            }
            ActiveSource::Beep => {
                if gain == 0.0 || self.sample_rate <= 0.0 {
                    return;
                }
                let step = TAU * BEEP_FREQUENCY / self.sample_rate;
                let amplitude = BEEP_AMPLITUDE * gain;
                for channel in channels.iter_mut() {
                    for (i, out) in channel.iter_mut().enumerate() {
                        // Wrap the frame index to one second so the phase keeps its precision.
                        let frame = (playhead + i) % self.sample_rate as usize;
                        *out += amplitude * (step * frame as f32).sin();
                    }
                }
            }
            ActiveSource::Noise => {
                if gain == 0.0 {
                    return;
                }
                for channel in channels.iter_mut() {
                    for out in channel.iter_mut() {
                        *out += gain * self.rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
                    }
                }
            }
            ActiveSource::Sample(buffer) => {
                let source_channels = buffer.channel_count();
                if gain == 0.0 || source_channels == 0 {
                    return;
                }
                for (ch, channel) in channels.iter_mut().enumerate() {
                    // Fewer source channels than outputs wrap around (mono feeds every output).
                    let frames = channel.len();
                    let window = buffer.window(ch % source_channels, playhead, frames);
                    for (out, sample) in channel.iter_mut().zip(window.iter()) {
                        *out += gain * sample;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for SignalRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRenderer")
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
