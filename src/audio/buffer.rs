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

//! The armed sample, already converted to the host's processing rate.

use std::time::Duration;

/// Silent frames appended after the populated audio so that the last playback
/// block can read past the nominal end without leaving allocated memory.
pub const GUARD_FRAMES: usize = 4096;

/// An owned block of planar audio at the host rate. It is never mutated once
/// built; loading a new sample replaces the whole buffer.
pub struct SourceBuffer {
    /// One Vec per channel, each `frames + GUARD_FRAMES` long.
    channels: Vec<Vec<f32>>,
    /// Number of populated frames per channel.
    frames: usize,
    sample_rate: u32,
}

impl SourceBuffer {
    /// Builds a buffer from planar channel data. Each channel is cut or
    /// zero-extended to `frames` and then padded with the guard region.
    pub fn from_planar(mut channels: Vec<Vec<f32>>, frames: usize, sample_rate: u32) -> Self {
        for channel in channels.iter_mut() {
            channel.resize(frames, 0.0);
            channel.resize(frames + GUARD_FRAMES, 0.0);
        }

        Self {
            channels,
            frames,
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the number of populated frames, excluding the guard region.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Returns the number of frames actually allocated per channel.
    pub fn allocated_frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns the sample rate of the buffer, which is the host rate it was built for.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the playback length of the populated audio in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds())
    }

    /// Returns the populated samples of a channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        self.channels
            .get(channel)
            .map(|c| &c[..self.frames])
            .unwrap_or(&[])
    }

    /// Returns up to `len` samples of a channel starting at `offset`. The slice is
    /// clamped to allocated memory, so a window starting past the guard region is
    /// empty rather than out of bounds.
    #[inline]
    pub fn window(&self, channel: usize, offset: usize, len: usize) -> &[f32] {
        match self.channels.get(channel) {
            Some(data) => {
                let start = offset.min(data.len());
                let end = offset.saturating_add(len).min(data.len());
                &data[start..end]
            }
            None => &[],
        }
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.len() * self.allocated_frames() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("channels", &self.channels.len())
            .field("frames", &self.frames)
            .field("sample_rate", &self.sample_rate)
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}
