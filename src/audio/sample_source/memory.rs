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
use super::error::LoadError;
use super::traits::SampleSource;

/// A sample source that produces planar samples from memory.
pub struct MemorySampleSource {
    /// Planar sample storage (one Vec per channel)
    planar_samples: Vec<Vec<f32>>,
    /// Current position in frames
    current_frame: usize,
    sample_rate: u32,
}

impl MemorySampleSource {
    /// Creates a new memory sample source from planar samples. All channels are
    /// truncated to the shortest one.
    pub fn new(mut planar_samples: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = planar_samples.iter().map(Vec::len).min().unwrap_or(0);
        for channel in planar_samples.iter_mut() {
            channel.truncate(frames);
        }

        Self {
            planar_samples,
            current_frame: 0,
            sample_rate,
        }
    }

    /// Creates a new memory sample source from interleaved samples.
    pub fn from_interleaved(interleaved: &[f32], channel_count: u16, sample_rate: u32) -> Self {
        let channels = channel_count as usize;
        let frames = if channels > 0 {
            interleaved.len() / channels
        } else {
            0
        };

        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels.max(1)).take(frames) {
            for (ch, sample) in frame.iter().enumerate() {
                planar[ch].push(*sample);
            }
        }

        Self::new(planar, sample_rate)
    }

    fn total_frames(&self) -> usize {
        self.planar_samples.first().map(|c| c.len()).unwrap_or(0)
    }
}

impl SampleSource for MemorySampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, LoadError> {
        if output.len() != self.planar_samples.len() {
            return Err(LoadError::Unsupported(format!(
                "output has {} channels, expected {}",
                output.len(),
                self.planar_samples.len()
            )));
        }

        for ch in output.iter_mut() {
            ch.clear();
        }

        let available = self.total_frames().saturating_sub(self.current_frame);
        let to_copy = available.min(max_frames);

        if to_copy > 0 {
            for (out_ch, plane) in output.iter_mut().zip(self.planar_samples.iter()) {
                out_ch.extend_from_slice(&plane[self.current_frame..self.current_frame + to_copy]);
            }
            self.current_frame += to_copy;
        }

        Ok(to_copy)
    }

    fn channel_count(&self) -> u16 {
        self.planar_samples.len() as u16
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.total_frames() as u64)
    }
}
