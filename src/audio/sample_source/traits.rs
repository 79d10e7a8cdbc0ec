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
use std::path::Path;

use super::error::LoadError;

/// A decoded stream of audio frames read at the source's native sample rate.
/// Chunks are delivered in planar format: one Vec per channel.
pub trait SampleSource: Send {
    /// Get the next chunk of samples from the source in planar format.
    /// Each channel Vec is cleared and filled with up to max_frames samples.
    /// Returns the number of frames written (0 = EOF).
    ///
    /// The output slice must have exactly channel_count() elements.
    fn next_chunk(&mut self, output: &mut [Vec<f32>], max_frames: usize)
        -> Result<usize, LoadError>;

    /// Get the number of channels in this source
    fn channel_count(&self) -> u16;

    /// Get the native sample rate of this source
    fn sample_rate(&self) -> u32;

    /// Get the number of frames in this source, if the container reports it.
    fn frame_count(&self) -> Option<u64>;
}

impl SampleSource for Box<dyn SampleSource> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, LoadError> {
        (**self).next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn frame_count(&self) -> Option<u64> {
        (**self).frame_count()
    }
}

/// Opens sources by path. This is the file-decoding collaborator used by the
/// loader; it is expected to fail fast on files it cannot decode.
pub trait SourceDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleSource>, LoadError>;
}
