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

//! Offline conversion of a decoded source into a [`SourceBuffer`] at the host rate.
//!
//! Conversion happens once, synchronously, at load time. The sinc filter lives
//! only for the duration of [`Resampler::resample`].

use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};
use tracing::debug;

use super::buffer::{SourceBuffer, GUARD_FRAMES};
use super::sample_source::{LoadError, SampleSource};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Converts sources read at their native rate into buffers at a fixed target rate.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    target_rate: u32,
}

impl Resampler {
    /// Creates a resampler producing buffers at the given host rate.
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    /// Returns the host rate buffers are produced at.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Reads the whole source and returns it as a guarded buffer at the target rate.
    pub fn resample<S: SampleSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<SourceBuffer, LoadError> {
        let native_rate = source.sample_rate();
        if native_rate == 0 {
            return Err(LoadError::InvalidSampleRate(native_rate));
        }
        if self.target_rate == 0 {
            return Err(LoadError::InvalidSampleRate(self.target_rate));
        }
        let channels = source.channel_count() as usize;
        if channels == 0 {
            return Err(LoadError::Unsupported("source has no channels".to_string()));
        }

        if native_rate == self.target_rate {
            debug!(rate = native_rate, channels, "Source already at host rate");
            return self.copy_through(source, channels);
        }

        debug!(
            source_rate = native_rate,
            target_rate = self.target_rate,
            channels,
            "Resampling source"
        );
        self.convert(source, channels, native_rate)
    }

    /// Reads the source without conversion and pads it with the guard region.
    fn copy_through<S: SampleSource + ?Sized>(
        &self,
        source: &mut S,
        channels: usize,
    ) -> Result<SourceBuffer, LoadError> {
        let capacity = source.frame_count().unwrap_or(0) as usize + GUARD_FRAMES;
        let mut planes: Vec<Vec<f32>> = vec![Vec::with_capacity(capacity); channels];
        let mut chunk = vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels];

        loop {
            let read = source.next_chunk(&mut chunk, INPUT_BLOCK_SIZE)?;
            if read == 0 {
                break;
            }
            for (plane, data) in planes.iter_mut().zip(chunk.iter()) {
                plane.extend_from_slice(&data[..read]);
            }
        }

        let frames = planes.first().map(|p| p.len()).unwrap_or(0);
        if frames == 0 {
            return Err(LoadError::EmptySource);
        }

        Ok(SourceBuffer::from_planar(planes, frames, self.target_rate))
    }

    /// Streams the source through a sinc filter. The filter's output delay is
    /// trimmed from the front so frame 0 of the buffer lines up with frame 0 of
    /// the source.
    fn convert<S: SampleSource + ?Sized>(
        &self,
        source: &mut S,
        channels: usize,
        native_rate: u32,
    ) -> Result<SourceBuffer, LoadError> {
        let failed = |_e| LoadError::ResamplingFailed(native_rate, self.target_rate);

        let sinc_params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            oversampling_factor: 128,
            interpolation: SincInterpolationType::Linear,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = self.target_rate as f64 / native_rate as f64;
        let mut resampler =
            SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, channels)
                .map_err(|_e| LoadError::ResamplingFailed(native_rate, self.target_rate))?;
        let delay = resampler.output_delay();

        let estimate = source
            .frame_count()
            .map(|n| output_frame_count(n, native_rate, self.target_rate))
            .unwrap_or(0);
        let mut output: Vec<Vec<f32>> =
            vec![Vec::with_capacity(estimate + delay + GUARD_FRAMES); channels];
        let mut scratch = resampler.output_buffer_allocate(true);
        let mut input: Vec<Vec<f32>> = vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels];
        let mut chunk: Vec<Vec<f32>> = vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels];
        let mut native_frames: u64 = 0;
        let mut source_finished = false;

        while !source_finished {
            while input[0].len() < INPUT_BLOCK_SIZE {
                let read = source.next_chunk(&mut chunk, INPUT_BLOCK_SIZE - input[0].len())?;
                if read == 0 {
                    source_finished = true;
                    break;
                }
                native_frames += read as u64;
                for (pending, data) in input.iter_mut().zip(chunk.iter()) {
                    pending.extend_from_slice(&data[..read]);
                }
            }

            let pending = input[0].len();
            if pending == 0 {
                break;
            }

            let (_nbr_in, nbr_out) = if pending == INPUT_BLOCK_SIZE {
                resampler
                    .process_into_buffer(&input, &mut scratch, None)
                    .map_err(failed)?
            } else {
                resampler
                    .process_partial_into_buffer(Some(input.as_slice()), &mut scratch, None)
                    .map_err(failed)?
            };
            append_frames(&mut output, &scratch, nbr_out);
            for pending in input.iter_mut() {
                pending.clear();
            }
        }

        if native_frames == 0 {
            return Err(LoadError::EmptySource);
        }
        let frames = output_frame_count(native_frames, native_rate, self.target_rate);
        if frames == 0 {
            return Err(LoadError::EmptySource);
        }

        // Flush the filter tail until the delayed output covers the whole source.
        let max_flushes = (delay + frames) / INPUT_BLOCK_SIZE + 4;
        let mut flushes = 0;
        while output[0].len() < delay + frames && flushes < max_flushes {
            let (_nbr_in, nbr_out) = resampler
                .process_partial_into_buffer(None::<&[Vec<f32>]>, &mut scratch, None)
                .map_err(failed)?;
            append_frames(&mut output, &scratch, nbr_out);
            flushes += 1;
        }

        for plane in output.iter_mut() {
            let skip = delay.min(plane.len());
            plane.drain(..skip);
        }

        Ok(SourceBuffer::from_planar(output, frames, self.target_rate))
    }
}

/// Number of frames a source of `native_frames` occupies at the target rate,
/// i.e. `ceil(native_frames / (native_rate / target_rate))`.
pub fn output_frame_count(native_frames: u64, native_rate: u32, target_rate: u32) -> usize {
    if native_rate == 0 {
        return 0;
    }
    let numerator = native_frames as u128 * target_rate as u128;
    let frames = numerator.div_ceil(native_rate as u128);
    usize::try_from(frames).unwrap_or(usize::MAX)
}

fn append_frames(output: &mut [Vec<f32>], scratch: &[Vec<f32>], frames: usize) {
    for (out, data) in output.iter_mut().zip(scratch.iter()) {
        out.extend_from_slice(&data[..frames.min(data.len())]);
    }
}
