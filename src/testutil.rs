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
use std::{
    collections::HashMap,
    error::Error,
    fs::File,
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::sample_source::{LoadError, MemorySampleSource, SampleSource, SourceDecoder};

/// Audio test utilities for generating test signals and validating results
pub mod audio_test_utils {
    use std::f32::consts::PI;

    /// Generate a sine wave
    pub fn sine(frequency: f32, amplitude: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    /// Calculate RMS (Root Mean Square) of a signal
    pub fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
        (sum_squares / samples.len() as f32).sqrt()
    }
}

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }

        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}

/// Writes planar f32 channels as an interleaved 32-bit float WAV.
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = samples.iter().map(|c| c.len()).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in samples.iter() {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// A decoder serving in-memory sources by path, with optional artificial delays.
#[derive(Debug, Default, Clone)]
pub struct MemoryDecoder {
    sources: HashMap<PathBuf, (Vec<Vec<f32>>, u32)>,
    delays: HashMap<PathBuf, Duration>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source<P: AsRef<Path>>(
        mut self,
        path: P,
        planar: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> Self {
        self.sources
            .insert(path.as_ref().to_path_buf(), (planar, sample_rate));
        self
    }

    pub fn with_delay<P: AsRef<Path>>(mut self, path: P, delay: Duration) -> Self {
        self.delays.insert(path.as_ref().to_path_buf(), delay);
        self
    }
}

impl SourceDecoder for MemoryDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleSource>, LoadError> {
        if let Some(delay) = self.delays.get(path) {
            thread::sleep(*delay);
        }
        match self.sources.get(path) {
            Some((planar, sample_rate)) => Ok(Box::new(MemorySampleSource::new(
                planar.clone(),
                *sample_rate,
            ))),
            None => Err(LoadError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ))),
        }
    }
}
