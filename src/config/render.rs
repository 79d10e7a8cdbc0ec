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
use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::params::{DEFAULT_BURST_SECONDS, DEFAULT_GAIN_DB, DEFAULT_PERIOD_SECONDS};
use crate::selection::SourceKind;

const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_BLOCK_SIZE: usize = 512;
const DEFAULT_CHANNELS: u16 = 2;

/// A YAML representation of an offline render.
#[derive(Deserialize, Clone, Debug)]
pub struct RenderConfig {
    /// Host sample rate in Hz (default: 48000).
    sample_rate: Option<u32>,

    /// Frames per block (default: 512).
    block_size: Option<usize>,

    /// Output channels (default: 2).
    channels: Option<u16>,

    /// How much audio to render, e.g. "30s".
    length: String,

    /// Trigger period in seconds.
    period: Option<f32>,

    /// Gain in dB.
    gain_db: Option<f32>,

    /// How long procedural sources play after a trigger, e.g. "500ms".
    burst: Option<String>,

    /// none, silence, beep, noise, or a path to an audio file.
    source: Option<String>,

    /// An audio file fed to the effect as its input.
    input: Option<String>,

    /// Transport position the render starts at, e.g. "0s".
    start: Option<String>,

    /// Seed for the noise source.
    seed: Option<u64>,

    /// Scripted transport events.
    #[serde(default)]
    transport: Vec<TransportEvent>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

/// A scripted change to the simulated host transport.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransportEvent {
    /// Jump the transport to `to` once the render reaches `at`.
    Seek { at: String, to: String },
    /// Hold the transport position for a while.
    Stop {
        at: String,
        #[serde(rename = "for")]
        duration: String,
    },
}

/// A transport event with its times parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportAction {
    Seek { at: Duration, to: Duration },
    Stop { at: Duration, duration: Duration },
}

impl TransportAction {
    pub fn at(&self) -> Duration {
        match self {
            TransportAction::Seek { at, .. } | TransportAction::Stop { at, .. } => *at,
        }
    }
}

/// What the effect injects.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    Builtin(SourceKind),
    File(PathBuf),
}

fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Into::into)
        .map_err(|e| ConfigError::Duration(value.to_string(), e.to_string()))
}

impl RenderConfig {
    /// Checks values that serde cannot.
    pub(super) fn validate(mut self, base_path: &Path) -> Result<RenderConfig, ConfigError> {
        self.base_path = base_path.to_path_buf();

        if self.sample_rate() == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if self.block_size() == 0 {
            return Err(ConfigError::Invalid("block_size must be positive".to_string()));
        }
        if self.channels() == 0 {
            return Err(ConfigError::Invalid("channels must be positive".to_string()));
        }
        self.length()?;
        self.burst()?;
        self.start()?;
        self.transport_actions()?;
        Ok(self)
    }

    /// Returns the sample rate (default: 48000).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the block size (default: 512).
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// Returns the number of output channels (default: 2).
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn length(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.length)
    }

    pub fn period(&self) -> f32 {
        self.period.unwrap_or(DEFAULT_PERIOD_SECONDS)
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db.unwrap_or(DEFAULT_GAIN_DB)
    }

    pub fn burst(&self) -> Result<Duration, ConfigError> {
        match &self.burst {
            Some(burst) => parse_duration(burst),
            None => Ok(Duration::from_secs_f32(DEFAULT_BURST_SECONDS)),
        }
    }

    pub fn start(&self) -> Result<Duration, ConfigError> {
        match &self.start {
            Some(start) => parse_duration(start),
            None => Ok(Duration::ZERO),
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Returns the source. Anything that is not a built-in name is a file path.
    pub fn source(&self) -> SourceSpec {
        match self.source.as_deref() {
            None => SourceSpec::Builtin(SourceKind::Bypass),
            Some(source) => match SourceKind::from_label(source) {
                Some(kind) => SourceSpec::Builtin(kind),
                None => SourceSpec::File(self.resolve(source)),
            },
        }
    }

    /// Returns the input file, if any.
    pub fn input(&self) -> Option<PathBuf> {
        self.input.as_deref().map(|input| self.resolve(input))
    }

    /// Returns the transport events, ordered by time.
    pub fn transport_actions(&self) -> Result<Vec<TransportAction>, ConfigError> {
        let mut actions = self
            .transport
            .iter()
            .map(|event| match event {
                TransportEvent::Seek { at, to } => Ok(TransportAction::Seek {
                    at: parse_duration(at)?,
                    to: parse_duration(to)?,
                }),
                TransportEvent::Stop { at, duration } => Ok(TransportAction::Stop {
                    at: parse_duration(at)?,
                    duration: parse_duration(duration)?,
                }),
            })
            .collect::<Result<Vec<TransportAction>, ConfigError>>()?;
        actions.sort_by_key(|action| action.at());
        Ok(actions)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.base_path.join(path)
        }
    }
}
