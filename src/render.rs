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

//! Offline rendering: a simulated host that drives the processor block by
//! block over a scripted transport.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info, span, Level};

use crate::audio::{LoadError, SourceBuffer, SourceDecoder, SourceSlot};
use crate::config::{ConfigError, RenderConfig, SourceSpec, TransportAction};
use crate::engine::Processor;
use crate::loader::load_buffer;
use crate::params::Parameters;
use crate::selection::SourceKind;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unable to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: LoadError,
    },

    #[error("Unable to write WAV: {0}")]
    Wav(#[from] hound::Error),
}

/// A host transport driven by a script of seeks and stops, timed on the
/// render clock.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    position: f64,
    clock: f64,
    stopped_until: Option<f64>,
    actions: VecDeque<TransportAction>,
}

impl SimulatedTransport {
    pub fn new(start: f64, mut actions: Vec<TransportAction>) -> Self {
        actions.sort_by_key(|action| action.at());
        Self {
            position: start,
            clock: 0.0,
            stopped_until: None,
            actions: actions.into(),
        }
    }

    /// A transport that plays forward from `start` without interruption.
    pub fn playing_from(start: f64) -> Self {
        Self::new(start, Vec::new())
    }

    /// Returns the position to report for the next block and moves the
    /// transport on by `seconds` unless it is stopped.
    pub fn next_block(&mut self, seconds: f64) -> f64 {
        // Half a block of slack keeps floating point drift from delaying events.
        let due = self.clock + seconds / 2.0;
        while self
            .actions
            .front()
            .is_some_and(|action| action.at().as_secs_f64() <= due)
        {
            match self.actions.pop_front() {
                Some(TransportAction::Seek { to, .. }) => {
                    debug!(clock = self.clock, to = to.as_secs_f64(), "Transport seek");
                    self.position = to.as_secs_f64();
                }
                Some(TransportAction::Stop { duration, .. }) => {
                    debug!(clock = self.clock, seconds = duration.as_secs_f64(), "Transport stop");
                    self.stopped_until = Some(self.clock + duration.as_secs_f64());
                }
                None => break,
            }
        }

        let position = self.position;
        let stopped = self
            .stopped_until
            .is_some_and(|until| self.clock + seconds / 2.0 < until);
        if !stopped {
            self.position += seconds;
        }
        self.clock += seconds;
        position
    }
}

/// What happened over a render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub blocks: usize,
    /// Transport positions of every trigger.
    pub triggers: Vec<f64>,
    /// Transport positions where a seek was detected.
    pub discontinuities: Vec<f64>,
    /// Blocks where the source was rendered.
    pub playing_blocks: usize,
}

/// Rendered planar audio plus its report.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub report: RenderReport,
}

impl Rendered {
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Writes the audio as an interleaved 32-bit float WAV.
    pub fn write_wav(&self, path: &Path) -> Result<(), RenderError> {
        let spec = WavSpec {
            channels: self.channels.len() as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for frame in 0..self.frames() {
            for channel in self.channels.iter() {
                writer.write_sample(channel[frame])?;
            }
        }
        writer.finalize()?;
        Ok(())
    }
}

/// Plays the part of the audio host: fills blocks with input, reports the
/// transport position and collects the processed output.
pub struct OfflineHost {
    processor: Processor,
    sample_rate: u32,
    block_size: usize,
    channels: usize,
}

impl OfflineHost {
    pub fn new(mut processor: Processor, sample_rate: u32, block_size: usize, channels: usize) -> Self {
        let block_size = block_size.max(1);
        processor.prepare(sample_rate, block_size);
        Self {
            processor,
            sample_rate,
            block_size,
            channels: channels.max(1),
        }
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Renders `frames` frames. Without an input every channel carries silence.
    pub fn run(
        &mut self,
        transport: &mut SimulatedTransport,
        input: Option<&SourceBuffer>,
        frames: usize,
    ) -> Rendered {
        let block_seconds = self.block_size as f64 / self.sample_rate as f64;
        let input_channels = match input {
            Some(input) => input.channel_count().min(self.channels),
            None => self.channels,
        };

        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); self.channels];
        let mut block: Vec<Vec<f32>> = vec![vec![0.0; self.block_size]; self.channels];
        let mut report = RenderReport::default();
        let mut rendered = 0;

        while rendered < frames {
            let len = self.block_size.min(frames - rendered);
            for (ch, data) in block.iter_mut().enumerate() {
                let data = &mut data[..len];
                data.fill(0.0);
                if let Some(input) = input {
                    if ch < input_channels {
                        let window = input.window(ch, rendered, len);
                        data[..window.len()].copy_from_slice(window);
                    }
                }
            }

            let position = transport.next_block(block_seconds);
            let result = {
                let mut channels: Vec<&mut [f32]> =
                    block.iter_mut().map(|data| &mut data[..len]).collect();
                self.processor
                    .process(Some(position), &mut channels, input_channels)
            };

            if result.triggered() {
                info!(position, "Trigger");
                report.triggers.push(position);
            }
            if result.discontinuity() {
                info!(position, "Transport discontinuity");
                report.discontinuities.push(position);
            }
            if result.playing() {
                report.playing_blocks += 1;
            }
            report.blocks += 1;

            for (out, data) in output.iter_mut().zip(block.iter()) {
                out.extend_from_slice(&data[..len]);
            }
            rendered += len;
        }

        Rendered {
            channels: output,
            sample_rate: self.sample_rate,
            report,
        }
    }
}

/// Runs a whole render described by a config file.
pub fn render(config: &RenderConfig, decoder: &dyn SourceDecoder) -> Result<Rendered, RenderError> {
    let span = span!(Level::INFO, "render");
    let _enter = span.enter();

    let sample_rate = config.sample_rate();
    let params = Arc::new(Parameters::new());
    params.set_period(config.period());
    params.set_gain_db(config.gain_db());
    params.set_burst(config.burst()?.as_secs_f32());

    let slot = Arc::new(SourceSlot::new());
    match config.source() {
        SourceSpec::Builtin(kind) => params.set_selection(kind),
        SourceSpec::File(path) => {
            let buffer = load_buffer(decoder, &path, sample_rate).map_err(|source| {
                RenderError::Load {
                    path: path.display().to_string(),
                    source,
                }
            })?;
            slot.publish(Some(Arc::new(buffer)));
            params.set_selection(SourceKind::Sample);
        }
    }

    let input = match config.input() {
        Some(path) => Some(load_buffer(decoder, &path, sample_rate).map_err(|source| {
            RenderError::Load {
                path: path.display().to_string(),
                source,
            }
        })?),
        None => None,
    };

    let mut processor = Processor::new(params.clone(), slot);
    if let Some(seed) = config.seed() {
        processor = processor.with_noise_seed(seed);
    }

    let length: Duration = config.length()?;
    let frames = (length.as_secs_f64() * sample_rate as f64).round() as usize;
    let mut transport =
        SimulatedTransport::new(config.start()?.as_secs_f64(), config.transport_actions()?);
    let mut host = OfflineHost::new(
        processor,
        sample_rate,
        config.block_size(),
        config.channels() as usize,
    );

    info!(
        sample_rate,
        block_size = config.block_size(),
        channels = config.channels(),
        frames,
        period = params.period(),
        gain_db = params.gain_db(),
        source = %params.selection(),
        "Rendering"
    );
    let rendered = host.run(&mut transport, input.as_ref(), frames);
    info!(
        blocks = rendered.report.blocks,
        triggers = rendered.report.triggers.len(),
        "Render finished"
    );

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000;
    const BLOCK: usize = 10;
    const BLOCK_SECONDS: f64 = BLOCK as f64 / RATE as f64;

    fn host(params: Arc<Parameters>, slot: Arc<SourceSlot>) -> OfflineHost {
        OfflineHost::new(Processor::new(params, slot).with_noise_seed(3), RATE, BLOCK, 2)
    }

    #[test]
    fn test_transport_advances() {
        let mut transport = SimulatedTransport::playing_from(2.0);
        assert_eq!(transport.next_block(0.5), 2.0);
        assert_eq!(transport.next_block(0.5), 2.5);
        assert_eq!(transport.next_block(0.5), 3.0);
    }

    #[test]
    fn test_transport_seek_and_stop() {
        let mut transport = SimulatedTransport::new(
            0.0,
            vec![
                TransportAction::Stop {
                    at: Duration::from_secs(2),
                    duration: Duration::from_secs(1),
                },
                TransportAction::Seek {
                    at: Duration::from_secs(1),
                    to: Duration::from_secs(10),
                },
            ],
        );

        let positions: Vec<f64> = (0..8).map(|_| transport.next_block(0.5)).collect();
        assert_eq!(positions, vec![0.0, 0.5, 10.0, 10.5, 11.0, 11.0, 11.0, 11.5]);
    }

    #[test]
    fn test_passthrough_when_bypassed() {
        let params = Arc::new(Parameters::new());
        params.set_period(1.0);
        let input = SourceBuffer::from_planar(vec![vec![0.5; 3000], vec![-0.5; 3000]], 3000, RATE);

        let mut host = host(params, Arc::new(SourceSlot::new()));
        let rendered = host.run(&mut SimulatedTransport::playing_from(0.0), Some(&input), 3000);

        assert_eq!(rendered.frames(), 3000);
        assert_eq!(rendered.channels[0], input.channel(0));
        assert_eq!(rendered.channels[1], input.channel(1));
        assert_eq!(rendered.report.blocks, 300);
    }

    #[test]
    fn test_mono_input_clears_second_channel() {
        let params = Arc::new(Parameters::new());
        let input = SourceBuffer::from_planar(vec![vec![0.5; 100]], 100, RATE);

        let mut host = host(params, Arc::new(SourceSlot::new()));
        let rendered = host.run(&mut SimulatedTransport::playing_from(0.0), Some(&input), 100);

        assert!(rendered.channels[0].iter().all(|s| *s == 0.5));
        assert!(rendered.channels[1].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_partial_last_block() {
        let params = Arc::new(Parameters::new());
        let mut host = host(params, Arc::new(SourceSlot::new()));
        let rendered = host.run(&mut SimulatedTransport::playing_from(0.0), None, 105);

        assert_eq!(rendered.frames(), 105);
        assert_eq!(rendered.report.blocks, 11);
    }

    #[test]
    fn test_triggers_follow_period() {
        let params = Arc::new(Parameters::new());
        params.set_period(2.0);
        params.set_burst(0.5);
        params.set_selection(SourceKind::Beep);

        let mut host = host(params, Arc::new(SourceSlot::new()));
        let rendered = host.run(&mut SimulatedTransport::playing_from(0.0), None, 7000);

        assert_eq!(rendered.report.triggers.len(), 3);
        for (i, trigger) in rendered.report.triggers.iter().enumerate() {
            let expected = 2.0 * (i + 1) as f64;
            assert!(*trigger > expected - 1e-9);
            assert!(*trigger <= expected + (i + 1) as f64 * BLOCK_SECONDS + 1e-9);
        }
        // Three half-second bursts of 50 blocks each, give or take a block.
        assert!((150..=153).contains(&rendered.report.playing_blocks));
    }

    #[test]
    fn test_write_wav_interleaves() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.wav");
        let rendered = Rendered {
            channels: vec![vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]],
            sample_rate: 44100,
            report: RenderReport::default(),
        };
        rendered.write_wav(&path)?;

        let mut reader = hound::WavReader::open(&path)?;
        assert_eq!(reader.spec().channels, 2);
        let samples: Vec<f32> = reader.samples::<f32>().collect::<Result<_, _>>()?;
        assert_eq!(samples, vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
        Ok(())
    }
}
