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

//! The per-block entry point called from the host's audio callback.
//!
//! Nothing in here blocks, allocates, logs or touches the file system. The
//! only shared state is the parameter atomics and the published buffer slot.

use std::sync::Arc;

use crate::audio::{SourceBuffer, SourceSlot};
use crate::params::{Parameters, PlaybackConfig};
use crate::selection::SourceKind;

use super::renderer::{ActiveSource, SignalRenderer};
use super::scheduler::{Decision, SchedulerState, TriggerScheduler};
use super::transport::{TransportState, TransportTracker, TransportUpdate};

pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// What happened during one block. Returned instead of logged so the audio
/// thread stays silent; non-real-time callers may log it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReport {
    pub transport: TransportUpdate,
    pub decision: Decision,
    /// A newly published buffer was picked up at the start of this block.
    pub buffer_swapped: bool,
}

impl BlockReport {
    pub fn triggered(&self) -> bool {
        self.decision == Decision::Trigger
    }

    pub fn playing(&self) -> bool {
        self.decision.is_playing()
    }

    pub fn discontinuity(&self) -> bool {
        self.transport == TransportUpdate::Discontinuity
    }

    /// The host did not report a position, so the block was passed through.
    pub fn degraded(&self) -> bool {
        self.transport == TransportUpdate::Unavailable
    }
}

/// The processing engine.
pub struct Processor {
    params: Arc<Parameters>,
    slot: Arc<SourceSlot>,
    /// The buffer in use. Only replaced between blocks.
    buffer: Option<Arc<SourceBuffer>>,
    /// A buffer that could not be retired yet because the retire channel was full.
    pending_retire: Option<Arc<SourceBuffer>>,
    tracker: TransportTracker,
    scheduler: TriggerScheduler,
    renderer: SignalRenderer,
    playhead: usize,
    sample_rate: u32,
    max_block_size: usize,
}

impl Processor {
    pub fn new(params: Arc<Parameters>, slot: Arc<SourceSlot>) -> Self {
        let mut processor = Self {
            params,
            slot,
            buffer: None,
            pending_retire: None,
            tracker: TransportTracker::new(0.0),
            scheduler: TriggerScheduler::new(),
            renderer: SignalRenderer::new(DEFAULT_SAMPLE_RATE as f32),
            playhead: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: DEFAULT_BLOCK_SIZE,
        };
        processor.prepare(DEFAULT_SAMPLE_RATE, DEFAULT_BLOCK_SIZE);
        processor
    }

    /// Replaces the noise generator with a seeded one.
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.renderer = SignalRenderer::with_seed(self.sample_rate as f32, seed);
        self
    }

    /// Called by the host before processing starts or whenever the stream
    /// format changes. Resets the transport and the playhead.
    pub fn prepare(&mut self, sample_rate: u32, max_block_size: usize) {
        self.sample_rate = sample_rate.max(1);
        self.max_block_size = max_block_size.max(1);
        self.tracker
            .set_block_seconds(self.max_block_size as f64 / self.sample_rate as f64);
        self.tracker.reset();
        self.scheduler.reset();
        self.renderer.set_sample_rate(self.sample_rate as f32);
        self.playhead = 0;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn playhead(&self) -> usize {
        self.playhead
    }

    pub fn transport(&self) -> &TransportState {
        self.tracker.state()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// The buffer currently used for sample playback.
    pub fn buffer(&self) -> Option<&SourceBuffer> {
        self.buffer.as_deref()
    }

    pub fn params(&self) -> &Arc<Parameters> {
        &self.params
    }

    /// Processes one block in place.
    ///
    /// `position` is the host transport position in seconds, if the host has
    /// one. `channels` holds the output channels, pre-filled with the input
    /// for the first `input_channels` of them.
    pub fn process(
        &mut self,
        position: Option<f64>,
        channels: &mut [&mut [f32]],
        input_channels: usize,
    ) -> BlockReport {
        let config = self.params.snapshot();
        let buffer_swapped = self.refresh_buffer();

        let transport = self.tracker.update(position);
        if transport.resets_playhead() {
            self.playhead = 0;
        }

        let decision = if transport == TransportUpdate::Unavailable {
            self.scheduler.reset();
            Decision::Idle
        } else {
            let duration = self.source_duration(&config);
            self.scheduler
                .step(self.tracker.state_mut(), config.period_seconds, duration)
        };
        if decision == Decision::Trigger {
            self.playhead = 0;
        }

        // Outputs with no matching input carry nothing from the host.
        for channel in channels.iter_mut().skip(input_channels) {
            channel.fill(0.0);
        }

        if decision.is_playing() {
            let source = match config.selection {
                SourceKind::Bypass => ActiveSource::Bypass,
                SourceKind::Silence => ActiveSource::Silence,
                SourceKind::Beep => ActiveSource::Beep,
                SourceKind::Noise => ActiveSource::Noise,
                SourceKind::Sample => match self.buffer.as_deref() {
                    Some(buffer) => ActiveSource::Sample(buffer),
                    None => ActiveSource::Bypass,
                },
            };
            self.renderer
                .render(source, channels, self.playhead, config.gain_linear);

            let frames = channels.first().map(|c| c.len()).unwrap_or(0);
            self.playhead = self.playhead.saturating_add(frames);
        }

        BlockReport {
            transport,
            decision,
            buffer_swapped,
        }
    }

    /// How long the selected source plays after a trigger.
    fn source_duration(&self, config: &PlaybackConfig) -> f64 {
        match config.selection {
            SourceKind::Bypass => 0.0,
            SourceKind::Silence | SourceKind::Beep | SourceKind::Noise => config.burst_seconds,
            SourceKind::Sample => self
                .buffer
                .as_ref()
                .map(|buffer| buffer.duration_seconds())
                .unwrap_or(0.0),
        }
    }

    /// Picks up a newly published buffer. The old one goes back to the loader
    /// for deallocation; if that is not possible this block, the swap waits.
    fn refresh_buffer(&mut self) -> bool {
        if let Some(pending) = self.pending_retire.take() {
            if let Err(pending) = self.slot.retire(pending) {
                self.pending_retire = Some(pending);
                return false;
            }
        }

        let next = {
            let published = self.slot.load();
            let unchanged = match ((*published).as_ref(), self.buffer.as_ref()) {
                (Some(published), Some(current)) => Arc::ptr_eq(published, current),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return false;
            }
            (*published).clone()
        };

        if let Some(previous) = std::mem::replace(&mut self.buffer, next) {
            if let Err(previous) = self.slot.retire(previous) {
                self.pending_retire = Some(previous);
            }
        }
        true
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("sample_rate", &self.sample_rate)
            .field("max_block_size", &self.max_block_size)
            .field("playhead", &self.playhead)
            .field("transport", self.tracker.state())
            .field("scheduler", &self.scheduler.state())
            .field("buffer", &self.buffer)
            .finish()
    }
}
