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

//! Tracks the host transport position from block to block.

/// How many block durations the position may move between two calls before the
/// move is treated as a seek. Normal playback advances exactly one block.
pub const SEEK_TOLERANCE_BLOCKS: f64 = 2.0;

/// Transport positions, in seconds, as seen by the scheduler.
///
/// `last_trigger_position <= current_position` holds except right after a
/// discontinuity, when both are reset together.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportState {
    /// Host position reported for the current block.
    pub current_position: f64,
    /// Position of the most recent trigger (or of the last reset).
    pub last_trigger_position: f64,
    /// Position where the transport started or last landed after a seek.
    pub initial_position: f64,
    /// False when the host reports the same position twice in a row.
    pub is_moving: bool,
}

impl TransportState {
    /// Seconds elapsed since the last trigger.
    pub fn since_last_trigger(&self) -> f64 {
        self.current_position - self.last_trigger_position
    }

    fn reset_to(&mut self, position: f64) {
        self.current_position = position;
        self.last_trigger_position = position;
        self.initial_position = position;
    }
}

/// What the tracker observed for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportUpdate {
    /// First position seen since construction or reset.
    Started,
    /// The position advanced (or held) within tolerance.
    Continuous,
    /// The position jumped: a seek, a loop point or a restart.
    Discontinuity,
    /// The host did not report a usable position.
    Unavailable,
}

impl TransportUpdate {
    /// Whether the playhead must go back to the start of the source.
    pub fn resets_playhead(self) -> bool {
        matches!(self, TransportUpdate::Started | TransportUpdate::Discontinuity)
    }
}

/// Consumes the host position once per block.
#[derive(Debug, Clone)]
pub struct TransportTracker {
    state: TransportState,
    previous_position: Option<f64>,
    block_seconds: f64,
}

impl TransportTracker {
    /// Creates a tracker for blocks of the given duration.
    pub fn new(block_seconds: f64) -> Self {
        Self {
            state: TransportState::default(),
            previous_position: None,
            block_seconds,
        }
    }

    pub fn set_block_seconds(&mut self, block_seconds: f64) {
        self.block_seconds = block_seconds;
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TransportState {
        &mut self.state
    }

    /// Forgets the previous position so the next update starts fresh.
    pub fn reset(&mut self) {
        self.state = TransportState::default();
        self.previous_position = None;
    }

    /// Feeds the position reported for this block.
    pub fn update(&mut self, position: Option<f64>) -> TransportUpdate {
        let position = match position {
            Some(position) if position.is_finite() => position,
            _ => {
                self.state.is_moving = false;
                return TransportUpdate::Unavailable;
            }
        };

        let update = match self.previous_position {
            None => {
                self.state.is_moving = false;
                self.state.reset_to(position);
                TransportUpdate::Started
            }
            Some(previous) => {
                // Hosts keep calling process while stopped.
                self.state.is_moving = position != previous;

                if (position - previous).abs() > SEEK_TOLERANCE_BLOCKS * self.block_seconds {
                    self.state.reset_to(position);
                    TransportUpdate::Discontinuity
                } else {
                    self.state.current_position = position;
                    TransportUpdate::Continuous
                }
            }
        };

        self.previous_position = Some(position);
        update
    }
}
