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

//! Decides, once per block, whether the armed source fires, keeps playing or stays quiet.

use super::transport::TransportState;

/// Trigger positions at or below this are treated as "never triggered".
pub const TRIGGER_EPSILON: f64 = 0.0001;

/// Whether the source is currently being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Playing,
}

/// The outcome of one scheduling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A period boundary passed: restart the source from frame 0.
    Trigger,
    /// Still inside the source's duration since the last trigger.
    Continue,
    /// Nothing to render this block.
    Idle,
}

impl Decision {
    pub fn is_playing(self) -> bool {
        !matches!(self, Decision::Idle)
    }
}

/// Pure decision over the transport state, the period and the source duration.
pub fn decide(transport: &TransportState, period: f64, source_duration: f64) -> Decision {
    if !transport.is_moving {
        return Decision::Idle;
    }

    if transport.last_trigger_position + period < transport.current_position {
        return Decision::Trigger;
    }

    // The initial-position guard keeps a fresh start or a seek that lands on a
    // period boundary from looking like a trigger already in progress.
    if transport.since_last_trigger() < source_duration
        && transport.last_trigger_position > TRIGGER_EPSILON
        && transport.last_trigger_position > transport.initial_position
    {
        return Decision::Continue;
    }

    Decision::Idle
}

/// The Idle/Playing state machine.
#[derive(Debug, Clone, Default)]
pub struct TriggerScheduler {
    state: SchedulerState,
}

impl TriggerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == SchedulerState::Playing
    }

    /// Forces the scheduler back to Idle.
    pub fn reset(&mut self) {
        self.state = SchedulerState::Idle;
    }

    /// Runs one step. A trigger moves the last trigger position up to the
    /// current position; the caller resets its playhead.
    pub fn step(
        &mut self,
        transport: &mut TransportState,
        period: f64,
        source_duration: f64,
    ) -> Decision {
        let decision = decide(transport, period, source_duration);

        if decision == Decision::Trigger {
            transport.last_trigger_position = transport.current_position;
        }

        self.state = if decision.is_playing() {
            SchedulerState::Playing
        } else {
            SchedulerState::Idle
        };

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(current: f64, last: f64, initial: f64, moving: bool) -> TransportState {
        TransportState {
            current_position: current,
            last_trigger_position: last,
            initial_position: initial,
            is_moving: moving,
        }
    }

    #[test]
    fn test_triggers_after_period() {
        assert_eq!(decide(&transport(5.01, 0.0, 0.0, true), 5.0, 1.0), Decision::Trigger);
        assert_eq!(decide(&transport(4.99, 0.0, 0.0, true), 5.0, 1.0), Decision::Idle);
        // The boundary itself is not past it.
        assert_eq!(decide(&transport(5.0, 0.0, 0.0, true), 5.0, 1.0), Decision::Idle);
    }

    #[test]
    fn test_no_trigger_when_stopped() {
        assert_eq!(decide(&transport(50.0, 0.0, 0.0, false), 5.0, 1.0), Decision::Idle);
        assert_eq!(decide(&transport(5.5, 5.0, 0.0, false), 5.0, 1.0), Decision::Idle);
    }

    #[test]
    fn test_continue_within_duration() {
        assert_eq!(decide(&transport(6.0, 5.0, 0.0, true), 5.0, 2.0), Decision::Continue);
        assert_eq!(decide(&transport(7.0, 5.0, 0.0, true), 5.0, 2.0), Decision::Idle);
    }

    #[test]
    fn test_continue_requires_trigger_after_initial() {
        // A seek landed at 12s: last == initial, nothing is in progress.
        assert_eq!(decide(&transport(12.01, 12.0, 12.0, true), 5.0, 2.0), Decision::Idle);
        // A real trigger after the seek is.
        assert_eq!(decide(&transport(17.5, 17.1, 12.0, true), 5.0, 2.0), Decision::Continue);
    }

    #[test]
    fn test_continue_requires_trigger_past_epsilon() {
        assert_eq!(
            decide(&transport(0.00005, 0.00001, -1.0, true), 5.0, 2.0),
            Decision::Idle
        );
    }

    #[test]
    fn test_step_updates_last_trigger() {
        let mut scheduler = TriggerScheduler::new();
        let mut state = transport(5.01, 0.0, 0.0, true);

        assert_eq!(scheduler.step(&mut state, 5.0, 1.0), Decision::Trigger);
        assert_eq!(state.last_trigger_position, 5.01);
        assert!(scheduler.is_playing());

        state.current_position = 5.5;
        assert_eq!(scheduler.step(&mut state, 5.0, 1.0), Decision::Continue);
        assert_eq!(scheduler.state(), SchedulerState::Playing);

        state.current_position = 6.2;
        assert_eq!(scheduler.step(&mut state, 5.0, 1.0), Decision::Idle);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.reset();
        assert!(!scheduler.is_playing());
    }

    #[test]
    fn test_fires_once_per_period() {
        let block = 256.0 / 44100.0;
        let mut scheduler = TriggerScheduler::new();
        let mut state = transport(0.0, 0.0, 0.0, true);
        let mut triggers = Vec::new();

        for i in 1..(60.0 / block) as usize {
            state.current_position = i as f64 * block;
            if scheduler.step(&mut state, 3.0, 0.5) == Decision::Trigger {
                triggers.push(state.current_position);
            }
        }

        assert_eq!(triggers.len(), 19);
        for pair in triggers.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap > 3.0, "triggered early: {}", gap);
            assert!(gap <= 3.0 + block + 1e-9, "triggered late: {}", gap);
        }
    }
}
