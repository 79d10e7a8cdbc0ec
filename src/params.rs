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

//! Host-facing parameters. Writers are the editor or automation; the audio
//! thread reads a snapshot once per block without locking.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::selection::SourceKind;

pub const MIN_PERIOD_SECONDS: f32 = 1.0;
pub const MAX_PERIOD_SECONDS: f32 = 60.0;
pub const DEFAULT_PERIOD_SECONDS: f32 = 15.0;

pub const MIN_GAIN_DB: f32 = -30.0;
pub const MAX_GAIN_DB: f32 = 12.0;
pub const DEFAULT_GAIN_DB: f32 = 0.0;

/// Gains at or below this are exact silence.
pub const MUTE_THRESHOLD_DB: f32 = -29.9;

pub const MIN_BURST_SECONDS: f32 = 0.01;
pub const MAX_BURST_SECONDS: f32 = 60.0;
pub const DEFAULT_BURST_SECONDS: f32 = 1.0;

/// Converts decibels to a linear gain, with the mute floor applied.
pub fn db_to_gain(db: f32) -> f32 {
    if db <= MUTE_THRESHOLD_DB {
        0.0
    } else {
        10.0_f32.powf(db / 20.0)
    }
}

/// The values the engine reads at the top of every block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    pub period_seconds: f64,
    pub gain_linear: f32,
    /// How long procedural sources play after a trigger.
    pub burst_seconds: f64,
    pub selection: SourceKind,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            period_seconds: DEFAULT_PERIOD_SECONDS as f64,
            gain_linear: db_to_gain(DEFAULT_GAIN_DB),
            burst_seconds: DEFAULT_BURST_SECONDS as f64,
            selection: SourceKind::default(),
        }
    }
}

/// Shared parameter store. Floats are kept as their bit patterns.
#[derive(Debug)]
pub struct Parameters {
    period: AtomicU32,
    gain_db: AtomicU32,
    burst: AtomicU32,
    selection: AtomicU8,
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            period: AtomicU32::new(DEFAULT_PERIOD_SECONDS.to_bits()),
            gain_db: AtomicU32::new(DEFAULT_GAIN_DB.to_bits()),
            burst: AtomicU32::new(DEFAULT_BURST_SECONDS.to_bits()),
            selection: AtomicU8::new(SourceKind::default().into()),
        }
    }

    pub fn period(&self) -> f32 {
        f32::from_bits(self.period.load(Ordering::Relaxed))
    }

    /// Sets the period in seconds. Clamped to 1-60; non-finite values are ignored.
    pub fn set_period(&self, seconds: f32) {
        if seconds.is_finite() {
            let seconds = seconds.clamp(MIN_PERIOD_SECONDS, MAX_PERIOD_SECONDS);
            self.period.store(seconds.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn gain_db(&self) -> f32 {
        f32::from_bits(self.gain_db.load(Ordering::Relaxed))
    }

    pub fn set_gain_db(&self, db: f32) {
        if db.is_finite() {
            let db = db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
            self.gain_db.store(db.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn burst(&self) -> f32 {
        f32::from_bits(self.burst.load(Ordering::Relaxed))
    }

    pub fn set_burst(&self, seconds: f32) {
        if seconds.is_finite() {
            let seconds = seconds.clamp(MIN_BURST_SECONDS, MAX_BURST_SECONDS);
            self.burst.store(seconds.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn selection(&self) -> SourceKind {
        SourceKind::from(self.selection.load(Ordering::Acquire))
    }

    pub fn set_selection(&self, kind: SourceKind) {
        self.selection.store(kind.into(), Ordering::Release);
    }

    /// Reads every parameter for one block.
    #[inline]
    pub fn snapshot(&self) -> PlaybackConfig {
        PlaybackConfig {
            period_seconds: self.period() as f64,
            gain_linear: db_to_gain(self.gain_db()),
            burst_seconds: self.burst() as f64,
            selection: self.selection(),
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}
