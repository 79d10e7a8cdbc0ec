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

//! An audio effect that follows a host transport and, every `period` seconds,
//! injects silence, a beep, noise or a loaded sample into the stream.
//!
//! [`engine::Processor`] runs on the audio thread. [`controller::Controller`]
//! is its non-real-time counterpart: it owns the parameters, loads files on a
//! worker thread and hands finished buffers over without locking.

pub mod audio;
pub mod config;
pub mod controller;
pub mod engine;
pub mod loader;
pub mod params;
pub mod render;
pub mod selection;
pub mod state;

#[cfg(test)]
mod testutil;

pub use controller::{Controller, SelectOutcome};
pub use engine::{BlockReport, Processor};
pub use params::{Parameters, PlaybackConfig};
pub use selection::SourceKind;
