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
/// Error types for loading a source file into a playback buffer.
///
/// Every variant is a recoverable load failure: the previously armed source
/// stays active and the caller only receives a failed-load signal.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Resampling failed: {0}Hz -> {1}Hz")]
    ResamplingFailed(u32, u32),

    #[error("Unsupported audio source {0}")]
    Unsupported(String),

    #[error("Audio source contains no frames")]
    EmptySource,

    #[error("Invalid sample rate {0}Hz")]
    InvalidSampleRate(u32),

    #[error("Audio file error: {0}")]
    AudioError(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
