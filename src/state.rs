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

//! The state a host saves with a session. Audio is never persisted: a sample
//! is re-decoded from its path on restore.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::params::{DEFAULT_BURST_SECONDS, DEFAULT_GAIN_DB, DEFAULT_PERIOD_SECONDS};
use crate::selection::{LoadedFile, SourceKind};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Unable to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Unable to parse state: {0}")]
    Parse(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Index into the selection menu.
    pub selection: usize,
    /// The kind behind the selection.
    pub kind: SourceKind,
    /// The file the sample was loaded from, when the kind is a sample.
    pub sample_path: Option<PathBuf>,
    /// Previously loaded files, in menu order.
    pub loaded_files: Vec<LoadedFile>,
    pub period: f32,
    pub gain_db: f32,
    pub burst: f32,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            selection: 0,
            kind: SourceKind::default(),
            sample_path: None,
            loaded_files: Vec::new(),
            period: DEFAULT_PERIOD_SECONDS,
            gain_db: DEFAULT_GAIN_DB,
            burst: DEFAULT_BURST_SECONDS,
        }
    }
}

impl PersistedState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, StateError> {
        serde_json::to_vec_pretty(self).map_err(StateError::Serialize)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        serde_json::from_slice(bytes).map_err(StateError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() -> Result<(), StateError> {
        let state = PersistedState {
            selection: 5,
            kind: SourceKind::Sample,
            sample_path: Some(PathBuf::from("/samples/b.wav")),
            loaded_files: vec![
                LoadedFile::from_path(std::path::Path::new("/samples/a.wav")),
                LoadedFile::from_path(std::path::Path::new("/samples/b.wav")),
            ],
            period: 7.5,
            gain_db: -6.0,
            burst: 0.5,
        };

        let restored = PersistedState::from_bytes(&state.to_bytes()?)?;
        assert_eq!(restored, state);
        Ok(())
    }

    #[test]
    fn test_missing_fields_use_defaults() -> Result<(), StateError> {
        let state = PersistedState::from_bytes(br#"{"selection": 2, "kind": "beep"}"#)?;
        assert_eq!(state.selection, 2);
        assert_eq!(state.kind, SourceKind::Beep);
        assert_eq!(state.period, DEFAULT_PERIOD_SECONDS);
        assert!(state.loaded_files.is_empty());
        Ok(())
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(
            PersistedState::from_bytes(b"not json"),
            Err(StateError::Parse(_))
        ));
    }
}
