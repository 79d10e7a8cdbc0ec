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

//! The non-real-time side of the effect: what an editor talks to.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::audio::{SourceDecoder, SourceSlot};
use crate::engine::Processor;
use crate::loader::{LoadEvent, SampleLoader};
use crate::params::Parameters;
use crate::selection::{LoadedFile, MenuEntry, SelectionMenu, SourceKind};
use crate::state::{PersistedState, StateError};

/// What selecting a menu entry did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The selection took effect immediately.
    Selected,
    /// A file load was queued; the selection changes once it completes.
    Loading(u64),
    /// The "load a new file" entry: the editor should open a file chooser
    /// and pass the result to [`Controller::load_file`].
    ChooseFile,
    OutOfRange,
}

/// A load the controller is waiting on.
#[derive(Debug, Clone, Copy)]
struct PendingLoad {
    generation: u64,
    /// Whether completion should switch the selection to the loaded file.
    select: bool,
}

#[derive(Debug, Default)]
struct SelectionState {
    menu: SelectionMenu,
    selected: usize,
    /// The file behind the published buffer.
    armed: Option<PathBuf>,
    pending: Option<PendingLoad>,
}

/// Owns the parameter store, the loader and the selection menu.
pub struct Controller {
    params: Arc<Parameters>,
    slot: Arc<SourceSlot>,
    loader: SampleLoader,
    state: RwLock<SelectionState>,
}

impl Controller {
    /// Creates a controller and the processor it drives. The processor is
    /// meant to be moved to the audio thread.
    pub fn create(
        decoder: Arc<dyn SourceDecoder>,
        sample_rate: u32,
        max_block_size: usize,
    ) -> io::Result<(Controller, Processor)> {
        let params = Arc::new(Parameters::new());
        let slot = Arc::new(SourceSlot::new());
        let loader = SampleLoader::spawn(slot.clone(), decoder, sample_rate)?;

        let mut processor = Processor::new(params.clone(), slot.clone());
        processor.prepare(sample_rate, max_block_size);

        info!(sample_rate, max_block_size, "Controller created");
        Ok((
            Controller {
                params,
                slot,
                loader,
                state: RwLock::new(SelectionState::default()),
            },
            processor,
        ))
    }

    pub fn params(&self) -> &Arc<Parameters> {
        &self.params
    }

    pub fn menu_labels(&self) -> Vec<String> {
        self.state.read().menu.labels()
    }

    pub fn loaded_files(&self) -> Vec<LoadedFile> {
        self.state.read().menu.files().to_vec()
    }

    pub fn selected_index(&self) -> usize {
        self.state.read().selected
    }

    /// The file the published buffer was loaded from.
    pub fn armed_path(&self) -> Option<PathBuf> {
        self.state.read().armed.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().pending.is_some()
    }

    /// Selects a menu entry.
    pub fn select(&self, index: usize) -> SelectOutcome {
        let mut state = self.state.write();
        let kind = match state.menu.entry(index) {
            Some(MenuEntry::Source(kind)) => kind,
            Some(MenuEntry::File(file)) => {
                let path = file.path.clone();
                return self.select_file(&mut state, index, path);
            }
            Some(MenuEntry::LoadNew) => return SelectOutcome::ChooseFile,
            None => {
                warn!(index, "Selection out of range");
                return SelectOutcome::OutOfRange;
            }
        };

        if state.pending.take().is_some() {
            self.loader.cancel();
        }
        state.selected = index;
        self.params.set_selection(kind);
        info!(index, source = %kind, "Selected source");
        SelectOutcome::Selected
    }

    fn select_file(&self, state: &mut SelectionState, index: usize, path: PathBuf) -> SelectOutcome {
        let armed = state.armed.as_deref() == Some(path.as_path())
            && self
                .slot
                .current()
                .is_some_and(|buffer| buffer.sample_rate() == self.loader.target_rate());

        if armed {
            if state.pending.take().is_some() {
                self.loader.cancel();
            }
            state.selected = index;
            self.params.set_selection(SourceKind::Sample);
            info!(index, path = ?path, "Selected loaded sample");
            return SelectOutcome::Selected;
        }

        let generation = self.loader.load(&path);
        state.pending = Some(PendingLoad {
            generation,
            select: true,
        });
        SelectOutcome::Loading(generation)
    }

    /// Queues a load of a newly chosen file. It is added to the menu and
    /// selected once it completes.
    pub fn load_file(&self, path: &Path) -> u64 {
        let mut state = self.state.write();
        let generation = self.loader.load(path);
        state.pending = Some(PendingLoad {
            generation,
            select: true,
        });
        info!(generation, path = ?path, "Loading sample");
        generation
    }

    /// Applies completed loads. Returns every event received so the editor
    /// can surface failures.
    pub fn poll_events(&self) -> Vec<LoadEvent> {
        let events = self.loader.try_events();
        if events.is_empty() {
            return events;
        }

        let mut state = self.state.write();
        for event in events.iter() {
            let pending = match state.pending {
                Some(pending) if pending.generation == event.generation() => {
                    state.pending = None;
                    Some(pending)
                }
                _ => None,
            };

            match event {
                // Only published buffers are reported, so the file is live
                // whether or not the controller was still waiting on it.
                LoadEvent::Loaded {
                    file,
                    frames,
                    sample_rate,
                    duration,
                    ..
                } => {
                    let index = state.menu.add_file(file.clone());
                    state.armed = Some(file.path.clone());
                    let select = pending.is_some_and(|p| p.select);
                    if select {
                        state.selected = index;
                        self.params.set_selection(SourceKind::Sample);
                    } else if self.params.selection() == SourceKind::Sample {
                        state.selected = index;
                    }
                    info!(
                        index,
                        name = file.name.as_str(),
                        frames,
                        sample_rate,
                        duration_ms = duration.as_millis() as u64,
                        selected = select,
                        stale = pending.is_none(),
                        "Sample armed"
                    );
                }
                LoadEvent::Failed { path, error, .. } => {
                    if pending.is_none() {
                        debug!(generation = event.generation(), "Ignoring stale load failure");
                        continue;
                    }
                    warn!(path = ?path, err = error, "Sample load failed, keeping previous selection");
                }
            }
        }

        events
    }

    /// Follows a host sample rate change: future loads use the new rate and
    /// the armed file is decoded again at it.
    pub fn set_sample_rate(&self, sample_rate: u32) -> Option<u64> {
        if self.loader.target_rate() == sample_rate {
            return None;
        }
        self.loader.set_target_rate(sample_rate);

        let mut state = self.state.write();
        let path = state.armed.clone()?;
        let select = state.pending.map(|p| p.select).unwrap_or(false);
        let generation = self.loader.load(&path);
        state.pending = Some(PendingLoad { generation, select });
        info!(sample_rate, path = ?path, "Reloading sample for new sample rate");
        Some(generation)
    }

    /// Captures the state the host should persist.
    pub fn save_state(&self) -> PersistedState {
        let state = self.state.read();
        let kind = self.params.selection();
        PersistedState {
            selection: state.selected,
            kind,
            sample_path: if kind == SourceKind::Sample {
                state.armed.clone()
            } else {
                None
            },
            loaded_files: state.menu.files().to_vec(),
            period: self.params.period(),
            gain_db: self.params.gain_db(),
            burst: self.params.burst(),
        }
    }

    pub fn save_bytes(&self) -> Result<Vec<u8>, StateError> {
        self.save_state().to_bytes()
    }

    /// Restores persisted state. A saved sample is decoded again from its
    /// path; until that finishes the effect bypasses and bypass is selected. Returns the generation
    /// of that load, if one was started.
    pub fn restore_state(&self, saved: PersistedState) -> Option<u64> {
        self.params.set_period(saved.period);
        self.params.set_gain_db(saved.gain_db);
        self.params.set_burst(saved.burst);

        let mut state = self.state.write();
        if state.pending.take().is_some() {
            self.loader.cancel();
        }
        state.menu = SelectionMenu::with_files(saved.loaded_files);

        match (saved.kind, saved.sample_path) {
            (SourceKind::Sample, Some(path)) => {
                // The menu shows bypass until the file is decoded again, and
                // keeps showing it if that fails.
                self.params.set_selection(SourceKind::Bypass);
                state.selected = state.menu.index_of_kind(SourceKind::Bypass).unwrap_or(0);
                if state.menu.index_of_path(&path).is_none() {
                    state.menu.add_file(LoadedFile::from_path(&path));
                }

                let generation = self.loader.load(&path);
                state.pending = Some(PendingLoad {
                    generation,
                    select: true,
                });
                info!(generation, path = ?path, "Restoring sample");
                Some(generation)
            }
            (kind, _) => {
                let kind = if kind == SourceKind::Sample {
                    SourceKind::Bypass
                } else {
                    kind
                };
                self.params.set_selection(kind);
                state.selected = state.menu.index_of_kind(kind).unwrap_or(0);
                info!(source = %kind, "Restored source");
                None
            }
        }
    }

    pub fn restore_bytes(&self, bytes: &[u8]) -> Result<Option<u64>, StateError> {
        Ok(self.restore_state(PersistedState::from_bytes(bytes)?))
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("params", &self.params)
            .field("state", &*self.state.read())
            .finish()
    }
}
