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

//! Loads samples off the audio thread and publishes them to the processor.
//!
//! Every request gets a generation number. A finished load is only published
//! if no newer request (or cancellation) has been issued since, so the armed
//! buffer always comes from the most recent completed request.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::audio::{LoadError, Resampler, SourceBuffer, SourceDecoder, SourceSlot};
use crate::selection::LoadedFile;

/// The outcome of a load, reported back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Loaded {
        generation: u64,
        file: LoadedFile,
        channels: usize,
        frames: usize,
        sample_rate: u32,
        duration: Duration,
    },
    Failed {
        generation: u64,
        path: PathBuf,
        error: String,
    },
}

impl LoadEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LoadEvent::Loaded { generation, .. } | LoadEvent::Failed { generation, .. } => {
                *generation
            }
        }
    }
}

struct LoadRequest {
    generation: u64,
    path: PathBuf,
    target_rate: u32,
}

/// Decodes and resamples a file into a buffer at the target rate.
pub fn load_buffer(
    decoder: &dyn SourceDecoder,
    path: &Path,
    target_rate: u32,
) -> Result<SourceBuffer, LoadError> {
    let start = Instant::now();
    let mut source = decoder.open(path)?;
    let native_rate = source.sample_rate();
    let buffer = Resampler::new(target_rate).resample(&mut source)?;

    info!(
        path = ?path,
        channels = buffer.channel_count(),
        frames = buffer.frame_count(),
        native_rate,
        sample_rate = target_rate,
        memory_kb = buffer.memory_size() / 1024,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded sample"
    );

    Ok(buffer)
}

/// Owns the loader worker thread.
pub struct SampleLoader {
    requests: Option<Sender<LoadRequest>>,
    events: Receiver<LoadEvent>,
    latest: Arc<AtomicU64>,
    target_rate: AtomicU32,
    worker: Option<JoinHandle<()>>,
}

impl SampleLoader {
    /// Starts the worker. Loaded buffers are published into `slot`, and
    /// buffers the processor retires from it are dropped on the worker.
    pub fn spawn(
        slot: Arc<SourceSlot>,
        decoder: Arc<dyn SourceDecoder>,
        target_rate: u32,
    ) -> io::Result<SampleLoader> {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (event_tx, event_rx) = unbounded::<LoadEvent>();
        let latest = Arc::new(AtomicU64::new(0));

        let worker = {
            let latest = latest.clone();
            thread::Builder::new()
                .name("sample-loader".to_string())
                .spawn(move || Self::worker(slot, decoder, latest, request_rx, event_tx))?
        };

        Ok(SampleLoader {
            requests: Some(request_tx),
            events: event_rx,
            latest,
            target_rate: AtomicU32::new(target_rate),
            worker: Some(worker),
        })
    }

    /// Queues a load and returns its generation. Any earlier request that has
    /// not completed yet will be discarded.
    pub fn load(&self, path: &Path) -> u64 {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        let request = LoadRequest {
            generation,
            path: path.to_path_buf(),
            target_rate: self.target_rate(),
        };

        debug!(generation, path = ?path, "Queueing sample load");
        if let Some(requests) = self.requests.as_ref() {
            if requests.send(request).is_err() {
                error!("Sample loader worker has stopped");
            }
        }
        generation
    }

    /// Discards whatever load is in flight.
    pub fn cancel(&self) {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "Cancelled pending sample loads");
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate.load(Ordering::Relaxed)
    }

    /// Sets the rate future loads resample to.
    pub fn set_target_rate(&self, target_rate: u32) {
        self.target_rate.store(target_rate, Ordering::Relaxed);
    }

    /// Returns the events that have arrived since the last call.
    pub fn try_events(&self) -> Vec<LoadEvent> {
        self.events.try_iter().collect()
    }

    /// Blocks until an event arrives or the timeout passes.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<LoadEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    fn worker(
        slot: Arc<SourceSlot>,
        decoder: Arc<dyn SourceDecoder>,
        latest: Arc<AtomicU64>,
        requests: Receiver<LoadRequest>,
        events: Sender<LoadEvent>,
    ) {
        let retired = slot.retired();
        loop {
            select! {
                recv(requests) -> request => match request {
                    Ok(request) => Self::handle(&slot, decoder.as_ref(), &latest, request, &events),
                    Err(_) => break,
                },
                recv(retired) -> buffer => {
                    if let Ok(buffer) = buffer {
                        debug!(buffer = ?buffer, "Releasing retired buffer");
                    }
                },
            }
        }
        debug!("Sample loader stopped");
    }

    fn handle(
        slot: &SourceSlot,
        decoder: &dyn SourceDecoder,
        latest: &AtomicU64,
        request: LoadRequest,
        events: &Sender<LoadEvent>,
    ) {
        let LoadRequest {
            generation,
            path,
            target_rate,
        } = request;

        if generation != latest.load(Ordering::Acquire) {
            debug!(generation, path = ?path, "Skipping superseded load request");
            return;
        }

        let event = match load_buffer(decoder, &path, target_rate) {
            Ok(buffer) => {
                if generation != latest.load(Ordering::Acquire) {
                    info!(generation, path = ?path, "Discarding superseded load");
                    return;
                }

                let event = LoadEvent::Loaded {
                    generation,
                    file: LoadedFile::from_path(&path),
                    channels: buffer.channel_count(),
                    frames: buffer.frame_count(),
                    sample_rate: buffer.sample_rate(),
                    duration: buffer.duration(),
                };
                slot.publish(Some(Arc::new(buffer)));
                event
            }
            Err(e) => {
                warn!(generation, path = ?path, err = %e, "Unable to load sample");
                LoadEvent::Failed {
                    generation,
                    path,
                    error: e.to_string(),
                }
            }
        };

        // The controller may already be gone.
        let _ = events.send(event);
    }
}

impl Drop for SampleLoader {
    fn drop(&mut self) {
        // Closing the request channel stops the worker.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Error joining sample loader");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::FileDecoder;
    use crate::testutil::{write_wav, MemoryDecoder};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_load_buffer_resamples_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tone.wav");
        write_wav(&path, vec![vec![0.5; 4410], vec![-0.5; 4410]], 44100)?;

        let buffer = load_buffer(&FileDecoder, &path, 48000)?;
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.frame_count(), 4800);
        Ok(())
    }

    #[test]
    fn test_publishes_loaded_buffer() -> Result<(), Box<dyn std::error::Error>> {
        let slot = Arc::new(SourceSlot::new());
        let decoder = MemoryDecoder::new().with_source("a.wav", vec![vec![0.25; 480]], 48000);
        let loader = SampleLoader::spawn(slot.clone(), Arc::new(decoder), 48000)?;

        let generation = loader.load(Path::new("a.wav"));
        let event = loader.recv_event_timeout(WAIT).ok_or("no event")?;

        assert!(matches!(
            &event,
            LoadEvent::Loaded { file, frames: 480, channels: 1, sample_rate: 48000, .. }
                if file.name == "a.wav"
        ));
        assert_eq!(event.generation(), generation);
        assert_eq!(slot.current().ok_or("nothing published")?.frame_count(), 480);
        Ok(())
    }

    #[test]
    fn test_failed_load_keeps_previous_buffer() -> Result<(), Box<dyn std::error::Error>> {
        let slot = Arc::new(SourceSlot::new());
        let decoder = MemoryDecoder::new().with_source("good.wav", vec![vec![0.25; 100]], 48000);
        let loader = SampleLoader::spawn(slot.clone(), Arc::new(decoder), 48000)?;

        loader.load(Path::new("good.wav"));
        loader.recv_event_timeout(WAIT).ok_or("no event")?;
        let before = slot.current().ok_or("nothing published")?;

        loader.load(Path::new("missing.wav"));
        let event = loader.recv_event_timeout(WAIT).ok_or("no event")?;
        assert!(matches!(event, LoadEvent::Failed { .. }));

        let after = slot.current().ok_or("buffer was cleared")?;
        assert!(Arc::ptr_eq(&before, &after));
        Ok(())
    }

    #[test]
    fn test_superseded_load_is_discarded() -> Result<(), Box<dyn std::error::Error>> {
        let slot = Arc::new(SourceSlot::new());
        let decoder = MemoryDecoder::new()
            .with_source("slow.wav", vec![vec![0.1; 100]], 48000)
            .with_source("fast.wav", vec![vec![0.2; 200]], 48000)
            .with_delay("slow.wav", Duration::from_millis(300));
        let loader = SampleLoader::spawn(slot.clone(), Arc::new(decoder), 48000)?;

        loader.load(Path::new("slow.wav"));
        // Let the worker pick up the slow request before superseding it.
        std::thread::sleep(Duration::from_millis(50));
        let fast = loader.load(Path::new("fast.wav"));

        let event = loader.recv_event_timeout(WAIT).ok_or("no event")?;
        assert_eq!(event.generation(), fast);
        assert!(loader.recv_event_timeout(Duration::from_millis(100)).is_none());
        assert_eq!(slot.current().ok_or("nothing published")?.frame_count(), 200);
        Ok(())
    }

    #[test]
    fn test_cancel_discards_in_flight_load() -> Result<(), Box<dyn std::error::Error>> {
        let slot = Arc::new(SourceSlot::new());
        let decoder = MemoryDecoder::new()
            .with_source("slow.wav", vec![vec![0.1; 100]], 48000)
            .with_delay("slow.wav", Duration::from_millis(200));
        let loader = SampleLoader::spawn(slot.clone(), Arc::new(decoder), 48000)?;

        loader.load(Path::new("slow.wav"));
        std::thread::sleep(Duration::from_millis(50));
        loader.cancel();

        assert!(loader.recv_event_timeout(Duration::from_millis(500)).is_none());
        assert!(slot.current().is_none());
        Ok(())
    }

    #[test]
    fn test_target_rate_applies_to_new_requests() -> Result<(), Box<dyn std::error::Error>> {
        let slot = Arc::new(SourceSlot::new());
        let decoder = MemoryDecoder::new().with_source("a.wav", vec![vec![0.5; 4410]], 44100);
        let loader = SampleLoader::spawn(slot.clone(), Arc::new(decoder), 44100)?;

        loader.set_target_rate(48000);
        loader.load(Path::new("a.wav"));
        loader.recv_event_timeout(WAIT).ok_or("no event")?;

        let buffer = slot.current().ok_or("nothing published")?;
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.frame_count(), 4800);
        Ok(())
    }
}
