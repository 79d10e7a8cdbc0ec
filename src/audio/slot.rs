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

//! Lock-free handoff of the armed buffer from the loader to the audio thread.

use std::sync::Arc;

use arc_swap::{ArcSwapOption, Guard};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::buffer::SourceBuffer;

/// How many retired buffers may be waiting for deallocation at once.
const RETIRE_CAPACITY: usize = 8;

/// Holds the published buffer. The loader is the only writer, the processor the
/// only reader.
///
/// Buffers the processor stops using go back through the retire channel so
/// that the final drop (and the free) happens on the loader thread.
pub struct SourceSlot {
    current: ArcSwapOption<SourceBuffer>,
    retire_tx: Sender<Arc<SourceBuffer>>,
    retire_rx: Receiver<Arc<SourceBuffer>>,
}

impl SourceSlot {
    pub fn new() -> Self {
        let (retire_tx, retire_rx) = bounded(RETIRE_CAPACITY);
        Self {
            current: ArcSwapOption::empty(),
            retire_tx,
            retire_rx,
        }
    }

    /// Atomically replaces the published buffer and returns the previous one.
    pub fn publish(&self, buffer: Option<Arc<SourceBuffer>>) -> Option<Arc<SourceBuffer>> {
        self.current.swap(buffer)
    }

    /// Returns an owned handle to the published buffer.
    pub fn current(&self) -> Option<Arc<SourceBuffer>> {
        self.current.load_full()
    }

    /// Borrows the published buffer without touching its reference count.
    #[inline]
    pub fn load(&self) -> Guard<Option<Arc<SourceBuffer>>> {
        self.current.load()
    }

    /// Hands a buffer back for deallocation off the audio thread. Never blocks;
    /// gives the buffer back if the channel is full.
    #[inline]
    pub fn retire(&self, buffer: Arc<SourceBuffer>) -> Result<(), Arc<SourceBuffer>> {
        self.retire_tx.try_send(buffer).map_err(|e| match e {
            TrySendError::Full(buffer) | TrySendError::Disconnected(buffer) => buffer,
        })
    }

    /// The receiving end of the retire channel.
    pub fn retired(&self) -> Receiver<Arc<SourceBuffer>> {
        self.retire_rx.clone()
    }
}

impl Default for SourceSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SourceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSlot")
            .field("current", &*self.current.load())
            .field("retired", &self.retire_rx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(frames: usize) -> Arc<SourceBuffer> {
        Arc::new(SourceBuffer::from_planar(vec![vec![0.1; frames]], frames, 48000))
    }

    #[test]
    fn test_publish_swaps() {
        let slot = SourceSlot::new();
        assert!(slot.current().is_none());

        let first = buffer(10);
        assert!(slot.publish(Some(first.clone())).is_none());
        assert!(Arc::ptr_eq(slot.current().as_ref().unwrap(), &first));

        let previous = slot.publish(Some(buffer(20))).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert_eq!(slot.load().as_ref().unwrap().frame_count(), 20);

        slot.publish(None);
        assert!(slot.load().is_none());
    }

    #[test]
    fn test_retire_is_bounded() {
        let slot = SourceSlot::new();
        let retired = slot.retired();

        for _ in 0..RETIRE_CAPACITY {
            assert!(slot.retire(buffer(1)).is_ok());
        }
        let rejected = slot.retire(buffer(2)).unwrap_err();
        assert_eq!(rejected.frame_count(), 2);

        assert_eq!(retired.try_iter().count(), RETIRE_CAPACITY);
        assert!(slot.retire(buffer(1)).is_ok());
    }
}
