//! One phase's double-buffered process queue.

use hashbrown::HashSet;
use indexmap::IndexMap;

use super::Process;
use crate::ids::ProcessId;

/// Two reusable ordered queues plus keep-alive markers.
///
/// `this_frame` is drained while the phase runs; anything scheduled during
/// that pass lands in `next_frame` unless it asked to run immediately.
/// The queues are swapped each tick and cleared in place.
#[derive(Default)]
pub(crate) struct RenderStep {
    this_frame: IndexMap<ProcessId, Process>,
    next_frame: IndexMap<ProcessId, Process>,
    keep_alive: HashSet<ProcessId>,
    pub(crate) is_processing: bool,
    pub(crate) flush_next_frame: bool,
}

impl RenderStep {
    pub(crate) fn schedule(&mut self, process: Process, keep_alive: bool, immediate: bool) {
        let add_to_current = immediate && self.is_processing;
        if keep_alive {
            self.keep_alive.insert(process.id);
        }
        let queue = if add_to_current {
            &mut self.this_frame
        } else {
            &mut self.next_frame
        };
        if !queue.contains_key(&process.id) {
            queue.insert(process.id, process);
        }
    }

    /// Pending (next frame) removal; a process already executing this pass
    /// is unaffected.
    pub(crate) fn cancel(&mut self, id: ProcessId) {
        self.next_frame.shift_remove(&id);
        self.keep_alive.remove(&id);
    }

    /// Start a pass: promote `next_frame` to `this_frame`.
    pub(crate) fn begin(&mut self) {
        std::mem::swap(&mut self.this_frame, &mut self.next_frame);
        self.next_frame.clear();
        self.is_processing = true;
    }

    /// Start a pass over late immediate work only, leaving `next_frame` alone.
    pub(crate) fn begin_with(&mut self, processes: Vec<Process>) {
        self.this_frame.clear();
        for p in processes {
            self.this_frame.entry(p.id).or_insert(p);
        }
        self.is_processing = true;
    }

    pub(crate) fn end(&mut self) {
        self.this_frame.clear();
        self.is_processing = false;
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&Process> {
        self.this_frame.get_index(index).map(|(_, p)| p)
    }

    #[inline]
    pub(crate) fn is_kept_alive(&self, id: ProcessId) -> bool {
        self.keep_alive.contains(&id)
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.next_frame.is_empty()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.next_frame.len()
    }

    pub(crate) fn clear(&mut self) {
        self.this_frame.clear();
        self.next_frame.clear();
        self.keep_alive.clear();
        self.is_processing = false;
        self.flush_next_frame = false;
    }
}
