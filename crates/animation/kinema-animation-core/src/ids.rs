//! Identifiers and simple allocators for scheduler-owned entities.

use serde::{Deserialize, Serialize};

/// A scheduled frame process.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

/// A keyframe resolver registered with a resolver queue.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolverId(pub u64);

/// A listener registered on a subscription manager.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Monotonic allocator for scheduler ids.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_process: u64,
    next_resolver: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_process(&mut self) -> ProcessId {
        let id = ProcessId(self.next_process);
        self.next_process = self.next_process.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_resolver(&mut self) -> ResolverId {
        let id = ResolverId(self.next_resolver);
        self.next_resolver = self.next_resolver.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
