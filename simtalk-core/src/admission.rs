//! Admission control for conversations.
//!
//! Two independent exclusive-ownership primitives, both shared by `Arc`
//! between the components that need them:
//!
//! - [`DialogueFloor`]: the single global token a conversation turn must
//!   hold while its request is being submitted to the generative backend.
//!   It bounds submission concurrency, not reply latency: the holder
//!   releases it as soon as the request is handed off.
//! - [`BusySet`]: the agents currently taking part in any session. An
//!   agent can be in at most one session at a time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::types::AgentId;

// ---------------------------------------------------------------------------
// Dialogue floor
// ---------------------------------------------------------------------------

/// The single global permit for submitting a conversation turn.
#[derive(Debug, Default)]
pub struct DialogueFloor {
    held: AtomicBool,
    acquisitions: AtomicU64,
    contentions: AtomicU64,
}

/// Proof of holding the floor. Releases it when dropped.
#[derive(Debug)]
#[must_use = "the floor is released as soon as the guard is dropped"]
pub struct FloorGuard<'a> {
    floor: &'a DialogueFloor,
}

impl DialogueFloor {
    /// Create a free floor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the floor if nobody holds it.
    ///
    /// Never blocks. `None` means "someone else is speaking, try next tick".
    pub fn try_acquire(&self) -> Option<FloorGuard<'_>> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.acquisitions.fetch_add(1, Ordering::Relaxed);
            Some(FloorGuard { floor: self })
        } else {
            self.contentions.fetch_add(1, Ordering::Relaxed);
            trace!("dialogue floor contended");
            None
        }
    }

    /// Whether someone currently holds the floor.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Total successful acquisitions.
    #[must_use]
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Total failed acquisition attempts.
    #[must_use]
    pub fn contentions(&self) -> u64 {
        self.contentions.load(Ordering::Relaxed)
    }
}

impl FloorGuard<'_> {
    /// Give the floor back explicitly.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for FloorGuard<'_> {
    fn drop(&mut self) {
        self.floor.held.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Busy set
// ---------------------------------------------------------------------------

/// Agents currently in a conversation session.
#[derive(Debug, Default)]
pub struct BusySet {
    inner: Mutex<HashSet<AgentId>>,
}

impl BusySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim both agents atomically.
    ///
    /// Returns `false` without side effects if either is already busy or
    /// `a == b`.
    pub fn try_claim_pair(&self, a: AgentId, b: AgentId) -> bool {
        if a == b {
            return false;
        }
        let mut busy = self.inner.lock();
        if busy.contains(&a) || busy.contains(&b) {
            return false;
        }
        busy.insert(a);
        busy.insert(b);
        true
    }

    /// Release an agent. Releasing an agent that is not busy is a no-op.
    pub fn release(&self, id: &AgentId) -> bool {
        self.inner.lock().remove(id)
    }

    /// Whether the agent is in a session.
    #[must_use]
    pub fn contains(&self, id: &AgentId) -> bool {
        self.inner.lock().contains(id)
    }

    /// Number of busy agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no agent is busy.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
