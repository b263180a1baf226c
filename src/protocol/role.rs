//! Coordination flags shared between interrupt handlers and the main loop.
//!
//! Every flag is a single atomic; flags that are consumed (start request,
//! mastership on handover) use swap so a concurrent writer cannot be lost
//! between the read and the clear.

use portable_atomic::{AtomicBool, Ordering};

use crate::config::Role;

/// Board-wide coordination state.
///
/// Meant to live in a `static` so the bus receive interrupt, the edge
/// interrupt and the main loop can all reach it.
#[derive(Debug)]
pub struct CoordinationFlags {
    master: AtomicBool,
    start: AtomicBool,
    ready: AtomicBool,
    in_position: AtomicBool,
    fault: AtomicBool,
}

impl CoordinationFlags {
    /// Flags for a board booting in `role`.
    pub const fn new(role: Role) -> Self {
        Self {
            master: AtomicBool::new(matches!(role, Role::Master)),
            start: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            in_position: AtomicBool::new(false),
            fault: AtomicBool::new(false),
        }
    }

    /// Current role.
    #[inline]
    pub fn role(&self) -> Role {
        if self.is_master() {
            Role::Master
        } else {
            Role::Slave
        }
    }

    /// Whether this board holds bus mastership.
    #[inline]
    pub fn is_master(&self) -> bool {
        self.master.load(Ordering::Acquire)
    }

    /// Take mastership on receipt of a handover. Returns whether it was
    /// already held.
    #[inline]
    pub fn accept_handover(&self) -> bool {
        self.master.swap(true, Ordering::AcqRel)
    }

    /// Give up mastership. Returns whether it was held.
    #[inline]
    pub fn release_mastership(&self) -> bool {
        self.master.swap(false, Ordering::AcqRel)
    }

    /// Ask the main loop to start the sequence.
    #[inline]
    pub fn request_start(&self) {
        self.start.store(true, Ordering::Release);
    }

    /// Consume a pending start request.
    #[inline]
    pub fn claim_start(&self) -> bool {
        self.start.swap(false, Ordering::AcqRel)
    }

    /// Whether a start request is pending.
    #[inline]
    pub fn start_pending(&self) -> bool {
        self.start.load(Ordering::Acquire)
    }

    /// Drop any pending start request.
    #[inline]
    pub fn clear_start(&self) {
        self.start.store(false, Ordering::Release);
    }

    /// Mark the board ready to take part in a sequence.
    ///
    /// Set once the local axis is enabled. A sequence does not start on a
    /// board that is not ready.
    #[inline]
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Whether the board is ready.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Record whether the local axis reached its last target.
    #[inline]
    pub fn set_in_position(&self, in_position: bool) {
        self.in_position.store(in_position, Ordering::Release);
    }

    /// Whether the local axis reached its last target.
    #[inline]
    pub fn is_in_position(&self) -> bool {
        self.in_position.load(Ordering::Acquire)
    }

    /// Record that the last command could not be acted on.
    #[inline]
    pub fn set_fault(&self, fault: bool) {
        self.fault.store(fault, Ordering::Release);
    }

    /// Whether the last command could not be acted on.
    #[inline]
    pub fn is_faulted(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }
}

impl Default for CoordinationFlags {
    fn default() -> Self {
        Self::new(Role::Slave)
    }
}
