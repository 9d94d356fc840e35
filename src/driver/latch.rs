// src/driver/latch.rs

//! Single authoritative "already terminated" flag.
//!
//! Exit, timeout and caller kill can all race; whichever calls
//! [`TerminationLatch::settle`] first owns the terminal reason and every
//! later attempt is refused. This is a compare-and-swap, not read-then-act.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::TerminationReason;

const RUNNING: u8 = 0;

#[derive(Debug, Default)]
pub struct TerminationLatch {
    state: AtomicU8,
}

impl TerminationLatch {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    /// Record `reason` if nothing has been recorded yet.
    ///
    /// Returns `true` when this call won.
    pub fn settle(&self, reason: TerminationReason) -> bool {
        self.state
            .compare_exchange(RUNNING, encode(reason), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn reason(&self) -> Option<TerminationReason> {
        decode(self.state.load(Ordering::Acquire))
    }
}

fn encode(reason: TerminationReason) -> u8 {
    match reason {
        TerminationReason::Exited => 1,
        TerminationReason::TimedOut => 2,
        TerminationReason::LaunchFailed => 3,
        TerminationReason::Cancelled => 4,
    }
}

fn decode(value: u8) -> Option<TerminationReason> {
    match value {
        1 => Some(TerminationReason::Exited),
        2 => Some(TerminationReason::TimedOut),
        3 => Some(TerminationReason::LaunchFailed),
        4 => Some(TerminationReason::Cancelled),
        _ => None,
    }
}
