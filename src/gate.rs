//! # Inline Pass Gate Module
//!
//! Mutual exclusion between the two inline fragment passes.
//!
//! ## Responsibilities:
//! - Serializes the extraction->splice critical sections of the inline CSS
//!   and inline JavaScript passes, which read-modify-write the same
//!   document set
//! - Carries the `outputs_suffixed` flag from the first inline pass to the
//!   second, so the second knows to read the already-`.min`-suffixed
//!   outputs as its inputs when not overwriting in place
//! - Run-scoped: one gate per run, passed explicitly to the pass workers,
//!   never process-wide state
//!
//! ## Implementation:
//! Mutex-guarded state plus a `tokio::sync::Notify` broadcast. Waiters
//! register for notification before re-checking the flag, so a release
//! between the check and the await cannot be missed. Entering hands back a
//! guard whose drop releases the gate, so a panicking holder cannot strand
//! the other pass.

use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    /// An inline pass is currently inside its extraction/splice section
    in_progress: bool,
    /// A previous inline pass already wrote `.min`-suffixed outputs
    outputs_suffixed: bool,
}

/// Serializes the inline passes' critical sections.
#[derive(Debug, Default)]
pub struct InlineGate {
    state: Mutex<GateState>,
    released: Notify,
}

/// Guard held by the pass inside the critical section. Dropping it releases
/// the gate on every exit path, panics included.
#[derive(Debug)]
pub struct InlineEntry<'a> {
    gate: &'a InlineGate,
    /// True when an earlier inline pass already suffixed its outputs; the
    /// holder should read those as its inputs (non-overwrite mode).
    pub outputs_suffixed: bool,
    wrote_suffixed: bool,
}

impl InlineEntry<'_> {
    /// Record that this pass wrote `.min`-suffixed outputs for the next
    /// entrant to consume.
    pub fn mark_suffixed(&mut self) {
        self.wrote_suffixed = true;
    }
}

impl Drop for InlineEntry<'_> {
    fn drop(&mut self) {
        self.gate.release(self.wrote_suffixed);
    }
}

impl InlineGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the inline critical section, waiting for any pass currently
    /// inside it to release first.
    pub async fn enter(&self) -> InlineEntry<'_> {
        loop {
            let notified = self.released.notified();
            {
                let mut state = self.state.lock().expect("gate mutex poisoned");
                if !state.in_progress {
                    state.in_progress = true;
                    return InlineEntry {
                        gate: self,
                        outputs_suffixed: state.outputs_suffixed,
                        wrote_suffixed: false,
                    };
                }
                debug!("Inline pass waiting for the gate");
            }
            notified.await;
        }
    }

    fn release(&self, suffixed_outputs: bool) {
        {
            let mut state = self.state.lock().expect("gate mutex poisoned");
            state.in_progress = false;
            state.outputs_suffixed = state.outputs_suffixed || suffixed_outputs;
        }
        self.released.notify_waiters();
    }

    /// Whether an inline pass currently holds the gate.
    pub fn in_progress(&self) -> bool {
        self.state.lock().expect("gate mutex poisoned").in_progress
    }
}
