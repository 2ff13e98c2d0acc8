use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::foundation::error::{MovieError, MovieResult};

/// Gate slot state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    /// No capture outstanding; the script may mutate the scene.
    Idle,
    /// The script has finished a frame and waits for the controller to capture it.
    AwaitingCapture,
    /// The script thread has exited. Cleared by [`FrameGate::reset`].
    Closed,
}

/// What the controller observed while waiting on the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateSignal {
    /// A frame is ready to capture. Call [`FrameGate::release_frame`] afterwards.
    CaptureRequested,
    /// The script thread exited; join it.
    Closed,
    /// Nothing happened within the timeout.
    TimedOut,
}

/// Diagnostic counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateStats {
    /// Accepted `request_capture` calls.
    pub requests: u64,
    /// `release_frame` calls that woke a waiting script.
    pub releases: u64,
    /// `release_frame` calls with nothing to release.
    pub lost_releases: u64,
}

/// Gate options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateOpts {
    /// Fail `request_capture` if no release arrives in time. `None` waits forever.
    pub release_timeout: Option<Duration>,
}

#[derive(Debug)]
struct Slot {
    state: GateState,
    stats: GateStats,
}

/// Single-slot rendezvous between the script thread and the controller.
///
/// Each script frame is one `request_capture` that blocks until the controller's matching
/// `release_frame`. A release with nobody waiting is dropped, never banked for a later request.
/// Cancellation is a flag only: it does not wake a blocked request.
#[derive(Debug)]
pub struct FrameGate {
    slot: Mutex<Slot>,
    changed: Condvar,
    cancelled: AtomicBool,
    opts: GateOpts,
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::new(GateOpts::default())
    }
}

impl FrameGate {
    /// Create an idle gate.
    pub fn new(opts: GateOpts) -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: GateState::Idle,
                stats: GateStats::default(),
            }),
            changed: Condvar::new(),
            cancelled: AtomicBool::new(false),
            opts,
        }
    }

    // The slot holds plain values that are valid after any panic, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script side: announce a finished frame and block until it has been captured.
    pub fn request_capture(&self) -> MovieResult<()> {
        let mut slot = self.lock();
        match slot.state {
            GateState::Idle => {}
            GateState::AwaitingCapture => {
                return Err(MovieError::script(
                    "capture requested while the previous frame is still pending",
                ));
            }
            GateState::Closed => return Err(MovieError::script("frame gate is closed")),
        }
        slot.state = GateState::AwaitingCapture;
        slot.stats.requests += 1;
        self.changed.notify_all();

        let pending = |s: &mut Slot| s.state == GateState::AwaitingCapture;
        match self.opts.release_timeout {
            None => {
                drop(
                    self.changed
                        .wait_while(slot, pending)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
            Some(timeout) => {
                let (mut slot, res) = self
                    .changed
                    .wait_timeout_while(slot, timeout, pending)
                    .unwrap_or_else(PoisonError::into_inner);
                if res.timed_out() && slot.state == GateState::AwaitingCapture {
                    slot.state = GateState::Idle;
                    self.changed.notify_all();
                    return Err(MovieError::script(format!(
                        "frame was not captured within {timeout:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Controller side: wait until the script requests a capture or exits.
    pub fn wait_for_request(&self, timeout: Duration) -> GateSignal {
        let slot = self.lock();
        let (slot, _) = self
            .changed
            .wait_timeout_while(slot, timeout, |s| s.state == GateState::Idle)
            .unwrap_or_else(PoisonError::into_inner);
        match slot.state {
            GateState::AwaitingCapture => GateSignal::CaptureRequested,
            GateState::Closed => GateSignal::Closed,
            GateState::Idle => GateSignal::TimedOut,
        }
    }

    /// Controller side: let the script continue past the frame just captured.
    ///
    /// Returns `false`, and changes nothing, if no request is pending.
    pub fn release_frame(&self) -> bool {
        let mut slot = self.lock();
        if slot.state != GateState::AwaitingCapture {
            slot.stats.lost_releases += 1;
            tracing::warn!(state = ?slot.state, "frame release without a pending capture request");
            return false;
        }
        slot.state = GateState::Idle;
        slot.stats.releases += 1;
        self.changed.notify_all();
        true
    }

    /// Request cooperative cancellation. A blocked `request_capture` still needs a release.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the script thread as gone and wake a waiting controller.
    pub fn close(&self) {
        let mut slot = self.lock();
        slot.state = GateState::Closed;
        self.changed.notify_all();
    }

    /// Return to a fresh idle gate for a new run: clears cancellation, state and counters.
    pub fn reset(&self) {
        let mut slot = self.lock();
        slot.state = GateState::Idle;
        slot.stats = GateStats::default();
        self.cancelled.store(false, Ordering::SeqCst);
        self.changed.notify_all();
    }

    /// Current slot state.
    pub fn state(&self) -> GateState {
        self.lock().state
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> GateStats {
        self.lock().stats
    }
}

/// Closes the gate when dropped, including during unwinding.
pub(crate) struct CloseOnDrop<'a>(pub(crate) &'a FrameGate);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sync/gate.rs"]
mod tests;
