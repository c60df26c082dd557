//! Single-slot expiry timer.
//!
//! At most one expiry is pending at a time. Arming replaces (and aborts) the
//! previous one; each arm gets a fresh generation so a callback that already
//! woke up can check whether it is still the current one.
//!
//! Expiries are spawned on the runtime current at arm time, falling back to
//! the runtime the timer was created under. With neither, nothing is armed.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{trace, warn};

/// Longest delay the timer will wait (30 years); larger TTLs are clamped to this.
pub const MAX_TIMER_DELAY: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

struct Pending {
    generation: u64,
    deadline: Instant,
    handle: AbortHandle,
}

pub struct ExpiryTimer {
    pending: Option<Pending>,
    next_generation: u64,
    runtime: Option<Handle>,
}

impl ExpiryTimer {
    /// Create a timer, remembering the current Tokio runtime if there is one
    pub fn new() -> Self {
        Self::with_runtime(Handle::try_current().ok())
    }

    pub fn with_runtime(runtime: Option<Handle>) -> Self {
        Self {
            pending: None,
            next_generation: 0,
            runtime,
        }
    }

    /// Schedule `on_expiry` to run after `ttl`, replacing any pending expiry.
    /// Returns the generation passed to the callback.
    ///
    /// `ttl` is clamped to [`MAX_TIMER_DELAY`]. If no runtime is reachable the
    /// previous expiry is still cancelled but nothing new is pending.
    pub fn arm<F>(&mut self, ttl: Duration, on_expiry: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        self.next_generation += 1;
        let generation = self.next_generation;

        let runtime = match Handle::try_current().ok().or_else(|| self.runtime.clone()) {
            Some(runtime) => runtime,
            None => {
                warn!(generation, "No Tokio runtime available, expiry not scheduled");
                return generation;
            }
        };

        let now = Instant::now();
        let ttl = ttl.min(MAX_TIMER_DELAY);
        let deadline = now.checked_add(ttl).unwrap_or(now);

        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_expiry(generation);
        });

        trace!(generation, ttl_ms = ttl.as_millis() as u64, "Expiry timer armed");
        self.pending = Some(Pending {
            generation,
            deadline,
            handle: task.abort_handle(),
        });
        generation
    }

    /// Cancel the pending expiry. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                trace!(generation = pending.generation, "Expiry timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Forget the pending expiry if it is `generation`, without aborting it.
    /// Used by the callback itself once it has fired.
    pub fn complete(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.generation == generation)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left before the pending expiry fires
    pub fn remaining(&self) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Default for ExpiryTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
