//! Per-provider request throttling
//!
//! Each provider may declare a requests-per-minute budget (sliding window)
//! and a cap on concurrent calls. A call over either limit is refused
//! immediately instead of queueing, so the caller can fall back to another
//! provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Why a call was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The per-minute budget is spent
    RateLimited {
        /// Time until the oldest call in the window expires
        retry_after: Duration,
    },
    /// Too many calls are already in flight
    AtCapacity {
        /// Configured concurrency cap
        max_concurrent: u32,
    },
}

/// Slot held for the duration of one call
#[derive(Debug)]
pub struct Admission {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Sliding-window rate limit plus concurrency cap for one provider
#[derive(Debug)]
pub struct ProviderThrottle {
    per_minute: Option<u32>,
    calls: Mutex<VecDeque<Instant>>,
    max_concurrent: Option<u32>,
    slots: Option<Arc<Semaphore>>,
}

impl ProviderThrottle {
    /// Create a throttle; `None` disables the corresponding limit
    #[must_use]
    pub fn new(per_minute: Option<u32>, max_concurrent: Option<u32>) -> Self {
        Self {
            per_minute,
            calls: Mutex::new(VecDeque::new()),
            max_concurrent,
            slots: max_concurrent.map(|n| Arc::new(Semaphore::new(n as usize))),
        }
    }

    /// Whether any limit is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.per_minute.is_some() || self.max_concurrent.is_some()
    }

    /// Take a concurrency slot and record the call in the window
    ///
    /// A refused call consumes neither budget.
    pub fn try_admit(&self) -> Result<Admission, Refusal> {
        let permit = match (&self.slots, self.max_concurrent) {
            (Some(slots), Some(max_concurrent)) => Some(
                Arc::clone(slots)
                    .try_acquire_owned()
                    .map_err(|_| Refusal::AtCapacity { max_concurrent })?,
            ),
            _ => None,
        };

        if let Some(limit) = self.per_minute {
            let now = Instant::now();
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            while calls.front().is_some_and(|t| now.duration_since(*t) >= WINDOW) {
                calls.pop_front();
            }
            if calls.len() >= limit as usize {
                let retry_after = calls
                    .front()
                    .map_or(Duration::ZERO, |oldest| WINDOW.saturating_sub(now.duration_since(*oldest)));
                return Err(Refusal::RateLimited { retry_after });
            }
            calls.push_back(now);
        }

        Ok(Admission { _permit: permit })
    }

    /// Calls recorded in the current window
    #[must_use]
    pub fn calls_in_window(&self) -> usize {
        let now = Instant::now();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|t| now.duration_since(**t) < WINDOW)
            .count()
    }
}
