//! Graceful shutdown
//!
//! The coordinator owns one [`ShutdownController`]. Request handling
//! registers each in-flight request; background workers hold child tokens.
//! Shutdown stops admitting requests, waits for in-flight ones to finish
//! (bounded by a timeout), then cancels the workers.
//!
//! ```ignore
//! let shutdown = ShutdownController::new();
//! let token = shutdown.token();
//! worker.run(token).await;
//!
//! shutdown.shutdown().await;
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default drain timeout in seconds
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Interval between in-flight checks while draining
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shutdown phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// No new requests; waiting for in-flight ones
    Draining,
    /// Background workers cancelled
    Terminated,
}

impl ShutdownPhase {
    fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Terminated,
        }
    }
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Shutdown controller for the coordinator and its workers
pub struct ShutdownController {
    cancel_token: CancellationToken,
    phase: AtomicU32,
    in_flight: AtomicU32,
    timeout: Duration,
}

impl ShutdownController {
    /// Create a controller with the default drain timeout
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS))
    }

    /// Create a controller with a custom drain timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            phase: AtomicU32::new(ShutdownPhase::Running as u32),
            in_flight: AtomicU32::new(0),
            timeout,
        })
    }

    /// Token cancelled once in-flight work has drained
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u32(self.phase.load(Ordering::SeqCst))
    }

    /// Whether new requests are admitted
    #[must_use]
    pub fn is_accepting_work(&self) -> bool {
        self.phase() == ShutdownPhase::Running
    }

    /// Track an in-flight request until the guard drops
    ///
    /// Register before checking [`is_accepting_work`](Self::is_accepting_work):
    /// a request counted here is either seen by the drain loop or sees the
    /// draining phase itself.
    pub fn register_request(&self) -> RequestGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        RequestGuard { controller: self }
    }

    /// Requests currently in flight
    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.store(phase as u32, Ordering::SeqCst);
        info!(phase = %phase, "Shutdown phase changed");
    }

    /// Stop admitting requests, drain in-flight ones, then cancel workers
    ///
    /// Only the first call does anything.
    pub async fn shutdown(&self) {
        if self
            .phase
            .compare_exchange(
                ShutdownPhase::Running as u32,
                ShutdownPhase::Draining as u32,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!("Shutdown already initiated");
            return;
        }
        info!("Initiating graceful shutdown");

        let drain_start = tokio::time::Instant::now();
        loop {
            let active = self.in_flight();
            if active == 0 {
                debug!("All in-flight requests completed");
                break;
            }
            if drain_start.elapsed() >= self.timeout {
                warn!(
                    in_flight = active,
                    timeout_secs = self.timeout.as_secs(),
                    "Drain timeout exceeded, cancelling workers anyway"
                );
                break;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        self.cancel_token.cancel();
        self.set_phase(ShutdownPhase::Terminated);
    }
}

/// Decrements the in-flight count when dropped
pub struct RequestGuard<'a> {
    controller: &'a ShutdownController,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.controller.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_phases() {
        let controller = ShutdownController::new();
        let token = controller.token();
        assert_eq!(controller.phase(), ShutdownPhase::Running);
        assert!(controller.is_accepting_work());

        controller.shutdown().await;

        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
        assert!(!controller.is_accepting_work());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_request_guard() {
        let controller = ShutdownController::new();
        {
            let _g1 = controller.register_request();
            let _g2 = controller.register_request();
            assert_eq!(controller.in_flight(), 2);
        }
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_in_flight_before_cancelling() {
        let controller = ShutdownController::new();
        let token = controller.token();

        let worker = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                let _guard = controller.register_request();
                tokio::time::sleep(Duration::from_millis(500)).await;
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(controller.in_flight(), 1);

        let shutdown = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.shutdown().await })
        };
        tokio::task::yield_now().await;
        assert!(!controller.is_accepting_work());
        assert!(!token.is_cancelled());

        worker.await.unwrap();
        shutdown.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout() {
        let controller = ShutdownController::with_timeout(Duration::from_secs(1));
        let _stuck = controller.register_request();
        controller.shutdown().await;
        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
    }

    #[tokio::test]
    async fn test_double_shutdown_is_noop() {
        let controller = ShutdownController::new();
        controller.shutdown().await;
        controller.shutdown().await;
        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_registered_before_shutdown_is_drained() {
        let controller = ShutdownController::new();
        let token = controller.token();
        let guard = controller.register_request();

        let shutdown = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.shutdown().await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.phase(), ShutdownPhase::Draining);
        assert!(!token.is_cancelled());

        drop(guard);
        shutdown.await.unwrap();
        assert!(token.is_cancelled());
    }
}
