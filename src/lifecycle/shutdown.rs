//! Signal handling for graceful shutdown

use std::future::Future;

use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// The signal that ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// Why the main task stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Signal(Signal),
    /// The interception thread ended on its own
    ListenerExited,
}

/// Handles shutdown signals (SIGTERM, SIGINT).
///
/// Handlers are installed on construction, before the Caps Lock remap is
/// applied, so an early signal can no longer kill the process with the
/// remap still in place.
pub struct ShutdownSignal {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Register the signal handlers. Must be called inside the runtime.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for a shutdown signal
    pub async fn wait(&mut self) -> Signal {
        let received = tokio::select! {
            _ = self.sigterm.recv() => Signal::Terminate,
            _ = self.sigint.recv() => Signal::Interrupt,
        };
        debug!(?received, "received shutdown signal");
        received
    }

    /// Wait for a shutdown signal or for `exited` to resolve, whichever
    /// comes first
    pub async fn wait_or<F>(&mut self, exited: F) -> StopReason
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            signal = self.wait() => StopReason::Signal(signal),
            _ = exited => StopReason::ListenerExited,
        }
    }
}
