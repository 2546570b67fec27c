//! Cooperative shutdown signal for modes that hold the process open.
//!
//! Daemon and server modes suspend on this token instead of blocking
//! indefinitely, so tests can inject a pre-canceled signal and assert prompt
//! return.

use tokio::sync::watch;

/// Receiving half of the shutdown signal.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Sending half, held by the binary's signal handler.
pub type ShutdownTrigger = watch::Sender<bool>;

/// Create a connected trigger/signal pair, initially not canceled.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    watch::channel(false)
}

/// A signal that is already canceled; waits return immediately.
pub fn canceled() -> ShutdownSignal {
    // The initial value is already true, so the sender can be dropped.
    let (_, rx) = watch::channel(true);
    rx
}

/// Suspend until the signal is canceled (or every trigger is gone).
pub async fn wait(mut signal: ShutdownSignal) {
    if *signal.borrow() {
        return;
    }
    while signal.changed().await.is_ok() {
        if *signal.borrow() {
            return;
        }
    }
}
