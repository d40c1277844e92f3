//! Signal handling: SIGTERM/SIGINT graceful shutdown.
//!
//! Uses the `signal-hook` crate for safe signal delivery. A shutdown
//! request sets an atomic flag the poll loop checks each cycle and also
//! nudges the loop's stop channel, so a signal arriving mid-sleep ends
//! the interval immediately instead of waiting it out. There is
//! deliberately no SIGHUP reload: configuration is immutable for the
//! process lifetime.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

/// Thread-safe shutdown request shared between the signal thread and the
/// poll loop.
///
/// Uses `Ordering::Relaxed` on the flag because the loop polls it every
/// cycle and exact ordering with other atomics is not required. The stop
/// sender is what makes the request prompt.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
}

impl SignalHandler {
    /// Create a handler wired to the poll loop's stop channel and spawn
    /// the OS signal listener.
    ///
    /// Registration is best-effort; failures are logged to stderr but not fatal.
    #[must_use]
    pub fn new(stop_tx: Sender<()>) -> Self {
        let handler = Self::unregistered().with_stop_sender(stop_tx);
        handler.spawn_signal_listener();
        handler
    }

    /// Create a handler without touching OS signal dispositions (tests,
    /// single-pass inspection).
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
        }
    }

    /// Attach a stop sender so `request_shutdown` can interrupt a
    /// sleeping poll loop.
    #[must_use]
    pub fn with_stop_sender(mut self, stop_tx: Sender<()>) -> Self {
        self.stop_tx = Some(stop_tx);
        self
    }

    /// Check whether a shutdown has been requested.
    #[must_use]
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Request shutdown: sets the flag and wakes a sleeping poll loop.
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
        if let Some(tx) = &self.stop_tx {
            // Bounded(1) channel: a second request finding it full is fine,
            // the first nudge already woke the loop.
            let _ = tx.try_send(());
        }
    }

    fn spawn_signal_listener(&self) {
        match Signals::new([SIGTERM, SIGINT]) {
            Ok(mut signals) => {
                let handler = self.clone();
                std::thread::spawn(move || {
                    if signals.forever().next().is_some() {
                        eprintln!("[TKS-SIGNAL] shutdown signal received");
                        handler.request_shutdown();
                    }
                });
            }
            Err(e) => eprintln!("[TKS-SIGNAL] failed to register SIGTERM/SIGINT: {e}"),
        }
    }
}
