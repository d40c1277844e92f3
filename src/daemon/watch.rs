//! The poll loop: fixed-order sampling, whitelist evaluation, and kill
//! routing, with a cancellable sleep between clean cycles.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::daemon::signals::SignalHandler;
use crate::kill::KillCoordinator;
use crate::sampler::{Sample, SampleOutcome, SignalKind, SignalSampler};
use crate::verdict::{self, Verdict, Violation, evaluate};

// ──────────────────── cycle outcome ────────────────────

/// Result of one enforcement cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Clean,
    Fatal(Violation),
}

/// One signal's result in an inspection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub kind: SignalKind,
    #[serde(flatten)]
    pub outcome: InspectOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum InspectOutcome {
    /// The platform cannot sample this kind at all.
    Unsupported,
    /// Optional hardware absent on this host.
    Unavailable,
    /// The sampler failed outright (fatal in enforcement mode).
    Failed { details: String },
    Evaluated { sample: Sample, verdict: Verdict },
}

// ──────────────────── poll loop ────────────────────

/// Create the stop channel for a poll loop. Dropping the sender (or
/// sending on it) cancels the inter-cycle sleep.
#[must_use]
pub fn stop_channel() -> (Sender<()>, Receiver<()>) {
    bounded(1)
}

/// Single-threaded polling engine. One cycle completes (or
/// short-circuits on violation) before the next begins; Bluetooth
/// sampling issues two sequential queries per paired device, so
/// interleaved cycles would tear device snapshots.
pub struct PollLoop {
    config: Config,
    sampler: Arc<dyn SignalSampler>,
    stop_rx: Receiver<()>,
}

impl PollLoop {
    #[must_use]
    pub fn new(config: Config, sampler: Arc<dyn SignalSampler>, stop_rx: Receiver<()>) -> Self {
        Self {
            config,
            sampler,
            stop_rx,
        }
    }

    /// Enforcement mode: poll until a violation kills the host or a
    /// shutdown signal arrives.
    pub fn run(&self, signals: &SignalHandler, coordinator: &mut KillCoordinator<'_>) -> Result<()> {
        let hash = self.config.stable_hash()?;
        eprintln!(
            "[TKS-WATCH] enforcement started (config {hash}, interval {}s)",
            self.config.global.poll_interval_secs
        );

        loop {
            if signals.should_shutdown() {
                eprintln!("[TKS-WATCH] shutdown requested, stopping");
                return Ok(());
            }

            match self.run_cycle() {
                CycleOutcome::Fatal(violation) => {
                    coordinator.execute(&violation);
                    return Ok(());
                }
                CycleOutcome::Clean => {}
            }

            let interval = Duration::from_secs(self.config.global.poll_interval_secs);
            match self.stop_rx.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    eprintln!("[TKS-WATCH] stop requested, stopping");
                    return Ok(());
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    /// One enforcement cycle: sample each supported kind in order and
    /// stop at the first fatal result. Remaining kinds are not evaluated;
    /// the process is about to terminate.
    #[must_use]
    pub fn run_cycle(&self) -> CycleOutcome {
        for kind in SignalKind::ALL {
            if !self.sampler.supports(kind) {
                continue;
            }
            match self.sampler.sample(kind) {
                Err(error) => {
                    // Favor false positives over missed tamper events: an
                    // unreadable mandatory signal is itself a kill.
                    return CycleOutcome::Fatal(Violation::new(
                        kind,
                        verdict::SAMPLER_FAILURE,
                        error.to_string(),
                    ));
                }
                Ok(SampleOutcome::Unavailable) => {
                    if kind.is_optional() {
                        continue;
                    }
                    return CycleOutcome::Fatal(Violation::new(
                        kind,
                        verdict::SAMPLER_UNAVAILABLE,
                        format!("{kind} resource missing"),
                    ));
                }
                Ok(SampleOutcome::Observed(sample)) => {
                    match evaluate(&sample, &self.config) {
                        Verdict::Ok => {}
                        Verdict::Violation(violation) => {
                            return CycleOutcome::Fatal(violation);
                        }
                    }
                }
            }
        }
        CycleOutcome::Clean
    }

    /// Inspection mode: exactly one cycle, every signal evaluated, no
    /// short-circuit, no kill. The coordinator is never constructed here;
    /// this mode is incapable of powering the host off.
    #[must_use]
    pub fn inspect(&self) -> Vec<InspectReport> {
        SignalKind::ALL
            .into_iter()
            .map(|kind| {
                let outcome = if self.sampler.supports(kind) {
                    match self.sampler.sample(kind) {
                        Err(error) => InspectOutcome::Failed {
                            details: error.to_string(),
                        },
                        Ok(SampleOutcome::Unavailable) => InspectOutcome::Unavailable,
                        Ok(SampleOutcome::Observed(sample)) => {
                            let verdict = evaluate(&sample, &self.config);
                            InspectOutcome::Evaluated { sample, verdict }
                        }
                    }
                } else {
                    InspectOutcome::Unsupported
                };
                InspectReport { kind, outcome }
            })
            .collect()
    }
}
