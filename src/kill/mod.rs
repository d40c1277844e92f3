//! Kill coordinator: best-effort alert, best-effort local record, then an
//! unconditional power-off. Failure to notify must never prevent the kill,
//! and the kill must fire at most once.

#![allow(missing_docs)]

pub mod notify;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use crate::core::config::GlobalConfig;
use crate::core::errors::{Result, TksError};
use crate::kill::notify::{NotificationSink, NotifyError};
use crate::verdict::Violation;

// ──────────────────── power switch ────────────────────

/// The process-exit boundary: issue the platform power-off command,
/// fire-and-forget, no confirmation expected.
pub trait PowerSwitch: Send + Sync {
    fn power_off(&self) -> Result<()>;
}

/// The real thing. `/sbin/poweroff -f` on POSIX, `shutdown.exe` on Windows.
#[derive(Debug, Default)]
pub struct SystemPower;

impl PowerSwitch for SystemPower {
    fn power_off(&self) -> Result<()> {
        #[cfg(unix)]
        let spawned = Command::new("/sbin/poweroff").arg("-f").spawn();
        #[cfg(windows)]
        let spawned = Command::new("shutdown.exe")
            .args(["/s", "/f", "/t", "00"])
            .spawn();
        #[cfg(not(any(unix, windows)))]
        let spawned: std::io::Result<std::process::Child> = Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "no power-off command for this platform",
        ));

        spawned
            .map(|_child| ())
            .map_err(|error| TksError::Runtime {
                details: format!("failed to issue power-off: {error}"),
            })
    }
}

/// Recording mock for tests.
#[derive(Debug, Default)]
pub struct MockPower {
    calls: std::sync::atomic::AtomicUsize,
}

impl MockPower {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl PowerSwitch for MockPower {
    fn power_off(&self) -> Result<()> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

// ──────────────────── coordinator ────────────────────

/// Coordinator state. `Terminating` is terminal; the process makes no
/// further observable decisions after entering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillState {
    Armed,
    Terminating,
}

/// Drives the notify-then-power-off sequence for one violation.
pub struct KillCoordinator<'a> {
    sink: &'a dyn NotificationSink,
    power: &'a dyn PowerSwitch,
    fallback_log: PathBuf,
    auth_failure_fallback: bool,
    state: KillState,
}

impl<'a> KillCoordinator<'a> {
    #[must_use]
    pub fn new(
        sink: &'a dyn NotificationSink,
        power: &'a dyn PowerSwitch,
        global: &GlobalConfig,
    ) -> Self {
        Self {
            sink,
            power,
            fallback_log: global.fallback_log.clone(),
            auth_failure_fallback: global.auth_failure_fallback,
            state: KillState::Armed,
        }
    }

    #[must_use]
    pub const fn state(&self) -> KillState {
        self.state
    }

    /// Execute the kill sequence. Idempotent: a second call is a no-op.
    pub fn execute(&mut self, violation: &Violation) {
        if self.state == KillState::Terminating {
            return;
        }
        self.state = KillState::Terminating;

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        eprintln!("[TKS-KILL] {timestamp} {violation}; powering off");

        let subject = format!("[ALERT: {}]", violation.reason);
        let body = format!("{timestamp}\n{violation}");
        match self.sink.send(&subject, &body) {
            Ok(()) => {
                eprintln!("[TKS-KILL] alert delivered via {}", self.sink.name());
            }
            Err(error) => {
                eprintln!("[TKS-KILL] alert failed: {error}");
                if self.should_fall_back(&error) {
                    self.append_fallback(&timestamp, violation, &error);
                }
            }
        }

        // Unconditional, regardless of how notification went.
        if let Err(error) = self.power.power_off() {
            eprintln!("[TKS-KILL] {error}");
        }
    }

    const fn should_fall_back(&self, error: &NotifyError) -> bool {
        match error {
            NotifyError::Connectivity { .. } | NotifyError::Protocol { .. } => true,
            NotifyError::Auth { .. } => self.auth_failure_fallback,
        }
    }

    /// Append one line to the fallback log. Best-effort: its own failure
    /// is reported to stderr and otherwise swallowed.
    fn append_fallback(&self, timestamp: &str, violation: &Violation, error: &NotifyError) {
        if let Some(parent) = self.fallback_log.parent() {
            let _ = fs::create_dir_all(parent);
        }

        let file = {
            let mut opts = OpenOptions::new();
            opts.create(true).append(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o600);
            }
            opts.open(&self.fallback_log)
        };

        match file {
            Ok(mut f) => {
                let _ = writeln!(f, "{timestamp} {violation} [alert undeliverable: {error}]");
            }
            Err(io_error) => {
                eprintln!(
                    "[TKS-KILL] fallback log {} unwritable: {io_error}",
                    self.fallback_log.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kill::notify::MockSink;
    use crate::sampler::SignalKind;
    use crate::verdict;

    fn violation() -> Violation {
        Violation::new(SignalKind::Tray, verdict::CD_TRAY, "drive status 4")
    }

    fn global_config(dir: &std::path::Path, auth_fallback: bool) -> GlobalConfig {
        GlobalConfig {
            poll_interval_secs: 1,
            fallback_log: dir.join("fallback.log"),
            auth_failure_fallback: auth_fallback,
        }
    }

    fn fallback_lines(global: &GlobalConfig) -> Vec<String> {
        match std::fs::read_to_string(&global.fallback_log) {
            Ok(raw) => raw.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn connectivity_failure_still_powers_off_and_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let global = global_config(dir.path(), true);
        let sink = MockSink::failing(NotifyError::Connectivity {
            details: "host unreachable".to_string(),
        });
        let power = MockPower::new();

        let mut coordinator = KillCoordinator::new(&sink, &power, &global);
        coordinator.execute(&violation());

        assert_eq!(power.call_count(), 1);
        let lines = fallback_lines(&global);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("CD Tray"));
        assert!(lines[0].contains("alert undeliverable"));
    }

    #[test]
    fn successful_alert_leaves_no_fallback_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let global = global_config(dir.path(), true);
        let sink = MockSink::succeeding();
        let power = MockPower::new();

        let mut coordinator = KillCoordinator::new(&sink, &power, &global);
        coordinator.execute(&violation());

        assert_eq!(power.call_count(), 1);
        assert!(fallback_lines(&global).is_empty());
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "[ALERT: CD Tray]");
        assert!(sent[0].1.contains("drive status 4"));
    }

    #[test]
    fn kill_fires_exactly_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let global = global_config(dir.path(), true);
        let sink = MockSink::succeeding();
        let power = MockPower::new();

        let mut coordinator = KillCoordinator::new(&sink, &power, &global);
        coordinator.execute(&violation());
        coordinator.execute(&violation());

        assert_eq!(power.call_count(), 1);
        assert_eq!(coordinator.state(), KillState::Terminating);
        assert_eq!(sink.sent().len(), 1);
    }

    #[test]
    fn auth_failure_fallback_is_configurable() {
        for (configured, expected_lines) in [(true, 1), (false, 0)] {
            let dir = tempfile::tempdir().expect("tempdir");
            let global = global_config(dir.path(), configured);
            let sink = MockSink::failing(NotifyError::Auth {
                details: "login rejected".to_string(),
            });
            let power = MockPower::new();

            let mut coordinator = KillCoordinator::new(&sink, &power, &global);
            coordinator.execute(&violation());

            assert_eq!(power.call_count(), 1, "power must fire regardless");
            assert_eq!(fallback_lines(&global).len(), expected_lines);
        }
    }

    #[test]
    fn protocol_failure_logs_fallback_and_powers_off() {
        // Server-side rejections leave the machine as unalerted as a dead
        // link does, so they get the same local record. Only auth failures
        // are policy-gated.
        let dir = tempfile::tempdir().expect("tempdir");
        let global = global_config(dir.path(), false);
        let sink = MockSink::failing(NotifyError::Protocol {
            details: "550 mailbox unavailable".to_string(),
        });
        let power = MockPower::new();

        let mut coordinator = KillCoordinator::new(&sink, &power, &global);
        coordinator.execute(&violation());

        assert_eq!(power.call_count(), 1);
        let lines = fallback_lines(&global);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("550 mailbox unavailable"));
    }
}
