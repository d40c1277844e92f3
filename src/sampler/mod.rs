//! Signal samplers: per-kind host state acquisition behind one trait.
//!
//! Each sampler call performs exactly one external query chain (process
//! invocation, file read, or ioctl) and never retries internally. Expected
//! absence of optional hardware is a value (`SampleOutcome::Unavailable`),
//! not an error.

#![allow(missing_docs)]

pub mod parse;
#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::config::Config;
use crate::core::errors::Result;
#[cfg(not(any(unix, windows)))]
use crate::core::errors::TksError;

// ──────────────────── model ────────────────────

/// The closed set of monitored signal classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Bluetooth,
    Usb,
    Ac,
    Battery,
    Tray,
    Ethernet,
}

impl SignalKind {
    /// All kinds in polling order.
    pub const ALL: [Self; 6] = [
        Self::Bluetooth,
        Self::Usb,
        Self::Ac,
        Self::Battery,
        Self::Tray,
        Self::Ethernet,
    ];

    /// Whether absence of the underlying hardware is normal.
    ///
    /// A desktop without a battery or an optical drive is unremarkable;
    /// a host that cannot report AC, USB, Ethernet, or Bluetooth state
    /// is assumed tampered with.
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::Battery | Self::Tray)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bluetooth => "bluetooth",
            Self::Usb => "usb",
            Self::Ac => "ac",
            Self::Battery => "battery",
            Self::Tray => "tray",
            Self::Ethernet => "ethernet",
        };
        f.write_str(name)
    }
}

/// One paired Bluetooth device as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtDevice {
    /// Normalized MAC: uppercase, colon-separated octets.
    pub mac: String,
    pub name: String,
    pub connected: bool,
}

/// Raw result of querying one signal kind at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "signal")]
pub enum Sample {
    /// Paired devices in the order the host reported them.
    Bluetooth { devices: Vec<BtDevice> },
    /// Attached identifiers, duplicates preserved.
    Usb { ids: Vec<String> },
    Ac { online: bool },
    Battery { present: bool },
    /// Raw drive status code: 1 no disc, 2 tray open, 3 not ready, 4 disc present.
    Tray { status: i32 },
    Ethernet { interface: String, carrier: bool },
}

impl Sample {
    /// Which signal kind this sample belongs to.
    #[must_use]
    pub const fn kind(&self) -> SignalKind {
        match self {
            Self::Bluetooth { .. } => SignalKind::Bluetooth,
            Self::Usb { .. } => SignalKind::Usb,
            Self::Ac { .. } => SignalKind::Ac,
            Self::Battery { .. } => SignalKind::Battery,
            Self::Tray { .. } => SignalKind::Tray,
            Self::Ethernet { .. } => SignalKind::Ethernet,
        }
    }
}

/// Result of one sampler call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOutcome {
    Observed(Sample),
    /// The underlying resource does not exist on this host.
    Unavailable,
}

// ──────────────────── trait + dispatch ────────────────────

/// Per-platform signal acquisition.
pub trait SignalSampler: Send + Sync {
    /// Query current raw state for one signal kind.
    fn sample(&self, kind: SignalKind) -> Result<SampleOutcome>;

    /// Whether this platform can sample the kind at all.
    ///
    /// A missing capability (Bluetooth or Tray on Windows) is a static
    /// platform property, distinct from runtime unavailability.
    fn supports(&self, kind: SignalKind) -> bool;
}

/// Select the sampler implementation for the current host.
///
/// Selected exactly once at startup; there is no runtime switching.
#[allow(unused_variables)]
pub fn detect_sampler(config: &Config) -> Result<Arc<dyn SignalSampler>> {
    #[cfg(unix)]
    {
        Ok(Arc::new(posix::PosixSampler::new(config)))
    }
    #[cfg(windows)]
    {
        Ok(Arc::new(windows::WindowsSampler::new(config)))
    }
    #[cfg(not(any(unix, windows)))]
    {
        Err(TksError::UnsupportedPlatform {
            details: "only POSIX and Windows hosts are supported".to_string(),
        })
    }
}

// ──────────────────── mock ────────────────────

/// Scripted sampler for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct MockSampler {
    outcomes: std::collections::HashMap<SignalKind, SampleOutcome>,
    unsupported: Vec<SignalKind>,
    failing: Vec<SignalKind>,
}

impl MockSampler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_outcome(mut self, kind: SignalKind, outcome: SampleOutcome) -> Self {
        self.outcomes.insert(kind, outcome);
        self
    }

    #[must_use]
    pub fn with_sample(self, sample: Sample) -> Self {
        let kind = sample.kind();
        self.with_outcome(kind, SampleOutcome::Observed(sample))
    }

    #[must_use]
    pub fn with_unsupported(mut self, kind: SignalKind) -> Self {
        self.unsupported.push(kind);
        self
    }

    /// Script a hard sampler failure for a kind.
    #[must_use]
    pub fn with_failure(mut self, kind: SignalKind) -> Self {
        self.failing.push(kind);
        self
    }
}

impl SignalSampler for MockSampler {
    fn sample(&self, kind: SignalKind) -> Result<SampleOutcome> {
        if self.failing.contains(&kind) {
            return Err(crate::core::errors::TksError::sampler(
                kind,
                "scripted failure",
            ));
        }
        Ok(self
            .outcomes
            .get(&kind)
            .cloned()
            .unwrap_or(SampleOutcome::Unavailable))
    }

    fn supports(&self, kind: SignalKind) -> bool {
        !self.unsupported.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_order_is_stable() {
        assert_eq!(
            SignalKind::ALL,
            [
                SignalKind::Bluetooth,
                SignalKind::Usb,
                SignalKind::Ac,
                SignalKind::Battery,
                SignalKind::Tray,
                SignalKind::Ethernet,
            ]
        );
    }

    #[test]
    fn only_battery_and_tray_are_optional() {
        for kind in SignalKind::ALL {
            assert_eq!(
                kind.is_optional(),
                matches!(kind, SignalKind::Battery | SignalKind::Tray),
                "optionality wrong for {kind}"
            );
        }
    }

    #[test]
    fn sample_reports_its_kind() {
        assert_eq!(Sample::Ac { online: true }.kind(), SignalKind::Ac);
        assert_eq!(
            Sample::Ethernet {
                interface: "eth0".to_string(),
                carrier: false,
            }
            .kind(),
            SignalKind::Ethernet
        );
    }

    #[test]
    fn mock_sampler_defaults_to_unavailable() {
        let mock = MockSampler::new();
        let outcome = mock.sample(SignalKind::Battery).expect("mock sample");
        assert_eq!(outcome, SampleOutcome::Unavailable);
    }

    #[test]
    fn mock_sampler_scripted_outcomes() {
        let mock = MockSampler::new()
            .with_sample(Sample::Ac { online: true })
            .with_unsupported(SignalKind::Tray)
            .with_failure(SignalKind::Usb);

        assert_eq!(
            mock.sample(SignalKind::Ac).expect("mock sample"),
            SampleOutcome::Observed(Sample::Ac { online: true })
        );
        assert!(!mock.supports(SignalKind::Tray));
        assert!(mock.supports(SignalKind::Ac));
        let err = mock.sample(SignalKind::Usb).expect_err("scripted failure");
        assert_eq!(err.code(), "TKS-2001");
    }

    #[test]
    fn signal_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SignalKind::Bluetooth).expect("serialize");
        assert_eq!(json, "\"bluetooth\"");
    }
}
