//! Whitelist evaluator: pure decision logic mapping one sample to a
//! kill-or-continue verdict. No I/O, no hidden state; calling it twice
//! on the same inputs yields the same verdict.

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::config::Config;
use crate::sampler::{Sample, SignalKind};

// ──────────────────── reason tags ────────────────────

pub const BLUETOOTH_PAIRED: &str = "Bluetooth Paired";
pub const BLUETOOTH_CONNECTED_MAC: &str = "Bluetooth Connected MAC Disallowed";
pub const BLUETOOTH_CONNECTED_NAME: &str = "Bluetooth Connected Name Mismatch";
pub const USB_ALLOWED: &str = "USB Allowed Whitelist";
pub const USB_CONNECTED: &str = "USB Connected Whitelist";
pub const USB_DUPLICATE: &str = "USB Duplicate Device";
pub const AC: &str = "AC";
pub const BATTERY: &str = "Battery";
pub const CD_TRAY: &str = "CD Tray";
pub const ETHERNET: &str = "Ethernet";
pub const SAMPLER_FAILURE: &str = "Sampler Failure";
pub const SAMPLER_UNAVAILABLE: &str = "Sampler Unavailable";

// ──────────────────── verdict model ────────────────────

/// A whitelist or state mismatch. Always fatal in enforcement mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub kind: SignalKind,
    /// Fixed human-readable tag naming the broken rule.
    pub reason: &'static str,
    /// The offending identifier or observed state.
    pub detail: String,
}

impl Violation {
    #[must_use]
    pub fn new(kind: SignalKind, reason: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            reason,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.reason, self.detail)
    }
}

/// Evaluator output for one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum Verdict {
    Ok,
    Violation(Violation),
}

impl Verdict {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

// ──────────────────── evaluation ────────────────────

/// Evaluate one sample against the configured whitelists.
///
/// Devices are checked in sampler order and the first broken rule wins:
/// the process is about to terminate, so nothing later matters.
#[must_use]
pub fn evaluate(sample: &Sample, config: &Config) -> Verdict {
    match sample {
        Sample::Bluetooth { devices } => evaluate_bluetooth(devices, config),
        Sample::Usb { ids } => evaluate_usb(ids, config),
        Sample::Ac { online } => {
            if *online {
                Verdict::Ok
            } else {
                Verdict::Violation(Violation::new(SignalKind::Ac, AC, "AC power offline"))
            }
        }
        Sample::Battery { present } => {
            if *present {
                Verdict::Ok
            } else {
                Verdict::Violation(Violation::new(
                    SignalKind::Battery,
                    BATTERY,
                    "battery removed",
                ))
            }
        }
        Sample::Tray { status } => {
            // 1 is the "no disc" sentinel; any other code means the tray
            // has been touched.
            if *status == 1 {
                Verdict::Ok
            } else {
                Verdict::Violation(Violation::new(
                    SignalKind::Tray,
                    CD_TRAY,
                    format!("drive status {status}"),
                ))
            }
        }
        Sample::Ethernet { interface, carrier } => {
            if *carrier && !config.ethernet.allowed_interfaces.contains(interface) {
                Verdict::Violation(Violation::new(
                    SignalKind::Ethernet,
                    ETHERNET,
                    format!("link present on {interface}"),
                ))
            } else {
                Verdict::Ok
            }
        }
    }
}

fn evaluate_bluetooth(devices: &[crate::sampler::BtDevice], config: &Config) -> Verdict {
    for device in devices {
        let Some(expected_name) = config.bluetooth.paired.get(&device.mac) else {
            return Verdict::Violation(Violation::new(
                SignalKind::Bluetooth,
                BLUETOOTH_PAIRED,
                device.mac.clone(),
            ));
        };
        if !device.connected {
            continue;
        }
        if !config.bluetooth.connected.contains(&device.mac) {
            return Verdict::Violation(Violation::new(
                SignalKind::Bluetooth,
                BLUETOOTH_CONNECTED_MAC,
                device.mac.clone(),
            ));
        }
        if device.name != *expected_name {
            return Verdict::Violation(Violation::new(
                SignalKind::Bluetooth,
                BLUETOOTH_CONNECTED_NAME,
                format!("{} reported name {:?}", device.mac, device.name),
            ));
        }
    }
    Verdict::Ok
}

fn evaluate_usb(ids: &[String], config: &Config) -> Verdict {
    for id in ids {
        if !config.usb.allowed.contains(id) {
            return Verdict::Violation(Violation::new(SignalKind::Usb, USB_ALLOWED, id.clone()));
        }
    }
    for required in &config.usb.required {
        if !ids.contains(required) {
            return Verdict::Violation(Violation::new(
                SignalKind::Usb,
                USB_CONNECTED,
                required.clone(),
            ));
        }
    }
    for (id, expected) in &config.usb.expected_counts {
        let observed = ids.iter().filter(|sampled| *sampled == id).count();
        if observed != *expected {
            return Verdict::Violation(Violation::new(
                SignalKind::Usb,
                USB_DUPLICATE,
                format!("{id} seen {observed} times, expected {expected}"),
            ));
        }
    }
    Verdict::Ok
}
