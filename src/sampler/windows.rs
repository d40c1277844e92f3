//! Windows sampler: PowerShell CIM queries for USB, power, and adapter
//! link state. Bluetooth and the optical tray are not sampled on
//! Windows; `supports` reports them as absent capabilities.

#![allow(missing_docs)]

use std::process::Command;

use crate::core::config::{Config, WindowsConfig};
use crate::core::errors::{Result, TksError};
use crate::sampler::{Sample, SampleOutcome, SignalKind, SignalSampler, parse};

/// Sampler backed by PowerShell CIM queries.
#[derive(Debug, Clone)]
pub struct WindowsSampler {
    windows: WindowsConfig,
}

impl WindowsSampler {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            windows: config.windows.clone(),
        }
    }

    fn sample_usb(&self) -> Result<SampleOutcome> {
        let listing = cim_query(
            SignalKind::Usb,
            "(Get-CimInstance Win32_PnPEntity).DeviceID",
        )?;
        Ok(SampleOutcome::Observed(Sample::Usb {
            ids: parse::windows_usb_ids(&listing),
        }))
    }

    fn sample_ac(&self) -> Result<SampleOutcome> {
        let raw = cim_query(
            SignalKind::Ac,
            "(Get-CimInstance -Namespace root/wmi -ClassName BatteryStatus).PowerOnline",
        )?;
        match raw.trim() {
            "True" => Ok(SampleOutcome::Observed(Sample::Ac { online: true })),
            "False" => Ok(SampleOutcome::Observed(Sample::Ac { online: false })),
            // No battery instance: a desktop on mains power.
            "" => Ok(SampleOutcome::Observed(Sample::Ac { online: true })),
            other => Err(TksError::ProbeParse {
                context: "powershell",
                details: format!("unexpected PowerOnline value {other:?}"),
            }),
        }
    }

    fn sample_battery(&self) -> Result<SampleOutcome> {
        let raw = cim_query(
            SignalKind::Battery,
            "(Get-CimInstance Win32_Battery).DeviceID",
        )?;
        if raw.trim().is_empty() {
            return Ok(SampleOutcome::Unavailable);
        }
        Ok(SampleOutcome::Observed(Sample::Battery { present: true }))
    }

    fn sample_ethernet(&self) -> Result<SampleOutcome> {
        let listing = cim_query(
            SignalKind::Ethernet,
            "Get-CimInstance Win32_NetworkAdapter | \
             ForEach-Object { \"$($_.MACAddress) $($_.NetConnectionStatus)\" }",
        )?;
        let mac = &self.windows.ethernet_interface;
        match parse::adapter_link(&listing, mac) {
            Some(carrier) => Ok(SampleOutcome::Observed(Sample::Ethernet {
                interface: mac.clone(),
                carrier,
            })),
            None => Ok(SampleOutcome::Unavailable),
        }
    }
}

impl SignalSampler for WindowsSampler {
    fn sample(&self, kind: SignalKind) -> Result<SampleOutcome> {
        match kind {
            SignalKind::Usb => self.sample_usb(),
            SignalKind::Ac => self.sample_ac(),
            SignalKind::Battery => self.sample_battery(),
            SignalKind::Ethernet => self.sample_ethernet(),
            SignalKind::Bluetooth | SignalKind::Tray => Err(TksError::sampler(
                kind,
                "not supported on Windows".to_string(),
            )),
        }
    }

    fn supports(&self, kind: SignalKind) -> bool {
        !matches!(kind, SignalKind::Bluetooth | SignalKind::Tray)
    }
}

fn cim_query(kind: SignalKind, script: &str) -> Result<String> {
    let output = Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", script])
        .output()
        .map_err(|error| TksError::sampler(kind, format!("failed to run powershell: {error}")))?;
    if !output.status.success() {
        return Err(TksError::sampler(
            kind,
            format!("powershell exited with {}", output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
