//! POSIX sampler: `bt-device`/`lsusb` subprocess probes, sysfs flag
//! reads, and the optical drive status ioctl.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process::Command;

use crate::core::config::{Config, PosixConfig};
use crate::core::errors::{Result, TksError};
use crate::sampler::{BtDevice, Sample, SampleOutcome, SignalKind, SignalSampler, parse};

/// `CDROM_DRIVE_STATUS` ioctl request (linux/cdrom.h).
const CDROM_DRIVE_STATUS: libc::c_ulong = 0x5326;

/// Sampler backed by command-line probes and sysfs.
#[derive(Debug, Clone)]
pub struct PosixSampler {
    paths: PosixConfig,
}

impl PosixSampler {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            paths: config.posix.clone(),
        }
    }

    fn sample_bluetooth(&self) -> Result<SampleOutcome> {
        let listing = probe(SignalKind::Bluetooth, "bt-device", &["--list"])?;
        let mut devices = Vec::new();
        for (mac, name) in parse::bt_paired_devices(&listing) {
            // One extra query per paired device; the tool has no way to
            // report connection state in the listing itself.
            let info = probe(SignalKind::Bluetooth, "bt-device", &["-i", &mac])?;
            devices.push(BtDevice {
                mac,
                name,
                connected: parse::bt_connected(&info),
            });
        }
        Ok(SampleOutcome::Observed(Sample::Bluetooth { devices }))
    }

    fn sample_usb(&self) -> Result<SampleOutcome> {
        let listing = probe(SignalKind::Usb, "lsusb", &[])?;
        Ok(SampleOutcome::Observed(Sample::Usb {
            ids: parse::usb_ids(&listing),
        }))
    }

    fn sample_ac(&self) -> Result<SampleOutcome> {
        Ok(match read_flag_file(&self.paths.ac_file, "ac")? {
            Some(online) => SampleOutcome::Observed(Sample::Ac { online }),
            None => SampleOutcome::Unavailable,
        })
    }

    fn sample_battery(&self) -> Result<SampleOutcome> {
        Ok(match read_flag_file(&self.paths.battery_file, "battery")? {
            Some(present) => SampleOutcome::Observed(Sample::Battery { present }),
            None => SampleOutcome::Unavailable,
        })
    }

    fn sample_tray(&self) -> Result<SampleOutcome> {
        // O_NONBLOCK: opening an optical drive without it blocks until a
        // disc is spun up, which is exactly the state being probed for.
        let file = match fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.paths.cdrom_drive)
        {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(SampleOutcome::Unavailable);
            }
            Err(error) => return Err(TksError::io(&self.paths.cdrom_drive, error)),
        };

        let status = drive_status(file.as_raw_fd());
        if status < 0 {
            return Err(TksError::sampler(
                SignalKind::Tray,
                format!(
                    "CDROM_DRIVE_STATUS ioctl failed on {}: {}",
                    self.paths.cdrom_drive.display(),
                    std::io::Error::last_os_error()
                ),
            ));
        }
        Ok(SampleOutcome::Observed(Sample::Tray { status }))
    }

    fn sample_ethernet(&self) -> Result<SampleOutcome> {
        let interface = interface_name(&self.paths.ethernet_carrier);
        Ok(
            match read_flag_file(&self.paths.ethernet_carrier, "ethernet")? {
                Some(carrier) => SampleOutcome::Observed(Sample::Ethernet { interface, carrier }),
                None => SampleOutcome::Unavailable,
            },
        )
    }
}

impl SignalSampler for PosixSampler {
    fn sample(&self, kind: SignalKind) -> Result<SampleOutcome> {
        match kind {
            SignalKind::Bluetooth => self.sample_bluetooth(),
            SignalKind::Usb => self.sample_usb(),
            SignalKind::Ac => self.sample_ac(),
            SignalKind::Battery => self.sample_battery(),
            SignalKind::Tray => self.sample_tray(),
            SignalKind::Ethernet => self.sample_ethernet(),
        }
    }

    fn supports(&self, _kind: SignalKind) -> bool {
        true
    }
}

#[allow(unsafe_code)]
fn drive_status(fd: std::os::fd::RawFd) -> i32 {
    // SAFETY: CDROM_DRIVE_STATUS carries no pointer argument and the fd
    // stays open for the duration of the call.
    unsafe { libc::ioctl(fd, CDROM_DRIVE_STATUS) }
}

/// Run one probe command and capture stdout. A missing tool or non-zero
/// exit is a sampler failure for the kind being probed.
fn probe(kind: SignalKind, program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|error| TksError::sampler(kind, format!("failed to run {program}: {error}")))?;
    if !output.status.success() {
        return Err(TksError::sampler(
            kind,
            format!("{program} exited with {}", output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Read a sysfs binary flag file. `None` means the file does not exist.
fn read_flag_file(path: &Path, context: &'static str) -> Result<Option<bool>> {
    match fs::read_to_string(path) {
        Ok(raw) => parse::sysfs_flag(&raw, context).map(Some),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(TksError::io(path, error)),
    }
}

/// Interface name embedded in a carrier path
/// (`/sys/class/net/eth0/carrier` -> `eth0`).
fn interface_name(carrier_path: &Path) -> String {
    carrier_path
        .parent()
        .and_then(Path::file_name)
        .map_or_else(|| "unknown".to_string(), |s| s.to_string_lossy().into_owned())
}
