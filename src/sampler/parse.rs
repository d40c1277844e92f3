//! Pure parsers for probe output: `bt-device`, `lsusb`, sysfs flag files,
//! and Windows adapter listings. No I/O; everything here is testable
//! without touching the host.

#![allow(missing_docs)]

use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::{Result, TksError};

static BT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.+?)\s\((?P<mac>(?:[0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2})\)$")
        .expect("hard-coded regex")
});

static BT_CONNECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Connected:\s*([01])").expect("hard-coded regex"));

static USB_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ID\s+([0-9A-Fa-f]{4}:[0-9A-Fa-f]{4})").expect("hard-coded regex")
});

static WIN_USB_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"VID_([0-9A-Fa-f]{4})&PID_([0-9A-Fa-f]{4})").expect("hard-coded regex")
});

/// Parse `bt-device --list` output into `(mac, name)` pairs, preserving
/// the order the tool reported them. Header lines and anything not shaped
/// like `Name (AA:BB:CC:DD:EE:FF)` are skipped.
#[must_use]
pub fn bt_paired_devices(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter_map(|line| {
            let caps = BT_LINE.captures(line.trim())?;
            Some((caps["mac"].to_uppercase(), caps["name"].to_string()))
        })
        .collect()
}

/// Extract the connected flag from `bt-device -i <mac>` output.
///
/// Returns `false` when the tool printed no `Connected:` field at all;
/// an absent field means the device is not connected.
#[must_use]
pub fn bt_connected(raw: &str) -> bool {
    BT_CONNECTED
        .captures(raw)
        .is_some_and(|caps| &caps[1] == "1")
}

/// Extract `VVVV:PPPP` identifiers from `lsusb` output, uppercased,
/// duplicates preserved.
#[must_use]
pub fn usb_ids(raw: &str) -> Vec<String> {
    USB_ID
        .captures_iter(raw)
        .map(|caps| caps[1].to_uppercase())
        .collect()
}

/// Extract `VVVV:PPPP` identifiers from Windows PnP device identifiers
/// (`USB\VID_046D&PID_C52B\...`), uppercased, duplicates preserved.
#[must_use]
pub fn windows_usb_ids(raw: &str) -> Vec<String> {
    WIN_USB_ID
        .captures_iter(raw)
        .map(|caps| format!("{}:{}", &caps[1].to_uppercase(), &caps[2].to_uppercase()))
        .collect()
}

/// Interpret a sysfs binary flag file ("0"/"1" plus trailing newline).
pub fn sysfs_flag(raw: &str, context: &'static str) -> Result<bool> {
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(TksError::ProbeParse {
            context,
            details: format!("expected \"0\" or \"1\", got {other:?}"),
        }),
    }
}

/// Find the link state of the adapter with the given MAC in a Windows
/// adapter listing (`<MAC> <NetConnectionStatus>` per line). Status code
/// 2 means connected. Returns `None` when the adapter is not listed.
#[must_use]
pub fn adapter_link(raw: &str, mac: &str) -> Option<bool> {
    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let (Some(addr), Some(status)) = (parts.next(), parts.next()) else {
            continue;
        };
        if addr.eq_ignore_ascii_case(mac) {
            return status.parse::<i32>().ok().map(|code| code == 2);
        }
    }
    None
}
