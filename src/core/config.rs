//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TksError};

/// Canonical Bluetooth MAC format after normalization: `AA:BB:CC:DD:EE:FF`.
const MAC_FORMAT: &str = r"^(?:[0-9A-F]{2}:){5}[0-9A-F]{2}$";

/// Canonical USB identifier format after normalization: `VVVV:PPPP` hex.
const USB_ID_FORMAT: &str = r"^[0-9A-F]{4}:[0-9A-F]{4}$";

/// Full watchdog configuration model.
///
/// Loaded once at startup and never re-read. A watchdog that reloads its
/// own whitelists at runtime is an attack surface, so there is no SIGHUP
/// handling anywhere in the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub posix: PosixConfig,
    pub windows: WindowsConfig,
    pub bluetooth: BluetoothConfig,
    pub usb: UsbConfig,
    pub ethernet: EthernetConfig,
    pub email: EmailConfig,
    /// Effective config file path, recorded at load time.
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Loop cadence and kill-path behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalConfig {
    /// Seconds to sleep between clean polling cycles.
    pub poll_interval_secs: u64,
    /// File that receives one appended line per kill when the alert
    /// cannot be delivered.
    pub fallback_log: PathBuf,
    /// Whether an SMTP authentication failure also falls back to the
    /// local log (connectivity failures always do).
    pub auth_failure_fallback: bool,
}

/// Device and sysfs paths probed on POSIX hosts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PosixConfig {
    /// Sysfs flag file: "1" when AC power is attached.
    pub ac_file: PathBuf,
    /// Sysfs flag file: "1" when the battery is present.
    pub battery_file: PathBuf,
    /// Optical drive device node for the tray status ioctl.
    pub cdrom_drive: PathBuf,
    /// Sysfs carrier flag file for the watched Ethernet interface.
    pub ethernet_carrier: PathBuf,
}

/// Adapter identity probed on Windows hosts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct WindowsConfig {
    /// MAC address of the Ethernet adapter whose link state is watched.
    pub ethernet_interface: String,
}

/// Bluetooth whitelists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct BluetoothConfig {
    /// Allowed paired devices: normalized MAC → expected device name.
    pub paired: BTreeMap<String, String>,
    /// MACs allowed to be in the connected state.
    pub connected: Vec<String>,
}

/// USB whitelists and duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct UsbConfig {
    /// Identifiers permitted to be attached.
    pub allowed: Vec<String>,
    /// Identifiers that must be attached at all times.
    pub required: Vec<String>,
    /// Expected occurrence count per identifier; a mismatch flags a
    /// spoofed duplicate of a whitelisted device.
    pub expected_counts: BTreeMap<String, usize>,
}

/// Ethernet link policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct EthernetConfig {
    /// Interfaces exempt from the link-present violation.
    pub allowed_interfaces: Vec<String>,
}

/// Alert email transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub sender: String,
    pub recipients: Vec<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Name of the environment variable holding the SMTP credential.
    /// The credential itself never lives in the config file.
    pub password_env: String,
    /// Hard ceiling on the whole SMTP transaction so a hung server
    /// cannot delay the shutdown.
    pub timeout_secs: u64,
    /// OpenSSL cipher string restricting the TLS handshake, e.g.
    /// `"ECDHE-RSA-AES256-GCM-SHA384"`. `None` accepts curl's defaults.
    pub cipher_list: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            fallback_log: data_dir().join("kill-fallback.log"),
            auth_failure_fallback: true,
        }
    }
}

impl Default for PosixConfig {
    fn default() -> Self {
        Self {
            ac_file: PathBuf::from("/sys/class/power_supply/AC/online"),
            battery_file: PathBuf::from("/sys/class/power_supply/BAT0/present"),
            cdrom_drive: PathBuf::from("/dev/sr0"),
            ethernet_carrier: PathBuf::from("/sys/class/net/eth0/carrier"),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sender: String::new(),
            recipients: Vec::new(),
            smtp_host: String::new(),
            smtp_port: 465,
            password_env: "TKS_SMTP_PASSWORD".to_string(),
            timeout_secs: 3,
            cipher_list: None,
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[TKS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("tks")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir().join(".config").join("tks").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TksError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(TksError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(env_var)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("TKS_POLL_INTERVAL_SECS") {
            self.global.poll_interval_secs = parse_env_u64("TKS_POLL_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("TKS_FALLBACK_LOG") {
            self.global.fallback_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("TKS_AUTH_FAILURE_FALLBACK") {
            self.global.auth_failure_fallback = parse_env_bool("TKS_AUTH_FAILURE_FALLBACK", &raw)?;
        }
        if let Some(raw) = lookup("TKS_SMTP_HOST") {
            self.email.smtp_host = raw;
        }
        if let Some(raw) = lookup("TKS_SMTP_PORT") {
            self.email.smtp_port =
                raw.parse::<u16>().map_err(|error| TksError::ConfigParse {
                    context: "env",
                    details: format!("TKS_SMTP_PORT={raw:?}: {error}"),
                })?;
        }
        Ok(())
    }

    /// Normalize identifier casing so evaluation uses exact comparison.
    fn normalize(&mut self) {
        let paired: BTreeMap<String, String> = std::mem::take(&mut self.bluetooth.paired)
            .into_iter()
            .map(|(mac, name)| (mac.to_uppercase(), name))
            .collect();
        self.bluetooth.paired = paired;
        for mac in &mut self.bluetooth.connected {
            *mac = mac.to_uppercase();
        }
        for id in &mut self.usb.allowed {
            *id = id.to_uppercase();
        }
        for id in &mut self.usb.required {
            *id = id.to_uppercase();
        }
        let counts: BTreeMap<String, usize> = std::mem::take(&mut self.usb.expected_counts)
            .into_iter()
            .map(|(id, n)| (id.to_uppercase(), n))
            .collect();
        self.usb.expected_counts = counts;
        self.windows.ethernet_interface = self.windows.ethernet_interface.to_uppercase();
    }

    #[allow(clippy::too_many_lines)]
    pub fn validate(&self) -> Result<()> {
        if self.global.poll_interval_secs == 0 {
            return Err(TksError::InvalidConfig {
                details: "global.poll_interval_secs must be >= 1".to_string(),
            });
        }

        let mac_re = Regex::new(MAC_FORMAT).map_err(|error| TksError::InvalidConfig {
            details: format!("MAC format regex failed to compile: {error}"),
        })?;
        let usb_re = Regex::new(USB_ID_FORMAT).map_err(|error| TksError::InvalidConfig {
            details: format!("USB id format regex failed to compile: {error}"),
        })?;

        for mac in self
            .bluetooth
            .paired
            .keys()
            .chain(self.bluetooth.connected.iter())
        {
            if !mac_re.is_match(mac) {
                return Err(TksError::InvalidConfig {
                    details: format!("bluetooth MAC {mac:?} is not in AA:BB:CC:DD:EE:FF form"),
                });
            }
        }

        // Connected devices must also be paired; a connected-only entry
        // would always trip the paired check first.
        for mac in &self.bluetooth.connected {
            if !self.bluetooth.paired.contains_key(mac) {
                return Err(TksError::InvalidConfig {
                    details: format!("bluetooth.connected MAC {mac:?} is not in bluetooth.paired"),
                });
            }
        }

        for id in self
            .usb
            .allowed
            .iter()
            .chain(self.usb.required.iter())
            .chain(self.usb.expected_counts.keys())
        {
            if !usb_re.is_match(id) {
                return Err(TksError::InvalidConfig {
                    details: format!("usb id {id:?} is not in VVVV:PPPP hex form"),
                });
            }
        }

        for id in &self.usb.required {
            if !self.usb.allowed.contains(id) {
                return Err(TksError::InvalidConfig {
                    details: format!("usb.required id {id:?} is not in usb.allowed"),
                });
            }
        }

        for (id, count) in &self.usb.expected_counts {
            if *count == 0 {
                return Err(TksError::InvalidConfig {
                    details: format!("usb.expected_counts[{id:?}] must be >= 1"),
                });
            }
        }

        if self.email.enabled {
            if self.email.sender.is_empty() {
                return Err(TksError::InvalidConfig {
                    details: "email.sender is required when email.enabled=true".to_string(),
                });
            }
            if self.email.recipients.is_empty() {
                return Err(TksError::InvalidConfig {
                    details: "email.recipients is required when email.enabled=true".to_string(),
                });
            }
            if self.email.smtp_host.is_empty() {
                return Err(TksError::InvalidConfig {
                    details: "email.smtp_host is required when email.enabled=true".to_string(),
                });
            }
            if self.email.timeout_secs == 0 {
                return Err(TksError::InvalidConfig {
                    details: "email.timeout_secs must be >= 1".to_string(),
                });
            }
        }
        if matches!(&self.email.cipher_list, Some(list) if list.trim().is_empty()) {
            return Err(TksError::InvalidConfig {
                details: "email.cipher_list must be non-empty when set".to_string(),
            });
        }

        Ok(())
    }

    /// Deterministic hash of the effective config for startup logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes and
    /// Rust releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| TksError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| TksError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
