#![deny(unsafe_code)]

//! Tamper Kill Switch (tks) — a host dead-man's-switch watchdog.
//!
//! Polls a fixed set of hardware signals (Bluetooth pairings, attached
//! USB identifiers, AC power, battery presence, optical tray state,
//! Ethernet link) against configured whitelists. Any mismatch sends a
//! best-effort alert and then powers the host off, unconditionally.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use tamper_kill_switch::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use tamper_kill_switch::core::config::Config;
//! use tamper_kill_switch::sampler::{SignalKind, detect_sampler};
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod kill;
pub mod sampler;
pub mod verdict;
