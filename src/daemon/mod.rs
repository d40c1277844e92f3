//! Daemon subsystem: the enforcement poll loop and signal handling.

#[cfg(feature = "daemon")]
pub mod signals;
#[cfg(feature = "daemon")]
pub mod watch;
