//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use tamper_kill_switch::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, TksError};

// Sampling
pub use crate::sampler::{
    BtDevice, Sample, SampleOutcome, SignalKind, SignalSampler, detect_sampler,
};

// Evaluation
pub use crate::verdict::{Verdict, Violation, evaluate};

// Kill path
pub use crate::kill::notify::{NotificationSink, NotifyError, make_sink};
pub use crate::kill::{KillCoordinator, KillState, PowerSwitch, SystemPower};

// Daemon
#[cfg(feature = "daemon")]
pub use crate::daemon::signals::SignalHandler;
#[cfg(feature = "daemon")]
pub use crate::daemon::watch::{
    CycleOutcome, InspectOutcome, InspectReport, PollLoop, stop_channel,
};
