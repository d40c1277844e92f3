//! Alert notification sink: one-shot SMTP submission via `curl`, with
//! explicit failure kinds so the kill path can decide whether to leave a
//! local fallback record.

#![allow(missing_docs)]

use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::core::config::EmailConfig;

/// Why an alert could not be delivered.
///
/// Distinct kinds instead of one broad failure: connectivity and
/// protocol failures always leave a local fallback record, auth failures
/// only when configured to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("connectivity failure: {details}")]
    Connectivity { details: String },

    #[error("authentication failure: {details}")]
    Auth { details: String },

    #[error("protocol failure: {details}")]
    Protocol { details: String },
}

/// One-shot alert delivery.
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attempt to deliver one alert. Called at most once per process life.
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Build the sink for the configured transport.
#[must_use]
pub fn make_sink(email: &EmailConfig) -> Box<dyn NotificationSink> {
    if email.enabled {
        Box::new(SmtpCurlSink::new(email.clone()))
    } else {
        Box::new(DisabledSink)
    }
}

// ──────────────────── smtp via curl ────────────────────

/// Submits the alert over SMTPS with `curl`, bounded by the configured
/// transaction timeout. curl's exit codes distinguish the failure kinds:
/// 6 (resolve), 7 (connect), and 28 (timeout) are connectivity; 67 is a
/// rejected login.
pub struct SmtpCurlSink {
    email: EmailConfig,
}

impl SmtpCurlSink {
    #[must_use]
    pub fn new(email: EmailConfig) -> Self {
        Self { email }
    }

    /// Full curl argument vector for one submission. Kept separate from
    /// the spawn so the transport settings can be checked without a
    /// network round trip.
    fn curl_args(&self, password: &str) -> Vec<String> {
        let url = format!("smtps://{}:{}", self.email.smtp_host, self.email.smtp_port);
        let mut args = vec![
            "--silent".to_string(),
            "--show-error".to_string(),
            "--ssl-reqd".to_string(),
            "--max-time".to_string(),
            self.email.timeout_secs.to_string(),
            "--url".to_string(),
            url,
            "--mail-from".to_string(),
            self.email.sender.clone(),
            "--user".to_string(),
            format!("{}:{password}", self.email.sender),
            "--upload-file".to_string(),
            "-".to_string(),
        ];
        if let Some(ciphers) = &self.email.cipher_list {
            args.push("--ciphers".to_string());
            args.push(ciphers.clone());
        }
        for recipient in &self.email.recipients {
            args.push("--mail-rcpt".to_string());
            args.push(recipient.clone());
        }
        args
    }

    fn message(&self, subject: &str, body: &str) -> String {
        let mut msg = String::new();
        msg.push_str(&format!("From: {}\r\n", self.email.sender));
        msg.push_str(&format!("To: {}\r\n", self.email.recipients.join(", ")));
        msg.push_str(&format!("Subject: {subject}\r\n\r\n"));
        msg.push_str(body);
        msg.push_str("\r\n");
        msg
    }
}

impl NotificationSink for SmtpCurlSink {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let password =
            std::env::var(&self.email.password_env).map_err(|_| NotifyError::Auth {
                details: format!("credential env var {} not set", self.email.password_env),
            })?;

        let mut cmd = Command::new("curl");
        cmd.args(self.curl_args(&password));

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| NotifyError::Connectivity {
                details: format!("failed to run curl: {error}"),
            })?;

        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            let _ = stdin.write_all(self.message(subject, body).as_bytes());
        }

        let output = child
            .wait_with_output()
            .map_err(|error| NotifyError::Connectivity {
                details: format!("curl did not complete: {error}"),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(6 | 7 | 28) => Err(NotifyError::Connectivity { details: stderr }),
            Some(67) => Err(NotifyError::Auth { details: stderr }),
            code => Err(NotifyError::Protocol {
                details: format!("curl exit {code:?}: {stderr}"),
            }),
        }
    }
}

// ──────────────────── disabled sink ────────────────────

/// Sink used when no transport is configured. Always reports a
/// connectivity failure so the kill path still leaves a local record of
/// why the host died.
pub struct DisabledSink;

impl NotificationSink for DisabledSink {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn send(&self, _subject: &str, _body: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Connectivity {
            details: "email notifications disabled".to_string(),
        })
    }
}

// ──────────────────── recording mock ────────────────────

/// Scripted sink for tests: records every send and returns a fixed result.
#[derive(Default)]
pub struct MockSink {
    outcome: Option<NotifyError>,
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

impl MockSink {
    #[must_use]
    pub fn succeeding() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(error: NotifyError) -> Self {
        Self {
            outcome: Some(error),
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every (subject, body) pair sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for MockSink {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((subject.to_string(), body.to_string()));
        match &self.outcome {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
