use std::{
    fmt,
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{domain::Sender, Result};

const AUDIT_MAX_TEXT: usize = 500;

/// RFC3339 timestamp in UTC.
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, sender: Option<&Sender>) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: sender.map(|s| s.id.0),
            username: sender.and_then(|s| s.username.clone()),
            ..Self::default()
        }
    }

    pub fn command(sender: Option<&Sender>, command: &str, reply: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            authorized: Some(true),
            reply: Some(reply.to_string()),
            ..Self::base("command", sender)
        }
    }

    pub fn unauthorized(sender: Option<&Sender>, command: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            authorized: Some(false),
            ..Self::base("auth", sender)
        }
    }

    pub fn supervisor_restart(error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::base("restart", None)
        }
    }

    pub fn with_account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    fn clipped(mut self) -> Self {
        for field in [&mut self.command, &mut self.reply, &mut self.error] {
            if let Some(s) = field.as_mut() {
                *s = truncate_text(s, AUDIT_MAX_TEXT);
            }
        }
        self
    }
}

/// One line per event; free text is quoted so multi-line replies stay on it.
impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.timestamp, self.event)?;
        if let Some(account) = &self.account {
            write!(f, " account={account}")?;
        }
        match (self.user_id, &self.username) {
            (Some(id), Some(name)) => write!(f, " sender=@{name}({id})")?,
            (Some(id), None) => write!(f, " sender={id}")?,
            (None, Some(name)) => write!(f, " sender=@{name}")?,
            (None, None) => {}
        }
        if let Some(ok) = self.authorized {
            write!(f, " authorized={ok}")?;
        }
        if let Some(command) = &self.command {
            write!(f, " command={command:?}")?;
        }
        if let Some(reply) = &self.reply {
            write!(f, " reply={reply:?}")?;
        }
        if let Some(error) = &self.error {
            write!(f, " error={error:?}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, as a JSON line or a plain text line.
    pub fn write(&self, event: AuditEvent) -> Result<()> {
        let event = event.clipped();
        let line = if self.json {
            serde_json::to_string(&event)?
        } else {
            event.to_string()
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Write and log failures instead of returning them.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(path = %self.path.display(), "audit write failed: {e}");
        }
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
