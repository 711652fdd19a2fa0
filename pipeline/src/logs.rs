//! Run log handle.
//!
//! Every stage receives a [`RunLog`] explicitly. Entries are printed to
//! stdout (unless the log is silent) and broadcast to any subscriber, so a
//! caller or a test can observe what a stage reported without global state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the broadcast channel; slow subscribers lose the oldest entries.
const CHANNEL_CAPACITY: usize = 256;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    /// Stage that emitted the entry (`load`, `clean`, ...)
    pub stage: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Cloneable handle that stages log through.
#[derive(Debug, Clone)]
pub struct RunLog {
    sender: broadcast::Sender<LogEntry>,
    echo: bool,
    stage: &'static str,
}

impl RunLog {
    /// A log that prints every entry.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            echo: true,
            stage: "run",
        }
    }

    /// A log that only broadcasts (tests, embedding callers).
    pub fn silent() -> Self {
        Self {
            echo: false,
            ..Self::new()
        }
    }

    /// Same channel, entries tagged with `stage`.
    pub fn for_stage(&self, stage: &'static str) -> Self {
        Self {
            sender: self.sender.clone(),
            echo: self.echo,
            stage,
        }
    }

    /// Get a receiver for entries logged from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    fn log(&self, level: LogLevel, message: String) {
        let entry = LogEntry {
            level,
            stage: self.stage.to_string(),
            message,
            timestamp: Utc::now(),
        };

        if self.echo {
            let prefix = match entry.level {
                LogLevel::Info => "   ",
                LogLevel::Success => "   ✓",
                LogLevel::Warning => "   ⚠️",
                LogLevel::Error => "   ❌",
            };
            println!("{} [{}] {}", prefix, entry.stage, entry.message);
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.log(LogLevel::Info, msg.into());
    }

    pub fn success(&self, msg: impl Into<String>) {
        self.log(LogLevel::Success, msg.into());
    }

    pub fn warning(&self, msg: impl Into<String>) {
        self.log(LogLevel::Warning, msg.into());
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.log(LogLevel::Error, msg.into());
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain everything currently buffered on a receiver.
pub fn drain(receiver: &mut broadcast::Receiver<LogEntry>) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(entry) => entries.push(entry),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    entries
}
