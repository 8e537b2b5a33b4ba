//! Shared status and error log for a migration run
//!
//! The worker appends, pollers take full-text snapshots. Each entry is pushed
//! as one unit under a short write lock, so a snapshot never contains half an
//! entry. Every append is mirrored to `tracing`.

use crate::error::Error;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};

/// Importance of a status entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusLevel {
    /// Request-level detail
    Debug,
    /// Per-item progress
    Verbose,
    /// Always shown
    Normal,
}

/// One timestamped log line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// When the entry was appended
    pub timestamp: DateTime<Utc>,
    /// Entry text
    pub text: String,
}

struct LogInner {
    min_level: StatusLevel,
    status: RwLock<Vec<LogEntry>>,
    errors: RwLock<Vec<LogEntry>>,
}

/// Append-only status and error log, cheap to clone and share
#[derive(Clone)]
pub struct TaskLog {
    inner: Arc<LogInner>,
}

impl TaskLog {
    /// Create a log; `verbose` keeps [`StatusLevel::Verbose`] and [`StatusLevel::Debug`] entries
    pub fn new(verbose: bool) -> Self {
        let min_level = if verbose {
            StatusLevel::Debug
        } else {
            StatusLevel::Normal
        };
        Self {
            inner: Arc::new(LogInner {
                min_level,
                status: RwLock::new(Vec::new()),
                errors: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Append a normal status line
    pub fn add_status(&self, text: impl Into<String>) {
        self.add_status_at(text, StatusLevel::Normal);
    }

    /// Append a status line at `level`; lines below the minimum level are dropped
    pub fn add_status_at(&self, text: impl Into<String>, level: StatusLevel) {
        let text = text.into();
        match level {
            StatusLevel::Normal => tracing::info!("{text}"),
            StatusLevel::Verbose | StatusLevel::Debug => tracing::debug!("{text}"),
        }
        if level < self.inner.min_level {
            return;
        }
        let text = if level == StatusLevel::Normal {
            text
        } else {
            format!("     {text}")
        };
        push(&self.inner.status, text);
    }

    /// Append a section header framed by separator lines
    pub fn add_status_header(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!("{text}");
        let mut entries = self
            .inner
            .status
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let timestamp = Utc::now();
        for line in ["****".to_string(), text, "****".to_string()] {
            entries.push(LogEntry {
                timestamp,
                text: line,
            });
        }
    }

    /// Append an error line; it is echoed to the status log as well
    pub fn add_error(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::error!("{text}");
        push(&self.inner.status, format!("Error: {text}"));
        push(&self.inner.errors, text);
    }

    /// Append `error` with the context it happened in
    pub fn record_error(&self, context: &str, error: &Error) {
        self.add_error(format!("[{}] {context}: {error}", error.code()));
    }

    /// Snapshot of the status log as text
    pub fn status_text(&self) -> String {
        render(&self.inner.status)
    }

    /// Snapshot of the error log as text
    pub fn error_text(&self) -> String {
        render(&self.inner.errors)
    }

    /// Snapshot of the status entries
    pub fn status_entries(&self) -> Vec<LogEntry> {
        self.inner
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the error entries
    pub fn error_entries(&self) -> Vec<LogEntry> {
        self.inner
            .errors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of errors recorded so far
    pub fn error_count(&self) -> usize {
        self.inner
            .errors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for TaskLog {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for TaskLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLog")
            .field("min_level", &self.inner.min_level)
            .field("errors", &self.error_count())
            .finish()
    }
}

fn push(entries: &RwLock<Vec<LogEntry>>, text: String) {
    let entry = LogEntry {
        timestamp: Utc::now(),
        text,
    };
    entries
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(entry);
}

fn render(entries: &RwLock<Vec<LogEntry>>) -> String {
    let entries = entries
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{:03}, {}, {}\n",
            index + 1,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.text
        ));
    }
    out
}
