//! Audit logging — where provenance events end up.
//!
//! [`AuditLogger`] keeps a bounded window of recent events in memory and fans
//! every event out to further sinks.
//! [`TracingSink`] logs them; [`JsonlFileSink`] appends them to daily files.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use countbot_core::error::ProvenanceError;
use countbot_core::provenance::{ProvenanceEvent, ProvenanceSink};

/// Events kept in memory unless [`AuditLogger::with_capacity`] says otherwise.
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// In-memory audit logger holding the most recent events.
///
/// Once `capacity` is reached the oldest event is dropped for each new one.
/// Forwarding to sinks is unaffected, so files keep the full history.
pub struct AuditLogger {
    entries: Mutex<VecDeque<ProvenanceEvent>>,
    capacity: usize,
    sinks: Vec<Box<dyn ProvenanceSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("capacity", &self.capacity)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger that forwards to the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn ProvenanceSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_AUDIT_CAPACITY,
            sinks,
        }
    }

    /// Keep at most `max` events in memory (at least one).
    pub fn with_capacity(mut self, max: usize) -> Self {
        self.capacity = max.max(1);
        self
    }

    /// Get all recorded events, oldest first.
    pub fn entries(&self) -> Vec<ProvenanceEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Events belonging to one session.
    pub fn entries_for_session(&self, session_id: &str) -> Vec<ProvenanceEvent> {
        self.lock()
            .iter()
            .filter(|e| e.session_id() == Some(session_id))
            .cloned()
            .collect()
    }

    /// Events of one kind (`"call_started"`, `"response"`, ...).
    pub fn entries_of_kind(&self, kind: &str) -> Vec<ProvenanceEvent> {
        self.lock().iter().filter(|e| e.kind() == kind).cloned().collect()
    }

    /// Clear all stored events.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Count of stored events.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ProvenanceEvent>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProvenanceSink for AuditLogger {
    /// Stores the event, then forwards it to every sink.
    ///
    /// Every sink is tried; the first failure is reported.
    fn record(&self, event: &ProvenanceEvent) -> Result<(), ProvenanceError> {
        {
            let mut entries = self.lock();
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(event.clone());
        }

        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(event)
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// A tracing-based audit sink that logs events via `tracing::info!`.
pub struct TracingSink;

impl ProvenanceSink for TracingSink {
    fn record(&self, event: &ProvenanceEvent) -> Result<(), ProvenanceError> {
        match event {
            ProvenanceEvent::CallStarted { call_id, tool_name, .. } => {
                tracing::info!(kind = "call_started", call_id = %call_id, tool = %tool_name, "AUDIT");
            }
            ProvenanceEvent::CallFinished { call_id, tool_name, success, duration_ms, .. } => {
                tracing::info!(
                    kind = "call_finished",
                    call_id = %call_id,
                    tool = %tool_name,
                    success,
                    duration_ms,
                    "AUDIT"
                );
            }
            ProvenanceEvent::ToolConversation(record) => {
                tracing::info!(
                    kind = "tool_conversation",
                    call_id = %record.call_id,
                    session = %record.session_id,
                    tool = %record.tool_name,
                    success = record.succeeded(),
                    duration_ms = record.duration_ms,
                    "AUDIT"
                );
            }
            ProvenanceEvent::Response { session_id, response, .. } => {
                tracing::info!(
                    kind = "response",
                    session = %session_id,
                    response_len = response.len(),
                    "AUDIT"
                );
            }
        }
        Ok(())
    }
}

/// Appends one JSON line per event to `{dir}/audit_{YYYY-MM-DD}.log`.
pub struct JsonlFileSink {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for JsonlFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlFileSink").field("dir", &self.dir).finish()
    }
}

impl JsonlFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that events recorded on `date` go to.
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("audit_{}.log", date.format("%Y-%m-%d")))
    }

    /// Delete daily files older than `retention_days`. Returns how many were removed.
    pub fn prune(&self, retention_days: u32) -> Result<usize, ProvenanceError> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(i64::from(retention_days));
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(date) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("audit_"))
                .and_then(|n| n.strip_suffix(".log"))
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            else {
                continue;
            };
            if date < cutoff {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, dir = %self.dir.display(), "Pruned old audit logs");
        }
        Ok(removed)
    }
}

impl ProvenanceSink for JsonlFileSink {
    fn record(&self, event: &ProvenanceEvent) -> Result<(), ProvenanceError> {
        let line = serde_json::to_string(event)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(Utc::now().date_naive()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
