//! Append-only, order-preserving store of classified log lines.
//!
//! Single writer (the connection manager's reader thread), many readers (UI,
//! search). A `parking_lot::RwLock` keeps `snapshot` and `search` safe to call
//! concurrently with `append`.

use crate::classify::{Color, Severity};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One stored log line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Strictly increasing, contiguous position within the store. The sole
    /// ordering key; reset only by `clear`.
    pub seq: u64,
    /// Trimmed, non-empty line text.
    pub text: String,
    pub severity: Severity,
    /// Display color derived from the severity at classification time.
    pub color: Color,
}

impl LogLine {
    /// Shortened text for search-result listings.
    pub fn preview(&self) -> String {
        const MAX_CHARS: usize = 60;
        if self.text.chars().count() <= MAX_CHARS {
            return self.text.clone();
        }
        let mut out: String = self.text.chars().take(MAX_CHARS).collect();
        out.push('…');
        out
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    lines: Vec<LogLine>,
    next_seq: u64,
}

/// The log history.
#[derive(Debug, Default)]
pub struct LogStore {
    inner: RwLock<StoreInner>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a classified line, assigning the next sequence index.
    ///
    /// Callers guarantee `text` is trimmed and non-empty; the reassembler
    /// already dropped blank segments.
    pub fn append(&self, text: String, severity: Severity) -> LogLine {
        debug_assert!(!text.trim().is_empty());
        let mut inner = self.inner.write();
        let line = LogLine {
            seq: inner.next_seq,
            text,
            severity,
            color: severity.color(),
        };
        inner.next_seq += 1;
        inner.lines.push(line.clone());
        line
    }

    /// Drop all stored lines and restart sequence numbering at zero.
    ///
    /// Deliberately does not touch the reassembler: an in-flight partial line
    /// survives a clear and completes into the now-empty store.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.lines.clear();
        inner.next_seq = 0;
    }

    /// Consistent point-in-time copy of the history, in sequence order.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.inner.read().lines.clone()
    }

    /// Sequence indices of lines containing `query` as a case-sensitive
    /// substring, ascending. An empty query matches nothing rather than the
    /// whole log.
    pub fn search(&self, query: &str) -> Vec<u64> {
        if query.is_empty() {
            return Vec::new();
        }
        self.inner
            .read()
            .lines
            .iter()
            .filter(|line| line.text.contains(query))
            .map(|line| line.seq)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().lines.is_empty()
    }
}
