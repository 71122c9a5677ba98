//! Append-only session timeline of decoded output and caller markers.
//!
//! One [`Timeline`] exists per session. The control-stream reader appends
//! [`OutputEvent`]s, the controller appends [`Marker`]s, and export reads a
//! snapshot once both producers have stopped. Entries are never reordered or
//! removed, so an index into a snapshot is a stable position.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker implicitly inserted when the reader starts.
pub const START_MARKER: &str = "_start_";
/// Marker implicitly inserted when the reader stops.
pub const END_MARKER: &str = "_end_";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(String);

impl MarkerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MarkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for MarkerId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub id: MarkerId,
}

/// One `%output` chunk as delivered by tmux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub arrival_time: DateTime<Utc>,
    /// Numeric pane id (`%3` → 3).
    pub source_id: u32,
    pub text: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEntry {
    Output(OutputEvent),
    Marker(Marker),
}

impl TimelineEntry {
    pub fn as_output(&self) -> Option<&OutputEvent> {
        match self {
            Self::Output(ev) => Some(ev),
            Self::Marker(_) => None,
        }
    }

    pub fn as_marker(&self) -> Option<&Marker> {
        match self {
            Self::Marker(m) => Some(m),
            Self::Output(_) => None,
        }
    }
}

/// Shared handle to a session's timeline. Clones refer to the same log.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Arc<Mutex<Vec<TimelineEntry>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TimelineEntry>> {
        // Pushes are atomic, so a poisoned log is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_output(&self, event: OutputEvent) {
        self.lock().push(TimelineEntry::Output(event));
    }

    /// Append a marker and return its position.
    pub fn push_marker(&self, id: impl Into<MarkerId>) -> usize {
        let mut entries = self.lock();
        entries.push(TimelineEntry::Marker(Marker { id: id.into() }));
        entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn output_count(&self) -> usize {
        self.lock().iter().filter(|e| e.as_output().is_some()).count()
    }

    /// Copy of all entries so far. Output text is reference-counted.
    pub fn snapshot(&self) -> Vec<TimelineEntry> {
        self.lock().clone()
    }
}

/// Marker id → timeline position. The first occurrence of an id wins.
#[derive(Debug, Default)]
pub struct MarkerIndex {
    positions: HashMap<MarkerId, usize>,
}

impl MarkerIndex {
    pub fn build(entries: &[TimelineEntry]) -> Self {
        let mut positions = HashMap::new();
        for (pos, entry) in entries.iter().enumerate() {
            if let TimelineEntry::Marker(marker) = entry {
                positions.entry(marker.id.clone()).or_insert(pos);
            }
        }
        Self { positions }
    }

    pub fn position(&self, id: &MarkerId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
