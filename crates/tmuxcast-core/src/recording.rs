//! Deferred capture exports over marker ranges.
//!
//! Recordings are only requests until [`RecordingManager::resolve_all`] runs
//! at session teardown. Markers they name may not exist yet when the request
//! is made (a scope's end marker is inserted when the scope closes), so
//! nothing is looked up early.

use std::fs::File;
use std::io::BufWriter;
use std::ops::{Deref, DerefMut, Range};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cast::{CastHeader, CastMetadata, is_title_sequence, write_cast};
use crate::error::ExportError;
use crate::timeline::{MarkerId, MarkerIndex, OutputEvent, Timeline, TimelineEntry};
use crate::token::random_letters;

const SCOPE_TOKEN_LEN: usize = 8;

/// A request to export `[start, end)` of the timeline to `path`.
///
/// An unset or unknown `start` means the beginning of the timeline; an unset
/// or unknown `end` means its end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub path: PathBuf,
    pub start: Option<MarkerId>,
    pub end: Option<MarkerId>,
}

impl Recording {
    pub fn full(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            start: None,
            end: None,
        }
    }

    pub fn between(
        path: impl Into<PathBuf>,
        start: impl Into<MarkerId>,
        end: impl Into<MarkerId>,
    ) -> Self {
        Self {
            path: path.into(),
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }
}

// ─── Export report ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedCapture {
    pub path: PathBuf,
    pub events: usize,
    /// Resolved timeline range, end exclusive.
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCapture {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of resolving every recording. One failure never blocks the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub saved: Vec<SavedCapture>,
    pub failed: Vec<FailedCapture>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ─── Range resolution ─────────────────────────────────────────────

fn lookup(index: &MarkerIndex, id: Option<&MarkerId>, edge: &str) -> Option<usize> {
    let id = id?;
    let pos = index.position(id);
    if pos.is_none() {
        tracing::warn!(marker = %id, edge, "marker not found in timeline, using open range");
    }
    pos
}

/// Resolve a recording's markers to a timeline range `[start, end)`.
pub fn resolve_range(index: &MarkerIndex, len: usize, recording: &Recording) -> Range<usize> {
    let start = lookup(index, recording.start.as_ref(), "start").unwrap_or(0);
    let end = lookup(index, recording.end.as_ref(), "end").unwrap_or(len);
    start..end.clamp(start, len)
}

/// Output events inside `range`, minus pure title-change chunks.
pub fn select_events(entries: &[TimelineEntry], range: Range<usize>) -> Vec<&OutputEvent> {
    entries
        .get(range)
        .unwrap_or_default()
        .iter()
        .filter_map(TimelineEntry::as_output)
        .filter(|ev| !is_title_sequence(&ev.text))
        .collect()
}

// ─── Scoped recording ─────────────────────────────────────────────

/// Anything that can place markers and accept recordings.
pub trait RecordTarget {
    fn mark(&mut self, id: MarkerId);
    fn register(&mut self, recording: Recording);
}

/// Records everything between its creation and its drop.
///
/// Creation inserts a unique start marker. Dropping the scope, on any exit
/// path, inserts the matching end marker and registers the recording. The
/// scope derefs to its target so scripted actions continue through it.
pub struct RecordingScope<'a, T: RecordTarget> {
    target: &'a mut T,
    path: PathBuf,
    start: MarkerId,
    end: MarkerId,
}

impl<'a, T: RecordTarget> RecordingScope<'a, T> {
    pub fn begin(target: &'a mut T, path: impl Into<PathBuf>) -> Self {
        let token = random_letters(SCOPE_TOKEN_LEN);
        let start = MarkerId::from(format!("start_marker_{token}"));
        let end = MarkerId::from(format!("end_marker_{token}"));
        target.mark(start.clone());
        Self {
            target,
            path: path.into(),
            start,
            end,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn start_marker(&self) -> &MarkerId {
        &self.start
    }

    pub fn end_marker(&self) -> &MarkerId {
        &self.end
    }
}

impl<T: RecordTarget> Deref for RecordingScope<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.target
    }
}

impl<T: RecordTarget> DerefMut for RecordingScope<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.target
    }
}

impl<T: RecordTarget> Drop for RecordingScope<'_, T> {
    fn drop(&mut self) {
        self.target.mark(self.end.clone());
        self.target.register(Recording {
            path: std::mem::take(&mut self.path),
            start: Some(self.start.clone()),
            end: Some(self.end.clone()),
        });
    }
}

// ─── RecordingManager ─────────────────────────────────────────────

/// Collects export requests for one session and writes them at teardown.
#[derive(Debug)]
pub struct RecordingManager {
    timeline: Timeline,
    recordings: Vec<Recording>,
    width: u16,
    height: u16,
    meta: CastMetadata,
    started_at: DateTime<Utc>,
}

impl RecordingManager {
    pub fn new(timeline: Timeline, width: u16, height: u16, meta: CastMetadata) -> Self {
        Self {
            timeline,
            recordings: Vec::new(),
            width,
            height,
            meta,
            started_at: Utc::now(),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    /// Insert a marker at the current end of the timeline.
    pub fn mark(&self, id: impl Into<MarkerId>) -> usize {
        let id = id.into();
        tracing::debug!(marker = %id, "marker");
        self.timeline.push_marker(id)
    }

    pub fn record(
        &mut self,
        path: impl Into<PathBuf>,
        start: Option<MarkerId>,
        end: Option<MarkerId>,
    ) {
        self.push(Recording {
            path: path.into(),
            start,
            end,
        });
    }

    pub fn push(&mut self, recording: Recording) {
        tracing::debug!(
            path = %recording.path.display(),
            start = ?recording.start,
            end = ?recording.end,
            "recording requested"
        );
        self.recordings.push(recording);
    }

    pub fn recorder(&mut self, path: impl Into<PathBuf>) -> RecordingScope<'_, Self> {
        RecordingScope::begin(self, path)
    }

    /// Export every recording against the current timeline.
    pub fn resolve_all(&self) -> ExportReport {
        self.resolve_entries(&self.timeline.snapshot())
    }

    pub fn resolve_entries(&self, entries: &[TimelineEntry]) -> ExportReport {
        let index = MarkerIndex::build(entries);
        let mut report = ExportReport::default();

        for recording in &self.recordings {
            let range = resolve_range(&index, entries.len(), recording);
            let events = select_events(entries, range.clone());
            match self.export(&recording.path, &events) {
                Ok(n) => {
                    tracing::info!(path = %recording.path.display(), events = n, "saved capture");
                    report.saved.push(SavedCapture {
                        path: recording.path.clone(),
                        events: n,
                        range,
                    });
                }
                Err(e) => {
                    tracing::error!(path = %recording.path.display(), error = %e, "capture export failed");
                    report.failed.push(FailedCapture {
                        path: recording.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    fn export(&self, path: &Path, events: &[&OutputEvent]) -> Result<usize, ExportError> {
        let origin = events.first().map_or(self.started_at, |ev| ev.arrival_time);
        let header = CastHeader::new(self.width, self.height, origin, &self.meta);

        let file = File::create(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        write_cast(&mut writer, &header, origin, events.iter().copied())
    }
}

impl RecordTarget for RecordingManager {
    fn mark(&mut self, id: MarkerId) {
        RecordingManager::mark(self, id);
    }

    fn register(&mut self, recording: Recording) {
        self.push(recording);
    }
}
