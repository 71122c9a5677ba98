//! Control stream reader: turns control-client stdout into timeline entries.
//!
//! The timeline is bracketed by the reader itself: `_start_` is pushed before
//! the task is spawned and `_end_` when it finishes, however it finishes.

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tmuxcast_core::{END_MARKER, OutputEvent, START_MARKER, Timeline};

use crate::control_mode::{ControlEvent, parse_line};

/// Counters returned when the reader task ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub lines: usize,
    pub outputs: usize,
    pub malformed: usize,
}

pub struct ControlStreamReader {
    timeline: Timeline,
    session_id: String,
}

impl ControlStreamReader {
    pub fn new(timeline: Timeline, session_id: impl Into<String>) -> Self {
        Self {
            timeline,
            session_id: session_id.into(),
        }
    }

    /// Seed the timeline and start reading on a tokio task.
    pub fn spawn<R>(self, reader: R, cancel: CancellationToken) -> JoinHandle<ReaderStats>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        self.timeline.push_marker(START_MARKER);
        tokio::spawn(async move {
            let stats = self.run(reader, cancel).await;
            self.timeline.push_marker(END_MARKER);
            tracing::debug!(
                session_id = %self.session_id,
                lines = stats.lines,
                outputs = stats.outputs,
                malformed = stats.malformed,
                "control stream reader finished"
            );
            stats
        })
    }

    async fn run<R>(&self, mut reader: R, cancel: CancellationToken) -> ReaderStats
    where
        R: AsyncBufRead + Unpin,
    {
        let mut state = LineState::default();
        let mut buf = Vec::with_capacity(4096);

        loop {
            buf.clear();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(session_id = %self.session_id, "control stream reader cancelled");
                    break;
                }
                result = reader.read_until(b'\n', &mut buf) => {
                    match result {
                        Ok(0) => break,
                        Ok(_) => self.handle_line(&buf, &mut state),
                        Err(e) => {
                            tracing::warn!(session_id = %self.session_id, error = %e, "control stream read error");
                            break;
                        }
                    }
                }
            }
        }

        state.stats
    }

    fn handle_line(&self, line: &[u8], state: &mut LineState) {
        state.stats.lines += 1;
        let sid = self.session_id.as_str();

        match parse_line(line) {
            ControlEvent::Output { pane_id, data }
            | ControlEvent::ExtendedOutput { pane_id, data, .. } => {
                state.stats.outputs += 1;
                self.timeline.push_output(OutputEvent {
                    arrival_time: Utc::now(),
                    source_id: pane_id,
                    text: data,
                });
            }
            ControlEvent::Begin { number } => {
                state.block = Some(number);
                state.reply.clear();
            }
            ControlEvent::End { number } => {
                for reply in state.reply.drain(..) {
                    tracing::debug!(session_id = %sid, block = number, reply = %reply, "command reply");
                }
                state.block = None;
            }
            ControlEvent::Error { number } => {
                for reply in state.reply.drain(..) {
                    tracing::warn!(session_id = %sid, block = number, reply = %reply, "tmux command failed");
                }
                state.block = None;
            }
            ControlEvent::Exit { reason } => {
                tracing::info!(session_id = %sid, reason = %reason, "control client exited");
            }
            ControlEvent::Notification(line) => {
                tracing::trace!(session_id = %sid, notification = %line, "notification");
            }
            ControlEvent::Malformed(line) => {
                state.stats.malformed += 1;
                tracing::warn!(session_id = %sid, line = %line, "malformed output line skipped");
            }
            ControlEvent::Text(text) => {
                if state.block.is_some() {
                    state.reply.push(text);
                } else if !text.is_empty() {
                    tracing::debug!(session_id = %sid, text = %text, "unframed control text");
                }
            }
        }
    }
}

#[derive(Default)]
struct LineState {
    stats: ReaderStats,
    block: Option<u64>,
    reply: Vec<String>,
}
