//! asciicast v2 capture writer.
//!
//! A capture is newline-delimited JSON: one header object, then one
//! `[elapsed_seconds, "o", text]` array per output chunk.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::timeline::OutputEvent;

pub const CAST_VERSION: u8 = 2;

/// Descriptive fields copied into every capture header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastMetadata {
    pub title: String,
    /// Sorted so repeated exports are byte-identical.
    pub env: BTreeMap<String, String>,
}

impl Default for CastMetadata {
    fn default() -> Self {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let env = BTreeMap::from([
            ("SHELL".to_string(), shell),
            ("TERM".to_string(), "xterm-256color".to_string()),
        ]);
        Self {
            title: "tmuxcast".to_string(),
            env,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastHeader {
    pub version: u8,
    pub width: u16,
    pub height: u16,
    /// Unix seconds of the first exported event.
    pub timestamp: i64,
    pub title: String,
    pub env: BTreeMap<String, String>,
}

impl CastHeader {
    pub fn new(width: u16, height: u16, origin: DateTime<Utc>, meta: &CastMetadata) -> Self {
        Self {
            version: CAST_VERSION,
            width,
            height,
            timestamp: origin.timestamp(),
            title: meta.title.clone(),
            env: meta.env.clone(),
        }
    }
}

/// Seconds from `origin` to `at`, never negative, microsecond precision.
pub fn elapsed_secs(origin: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    let secs = (at - origin).to_std().unwrap_or_default().as_secs_f64();
    (secs * 1e6).round() / 1e6
}

/// Write a header plus one line per event. Returns the number of event lines.
///
/// Elapsed times are measured from `origin`, which callers set to the first
/// event's arrival time.
pub fn write_cast<'a, W: Write>(
    writer: &mut W,
    header: &CastHeader,
    origin: DateTime<Utc>,
    events: impl IntoIterator<Item = &'a OutputEvent>,
) -> Result<usize, ExportError> {
    writeln!(writer, "{}", serde_json::to_string(header)?)?;

    let mut decoder = Utf8Carry::default();
    let mut events = events.into_iter().peekable();
    let mut written = 0;
    while let Some(event) = events.next() {
        let mut text = decoder.decode(&event.text);
        if events.peek().is_none() {
            text.push_str(&decoder.flush());
        }
        let line = (elapsed_secs(origin, event.arrival_time), "o", text);
        writeln!(writer, "{}", serde_json::to_string(&line)?)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

// ─── Title sequences ──────────────────────────────────────────────

/// True when `text` consists only of window/terminal title updates.
///
/// Recognised forms are `ESC k <name> ESC \` (tmux/screen window name) and
/// `ESC ] 0|1|2 ; <title> BEL|ESC \` (xterm title). Asciicast players have no
/// notion of titles, so these chunks are dropped from exports.
pub fn is_title_sequence(text: &[u8]) -> bool {
    if text.is_empty() {
        return false;
    }
    let mut rest = text;
    while !rest.is_empty() {
        match strip_title(rest) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }
    true
}

const ST: &[u8] = b"\x1b\\";
const BEL: u8 = 0x07;

fn strip_title(s: &[u8]) -> Option<&[u8]> {
    if let Some(body) = s.strip_prefix(b"\x1bk") {
        let end = find(body, ST)?;
        return Some(&body[end + ST.len()..]);
    }
    let body = s.strip_prefix(b"\x1b]")?;
    match body {
        [b'0' | b'1' | b'2', b';', title @ ..] => {
            for (i, &b) in title.iter().enumerate() {
                if b == BEL {
                    return Some(&title[i + 1..]);
                }
                if title[i..].starts_with(ST) {
                    return Some(&title[i + ST.len()..]);
                }
            }
            None
        }
        _ => None,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ─── UTF-8 reassembly ─────────────────────────────────────────────

/// Decodes consecutive chunks, holding back a trailing partial character so
/// a code point split across two `%output` lines survives intact.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut input = buf.as_slice();
        loop {
            match std::str::from_utf8(input) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, after) = input.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &after[bad..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn flush(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}
