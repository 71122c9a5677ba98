// tmux control mode (-C) codec.
//
// Inbound: lines printed by `tmux -C attach-session`. Notifications start
// with `%`; command replies are wrapped in `%begin` ... `%end`/`%error`.
// Outbound: one command per line, rendered by `ControlCommand`.
//
// Lines are handled as bytes: pane output can carry raw non-UTF-8 bytes
// alongside the octal escapes tmux uses for control characters.

use bytes::Bytes;
use tmuxcast_core::{Key, Keystroke};

/// Parsed line from tmux control mode output.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// Terminal output from a pane.
    /// Format: `%output %<pane-id> <octal-escaped-bytes>`
    Output { pane_id: u32, data: Bytes },

    /// Output with flow-control age.
    /// Format: `%extended-output %<pane-id> <age> : <octal-escaped-bytes>`
    ExtendedOutput { pane_id: u32, age: u64, data: Bytes },

    /// Start of a command reply block.
    Begin { number: u64 },

    /// Successful end of a command reply block.
    End { number: u64 },

    /// Failed end of a command reply block.
    Error { number: u64 },

    /// Control client exit.
    /// Format: `%exit [reason]`
    Exit { reason: String },

    /// Any other `%` notification (`%session-changed`, `%window-add`, ...).
    Notification(String),

    /// A `%output` line whose pane id could not be parsed.
    Malformed(String),

    /// Not a `%` line: a command reply body or stray text.
    Text(String),
}

/// Decode tmux octal-escaped bytes.
///
/// - `\NNN` where NNN is exactly 3 octal digits maps to a single byte
/// - `\\` maps to a literal backslash
/// - All other bytes pass through unchanged
pub fn decode_octal_escaped(input: &[u8]) -> Vec<u8> {
    let len = input.len();
    let mut out = Vec::with_capacity(len);
    let mut i = 0;

    while i < len {
        if input[i] == b'\\' && i + 1 < len {
            if i + 3 < len
                && is_octal_digit(input[i + 1])
                && is_octal_digit(input[i + 2])
                && is_octal_digit(input[i + 3])
            {
                let val = (input[i + 1] - b'0') as u16 * 64
                    + (input[i + 2] - b'0') as u16 * 8
                    + (input[i + 3] - b'0') as u16;
                out.push(val as u8);
                i += 4;
            } else if input[i + 1] == b'\\' {
                out.push(b'\\');
                i += 2;
            } else {
                out.push(b'\\');
                i += 1;
            }
        } else {
            out.push(input[i]);
            i += 1;
        }
    }

    out
}

/// Parse a single control mode line (trailing `\r\n` tolerated).
pub fn parse_line(line: &[u8]) -> ControlEvent {
    let line = trim_line_end(line);

    if !line.starts_with(b"%") {
        return ControlEvent::Text(String::from_utf8_lossy(line).into_owned());
    }

    let (keyword, rest) = split_first_word(line);

    match keyword {
        b"%output" => parse_output(rest).unwrap_or_else(|| malformed(line)),
        b"%extended-output" => parse_extended_output(rest).unwrap_or_else(|| malformed(line)),
        b"%begin" => ControlEvent::Begin {
            number: block_number(rest),
        },
        b"%end" => ControlEvent::End {
            number: block_number(rest),
        },
        b"%error" => ControlEvent::Error {
            number: block_number(rest),
        },
        b"%exit" => ControlEvent::Exit {
            reason: String::from_utf8_lossy(rest).into_owned(),
        },
        _ => ControlEvent::Notification(String::from_utf8_lossy(line).into_owned()),
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

#[inline]
fn is_octal_digit(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [head @ .., b'\r' | b'\n'] = line {
        line = head;
    }
    line
}

/// Split into the first space-delimited word and the remainder.
///
/// Only a single separator is consumed: output payloads may legitimately
/// start with spaces.
fn split_first_word(s: &[u8]) -> (&[u8], &[u8]) {
    match s.iter().position(|&b| b == b' ') {
        Some(pos) => (&s[..pos], &s[pos + 1..]),
        None => (s, &[]),
    }
}

fn malformed(line: &[u8]) -> ControlEvent {
    ControlEvent::Malformed(String::from_utf8_lossy(line).into_owned())
}

fn parse_pane_id(word: &[u8]) -> Option<u32> {
    let digits = word.strip_prefix(b"%")?;
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// `%begin <time> <number> <flags>`; the number pairs begin with end.
fn block_number(rest: &[u8]) -> u64 {
    let (_time, rest) = split_first_word(rest);
    let (number, _flags) = split_first_word(rest);
    std::str::from_utf8(number)
        .ok()
        .and_then(|n| n.parse().ok())
        .unwrap_or_default()
}

/// `%output %<pane-id> <octal-escaped-data>`
fn parse_output(rest: &[u8]) -> Option<ControlEvent> {
    let (pane, data) = split_first_word(rest);
    let pane_id = parse_pane_id(pane)?;
    Some(ControlEvent::Output {
        pane_id,
        data: Bytes::from(decode_octal_escaped(data)),
    })
}

/// `%extended-output %<pane-id> <age> ... : <octal-escaped-data>`
fn parse_extended_output(rest: &[u8]) -> Option<ControlEvent> {
    let (pane, rest) = split_first_word(rest);
    let pane_id = parse_pane_id(pane)?;
    let (age, rest) = split_first_word(rest);
    let age: u64 = std::str::from_utf8(age).ok()?.parse().ok()?;
    // Reserved fields may follow the age; the payload starts after " : ".
    let colon = rest.windows(2).position(|w| w == b": ")?;
    let data = &rest[colon + 2..];
    Some(ControlEvent::ExtendedOutput {
        pane_id,
        age,
        data: Bytes::from(decode_octal_escaped(data)),
    })
}

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionScope {
    /// `-g`
    Global,
    /// `-t <session>`
    Session,
    /// `-w -t <session>`
    Window,
}

/// A command written to the control client's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    SetOption {
        name: String,
        value: String,
        scope: OptionScope,
        target: String,
    },
    SendKeys {
        target: String,
        literal: bool,
        payload: String,
    },
    ResizeWindow {
        target: String,
        width: u16,
        height: u16,
    },
}

impl ControlCommand {
    pub fn send_keystroke(target: &str, keystroke: &Keystroke) -> Self {
        match keystroke {
            Keystroke::Literal(c) => Self::SendKeys {
                target: target.to_string(),
                literal: true,
                payload: quote_argument(&c.to_string()),
            },
            Keystroke::Named(key) => Self::send_key(target, key),
        }
    }

    pub fn send_key(target: &str, key: &Key) -> Self {
        Self::SendKeys {
            target: target.to_string(),
            literal: false,
            payload: quote_argument(unescaped_key_name(key.code())),
        }
    }

    /// Render as one control-mode line, without the trailing newline.
    pub fn to_line(&self) -> String {
        match self {
            Self::SetOption {
                name,
                value,
                scope,
                target,
            } => {
                let scope = match scope {
                    OptionScope::Global => "-g".to_string(),
                    OptionScope::Session => format!("-t {target}"),
                    OptionScope::Window => format!("-w -t {target}"),
                };
                format!("set-option {scope} {name} {}", quote_argument(value))
            }
            Self::SendKeys {
                target,
                literal,
                payload,
            } => {
                let flag = if *literal { " -l" } else { "" };
                format!("send-keys -t {target}{flag} {payload}")
            }
            Self::ResizeWindow {
                target,
                width,
                height,
            } => format!("resize-window -t {target} -x {width} -y {height}"),
        }
    }
}

/// Key codes may carry the parser escape (`\;`); inside quotes the bare
/// name is what tmux looks up.
fn unescaped_key_name(code: &str) -> &str {
    code.strip_prefix('\\')
        .filter(|rest| rest.chars().count() == 1)
        .unwrap_or(code)
}

/// Quote an argument for the tmux command parser.
///
/// Single quotes suppress every expansion; a literal `'` is closed out and
/// emitted inside double quotes instead.
pub fn quote_argument(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}
