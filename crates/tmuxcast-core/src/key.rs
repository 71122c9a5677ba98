//! Logical keystrokes: literal characters and tmux named keys.
//!
//! A [`Key`] wraps a tmux key code (`Enter`, `C-d`, `M-Up`, ...). Modifier
//! prefixes compose with `+`, so `Key::CTRL + 'd'` yields `C-d`. Literal text
//! is carried as [`Stroke::Text`] and expanded one character at a time by
//! [`expand`], which also swaps characters that tmux would misread
//! (whitespace, `;`) for their named equivalents.

use std::borrow::Cow;
use std::fmt;
use std::ops::Add;

use crate::error::KeyError;
use crate::timing::Speed;

/// A tmux key code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(Cow<'static, str>);

impl Key {
    pub const UP: Key = Key::named("Up");
    pub const DOWN: Key = Key::named("Down");
    pub const LEFT: Key = Key::named("Left");
    pub const RIGHT: Key = Key::named("Right");
    pub const BACKSPACE: Key = Key::named("BSpace");
    pub const BACKTAB: Key = Key::named("BTab");
    pub const DELETE: Key = Key::named("DC");
    pub const END: Key = Key::named("End");
    pub const ENTER: Key = Key::named("Enter");
    pub const ESCAPE: Key = Key::named("Escape");
    pub const HOME: Key = Key::named("Home");
    pub const INSERT: Key = Key::named("IC");
    pub const PAGE_DOWN: Key = Key::named("PageDown");
    pub const PAGE_UP: Key = Key::named("PageUp");
    pub const SPACE: Key = Key::named("Space");
    pub const TAB: Key = Key::named("Tab");
    pub const SEMICOLON: Key = Key::named("\\;");

    // Modifier prefixes; only meaningful once combined with a key or char.
    pub const CTRL: Key = Key::named("C-");
    pub const ALT: Key = Key::named("M-");
    pub const SHIFT: Key = Key::named("S-");

    pub const fn named(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    pub fn new(code: impl Into<String>) -> Self {
        Self(Cow::Owned(code.into()))
    }

    /// Function key `F<n>`.
    pub fn function(n: u8) -> Self {
        Self::new(format!("F{n}"))
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Compose `self` with another stroke.
    ///
    /// Keys and single characters concatenate onto the code. Multi-character
    /// text has no key-code meaning and is rejected without touching `self`.
    pub fn combine(&self, operand: impl Into<Stroke>) -> Result<Key, KeyError> {
        match operand.into() {
            Stroke::Key(other) => Ok(self.clone() + other),
            Stroke::Char(c) => Ok(self.clone() + c),
            Stroke::Text(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(self.clone() + c),
                    _ => Err(KeyError::UnsupportedOperand {
                        key: self.code().to_string(),
                        operand: format!("text {text:?}"),
                    }),
                }
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Add for Key {
    type Output = Key;

    fn add(self, rhs: Key) -> Key {
        let mut code = self.0.into_owned();
        code.push_str(&rhs.0);
        Key(Cow::Owned(code))
    }
}

impl Add<char> for Key {
    type Output = Key;

    fn add(self, rhs: char) -> Key {
        let mut code = self.0.into_owned();
        code.push(rhs);
        Key(Cow::Owned(code))
    }
}

// ─── Strokes ──────────────────────────────────────────────────────

/// One argument of a `type` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stroke {
    Text(String),
    Char(char),
    Key(Key),
}

impl From<&str> for Stroke {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Stroke {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<char> for Stroke {
    fn from(c: char) -> Self {
        Self::Char(c)
    }
}

impl From<Key> for Stroke {
    fn from(k: Key) -> Self {
        Self::Key(k)
    }
}

impl From<&Key> for Stroke {
    fn from(k: &Key) -> Self {
        Self::Key(k.clone())
    }
}

/// A single unit sent to tmux: one `send-keys` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keystroke {
    Literal(char),
    Named(Key),
}

/// Named-key equivalent for characters that cannot travel as literals.
pub fn literal_key(c: char) -> Option<Key> {
    match c {
        ' ' => Some(Key::SPACE),
        '\t' => Some(Key::TAB),
        '\n' | '\r' => Some(Key::ENTER),
        '\x1b' => Some(Key::ESCAPE),
        '\x7f' => Some(Key::BACKSPACE),
        ';' => Some(Key::SEMICOLON),
        _ => None,
    }
}

fn literal(c: char) -> Keystroke {
    literal_key(c).map_or(Keystroke::Literal(c), Keystroke::Named)
}

/// Flatten strokes into the keystrokes actually transmitted.
pub fn expand(strokes: &[Stroke]) -> Vec<Keystroke> {
    let mut out = Vec::with_capacity(strokes.len());
    for stroke in strokes {
        match stroke {
            Stroke::Text(text) => out.extend(text.chars().map(literal)),
            Stroke::Char(c) => out.push(literal(*c)),
            Stroke::Key(key) => out.push(Keystroke::Named(key.clone())),
        }
    }
    out
}

// ─── Batch ────────────────────────────────────────────────────────

/// Strokes submitted by one `type` call, with an optional speed override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeystrokeBatch {
    pub strokes: Vec<Stroke>,
    pub speed: Option<Speed>,
}

impl KeystrokeBatch {
    pub fn new(strokes: impl IntoIterator<Item = impl Into<Stroke>>) -> Self {
        Self {
            strokes: strokes.into_iter().map(Into::into).collect(),
            speed: None,
        }
    }

    #[must_use]
    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = Some(speed);
        self
    }

    #[must_use]
    pub fn push(mut self, stroke: impl Into<Stroke>) -> Self {
        self.strokes.push(stroke.into());
        self
    }

    pub fn keystrokes(&self) -> Vec<Keystroke> {
        expand(&self.strokes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_plus_char() {
        assert_eq!((Key::CTRL + 'd').code(), "C-d");
    }

    #[test]
    fn modifier_plus_key_is_associative() {
        let a = (Key::CTRL + Key::ALT) + Key::UP;
        let b = Key::CTRL + (Key::ALT + Key::UP);
        assert_eq!(a, b);
        assert_eq!(a.code(), "C-M-Up");
    }

    #[test]
    fn combine_accepts_single_char_text() {
        let key = Key::ALT.combine("x").unwrap();
        assert_eq!(key.code(), "M-x");
    }

    #[test]
    fn combine_rejects_multi_char_text() {
        let base = Key::CTRL;
        let err = base.combine("abc").unwrap_err();
        assert!(matches!(err, KeyError::UnsupportedOperand { .. }));
        assert_eq!(base.code(), "C-");
    }

    #[test]
    fn combine_rejects_empty_text() {
        assert!(Key::SHIFT.combine("").is_err());
    }

    #[test]
    fn function_keys() {
        assert_eq!(Key::function(1).code(), "F1");
        assert_eq!(Key::function(12).code(), "F12");
    }

    #[test]
    fn expand_text_per_char() {
        let ks = expand(&[Stroke::from("ab")]);
        assert_eq!(ks, vec![Keystroke::Literal('a'), Keystroke::Literal('b')]);
    }

    #[test]
    fn expand_substitutes_whitespace_and_separators() {
        let ks = expand(&[Stroke::from("a b\t;\n")]);
        assert_eq!(
            ks,
            vec![
                Keystroke::Literal('a'),
                Keystroke::Named(Key::SPACE),
                Keystroke::Literal('b'),
                Keystroke::Named(Key::TAB),
                Keystroke::Named(Key::SEMICOLON),
                Keystroke::Named(Key::ENTER),
            ]
        );
    }

    #[test]
    fn expand_mixed_strokes_counts_elements() {
        let batch = KeystrokeBatch::new([
            Stroke::from("vim"),
            Stroke::from(Key::SPACE),
            Stroke::from("x.py"),
        ])
        .push(Key::ENTER);
        assert_eq!(batch.keystrokes().len(), 3 + 1 + 4 + 1);
    }

    #[test]
    fn empty_text_expands_to_nothing() {
        assert!(expand(&[Stroke::from("")]).is_empty());
    }
}
