//! Character cursor shared by the identifier reader and the demangler.

use crate::error::{Result, UnmangleError};

/// Forward-only cursor over the characters of a mangled name.
///
/// Literal bytes of a symbolic name are widened to `char` one by one, so a
/// control byte such as `0x01` shows up here as `'\u{1}'`.
#[derive(Debug, Clone)]
pub struct Cursor
{
    chars: Vec<char>,
    pos: usize,
}

impl Cursor
{
    pub fn new(text: &str) -> Self
    {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    pub fn position(&self) -> usize
    {
        self.pos
    }

    pub fn is_at_end(&self) -> bool
    {
        self.pos >= self.chars.len()
    }

    pub fn remaining(&self) -> usize
    {
        self.chars.len().saturating_sub(self.pos)
    }

    pub fn peek(&self) -> Option<char>
    {
        self.chars.get(self.pos).copied()
    }

    pub fn peek_at(&self, ahead: usize) -> Option<char>
    {
        self.chars.get(self.pos + ahead).copied()
    }

    pub fn next_char(&mut self) -> Option<char>
    {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    /// Consume `ch` if it is next.
    pub fn eat(&mut self, ch: char) -> bool
    {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume `prefix` if the input continues with it.
    pub fn eat_str(&mut self, prefix: &str) -> bool
    {
        let len = prefix.chars().count();
        if self.remaining() < len {
            return false;
        }
        let matches = prefix
            .chars()
            .zip(&self.chars[self.pos..self.pos + len])
            .all(|(expected, &actual)| expected == actual);
        if matches {
            self.pos += len;
        }
        matches
    }

    pub fn step_back(&mut self)
    {
        self.pos = self.pos.saturating_sub(1);
    }

    /// Decimal number without a terminator.
    pub fn read_natural(&mut self) -> Result<u64>
    {
        let start = self.pos;
        let mut value: u64 = 0;
        while let Some(digit) = self.peek().and_then(|ch| ch.to_digit(10)) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(digit)))
                .ok_or(self.malformed("number too large"))?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.malformed("expected a number"));
        }
        Ok(value)
    }

    /// `_` means 0, `<n>_` means `n + 1`.
    pub fn read_index(&mut self) -> Result<u64>
    {
        if self.eat('_') {
            return Ok(0);
        }
        let value = self.read_natural()?;
        if !self.eat('_') {
            return Err(self.malformed("expected '_' after index"));
        }
        value.checked_add(1).ok_or(self.malformed("index too large"))
    }

    /// Take exactly `count` characters.
    pub fn read_count(&mut self, count: usize) -> Result<String>
    {
        if self.remaining() < count {
            return Err(UnmangleError::TruncatedInput);
        }
        let text = self.chars[self.pos..self.pos + count].iter().collect();
        self.pos += count;
        Ok(text)
    }

    pub fn malformed(&self, reason: &'static str) -> UnmangleError
    {
        UnmangleError::Malformed {
            position: self.pos,
            reason,
        }
    }
}
