//! # Identifier Word Codec
//!
//! Identifiers inside one symbol share a table of up to 26 "words". A word is
//! a run of characters split at `_` and at lower→upper camel-case
//! boundaries. A repeated word is written as a single letter:
//!
//! ```text
//! 0          marker: this identifier uses word substitutions
//! a..z       substitute word 0..25, more substitutions follow
//! A..Z       substitute word 0..25, last substitution of the run
//! <n><text>  literal run of n characters
//! 0          after a final uppercase letter: identifier ends here
//! ```
//!
//! Identifiers that are not plain symbol text are escaped as
//! `00<n>[_]<punycode>` instead and never take part in word substitution.
//!
//! ```rust
//! use unmangle_core::words::{encode_identifier, WordTable};
//!
//! let mut table = WordTable::new();
//! assert_eq!(encode_identifier("MyView", &mut table).unwrap(), "6MyView");
//! assert_eq!(encode_identifier("ViewModel", &mut table).unwrap(), "0B5Model");
//! ```

use crate::cursor::Cursor;
use crate::error::{Result, UnmangleError};
use crate::punycode;
use crate::tables::{is_digit, is_letter, is_lower_letter, is_upper_letter, is_word_end, is_word_start, needs_punycode_encoding};

/// A word table never holds more entries than there are letters.
pub const MAX_NUM_WORDS: usize = 26;

/// A registered word, located by byte range.
///
/// While an identifier is being scanned the range points into that
/// identifier; once it has been written out the range points into the
/// [`WordTable`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstitutionWord
{
    pub start: usize,
    pub length: usize,
}

/// "At `string_pos`, write word `word_index`"; `None` flushes the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordReplacement
{
    pub string_pos: usize,
    pub word_index: Option<usize>,
}

/// Encoder state for one symbol: the text emitted so far and the words it
/// registered.
#[derive(Debug, Clone)]
pub struct WordTable
{
    buffer: String,
    words: Vec<SubstitutionWord>,
    use_punycode: bool,
}

impl Default for WordTable
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl WordTable
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::with_punycode(true)
    }

    /// With `use_punycode == false` non-ASCII identifiers are written verbatim.
    #[must_use]
    pub fn with_punycode(use_punycode: bool) -> Self
    {
        Self {
            buffer: String::new(),
            words: Vec::new(),
            use_punycode,
        }
    }

    /// Everything written to this symbol so far.
    pub fn buffer(&self) -> &str
    {
        &self.buffer
    }

    pub fn words(&self) -> &[SubstitutionWord]
    {
        &self.words
    }

    /// Text of a registered word.
    pub fn word(&self, index: usize) -> Option<&str>
    {
        let word = self.words.get(index)?;
        self.buffer.get(word.start..word.start + word.length)
    }

    /// Append non-identifier text (operators, suffixes) to the symbol.
    pub fn push_str(&mut self, text: &str)
    {
        self.buffer.push_str(text);
    }

    fn find_word(&self, word: &str, ident: &str, words_in_buffer: usize) -> Option<usize>
    {
        let in_buffer = self.words[..words_in_buffer]
            .iter()
            .position(|w| self.buffer.get(w.start..w.start + w.length) == Some(word));
        in_buffer.or_else(|| {
            self.words[words_in_buffer..]
                .iter()
                .position(|w| ident.get(w.start..w.start + w.length) == Some(word))
                .map(|offset| words_in_buffer + offset)
        })
    }

    fn write_punycode(&mut self, ident: &str) -> Result<()>
    {
        let encoded = punycode::encode(ident)?;
        self.buffer.push_str("00");
        self.buffer.push_str(&encoded.len().to_string());
        if encoded.starts_with(|ch: char| is_digit(ch) || ch == '_') {
            self.buffer.push('_');
        }
        self.buffer.push_str(&encoded);
        Ok(())
    }

    fn write_identifier(&mut self, ident: &str) -> Result<()>
    {
        if self.use_punycode && needs_punycode_encoding(ident) {
            return self.write_punycode(ident);
        }

        let words_in_buffer = self.words.len();
        let mut replacements: Vec<WordReplacement> = Vec::new();

        let mut word_start: Option<usize> = None;
        let mut prev = '\0';
        let boundaries = ident.char_indices().chain(std::iter::once((ident.len(), '\0')));
        for (pos, ch) in boundaries {
            if let Some(start) = word_start {
                if is_word_end(ch, prev) {
                    let word = &ident[start..pos];
                    match self.find_word(word, ident, words_in_buffer) {
                        Some(index) => replacements.push(WordReplacement {
                            string_pos: start,
                            word_index: Some(index),
                        }),
                        None if word.chars().count() >= 2 && self.words.len() < MAX_NUM_WORDS => {
                            self.words.push(SubstitutionWord {
                                start,
                                length: word.len(),
                            });
                        }
                        None => {}
                    }
                    word_start = None;
                }
            }
            if word_start.is_none() && is_word_start(ch) {
                word_start = Some(pos);
            }
            prev = ch;
        }

        if !replacements.is_empty() {
            self.buffer.push('0');
        }
        replacements.push(WordReplacement {
            string_pos: ident.len(),
            word_index: None,
        });

        let count = replacements.len();
        let mut pos = 0;
        let mut fixup = words_in_buffer;
        for (idx, replacement) in replacements.iter().enumerate() {
            if pos < replacement.string_pos {
                let run = &ident[pos..replacement.string_pos];
                self.buffer.push_str(&run.chars().count().to_string());
                for (offset, ch) in run.char_indices() {
                    if fixup < self.words.len() && self.words[fixup].start == pos + offset {
                        self.words[fixup].start = self.buffer.len();
                        fixup += 1;
                    }
                    if offset == 0 && is_digit(ch) {
                        self.buffer.push('X');
                    } else {
                        self.buffer.push(ch);
                    }
                }
                pos = replacement.string_pos;
            }

            if let Some(word_index) = replacement.word_index {
                pos += self.words[word_index].length;
                // Only the final real replacement (just before the sentinel) is uppercase.
                let is_last = idx + 2 >= count;
                let letter = if is_last { b'A' } else { b'a' } + word_index as u8;
                self.buffer.push(char::from(letter));
                if is_last && pos == ident.len() {
                    self.buffer.push('0');
                }
            }
        }
        debug_assert_eq!(fixup, self.words.len(), "every new word must be relocated");
        Ok(())
    }
}

/// Encode one identifier, appending it to the symbol's buffer.
///
/// Returns the text written for this identifier only.
///
/// ## Errors
///
/// Only the Punycode route can fail; see [`punycode::encode`].
pub fn encode_identifier(ident: &str, table: &mut WordTable) -> Result<String>
{
    let segment_start = table.buffer.len();
    table.write_identifier(ident)?;
    Ok(table.buffer[segment_start..].to_owned())
}

/// Decoder state for one symbol.
#[derive(Debug, Clone, Default)]
pub struct DecodeWords
{
    words: Vec<String>,
}

impl DecodeWords
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn len(&self) -> usize
    {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.words.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str>
    {
        self.words.get(index).map(String::as_str)
    }

    fn register_from(&mut self, text: &str)
    {
        let mut current: Option<String> = None;
        for ch in text.chars() {
            let starts_word = !is_digit(ch) && ch != '_';
            match current.as_mut() {
                None => {
                    if starts_word && self.words.len() < MAX_NUM_WORDS {
                        current = Some(ch.to_string());
                    }
                }
                Some(word) => {
                    let prev_upper = word.chars().last().is_some_and(is_upper_letter);
                    if ch == '_' || (!prev_upper && is_upper_letter(ch)) {
                        if word.chars().count() >= 2 {
                            self.words.push(std::mem::take(word));
                        }
                        current = (starts_word && self.words.len() < MAX_NUM_WORDS).then(|| ch.to_string());
                    } else {
                        word.push(ch);
                    }
                }
            }
        }
        if let Some(word) = current {
            if word.chars().count() >= 2 {
                self.words.push(word);
            }
        }
    }
}

/// Read one identifier at the cursor, registering any new words.
pub(crate) fn read_identifier(cursor: &mut Cursor, words: &mut DecodeWords) -> Result<String>
{
    let mut has_word_subs = false;
    let mut is_punycoded = false;

    match cursor.peek() {
        Some('0') => {
            cursor.next_char();
            if cursor.eat('0') {
                is_punycoded = true;
            } else {
                has_word_subs = true;
            }
        }
        Some(ch) if is_digit(ch) => {}
        _ => return Err(cursor.malformed("expected identifier")),
    }

    let mut identifier = String::new();
    loop {
        while has_word_subs {
            let Some(ch) = cursor.peek().filter(|&ch| is_letter(ch)) else {
                break;
            };
            cursor.next_char();
            let index = if is_lower_letter(ch) {
                (ch as u8 - b'a') as usize
            } else {
                has_word_subs = false;
                (ch as u8 - b'A') as usize
            };
            let word = words.get(index).ok_or(cursor.malformed("word index out of range"))?;
            identifier.push_str(word);
        }

        if cursor.eat('0') {
            break;
        }

        let length = cursor.read_natural()?;
        if length == 0 {
            return Err(cursor.malformed("zero-length identifier run"));
        }
        let length = usize::try_from(length).map_err(|_| cursor.malformed("identifier run too long"))?;
        if is_punycoded {
            cursor.eat('_');
        }
        let run = cursor.read_count(length)?;
        if is_punycoded {
            identifier.push_str(&punycode::decode(&run)?);
        } else {
            words.register_from(&run);
            identifier.push_str(&run);
        }

        if !has_word_subs {
            break;
        }
    }

    if identifier.is_empty() {
        return Err(cursor.malformed("empty identifier"));
    }
    Ok(identifier)
}

/// Decode one identifier starting at character index `pos`.
///
/// Returns the identifier and the index just past it.
///
/// ## Errors
///
/// [`UnmangleError::Malformed`] for text that does not follow the grammar,
/// [`UnmangleError::TruncatedInput`] when a literal run is cut short, and any
/// Punycode error for escaped identifiers.
pub fn decode_identifier(input: &str, pos: usize, words: &mut DecodeWords) -> Result<(String, usize)>
{
    let mut cursor = Cursor::new(input);
    if pos > cursor.remaining() {
        return Err(UnmangleError::TruncatedInput);
    }
    for _ in 0..pos {
        cursor.next_char();
    }
    let identifier = read_identifier(&mut cursor, words)?;
    Ok((identifier, cursor.position()))
}
