//! # Symbolic Mangled Names
//!
//! Mangled names stored in metadata are not plain strings: they interleave
//! literal text with control bytes that embed pointers to other records in
//! the image.
//!
//! ## Byte classes
//!
//! | byte          | meaning                                              |
//! |---------------|------------------------------------------------------|
//! | `0x00`        | end of the name                                      |
//! | `0x01..=0x17` | relative reference, followed by an `i32`             |
//! | `0x18..=0x1F` | absolute reference, followed by a `u64`              |
//! | `0xFF`        | padding, skipped                                     |
//! | anything else | literal character                                    |
//!
//! The stored relative offset is one less than the distance from the control
//! byte to the target, so the parser adds one to it.

use std::fmt::Write as _;

use tracing::trace;

use crate::error::{Result, UnmangleError};
use crate::image::ImageReader;

/// One embedded pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference
{
    Relative
    {
        kind: u8,
        relative_offset: i64,
    },
    Absolute
    {
        kind: u8,
        address: u64,
    },
}

impl Reference
{
    /// The control byte that introduced this reference.
    #[must_use]
    pub fn kind(&self) -> u8
    {
        match *self {
            Reference::Relative { kind, .. } | Reference::Absolute { kind, .. } => kind,
        }
    }
}

/// A reference and the file offset of its control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup
{
    pub offset: u64,
    pub reference: Reference,
}

impl Lookup
{
    /// File offset the reference points at.
    ///
    /// Absolute references hold virtual addresses, which are mapped through
    /// the image.
    pub fn target<R: ImageReader + ?Sized>(&self, image: &R) -> Result<u64>
    {
        match self.reference {
            Reference::Relative { relative_offset, .. } => self
                .offset
                .checked_add_signed(relative_offset)
                .ok_or(UnmangleError::OutOfBounds {
                    offset: self.offset,
                    len: 0,
                }),
            Reference::Absolute { address, .. } => {
                image.file_offset(address).ok_or(UnmangleError::OutOfBounds { offset: address, len: 0 })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element
{
    Text(String),
    Lookup(Lookup),
}

/// How the text of a mangled name should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MangledNameKind
{
    /// A bare type mangling, as stored in field and requirement records.
    Type,
    /// A full symbol, which needs the `$s` prefix to demangle.
    Symbol,
}

/// A parsed symbolic name and the byte range it occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MangledName
{
    pub elements: Vec<Element>,
    /// Offset of the first byte.
    pub start_offset: u64,
    /// Offset one past the terminator.
    pub end_offset: u64,
}

impl MangledName
{
    pub fn is_empty(&self) -> bool
    {
        self.elements.is_empty()
    }

    /// Text with each lookup replaced by its control byte as a character.
    ///
    /// The demangler treats those characters as placeholders and asks a
    /// [`SymbolicResolver`](crate::symbolic::SymbolicResolver) for them in order.
    #[must_use]
    pub fn type_string_value(&self) -> String
    {
        let mut out = String::new();
        for element in &self.elements {
            match element {
                Element::Text(text) => out.push_str(text),
                Element::Lookup(lookup) => out.push(char::from(lookup.reference.kind())),
            }
        }
        out
    }

    /// [`type_string_value`](Self::type_string_value) with the symbol prefix
    /// added when missing.
    #[must_use]
    pub fn symbol_string_value(&self) -> String
    {
        let text = self.type_string_value();
        if text.is_empty() || has_symbol_prefix(&text) {
            return text;
        }
        let mut out = String::with_capacity(text.len() + 2);
        let _ = write!(out, "$s{text}");
        out
    }

    pub fn string_value(&self, kind: MangledNameKind) -> String
    {
        match kind {
            MangledNameKind::Type => self.type_string_value(),
            MangledNameKind::Symbol => self.symbol_string_value(),
        }
    }

    /// Lookups in order; the position in this list is the placeholder index.
    pub fn lookup_elements(&self) -> impl Iterator<Item = &Lookup>
    {
        self.elements.iter().filter_map(|element| match element {
            Element::Lookup(lookup) => Some(lookup),
            Element::Text(_) => None,
        })
    }

    pub fn lookup(&self, index: usize) -> Option<&Lookup>
    {
        self.lookup_elements().nth(index)
    }
}

fn has_symbol_prefix(text: &str) -> bool
{
    ["$s", "_$s", "$e", "_$e"].iter().any(|prefix| text.starts_with(prefix))
}

/// Read a symbolic name starting at `offset`.
///
/// Any read past the end of the image fails the whole parse.
pub fn parse_symbolic_byte_stream<R: ImageReader + ?Sized>(image: &R, offset: u64) -> Result<MangledName>
{
    let mut elements = Vec::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut cursor = offset;

    let flush = |pending: &mut Vec<u8>, elements: &mut Vec<Element>| {
        if !pending.is_empty() {
            elements.push(Element::Text(String::from_utf8_lossy(pending).into_owned()));
            pending.clear();
        }
    };

    loop {
        let byte = image.read_u8(cursor)?;
        match byte {
            0x00 => {
                flush(&mut pending, &mut elements);
                cursor += 1;
                break;
            }
            0x01..=0x17 => {
                flush(&mut pending, &mut elements);
                let raw = image.read_i32(cursor + 1)?;
                elements.push(Element::Lookup(Lookup {
                    offset: cursor,
                    reference: Reference::Relative {
                        kind: byte,
                        relative_offset: i64::from(raw) + 1,
                    },
                }));
                cursor += 5;
            }
            0x18..=0x1F => {
                flush(&mut pending, &mut elements);
                let address = image.read_u64(cursor + 1)?;
                elements.push(Element::Lookup(Lookup {
                    offset: cursor,
                    reference: Reference::Absolute { kind: byte, address },
                }));
                cursor += 9;
            }
            0xFF => cursor += 1,
            _ => {
                pending.push(byte);
                cursor += 1;
            }
        }
    }

    trace!(start = offset, end = cursor, elements = elements.len(), "parsed symbolic name");
    Ok(MangledName {
        elements,
        start_offset: offset,
        end_offset: cursor,
    })
}
