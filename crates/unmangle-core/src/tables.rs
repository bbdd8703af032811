//! Transliteration tables and character classes.
//!
//! Static data shared by the identifier codec, the substitution table and the
//! demangler:
//!
//! - operator characters and the letters they are written as
//! - the well-known standard library names that have a one or two letter
//!   abbreviation (`Si` for `Swift.Int`, `ScT` for `Swift.Task`, ...)
//! - the character classes that drive word splitting and Punycode escaping

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// What kind of declaration a standard abbreviation stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardKind
{
    Structure,
    Enum,
    Protocol,
}

/// One row of the standard abbreviation table.
#[derive(Debug, Clone, Copy)]
pub struct StandardType
{
    pub name: &'static str,
    pub code: &'static str,
    pub kind: StandardKind,
    /// Only available when the extended (concurrency) set is allowed.
    pub extended: bool,
}

const fn base(name: &'static str, code: &'static str, kind: StandardKind) -> StandardType
{
    StandardType {
        name,
        code,
        kind,
        extended: false,
    }
}

const fn extended(name: &'static str, code: &'static str, kind: StandardKind) -> StandardType
{
    StandardType {
        name,
        code,
        kind,
        extended: true,
    }
}

use StandardKind::{Enum, Protocol, Structure};

pub static STANDARD_TYPES: &[StandardType] = &[
    base("AutoreleasingUnsafeMutablePointer", "A", Structure),
    base("Array", "a", Structure),
    base("Bool", "b", Structure),
    base("Dictionary", "D", Structure),
    base("Double", "d", Structure),
    base("Float", "f", Structure),
    base("Set", "h", Structure),
    base("DefaultIndices", "I", Structure),
    base("Int", "i", Structure),
    base("Character", "J", Structure),
    base("ClosedRange", "N", Structure),
    base("Range", "n", Structure),
    base("ObjectIdentifier", "O", Structure),
    base("UnsafePointer", "P", Structure),
    base("UnsafeMutablePointer", "p", Structure),
    base("UnsafeBufferPointer", "R", Structure),
    base("UnsafeMutableBufferPointer", "r", Structure),
    base("String", "S", Structure),
    base("Substring", "s", Structure),
    base("UInt", "u", Structure),
    base("UnsafeRawPointer", "V", Structure),
    base("UnsafeMutableRawPointer", "v", Structure),
    base("UnsafeRawBufferPointer", "W", Structure),
    base("UnsafeMutableRawBufferPointer", "w", Structure),
    base("Optional", "q", Enum),
    base("BinaryFloatingPoint", "B", Protocol),
    base("Encodable", "E", Protocol),
    base("Decodable", "e", Protocol),
    base("FloatingPoint", "F", Protocol),
    base("RandomNumberGenerator", "G", Protocol),
    base("Hashable", "H", Protocol),
    base("Numeric", "j", Protocol),
    base("BidirectionalCollection", "K", Protocol),
    base("RandomAccessCollection", "k", Protocol),
    base("Comparable", "L", Protocol),
    base("Collection", "l", Protocol),
    base("MutableCollection", "M", Protocol),
    base("RangeReplaceableCollection", "m", Protocol),
    base("Equatable", "Q", Protocol),
    base("Sequence", "T", Protocol),
    base("IteratorProtocol", "t", Protocol),
    base("UnsignedInteger", "U", Protocol),
    base("RangeExpression", "X", Protocol),
    base("Strideable", "x", Protocol),
    base("RawRepresentable", "Y", Protocol),
    base("StringProtocol", "y", Protocol),
    base("SignedInteger", "Z", Protocol),
    base("BinaryInteger", "z", Protocol),
    extended("Actor", "cA", Protocol),
    extended("CheckedContinuation", "cC", Structure),
    extended("UnsafeContinuation", "cc", Structure),
    extended("CancellationError", "cE", Structure),
    extended("UnownedSerialExecutor", "ce", Structure),
    extended("Executor", "cF", Protocol),
    extended("SerialExecutor", "cf", Protocol),
    extended("TaskGroup", "cG", Structure),
    extended("ThrowingTaskGroup", "cg", Structure),
    extended("TaskExecutor", "ch", Protocol),
    extended("AsyncIteratorProtocol", "cI", Protocol),
    extended("AsyncSequence", "ci", Protocol),
    extended("UnownedJob", "cJ", Structure),
    extended("MainActor", "cM", Structure),
    extended("TaskPriority", "cP", Structure),
    extended("AsyncStream", "cS", Structure),
    extended("AsyncThrowingStream", "cs", Structure),
    extended("Task", "cT", Structure),
    extended("UnsafeCurrentTask", "ct", Structure),
];

static BY_NAME: Lazy<HashMap<&'static str, &'static StandardType>> =
    Lazy::new(|| STANDARD_TYPES.iter().map(|entry| (entry.name, entry)).collect());

static BY_CODE: Lazy<HashMap<&'static str, &'static StandardType>> =
    Lazy::new(|| STANDARD_TYPES.iter().map(|entry| (entry.code, entry)).collect());

/// Look up the abbreviation for a well-known standard library name.
///
/// The concurrency names (two-letter codes starting with `c`) are only
/// consulted when `allow_extended` is set; older toolchains never emit them.
///
/// ```rust
/// use unmangle_core::tables::standard_type_abbreviation;
///
/// assert_eq!(standard_type_abbreviation("Int", false), Some("i"));
/// assert_eq!(standard_type_abbreviation("Task", false), None);
/// assert_eq!(standard_type_abbreviation("Task", true), Some("cT"));
/// ```
#[must_use]
pub fn standard_type_abbreviation(name: &str, allow_extended: bool) -> Option<&'static str>
{
    BY_NAME
        .get(name)
        .filter(|entry| allow_extended || !entry.extended)
        .map(|entry| entry.code)
}

/// Reverse lookup used by the demangler for `S<code>` substitutions.
#[must_use]
pub fn standard_type_for_code(code: &str, allow_extended: bool) -> Option<&'static StandardType>
{
    BY_CODE
        .get(code)
        .copied()
        .filter(|entry| allow_extended || !entry.extended)
}

/// Translate an operator character into the letter used in mangled names.
///
/// Any character outside the operator set is returned unchanged.
#[must_use]
pub fn translate_operator_char(ch: char) -> char
{
    match ch {
        '&' => 'a',
        '@' => 'c',
        '/' => 'd',
        '=' => 'e',
        '>' => 'g',
        '<' => 'l',
        '*' => 'm',
        '!' => 'n',
        '|' => 'o',
        '+' => 'p',
        '?' => 'q',
        '%' => 'r',
        '-' => 's',
        '~' => 't',
        '^' => 'x',
        '.' => 'z',
        other => other,
    }
}

/// Translate every character of an operator spelling.
#[must_use]
pub fn translate_operator(op: &str) -> String
{
    op.chars().map(translate_operator_char).collect()
}

/// Inverse of [`translate_operator_char`], indexed by `letter - 'a'`.
///
/// Blank slots are letters that do not stand for an operator.
const OPERATOR_LETTERS: &[u8; 26] = b"& @/= >    <*!|+?%-~   ^ .";

/// Map a mangled operator letter back to its operator character.
#[must_use]
pub fn operator_char_for_letter(letter: char) -> Option<char>
{
    if !letter.is_ascii_lowercase() {
        return None;
    }
    let ch = OPERATOR_LETTERS[(letter as u8 - b'a') as usize];
    (ch != b' ').then_some(ch as char)
}

#[inline]
pub fn is_lower_letter(ch: char) -> bool
{
    ch.is_ascii_lowercase()
}

#[inline]
pub fn is_upper_letter(ch: char) -> bool
{
    ch.is_ascii_uppercase()
}

#[inline]
pub fn is_digit(ch: char) -> bool
{
    ch.is_ascii_digit()
}

#[inline]
pub fn is_letter(ch: char) -> bool
{
    ch.is_ascii_alphabetic()
}

/// A substitution word may begin at this character.
#[inline]
pub fn is_word_start(ch: char) -> bool
{
    !is_digit(ch) && ch != '_' && ch != '\0'
}

/// The word running up to `prev` ends before `ch`.
#[inline]
pub fn is_word_end(ch: char, prev: char) -> bool
{
    if ch == '_' || ch == '\0' {
        return true;
    }
    !is_upper_letter(prev) && is_upper_letter(ch)
}

#[inline]
pub fn is_valid_symbol_start(ch: char) -> bool
{
    is_letter(ch) || ch == '_' || ch == '$'
}

#[inline]
pub fn is_valid_symbol_char(ch: char) -> bool
{
    is_valid_symbol_start(ch) || is_digit(ch)
}

/// The string contains a character at or above U+0080.
#[must_use]
pub fn is_non_ascii(s: &str) -> bool
{
    !s.is_ascii()
}

/// The identifier cannot be written verbatim and has to go through Punycode.
#[must_use]
pub fn needs_punycode_encoding(s: &str) -> bool
{
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    !is_valid_symbol_start(first) || chars.any(|ch| !is_valid_symbol_char(ch))
}
