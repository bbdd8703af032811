//! # Error Types
//!
//! General error handling for the decoder and resolver.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

/// Main error type for decode and resolve operations
///
/// This enum represents all the ways reading a symbolic name or walking a
/// context-descriptor chain can fail.
///
/// ## Error Categories
///
/// 1. **Image errors**: OutOfBounds, Io (fatal to the current decode)
/// 2. **Punycode errors**: InvalidDigit, PunycodeOverflow, InvalidCodePoint, TruncatedInput
/// 3. **Structure errors**: Malformed, UnsupportedReferenceKind, RecursionBudgetExceeded
/// 4. **Setup errors**: InvalidArgument (bad file, bad configuration)
///
/// Only the first category is fatal: the resolver turns everything else into
/// "unresolvable" for the one symbol being decoded. See [`UnmangleError::is_fatal`].
#[derive(Error, Debug)]
pub enum UnmangleError
{
    /// A read would run past the end of the mapped image
    ///
    /// Produced by every [`ImageReader`](crate::image::ImageReader) read. The
    /// whole decode that triggered it is abandoned, it is never retried.
    #[error("Read of {len} byte(s) at offset 0x{offset:x} is out of bounds")]
    OutOfBounds
    {
        /// File offset of the first byte requested
        offset: u64,
        /// Number of bytes requested
        len: usize,
    },

    /// A Punycode payload contained a character outside `[A-Za-z]` where a
    /// digit was expected
    #[error("Invalid punycode digit {found:?} at position {position}")]
    InvalidDigit
    {
        /// Index of the offending character within the payload
        position: usize,
        /// The character found
        found: char,
    },

    /// Punycode arithmetic overflowed while decoding or encoding
    #[error("Punycode value overflow")]
    PunycodeOverflow,

    /// A decoded value is not a Unicode scalar
    #[error("Invalid code point U+{0:04X}")]
    InvalidCodePoint(u32),

    /// The input ended in the middle of a variable-length value
    #[error("Unexpected end of input")]
    TruncatedInput,

    /// A context chain did not terminate within the configured budget
    #[error("Recursion budget exceeded")]
    RecursionBudgetExceeded,

    /// A control byte or descriptor kind outside the known set
    #[error("Unsupported reference kind 0x{0:02x}")]
    UnsupportedReferenceKind(u8),

    /// The mangled text does not follow the grammar
    #[error("Malformed mangled name at position {position}: {reason}")]
    Malformed
    {
        /// Character index where decoding stopped
        position: usize,
        /// Short description of what was expected
        reason: &'static str,
    },

    /// Invalid argument passed to a decoder function
    ///
    /// Examples:
    /// - A file that is not a Mach-O image
    /// - A configuration value that cannot be parsed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UnmangleError
{
    /// Whether this error must abort the current decode.
    ///
    /// Bounds and I/O failures mean the image itself cannot be read and are
    /// propagated. Everything else describes one malformed or unsupported
    /// symbol and is reported as "unresolvable" by the resolver.
    #[must_use]
    pub fn is_fatal(&self) -> bool
    {
        matches!(self, UnmangleError::OutOfBounds { .. } | UnmangleError::Io(_))
    }
}

/// Convenience type alias for `Result<T, UnmangleError>`
///
/// ```rust
/// use unmangle_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, UnmangleError>;
