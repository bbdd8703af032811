//! # Binary Images
//!
//! Read-only access to the bytes of a loaded binary.
//!
//! The decoder only ever asks an image for fixed-width little-endian reads at
//! file offsets, for NUL-terminated strings, and for the two kinds of pointer
//! indirection found in metadata:
//!
//! - a pointer slot that was rebased by the loader ([`ImageReader::read_pointer`])
//! - a pointer slot that is bound to an external symbol
//!   ([`ImageReader::resolve_dynamic_bind`])
//!
//! Two implementations are provided: [`MemoryImage`] for tests and synthetic
//! data, and [`MachOImage`] for real Mach-O files.

mod macho;
mod memory;

pub use macho::MachOImage;
pub use memory::MemoryImage;

use crate::error::{Result, UnmangleError};

/// Where a relative indirectable pointer leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeTarget
{
    /// The target itself.
    Direct(u64),
    /// A pointer slot holding the target.
    Indirect(u64),
}

/// Random-access reader over a mapped binary image.
///
/// All offsets are file offsets. Implementations must be safe to share
/// between threads; batch indexing reads one image from many workers.
pub trait ImageReader: Sync
{
    /// Total number of addressable bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    /// Borrow `len` bytes at `offset`, failing with
    /// [`UnmangleError::OutOfBounds`] rather than returning a short slice.
    fn read_bytes(&self, offset: u64, len: usize) -> Result<&[u8]>;

    /// Map a virtual address to a file offset.
    fn file_offset(&self, vmaddr: u64) -> Option<u64>;

    /// File offset of the target stored in the pointer slot at `slot`.
    fn read_pointer(&self, slot: u64) -> Result<u64>;

    /// Name of the external symbol the slot at `slot` is bound to, if any.
    fn resolve_dynamic_bind(&self, slot: u64) -> Option<String>;

    fn read_u8(&self, offset: u64) -> Result<u8>
    {
        Ok(self.read_bytes(offset, 1)?[0])
    }

    fn read_u16(&self, offset: u64) -> Result<u16>
    {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(self.read_bytes(offset, 2)?);
        Ok(u16::from_le_bytes(raw))
    }

    fn read_u32(&self, offset: u64) -> Result<u32>
    {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.read_bytes(offset, 4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn read_i32(&self, offset: u64) -> Result<i32>
    {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.read_bytes(offset, 4)?);
        Ok(i32::from_le_bytes(raw))
    }

    fn read_u64(&self, offset: u64) -> Result<u64>
    {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read_bytes(offset, 8)?);
        Ok(u64::from_le_bytes(raw))
    }

    /// NUL-terminated string; invalid UTF-8 is replaced, a missing
    /// terminator is out of bounds.
    fn read_c_string(&self, offset: u64) -> Result<String>
    {
        let start = usize::try_from(offset).map_err(|_| UnmangleError::OutOfBounds { offset, len: 1 })?;
        let available = self.len().saturating_sub(start);
        let bytes = self.read_bytes(offset, available)?;
        let end = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or(UnmangleError::OutOfBounds {
                offset,
                len: available + 1,
            })?;
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Follow a 32-bit relative offset stored at `offset`; zero means null.
    fn read_relative(&self, offset: u64) -> Result<Option<u64>>
    {
        let relative = self.read_i32(offset)?;
        if relative == 0 {
            return Ok(None);
        }
        apply_relative(offset, i64::from(relative)).map(Some)
    }

    /// Like [`read_relative`](Self::read_relative), with the low bit marking
    /// an indirect (pointer slot) target.
    fn read_relative_indirectable(&self, offset: u64) -> Result<Option<RelativeTarget>>
    {
        let raw = self.read_i32(offset)?;
        if raw == 0 {
            return Ok(None);
        }
        let target = apply_relative(offset, i64::from(raw & !1))?;
        Ok(Some(if raw & 1 == 1 {
            RelativeTarget::Indirect(target)
        } else {
            RelativeTarget::Direct(target)
        }))
    }

    /// Follow one level of indirection if `is_indirect`.
    fn resolve_pointer(&self, offset: u64, is_indirect: bool) -> Result<u64>
    {
        if is_indirect {
            self.read_pointer(offset)
        } else {
            Ok(offset)
        }
    }
}

/// `base + delta`, failing instead of wrapping.
pub fn apply_relative(base: u64, delta: i64) -> Result<u64>
{
    base.checked_add_signed(delta)
        .ok_or(UnmangleError::OutOfBounds { offset: base, len: 0 })
}
