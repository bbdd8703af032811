use std::collections::HashMap;

use super::ImageReader;
use crate::error::{Result, UnmangleError};

/// An image held in memory.
///
/// Pointer slots store file offsets directly and virtual addresses are file
/// offsets, which makes it convenient for building descriptor graphs by hand:
///
/// ```rust
/// use unmangle_core::image::{ImageReader, MemoryImage};
///
/// let mut image = MemoryImage::new(32);
/// image.put_u32(0, 0x11).put_relative(8, 16).put_c_str(16, "Name");
/// assert_eq!(image.read_relative(8).unwrap(), Some(16));
/// assert_eq!(image.read_c_string(16).unwrap(), "Name");
/// ```
///
/// Writers grow the buffer as needed.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage
{
    bytes: Vec<u8>,
    binds: HashMap<u64, String>,
}

impl MemoryImage
{
    /// Zero-filled image of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self
    {
        Self {
            bytes: vec![0; len],
            binds: HashMap::new(),
        }
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self
    {
        Self {
            bytes,
            binds: HashMap::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8]
    {
        &self.bytes
    }

    pub fn put_bytes(&mut self, offset: u64, data: &[u8]) -> &mut Self
    {
        let start = offset as usize;
        let end = start + data.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(data);
        self
    }

    pub fn put_u8(&mut self, offset: u64, value: u8) -> &mut Self
    {
        self.put_bytes(offset, &[value])
    }

    pub fn put_u16(&mut self, offset: u64, value: u16) -> &mut Self
    {
        self.put_bytes(offset, &value.to_le_bytes())
    }

    pub fn put_u32(&mut self, offset: u64, value: u32) -> &mut Self
    {
        self.put_bytes(offset, &value.to_le_bytes())
    }

    pub fn put_i32(&mut self, offset: u64, value: i32) -> &mut Self
    {
        self.put_bytes(offset, &value.to_le_bytes())
    }

    pub fn put_u64(&mut self, offset: u64, value: u64) -> &mut Self
    {
        self.put_bytes(offset, &value.to_le_bytes())
    }

    /// NUL-terminated string.
    pub fn put_c_str(&mut self, offset: u64, text: &str) -> &mut Self
    {
        self.put_bytes(offset, text.as_bytes());
        self.put_u8(offset + text.len() as u64, 0)
    }

    /// 32-bit relative offset at `at` pointing to `target`.
    pub fn put_relative(&mut self, at: u64, target: u64) -> &mut Self
    {
        let delta = target as i64 - at as i64;
        self.put_i32(at, delta as i32)
    }

    /// Relative offset to the pointer slot `slot`, tagged indirect.
    pub fn put_relative_indirect(&mut self, at: u64, slot: u64) -> &mut Self
    {
        let delta = slot as i64 - at as i64;
        self.put_i32(at, (delta as i32) | 1)
    }

    /// Pointer slot holding the file offset `target`.
    pub fn put_pointer(&mut self, slot: u64, target: u64) -> &mut Self
    {
        self.put_u64(slot, target)
    }

    /// Mark `slot` as bound to the external symbol `symbol`.
    pub fn bind(&mut self, slot: u64, symbol: impl Into<String>) -> &mut Self
    {
        self.binds.insert(slot, symbol.into());
        self
    }
}

impl ImageReader for MemoryImage
{
    fn len(&self) -> usize
    {
        self.bytes.len()
    }

    fn read_bytes(&self, offset: u64, len: usize) -> Result<&[u8]>
    {
        let out_of_bounds = || UnmangleError::OutOfBounds { offset, len };
        let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        self.bytes.get(start..end).ok_or_else(out_of_bounds)
    }

    fn file_offset(&self, vmaddr: u64) -> Option<u64>
    {
        (vmaddr < self.bytes.len() as u64).then_some(vmaddr)
    }

    fn read_pointer(&self, slot: u64) -> Result<u64>
    {
        self.read_u64(slot)
    }

    fn resolve_dynamic_bind(&self, slot: u64) -> Option<String>
    {
        self.binds.get(&slot).cloned()
    }
}
