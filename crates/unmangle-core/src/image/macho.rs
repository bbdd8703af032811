//! Mach-O images with chained-fixup pointer decoding.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use object::{Object, ObjectSection, ObjectSegment};
use tracing::{debug, trace};

use super::{apply_relative, ImageReader, RelativeTarget};
use crate::error::{Result, UnmangleError};

const MH_MAGIC_64: u32 = 0xfeed_facf;
const LC_DYLD_CHAINED_FIXUPS: u32 = 0x8000_0034;

const DYLD_CHAINED_PTR_ARM64E: u16 = 1;
const DYLD_CHAINED_PTR_64: u16 = 2;
const DYLD_CHAINED_PTR_64_OFFSET: u16 = 6;
const DYLD_CHAINED_PTR_ARM64E_USERLAND: u16 = 9;
const DYLD_CHAINED_PTR_ARM64E_USERLAND24: u16 = 12;

const DYLD_CHAINED_IMPORT: u32 = 1;
const DYLD_CHAINED_IMPORT_ADDEND: u32 = 2;
const DYLD_CHAINED_IMPORT_ADDEND64: u32 = 3;

const SWIFT_TYPES_SECTION: &str = "__swift5_types";
const SWIFT_PROTOCOLS_SECTION: &str = "__swift5_protos";

#[derive(Debug, Clone, Copy)]
struct SegmentRange
{
    address: u64,
    file_offset: u64,
    file_size: u64,
}

/// What a chained pointer slot decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainedPointer
{
    /// Virtual address of a rebased target.
    Rebase(u64),
    /// Ordinal into the import table.
    Bind(u32),
}

#[derive(Debug, Clone, Default)]
struct ChainedFixups
{
    pointer_format: u16,
    imports: Vec<String>,
}

impl ChainedFixups
{
    /// Parse the `LC_DYLD_CHAINED_FIXUPS` payload.
    fn parse(data: &[u8]) -> Option<Self>
    {
        let starts_offset = le_u32(data, 4)? as usize;
        let imports_offset = le_u32(data, 8)? as usize;
        let symbols_offset = le_u32(data, 12)? as usize;
        let imports_count = le_u32(data, 16)? as usize;
        let imports_format = le_u32(data, 20)?;

        let entry_size = match imports_format {
            DYLD_CHAINED_IMPORT => 4,
            DYLD_CHAINED_IMPORT_ADDEND => 8,
            DYLD_CHAINED_IMPORT_ADDEND64 => 16,
            other => {
                debug!(format = other, "unknown chained import format");
                return None;
            }
        };

        let available = data.len().saturating_sub(imports_offset) / entry_size;
        if imports_count > available {
            debug!(imports_count, available, "chained import table runs past the payload");
            return None;
        }

        let mut imports = Vec::with_capacity(imports_count);
        for i in 0..imports_count {
            let at = imports_offset + i * entry_size;
            let name_offset = if imports_format == DYLD_CHAINED_IMPORT_ADDEND64 {
                (le_u64(data, at)? >> 32) as usize
            } else {
                (le_u32(data, at)? >> 9) as usize
            };
            let name = symbols_offset.checked_add(name_offset).and_then(|at| c_string(data, at));
            imports.push(name.unwrap_or_default());
        }

        // All segments of an image share one pointer format in practice.
        let segment_count = le_u32(data, starts_offset)? as usize;
        let mut pointer_format = 0;
        for i in 0..segment_count {
            let info_offset = le_u32(data, starts_offset + 4 + i * 4)? as usize;
            if info_offset == 0 {
                continue;
            }
            pointer_format = le_u16(data, starts_offset + info_offset + 6)?;
            break;
        }

        Some(Self { pointer_format, imports })
    }

    /// `None` when a rebase target does not fit in the address space.
    fn decode(&self, raw: u64, preferred_base: u64) -> Option<ChainedPointer>
    {
        match self.pointer_format {
            DYLD_CHAINED_PTR_64 | DYLD_CHAINED_PTR_64_OFFSET => {
                if raw >> 63 == 1 {
                    return Some(ChainedPointer::Bind((raw & 0x00FF_FFFF) as u32));
                }
                let target = raw & 0xF_FFFF_FFFF;
                if self.pointer_format == DYLD_CHAINED_PTR_64_OFFSET {
                    preferred_base.checked_add(target).map(ChainedPointer::Rebase)
                } else {
                    Some(ChainedPointer::Rebase(target))
                }
            }
            DYLD_CHAINED_PTR_ARM64E | DYLD_CHAINED_PTR_ARM64E_USERLAND | DYLD_CHAINED_PTR_ARM64E_USERLAND24 => {
                let is_auth = raw >> 63 == 1;
                let is_bind = (raw >> 62) & 1 == 1;
                if is_bind {
                    let mask = if self.pointer_format == DYLD_CHAINED_PTR_ARM64E_USERLAND24 {
                        0x00FF_FFFF
                    } else {
                        0xFFFF
                    };
                    return Some(ChainedPointer::Bind((raw & mask) as u32));
                }
                let target = if is_auth { raw & 0xFFFF_FFFF } else { raw & 0x7FF_FFFF_FFFF };
                if is_auth || self.pointer_format != DYLD_CHAINED_PTR_ARM64E {
                    preferred_base.checked_add(target).map(ChainedPointer::Rebase)
                } else {
                    Some(ChainedPointer::Rebase(target))
                }
            }
            _ => Some(ChainedPointer::Rebase(raw)),
        }
    }
}

/// A 64-bit Mach-O file loaded into memory.
///
/// Pointer slots are decoded according to the image's chained fixups when
/// present; otherwise they hold plain virtual addresses.
pub struct MachOImage
{
    data: Vec<u8>,
    segments: Vec<SegmentRange>,
    preferred_base: u64,
    fixups: Option<ChainedFixups>,
    sections: HashMap<&'static str, (u64, u64)>,
}

impl MachOImage
{
    pub fn open(path: impl AsRef<Path>) -> Result<Self>
    {
        let path = path.as_ref();
        let data = fs::read(path)?;
        debug!(path = %path.display(), bytes = data.len(), "loading image");
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self>
    {
        let file = object::File::parse(&*data)
            .map_err(|err| UnmangleError::InvalidArgument(format!("failed to parse image: {err}")))?;

        if file.format() != object::BinaryFormat::MachO || !file.is_64() {
            return Err(UnmangleError::InvalidArgument("only 64-bit Mach-O images are supported".to_string()));
        }
        if !file.is_little_endian() {
            return Err(UnmangleError::InvalidArgument("big-endian images are not supported".to_string()));
        }

        let mut segments = Vec::new();
        let mut preferred_base = None;
        for segment in file.segments() {
            let (file_offset, file_size) = segment.file_range();
            if file_offset == 0 && file_size > 0 {
                preferred_base.get_or_insert(segment.address());
            }
            segments.push(SegmentRange {
                address: segment.address(),
                file_offset,
                file_size,
            });
        }

        let mut sections = HashMap::new();
        for name in [SWIFT_TYPES_SECTION, SWIFT_PROTOCOLS_SECTION] {
            if let Some(range) = file.section_by_name(name).and_then(|section| section.file_range()) {
                sections.insert(name, range);
            }
        }
        drop(file);

        let fixups = find_chained_fixups(&data);
        if let Some(fixups) = &fixups {
            debug!(
                pointer_format = fixups.pointer_format,
                imports = fixups.imports.len(),
                "chained fixups present"
            );
        }

        Ok(Self {
            data,
            segments,
            preferred_base: preferred_base.unwrap_or(0),
            fixups,
            sections,
        })
    }

    /// File offsets of every type descriptor listed in `__swift5_types`,
    /// followed by every protocol descriptor listed in `__swift5_protos`.
    pub fn context_descriptor_offsets(&self) -> Result<Vec<u64>>
    {
        let mut offsets = Vec::new();

        if let Some(&(start, size)) = self.sections.get(SWIFT_TYPES_SECTION) {
            for entry in (start..start + size).step_by(4) {
                let raw = self.read_i32(entry)?;
                let target = apply_relative(entry, i64::from(raw & !3))?;
                // Kind 1 is an indirect reference to the descriptor.
                let descriptor = if raw & 3 == 1 { self.read_pointer(target)? } else { target };
                offsets.push(descriptor);
            }
        }

        if let Some(&(start, size)) = self.sections.get(SWIFT_PROTOCOLS_SECTION) {
            for entry in (start..start + size).step_by(4) {
                match self.read_relative_indirectable(entry)? {
                    Some(RelativeTarget::Direct(target)) => offsets.push(target),
                    Some(RelativeTarget::Indirect(slot)) => offsets.push(self.read_pointer(slot)?),
                    None => {}
                }
            }
        }

        trace!(count = offsets.len(), "collected descriptor offsets");
        Ok(offsets)
    }

    fn decode_slot(&self, slot: u64) -> Result<ChainedPointer>
    {
        let raw = self.read_u64(slot)?;
        match &self.fixups {
            Some(fixups) => fixups.decode(raw, self.preferred_base).ok_or(UnmangleError::Malformed {
                position: usize::try_from(slot).unwrap_or(usize::MAX),
                reason: "rebase target overflows the address space",
            }),
            None => Ok(ChainedPointer::Rebase(raw)),
        }
    }
}

impl ImageReader for MachOImage
{
    fn len(&self) -> usize
    {
        self.data.len()
    }

    fn read_bytes(&self, offset: u64, len: usize) -> Result<&[u8]>
    {
        let out_of_bounds = || UnmangleError::OutOfBounds { offset, len };
        let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        self.data.get(start..end).ok_or_else(out_of_bounds)
    }

    fn file_offset(&self, vmaddr: u64) -> Option<u64>
    {
        self.segments
            .iter()
            .find(|segment| vmaddr >= segment.address && vmaddr - segment.address < segment.file_size)
            .map(|segment| segment.file_offset + (vmaddr - segment.address))
    }

    fn read_pointer(&self, slot: u64) -> Result<u64>
    {
        match self.decode_slot(slot)? {
            ChainedPointer::Rebase(vmaddr) => self
                .file_offset(vmaddr)
                .ok_or(UnmangleError::OutOfBounds { offset: vmaddr, len: 8 }),
            ChainedPointer::Bind(_) => Err(UnmangleError::Malformed {
                position: usize::try_from(slot).unwrap_or(usize::MAX),
                reason: "pointer slot is bound to an external symbol",
            }),
        }
    }

    fn resolve_dynamic_bind(&self, slot: u64) -> Option<String>
    {
        let fixups = self.fixups.as_ref()?;
        match self.decode_slot(slot).ok()? {
            ChainedPointer::Bind(ordinal) => fixups.imports.get(ordinal as usize).cloned(),
            ChainedPointer::Rebase(_) => None,
        }
    }
}

fn find_chained_fixups(data: &[u8]) -> Option<ChainedFixups>
{
    if le_u32(data, 0)? != MH_MAGIC_64 {
        return None;
    }
    let command_count = le_u32(data, 16)?;
    let mut at = 32usize;
    for _ in 0..command_count {
        let command = le_u32(data, at)?;
        let size = le_u32(data, at + 4)? as usize;
        if command == LC_DYLD_CHAINED_FIXUPS {
            let offset = le_u32(data, at + 8)? as usize;
            let length = le_u32(data, at + 12)? as usize;
            return ChainedFixups::parse(data.get(offset..offset.checked_add(length)?)?);
        }
        if size == 0 {
            return None;
        }
        at = at.checked_add(size)?;
    }
    None
}

fn le_u16(data: &[u8], at: usize) -> Option<u16>
{
    let bytes = data.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn le_u32(data: &[u8], at: usize) -> Option<u32>
{
    let bytes = data.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn le_u64(data: &[u8], at: usize) -> Option<u64>
{
    let bytes = data.get(at..at.checked_add(8)?)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(u64::from_le_bytes(raw))
}

fn c_string(data: &[u8], at: usize) -> Option<String>
{
    let tail = data.get(at..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}
