//! # Context Descriptors
//!
//! Readers for the binary records that describe declaration contexts. Every
//! descriptor starts with the same two words:
//!
//! ```text
//! +0  flags   u32   kind in bits 0..5, generic in bit 7, kind-specific in 16..32
//! +4  parent  i32   relative indirectable pointer, 0 when absent
//! ```
//!
//! What follows depends on the kind. Only the fields the resolver walks are
//! read here: names, extended contexts, anonymous mangled names and generic
//! requirement lists.

use tracing::trace;

use crate::error::{Result, UnmangleError};
use crate::image::{ImageReader, RelativeTarget};
use crate::mangled_name::{parse_symbolic_byte_stream, MangledName};

const KIND_MASK: u32 = 0x1F;
const IS_GENERIC: u32 = 0x80;

/// Anonymous contexts with this kind-specific bit carry a mangled name.
const ANONYMOUS_HAS_MANGLED_NAME: u16 = 0x1;

/// Generic headers with this flag are followed by a type-pack header.
const GENERIC_HAS_TYPE_PACKS: u16 = 0x1;

const GENERIC_HEADER_SIZE: u64 = 8;
const REQUIREMENT_SIZE: u64 = 12;
const PACK_HEADER_SIZE: u64 = 4;
const PACK_SHAPE_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind
{
    Module,
    Extension,
    Anonymous,
    Protocol,
    OpaqueType,
    Class,
    Struct,
    Enum,
}

impl ContextKind
{
    pub fn from_raw(raw: u8) -> Result<Self>
    {
        Ok(match raw {
            0 => Self::Module,
            1 => Self::Extension,
            2 => Self::Anonymous,
            3 => Self::Protocol,
            4 => Self::OpaqueType,
            16 => Self::Class,
            17 => Self::Struct,
            18 => Self::Enum,
            other => return Err(UnmangleError::UnsupportedReferenceKind(other)),
        })
    }

    pub fn is_type(self) -> bool
    {
        matches!(self, Self::Class | Self::Struct | Self::Enum)
    }

    pub fn is_type_or_protocol(self) -> bool
    {
        self.is_type() || self == Self::Protocol
    }

    /// Kinds that store a plain name at `+8`.
    pub fn is_named(self) -> bool
    {
        self.is_type_or_protocol() || self == Self::Module
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextFlags(pub u32);

impl ContextFlags
{
    pub fn raw_kind(self) -> u8
    {
        (self.0 & KIND_MASK) as u8
    }

    pub fn is_generic(self) -> bool
    {
        self.0 & IS_GENERIC != 0
    }

    pub fn kind_specific(self) -> u16
    {
        (self.0 >> 16) as u16
    }
}

/// Where a descriptor's parent link leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentContext
{
    /// Another descriptor in this image.
    Descriptor(u64),
    /// A descriptor in another image, known only by its symbol name.
    Symbol(String),
}

/// Fixed part of a generic context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericHeader
{
    pub num_params: u16,
    pub num_requirements: u16,
    pub num_key_arguments: u16,
    pub flags: u16,
}

impl GenericHeader
{
    pub fn has_type_packs(&self) -> bool
    {
        self.flags & GENERIC_HAS_TYPE_PACKS != 0
    }
}

/// A generic context located in the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericContext
{
    pub header: GenericHeader,
    pub offset: u64,
    /// Bytes from `offset` to the first byte after the context.
    pub size: u64,
    pub requirements: Vec<GenericRequirement>,
}

impl GenericContext
{
    pub fn read<R: ImageReader + ?Sized>(image: &R, offset: u64) -> Result<Self>
    {
        let header = GenericHeader {
            num_params: image.read_u16(offset)?,
            num_requirements: image.read_u16(offset + 2)?,
            num_key_arguments: image.read_u16(offset + 4)?,
            flags: image.read_u16(offset + 6)?,
        };

        let params_size = u64::from(header.num_params).next_multiple_of(4);
        let requirements_start = offset + GENERIC_HEADER_SIZE + params_size;
        let mut requirements = Vec::with_capacity(usize::from(header.num_requirements));
        for i in 0..u64::from(header.num_requirements) {
            requirements.push(GenericRequirement::read(image, requirements_start + i * REQUIREMENT_SIZE)?);
        }

        let mut size = GENERIC_HEADER_SIZE + params_size + u64::from(header.num_requirements) * REQUIREMENT_SIZE;
        if header.has_type_packs() {
            let num_packs = image.read_u16(offset + size)?;
            size += PACK_HEADER_SIZE + u64::from(num_packs) * PACK_SHAPE_SIZE;
        }

        Ok(Self {
            header,
            offset,
            size,
            requirements,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementKind
{
    Protocol,
    SameType,
    BaseClass,
    SameConformance,
    SameShape,
    InvertedProtocols,
    Layout,
}

impl RequirementKind
{
    pub fn from_raw(raw: u8) -> Result<Self>
    {
        Ok(match raw {
            0 => Self::Protocol,
            1 => Self::SameType,
            2 => Self::BaseClass,
            3 => Self::SameConformance,
            4 => Self::SameShape,
            5 => Self::InvertedProtocols,
            0x1F => Self::Layout,
            other => return Err(UnmangleError::UnsupportedReferenceKind(other)),
        })
    }
}

/// Where a protocol requirement's payload points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolReference
{
    /// A protocol descriptor in this image.
    Swift(u64),
    /// An Objective-C protocol record in this image.
    ObjC(u64),
    /// A protocol in another image.
    Symbol(String),
}

/// One 12-byte requirement record.
///
/// ```text
/// +0  flags    u32   kind in bits 0..5
/// +4  param    i32   relative pointer to the subject's mangled name
/// +8  payload  i32   depends on the kind
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericRequirement
{
    pub offset: u64,
    pub flags: u32,
    pub kind: RequirementKind,
}

impl GenericRequirement
{
    pub fn read<R: ImageReader + ?Sized>(image: &R, offset: u64) -> Result<Self>
    {
        let flags = image.read_u32(offset)?;
        Ok(Self {
            offset,
            flags,
            kind: RequirementKind::from_raw((flags & KIND_MASK) as u8)?,
        })
    }

    pub fn payload_offset(&self) -> u64
    {
        self.offset + 8
    }

    pub fn param<R: ImageReader + ?Sized>(&self, image: &R) -> Result<MangledName>
    {
        read_mangled_name(image, self.offset + 4)?.ok_or(UnmangleError::Malformed {
            position: 0,
            reason: "requirement without a subject",
        })
    }

    /// Payload of same-type and base-class requirements.
    pub fn mangled_type<R: ImageReader + ?Sized>(&self, image: &R) -> Result<MangledName>
    {
        read_mangled_name(image, self.payload_offset())?.ok_or(UnmangleError::Malformed {
            position: 0,
            reason: "requirement without a type",
        })
    }

    /// Payload of layout requirements; 0 means class-constrained.
    pub fn layout_kind<R: ImageReader + ?Sized>(&self, image: &R) -> Result<u32>
    {
        image.read_u32(self.payload_offset())
    }

    /// Payload of protocol requirements.
    ///
    /// Bit 0 of the stored offset marks an indirect pointer and bit 1 an
    /// Objective-C protocol.
    pub fn protocol<R: ImageReader + ?Sized>(&self, image: &R) -> Result<Option<ProtocolReference>>
    {
        let at = self.payload_offset();
        let raw = image.read_i32(at)?;
        if raw == 0 {
            return Ok(None);
        }
        let is_objc = raw & 0b10 != 0;
        let target = crate::image::apply_relative(at, i64::from(raw & !0b11))?;
        let target = if raw & 0b01 != 0 {
            if let Some(symbol) = image.resolve_dynamic_bind(target) {
                return Ok(Some(ProtocolReference::Symbol(symbol)));
            }
            image.read_pointer(target)?
        } else {
            target
        };
        Ok(Some(if is_objc {
            ProtocolReference::ObjC(target)
        } else {
            ProtocolReference::Swift(target)
        }))
    }
}

/// Header shared by every context descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextDescriptor
{
    pub offset: u64,
    pub flags: ContextFlags,
    pub kind: ContextKind,
}

impl ContextDescriptor
{
    pub fn read<R: ImageReader + ?Sized>(image: &R, offset: u64) -> Result<Self>
    {
        let flags = ContextFlags(image.read_u32(offset)?);
        let kind = ContextKind::from_raw(flags.raw_kind())?;
        trace!(offset, ?kind, flags = flags.0, "read context descriptor");
        Ok(Self { offset, flags, kind })
    }

    /// The parent link, following one indirection.
    pub fn parent<R: ImageReader + ?Sized>(&self, image: &R) -> Result<Option<ParentContext>>
    {
        Ok(match image.read_relative_indirectable(self.offset + 4)? {
            None => None,
            Some(RelativeTarget::Direct(target)) => Some(ParentContext::Descriptor(target)),
            Some(RelativeTarget::Indirect(slot)) => match image.resolve_dynamic_bind(slot) {
                Some(symbol) => Some(ParentContext::Symbol(symbol)),
                None => Some(ParentContext::Descriptor(image.read_pointer(slot)?)),
            },
        })
    }

    /// Stored name of modules, protocols and nominal types.
    pub fn name<R: ImageReader + ?Sized>(&self, image: &R) -> Result<Option<String>>
    {
        if !self.kind.is_named() {
            return Ok(None);
        }
        match image.read_relative(self.offset + 8)? {
            Some(target) => image.read_c_string(target).map(Some),
            None => Ok(None),
        }
    }

    /// Mangled name of the type an extension extends.
    pub fn extended_context<R: ImageReader + ?Sized>(&self, image: &R) -> Result<Option<MangledName>>
    {
        if self.kind != ContextKind::Extension {
            return Ok(None);
        }
        read_mangled_name(image, self.offset + 8)
    }

    /// Generic context of extensions and anonymous contexts.
    pub fn generic_context<R: ImageReader + ?Sized>(&self, image: &R) -> Result<Option<GenericContext>>
    {
        if !self.flags.is_generic() {
            return Ok(None);
        }
        let at = match self.kind {
            ContextKind::Extension => self.offset + 12,
            ContextKind::Anonymous => self.offset + 8,
            _ => return Ok(None),
        };
        GenericContext::read(image, at).map(Some)
    }

    /// Mangled name carried by an anonymous context, if any.
    pub fn anonymous_mangled_name<R: ImageReader + ?Sized>(&self, image: &R) -> Result<Option<MangledName>>
    {
        if self.kind != ContextKind::Anonymous || self.flags.kind_specific() & ANONYMOUS_HAS_MANGLED_NAME == 0 {
            return Ok(None);
        }
        let mut at = self.offset + 8;
        if let Some(generic) = self.generic_context(image)? {
            at += generic.size;
        }
        read_mangled_name(image, at)
    }
}

/// Follow a relative pointer at `at` to a symbolic mangled name.
fn read_mangled_name<R: ImageReader + ?Sized>(image: &R, at: u64) -> Result<Option<MangledName>>
{
    match image.read_relative(at)? {
        Some(target) => parse_symbolic_byte_stream(image, target).map(Some),
        None => Ok(None),
    }
}

/// Name of an Objective-C protocol record with absolute pointers.
///
/// ```text
/// +0  isa   pointer
/// +8  name  pointer to a C string
/// ```
pub fn objc_protocol_name<R: ImageReader + ?Sized>(image: &R, offset: u64) -> Result<String>
{
    let name = image.read_pointer(offset + 8)?;
    image.read_c_string(name)
}

/// Name of an Objective-C protocol record with a relative name pointer.
///
/// ```text
/// +0  isa   u32
/// +4  name  i32 relative pointer to a C string
/// ```
pub fn relative_objc_protocol_name<R: ImageReader + ?Sized>(image: &R, offset: u64) -> Result<String>
{
    let name = image.read_relative(offset + 4)?.ok_or(UnmangleError::Malformed {
        position: 0,
        reason: "protocol record without a name",
    })?;
    image.read_c_string(name)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::image::MemoryImage;

    #[test]
    fn test_flags()
    {
        let flags = ContextFlags(0x0003_0091);
        assert_eq!(flags.raw_kind(), 17);
        assert!(flags.is_generic());
        assert_eq!(flags.kind_specific(), 3);
        assert_eq!(ContextKind::from_raw(17).unwrap(), ContextKind::Struct);
        assert!(matches!(ContextKind::from_raw(7), Err(UnmangleError::UnsupportedReferenceKind(7))));
    }

    #[test]
    fn test_named_descriptor()
    {
        let mut image = MemoryImage::new(0x80);
        image.put_u32(0x10, 0).put_relative(0x18, 0x40).put_c_str(0x40, "Lib");
        image.put_u32(0x20, 17).put_relative(0x24, 0x10).put_relative(0x28, 0x50).put_c_str(0x50, "Box");

        let module = ContextDescriptor::read(&image, 0x10).unwrap();
        assert_eq!(module.kind, ContextKind::Module);
        assert_eq!(module.parent(&image).unwrap(), None);
        assert_eq!(module.name(&image).unwrap().as_deref(), Some("Lib"));

        let ty = ContextDescriptor::read(&image, 0x20).unwrap();
        assert_eq!(ty.parent(&image).unwrap(), Some(ParentContext::Descriptor(0x10)));
        assert_eq!(ty.name(&image).unwrap().as_deref(), Some("Box"));
        assert_eq!(ty.extended_context(&image).unwrap(), None);
    }

    #[test]
    fn test_indirect_and_bound_parents()
    {
        let mut image = MemoryImage::new(0x80);
        image.put_u32(0x00, 16).put_relative_indirect(0x04, 0x40).put_pointer(0x40, 0x60);
        image.put_u32(0x10, 16).put_relative_indirect(0x14, 0x48).bind(0x48, "_$s3Lib4BaseCMn");

        let direct = ContextDescriptor::read(&image, 0x00).unwrap();
        assert_eq!(direct.parent(&image).unwrap(), Some(ParentContext::Descriptor(0x60)));
        let bound = ContextDescriptor::read(&image, 0x10).unwrap();
        assert_eq!(
            bound.parent(&image).unwrap(),
            Some(ParentContext::Symbol("_$s3Lib4BaseCMn".to_string()))
        );
    }

    #[test]
    fn test_anonymous_name_after_generic_context()
    {
        let mut image = MemoryImage::new(0x100);
        // generic anonymous context with a mangled name, one param, one requirement
        image.put_u32(0x00, 2 | 0x80 | (1 << 16));
        image.put_u16(0x08, 1).put_u16(0x0A, 1).put_u16(0x0C, 0).put_u16(0x0E, 0);
        image.put_u8(0x10, 0x80);
        image.put_u32(0x14, 0x1F).put_relative(0x18, 0x80).put_u32(0x1C, 0);
        image.put_relative(0x20, 0x90);
        image.put_c_str(0x80, "x");
        image.put_c_str(0x90, "4main3FooV");

        let anonymous = ContextDescriptor::read(&image, 0).unwrap();
        let generic = anonymous.generic_context(&image).unwrap().unwrap();
        assert_eq!(generic.size, 24);
        assert_eq!(generic.requirements.len(), 1);
        assert_eq!(generic.requirements[0].kind, RequirementKind::Layout);
        assert_eq!(generic.requirements[0].layout_kind(&image).unwrap(), 0);
        assert_eq!(generic.requirements[0].param(&image).unwrap().type_string_value(), "x");

        let name = anonymous.anonymous_mangled_name(&image).unwrap().unwrap();
        assert_eq!(name.symbol_string_value(), "$s4main3FooV");
    }

    #[test]
    fn test_type_pack_header_size()
    {
        let mut image = MemoryImage::new(0x40);
        image.put_u16(0x00, 2).put_u16(0x02, 0).put_u16(0x04, 0).put_u16(0x06, GENERIC_HAS_TYPE_PACKS);
        image.put_u16(0x0C, 2);
        let generic = GenericContext::read(&image, 0).unwrap();
        assert!(generic.header.has_type_packs());
        assert_eq!(generic.size, 8 + 4 + 4 + 2 * 8);
    }

    #[test]
    fn test_protocol_payloads()
    {
        let mut image = MemoryImage::new(0x100);
        image.put_u32(0x00, 0).put_relative(0x08, 0x80);
        image.put_u32(0x10, 0).put_i32(0x18, (0x40 - 0x18) | 0b11).bind(0x40, "_$sSHMp");
        image.put_u32(0x20, 0).put_i32(0x28, (0x90 - 0x28) | 0b10);

        let swift = GenericRequirement::read(&image, 0x00).unwrap();
        assert_eq!(swift.protocol(&image).unwrap(), Some(ProtocolReference::Swift(0x80)));
        let bound = GenericRequirement::read(&image, 0x10).unwrap();
        assert_eq!(bound.protocol(&image).unwrap(), Some(ProtocolReference::Symbol("_$sSHMp".to_string())));
        let objc = GenericRequirement::read(&image, 0x20).unwrap();
        assert_eq!(objc.protocol(&image).unwrap(), Some(ProtocolReference::ObjC(0x90)));
    }

    #[test]
    fn test_objc_protocol_names()
    {
        let mut image = MemoryImage::new(0x100);
        image.put_pointer(0x08, 0x40).put_c_str(0x40, "NSCopying");
        assert_eq!(objc_protocol_name(&image, 0).unwrap(), "NSCopying");

        image.put_relative(0x64, 0x80).put_c_str(0x80, "NSCoding");
        assert_eq!(relative_objc_protocol_name(&image, 0x60).unwrap(), "NSCoding");
    }
}
