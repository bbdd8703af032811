//! Integration tests for context descriptor resolution
//!
//! Every test lays out descriptors in a [`MemoryImage`] where file offsets
//! double as addresses.

use unmangle_core::node::NodeKind;
use unmangle_core::{
    parse_symbolic_byte_stream, ContextIndex, ContextResolver, MangledNameKind, MemoryImage, ResolutionCache,
    ResolverConfig, SkipReason,
};

const KIND_MODULE: u32 = 0;
const KIND_EXTENSION: u32 = 1;
const KIND_ANONYMOUS: u32 = 2;
const KIND_PROTOCOL: u32 = 3;
const KIND_OPAQUE: u32 = 4;
const KIND_CLASS: u32 = 16;
const KIND_STRUCT: u32 = 17;
const KIND_ENUM: u32 = 18;

const IS_GENERIC: u32 = 0x80;
const HAS_MANGLED_NAME: u32 = 1 << 16;

/// Named descriptor: flags, parent, name.
fn named(image: &mut MemoryImage, at: u64, kind: u32, parent: Option<u64>, name_at: u64, name: &str)
{
    image.put_u32(at, kind);
    if let Some(parent) = parent {
        image.put_relative(at + 4, parent);
    }
    image.put_relative(at + 8, name_at).put_c_str(name_at, name);
}

/// Anonymous descriptor carrying a mangled name.
fn anonymous(image: &mut MemoryImage, at: u64, parent: u64, name_at: u64, mangled: &str)
{
    image
        .put_u32(at, KIND_ANONYMOUS | HAS_MANGLED_NAME)
        .put_relative(at + 4, parent)
        .put_relative(at + 8, name_at)
        .put_c_str(name_at, mangled);
}

/// A one-reference symbolic name: control byte, offset, terminator.
fn symbolic_ref(image: &mut MemoryImage, at: u64, control: u8, target: u64)
{
    image.put_u8(at, control).put_relative(at + 1, target).put_u8(at + 5, 0);
}

fn resolver(image: &MemoryImage) -> ContextResolver<'_, MemoryImage>
{
    ContextResolver::new(image, ResolverConfig::default())
}

fn path_of(image: &MemoryImage, offset: u64) -> String
{
    resolver(image)
        .decode_context_path(offset)
        .unwrap()
        .map(|node| node.to_string())
        .unwrap_or_default()
}

#[test]
fn test_nested_types()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "Module");
    named(&mut image, 0x20, KIND_CLASS, Some(0x00), 0x310, "OuterType");
    named(&mut image, 0x40, KIND_ENUM, Some(0x20), 0x320, "InnerType");

    let node = resolver(&image).decode_context_path(0x40).unwrap().unwrap();
    assert_eq!(node.kind(), NodeKind::Type);
    let inner = node.child(0).unwrap();
    assert_eq!(inner.kind(), NodeKind::Enum);
    assert_eq!(inner.child(0).unwrap().kind(), NodeKind::Class);
    assert_eq!(inner.child(1).unwrap().text(), Some("InnerType"));
    assert_eq!(node.to_string(), "Module.OuterType.InnerType");
}

#[test]
fn test_rootless_type()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x20, KIND_STRUCT, None, 0x310, "OuterType");
    named(&mut image, 0x40, KIND_ENUM, Some(0x20), 0x320, "InnerType");

    assert_eq!(path_of(&image, 0x40), "OuterType.InnerType");
}

#[test]
fn test_cycle_is_unresolvable_for_every_budget()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_STRUCT, Some(0x20), 0x300, "A");
    named(&mut image, 0x20, KIND_STRUCT, Some(0x00), 0x310, "B");

    let resolver = resolver(&image);
    for budget in 0..=64 {
        assert!(resolver.resolve(0x00, budget).unwrap().is_none(), "budget {budget}");
        assert!(resolver.resolve(0x20, budget).unwrap().is_none(), "budget {budget}");
    }
    assert!(resolver.decode_context_path(0x00).unwrap().is_none());
}

#[test]
fn test_self_parent_is_unresolvable()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_STRUCT, Some(0x00), 0x300, "Loop");
    assert!(resolver(&image).decode_context_path(0x00).unwrap().is_none());
}

#[test]
fn test_deep_chain_needs_enough_budget()
{
    let mut image = MemoryImage::new(0x1000);
    named(&mut image, 0x00, KIND_MODULE, None, 0xF00, "M");
    for i in 1..=60u64 {
        named(&mut image, i * 0x10, KIND_STRUCT, Some((i - 1) * 0x10), 0xF10, "T");
    }

    let default = resolver(&image);
    assert!(default.decode_context_path(60 * 0x10).unwrap().is_none());
    assert!(default.decode_context_path(40 * 0x10).unwrap().is_some());

    let generous = ContextResolver::new(&image, ResolverConfig::default().with_recursion_limit(100));
    let node = generous.decode_context_path(60 * 0x10).unwrap().unwrap();
    assert!(node.to_string().starts_with("M.T.T"));
}

#[test]
fn test_anonymous_context_name_is_adopted()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "main");
    anonymous(&mut image, 0x20, 0x00, 0x310, "4main3Foo4ABCDLLV");
    named(&mut image, 0x40, KIND_STRUCT, Some(0x20), 0x340, "Foo");
    named(&mut image, 0x60, KIND_STRUCT, Some(0x20), 0x350, "Bar");

    let node = resolver(&image).decode_context_path(0x40).unwrap().unwrap();
    let foo = node.child(0).unwrap();
    assert_eq!(foo.child(0).unwrap().kind(), NodeKind::Module);
    assert_eq!(foo.child(1).unwrap().kind(), NodeKind::PrivateDeclName);
    assert_eq!(node.to_string(), "main.(Foo in ABCD)");

    // The anonymous name is for a different declaration.
    assert_eq!(path_of(&image, 0x60), "main.Bar");
}

#[test]
fn test_opaque_types()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "main");
    anonymous(&mut image, 0x20, 0x00, 0x310, "4main4makeyycF");
    image.put_u32(0x40, KIND_OPAQUE).put_relative(0x44, 0x20);
    image.put_u32(0x60, KIND_OPAQUE).put_relative(0x64, 0x00);
    image.put_u32(0x80, KIND_OPAQUE);

    let node = resolver(&image).decode_context_path(0x40).unwrap().unwrap();
    assert_eq!(node.kind(), NodeKind::OpaqueReturnTypeOf);
    assert_eq!(node.child(0).unwrap().kind(), NodeKind::Function);
    assert_eq!(node.to_string(), "opaque return type of main.make() -> ()");

    assert_eq!(path_of(&image, 0x60), "opaque return type of main");
    assert!(resolver(&image).decode_context_path(0x80).unwrap().is_none());
}

#[test]
fn test_extension_with_requirements()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "Lib");
    named(&mut image, 0x20, KIND_STRUCT, Some(0x00), 0x310, "Box");
    named(&mut image, 0x40, KIND_MODULE, None, 0x320, "App");
    named(&mut image, 0x60, KIND_PROTOCOL, Some(0x00), 0x330, "Keyed");

    image
        .put_u32(0x80, KIND_EXTENSION | IS_GENERIC)
        .put_relative(0x84, 0x40)
        .put_relative(0x88, 0x360);
    symbolic_ref(&mut image, 0x360, 0x01, 0x20);
    // Header: one parameter, two requirements.
    image.put_u16(0x8C, 1).put_u16(0x8E, 2).put_u16(0x90, 1).put_u16(0x92, 0);
    image.put_c_str(0x370, "x");
    image.put_u32(0x98, 0).put_relative(0x9C, 0x370).put_relative(0xA0, 0x60);
    image.put_u32(0xA4, 0x1F).put_relative(0xA8, 0x370).put_u32(0xAC, 0);

    named(&mut image, 0xC0, KIND_STRUCT, Some(0x80), 0x380, "Key");

    let node = resolver(&image).decode_context_path(0xC0).unwrap().unwrap();
    let extension = node.child(0).unwrap().child(0).unwrap();
    assert_eq!(extension.kind(), NodeKind::Extension);
    assert_eq!(extension.child(1).unwrap().kind(), NodeKind::Structure);
    assert_eq!(extension.child(2).unwrap().children().len(), 2);
    assert_eq!(
        node.to_string(),
        "(extension in App):Lib.Box where A: Lib.Keyed, A: AnyObject.Key"
    );
}

#[test]
fn test_failed_requirement_drops_signature()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "Lib");
    named(&mut image, 0x20, KIND_STRUCT, Some(0x00), 0x310, "Box");
    image
        .put_u32(0x80, KIND_EXTENSION | IS_GENERIC)
        .put_relative(0x84, 0x00)
        .put_relative(0x88, 0x360);
    symbolic_ref(&mut image, 0x360, 0x01, 0x20);
    image.put_u16(0x8C, 1).put_u16(0x8E, 1);
    image.put_c_str(0x370, "x");
    // Layout requirement with a kind other than class.
    image.put_u32(0x98, 0x1F).put_relative(0x9C, 0x370).put_u32(0xA0, 3);

    let node = resolver(&image).decode_context_path(0x80).unwrap().unwrap();
    assert_eq!(node.kind(), NodeKind::Extension);
    assert_eq!(node.children().len(), 2);
    assert_eq!(node.to_string(), "(extension in Lib):Lib.Box");
}

#[test]
fn test_objc_protocol_requirement()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "Lib");
    named(&mut image, 0x20, KIND_STRUCT, Some(0x00), 0x310, "Box");
    image
        .put_u32(0x80, KIND_EXTENSION | IS_GENERIC)
        .put_relative(0x84, 0x00)
        .put_relative(0x88, 0x360);
    symbolic_ref(&mut image, 0x360, 0x01, 0x20);
    image.put_u16(0x8C, 1).put_u16(0x8E, 1);
    image.put_c_str(0x370, "x");
    image.put_u32(0x98, 0).put_relative(0x9C, 0x370).put_i32(0xA0, (0x3A0 - 0xA0) | 0b10);
    image.put_pointer(0x3A8, 0x3C0).put_c_str(0x3C0, "NSCopying");

    assert_eq!(path_of(&image, 0x80), "(extension in Lib):Lib.Box where A: __C.NSCopying");
}

#[test]
fn test_parent_in_another_image()
{
    let mut image = MemoryImage::new(0x400);
    image.put_u32(0x00, KIND_STRUCT).put_relative_indirect(0x04, 0x200);
    image.put_relative(0x08, 0x300).put_c_str(0x300, "Inner");
    image.bind(0x200, "_$s3Lib5OuterVMn");

    assert_eq!(path_of(&image, 0x00), "Lib.Outer.Inner");
}

#[test]
fn test_parent_through_rebased_slot()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x40, KIND_MODULE, None, 0x300, "Lib");
    image.put_u32(0x00, KIND_STRUCT).put_relative_indirect(0x04, 0x200);
    image.put_relative(0x08, 0x310).put_c_str(0x310, "Box");
    image.put_pointer(0x200, 0x40);

    assert_eq!(path_of(&image, 0x00), "Lib.Box");
}

#[test]
fn test_symbolic_names_against_the_image()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "Lib");
    named(&mut image, 0x20, KIND_STRUCT, Some(0x00), 0x310, "Box");
    // Optional of a direct reference.
    symbolic_ref(&mut image, 0x340, 0x01, 0x20);
    image.put_bytes(0x345, b"Sg\0");
    // Indirect reference through a bound slot.
    symbolic_ref(&mut image, 0x350, 0x02, 0x200);
    image.bind(0x200, "_$s3Ext4ItemVMn");
    // Accessor function.
    symbolic_ref(&mut image, 0x360, 0x09, 0x180);

    let resolver = resolver(&image);

    let optional = parse_symbolic_byte_stream(&image, 0x340).unwrap();
    let node = resolver.decode_mangled_name(&optional, MangledNameKind::Type).unwrap();
    assert_eq!(node.to_string(), "Swift.Optional<Lib.Box>");

    let bound = parse_symbolic_byte_stream(&image, 0x350).unwrap();
    let node = resolver.decode_mangled_name(&bound, MangledNameKind::Type).unwrap();
    assert_eq!(node.to_string(), "Ext.Item");

    let accessor = parse_symbolic_byte_stream(&image, 0x360).unwrap();
    let node = resolver.decode_mangled_name(&accessor, MangledNameKind::Symbol).unwrap();
    let reference = node.child(0).unwrap();
    assert_eq!(reference.kind(), NodeKind::AccessorFunctionReference);
    assert_eq!(reference.index(), Some(0x180));
}

#[test]
fn test_reference_to_unknown_descriptor_fails_decode()
{
    let mut image = MemoryImage::new(0x400);
    image.put_u32(0x20, 9);
    symbolic_ref(&mut image, 0x340, 0x01, 0x20);

    let name = parse_symbolic_byte_stream(&image, 0x340).unwrap();
    let result = resolver(&image).decode_mangled_name(&name, MangledNameKind::Type);
    assert!(result.is_err());
    assert!(!result.unwrap_err().is_fatal());
}

#[test]
fn test_shared_cache_across_resolvers()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "Lib");
    named(&mut image, 0x20, KIND_STRUCT, Some(0x00), 0x310, "Box");

    let cache = ResolutionCache::new();
    let first = ContextResolver::new(&image, ResolverConfig::default()).with_cache(&cache);
    let node = first.decode_context_path(0x20).unwrap().unwrap();
    assert_eq!(cache.len(), 1);

    let second = ContextResolver::new(&image, ResolverConfig::default()).with_cache(&cache);
    let again = second.decode_context_path(0x20).unwrap().unwrap();
    assert!(node.structurally_equal(&again));
}

#[test]
fn test_short_budget_does_not_poison_cache()
{
    let mut image = MemoryImage::new(0x400);
    named(&mut image, 0x00, KIND_MODULE, None, 0x300, "Lib");
    named(&mut image, 0x20, KIND_STRUCT, Some(0x00), 0x310, "Box");
    named(&mut image, 0x40, KIND_MODULE, None, 0x320, "App");
    named(&mut image, 0x60, KIND_PROTOCOL, Some(0xE0), 0x330, "Keyed");
    named(&mut image, 0xE0, KIND_STRUCT, Some(0x00), 0x340, "Outer");

    image
        .put_u32(0x80, KIND_EXTENSION | IS_GENERIC)
        .put_relative(0x84, 0x40)
        .put_relative(0x88, 0x360);
    symbolic_ref(&mut image, 0x360, 0x01, 0x20);
    image.put_u16(0x8C, 1).put_u16(0x8E, 1);
    image.put_c_str(0x370, "x");
    image.put_u32(0x98, 0).put_relative(0x9C, 0x370).put_relative(0xA0, 0x60);

    named(&mut image, 0xC0, KIND_STRUCT, Some(0x80), 0x380, "Key");

    let expected = "(extension in App):Lib.Box where A: Lib.Outer.Keyed";
    assert_eq!(path_of(&image, 0x80), expected);

    // At budget 4 the protocol path runs out and the signature is dropped.
    let cache = ResolutionCache::new();
    let cached = ContextResolver::new(&image, ResolverConfig::default()).with_cache(&cache);
    let short = cached.resolve(0xC0, 4).unwrap().unwrap();
    assert_eq!(short.to_string(), "(extension in App):Lib.Box.Key");
    assert!(cache.is_empty());

    let full = cached.decode_context_path(0x80).unwrap().unwrap();
    assert_eq!(full.to_string(), expected);
    assert_eq!(
        cached.decode_context_path(0xC0).unwrap().unwrap().to_string(),
        format!("{expected}.Key")
    );
}

#[test]
fn test_index_over_many_descriptors()
{
    let mut image = MemoryImage::new(0x2000);
    named(&mut image, 0x00, KIND_MODULE, None, 0x1F00, "Lib");
    let mut offsets = vec![0x00];
    for i in 1..=100u64 {
        let at = i * 0x10;
        named(&mut image, at, KIND_STRUCT, Some(0x00), 0x1000 + i * 0x10, &format!("T{i}"));
        offsets.push(at);
    }
    named(&mut image, 0x800, KIND_STRUCT, Some(0x800), 0x1F10, "Loop");
    offsets.push(0x800);

    let index = ContextIndex::build(&image, &offsets, ResolverConfig::default());
    assert_eq!(index.len(), 101);
    assert_eq!(index.get(0x10).unwrap().to_string(), "Lib.T1");
    assert_eq!(index.get(0x640).unwrap().to_string(), "Lib.T100");
    assert_eq!(index.skipped(), &[(0x800, SkipReason::Unresolvable)]);
}
