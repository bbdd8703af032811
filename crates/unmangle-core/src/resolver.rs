//! # Context Resolver
//!
//! Turns a context descriptor into the symbol tree of its fully qualified
//! path by walking parent links up to the module.
//!
//! ## Walk
//!
//! For each descriptor:
//!
//! 1. Read the parent link. Links into other images are resolved through the
//!    bound symbol's name instead of the descriptor.
//! 2. A type or protocol whose parent is an anonymous context carrying a
//!    private or local name for this very declaration adopts that name, and
//!    the walk continues from the anonymous context's own parent.
//! 3. Resolve the parent with one less unit of budget.
//! 4. Assemble the node for this descriptor's kind.
//!
//! Every walk is bounded twice: by the budget, and by the set of descriptors
//! already on the current path. Running out of either yields `Ok(None)`.
//!
//! ## Errors
//!
//! Only fatal errors ([`UnmangleError::is_fatal`]) are returned. Anything
//! else, such as an unsupported descriptor kind or a mangled name that does
//! not demangle, makes the one descriptor unresolvable and is logged at
//! `debug` level.

use std::cell::RefCell;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::config::ResolverConfig;
use crate::context::{
    objc_protocol_name, relative_objc_protocol_name, ContextDescriptor, ContextKind, GenericRequirement,
    ParentContext, ProtocolReference, RequirementKind,
};
use crate::demangler::Demangler;
use crate::error::{Result, UnmangleError};
use crate::image::ImageReader;
use crate::mangled_name::{parse_symbolic_byte_stream, MangledName, MangledNameKind, Reference};
use crate::node::{Node, NodeKind};
use crate::symbolic::{Directness, SymbolicReferenceKind, SymbolicResolver};

/// Module name used for Objective-C declarations.
const OBJC_MODULE: &str = "__C";

/// Memo of resolved descriptors for one indexing session.
///
/// Only successful top-level resolutions made with the configured recursion
/// limit are stored. Share one cache between resolvers reading the same image
/// with the same configuration; never between images.
#[derive(Debug, Default)]
pub struct ResolutionCache
{
    entries: DashMap<u64, Node>,
}

impl ResolutionCache
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn get(&self, offset: u64) -> Option<Node>
    {
        self.entries.get(&offset).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, offset: u64, node: Node)
    {
        self.entries.insert(offset, node);
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    pub fn clear(&self)
    {
        self.entries.clear();
    }
}

/// Descriptors on the current walk, innermost first.
#[derive(Clone, Copy)]
struct Path<'p>
{
    offset: u64,
    parent: Option<&'p Path<'p>>,
}

fn on_path(path: Option<&Path<'_>>, offset: u64) -> bool
{
    let mut current = path;
    while let Some(step) = current {
        if step.offset == offset {
            return true;
        }
        current = step.parent;
    }
    false
}

/// Turn non-fatal errors into `None`.
fn recover<T>(result: Result<T>, what: &'static str) -> Result<Option<T>>
{
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            debug!(error = %err, "{what} is unresolvable");
            Ok(None)
        }
    }
}

fn wrap_type(node: Node) -> Node
{
    if node.kind().is_nominal() {
        Node::with_child(NodeKind::Type, node)
    } else {
        node
    }
}

fn strip_global(node: Node) -> Node
{
    if node.kind() == NodeKind::Global {
        node.child(0).cloned().unwrap_or(node)
    } else {
        node
    }
}

/// Resolves context descriptors of one image.
pub struct ContextResolver<'a, R: ImageReader + ?Sized>
{
    image: &'a R,
    config: ResolverConfig,
    cache: Option<&'a ResolutionCache>,
}

impl<'a, R: ImageReader + ?Sized> ContextResolver<'a, R>
{
    pub fn new(image: &'a R, config: ResolverConfig) -> Self
    {
        Self {
            image,
            config,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: &'a ResolutionCache) -> Self
    {
        self.cache = Some(cache);
        self
    }

    pub fn image(&self) -> &'a R
    {
        self.image
    }

    pub fn config(&self) -> &ResolverConfig
    {
        &self.config
    }

    /// Resolve the descriptor at `offset` with the configured budget.
    ///
    /// Types and protocols come back wrapped in a `Type` node.
    pub fn decode_context_path(&self, offset: u64) -> Result<Option<Node>>
    {
        let Some(descriptor) = recover(ContextDescriptor::read(self.image, offset), "descriptor")? else {
            return Ok(None);
        };
        let node = self.resolve(offset, self.config.recursion_limit)?;
        Ok(node.map(|node| {
            if descriptor.kind.is_type_or_protocol() {
                Node::with_child(NodeKind::Type, node)
            } else {
                node
            }
        }))
    }

    /// Resolve the descriptor at `offset`, following at most `budget`
    /// parent links.
    pub fn resolve(&self, offset: u64, budget: usize) -> Result<Option<Node>>
    {
        self.resolve_descriptor(offset, budget, None)
    }

    /// Demangle a symbolic name read from this image.
    pub fn decode_mangled_name(&self, name: &MangledName, kind: MangledNameKind) -> Result<Node>
    {
        self.decode_nested(name, kind, self.config.recursion_limit, None)
    }

    /// Context node for an exported descriptor symbol such as
    /// `_$s3Lib3BoxVMn`.
    pub fn context_for_symbol(&self, symbol: &str) -> Option<Node>
    {
        let demangled = Demangler::new(symbol)
            .allow_concurrency_abbreviations(self.config.allow_concurrency_abbreviations)
            .demangle_symbol();
        let node = match demangled {
            Ok(node) => strip_global(node),
            Err(err) => {
                debug!(symbol, error = %err, "bound symbol does not demangle");
                return None;
            }
        };
        let described = match node.kind() {
            NodeKind::NominalTypeDescriptor | NodeKind::ProtocolDescriptor | NodeKind::OpaqueTypeDescriptor => {
                node.child(0)?.clone()
            }
            _ => return None,
        };
        match described.kind() {
            NodeKind::Type => described.child(0).cloned(),
            _ => Some(described),
        }
    }

    fn resolve_descriptor(&self, offset: u64, budget: usize, path: Option<&Path<'_>>) -> Result<Option<Node>>
    {
        if budget == 0 {
            debug!(offset, "recursion budget exhausted");
            return recover(Err(UnmangleError::RecursionBudgetExceeded), "descriptor");
        }
        if on_path(path, offset) {
            debug!(offset, "descriptor cycle");
            return Ok(None);
        }
        if let Some(node) = self.cache.and_then(|cache| cache.get(offset)) {
            trace!(offset, "cache hit");
            return Ok(Some(node));
        }

        let Some(descriptor) = recover(ContextDescriptor::read(self.image, offset), "descriptor")? else {
            return Ok(None);
        };
        let here = Path { offset, parent: path };
        let node = self.build(&descriptor, budget, &here)?;

        // A shorter budget or a non-empty path may have cut nested decodes.
        let complete = path.is_none() && budget == self.config.recursion_limit;
        match (&node, self.cache) {
            (Some(node), Some(cache)) if complete => cache.insert(offset, node.clone()),
            (None, _) => debug!(offset, kind = ?descriptor.kind, "descriptor is unresolvable"),
            _ => {}
        }
        Ok(node)
    }

    fn build(&self, descriptor: &ContextDescriptor, budget: usize, here: &Path<'_>) -> Result<Option<Node>>
    {
        let mut parent_ref = descriptor.parent(self.image)?;
        let mut adopted_context = None;
        let mut name = self.adopt_anonymous_name(descriptor, &mut parent_ref, &mut adopted_context, budget, here)?;

        let mut parent = None;
        if let Some(reference) = &parent_ref {
            parent = self.resolve_parent(reference, budget - 1, here)?;
            if parent.is_none() && adopted_context.is_none() {
                return Ok(None);
            }
        }
        if let Some(adopted) = adopted_context {
            if parent.as_ref().is_none_or(|node| node.kind() == NodeKind::AnonymousContext) {
                parent = Some(adopted);
            }
        }
        trace!(offset = descriptor.offset, kind = ?descriptor.kind, has_parent = parent.is_some(), "assembling");

        let kind = match descriptor.kind {
            ContextKind::Class => NodeKind::Class,
            ContextKind::Struct => NodeKind::Structure,
            ContextKind::Enum => NodeKind::Enum,
            ContextKind::Protocol => NodeKind::Protocol,
            ContextKind::Module => {
                if parent_ref.is_some() {
                    return Ok(None);
                }
                return Ok(descriptor.name(self.image)?.map(Node::module));
            }
            ContextKind::Anonymous => return Ok(parent),
            ContextKind::Extension => {
                let Some(parent) = parent else {
                    return Ok(None);
                };
                return self.build_extension(descriptor, parent, budget, here);
            }
            ContextKind::OpaqueType => return self.build_opaque_type(parent_ref.as_ref(), parent, budget, here),
        };

        if name.is_none() {
            name = descriptor.name(self.image)?.map(Node::identifier);
        }
        let Some(name) = name else {
            return Ok(None);
        };

        let Some(parent) = parent else {
            // No parent link at all: a rootless path.
            return Ok(if parent_ref.is_none() {
                Some(Node::with_child(kind, name))
            } else {
                None
            });
        };
        if parent.kind() == NodeKind::AnonymousContext
            && name.kind() == NodeKind::Identifier
            && parent.children().len() < 2
        {
            return Ok(None);
        }
        Ok(Some(Node::with_children(kind, vec![parent, name])))
    }

    fn resolve_parent(&self, parent: &ParentContext, budget: usize, here: &Path<'_>) -> Result<Option<Node>>
    {
        match parent {
            ParentContext::Descriptor(offset) => {
                let node = self.resolve_descriptor(*offset, budget, Some(here))?;
                Ok(node.map(|node| match node.kind() {
                    NodeKind::Type => node.child(0).cloned().unwrap_or(node),
                    _ => node,
                }))
            }
            ParentContext::Symbol(symbol) => Ok(self.context_for_symbol(symbol)),
        }
    }

    /// Adopt a private or local name from an anonymous parent.
    ///
    /// On success `parent_ref` is replaced by the anonymous context's own
    /// parent and `adopted_context` holds the context the name was declared
    /// in.
    fn adopt_anonymous_name(
        &self,
        descriptor: &ContextDescriptor,
        parent_ref: &mut Option<ParentContext>,
        adopted_context: &mut Option<Node>,
        budget: usize,
        here: &Path<'_>,
    ) -> Result<Option<Node>>
    {
        let Some(ParentContext::Descriptor(parent_offset)) = *parent_ref else {
            return Ok(None);
        };
        if !descriptor.kind.is_type_or_protocol() {
            return Ok(None);
        }
        let Some(anonymous) = recover(ContextDescriptor::read(self.image, parent_offset), "parent descriptor")? else {
            return Ok(None);
        };
        if anonymous.kind != ContextKind::Anonymous {
            return Ok(None);
        }
        let Some(mangled) = anonymous.anonymous_mangled_name(self.image)? else {
            return Ok(None);
        };
        let decoded = self.decode_nested(&mangled, MangledNameKind::Symbol, budget - 1, Some(here));
        let Some(node) = recover(decoded, "anonymous context name")? else {
            return Ok(None);
        };

        let node = strip_global(node);
        if node.children().len() < 2 {
            return Ok(None);
        }
        let Some(name) = node.child(1) else {
            return Ok(None);
        };
        if !matches!(name.kind(), NodeKind::PrivateDeclName | NodeKind::LocalDeclName) || name.children().len() < 2 {
            return Ok(None);
        }
        let identifier = name.child(1).filter(|child| child.kind() == NodeKind::Identifier);
        let Some(identifier_text) = identifier.and_then(Node::text) else {
            return Ok(None);
        };
        if descriptor.name(self.image)?.as_deref() != Some(identifier_text) {
            return Ok(None);
        }

        trace!(offset = descriptor.offset, anonymous = parent_offset, "adopting anonymous context name");
        *parent_ref = anonymous.parent(self.image)?;
        *adopted_context = node.child(0).cloned();
        Ok(Some(name.clone()))
    }

    fn build_extension(
        &self,
        descriptor: &ContextDescriptor,
        parent: Node,
        budget: usize,
        here: &Path<'_>,
    ) -> Result<Option<Node>>
    {
        let Some(extended) = descriptor.extended_context(self.image)? else {
            return Ok(None);
        };
        let decoded = self.decode_nested(&extended, MangledNameKind::Type, budget - 1, Some(here));
        let Some(decoded) = recover(decoded, "extended context")? else {
            return Ok(None);
        };
        let Some(nominal) = decoded.find(|node| node.kind().is_nominal() && node.kind() != NodeKind::TypeAlias) else {
            return Ok(None);
        };

        let mut children = vec![parent, nominal.clone()];
        if let Some(signature) = self.build_signature(descriptor, budget, here)? {
            children.push(signature);
        }
        Ok(Some(Node::with_children(NodeKind::Extension, children)))
    }

    /// Generic signature of an extension; `None` if any requirement fails.
    fn build_signature(&self, descriptor: &ContextDescriptor, budget: usize, here: &Path<'_>) -> Result<Option<Node>>
    {
        let Some(generic) = recover(descriptor.generic_context(self.image), "generic context")?.flatten() else {
            return Ok(None);
        };
        if generic.header.has_type_packs() {
            debug!(offset = descriptor.offset, "dropping signature with type packs");
            return Ok(None);
        }

        let mut requirements = Vec::with_capacity(generic.requirements.len());
        for requirement in &generic.requirements {
            match self.build_requirement(requirement, budget, here)? {
                Some(Some(node)) => requirements.push(node),
                Some(None) => {}
                None => {
                    debug!(offset = requirement.offset, kind = ?requirement.kind, "dropping signature");
                    return Ok(None);
                }
            }
        }
        Ok(Some(Node::with_children(NodeKind::DependentGenericSignature, requirements)))
    }

    /// `None` on failure, `Some(None)` for requirements that are not printed.
    fn build_requirement(
        &self,
        requirement: &GenericRequirement,
        budget: usize,
        here: &Path<'_>,
    ) -> Result<Option<Option<Node>>>
    {
        let param = requirement.param(self.image)?;
        let subject = self.decode_nested(&param, MangledNameKind::Type, budget - 1, Some(here));
        let Some(subject) = recover(subject, "requirement subject")? else {
            return Ok(None);
        };

        let node = match requirement.kind {
            RequirementKind::Protocol => {
                let Some(protocol) = self.protocol_node(requirement, budget, here)? else {
                    return Ok(None);
                };
                Node::with_children(NodeKind::DependentGenericConformanceRequirement, vec![subject, protocol])
            }
            RequirementKind::SameType | RequirementKind::BaseClass => {
                let mangled = requirement.mangled_type(self.image)?;
                let ty = self.decode_nested(&mangled, MangledNameKind::Type, budget - 1, Some(here));
                let Some(ty) = recover(ty, "requirement type")? else {
                    return Ok(None);
                };
                let kind = if requirement.kind == RequirementKind::SameType {
                    NodeKind::DependentGenericSameTypeRequirement
                } else {
                    NodeKind::DependentGenericConformanceRequirement
                };
                Node::with_children(kind, vec![subject, ty])
            }
            RequirementKind::Layout => {
                if requirement.layout_kind(self.image)? != 0 {
                    return Ok(None);
                }
                Node::with_children(
                    NodeKind::DependentGenericLayoutRequirement,
                    vec![subject, Node::identifier("C")],
                )
            }
            RequirementKind::SameConformance | RequirementKind::SameShape | RequirementKind::InvertedProtocols => {
                return Ok(Some(None));
            }
        };
        Ok(Some(Some(node)))
    }

    fn protocol_node(&self, requirement: &GenericRequirement, budget: usize, here: &Path<'_>) -> Result<Option<Node>>
    {
        match requirement.protocol(self.image)? {
            None => Ok(None),
            Some(ProtocolReference::Symbol(symbol)) => Ok(self.context_for_symbol(&symbol).map(wrap_type)),
            Some(ProtocolReference::Swift(offset)) => {
                Ok(self.resolve_descriptor(offset, budget - 1, Some(here))?.map(wrap_type))
            }
            Some(ProtocolReference::ObjC(offset)) => {
                let name = objc_protocol_name(self.image, offset)?;
                Ok(Some(Node::with_children(
                    NodeKind::Protocol,
                    vec![Node::module(OBJC_MODULE), Node::identifier(name)],
                )))
            }
        }
    }

    fn build_opaque_type(
        &self,
        parent_ref: Option<&ParentContext>,
        parent: Option<Node>,
        budget: usize,
        here: &Path<'_>,
    ) -> Result<Option<Node>>
    {
        let Some(reference) = parent_ref else {
            return Ok(None);
        };

        if let ParentContext::Descriptor(offset) = reference {
            if let Some(anonymous) = recover(ContextDescriptor::read(self.image, *offset), "opaque type parent")? {
                if anonymous.kind == ContextKind::Anonymous {
                    let Some(mangled) = anonymous.anonymous_mangled_name(self.image)? else {
                        return Ok(None);
                    };
                    let decoded = self.decode_nested(&mangled, MangledNameKind::Symbol, budget - 1, Some(here));
                    return Ok(recover(decoded, "opaque type owner")?
                        .map(|node| Node::with_child(NodeKind::OpaqueReturnTypeOf, strip_global(node))));
                }
            }
        }

        Ok(parent
            .filter(|node| node.kind() == NodeKind::Module)
            .map(|module| Node::with_child(NodeKind::OpaqueReturnTypeOf, module)))
    }

    fn decode_nested(
        &self,
        name: &MangledName,
        kind: MangledNameKind,
        budget: usize,
        path: Option<&Path<'_>>,
    ) -> Result<Node>
    {
        let resolver = ImageSymbolicResolver {
            context: self,
            name,
            budget,
            path,
            error: RefCell::new(None),
        };
        let text = name.string_value(kind);
        let demangler = Demangler::new(&text)
            .allow_concurrency_abbreviations(self.config.allow_concurrency_abbreviations)
            .with_resolver(&resolver);
        let result = match kind {
            MangledNameKind::Type => demangler.demangle_type(),
            MangledNameKind::Symbol => demangler.demangle_symbol(),
        };
        if let Some(err) = resolver.error.into_inner() {
            return Err(err);
        }
        result
    }
}

/// Answers symbolic references of one mangled name from the image.
///
/// The first fatal error is kept and returned once demangling finishes.
struct ImageSymbolicResolver<'r, 'a, R: ImageReader + ?Sized>
{
    context: &'r ContextResolver<'a, R>,
    name: &'r MangledName,
    budget: usize,
    path: Option<&'r Path<'r>>,
    error: RefCell<Option<UnmangleError>>,
}

impl<R: ImageReader + ?Sized> ImageSymbolicResolver<'_, '_, R>
{
    fn resolve_reference(
        &self,
        kind: SymbolicReferenceKind,
        directness: Directness,
        index: usize,
    ) -> Result<Option<Node>>
    {
        let image = self.context.image;
        let Some(lookup) = self.name.lookup(index) else {
            return Ok(None);
        };
        if !matches!(lookup.reference, Reference::Relative { .. }) {
            return Ok(None);
        }
        let target = lookup.target(image)?;

        match kind {
            SymbolicReferenceKind::Context => {
                let offset = match directness {
                    Directness::Direct => target,
                    Directness::Indirect => {
                        if let Some(symbol) = image.resolve_dynamic_bind(target) {
                            return Ok(self.context.context_for_symbol(&symbol).map(wrap_type));
                        }
                        image.read_pointer(target)?
                    }
                };
                let descriptor = ContextDescriptor::read(image, offset)?;
                if descriptor.kind == ContextKind::OpaqueType {
                    return Ok(Some(Node::with_index(NodeKind::OpaqueTypeDescriptorSymbolicReference, offset)));
                }
                let node = self.context.resolve_descriptor(offset, self.budget, self.path)?;
                Ok(node.map(|node| {
                    if descriptor.kind.is_type_or_protocol() {
                        Node::with_child(NodeKind::Type, node)
                    } else {
                        node
                    }
                }))
            }
            SymbolicReferenceKind::AccessorFunctionReference => {
                Ok(Some(Node::with_index(NodeKind::AccessorFunctionReference, target)))
            }
            SymbolicReferenceKind::UniqueExtendedExistentialTypeShape => self.existential_shape(
                target + 4,
                NodeKind::UniqueExtendedExistentialTypeShapeSymbolicReference,
            ),
            SymbolicReferenceKind::NonUniqueExtendedExistentialTypeShape => self.existential_shape(
                target + 8,
                NodeKind::NonUniqueExtendedExistentialTypeShapeSymbolicReference,
            ),
            SymbolicReferenceKind::ObjectiveCProtocol => {
                let name = relative_objc_protocol_name(image, target)?;
                let demangled = Demangler::new(&format!("$s{name}")).demangle_symbol().ok();
                let ty = demangled.and_then(|node| {
                    node.find(|child| child.kind() == NodeKind::Type || child.kind().is_nominal())
                        .cloned()
                        .map(wrap_type)
                });
                Ok(Some(ty.unwrap_or_else(|| {
                    Node::with_child(
                        NodeKind::Type,
                        Node::with_children(
                            NodeKind::Protocol,
                            vec![Node::module(OBJC_MODULE), Node::identifier(name)],
                        ),
                    )
                })))
            }
        }
    }

    /// Demangle the existential type stored in a shape record.
    fn existential_shape(&self, pointer: u64, kind: NodeKind) -> Result<Option<Node>>
    {
        let image = self.context.image;
        let Some(target) = image.read_relative(pointer)? else {
            return Ok(None);
        };
        let mangled = parse_symbolic_byte_stream(image, target)?;
        let global = self
            .context
            .decode_nested(&mangled, MangledNameKind::Symbol, self.budget, self.path)?;
        Ok(Some(Node::with_children(kind, global.children().to_vec())))
    }
}

impl<R: ImageReader + ?Sized> SymbolicResolver for ImageSymbolicResolver<'_, '_, R>
{
    fn resolve(&self, kind: SymbolicReferenceKind, directness: Directness, index: usize) -> Option<Node>
    {
        match self.resolve_reference(kind, directness, index) {
            Ok(node) => node,
            Err(err) if err.is_fatal() => {
                let mut slot = self.error.borrow_mut();
                if slot.is_none() {
                    *slot = Some(err);
                }
                None
            }
            Err(err) => {
                debug!(index, ?kind, error = %err, "symbolic reference is unresolvable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::image::MemoryImage;

    const MODULE: u64 = 0x100;
    const OUTER: u64 = 0x120;
    const INNER: u64 = 0x140;

    fn module(image: &mut MemoryImage, at: u64, name_at: u64, name: &str)
    {
        image.put_u32(at, 0).put_relative(at + 8, name_at).put_c_str(name_at, name);
    }

    fn nominal(image: &mut MemoryImage, at: u64, kind: u32, parent: Option<u64>, name_at: u64, name: &str)
    {
        image.put_u32(at, kind);
        match parent {
            Some(parent) => image.put_relative(at + 4, parent),
            None => image.put_i32(at + 4, 0),
        };
        image.put_relative(at + 8, name_at).put_c_str(name_at, name);
    }

    fn nested_image() -> MemoryImage
    {
        let mut image = MemoryImage::new(0x400);
        module(&mut image, MODULE, 0x300, "Module");
        nominal(&mut image, OUTER, 17, Some(MODULE), 0x310, "OuterType");
        nominal(&mut image, INNER, 16, Some(OUTER), 0x320, "InnerType");
        image
    }

    #[test]
    fn test_nested_path()
    {
        let image = nested_image();
        let resolver = ContextResolver::new(&image, ResolverConfig::default());
        let node = resolver.decode_context_path(INNER).unwrap().unwrap();
        assert_eq!(node.kind(), NodeKind::Type);
        assert_eq!(node.to_string(), "Module.OuterType.InnerType");

        let module = resolver.decode_context_path(MODULE).unwrap().unwrap();
        assert_eq!(module.kind(), NodeKind::Module);
    }

    #[test]
    fn test_budget_counts_parent_links()
    {
        let image = nested_image();
        let resolver = ContextResolver::new(&image, ResolverConfig::default());
        assert!(resolver.resolve(INNER, 2).unwrap().is_none());
        assert!(resolver.resolve(INNER, 3).unwrap().is_some());
        assert!(resolver.resolve(INNER, 0).unwrap().is_none());
    }

    #[test]
    fn test_cache_stores_successes()
    {
        let image = nested_image();
        let cache = ResolutionCache::new();
        let resolver = ContextResolver::new(&image, ResolverConfig::default()).with_cache(&cache);
        assert!(resolver.resolve(INNER, 2).unwrap().is_none());
        assert!(cache.get(INNER).is_none());

        assert!(resolver.resolve(INNER, 10).unwrap().is_some());
        assert!(cache.is_empty());

        let node = resolver.resolve(INNER, ResolverConfig::default().recursion_limit).unwrap().unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(INNER).unwrap().ptr_eq(&node));
        assert!(cache.get(OUTER).is_none());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_module_with_parent_is_unresolvable()
    {
        let mut image = nested_image();
        image.put_relative(MODULE + 4, OUTER);
        let resolver = ContextResolver::new(&image, ResolverConfig::default());
        assert!(resolver.resolve(MODULE, 10).unwrap().is_none());
    }

    #[test]
    fn test_unknown_kind_is_unresolvable()
    {
        let mut image = nested_image();
        image.put_u32(OUTER, 7);
        let resolver = ContextResolver::new(&image, ResolverConfig::default());
        assert!(resolver.resolve(OUTER, 10).unwrap().is_none());
        assert!(resolver.resolve(INNER, 10).unwrap().is_none());
    }

    #[test]
    fn test_out_of_bounds_is_fatal()
    {
        let mut image = nested_image();
        image.put_i32(INNER + 4, 0x7000_0000);
        let resolver = ContextResolver::new(&image, ResolverConfig::default());
        assert!(matches!(resolver.resolve(INNER, 10), Err(UnmangleError::OutOfBounds { .. })));
    }

    #[test]
    fn test_context_for_symbol()
    {
        let image = MemoryImage::new(0);
        let resolver = ContextResolver::new(&image, ResolverConfig::default());
        let node = resolver.context_for_symbol("_$s3Lib3BoxVMn").unwrap();
        assert_eq!(node.kind(), NodeKind::Structure);
        assert_eq!(node.to_string(), "Lib.Box");
        assert!(resolver.context_for_symbol("_$s3Lib3BoxV").is_none());
        assert!(resolver.context_for_symbol("_OBJC_CLASS_$_NSObject").is_none());
    }

    #[test]
    fn test_path_membership()
    {
        let root = Path { offset: 1, parent: None };
        let child = Path {
            offset: 2,
            parent: Some(&root),
        };
        assert!(on_path(Some(&child), 1));
        assert!(on_path(Some(&child), 2));
        assert!(!on_path(Some(&child), 3));
        assert!(!on_path(None, 1));
    }
}
