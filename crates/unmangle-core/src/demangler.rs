//! # Demangler
//!
//! Stack-based decoder for the part of the mangling grammar that appears in
//! context metadata: nominal paths, extensions, private and local names,
//! generic parameters, bound generics, tuples, simple function types and the
//! descriptor suffixes used by exported symbols.
//!
//! Each operator character either pushes a new node or pops its operands off
//! the stack and pushes the combination. Identifiers, nominal types and bound
//! generics are remembered as substitutions and can be referenced again with
//! `A`.
//!
//! ```rust
//! use unmangle_core::demangler::Demangler;
//!
//! let node = Demangler::new("$s4main5OuterV5InnerC").demangle_symbol().unwrap();
//! assert_eq!(node.to_string(), "main.Outer.Inner");
//! ```
//!
//! Symbolic references (control characters `\u{1}`..`\u{17}`) are handed to a
//! [`SymbolicResolver`] in the order they appear.

use smallvec::SmallVec;
use tracing::trace;

use crate::cursor::Cursor;
use crate::error::{Result, UnmangleError};
use crate::node::{Node, NodeKind, MAX_NODE_DEPTH};
use crate::substitution::MAX_REPEAT_COUNT;
use crate::symbolic::{SymbolicReferenceKind, SymbolicResolver};
use crate::tables::{operator_char_for_letter, standard_type_for_code, StandardKind};
use crate::words::{read_identifier, DecodeWords};

const SYMBOL_PREFIXES: [&str; 4] = ["_$s", "$s", "_$e", "$e"];

/// Generic argument lists of one bound generic type, innermost first.
type TypeLists = SmallVec<[Vec<Node>; 2]>;

/// One demangling session.
///
/// The word list and substitution table live only as long as the session.
pub struct Demangler<'r>
{
    cursor: Cursor,
    stack: Vec<Node>,
    substitutions: Vec<Node>,
    words: DecodeWords,
    resolver: Option<&'r dyn SymbolicResolver>,
    next_symbolic_index: usize,
    allow_concurrency: bool,
}

impl<'r> Demangler<'r>
{
    pub fn new(text: &str) -> Self
    {
        Self {
            cursor: Cursor::new(text),
            stack: Vec::new(),
            substitutions: Vec::new(),
            words: DecodeWords::new(),
            resolver: None,
            next_symbolic_index: 0,
            allow_concurrency: true,
        }
    }

    /// Resolver for embedded symbolic references.
    #[must_use]
    pub fn with_resolver(mut self, resolver: &'r dyn SymbolicResolver) -> Self
    {
        self.resolver = Some(resolver);
        self
    }

    /// Whether `Sc<c>` abbreviations are accepted.
    #[must_use]
    pub fn allow_concurrency_abbreviations(mut self, allow: bool) -> Self
    {
        self.allow_concurrency = allow;
        self
    }

    /// Demangle a full symbol (`$s...`) into a `Global` node.
    ///
    /// Top-level `Type` wrappers are removed, so `$s4main3FooV` yields
    /// `Global[Structure[Module, Identifier]]`.
    pub fn demangle_symbol(mut self) -> Result<Node>
    {
        if !SYMBOL_PREFIXES.iter().any(|prefix| self.cursor.eat_str(prefix)) {
            return Err(self.cursor.malformed("missing symbol prefix"));
        }
        self.parse_all()?;

        let children: Vec<Node> = self
            .stack
            .drain(..)
            .map(|node| match node.kind() {
                NodeKind::Type => node.child(0).cloned().unwrap_or(node),
                _ => node,
            })
            .collect();
        if children.is_empty() {
            return Err(self.cursor.malformed("empty symbol"));
        }
        Ok(Node::with_children(NodeKind::Global, children))
    }

    /// Demangle a bare type mangling into its `Type` node.
    pub fn demangle_type(mut self) -> Result<Node>
    {
        self.parse_all()?;
        self.pop_kind(NodeKind::Type)
            .ok_or_else(|| self.cursor.malformed("expected a type"))
    }

    fn parse_all(&mut self) -> Result<()>
    {
        while !self.cursor.is_at_end() {
            let node = self.demangle_operator()?;
            if node.depth() > MAX_NODE_DEPTH {
                return Err(self.cursor.malformed("nesting too deep"));
            }
            self.stack.push(node);
        }
        trace!(nodes = self.stack.len(), substitutions = self.substitutions.len(), "demangled");
        Ok(())
    }

    fn demangle_operator(&mut self) -> Result<Node>
    {
        let Some(ch) = self.cursor.next_char() else {
            return Err(UnmangleError::TruncatedInput);
        };
        match ch {
            '\u{1}'..='\u{1F}' => self.demangle_symbolic_reference(ch as u8),
            'A' => self.demangle_multi_substitutions(),
            'C' => self.demangle_nominal(NodeKind::Class),
            'D' => {
                let ty = self.pop_required(NodeKind::Type, "expected a type before 'D'")?;
                Ok(Node::with_child(NodeKind::TypeMangling, ty))
            }
            'E' => self.demangle_extension(),
            'F' => self.demangle_function(),
            'G' => self.demangle_bound_generic(),
            'L' => self.demangle_local_name(),
            'M' => self.demangle_metadata(),
            'O' => self.demangle_nominal(NodeKind::Enum),
            'P' => self.demangle_nominal(NodeKind::Protocol),
            'S' => self.demangle_standard_substitution(),
            'V' => self.demangle_nominal(NodeKind::Structure),
            'a' => self.demangle_nominal(NodeKind::TypeAlias),
            'c' => self.demangle_function_type(),
            'o' => self.demangle_operator_identifier(),
            'q' => self.demangle_generic_param(),
            's' => Ok(Node::module("Swift")),
            't' => self.demangle_tuple(),
            'x' => Ok(Node::with_child(NodeKind::Type, generic_param(0, 0))),
            'y' => Ok(Node::new(NodeKind::EmptyList)),
            '_' => Ok(Node::new(NodeKind::FirstElementMarker)),
            '0'..='9' => {
                self.cursor.step_back();
                let name = read_identifier(&mut self.cursor, &mut self.words)?;
                let identifier = Node::identifier(name);
                self.substitutions.push(identifier.clone());
                Ok(identifier)
            }
            _ => {
                self.cursor.step_back();
                Err(self.cursor.malformed("unsupported operator"))
            }
        }
    }

    fn demangle_symbolic_reference(&mut self, byte: u8) -> Result<Node>
    {
        let (kind, directness) = SymbolicReferenceKind::from_byte(byte)?;
        let index = self.next_symbolic_index;
        self.next_symbolic_index += 1;

        let resolver = self
            .resolver
            .ok_or_else(|| self.cursor.malformed("symbolic reference without a resolver"))?;
        let node = resolver
            .resolve(kind, directness, index)
            .ok_or_else(|| self.cursor.malformed("unresolved symbolic reference"))?;

        // References to opaque types are never substitution candidates.
        let is_opaque = node.kind() == NodeKind::OpaqueTypeDescriptorSymbolicReference;
        if matches!(kind, SymbolicReferenceKind::Context | SymbolicReferenceKind::ObjectiveCProtocol) && !is_opaque {
            self.substitutions.push(node.clone());
        }
        Ok(node)
    }

    fn demangle_multi_substitutions(&mut self) -> Result<Node>
    {
        let mut repeat_count: Option<u64> = None;
        loop {
            let Some(ch) = self.cursor.next_char() else {
                return Err(UnmangleError::TruncatedInput);
            };
            match ch {
                'a'..='z' => {
                    let node = self.repeated_substitution(repeat_count, (ch as u8 - b'a') as usize)?;
                    self.stack.push(node);
                    repeat_count = None;
                }
                'A'..='Z' => return self.repeated_substitution(repeat_count, (ch as u8 - b'A') as usize),
                '_' => {
                    let index = repeat_count.map_or(26, |n| n.saturating_add(27));
                    return usize::try_from(index)
                        .ok()
                        .and_then(|index| self.substitutions.get(index))
                        .cloned()
                        .ok_or_else(|| self.cursor.malformed("substitution index out of range"));
                }
                _ => {
                    self.cursor.step_back();
                    repeat_count = Some(self.cursor.read_natural()?);
                }
            }
        }
    }

    /// Push `count - 1` copies of substitution `index` and return the last one.
    fn repeated_substitution(&mut self, count: Option<u64>, index: usize) -> Result<Node>
    {
        let node = self
            .substitutions
            .get(index)
            .cloned()
            .ok_or_else(|| self.cursor.malformed("substitution index out of range"))?;
        let count = count.unwrap_or(1);
        if count > MAX_REPEAT_COUNT as u64 {
            return Err(self.cursor.malformed("repeat count too large"));
        }
        for _ in 1..count {
            self.stack.push(node.clone());
        }
        Ok(node)
    }

    fn demangle_standard_substitution(&mut self) -> Result<Node>
    {
        if self.cursor.eat('o') {
            return Ok(Node::module("__C"));
        }
        if self.cursor.eat('g') {
            let wrapped = self.pop_required(NodeKind::Type, "expected a type before 'Sg'")?;
            let optional = Node::with_children(
                NodeKind::BoundGenericEnum,
                vec![
                    swift_type(NodeKind::Enum, "Optional"),
                    Node::with_child(NodeKind::TypeList, wrapped),
                ],
            );
            let ty = Node::with_child(NodeKind::Type, optional);
            self.substitutions.push(ty.clone());
            return Ok(ty);
        }

        let repeat_count = match self.cursor.peek() {
            Some(ch) if ch.is_ascii_digit() => self.cursor.read_natural()?,
            _ => 1,
        };
        if repeat_count > MAX_REPEAT_COUNT as u64 {
            return Err(self.cursor.malformed("repeat count too large"));
        }

        let mut code = String::new();
        if self.cursor.eat('c') {
            code.push('c');
        }
        let letter = self.cursor.next_char().ok_or(UnmangleError::TruncatedInput)?;
        code.push(letter);

        let entry = standard_type_for_code(&code, self.allow_concurrency)
            .ok_or_else(|| self.cursor.malformed("unknown standard substitution"))?;
        let kind = match entry.kind {
            StandardKind::Structure => NodeKind::Structure,
            StandardKind::Enum => NodeKind::Enum,
            StandardKind::Protocol => NodeKind::Protocol,
        };
        let node = swift_type(kind, entry.name);
        for _ in 1..repeat_count {
            self.stack.push(node.clone());
        }
        Ok(node)
    }

    fn demangle_nominal(&mut self, kind: NodeKind) -> Result<Node>
    {
        let name = self.pop_decl_name()?;
        let context = self.pop_context()?;
        let ty = Node::with_child(NodeKind::Type, Node::with_children(kind, vec![context, name]));
        self.substitutions.push(ty.clone());
        Ok(ty)
    }

    fn demangle_extension(&mut self) -> Result<Node>
    {
        let signature = self.pop_kind(NodeKind::DependentGenericSignature);
        let module = self
            .pop_module()
            .ok_or_else(|| self.cursor.malformed("expected a module before 'E'"))?;
        let extended = self.pop_any_generic()?;
        let mut children = vec![module, extended];
        children.extend(signature);
        Ok(Node::with_children(NodeKind::Extension, children))
    }

    fn demangle_local_name(&mut self) -> Result<Node>
    {
        if self.cursor.eat('L') {
            let discriminator = self.pop_decl_name()?;
            let name = self.pop_decl_name()?;
            return Ok(Node::with_children(NodeKind::PrivateDeclName, vec![discriminator, name]));
        }
        if self.cursor.eat('l') {
            let discriminator = self.pop_decl_name()?;
            return Ok(Node::with_child(NodeKind::PrivateDeclName, discriminator));
        }
        let number = self.cursor.read_index()?;
        let name = self.pop_decl_name()?;
        Ok(Node::with_children(
            NodeKind::LocalDeclName,
            vec![Node::with_index(NodeKind::Number, number), name],
        ))
    }

    fn demangle_metadata(&mut self) -> Result<Node>
    {
        let ch = self.cursor.next_char().ok_or(UnmangleError::TruncatedInput)?;
        match ch {
            'n' => {
                let ty = self.pop_required(NodeKind::Type, "expected a type before 'Mn'")?;
                Ok(Node::with_child(NodeKind::NominalTypeDescriptor, ty))
            }
            'p' => {
                let ty = self.pop_required(NodeKind::Type, "expected a protocol before 'Mp'")?;
                if ty.child(0).map(Node::kind) != Some(NodeKind::Protocol) {
                    return Err(self.cursor.malformed("expected a protocol before 'Mp'"));
                }
                Ok(Node::with_child(NodeKind::ProtocolDescriptor, ty))
            }
            'Q' => {
                let node = self.stack.pop().ok_or_else(|| self.cursor.malformed("expected a node before 'MQ'"))?;
                Ok(Node::with_child(NodeKind::OpaqueTypeDescriptor, node))
            }
            'X' => {
                let which = self.cursor.next_char().ok_or(UnmangleError::TruncatedInput)?;
                match which {
                    'X' => Ok(Node::with_child(NodeKind::AnonymousDescriptor, self.pop_context()?)),
                    'E' => Ok(Node::with_child(NodeKind::ExtensionDescriptor, self.pop_context()?)),
                    'M' => {
                        let module = self
                            .pop_module()
                            .ok_or_else(|| self.cursor.malformed("expected a module before 'MXM'"))?;
                        Ok(Node::with_child(NodeKind::ModuleDescriptor, module))
                    }
                    _ => Err(self.cursor.malformed("unsupported descriptor suffix")),
                }
            }
            _ => Err(self.cursor.malformed("unsupported metadata suffix")),
        }
    }

    fn demangle_generic_param(&mut self) -> Result<Node>
    {
        let param = if self.cursor.eat('d') {
            let depth = self.cursor.read_index()?.saturating_add(1);
            let index = self.cursor.read_index()?;
            generic_param(depth, index)
        } else if self.cursor.eat('z') {
            generic_param(0, 0)
        } else {
            generic_param(0, self.cursor.read_index()?.saturating_add(1))
        };
        Ok(Node::with_child(NodeKind::Type, param))
    }

    fn demangle_bound_generic(&mut self) -> Result<Node>
    {
        let mut lists = TypeLists::new();
        loop {
            let mut list = Vec::new();
            while let Some(ty) = self.pop_kind(NodeKind::Type) {
                list.push(ty);
            }
            list.reverse();
            lists.push(list);
            if self.pop_kind(NodeKind::EmptyList).is_some() {
                break;
            }
            if self.pop_kind(NodeKind::FirstElementMarker).is_none() {
                return Err(self.cursor.malformed("unterminated generic argument list"));
            }
        }

        if lists.iter().skip(1).any(|list| !list.is_empty()) {
            return Err(self.cursor.malformed("arguments for outer generic contexts"));
        }

        let nominal = self.pop_any_generic()?;
        let bound_kind = match nominal.kind() {
            NodeKind::Class => NodeKind::BoundGenericClass,
            NodeKind::Structure => NodeKind::BoundGenericStructure,
            NodeKind::Enum => NodeKind::BoundGenericEnum,
            _ => return Err(self.cursor.malformed("generic arguments on a non-generic type")),
        };
        let arguments = Node::with_children(NodeKind::TypeList, std::mem::take(&mut lists[0]));
        let bound = Node::with_children(bound_kind, vec![Node::with_child(NodeKind::Type, nominal), arguments]);
        let ty = Node::with_child(NodeKind::Type, bound);
        self.substitutions.push(ty.clone());
        Ok(ty)
    }

    fn demangle_tuple(&mut self) -> Result<Node>
    {
        let mut tuple = Vec::new();
        if self.pop_kind(NodeKind::EmptyList).is_none() {
            loop {
                let is_first = self.pop_kind(NodeKind::FirstElementMarker).is_some();
                let ty = self.pop_required(NodeKind::Type, "expected a tuple element")?;
                tuple.push(Node::with_child(NodeKind::TupleElement, ty));
                if is_first {
                    break;
                }
            }
            tuple.reverse();
        }
        Ok(Node::with_child(
            NodeKind::Type,
            Node::with_children(NodeKind::Tuple, tuple),
        ))
    }

    fn demangle_function_type(&mut self) -> Result<Node>
    {
        let arguments = self.pop_function_params(NodeKind::ArgumentTuple)?;
        let result = self.pop_function_params(NodeKind::ReturnType)?;
        Ok(Node::with_child(
            NodeKind::Type,
            Node::with_children(NodeKind::FunctionType, vec![arguments, result]),
        ))
    }

    fn pop_function_params(&mut self, kind: NodeKind) -> Result<Node>
    {
        let params = if self.pop_kind(NodeKind::EmptyList).is_some() {
            Node::with_child(NodeKind::Type, Node::new(NodeKind::Tuple))
        } else {
            self.pop_required(NodeKind::Type, "expected function parameters")?
        };
        Ok(Node::with_child(kind, params))
    }

    fn demangle_function(&mut self) -> Result<Node>
    {
        let ty = self.pop_required(NodeKind::Type, "expected a function type before 'F'")?;
        let name = self.pop_decl_name()?;
        let context = self.pop_context()?;
        Ok(Node::with_children(NodeKind::Function, vec![context, name, ty]))
    }

    fn demangle_operator_identifier(&mut self) -> Result<Node>
    {
        let identifier = self.pop_required(NodeKind::Identifier, "expected an identifier before 'o'")?;
        let mut spelling = String::new();
        for ch in identifier.text().unwrap_or_default().chars() {
            if !ch.is_ascii() {
                spelling.push(ch);
                continue;
            }
            let op = operator_char_for_letter(ch).ok_or_else(|| self.cursor.malformed("invalid operator letter"))?;
            spelling.push(op);
        }
        let kind = match self.cursor.next_char() {
            Some('i') => NodeKind::InfixOperator,
            Some('p') => NodeKind::PrefixOperator,
            Some('P') => NodeKind::PostfixOperator,
            _ => return Err(self.cursor.malformed("expected operator fixity")),
        };
        Ok(Node::with_text(kind, spelling))
    }

    fn pop_kind(&mut self, kind: NodeKind) -> Option<Node>
    {
        match self.stack.last() {
            Some(node) if node.kind() == kind => self.stack.pop(),
            _ => None,
        }
    }

    fn pop_required(&mut self, kind: NodeKind, reason: &'static str) -> Result<Node>
    {
        self.pop_kind(kind).ok_or_else(|| self.cursor.malformed(reason))
    }

    fn pop_decl_name(&mut self) -> Result<Node>
    {
        match self.stack.last() {
            Some(node) if node.kind().is_decl_name() => self.stack.pop().ok_or(UnmangleError::TruncatedInput),
            _ => Err(self.cursor.malformed("expected a declaration name")),
        }
    }

    /// A bare identifier in module position becomes a module.
    fn pop_module(&mut self) -> Option<Node>
    {
        let top = self.stack.last()?;
        match top.kind() {
            NodeKind::Module => self.stack.pop(),
            NodeKind::Identifier => {
                let name = top.text().unwrap_or_default().to_string();
                self.stack.pop();
                Some(Node::module(name))
            }
            _ => None,
        }
    }

    fn pop_context(&mut self) -> Result<Node>
    {
        if let Some(module) = self.pop_module() {
            return Ok(module);
        }
        if let Some(ty) = self.pop_kind(NodeKind::Type) {
            return match ty.children() {
                [child] if child.kind().is_context() => Ok(child.clone()),
                _ => Err(self.cursor.malformed("type is not a context")),
            };
        }
        match self.stack.last() {
            Some(node) if node.kind().is_context() => self.stack.pop().ok_or(UnmangleError::TruncatedInput),
            _ => Err(self.cursor.malformed("expected a context")),
        }
    }

    /// Pop a `Type` and return the nominal inside it.
    fn pop_any_generic(&mut self) -> Result<Node>
    {
        let ty = self.pop_required(NodeKind::Type, "expected a nominal type")?;
        match ty.child(0) {
            Some(nominal) if nominal.kind().is_nominal() => Ok(nominal.clone()),
            _ => Err(self.cursor.malformed("expected a nominal type")),
        }
    }
}

fn generic_param(depth: u64, index: u64) -> Node
{
    Node::with_children(
        NodeKind::DependentGenericParamType,
        vec![
            Node::with_index(NodeKind::Index, depth),
            Node::with_index(NodeKind::Index, index),
        ],
    )
}

fn swift_type(kind: NodeKind, name: &str) -> Node
{
    Node::with_child(
        NodeKind::Type,
        Node::with_children(kind, vec![Node::module("Swift"), Node::identifier(name)]),
    )
}

/// Shorthand for [`Demangler::demangle_symbol`].
pub fn demangle_symbol(text: &str, resolver: Option<&dyn SymbolicResolver>, allow_concurrency: bool) -> Result<Node>
{
    let demangler = Demangler::new(text).allow_concurrency_abbreviations(allow_concurrency);
    match resolver {
        Some(resolver) => demangler.with_resolver(resolver).demangle_symbol(),
        None => demangler.demangle_symbol(),
    }
}

/// Shorthand for [`Demangler::demangle_type`].
pub fn demangle_type(text: &str, resolver: Option<&dyn SymbolicResolver>, allow_concurrency: bool) -> Result<Node>
{
    let demangler = Demangler::new(text).allow_concurrency_abbreviations(allow_concurrency);
    match resolver {
        Some(resolver) => demangler.with_resolver(resolver).demangle_type(),
        None => demangler.demangle_type(),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn symbol(text: &str) -> Node
    {
        Demangler::new(text).demangle_symbol().unwrap()
    }

    fn ty(text: &str) -> Node
    {
        Demangler::new(text).demangle_type().unwrap()
    }

    #[test]
    fn test_nested_nominals()
    {
        let global = symbol("$s6Module9OuterTypeV05InnerC0C");
        assert_eq!(global.kind(), NodeKind::Global);
        let class = global.child(0).unwrap();
        assert_eq!(class.kind(), NodeKind::Class);
        assert_eq!(global.to_string(), "Module.OuterType.InnerType");
    }

    #[test]
    fn test_prefix_variants()
    {
        for text in ["$s4main3FooV", "_$s4main3FooV", "$e4main3FooV", "_$e4main3FooV"] {
            assert_eq!(symbol(text).to_string(), "main.Foo");
        }
        assert!(matches!(
            Demangler::new("4main3FooV").demangle_symbol(),
            Err(UnmangleError::Malformed { .. })
        ));
    }

    #[test]
    fn test_type_mangling()
    {
        let node = ty("4main3FooV");
        assert_eq!(node.kind(), NodeKind::Type);
        assert_eq!(node.child(0).unwrap().kind(), NodeKind::Structure);

        let global = symbol("$s4main3FooVD");
        assert_eq!(global.child(0).unwrap().kind(), NodeKind::TypeMangling);
    }

    #[test]
    fn test_private_and_local_names()
    {
        let global = symbol("$s4main3Foo4ABCDLLV");
        let structure = global.child(0).unwrap();
        let private = structure.child(1).unwrap();
        assert_eq!(private.kind(), NodeKind::PrivateDeclName);
        assert_eq!(private.child(0).unwrap().text(), Some("ABCD"));
        assert_eq!(private.child(1).unwrap().text(), Some("Foo"));
        assert_eq!(global.to_string(), "main.(Foo in ABCD)");

        assert_eq!(symbol("$s4main5LocalL_V").to_string(), "main.(Local #1)");
        assert_eq!(symbol("$s4main5LocalL0_V").to_string(), "main.(Local #2)");
    }

    #[test]
    fn test_standard_substitutions()
    {
        assert_eq!(ty("Si").to_string(), "Swift.Int");
        assert_eq!(ty("SS").to_string(), "Swift.String");
        assert_eq!(ty("SiSg").to_string(), "Swift.Optional<Swift.Int>");
        assert_eq!(symbol("$sSo8NSObjectC").to_string(), "__C.NSObject");
        assert_eq!(ty("ScT").child(0).unwrap().kind(), NodeKind::Structure);
        assert!(Demangler::new("ScT")
            .allow_concurrency_abbreviations(false)
            .demangle_type()
            .is_err());
    }

    #[test]
    fn test_repeated_standard_substitution()
    {
        assert_eq!(ty("Si_Sit").to_string(), "(Swift.Int, Swift.Int)");
        assert_eq!(ty("Si_S2it").to_string(), "(Swift.Int, Swift.Int, Swift.Int)");
    }

    #[test]
    fn test_multi_substitutions()
    {
        // Substitutions: 0 = "main", 1 = "Box", 2 = main.Box
        let pair = ty("4main3BoxV_ACt");
        assert_eq!(pair.to_string(), "(main.Box, main.Box)");
        let repeated = ty("4main3BoxV_A2Ct");
        assert_eq!(repeated.to_string(), "(main.Box, main.Box, main.Box)");
        assert!(Demangler::new("4main3BoxVAZ").demangle_type().is_err());
    }

    #[test]
    fn test_extension_context()
    {
        let global = symbol("$s3Lib3BoxV3AppE3KeyV");
        assert_eq!(global.to_string(), "(extension in App):Lib.Box.Key");
        let key = global.child(0).unwrap();
        let extension = key.child(0).unwrap();
        assert_eq!(extension.kind(), NodeKind::Extension);
        assert_eq!(extension.child(0).unwrap().kind(), NodeKind::Module);
        assert_eq!(extension.child(1).unwrap().kind(), NodeKind::Structure);
    }

    #[test]
    fn test_generic_params_and_bound_generics()
    {
        assert_eq!(ty("x").to_string(), "A");
        assert_eq!(ty("q_").to_string(), "B");
        assert_eq!(ty("qd__").to_string(), "A1");
        assert_eq!(ty("qd_0_").to_string(), "B1");
        assert_eq!(ty("SDyxq_G").to_string(), "Swift.Dictionary<A, B>");
        assert_eq!(ty("SaySiG").to_string(), "Swift.Array<Swift.Int>");
    }

    #[test]
    fn test_function_entity()
    {
        let global = symbol("$s4main4makeyycF");
        let function = global.child(0).unwrap();
        assert_eq!(function.kind(), NodeKind::Function);
        assert_eq!(global.to_string(), "main.make() -> ()");
        assert_eq!(symbol("$s4main3addS2icF").to_string(), "main.add(Swift.Int) -> Swift.Int");
    }

    #[test]
    fn test_operator_names()
    {
        let global = symbol("$s4main2peoiyycF");
        let function = global.child(0).unwrap();
        let name = function.child(1).unwrap();
        assert_eq!(name.kind(), NodeKind::InfixOperator);
        assert_eq!(name.text(), Some("+="));
    }

    #[test]
    fn test_descriptor_suffixes()
    {
        let global = symbol("$s4main3FooVMn");
        let descriptor = global.child(0).unwrap();
        assert_eq!(descriptor.kind(), NodeKind::NominalTypeDescriptor);
        assert_eq!(global.to_string(), "nominal type descriptor for main.Foo");

        assert_eq!(symbol("$s4main5ProtoPMp").child(0).unwrap().kind(), NodeKind::ProtocolDescriptor);
        assert_eq!(symbol("$s4mainMXM").child(0).unwrap().kind(), NodeKind::ModuleDescriptor);
        assert!(Demangler::new("$s4main3FooVMp").demangle_symbol().is_err());
    }

    #[test]
    fn test_symbolic_references()
    {
        let answers = vec![Some(Node::with_child(
            NodeKind::Type,
            Node::with_children(NodeKind::Structure, vec![Node::module("Lib"), Node::identifier("Box")]),
        ))];
        let node = Demangler::new("\u{1}Sg_AAt")
            .with_resolver(&answers)
            .demangle_type()
            .unwrap();
        assert_eq!(node.to_string(), "(Swift.Optional<Lib.Box>, Lib.Box)");

        assert!(Demangler::new("\u{1}").demangle_type().is_err());
        assert!(matches!(
            Demangler::new("\u{3}").with_resolver(&answers).demangle_type(),
            Err(UnmangleError::UnsupportedReferenceKind(3))
        ));
    }

    #[test]
    fn test_malformed_input_is_rejected()
    {
        for text in ["", "V", "3Fo", "4mainV", "Gy", "Z", "9999999999999999999999x"] {
            assert!(Demangler::new(text).demangle_type().is_err(), "{text:?}");
        }
    }
}
