//! # Symbol Tree
//!
//! The decoded form of a mangled name: an immutable tree of [`Node`]s.
//!
//! Nodes are reference counted so subtrees can be shared freely between the
//! demangler's substitution list, the resolver cache and the final result
//! without copying. A tree is never mutated after construction; "adding" a
//! child builds a new node.
//!
//! ## Depth
//!
//! Every node records its depth when it is built. The demangler refuses to
//! build trees deeper than [`MAX_NODE_DEPTH`], and every consumer that walks a
//! tree (equality, hashing, printing) stops at the same depth. Adversarial
//! input therefore cannot exhaust the stack.

use std::fmt;
use std::sync::Arc;

/// Hard cap on tree depth shared by producers and consumers.
pub const MAX_NODE_DEPTH: usize = 1024;

/// Discriminant of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind
{
    Global,
    Type,
    TypeMangling,
    Module,
    Identifier,
    PrefixOperator,
    InfixOperator,
    PostfixOperator,
    Class,
    Structure,
    Enum,
    Protocol,
    TypeAlias,
    Extension,
    PrivateDeclName,
    LocalDeclName,
    Number,
    Index,
    Function,
    FunctionType,
    ArgumentTuple,
    ReturnType,
    Tuple,
    TupleElement,
    BoundGenericClass,
    BoundGenericStructure,
    BoundGenericEnum,
    TypeList,
    DependentGenericParamType,
    DependentGenericSignature,
    DependentGenericSameTypeRequirement,
    DependentGenericConformanceRequirement,
    DependentGenericLayoutRequirement,
    OpaqueReturnTypeOf,
    AnonymousContext,
    NominalTypeDescriptor,
    ProtocolDescriptor,
    OpaqueTypeDescriptor,
    AnonymousDescriptor,
    ExtensionDescriptor,
    ModuleDescriptor,
    EmptyList,
    FirstElementMarker,
    AccessorFunctionReference,
    OpaqueTypeDescriptorSymbolicReference,
    UniqueExtendedExistentialTypeShapeSymbolicReference,
    NonUniqueExtendedExistentialTypeShapeSymbolicReference,
}

impl NodeKind
{
    /// Operator names compare through [`translate_operator_char`](crate::tables::translate_operator_char).
    #[must_use]
    pub fn is_operator(self) -> bool
    {
        matches!(
            self,
            NodeKind::PrefixOperator | NodeKind::InfixOperator | NodeKind::PostfixOperator
        )
    }

    /// Kinds that describe a named nominal declaration.
    #[must_use]
    pub fn is_nominal(self) -> bool
    {
        matches!(
            self,
            NodeKind::Class | NodeKind::Structure | NodeKind::Enum | NodeKind::Protocol | NodeKind::TypeAlias
        )
    }

    /// Kinds that can stand in the name slot of a declaration.
    #[must_use]
    pub fn is_decl_name(self) -> bool
    {
        matches!(
            self,
            NodeKind::Identifier
                | NodeKind::PrivateDeclName
                | NodeKind::LocalDeclName
                | NodeKind::PrefixOperator
                | NodeKind::InfixOperator
                | NodeKind::PostfixOperator
        )
    }

    /// Kinds that may appear as the parent context of a declaration.
    #[must_use]
    pub fn is_context(self) -> bool
    {
        self.is_nominal()
            || matches!(
                self,
                NodeKind::Module
                    | NodeKind::Extension
                    | NodeKind::Function
                    | NodeKind::AnonymousContext
                    | NodeKind::OpaqueReturnTypeOf
            )
    }
}

/// Payload carried by a node besides its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Contents
{
    None,
    Text(String),
    Index(u64),
}

struct NodeInner
{
    kind: NodeKind,
    contents: Contents,
    children: Vec<Node>,
    depth: usize,
}

/// Shared, immutable symbol tree node.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node
{
    fn make(kind: NodeKind, contents: Contents, children: Vec<Node>) -> Self
    {
        let depth = 1 + children.iter().map(Node::depth).max().unwrap_or(0);
        Node(Arc::new(NodeInner {
            kind,
            contents,
            children,
            depth,
        }))
    }

    /// Node with neither payload nor children.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self
    {
        Self::make(kind, Contents::None, Vec::new())
    }

    #[must_use]
    pub fn with_text(kind: NodeKind, text: impl Into<String>) -> Self
    {
        Self::make(kind, Contents::Text(text.into()), Vec::new())
    }

    #[must_use]
    pub fn with_index(kind: NodeKind, index: u64) -> Self
    {
        Self::make(kind, Contents::Index(index), Vec::new())
    }

    #[must_use]
    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self
    {
        Self::make(kind, Contents::None, children)
    }

    #[must_use]
    pub fn with_child(kind: NodeKind, child: Node) -> Self
    {
        Self::make(kind, Contents::None, vec![child])
    }

    /// Convenience for the very common `Identifier("name")`.
    #[must_use]
    pub fn identifier(name: impl Into<String>) -> Self
    {
        Self::with_text(NodeKind::Identifier, name)
    }

    /// Convenience for `Module("name")`.
    #[must_use]
    pub fn module(name: impl Into<String>) -> Self
    {
        Self::with_text(NodeKind::Module, name)
    }

    pub fn kind(&self) -> NodeKind
    {
        self.0.kind
    }

    pub fn contents(&self) -> &Contents
    {
        &self.0.contents
    }

    pub fn text(&self) -> Option<&str>
    {
        match &self.0.contents {
            Contents::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn index(&self) -> Option<u64>
    {
        match self.0.contents {
            Contents::Index(index) => Some(index),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node]
    {
        &self.0.children
    }

    pub fn child(&self, index: usize) -> Option<&Node>
    {
        self.0.children.get(index)
    }

    /// Copy of this node with `child` appended.
    #[must_use]
    pub fn adding_child(&self, child: Node) -> Node
    {
        let mut children = self.0.children.clone();
        children.push(child);
        Self::make(self.0.kind, self.0.contents.clone(), children)
    }

    /// Same kind and same payload; children are not compared.
    pub fn is_similar(&self, other: &Node) -> bool
    {
        self.0.kind == other.0.kind && self.0.contents == other.0.contents
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Node) -> bool
    {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Length of the longest root-to-leaf path, fixed at construction.
    pub fn depth(&self) -> usize
    {
        self.0.depth
    }

    /// Find the first node (pre-order) matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&Node) -> bool) -> Option<&Node>
    {
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            if predicate(node) {
                return Some(node);
            }
            if depth < MAX_NODE_DEPTH {
                stack.extend(node.children().iter().rev().map(|child| (child, depth + 1)));
            }
        }
        None
    }

    /// Structural equality with an explicit work list.
    ///
    /// Trees deeper than [`MAX_NODE_DEPTH`] never compare equal.
    pub fn structurally_equal(&self, other: &Node) -> bool
    {
        let mut work = vec![(self, other, 1usize)];
        while let Some((lhs, rhs, depth)) = work.pop() {
            if lhs.ptr_eq(rhs) {
                continue;
            }
            if depth > MAX_NODE_DEPTH || !lhs.is_similar(rhs) || lhs.children().len() != rhs.children().len() {
                return false;
            }
            work.extend(
                lhs.children()
                    .iter()
                    .zip(rhs.children())
                    .map(|(l, r)| (l, r, depth + 1)),
            );
        }
        true
    }
}

impl PartialEq for Node
{
    fn eq(&self, other: &Self) -> bool
    {
        self.structurally_equal(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fn dump(node: &Node, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result
        {
            write!(f, "{:indent$}{:?}", "", node.kind(), indent = indent * 2)?;
            match node.contents() {
                Contents::Text(text) => write!(f, " {text:?}")?,
                Contents::Index(index) => write!(f, " {index}")?,
                Contents::None => {}
            }
            writeln!(f)?;
            if indent >= MAX_NODE_DEPTH {
                return Ok(());
            }
            for child in node.children() {
                dump(child, f, indent + 1)?;
            }
            Ok(())
        }
        writeln!(f)?;
        dump(self, f, 0)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn outer_inner() -> Node
    {
        let outer = Node::with_children(NodeKind::Structure, vec![Node::module("M"), Node::identifier("Outer")]);
        Node::with_children(NodeKind::Class, vec![outer, Node::identifier("Inner")])
    }

    #[test]
    fn test_similarity_ignores_children()
    {
        let a = Node::with_children(NodeKind::Structure, vec![Node::identifier("A")]);
        let b = Node::with_children(NodeKind::Structure, vec![Node::identifier("B")]);
        assert!(a.is_similar(&b));
        assert_ne!(a, b);
        assert!(!Node::with_text(NodeKind::Identifier, "x").is_similar(&Node::with_index(NodeKind::Identifier, 1)));
    }

    #[test]
    fn test_structural_equality()
    {
        assert_eq!(outer_inner(), outer_inner());
        let shared = outer_inner();
        assert!(shared.ptr_eq(&shared.clone()));
        assert!(!shared.ptr_eq(&outer_inner()));
    }

    #[test]
    fn test_adding_child_leaves_original_untouched()
    {
        let base = Node::new(NodeKind::TypeList);
        let grown = base.adding_child(Node::identifier("A"));
        assert!(base.children().is_empty());
        assert_eq!(grown.children().len(), 1);
    }

    #[test]
    fn test_depth_and_find()
    {
        let tree = outer_inner();
        assert_eq!(tree.depth(), 3);
        assert_eq!(Node::identifier("x").depth(), 1);
        let found = tree.find(|node| node.kind() == NodeKind::Module).unwrap();
        assert_eq!(found.text(), Some("M"));
    }

    #[test]
    fn test_equality_stops_at_depth_cap()
    {
        let mut lhs = Node::identifier("leaf");
        let mut rhs = Node::identifier("leaf");
        for _ in 0..(MAX_NODE_DEPTH + 8) {
            lhs = Node::with_child(NodeKind::Type, lhs);
            rhs = Node::with_child(NodeKind::Type, rhs);
        }
        assert!(!lhs.structurally_equal(&rhs));
        assert!(lhs.structurally_equal(&lhs.clone()));
    }
}
