//! Plain-text rendering of symbol trees.
//!
//! Only one style is supported: fully qualified, dot-separated names.

use std::fmt::{self, Write as _};

use crate::node::{Node, NodeKind, MAX_NODE_DEPTH};

struct Printer<'f, 'a>
{
    out: &'f mut fmt::Formatter<'a>,
}

impl Printer<'_, '_>
{
    fn child(&mut self, node: &Node, index: usize, depth: usize) -> fmt::Result
    {
        match node.child(index) {
            Some(child) => self.node(child, depth + 1),
            None => Ok(()),
        }
    }

    fn join(&mut self, nodes: &[Node], separator: &str, depth: usize) -> fmt::Result
    {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.out.write_str(separator)?;
            }
            self.node(node, depth + 1)?;
        }
        Ok(())
    }

    fn generic_param_name(&mut self, node: &Node) -> fmt::Result
    {
        let depth = node.child(0).and_then(Node::index).unwrap_or(0);
        let index = node.child(1).and_then(Node::index).unwrap_or(0);
        let letter = char::from(b'A' + (index % 26) as u8);
        self.out.write_char(letter)?;
        if index >= 26 {
            write!(self.out, "{}", index / 26)?;
        }
        if depth > 0 {
            write!(self.out, "{depth}")?;
        }
        Ok(())
    }

    fn requirements(&mut self, signature: &Node, depth: usize) -> fmt::Result
    {
        self.out.write_str(" where ")?;
        self.join(signature.children(), ", ", depth)
    }

    fn node(&mut self, node: &Node, depth: usize) -> fmt::Result
    {
        if depth > MAX_NODE_DEPTH {
            return self.out.write_str("...");
        }

        match node.kind() {
            NodeKind::Global => self.join(node.children(), " ", depth),
            NodeKind::Type | NodeKind::TypeMangling | NodeKind::TupleElement | NodeKind::ReturnType => {
                self.child(node, 0, depth)
            }
            NodeKind::Module
            | NodeKind::Identifier
            | NodeKind::PrefixOperator
            | NodeKind::InfixOperator
            | NodeKind::PostfixOperator => self.out.write_str(node.text().unwrap_or_default()),
            NodeKind::Number | NodeKind::Index => write!(self.out, "{}", node.index().unwrap_or_default()),
            NodeKind::Class | NodeKind::Structure | NodeKind::Enum | NodeKind::Protocol | NodeKind::TypeAlias => {
                if node.children().len() >= 2 {
                    self.child(node, 0, depth)?;
                    self.out.write_char('.')?;
                    self.child(node, 1, depth)
                } else {
                    self.child(node, 0, depth)
                }
            }
            NodeKind::PrivateDeclName => match node.children() {
                [discriminator, name] => {
                    self.out.write_char('(')?;
                    self.node(name, depth + 1)?;
                    self.out.write_str(" in ")?;
                    self.node(discriminator, depth + 1)?;
                    self.out.write_char(')')
                }
                _ => self.out.write_str("(private)"),
            },
            NodeKind::LocalDeclName => {
                self.out.write_char('(')?;
                self.child(node, 1, depth)?;
                let number = node.child(0).and_then(Node::index).unwrap_or_default();
                write!(self.out, " #{})", number + 1)
            }
            NodeKind::Extension => {
                self.out.write_str("(extension in ")?;
                self.child(node, 0, depth)?;
                self.out.write_str("):")?;
                self.child(node, 1, depth)?;
                match node.child(2) {
                    Some(signature) if !signature.children().is_empty() => self.requirements(signature, depth),
                    _ => Ok(()),
                }
            }
            NodeKind::BoundGenericClass | NodeKind::BoundGenericStructure | NodeKind::BoundGenericEnum => {
                self.child(node, 0, depth)?;
                self.out.write_char('<')?;
                self.child(node, 1, depth)?;
                self.out.write_char('>')
            }
            NodeKind::TypeList => self.join(node.children(), ", ", depth),
            NodeKind::DependentGenericParamType => self.generic_param_name(node),
            NodeKind::DependentGenericSignature => {
                self.out.write_char('<')?;
                self.join(node.children(), ", ", depth)?;
                self.out.write_char('>')
            }
            NodeKind::DependentGenericSameTypeRequirement => {
                self.child(node, 0, depth)?;
                self.out.write_str(" == ")?;
                self.child(node, 1, depth)
            }
            NodeKind::DependentGenericConformanceRequirement => {
                self.child(node, 0, depth)?;
                self.out.write_str(": ")?;
                self.child(node, 1, depth)
            }
            NodeKind::DependentGenericLayoutRequirement => {
                self.child(node, 0, depth)?;
                let layout = node.child(1).and_then(Node::text);
                self.out.write_str(if layout == Some("C") { ": AnyObject" } else { ": _" })
            }
            NodeKind::OpaqueReturnTypeOf => {
                self.out.write_str("opaque return type of ")?;
                self.child(node, 0, depth)
            }
            NodeKind::Function => {
                self.child(node, 0, depth)?;
                self.out.write_char('.')?;
                self.child(node, 1, depth)?;
                self.child(node, 2, depth)
            }
            NodeKind::FunctionType => {
                self.child(node, 0, depth)?;
                self.out.write_str(" -> ")?;
                self.child(node, 1, depth)
            }
            NodeKind::ArgumentTuple => {
                let is_tuple = node
                    .child(0)
                    .and_then(|ty| ty.child(0))
                    .is_some_and(|inner| inner.kind() == NodeKind::Tuple);
                if is_tuple {
                    self.child(node, 0, depth)
                } else {
                    self.out.write_char('(')?;
                    self.child(node, 0, depth)?;
                    self.out.write_char(')')
                }
            }
            NodeKind::Tuple => {
                self.out.write_char('(')?;
                self.join(node.children(), ", ", depth)?;
                self.out.write_char(')')
            }
            NodeKind::AnonymousContext => self.out.write_str("(anonymous context)"),
            NodeKind::NominalTypeDescriptor => self.prefixed("nominal type descriptor for ", node, depth),
            NodeKind::ProtocolDescriptor => self.prefixed("protocol descriptor for ", node, depth),
            NodeKind::OpaqueTypeDescriptor => self.prefixed("opaque type descriptor for ", node, depth),
            NodeKind::AnonymousDescriptor => self.prefixed("anonymous descriptor ", node, depth),
            NodeKind::ExtensionDescriptor => self.prefixed("extension descriptor ", node, depth),
            NodeKind::ModuleDescriptor => self.prefixed("module descriptor ", node, depth),
            NodeKind::UniqueExtendedExistentialTypeShapeSymbolicReference
            | NodeKind::NonUniqueExtendedExistentialTypeShapeSymbolicReference => {
                self.prefixed("existential shape for ", node, depth)
            }
            NodeKind::AccessorFunctionReference => {
                write!(self.out, "accessor function at 0x{:x}", node.index().unwrap_or_default())
            }
            NodeKind::OpaqueTypeDescriptorSymbolicReference => {
                write!(self.out, "opaque type at 0x{:x}", node.index().unwrap_or_default())
            }
            NodeKind::EmptyList | NodeKind::FirstElementMarker => Ok(()),
        }
    }

    fn prefixed(&mut self, prefix: &str, node: &Node, depth: usize) -> fmt::Result
    {
        self.out.write_str(prefix)?;
        self.child(node, 0, depth)
    }
}

impl fmt::Display for Node
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        Printer { out: f }.node(self, 1)
    }
}
