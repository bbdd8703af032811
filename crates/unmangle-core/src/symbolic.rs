//! Symbolic reference kinds and the resolver seam used by the demangler.

use crate::error::{Result, UnmangleError};
use crate::node::Node;

/// What an embedded reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolicReferenceKind
{
    /// A context descriptor.
    Context,
    /// An accessor function returning metadata.
    AccessorFunctionReference,
    UniqueExtendedExistentialTypeShape,
    NonUniqueExtendedExistentialTypeShape,
    /// An Objective-C protocol record.
    ObjectiveCProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directness
{
    Direct,
    Indirect,
}

impl SymbolicReferenceKind
{
    /// Classify a control byte.
    pub fn from_byte(byte: u8) -> Result<(Self, Directness)>
    {
        Ok(match byte {
            0x01 => (Self::Context, Directness::Direct),
            0x02 => (Self::Context, Directness::Indirect),
            0x09 => (Self::AccessorFunctionReference, Directness::Direct),
            0x0A => (Self::UniqueExtendedExistentialTypeShape, Directness::Indirect),
            0x0B => (Self::NonUniqueExtendedExistentialTypeShape, Directness::Direct),
            0x0C => (Self::ObjectiveCProtocol, Directness::Direct),
            other => return Err(UnmangleError::UnsupportedReferenceKind(other)),
        })
    }
}

/// Supplies the node for each symbolic reference met while demangling.
///
/// `index` counts references from zero in the order they appear in the
/// text, matching [`MangledName::lookup`](crate::mangled_name::MangledName::lookup).
/// Returning `None` fails the demangle.
pub trait SymbolicResolver
{
    fn resolve(&self, kind: SymbolicReferenceKind, directness: Directness, index: usize) -> Option<Node>;
}

/// Fixed answers by index, for callers that resolved everything up front.
impl SymbolicResolver for Vec<Option<Node>>
{
    fn resolve(&self, _kind: SymbolicReferenceKind, _directness: Directness, index: usize) -> Option<Node>
    {
        self.get(index).cloned().flatten()
    }
}
