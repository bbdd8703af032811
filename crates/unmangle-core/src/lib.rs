//! # unmangle-core
//!
//! Decoding of compact symbolic mangled names and of the context
//! descriptors that compiled images carry for their types.
//!
//! This crate provides:
//! - Identifier word-substitution encoding and decoding
//! - Punycode for non-ASCII identifiers
//! - A demangler producing symbol [`Node`] trees, with a seam for symbolic
//!   references embedded in the text
//! - Mangled names read straight out of image bytes
//! - A resolver that walks context descriptors up to their module and
//!   builds the qualified path, bounded against cycles
//!
//! ## Images
//!
//! Everything that reads binary data goes through [`ImageReader`].
//! [`MachOImage`] reads 64-bit little-endian Mach-O files;
//! [`MemoryImage`] is a plain byte buffer for tests and tools.
//!
//! ## Example
//!
//! ```rust
//! use unmangle_core::{demangle_symbol, MemoryImage, ContextResolver, ResolverConfig};
//!
//! let node = demangle_symbol("$s4main3FooV", None, true).unwrap();
//! assert_eq!(node.to_string(), "main.Foo");
//!
//! let mut image = MemoryImage::new(0x40);
//! image.put_u32(0x00, 0).put_relative(0x08, 0x20).put_c_str(0x20, "main");
//! let resolver = ContextResolver::new(&image, ResolverConfig::default());
//! let module = resolver.decode_context_path(0x00).unwrap().unwrap();
//! assert_eq!(module.to_string(), "main");
//! ```

pub mod config;
pub mod context;
pub mod cursor;
pub mod demangler;
pub mod error;
pub mod image;
pub mod index;
pub mod mangled_name;
pub mod node;
pub mod print;
pub mod punycode;
pub mod resolver;
pub mod substitution;
pub mod symbolic;
pub mod tables;
pub mod words;

pub use config::ResolverConfig;
pub use demangler::{demangle_symbol, demangle_type, Demangler};
pub use error::{Result, UnmangleError};
pub use image::{ImageReader, MachOImage, MemoryImage};
pub use index::{ContextIndex, SkipReason};
pub use mangled_name::{parse_symbolic_byte_stream, MangledName, MangledNameKind};
pub use node::{Node, NodeKind};
pub use resolver::{ContextResolver, ResolutionCache};
pub use symbolic::{Directness, SymbolicReferenceKind, SymbolicResolver};
pub use words::{decode_identifier, encode_identifier, WordTable};
