//! Batch resolution of every context descriptor an image lists.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::image::ImageReader;
use crate::node::Node;
use crate::resolver::{ContextResolver, ResolutionCache};

/// Why a descriptor has no entry in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason
{
    /// The walk gave up: cycle, exhausted budget, or an unsupported shape.
    Unresolvable,
    /// Reading the image failed.
    Failed(String),
}

/// Fully qualified paths of all descriptors, keyed by file offset.
#[derive(Debug, Default)]
pub struct ContextIndex
{
    entries: BTreeMap<u64, Node>,
    skipped: Vec<(u64, SkipReason)>,
}

impl ContextIndex
{
    /// Resolve `offsets` in parallel with one cache shared by all workers.
    ///
    /// A failure on one descriptor is recorded and does not stop the others.
    pub fn build<R: ImageReader + ?Sized>(image: &R, offsets: &[u64], config: ResolverConfig) -> Self
    {
        let cache = ResolutionCache::new();
        let resolver = ContextResolver::new(image, config).with_cache(&cache);

        let results: Vec<(u64, Result<Option<Node>>)> = offsets
            .par_iter()
            .map(|&offset| (offset, resolver.decode_context_path(offset)))
            .collect();

        let mut index = Self::default();
        for (offset, result) in results {
            match result {
                Ok(Some(node)) => {
                    index.entries.insert(offset, node);
                }
                Ok(None) => {
                    debug!(offset, "skipping unresolvable descriptor");
                    index.skipped.push((offset, SkipReason::Unresolvable));
                }
                Err(err) => {
                    warn!(offset, error = %err, "failed to resolve descriptor");
                    index.skipped.push((offset, SkipReason::Failed(err.to_string())));
                }
            }
        }
        info!(
            resolved = index.entries.len(),
            skipped = index.skipped.len(),
            cached = cache.len(),
            "context index built"
        );
        index
    }

    pub fn entries(&self) -> impl Iterator<Item = (u64, &Node)>
    {
        self.entries.iter().map(|(offset, node)| (*offset, node))
    }

    pub fn get(&self, offset: u64) -> Option<&Node>
    {
        self.entries.get(&offset)
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Descriptors left out, in input order.
    pub fn skipped(&self) -> &[(u64, SkipReason)]
    {
        &self.skipped
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::image::MemoryImage;

    #[test]
    fn test_build_records_skips()
    {
        let mut image = MemoryImage::new(0x100);
        image.put_u32(0x00, 0).put_relative(0x08, 0x80).put_c_str(0x80, "Lib");
        image
            .put_u32(0x10, 17)
            .put_relative(0x14, 0x00)
            .put_relative(0x18, 0x90)
            .put_c_str(0x90, "Box");
        image.put_u32(0x20, 7);
        image.put_u32(0x30, 16).put_i32(0x34, 0x4000_0000);

        let index = ContextIndex::build(&image, &[0x10, 0x00, 0x20, 0x30], ResolverConfig::default());
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(0x10).unwrap().to_string(), "Lib.Box");
        assert_eq!(index.entries().map(|(offset, _)| offset).collect::<Vec<_>>(), vec![0x00, 0x10]);
        assert_eq!(index.skipped()[0], (0x20, SkipReason::Unresolvable));
        assert!(matches!(index.skipped()[1], (0x30, SkipReason::Failed(_))));
    }

    #[test]
    fn test_empty_index()
    {
        let image = MemoryImage::new(0);
        let index = ContextIndex::build(&image, &[], ResolverConfig::default());
        assert!(index.is_empty());
        assert!(index.skipped().is_empty());
    }
}
