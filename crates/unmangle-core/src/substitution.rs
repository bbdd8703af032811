//! # Substitutions
//!
//! Keys for the per-session substitution table, plus the helper that folds
//! consecutive substitutions into their compact forms.
//!
//! A [`SubstitutionEntry`] compares nodes in one of two modes:
//!
//! - **structural**: same kind and payload at every node, same children
//! - **identifier**: only the spelling matters; operator names are compared
//!   after [`translate_operator_char`]
//!
//! Both the hash and the equality walk use explicit work lists and stop at
//! [`MAX_NODE_DEPTH`].

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::node::{Contents, Node, NodeKind, MAX_NODE_DEPTH};
use crate::tables::translate_operator_char;

/// Upper bound for the `A<n>B` repeat count.
pub const MAX_REPEAT_COUNT: usize = 2048;

#[inline]
fn combine(hash: u64, value: u64) -> u64
{
    hash.wrapping_mul(33).wrapping_add(value)
}

fn hash_text(mut hash: u64, text: &str, translate: bool) -> u64
{
    for ch in text.chars() {
        let ch = if translate { translate_operator_char(ch) } else { ch };
        hash = combine(hash, u64::from(ch));
    }
    hash
}

fn identifier_hash(node: &Node) -> u64
{
    let hash = combine(0, NodeKind::Identifier as u64);
    hash_text(hash, node.text().unwrap_or_default(), node.kind().is_operator())
}

fn shallow_hash(node: &Node) -> u64
{
    let hash = combine(0, node.kind() as u64);
    match node.contents() {
        Contents::Index(index) => combine(hash, *index),
        Contents::Text(text) => hash_text(hash, text, false),
        Contents::None => hash,
    }
}

/// Post-order structural hash; subtrees below the depth cap are ignored.
fn structural_hash(root: &Node) -> u64
{
    enum Step<'a>
    {
        Enter(&'a Node, usize),
        Exit(&'a Node, usize),
    }

    let mut steps = vec![Step::Enter(root, 1)];
    let mut results: Vec<u64> = Vec::new();
    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(node, depth) => {
                let children = if depth < MAX_NODE_DEPTH { node.children() } else { &[] };
                steps.push(Step::Exit(node, children.len()));
                steps.extend(children.iter().rev().map(|child| Step::Enter(child, depth + 1)));
            }
            Step::Exit(node, child_count) => {
                let first_child = results.len() - child_count;
                let hash = results
                    .drain(first_child..)
                    .fold(shallow_hash(node), combine);
                results.push(hash);
            }
        }
    }
    results.pop().unwrap_or_default()
}

fn identifier_equals(lhs: &Node, rhs: &Node) -> bool
{
    if lhs.kind() == rhs.kind() && lhs.text() == rhs.text() {
        return true;
    }
    let (Some(lhs_text), Some(rhs_text)) = (lhs.text(), rhs.text()) else {
        return false;
    };
    if lhs_text.chars().count() != rhs_text.chars().count() {
        return false;
    }
    let spell = |node: &Node, ch: char| {
        if node.kind().is_operator() {
            translate_operator_char(ch)
        } else {
            ch
        }
    };
    lhs_text
        .chars()
        .zip(rhs_text.chars())
        .all(|(l, r)| spell(lhs, l) == spell(rhs, r))
}

/// A node wrapped for use as a substitution-table key.
#[derive(Debug, Clone)]
pub struct SubstitutionEntry
{
    node: Option<Node>,
    stored_hash: u64,
    treat_as_identifier: bool,
}

impl SubstitutionEntry
{
    #[must_use]
    pub fn new(node: Node, treat_as_identifier: bool) -> Self
    {
        let stored_hash = if treat_as_identifier {
            identifier_hash(&node)
        } else {
            structural_hash(&node)
        };
        Self {
            node: Some(node),
            stored_hash,
            treat_as_identifier,
        }
    }

    /// Entry with no node; equal only to other empty entries.
    #[must_use]
    pub fn empty() -> Self
    {
        Self {
            node: None,
            stored_hash: 0,
            treat_as_identifier: false,
        }
    }

    pub fn node(&self) -> Option<&Node>
    {
        self.node.as_ref()
    }

    pub fn stored_hash(&self) -> u64
    {
        self.stored_hash
    }

    pub fn treat_as_identifier(&self) -> bool
    {
        self.treat_as_identifier
    }

    /// Cheap pre-filter: same node object in the same mode.
    pub fn matches(&self, node: &Node, treat_as_identifier: bool) -> bool
    {
        self.treat_as_identifier == treat_as_identifier && self.node.as_ref().is_some_and(|own| own.ptr_eq(node))
    }
}

impl PartialEq for SubstitutionEntry
{
    fn eq(&self, other: &Self) -> bool
    {
        if self.stored_hash != other.stored_hash || self.treat_as_identifier != other.treat_as_identifier {
            return false;
        }
        match (&self.node, &other.node) {
            (None, None) => true,
            (Some(lhs), Some(rhs)) if self.treat_as_identifier => identifier_equals(lhs, rhs),
            (Some(lhs), Some(rhs)) => lhs.structurally_equal(rhs),
            _ => false,
        }
    }
}

impl Eq for SubstitutionEntry {}

impl Hash for SubstitutionEntry
{
    fn hash<H: Hasher>(&self, state: &mut H)
    {
        state.write_u64(self.stored_hash);
    }
}

/// Per-session table of substitutable nodes, indexed in insertion order.
#[derive(Debug, Default)]
pub struct SubstitutionTable
{
    entries: HashMap<SubstitutionEntry, usize>,
}

impl SubstitutionTable
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    pub fn find(&self, node: &Node, treat_as_identifier: bool) -> Option<usize>
    {
        self.entries
            .get(&SubstitutionEntry::new(node.clone(), treat_as_identifier))
            .copied()
    }

    /// Index of an equal entry, inserting `node` if there is none.
    ///
    /// Returns `(index, inserted)`.
    pub fn insert(&mut self, node: Node, treat_as_identifier: bool) -> (usize, bool)
    {
        let next = self.entries.len();
        let entry = SubstitutionEntry::new(node, treat_as_identifier);
        match self.entries.get(&entry) {
            Some(&index) => (index, false),
            None => {
                self.entries.insert(entry, next);
                (next, true)
            }
        }
    }
}

/// Folds consecutive substitutions written to a mangled-name buffer.
///
/// ```text
/// AB + C  ->  AbC
/// AB + B  ->  A2B
/// Si + i  ->  S2i
/// ```
#[derive(Debug, Clone, Default)]
pub struct SubstitutionMerging
{
    last_subst_position: usize,
    last_subst_size: usize,
    last_num_substs: usize,
    last_subst_is_standard: bool,
}

impl SubstitutionMerging
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Try to fold `subst` into the substitution that ends `buffer`.
    ///
    /// Returns `true` when `buffer` was rewritten. On `false` the caller
    /// writes `A<subst>` (or `S<subst>` when `is_standard`) itself.
    pub fn try_merge(&mut self, buffer: &mut String, subst: &str, is_standard: bool) -> bool
    {
        let follows_last = self.last_num_substs > 0
            && self.last_num_substs < MAX_REPEAT_COUNT
            && buffer.len() == self.last_subst_position + self.last_subst_size
            && self.last_subst_is_standard == is_standard;

        if follows_last {
            let last_subst = buffer
                .get(self.last_subst_position..)
                .unwrap_or_default()
                .trim_start_matches(|ch: char| ch.is_ascii_digit())
                .to_owned();

            if last_subst != subst && !is_standard {
                // AB + C -> AbC
                if let Some(last_char) = last_subst.chars().last() {
                    self.last_subst_position = buffer.len();
                    self.last_num_substs = 1;
                    buffer.pop();
                    buffer.push(last_char.to_ascii_lowercase());
                    buffer.push_str(subst);
                    self.last_subst_size = subst.len();
                    return true;
                }
            }

            if last_subst == subst {
                // AB + B -> A2B, S3i + i -> S4i
                self.last_num_substs += 1;
                buffer.truncate(self.last_subst_position);
                buffer.push_str(&self.last_num_substs.to_string());
                buffer.push_str(subst);
                self.last_subst_size = buffer.len() - self.last_subst_position;
                return true;
            }
        }

        // The caller is about to write the one-letter `A`/`S` prefix.
        self.last_subst_position = buffer.len() + 1;
        self.last_subst_size = subst.len();
        self.last_num_substs = 1;
        self.last_subst_is_standard = is_standard;
        false
    }

    /// Forget the last substitution, e.g. after writing non-substitution text.
    pub fn reset(&mut self)
    {
        self.last_num_substs = 0;
    }
}
