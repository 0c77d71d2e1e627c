//! An updatable double-array trie with zero dependencies.
//!
//! This crate provides [`Trie`], an ordered in-memory dictionary from byte
//! keys to non-negative integer values, stored as a double array (Aoe, "An
//! efficient implementation of trie structures") with incremental update in
//! the style of Yoshinaga and Kitsuregawa's cedar. Keys can be inserted,
//! updated, and erased in place; lookups, single-step descent, common-prefix
//! and predictive searches are all supported. Keys are opaque byte sequences,
//! so UTF-8 strings enumerate in code-point order for free.
//!
//! # Quick start
//!
//! ```
//! use cedrus::Trie;
//!
//! let mut trie = Trie::new();
//! trie.insert(b"north", 0)?;
//! trie.insert(b"northeast", 1)?;
//! trie.insert(b"norway", 2)?;
//!
//! assert_eq!(trie.get(b"northeast")?, 1);
//! assert_eq!(trie.exact_match(b"northwest"), None);
//!
//! // Every stored key that `"northeast"` extends, shortest first.
//! let ids: Vec<usize> = trie.prefix_match(b"northeast").collect();
//! assert_eq!(ids.len(), 2);
//!
//! trie.erase(b"north")?;
//! assert_eq!(trie.exact_match(b"north"), None);
//! # Ok::<(), cedrus::TrieError>(())
//! ```
//!
//! # Encoding notes
//!
//! The terminator label `0` shares the label space with real `NUL` key
//! bytes. A key whose last byte is `NUL` is fine on its own, but a key set
//! containing both some key `k` and `k` plus a trailing `NUL` collides on
//! one slot and is unsupported.

#![warn(missing_docs)]

mod block;
mod node;
mod search;
mod update;

#[cfg(test)]
mod proptests;

use node::{Block, Node, NodeInfo};

pub use search::{PrefixMatch, PrefixPredict};

/// Exclusive upper bound for stored values.
///
/// [`Trie::insert`] accepts values in `[0, VALUE_LIMIT)`. The limit itself is
/// reserved: reduced-mode slots use it to mean "allocated, no value yet".
pub const VALUE_LIMIT: i32 = i32::MAX;

/// Internal "no value" sentinel; never returned from the public API.
pub(crate) const NO_VALUE: i32 = -1;

/// Errors that can occur during trie operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieError {
    /// The supplied value is outside `[0, VALUE_LIMIT)`.
    InvalidValue,
    /// The traversal fell off the trie: no stored key matches.
    NoKey,
    /// The node exists but carries no value.
    NoValue,
}

impl std::fmt::Display for TrieError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrieError::InvalidValue => write!(f, "value out of range"),
            TrieError::NoKey => write!(f, "no such key"),
            TrieError::NoValue => write!(f, "no value at node"),
        }
    }
}

impl std::error::Error for TrieError {}

/// An updatable double-array trie.
///
/// Three parallel arrays indexed by node id hold the whole structure: the
/// `base`/`check` double array, the sibling/child chains, and per-block
/// free-list metadata. All links are encoded as indices, so the trie owns no
/// interior pointers and ids stay valid across growth.
///
/// The `reduced` flavour (see [`Trie::reduced`]) stores a leaf's value
/// directly in its parent slot until the parent needs to branch, saving one
/// slot per key with a unique suffix. Both flavours expose identical
/// dictionary behaviour.
pub struct Trie {
    pub(crate) array: Vec<Node>,
    pub(crate) ninfo: Vec<NodeInfo>,
    pub(crate) blocks: Vec<Block>,
    /// Per-free-count global reject bounds, indexed by a block's `num`.
    pub(crate) reject: [i32; 257],
    pub(crate) head_open: usize,
    pub(crate) head_closed: usize,
    pub(crate) head_full: usize,
    pub(crate) capacity: usize,
    pub(crate) size: usize,
    pub(crate) reduced: bool,
}

impl Trie {
    /// Creates an empty trie using the standard encoding.
    pub fn new() -> Self {
        Self::with_mode(false)
    }

    /// Creates an empty trie using the reduced encoding.
    ///
    /// Purely a space optimisation; observable behaviour matches [`Trie::new`].
    pub fn reduced() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(reduced: bool) -> Self {
        let mut array = vec![Node::default(); 256];
        // The root. Its check stays -1 forever; slot 0 is never allocated
        // nor part of a free ring.
        array[0] = Node {
            base: if reduced { -1 } else { 0 },
            check: -1,
        };
        // Slots 1..=255 form block 0's free ring: base links backwards,
        // check links forwards, both negated.
        for i in 1..256 {
            array[i] = Node {
                base: -(i as i32 - 1),
                check: -(i as i32 + 1),
            };
        }
        array[1].base = -255;
        array[255].check = -1;

        let mut block0 = Block::fresh(1);
        block0.num = 255; // the root slot is not free

        let mut reject = [0i32; 257];
        for (k, r) in reject.iter_mut().enumerate() {
            *r = k as i32 + 1;
        }

        Trie {
            array,
            ninfo: vec![NodeInfo::default(); 256],
            blocks: vec![block0],
            reject,
            head_open: 0,
            head_closed: 0,
            head_full: 0,
            capacity: 256,
            size: 256,
            reduced,
        }
    }

    /// Returns `true` if this trie uses the reduced encoding.
    #[inline]
    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    /// The number of addressable slots (a multiple of 256).
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.size
    }

    /// The number of slots currently reserved, including unopened blocks.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Decodes the outgoing XOR offset of `id`.
    ///
    /// Negative means "no children": either the raw no-child sentinel in
    /// standard mode, or any value-carrying slot in reduced mode (the
    /// wrapping arithmetic maps the `VALUE_LIMIT` sentinel below zero too).
    #[inline]
    pub(crate) fn base(&self, id: usize) -> i32 {
        let b = self.array[id].base;
        if self.reduced {
            b.wrapping_add(1).wrapping_neg()
        } else {
            b
        }
    }

    /// Writes `base` as the outgoing XOR offset of `id`, mode-encoded.
    #[inline]
    pub(crate) fn set_base(&mut self, id: usize, base: i32) {
        self.array[id].base = if self.reduced { -base - 1 } else { base };
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trie_shape() {
        let t = Trie::new();
        assert_eq!(t.num_slots(), 256);
        assert_eq!(t.capacity(), 256);
        assert!(!t.is_reduced());
        assert_eq!(t.array[0].check, -1);
        assert_eq!(t.blocks[0].num, 255);
        assert_eq!(t.blocks[0].e_head, 1);
    }

    #[test]
    fn both_modes_decode_root_base_to_zero() {
        assert_eq!(Trie::new().base(0), 0);
        assert_eq!(Trie::reduced().base(0), 0);
    }

    #[test]
    fn base_decode_round_trip() {
        let mut t = Trie::reduced();
        t.set_base(0, 12345);
        assert_eq!(t.base(0), 12345);
        assert_eq!(t.array[0].base, -12346);

        let mut t = Trie::new();
        t.set_base(0, 12345);
        assert_eq!(t.base(0), 12345);
        assert_eq!(t.array[0].base, 12345);
    }

    #[test]
    fn value_limit_decodes_negative_in_reduced_mode() {
        let mut t = Trie::reduced();
        t.array[0].base = VALUE_LIMIT;
        assert!(t.base(0) < 0);
    }

    #[test]
    fn empty_trie_lookups() {
        let t = Trie::new();
        assert_eq!(t.get(b"anything"), Err(TrieError::NoKey));
        assert_eq!(t.get(b""), Err(TrieError::NoValue));
        assert_eq!(t.exact_match(b""), None);
    }

    #[test]
    fn error_display() {
        assert_eq!(TrieError::InvalidValue.to_string(), "value out of range");
        assert_eq!(TrieError::NoKey.to_string(), "no such key");
        assert_eq!(TrieError::NoValue.to_string(), "no value at node");
    }
}
