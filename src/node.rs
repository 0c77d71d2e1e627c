/// A slot in the double array.
///
/// Each slot is exactly 8 bytes (`#[repr(C)]`). Both fields are signed and
/// overloaded by allocation state:
/// - `base`: for an allocated node, the XOR offset of its children (reduced
///   mode stores `-(offset + 1)`, or the value itself for a leaf); for a free
///   slot, the negated id of the previous free slot in the same block.
/// - `check`: for an allocated node, the parent id; for a free slot, the
///   negated id of the next free slot in the same block.
///
/// A slot is free iff `check < 0`. The root (id 0) keeps `check == -1` as a
/// sentinel but is never part of any free ring.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Node {
    pub(crate) base: i32,
    pub(crate) check: i32,
}

/// Per-node sibling metadata, kept parallel to the slot array.
///
/// `child` is the smallest label among the node's children (`0` when the head
/// is the terminal child, or when there are no children at all; the two are
/// told apart through `check`). `sibling` is the next label under the same
/// parent, `0` at the end of the chain. Chains are kept strictly ascending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct NodeInfo {
    pub(crate) sibling: u8,
    pub(crate) child: u8,
}

/// Bookkeeping for one 256-slot block.
///
/// `prev`/`next` link the block into whichever of the three block lists
/// (open, closed, full) it currently inhabits. `e_head` is the entry point of
/// the block's internal free ring and is meaningless while `num == 0`.
/// `reject` is the smallest child-set size already known not to fit here;
/// `trial` counts failed placement scans since the last promotion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Block {
    pub(crate) prev: usize,
    pub(crate) next: usize,
    pub(crate) num: i32,
    pub(crate) reject: i32,
    pub(crate) trial: i32,
    pub(crate) e_head: usize,
}

impl Block {
    /// A brand-new block: every slot free, never probed.
    ///
    /// `reject` starts past the largest possible child set so the first scan
    /// always walks the whole ring before writing a real bound.
    pub(crate) fn fresh(e_head: usize) -> Self {
        Block {
            prev: 0,
            next: 0,
            num: 256,
            reject: 257,
            trial: 0,
            e_head,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn node_size_is_8_bytes() {
        assert_eq!(mem::size_of::<Node>(), 8);
    }

    #[test]
    fn node_info_size_is_2_bytes() {
        assert_eq!(mem::size_of::<NodeInfo>(), 2);
    }

    #[test]
    fn default_node_is_not_free() {
        // Freshly resized slots must not read as free until their block's
        // ring is initialised.
        let n = Node::default();
        assert!(n.check >= 0);
    }

    #[test]
    fn fresh_block() {
        let b = Block::fresh(512);
        assert_eq!(b.num, 256);
        assert_eq!(b.reject, 257);
        assert_eq!(b.trial, 0);
        assert_eq!(b.e_head, 512);
    }
}
