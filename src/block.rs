//! Block-level free-slot management.
//!
//! The id space is carved into 256-slot blocks. Every block sits on exactly
//! one of three cyclic doubly-linked lists: open (more than one free slot,
//! still worth probing), closed (one free slot left, or probing has given up
//! on it), and full (no free slots). Within a block the free slots form
//! their own cyclic ring, threaded through the `base`/`check` fields of the
//! free slots themselves as negated ids. Block 0 hosts the root and never
//! joins any list.

use crate::node::{Block, Node, NodeInfo};
use crate::{Trie, NO_VALUE, VALUE_LIMIT};

/// Failed placement scans a block tolerates before it is demoted from the
/// open list.
const MAX_TRIAL: i32 = 1;

/// Which of the three block lists a block operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockList {
    Open,
    Closed,
    Full,
}

impl Trie {
    #[inline]
    fn head(&self, list: BlockList) -> usize {
        match list {
            BlockList::Open => self.head_open,
            BlockList::Closed => self.head_closed,
            BlockList::Full => self.head_full,
        }
    }

    #[inline]
    fn set_head(&mut self, list: BlockList, idx: usize) {
        match list {
            BlockList::Open => self.head_open = idx,
            BlockList::Closed => self.head_closed = idx,
            BlockList::Full => self.head_full = idx,
        }
    }

    /// Unlinks block `idx` from `from`. `last` says the block is the list's
    /// only member, in which case the list just becomes empty.
    fn pop_block(&mut self, idx: usize, from: BlockList, last: bool) {
        if last {
            self.set_head(from, 0);
            return;
        }
        let Block { prev, next, .. } = self.blocks[idx];
        self.blocks[prev].next = next;
        self.blocks[next].prev = prev;
        if self.head(from) == idx {
            self.set_head(from, next);
        }
    }

    /// Links block `idx` into `to` and makes it the list head. An empty
    /// destination turns the block into a singleton cycle.
    fn push_block(&mut self, idx: usize, to: BlockList, empty: bool) {
        if empty {
            self.blocks[idx].prev = idx;
            self.blocks[idx].next = idx;
        } else {
            let head = self.head(to);
            let tail = self.blocks[head].prev;
            self.blocks[idx].prev = tail;
            self.blocks[idx].next = head;
            self.blocks[tail].next = idx;
            self.blocks[head].prev = idx;
        }
        self.set_head(to, idx);
    }

    /// Moves block `idx` between lists.
    pub(crate) fn transfer_block(&mut self, idx: usize, from: BlockList, to: BlockList) {
        let last = self.blocks[idx].next == idx;
        let empty = self.head(to) == 0;
        self.pop_block(idx, from, last);
        self.push_block(idx, to, empty);
    }

    /// Opens a new all-free block on the open list and returns its index.
    /// Doubles the arrays first when every reserved slot is in use.
    pub(crate) fn add_block(&mut self) -> usize {
        if self.size == self.capacity {
            self.capacity *= 2;
            self.array.resize(self.capacity, Node::default());
            self.ninfo.resize(self.capacity, NodeInfo::default());
            self.blocks.resize(self.capacity >> 8, Block::default());
        }

        let idx = self.size >> 8;
        self.blocks[idx] = Block::fresh(self.size);

        // Thread the 256 fresh slots into a cyclic free ring.
        let s = self.size as i32;
        self.array[self.size] = Node {
            base: -(s + 255),
            check: -(s + 1),
        };
        for i in self.size + 1..self.size + 255 {
            self.array[i] = Node {
                base: -(i as i32 - 1),
                check: -(i as i32 + 1),
            };
        }
        self.array[self.size + 255] = Node {
            base: -(s + 254),
            check: -s,
        };

        let empty = self.head_open == 0;
        self.push_block(idx, BlockList::Open, empty);
        self.size += 256;
        idx
    }

    /// Claims a slot. With `base >= 0` the caller demands the specific id
    /// `base ^ label`; otherwise any free id is chosen and the parent's base
    /// is rewritten to match. Returns the claimed id, initialised as a fresh
    /// child of `from`.
    pub(crate) fn pop_enode(&mut self, base: i32, from: usize, label: u8) -> usize {
        let e = if base < 0 {
            self.find_place()
        } else {
            (base ^ label as i32) as usize
        };
        let idx = e >> 8;

        self.blocks[idx].num -= 1;
        if self.blocks[idx].num == 0 {
            if idx != 0 {
                self.transfer_block(idx, BlockList::Closed, BlockList::Full);
            }
        } else {
            // Splice e out of the ring.
            let Node { base: b, check: c } = self.array[e];
            self.array[(-b) as usize].check = c;
            self.array[(-c) as usize].base = b;
            if e == self.blocks[idx].e_head {
                self.blocks[idx].e_head = (-c) as usize;
            }
            if idx != 0 && self.blocks[idx].num == 1 && self.blocks[idx].trial != MAX_TRIAL {
                self.transfer_block(idx, BlockList::Open, BlockList::Closed);
            }
        }

        if self.reduced {
            self.array[e] = Node {
                base: VALUE_LIMIT,
                check: from as i32,
            };
        } else {
            self.array[e] = Node {
                base: if label == 0 { 0 } else { NO_VALUE },
                check: from as i32,
            };
        }
        if base < 0 {
            self.set_base(from, e as i32 ^ label as i32);
        }
        e
    }

    /// Releases slot `e` back into its block's free ring, right after the
    /// ring head. Clears its sibling metadata.
    pub(crate) fn push_enode(&mut self, e: usize) {
        let idx = e >> 8;
        self.blocks[idx].num += 1;

        if self.blocks[idx].num == 1 {
            self.blocks[idx].e_head = e;
            self.array[e] = Node {
                base: -(e as i32),
                check: -(e as i32),
            };
            if idx != 0 {
                self.transfer_block(idx, BlockList::Full, BlockList::Closed);
            }
        } else {
            let prev = self.blocks[idx].e_head;
            let next = (-self.array[prev].check) as usize;
            self.array[e] = Node {
                base: -(prev as i32),
                check: -(next as i32),
            };
            self.array[prev].check = -(e as i32);
            self.array[next].base = -(e as i32);
            if idx != 0
                && (self.blocks[idx].num == 2 || self.blocks[idx].trial == MAX_TRIAL)
            {
                self.transfer_block(idx, BlockList::Closed, BlockList::Open);
            }
            self.blocks[idx].trial = 0;
        }

        let num = self.blocks[idx].num as usize;
        if self.blocks[idx].reject < self.reject[num] {
            self.blocks[idx].reject = self.reject[num];
        }
        self.ninfo[e] = NodeInfo::default();
    }

    /// Any single free id. Closed blocks are preferred so nearly-full blocks
    /// fill up instead of pinning a whole block on one stray slot.
    pub(crate) fn find_place(&mut self) -> usize {
        if self.head_closed != 0 {
            return self.blocks[self.head_closed].e_head;
        }
        if self.head_open != 0 {
            return self.blocks[self.head_open].e_head;
        }
        self.add_block() << 8
    }

    /// An id `e` such that `e ^ children[0] ^ c` is free for every label `c`
    /// in `children`. Scans the open list once; grows when nothing fits.
    pub(crate) fn find_places(&mut self, children: &[u8]) -> usize {
        if self.head_open != 0 {
            if let Some(e) = self.scan_open_list(children) {
                return e;
            }
        }
        self.add_block() << 8
    }

    /// One full pass over the open list. Every visited block that fails the
    /// probe tightens its `reject` bound, takes a trial strike, and is
    /// demoted to the closed list once the strikes run out.
    fn scan_open_list(&mut self, children: &[u8]) -> Option<usize> {
        let n = children.len() as i32;
        let tail = self.blocks[self.head_open].prev;
        let mut idx = self.head_open;
        loop {
            let Block { num, reject, .. } = self.blocks[idx];
            if num >= n && n < reject {
                if let Some(e) = self.probe_block(idx, children) {
                    return Some(e);
                }
            }

            self.blocks[idx].reject = n;
            let num = self.blocks[idx].num as usize;
            if n < self.reject[num] {
                self.reject[num] = n;
            }

            let next = self.blocks[idx].next;
            self.blocks[idx].trial += 1;
            if self.blocks[idx].trial == MAX_TRIAL {
                self.transfer_block(idx, BlockList::Open, BlockList::Closed);
            }
            if idx == tail {
                return None;
            }
            idx = next;
        }
    }

    /// Walks block `idx`'s free ring looking for an anchor whose XOR images
    /// of every child label are all free. Remembers the winning position as
    /// the new ring head.
    fn probe_block(&mut self, idx: usize, children: &[u8]) -> Option<usize> {
        let start = self.blocks[idx].e_head;
        let mut e = start;
        loop {
            let base = e as i32 ^ children[0] as i32;
            if children
                .iter()
                .all(|&c| self.array[(base ^ c as i32) as usize].check < 0)
            {
                self.blocks[idx].e_head = e;
                return Some(e);
            }
            e = (-self.array[e].check) as usize;
            if e == start {
                return None;
            }
        }
    }
}

#[cfg(test)]
impl Trie {
    /// Asserts every structural invariant. Test-only; O(size).
    pub(crate) fn check_invariants(&self) {
        self.check_block_invariants();

        // Every allocated node is reachable from its parent's chain under
        // exactly one label, and chains are strictly ascending.
        for id in 1..self.size {
            if self.array[id].check < 0 {
                continue;
            }
            let parent = self.array[id].check as usize;
            let b = self.base(parent);
            assert!(b >= 0, "child {} under base-less parent {}", id, parent);
            let label = (b ^ id as i32) as u8;
            assert_eq!((b ^ label as i32) as usize, id);
            let chain = self.chain(parent);
            assert_eq!(
                chain.iter().filter(|&&c| c == label).count(),
                1,
                "label {} of node {} not singly chained under {}",
                label,
                id,
                parent
            );
        }
        for id in 0..self.size {
            if id != 0 && self.array[id].check < 0 {
                continue;
            }
            let chain = self.chain(id);
            assert!(
                chain.windows(2).all(|w| w[0] < w[1]),
                "chain of {} not strictly ascending: {:?}",
                id,
                chain
            );
            for &c in &chain {
                let slot = (self.base(id) ^ c as i32) as usize;
                assert_eq!(self.array[slot].check, id as i32, "chain of {} lies", id);
            }
        }
    }

    /// The block-list and free-ring half of [`Trie::check_invariants`],
    /// usable when slots have been claimed outside a real trie walk.
    pub(crate) fn check_block_invariants(&self) {
        use std::collections::HashSet;

        assert_eq!(self.size % 256, 0);
        assert_eq!(self.capacity % 256, 0);
        assert!(self.size <= self.capacity);

        // Each block is on at most one list, and the lists are well-formed
        // cycles.
        let mut membership = vec![None; self.size >> 8];
        for (list, head) in [
            (BlockList::Open, self.head_open),
            (BlockList::Closed, self.head_closed),
            (BlockList::Full, self.head_full),
        ] {
            if head == 0 {
                continue;
            }
            let mut idx = head;
            loop {
                assert!(
                    membership[idx].is_none(),
                    "block {} appears on two lists",
                    idx
                );
                membership[idx] = Some(list);
                let next = self.blocks[idx].next;
                assert_eq!(self.blocks[next].prev, idx, "broken link at block {}", idx);
                idx = next;
                if idx == head {
                    break;
                }
            }
        }

        for k in 0..self.size >> 8 {
            let b = &self.blocks[k];
            let lo = k << 8;
            let free = (lo..lo + 256)
                .filter(|&i| i != 0 && self.array[i].check < 0)
                .count();
            assert_eq!(free as i32, b.num, "free count of block {}", k);

            if k == 0 {
                assert_eq!(membership[0], None, "block 0 must stay off the lists");
            } else if b.num == 0 {
                assert_eq!(membership[k], Some(BlockList::Full), "block {}", k);
            } else {
                assert!(
                    matches!(membership[k], Some(BlockList::Open) | Some(BlockList::Closed)),
                    "non-full block {} off the open/closed lists",
                    k
                );
            }

            // The ring visits exactly `num` distinct in-block free slots and
            // closes, with prev links mirroring the next links.
            if b.num > 0 {
                let mut seen = HashSet::new();
                let mut e = b.e_head;
                for _ in 0..b.num {
                    assert_eq!(e >> 8, k, "ring of block {} escaped the block", k);
                    assert!(self.array[e].check < 0, "ring hit allocated slot {}", e);
                    assert!(seen.insert(e), "ring of block {} revisited {}", k, e);
                    let next = (-self.array[e].check) as usize;
                    assert_eq!(
                        (-self.array[next].base) as usize,
                        e,
                        "prev link of {} disagrees",
                        next
                    );
                    e = next;
                }
                assert_eq!(e, b.e_head, "ring of block {} does not close", k);
            }
        }
    }

    /// The ordered child labels of `parent`, resolving the zero-head
    /// ambiguity through `check`.
    pub(crate) fn chain(&self, parent: usize) -> Vec<u8> {
        let b = self.base(parent);
        if b < 0 {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut c = self.ninfo[parent].child;
        if c == 0 {
            if (b as usize) >= self.size || self.array[b as usize].check != parent as i32 {
                return out;
            }
            out.push(0);
            c = self.ninfo[b as usize].sibling;
        }
        while c != 0 {
            assert!(out.len() <= 256, "runaway chain under {}", parent);
            out.push(c);
            c = self.ninfo[(b ^ c as i32) as usize].sibling;
        }
        out
    }
}
