//! Mutation: insertion walking, sibling-chain upkeep, and the conflict
//! resolver that relocates a child set when two nodes contend for a slot.

use crate::{Trie, TrieError, NO_VALUE, VALUE_LIMIT};

impl Trie {
    /// Inserts `key` with `value`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// [`TrieError::InvalidValue`] when `value` is outside `[0, VALUE_LIMIT)`;
    /// the trie is left untouched.
    pub fn insert(&mut self, key: &[u8], value: i32) -> Result<(), TrieError> {
        if !(0..VALUE_LIMIT).contains(&value) {
            return Err(TrieError::InvalidValue);
        }
        let slot = self.value_slot(key);
        self.array[slot].base = value;
        Ok(())
    }

    /// Adds `delta` to `key`'s value, inserting the key with value `delta`
    /// if it was absent.
    pub fn update(&mut self, key: &[u8], delta: i32) {
        let slot = self.value_slot(key);
        let held = self.array[slot].base;
        self.array[slot].base = if held == VALUE_LIMIT { delta } else { held + delta };
    }

    /// Removes `key` and frees every slot no longer on a path to another key.
    ///
    /// # Errors
    ///
    /// [`TrieError::NoKey`] when the key is not stored (including the absent
    /// empty key).
    pub fn erase(&mut self, key: &[u8]) -> Result<(), TrieError> {
        let to = self.jump(key, 0)?;

        // Locate the slot carrying the value; nothing to erase otherwise.
        let held = self.array[to].base;
        let mut e = if self.reduced && held >= 0 && held != VALUE_LIMIT {
            to
        } else {
            let b = self.base(to);
            if b < 0 {
                return Err(TrieError::NoKey);
            }
            let t = b as usize; // terminal child at base ^ 0
            if t >= self.size
                || self.array[t].check != to as i32
                || self.array[t].base < 0
            {
                return Err(TrieError::NoKey);
            }
            t
        };

        // Free slots upward until an ancestor still has another child.
        loop {
            let from = self.array[e].check as usize;
            let b = self.base(from);
            let label = (b ^ e as i32) as u8;
            if self.ninfo[e].sibling != 0 || self.ninfo[from].child != label {
                self.pop_sibling(from, b, label);
                self.push_enode(e);
                break;
            }
            self.push_enode(e);
            if from == 0 {
                // The last key is gone; restore the root's initial state so
                // later conflicts never consult a stale chain.
                self.ninfo[0].child = 0;
                self.array[0].base = if self.reduced { -1 } else { 0 };
                break;
            }
            e = from;
        }
        Ok(())
    }

    /// Walks `key` from the root with [`Trie::follow`], then returns the id
    /// of the slot that holds (or will hold) the key's value.
    fn value_slot(&mut self, key: &[u8]) -> usize {
        let mut from = 0;
        for &k in key {
            if self.reduced {
                let held = self.array[from].base;
                if held >= 0 && held != VALUE_LIMIT {
                    // The node keeps its value inline; push the value down
                    // into a terminal child before branching below it.
                    let to = self.follow(from, 0);
                    self.array[to].base = held;
                }
            }
            from = self.follow(from, k);
        }
        if self.reduced && self.array[from].base >= 0 {
            from
        } else {
            self.follow(from, 0)
        }
    }

    /// Moves from `from` along `label`, materialising the edge if needed.
    pub(crate) fn follow(&mut self, from: usize, label: u8) -> usize {
        let base = self.base(from);
        let to = base ^ label as i32;
        // Slot 0 belongs to the root and never reads as claimable even
        // though its check is negative.
        if base < 0 || (to != 0 && self.array[to as usize].check < 0) {
            let has_child = base >= 0 && {
                let head = (base ^ self.ninfo[from].child as i32) as usize;
                self.array[head].check == from as i32
            };
            let to = self.pop_enode(base, from, label);
            self.push_sibling(from, to as i32 ^ label as i32, label, has_child);
            to
        } else if self.array[to as usize].check != from as i32 {
            self.resolve(from, base, label)
        } else {
            to as usize
        }
    }

    /// Splices `label` into `from`'s ascending child chain. `base` is
    /// `from`'s (possibly just rewritten) XOR offset; `has_child` says the
    /// chain is non-empty, resolving the zero-head ambiguity.
    fn push_sibling(&mut self, from: usize, base: i32, label: u8, has_child: bool) {
        let head = self.ninfo[from].child;
        if has_child && label > head {
            let mut slot = (base ^ head as i32) as usize;
            while self.ninfo[slot].sibling != 0 && self.ninfo[slot].sibling < label {
                slot = (base ^ self.ninfo[slot].sibling as i32) as usize;
            }
            self.ninfo[(base ^ label as i32) as usize].sibling = self.ninfo[slot].sibling;
            self.ninfo[slot].sibling = label;
        } else {
            self.ninfo[(base ^ label as i32) as usize].sibling = head;
            self.ninfo[from].child = label;
        }
    }

    /// Unlinks `label` from `from`'s child chain. The label must be present.
    fn pop_sibling(&mut self, from: usize, base: i32, label: u8) {
        if self.ninfo[from].child == label {
            self.ninfo[from].child = self.ninfo[(base ^ label as i32) as usize].sibling;
            return;
        }
        let mut slot = (base ^ self.ninfo[from].child as i32) as usize;
        while self.ninfo[slot].sibling != label {
            slot = (base ^ self.ninfo[slot].sibling as i32) as usize;
        }
        self.ninfo[slot].sibling = self.ninfo[(base ^ label as i32) as usize].sibling;
    }

    /// Walks two sibling chains in lockstep, starting from the labels `c_n`
    /// and `c_p`. Returns `true` iff the `p` chain outlasts the `n` chain,
    /// i.e. the incumbent has the larger child set and the newcomer should
    /// be the one to move.
    fn consult(&self, base_n: i32, base_p: i32, mut c_n: u8, mut c_p: u8) -> bool {
        loop {
            c_n = self.ninfo[(base_n ^ c_n as i32) as usize].sibling;
            c_p = self.ninfo[(base_p ^ c_p as i32) as usize].sibling;
            if c_n == 0 || c_p == 0 {
                return c_p != 0;
            }
        }
    }

    /// Collects `from`'s child labels in ascending order, optionally merging
    /// in `label` at its sorted position. A zero chain head is included only
    /// when it is a real terminal child. At most 257 entries.
    fn collect_children(
        &self,
        from: usize,
        base: i32,
        mut c: u8,
        label: u8,
        merge_label: bool,
    ) -> Vec<u8> {
        let mut children = Vec::with_capacity(257);
        if c == 0 {
            if self.array[base as usize].check == from as i32 {
                children.push(0);
            }
            c = self.ninfo[base as usize].sibling;
        }
        while c != 0 && c <= label {
            children.push(c);
            c = self.ninfo[(base ^ c as i32) as usize].sibling;
        }
        if merge_label {
            children.push(label);
        }
        while c != 0 {
            children.push(c);
            c = self.ninfo[(base ^ c as i32) as usize].sibling;
        }
        children
    }

    /// Resolves the collision at `base_n ^ label_n`: relocates the smaller
    /// of the two contending child sets to a fresh base and returns the id
    /// now holding the new edge.
    ///
    /// This is the only place that rewrites `check` on live slots. When the
    /// incumbent moves, the relocated set may contain `from_n` itself, in
    /// which case the local `from_n` is renamed on the fly.
    fn resolve(&mut self, mut from_n: usize, base_n: i32, label_n: u8) -> usize {
        let to_pn = (base_n ^ label_n as i32) as usize;
        let incumbent = self.array[to_pn].check;

        // A negative incumbent is the root slot: nobody to consult, so the
        // newcomer's children move. Otherwise relocate the smaller set.
        let flag = incumbent < 0 || {
            let from_p = incumbent as usize;
            self.consult(
                base_n,
                self.base(from_p),
                self.ninfo[from_n].child,
                self.ninfo[from_p].child,
            )
        };

        let (from, base_f, children) = if flag {
            let ch =
                self.collect_children(from_n, base_n, self.ninfo[from_n].child, label_n, true);
            (from_n, base_n, ch)
        } else {
            let from_p = incumbent as usize;
            let base_p = self.base(from_p);
            let ch = self.collect_children(from_p, base_p, self.ninfo[from_p].child, 255, false);
            (from_p, base_p, ch)
        };

        let place = if children.len() == 1 {
            self.find_place()
        } else {
            self.find_places(&children)
        };
        let base = place as i32 ^ children[0] as i32;

        if flag && children[0] == label_n {
            self.ninfo[from].child = label_n;
        }
        self.set_base(from, base);

        for i in 0..children.len() {
            let label = children[i];
            let to = self.pop_enode(base, from, label);
            let new_to = (base_f ^ label as i32) as usize;

            self.ninfo[to].sibling = if i == children.len() - 1 {
                0
            } else {
                children[i + 1]
            };
            if flag && new_to == to_pn {
                continue; // the edge being inserted: fresh slot, nothing to move
            }

            self.array[to].base = self.array[new_to].base;
            let occupied = if self.reduced {
                self.array[to].base < 0
            } else {
                self.array[to].base >= 0
            };
            if occupied {
                // The moved node has children of its own; point them at the
                // new slot. A value-carrying terminal never passes the check
                // test, so it is left alone.
                let b = self.base(to);
                let head = self.ninfo[new_to].child;
                let first = (b ^ head as i32) as usize;
                if first < self.size && self.array[first].check == new_to as i32 {
                    self.ninfo[to].child = head;
                    self.array[first].check = to as i32;
                    let mut c = self.ninfo[first].sibling;
                    while c != 0 {
                        let slot = (b ^ c as i32) as usize;
                        self.array[slot].check = to as i32;
                        c = self.ninfo[slot].sibling;
                    }
                }
            }

            if !flag && new_to == from_n {
                from_n = to; // our own parent was part of the moved set
            }
            if !flag && new_to == to_pn {
                // The vacated slot becomes the edge we came to insert.
                let has_child = self.ninfo[from_n].child != 0
                    || self.array[base_n as usize].check == from_n as i32;
                self.push_sibling(from_n, base_n, label_n, has_child);
                self.ninfo[new_to].child = 0;
                self.array[new_to].base = if self.reduced {
                    VALUE_LIMIT
                } else if label_n == 0 {
                    0
                } else {
                    NO_VALUE
                };
                self.array[new_to].check = from_n as i32;
            } else {
                self.push_enode(new_to);
            }
        }

        if flag {
            (base ^ label_n as i32) as usize
        } else {
            to_pn
        }
    }
}
