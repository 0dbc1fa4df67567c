//! Arena-backed set of sparse vectors with stable keys.

use super::sparse::{Nonzero, SvView};

/// Stable opaque handle to a member of an [`SvSet`].
///
/// Keys survive insertion and removal of other members and compaction of
/// the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(usize);

impl Key {
    pub fn id(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    off: usize,
    len: usize,
    max: usize,
}

/// A set of sparse vectors stored in one contiguous backing buffer.
///
/// Each member is an (offset, length, capacity) window into the buffer,
/// so compaction is an in-buffer sweep that rewrites offsets: no pointer
/// to member storage ever escapes, and keys stay stable through the
/// key-to-slot table. Members are addressed either by *slot* (the dense
/// 0..num numbering, which changes on removal) or by *key* (stable).
#[derive(Debug, Clone, Default)]
pub struct SvSet {
    buf: Vec<Nonzero>,
    win: Vec<Window>,
    slot2key: Vec<usize>,
    key2slot: Vec<i32>,
    free_keys: Vec<usize>,
    garbage: usize,
    compact_threshold: f64,
}

const ZERO_NZ: Nonzero = Nonzero { idx: 0, val: 0.0 };

impl SvSet {
    pub fn new() -> Self {
        Self {
            compact_threshold: 0.5,
            ..Default::default()
        }
    }

    /// Number of member vectors.
    pub fn num(&self) -> usize {
        self.win.len()
    }

    pub fn is_empty(&self) -> bool {
        self.win.is_empty()
    }

    /// Total nonzeros over all members.
    pub fn nnz(&self) -> usize {
        self.win.iter().map(|w| w.len).sum()
    }

    /// Fraction of the backing buffer that is dead space.
    pub fn garbage_fraction(&self) -> f64 {
        if self.buf.is_empty() {
            0.0
        } else {
            self.garbage as f64 / self.buf.len() as f64
        }
    }

    /// Set the free fraction above which the arena compacts itself.
    pub fn set_compact_threshold(&mut self, t: f64) {
        self.compact_threshold = t;
    }

    fn alloc_key(&mut self, slot: usize) -> Key {
        match self.free_keys.pop() {
            Some(id) => {
                self.key2slot[id] = slot as i32;
                Key(id)
            }
            None => {
                let id = self.key2slot.len();
                self.key2slot.push(slot as i32);
                Key(id)
            }
        }
    }

    /// Append a new member holding a copy of `sv`.
    pub fn add(&mut self, sv: SvView<'_>) -> Key {
        let off = self.buf.len();
        self.buf.extend(sv.iter().copied());
        let slot = self.win.len();
        self.win.push(Window {
            off,
            len: sv.size(),
            max: sv.size(),
        });
        let key = self.alloc_key(slot);
        self.slot2key.push(key.id());
        key
    }

    /// Create an empty member with room for `max` nonzeros, filled in
    /// afterwards via [`add_entry`](SvSet::add_entry).
    pub fn create(&mut self, max: usize) -> Key {
        let off = self.buf.len();
        self.buf.resize(off + max, ZERO_NZ);
        let slot = self.win.len();
        self.win.push(Window { off, len: 0, max });
        let key = self.alloc_key(slot);
        self.slot2key.push(key.id());
        key
    }

    /// Append one entry to member `slot`, relocating its window to the
    /// buffer tail when full.
    pub fn add_entry(&mut self, slot: usize, idx: usize, val: f64) {
        let w = self.win[slot];
        if w.len == w.max {
            let newmax = (w.max * 2).max(4);
            let newoff = self.buf.len();
            self.buf.resize(newoff + newmax, ZERO_NZ);
            self.buf.copy_within(w.off..w.off + w.len, newoff);
            self.garbage += w.max;
            self.win[slot] = Window {
                off: newoff,
                len: w.len,
                max: newmax,
            };
            self.maybe_compact();
        }
        let w = &mut self.win[slot];
        self.buf[w.off + w.len] = Nonzero { idx, val };
        w.len += 1;
    }

    /// Remove all entries of member `slot` whose index is `i`.
    pub fn remove_entry(&mut self, slot: usize, i: usize) {
        let w = &mut self.win[slot];
        let range = &mut self.buf[w.off..w.off + w.len];
        let mut k = 0;
        let mut len = w.len;
        while k < len {
            if range[k].idx == i {
                range[k] = range[len - 1];
                len -= 1;
            } else {
                k += 1;
            }
        }
        w.len = len;
    }

    /// Replace the index of every entry of member `slot` matching `from`
    /// by `to`.
    pub fn renumber_entry(&mut self, slot: usize, from: usize, to: usize) {
        let w = self.win[slot];
        for nz in &mut self.buf[w.off..w.off + w.len] {
            if nz.idx == from {
                nz.idx = to;
            }
        }
    }

    pub fn view(&self, slot: usize) -> SvView<'_> {
        let w = self.win[slot];
        SvView::new(&self.buf[w.off..w.off + w.len])
    }

    /// Mutable access to the entries of member `slot`.
    pub fn entries_mut(&mut self, slot: usize) -> &mut [Nonzero] {
        let w = self.win[slot];
        &mut self.buf[w.off..w.off + w.len]
    }

    pub fn key(&self, slot: usize) -> Key {
        Key(self.slot2key[slot])
    }

    /// Slot currently holding the member behind `key`.
    pub fn slot_of(&self, key: Key) -> usize {
        let s = self.key2slot[key.id()];
        debug_assert!(s >= 0, "key refers to a removed member");
        s as usize
    }

    pub fn has_key(&self, key: Key) -> bool {
        key.id() < self.key2slot.len() && self.key2slot[key.id()] >= 0
    }

    /// Remove member `slot`: the tail member is swapped into its place
    /// and re-stamped, so all keys of surviving members stay valid.
    pub fn remove(&mut self, slot: usize) {
        let last = self.win.len() - 1;
        let dead_key = self.slot2key[slot];
        self.garbage += self.win[slot].max;

        self.win[slot] = self.win[last];
        self.slot2key[slot] = self.slot2key[last];
        self.key2slot[self.slot2key[slot]] = slot as i32;

        self.win.pop();
        self.slot2key.pop();
        self.key2slot[dead_key] = -1;
        self.free_keys.push(dead_key);
        self.maybe_compact();
    }

    /// Remove the members named in `nums`. On return `perm[old] = new`
    /// slot of each survivor, `-1` for removed members. Survivors keep
    /// their relative order.
    pub fn remove_set(&mut self, nums: &[usize], perm: &mut [i32]) {
        debug_assert_eq!(perm.len(), self.win.len());
        perm.fill(0);
        for &i in nums {
            perm[i] = -1;
        }
        let mut next = 0usize;
        for old in 0..self.win.len() {
            if perm[old] < 0 {
                let dead_key = self.slot2key[old];
                self.garbage += self.win[old].max;
                self.key2slot[dead_key] = -1;
                self.free_keys.push(dead_key);
            } else {
                perm[old] = next as i32;
                self.win[next] = self.win[old];
                self.slot2key[next] = self.slot2key[old];
                self.key2slot[self.slot2key[next]] = next as i32;
                next += 1;
            }
        }
        self.win.truncate(next);
        self.slot2key.truncate(next);
        self.maybe_compact();
    }

    /// Renumber the entry indices of member `slot` through `perm`,
    /// dropping entries whose index maps to `-1`.
    pub fn permute_entries(&mut self, slot: usize, perm: &[i32]) {
        let w = &mut self.win[slot];
        let range = &mut self.buf[w.off..w.off + w.len];
        let mut kept = 0usize;
        for k in 0..w.len {
            let p = perm[range[k].idx];
            if p >= 0 {
                range[kept] = Nonzero {
                    idx: p as usize,
                    val: range[k].val,
                };
                kept += 1;
            }
        }
        w.len = kept;
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.win.clear();
        self.slot2key.clear();
        self.key2slot.clear();
        self.free_keys.clear();
        self.garbage = 0;
    }

    fn maybe_compact(&mut self) {
        if self.garbage_fraction() > self.compact_threshold {
            self.compact();
        }
    }

    /// Rewrite the backing buffer densely, preserving slots, keys, and
    /// per-member reserves.
    pub fn compact(&mut self) {
        let mut next = 0usize;
        for w in self.win.iter_mut() {
            if w.off != next {
                self.buf.copy_within(w.off..w.off + w.len, next);
            }
            w.off = next;
            w.max = w.len;
            next += w.len;
        }
        self.buf.truncate(next);
        self.garbage = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::SVector;

    fn sv(entries: &[(usize, f64)]) -> SVector {
        SVector::from_entries(entries)
    }

    #[test]
    fn test_add_and_view() {
        let mut set = SvSet::new();
        let k0 = set.add(sv(&[(0, 1.0), (2, 2.0)]).view());
        let k1 = set.add(sv(&[(1, -1.0)]).view());
        assert_eq!(set.num(), 2);
        assert_eq!(set.nnz(), 3);
        assert_eq!(set.slot_of(k0), 0);
        assert_eq!(set.slot_of(k1), 1);
        assert!((set.view(0).get(2) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_keys_survive_removal() {
        let mut set = SvSet::new();
        let _k0 = set.add(sv(&[(0, 1.0)]).view());
        let k1 = set.add(sv(&[(1, 1.0)]).view());
        let k2 = set.add(sv(&[(2, 1.0)]).view());

        set.remove(0); // tail (slot 2) swaps into slot 0
        assert_eq!(set.num(), 2);
        assert_eq!(set.slot_of(k2), 0);
        assert_eq!(set.slot_of(k1), 1);
        assert!((set.view(set.slot_of(k2)).get(2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_create_and_grow() {
        let mut set = SvSet::new();
        let k = set.create(1);
        let slot = set.slot_of(k);
        for i in 0..5 {
            set.add_entry(slot, i, i as f64);
        }
        assert_eq!(set.view(slot).size(), 5);
        assert!((set.view(slot).get(3) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_remove_set_permutation() {
        let mut set = SvSet::new();
        let keys: Vec<Key> = (0..5)
            .map(|i| set.add(sv(&[(i, 1.0 + i as f64)]).view()))
            .collect();
        let mut perm = vec![0i32; 5];
        set.remove_set(&[1, 3], &mut perm);
        assert_eq!(perm, vec![0, -1, 1, -1, 2]);
        assert_eq!(set.num(), 3);
        assert_eq!(set.slot_of(keys[4]), 2);
        assert!(!set.has_key(keys[1]));
        assert!((set.view(1).get(2) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_compaction_preserves_contents() {
        let mut set = SvSet::new();
        set.set_compact_threshold(10.0); // manual compaction only
        let mut keys = Vec::new();
        for i in 0..10 {
            keys.push(set.add(sv(&[(i, i as f64 + 1.0)]).view()));
        }
        for _ in 0..5 {
            set.remove(0);
        }
        assert!(set.garbage_fraction() > 0.0);
        set.compact();
        assert_eq!(set.garbage_fraction(), 0.0);
        for slot in 0..set.num() {
            let key = set.key(slot);
            let i = keys.iter().position(|k| *k == key).unwrap();
            assert!((set.view(slot).get(i) - (i as f64 + 1.0)).abs() < 1e-12);
        }
    }
}
