//! Bucket table: maps a 32-bit hash to an element index by open
//! addressing, without tombstones.
//!
//! Every slot records `location` (element index + 1, or 0 when empty) and
//! the full hash of the element it points at. The slot selected by the top
//! `bits` bits of a hash is that hash's *home*. A home slot also counts how
//! many live slots anywhere in the table share it as home; a probe walks
//! forward from the home and stops once it has seen that many, so a miss on
//! an unused home costs a single read.
//!
//! Because homes come from the top bits, doubling the table only splits
//! each home into two neighbours.

use crate::config::MIN_BUCKET_BITS;
use std::collections::TryReserveError;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Bucket {
    location: u32,
    hash: u32,
    collisions: u32,
}

/// Outcome of a probe for a key.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Probe {
    /// The key lives in `slot` and points at element `index`.
    Found { slot: usize, index: usize },
    /// The key is absent; `slot` is the first empty slot at or after `home`.
    Vacant { home: usize, slot: usize },
}

#[inline]
pub(crate) fn home_bucket(hash: u32, bits: u32) -> usize {
    if bits == 0 {
        0
    } else {
        (hash >> (32 - bits)) as usize
    }
}

/// Element count at which a table of `2^bits` buckets must grow before the
/// next insert. At `max_bits` growth is impossible and only one empty
/// bucket is kept so probes terminate.
pub(crate) fn threshold_for(bits: u32, percent: u8, max_bits: u32) -> usize {
    let count = 1usize << bits;
    if bits >= max_bits {
        return count - 1;
    }
    let t = (count as u64 * u64::from(percent) / 100) as usize;
    t.clamp(1, count - 1)
}

/// Smallest bucket table that holds `capacity` elements below its
/// threshold, capped at `max_bits`.
pub(crate) fn bits_for(capacity: usize, percent: u8, max_bits: u32) -> u32 {
    let mut bits = MIN_BUCKET_BITS;
    while bits < max_bits && threshold_for(bits, percent, max_bits) < capacity {
        bits += 1;
    }
    bits
}

fn zeroed(count: usize) -> Result<Vec<Bucket>, TryReserveError> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(count)?;
    slots.resize(count, Bucket::default());
    Ok(slots)
}

pub(crate) struct BucketTable {
    slots: Vec<Bucket>,
    bits: u32,
    mask: usize,
    threshold: usize,
    percent: u8,
    max_bits: u32,
}

impl BucketTable {
    /// The smallest table. Allocates a handful of slots infallibly.
    pub(crate) fn minimal(percent: u8, max_bits: u32) -> Self {
        let bits = MIN_BUCKET_BITS;
        Self {
            slots: vec![Bucket::default(); 1 << bits],
            bits,
            mask: (1 << bits) - 1,
            threshold: threshold_for(bits, percent, max_bits),
            percent,
            max_bits,
        }
    }

    pub(crate) fn with_bits(bits: u32, percent: u8, max_bits: u32) -> Result<Self, TryReserveError> {
        let count = 1usize << bits;
        Ok(Self {
            slots: zeroed(count)?,
            bits,
            mask: count - 1,
            threshold: threshold_for(bits, percent, max_bits),
            percent,
            max_bits,
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    pub(crate) fn threshold(&self) -> usize {
        self.threshold
    }

    pub(crate) fn percent(&self) -> u8 {
        self.percent
    }

    pub(crate) fn max_bits(&self) -> u32 {
        self.max_bits
    }

    #[inline]
    fn home(&self, hash: u32) -> usize {
        home_bucket(hash, self.bits)
    }

    #[inline]
    fn next(&self, slot: usize) -> usize {
        (slot + 1) & self.mask
    }

    fn next_empty(&self, mut slot: usize) -> usize {
        while self.slots[slot].location != 0 {
            slot = self.next(slot);
        }
        slot
    }

    /// Looks up `hash`; `eq` decides whether the element at an index is the
    /// one wanted. Returns `(slot, index)`.
    pub(crate) fn find(&self, hash: u32, mut eq: impl FnMut(usize) -> bool) -> Option<(usize, usize)> {
        let home = self.home(hash);
        let mut remaining = self.slots[home].collisions;
        let mut slot = home;
        while remaining > 0 {
            let b = &self.slots[slot];
            if b.location != 0 && self.home(b.hash) == home {
                remaining -= 1;
                let index = (b.location - 1) as usize;
                if b.hash == hash && eq(index) {
                    return Some((slot, index));
                }
            }
            slot = self.next(slot);
        }
        None
    }

    /// Like [`find`](Self::find), but also locates where the key would be
    /// registered when it is absent.
    pub(crate) fn probe(&self, hash: u32, mut eq: impl FnMut(usize) -> bool) -> Probe {
        let home = self.home(hash);
        let mut remaining = self.slots[home].collisions;
        let mut slot = home;
        let mut vacant = None;
        while remaining > 0 {
            let b = &self.slots[slot];
            if b.location == 0 {
                vacant.get_or_insert(slot);
            } else if self.home(b.hash) == home {
                remaining -= 1;
                let index = (b.location - 1) as usize;
                if b.hash == hash && eq(index) {
                    return Probe::Found { slot, index };
                }
            }
            slot = self.next(slot);
        }
        let slot = match vacant {
            Some(slot) => slot,
            None => self.next_empty(slot),
        };
        Probe::Vacant { home, slot }
    }

    /// Where an absent `hash` would be registered.
    pub(crate) fn vacancy(&self, hash: u32) -> (usize, usize) {
        let home = self.home(hash);
        (home, self.next_empty(home))
    }

    /// Registers element `index` in a slot returned by a probe.
    pub(crate) fn occupy(&mut self, home: usize, slot: usize, hash: u32, index: usize) {
        debug_assert_eq!(self.slots[slot].location, 0);
        debug_assert_eq!(self.home(hash), home);
        self.slots[home].collisions += 1;
        let b = &mut self.slots[slot];
        b.location = index as u32 + 1;
        b.hash = hash;
    }

    /// Registers element `index`, which must not be present yet.
    pub(crate) fn register(&mut self, hash: u32, index: usize) {
        let (home, slot) = self.vacancy(hash);
        self.occupy(home, slot, hash, index);
    }

    /// Empties `slot` and releases its claim on its home.
    pub(crate) fn unregister(&mut self, slot: usize) {
        let home = self.home(self.slots[slot].hash);
        self.slots[slot] = Bucket {
            collisions: self.slots[slot].collisions,
            ..Bucket::default()
        };
        self.slots[home].collisions -= 1;
    }

    /// Points the entry for element `from` (hashing to `hash`) at `to`.
    /// Returns false if no such entry exists.
    pub(crate) fn relocate(&mut self, hash: u32, from: usize, to: usize) -> bool {
        match self.find(hash, |i| i == from) {
            Some((slot, _)) => {
                self.slots[slot].location = to as u32 + 1;
                true
            }
            None => false,
        }
    }

    /// Replaces the table with an empty one of `2^bits` slots. On failure
    /// the current table is kept.
    pub(crate) fn resize(&mut self, bits: u32) -> Result<(), TryReserveError> {
        let count = 1usize << bits;
        self.slots = zeroed(count)?;
        self.bits = bits;
        self.mask = count - 1;
        self.threshold = threshold_for(bits, self.percent, self.max_bits);
        Ok(())
    }

    /// Empties the table and registers each hash in order, the i-th hash
    /// belonging to element i.
    pub(crate) fn rebuild(&mut self, hashes: impl Iterator<Item = u32>) {
        self.clear();
        for (index, hash) in hashes.enumerate() {
            self.register(hash, index);
        }
    }

    /// Bulk copy from a table of the same size.
    pub(crate) fn copy_slots(&mut self, other: &BucketTable) {
        debug_assert_eq!(self.bits, other.bits);
        self.slots.copy_from_slice(&other.slots);
    }

    pub(crate) fn clear(&mut self) {
        self.slots.fill(Bucket::default());
    }

    /// Checks the per-home collision counts against the live slots.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self, live: usize) {
        let mut per_home = vec![0u32; self.len()];
        let mut occupied = 0;
        for b in &self.slots {
            if b.location != 0 {
                occupied += 1;
                per_home[self.home(b.hash)] += 1;
            }
        }
        assert_eq!(occupied, live, "live slot count");
        assert!(live < self.len(), "at least one bucket must stay empty");
        for (home, count) in per_home.into_iter().enumerate() {
            assert_eq!(self.slots[home].collisions, count, "collision count of home {home}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(bits: u32) -> BucketTable {
        BucketTable::with_bits(bits, 90, 31).unwrap()
    }

    /// Hash whose home is `home` in a table of `bits` bits, with `low` as a
    /// tie-breaker in the low bits.
    fn hash_at(home: u32, bits: u32, low: u32) -> u32 {
        (home << (32 - bits)) | low
    }

    #[test]
    fn home_uses_top_bits() {
        assert_eq!(home_bucket(0xF000_0000, 4), 15);
        assert_eq!(home_bucket(0x0FFF_FFFF, 4), 0);
        assert_eq!(home_bucket(0x8000_0000, 1), 1);
        assert_eq!(home_bucket(0xFFFF_FFFF, 0), 0);
    }

    #[test]
    fn thresholds() {
        assert_eq!(threshold_for(2, 90, 31), 3);
        assert_eq!(threshold_for(4, 90, 31), 14);
        assert_eq!(threshold_for(10, 90, 31), 921);
        assert_eq!(threshold_for(3, 1, 31), 1);
        // At the cap only one bucket is kept free.
        assert_eq!(threshold_for(4, 50, 4), 15);
        assert_eq!(bits_for(0, 90, 31), MIN_BUCKET_BITS);
        assert_eq!(bits_for(8, 90, 31), 4);
        assert_eq!(bits_for(1000, 90, 31), 11);
        assert_eq!(bits_for(1 << 20, 90, 6), 6);
    }

    /// Invariant: an unused home answers a lookup without scanning.
    #[test]
    fn miss_on_unused_home() {
        let mut t = table(4);
        t.register(hash_at(3, 4, 1), 0);
        let mut calls = 0;
        assert!(t.find(hash_at(5, 4, 1), |_| {
            calls += 1;
            true
        })
        .is_none());
        assert_eq!(calls, 0);
    }

    /// Invariant: colliding homes spill forward and every member stays
    /// reachable; the probe for an absent key stops after `collisions`
    /// members.
    #[test]
    fn collisions_spill_forward() {
        let mut t = table(3);
        let h = |low| hash_at(7, 3, low);
        t.register(h(1), 0);
        t.register(h(2), 1);
        t.register(h(3), 2);
        t.check_invariants(3);
        // Home 7 wraps around to slots 0 and 1.
        assert_eq!(t.find(h(1), |i| i == 0), Some((7, 0)));
        assert_eq!(t.find(h(2), |i| i == 1), Some((0, 1)));
        assert_eq!(t.find(h(3), |i| i == 2), Some((1, 2)));
        assert_eq!(t.find(h(4), |_| true), None);

        // A key homed at 0 has to step over the spilled entry.
        t.register(hash_at(0, 3, 9), 3);
        assert_eq!(t.find(hash_at(0, 3, 9), |i| i == 3), Some((2, 3)));
        t.check_invariants(4);
    }

    #[test]
    fn probe_reports_first_hole() {
        let mut t = table(3);
        let h = |low| hash_at(2, 3, low);
        t.register(h(1), 0);
        t.register(h(2), 1);
        t.register(h(3), 2);
        let (slot, _) = t.find(h(2), |i| i == 1).unwrap();
        t.unregister(slot);
        t.check_invariants(2);
        assert_eq!(t.probe(h(9), |_| false), Probe::Vacant { home: 2, slot });
        assert_eq!(
            t.probe(h(3), |i| i == 2),
            Probe::Found { slot: 4, index: 2 }
        );
    }

    /// Invariant: equal hashes are told apart by `eq` only.
    #[test]
    fn identical_hashes_use_eq() {
        let mut t = table(2);
        t.register(42, 0);
        t.register(42, 1);
        assert_eq!(t.find(42, |i| i == 1).map(|(_, i)| i), Some(1));
        assert_eq!(t.find(42, |i| i == 0).map(|(_, i)| i), Some(0));
        assert!(t.relocate(42, 1, 5));
        assert_eq!(t.find(42, |i| i == 5).map(|(_, i)| i), Some(5));
        assert!(!t.relocate(42, 1, 6));
    }

    #[test]
    fn resize_and_rebuild() {
        let mut t = table(2);
        let hashes = [0x1000_0000u32, 0x5000_0000, 0x9000_0000];
        t.rebuild(hashes.iter().copied());
        t.check_invariants(3);
        t.resize(5).unwrap();
        assert_eq!(t.len(), 32);
        assert_eq!(t.threshold(), 28);
        t.rebuild(hashes.iter().copied());
        t.check_invariants(3);
        for (i, &h) in hashes.iter().enumerate() {
            assert_eq!(t.find(h, |j| j == i).map(|(_, j)| j), Some(i));
        }
    }
}
