//! HashTable: the open-addressing engine, generic over the element type.
//!
//! Elements live in a dense array in insertion order (modulo removals);
//! the bucket table maps hashes to array positions. Removal moves the last
//! element into the freed position and re-points its single bucket entry,
//! so the table never needs tombstones.

use crate::bucket::{bits_for, BucketTable, Probe};
use crate::buffer::GrowBuf;
use crate::config::{TableConfig, DEFAULT_REHASH_PERCENT, MAX_BUCKET_BITS};
use crate::element::{Element, Variant};
use crate::error::{Result, TableError};
use core::fmt;
use core::ops::{Bound, Range, RangeBounds};

/// What an insert did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Insert {
    /// A new element was appended at this array position.
    Added(usize),
    /// The key existed at this position; its value was overwritten.
    Replaced(usize),
}

pub struct HashTable<E> {
    buckets: BucketTable,
    elements: GrowBuf<E>,
    alloc_error: bool,
}

/// Clamps `range` to `0..len`.
fn clamp_range(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let lower = match range.start_bound() {
        Bound::Unbounded => 0,
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n.saturating_add(1),
    };
    let upper = match range.end_bound() {
        Bound::Unbounded => len,
        Bound::Included(&n) => n.saturating_add(1),
        Bound::Excluded(&n) => n,
    };
    let upper = upper.min(len);
    lower.min(upper)..upper
}

impl<E: Element> HashTable<E> {
    /// Creates an empty, growable table. Does not allocate element storage.
    pub fn new() -> Self {
        Self {
            buckets: BucketTable::minimal(DEFAULT_REHASH_PERCENT, MAX_BUCKET_BITS),
            elements: GrowBuf::new(),
            alloc_error: false,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(TableConfig::new().initial_capacity(capacity))
    }

    pub fn with_config(config: TableConfig) -> Result<Self> {
        let TableConfig {
            initial_capacity,
            rehash_percent,
            fixed,
            max_bucket_bits,
        } = config;
        let bits = bits_for(initial_capacity, rehash_percent, max_bucket_bits);
        let buckets = BucketTable::with_bits(bits, rehash_percent, max_bucket_bits)?;
        let elements = if fixed {
            if buckets.threshold() < initial_capacity {
                return Err(TableError::BucketLimit { bits });
            }
            GrowBuf::fixed(initial_capacity)?
        } else {
            GrowBuf::owned(initial_capacity)?
        };
        log::trace!(
            "new {:?} table: capacity {}, 2^{} buckets, fixed {}",
            E::VARIANT,
            initial_capacity,
            bits,
            fixed
        );
        Ok(Self {
            buckets,
            elements,
            alloc_error: false,
        })
    }

    /// The configuration this table was built with, with the current
    /// element capacity as initial capacity.
    pub fn config(&self) -> TableConfig {
        TableConfig::new()
            .initial_capacity(self.capacity())
            .rehash_percent(self.buckets.percent())
            .fixed(self.is_fixed())
            .max_bucket_bits(self.buckets.max_bits())
    }

    pub fn variant(&self) -> Variant {
        E::VARIANT
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.elements.capacity()
    }

    pub fn is_fixed(&self) -> bool {
        self.elements.fixed_limit().is_some()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Element count at which the next insert doubles the bucket table.
    pub fn rehash_threshold(&self) -> usize {
        self.buckets.threshold()
    }

    /// Whether an allocation-class failure happened since the flag was last
    /// cleared.
    pub fn alloc_error(&self) -> bool {
        self.alloc_error
    }

    pub fn clear_alloc_error(&mut self) {
        self.alloc_error = false;
    }

    /// Sets the allocation flag if `result` is an allocation-class failure.
    pub(crate) fn note<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_allocation_class() {
                log::debug!("{:?} table: {e}", E::VARIANT);
                self.alloc_error = true;
            }
        }
        result
    }

    fn find(&self, hash: u32, key: &E::Key) -> Option<(usize, usize)> {
        let elements = self.elements.as_slice();
        self.buckets
            .find(hash, |i| E::key_eq(elements[i].key(), key))
    }

    /// Inserts `key` with `value`, or overwrites the value if `key` is
    /// present.
    ///
    /// On error the table's contents are unchanged and the allocation flag
    /// is set.
    pub fn insert(&mut self, key: &E::Key, value: &E::Value) -> Result<Insert> {
        let result = self.insert_inner(key, value);
        self.note(result)
    }

    fn insert_inner(&mut self, key: &E::Key, value: &E::Value) -> Result<Insert> {
        let hash = E::hash_key(key);
        let elements = self.elements.as_slice();
        let probe = self
            .buckets
            .probe(hash, |i| E::key_eq(elements[i].key(), key));
        let (mut home, mut slot) = match probe {
            Probe::Found { index, .. } => {
                self.elements.as_mut_slice()[index].update_value(value)?;
                return Ok(Insert::Replaced(index));
            }
            Probe::Vacant { home, slot } => (home, slot),
        };

        self.elements.reserve_one()?;
        if self.len() >= self.buckets.threshold() {
            self.grow()?;
            (home, slot) = self.buckets.vacancy(hash);
        }
        let element = E::try_new(key, value)?;
        let index = self.len();
        self.elements.push(element);
        self.buckets.occupy(home, slot, hash, index);
        Ok(Insert::Added(index))
    }

    /// Doubles the bucket table and re-registers every element.
    fn grow(&mut self) -> Result<()> {
        if let Some(capacity) = self.elements.fixed_limit() {
            return Err(TableError::FixedCapacity { capacity });
        }
        let bits = self.buckets.bits() + 1;
        if bits > self.buckets.max_bits() {
            return Err(TableError::BucketLimit {
                bits: self.buckets.max_bits(),
            });
        }
        self.resize_buckets(bits)
    }

    fn resize_buckets(&mut self, bits: u32) -> Result<()> {
        self.buckets.resize(bits)?;
        self.rehash();
        log::trace!(
            "{:?} table: rehashed {} elements into 2^{} buckets",
            E::VARIANT,
            self.len(),
            bits
        );
        Ok(())
    }

    fn rehash(&mut self) {
        let elements = self.elements.as_slice();
        self.buckets
            .rebuild(elements.iter().map(|e| E::hash_key(e.key())));
    }

    /// Makes room for `additional` more elements without further
    /// reallocation or rehashing.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let result = self.reserve_inner(additional);
        self.note(result)
    }

    fn reserve_inner(&mut self, additional: usize) -> Result<()> {
        self.elements.reserve(additional)?;
        let wanted = self.len().saturating_add(additional);
        if wanted <= self.buckets.threshold() {
            return Ok(());
        }
        let bits = bits_for(wanted, self.buckets.percent(), self.buckets.max_bits());
        if bits == self.buckets.bits() {
            return Err(TableError::BucketLimit { bits });
        }
        self.resize_buckets(bits)?;
        if wanted > self.buckets.threshold() {
            return Err(TableError::BucketLimit { bits });
        }
        Ok(())
    }

    pub fn get(&self, key: &E::Key) -> Option<&E::Value> {
        self.index_of(key)
            .map(|i| self.elements.as_slice()[i].value())
    }

    pub fn get_key_value(&self, key: &E::Key) -> Option<(&E::Key, &E::Value)> {
        self.index_of(key).map(|i| {
            let e = &self.elements.as_slice()[i];
            (e.key(), e.value())
        })
    }

    /// Array position of `key`.
    pub fn index_of(&self, key: &E::Key) -> Option<usize> {
        self.find(E::hash_key(key), key).map(|(_, i)| i)
    }

    /// Key and value at array position `index`.
    pub fn get_index(&self, index: usize) -> Option<(&E::Key, &E::Value)> {
        self.elements
            .as_slice()
            .get(index)
            .map(|e| (e.key(), e.value()))
    }

    pub fn contains_key(&self, key: &E::Key) -> bool {
        self.index_of(key).is_some()
    }

    /// 1 if `key` is present, 0 otherwise.
    pub fn count(&self, key: &E::Key) -> usize {
        usize::from(self.contains_key(key))
    }

    /// Removes `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &E::Key) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Removes `key` and returns its element.
    ///
    /// The last element takes over the freed array position.
    pub fn remove_entry(&mut self, key: &E::Key) -> Option<E> {
        let hash = E::hash_key(key);
        let (slot, index) = self.find(hash, key)?;
        self.buckets.unregister(slot);
        let last = self.len() - 1;
        let removed = self.elements.swap_remove(index);
        if index != last {
            let moved = E::hash_key(self.elements.as_slice()[index].key());
            let relocated = self.buckets.relocate(moved, last, index);
            debug_assert!(relocated, "moved element must have a bucket entry");
        }
        Some(removed)
    }

    /// Drops every element, keeping both allocations.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.buckets.clear();
    }

    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            inner: self.elements.as_slice().iter(),
        }
    }

    /// Calls `f` on the elements in `range` (array order) until it returns
    /// false. Returns how many elements were visited.
    pub fn iterate<R, F>(&self, range: R, mut f: F) -> usize
    where
        R: RangeBounds<usize>,
        F: FnMut(&E::Key, &E::Value) -> bool,
    {
        let range = clamp_range(range, self.len());
        let mut visited = 0;
        for e in &self.elements.as_slice()[range] {
            visited += 1;
            if !f(e.key(), e.value()) {
                break;
            }
        }
        visited
    }

    /// Number of elements `iterate` would visit over `range` if the callback
    /// never stopped early.
    pub fn count_range<R: RangeBounds<usize>>(&self, range: R) -> usize {
        clamp_range(range, self.len()).len()
    }

    /// Deep copy with the same configuration.
    pub fn try_clone(&self) -> Result<Self> {
        let capacity = if self.is_fixed() {
            self.capacity()
        } else {
            self.len()
        };
        let mut copy = Self::with_config(self.config().initial_capacity(capacity))?;
        copy.copy_from(self)?;
        Ok(copy)
    }

    /// Replaces this table's contents with a deep copy of `src`, reusing
    /// this table's storage where it is large enough.
    ///
    /// If this table is fixed and too small, as many elements as fit are
    /// copied and `InsufficientSpace` is returned. On any error the table
    /// is left consistent, holding a prefix of `src`.
    pub fn copy_from(&mut self, src: &Self) -> Result<()> {
        let result = self.copy_from_inner(src);
        self.note(result)
    }

    fn copy_from_inner(&mut self, src: &Self) -> Result<()> {
        self.clear();
        let required = src.len();
        let room = match self.elements.fixed_limit() {
            Some(capacity) => required.min(capacity),
            None => {
                self.elements.reserve(required)?;
                let bits = bits_for(required, self.buckets.percent(), self.buckets.max_bits());
                if bits != self.buckets.bits() {
                    self.buckets.resize(bits)?;
                }
                required
            }
        };
        let room = room.min(self.buckets.threshold());

        let mut failure = None;
        for e in &src.elements.as_slice()[..room] {
            match e.try_clone() {
                Ok(copy) => self.elements.push(copy),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if self.len() == required && self.buckets.bits() == src.buckets.bits() {
            self.buckets.copy_slots(&src.buckets);
        } else {
            self.rehash();
        }
        log::trace!(
            "{:?} table: copied {} of {} elements{}",
            E::VARIANT,
            self.len(),
            required,
            if E::VARIANT.has_strings() { ", strings duplicated" } else { "" }
        );

        if let Some(err) = failure {
            return Err(err.into());
        }
        if self.len() < required {
            return Err(TableError::InsufficientSpace {
                copied: self.len(),
                required,
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.buckets.check_invariants(self.len());
        assert!(self.len() <= self.capacity());
        for (i, e) in self.elements.as_slice().iter().enumerate() {
            assert_eq!(self.index_of(e.key()), Some(i), "element {i} not reachable");
        }
    }
}

impl<E: Element> Default for HashTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for HashTable<E>
where
    E: Element,
    E::Key: fmt::Debug,
    E::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over `(key, value)` in array order.
pub struct Iter<'a, E> {
    inner: core::slice::Iter<'a, E>,
}

impl<'a, E: Element> Iterator for Iter<'a, E> {
    type Item = (&'a E::Key, &'a E::Value);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (e.key(), e.value()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<E: Element> ExactSizeIterator for Iter<'_, E> {}

impl<'a, E: Element> IntoIterator for &'a HashTable<E> {
    type Item = (&'a E::Key, &'a E::Value);
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
