//! Element storage: an owned array that grows by doubling, or a fixed one
//! that is sized once and never reallocated.

use crate::error::{Result, TableError};

/// Smallest step an owned buffer grows by.
const MIN_GROW: usize = 4;

pub(crate) struct GrowBuf<T> {
    items: Vec<T>,
    limit: Option<usize>, // Some(n) for fixed storage of exactly n elements
}

impl<T> GrowBuf<T> {
    pub(crate) const fn new() -> Self {
        Self {
            items: Vec::new(),
            limit: None,
        }
    }

    pub(crate) fn owned(capacity: usize) -> Result<Self> {
        let mut items = Vec::new();
        items.try_reserve_exact(capacity)?;
        Ok(Self { items, limit: None })
    }

    pub(crate) fn fixed(capacity: usize) -> Result<Self> {
        let mut items = Vec::new();
        items.try_reserve_exact(capacity)?;
        Ok(Self {
            items,
            limit: Some(capacity),
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.limit.unwrap_or(self.items.capacity())
    }

    pub(crate) fn fixed_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Makes room for one more element.
    pub(crate) fn reserve_one(&mut self) -> Result<()> {
        if self.items.len() < self.capacity() {
            return Ok(());
        }
        match self.limit {
            Some(capacity) => Err(TableError::FixedCapacity { capacity }),
            None => {
                let additional = self.items.len().max(MIN_GROW);
                self.items.try_reserve_exact(additional)?;
                Ok(())
            }
        }
    }

    /// Makes room for `additional` more elements.
    pub(crate) fn reserve(&mut self, additional: usize) -> Result<()> {
        match self.limit {
            Some(capacity) if self.items.len().saturating_add(additional) > capacity => {
                Err(TableError::FixedCapacity { capacity })
            }
            Some(_) => Ok(()),
            None => Ok(self.items.try_reserve(additional)?),
        }
    }

    /// Appends after a successful `reserve_one`/`reserve`, so this never
    /// reallocates fixed storage.
    #[inline]
    pub(crate) fn push(&mut self, item: T) {
        debug_assert!(self.items.len() < self.capacity());
        self.items.push(item);
    }

    /// Removes the element at `index`, moving the last element into its
    /// place.
    pub(crate) fn swap_remove(&mut self, index: usize) -> T {
        self.items.swap_remove(index)
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_grows_by_doubling() {
        let mut b: GrowBuf<u32> = GrowBuf::owned(2).unwrap();
        for i in 0..100 {
            b.reserve_one().unwrap();
            b.push(i);
        }
        assert_eq!(b.len(), 100);
        assert!(b.capacity() >= 100);
        assert_eq!(b.fixed_limit(), None);
    }

    /// Invariant: fixed storage reports exactly its configured capacity and
    /// refuses to grow past it.
    #[test]
    fn fixed_refuses_growth() {
        let mut b: GrowBuf<u32> = GrowBuf::fixed(3).unwrap();
        assert_eq!(b.capacity(), 3);
        for i in 0..3 {
            b.reserve_one().unwrap();
            b.push(i);
        }
        assert_eq!(
            b.reserve_one(),
            Err(TableError::FixedCapacity { capacity: 3 })
        );
        assert!(b.reserve(1).is_err());
        assert!(b.reserve(0).is_ok());
    }

    #[test]
    fn swap_remove_moves_tail() {
        let mut b: GrowBuf<u32> = GrowBuf::owned(4).unwrap();
        for i in 0..4 {
            b.push(i);
        }
        assert_eq!(b.swap_remove(1), 1);
        assert_eq!(b.as_slice(), &[0, 3, 2]);
    }
}
