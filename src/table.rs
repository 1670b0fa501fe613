//! Table: a hash table whose element variant is chosen at run time.
//!
//! Typed accessors take the element type as a parameter
//! (`table.insert::<I32I32>(&1, &2)`). Using an accessor for another
//! variant is not an error condition: it has no effect and yields the
//! empty result (`false`, `None`, `0`).

use crate::config::TableConfig;
use crate::element::{self, Element, Variant};
use crate::error::{Result, TableError};
use crate::hash_table::{HashTable, Insert};
use core::ops::RangeBounds;

pub enum Table {
    I32I32(HashTable<element::I32I32>),
    U32U32(HashTable<element::U32U32>),
    I64I64(HashTable<element::I64I64>),
    U64U64(HashTable<element::U64U64>),
    F64F64(HashTable<element::F64F64>),
    I64Str(HashTable<element::I64Str>),
    StrI64(HashTable<element::StrI64>),
    StrStr(HashTable<element::StrStr>),
    StrPtr(HashTable<element::StrPtr>),
    SetI32(HashTable<element::SetI32>),
    SetU32(HashTable<element::SetU32>),
    SetI64(HashTable<element::SetI64>),
    SetU64(HashTable<element::SetU64>),
    SetF64(HashTable<element::SetF64>),
    SetStr(HashTable<element::SetStr>),
}

/// Runs `$body` with `$t` bound to the typed table inside `$table`.
macro_rules! dispatch {
    ($table:expr, $t:ident => $body:expr) => {
        match $table {
            Table::I32I32($t) => $body,
            Table::U32U32($t) => $body,
            Table::I64I64($t) => $body,
            Table::U64U64($t) => $body,
            Table::F64F64($t) => $body,
            Table::I64Str($t) => $body,
            Table::StrI64($t) => $body,
            Table::StrStr($t) => $body,
            Table::StrPtr($t) => $body,
            Table::SetI32($t) => $body,
            Table::SetU32($t) => $body,
            Table::SetI64($t) => $body,
            Table::SetU64($t) => $body,
            Table::SetF64($t) => $body,
            Table::SetStr($t) => $body,
        }
    };
}

fn build<E: Element>(config: TableConfig) -> Result<Table> {
    HashTable::<E>::with_config(config).map(E::wrap)
}

impl Table {
    /// Allocates an empty table of `variant` with room for `capacity`
    /// elements.
    pub fn alloc(variant: Variant, capacity: usize) -> Result<Self> {
        Self::with_config(variant, TableConfig::new().initial_capacity(capacity))
    }

    pub fn with_config(variant: Variant, config: TableConfig) -> Result<Self> {
        match variant {
            Variant::I32I32 => build::<element::I32I32>(config),
            Variant::U32U32 => build::<element::U32U32>(config),
            Variant::I64I64 => build::<element::I64I64>(config),
            Variant::U64U64 => build::<element::U64U64>(config),
            Variant::F64F64 => build::<element::F64F64>(config),
            Variant::I64Str => build::<element::I64Str>(config),
            Variant::StrI64 => build::<element::StrI64>(config),
            Variant::StrStr => build::<element::StrStr>(config),
            Variant::StrPtr => build::<element::StrPtr>(config),
            Variant::SetI32 => build::<element::SetI32>(config),
            Variant::SetU32 => build::<element::SetU32>(config),
            Variant::SetI64 => build::<element::SetI64>(config),
            Variant::SetU64 => build::<element::SetU64>(config),
            Variant::SetF64 => build::<element::SetF64>(config),
            Variant::SetStr => build::<element::SetStr>(config),
        }
    }

    pub fn variant(&self) -> Variant {
        dispatch!(self, t => t.variant())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, t => t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        dispatch!(self, t => t.capacity())
    }

    pub fn is_fixed(&self) -> bool {
        dispatch!(self, t => t.is_fixed())
    }

    pub fn bucket_count(&self) -> usize {
        dispatch!(self, t => t.bucket_count())
    }

    pub fn config(&self) -> TableConfig {
        dispatch!(self, t => t.config())
    }

    pub fn alloc_error(&self) -> bool {
        dispatch!(self, t => t.alloc_error())
    }

    pub fn clear_alloc_error(&mut self) {
        dispatch!(self, t => t.clear_alloc_error())
    }

    /// Drops every element, keeping capacity.
    pub fn clear(&mut self) {
        dispatch!(self, t => t.clear())
    }

    /// Number of elements in `range` (array order), without visiting them.
    pub fn count_range<R: RangeBounds<usize>>(&self, range: R) -> usize {
        dispatch!(self, t => t.count_range(range))
    }

    pub fn as_typed<E: Element>(&self) -> Option<&HashTable<E>> {
        E::project(self)
    }

    pub fn as_typed_mut<E: Element>(&mut self) -> Option<&mut HashTable<E>> {
        E::project_mut(self)
    }

    /// Records an allocation-class failure on whichever table is active.
    fn note<T>(&mut self, result: Result<T>) -> Result<T> {
        dispatch!(self, t => t.note(result))
    }

    fn mismatch<E: Element>(&self) -> TableError {
        TableError::TypeMismatch {
            expected: E::VARIANT,
            found: self.variant(),
        }
    }

    /// Inserts or overwrites, reporting the reason for any failure.
    pub fn try_insert<E: Element>(&mut self, key: &E::Key, value: &E::Value) -> Result<Insert> {
        let err = self.mismatch::<E>();
        match E::project_mut(self) {
            Some(t) => t.insert(key, value),
            None => Err(err),
        }
    }

    /// Inserts or overwrites. False on a variant mismatch or allocation
    /// failure; see [`alloc_error`](Self::alloc_error) for the latter.
    pub fn insert<E: Element>(&mut self, key: &E::Key, value: &E::Value) -> bool {
        self.try_insert::<E>(key, value).is_ok()
    }

    pub fn get<E: Element>(&self, key: &E::Key) -> Option<&E::Value> {
        E::project(self)?.get(key)
    }

    /// Removes `key`; true if it was present.
    pub fn remove<E: Element>(&mut self, key: &E::Key) -> bool {
        E::project_mut(self).is_some_and(|t| t.remove(key))
    }

    pub fn count<E: Element>(&self, key: &E::Key) -> usize {
        E::project(self).map_or(0, |t| t.count(key))
    }

    /// Calls `f` on the elements in `range` until it returns false. Returns
    /// how many elements were visited; 0 on a variant mismatch.
    pub fn iterate<E, R, F>(&self, range: R, f: F) -> usize
    where
        E: Element,
        R: RangeBounds<usize>,
        F: FnMut(&E::Key, &E::Value) -> bool,
    {
        E::project(self).map_or(0, |t| t.iterate(range, f))
    }

    /// Independent deep copy.
    pub fn duplicate(&self) -> Result<Table> {
        dispatch!(self, t => t.try_clone().map(Table::from))
    }

    /// Makes `dst` a deep copy of `src`.
    ///
    /// A destination of another variant is replaced by a table of `src`'s
    /// variant with the destination's configuration. A fixed destination
    /// that is too small receives a prefix of `src` and the call returns
    /// `InsufficientSpace`.
    pub fn copy_into(dst: &mut Table, src: &Table) -> Result<()> {
        dispatch!(src, s => copy_typed(dst, s))
    }
}

fn copy_typed<E: Element>(dst: &mut Table, src: &HashTable<E>) -> Result<()> {
    if let Some(d) = E::project_mut(dst) {
        return d.copy_from(src);
    }
    log::trace!("replacing {:?} table with {:?}", dst.variant(), E::VARIANT);
    let config = dst.config();
    let config = if config.is_fixed() {
        config
    } else {
        config.initial_capacity(src.len())
    };
    let mut fresh = match HashTable::<E>::with_config(config) {
        Ok(t) => t,
        Err(e) => return dst.note(Err(e)),
    };
    let result = fresh.copy_from(src);
    *dst = E::wrap(fresh);
    result
}

impl<E: Element> From<HashTable<E>> for Table {
    fn from(table: HashTable<E>) -> Self {
        E::wrap(table)
    }
}

impl core::fmt::Debug for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Table")
            .field("variant", &self.variant())
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{I32I32, SetStr, StrI64, StrStr, U32U32};

    #[test]
    fn alloc_every_variant() {
        for v in Variant::ALL {
            let t = Table::alloc(v, 16).unwrap();
            assert_eq!(t.variant(), v);
            assert!(t.is_empty());
            assert!(t.capacity() >= 16);
        }
    }

    /// Invariant: accessors of another variant return the empty result and
    /// leave the table untouched.
    #[test]
    fn wrong_variant_is_harmless() {
        let mut t = Table::alloc(Variant::I32I32, 8).unwrap();
        assert!(t.insert::<I32I32>(&1, &1));
        assert!(!t.insert::<U32U32>(&1, &1));
        assert_eq!(
            t.try_insert::<U32U32>(&1, &1),
            Err(TableError::TypeMismatch {
                expected: Variant::U32U32,
                found: Variant::I32I32
            })
        );
        assert_eq!(t.get::<U32U32>(&1), None);
        assert_eq!(t.count::<U32U32>(&1), 0);
        assert!(!t.remove::<U32U32>(&1));
        assert_eq!(t.iterate::<U32U32, _, _>(.., |_, _| true), 0);
        assert!(t.as_typed::<U32U32>().is_none());
        assert!(!t.alloc_error(), "mismatch is not an allocation failure");
        assert_eq!(t.len(), 1);
        assert_eq!(t.get::<I32I32>(&1), Some(&1));
    }

    #[test]
    fn sets_and_string_maps() {
        let mut s = Table::alloc(Variant::SetStr, 4).unwrap();
        assert!(s.insert::<SetStr>(b"a", &()));
        assert!(s.insert::<SetStr>(b"a", &()));
        assert_eq!(s.len(), 1);
        assert_eq!(s.count::<SetStr>(b"a"), 1);
        assert_eq!(s.count::<SetStr>(b"b"), 0);

        let mut m = Table::alloc(Variant::StrI64, 4).unwrap();
        assert!(m.insert::<StrI64>(b"answer", &42));
        assert_eq!(m.get::<StrI64>(b"answer"), Some(&42));
        assert!(m.remove::<StrI64>(b"answer"));
        assert!(m.is_empty());
    }

    /// Invariant: copying across variants replaces the destination.
    #[test]
    fn copy_into_other_variant_replaces() {
        let mut src = Table::alloc(Variant::StrStr, 4).unwrap();
        src.insert::<StrStr>(b"k", b"v");
        let mut dst = Table::alloc(Variant::I32I32, 4).unwrap();
        dst.insert::<I32I32>(&1, &1);
        Table::copy_into(&mut dst, &src).unwrap();
        assert_eq!(dst.variant(), Variant::StrStr);
        assert_eq!(dst.get::<StrStr>(b"k"), Some(&b"v"[..]));
        assert_eq!(dst.get::<I32I32>(&1), None);
    }

    /// Invariant: references returned by typed lookups live as long as the
    /// table borrow, across further reads.
    #[test]
    fn lookups_borrow_from_the_table() {
        let mut t = Table::alloc(Variant::StrStr, 4).unwrap();
        t.insert::<StrStr>(b"a", &[b'x'; 100]);
        t.insert::<StrStr>(b"b", b"short");
        let long: &[u8] = t.get::<StrStr>(b"a").unwrap();
        let short: &[u8] = t.get::<StrStr>(b"b").unwrap();
        let typed = t.as_typed::<StrStr>().unwrap();
        assert_eq!(typed.get(b"a"), Some(long));
        assert_eq!((long.len(), short), (100, &b"short"[..]));
        assert_eq!(t.len(), 2);
    }

    fn overflow() -> TableError {
        let mut v: Vec<u8> = Vec::new();
        v.try_reserve(usize::MAX).unwrap_err().into()
    }

    /// Invariant: allocation-class failures raised outside the typed
    /// table still mark the destination; a mismatch does not.
    #[test]
    fn failures_mark_the_active_table() {
        let mut t = Table::alloc(Variant::StrStr, 4).unwrap();
        let mismatch = t.mismatch::<I32I32>();
        assert_eq!(t.note::<()>(Err(mismatch.clone())), Err(mismatch));
        assert!(!t.alloc_error());

        let err = overflow();
        assert_eq!(t.note::<()>(Err(err.clone())), Err(err));
        assert!(t.alloc_error());
        t.clear_alloc_error();
        assert!(!t.alloc_error());
    }

    /// Invariant: replacing a fixed destination too small for the source
    /// keeps the prefix that fits and raises the flag on the new table.
    #[test]
    fn copy_into_other_variant_fixed_partial() {
        let mut src = Table::alloc(Variant::SetStr, 8).unwrap();
        for k in [&b"a"[..], b"b", b"c", b"d", b"e"] {
            src.insert::<SetStr>(k, &());
        }
        let config = TableConfig::new().initial_capacity(2).fixed(true);
        let mut dst = Table::with_config(Variant::I32I32, config).unwrap();
        assert_eq!(
            Table::copy_into(&mut dst, &src),
            Err(TableError::InsufficientSpace {
                copied: 2,
                required: 5
            })
        );
        assert_eq!(dst.variant(), Variant::SetStr);
        assert!(dst.is_fixed());
        assert!(dst.alloc_error());
        assert_eq!(dst.len(), 2);
        assert_eq!(dst.count::<SetStr>(b"a") + dst.count::<SetStr>(b"b"), 2);
    }

    #[test]
    fn count_range_and_debug() {
        let mut t = Table::alloc(Variant::U32U32, 4).unwrap();
        for k in 0..6u32 {
            t.insert::<U32U32>(&k, &k);
        }
        assert_eq!(t.count_range(..), 6);
        assert_eq!(t.count_range(4..), 2);
        let dbg = format!("{t:?}");
        assert!(dbg.contains("U32U32") && dbg.contains("len: 6"));
    }
}
