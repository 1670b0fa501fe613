//! Element types, one per supported key/value combination.
//!
//! The [`Element`] trait is the per-variant operation set the engine is
//! generic over: key hashing, key equality, key and value extraction, value
//! update, deep copy, and projection to and from the runtime-selected
//! [`Table`]. Destruction is `Drop`; string fields release their heap
//! buffers through [`SsoStr`]/[`SsoPair`].
//!
//! Strings are byte strings (`[u8]`); any byte sequence is accepted.

use crate::hash::{canonical_f64_bits, hash_bytes, hash_f64, hash_u32, hash_u64};
use crate::hash_table::HashTable;
use crate::sso::{SsoPair, SsoStr};
use crate::table::Table;
use std::collections::TryReserveError;

/// Identifies a key/value combination.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Variant {
    I32I32,
    U32U32,
    I64I64,
    U64U64,
    F64F64,
    I64Str,
    StrI64,
    StrStr,
    /// String keys mapping to an opaque pointer-sized payload.
    StrPtr,
    SetI32,
    SetU32,
    SetI64,
    SetU64,
    SetF64,
    SetStr,
}

impl Variant {
    pub const ALL: [Variant; 15] = [
        Variant::I32I32,
        Variant::U32U32,
        Variant::I64I64,
        Variant::U64U64,
        Variant::F64F64,
        Variant::I64Str,
        Variant::StrI64,
        Variant::StrStr,
        Variant::StrPtr,
        Variant::SetI32,
        Variant::SetU32,
        Variant::SetI64,
        Variant::SetU64,
        Variant::SetF64,
        Variant::SetStr,
    ];

    /// Whether elements embed string slots that may own heap memory.
    pub fn has_strings(self) -> bool {
        matches!(
            self,
            Variant::I64Str | Variant::StrI64 | Variant::StrStr | Variant::StrPtr | Variant::SetStr
        )
    }
}

/// Operations the hash table needs from the elements it stores.
pub trait Element: Sized + 'static {
    type Key: ?Sized;
    type Value: ?Sized;

    const VARIANT: Variant;

    fn try_new(key: &Self::Key, value: &Self::Value) -> Result<Self, TryReserveError>;

    fn key(&self) -> &Self::Key;

    fn value(&self) -> &Self::Value;

    /// Overwrites the value. On error the old value is kept.
    fn update_value(&mut self, value: &Self::Value) -> Result<(), TryReserveError>;

    fn hash_key(key: &Self::Key) -> u32;

    fn key_eq(a: &Self::Key, b: &Self::Key) -> bool;

    /// Deep copy: owned heap strings are duplicated, never shared.
    fn try_clone(&self) -> Result<Self, TryReserveError>;

    fn project(table: &Table) -> Option<&HashTable<Self>>;

    fn project_mut(table: &mut Table) -> Option<&mut HashTable<Self>>;

    fn wrap(table: HashTable<Self>) -> Table;
}

macro_rules! projection {
    ($name:ident) => {
        const VARIANT: Variant = Variant::$name;

        fn project(table: &Table) -> Option<&HashTable<Self>> {
            match table {
                Table::$name(t) => Some(t),
                _ => None,
            }
        }

        fn project_mut(table: &mut Table) -> Option<&mut HashTable<Self>> {
            match table {
                Table::$name(t) => Some(t),
                _ => None,
            }
        }

        fn wrap(table: HashTable<Self>) -> Table {
            Table::$name(table)
        }
    };
}

macro_rules! scalar_map {
    ($name:ident, $k:ty, $v:ty, $hash:expr, $eq:expr) => {
        #[derive(Copy, Clone, Debug, PartialEq)]
        pub struct $name {
            key: $k,
            value: $v,
        }

        impl Element for $name {
            type Key = $k;
            type Value = $v;

            projection!($name);

            fn try_new(key: &$k, value: &$v) -> Result<Self, TryReserveError> {
                Ok(Self {
                    key: *key,
                    value: *value,
                })
            }

            #[inline]
            fn key(&self) -> &$k {
                &self.key
            }

            #[inline]
            fn value(&self) -> &$v {
                &self.value
            }

            fn update_value(&mut self, value: &$v) -> Result<(), TryReserveError> {
                self.value = *value;
                Ok(())
            }

            #[inline]
            fn hash_key(key: &$k) -> u32 {
                ($hash)(*key)
            }

            #[inline]
            fn key_eq(a: &$k, b: &$k) -> bool {
                ($eq)(*a, *b)
            }

            fn try_clone(&self) -> Result<Self, TryReserveError> {
                Ok(*self)
            }
        }
    };
}

macro_rules! scalar_set {
    ($name:ident, $k:ty, $hash:expr, $eq:expr) => {
        #[derive(Copy, Clone, Debug, PartialEq)]
        pub struct $name {
            key: $k,
        }

        impl Element for $name {
            type Key = $k;
            type Value = ();

            projection!($name);

            fn try_new(key: &$k, _: &()) -> Result<Self, TryReserveError> {
                Ok(Self { key: *key })
            }

            #[inline]
            fn key(&self) -> &$k {
                &self.key
            }

            #[inline]
            fn value(&self) -> &() {
                &()
            }

            fn update_value(&mut self, _: &()) -> Result<(), TryReserveError> {
                Ok(())
            }

            #[inline]
            fn hash_key(key: &$k) -> u32 {
                ($hash)(*key)
            }

            #[inline]
            fn key_eq(a: &$k, b: &$k) -> bool {
                ($eq)(*a, *b)
            }

            fn try_clone(&self) -> Result<Self, TryReserveError> {
                Ok(*self)
            }
        }
    };
}

fn f64_eq(a: f64, b: f64) -> bool {
    canonical_f64_bits(a) == canonical_f64_bits(b)
}

scalar_map!(I32I32, i32, i32, |k: i32| hash_u32(k as u32), |a, b| a == b);
scalar_map!(U32U32, u32, u32, hash_u32, |a, b| a == b);
scalar_map!(I64I64, i64, i64, |k: i64| hash_u64(k as u64), |a, b| a == b);
scalar_map!(U64U64, u64, u64, hash_u64, |a, b| a == b);
scalar_map!(F64F64, f64, f64, hash_f64, f64_eq);

scalar_set!(SetI32, i32, |k: i32| hash_u32(k as u32), |a, b| a == b);
scalar_set!(SetU32, u32, hash_u32, |a, b| a == b);
scalar_set!(SetI64, i64, |k: i64| hash_u64(k as u64), |a, b| a == b);
scalar_set!(SetU64, u64, hash_u64, |a, b| a == b);
scalar_set!(SetF64, f64, hash_f64, f64_eq);

/// Integer keys, string values.
#[derive(Debug)]
pub struct I64Str {
    key: i64,
    value: SsoStr,
}

impl Element for I64Str {
    type Key = i64;
    type Value = [u8];

    projection!(I64Str);

    fn try_new(key: &i64, value: &[u8]) -> Result<Self, TryReserveError> {
        Ok(Self {
            key: *key,
            value: SsoStr::new(value)?,
        })
    }

    fn key(&self) -> &i64 {
        &self.key
    }

    fn value(&self) -> &[u8] {
        self.value.as_bytes()
    }

    fn update_value(&mut self, value: &[u8]) -> Result<(), TryReserveError> {
        self.value.update(value)
    }

    fn hash_key(key: &i64) -> u32 {
        hash_u64(*key as u64)
    }

    fn key_eq(a: &i64, b: &i64) -> bool {
        a == b
    }

    fn try_clone(&self) -> Result<Self, TryReserveError> {
        Ok(Self {
            key: self.key,
            value: self.value.try_clone()?,
        })
    }
}

macro_rules! string_keyed {
    ($name:ident, $v:ty) => {
        #[derive(Debug)]
        pub struct $name {
            key: SsoStr,
            value: $v,
        }

        impl Element for $name {
            type Key = [u8];
            type Value = $v;

            projection!($name);

            fn try_new(key: &[u8], value: &$v) -> Result<Self, TryReserveError> {
                Ok(Self {
                    key: SsoStr::new(key)?,
                    value: *value,
                })
            }

            #[inline]
            fn key(&self) -> &[u8] {
                self.key.as_bytes()
            }

            #[inline]
            fn value(&self) -> &$v {
                &self.value
            }

            fn update_value(&mut self, value: &$v) -> Result<(), TryReserveError> {
                self.value = *value;
                Ok(())
            }

            #[inline]
            fn hash_key(key: &[u8]) -> u32 {
                hash_bytes(key)
            }

            #[inline]
            fn key_eq(a: &[u8], b: &[u8]) -> bool {
                a == b
            }

            fn try_clone(&self) -> Result<Self, TryReserveError> {
                Ok(Self {
                    key: self.key.try_clone()?,
                    value: self.value,
                })
            }
        }
    };
}

string_keyed!(StrI64, i64);
string_keyed!(StrPtr, usize);

/// String keys and string values sharing one inline budget.
#[derive(Debug)]
pub struct StrStr {
    pair: SsoPair,
}

impl StrStr {
    /// Current inline/heap split of key and value.
    pub fn layout(&self) -> crate::sso::PairLayout {
        self.pair.layout()
    }
}

impl Element for StrStr {
    type Key = [u8];
    type Value = [u8];

    projection!(StrStr);

    fn try_new(key: &[u8], value: &[u8]) -> Result<Self, TryReserveError> {
        Ok(Self {
            pair: SsoPair::new(key, value)?,
        })
    }

    fn key(&self) -> &[u8] {
        self.pair.first()
    }

    fn value(&self) -> &[u8] {
        self.pair.second()
    }

    fn update_value(&mut self, value: &[u8]) -> Result<(), TryReserveError> {
        self.pair.update_second(value)
    }

    fn hash_key(key: &[u8]) -> u32 {
        hash_bytes(key)
    }

    fn key_eq(a: &[u8], b: &[u8]) -> bool {
        a == b
    }

    fn try_clone(&self) -> Result<Self, TryReserveError> {
        Ok(Self {
            pair: self.pair.try_clone()?,
        })
    }
}

#[derive(Debug)]
pub struct SetStr {
    key: SsoStr,
}

impl Element for SetStr {
    type Key = [u8];
    type Value = ();

    projection!(SetStr);

    fn try_new(key: &[u8], _: &()) -> Result<Self, TryReserveError> {
        Ok(Self {
            key: SsoStr::new(key)?,
        })
    }

    fn key(&self) -> &[u8] {
        self.key.as_bytes()
    }

    fn value(&self) -> &() {
        &()
    }

    fn update_value(&mut self, _: &()) -> Result<(), TryReserveError> {
        Ok(())
    }

    fn hash_key(key: &[u8]) -> u32 {
        hash_bytes(key)
    }

    fn key_eq(a: &[u8], b: &[u8]) -> bool {
        a == b
    }

    fn try_clone(&self) -> Result<Self, TryReserveError> {
        Ok(Self {
            key: self.key.try_clone()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_flags() {
        assert_eq!(Variant::ALL.iter().filter(|v| v.has_strings()).count(), 5);
        assert!(Variant::StrStr.has_strings());
        assert!(Variant::SetStr.has_strings());
        assert!(!Variant::I32I32.has_strings());
        assert!(!Variant::SetF64.has_strings());
    }

    /// Invariant: float keys compare by canonical bits, so `-0.0` finds
    /// `0.0` and NaN finds NaN.
    #[test]
    fn float_key_identity() {
        assert!(F64F64::key_eq(&0.0, &-0.0));
        assert!(F64F64::key_eq(&f64::NAN, &f64::NAN));
        assert!(!F64F64::key_eq(&1.0, &2.0));
        assert_eq!(F64F64::hash_key(&0.0), F64F64::hash_key(&-0.0));
    }

    #[test]
    fn string_value_update_keeps_key() {
        let mut e = StrStr::try_new(b"key", b"v").unwrap();
        e.update_value(&[b'x'; 100]).unwrap();
        assert_eq!(e.key(), b"key");
        assert_eq!(e.value(), &[b'x'; 100][..]);
        assert_eq!(e.layout(), crate::sso::PairLayout::InlineHeap);
    }

    #[test]
    fn clones_do_not_share_heap() {
        let e = I64Str::try_new(&1, &[b'a'; 64]).unwrap();
        let c = e.try_clone().unwrap();
        assert_eq!(e.value(), c.value());
        assert_ne!(e.value().as_ptr(), c.value().as_ptr());

        let e = StrPtr::try_new(&[b'k'; 64], &7).unwrap();
        let c = e.try_clone().unwrap();
        assert_ne!(e.key().as_ptr(), c.key().as_ptr());
        assert_eq!(*c.value(), 7);
    }
}
