//! sso-hashtable: a single open-addressing hash table engine specialized
//! into many hash-map and hash-set variants, with small-string optimized
//! storage for string keys and values.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one engine, many element layouts, no tombstones, and string
//!   storage that avoids an allocation for short strings.
//! - Layers:
//!   - `sso`: `SsoStr` (one string, inline up to 23 bytes) and `SsoPair`
//!     (key and value sharing a 46-byte inline budget in four layouts).
//!   - `bucket`: bucket table of `{location, hash, collisions}` slots;
//!     the top hash bits pick the home slot and the home's collision count
//!     bounds every probe.
//!   - `buffer`: dense element array, owned and doubling, or fixed.
//!   - `element`: the `Element` trait (hash, equality, key/value access,
//!     deep copy) and one concrete type per variant.
//!   - `HashTable<E>`: insert, lookup, remove, grow, copy; monomorphized
//!     per element type.
//!   - `Table`: an enum over every `HashTable<E>` for callers that pick
//!     the variant at run time.
//!
//! Constraints
//! - Single-threaded: no internal locking; callers serialize access.
//! - `size < bucket_count` always; the bucket table doubles when `size`
//!   reaches a configurable percentage (default 90) of the bucket count.
//! - Iteration is array order. Removal swaps the last element into the
//!   hole and re-points that element's bucket entry.
//! - All allocation is fallible. A failed operation leaves the table's
//!   contents as they were and sets a sticky `alloc_error` flag.
//! - Strings are byte strings; any byte sequence is accepted.
//!
//! Growth and copies
//! - Growth allocates the larger bucket table first and only then
//!   discards the old one, re-registering every element in array order.
//!   Element positions never change.
//! - Copies duplicate every owned heap string; a copy never shares string
//!   memory with its source. A fixed destination that is too small gets a
//!   prefix of the source and an `InsufficientSpace` error.
//!
//! Notes and non-goals
//! - No persistence or wire format.
//! - Keys are immutable once inserted; values are overwritten through
//!   `insert`.

mod bucket;
mod buffer;
pub mod config;
pub mod element;
mod error;
pub mod hash;
mod hash_table;
mod hash_table_proptest;
pub mod sso;
mod table;

// Public surface
pub use config::TableConfig;
pub use element::{Element, Variant};
pub use error::{Result, TableError};
pub use hash_table::{HashTable, Insert, Iter};
pub use table::Table;
