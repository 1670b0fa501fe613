//! Error taxonomy shared by the typed and the runtime-selected tables.

use crate::element::Variant;
use std::collections::TryReserveError;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The allocator refused to hand out more memory.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// The table was built over fixed storage that is already full.
    #[error("fixed storage is full (capacity {capacity})")]
    FixedCapacity { capacity: usize },

    /// The bucket table cannot grow past `2^bits` slots.
    #[error("bucket table reached its size limit of 2^{bits} slots")]
    BucketLimit { bits: u32 },

    /// A typed accessor was used on a table of another variant.
    #[error("table holds {found:?} elements, accessor expects {expected:?}")]
    TypeMismatch { expected: Variant, found: Variant },

    /// A copy stopped early because the destination ran out of room.
    #[error("destination holds {copied} of {required} elements")]
    InsufficientSpace { copied: usize, required: usize },
}

impl TableError {
    /// Whether this error sets the sticky allocation flag on a table.
    pub fn is_allocation_class(&self) -> bool {
        !matches!(self, TableError::TypeMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, TableError>;
