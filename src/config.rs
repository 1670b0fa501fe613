//! Construction options for hash tables.

/// Default share of the bucket count that may be occupied before the
/// bucket table doubles.
pub const DEFAULT_REHASH_PERCENT: u8 = 90;

/// Default number of elements a fresh table can hold without growing.
pub const DEFAULT_INITIAL_CAPACITY: usize = 8;

/// Largest supported bucket table is `2^MAX_BUCKET_BITS` slots; bucket
/// locations are stored as `u32`.
pub const MAX_BUCKET_BITS: u32 = 31;

/// Smallest bucket table ever allocated.
pub(crate) const MIN_BUCKET_BITS: u32 = 2;

/// Table configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableConfig {
    pub(crate) initial_capacity: usize,
    pub(crate) rehash_percent: u8,
    pub(crate) fixed: bool,
    pub(crate) max_bucket_bits: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            rehash_percent: DEFAULT_REHASH_PERCENT,
            fixed: false,
            max_bucket_bits: MAX_BUCKET_BITS,
        }
    }
}

impl TableConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many elements fit before the first reallocation.
    ///
    /// For fixed tables this is the hard element limit.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the occupancy, in percent of the bucket count, at which the
    /// bucket table doubles and every element is re-registered.
    ///
    /// Values are clamped to `1..=99`. Defaults to 90.
    #[must_use]
    pub fn rehash_percent(mut self, percent: u8) -> Self {
        self.rehash_percent = percent.clamp(1, 99);
        self
    }

    /// Makes the table fixed-size: storage is allocated once at
    /// construction and any insert beyond `initial_capacity` fails.
    #[must_use]
    pub fn fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    /// Caps the bucket table at `2^bits` slots.
    ///
    /// Once the cap is reached the table stops rehashing and accepts
    /// elements until only one empty bucket is left.
    #[must_use]
    pub fn max_bucket_bits(mut self, bits: u32) -> Self {
        self.max_bucket_bits = bits.clamp(MIN_BUCKET_BITS, MAX_BUCKET_BITS);
        self
    }

    pub fn get_initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    pub fn get_rehash_percent(&self) -> u8 {
        self.rehash_percent
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn get_max_bucket_bits(&self) -> u32 {
        self.max_bucket_bits
    }
}
