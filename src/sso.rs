//! Small-string slots.
//!
//! [`SsoStr`] keeps strings of up to [`SSO_INLINE`] bytes inside the slot
//! and moves longer ones to an exclusively owned heap buffer.
//!
//! [`SsoPair`] holds a key string and a value string that share one fixed
//! byte budget. Depending on the two lengths, zero, one or both strings
//! spill to the heap (see [`PairLayout::choose`]). The layout is chosen
//! again on every write.
//!
//! All allocation is fallible. Writers reserve every buffer they need
//! before touching the current contents, so a failed write leaves the slot
//! exactly as it was.

use std::collections::TryReserveError;
use std::fmt;

/// Inline capacity of a single-string slot.
pub const SSO_INLINE: usize = 23;

/// Inline budget of a pair when both strings live inside the slot.
pub const PAIR_INLINE: usize = 46;

/// Inline budget left for one string of a pair when the other one is on
/// the heap.
pub const PAIR_SHARED_INLINE: usize = 23;

fn heap_copy(bytes: &[u8]) -> Result<Vec<u8>, TryReserveError> {
    let mut v = Vec::new();
    v.try_reserve_exact(bytes.len())?;
    v.extend_from_slice(bytes);
    Ok(v)
}

/// Grows `v` so it can hold `len` bytes. On failure `v` is untouched.
fn reserve_for(v: &mut Vec<u8>, len: usize) -> Result<(), TryReserveError> {
    v.try_reserve_exact(len.saturating_sub(v.len()))
}

fn refill(v: &mut Vec<u8>, bytes: &[u8]) {
    v.clear();
    v.extend_from_slice(bytes);
}

fn pack<const N: usize>(bytes: &[u8]) -> (u8, [u8; N]) {
    debug_assert!(bytes.len() <= N);
    let mut buf = [0; N];
    buf[..bytes.len()].copy_from_slice(bytes);
    (bytes.len() as u8, buf)
}

fn fmt_bytes(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&String::from_utf8_lossy(bytes), f)
}

/// A string slot that stores short strings inline.
pub enum SsoStr {
    Direct { len: u8, buf: [u8; SSO_INLINE] },
    Indirect(Vec<u8>),
}

impl Default for SsoStr {
    fn default() -> Self {
        SsoStr::Direct {
            len: 0,
            buf: [0; SSO_INLINE],
        }
    }
}

impl SsoStr {
    /// Stores `bytes`, inline if they fit.
    pub fn new(bytes: &[u8]) -> Result<Self, TryReserveError> {
        if bytes.len() <= SSO_INLINE {
            Ok(Self::inline(bytes))
        } else {
            Ok(SsoStr::Indirect(heap_copy(bytes)?))
        }
    }

    fn inline(bytes: &[u8]) -> Self {
        let (len, buf) = pack(bytes);
        SsoStr::Direct { len, buf }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SsoStr::Direct { len, buf } => &buf[..*len as usize],
            SsoStr::Indirect(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, SsoStr::Direct { .. })
    }

    /// Replaces the contents.
    ///
    /// A heap buffer that is still needed is reused (and grown in place if
    /// necessary); one that is no longer needed is released.
    pub fn update(&mut self, bytes: &[u8]) -> Result<(), TryReserveError> {
        if bytes.len() <= SSO_INLINE {
            *self = Self::inline(bytes);
            return Ok(());
        }
        match self {
            SsoStr::Indirect(v) => {
                reserve_for(v, bytes.len())?;
                refill(v, bytes);
            }
            SsoStr::Direct { .. } => *self = SsoStr::Indirect(heap_copy(bytes)?),
        }
        Ok(())
    }

    /// Releases any heap buffer and leaves the slot empty.
    pub fn free(&mut self) {
        *self = Self::default();
    }

    /// Deep copy; a heap string gets its own allocation.
    pub fn try_clone(&self) -> Result<Self, TryReserveError> {
        Self::new(self.as_bytes())
    }
}

impl fmt::Debug for SsoStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_bytes(self.as_bytes(), f)
    }
}

/// Which strings of an [`SsoPair`] are stored inline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PairLayout {
    InlineInline,
    InlineHeap,
    HeapInline,
    HeapHeap,
}

impl PairLayout {
    /// Picks the layout that keeps as many bytes inline as possible.
    pub fn choose(first: usize, second: usize) -> Self {
        if first.saturating_add(second) <= PAIR_INLINE {
            PairLayout::InlineInline
        } else if first <= PAIR_SHARED_INLINE {
            PairLayout::InlineHeap
        } else if second <= PAIR_SHARED_INLINE {
            PairLayout::HeapInline
        } else {
            PairLayout::HeapHeap
        }
    }

    pub fn first_inline(self) -> bool {
        matches!(self, PairLayout::InlineInline | PairLayout::InlineHeap)
    }

    pub fn second_inline(self) -> bool {
        matches!(self, PairLayout::InlineInline | PairLayout::HeapInline)
    }
}

/// Two strings sharing one inline byte budget.
pub enum SsoPair {
    InlineInline {
        lens: [u8; 2],
        buf: [u8; PAIR_INLINE],
    },
    InlineHeap {
        len: u8,
        buf: [u8; PAIR_SHARED_INLINE],
        second: Vec<u8>,
    },
    HeapInline {
        first: Vec<u8>,
        len: u8,
        buf: [u8; PAIR_SHARED_INLINE],
    },
    HeapHeap {
        first: Vec<u8>,
        second: Vec<u8>,
    },
}

/// One string of a pair while the pair is being rebuilt.
enum Part<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
    Inline { len: u8, buf: [u8; PAIR_INLINE] },
}

impl Part<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Part::Borrowed(b) => b,
            Part::Owned(v) => v,
            Part::Inline { len, buf } => &buf[..*len as usize],
        }
    }

    // Callers reserve heap buffers up front; the copy here only runs if a
    // layout asks for a heap string nobody reserved.
    fn into_heap(self) -> Vec<u8> {
        match self {
            Part::Owned(v) => v,
            other => other.bytes().to_vec(),
        }
    }
}

impl Default for SsoPair {
    fn default() -> Self {
        SsoPair::InlineInline {
            lens: [0, 0],
            buf: [0; PAIR_INLINE],
        }
    }
}

impl SsoPair {
    pub fn new(first: &[u8], second: &[u8]) -> Result<Self, TryReserveError> {
        let layout = PairLayout::choose(first.len(), second.len());
        let first = if layout.first_inline() {
            Part::Borrowed(first)
        } else {
            Part::Owned(heap_copy(first)?)
        };
        let second = if layout.second_inline() {
            Part::Borrowed(second)
        } else {
            Part::Owned(heap_copy(second)?)
        };
        Ok(Self::assemble(layout, first, second))
    }

    fn assemble(layout: PairLayout, first: Part<'_>, second: Part<'_>) -> Self {
        match layout {
            PairLayout::InlineInline => {
                let (a, b) = (first.bytes(), second.bytes());
                let mut buf = [0; PAIR_INLINE];
                buf[..a.len()].copy_from_slice(a);
                buf[a.len()..a.len() + b.len()].copy_from_slice(b);
                SsoPair::InlineInline {
                    lens: [a.len() as u8, b.len() as u8],
                    buf,
                }
            }
            PairLayout::InlineHeap => {
                let (len, buf) = pack(first.bytes());
                SsoPair::InlineHeap {
                    len,
                    buf,
                    second: second.into_heap(),
                }
            }
            PairLayout::HeapInline => {
                let (len, buf) = pack(second.bytes());
                SsoPair::HeapInline {
                    first: first.into_heap(),
                    len,
                    buf,
                }
            }
            PairLayout::HeapHeap => SsoPair::HeapHeap {
                first: first.into_heap(),
                second: second.into_heap(),
            },
        }
    }

    pub fn layout(&self) -> PairLayout {
        match self {
            SsoPair::InlineInline { .. } => PairLayout::InlineInline,
            SsoPair::InlineHeap { .. } => PairLayout::InlineHeap,
            SsoPair::HeapInline { .. } => PairLayout::HeapInline,
            SsoPair::HeapHeap { .. } => PairLayout::HeapHeap,
        }
    }

    pub fn first(&self) -> &[u8] {
        match self {
            SsoPair::InlineInline { lens, buf } => &buf[..lens[0] as usize],
            SsoPair::InlineHeap { len, buf, .. } => &buf[..*len as usize],
            SsoPair::HeapInline { first, .. } | SsoPair::HeapHeap { first, .. } => first,
        }
    }

    pub fn second(&self) -> &[u8] {
        match self {
            SsoPair::InlineInline { lens, buf } => {
                let start = lens[0] as usize;
                &buf[start..start + lens[1] as usize]
            }
            SsoPair::HeapInline { len, buf, .. } => &buf[..*len as usize],
            SsoPair::InlineHeap { second, .. } | SsoPair::HeapHeap { second, .. } => second,
        }
    }

    fn first_heap(&self) -> Option<&Vec<u8>> {
        match self {
            SsoPair::HeapInline { first, .. } | SsoPair::HeapHeap { first, .. } => Some(first),
            _ => None,
        }
    }

    fn second_heap_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            SsoPair::InlineHeap { second, .. } | SsoPair::HeapHeap { second, .. } => Some(second),
            _ => None,
        }
    }

    /// Splits the pair into its first string and the heap buffer of its
    /// second string, if it had one.
    fn into_parts(self) -> (Part<'static>, Option<Vec<u8>>) {
        match self {
            SsoPair::InlineInline { lens, buf } => {
                let (len, buf) = pack(&buf[..lens[0] as usize]);
                (Part::Inline { len, buf }, None)
            }
            SsoPair::InlineHeap { len, buf, second } => {
                let (len, buf) = pack(&buf[..len as usize]);
                (Part::Inline { len, buf }, Some(second))
            }
            SsoPair::HeapInline { first, .. } => (Part::Owned(first), None),
            SsoPair::HeapHeap { first, second } => (Part::Owned(first), Some(second)),
        }
    }

    /// Replaces the second string and re-picks the layout.
    ///
    /// The first string moves between inline and heap storage as needed.
    /// Heap buffers that survive the new layout are reused.
    pub fn update_second(&mut self, second: &[u8]) -> Result<(), TryReserveError> {
        let layout = PairLayout::choose(self.first().len(), second.len());

        let fresh_first = if !layout.first_inline() && self.first_heap().is_none() {
            Some(heap_copy(self.first())?)
        } else {
            None
        };
        let fresh_second = if layout.second_inline() {
            None
        } else {
            match self.second_heap_mut() {
                Some(v) => {
                    reserve_for(v, second.len())?;
                    None
                }
                None => Some(heap_copy(second)?),
            }
        };

        // Nothing below can fail.
        let (old_first, old_second) = std::mem::take(self).into_parts();
        let first = match fresh_first {
            Some(v) => Part::Owned(v),
            None => old_first,
        };
        let second = match (layout.second_inline(), fresh_second.or(old_second)) {
            (false, Some(mut v)) => {
                refill(&mut v, second);
                Part::Owned(v)
            }
            _ => Part::Borrowed(second),
        };
        *self = Self::assemble(layout, first, second);
        Ok(())
    }

    /// Releases both strings' heap buffers and leaves the pair empty.
    pub fn free(&mut self) {
        *self = Self::default();
    }

    pub fn try_clone(&self) -> Result<Self, TryReserveError> {
        Self::new(self.first(), self.second())
    }
}

impl fmt::Debug for SsoPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Bytes<'a>(&'a [u8]);
        impl fmt::Debug for Bytes<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt_bytes(self.0, f)
            }
        }
        f.debug_tuple("SsoPair")
            .field(&self.layout())
            .field(&Bytes(self.first()))
            .field(&Bytes(self.second()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(n: usize, c: u8) -> Vec<u8> {
        vec![c; n]
    }

    /// Invariant: strings up to the inline capacity never allocate.
    #[test]
    fn str_inline_boundary() {
        let at = SsoStr::new(&s(SSO_INLINE, b'a')).unwrap();
        assert!(at.is_inline());
        assert_eq!(at.as_bytes(), &s(SSO_INLINE, b'a')[..]);

        let over = SsoStr::new(&s(SSO_INLINE + 1, b'b')).unwrap();
        assert!(!over.is_inline());
        assert_eq!(over.len(), SSO_INLINE + 1);

        let empty = SsoStr::new(b"").unwrap();
        assert!(empty.is_empty() && empty.is_inline());
    }

    /// Invariant: updating a heap string with another heap string keeps the
    /// allocation when it is large enough.
    #[test]
    fn str_update_reuses_heap_buffer() {
        let mut slot = SsoStr::new(&s(100, b'x')).unwrap();
        let before = slot.as_bytes().as_ptr();
        slot.update(&s(60, b'y')).unwrap();
        assert_eq!(slot.as_bytes().as_ptr(), before);
        assert_eq!(slot.as_bytes(), &s(60, b'y')[..]);
    }

    #[test]
    fn str_update_transitions() {
        let mut slot = SsoStr::new(b"short").unwrap();
        slot.update(&s(500, b'z')).unwrap();
        assert!(!slot.is_inline());
        assert_eq!(slot.len(), 500);

        slot.update(b"tiny").unwrap();
        assert!(slot.is_inline());
        assert_eq!(slot.as_bytes(), b"tiny");

        slot.free();
        assert!(slot.is_empty());
    }

    /// Invariant: a clone never shares the heap buffer of its source.
    #[test]
    fn str_clone_is_deep() {
        let a = SsoStr::new(&s(40, b'q')).unwrap();
        let b = a.try_clone().unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes().as_ptr(), b.as_bytes().as_ptr());
    }

    #[test]
    fn arbitrary_bytes_are_accepted() {
        let raw = [0xff, 0x00, 0xc3, 0x28];
        let slot = SsoStr::new(&raw).unwrap();
        assert_eq!(slot.as_bytes(), &raw);
        assert_eq!(slot.len(), 4);
    }

    #[test]
    fn pair_layout_choice() {
        assert_eq!(PairLayout::choose(0, 0), PairLayout::InlineInline);
        assert_eq!(PairLayout::choose(20, 26), PairLayout::InlineInline);
        assert_eq!(PairLayout::choose(23, 24), PairLayout::InlineHeap);
        assert_eq!(PairLayout::choose(24, 23), PairLayout::HeapInline);
        assert_eq!(PairLayout::choose(40, 3), PairLayout::InlineInline);
        assert_eq!(PairLayout::choose(45, 3), PairLayout::HeapInline);
        assert_eq!(PairLayout::choose(24, 24), PairLayout::HeapHeap);
    }

    /// Invariant: every layout reads back both strings unchanged.
    #[test]
    fn pair_round_trips_every_layout() {
        for (a, b, layout) in [
            (3, 40, PairLayout::InlineInline),
            (10, 300, PairLayout::InlineHeap),
            (300, 10, PairLayout::HeapInline),
            (300, 300, PairLayout::HeapHeap),
        ] {
            let (k, v) = (s(a, b'k'), s(b, b'v'));
            let pair = SsoPair::new(&k, &v).unwrap();
            assert_eq!(pair.layout(), layout);
            assert_eq!(pair.first(), &k[..]);
            assert_eq!(pair.second(), &v[..]);
        }
    }

    #[test]
    fn pair_free_empties_every_layout() {
        for (a, b) in [(3, 4), (10, 300), (300, 10), (300, 300)] {
            let mut pair = SsoPair::new(&s(a, b'k'), &s(b, b'v')).unwrap();
            pair.free();
            assert_eq!(pair.layout(), PairLayout::InlineInline);
            assert_eq!(pair.first(), b"");
            assert_eq!(pair.second(), b"");
            pair.update_second(b"again").unwrap();
            assert_eq!(pair.second(), b"again");
        }
    }

    /// Invariant: the layout is re-picked on every update and the first
    /// string survives every transition.
    #[test]
    fn pair_update_walks_all_layouts() {
        let key = s(40, b'k');
        let mut pair = SsoPair::new(&key, &s(10, b'v')).unwrap();
        assert_eq!(pair.layout(), PairLayout::HeapInline);

        pair.update_second(&s(200, b'v')).unwrap();
        assert_eq!(pair.layout(), PairLayout::HeapHeap);
        assert_eq!(pair.first(), &key[..]);

        pair.update_second(b"").unwrap();
        assert_eq!(pair.layout(), PairLayout::InlineInline);
        assert_eq!(pair.first(), &key[..]);
        assert_eq!(pair.second(), b"");

        let mut pair = SsoPair::new(b"key", b"val").unwrap();
        pair.update_second(&s(100, b'w')).unwrap();
        assert_eq!(pair.layout(), PairLayout::InlineHeap);
        assert_eq!(pair.first(), b"key");
        assert_eq!(pair.second(), &s(100, b'w')[..]);
    }

    #[test]
    fn pair_update_reuses_second_heap_buffer() {
        let mut pair = SsoPair::new(b"k", &s(300, b'a')).unwrap();
        let before = pair.second().as_ptr();
        pair.update_second(&s(100, b'b')).unwrap();
        assert_eq!(pair.second().as_ptr(), before);
        assert_eq!(pair.second(), &s(100, b'b')[..]);
    }

    #[test]
    fn pair_clone_is_deep() {
        let pair = SsoPair::new(&s(300, b'a'), &s(300, b'b')).unwrap();
        let copy = pair.try_clone().unwrap();
        assert_eq!(pair.first(), copy.first());
        assert_ne!(pair.first().as_ptr(), copy.first().as_ptr());
        assert_ne!(pair.second().as_ptr(), copy.second().as_ptr());
    }
}
