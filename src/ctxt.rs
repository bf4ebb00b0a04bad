//! Right/left-context phone bitsets (spec §3, "right-context bitset `ctxt`").
//!
//! Sized at construction by the number of context-independent phones in
//! use, represented as a `bitvec` fixed bit array so admissibility tests
//! (spec §4.5) are a single intersection check rather than a phone-by-phone
//! scan, per the design note in spec §9.

use bitvec::prelude::*;

pub type PhoneId = u16;

/// A set of context-independent phone ids, used as the left-context set a
/// lextree root accepts, or the right-context set a word exit permits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtxtSet {
    bits: BitVec,
}

impl CtxtSet {
    /// An empty context set over `n_ciphones` phones.
    pub fn none(n_ciphones: usize) -> Self {
        Self {
            bits: bitvec![0; n_ciphones],
        }
    }

    /// A context set accepting every phone; used for fillers and
    /// single-phone words, which do not model right context (spec §4.3).
    pub fn all(n_ciphones: usize) -> Self {
        Self {
            bits: bitvec![1; n_ciphones],
        }
    }

    /// A context set accepting only `phone`.
    pub fn single(n_ciphones: usize, phone: PhoneId) -> Self {
        let mut s = Self::none(n_ciphones);
        s.insert(phone);
        s
    }

    pub fn insert(&mut self, phone: PhoneId) {
        self.bits.set(phone as usize, true);
    }

    pub fn contains(&self, phone: PhoneId) -> bool {
        self.bits
            .get(phone as usize)
            .map(|b| *b)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_phone() {
        let s = CtxtSet::all(8);
        for p in 0..8 {
            assert!(s.contains(p));
        }
    }

    #[test]
    fn single_contains_only_that_phone() {
        let s = CtxtSet::single(8, 3);
        assert!(s.contains(3));
        assert!(!s.contains(4));
    }
}
