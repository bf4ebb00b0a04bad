//! Pronunciation dictionary (spec §3 "dictionary", §6 "Dictionary lookup").
//!
//! Dictionary *file* parsing is out of scope, same as FSG files; the
//! embedding application builds a [`SimpleDictionary`] (or its own
//! [`Dictionary`] implementation) and hands it to the lextree builder.

use crate::ctxt::PhoneId;

/// The collaborator interface the lextree builder and word-transition
/// logic depend on. A production embedding would back this with a real
/// phonetic dictionary; see [`SimpleDictionary`] for an in-memory one.
pub trait Dictionary {
    /// Number of words known to the dictionary (including alternate
    /// pronunciations, each of which is its own entry).
    fn n_words(&self) -> usize;

    /// Map a dictionary word id to its string.
    fn word_str(&self, wid: i32) -> &str;

    /// Look up a word's dictionary id by string, if present.
    fn to_id(&self, word: &str) -> Option<i32>;

    /// Phone sequence for a word's pronunciation, in left-to-right order.
    fn pron(&self, wid: i32) -> &[PhoneId];

    fn pronlen(&self, wid: i32) -> usize {
        self.pron(wid).len()
    }

    /// The next alternate pronunciation of the same base word, if any
    /// (dictionary entries for alternates form a singly-linked chain).
    fn next_alt(&self, wid: i32) -> Option<i32>;

    /// The first (base) pronunciation id for whatever alternate `wid` is.
    fn base_wid(&self, wid: i32) -> i32;

    /// Number of context-independent phones this dictionary's
    /// pronunciations are drawn from; sizes [`crate::ctxt::CtxtSet`]s.
    fn n_ciphones(&self) -> usize;

    /// Whether `wid` names a filler word rather than a spoken one, by the
    /// usual bracket convention (`<sil>`, `<uh>`, `[breath]`, ...). Used by
    /// `fsg_set_add`'s auto-augmentation to find filler words to give
    /// self-loops beyond `<sil>` itself.
    fn is_filler_word(&self, wid: i32) -> bool {
        let w = self.word_str(wid);
        (w.starts_with('<') && w.ends_with('>')) || (w.starts_with('[') && w.ends_with(']'))
    }
}

/// A word entry: its phone sequence and a link to the next alternate
/// pronunciation of the same base word, if any.
#[derive(Debug, Clone)]
struct Entry {
    pron: Vec<PhoneId>,
    base: i32,
    next_alt: Option<i32>,
}

/// An in-memory dictionary built directly by the embedding application,
/// with no file format of its own.
#[derive(Debug, Clone)]
pub struct SimpleDictionary {
    words: Vec<String>,
    entries: Vec<Entry>,
    n_ciphones: usize,
}

impl SimpleDictionary {
    pub fn new(n_ciphones: usize) -> Self {
        Self {
            words: Vec::new(),
            entries: Vec::new(),
            n_ciphones,
        }
    }

    /// Add a base pronunciation for `word`, returning its dictionary id.
    pub fn add_word(&mut self, word: &str, pron: Vec<PhoneId>) -> i32 {
        let id = self.words.len() as i32;
        self.words.push(word.to_string());
        self.entries.push(Entry {
            pron,
            base: id,
            next_alt: None,
        });
        id
    }

    /// Add an alternate pronunciation of `base_wid`, chaining it onto
    /// that word's `next_alt` list.
    pub fn add_alt_pron(&mut self, base_wid: i32, pron: Vec<PhoneId>) -> i32 {
        let id = self.words.len() as i32;
        let word = self.words[base_wid as usize].clone();
        self.words.push(word);
        self.entries.push(Entry {
            pron,
            base: base_wid,
            next_alt: None,
        });
        let mut tail = base_wid;
        while let Some(next) = self.entries[tail as usize].next_alt {
            tail = next;
        }
        self.entries[tail as usize].next_alt = Some(id);
        id
    }
}

impl Dictionary for SimpleDictionary {
    fn n_words(&self) -> usize {
        self.words.len()
    }

    fn word_str(&self, wid: i32) -> &str {
        &self.words[wid as usize]
    }

    fn to_id(&self, word: &str) -> Option<i32> {
        self.words.iter().position(|w| w == word).map(|i| i as i32)
    }

    fn pron(&self, wid: i32) -> &[PhoneId] {
        &self.entries[wid as usize].pron
    }

    fn next_alt(&self, wid: i32) -> Option<i32> {
        self.entries[wid as usize].next_alt
    }

    fn base_wid(&self, wid: i32) -> i32 {
        self.entries[wid as usize].base
    }

    fn n_ciphones(&self) -> usize {
        self.n_ciphones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_prons_chain_from_base() {
        let mut d = SimpleDictionary::new(40);
        let base = d.add_word("TOMATO", vec![1, 2, 3]);
        let alt1 = d.add_alt_pron(base, vec![1, 2, 4]);
        let alt2 = d.add_alt_pron(base, vec![1, 5, 4]);
        assert_eq!(d.next_alt(base), Some(alt1));
        assert_eq!(d.next_alt(alt1), Some(alt2));
        assert_eq!(d.next_alt(alt2), None);
        assert_eq!(d.base_wid(alt2), base);
    }

    #[test]
    fn to_id_looks_up_by_string() {
        let mut d = SimpleDictionary::new(40);
        d.add_word("HELLO", vec![1, 2]);
        assert_eq!(d.to_id("HELLO"), Some(0));
        assert_eq!(d.to_id("NOPE"), None);
    }
}
