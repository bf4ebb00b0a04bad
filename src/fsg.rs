//! Finite-state grammar model (spec §3 "FSG state"/"FSG arc", §6 "FSG model").
//!
//! FSG *file* parsing is explicitly out of scope (spec §1); this module is
//! the in-memory graph the lextree walks and the decoder's search loop
//! queries. Built programmatically (`FsgModel::new` + `add_arc`/
//! `add_null_arc`), it precomputes the transitive closure of null (ε) arcs
//! so that `null_trans(s, d)` is always a single direct lookup, per the
//! precondition spec §4.4 and §9 both call out: "the spec assumes the FSG
//! model precomputes transitive closure of ε-arcs... replace the
//! single-pass null-prop with a fixpoint iteration bounded by `n_state`"
//! when that can't be guaranteed. We guarantee it here, at model-mutation
//! time, with exactly that fixpoint iteration.

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::logmath::{score_add, LogMath, WORST_SCORE};

/// Sentinel word id for a null (ε) transition.
pub const NULL_WORD: i32 = -1;

#[derive(Debug, Clone, Copy)]
pub struct FsgLink {
    pub from_state: u32,
    pub to_state: u32,
    /// `NULL_WORD` for an epsilon arc.
    pub word_id: i32,
    pub logs2prob: i32,
}

impl FsgLink {
    pub fn is_null(&self) -> bool {
        self.word_id == NULL_WORD
    }
}

/// A directed graph of FSG states and word/null-labeled arcs.
#[derive(Debug, Clone)]
pub struct FsgModel {
    n_state: u32,
    start_state: u32,
    final_state: u32,
    words: Vec<String>,
    word_ids: HashMap<String, i32>,
    silwords: HashSet<i32>,
    /// Non-null arcs, keyed by (from_state, to_state). Most state pairs
    /// carry one or two parallel arcs (a word plus, occasionally, an
    /// alternate pronunciation arc), so a `SmallVec` avoids a heap
    /// allocation for the common case.
    trans: HashMap<(u32, u32), SmallVec<[FsgLink; 2]>>,
    /// Transitive closure of null arcs, one synthesized arc per
    /// reachable (from, to) pair, keyed the same way.
    null_closure: HashMap<(u32, u32), FsgLink>,
    has_sil: bool,
    has_alt: bool,
    alt_of: HashMap<i32, i32>,
    pub lw: f32,
}

impl FsgModel {
    pub fn new(n_state: u32, start_state: u32, final_state: u32, lw: f32) -> Self {
        assert!(start_state < n_state && final_state < n_state);
        Self {
            n_state,
            start_state,
            final_state,
            words: Vec::new(),
            word_ids: HashMap::new(),
            silwords: HashSet::new(),
            trans: HashMap::new(),
            null_closure: HashMap::new(),
            has_sil: false,
            has_alt: false,
            alt_of: HashMap::new(),
            lw,
        }
    }

    pub fn n_state(&self) -> u32 {
        self.n_state
    }

    pub fn start_state(&self) -> u32 {
        self.start_state
    }

    pub fn final_state(&self) -> u32 {
        self.final_state
    }

    pub fn n_word(&self) -> usize {
        self.words.len()
    }

    pub fn word_str(&self, wid: i32) -> &str {
        &self.words[wid as usize]
    }

    pub fn is_filler(&self, wid: i32) -> bool {
        self.silwords.contains(&wid)
    }

    /// Whether `wid` is specifically `<sil>` rather than another filler
    /// word, so callers can charge `silprob` vs `fillprob` separately.
    pub fn is_silence_word(&self, wid: i32) -> bool {
        self.word_str(wid) == "<sil>"
    }

    pub fn has_sil(&self) -> bool {
        self.has_sil
    }

    pub fn has_alt(&self) -> bool {
        self.has_alt
    }

    /// Look up or intern a word, returning its id.
    pub fn word_add(&mut self, word: &str) -> i32 {
        if let Some(&id) = self.word_ids.get(word) {
            return id;
        }
        let id = self.words.len() as i32;
        self.words.push(word.to_string());
        self.word_ids.insert(word.to_string(), id);
        id
    }

    pub fn word_id(&self, word: &str) -> Option<i32> {
        self.word_ids.get(word).copied()
    }

    /// Add a word-labeled arc `from -> to` with a linear probability,
    /// log-mapped and scaled by `lw`.
    pub fn add_arc(&mut self, from: u32, to: u32, word: &str, prob: f64, logmath: &LogMath) {
        let wid = self.word_add(word);
        let logp = (logmath.log(prob) as f32 * self.lw) as i32;
        self.trans.entry((from, to)).or_default().push(FsgLink {
            from_state: from,
            to_state: to,
            word_id: wid,
            logs2prob: logp,
        });
    }

    /// Add a null (ε) arc `from -> to` and recompute the transitive
    /// closure of null arcs.
    pub fn add_null_arc(&mut self, from: u32, to: u32, prob: f64, logmath: &LogMath) {
        let logp = (logmath.log(prob) as f32 * self.lw) as i32;
        let link = FsgLink {
            from_state: from,
            to_state: to,
            word_id: NULL_WORD,
            logs2prob: logp,
        };
        let entry = self
            .null_closure
            .entry((from, to))
            .or_insert(FsgLink {
                from_state: from,
                to_state: to,
                word_id: NULL_WORD,
                logs2prob: WORST_SCORE,
            });
        if link.logs2prob > entry.logs2prob {
            entry.logs2prob = link.logs2prob;
        }
        self.recompute_null_closure();
    }

    /// Fixpoint relaxation bounded by `n_state` rounds (spec §9): for
    /// every pair (s, d) reachable through an intermediate `k`, raise the
    /// direct null_closure[(s,d)] score to the best two-hop path through
    /// `k`, repeating until nothing improves or `n_state` rounds elapse.
    fn recompute_null_closure(&mut self) {
        let n = self.n_state;
        for _round in 0..n {
            let mut changed = false;
            let pairs: Vec<(u32, u32)> = self.null_closure.keys().copied().collect();
            for &(s, k) in &pairs {
                let sk_score = self.null_closure[&(s, k)].logs2prob;
                let continuations: Vec<(u32, i32)> = self
                    .null_closure
                    .iter()
                    .filter(|(&(from, _), _)| from == k)
                    .map(|(&(_, d), link)| (d, link.logs2prob))
                    .collect();
                for (d, kd_score) in continuations {
                    if d == s {
                        continue;
                    }
                    let combined = score_add(sk_score, kd_score);
                    let e = self.null_closure.entry((s, d)).or_insert(FsgLink {
                        from_state: s,
                        to_state: d,
                        word_id: NULL_WORD,
                        logs2prob: WORST_SCORE,
                    });
                    if combined > e.logs2prob {
                        e.logs2prob = combined;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Non-null arcs from `from` to `to`.
    pub fn trans(&self, from: u32, to: u32) -> &[FsgLink] {
        self.trans
            .get(&(from, to))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All non-null arcs out of `from`, to any destination.
    pub fn trans_from(&self, from: u32) -> impl Iterator<Item = &FsgLink> {
        self.trans
            .iter()
            .filter(move |(&(f, _), _)| f == from)
            .flat_map(|(_, v)| v.iter())
    }

    /// Transitively-closed null arc from `from` to `to`, if any (spec §3:
    /// "returns a direct arc or none, never requires multi-hop traversal").
    pub fn null_trans(&self, from: u32, to: u32) -> Option<&FsgLink> {
        self.null_closure.get(&(from, to))
    }

    /// Add a silence/filler self-loop at `state` (or every state if
    /// `state` is `None`), matching `fsg_model_add_silence`.
    pub fn add_silence(&mut self, word: &str, state: Option<u32>, prob: f32, logmath: &LogMath) {
        let wid = self.word_add(word);
        self.silwords.insert(wid);
        let logp = (logmath.log(prob as f64) as f32 * self.lw) as i32;
        let states: Vec<u32> = match state {
            Some(s) => vec![s],
            None => (0..self.n_state).collect(),
        };
        for s in states {
            self.trans.entry((s, s)).or_default().push(FsgLink {
                from_state: s,
                to_state: s,
                word_id: wid,
                logs2prob: logp,
            });
        }
        if word == "<sil>" {
            self.has_sil = true;
        }
    }

    /// Duplicate every arc labeled `word` with a parallel arc labeled
    /// `alt`, matching `fsg_model_add_alt`.
    pub fn add_alt(&mut self, word: &str, alt: &str) {
        let Some(base_wid) = self.word_id(word) else {
            return;
        };
        let alt_wid = self.word_add(alt);
        self.alt_of.insert(alt_wid, base_wid);
        let mut to_add = Vec::new();
        for ((from, to), links) in &self.trans {
            for link in links {
                if link.word_id == base_wid {
                    to_add.push(FsgLink {
                        from_state: *from,
                        to_state: *to,
                        word_id: alt_wid,
                        logs2prob: link.logs2prob,
                    });
                }
            }
        }
        for link in to_add {
            self.trans
                .entry((link.from_state, link.to_state))
                .or_default()
                .push(link);
        }
        self.has_alt = true;
    }

    pub fn base_wid(&self, wid: i32) -> i32 {
        self.alt_of.get(&wid).copied().unwrap_or(wid)
    }
}
