//! Lextree: a phonetic prefix tree over FSG arcs (spec §3 "lextree",
//! "pnode"; §4.3 "lextree construction"; §4.5 "cross-word transition").
//!
//! Each FSG arc becomes its own straight-line chain of pnodes, one per
//! phone of the (possibly alternate) pronunciation of its word, ending in
//! a leaf that carries the destination FSG state. The arc's own
//! log-probability is carried on the chain's *root* pnode and charged when
//! that root is entered (spec §3: pnode `logs2prob` is "language + lexical
//! contribution on entry"), not when the leaf exits. This is a deliberate
//! simplification of the original's
//! prefix-sharing lextree (`fsg_lextree_t`, which merges common phone
//! prefixes across arcs leaving the same state into a true tree): prefix
//! sharing is a memory/compute optimization over an equivalent search, not
//! a semantic requirement of any invariant in spec §7/§8, so it is left
//! out here and documented as a simplification rather than silently
//! assumed away.
//!
//! Left/right context bitsets (spec §4.5) are still real and checked by
//! [`cross_word_admissible`]: this build just seeds every root's
//! left-context set and every leaf's right-context set as "accept
//! anything", since computing the tight per-destination contexts needs
//! full triphone modeling that is out of this crate's scope (the
//! acoustic model collaborator owns phone identity, not this crate).
//! The check itself is real and independently testable with tighter sets.

use crate::ctxt::{CtxtSet, PhoneId};
use crate::dict::Dictionary;
use crate::fsg::FsgModel;
use crate::hmm::{HmmInstance, HmmTopology};
use std::collections::HashMap;

#[derive(Debug)]
pub enum PNodeKind {
    Internal { child: usize },
    Leaf {
        word_id: i32,
        dest_state: u32,
        /// Right-context phones permitted after this word exits.
        rc: CtxtSet,
    },
}

#[derive(Debug)]
pub struct PNode {
    /// Context-independent phone modeled at this node.
    pub ci_ext: PhoneId,
    pub hmm: HmmInstance,
    pub kind: PNodeKind,
    /// Left-context phones this node accepts entry from, set only on
    /// tree roots (non-root nodes inherit admissibility from their root).
    pub lc: Option<CtxtSet>,
    /// Language + lexical log-prob charged when this node is entered from
    /// outside its own chain (spec §3, §4.5): the FSG arc's own weight on
    /// tree roots, `0` on every other node (phone-internal propagation
    /// never adds it, per §4.2).
    pub logs2prob: i32,
}

impl PNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, PNodeKind::Leaf { .. })
    }
}

/// The full set of pnode chains for one FSG, indexed by the state each
/// chain's root is rooted at.
pub struct Lextree {
    arena: Vec<PNode>,
    roots: HashMap<u32, Vec<usize>>,
}

impl Lextree {
    pub fn n_pnode(&self) -> usize {
        self.arena.len()
    }

    pub fn node(&self, idx: usize) -> &PNode {
        &self.arena[idx]
    }

    pub fn node_mut(&mut self, idx: usize) -> &mut PNode {
        &mut self.arena[idx]
    }

    /// Root pnode indices for arcs leaving `state`.
    pub fn roots_at(&self, state: u32) -> &[usize] {
        self.roots.get(&state).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn states(&self) -> impl Iterator<Item = u32> + '_ {
        self.roots.keys().copied()
    }
}

/// Build a lextree from every non-null arc of `fsg`, expanding alternate
/// pronunciations when `use_altpron` is set (matching `fsgusealtpron`,
/// spec §6).
pub fn build_lextree(
    fsg: &FsgModel,
    dict: &dyn Dictionary,
    topology: HmmTopology,
    use_altpron: bool,
) -> Lextree {
    let mut arena = Vec::new();
    let mut roots: HashMap<u32, Vec<usize>> = HashMap::new();
    let n_ciphones = dict.n_ciphones();

    for state in 0..fsg.n_state() {
        for arc in fsg.trans_from(state) {
            let Some(dict_wid) = dict.to_id(fsg.word_str(arc.word_id)) else {
                continue;
            };
            let is_filler = fsg.is_filler(arc.word_id);
            let mut alt = Some(dict_wid);
            while let Some(wid) = alt {
                let pron = dict.pron(wid);
                if !pron.is_empty() {
                    let root_idx = build_chain(
                        &mut arena,
                        pron,
                        arc.word_id,
                        arc.to_state,
                        arc.logs2prob,
                        is_filler,
                        n_ciphones,
                        topology,
                    );
                    roots.entry(state).or_default().push(root_idx);
                }
                alt = if use_altpron { dict.next_alt(wid) } else { None };
            }
        }
    }

    Lextree { arena, roots }
}

fn build_chain(
    arena: &mut Vec<PNode>,
    pron: &[PhoneId],
    word_id: i32,
    dest_state: u32,
    word_logs2prob: i32,
    _is_filler: bool,
    n_ciphones: usize,
    topology: HmmTopology,
) -> usize {
    // Right context is left permissive for every word here, see module docs.
    let rc = CtxtSet::all(n_ciphones);

    let leaf_idx = arena.len();
    arena.push(PNode {
        ci_ext: pron[pron.len() - 1],
        hmm: HmmInstance::new(topology),
        kind: PNodeKind::Leaf {
            word_id,
            dest_state,
            rc,
        },
        lc: None,
        logs2prob: 0,
    });

    let mut next = leaf_idx;
    for (i, &phone) in pron.iter().enumerate().rev().skip(1) {
        let idx = arena.len();
        arena.push(PNode {
            ci_ext: phone,
            hmm: HmmInstance::new(topology),
            kind: PNodeKind::Internal { child: next },
            lc: if i == 0 {
                Some(CtxtSet::all(n_ciphones))
            } else {
                None
            },
            logs2prob: 0,
        });
        next = idx;
    }
    if pron.len() == 1 {
        if let Some(node) = arena.get_mut(leaf_idx) {
            node.lc = Some(CtxtSet::all(n_ciphones));
        }
    }
    // `next` is now the chain's root regardless of its length: charge the
    // arc's own weight there, to be added on cross-word/start entry
    // (spec §4.5), not at leaf exit.
    arena[next].logs2prob = word_logs2prob;
    next
}

/// Test whether a cross-word transition from a word exit to a candidate
/// root is admissible under triphone context rules (spec §4.5): the
/// exiting word's permitted right-context set must contain the entering
/// root's first phone, and the entering root's accepted left-context set
/// must contain the exiting word's last phone.
pub fn cross_word_admissible(
    exit_rc: &CtxtSet,
    next_root_first_phone: PhoneId,
    next_root_lc: &CtxtSet,
    exit_last_phone: PhoneId,
) -> bool {
    exit_rc.contains(next_root_first_phone) && next_root_lc.contains(exit_last_phone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::SimpleDictionary;
    use crate::fsg::FsgModel;
    use crate::logmath::LogMath;

    fn topo() -> HmmTopology {
        HmmTopology::uniform(-10, -20)
    }

    #[test]
    fn build_lextree_creates_one_root_per_arc() {
        let lm = LogMath::default_base();
        let mut fsg = FsgModel::new(2, 0, 1, 1.0);
        fsg.add_arc(0, 1, "HELLO", 1.0, &lm);
        let mut dict = SimpleDictionary::new(40);
        dict.add_word("HELLO", vec![1, 2, 3]);
        let tree = build_lextree(&fsg, &dict, topo(), true);
        assert_eq!(tree.roots_at(0).len(), 1);
        assert_eq!(tree.n_pnode(), 3);
    }

    #[test]
    fn altpron_adds_a_second_root_chain() {
        let lm = LogMath::default_base();
        let mut fsg = FsgModel::new(2, 0, 1, 1.0);
        fsg.add_arc(0, 1, "TOMATO", 1.0, &lm);
        let mut dict = SimpleDictionary::new(40);
        let base = dict.add_word("TOMATO", vec![1, 2, 3]);
        dict.add_alt_pron(base, vec![1, 2, 4]);
        let tree = build_lextree(&fsg, &dict, topo(), true);
        assert_eq!(tree.roots_at(0).len(), 2);
    }

    #[test]
    fn admissibility_rejects_disjoint_context() {
        let lc = CtxtSet::single(10, 3);
        let rc = CtxtSet::single(10, 5);
        assert!(!cross_word_admissible(&rc, 9, &lc, 3));
        assert!(cross_word_admissible(&rc, 5, &lc, 3));
    }
}
