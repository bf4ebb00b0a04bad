//! Segmentation over a decoded utterance (spec §3 "segment"; §4.10
//! "segmentation").
//!
//! Each [`Seg`] names one word's span on the chosen path: either the raw
//! history back-trace (`from_history`) or the lattice's bestpath rescore
//! (`from_lattice`), selected by `DecoderConfig::bestpath`. `prob` and
//! `lback` are always `0`/`1`: per-segment posterior probability and
//! n-gram back-off order are both language-model concerns this crate
//! does not implement (spec §1 Non-goals), so they are reported as
//! constants rather than omitted, matching the shape `ps_seg_t` exposes
//! even when its confidence estimator is unconfigured.

use crate::fsg::FsgModel;
use crate::history::HistoryTable;
use crate::lattice::Lattice;

#[derive(Debug, Clone)]
pub struct Seg {
    pub word: String,
    pub sf: i32,
    pub ef: i32,
    pub ascr: i32,
    pub lscr: i32,
    pub prob: i32,
    pub lback: i32,
}

#[derive(Debug)]
pub struct SegIter {
    segs: Vec<Seg>,
    next: usize,
}

impl SegIter {
    /// Walk the raw history back-trace from `final_hist` to the dummy
    /// start entry, one segment per word on the path, fillers included.
    pub fn from_history(history: &HistoryTable, fsg: &FsgModel, final_hist: usize) -> Self {
        let mut segs = Vec::new();
        let mut cur = final_hist as i32;
        while cur >= 0 {
            let e = history.get(cur as usize);
            if let Some(wid) = e.word_id {
                let (sf, pred_score) = if e.pred >= 0 {
                    let pe = history.get(e.pred as usize);
                    (pe.frame + 1, pe.score)
                } else {
                    (0, 0)
                };
                segs.push(Seg {
                    word: fsg.word_str(wid).to_string(),
                    sf,
                    ef: e.frame,
                    ascr: e.score - pred_score,
                    lscr: 0,
                    prob: 0,
                    lback: 1,
                });
            }
            cur = e.pred;
        }
        segs.reverse();
        Self { segs, next: 0 }
    }

    /// Segment the lattice's bestpath rescore rather than the raw
    /// back-trace, used when `DecoderConfig::bestpath` is set.
    pub fn from_lattice(lattice: &Lattice, fsg: &FsgModel) -> Option<Self> {
        let segs = lattice
            .bestpath_segments()?
            .into_iter()
            .map(|(wid, sf, ef, ascr)| Seg {
                word: fsg.word_str(wid).to_string(),
                sf,
                ef,
                ascr,
                lscr: 0,
                prob: 0,
                lback: 1,
            })
            .collect();
        Some(Self { segs, next: 0 })
    }

    /// The recognized word string, skipping filler segments, matching
    /// `FsgDecoder::hyp` but derived from this iterator's segments.
    pub fn hyp_words<'a>(&'a self, fsg: &'a FsgModel) -> impl Iterator<Item = &'a str> + 'a {
        self.segs
            .iter()
            .filter(move |s| fsg.word_id(&s.word).map(|w| !fsg.is_filler(w)).unwrap_or(true))
            .map(|s| s.word.as_str())
    }
}

impl Iterator for SegIter {
    type Item = Seg;

    fn next(&mut self) -> Option<Self::Item> {
        let seg = self.segs.get(self.next)?.clone();
        self.next += 1;
        Some(seg)
    }
}
